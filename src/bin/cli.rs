use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};

use rbac_engine::authz::PolicyEvaluator;
use rbac_engine::config::RbacConfig;
use rbac_engine::models::decision::AuthorizationDecision;
use rbac_engine::report;
use rbac_engine::AuthorizationEvaluator;

#[derive(Parser, Debug)]
#[command(author, version, about = "rbac-engine inspection tool", long_about = None)]
struct Cli {
    /// JSON bootstrap file; falls back to RBAC_CONFIG, then the demo data
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check one or more permissions for a user (all must be granted unless --any)
    Check {
        username: String,
        #[arg(required = true)]
        permissions: Vec<String>,
        /// Allow when at least one permission is granted
        #[arg(long)]
        any: bool,
        /// Print the full decision as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a user's roles and effective permissions
    User { username: String },
    /// Print the users x permissions decision matrix
    Matrix,
    /// Show user, role and permission counts
    Stats,
    /// Compare the effective permissions of two users
    CompareUsers { left: String, right: String },
    /// Show whether one role's permissions contain the other's
    CompareRoles { left: String, right: String },
    /// Load the configuration and report whether it is valid
    Validate,
}

fn main() -> anyhow::Result<ExitCode> {
    if dotenvy::dotenv().is_err() {
        let crate_env = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(crate_env);
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let evaluator = load(cli.config)?;

    match cli.command {
        Commands::Check {
            username,
            permissions,
            any,
            json,
        } => {
            let requested: Vec<&str> = permissions.iter().map(String::as_str).collect();
            let outcome = if any {
                evaluator.authorize_any(&username, &requested)
            } else {
                evaluator.authorize_all(&username, &requested)
            };
            let decision =
                outcome.with_context(|| format!("cannot evaluate permissions for {username}"))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&decision)?);
            } else {
                print_decision(&decision);
            }
            return Ok(if decision.allowed {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            });
        }
        Commands::User { username } => {
            let user = evaluator.directory().get_user(&username)?;
            let effective = evaluator.effective_permissions_for_user(&username)?;
            println!("user:        {}", user.username);
            println!("disabled:    {}", user.disabled);
            println!("roles:       {}", user.roles.join(", "));
            println!(
                "permissions: {}",
                effective.into_iter().collect::<Vec<_>>().join(", ")
            );
        }
        Commands::Matrix => {
            print!("{}", report::permission_matrix(&evaluator)?);
        }
        Commands::Stats => {
            let stats = report::system_stats(&evaluator);
            println!("users:       {} ({} disabled)", stats.users, stats.disabled_users);
            println!("roles:       {}", stats.roles);
            println!(
                "permissions: {} ({})",
                stats.permissions.len(),
                stats.permissions.join(", ")
            );
        }
        Commands::CompareUsers { left, right } => {
            let cmp = report::compare_users(&evaluator, &left, &right)?;
            println!("common:          {}", cmp.common.join(", "));
            println!("only {:<10} {}", format!("{}:", cmp.left), cmp.only_left.join(", "));
            println!("only {:<10} {}", format!("{}:", cmp.right), cmp.only_right.join(", "));
        }
        Commands::CompareRoles { left, right } => {
            let rel = report::compare_roles(evaluator.registry(), &left, &right)?;
            println!("{left} contains {right}: {}", rel.left_contains_right);
            println!("{right} contains {left}: {}", rel.right_contains_left);
            println!("equal: {}", rel.equal);
        }
        Commands::Validate => {
            println!(
                "configuration ok: {} roles, {} users",
                evaluator.registry().len(),
                evaluator.directory().len()
            );
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn load(path: Option<PathBuf>) -> anyhow::Result<AuthorizationEvaluator> {
    let path = path.or_else(|| std::env::var("RBAC_CONFIG").ok().map(PathBuf::from));
    let config = match &path {
        Some(path) => RbacConfig::load(path)?,
        None => RbacConfig::demo(),
    };

    config.build().with_context(|| match &path {
        Some(path) => format!("invalid rbac configuration in {}", path.display()),
        None => "invalid demo configuration".to_string(),
    })
}

fn print_decision(decision: &AuthorizationDecision) {
    let verdict = if decision.allowed { "ALLOW" } else { "DENY" };
    println!("{verdict} {} [{}]", decision.username, decision.requested.join(", "));

    if let Some(reason) = decision.reason {
        match &decision.denied_permission {
            Some(permission) => println!("  reason: {reason} ({permission})"),
            None => println!("  reason: {reason}"),
        }
    }
    for grant in &decision.grants {
        println!(
            "  {} via role {} (granted by {})",
            grant.permission,
            grant.role,
            grant.sources.join(", ")
        );
    }
}
