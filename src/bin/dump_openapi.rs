use std::fs;

fn main() -> anyhow::Result<()> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "openapi.json".to_string());

    let doc = rbac_engine::docs::build_openapi(8000);
    fs::write(&path, doc.to_pretty_json()?)?;
    println!("wrote {}", path);
    Ok(())
}
