use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::app::AppState;
use crate::authz::{AuthzMode, PolicyEvaluator};
use crate::errors::{AppError, AppResult, RbacError};
use crate::models::decision::AuthorizationDecision;

/// Identity of the caller, taken from an `Authorization: Bearer <credential>`
/// header.
///
/// Credentials are opaque here: the credential is the username, and whether
/// it names a known user is decided by the evaluator.
#[derive(Debug, Clone)]
pub struct Caller {
    pub username: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let username = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(bearer_credential)
            .ok_or_else(|| AppError::unauthorized("Authorization header missing"))?;

        Ok(Caller {
            username: username.to_string(),
        })
    }
}

/// Credential of a `Bearer` authorization value; the scheme is case-insensitive.
fn bearer_credential(value: &str) -> Option<&str> {
    let (scheme, credential) = value.trim().split_once(' ')?;
    let credential = credential.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !credential.is_empty()).then_some(credential)
}

impl Caller {
    /// Checks `permission` for this caller under the configured mode.
    ///
    /// Unknown callers map to 401; denials map to 403 in strict mode and are
    /// only logged in advisory mode. `Ok(None)` means checks are off.
    pub fn require(&self, state: &AppState, permission: &str) -> AppResult<Option<AuthorizationDecision>> {
        if state.mode == AuthzMode::Off {
            return Ok(None);
        }

        let decision = state
            .evaluator
            .authorize(&self.username, permission)
            .map_err(|err| match err {
                RbacError::UnknownUser(_) => AppError::unauthorized("Invalid authentication credentials"),
                other => AppError::from(other),
            })?;

        if decision.allowed {
            return Ok(Some(decision));
        }

        let reason = decision
            .reason
            .map(|reason| reason.as_str())
            .unwrap_or("permission_not_granted");

        match state.mode {
            AuthzMode::Advisory => {
                tracing::warn!(
                    username = %self.username,
                    permission = %permission,
                    reason = %reason,
                    "advisory mode: denial not enforced"
                );
                Ok(Some(decision))
            }
            _ => Err(AppError::forbidden(format!("{reason}: require {permission} permission"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_scheme_ignores_case() {
        assert_eq!(bearer_credential("Bearer admin"), Some("admin"));
        assert_eq!(bearer_credential("bearer admin"), Some("admin"));
        assert_eq!(bearer_credential("BEARER  admin "), Some("admin"));
    }

    #[test]
    fn other_schemes_and_blank_credentials_are_rejected() {
        assert_eq!(bearer_credential("Basic YWRtaW4="), None);
        assert_eq!(bearer_credential("Bearer "), None);
        assert_eq!(bearer_credential("Bearer"), None);
        assert_eq!(bearer_credential("Beareradmin"), None);
    }
}
