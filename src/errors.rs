use std::path::PathBuf;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

pub type RbacResult<T> = Result<T, RbacError>;

pub type AppResult<T> = Result<T, AppError>;

/// Configuration errors raised by registry and directory mutations.
///
/// Denials are not errors; they come back as an `AuthorizationDecision`
/// with `allowed == false`.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RbacError {
    #[error("role already exists: {0}")]
    DuplicateRole(String),
    #[error("user already exists: {0}")]
    DuplicateUser(String),
    #[error("role {role} names unknown parent {parent}")]
    UnknownParent { role: String, parent: String },
    #[error("unknown role: {0}")]
    UnknownRole(String),
    #[error("unknown user: {0}")]
    UnknownUser(String),
    #[error("role {role} cannot inherit from {parent}: inheritance cycle")]
    CyclicInheritance { role: String, parent: String },
}

impl RbacError {
    /// Stable machine readable code, used as the `error` tag of HTTP bodies.
    pub fn code(&self) -> &'static str {
        match self {
            RbacError::DuplicateRole(_) => "duplicate_role",
            RbacError::DuplicateUser(_) => "duplicate_user",
            RbacError::UnknownParent { .. } => "unknown_parent",
            RbacError::UnknownRole(_) => "unknown_role",
            RbacError::UnknownUser(_) => "unknown_user",
            RbacError::CyclicInheritance { .. } => "cyclic_inheritance",
        }
    }
}

/// Failure to load a bootstrap configuration file.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration in {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error(transparent)]
    Rbac(#[from] RbacError),
}

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Rbac(#[from] RbacError),
}

impl AppError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = match &self {
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::Configuration(_) => (StatusCode::INTERNAL_SERVER_ERROR, "configuration"),
            AppError::Rbac(err) => (rbac_status(err), err.code()),
        };

        let payload = ErrorResponse {
            error: error.to_string(),
            message: self.to_string(),
        };

        (status, Json(payload)).into_response()
    }
}

fn rbac_status(err: &RbacError) -> StatusCode {
    match err {
        RbacError::DuplicateRole(_) | RbacError::DuplicateUser(_) => StatusCode::CONFLICT,
        RbacError::UnknownRole(_) | RbacError::UnknownUser(_) => StatusCode::NOT_FOUND,
        RbacError::UnknownParent { .. } | RbacError::CyclicInheritance { .. } => StatusCode::BAD_REQUEST,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rbac_errors_keep_their_code_in_responses() {
        let cases = [
            (RbacError::DuplicateRole("r".into()), StatusCode::CONFLICT, "duplicate_role"),
            (RbacError::UnknownUser("u".into()), StatusCode::NOT_FOUND, "unknown_user"),
            (
                RbacError::CyclicInheritance {
                    role: "a".into(),
                    parent: "b".into(),
                },
                StatusCode::BAD_REQUEST,
                "cyclic_inheritance",
            ),
        ];

        for (err, status, code) in cases {
            assert_eq!(err.code(), code);
            assert_eq!(AppError::from(err).into_response().status(), status);
        }
    }
}
