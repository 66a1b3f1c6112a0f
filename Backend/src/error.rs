// Erreurs de l'application
//
// - Les erreurs de ligne (import) ne passent jamais par ici : elles sont
//   accumulées dans RowIssue à l'intérieur du résultat du batch.
// - Les erreurs d'authentification restent uniformes côté client,
//   le détail est uniquement dans les logs.

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use sea_orm::DbErr;
use thiserror::Error;
use tracing::error;

pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid email or password.";
pub const INVALID_SESSION_MESSAGE: &str = "Session expired or invalid.";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account is not confirmed")]
    AccountNotConfirmed,

    #[error("session expired or invalid")]
    InvalidSession,

    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

/// Erreurs fatales au niveau du fichier : rien n'est traité
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("The uploaded file is empty")]
    EmptyFile,

    #[error("Unable to read file: {0}")]
    Unreadable(String),

    #[error("Unsupported file format '{0}'. Expected csv, xlsx or xls")]
    UnsupportedFormat(String),

    #[error("{}", missing_columns_message(.missing, .found))]
    MissingColumns {
        missing: Vec<String>,
        found: Vec<String>,
    },

    #[error("Destructive operation requires confirm=true")]
    ConfirmationRequired,

    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

fn missing_columns_message(missing: &[String], found: &[String]) -> String {
    let names: Vec<String> = missing.iter().map(|m| format!("'{}'", m)).collect();
    format!(
        "Required column{} {} not found. Available columns: {}",
        if missing.len() > 1 { "s" } else { "" },
        names.join(", "),
        found.join(", ")
    )
}

#[derive(Debug, Error)]
pub enum SignupError {
    #[error("First name, last name and email are required")]
    MissingFields,

    #[error("An account already exists for this email")]
    EmailTaken,

    #[error("Verification link is invalid or has expired")]
    InvalidToken,

    #[error("Password must be at least {0} characters")]
    WeakPassword(usize),

    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

/// Erreur à la frontière HTTP
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Structural(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Infrastructure(String),
}

impl AppError {
    pub fn infrastructure(context: &str, err: impl std::fmt::Display) -> Self {
        error!("❌ {}: {}", context, err);
        AppError::Infrastructure("An internal error occurred. Please try again later.".to_string())
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        AppError::infrastructure("Database error", err)
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials | AuthError::AccountNotConfirmed => {
                AppError::Unauthorized(INVALID_CREDENTIALS_MESSAGE.to_string())
            }
            AuthError::InvalidSession => AppError::Unauthorized(INVALID_SESSION_MESSAGE.to_string()),
            AuthError::Database(e) => e.into(),
        }
    }
}

impl From<ImportError> for AppError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::Database(e) => e.into(),
            ImportError::ConfirmationRequired => AppError::Validation(err.to_string()),
            other => AppError::Structural(other.to_string()),
        }
    }
}

impl From<SignupError> for AppError {
    fn from(err: SignupError) -> Self {
        match err {
            SignupError::MissingFields | SignupError::WeakPassword(_) => AppError::Validation(err.to_string()),
            SignupError::EmailTaken => AppError::Conflict(err.to_string()),
            SignupError::InvalidToken => AppError::NotFound(err.to_string()),
            SignupError::Database(e) => e.into(),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::Structural(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Infrastructure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "success": false,
            "error": self.to_string()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_errors_are_uniform() {
        let a: AppError = AuthError::InvalidCredentials.into();
        let b: AppError = AuthError::AccountNotConfirmed.into();
        assert_eq!(a.to_string(), b.to_string());
        assert_eq!(a.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_missing_columns_message() {
        let err = ImportError::MissingColumns {
            missing: vec!["email".to_string()],
            found: vec!["name".to_string(), "role".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Required column 'email' not found. Available columns: name, role"
        );
    }

    #[test]
    fn test_database_error_is_generic() {
        let err: AppError = DbErr::Custom("connection refused on 10.0.0.3".to_string()).into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.to_string().contains("10.0.0.3"));
    }
}
