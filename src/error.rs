use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

/// Every failure a community action can surface to the client.
#[derive(Error, Debug)]
pub enum CommunityError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("Not logged in.")]
    Unauthorized,
    #[error("Invalid username or password.")]
    InvalidCredentials,
    #[error("{0}")]
    Conflict(String),
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("R2D2 Pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("Password hashing error: {0}")]
    Hash(#[from] bcrypt::BcryptError),
    #[error("Session error: {0}")]
    Session(#[from] actix_session::SessionInsertError),
}

pub type CommunityResult<T> = Result<T, CommunityError>;

impl CommunityError {
    pub fn not_found(what: &str) -> Self {
        CommunityError::NotFound(format!("{} not found.", what))
    }

    fn is_internal(&self) -> bool {
        matches!(
            self,
            CommunityError::Database(_)
                | CommunityError::Pool(_)
                | CommunityError::Hash(_)
                | CommunityError::Session(_)
        )
    }
}

impl ResponseError for CommunityError {
    fn status_code(&self) -> StatusCode {
        match self {
            CommunityError::NotFound(_) => StatusCode::NOT_FOUND,
            CommunityError::Validation(_) => StatusCode::BAD_REQUEST,
            CommunityError::Forbidden(_) => StatusCode::FORBIDDEN,
            CommunityError::Unauthorized | CommunityError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            CommunityError::Conflict(_) => StatusCode::CONFLICT,
            CommunityError::Database(_)
            | CommunityError::Pool(_)
            | CommunityError::Hash(_)
            | CommunityError::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = if self.is_internal() {
            log::error!("Internal error while handling community request: {}", self);
            "An internal error occurred.".to_string()
        } else {
            self.to_string()
        };
        HttpResponse::build(self.status_code()).json(json!({ "status": "error", "message": message }))
    }
}

/// Maps a unique-constraint violation to `Conflict`, leaving other errors alone.
pub fn conflict_on_unique(e: rusqlite::Error, message: &str) -> CommunityError {
    match e {
        rusqlite::Error::SqliteFailure(ref err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            CommunityError::Conflict(message.to_string())
        }
        other => CommunityError::Database(other),
    }
}
