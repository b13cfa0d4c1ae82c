use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::{error::Error, fmt};

/// A payload that does not describe a valid entity. The message names the
/// violated rule and is safe to show to clients.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct InvalidInput(pub String);

impl InvalidInput {
    pub fn new(msg: impl Into<String>) -> Self {
        InvalidInput(msg.into())
    }

    /// Prefixes the message with the path of the enclosing field,
    /// e.g. `entry is required` becomes `ingredients[2].entry is required`.
    pub fn within(self, path: impl fmt::Display) -> Self {
        InvalidInput(format!("{}.{}", path, self.0))
    }
}

impl From<serde_json::Error> for InvalidInput {
    fn from(error: serde_json::Error) -> Self {
        InvalidInput(format!("Invalid JSON: {}", error))
    }
}

#[derive(Debug)]
pub enum StoreError {
    Database(Box<dyn Error + Send + Sync + 'static>),
    Encode(serde_json::Error),
    InvalidCollection(String),
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        use StoreError::*;
        match self {
            Database(e) => Some(e.as_ref() as &dyn Error),
            Encode(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use StoreError::*;
        match self {
            Database(e) => write!(f, "DatabaseError: {}", e),
            Encode(e) => write!(f, "EncodeError: {}", e),
            InvalidCollection(s) => write!(f, "InvalidCollection: {}", s),
        }
    }
}

impl From<libsql::Error> for StoreError {
    fn from(error: libsql::Error) -> Self {
        StoreError::Database(Box::new(error))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(error: serde_json::Error) -> Self {
        StoreError::Encode(error)
    }
}

/// A periodic refresh that was abandoned. The cache keeps its previous state.
#[derive(Debug, thiserror::Error)]
pub enum ReloadError {
    #[error("failed to fetch recipes: {0}")]
    Store(#[from] StoreError),

    #[error("stored recipe #{index} is malformed: {source}")]
    InvalidDocument { index: usize, source: InvalidInput },
}

/// Everything a recipe endpoint can answer with other than success.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    InvalidInput(#[from] InvalidInput),

    #[error("Incorrect password.")]
    Unauthorized,

    #[error("Recipe with name '{0}' already exists.")]
    Conflict(String),

    #[error("Recipe '{0}' does not exist.")]
    NotFound(String),

    #[error("Failed to {action} recipe in database.")]
    StoreFailure {
        action: &'static str,
        source: StoreError,
    },
}

impl AppError {
    pub fn store(action: &'static str) -> impl FnOnce(StoreError) -> AppError {
        move |source| AppError::StoreFailure { action, source }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) | AppError::Conflict(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::StoreFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::StoreFailure { source, .. } = &self {
            tracing::error!(error = %crate::unpack_error(source), "store operation failed");
        }

        (self.status(), self.to_string()).into_response()
    }
}
