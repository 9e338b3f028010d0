use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Error taxonomy for the auth API. Every variant maps to a status code and a
/// stable `{"errorMessage": "..."}` JSON body.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("All fields are mandatory. Please provide a username, email, and password.")]
    MissingFields,

    #[error("{0}")]
    Validation(String),

    /// Duplicate username or email. The store's unique constraints are the
    /// backstop; both the pre-insert lookups and a constraint violation on
    /// insert land here.
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Invalid credentials!")]
    InvalidCredentials,

    #[error("Unauthorized")]
    Unauthenticated,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Invalid token")]
    TokenInvalid,

    /// Unexpected store/hash/token failure. `public` is what the client sees;
    /// the source error only goes to the logs.
    #[error("{public}")]
    Internal {
        public: String,
        #[source]
        source: anyhow::Error,
    },
}

impl ApiError {
    pub fn internal(public: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Internal {
            public: public.into(),
            source,
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::MissingFields => StatusCode::FORBIDDEN,
            Self::Validation(_) | Self::Conflict(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidCredentials | Self::Unauthenticated | Self::TokenExpired => {
                StatusCode::UNAUTHORIZED
            }
            Self::TokenInvalid => StatusCode::FORBIDDEN,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Internal { ref source, .. } = self {
            error!(error = %source, "internal error");
        }
        let body = Json(json!({ "errorMessage": self.to_string() }));
        (self.status(), body).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        Self::internal("Internal server error.", err.into())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal("Internal server error.", err)
    }
}
