use crate::documents::RenderError;
use crate::import::ImportError;

/// Field-level rejection raised while editing or saving a quotation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store request failed: {0}")]
    Request(String),
    #[error("Store returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Failed to decode store response: {0}")]
    Decode(String),
    #[error("Not found: {0}")]
    NotFound(String),
}

#[derive(Debug, thiserror::Error)]
pub enum QuoteError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("Missing exchange rate: the quotation needs a positive tasa_cambio")]
    MissingExchangeRate,
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Lookup error: {0}")]
    Lookup(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type QuoteResult<T> = Result<T, QuoteError>;

#[cfg(feature = "server")]
impl axum::response::IntoResponse for QuoteError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;
        let status = match &self {
            Self::Validation(_) | Self::MissingExchangeRate | Self::Import(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Lookup(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Store(_) => StatusCode::BAD_GATEWAY,
            Self::Render(_) | Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (
            status,
            axum::Json(serde_json::json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}
