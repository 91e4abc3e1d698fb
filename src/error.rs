use thiserror::Error;

/// Maximum number of characters of a remote response body kept in errors.
const REMOTE_BODY_LIMIT: usize = 500;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database connection error: {0}")]
    Connection(#[from] tokio_rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Site {0} not found or inactive")]
    SiteNotFound(i64),

    #[error("Site {0} has not been analyzed yet; run analyze first")]
    NotAnalyzed(i64),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Generated content is missing required field `{0}`")]
    GenerationIncomplete(&'static str),

    #[error("Remote error {status}: {body}")]
    Remote { status: u16, body: String },

    #[error("Remote protocol error: {0}")]
    Protocol(String),

    #[error(
        "Request to {path} timed out; the remote site may have completed the action, \
         check it before resubmitting"
    )]
    RemoteTimeout { path: String },

    #[error(
        "Connection to {path} failed after the request was sent ({reason}); the remote \
         site may have completed the action, check it before resubmitting"
    )]
    RemoteInterrupted { path: String, reason: String },

    #[error("Could not reach {path}: {reason}")]
    RemoteUnreachable { path: String, reason: String },

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Missing or invalid admin token")]
    Unauthorized,

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    pub fn remote(status: u16, body: &str) -> Self {
        AppError::Remote {
            status,
            body: truncate(body, REMOTE_BODY_LIMIT),
        }
    }

    /// The remote may or may not have applied the request.
    pub fn is_ambiguous(&self) -> bool {
        matches!(
            self,
            AppError::RemoteTimeout { .. } | AppError::RemoteInterrupted { .. }
        )
    }

    /// Stable tag used in API responses and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::SiteNotFound(_) => "site_not_found",
            AppError::NotAnalyzed(_) => "not_analyzed",
            AppError::Generation(_) | AppError::GenerationIncomplete(_) => "generation_error",
            AppError::Remote { .. } | AppError::RemoteUnreachable { .. } => "remote_error",
            AppError::Protocol(_) => "protocol_error",
            AppError::RemoteTimeout { .. } => "remote_timeout",
            AppError::RemoteInterrupted { .. } => "remote_interrupted",
            AppError::Validation(_) => "validation_error",
            AppError::Unauthorized => "unauthorized",
            AppError::Config(_) | AppError::ConfigParse(_) => "config_error",
            _ => "internal_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

pub(crate) fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
