use thiserror::Error;

/// Errors raised while talking to the remote photo catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The server could not be reached, or the request timed out.
    #[error("cannot connect to catalog: {0}")]
    CannotConnect(String),

    /// The server rejected the configured API key.
    #[error("catalog rejected the API key")]
    InvalidAuth,

    /// Any other non-success HTTP status.
    #[error("catalog responded with status {status} for {url}")]
    Status { status: u16, url: String },

    /// The response body did not match the expected shape.
    #[error("malformed catalog response: {0}")]
    Decode(String),

    /// Local asset cache IO failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CatalogError {
    /// Whether a retry has a chance of succeeding.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::CannotConnect(_) => true,
            Self::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for CatalogError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            if status.as_u16() == 401 || status.as_u16() == 403 {
                Self::InvalidAuth
            } else {
                Self::Status {
                    status: status.as_u16(),
                    url: err.url().map(|u| u.to_string()).unwrap_or_default(),
                }
            }
        } else {
            Self::CannotConnect(err.to_string())
        }
    }
}

/// Failures surfaced to the user while validating connection settings.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("cannot connect to {0}")]
    CannotConnect(String),

    #[error("invalid API key")]
    InvalidAuth,

    #[error("unexpected error: {0}")]
    Unknown(String),
}

impl SetupError {
    /// Stable identifier for the failure, suitable for UI lookup tables.
    pub fn key(&self) -> &'static str {
        match self {
            Self::CannotConnect(_) => "cannot_connect",
            Self::InvalidAuth => "invalid_auth",
            Self::Unknown(_) => "unknown",
        }
    }
}
