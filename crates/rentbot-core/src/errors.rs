/// Core error type for the bot.
///
/// Adapter crates map their specific errors into this type so handlers can
/// decide between a user-facing reply and a log line.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Credentials were rejected by a remote API (HTTP 401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The remote API could not be reached (connect failure or timeout).
    #[error("network error: {0}")]
    Network(String),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
