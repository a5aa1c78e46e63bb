/// Core error type for the bot.
///
/// Adapter crates map their specific failures into this type so the core can
/// handle them consistently: rate limits rotate credentials, everything else
/// surfaces as a single user-facing failure notice.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Upstream reported quota/rate-limit exhaustion for the active credential.
    #[error("upstream rate limited: {0}")]
    RateLimited(String),

    /// Every credential in the rotation pool is exhausted.
    #[error("all credentials exhausted")]
    KeysExhausted,

    /// Any other upstream failure (network, malformed response). Not retried.
    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("transport error: {0}")]
    Transport(String),
}

impl Error {
    /// Rate-limit classification per the upstream error text convention.
    pub fn is_rate_limit(&self) -> bool {
        match self {
            Error::RateLimited(_) => true,
            Error::Upstream(msg) => {
                let m = msg.to_lowercase();
                m.contains("429") || m.contains("quota")
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
