/// Core error type for the gateway.
///
/// Adapter crates map their specific failures into this type so the HTTP
/// layer can translate every kind to a status code in one place.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("failed to send the login code: {0}")]
    CodeRequestFailed(String),

    #[error("no open session for this phone; request a code first")]
    SessionNotFound,

    #[error("a password is required for two-factor authentication")]
    PasswordRequired,

    #[error("invalid code or password")]
    InvalidCredentials,

    #[error("the session is not authorized; request a code first")]
    NotAuthenticated,

    #[error("the account is banned")]
    AccountBanned,

    #[error("the post contains forbidden words: {}", .0.join(", "))]
    ForbiddenContent(Vec<String>),

    #[error("could not resolve channel: {0}")]
    ChannelResolutionFailed(String),

    #[error("failed to deliver the post to: {}", .0.join(", "))]
    PartialDelivery(Vec<String>),

    #[error("invalid {field}: {reason}")]
    MalformedInput { field: &'static str, reason: String },

    #[error("upstream service unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("operation timed out")]
    Timeout,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn malformed(field: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedInput {
            field,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
