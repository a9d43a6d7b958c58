use thiserror::Error;

/// Errors raised while talking to the game backend or driving a session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// No credential in the token store, or the credential carries no user id.
    #[error("not authenticated")]
    NotAuthenticated,
    #[error("game {0} not found")]
    NotFound(String),
    /// Non-2xx response; `message` is the server-provided text.
    #[error("{message}")]
    Http { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("invalid response from server: {0}")]
    Decode(String),
    #[error("game has not been loaded yet")]
    NotLoaded,
}

impl ClientError {
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Decode(err.to_string())
    }
}

/// Errors from the position engine wrapper.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("invalid FEN: {0}")]
    InvalidFen(String),
    #[error("invalid square: {0}")]
    InvalidSquare(String),
    #[error("invalid promotion piece: {0}")]
    InvalidPromotion(String),
    #[error("illegal move {from}{to}")]
    IllegalMove { from: String, to: String },
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{name} must be a whole number of milliseconds, got '{value}'")]
    InvalidDuration { name: &'static str, value: String },
    #[error("{name} must not be empty")]
    Empty { name: &'static str },
}
