use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ConsoleError {
    /// The backend rejected the stored credential. The client has already
    /// cleared the token and fired the login redirect by the time callers see this.
    #[error("session expired, please log in again")]
    AuthExpired,
    #[error("{0}")]
    Request(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("{0}")]
    ValidationEmpty(String),
    #[error("{0}")]
    UserInputInvalid(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("credential storage error: {0}")]
    Storage(String),
    #[error("runtime error: {0}")]
    Runtime(String),
}

impl ConsoleError {
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, ConsoleError::AuthExpired)
    }

    /// Text suitable for a banner. Request/validation errors are shown verbatim.
    pub fn user_message(&self) -> String {
        match self {
            ConsoleError::Request(message)
            | ConsoleError::ValidationEmpty(message)
            | ConsoleError::UserInputInvalid(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<serde_json::Error> for ConsoleError {
    fn from(err: serde_json::Error) -> Self {
        ConsoleError::Serialization(err.to_string())
    }
}

pub use crate::Result;
