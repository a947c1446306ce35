use crate::ssh::session::SessionKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SessionError>;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Invalid connection configuration: {0}")]
    Config(String),

    #[error("Host not found: {id}")]
    NotFound { id: String },

    #[error("Invalid connection type: {kind}")]
    InvalidKind { kind: String },

    #[error("{kind} login failed")]
    Authentication { kind: SessionKind },

    #[error("No session has been established yet")]
    NoActiveSession,

    #[error("Failed to load private key: {0}")]
    KeyLoad(String),

    #[error("SSH error: {0}")]
    Transport(#[from] ssh2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connections file error: {0}")]
    Registry(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authentication_message_names_kind() {
        let err = SessionError::Authentication { kind: SessionKind::Transfer };
        assert_eq!(err.to_string(), "transfer login failed");

        let err = SessionError::Authentication { kind: SessionKind::Command };
        assert_eq!(err.to_string(), "command login failed");
    }

    #[test]
    fn test_not_found_message() {
        let err = SessionError::NotFound { id: "web-1".to_string() };
        assert_eq!(err.to_string(), "Host not found: web-1");
    }
}
