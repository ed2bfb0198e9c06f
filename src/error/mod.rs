//! Error types and handlers for registry operations

pub mod handlers;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RegistryError>;

#[derive(Debug, Error)]
pub enum RegistryError {
    /// The unauthenticated `/v2/` probe could not be completed
    #[error("Registry probe of {url} failed: {message}")]
    Probe { url: String, message: String },

    /// The registry asked for authentication but offered nothing usable
    #[error("No usable authentication challenge from {url}: {message}")]
    NoChallenge { url: String, message: String },

    /// A credential helper failed for a reason other than "not found"
    #[error("Credential helper '{helper}' failed for {host}: {message}")]
    CredentialHelper {
        helper: String,
        host: String,
        message: String,
    },

    /// The legacy base64 `auth` field of the credential file is unusable
    #[error("Invalid auth encoding for {host}: {message}")]
    InvalidAuthEncoding { host: String, message: String },

    /// Token exchange or request authorization was rejected
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Any HTTP failure while talking to the registry
    #[error("Transport error during {context}: {message}")]
    Transport { context: String, message: String },

    /// A required header or body field was missing or unparseable
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Invalid reference '{reference}': {message}")]
    InvalidReference { reference: String, message: String },

    /// Credential or manifest absent
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl RegistryError {
    pub fn transport(context: impl Into<String>, message: impl Into<String>) -> Self {
        RegistryError::Transport {
            context: context.into(),
            message: message.into(),
        }
    }

    pub fn invalid_reference(reference: impl Into<String>, message: impl Into<String>) -> Self {
        RegistryError::InvalidReference {
            reference: reference.into(),
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::NotFound(_))
    }
}

impl From<url::ParseError> for RegistryError {
    fn from(err: url::ParseError) -> Self {
        RegistryError::Config(format!("invalid URL: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_context() {
        let err = RegistryError::invalid_reference("app", "missing ':' separator");
        assert_eq!(
            err.to_string(),
            "Invalid reference 'app': missing ':' separator"
        );

        let err = RegistryError::transport("catalog listing", "connection refused");
        assert!(err.to_string().contains("catalog listing"));
    }

    #[test]
    fn test_is_not_found() {
        assert!(RegistryError::NotFound("app-a:v1".into()).is_not_found());
        assert!(!RegistryError::Cancelled.is_not_found());
    }
}
