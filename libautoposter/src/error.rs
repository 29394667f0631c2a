//! Error types for autoPoster

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AutoPosterError>;

#[derive(Error, Debug)]
pub enum AutoPosterError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Account(#[from] AccountError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("{0}")]
    Automation(#[from] AutomationError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("CSV export failed: {0}")]
    Export(#[from] csv::Error),
}

impl AutoPosterError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            AutoPosterError::InvalidInput(_) => 3,
            AutoPosterError::Platform(PlatformError::Authentication(_)) => 2,
            AutoPosterError::Account(_) => 2,
            AutoPosterError::Platform(_) => 1,
            AutoPosterError::Automation(_) => 1,
            AutoPosterError::Media(_) => 1,
            AutoPosterError::Config(_) => 1,
            AutoPosterError::Export(_) => 1,
        }
    }

    /// Message surfaced to API callers in the `error` field.
    ///
    /// Account errors keep their bare message so that callers can match on
    /// "Account misconfigured" / "Account not configured".
    pub fn public_message(&self) -> String {
        match self {
            AutoPosterError::Account(e) => e.to_string(),
            AutoPosterError::Platform(e) => e.to_string(),
            AutoPosterError::Media(e) => e.to_string(),
            other => other.to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Account resolution failures, detected before any remote call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccountError {
    #[error("Account misconfigured")]
    Misconfigured,

    #[error("Account not configured")]
    NotConfigured,
}

#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Content validation failed: {0}")]
    Validation(String),

    #[error("{operation} failed: HTTP {status}: {body}")]
    Api {
        operation: String,
        status: u16,
        body: String,
    },

    #[error("{operation} failed: unexpected response: {message}")]
    Parse { operation: String, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),
}

impl PlatformError {
    /// Wrap a transport failure with the name of the operation that hit it
    pub fn network(operation: &str, error: impl std::fmt::Display) -> Self {
        PlatformError::Network(format!("{} failed: {}", operation, error))
    }

    pub fn parse(operation: &str, message: impl Into<String>) -> Self {
        PlatformError::Parse {
            operation: operation.to_string(),
            message: message.into(),
        }
    }
}

/// Failure of one stage of the browser publishing flow
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{stage} failed: {message}")]
pub struct AutomationError {
    pub stage: String,
    pub message: String,
}

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Invalid base64 payload: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("Temporary file error: {0}")]
    TempFile(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_invalid_input() {
        let error = AutoPosterError::InvalidInput("Empty content".to_string());
        assert_eq!(error.exit_code(), 3);
    }

    #[test]
    fn test_exit_code_authentication_error() {
        let error = AutoPosterError::Platform(PlatformError::Authentication(
            "No access_token in response".to_string(),
        ));
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn test_exit_code_network_error() {
        let error = AutoPosterError::Platform(PlatformError::network(
            "upload media",
            "connection refused",
        ));
        assert_eq!(error.exit_code(), 1);
    }

    #[test]
    fn test_account_error_messages_are_bare() {
        let misconfigured: AutoPosterError = AccountError::Misconfigured.into();
        let missing: AutoPosterError = AccountError::NotConfigured.into();

        assert_eq!(misconfigured.public_message(), "Account misconfigured");
        assert_eq!(missing.public_message(), "Account not configured");
        assert_eq!(misconfigured.to_string(), "Account misconfigured");
    }

    #[test]
    fn test_network_error_includes_operation() {
        let error = PlatformError::network("create post", "timed out");
        assert_eq!(error.to_string(), "Network error: create post failed: timed out");
    }

    #[test]
    fn test_api_error_formatting() {
        let error = PlatformError::Api {
            operation: "delete media".to_string(),
            status: 403,
            body: "forbidden".to_string(),
        };
        assert_eq!(error.to_string(), "delete media failed: HTTP 403: forbidden");
    }

    #[test]
    fn test_parse_error_formatting() {
        let error = PlatformError::parse("upload media", "no URL field recognized");
        assert_eq!(
            error.to_string(),
            "upload media failed: unexpected response: no URL field recognized"
        );
    }

    #[test]
    fn test_automation_error_formatting() {
        let error = AutomationError {
            stage: "login".to_string(),
            message: "element not found".to_string(),
        };
        assert_eq!(error.to_string(), "login failed: element not found");

        let wrapped: AutoPosterError = error.into();
        assert_eq!(wrapped.public_message(), "login failed: element not found");
    }

    #[test]
    fn test_config_error_missing_field() {
        let error = AutoPosterError::Config(ConfigError::MissingField("config directory".to_string()));
        assert_eq!(
            error.to_string(),
            "Configuration error: Missing required field: config directory"
        );
        assert_eq!(error.exit_code(), 1);
    }

    #[test]
    fn test_platform_error_clone() {
        let original = PlatformError::Network("Connection failed".to_string());
        let cloned = original.clone();

        assert_eq!(format!("{}", original), format!("{}", cloned));
    }
}
