//! Standardized mapping of HTTP failures onto registry errors

use crate::error::RegistryError;
use reqwest::{Response, StatusCode};

/// Standard error handler for HTTP responses
pub struct HttpErrorHandler;

impl HttpErrorHandler {
    /// Handle registry-related HTTP errors
    pub fn handle_registry_error(
        status: StatusCode,
        error_text: &str,
        operation: &str,
    ) -> RegistryError {
        match status.as_u16() {
            401 => RegistryError::Auth(format!(
                "Unauthorized to perform {} operation: {}",
                operation, error_text
            )),
            403 => RegistryError::Auth(format!(
                "Forbidden: insufficient permissions for {}: {}",
                operation, error_text
            )),
            404 => RegistryError::NotFound(format!("{}: {}", operation, error_text)),
            429 => RegistryError::transport(operation, format!("rate limited: {}", error_text)),
            405 => RegistryError::transport(
                operation,
                format!("operation not allowed by registry: {}", error_text),
            ),
            500 => RegistryError::transport(
                operation,
                format!("registry server error: {}", error_text),
            ),
            502 | 503 => RegistryError::transport(
                operation,
                format!("registry unavailable: {}", error_text),
            ),
            _ => RegistryError::transport(operation, format!("status {}: {}", status, error_text)),
        }
    }

    /// Handle token endpoint failures
    pub fn handle_auth_error(status: StatusCode, error_text: &str) -> RegistryError {
        let error_msg = match status.as_u16() {
            400 => "Invalid token request parameters".to_string(),
            401 => "Invalid credentials provided".to_string(),
            403 => "Access denied - insufficient permissions".to_string(),
            404 => "Authentication endpoint not found".to_string(),
            _ => format!("Token request failed (status {}): {}", status, error_text),
        };

        RegistryError::Auth(error_msg)
    }

    /// Consume a failed response and turn it into an error for `operation`
    pub async fn from_response(response: Response, operation: &str) -> RegistryError {
        let status = response.status();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read error response".to_string());
        Self::handle_registry_error(status, error_text.trim(), operation)
    }
}

/// Network error categorization and handling
pub struct NetworkErrorHandler;

impl NetworkErrorHandler {
    /// Categorize and format network errors with helpful context
    pub fn handle_network_error(error: &reqwest::Error, context: &str) -> RegistryError {
        let message = if error.is_timeout() {
            format!("timeout: {}", error)
        } else if error.is_connect() {
            format!("connection error: {}", error)
        } else if error.to_string().contains("certificate") {
            format!("TLS certificate error: {}", error)
        } else {
            error.to_string()
        };
        RegistryError::transport(context, message)
    }
}
