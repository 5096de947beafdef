//! Error types for the MCP and HTTP surfaces.

use hydration_core::HydrationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum McpError {
    #[error("{0}")]
    Hydration(#[from] HydrationError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl McpError {
    /// True when the caller sent something unusable, as opposed to a server-side failure.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            McpError::Validation(_)
                | McpError::NotFound(_)
                | McpError::Hydration(HydrationError::InvalidInput(_))
                | McpError::Hydration(HydrationError::NotFound(_))
        )
    }
}

impl From<String> for McpError {
    fn from(err: String) -> Self {
        McpError::Internal(err)
    }
}

impl From<McpError> for String {
    fn from(err: McpError) -> Self {
        err.to_string()
    }
}

pub type McpResult<T> = Result<T, McpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_input_is_client_error() {
        let err = McpError::from(HydrationError::InvalidInput("weight".into()));
        assert!(err.is_client_error());
        assert_eq!(String::from(err), "invalid input: weight");
        assert!(!McpError::Hydration(HydrationError::Store("down".into())).is_client_error());
    }
}
