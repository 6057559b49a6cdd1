//! SDK Error Types

use thiserror::Error;

/// SDK Result type
pub type Result<T> = std::result::Result<T, SdkError>;

/// Error codes the daemon returns in RPC errors
pub mod code {
    pub const VALIDATION_ERROR: i32 = 4000;
    pub const NOT_FOUND: i32 = 4001;
    pub const CONFLICT: i32 = 4002;
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const DB_ERROR: i32 = 5001;
}

/// SDK Error
#[derive(Debug, Error)]
pub enum SdkError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("RPC error ({code}): {message}")]
    Rpc { code: i32, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Other error: {0}")]
    Other(String),
}

impl SdkError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, SdkError::Rpc { code, .. } if *code == code::NOT_FOUND)
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, SdkError::Rpc { code, .. } if *code == code::VALIDATION_ERROR)
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, SdkError::Rpc { code, .. } if *code == code::CONFLICT)
    }
}

impl From<jsonrpsee::core::ClientError> for SdkError {
    fn from(e: jsonrpsee::core::ClientError) -> Self {
        match e {
            jsonrpsee::core::ClientError::Call(call_err) => SdkError::Rpc {
                code: call_err.code(),
                message: call_err.message().to_string(),
            },
            jsonrpsee::core::ClientError::Transport(e) => SdkError::Transport(e.to_string()),
            jsonrpsee::core::ClientError::RestartNeeded(_) => {
                SdkError::Connection("Connection restart needed".to_string())
            }
            jsonrpsee::core::ClientError::ParseError(e) => SdkError::Serialization(e),
            _ => SdkError::Other(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let err = SdkError::Rpc {
            code: code::NOT_FOUND,
            message: "Queue 9 not found".to_string(),
        };
        assert!(err.is_not_found());
        assert!(!err.is_conflict());

        let err = SdkError::Rpc {
            code: code::VALIDATION_ERROR,
            message: "visitor_id must not be empty".to_string(),
        };
        assert!(err.is_validation());
        assert!(!SdkError::Other("x".to_string()).is_validation());
    }
}
