//! Request precondition errors

use super::InstallError;

/// Creates an invalid request error
pub fn invalid(message: impl Into<String>) -> InstallError {
    InstallError::InvalidRequest {
        message: message.into(),
    }
}

/// Creates an output failed error
pub fn output_failed(reason: impl ToString) -> InstallError {
    InstallError::OutputFailed {
        reason: reason.to_string(),
    }
}
