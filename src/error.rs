// Error types for socket enumeration
//
// Both kinds are terminal: the caller prints them once and exits non-zero.

use std::io;

/// Errors returned while collecting the listening socket set
#[derive(Debug, thiserror::Error)]
pub enum ListError {
    /// The enumeration facility could not run or exited abnormally
    #[error("{facility} failed: {source}")]
    InvocationFailed {
        facility: String,
        #[source]
        source: io::Error,
    },

    /// The facility reported diagnostics, so its results cannot be trusted
    #[error("{facility} reported: {message}")]
    DiagnosticOutput { facility: String, message: String },
}

impl ListError {
    pub fn invocation(facility: impl Into<String>, source: io::Error) -> Self {
        ListError::InvocationFailed {
            facility: facility.into(),
            source,
        }
    }

    pub fn diagnostic(facility: impl Into<String>, message: impl Into<String>) -> Self {
        ListError::DiagnosticOutput {
            facility: facility.into(),
            message: message.into(),
        }
    }
}
