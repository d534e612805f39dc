//! Error types for the KCPS client.
//!
//! Every failure surfaced by the client falls into one of four families:
//! transport failures, API rejections, decoding failures and async-job
//! outcomes (timeout or failure).

use thiserror::Error;

/// Result type for KCPS operations.
pub type Result<T> = std::result::Result<T, KcpsError>;

/// Errors that can occur when talking to the KCPS API.
#[derive(Error, Debug)]
pub enum KcpsError {
    /// Network, DNS or TLS failure reported by the HTTP stack.
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-2xx status and an error body.
    #[error(
        "API error ({http_status}): CloudStack API error {error_code} (CSExceptionErrorCode: {cs_error_code}): {error_text}"
    )]
    Api {
        /// HTTP status code.
        http_status: u16,
        /// `errorcode` from the error body.
        error_code: i64,
        /// `cserrorcode` from the error body.
        cs_error_code: i64,
        /// `errortext` from the error body.
        error_text: String,
    },

    /// The response could not be unwrapped, coerced or decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The async job did not reach a terminal state within the wait budget.
    ///
    /// The job keeps running on the server. `initial` holds the response of
    /// the call that started the job so the caller can resume polling.
    #[error("Timeout while waiting for async job {job_id} to finish")]
    AsyncTimeout {
        /// Identifier of the job still pending on the server.
        job_id: String,
        /// The (normalized) response that carried the job id.
        initial: Box<serde_json::Value>,
    },

    /// The async job finished with status 2 and a textual result.
    #[error("{0}")]
    AsyncJobFailed(String),

    /// The async job failed with a non-textual result.
    #[error("Undefined error: {0}")]
    AsyncJobUndefined(String),

    /// The client could not be constructed from the given configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl KcpsError {
    /// Returns true if this is a timeout from the async-job poller.
    pub fn is_async_timeout(&self) -> bool {
        matches!(self, KcpsError::AsyncTimeout { .. })
    }

    /// Returns true if the async job itself reported a failure.
    pub fn is_job_failure(&self) -> bool {
        matches!(
            self,
            KcpsError::AsyncJobFailed(_) | KcpsError::AsyncJobUndefined(_)
        )
    }

    /// Returns the HTTP status code if available.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            KcpsError::Api { http_status, .. } => Some(*http_status),
            KcpsError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Returns the job id of a timed-out async job.
    pub fn pending_job_id(&self) -> Option<&str> {
        match self {
            KcpsError::AsyncTimeout { job_id, .. } => Some(job_id),
            _ => None,
        }
    }

    pub(crate) fn decode(err: impl std::fmt::Display) -> Self {
        KcpsError::Decode(err.to_string())
    }
}

impl From<serde_json::Error> for KcpsError {
    fn from(err: serde_json::Error) -> Self {
        KcpsError::Decode(err.to_string())
    }
}
