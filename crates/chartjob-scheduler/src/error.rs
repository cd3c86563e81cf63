//! Scheduling and completion errors.

use std::fmt;

use chartjob_core::error::AppError;

/// Why a job did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionCode {
    /// The worker reported a failure.
    Failed,
    /// The wait budget ran out first.
    Timeout,
}

impl CompletionCode {
    /// Lowercase code string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Failed => "failed",
            Self::Timeout => "timeout",
        }
    }
}

impl fmt::Display for CompletionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A job reached a terminal state other than success, or was not waited for
/// long enough.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Job {job_id} {code}: {message}")]
pub struct JobCompletionError {
    /// Failure code.
    pub code: CompletionCode,
    /// Backend-specific job identifier.
    pub job_id: String,
    /// Human-readable detail.
    pub message: String,
}

impl JobCompletionError {
    /// The worker reported a failure.
    pub fn failed(job_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: CompletionCode::Failed,
            job_id: job_id.into(),
            message: message.into(),
        }
    }

    /// The job was not finished before its deadline.
    pub fn timeout(job_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: CompletionCode::Timeout,
            job_id: job_id.into(),
            message: message.into(),
        }
    }

    /// Whether the wait budget ran out.
    pub fn is_timeout(&self) -> bool {
        self.code == CompletionCode::Timeout
    }
}

/// Errors raised while compiling, scheduling or awaiting jobs.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// An export entry asked for a format the workers cannot render.
    #[error("Unsupported export format: '{0}'")]
    UnsupportedFormat(String),

    /// A distributed queue was referenced but is not registered.
    #[error("Unsupported queue: '{0}'")]
    UnsupportedQueue(String),

    /// The worker section of the configuration is incomplete.
    #[error("Missing worker configuration: {0}")]
    MissingWorkerConfig(String),

    /// The job failed or timed out.
    #[error(transparent)]
    Completion(#[from] JobCompletionError),

    /// Storage or queue infrastructure error.
    #[error(transparent)]
    Internal(#[from] AppError),
}

impl SchedulerError {
    /// Completion code, if this is a completion error.
    pub fn completion_code(&self) -> Option<CompletionCode> {
        match self {
            Self::Completion(e) => Some(e.code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_error_display() {
        let err = JobCompletionError::timeout("42", "still queued after 2s");
        assert_eq!(err.to_string(), "Job 42 timeout: still queued after 2s");
        assert!(err.is_timeout());
    }

    #[test]
    fn test_completion_code_passthrough() {
        let err: SchedulerError = JobCompletionError::failed("7", "renderer crashed").into();
        assert_eq!(err.completion_code(), Some(CompletionCode::Failed));
        assert_eq!(
            SchedulerError::UnsupportedQueue("x".into()).completion_code(),
            None
        );
    }
}
