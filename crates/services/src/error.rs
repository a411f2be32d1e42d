//! Shared error types for the services crate.

use thiserror::Error;

use exam_core::model::ExamId;
use storage::repository::StoreError;

use crate::proctor::{PresentationDenied, SessionStateError};

/// Errors emitted by `ExamHttpClient`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExamClientError {
    #[error("exam not found")]
    NotFound,
    #[error("exam service responded with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("exam service returned invalid exam content: {0}")]
    InvalidExam(String),
}

impl From<ExamClientError> for StoreError {
    fn from(err: ExamClientError) -> Self {
        match err {
            ExamClientError::NotFound => StoreError::NotFound,
            ExamClientError::HttpStatus(status) => {
                StoreError::Transport(format!("status {status}"))
            }
            ExamClientError::Http(e) => StoreError::Transport(e.to_string()),
            ExamClientError::InvalidExam(msg) => StoreError::Serialization(msg),
        }
    }
}

/// Errors emitted by the proctoring workflow.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProctorError {
    /// No exam matches the supplied id; no session was created.
    #[error("exam {id} was not found")]
    ExamNotFound { id: ExamId },

    /// Full-screen/presentation acquisition was refused; the session stays
    /// unstarted and `start_session` may be retried.
    #[error("presentation mode was not granted")]
    PresentationDenied(#[from] PresentationDenied),

    /// The outbound submission did not confirm. The frozen payload is kept
    /// and `submit` may be retried with the same answers and status.
    #[error("submission did not confirm")]
    SubmissionFailed(#[source] StoreError),

    #[error(transparent)]
    Session(#[from] SessionStateError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
