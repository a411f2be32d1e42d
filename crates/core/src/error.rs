use thiserror::Error;

use crate::model::ExamError;
use crate::model::IdentityError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Exam(#[from] ExamError),
    #[error(transparent)]
    Identity(#[from] IdentityError),
}
