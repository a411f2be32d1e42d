mod exam;
mod ids;
mod submission;
mod violation;

pub use exam::{Exam, ExamError, Question};
pub use ids::{AttemptId, ExamId, IdentityError, StudentName};
pub use submission::{SubmissionPayload, SubmissionReceipt, TerminalStatus};
pub use violation::ViolationKind;
