#![forbid(unsafe_code)]

pub mod error;
pub mod exam_client;
pub mod proctor;

pub use exam_core::Clock;

pub use error::{ExamClientError, ProctorError};
pub use exam_client::{ExamHttpClient, ExamServiceConfig};

pub use proctor::{
    ArmedMonitors, DEFAULT_TIME_BUDGET_SECS, ExamSession, IntegritySource, ManualSource,
    MonitorSet, PresentationLock, ProctorService, SessionPhase, SessionProgress,
    SessionStateError, SourceGuard, SubmitOutcome, TickOutcome, ViolationSender,
};
