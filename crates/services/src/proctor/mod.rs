mod monitor;
mod presentation;
mod progress;
mod session;
mod workflow;

// Public API of the proctoring subsystem.
pub use crate::error::ProctorError;
pub use monitor::{
    ArmedMonitors, IntegritySource, ManualSource, MonitorSet, SourceGuard, ViolationSender,
};
pub use presentation::{AlwaysGranted, PresentationDenied, PresentationLock};
pub use progress::SessionProgress;
pub use session::{
    DEFAULT_TIME_BUDGET_SECS, ExamSession, SessionPhase, SessionStateError, TickOutcome,
};
pub use workflow::{ProctorService, SubmitOutcome};
