use async_trait::async_trait;
use thiserror::Error;

/// Exclusive presentation mode was refused by the platform.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("presentation mode denied: {reason}")]
pub struct PresentationDenied {
    pub reason: String,
}

impl PresentationDenied {
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Exclusive full-screen/presentation capability.
///
/// Acquisition is a precondition for starting a session; release happens
/// once, on the first submission attempt. Platform shells substitute their
/// own mechanism (browser fullscreen, kiosk mode, a terminal that already
/// owns the screen).
#[async_trait]
pub trait PresentationLock: Send + Sync {
    /// Request exclusive presentation mode.
    ///
    /// # Errors
    ///
    /// Returns `PresentationDenied` when the platform refuses; the caller
    /// may ask the student to grant the capability and retry.
    async fn acquire(&self) -> Result<(), PresentationDenied>;

    /// Leave exclusive presentation mode. Best effort; never fails.
    async fn release(&self);
}

/// Lock for environments where there is nothing to acquire, such as tests
/// and a terminal that already fills the screen.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysGranted;

#[async_trait]
impl PresentationLock for AlwaysGranted {
    async fn acquire(&self) -> Result<(), PresentationDenied> {
        Ok(())
    }

    async fn release(&self) {}
}
