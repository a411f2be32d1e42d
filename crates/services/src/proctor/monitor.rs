use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use exam_core::model::ViolationKind;

/// Channel half a source pushes violations into while armed.
pub type ViolationSender = mpsc::UnboundedSender<ViolationKind>;

/// One platform hook that can detect the student leaving the secure viewing
/// context (tab visibility, window focus, full-screen state, and so on).
///
/// Sources are armed when the session enters `InProgress` and must stop
/// forwarding as soon as their guard drops, so a late-firing handler cannot
/// reach a session that already submitted.
pub trait IntegritySource: Send + Sync {
    /// Short label for diagnostics.
    fn name(&self) -> &'static str;

    /// Begin forwarding violations into `tx` until the returned guard is
    /// dropped.
    fn arm(&self, tx: ViolationSender) -> SourceGuard;
}

/// Unregistration handle for one armed source.
///
/// Dropping the guard runs the source's cleanup: aborting a watcher task,
/// detaching a callback, whatever the source registered.
pub struct SourceGuard {
    cleanup: Option<Box<dyn FnOnce() + Send>>,
}

impl SourceGuard {
    #[must_use]
    pub fn new(cleanup: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cleanup: Some(Box::new(cleanup)),
        }
    }

    /// Guard for a source backed by a spawned watcher task.
    #[must_use]
    pub fn from_task(handle: JoinHandle<()>) -> Self {
        Self::new(move || handle.abort())
    }

    /// Guard for a source with nothing to unregister.
    #[must_use]
    pub fn noop() -> Self {
        Self { cleanup: None }
    }
}

impl Drop for SourceGuard {
    fn drop(&mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            cleanup();
        }
    }
}

/// The set of integrity sources registered for a session.
#[derive(Default)]
pub struct MonitorSet {
    sources: Vec<Arc<dyn IntegritySource>>,
}

impl MonitorSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, source: Arc<dyn IntegritySource>) {
        self.sources.push(source);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Arm every registered source. Call on entering `InProgress`; drop or
    /// `disarm` the returned handle on entering `Submitted`.
    #[must_use]
    pub fn arm(&self) -> ArmedMonitors {
        let (tx, rx) = mpsc::unbounded_channel();
        let guards = self
            .sources
            .iter()
            .map(|source| source.arm(tx.clone()))
            .collect();
        ArmedMonitors { rx, guards }
    }
}

/// Live monitors for one in-progress session.
pub struct ArmedMonitors {
    rx: mpsc::UnboundedReceiver<ViolationKind>,
    guards: Vec<SourceGuard>,
}

impl ArmedMonitors {
    /// Wait for the next violation. Returns `None` once disarmed and the
    /// queue has drained.
    pub async fn next_violation(&mut self) -> Option<ViolationKind> {
        self.rx.recv().await
    }

    /// Non-blocking poll for an already-delivered violation.
    pub fn try_violation(&mut self) -> Option<ViolationKind> {
        self.rx.try_recv().ok()
    }

    /// Unregister every source and stop accepting new events. Violations
    /// arriving after this point are dropped.
    pub fn disarm(&mut self) {
        self.guards.clear();
        self.rx.close();
    }
}

/// Source fired by explicit calls rather than a platform hook.
///
/// Used by tests, and by shells that translate their own input events into
/// violations.
#[derive(Clone, Default)]
pub struct ManualSource {
    armed: Arc<Mutex<Option<ViolationSender>>>,
}

impl ManualSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire a violation if the source is currently armed.
    ///
    /// Returns whether the event was delivered.
    pub fn fire(&self, kind: ViolationKind) -> bool {
        let Ok(guard) = self.armed.lock() else {
            return false;
        };
        match guard.as_ref() {
            Some(tx) => tx.send(kind).is_ok(),
            None => false,
        }
    }
}

impl IntegritySource for ManualSource {
    fn name(&self) -> &'static str {
        "manual"
    }

    fn arm(&self, tx: ViolationSender) -> SourceGuard {
        if let Ok(mut slot) = self.armed.lock() {
            *slot = Some(tx);
        }
        let armed = Arc::clone(&self.armed);
        SourceGuard::new(move || {
            if let Ok(mut slot) = armed.lock() {
                *slot = None;
            }
        })
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
