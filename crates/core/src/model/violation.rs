use std::fmt;

use serde::{Deserialize, Serialize};

/// A detected integrity event implying the student left the secure
/// viewing context.
///
/// The kind is recorded for diagnostics only; the grading endpoint sees just
/// the terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationKind {
    /// The page or tab was backgrounded or switched away from.
    VisibilityLost,
    /// The window lost input focus.
    FocusLost,
    /// The exclusive full-screen/presentation mode was exited by any means.
    FullscreenExited,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            ViolationKind::VisibilityLost => "Tab switching detected",
            ViolationKind::FocusLost => "Window focus lost",
            ViolationKind::FullscreenExited => "Exited full-screen mode",
        };
        write!(f, "{reason}")
    }
}
