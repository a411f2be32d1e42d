use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

use exam_core::model::{
    AttemptId, Exam, StudentName, SubmissionPayload, SubmissionReceipt, TerminalStatus,
    ViolationKind,
};

use super::progress::SessionProgress;

/// Time budget for one attempt, in seconds.
pub const DEFAULT_TIME_BUDGET_SECS: u32 = 3600;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionStateError {
    #[error("session has not been started")]
    NotStarted,

    #[error("session was already started")]
    AlreadyStarted,

    #[error("session is not in progress")]
    NotInProgress,

    #[error("question index {index} is out of range for {count} questions")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("answers are frozen while a submission is pending")]
    AnswersFrozen,

    #[error("a submission is already in flight")]
    SubmissionInFlight,

    #[error("no submission is in flight")]
    NoSubmissionInFlight,

    #[error("session was already submitted")]
    AlreadySubmitted,
}

//
// ─── PHASE & TICK ──────────────────────────────────────────────────────────────
//

/// Lifecycle phase of one attempt. `Submitted` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    NotStarted,
    InProgress,
    Submitted(TerminalStatus),
}

/// Outcome of one timer tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The tick was ignored: session not in progress, or a submission is
    /// pending and the countdown is frozen.
    Idle,
    /// The budget was decremented; seconds remaining.
    Running(u32),
    /// The budget is exhausted; the caller must submit with `Completed`.
    Expired,
}

// The one-shot latch. `Failed` keeps the frozen payload so a retry re-sends
// exactly what the first attempt froze; only `Confirmed` is permanent.
enum SubmissionGuard {
    Open,
    InFlight(SubmissionPayload),
    Failed(SubmissionPayload),
    Confirmed(SubmissionPayload),
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// Runtime state of one student's single attempt at one exam.
///
/// All transitions are synchronous and free of I/O; the orchestration layer
/// owns the collaborator calls. The submission guard is checked-and-set
/// within a single call, so a timer expiry, a violation handler and a manual
/// submit racing in any interleaving produce at most one in-flight payload.
pub struct ExamSession {
    attempt_id: AttemptId,
    exam: Exam,
    student: StudentName,
    answers: HashMap<usize, String>,
    current_index: usize,
    time_remaining_secs: u32,
    phase: SessionPhase,
    guard: SubmissionGuard,
    violation: Option<ViolationKind>,
    receipt: Option<SubmissionReceipt>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    submitted_at: Option<DateTime<Utc>>,
}

impl ExamSession {
    /// Create a session for a fetched exam.
    ///
    /// `created_at` should come from the services layer clock to keep time
    /// deterministic. The session starts with the full time budget and in
    /// `NotStarted` phase.
    #[must_use]
    pub fn new(exam: Exam, student: StudentName, created_at: DateTime<Utc>) -> Self {
        Self {
            attempt_id: AttemptId::random(),
            exam,
            student,
            answers: HashMap::new(),
            current_index: 0,
            time_remaining_secs: DEFAULT_TIME_BUDGET_SECS,
            phase: SessionPhase::NotStarted,
            guard: SubmissionGuard::Open,
            violation: None,
            receipt: None,
            created_at,
            started_at: None,
            submitted_at: None,
        }
    }

    /// Override the time budget, mainly for tests and short demo runs.
    #[must_use]
    pub fn with_time_budget(mut self, secs: u32) -> Self {
        self.time_remaining_secs = secs;
        self
    }

    #[must_use]
    pub fn attempt_id(&self) -> AttemptId {
        self.attempt_id
    }

    #[must_use]
    pub fn exam(&self) -> &Exam {
        &self.exam
    }

    #[must_use]
    pub fn student(&self) -> &StudentName {
        &self.student
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    #[must_use]
    pub fn is_in_progress(&self) -> bool {
        self.phase == SessionPhase::InProgress
    }

    #[must_use]
    pub fn is_submitted(&self) -> bool {
        matches!(self.phase, SessionPhase::Submitted(_))
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    #[must_use]
    pub fn time_remaining_secs(&self) -> u32 {
        self.time_remaining_secs
    }

    #[must_use]
    pub fn answer(&self, index: usize) -> Option<&str> {
        self.answers.get(&index).map(String::as_str)
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    /// First recorded violation, if the session saw one. Diagnostics only.
    #[must_use]
    pub fn violation(&self) -> Option<ViolationKind> {
        self.violation
    }

    /// Score returned by the grading endpoint once a submission confirmed.
    #[must_use]
    pub fn receipt(&self) -> Option<SubmissionReceipt> {
        self.receipt
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    #[must_use]
    pub fn submitted_at(&self) -> Option<DateTime<Utc>> {
        self.submitted_at
    }

    /// True while no payload has been frozen yet.
    ///
    /// Once false, tick expiry and violations can no longer influence the
    /// outcome; only the frozen submission can confirm or be retried.
    #[must_use]
    pub fn submission_open(&self) -> bool {
        matches!(self.guard, SubmissionGuard::Open)
    }

    /// The frozen payload, present from the first `begin_submission` on.
    #[must_use]
    pub fn frozen_payload(&self) -> Option<&SubmissionPayload> {
        match &self.guard {
            SubmissionGuard::Open => None,
            SubmissionGuard::InFlight(p)
            | SubmissionGuard::Failed(p)
            | SubmissionGuard::Confirmed(p) => Some(p),
        }
    }

    /// Aggregated view of session progress, useful for UI shells.
    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        SessionProgress {
            total_questions: self.exam.question_count(),
            answered: self.answers.len(),
            current_index: self.current_index,
            time_remaining_secs: self.time_remaining_secs,
            is_complete: self.is_submitted(),
        }
    }

    /// Move `NotStarted -> InProgress`.
    ///
    /// The caller must have acquired exclusive presentation mode first; a
    /// denied acquisition means this is never reached and the session stays
    /// `NotStarted` for a retry.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyStarted` or `AlreadySubmitted` for repeated calls.
    pub fn begin(&mut self, at: DateTime<Utc>) -> Result<(), SessionStateError> {
        match self.phase {
            SessionPhase::NotStarted => {
                self.phase = SessionPhase::InProgress;
                self.started_at = Some(at);
                Ok(())
            }
            SessionPhase::InProgress => Err(SessionStateError::AlreadyStarted),
            SessionPhase::Submitted(_) => Err(SessionStateError::AlreadySubmitted),
        }
    }

    /// Record the selected option for a question. Last write wins.
    ///
    /// The option text is stored as given; it is not checked against the
    /// question's option list, so the grading side must treat any value as
    /// potentially "no match".
    ///
    /// # Errors
    ///
    /// Returns `NotInProgress` outside the in-progress phase,
    /// `AnswersFrozen` once a submission payload has been frozen, and
    /// `IndexOutOfRange` for an index past the question list.
    pub fn select_answer(
        &mut self,
        index: usize,
        option_text: impl Into<String>,
    ) -> Result<(), SessionStateError> {
        if self.phase != SessionPhase::InProgress {
            return Err(SessionStateError::NotInProgress);
        }
        if !self.submission_open() {
            return Err(SessionStateError::AnswersFrozen);
        }
        let count = self.exam.question_count();
        if index >= count {
            return Err(SessionStateError::IndexOutOfRange { index, count });
        }
        self.answers.insert(index, option_text.into());
        Ok(())
    }

    /// Move the question cursor by `delta`, clamped to the question range.
    ///
    /// Never errors and touches neither phase nor answers.
    pub fn navigate(&mut self, delta: i64) {
        let last = self.exam.question_count().saturating_sub(1) as i64;
        let target = (self.current_index as i64).saturating_add(delta).clamp(0, last);
        self.current_index = target as usize;
    }

    /// Advance the countdown by one second.
    ///
    /// Returns `Expired` when the budget crosses below one second; the
    /// caller is then responsible for submitting with `Completed`. Ticks
    /// arriving outside `InProgress`, or while a submission is pending, are
    /// ignored.
    pub fn tick(&mut self) -> TickOutcome {
        if self.phase != SessionPhase::InProgress || !self.submission_open() {
            return TickOutcome::Idle;
        }
        if self.time_remaining_secs <= 1 {
            self.time_remaining_secs = 0;
            return TickOutcome::Expired;
        }
        self.time_remaining_secs -= 1;
        TickOutcome::Running(self.time_remaining_secs)
    }

    /// Record the first violation reason for diagnostics.
    pub fn record_violation(&mut self, kind: ViolationKind) {
        self.violation.get_or_insert(kind);
    }

    /// The atomic check-and-set at the heart of the submission guard.
    ///
    /// The first caller freezes `answers` and `status` into a payload and
    /// owns the in-flight submission. A caller arriving after a transport
    /// failure re-enters flight with the originally frozen payload; the
    /// `status` argument is ignored then. Everyone else gets an error and
    /// must treat the call as a no-op.
    ///
    /// # Errors
    ///
    /// Returns `NotStarted`/`NotInProgress` outside the in-progress phase,
    /// `SubmissionInFlight` while an attempt is pending, and
    /// `AlreadySubmitted` after confirmation.
    pub fn begin_submission(
        &mut self,
        status: TerminalStatus,
    ) -> Result<SubmissionPayload, SessionStateError> {
        match self.phase {
            SessionPhase::NotStarted => return Err(SessionStateError::NotStarted),
            SessionPhase::Submitted(_) => return Err(SessionStateError::AlreadySubmitted),
            SessionPhase::InProgress => {}
        }

        match &self.guard {
            SubmissionGuard::Open => {
                let payload = SubmissionPayload {
                    student_name: self.student.clone(),
                    answers: self.answers.clone(),
                    status,
                };
                self.guard = SubmissionGuard::InFlight(payload.clone());
                Ok(payload)
            }
            SubmissionGuard::Failed(frozen) => {
                let payload = frozen.clone();
                self.guard = SubmissionGuard::InFlight(payload.clone());
                Ok(payload)
            }
            SubmissionGuard::InFlight(_) => Err(SessionStateError::SubmissionInFlight),
            SubmissionGuard::Confirmed(_) => Err(SessionStateError::AlreadySubmitted),
        }
    }

    /// Mark the pending attempt as failed, keeping the frozen payload so the
    /// student can retry. The session stays `InProgress` internally.
    ///
    /// # Errors
    ///
    /// Returns `NoSubmissionInFlight` if nothing was pending.
    pub fn submission_failed(&mut self) -> Result<(), SessionStateError> {
        match std::mem::replace(&mut self.guard, SubmissionGuard::Open) {
            SubmissionGuard::InFlight(payload) => {
                self.guard = SubmissionGuard::Failed(payload);
                Ok(())
            }
            other => {
                self.guard = other;
                Err(SessionStateError::NoSubmissionInFlight)
            }
        }
    }

    /// Confirm the pending attempt: trip the guard permanently and enter the
    /// terminal `Submitted` phase carrying the endpoint's receipt.
    ///
    /// # Errors
    ///
    /// Returns `NoSubmissionInFlight` if nothing was pending.
    pub fn confirm_submission(
        &mut self,
        receipt: SubmissionReceipt,
        at: DateTime<Utc>,
    ) -> Result<(), SessionStateError> {
        match std::mem::replace(&mut self.guard, SubmissionGuard::Open) {
            SubmissionGuard::InFlight(payload) => {
                self.phase = SessionPhase::Submitted(payload.status);
                self.receipt = Some(receipt);
                self.submitted_at = Some(at);
                self.guard = SubmissionGuard::Confirmed(payload);
                Ok(())
            }
            other => {
                self.guard = other;
                Err(SessionStateError::NoSubmissionInFlight)
            }
        }
    }
}

impl fmt::Debug for ExamSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExamSession")
            .field("attempt_id", &self.attempt_id)
            .field("exam_id", &self.exam.id())
            .field("phase", &self.phase)
            .field("current_index", &self.current_index)
            .field("answered", &self.answers.len())
            .field("time_remaining_secs", &self.time_remaining_secs)
            .field("violation", &self.violation)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
