use std::sync::Arc;

use tracing::{info, warn};

use exam_core::Clock;
use exam_core::model::{ExamId, StudentName, SubmissionReceipt, TerminalStatus, ViolationKind};
use storage::repository::{ExamStore, StoreError, SubmissionEndpoint};

use super::presentation::PresentationLock;
use super::session::{ExamSession, SessionStateError, TickOutcome};
use crate::error::ProctorError;

/// Result of a submission attempt routed through the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// This call won the guard and the endpoint confirmed.
    Submitted(SubmissionReceipt),
    /// Another caller already owns or finished the submission; nothing was
    /// sent.
    AlreadySubmitted,
}

/// Orchestrates one exam attempt from entry to its single terminal
/// submission.
///
/// Every way a session can end (timer expiry, integrity violation, manual
/// submit) funnels through [`ProctorService::submit`], where the session's
/// guard decides the one caller allowed to reach the endpoint.
#[derive(Clone)]
pub struct ProctorService {
    clock: Clock,
    exams: Arc<dyn ExamStore>,
    submissions: Arc<dyn SubmissionEndpoint>,
}

impl ProctorService {
    #[must_use]
    pub fn new(
        clock: Clock,
        exams: Arc<dyn ExamStore>,
        submissions: Arc<dyn SubmissionEndpoint>,
    ) -> Self {
        Self {
            clock,
            exams,
            submissions,
        }
    }

    /// Fetch the exam and create a fresh session for the student.
    ///
    /// # Errors
    ///
    /// Returns `ProctorError::ExamNotFound` for an unknown id (no session is
    /// created) and `ProctorError::Store` for other store failures.
    pub async fn join_exam(
        &self,
        student: StudentName,
        exam_id: &ExamId,
    ) -> Result<ExamSession, ProctorError> {
        let exam = self.exams.fetch_exam(exam_id).await.map_err(|err| match err {
            StoreError::NotFound => ProctorError::ExamNotFound {
                id: exam_id.clone(),
            },
            other => ProctorError::Store(other),
        })?;

        let session = ExamSession::new(exam, student, self.clock.now());
        info!(
            attempt = %session.attempt_id(),
            exam = %exam_id,
            student = %session.student(),
            "student joined exam"
        );
        Ok(session)
    }

    /// Start the attempt: acquire exclusive presentation mode, then move the
    /// session to `InProgress`. On a denied acquisition the session stays
    /// `NotStarted` and the call may be retried indefinitely.
    ///
    /// # Errors
    ///
    /// Returns `ProctorError::PresentationDenied` on refusal, or a session
    /// state error for a double start.
    pub async fn start_session(
        &self,
        session: &mut ExamSession,
        lock: &dyn PresentationLock,
    ) -> Result<(), ProctorError> {
        lock.acquire().await?;
        session.begin(self.clock.now())?;
        info!(attempt = %session.attempt_id(), "exam session started");
        Ok(())
    }

    /// Advance the countdown by one second, auto-submitting with
    /// `Completed` on expiry.
    ///
    /// # Errors
    ///
    /// Returns `ProctorError::SubmissionFailed` if expiry triggered a
    /// submission that did not confirm; `submit` may then be retried.
    pub async fn tick(
        &self,
        session: &mut ExamSession,
        lock: &dyn PresentationLock,
    ) -> Result<TickOutcome, ProctorError> {
        match session.tick() {
            TickOutcome::Expired => {
                info!(attempt = %session.attempt_id(), "time budget exhausted");
                self.submit(session, TerminalStatus::Completed, lock).await?;
                Ok(TickOutcome::Expired)
            }
            outcome => Ok(outcome),
        }
    }

    /// Handle a violation reported by an integrity monitor: record the
    /// reason and terminate the attempt through the submission guard.
    ///
    /// Events arriving once a submission is already owned, or outside the
    /// in-progress phase, have no observable effect.
    ///
    /// # Errors
    ///
    /// Returns `ProctorError::SubmissionFailed` if the terminating
    /// submission did not confirm.
    pub async fn report_violation(
        &self,
        session: &mut ExamSession,
        kind: ViolationKind,
        lock: &dyn PresentationLock,
    ) -> Result<SubmitOutcome, ProctorError> {
        if !session.is_in_progress() || !session.submission_open() {
            return Ok(SubmitOutcome::AlreadySubmitted);
        }

        session.record_violation(kind);
        warn!(
            attempt = %session.attempt_id(),
            reason = %kind,
            "exam terminated by integrity violation"
        );
        self.submit(session, TerminalStatus::Terminated, lock).await
    }

    /// The single choke point for ending a session.
    ///
    /// The guard is checked-and-set synchronously before anything is
    /// awaited, so concurrent expiry/violation/manual calls resolve to one
    /// winner; the rest observe `AlreadySubmitted`. The winner releases the
    /// presentation lock, sends the frozen payload, and either confirms the
    /// session or marks the attempt failed for an explicit retry.
    ///
    /// # Errors
    ///
    /// Returns `ProctorError::SubmissionFailed` when the endpoint call does
    /// not confirm; the frozen payload is retained and `submit` may be
    /// called again with any status (the frozen one wins).
    pub async fn submit(
        &self,
        session: &mut ExamSession,
        status: TerminalStatus,
        lock: &dyn PresentationLock,
    ) -> Result<SubmitOutcome, ProctorError> {
        let payload = match session.begin_submission(status) {
            Ok(payload) => payload,
            Err(
                SessionStateError::SubmissionInFlight | SessionStateError::AlreadySubmitted,
            ) => return Ok(SubmitOutcome::AlreadySubmitted),
            Err(err) => return Err(ProctorError::Session(err)),
        };

        lock.release().await;

        match self
            .submissions
            .submit_answers(session.exam().id(), &payload)
            .await
        {
            Ok(receipt) => {
                session.confirm_submission(receipt, self.clock.now())?;
                info!(
                    attempt = %session.attempt_id(),
                    status = payload.status.as_str(),
                    score = receipt.score,
                    total = receipt.total_marks,
                    "submission confirmed"
                );
                Ok(SubmitOutcome::Submitted(receipt))
            }
            Err(err) => {
                session.submission_failed()?;
                warn!(
                    attempt = %session.attempt_id(),
                    error = %err,
                    "submission did not confirm; retry available"
                );
                Err(ProctorError::SubmissionFailed(err))
            }
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use exam_core::model::{ExamId, Question, SubmissionPayload};
    use exam_core::time::{fixed_clock, fixed_now};
    use storage::repository::{ExamRecord, InMemoryExamService};

    use crate::proctor::presentation::{AlwaysGranted, PresentationDenied};
    use crate::proctor::session::SessionPhase;

    fn publish_sample_exam(service: &InMemoryExamService) -> ExamId {
        let id = ExamId::new("ABC123").unwrap();
        let questions = vec![
            Question::new(0, "Capital of France?", opts(&["Paris", "Lyon"])).unwrap(),
            Question::new(1, "2 + 2?", opts(&["3", "4"])).unwrap(),
            Question::new(2, "Sky color?", opts(&["Blue", "Green"])).unwrap(),
        ];
        let record = ExamRecord::new(
            id.clone(),
            "General Knowledge",
            questions,
            vec!["Paris".into(), "4".into(), "Blue".into()],
            "examiner@example.com",
            fixed_now(),
        )
        .unwrap();
        service.publish_exam(record).unwrap();
        id
    }

    fn opts(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| (*t).to_owned()).collect()
    }

    fn build_service(backend: &InMemoryExamService) -> ProctorService {
        ProctorService::new(
            fixed_clock(),
            Arc::new(backend.clone()),
            Arc::new(backend.clone()),
        )
    }

    /// Fails the first `failures` submissions, then delegates.
    struct FlakyEndpoint {
        inner: InMemoryExamService,
        failures: AtomicUsize,
    }

    #[async_trait]
    impl SubmissionEndpoint for FlakyEndpoint {
        async fn submit_answers(
            &self,
            id: &ExamId,
            payload: &SubmissionPayload,
        ) -> Result<exam_core::model::SubmissionReceipt, StoreError> {
            if self.failures.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                n.checked_sub(1)
            })
            .is_ok()
            {
                return Err(StoreError::Transport("connection reset".into()));
            }
            self.inner.submit_answers(id, payload).await
        }
    }

    /// Lock that always refuses acquisition.
    struct DenyingLock;

    #[async_trait]
    impl PresentationLock for DenyingLock {
        async fn acquire(&self) -> Result<(), PresentationDenied> {
            Err(PresentationDenied::new("user dismissed the prompt"))
        }

        async fn release(&self) {}
    }

    #[tokio::test]
    async fn join_unknown_exam_creates_no_session() {
        let backend = InMemoryExamService::new(fixed_clock());
        let svc = build_service(&backend);

        let err = svc
            .join_exam(
                StudentName::new("Ada").unwrap(),
                &ExamId::new("NOPE99").unwrap(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ProctorError::ExamNotFound { .. }));
    }

    #[tokio::test]
    async fn denied_presentation_leaves_session_not_started() {
        let backend = InMemoryExamService::new(fixed_clock());
        let exam_id = publish_sample_exam(&backend);
        let svc = build_service(&backend);

        let mut session = svc
            .join_exam(StudentName::new("Ada").unwrap(), &exam_id)
            .await
            .unwrap();

        let lock = DenyingLock;
        let err = svc.start_session(&mut session, &lock).await.unwrap_err();
        assert!(matches!(err, ProctorError::PresentationDenied(_)));
        assert_eq!(session.phase(), SessionPhase::NotStarted);

        // The student may retry after granting the capability.
        svc.start_session(&mut session, &AlwaysGranted)
            .await
            .unwrap();
        assert!(session.is_in_progress());
    }

    #[tokio::test]
    async fn partial_answers_submit_with_expected_payload_and_score() {
        let backend = InMemoryExamService::new(fixed_clock());
        let exam_id = publish_sample_exam(&backend);
        let svc = build_service(&backend);
        let lock = AlwaysGranted;

        let mut session = svc
            .join_exam(StudentName::new("Ada").unwrap(), &exam_id)
            .await
            .unwrap();
        svc.start_session(&mut session, &lock).await.unwrap();

        session.select_answer(0, "Paris").unwrap();
        session.select_answer(2, "Green").unwrap();

        let outcome = svc
            .submit(&mut session, TerminalStatus::Completed, &lock)
            .await
            .unwrap();
        let SubmitOutcome::Submitted(receipt) = outcome else {
            panic!("expected a confirmed submission");
        };
        assert_eq!(receipt.score, 1);
        assert_eq!(receipt.total_marks, 3);
        assert_eq!(session.receipt(), Some(receipt));

        let results = backend.results_for(&exam_id).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].answers.len(), 2);
        assert_eq!(results[0].answers.get(&0).map(String::as_str), Some("Paris"));
        assert_eq!(results[0].answers.get(&2).map(String::as_str), Some("Green"));
        assert_eq!(results[0].status, TerminalStatus::Completed);
    }

    #[tokio::test]
    async fn racing_end_conditions_send_exactly_one_payload() {
        let backend = InMemoryExamService::new(fixed_clock());
        let exam_id = publish_sample_exam(&backend);
        let svc = build_service(&backend);
        let lock = AlwaysGranted;

        let mut session = svc
            .join_exam(StudentName::new("Ada").unwrap(), &exam_id)
            .await
            .unwrap();
        svc.start_session(&mut session, &lock).await.unwrap();
        session.select_answer(1, "4").unwrap();

        // Manual submit wins; a violation and more ticks arrive right after.
        let first = svc
            .submit(&mut session, TerminalStatus::Completed, &lock)
            .await
            .unwrap();
        assert!(matches!(first, SubmitOutcome::Submitted(_)));

        let late_violation = svc
            .report_violation(&mut session, ViolationKind::FocusLost, &lock)
            .await
            .unwrap();
        assert_eq!(late_violation, SubmitOutcome::AlreadySubmitted);

        let late_tick = svc.tick(&mut session, &lock).await.unwrap();
        assert_eq!(late_tick, TickOutcome::Idle);

        let duplicate = svc
            .submit(&mut session, TerminalStatus::Terminated, &lock)
            .await
            .unwrap();
        assert_eq!(duplicate, SubmitOutcome::AlreadySubmitted);

        let results = backend.results_for(&exam_id).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, TerminalStatus::Completed);
        // The late violation left no trace on the recorded outcome.
        assert_eq!(session.violation(), None);
    }

    #[tokio::test]
    async fn violation_terminates_and_second_event_is_inert() {
        let backend = InMemoryExamService::new(fixed_clock());
        let exam_id = publish_sample_exam(&backend);
        let svc = build_service(&backend);
        let lock = AlwaysGranted;

        let mut session = svc
            .join_exam(StudentName::new("Ada").unwrap(), &exam_id)
            .await
            .unwrap();
        svc.start_session(&mut session, &lock).await.unwrap();

        let outcome = svc
            .report_violation(&mut session, ViolationKind::VisibilityLost, &lock)
            .await
            .unwrap();
        assert!(matches!(outcome, SubmitOutcome::Submitted(_)));
        assert_eq!(
            session.phase(),
            SessionPhase::Submitted(TerminalStatus::Terminated)
        );
        assert_eq!(session.violation(), Some(ViolationKind::VisibilityLost));

        let second = svc
            .report_violation(&mut session, ViolationKind::FocusLost, &lock)
            .await
            .unwrap();
        assert_eq!(second, SubmitOutcome::AlreadySubmitted);
        assert_eq!(session.violation(), Some(ViolationKind::VisibilityLost));
        assert_eq!(backend.results_for(&exam_id).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn expiry_auto_submits_completed() {
        let backend = InMemoryExamService::new(fixed_clock());
        let exam_id = publish_sample_exam(&backend);
        let svc = build_service(&backend);
        let lock = AlwaysGranted;

        let mut session = svc
            .join_exam(StudentName::new("Ada").unwrap(), &exam_id)
            .await
            .unwrap();
        svc.start_session(&mut session, &lock).await.unwrap();
        let mut session = session.with_time_budget(3);

        assert_eq!(
            svc.tick(&mut session, &lock).await.unwrap(),
            TickOutcome::Running(2)
        );
        assert_eq!(
            svc.tick(&mut session, &lock).await.unwrap(),
            TickOutcome::Running(1)
        );
        assert_eq!(
            svc.tick(&mut session, &lock).await.unwrap(),
            TickOutcome::Expired
        );

        assert_eq!(session.time_remaining_secs(), 0);
        assert_eq!(
            session.phase(),
            SessionPhase::Submitted(TerminalStatus::Completed)
        );
        assert_eq!(backend.results_for(&exam_id).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn transport_failure_allows_retry_with_frozen_payload() {
        let backend = InMemoryExamService::new(fixed_clock());
        let exam_id = publish_sample_exam(&backend);
        let flaky = Arc::new(FlakyEndpoint {
            inner: backend.clone(),
            failures: AtomicUsize::new(1),
        });
        let svc = ProctorService::new(fixed_clock(), Arc::new(backend.clone()), flaky);
        let lock = AlwaysGranted;

        let mut session = svc
            .join_exam(StudentName::new("Ada").unwrap(), &exam_id)
            .await
            .unwrap();
        svc.start_session(&mut session, &lock).await.unwrap();
        session.select_answer(0, "Paris").unwrap();

        let err = svc
            .submit(&mut session, TerminalStatus::Completed, &lock)
            .await
            .unwrap_err();
        assert!(matches!(err, ProctorError::SubmissionFailed(_)));
        assert!(session.is_in_progress());
        assert_eq!(backend.results_for(&exam_id).unwrap().len(), 0);

        // A violation racing in between cannot hijack the frozen status.
        let raced = svc
            .report_violation(&mut session, ViolationKind::FocusLost, &lock)
            .await
            .unwrap();
        assert_eq!(raced, SubmitOutcome::AlreadySubmitted);

        let retry = svc
            .submit(&mut session, TerminalStatus::Terminated, &lock)
            .await
            .unwrap();
        let SubmitOutcome::Submitted(receipt) = retry else {
            panic!("retry should confirm");
        };
        assert_eq!(receipt.score, 1);

        let results = backend.results_for(&exam_id).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, TerminalStatus::Completed);
    }
}
