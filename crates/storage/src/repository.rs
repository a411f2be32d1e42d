use async_trait::async_trait;
use chrono::{DateTime, Utc};
use exam_core::Clock;
use exam_core::model::{
    Exam, ExamError, ExamId, Question, StudentName, SubmissionPayload, SubmissionReceipt,
    TerminalStatus,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by exam service adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Errors raised while assembling an `ExamRecord`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RecordError {
    #[error("solution key has {got} entries but the exam has {expected} questions")]
    SolutionKeyMismatch { expected: usize, got: usize },

    #[error(transparent)]
    Exam(#[from] ExamError),
}

/// Server-side shape of a published exam.
///
/// This is the only place the solution key lives; `student_view` strips it
/// before anything crosses the store boundary.
#[derive(Debug, Clone)]
pub struct ExamRecord {
    exam: Exam,
    solution_key: Vec<String>,
    examiner_email: String,
    created_at: DateTime<Utc>,
}

impl ExamRecord {
    /// Builds a record from its parts, validating the exam and checking the
    /// solution key covers every question.
    ///
    /// # Errors
    ///
    /// Returns `RecordError::Exam` for invalid exam content and
    /// `RecordError::SolutionKeyMismatch` when the key length is off.
    pub fn new(
        id: ExamId,
        title: impl Into<String>,
        questions: Vec<Question>,
        solution_key: Vec<String>,
        examiner_email: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, RecordError> {
        let exam = Exam::new(id, title, questions)?;
        if solution_key.len() != exam.question_count() {
            return Err(RecordError::SolutionKeyMismatch {
                expected: exam.question_count(),
                got: solution_key.len(),
            });
        }
        Ok(Self {
            exam,
            solution_key,
            examiner_email: examiner_email.into(),
            created_at,
        })
    }

    #[must_use]
    pub fn id(&self) -> &ExamId {
        self.exam.id()
    }

    #[must_use]
    pub fn examiner_email(&self) -> &str {
        &self.examiner_email
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The exam as a student may see it: title and questions, no key.
    #[must_use]
    pub fn student_view(&self) -> Exam {
        self.exam.clone()
    }

    /// Trivial equality-count grading.
    ///
    /// An absent answer, or any text that does not match the key exactly,
    /// scores zero for that question. Free-form answer text is tolerated.
    #[must_use]
    pub fn grade(&self, payload: &SubmissionPayload) -> SubmissionReceipt {
        let total = self.exam.question_count();
        let score = self
            .solution_key
            .iter()
            .enumerate()
            .filter(|&(index, key)| payload.answers.get(&index) == Some(key))
            .count();
        SubmissionReceipt {
            score: u32::try_from(score).unwrap_or(u32::MAX),
            total_marks: u32::try_from(total).unwrap_or(u32::MAX),
        }
    }
}

/// One graded submission as the exam service keeps it.
#[derive(Debug, Clone)]
pub struct ResultRecord {
    pub exam_id: ExamId,
    pub student_name: StudentName,
    pub answers: HashMap<usize, String>,
    pub score: u32,
    pub total_marks: u32,
    pub status: TerminalStatus,
    pub submitted_at: DateTime<Utc>,
}

/// Read side of the exam service: serves the student-facing exam content.
#[async_trait]
pub trait ExamStore: Send + Sync {
    /// Fetch an exam by id with the solution key withheld.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no exam matches, or other store
    /// errors for transport problems.
    async fn fetch_exam(&self, id: &ExamId) -> Result<Exam, StoreError>;
}

/// Write side of the exam service: accepts exactly one final payload per
/// attempt and returns the computed score.
#[async_trait]
pub trait SubmissionEndpoint: Send + Sync {
    /// Grade and record a final submission.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` for an unknown exam, or
    /// `StoreError::Transport` when the call cannot be completed.
    async fn submit_answers(
        &self,
        id: &ExamId,
        payload: &SubmissionPayload,
    ) -> Result<SubmissionReceipt, StoreError>;
}

/// In-memory exam service for tests and the demo binary.
///
/// Grading mirrors the hosted service: equality count against the stored
/// solution key, one appended result row per accepted submission.
#[derive(Clone)]
pub struct InMemoryExamService {
    exams: Arc<Mutex<HashMap<ExamId, ExamRecord>>>,
    results: Arc<Mutex<Vec<ResultRecord>>>,
    clock: Clock,
}

impl InMemoryExamService {
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self {
            exams: Arc::new(Mutex::new(HashMap::new())),
            results: Arc::new(Mutex::new(Vec::new())),
            clock,
        }
    }

    /// Publish an exam, making it fetchable by id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if the id is already taken.
    pub fn publish_exam(&self, record: ExamRecord) -> Result<(), StoreError> {
        let mut guard = self
            .exams
            .lock()
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        if guard.contains_key(record.id()) {
            return Err(StoreError::Conflict);
        }
        guard.insert(record.id().clone(), record);
        Ok(())
    }

    /// Recorded submissions for an exam, most recent first.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Transport` if the result log is unavailable.
    pub fn results_for(&self, id: &ExamId) -> Result<Vec<ResultRecord>, StoreError> {
        let guard = self
            .results
            .lock()
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        let mut matching: Vec<ResultRecord> = guard
            .iter()
            .filter(|r| &r.exam_id == id)
            .cloned()
            .collect();
        matching.reverse();
        Ok(matching)
    }
}

impl Default for InMemoryExamService {
    fn default() -> Self {
        Self::new(Clock::default())
    }
}

#[async_trait]
impl ExamStore for InMemoryExamService {
    async fn fetch_exam(&self, id: &ExamId) -> Result<Exam, StoreError> {
        let guard = self
            .exams
            .lock()
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        guard
            .get(id)
            .map(ExamRecord::student_view)
            .ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl SubmissionEndpoint for InMemoryExamService {
    async fn submit_answers(
        &self,
        id: &ExamId,
        payload: &SubmissionPayload,
    ) -> Result<SubmissionReceipt, StoreError> {
        let receipt = {
            let guard = self
                .exams
                .lock()
                .map_err(|e| StoreError::Transport(e.to_string()))?;
            let record = guard.get(id).ok_or(StoreError::NotFound)?;
            record.grade(payload)
        };

        let mut results = self
            .results
            .lock()
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        results.push(ResultRecord {
            exam_id: id.clone(),
            student_name: payload.student_name.clone(),
            answers: payload.answers.clone(),
            score: receipt.score,
            total_marks: receipt.total_marks,
            status: payload.status,
            submitted_at: self.clock.now(),
        });

        Ok(receipt)
    }
}

/// Aggregates the two collaborator halves behind trait objects for easy
/// backend swapping.
#[derive(Clone)]
pub struct ExamApi {
    pub exams: Arc<dyn ExamStore>,
    pub submissions: Arc<dyn SubmissionEndpoint>,
}

impl ExamApi {
    #[must_use]
    pub fn in_memory(service: InMemoryExamService) -> Self {
        let exams: Arc<dyn ExamStore> = Arc::new(service.clone());
        let submissions: Arc<dyn SubmissionEndpoint> = Arc::new(service);
        Self { exams, submissions }
    }
}
