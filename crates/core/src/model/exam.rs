use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::ExamId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExamError {
    #[error("exam title cannot be empty")]
    EmptyTitle,

    #[error("exam must contain at least one question")]
    NoQuestions,

    #[error("question {index} has empty text")]
    EmptyQuestionText { index: usize },

    #[error("question {index} must offer at least two options")]
    TooFewOptions { index: usize },

    #[error("question {index} has an empty option")]
    EmptyOption { index: usize },
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// One multiple-choice question as the student sees it.
///
/// Carries no solution information; the key stays behind the store boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    text: String,
    options: Vec<String>,
}

impl Question {
    /// Validates a question's text and options.
    ///
    /// `index` is the question's position within the exam, used only to make
    /// validation errors actionable.
    ///
    /// # Errors
    ///
    /// Returns `ExamError` if the text is blank, fewer than two options are
    /// given, or any option is blank.
    pub fn new(
        index: usize,
        text: impl Into<String>,
        options: Vec<String>,
    ) -> Result<Self, ExamError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(ExamError::EmptyQuestionText { index });
        }
        if options.len() < 2 {
            return Err(ExamError::TooFewOptions { index });
        }
        if options.iter().any(|opt| opt.trim().is_empty()) {
            return Err(ExamError::EmptyOption { index });
        }
        Ok(Self { text, options })
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }
}

//
// ─── EXAM ──────────────────────────────────────────────────────────────────────
//

/// The student-facing view of an exam: title plus ordered questions.
///
/// Fetched once at session creation and immutable thereafter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exam {
    id: ExamId,
    title: String,
    questions: Vec<Question>,
}

impl Exam {
    /// Validates an exam's title and question list.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::EmptyTitle` for a blank title and
    /// `ExamError::NoQuestions` for an empty question list.
    pub fn new(
        id: ExamId,
        title: impl Into<String>,
        questions: Vec<Question>,
    ) -> Result<Self, ExamError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(ExamError::EmptyTitle);
        }
        if questions.is_empty() {
            return Err(ExamError::NoQuestions);
        }
        Ok(Self {
            id,
            title,
            questions,
        })
    }

    #[must_use]
    pub fn id(&self) -> &ExamId {
        &self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// Number of questions, which is also the total marks available.
    #[must_use]
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn question(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
