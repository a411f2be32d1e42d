use std::env;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use exam_core::model::{Exam, ExamId, Question, SubmissionPayload, SubmissionReceipt};
use storage::repository::{ExamStore, StoreError, SubmissionEndpoint};

use crate::error::ExamClientError;

/// Connection settings for a remotely hosted exam service.
#[derive(Clone, Debug)]
pub struct ExamServiceConfig {
    pub base_url: String,
}

impl ExamServiceConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// Read the base URL from `EXAM_API_BASE_URL`, if set and non-empty.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let base_url = env::var("EXAM_API_BASE_URL").ok()?;
        if base_url.trim().is_empty() {
            return None;
        }
        Some(Self { base_url })
    }
}

/// HTTP client for the exam service's two endpoints: fetching an exam and
/// submitting a final payload.
#[derive(Clone)]
pub struct ExamHttpClient {
    client: Client,
    config: ExamServiceConfig,
}

impl ExamHttpClient {
    #[must_use]
    pub fn new(config: ExamServiceConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn exam_url(&self, id: &ExamId) -> String {
        format!(
            "{}/api/exams/{}",
            self.config.base_url.trim_end_matches('/'),
            id
        )
    }

    /// Fetch the student-facing exam content.
    ///
    /// # Errors
    ///
    /// Returns `ExamClientError::NotFound` on 404, `HttpStatus` for other
    /// non-success responses, and `InvalidExam` when the body does not form
    /// a valid exam.
    pub async fn fetch(&self, id: &ExamId) -> Result<Exam, ExamClientError> {
        let response = self.client.get(self.exam_url(id)).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => return Err(ExamClientError::NotFound),
            status if !status.is_success() => return Err(ExamClientError::HttpStatus(status)),
            _ => {}
        }

        let dto: ExamDto = response.json().await?;
        dto.into_exam()
    }

    /// Send a final submission payload and return the computed score.
    ///
    /// # Errors
    ///
    /// Returns `ExamClientError::NotFound` on 404 and `HttpStatus`/`Http`
    /// for other failures; all of them count as an unconfirmed submission.
    pub async fn submit(
        &self,
        id: &ExamId,
        payload: &SubmissionPayload,
    ) -> Result<SubmissionReceipt, ExamClientError> {
        let url = format!("{}/submit", self.exam_url(id));
        let response = self.client.post(url).json(payload).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => return Err(ExamClientError::NotFound),
            status if !status.is_success() => return Err(ExamClientError::HttpStatus(status)),
            _ => {}
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl ExamStore for ExamHttpClient {
    async fn fetch_exam(&self, id: &ExamId) -> Result<Exam, StoreError> {
        self.fetch(id).await.map_err(StoreError::from)
    }
}

#[async_trait]
impl SubmissionEndpoint for ExamHttpClient {
    async fn submit_answers(
        &self,
        id: &ExamId,
        payload: &SubmissionPayload,
    ) -> Result<SubmissionReceipt, StoreError> {
        self.submit(id, payload).await.map_err(StoreError::from)
    }
}

#[derive(Debug, Deserialize)]
struct ExamDto {
    id: String,
    title: String,
    questions: Vec<QuestionDto>,
}

#[derive(Debug, Deserialize)]
struct QuestionDto {
    text: String,
    options: Vec<String>,
}

impl ExamDto {
    fn into_exam(self) -> Result<Exam, ExamClientError> {
        let id = ExamId::new(&self.id)
            .map_err(|e| ExamClientError::InvalidExam(e.to_string()))?;
        let questions = self
            .questions
            .into_iter()
            .enumerate()
            .map(|(index, q)| Question::new(index, q.text, q.options))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ExamClientError::InvalidExam(e.to_string()))?;
        Exam::new(id, self.title, questions)
            .map_err(|e| ExamClientError::InvalidExam(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exam_url_joins_base_and_id() {
        let client = ExamHttpClient::new(ExamServiceConfig::new("http://localhost:3000/"));
        let id = ExamId::new("ABC123").unwrap();
        assert_eq!(
            client.exam_url(&id),
            "http://localhost:3000/api/exams/ABC123"
        );
    }

    #[test]
    fn dto_with_invalid_content_is_rejected() {
        let dto = ExamDto {
            id: "ABC123".into(),
            title: "Quiz".into(),
            questions: vec![QuestionDto {
                text: "Pick one".into(),
                options: vec!["only".into()],
            }],
        };
        let err = dto.into_exam().unwrap_err();
        assert!(matches!(err, ExamClientError::InvalidExam(_)));
    }

    #[test]
    fn dto_round_trips_into_domain_exam() {
        let dto = ExamDto {
            id: "abc123".into(),
            title: "Quiz".into(),
            questions: vec![QuestionDto {
                text: "Pick one".into(),
                options: vec!["a".into(), "b".into()],
            }],
        };
        let exam = dto.into_exam().unwrap();
        assert_eq!(exam.id().as_str(), "ABC123");
        assert_eq!(exam.question_count(), 1);
    }
}
