use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::ids::StudentName;

/// Final classification attached to a submission.
///
/// Serialized in lowercase to match the grading endpoint's wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminalStatus {
    /// The student finished normally or the timer ran out.
    Completed,
    /// The session was cut short by an integrity violation.
    Terminated,
}

impl TerminalStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminalStatus::Completed => "completed",
            TerminalStatus::Terminated => "terminated",
        }
    }
}

/// The frozen body of one submission attempt.
///
/// Built exactly once per session by the submission guard; retried attempts
/// reuse the same value byte for byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPayload {
    pub student_name: StudentName,
    /// Sparse map from question index to the selected option text.
    /// Unanswered questions are simply absent.
    pub answers: HashMap<usize, String>,
    pub status: TerminalStatus,
}

/// Score computed by the grading endpoint, surfaced to the student unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReceipt {
    pub score: u32,
    pub total_marks: u32,
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&TerminalStatus::Completed).unwrap(),
            "\"completed\""
        );
        assert_eq!(
            serde_json::to_string(&TerminalStatus::Terminated).unwrap(),
            "\"terminated\""
        );
    }

    #[test]
    fn payload_matches_wire_shape() {
        let mut answers = HashMap::new();
        answers.insert(0, "Paris".to_owned());
        answers.insert(2, "Blue".to_owned());

        let payload = SubmissionPayload {
            student_name: StudentName::new("Ada Lovelace").unwrap(),
            answers,
            status: TerminalStatus::Completed,
        };

        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["studentName"], "Ada Lovelace");
        assert_eq!(value["answers"]["0"], "Paris");
        assert_eq!(value["answers"]["2"], "Blue");
        assert!(value["answers"].get("1").is_none());
        assert_eq!(value["status"], "completed");
    }

    #[test]
    fn receipt_reads_camel_case_fields() {
        let receipt: SubmissionReceipt =
            serde_json::from_str(r#"{"score":2,"totalMarks":3}"#).unwrap();
        assert_eq!(receipt.score, 2);
        assert_eq!(receipt.total_marks, 3);
    }
}
