use std::sync::Arc;

use exam_core::model::{
    ExamId, Question, StudentName, TerminalStatus, ViolationKind,
};
use exam_core::time::{fixed_clock, fixed_now};
use services::proctor::AlwaysGranted;
use services::{ManualSource, MonitorSet, ProctorService, SubmitOutcome};
use storage::repository::{ExamRecord, InMemoryExamService};

fn publish_exam(service: &InMemoryExamService) -> ExamId {
    let id = ExamId::new("SMOKE1").unwrap();
    let questions = (0..3)
        .map(|i| {
            Question::new(
                i,
                format!("Question {i}"),
                vec!["Right".into(), "Wrong".into()],
            )
            .unwrap()
        })
        .collect();
    let record = ExamRecord::new(
        id.clone(),
        "Smoke Exam",
        questions,
        vec!["Right".into(); 3],
        "examiner@example.com",
        fixed_now(),
    )
    .unwrap();
    service.publish_exam(record).unwrap();
    id
}

#[tokio::test]
async fn full_attempt_ends_in_one_confirmed_submission() {
    let backend = InMemoryExamService::new(fixed_clock());
    let exam_id = publish_exam(&backend);
    let svc = ProctorService::new(
        fixed_clock(),
        Arc::new(backend.clone()),
        Arc::new(backend.clone()),
    );
    let lock = AlwaysGranted;

    let mut session = svc
        .join_exam(StudentName::new("Smoke Tester").unwrap(), &exam_id)
        .await
        .unwrap();
    svc.start_session(&mut session, &lock).await.unwrap();

    // Answer the first and last question, skipping the middle one.
    session.select_answer(0, "Right").unwrap();
    session.navigate(2);
    session.select_answer(2, "Right").unwrap();

    // A little time passes.
    for _ in 0..5 {
        svc.tick(&mut session, &lock).await.unwrap();
    }

    let outcome = svc
        .submit(&mut session, TerminalStatus::Completed, &lock)
        .await
        .unwrap();
    let SubmitOutcome::Submitted(receipt) = outcome else {
        panic!("submission should confirm");
    };
    assert_eq!(receipt.score, 2);
    assert_eq!(receipt.total_marks, 3);

    let results = backend.results_for(&exam_id).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].answers.len(), 2);
}

#[tokio::test]
async fn monitored_violation_terminates_and_disarms() {
    let backend = InMemoryExamService::new(fixed_clock());
    let exam_id = publish_exam(&backend);
    let svc = ProctorService::new(
        fixed_clock(),
        Arc::new(backend.clone()),
        Arc::new(backend.clone()),
    );
    let lock = AlwaysGranted;

    let source = ManualSource::new();
    let mut monitors = MonitorSet::new();
    monitors.register(Arc::new(source.clone()));

    let mut session = svc
        .join_exam(StudentName::new("Smoke Tester").unwrap(), &exam_id)
        .await
        .unwrap();
    svc.start_session(&mut session, &lock).await.unwrap();
    let mut armed = monitors.arm();

    session.select_answer(0, "Right").unwrap();

    // The student switches away; the monitor reports it.
    assert!(source.fire(ViolationKind::VisibilityLost));
    let kind = armed.next_violation().await.unwrap();
    let outcome = svc
        .report_violation(&mut session, kind, &lock)
        .await
        .unwrap();
    assert!(matches!(outcome, SubmitOutcome::Submitted(_)));

    // Entering Submitted disarms everything; a late event goes nowhere.
    armed.disarm();
    assert!(!source.fire(ViolationKind::FocusLost));

    let results = backend.results_for(&exam_id).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status, TerminalStatus::Terminated);
    assert_eq!(results[0].score, 1);
}
