use std::fmt;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::time::{Duration, MissedTickBehavior, interval};

use exam_core::Clock;
use exam_core::model::{
    ExamId, Question, StudentName, TerminalStatus, ViolationKind,
};
use services::proctor::AlwaysGranted;
use services::{
    ExamHttpClient, ExamServiceConfig, ExamSession, IntegritySource, MonitorSet, ProctorError,
    ProctorService, SourceGuard, SubmitOutcome, TickOutcome, ViolationSender,
};
use storage::repository::{ExamApi, ExamRecord, InMemoryExamService};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

struct Args {
    name: Option<String>,
    exam_id: Option<String>,
    base_url: Option<String>,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut name = None;
        let mut exam_id = None;
        let mut base_url = ExamServiceConfig::from_env().map(|c| c.base_url);

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--name" => name = Some(require_value(args, "--name")?),
                "--exam-id" => exam_id = Some(require_value(args, "--exam-id")?),
                "--base-url" => base_url = Some(require_value(args, "--base-url")?),
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            name,
            exam_id,
            base_url,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p exam-app -- [--name <student>] [--exam-id <id>] [--base-url <url>]");
    eprintln!();
    eprintln!("Without --base-url (or EXAM_API_BASE_URL) a built-in demo exam");
    eprintln!("with id DEMO01 is served in-process.");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  EXAM_API_BASE_URL   remote exam service to talk to");
    eprintln!("  RUST_LOG            log filter (default: info)");
}

/// Terminal analog of the browser's focus/visibility hooks: a Unix signal
/// stream forwarded as a violation while armed.
#[cfg(unix)]
struct SignalSource {
    label: &'static str,
    signal: tokio::signal::unix::SignalKind,
    violation: ViolationKind,
}

#[cfg(unix)]
impl IntegritySource for SignalSource {
    fn name(&self) -> &'static str {
        self.label
    }

    fn arm(&self, tx: ViolationSender) -> SourceGuard {
        let violation = self.violation;
        match tokio::signal::unix::signal(self.signal) {
            Ok(mut stream) => SourceGuard::from_task(tokio::spawn(async move {
                while stream.recv().await.is_some() {
                    if tx.send(violation).is_err() {
                        break;
                    }
                }
            })),
            Err(_) => SourceGuard::noop(),
        }
    }
}

fn build_monitors() -> MonitorSet {
    let mut monitors = MonitorSet::new();
    #[cfg(unix)]
    {
        use tokio::signal::unix::SignalKind;
        monitors.register(Arc::new(SignalSource {
            label: "terminal-hangup",
            signal: SignalKind::hangup(),
            violation: ViolationKind::VisibilityLost,
        }));
        monitors.register(Arc::new(SignalSource {
            label: "window-resize",
            signal: SignalKind::window_change(),
            violation: ViolationKind::FullscreenExited,
        }));
    }
    monitors
}

fn seed_demo_exam(service: &InMemoryExamService) -> ExamId {
    let id = ExamId::new("DEMO01").expect("demo id is valid");
    let questions = vec![
        Question::new(
            0,
            "Which keyword declares an immutable binding in Rust?",
            vec!["let".into(), "mut".into(), "const fn".into(), "static mut".into()],
        ),
        Question::new(
            1,
            "What does the ? operator do on a Result?",
            vec![
                "Panics on Err".into(),
                "Propagates the Err to the caller".into(),
                "Silently ignores the Err".into(),
                "Converts the Err to None".into(),
            ],
        ),
        Question::new(
            2,
            "Which type owns a heap-allocated string?",
            vec!["&str".into(), "String".into(), "char".into(), "str".into()],
        ),
    ];
    let questions = questions
        .into_iter()
        .collect::<Result<Vec<_>, _>>()
        .expect("demo questions are valid");
    let record = ExamRecord::new(
        id.clone(),
        "Rust Fundamentals",
        questions,
        vec![
            "let".into(),
            "Propagates the Err to the caller".into(),
            "String".into(),
        ],
        "examiner@example.com",
        Clock::default().now(),
    )
    .expect("demo exam is valid");
    service
        .publish_exam(record)
        .expect("demo exam id is unused");
    id
}

async fn prompt(lines: &mut Lines<BufReader<Stdin>>, message: &str) -> Option<String> {
    println!("{message}");
    lines.next_line().await.ok().flatten()
}

fn print_question(session: &ExamSession) {
    let index = session.current_index();
    let Some(question) = session.exam().question(index) else {
        return;
    };
    println!();
    println!(
        "Question {} of {}: {}",
        index + 1,
        session.exam().question_count(),
        question.text()
    );
    for (i, option) in question.options().iter().enumerate() {
        let marker = if session.answer(index) == Some(option.as_str()) {
            "*"
        } else {
            " "
        };
        println!("  [{}]{} {}", i + 1, marker, option);
    }
    println!("(a <n> answer, n next, p previous, status, submit, quit)");
}

fn print_security_banner(session: &ExamSession) {
    println!();
    println!("== {} ==", session.exam().title());
    println!(
        "{} questions, {} minutes.",
        session.exam().question_count(),
        session.time_remaining_secs() / 60
    );
    println!();
    println!("Security protocol:");
    println!("  - The exam runs in an exclusive session.");
    println!("  - Do not close or resize the terminal window.");
    println!("  - Any violation terminates the exam immediately.");
}

fn print_result(session: &ExamSession) {
    println!();
    match session.phase() {
        services::SessionPhase::Submitted(TerminalStatus::Terminated) => {
            let reason = session
                .violation()
                .map_or_else(|| "integrity violation".to_owned(), |k| k.to_string());
            println!("Exam terminated: {reason}.");
            println!("Your attempted answers have been submitted.");
        }
        _ => println!("Exam completed. Your responses have been submitted."),
    }
    if let Some(receipt) = session.receipt() {
        println!("Final score: {} / {}", receipt.score, receipt.total_marks);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);
    let args = Args::parse(&mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let clock = Clock::default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let (api, demo_id) = match &args.base_url {
        Some(url) => {
            let client = ExamHttpClient::new(ExamServiceConfig::new(url.clone()));
            let api = ExamApi {
                exams: Arc::new(client.clone()),
                submissions: Arc::new(client),
            };
            (api, None)
        }
        None => {
            let service = InMemoryExamService::new(clock);
            let id = seed_demo_exam(&service);
            println!("No exam service configured; serving demo exam {id} in-process.");
            (ExamApi::in_memory(service), Some(id))
        }
    };
    let proctor = ProctorService::new(clock, api.exams, api.submissions);

    let student = loop {
        let raw = match &args.name {
            Some(name) => name.clone(),
            None => match prompt(&mut lines, "Full name:").await {
                Some(raw) => raw,
                None => return Ok(()),
            },
        };
        match StudentName::new(&raw) {
            Ok(name) => break name,
            Err(e) => {
                if args.name.is_some() {
                    return Err(e.into());
                }
                println!("{e}");
            }
        }
    };

    let mut session = loop {
        let raw = match (&args.exam_id, &demo_id) {
            (Some(id), _) => id.clone(),
            (None, Some(demo)) => demo.to_string(),
            (None, None) => match prompt(&mut lines, "Exam ID:").await {
                Some(raw) => raw,
                None => return Ok(()),
            },
        };
        let exam_id = match ExamId::new(&raw) {
            Ok(id) => id,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };
        match proctor.join_exam(student.clone(), &exam_id).await {
            Ok(session) => break session,
            Err(ProctorError::ExamNotFound { .. }) if args.exam_id.is_none() && demo_id.is_none() => {
                println!("Exam not found. Please check the ID.");
            }
            Err(e) => return Err(e.into()),
        }
    };

    print_security_banner(&session);
    prompt(&mut lines, "Press Enter to enter secure mode and start.").await;

    // The terminal already owns the screen; nothing to acquire here.
    let lock = AlwaysGranted;
    proctor.start_session(&mut session, &lock).await?;

    let monitors = build_monitors();
    let mut armed = monitors.arm();

    let mut ticker = interval(Duration::from_secs(1));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first interval tick completes immediately; swallow it.
    ticker.tick().await;

    print_question(&session);

    while !session.is_submitted() {
        tokio::select! {
            _ = ticker.tick() => {
                match proctor.tick(&mut session, &lock).await {
                    Ok(TickOutcome::Running(secs)) if secs > 0 && secs % 300 == 0 => {
                        println!("{} minutes remaining.", secs / 60);
                    }
                    Ok(TickOutcome::Expired) => println!("Time is up."),
                    Ok(_) => {}
                    Err(e) => println!("{e}; type `submit` to retry."),
                }
            }
            Some(kind) = armed.next_violation() => {
                println!("Integrity violation: {kind}.");
                if let Err(e) = proctor.report_violation(&mut session, kind, &lock).await {
                    println!("{e}; type `submit` to retry.");
                }
            }
            line = lines.next_line() => {
                let Ok(Some(input)) = line else { break };
                let input = input.trim();
                match input.split_once(' ') {
                    Some(("a", rest)) => answer_current(&mut session, rest),
                    None if input == "n" => {
                        session.navigate(1);
                        print_question(&session);
                    }
                    None if input == "p" => {
                        session.navigate(-1);
                        print_question(&session);
                    }
                    None if input == "status" => {
                        let p = session.progress();
                        println!(
                            "{} of {} answered, {}s remaining.",
                            p.answered, p.total_questions, p.time_remaining_secs
                        );
                    }
                    None if input == "submit" => {
                        let confirmed =
                            prompt(&mut lines, "Submit the exam? (yes/no)").await;
                        if confirmed.as_deref().map(str::trim) == Some("yes") {
                            match proctor
                                .submit(&mut session, TerminalStatus::Completed, &lock)
                                .await
                            {
                                Ok(SubmitOutcome::Submitted(_) | SubmitOutcome::AlreadySubmitted) => {}
                                Err(e) => println!("{e}; type `submit` to retry."),
                            }
                        }
                    }
                    None if input == "quit" => {
                        // Deterrent only, like the browser's leave-page prompt.
                        let confirmed = prompt(
                            &mut lines,
                            "Leaving forfeits this attempt without a score. Type yes to leave.",
                        )
                        .await;
                        if confirmed.as_deref().map(str::trim) == Some("yes") {
                            println!("Attempt abandoned.");
                            armed.disarm();
                            return Ok(());
                        }
                    }
                    None if input.is_empty() => {}
                    _ => println!("Unknown command: {input}"),
                }
            }
        }
    }

    armed.disarm();
    if session.is_submitted() {
        print_result(&session);
    } else {
        println!("Input closed; attempt abandoned.");
    }
    Ok(())
}

fn answer_current(session: &mut ExamSession, rest: &str) {
    let index = session.current_index();
    let Some(question) = session.exam().question(index) else {
        return;
    };
    let Some(choice) = rest
        .trim()
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|n| question.options().get(n))
    else {
        println!("Pick an option between 1 and {}.", question.options().len());
        return;
    };
    let choice = choice.clone();
    match session.select_answer(index, choice) {
        Ok(()) => print_question(session),
        Err(e) => println!("{e}"),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
