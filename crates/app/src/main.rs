use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, Offset, Utc};
use learn_core::analytics::{AnalyticsReport, TimeRange};
use learn_core::gamification::{GamificationEngine, GamificationEvent, LevelProgress};
use learn_core::model::content::{parse_flashcards, parse_questions};
use learn_core::model::{
    Difficulty, EventPayload, Flashcard, PracticeQuestion, ReviewOutcome, SessionHistory,
    SessionMetadata,
};
use learn_core::scheduler::Scheduler;
use serde::Serialize;
use services::{
    AnalyticsService, Clock, EventSink, FanoutSink, HttpSink, PracticeConfig, PracticeHooks,
    QuestionPool, Quiz, QuizOptions, RecordingSink, ReviewSession, SpeedDrill,
    TelemetryCollector, TelemetryConfig, TracingSink,
};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const DEMO_DECK: &str = r#"[
    {"id": 1, "front": "What does `&mut T` grant?", "back": "exclusive access", "topic": "borrowing", "difficulty": "beginner"},
    {"id": 2, "front": "Trait for cheap bitwise copies", "back": "Copy", "topic": "traits", "difficulty": 2},
    {"id": 3, "front": "Who frees a Box?", "back": "its owner on drop", "topic": "ownership", "difficulty": "easy"},
    {"id": 4, "front": "Elided lifetime of `fn f(x: &str) -> &str`", "back": "same as x", "topic": "lifetimes", "difficulty": "intermediate"},
    {"id": 5, "front": "Marker for thread-safe sharing", "back": "Sync", "topic": "traits", "difficulty": 3}
]"#;

const DEMO_QUESTIONS: &str = r#"[
    {"id": 1, "type": "free_text", "prompt": "7 * 8", "correctAnswer": "56", "topic": "arithmetic", "difficulty": 1},
    {"id": 2, "type": "free_text", "prompt": "12 * 12", "correctAnswer": "144", "topic": "arithmetic", "difficulty": 2},
    {"id": 3, "type": "true_false", "prompt": "0 is an even number", "correctAnswer": "true", "topic": "parity", "difficulty": 1},
    {"id": 4, "type": "multiple_choice", "prompt": "Square root of 81", "options": ["7", "8", "9"], "correctAnswer": "9", "topic": "roots", "difficulty": 3},
    {"id": 5, "type": "free_text", "prompt": "17 * 23", "correctAnswer": "391", "topic": "arithmetic", "difficulty": 4},
    {"id": 6, "type": "free_text", "prompt": "2 ^ 10", "correctAnswer": "1024", "topic": "powers", "difficulty": 5}
]"#;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidRange { raw: String },
    InvalidOffset { raw: String },
    InvalidRounds { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidRange { raw } => {
                write!(f, "invalid --range value: {raw} (expected 7d, 30d, 90d or all)")
            }
            ArgsError::InvalidOffset { raw } => {
                write!(f, "invalid --utc-offset-minutes value: {raw}")
            }
            ArgsError::InvalidRounds { raw } => write!(f, "invalid --rounds value: {raw}"),
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

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- [--range <7d|30d|90d|all>] [--rounds <n>]");
    eprintln!("                      [--deck <flashcards.json>] [--questions <questions.json>]");
    eprintln!("                      [--endpoint <url>] [--utc-offset-minutes <m>]");
    eprintln!();
    eprintln!("Runs a scripted review, speed drill and quiz per round, then prints the");
    eprintln!("analytics report and gamification state as JSON.");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  LEARN_TELEMETRY_BATCH_SIZE, LEARN_TELEMETRY_FLUSH_MS,");
    eprintln!("  LEARN_TELEMETRY_ENDPOINT, LEARN_TELEMETRY_TOKEN,");
    eprintln!("  LEARN_DRILL_SECONDS, LEARN_TARGET_RATE, RUST_LOG");
}

struct Args {
    range: TimeRange,
    rounds: u32,
    deck_path: Option<String>,
    questions_path: Option<String>,
    endpoint: Option<String>,
    offset: FixedOffset,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut parsed = Self {
            range: TimeRange::default(),
            rounds: 3,
            deck_path: None,
            questions_path: None,
            endpoint: None,
            offset: Utc.fix(),
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--range" => {
                    let value = require_value(args, "--range")?;
                    parsed.range = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidRange { raw: value.clone() })?;
                }
                "--rounds" => {
                    let value = require_value(args, "--rounds")?;
                    parsed.rounds = value
                        .parse()
                        .ok()
                        .filter(|rounds| *rounds > 0)
                        .ok_or_else(|| ArgsError::InvalidRounds { raw: value.clone() })?;
                }
                "--deck" => parsed.deck_path = Some(require_value(args, "--deck")?),
                "--questions" => parsed.questions_path = Some(require_value(args, "--questions")?),
                "--endpoint" => parsed.endpoint = Some(require_value(args, "--endpoint")?),
                "--utc-offset-minutes" => {
                    let value = require_value(args, "--utc-offset-minutes")?;
                    parsed.offset = value
                        .parse::<i32>()
                        .ok()
                        .and_then(|minutes| minutes.checked_mul(60))
                        .and_then(FixedOffset::east_opt)
                        .ok_or_else(|| ArgsError::InvalidOffset { raw: value.clone() })?;
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(parsed)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RunOutput {
    analytics: AnalyticsReport,
    level: LevelProgress,
    unlocked: Vec<String>,
    events_tracked: u64,
    events_delivered: u64,
}

fn load_content(path: Option<&str>, fallback: &str) -> String {
    match path {
        Some(path) => std::fs::read_to_string(path).unwrap_or_else(|err| {
            warn!(path, error = %err, "content file unreadable; using built-in content");
            fallback.to_owned()
        }),
        None => fallback.to_owned(),
    }
}

fn describe(event: &GamificationEvent) -> Option<String> {
    match event {
        GamificationEvent::LevelUp(up) => Some(format!("level {}: {}", up.new_level, up.new_title)),
        GamificationEvent::AchievementUnlocked(a) => {
            Some(format!("achievement: {}", a.definition.title))
        }
        GamificationEvent::BadgeUnlocked(badge) => Some(format!("badge: {}", badge.id.title())),
        GamificationEvent::XpAwarded { .. } | GamificationEvent::StreakExtended { .. } => None,
    }
}

/// Plays one round of scripted practice starting at `at`.
///
/// Answers are right most of the time with a deterministic miss pattern so
/// the adaptive controller moves both ways.
fn play_round(
    round: u32,
    at: DateTime<Utc>,
    deck: Vec<Flashcard>,
    questions: &[PracticeQuestion],
    practice: PracticeConfig,
    hooks: &PracticeHooks,
    history: &mut SessionHistory,
) -> Result<Vec<Flashcard>, Box<dyn std::error::Error>> {
    let clock = Clock::fixed(at);
    let mut now = at;

    let mut review =
        ReviewSession::start_at(deck, 10, Scheduler::new(), hooks.clone(), clock, now)?;
    let mut n = 0_u32;
    while review.current_card().is_some() {
        n += 1;
        now += Duration::seconds(8);
        let outcome = match (n + round) % 5 {
            0 => ReviewOutcome::Incorrect,
            3 if n < 4 => ReviewOutcome::Skip,
            _ => ReviewOutcome::Correct,
        };
        review.answer_at(outcome, now)?;
    }
    let (cards, session) = review.into_parts();
    history.append(session)?;

    now += Duration::minutes(1);
    let drill_start = now;
    let mut drill = SpeedDrill::start_at(
        practice,
        QuestionPool::new(questions.to_vec()),
        Difficulty::MIN,
        hooks.clone(),
        clock,
        drill_start,
    )?;
    let mut answered = 0_u32;
    loop {
        now += Duration::seconds(3 + i64::from(answered % 4));
        if drill.check_timeout_at(now).is_some() {
            break;
        }
        let Some(question) = drill.current_question() else {
            break;
        };
        answered += 1;
        let answer = if answered % 7 == 0 {
            "no idea".to_owned()
        } else {
            question.correct_answer().as_slice().first().cloned().unwrap_or_default()
        };
        drill.submit_at(&answer, now)?;
    }
    debug!(round, answered, "drill finished");
    history.append(drill.into_session())?;

    now += Duration::minutes(1);
    let options =
        QuizOptions::new(true, 0.25)?.with_time_limit(std::time::Duration::from_secs(600))?;
    let mut quiz = Quiz::start_at(questions.to_vec(), options, hooks.clone(), clock, now)?;
    let mut position = 0_u32;
    loop {
        now += Duration::seconds(15);
        if quiz.check_timeout_at(now).is_some() {
            break;
        }
        let Some(question) = quiz.current_question() else {
            break;
        };
        position += 1;
        let answer = if (position + round) % 4 == 0 {
            "wrong".to_owned()
        } else {
            question.correct_answer().as_slice().first().cloned().unwrap_or_default()
        };
        if position == 2 {
            quiz.use_hint()?;
        }
        quiz.submit_at(&answer, now)?;
    }
    history.append(quiz.into_session())?;

    Ok(cards)
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    if argv.iter().any(|arg| arg == "--help" || arg == "-h") {
        print_usage();
        return Ok(());
    }
    let args = Args::parse(&mut argv.into_iter()).map_err(|e| {
        print_usage();
        e
    })?;

    let mut telemetry_config = TelemetryConfig::from_env()?;
    if args.endpoint.is_some() {
        let token = telemetry_config.token().map(str::to_owned);
        telemetry_config = telemetry_config.with_endpoint(args.endpoint.clone(), token);
    }
    let practice_config = PracticeConfig::from_env()?;

    let recording = Arc::new(RecordingSink::new());
    let sink: Arc<dyn EventSink> = match HttpSink::from_config(&telemetry_config) {
        Some(http) => {
            info!(endpoint = http.endpoint(), "delivering telemetry over HTTP");
            Arc::new(http)
        }
        None => {
            info!("no telemetry endpoint configured; logging batches");
            Arc::new(TracingSink)
        }
    };
    // delivered events are replayed into gamification after the run
    let fanout: Arc<dyn EventSink> = Arc::new(
        FanoutSink::new(sink).with_mirror(Arc::clone(&recording) as Arc<dyn EventSink>),
    );

    let collector = TelemetryCollector::start(
        telemetry_config,
        fanout,
        SessionMetadata::new("demo-learner", Some("rust-fundamentals".into())),
        Clock::default(),
    );
    let hooks = PracticeHooks::new()
        .with_telemetry(collector.handle())
        .with_listener(|result| {
            info!(
                mode = result.mode().as_str(),
                score = result.score(),
                accuracy = result.accuracy(),
                "practice completed"
            );
        });

    let mut deck = parse_flashcards(&load_content(args.deck_path.as_deref(), DEMO_DECK));
    let questions = parse_questions(&load_content(args.questions_path.as_deref(), DEMO_QUESTIONS));
    if deck.is_empty() || questions.is_empty() {
        warn!(
            cards = deck.len(),
            questions = questions.len(),
            "content is empty; nothing to practice"
        );
        collector.shutdown().await?;
        return Ok(());
    }

    let now = Utc::now();
    let mut history = SessionHistory::new();
    // each round takes a few simulated minutes; the last one ends before `now`
    let first_day = now - Duration::hours(1) - Duration::days(i64::from(args.rounds - 1));
    for round in 0..args.rounds {
        let at = first_day + Duration::days(i64::from(round));
        collector.track_event(EventPayload::PageViewed {
            path: format!("/practice/day/{}", round + 1),
        });
        deck = play_round(round, at, deck, &questions, practice_config, &hooks, &mut history)?;
    }

    let report = AnalyticsService::new(args.range).report_history(&history, now, args.offset);

    let handle = collector.handle();
    if let Err(err) = collector.shutdown().await {
        warn!(error = %err, "final telemetry flush failed");
    }

    let mut engine = GamificationEngine::new();
    let mut unlocked = Vec::new();
    for session in history.iter() {
        unlocked.extend(engine.apply_session(session, &report, now).iter().filter_map(describe));
    }
    for event in recording.events() {
        unlocked.extend(engine.apply_event(&event, now).iter().filter_map(describe));
    }

    let output = RunOutput {
        analytics: report,
        level: engine.level_progress(),
        unlocked,
        events_tracked: handle.total_events_count(),
        events_delivered: handle.delivered_events_count(),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("app=info,services=info,learn_core=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
