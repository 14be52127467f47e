use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use letterloop_client::mock::{MockClient, ModelCall};
use letterloop_client::{ClientError, ModelMode};
use letterloop_core::{
    AnalysisPipeline, AnalysisSources, ErrorKind, LoopRunner, LoopSettings, RunOutcome, RunState,
};
use letterloop_critic::{Critic, CriticPrompts, RubricSpec, TotalStrategy, Verdict};
use letterloop_logging::{LogFormat, Logger, RunLine, RunLog};
use letterloop_store::{keys, ArtifactStore, SqliteStore};
use letterloop_writer::{AnalysisKind, CoverLetterWriter, WriterInputs, WriterPrompts};

const RULES: &str = "Keep it to one page. Mention one measurable result.";
const RUN: &str = "run-a";

fn scoped(name: &str) -> String {
    keys::run_scoped(RUN, name)
}

fn logger() -> Arc<Logger> {
    Arc::new(Logger::new(LogFormat::Compact))
}

fn inputs() -> WriterInputs {
    WriterInputs::new("Acme Corp: payments, Rust, Kafka.", "Jane: 8 years backend.")
        .with_rules(RULES)
}

fn full_scorecard(score: u32) -> String {
    (1..=20)
        .map(|i| {
            format!(
                "### {i}. Criterion {i}\n- Note: n\n- Justification: j\n- Score: {score}/5\n"
            )
        })
        .collect()
}

/// Scripted service: drafts are numbered, totals come from `totals` in order
fn scripted(totals: &[&str]) -> MockClient {
    let totals: Arc<Mutex<VecDeque<String>>> =
        Arc::new(Mutex::new(totals.iter().map(|t| t.to_string()).collect()));
    let drafts = AtomicUsize::new(0);
    let scorecards = AtomicUsize::new(0);

    MockClient::new(move |call: &ModelCall| {
        let system = call.system_instruction.as_deref().unwrap_or_default();
        if system == WriterPrompts::SYSTEM {
            let n = drafts.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("Cover letter draft {}", n))
        } else if system == CriticPrompts::RUBRIC_SYSTEM {
            Ok((1..=20).map(|i| format!("{}. Criterion {}\n", i, i)).collect())
        } else if system == CriticPrompts::SCORING_SYSTEM {
            let n = scorecards.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("Scorecard {}\n{}", n, full_scorecard(4)))
        } else if system == CriticPrompts::TOTAL_SYSTEM {
            totals
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| ClientError::Malformed("no scripted total left".into()))
        } else {
            Err(ClientError::InvalidRequest(format!("unexpected system instruction {:?}", system)))
        }
    })
}

fn calls_with(client: &MockClient, system: &str) -> Vec<ModelCall> {
    client
        .calls()
        .into_iter()
        .filter(|c| c.system_instruction.as_deref() == Some(system))
        .collect()
}

async fn run_loop(
    client: &MockClient,
    store: &SqliteStore,
    settings: LoopSettings,
    inputs: WriterInputs,
) -> RunOutcome {
    let runner = LoopRunner::new(
        CoverLetterWriter::new(client, store),
        Critic::new(client, store),
        settings,
        logger(),
    )
    .with_run_id(RUN);
    runner.run(RunState::new(inputs)).await
}

// ============================================================
// Refinement loop
// ============================================================

#[tokio::test]
async fn test_accepts_on_first_attempt() {
    let client = scripted(&["95"]);
    let store = SqliteStore::open_in_memory().unwrap();

    let outcome = run_loop(&client, &store, LoopSettings::default(), inputs()).await;

    match &outcome {
        RunOutcome::Accepted {
            attempts,
            total,
            draft_key,
            ..
        } => {
            assert_eq!(*attempts, 1);
            assert_eq!(*total, 95);
            assert_eq!(draft_key, "run=run-a/draft@attempt=1");
        }
        other => panic!("expected accepted, got {:?}", other),
    }
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(outcome.history().len(), 1);

    // The writer runs before any critic call
    let calls = client.calls();
    assert_eq!(calls[0].system_instruction.as_deref(), Some(WriterPrompts::SYSTEM));
    assert_eq!(calls.len(), 4);

    assert_eq!(
        store.get(&scoped("draft@attempt=1")).unwrap().as_deref(),
        Some("Cover letter draft 1")
    );
    assert!(store.exists(&scoped(keys::RUBRIC)).unwrap());
    assert!(store.exists(&scoped("scorecard@attempt=1")).unwrap());
}

#[tokio::test]
async fn test_threshold_boundary() {
    let client = scripted(&["89", "90"]);
    let store = SqliteStore::open_in_memory().unwrap();

    let outcome = run_loop(&client, &store, LoopSettings::default(), inputs()).await;

    assert!(outcome.is_accepted());
    assert_eq!(outcome.attempts(), 2);
    assert_eq!(outcome.history()[0].verdict, Verdict::Revise);
    assert_eq!(outcome.history()[1].verdict, Verdict::Accept);
}

#[tokio::test]
async fn test_revision_uses_prior_draft_and_scorecard() {
    let client = scripted(&["82", "70", "93"]);
    let store = SqliteStore::open_in_memory().unwrap();

    let outcome = run_loop(&client, &store, LoopSettings::default(), inputs()).await;

    assert!(outcome.is_accepted());
    assert_eq!(outcome.attempts(), 3);

    let writer_calls = calls_with(&client, WriterPrompts::SYSTEM);
    assert_eq!(writer_calls.len(), 3);
    assert!(!writer_calls[0].prompt.contains("[Previous draft]"));

    let first_scorecard = store.get(&scoped("scorecard@attempt=1")).unwrap().unwrap();
    assert!(writer_calls[1].prompt.contains("Cover letter draft 1"));
    assert!(writer_calls[1].prompt.contains(&first_scorecard));

    // Attempt 3 sees attempt 2's artifacts, not attempt 1's
    let second_scorecard = store.get(&scoped("scorecard@attempt=2")).unwrap().unwrap();
    assert!(writer_calls[2].prompt.contains("Cover letter draft 2"));
    assert!(writer_calls[2].prompt.contains(&second_scorecard));
    assert!(!writer_calls[2].prompt.contains("Cover letter draft 1"));

    // Rubric is derived once per run
    assert_eq!(calls_with(&client, CriticPrompts::RUBRIC_SYSTEM).len(), 1);

    // Each attempt has its own key; latest points at the accepted one
    for attempt in 1..=3 {
        assert!(store.exists(&scoped(&keys::attempt(keys::DRAFT, attempt))).unwrap());
    }
    let latest = store.get_artifact("draft@latest").unwrap().unwrap();
    assert_eq!(latest.content, "Cover letter draft 3");
    assert_eq!(latest.attempt_index, 3);
}

#[tokio::test]
async fn test_unparseable_total_is_fatal_indeterminate() {
    let client = scripted(&["점수를 산출할 수 없습니다"]);
    let store = SqliteStore::open_in_memory().unwrap();

    let outcome = run_loop(&client, &store, LoopSettings::default(), inputs()).await;

    match &outcome {
        RunOutcome::Fatal {
            attempts,
            kind,
            verdict,
            ..
        } => {
            assert_eq!(*attempts, 1);
            assert_eq!(*kind, ErrorKind::Parse);
            assert_eq!(*verdict, Some(Verdict::Indeterminate));
        }
        other => panic!("expected fatal, got {:?}", other),
    }
    assert_eq!(outcome.exit_code(), 2);
    assert_eq!(outcome.history()[0].verdict, Verdict::Indeterminate);
}

#[tokio::test]
async fn test_writer_failure_is_fatal_before_critic() {
    let client = MockClient::failing(ClientError::Rejected("API key not valid".into()));
    let store = SqliteStore::open_in_memory().unwrap();

    let outcome = run_loop(&client, &store, LoopSettings::default(), inputs()).await;

    match &outcome {
        RunOutcome::Fatal { kind, verdict, .. } => {
            assert_eq!(*kind, ErrorKind::PermanentService);
            assert!(verdict.is_none());
        }
        other => panic!("expected fatal, got {:?}", other),
    }
    assert_eq!(client.call_count(), 1);
    assert!(!store.exists(&scoped(keys::RUBRIC)).unwrap());
}

#[tokio::test]
async fn test_missing_applicant_analysis_is_fatal_without_calls() {
    let client = scripted(&[]);
    let store = SqliteStore::open_in_memory().unwrap();
    let inputs = WriterInputs {
        company_analysis: Some("Acme".into()),
        rules: Some(RULES.into()),
        ..Default::default()
    };

    let outcome = run_loop(&client, &store, LoopSettings::default(), inputs).await;

    assert!(matches!(
        outcome,
        RunOutcome::Fatal {
            kind: ErrorKind::InputIncomplete,
            ..
        }
    ));
    assert_eq!(client.call_count(), 0);
}

#[tokio::test]
async fn test_missing_rules_is_fatal_config() {
    let client = scripted(&[]);
    let store = SqliteStore::open_in_memory().unwrap();
    let inputs = WriterInputs::new("Acme", "Jane");

    let outcome = run_loop(&client, &store, LoopSettings::default(), inputs).await;

    assert!(matches!(
        outcome,
        RunOutcome::Fatal {
            kind: ErrorKind::Config,
            ..
        }
    ));
    assert_eq!(client.call_count(), 0);
}

#[tokio::test]
async fn test_unreachable_threshold_is_fatal_config() {
    let client = scripted(&["50"]);
    let store = SqliteStore::open_in_memory().unwrap();
    // 10 criteria x 5 points can never reach the default threshold of 90
    let runner = LoopRunner::new(
        CoverLetterWriter::new(&client, &store),
        Critic::new(&client, &store).with_spec(RubricSpec {
            criteria: 10,
            weight: 5,
        }),
        LoopSettings::default(),
        logger(),
    );

    let outcome = runner.run(RunState::new(inputs())).await;

    match &outcome {
        RunOutcome::Fatal { kind, reason, .. } => {
            assert_eq!(*kind, ErrorKind::Config);
            assert!(reason.contains("exceeds the rubric maximum of 50"));
        }
        other => panic!("expected fatal, got {:?}", other),
    }
    assert_eq!(outcome.exit_code(), 2);
    assert_eq!(client.call_count(), 0);
}

#[tokio::test]
async fn test_zero_weight_rubric_is_fatal_config() {
    let client = scripted(&[]);
    let store = SqliteStore::open_in_memory().unwrap();
    let runner = LoopRunner::new(
        CoverLetterWriter::new(&client, &store),
        Critic::new(&client, &store).with_spec(RubricSpec {
            criteria: 20,
            weight: 0,
        }),
        LoopSettings::default().with_threshold(0),
        logger(),
    );

    let outcome = runner.run(RunState::new(inputs())).await;

    assert!(matches!(
        outcome,
        RunOutcome::Fatal {
            kind: ErrorKind::Config,
            ..
        }
    ));
    assert_eq!(client.call_count(), 0);
}

#[tokio::test]
async fn test_rubric_derived_after_first_draft_is_stored() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let seen: Arc<Mutex<Option<(bool, bool, bool)>>> = Arc::new(Mutex::new(None));

    let observer = store.clone();
    let observed = seen.clone();
    let client = MockClient::new(move |call: &ModelCall| {
        let system = call.system_instruction.as_deref().unwrap_or_default();
        if system == WriterPrompts::SYSTEM {
            Ok("Cover letter draft".to_string())
        } else if system == CriticPrompts::RUBRIC_SYSTEM {
            let first = observer.exists(&scoped("draft@attempt=1")).unwrap();
            let latest = observer.exists("draft@latest").unwrap();
            let second = observer.exists(&scoped("draft@attempt=2")).unwrap();
            *observed.lock().unwrap() = Some((first, latest, second));
            Ok((1..=20).map(|i| format!("{}. Criterion {}\n", i, i)).collect())
        } else if system == CriticPrompts::SCORING_SYSTEM {
            Ok(full_scorecard(5))
        } else {
            Ok("95".to_string())
        }
    });

    let outcome = run_loop(&client, &store, LoopSettings::default(), inputs()).await;

    assert!(outcome.is_accepted());
    assert_eq!(*seen.lock().unwrap(), Some((true, true, false)));
}

#[tokio::test]
async fn test_two_runs_share_a_store_without_overwriting() {
    let store = SqliteStore::open_in_memory().unwrap();

    let first = scripted(&["50", "60", "95"]);
    let outcome = run_loop(&first, &store, LoopSettings::default(), inputs()).await;
    assert!(outcome.is_accepted());
    assert_eq!(outcome.attempts(), 3);

    let second = MockClient::new(|call: &ModelCall| {
        let system = call.system_instruction.as_deref().unwrap_or_default();
        if system == WriterPrompts::SYSTEM {
            Ok("Second run draft".to_string())
        } else if system == CriticPrompts::RUBRIC_SYSTEM {
            Ok((1..=20).map(|i| format!("{}. Criterion {}\n", i, i)).collect())
        } else if system == CriticPrompts::SCORING_SYSTEM {
            Ok(full_scorecard(5))
        } else {
            Ok("95".to_string())
        }
    });
    let runner = LoopRunner::new(
        CoverLetterWriter::new(&second, &store),
        Critic::new(&second, &store),
        LoopSettings::default(),
        logger(),
    )
    .with_run_id("run-b");
    let outcome = runner.run(RunState::new(inputs())).await;

    match &outcome {
        RunOutcome::Accepted { draft_key, .. } => {
            assert_eq!(draft_key, "run=run-b/draft@attempt=1");
        }
        other => panic!("expected accepted, got {:?}", other),
    }

    // The first run's history is untouched
    assert_eq!(
        store.get(&scoped("draft@attempt=1")).unwrap().as_deref(),
        Some("Cover letter draft 1")
    );
    assert_eq!(
        store.get(&scoped("draft@attempt=3")).unwrap().as_deref(),
        Some("Cover letter draft 3")
    );
    assert_eq!(store.list(&keys::run_prefix(RUN)).unwrap().len(), 7);
    assert_eq!(
        store.get("run=run-b/draft@attempt=1").unwrap().as_deref(),
        Some("Second run draft")
    );
    assert_eq!(
        store.get("draft@latest").unwrap().as_deref(),
        Some("Second run draft")
    );
}

#[test]
fn test_runner_generates_distinct_run_ids() {
    let client = scripted(&[]);
    let store = SqliteStore::open_in_memory().unwrap();
    let build = || {
        LoopRunner::new(
            CoverLetterWriter::new(&client, &store),
            Critic::new(&client, &store),
            LoopSettings::default(),
            logger(),
        )
    };

    let (a, b) = (build(), build());
    assert!(!a.run_id().is_empty());
    assert_ne!(a.run_id(), b.run_id());
}

#[tokio::test]
async fn test_max_attempts_reached() {
    let client = scripted(&["50", "60", "70"]);
    let store = SqliteStore::open_in_memory().unwrap();
    let settings = LoopSettings::default().with_max_attempts(2);

    let outcome = run_loop(&client, &store, settings, inputs()).await;

    match &outcome {
        RunOutcome::MaxAttemptsReached {
            attempts,
            best_total,
            ..
        } => {
            assert_eq!(*attempts, 2);
            assert_eq!(*best_total, Some(60));
        }
        other => panic!("expected max attempts, got {:?}", other),
    }
    assert_eq!(outcome.exit_code(), 1);
    assert_eq!(calls_with(&client, WriterPrompts::SYSTEM).len(), 2);
}

#[tokio::test]
async fn test_stalled_when_total_stops_improving() {
    let client = scripted(&["70", "75", "75", "74"]);
    let store = SqliteStore::open_in_memory().unwrap();
    let settings = LoopSettings::default().with_stall_limit(2);

    let outcome = run_loop(&client, &store, settings, inputs()).await;

    match &outcome {
        RunOutcome::Stalled {
            attempts,
            best_total,
            ..
        } => {
            assert_eq!(*attempts, 4);
            assert_eq!(*best_total, Some(75));
        }
        other => panic!("expected stalled, got {:?}", other),
    }
}

#[tokio::test]
async fn test_interrupted_before_first_attempt() {
    let client = scripted(&["95"]);
    let store = SqliteStore::open_in_memory().unwrap();
    let runner = LoopRunner::new(
        CoverLetterWriter::new(&client, &store),
        Critic::new(&client, &store),
        LoopSettings::default(),
        logger(),
    );
    runner.interrupt_handle().store(true, Ordering::SeqCst);

    let outcome = runner.run(RunState::new(inputs())).await;

    assert!(matches!(outcome, RunOutcome::Interrupted { attempts: 0, .. }));
    assert_eq!(outcome.exit_code(), 130);
    assert_eq!(client.call_count(), 0);
}

#[tokio::test]
async fn test_local_totals_skip_lite_call() {
    let client = scripted(&[]);
    let store = SqliteStore::open_in_memory().unwrap();
    let runner = LoopRunner::new(
        CoverLetterWriter::new(&client, &store),
        Critic::new(&client, &store).with_strategy(TotalStrategy::Local),
        LoopSettings::default().with_threshold(80),
        logger(),
    );

    let outcome = runner.run(RunState::new(inputs())).await;

    // 20 criteria at 4/5
    assert!(matches!(outcome, RunOutcome::Accepted { total: 80, .. }));
    assert!(client.calls().iter().all(|c| c.mode == ModelMode::Full));
}

#[tokio::test]
async fn test_run_log_transcript() {
    let dir = tempfile::tempdir().unwrap();
    let run_log = Arc::new(RunLog::in_dir(dir.path(), "acme").unwrap());
    let client = scripted(&["80", "92"]);
    let store = SqliteStore::open_in_memory().unwrap();
    let runner = LoopRunner::new(
        CoverLetterWriter::new(&client, &store),
        Critic::new(&client, &store),
        LoopSettings::default(),
        logger(),
    )
    .with_run_id(RUN)
    .with_run_log(run_log.clone());

    runner.run(RunState::new(inputs())).await;

    let lines: Vec<RunLine> = std::fs::read_to_string(run_log.path())
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 3);
    match &lines[1] {
        RunLine::Attempt {
            attempt: 2,
            total: Some(92),
            draft_key,
            ..
        } => assert_eq!(draft_key, "run=run-a/draft@attempt=2"),
        other => panic!("expected attempt 2, got {:?}", other),
    }
    assert!(matches!(
        &lines[2],
        RunLine::RunEnd { attempts: 2, final_total: Some(92), .. }
    ));
}

// ============================================================
// Analysis pipeline
// ============================================================

#[tokio::test]
async fn test_pipeline_runs_given_sources_in_order() {
    let client = MockClient::new(|call: &ModelCall| Ok(format!("report for: {}", call.prompt.len())));
    let store = SqliteStore::open_in_memory().unwrap();
    let pipeline = AnalysisPipeline::new(&client, &store, logger());
    let sources = AnalysisSources {
        job_posting: "Backend engineer at Acme".into(),
        resume: Some("Jane, 8 years".into()),
        portfolio: None,
    };

    let report = pipeline.run(&sources).await.unwrap();

    assert_eq!(
        report.completed,
        vec![AnalysisKind::Company, AnalysisKind::Applicant]
    );
    assert_eq!(
        store.get(keys::JOB_POSTING).unwrap().as_deref(),
        Some("Backend engineer at Acme")
    );
    assert!(store.exists(keys::COMPANY_ANALYSIS).unwrap());
    assert!(store.exists(keys::APPLICANT_ANALYSIS).unwrap());
    assert!(!store.exists(keys::PROJECT_ANALYSIS).unwrap());
    assert!(client.calls()[0].prompt.contains("Backend engineer at Acme"));

    let run_prefix = keys::run_prefix(pipeline.run_id());
    let recorded: Vec<String> = store
        .list(&run_prefix)
        .unwrap()
        .into_iter()
        .map(|a| a.name)
        .collect();
    assert_eq!(recorded.len(), 3);
    assert!(recorded.contains(&keys::run_scoped(pipeline.run_id(), keys::JOB_POSTING)));
}

#[tokio::test]
async fn test_pipeline_skipped_step_keeps_earlier_analysis() {
    let client = MockClient::new(|call: &ModelCall| Ok(format!("report of {} chars", call.prompt.len())));
    let store = SqliteStore::open_in_memory().unwrap();

    let first = AnalysisSources {
        job_posting: "Backend engineer at Acme".into(),
        resume: Some("Jane, 8 years".into()),
        portfolio: Some("payments ledger".into()),
    };
    AnalysisPipeline::new(&client, &store, logger())
        .with_run_id("analyze-1")
        .run(&first)
        .await
        .unwrap();
    let project = store.get(keys::PROJECT_ANALYSIS).unwrap().unwrap();

    let second = AnalysisSources {
        job_posting: "Platform engineer at Initech".into(),
        resume: Some("Jane, 9 years".into()),
        portfolio: None,
    };
    let report = AnalysisPipeline::new(&client, &store, logger())
        .with_run_id("analyze-2")
        .run(&second)
        .await
        .unwrap();

    assert_eq!(
        report.completed,
        vec![AnalysisKind::Company, AnalysisKind::Applicant]
    );
    assert_eq!(
        store.get(keys::JOB_POSTING).unwrap().as_deref(),
        Some("Platform engineer at Initech")
    );
    assert_eq!(store.get(keys::PROJECT_ANALYSIS).unwrap(), Some(project));
    assert!(!store
        .exists(&keys::run_scoped("analyze-2", keys::PROJECT_ANALYSIS))
        .unwrap());
    assert_eq!(
        store
            .get(&keys::run_scoped("analyze-1", keys::JOB_POSTING))
            .unwrap()
            .as_deref(),
        Some("Backend engineer at Acme")
    );
}

#[tokio::test]
async fn test_pipeline_stops_at_first_failure() {
    let client = MockClient::failing(ClientError::RetriesExhausted {
        attempts: 5,
        last: "429".into(),
    });
    let store = SqliteStore::open_in_memory().unwrap();
    let pipeline = AnalysisPipeline::new(&client, &store, logger());
    let sources = AnalysisSources {
        job_posting: "posting".into(),
        resume: Some("resume".into()),
        portfolio: Some("portfolio".into()),
    };

    let err = pipeline.run(&sources).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Service);
    assert_eq!(client.call_count(), 1);
}
