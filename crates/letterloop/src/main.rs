use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;

use letterloop_client::ResilientClient;
use letterloop_core::{AnalysisPipeline, AnalysisSources, LoopRunner, RunOutcome, RunState};
use letterloop_critic::{Critic, TotalStrategy};
use letterloop_logging::{init_tracing, LogFormat, Logger, RunLog};
use letterloop_store::{keys, ArtifactStore, SqliteStore};
use letterloop_writer::{CoverLetterWriter, WriterInputs};

mod config;
mod credentials;
mod init;

use config::ProjectConfig;
use credentials::CredentialSources;

#[derive(Parser, Debug)]
#[command(
    name = "letterloop",
    about = "Draft a cover letter and grade it until it clears the bar",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Working directory (default: current directory)
    #[arg(short = 'd', long, global = true)]
    working_dir: Option<PathBuf>,

    /// Model to use (overrides key file, env and config)
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Credentials file holding `API_KEY,MODEL` (default: ./API_KEY.txt)
    #[arg(long, global = true)]
    key_file: Option<PathBuf>,

    /// Artifact database (default: per-user data directory)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value = "pretty", global = true)]
    log_format: LogFormatChoice,

    /// Tracing level when RUST_LOG is unset
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    /// Output final result as JSON
    #[arg(long, global = true)]
    json_output: bool,

    /// Dry run: show what would happen without executing
    #[arg(long, global = true)]
    dry_run: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze the job posting, resume and portfolio
    Analyze {
        /// Job posting as a text file
        #[arg(long)]
        job_posting: PathBuf,

        /// Resume as a text file
        #[arg(long)]
        resume: Option<PathBuf>,

        /// Portfolio as a text file
        #[arg(long)]
        portfolio: Option<PathBuf>,
    },
    /// Draft and grade the cover letter until it is accepted
    Write {
        /// Maximum attempts (default: unlimited)
        #[arg(short = 'n', long)]
        max_attempts: Option<usize>,

        /// Minimum total score to accept
        #[arg(long)]
        threshold: Option<u32>,

        /// Stop after this many attempts without a better score
        #[arg(long)]
        stall_limit: Option<usize>,

        /// How the total score is computed
        #[arg(long, value_enum)]
        total_strategy: Option<StrategyChoice>,

        /// Rules document (default: ./Rules.txt)
        #[arg(long)]
        rules: Option<PathBuf>,

        /// Write the accepted letter to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Inspect stored artifacts
    Artifacts {
        #[command(subcommand)]
        action: ArtifactAction,
    },
    /// Create API_KEY.txt, letterloop.toml and Rules.txt interactively
    Init,
}

#[derive(Subcommand, Debug)]
enum ArtifactAction {
    /// List artifacts, optionally by name prefix
    List { prefix: Option<String> },
    /// Print one artifact
    Show { name: String },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatChoice {
    Pretty,
    Json,
    Compact,
}

impl From<LogFormatChoice> for LogFormat {
    fn from(choice: LogFormatChoice) -> Self {
        match choice {
            LogFormatChoice::Pretty => LogFormat::Pretty,
            LogFormatChoice::Json => LogFormat::Json,
            LogFormatChoice::Compact => LogFormat::Compact,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StrategyChoice {
    Model,
    Local,
}

impl From<StrategyChoice> for TotalStrategy {
    fn from(choice: StrategyChoice) -> Self {
        match choice {
            StrategyChoice::Model => TotalStrategy::Model,
            StrategyChoice::Local => TotalStrategy::Local,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let working_dir = match cli.working_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    if let Command::Init = cli.command {
        return init::handle_init(&working_dir);
    }

    let config = ProjectConfig::load(&working_dir)?.unwrap_or_default();

    let log_format: LogFormat = cli.log_format.into();
    let log_file = config.log_file_path(&working_dir);
    let guard = init_tracing(&cli.log_level, log_format, log_file.as_deref())
        .context("Failed to initialize logging")?;

    let exit_code = match &cli.command {
        Command::Analyze {
            job_posting,
            resume,
            portfolio,
        } => {
            let sources = AnalysisSources {
                job_posting: read_document(&working_dir, job_posting)?,
                resume: resume
                    .as_deref()
                    .map(|p| read_document(&working_dir, p))
                    .transpose()?,
                portfolio: portfolio
                    .as_deref()
                    .map(|p| read_document(&working_dir, p))
                    .transpose()?,
            };
            handle_analyze(&cli, &config, &working_dir, sources)
                .await
                .map(|()| 0)
        }
        Command::Write { .. } => handle_write(&cli, &config, &working_dir).await,
        Command::Artifacts { action } => {
            let store = open_store(&cli, &config, &working_dir)?;
            handle_artifacts(&store, action, cli.json_output).map(|()| 0)
        }
        Command::Init => Ok(0),
    }?;

    // process::exit skips destructors; flush the log file writer first
    drop(guard);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}

async fn handle_analyze(
    cli: &Cli,
    config: &ProjectConfig,
    working_dir: &Path,
    sources: AnalysisSources,
) -> Result<()> {
    if cli.dry_run {
        println!("=== Dry Run ===");
        println!("Job posting: {} chars", sources.job_posting.chars().count());
        println!("Resume: {}", describe(sources.resume.as_deref()));
        println!("Portfolio: {}", describe(sources.portfolio.as_deref()));
        return Ok(());
    }

    let store = open_store(cli, config, working_dir)?;
    let client = build_client(cli, config, working_dir)?;
    let logger = build_logger(cli, config, working_dir)?;

    let pipeline = AnalysisPipeline::new(&client, &store, logger);
    tracing::info!(run_id = pipeline.run_id(), "Analysis started");
    let report = pipeline
        .run(&sources)
        .await
        .context("Analysis failed")?;

    if cli.json_output {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        eprintln!();
        eprintln!("=== ANALYZED ===");
        for kind in &report.completed {
            eprintln!("  {} {}", "✓".bright_green(), kind.artifact_key());
        }
    }
    Ok(())
}

/// Returns the process exit code for the run outcome
async fn handle_write(cli: &Cli, config: &ProjectConfig, working_dir: &Path) -> Result<i32> {
    let Command::Write {
        max_attempts,
        threshold,
        stall_limit,
        total_strategy,
        rules,
        output,
    } = &cli.command
    else {
        anyhow::bail!("write called for a different command");
    };

    let settings = config.loop_settings(*max_attempts, *threshold, *stall_limit);
    let strategy = config.total_strategy(total_strategy.map(Into::into));
    let spec = config.rubric_spec();

    let rules_path = config.rules_path(working_dir, rules.as_deref());
    let rules_text = if rules_path.exists() {
        Some(
            std::fs::read_to_string(&rules_path)
                .with_context(|| format!("Failed to read {}", rules_path.display()))?,
        )
    } else {
        None
    };

    let store = open_store(cli, config, working_dir)?;
    let inputs = WriterInputs::load(&store, rules_text).context("Failed to load analyses")?;

    if cli.dry_run {
        println!("=== Dry Run ===");
        println!("Working dir: {}", working_dir.display());
        println!("Rules: {} ({})", rules_path.display(), describe(inputs.rules.as_deref()));
        println!("Company analysis: {}", describe(inputs.company_analysis.as_deref()));
        println!("Applicant analysis: {}", describe(inputs.applicant_analysis.as_deref()));
        println!("Project analysis: {}", describe(inputs.project_analysis.as_deref()));
        println!("Threshold: {}/{}", settings.threshold, spec.max_total());
        match settings.max_attempts {
            Some(max) => println!("Max attempts: {}", max),
            None => println!("Max attempts: unlimited"),
        }
        println!("Totals: {}", strategy);
        return Ok(0);
    }

    let client = build_client(cli, config, working_dir)?;
    let logger = build_logger(cli, config, working_dir)?;

    let writer = CoverLetterWriter::new(&client, &store);
    let critic = Critic::new(&client, &store)
        .with_spec(spec)
        .with_strategy(strategy);
    let mut runner = LoopRunner::new(writer, critic, settings, logger);

    let seed = format!("{}|{}", inputs.company(), inputs.applicant());
    match RunLog::new(&seed) {
        Ok(run_log) => {
            run_log.write_start(
                runner.run_id(),
                client.model(),
                settings.threshold,
                settings.max_attempts,
                settings.stall_limit,
                &strategy.to_string(),
            );
            tracing::info!(path = %run_log.path().display(), "Run transcript");
            runner = runner.with_run_log(Arc::new(run_log));
        }
        Err(e) => tracing::warn!(error = %e, "Run transcript disabled"),
    }

    // Handle Ctrl+C gracefully
    let interrupt_handle = runner.interrupt_handle();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupted. Finishing current attempt...");
        interrupt_handle.store(true, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    let outcome = runner.run(RunState::new(inputs)).await;

    if let (RunOutcome::Accepted { draft_key, .. }, Some(path)) = (&outcome, output) {
        let letter = store
            .get(draft_key)?
            .with_context(|| format!("Accepted draft {} is missing from the store", draft_key))?;
        let path = if path.is_absolute() {
            path.clone()
        } else {
            working_dir.join(path)
        };
        std::fs::write(&path, letter)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    if cli.json_output {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
    }

    Ok(outcome.exit_code())
}

fn handle_artifacts(store: &SqliteStore, action: &ArtifactAction, json: bool) -> Result<()> {
    match action {
        ArtifactAction::List { prefix } => {
            let artifacts = store.list(prefix.as_deref().unwrap_or_default())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&artifacts)?);
                return Ok(());
            }
            if artifacts.is_empty() {
                eprintln!("No artifacts found.");
            }
            for artifact in artifacts {
                println!(
                    "{:<40} {:>7} chars  attempt {:<3} {}",
                    artifact.name,
                    artifact.content.chars().count(),
                    artifact.attempt_index,
                    artifact.updated_at.format("%Y-%m-%d %H:%M:%S").to_string().dimmed()
                );
            }
        }
        ArtifactAction::Show { name } => {
            let artifact = store
                .get_artifact(name)?
                .with_context(|| format!("No artifact named {}", name))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&artifact)?);
            } else {
                println!("{}", artifact.content);
            }
        }
    }
    Ok(())
}

fn open_store(cli: &Cli, config: &ProjectConfig, working_dir: &Path) -> Result<SqliteStore> {
    let store = match config.database_path(working_dir, cli.db.as_deref()) {
        Some(path) => SqliteStore::open_at(&path),
        None => SqliteStore::open(),
    };
    store.context("Failed to open artifact database")
}

/// Console event logger, mirrored to `[paths].event_log` when set
fn build_logger(cli: &Cli, config: &ProjectConfig, working_dir: &Path) -> Result<Arc<Logger>> {
    let format: LogFormat = cli.log_format.into();
    let logger = match config.event_log_path(working_dir) {
        Some(path) => Logger::with_file(format, &path)
            .with_context(|| format!("Failed to open event log {}", path.display()))?,
        None => Logger::new(format),
    };
    Ok(Arc::new(logger))
}

fn build_client(cli: &Cli, config: &ProjectConfig, working_dir: &Path) -> Result<ResilientClient> {
    let key_file = config.key_file_path(working_dir, cli.key_file.as_deref());
    let creds = CredentialSources::gather(
        &key_file,
        config.api.model.as_deref(),
        cli.model.as_deref(),
    )?
    .resolve();
    creds
        .validate()
        .with_context(|| format!("Check {} or {}", key_file.display(), credentials::API_KEY_ENV))?;

    ResilientClient::gemini(creds, config.client_settings())
        .context("Failed to build the API client")
}

/// Documents are plain UTF-8 text
fn read_document(working_dir: &Path, path: &Path) -> Result<String> {
    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        working_dir.join(path)
    };
    std::fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))
}

fn describe(value: Option<&str>) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => format!("{} chars", v.chars().count()),
        Some(_) => "empty".to_string(),
        None => "missing".to_string(),
    }
}

fn print_outcome(outcome: &RunOutcome) {
    match outcome {
        RunOutcome::Accepted {
            attempts,
            total,
            draft_key,
            total_duration_secs,
            ..
        } => {
            eprintln!();
            eprintln!("=== ACCEPTED ===");
            eprintln!("Attempts: {}", attempts);
            eprintln!("Score: {}", total);
            eprintln!("Draft: {} (also {})", draft_key, keys::latest(keys::DRAFT));
            eprintln!("Duration: {:.1}s", total_duration_secs);
        }
        RunOutcome::MaxAttemptsReached {
            attempts,
            best_total,
            total_duration_secs,
            ..
        } => {
            eprintln!();
            eprintln!("=== INCOMPLETE ===");
            eprintln!("Reached maximum attempts ({})", attempts);
            if let Some(best) = best_total {
                eprintln!("Best score: {}", best);
            }
            eprintln!("Duration: {:.1}s", total_duration_secs);
        }
        RunOutcome::Stalled {
            attempts,
            best_total,
            total_duration_secs,
            ..
        } => {
            eprintln!();
            eprintln!("=== STALLED ===");
            eprintln!("Score stopped improving after {} attempt(s)", attempts);
            if let Some(best) = best_total {
                eprintln!("Best score: {}", best);
            }
            eprintln!("Duration: {:.1}s", total_duration_secs);
        }
        RunOutcome::Interrupted {
            attempts,
            total_duration_secs,
            ..
        } => {
            eprintln!();
            eprintln!("=== INTERRUPTED ===");
            eprintln!("User stopped after {} attempt(s)", attempts);
            eprintln!("Duration: {:.1}s", total_duration_secs);
        }
        RunOutcome::Fatal {
            attempts,
            kind,
            reason,
            verdict,
            total_duration_secs,
            ..
        } => {
            eprintln!();
            eprintln!("=== FAILED ===");
            eprintln!("Attempt {}: [{}] {}", attempts, kind, reason);
            if let Some(verdict) = verdict {
                eprintln!("Verdict: {}", verdict);
            }
            eprintln!("Duration: {:.1}s", total_duration_secs);
        }
    }
}
