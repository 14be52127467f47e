use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

/// Structured log events for the analysis pipeline and the refinement loop
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    AnalysisStarted {
        kind: String,
    },
    AnalysisCompleted {
        kind: String,
        chars: usize,
        duration_secs: f64,
    },
    RunStarted {
        run_id: String,
        threshold: u32,
        max_attempts: Option<usize>,
        total_strategy: String,
    },
    DraftStarted {
        attempt: usize,
    },
    DraftCompleted {
        attempt: usize,
        key: String,
        chars: usize,
        duration_secs: f64,
    },
    RubricDerived {
        criteria: usize,
        max_total: u32,
    },
    ScoringStarted {
        attempt: usize,
    },
    ScoringCompleted {
        attempt: usize,
        total: Option<u32>,
        verdict: String,
        duration_secs: f64,
    },
    RunAccepted {
        attempts: usize,
        total: u32,
        draft_key: String,
        duration_secs: f64,
    },
    MaxAttemptsReached {
        attempts: usize,
        best_total: Option<u32>,
    },
    Stalled {
        attempts: usize,
        best_total: Option<u32>,
    },
    ErrorEncountered {
        attempt: usize,
        error: String,
    },
}

impl LogEvent {
    fn with_timestamp(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "timestamp".to_string(),
                serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }
        value
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format with colors and visual structure
    #[default]
    Pretty,
    /// JSON lines format for machine consumption
    Json,
    /// Compact single-line format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// Renders [`LogEvent`]s on stderr, optionally mirroring them to a file
pub struct Logger {
    format: LogFormat,
    file_writer: Option<Mutex<File>>,
}

impl Logger {
    pub fn new(format: LogFormat) -> Self {
        Self {
            format,
            file_writer: None,
        }
    }

    /// Create a logger that also appends JSON events to `log_path`
    pub fn with_file(format: LogFormat, log_path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        Ok(Self {
            format,
            file_writer: Some(Mutex::new(file)),
        })
    }

    pub fn format(&self) -> LogFormat {
        self.format
    }

    pub fn log(&self, event: &LogEvent) {
        if let Some(ref writer) = self.file_writer {
            if let Ok(mut file) = writer.lock() {
                let _ = writeln!(file, "{}", event.with_timestamp());
            }
        }

        let line = match self.format {
            LogFormat::Json => serde_json::to_string(event).ok(),
            LogFormat::Pretty => Self::render_pretty(event),
            LogFormat::Compact => {
                let timestamp = chrono::Utc::now().format("%H:%M:%S").to_string();
                Self::render_compact(event, &timestamp)
            }
        };
        if let Some(line) = line {
            let _ = writeln!(std::io::stderr(), "{}", line);
        }
    }

    fn render_pretty(event: &LogEvent) -> Option<String> {
        let text = match event {
            LogEvent::AnalysisStarted { kind } => format!(
                "  {} {}",
                "▶".bright_cyan(),
                format!("ANALYZE {}", kind.to_uppercase()).bright_cyan().bold()
            ),
            LogEvent::AnalysisCompleted {
                chars,
                duration_secs,
                ..
            } => format!(
                "    {} {} chars ({:.1}s)",
                "✓".bright_green(),
                chars,
                duration_secs
            ),
            LogEvent::RunStarted {
                run_id,
                threshold,
                max_attempts,
                total_strategy,
            } => {
                let limit = max_attempts
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "unlimited".to_string());
                format!(
                    "\n{}\n{}  {} {}\n{}  {} {}  {} {}  {} {}\n{}\n",
                    "╭─────────────────────────────────────────────────────────────────────╮"
                        .bright_blue(),
                    "│".bright_blue(),
                    "letterloop".bold().bright_white(),
                    format!("run={}", run_id).dimmed(),
                    "│".bright_blue(),
                    "Threshold:".dimmed(),
                    threshold,
                    "Attempts:".dimmed(),
                    limit,
                    "Totals:".dimmed(),
                    total_strategy,
                    "╰─────────────────────────────────────────────────────────────────────╯"
                        .bright_blue()
                )
            }
            LogEvent::DraftStarted { attempt } => {
                let header = format!("─ Attempt {} ", attempt);
                let padding = "─".repeat(67usize.saturating_sub(header.chars().count()));
                format!(
                    "{}{}{}\n\n  {} {}",
                    "┌".bright_blue(),
                    header.bright_blue().bold(),
                    padding.bright_blue(),
                    "▶".bright_cyan(),
                    "WRITER".bright_cyan().bold()
                )
            }
            LogEvent::DraftCompleted {
                key,
                chars,
                duration_secs,
                ..
            } => format!(
                "    {} {} ({} chars, {:.1}s)\n",
                "✓".bright_green(),
                key,
                chars,
                duration_secs
            ),
            LogEvent::RubricDerived {
                criteria,
                max_total,
            } => format!(
                "    {} {}",
                "📋".dimmed(),
                format!("Rubric: {} criteria, {} points", criteria, max_total).dimmed()
            ),
            LogEvent::ScoringStarted { .. } => {
                format!("  {} {}", "▶".bright_magenta(), "CRITIC".bright_magenta().bold())
            }
            LogEvent::ScoringCompleted {
                verdict,
                duration_secs,
                ..
            } => {
                let styled = if verdict.starts_with("ACCEPT") {
                    format!("✓ Verdict: {}", verdict).bright_green().to_string()
                } else if verdict.starts_with("INDETERMINATE") {
                    format!("✗ Verdict: {}", verdict).bright_red().to_string()
                } else {
                    format!("→ Verdict: {}", verdict).bright_yellow().to_string()
                };
                format!(
                    "    {} ({:.1}s)\n\n{}\n",
                    styled,
                    duration_secs,
                    "└─────────────────────────────────────────────────────────────────────┘"
                        .bright_blue()
                )
            }
            // Final outcome is printed by the binary
            LogEvent::RunAccepted { .. } => return None,
            LogEvent::MaxAttemptsReached {
                attempts,
                best_total,
            } => format!(
                "\n{} Maximum attempts reached ({}), best total {}",
                "⚠".bright_yellow(),
                attempts,
                Self::total_text(*best_total)
            ),
            LogEvent::Stalled {
                attempts,
                best_total,
            } => format!(
                "\n{} Score stopped improving after {} attempts, best total {}",
                "⚠".bright_yellow(),
                attempts,
                Self::total_text(*best_total)
            ),
            LogEvent::ErrorEncountered { attempt, error } => format!(
                "\n{} Error in attempt {}: {}",
                "✗".bright_red(),
                attempt,
                error.bright_red()
            ),
        };
        Some(text)
    }

    fn render_compact(event: &LogEvent, timestamp: &str) -> Option<String> {
        let msg = match event {
            LogEvent::AnalysisStarted { kind } => format!("analysis:start:{}", kind),
            LogEvent::AnalysisCompleted {
                kind,
                chars,
                duration_secs,
            } => format!("analysis:done:{} {}c {:.1}s", kind, chars, duration_secs),
            LogEvent::RunStarted {
                run_id, threshold, ..
            } => format!("run:start:{} threshold={}", run_id, threshold),
            LogEvent::DraftStarted { attempt } => format!("writer:start:{}", attempt),
            LogEvent::DraftCompleted {
                attempt,
                chars,
                duration_secs,
                ..
            } => format!("writer:done:{} {}c {:.1}s", attempt, chars, duration_secs),
            LogEvent::RubricDerived { criteria, .. } => format!("rubric:{}", criteria),
            LogEvent::ScoringStarted { attempt } => format!("critic:start:{}", attempt),
            LogEvent::ScoringCompleted {
                attempt, verdict, ..
            } => format!("critic:done:{} {}", attempt, verdict),
            LogEvent::RunAccepted {
                attempts,
                total,
                duration_secs,
                ..
            } => format!("run:accepted:{} total={} {:.1}s", attempts, total, duration_secs),
            LogEvent::MaxAttemptsReached { attempts, .. } => format!("run:limit:{}", attempts),
            LogEvent::Stalled { attempts, .. } => format!("run:stalled:{}", attempts),
            LogEvent::ErrorEncountered { attempt, error } => {
                format!("error:{}:{}", attempt, error)
            }
        };
        Some(format!("[{}] {}", timestamp, msg))
    }

    fn total_text(total: Option<u32>) -> String {
        total
            .map(|t| t.to_string())
            .unwrap_or_else(|| "n/a".to_string())
    }
}
