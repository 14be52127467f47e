use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One line of a run transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunLine {
    RunStart {
        timestamp: DateTime<Utc>,
        run_id: String,
        model: String,
        threshold: u32,
        max_attempts: Option<usize>,
        stall_limit: Option<usize>,
        total_strategy: String,
    },
    Attempt {
        attempt: usize,
        draft_key: String,
        draft_chars: usize,
        total: Option<u32>,
        verdict: String,
        timestamp: DateTime<Utc>,
    },
    RunEnd {
        outcome: String,
        attempts: usize,
        final_total: Option<u32>,
        reason: Option<String>,
        duration_secs: f64,
        timestamp: DateTime<Utc>,
    },
}

/// Appends a JSONL transcript to `<data_dir>/letterloop/runs/`.
///
/// Files are named `<utc timestamp>_<sha256 prefix of the seed>.jsonl`.
pub struct RunLog {
    file: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl RunLog {
    pub fn new(seed: &str) -> io::Result<Self> {
        Self::in_dir(&Self::runs_dir()?, seed)
    }

    pub fn in_dir(dir: &Path, seed: &str) -> io::Result<Self> {
        fs::create_dir_all(dir)?;

        let timestamp = Utc::now().format("%Y-%m-%dT%H-%M-%SZ").to_string();
        let mut hasher = Sha256::new();
        hasher.update(seed.as_bytes());
        let hash = hex::encode(hasher.finalize());

        let path = dir.join(format!("{}_{}.jsonl", timestamp, &hash[..6]));
        let file = File::create(&path)?;

        Ok(Self {
            file: Mutex::new(BufWriter::new(file)),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_start(
        &self,
        run_id: &str,
        model: &str,
        threshold: u32,
        max_attempts: Option<usize>,
        stall_limit: Option<usize>,
        total_strategy: &str,
    ) {
        self.write_line(&RunLine::RunStart {
            timestamp: Utc::now(),
            run_id: run_id.to_string(),
            model: model.to_string(),
            threshold,
            max_attempts,
            stall_limit,
            total_strategy: total_strategy.to_string(),
        });
    }

    pub fn write_attempt(
        &self,
        attempt: usize,
        draft_key: &str,
        draft_chars: usize,
        total: Option<u32>,
        verdict: &str,
        timestamp: DateTime<Utc>,
    ) {
        self.write_line(&RunLine::Attempt {
            attempt,
            draft_key: draft_key.to_string(),
            draft_chars,
            total,
            verdict: verdict.to_string(),
            timestamp,
        });
    }

    pub fn write_end(
        &self,
        outcome: &str,
        attempts: usize,
        final_total: Option<u32>,
        reason: Option<&str>,
        duration_secs: f64,
    ) {
        self.write_line(&RunLine::RunEnd {
            outcome: outcome.to_string(),
            attempts,
            final_total,
            reason: reason.map(String::from),
            duration_secs,
            timestamp: Utc::now(),
        });
    }

    fn write_line(&self, line: &RunLine) {
        if let Ok(json) = serde_json::to_string(line) {
            if let Ok(mut writer) = self.file.lock() {
                let _ = writeln!(writer, "{}", json);
                let _ = writer.flush();
            }
        }
    }

    fn runs_dir() -> io::Result<PathBuf> {
        let data_dir = dirs::data_dir().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                "Could not determine data directory",
            )
        })?;
        Ok(data_dir.join("letterloop").join("runs"))
    }
}
