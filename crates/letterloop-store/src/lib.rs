//! Artifact store for letterloop.
//!
//! Every analysis report, draft, rubric and scorecard is kept as a named text
//! blob in a SQLite database so that a run can be inspected or resumed after
//! the process exits.

mod artifacts;

pub use artifacts::{keys, Artifact};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Artifact {0} already exists and cannot be overwritten")]
    Exists(String),

    #[error("Store lock poisoned")]
    Poisoned,
}

/// Key-value persistence for named artifacts.
///
/// `get` distinguishes an absent key (`None`) from a present empty value.
pub trait ArtifactStore: Send + Sync {
    /// Write an artifact. Keys accepted by [`keys::is_replaceable`] are
    /// re-pointed; any other existing key is refused with
    /// [`StoreError::Exists`].
    fn put_artifact(&self, artifact: &Artifact) -> Result<(), StoreError>;

    fn get_artifact(&self, name: &str) -> Result<Option<Artifact>, StoreError>;

    /// All artifacts whose name starts with `prefix`, ordered by name
    fn list(&self, prefix: &str) -> Result<Vec<Artifact>, StoreError>;

    fn delete(&self, name: &str) -> Result<bool, StoreError>;

    fn put(&self, name: &str, content: &str) -> Result<(), StoreError> {
        self.put_artifact(&Artifact::new(name, content))
    }

    fn get(&self, name: &str) -> Result<Option<String>, StoreError> {
        Ok(self.get_artifact(name)?.map(|a| a.content))
    }

    fn exists(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.get_artifact(name)?.is_some())
    }
}

/// SQLite-backed [`ArtifactStore`]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the store at the default location.
    ///
    /// The default location is `~/.local/share/letterloop/letterloop.db`.
    pub fn open() -> Result<Self, StoreError> {
        Self::open_at(&Self::default_path())
    }

    /// Open or create the store at a specific path.
    pub fn open_at(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        debug!(path = %path.display(), "Opening artifact store");
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory store (useful for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn default_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("letterloop")
            .join("letterloop.db")
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn init_schema(conn: &Connection) -> Result<(), rusqlite::Error> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS artifacts (
                name TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                attempt_index INTEGER NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
    }

    fn row_to_artifact(row: &rusqlite::Row) -> Result<Artifact, rusqlite::Error> {
        let attempt_index: i64 = row.get(2)?;
        let updated_at_str: String = row.get(3)?;

        Ok(Artifact {
            name: row.get(0)?,
            content: row.get(1)?,
            attempt_index: attempt_index.max(0) as usize,
            updated_at: DateTime::parse_from_rfc3339(&updated_at_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }
}

impl ArtifactStore for SqliteStore {
    fn put_artifact(&self, artifact: &Artifact) -> Result<(), StoreError> {
        debug!(
            name = %artifact.name,
            attempt = artifact.attempt_index,
            len = artifact.content.len(),
            "Writing artifact"
        );
        let sql = if keys::is_replaceable(&artifact.name) {
            r#"
            INSERT INTO artifacts (name, content, attempt_index, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(name) DO UPDATE SET
                content = excluded.content,
                attempt_index = excluded.attempt_index,
                updated_at = excluded.updated_at
            "#
        } else {
            r#"
            INSERT INTO artifacts (name, content, attempt_index, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(name) DO NOTHING
            "#
        };

        let written = self.conn()?.execute(
            sql,
            params![
                artifact.name,
                artifact.content,
                artifact.attempt_index as i64,
                artifact.updated_at.to_rfc3339(),
            ],
        )?;
        if written == 0 {
            return Err(StoreError::Exists(artifact.name.clone()));
        }
        Ok(())
    }

    fn get_artifact(&self, name: &str) -> Result<Option<Artifact>, StoreError> {
        let artifact = self
            .conn()?
            .query_row(
                "SELECT name, content, attempt_index, updated_at FROM artifacts WHERE name = ?1",
                params![name],
                Self::row_to_artifact,
            )
            .optional()?;
        Ok(artifact)
    }

    fn list(&self, prefix: &str) -> Result<Vec<Artifact>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT name, content, attempt_index, updated_at FROM artifacts \
             WHERE substr(name, 1, length(?1)) = ?1 ORDER BY name",
        )?;
        let rows = stmt.query_map(params![prefix], Self::row_to_artifact)?;

        let mut artifacts = Vec::new();
        for row in rows {
            artifacts.push(row?);
        }
        Ok(artifacts)
    }

    fn delete(&self, name: &str) -> Result<bool, StoreError> {
        let rows_affected = self
            .conn()?
            .execute("DELETE FROM artifacts WHERE name = ?1", params![name])?;
        Ok(rows_affected > 0)
    }
}
