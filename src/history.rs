//! Analysis history: a CRUD store behind a trait plus a fire-and-forget
//! recording front.
//!
//! Recording never fails the analysis that triggered it. Write errors are
//! logged and dropped; reads, favorites and deletes report their errors to
//! the caller.

use crate::config::AnalysisConfig;
use crate::dataset::DatasetId;
use crate::registry::AnalysisKind;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, Result as SqliteResult};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

/// One recorded analysis run.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub kind: AnalysisKind,
    pub dataset_id: DatasetId,
    /// Display name, e.g. the dashboard panel title
    pub label: String,
    pub config: AnalysisConfig,
    /// Short human-readable outcome, e.g. "12 groups"
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub favorite: bool,
}

impl HistoryEntry {
    pub fn new(label: impl Into<String>, config: AnalysisConfig, dataset_id: DatasetId) -> Self {
        HistoryEntry {
            id: Uuid::new_v4(),
            kind: config.kind(),
            dataset_id,
            label: label.into(),
            config,
            summary: None,
            created_at: Utc::now(),
            favorite: false,
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }
}

/// Selects history entries; empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryFilter {
    pub kind: Option<AnalysisKind>,
    pub dataset_id: Option<DatasetId>,
    pub favorites_only: bool,
    pub limit: Option<usize>,
}

impl HistoryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: AnalysisKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn dataset(mut self, dataset_id: DatasetId) -> Self {
        self.dataset_id = Some(dataset_id);
        self
    }

    pub fn favorites_only(mut self) -> Self {
        self.favorites_only = true;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HistoryError {
    Storage(String),
    NotFound(Uuid),
}

impl fmt::Display for HistoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryError::Storage(msg) => write!(f, "History storage error: {}", msg),
            HistoryError::NotFound(id) => write!(f, "History entry not found: {}", id),
        }
    }
}

impl std::error::Error for HistoryError {}

impl From<rusqlite::Error> for HistoryError {
    fn from(err: rusqlite::Error) -> Self {
        HistoryError::Storage(format!("SQL error: {}", err))
    }
}

/// Persistence seam for analysis history.
///
/// Implementations: [`SqliteHistoryStore`].
pub trait HistoryStore: Send {
    fn save_analysis(&self, entry: &HistoryEntry) -> Result<(), HistoryError>;

    /// Entries matching `filter`, newest first.
    fn get_history(&self, filter: &HistoryFilter) -> Result<Vec<HistoryEntry>, HistoryError>;

    /// Flips the favorite flag and returns the new value.
    fn toggle_favorite(&self, id: Uuid) -> Result<bool, HistoryError>;

    fn delete_analysis(&self, id: Uuid) -> Result<(), HistoryError>;
}

/// SQLite-backed history store.
///
/// Creates its schema on open.
#[derive(Debug)]
pub struct SqliteHistoryStore {
    conn: Connection,
}

impl SqliteHistoryStore {
    /// Opens (or creates) a file-based history database.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or the schema
    /// cannot be created.
    pub fn new<P: AsRef<Path>>(db_path: P) -> SqliteResult<Self> {
        let conn = Connection::open(db_path)?;
        let store = SqliteHistoryStore { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    /// Opens an in-memory history database. Useful for testing.
    pub fn new_in_memory() -> SqliteResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = SqliteHistoryStore { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    fn ensure_schema(&self) -> SqliteResult<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS analysis_history (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                dataset_id TEXT NOT NULL,
                label TEXT NOT NULL,
                config TEXT NOT NULL,
                summary TEXT,
                created_at TEXT NOT NULL,
                favorite INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;
        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_history_created_at ON analysis_history(created_at)",
            [],
        )?;
        Ok(())
    }

    fn table_exists(&self, table_name: &str) -> SqliteResult<bool> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name=?1")?;
        stmt.exists([table_name])
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

/// Raw column values of one history row.
struct StoredRow {
    id: String,
    kind: String,
    dataset_id: String,
    label: String,
    config: String,
    summary: Option<String>,
    created_at: String,
    favorite: bool,
}

impl StoredRow {
    fn into_entry(self) -> Result<HistoryEntry, HistoryError> {
        let corrupt = |what: &str, e: &dyn fmt::Display| {
            HistoryError::Storage(format!("corrupt {} in row {}: {}", what, self.id, e))
        };

        let id = Uuid::parse_str(&self.id).map_err(|e| corrupt("id", &e))?;
        let kind = AnalysisKind::from_id(&self.kind).map_err(|e| corrupt("kind", &e))?;
        let dataset_id = DatasetId::new(self.dataset_id.as_str()).map_err(|e| corrupt("dataset id", &e))?;
        let config: AnalysisConfig =
            serde_json::from_str(&self.config).map_err(|e| corrupt("config", &e))?;
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| corrupt("timestamp", &e))?
            .with_timezone(&Utc);

        Ok(HistoryEntry {
            id,
            kind,
            dataset_id,
            label: self.label,
            config,
            summary: self.summary,
            created_at,
            favorite: self.favorite,
        })
    }
}

impl HistoryStore for SqliteHistoryStore {
    fn save_analysis(&self, entry: &HistoryEntry) -> Result<(), HistoryError> {
        let config = serde_json::to_string(&entry.config)
            .map_err(|e| HistoryError::Storage(format!("config encoding failed: {}", e)))?;

        self.conn.execute(
            "INSERT OR REPLACE INTO analysis_history
                (id, kind, dataset_id, label, config, summary, created_at, favorite)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                entry.id.to_string(),
                entry.kind.id(),
                entry.dataset_id.as_str(),
                entry.label,
                config,
                entry.summary,
                entry.created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
                entry.favorite,
            ],
        )?;
        Ok(())
    }

    fn get_history(&self, filter: &HistoryFilter) -> Result<Vec<HistoryEntry>, HistoryError> {
        // Negative LIMIT means no limit in SQLite.
        let limit = filter
            .limit
            .map_or(-1, |limit| i64::try_from(limit).unwrap_or(i64::MAX));

        let mut stmt = self.conn.prepare(
            "SELECT id, kind, dataset_id, label, config, summary, created_at, favorite
             FROM analysis_history
             WHERE (?1 IS NULL OR kind = ?1)
               AND (?2 IS NULL OR dataset_id = ?2)
               AND (?3 = 0 OR favorite = 1)
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?4",
        )?;

        let rows = stmt.query_map(
            params![
                filter.kind.map(|kind| kind.id()),
                filter.dataset_id.as_ref().map(DatasetId::as_str),
                filter.favorites_only,
                limit,
            ],
            |row| {
                Ok(StoredRow {
                    id: row.get(0)?,
                    kind: row.get(1)?,
                    dataset_id: row.get(2)?,
                    label: row.get(3)?,
                    config: row.get(4)?,
                    summary: row.get(5)?,
                    created_at: row.get(6)?,
                    favorite: row.get(7)?,
                })
            },
        )?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?.into_entry()?);
        }
        Ok(entries)
    }

    fn toggle_favorite(&self, id: Uuid) -> Result<bool, HistoryError> {
        let key = id.to_string();
        let changed = self.conn.execute(
            "UPDATE analysis_history SET favorite = NOT favorite WHERE id = ?1",
            [&key],
        )?;
        if changed == 0 {
            return Err(HistoryError::NotFound(id));
        }
        let favorite = self.conn.query_row(
            "SELECT favorite FROM analysis_history WHERE id = ?1",
            [&key],
            |row| row.get(0),
        )?;
        Ok(favorite)
    }

    fn delete_analysis(&self, id: Uuid) -> Result<(), HistoryError> {
        let removed = self
            .conn
            .execute("DELETE FROM analysis_history WHERE id = ?1", [id.to_string()])?;
        if removed == 0 {
            return Err(HistoryError::NotFound(id));
        }
        Ok(())
    }
}

/// Shared front over a [`HistoryStore`].
///
/// Store calls run on the blocking pool so SQLite I/O never stalls the
/// runtime.
#[derive(Debug)]
pub struct HistoryCache<S> {
    store: Arc<Mutex<S>>,
}

impl<S> Clone for HistoryCache<S> {
    fn clone(&self) -> Self {
        HistoryCache {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: HistoryStore + 'static> HistoryCache<S> {
    pub fn new(store: S) -> Self {
        HistoryCache {
            store: Arc::new(Mutex::new(store)),
        }
    }

    async fn with_store<R, F>(&self, op: F) -> Result<R, HistoryError>
    where
        R: Send + 'static,
        F: FnOnce(&S) -> Result<R, HistoryError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || {
            let store = store.blocking_lock();
            op(&store)
        })
        .await
        .map_err(|e| HistoryError::Storage(format!("history task failed: {}", e)))?
    }

    /// Saves `entry` in the background.
    ///
    /// Returns immediately; a failed write is logged and never reaches the
    /// caller. The handle only exists so callers that must flush (tests,
    /// shutdown) can wait for it.
    pub fn record(&self, entry: HistoryEntry) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let id = entry.id;
            let kind = entry.kind;
            match cache.with_store(move |store| store.save_analysis(&entry)).await {
                Ok(()) => debug!(%id, kind = kind.id(), "analysis recorded"),
                Err(error) => warn!(%id, kind = kind.id(), %error, "failed to record analysis"),
            }
        })
    }

    pub async fn history(&self, filter: HistoryFilter) -> Result<Vec<HistoryEntry>, HistoryError> {
        self.with_store(move |store| store.get_history(&filter)).await
    }

    pub async fn toggle_favorite(&self, id: Uuid) -> Result<bool, HistoryError> {
        self.with_store(move |store| store.toggle_favorite(id)).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), HistoryError> {
        self.with_store(move |store| store.delete_analysis(id)).await
    }
}
