//! SQLite persistence layer for settings and app records.
//!
//! Settings live in a key/value table. Everything else (users, planner
//! events, flashcards, study sessions, chat messages) is stored as JSON
//! records behind the generic [`RecordStore`] interface.

use crate::models::{DailyStats, Settings, StudySession};
use chrono::{NaiveDate, SecondsFormat, Utc};
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

/// Environment variable overriding the database location.
pub const DB_PATH_ENV: &str = "APPROVA_DB";

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to create database directory")]
    DirectoryCreation,
    #[error("No record {id} in {table}")]
    NotFound { table: &'static str, id: String },
    #[error("Records must be JSON objects")]
    NotAnObject,
}

/// A stored record: a flat JSON object.
pub type Record = Map<String, Value>;

/// Tables of the record store. This app only writes study sessions; the
/// other tables belong to the rest of the platform sharing the store.
#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Users,
    PlannerEvents,
    Flashcards,
    StudySessions,
    ChatMessages,
}

impl Table {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::PlannerEvents => "planner_events",
            Self::Flashcards => "flashcards",
            Self::StudySessions => "study_sessions",
            Self::ChatMessages => "chat_messages",
        }
    }
}

/// Equality conditions that a record must all satisfy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((field.into(), value.into()));
        self
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.conditions
            .iter()
            .all(|(field, value)| record.get(field) == Some(value))
    }
}

/// Sort order for query results.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub descending: bool,
}

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }

    fn compare(&self, a: &Record, b: &Record) -> Ordering {
        let ord = compare_values(a.get(&self.field), b.get(&self.field));
        if self.descending {
            ord.reverse()
        } else {
            ord
        }
    }
}

/// Missing values sort first; numbers compare numerically, everything else
/// by its JSON text.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or_default();
            let y = y.as_f64().unwrap_or_default();
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

/// Generic record storage used by every collaborator that needs durable
/// state.
pub trait RecordStore: Send {
    /// Inserts a record, assigning `id` and `created_at`. Returns the stored
    /// record.
    fn insert(&self, table: Table, record: Record) -> Result<Record, DatabaseError>;

    /// Returns records matching `filter`, optionally sorted.
    fn query(
        &self,
        table: Table,
        filter: &Filter,
        order: Option<&OrderBy>,
    ) -> Result<Vec<Record>, DatabaseError>;

    /// Merges `patch` into the record with the given id.
    fn update(&self, table: Table, id: &str, patch: Record) -> Result<(), DatabaseError>;
}

/// Persistence of the user's [`Settings`].
pub trait SettingsStore {
    /// Loads settings, returning defaults if none were saved.
    fn load_settings(&self) -> Result<Settings, DatabaseError>;

    fn save_settings(&self, settings: &Settings) -> Result<(), DatabaseError>;
}

/// Everything the app needs from its backing store.
pub trait Storage: RecordStore + SettingsStore {}

impl<T: RecordStore + SettingsStore> Storage for T {}

/// Appends a completed study session to the store.
pub fn save_study_session<S: RecordStore + ?Sized>(
    store: &S,
    session: &StudySession,
) -> Result<StudySession, DatabaseError> {
    let record = to_record(session)?;
    let stored = store.insert(Table::StudySessions, record)?;
    Ok(serde_json::from_value(Value::Object(stored))?)
}

/// Sums the study sessions a user logged on `date`.
pub fn daily_stats<S: RecordStore + ?Sized>(
    store: &S,
    user_id: &str,
    date: NaiveDate,
) -> Result<DailyStats, DatabaseError> {
    let filter = Filter::new()
        .where_eq("user_id", user_id)
        .where_eq("date", date.to_string());
    let mut stats = DailyStats::new(date);
    let order = OrderBy::asc("created_at");
    for record in store.query(Table::StudySessions, &filter, Some(&order))? {
        let session: StudySession = serde_json::from_value(Value::Object(record))?;
        stats.add(&session);
    }
    Ok(stats)
}

/// The most recent study session a user logged, if any.
pub fn latest_session<S: RecordStore + ?Sized>(
    store: &S,
    user_id: &str,
) -> Result<Option<StudySession>, DatabaseError> {
    let filter = Filter::new().where_eq("user_id", user_id);
    let order = OrderBy::desc("created_at");
    match store.query(Table::StudySessions, &filter, Some(&order))?.into_iter().next() {
        Some(record) => Ok(Some(serde_json::from_value(Value::Object(record))?)),
        None => Ok(None),
    }
}

/// A store shared between the main thread and background work.
///
/// The timer thread never takes this lock, so writes here cannot delay a
/// tick.
#[derive(Clone)]
pub struct SharedStore {
    inner: Arc<Mutex<Box<dyn Storage>>>,
}

impl SharedStore {
    pub fn new(store: Box<dyn Storage>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    /// Locks the store. A poisoned lock is recovered; every write is a
    /// single statement.
    pub fn lock(&self) -> MutexGuard<'_, Box<dyn Storage>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn save_session(&self, session: &StudySession) -> Result<StudySession, DatabaseError> {
        save_study_session(&**self.lock(), session)
    }

    pub fn daily_stats(&self, user_id: &str, date: NaiveDate) -> Result<DailyStats, DatabaseError> {
        daily_stats(&**self.lock(), user_id, date)
    }

    pub fn latest_session(&self, user_id: &str) -> Result<Option<StudySession>, DatabaseError> {
        latest_session(&**self.lock(), user_id)
    }

    pub fn load_settings(&self) -> Result<Settings, DatabaseError> {
        self.lock().load_settings()
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<(), DatabaseError> {
        self.lock().save_settings(settings)
    }
}

fn to_record<T: serde::Serialize>(value: &T) -> Result<Record, DatabaseError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        _ => Err(DatabaseError::NotAnObject),
    }
}

pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens the default database, initializing tables if needed.
    pub fn new() -> Result<Self, DatabaseError> {
        Self::open(&Self::db_path())
    }

    /// Opens a database at `path`, creating parent directories.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|_| DatabaseError::DirectoryCreation)?;
        }

        let conn = Connection::open(path)?;
        Self::initialize_tables(&conn)?;
        info!(path = %path.display(), "opened database");

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing).
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_tables(&conn)?;
        Ok(Self { conn })
    }

    fn initialize_tables(conn: &Connection) -> Result<(), DatabaseError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS records (
                id TEXT PRIMARY KEY,
                tbl TEXT NOT NULL,
                body TEXT NOT NULL,
                seq INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS records_tbl ON records (tbl, seq);
        "#,
        )?;
        Ok(())
    }

    fn db_path() -> PathBuf {
        if let Some(path) = env::var_os(DB_PATH_ENV) {
            return PathBuf::from(path);
        }
        ProjectDirs::from("com", "approva", "Approva")
            .map(|dirs| dirs.data_dir().join("approva.db"))
            .unwrap_or_else(|| PathBuf::from("approva.db"))
    }

    fn load_table(&self, table: Table) -> Result<Vec<Record>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare("SELECT body FROM records WHERE tbl = ? ORDER BY seq")?;
        let bodies = stmt
            .query_map([table.name()], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        bodies
            .iter()
            .map(|body| match serde_json::from_str(body)? {
                Value::Object(map) => Ok(map),
                _ => Err(DatabaseError::NotAnObject),
            })
            .collect()
    }
}

impl SettingsStore for Database {
    fn load_settings(&self) -> Result<Settings, DatabaseError> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM settings WHERE key = 'config'",
                [],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(j) => Ok(serde_json::from_str(&j)?),
            None => Ok(Settings::default()),
        }
    }

    fn save_settings(&self, settings: &Settings) -> Result<(), DatabaseError> {
        let json = serde_json::to_string(settings)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES ('config', ?)",
            [&json],
        )?;
        Ok(())
    }
}

impl RecordStore for Database {
    fn insert(&self, table: Table, mut record: Record) -> Result<Record, DatabaseError> {
        let id = Uuid::new_v4().to_string();
        record.insert("id".to_string(), Value::String(id.clone()));
        record.insert(
            "created_at".to_string(),
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)),
        );

        let body = serde_json::to_string(&record)?;
        self.conn.execute(
            "INSERT INTO records (id, tbl, body, seq)
             VALUES (?, ?, ?, (SELECT COALESCE(MAX(seq), 0) + 1 FROM records))",
            params![id, table.name(), body],
        )?;
        debug!(table = table.name(), %id, "inserted record");
        Ok(record)
    }

    fn query(
        &self,
        table: Table,
        filter: &Filter,
        order: Option<&OrderBy>,
    ) -> Result<Vec<Record>, DatabaseError> {
        let mut records: Vec<Record> = self
            .load_table(table)?
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect();
        if let Some(order) = order {
            // Ties keep insertion order, newest first when descending.
            if order.descending {
                records.reverse();
            }
            records.sort_by(|a, b| order.compare(a, b));
        }
        Ok(records)
    }

    fn update(&self, table: Table, id: &str, patch: Record) -> Result<(), DatabaseError> {
        let body: Option<String> = self
            .conn
            .query_row(
                "SELECT body FROM records WHERE tbl = ? AND id = ?",
                params![table.name(), id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(body) = body else {
            return Err(DatabaseError::NotFound {
                table: table.name(),
                id: id.to_string(),
            });
        };

        let mut record = match serde_json::from_str(&body)? {
            Value::Object(map) => map,
            _ => return Err(DatabaseError::NotAnObject),
        };
        for (key, value) in patch {
            // Identity fields are owned by the store.
            if key != "id" && key != "created_at" {
                record.insert(key, value);
            }
        }

        self.conn.execute(
            "UPDATE records SET body = ? WHERE tbl = ? AND id = ?",
            params![serde_json::to_string(&record)?, table.name(), id],
        )?;
        Ok(())
    }
}
