// msg-intake-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Message Store
// Description: Durable MessageStore backed by SQLite WAL.
// Purpose: Persist messages idempotently and serve filtered queries and stats.
// Dependencies: msg-intake-core, rusqlite, serde, thiserror
// ============================================================================

//! ## Overview
//! This module implements a durable [`MessageStore`] using `SQLite`. Rows are
//! keyed by `message_id`; the primary-key uniqueness constraint makes insert
//! vs duplicate resolution atomic, so concurrent deliveries of the same
//! message resolve to exactly one row with the first writer's values. Schema
//! versioning fails closed on mismatch.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use msg_intake_core::InsertOutcome;
use msg_intake_core::Message;
use msg_intake_core::MessageId;
use msg_intake_core::MessagePage;
use msg_intake_core::MessageQuery;
use msg_intake_core::MessageStore;
use msg_intake_core::SenderCount;
use msg_intake_core::StoreError;
use msg_intake_core::StoreStats;
use msg_intake_core::interfaces::TOP_SENDERS_LIMIT;
use rusqlite::Connection;
use rusqlite::ErrorCode;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::ToSql;
use rusqlite::params;
use rusqlite::params_from_iter;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` message store.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Builds a config with default pragmas for the given path.
    #[must_use]
    pub fn for_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store data or configuration.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Store(message),
            SqliteStoreError::VersionMismatch(message) => Self::Corrupt(message),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
        }
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed message store with WAL support.
#[derive(Clone)]
pub struct SqliteMessageStore {
    /// Shared `SQLite` connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteMessageStore {
    /// Opens an `SQLite`-backed message store.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn new(config: SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(&config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }
}

impl MessageStore for SqliteMessageStore {
    fn insert(&self, message: &Message) -> Result<InsertOutcome, StoreError> {
        self.insert_message(message).map_err(StoreError::from)
    }

    fn query(&self, query: &MessageQuery) -> Result<MessagePage, StoreError> {
        self.query_messages(query).map_err(StoreError::from)
    }

    fn stats(&self) -> Result<StoreStats, StoreError> {
        self.collect_stats().map_err(StoreError::from)
    }

    fn is_ready(&self) -> bool {
        let Ok(guard) = self.connection.lock() else {
            return false;
        };
        guard
            .query_row("SELECT 1 FROM messages LIMIT 1", params![], |_| Ok(()))
            .optional()
            .is_ok()
    }
}

impl SqliteMessageStore {
    /// Inserts one message, reporting duplicates as a normal outcome.
    fn insert_message(&self, message: &Message) -> Result<InsertOutcome, SqliteStoreError> {
        let guard = self
            .connection
            .lock()
            .map_err(|_| SqliteStoreError::Db("mutex poisoned".to_string()))?;
        let result = guard.execute(
            "INSERT INTO messages (message_id, from_address, to_address, ts, text, ingested_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                message.message_id.as_str(),
                message.from_address,
                message.to_address,
                message.timestamp,
                message.text,
                message.ingested_at
            ],
        );
        match result {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(rusqlite::Error::SqliteFailure(failure, _))
                if failure.code == ErrorCode::ConstraintViolation =>
            {
                // The first writer's row wins; replays are expected under
                // at-least-once delivery.
                Ok(InsertOutcome::Duplicate)
            }
            Err(err) => Err(SqliteStoreError::Db(err.to_string())),
        }
    }

    /// Runs a filtered, ordered, paginated query plus the filtered total.
    fn query_messages(&self, query: &MessageQuery) -> Result<MessagePage, SqliteStoreError> {
        let (where_clause, filter_params) = build_filters(query);
        let guard = self
            .connection
            .lock()
            .map_err(|_| SqliteStoreError::Db("mutex poisoned".to_string()))?;

        let count_sql = format!("SELECT COUNT(*) FROM messages {where_clause}");
        let total: i64 = guard
            .query_row(&count_sql, params_from_iter(filter_params.iter()), |row| row.get(0))
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;

        let page_sql = format!(
            "SELECT message_id, from_address, to_address, ts, text, ingested_at FROM messages \
             {where_clause} ORDER BY ts ASC, message_id ASC LIMIT ? OFFSET ?"
        );
        let mut values: Vec<Box<dyn ToSql>> = filter_params
            .iter()
            .map(|value| Box::new(value.clone()) as Box<dyn ToSql>)
            .collect();
        values.push(Box::new(i64::from(query.limit)));
        values.push(Box::new(i64::try_from(query.offset).unwrap_or(i64::MAX)));

        let mut statement =
            guard.prepare(&page_sql).map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let rows = statement
            .query_map(params_from_iter(values.iter().map(|value| &**value)), row_to_message)
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let mut messages = Vec::new();
        for row in rows {
            messages.push(row.map_err(|err| SqliteStoreError::Db(err.to_string()))?);
        }
        Ok(MessagePage {
            messages,
            total: u64::try_from(total).unwrap_or(0),
        })
    }

    /// Computes aggregate statistics across all stored messages.
    fn collect_stats(&self) -> Result<StoreStats, SqliteStoreError> {
        let guard = self
            .connection
            .lock()
            .map_err(|_| SqliteStoreError::Db("mutex poisoned".to_string()))?;

        let total_messages: i64 = guard
            .query_row("SELECT COUNT(*) FROM messages", params![], |row| row.get(0))
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let senders_count: i64 = guard
            .query_row("SELECT COUNT(DISTINCT from_address) FROM messages", params![], |row| {
                row.get(0)
            })
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;

        let mut statement = guard
            .prepare(
                "SELECT from_address, COUNT(*) AS cnt FROM messages GROUP BY from_address ORDER \
                 BY cnt DESC, from_address ASC LIMIT ?",
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let sender_rows = statement
            .query_map(params![top_senders_limit()], |row| {
                let from_address: String = row.get(0)?;
                let count: i64 = row.get(1)?;
                Ok(SenderCount {
                    from_address,
                    count: u64::try_from(count).unwrap_or(0),
                })
            })
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let mut messages_per_sender = Vec::new();
        for row in sender_rows {
            messages_per_sender.push(row.map_err(|err| SqliteStoreError::Db(err.to_string()))?);
        }

        let (first_message_ts, last_message_ts): (Option<String>, Option<String>) = guard
            .query_row("SELECT MIN(ts), MAX(ts) FROM messages", params![], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;

        Ok(StoreStats {
            total_messages: u64::try_from(total_messages).unwrap_or(0),
            senders_count: u64::try_from(senders_count).unwrap_or(0),
            messages_per_sender,
            first_message_ts,
            last_message_ts,
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Maps one result row to the message entity.
fn row_to_message(row: &rusqlite::Row<'_>) -> Result<Message, rusqlite::Error> {
    let message_id: String = row.get(0)?;
    Ok(Message {
        message_id: MessageId::new(message_id),
        from_address: row.get(1)?,
        to_address: row.get(2)?,
        timestamp: row.get(3)?,
        text: row.get(4)?,
        ingested_at: row.get(5)?,
    })
}

/// Builds the AND-combined WHERE clause and its string parameters.
fn build_filters(query: &MessageQuery) -> (String, Vec<String>) {
    let mut conditions = Vec::new();
    let mut filter_params = Vec::new();
    if let Some(from_address) = query.from_address.as_deref() {
        conditions.push("from_address = ?");
        filter_params.push(from_address.to_string());
    }
    if let Some(since) = query.since.as_deref() {
        conditions.push("ts >= ?");
        filter_params.push(since.to_string());
    }
    if let Some(needle) = query.text_contains.as_deref() {
        conditions.push("text LIKE ? ESCAPE '\\'");
        filter_params.push(format!("%{}%", escape_like(needle)));
    }
    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };
    (where_clause, filter_params)
}

/// Escapes LIKE metacharacters so the needle matches literally.
fn escape_like(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len());
    for ch in needle.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Returns the top-sender row cap as an SQL parameter.
fn top_senders_limit() -> i64 {
    i64::try_from(TOP_SENDERS_LIMIT).unwrap_or(10)
}

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.exists() && path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with durable defaults.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteStoreError> {
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}

/// Initializes the `SQLite` schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS messages (
                    message_id TEXT PRIMARY KEY,
                    from_address TEXT NOT NULL,
                    to_address TEXT NOT NULL,
                    ts TEXT NOT NULL,
                    text TEXT,
                    ingested_at TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_messages_ts ON messages (ts);
                CREATE INDEX IF NOT EXISTS idx_messages_from ON messages (from_address);",
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))
}
