//! Database Connection and Setup
//!
//! Manages the SQLite connection and the tagging schema.

use rusqlite::{Connection, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::TagsConfig;
use crate::domain::{DomainError, DomainResult, DEFAULT_LINK_NAME};

/// Connection handle shared by all repositories
pub type SharedConnection = Arc<Mutex<Option<Connection>>>;

/// Database state wrapper
#[derive(Clone)]
pub struct DbState {
    conn: SharedConnection,
    db_path: PathBuf,
}

impl DbState {
    pub fn new(db_path: PathBuf) -> Self {
        Self {
            conn: Arc::new(Mutex::new(None)),
            db_path,
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Shared connection slot, `None` until initialised
    pub fn connection(&self) -> SharedConnection {
        self.conn.clone()
    }

    pub async fn is_initialized(&self) -> bool {
        self.conn.lock().await.is_some()
    }

    /// Close the connection; repositories report "not initialized" afterwards
    pub async fn close(&self) {
        self.conn.lock().await.take();
    }
}

/// Initialize database with path
pub async fn init_db(db_path: &Path, config: &TagsConfig) -> DomainResult<DbState> {
    config.validate()?;

    let conn = Connection::open(db_path)
        .map_err(|e| DomainError::Internal(format!("Failed to open db: {}", e)))?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    run_migrations(&conn, config)?;

    let state = DbState::new(db_path.to_path_buf());
    *state.conn.lock().await = Some(conn);
    log::info!("Tag store ready at {}", db_path.display());

    Ok(state)
}

/// DDL for the tagging tables, in execution order.
///
/// Hosts that manage their own migrations can publish these statements instead of
/// calling `init_db`.
pub fn schema_statements(config: &TagsConfig) -> Vec<String> {
    let table = &config.taggable.table_name;
    let type_col = config.taggable.type_column();
    let id_col = config.taggable.id_column();

    vec![
        "CREATE TABLE IF NOT EXISTS tags (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            slug TEXT NOT NULL,
            type TEXT,
            order_column INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL DEFAULT 0,
            updated_at INTEGER NOT NULL DEFAULT 0
        )"
        .to_string(),
        "CREATE INDEX IF NOT EXISTS idx_tags_name_type ON tags(name, type)".to_string(),
        "CREATE TABLE IF NOT EXISTS tag_translations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
            field TEXT NOT NULL,
            locale TEXT NOT NULL,
            value TEXT NOT NULL,
            UNIQUE (tag_id, field, locale)
        )"
        .to_string(),
        "CREATE INDEX IF NOT EXISTS idx_tag_translations_value ON tag_translations(value, locale)"
            .to_string(),
        format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
                {type_col} TEXT NOT NULL,
                {id_col} INTEGER NOT NULL,
                link_name TEXT NOT NULL DEFAULT '{DEFAULT_LINK_NAME}',
                type TEXT
            )"
        ),
        format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_{table}_unique
             ON {table}(tag_id, {type_col}, {id_col}, link_name)"
        ),
        format!("CREATE INDEX IF NOT EXISTS idx_{table}_owner ON {table}({type_col}, {id_col})"),
    ]
}

/// Check if a column exists in a table
fn column_exists(conn: &Connection, table: &str, column: &str) -> DomainResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
    for name in names {
        if name? == column {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Run database migrations
pub fn run_migrations(conn: &Connection, config: &TagsConfig) -> DomainResult<()> {
    let statements = schema_statements(config);
    let (tables, indexes): (Vec<_>, Vec<_>) = statements
        .iter()
        .partition(|sql| sql.trim_start().starts_with("CREATE TABLE"));

    for sql in tables {
        conn.execute(sql, [])?;
    }

    // Link tables created before link names and pivot types existed
    let table = &config.taggable.table_name;
    if !column_exists(conn, table, "link_name")? {
        conn.execute(
            &format!(
                "ALTER TABLE {} ADD COLUMN link_name TEXT NOT NULL DEFAULT '{}'",
                table, DEFAULT_LINK_NAME
            ),
            [],
        )
        .map_err(|e| DomainError::Internal(format!("Failed to add link_name: {}", e)))?;
    }
    if !column_exists(conn, table, "type")? {
        conn.execute(&format!("ALTER TABLE {} ADD COLUMN type TEXT", table), [])
            .map_err(|e| DomainError::Internal(format!("Failed to add type: {}", e)))?;
    }

    for sql in indexes {
        conn.execute(sql, [])?;
    }

    Ok(())
}

/// Run `f` inside an immediate transaction, committing only on success
pub(crate) fn write_transaction<T>(
    conn: &mut Connection,
    f: impl FnOnce(&Connection) -> DomainResult<T>,
) -> DomainResult<T> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let out = f(&tx)?;
    tx.commit()?;
    Ok(out)
}

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
