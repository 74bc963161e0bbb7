use std::sync::Arc;

use rusqlite::{types::Type, Connection, OptionalExtension, Params, Row};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::error::AppError;

mod examiners;
mod gouges;
mod users;
mod votes;

/// Outcome of a write statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteResult {
    pub inserted_id: i64,
    pub affected: usize,
}

/// Process-wide handle to the SQLite store. Cloning shares the connection.
#[derive(Debug, Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    // Open the database file, or an in-memory store for ":memory:"
    pub fn new(db_path: &str) -> Result<Self, AppError> {
        let conn = Connection::open(db_path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        if db_path != ":memory:" {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        info!("Database connection established at: {}", db_path);
        Ok(Database {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    // Create the database schema
    pub async fn create_schema(&self) -> Result<(), AppError> {
        let conn = self.conn.lock().await;

        // 1. Users table
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT UNIQUE NOT NULL,
                username TEXT UNIQUE NOT NULL,
                password TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );",
        )
        .map_err(|e| {
            error!("Failed creating users table: {}", e);
            e
        })?;

        // 2. Examiners table
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS examiners (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                location TEXT NOT NULL,
                state TEXT NOT NULL,
                certificates TEXT NOT NULL,
                phone TEXT,
                email TEXT,
                website TEXT,
                added_by INTEGER REFERENCES users(id),
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );",
        )
        .map_err(|e| {
            error!("Failed creating examiners table: {}", e);
            e
        })?;

        // Files created before the website field existed
        let has_website: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM pragma_table_info('examiners') WHERE name = 'website'",
            [],
            |row| row.get(0),
        )?;
        if !has_website {
            info!("[DB] Adding examiners.website column");
            conn.execute_batch("ALTER TABLE examiners ADD COLUMN website TEXT;")?;
        }

        // 3. Gouges table
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS gouges (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                examiner_id INTEGER NOT NULL REFERENCES examiners(id) ON DELETE CASCADE,
                user_id INTEGER NOT NULL REFERENCES users(id),
                checkride_type TEXT NOT NULL,
                checkride_date DATE,
                outcome TEXT NOT NULL,
                quality_rating INTEGER NOT NULL CHECK(quality_rating >= 1 AND quality_rating <= 5),
                difficulty_rating INTEGER NOT NULL CHECK(difficulty_rating >= 1 AND difficulty_rating <= 5),
                would_recommend INTEGER NOT NULL,
                tags TEXT,
                comment TEXT NOT NULL,
                oral_topics TEXT,
                flight_maneuvers TEXT,
                tips TEXT,
                thumbs_up INTEGER NOT NULL DEFAULT 0,
                thumbs_down INTEGER NOT NULL DEFAULT 0,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_gouges_examiner ON gouges(examiner_id);",
        )
        .map_err(|e| {
            error!("Failed creating gouges table: {}", e);
            e
        })?;

        // 4. Vote ledger, one row per (gouge, user)
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS votes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                gouge_id INTEGER NOT NULL REFERENCES gouges(id) ON DELETE CASCADE,
                user_id INTEGER NOT NULL REFERENCES users(id),
                vote_type INTEGER NOT NULL CHECK(vote_type IN (-1, 1)),
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(gouge_id, user_id)
            );
            CREATE INDEX IF NOT EXISTS idx_votes_gouge ON votes(gouge_id);",
        )
        .map_err(|e| {
            error!("Failed creating votes table: {}", e);
            e
        })?;

        debug!("[DB] Schema ready");
        Ok(())
    }

    /// Run a query and map every row.
    pub async fn query_rows<T, P, F>(&self, sql: &str, params: P, map: F) -> Result<Vec<T>, AppError>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, map)?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Run a query expected to return at most one row.
    pub async fn query_one<T, P, F>(&self, sql: &str, params: P, map: F) -> Result<Option<T>, AppError>
    where
        P: Params,
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    {
        let conn = self.conn.lock().await;
        Ok(conn.query_row(sql, params, map).optional()?)
    }

    /// Run a write statement.
    pub async fn execute<P: Params>(&self, sql: &str, params: P) -> Result<WriteResult, AppError> {
        let conn = self.conn.lock().await;
        let affected = conn.execute(sql, params)?;
        Ok(WriteResult {
            inserted_id: conn.last_insert_rowid(),
            affected,
        })
    }
}

/// Decode a JSON string-list column. A NULL column is an empty list.
pub(crate) fn json_list(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<String>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(raw) => serde_json::from_str(&raw)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))),
        None => Ok(Vec::new()),
    }
}
