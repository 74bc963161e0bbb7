use rusqlite::{params, OptionalExtension};
use tracing::debug;

use super::Database;
use crate::error::AppError;
use crate::models::user::{NewUser, User};

impl Database {
    /// Store a new account. Email and username must both be unused.
    pub async fn insert_user(&self, user: &NewUser, password_hash: &str) -> Result<i64, AppError> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        let email_taken = tx
            .query_row("SELECT id FROM users WHERE email = ?", [&user.email], |row| {
                row.get::<_, i64>(0)
            })
            .optional()?
            .is_some();
        if email_taken {
            return Err(AppError::BadRequest("Email already registered".into()));
        }

        let username_taken = tx
            .query_row(
                "SELECT id FROM users WHERE username = ?",
                [&user.username],
                |row| row.get::<_, i64>(0),
            )
            .optional()?
            .is_some();
        if username_taken {
            return Err(AppError::BadRequest("Username already taken".into()));
        }

        tx.execute(
            "INSERT INTO users (email, username, password) VALUES (?, ?, ?)",
            params![&user.email, &user.username, password_hash],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        debug!("[DB] Created user {} ({})", id, user.username);
        Ok(id)
    }

    /// Look up `(id, password hash)` for a login attempt.
    pub async fn find_credentials(&self, email: &str) -> Result<Option<(i64, String)>, AppError> {
        self.query_one(
            "SELECT id, password FROM users WHERE email = ?",
            [email],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .await
    }

    pub async fn get_user(&self, id: i64) -> Result<Option<User>, AppError> {
        self.query_one(
            "SELECT id, email, username, created_at FROM users WHERE id = ?",
            [id],
            |row| {
                Ok(User {
                    id: row.get(0)?,
                    email: row.get(1)?,
                    username: row.get(2)?,
                    created_at: row.get(3)?,
                })
            },
        )
        .await
    }
}
