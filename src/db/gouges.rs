use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info, warn};

use super::Database;
use crate::error::AppError;
use crate::models::gouge::{Gouge, NewGouge, SortMode};

fn gouge_from_row(row: &Row<'_>) -> rusqlite::Result<Gouge> {
    let id: i64 = row.get(0)?;
    let tags = match row.get::<_, Option<String>>(10)? {
        Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!("[DB] Gouge {} has unreadable tags: {}", id, e);
            Vec::new()
        }),
        None => Vec::new(),
    };

    Ok(Gouge {
        id,
        examiner_id: row.get(1)?,
        user_id: row.get(2)?,
        username: row.get(3)?,
        checkride_type: row.get(4)?,
        checkride_date: row.get(5)?,
        outcome: row.get(6)?,
        quality_rating: row.get(7)?,
        difficulty_rating: row.get(8)?,
        would_recommend: row.get(9)?,
        tags,
        comment: row.get(11)?,
        oral_topics: row.get(12)?,
        flight_maneuvers: row.get(13)?,
        tips: row.get(14)?,
        thumbs_up: row.get(15)?,
        thumbs_down: row.get(16)?,
        created_at: row.get(17)?,
        user_vote: row.get(18)?,
    })
}

/// Fail unless `user_id` wrote gouge `gouge_id`.
fn ensure_author(conn: &Connection, gouge_id: i64, user_id: i64, action: &str) -> Result<(), AppError> {
    let author = conn
        .query_row("SELECT user_id FROM gouges WHERE id = ?", [gouge_id], |row| {
            row.get::<_, i64>(0)
        })
        .optional()?;

    match author {
        None => Err(AppError::not_found("Review")),
        Some(author) if author != user_id => Err(AppError::Forbidden(format!(
            "You can only {action} your own reviews"
        ))),
        Some(_) => Ok(()),
    }
}

impl Database {
    /// Store a new gouge with zeroed vote counters.
    pub async fn insert_gouge(&self, examiner_id: i64, user_id: i64, gouge: &NewGouge) -> Result<i64, AppError> {
        let tags = gouge.tags_json()?;
        let conn = self.conn.lock().await;

        let examiner = conn
            .query_row("SELECT id FROM examiners WHERE id = ?", [examiner_id], |row| {
                row.get::<_, i64>(0)
            })
            .optional()?;
        if examiner.is_none() {
            return Err(AppError::not_found("Examiner"));
        }

        conn.execute(
            "INSERT INTO gouges (
                examiner_id, user_id, checkride_type, checkride_date, outcome,
                quality_rating, difficulty_rating, would_recommend, tags,
                comment, oral_topics, flight_maneuvers, tips
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                examiner_id,
                user_id,
                gouge.checkride_type,
                gouge.checkride_date,
                gouge.outcome,
                gouge.quality_rating,
                gouge.difficulty_rating,
                gouge.would_recommend,
                tags,
                &gouge.comment,
                &gouge.oral_topics,
                &gouge.flight_maneuvers,
                &gouge.tips,
            ],
        )?;
        let id = conn.last_insert_rowid();
        info!("[DB] Gouge {} added for examiner {} by user {}", id, examiner_id, user_id);
        Ok(id)
    }

    /// Gouges of one examiner in the requested order, each carrying the
    /// viewer's own vote when there is a viewer.
    pub async fn list_gouges(
        &self,
        examiner_id: i64,
        sort: SortMode,
        viewer: Option<i64>,
    ) -> Result<Vec<Gouge>, AppError> {
        let sql = format!(
            "SELECT g.id, g.examiner_id, g.user_id, u.username, g.checkride_type,
                g.checkride_date, g.outcome, g.quality_rating, g.difficulty_rating,
                g.would_recommend, g.tags, g.comment, g.oral_topics, g.flight_maneuvers,
                g.tips, g.thumbs_up, g.thumbs_down, g.created_at,
                (SELECT v.vote_type FROM votes v WHERE v.gouge_id = g.id AND v.user_id = ?1) AS user_vote
             FROM gouges g
             JOIN users u ON g.user_id = u.id
             WHERE g.examiner_id = ?2
             ORDER BY {}",
            sort.order_by()
        );

        let gouges = self
            .query_rows(&sql, params![viewer, examiner_id], gouge_from_row)
            .await?;
        debug!(
            "[DB] Fetched {} gouges for examiner {} sorted by {:?}",
            gouges.len(),
            examiner_id,
            sort
        );
        Ok(gouges)
    }

    pub async fn get_gouge(&self, id: i64, viewer: Option<i64>) -> Result<Option<Gouge>, AppError> {
        self.query_one(
            "SELECT g.id, g.examiner_id, g.user_id, u.username, g.checkride_type,
                g.checkride_date, g.outcome, g.quality_rating, g.difficulty_rating,
                g.would_recommend, g.tags, g.comment, g.oral_topics, g.flight_maneuvers,
                g.tips, g.thumbs_up, g.thumbs_down, g.created_at,
                (SELECT v.vote_type FROM votes v WHERE v.gouge_id = g.id AND v.user_id = ?1) AS user_vote
             FROM gouges g
             JOIN users u ON g.user_id = u.id
             WHERE g.id = ?2",
            params![viewer, id],
            gouge_from_row,
        )
        .await
    }

    /// Check that `user_id` may `action` gouge `id` without changing it.
    pub async fn authorize_gouge(&self, id: i64, user_id: i64, action: &str) -> Result<(), AppError> {
        let conn = self.conn.lock().await;
        ensure_author(&conn, id, user_id, action)
    }

    /// Replace the content of a gouge. Only its author may do this; the
    /// vote counters are left alone.
    pub async fn update_gouge(&self, id: i64, user_id: i64, gouge: &NewGouge) -> Result<(), AppError> {
        let tags = gouge.tags_json()?;
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        ensure_author(&tx, id, user_id, "edit")?;

        tx.execute(
            "UPDATE gouges SET
                checkride_type = ?,
                checkride_date = ?,
                outcome = ?,
                quality_rating = ?,
                difficulty_rating = ?,
                would_recommend = ?,
                tags = ?,
                comment = ?,
                oral_topics = ?,
                flight_maneuvers = ?,
                tips = ?
             WHERE id = ?",
            params![
                gouge.checkride_type,
                gouge.checkride_date,
                gouge.outcome,
                gouge.quality_rating,
                gouge.difficulty_rating,
                gouge.would_recommend,
                tags,
                &gouge.comment,
                &gouge.oral_topics,
                &gouge.flight_maneuvers,
                &gouge.tips,
                id,
            ],
        )?;
        tx.commit()?;

        info!("[DB] Gouge {} updated by user {}", id, user_id);
        Ok(())
    }

    /// Delete a gouge written by `user_id`; its votes are removed with it.
    pub async fn delete_gouge(&self, id: i64, user_id: i64) -> Result<(), AppError> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        ensure_author(&tx, id, user_id, "delete")?;
        tx.execute("DELETE FROM gouges WHERE id = ?", [id])?;
        tx.commit()?;

        info!("[DB] Gouge {} deleted by user {}", id, user_id);
        Ok(())
    }
}
