use rusqlite::{params, OptionalExtension, TransactionBehavior};
use tracing::{debug, info};

use super::Database;
use crate::error::AppError;
use crate::models::vote::{apply_vote, LedgerAction, VoteState, VoteTally};

impl Database {
    /// Move `voter` to `requested` on one gouge.
    ///
    /// The ledger row and the `thumbs_up`/`thumbs_down` counters change in
    /// the same write transaction, so concurrent voters cannot make the
    /// counters drift from the ledger.
    pub async fn cast_vote(&self, gouge_id: i64, voter: i64, requested: VoteState) -> Result<VoteTally, AppError> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let author = tx
            .query_row("SELECT user_id FROM gouges WHERE id = ?", [gouge_id], |row| {
                row.get::<_, i64>(0)
            })
            .optional()?;
        match author {
            None => return Err(AppError::not_found("Gouge")),
            Some(author) if author == voter => {
                return Err(AppError::BadRequest("Cannot vote on your own review".into()))
            }
            Some(_) => {}
        }

        let existing = tx
            .query_row(
                "SELECT vote_type FROM votes WHERE gouge_id = ? AND user_id = ?",
                [gouge_id, voter],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        let current = VoteState::from_ledger(existing)?;
        let transition = apply_vote(current, requested);

        match transition.ledger {
            LedgerAction::Keep => {}
            LedgerAction::Insert(value) => {
                tx.execute(
                    "INSERT INTO votes (gouge_id, user_id, vote_type) VALUES (?, ?, ?)",
                    [gouge_id, voter, value],
                )?;
            }
            LedgerAction::Update(value) => {
                tx.execute(
                    "UPDATE votes SET vote_type = ? WHERE gouge_id = ? AND user_id = ?",
                    [value, gouge_id, voter],
                )?;
            }
            LedgerAction::Delete => {
                tx.execute(
                    "DELETE FROM votes WHERE gouge_id = ? AND user_id = ?",
                    [gouge_id, voter],
                )?;
            }
        }

        if !transition.is_noop() {
            tx.execute(
                "UPDATE gouges SET thumbs_up = thumbs_up + ?, thumbs_down = thumbs_down + ?
                 WHERE id = ?",
                params![transition.up_delta, transition.down_delta, gouge_id],
            )?;
        }

        let (thumbs_up, thumbs_down) = tx.query_row(
            "SELECT thumbs_up, thumbs_down FROM gouges WHERE id = ?",
            [gouge_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        tx.commit()?;

        if transition.is_noop() {
            debug!("[DB] Vote by user {} on gouge {} unchanged", voter, gouge_id);
        } else {
            info!(
                "[DB] User {} moved vote on gouge {} from {:?} to {:?}",
                voter, gouge_id, current, requested
            );
        }

        Ok(VoteTally {
            thumbs_up,
            thumbs_down,
            user_vote: requested.value(),
        })
    }

    /// Count the ledger rows of a gouge as `(up, down)`.
    pub async fn ledger_counts(&self, gouge_id: i64) -> Result<(i64, i64), AppError> {
        let counts = self
            .query_one(
                "SELECT
                    COALESCE(SUM(CASE WHEN vote_type = 1 THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN vote_type = -1 THEN 1 ELSE 0 END), 0)
                 FROM votes WHERE gouge_id = ?",
                [gouge_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .await?;
        Ok(counts.unwrap_or((0, 0)))
    }

    /// Rebuild the cached counters of a gouge from its ledger.
    pub async fn recount_votes(&self, gouge_id: i64) -> Result<(i64, i64), AppError> {
        let result = self
            .execute(
                "UPDATE gouges SET
                    thumbs_up = (SELECT COUNT(*) FROM votes WHERE gouge_id = ?1 AND vote_type = 1),
                    thumbs_down = (SELECT COUNT(*) FROM votes WHERE gouge_id = ?1 AND vote_type = -1)
                 WHERE id = ?1",
                [gouge_id],
            )
            .await?;
        if result.affected == 0 {
            return Err(AppError::not_found("Gouge"));
        }
        self.ledger_counts(gouge_id).await
    }
}
