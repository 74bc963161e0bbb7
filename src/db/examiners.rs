use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use tracing::{debug, info};

use super::{json_list, Database};
use crate::error::AppError;
use crate::models::examiner::{Examiner, ExaminerDetail, ExaminerFilter, ExaminerSummary, NewExaminer};
use crate::stats::{ratio_to_pct, round_to_tenth, ExaminerStats, GougeScore, TagTally, LIST_TAG_LIMIT};

const EXAMINER_COLUMNS: &str =
    "e.id, e.name, e.location, e.state, e.certificates, e.phone, e.email, e.website, e.added_by, e.created_at";

fn examiner_from_row(row: &Row<'_>) -> rusqlite::Result<Examiner> {
    Ok(Examiner {
        id: row.get(0)?,
        name: row.get(1)?,
        location: row.get(2)?,
        state: row.get(3)?,
        certificates: json_list(row, 4)?,
        phone: row.get(5)?,
        email: row.get(6)?,
        website: row.get(7)?,
        added_by: row.get(8)?,
        created_at: row.get(9)?,
    })
}

/// Escape `%`, `_` and the escape character itself for a `LIKE ... ESCAPE '\'`.
fn like_pattern(search: &str) -> String {
    let mut pattern = String::with_capacity(search.len() + 2);
    pattern.push('%');
    for c in search.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

impl Database {
    pub async fn insert_examiner(&self, examiner: &NewExaminer, added_by: i64) -> Result<i64, AppError> {
        let certificates = serde_json::to_string(&examiner.certificates)?;
        let result = self
            .execute(
                "INSERT INTO examiners (name, location, state, certificates, phone, email, website, added_by)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    &examiner.name,
                    &examiner.location,
                    &examiner.state,
                    certificates,
                    &examiner.phone,
                    &examiner.email,
                    &examiner.website,
                    added_by,
                ],
            )
            .await?;
        info!("[DB] Examiner {} added by user {}", result.inserted_id, added_by);
        Ok(result.inserted_id)
    }

    /// Examiner record plus review statistics, read under one lock.
    pub async fn get_examiner_detail(&self, id: i64) -> Result<Option<ExaminerDetail>, AppError> {
        let conn = self.conn.lock().await;

        let examiner = conn
            .query_row(
                &format!("SELECT {EXAMINER_COLUMNS} FROM examiners e WHERE e.id = ?"),
                [id],
                examiner_from_row,
            )
            .optional()?;
        let Some(examiner) = examiner else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(
            "SELECT quality_rating, difficulty_rating, would_recommend, outcome, tags
             FROM gouges WHERE examiner_id = ? ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([id], |row| {
            Ok(GougeScore {
                quality_rating: row.get(0)?,
                difficulty_rating: row.get(1)?,
                would_recommend: row.get(2)?,
                outcome: row.get(3)?,
                tags: row.get(4)?,
            })
        })?;
        let mut scores = Vec::new();
        for row in rows {
            scores.push(row?);
        }

        debug!("[DB] Aggregating {} gouges for examiner {}", scores.len(), id);
        Ok(Some(ExaminerDetail {
            examiner,
            stats: ExaminerStats::from_scores(&scores),
        }))
    }

    /// Search examiners with per-examiner review summaries.
    pub async fn list_examiners(&self, filter: &ExaminerFilter) -> Result<Vec<ExaminerSummary>, AppError> {
        let mut sql = String::from(
            "SELECT e.id, e.name, e.location, e.state, e.certificates,
                AVG(g.quality_rating),
                AVG(g.difficulty_rating),
                AVG(g.would_recommend),
                COUNT(g.id) AS total_count,
                json_group_array(json_array(g.id, g.tags))
             FROM examiners e
             LEFT JOIN gouges g ON e.id = g.examiner_id
             WHERE 1=1",
        );
        let mut args: Vec<String> = Vec::new();

        if let Some(search) = filter.search() {
            sql.push_str(
                " AND (e.name LIKE ? ESCAPE '\\' OR e.location LIKE ? ESCAPE '\\' OR e.state LIKE ? ESCAPE '\\')",
            );
            let pattern = like_pattern(search);
            args.extend([pattern.clone(), pattern.clone(), pattern]);
        }
        if let Some(state) = filter.state() {
            sql.push_str(" AND e.state = ?");
            args.push(state);
        }
        sql.push_str(" GROUP BY e.id ORDER BY total_count DESC, e.name ASC");

        let rows = self
            .query_rows(&sql, params_from_iter(args.iter()), |row| {
                // aggregate order is unspecified; ties go to the oldest gouge
                let mut payloads: Vec<(Option<i64>, Option<String>)> = {
                    let raw: String = row.get(9)?;
                    serde_json::from_str(&raw).map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            9,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })?
                };
                payloads.sort_by_key(|(gouge_id, _)| *gouge_id);

                let mut tally = TagTally::default();
                for payload in payloads.iter().filter_map(|(_, tags)| tags.as_deref()) {
                    tally.add_payload(payload);
                }

                Ok(ExaminerSummary {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    location: row.get(2)?,
                    state: row.get(3)?,
                    certificates: json_list(row, 4)?,
                    avg_quality: row.get::<_, Option<f64>>(5)?.map(round_to_tenth),
                    avg_difficulty: row.get::<_, Option<f64>>(6)?.map(round_to_tenth),
                    recommend_pct: row.get::<_, Option<f64>>(7)?.map(ratio_to_pct),
                    total_count: row.get(8)?,
                    top_tags: tally
                        .top(LIST_TAG_LIMIT)
                        .into_iter()
                        .map(|t| t.tag)
                        .collect(),
                })
            })
            .await?;

        debug!("[DB] Examiner search returned {} rows", rows.len());
        Ok(rows)
    }

    pub async fn examiner_exists(&self, id: i64) -> Result<bool, AppError> {
        Ok(self
            .query_one("SELECT id FROM examiners WHERE id = ?", [id], |row| {
                row.get::<_, i64>(0)
            })
            .await?
            .is_some())
    }

    /// Remove an examiner; its gouges and their votes go with it.
    pub async fn delete_examiner(&self, id: i64) -> Result<bool, AppError> {
        let result = self
            .execute("DELETE FROM examiners WHERE id = ?", [id])
            .await?;
        info!("[DB] Examiner deleted: {}", id);
        Ok(result.affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{add_examiner, add_gouge, add_user, create_test_db, gouge_input};
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_a\\b"), "%50\\%\\_a\\\\b%");
    }

    #[tokio::test]
    async fn test_examiner_detail_stats() {
        let db = create_test_db().await;
        let owner = add_user(&db).await;
        let examiner = add_examiner(&db, "Jane Doe", "CA", owner).await;

        for quality in [5, 5, 4, 3] {
            let author = add_user(&db).await;
            add_gouge(&db, examiner, author, quality).await;
        }

        let detail = db.get_examiner_detail(examiner).await.unwrap().unwrap();
        assert_eq!(detail.examiner.name, "Jane Doe");
        assert_eq!(detail.stats.stats.total_count, 4);
        assert_eq!(detail.stats.stats.avg_quality, Some(4.3));
        assert_eq!(detail.stats.stats.recommend_pct, Some(100));
        assert_eq!(detail.stats.stats.pass_count, 4);
        let counts: Vec<_> = detail
            .stats
            .rating_distribution
            .iter()
            .map(|b| (b.rating, b.count))
            .collect();
        assert_eq!(counts, vec![(5, 2), (4, 1), (3, 1), (2, 0), (1, 0)]);

        assert!(db.get_examiner_detail(examiner + 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_examiner_detail() {
        let db = create_test_db().await;
        let owner = add_user(&db).await;
        let examiner = add_examiner(&db, "New Examiner", "WA", owner).await;

        let detail = db.get_examiner_detail(examiner).await.unwrap().unwrap();
        assert_eq!(detail.stats.stats.total_count, 0);
        assert_eq!(detail.stats.stats.avg_quality, None);
        assert_eq!(detail.stats.rating_distribution.len(), 5);
    }

    #[tokio::test]
    async fn test_list_search_and_order() {
        let db = create_test_db().await;
        let owner = add_user(&db).await;
        let busy = add_examiner(&db, "Zed Busy", "TX", owner).await;
        let quiet = add_examiner(&db, "Amy Quiet", "TX", owner).await;
        add_examiner(&db, "Bob Remote", "AK", owner).await;

        let tagged = gouge_input(4, &["fair", "strict"]).validate().unwrap();
        db.insert_gouge(busy, add_user(&db).await, &tagged).await.unwrap();
        let tagged = gouge_input(2, &["strict"]).validate().unwrap();
        db.insert_gouge(busy, add_user(&db).await, &tagged).await.unwrap();

        let all = db.list_examiners(&ExaminerFilter::default()).await.unwrap();
        let names: Vec<_> = all.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Zed Busy", "Amy Quiet", "Bob Remote"]);

        let top = &all[0];
        assert_eq!(top.total_count, 2);
        assert_eq!(top.avg_quality, Some(3.0));
        assert_eq!(top.recommend_pct, Some(100));
        assert_eq!(top.top_tags, vec!["strict".to_string(), "fair".to_string()]);

        let empty = &all[1];
        assert_eq!(empty.id, quiet);
        assert_eq!(empty.total_count, 0);
        assert_eq!(empty.avg_quality, None);
        assert!(empty.top_tags.is_empty());

        let by_state = db
            .list_examiners(&ExaminerFilter {
                search: None,
                state: Some("ak".into()),
            })
            .await
            .unwrap();
        assert_eq!(by_state.len(), 1);

        let by_name = db
            .list_examiners(&ExaminerFilter {
                search: Some("quiet".into()),
                state: None,
            })
            .await
            .unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].id, quiet);

        let wildcard = db
            .list_examiners(&ExaminerFilter {
                search: Some("%".into()),
                state: None,
            })
            .await
            .unwrap();
        assert!(wildcard.is_empty());
    }

    #[tokio::test]
    async fn test_list_tag_ties_follow_gouge_order() {
        let db = create_test_db().await;
        let owner = add_user(&db).await;
        let examiner = add_examiner(&db, "Tie Breaker", "CO", owner).await;

        for tag in ["zulu", "alpha", "mike"] {
            let gouge = gouge_input(4, &[tag]).validate().unwrap();
            db.insert_gouge(examiner, add_user(&db).await, &gouge)
                .await
                .unwrap();
        }
        // alpha and mike tie on two; zulu and bravo on one
        let gouge = gouge_input(3, &["mike", "alpha", "bravo"]).validate().unwrap();
        db.insert_gouge(examiner, add_user(&db).await, &gouge)
            .await
            .unwrap();

        let list = db.list_examiners(&ExaminerFilter::default()).await.unwrap();
        assert_eq!(
            list[0].top_tags,
            vec!["alpha", "mike", "zulu", "bravo"]
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>()
        );

        let detail = db.get_examiner_detail(examiner).await.unwrap().unwrap();
        let detail_tags: Vec<_> = detail.stats.top_tags.iter().map(|t| t.tag.as_str()).collect();
        assert_eq!(detail_tags, vec!["alpha", "mike", "zulu", "bravo"]);
    }

    #[tokio::test]
    async fn test_delete_examiner_cascades() {
        let db = create_test_db().await;
        let owner = add_user(&db).await;
        let examiner = add_examiner(&db, "Gone Soon", "NV", owner).await;
        let author = add_user(&db).await;
        let gouge = add_gouge(&db, examiner, author, 4).await;
        let voter = add_user(&db).await;
        db.cast_vote(gouge, voter, crate::models::vote::VoteState::Up)
            .await
            .unwrap();

        assert!(db.delete_examiner(examiner).await.unwrap());
        assert!(!db.examiner_exists(examiner).await.unwrap());

        let remaining = db
            .query_one(
                "SELECT (SELECT COUNT(*) FROM gouges) + (SELECT COUNT(*) FROM votes)",
                [],
                |row| row.get::<_, i64>(0),
            )
            .await
            .unwrap();
        assert_eq!(remaining, Some(0));
    }
}
