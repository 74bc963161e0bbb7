//! Rating aggregation for examiner detail and list views.
//!
//! The detail view aggregates the raw review scores in memory so the
//! histogram and the averages are always computed from the same rows. The
//! list view gets its averages from a grouped SQL query and only shares the
//! rounding rules and the tag tally defined here.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::models::gouge::Outcome;

/// Number of tags returned on an examiner detail page.
pub const DETAIL_TAG_LIMIT: usize = 10;
/// Number of tags returned per examiner in list views.
pub const LIST_TAG_LIMIT: usize = 5;

/// Round to one decimal place, half away from zero.
pub fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Turn a 0..=1 ratio into a whole percentage.
pub fn ratio_to_pct(ratio: f64) -> i64 {
    (ratio * 100.0).round() as i64
}

/// The per-review columns the aggregation reads.
#[derive(Debug, Clone)]
pub struct GougeScore {
    pub quality_rating: i64,
    pub difficulty_rating: i64,
    pub would_recommend: bool,
    pub outcome: Outcome,
    pub tags: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RatingStats {
    pub avg_quality: Option<f64>,
    pub avg_difficulty: Option<f64>,
    pub total_count: i64,
    pub recommend_pct: Option<i64>,
    pub pass_count: i64,
    pub fail_count: i64,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatingBucket {
    pub rating: i64,
    pub count: i64,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct TagCount {
    pub tag: String,
    pub count: i64,
}

/// Everything the examiner detail page shows about the reviews.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ExaminerStats {
    pub stats: RatingStats,
    pub rating_distribution: Vec<RatingBucket>,
    pub top_tags: Vec<TagCount>,
}

impl ExaminerStats {
    pub fn from_scores(scores: &[GougeScore]) -> Self {
        let stats = RatingStats {
            avg_quality: mean(scores, |s| s.quality_rating as f64).map(round_to_tenth),
            avg_difficulty: mean(scores, |s| s.difficulty_rating as f64).map(round_to_tenth),
            total_count: scores.len() as i64,
            recommend_pct: mean(scores, |s| if s.would_recommend { 1.0 } else { 0.0 })
                .map(ratio_to_pct),
            pass_count: count_outcome(scores, Outcome::Pass),
            fail_count: count_outcome(scores, Outcome::Fail),
        };

        let mut tally = TagTally::default();
        for score in scores {
            if let Some(raw) = &score.tags {
                tally.add_payload(raw);
            }
        }

        Self {
            stats,
            rating_distribution: histogram(scores.iter().map(|s| s.quality_rating)),
            top_tags: tally.top(DETAIL_TAG_LIMIT),
        }
    }
}

fn mean(scores: &[GougeScore], f: impl Fn(&GougeScore) -> f64) -> Option<f64> {
    if scores.is_empty() {
        None
    } else {
        Some(scores.iter().map(f).sum::<f64>() / scores.len() as f64)
    }
}

fn count_outcome(scores: &[GougeScore], outcome: Outcome) -> i64 {
    scores.iter().filter(|s| s.outcome == outcome).count() as i64
}

/// Count ratings into five buckets ordered 5 down to 1.
///
/// Out-of-range ratings cannot be stored, so they are ignored here rather
/// than given a bucket of their own.
pub fn histogram(ratings: impl IntoIterator<Item = i64>) -> Vec<RatingBucket> {
    let mut counts = [0i64; 5];
    for rating in ratings {
        if (1..=5).contains(&rating) {
            counts[(rating - 1) as usize] += 1;
        }
    }

    (1..=5)
        .rev()
        .map(|rating| RatingBucket {
            rating,
            count: counts[(rating - 1) as usize],
        })
        .collect()
}

/// Frequency count of tags that remembers first-seen order for ties.
#[derive(Debug, Default)]
pub struct TagTally {
    counts: Vec<(String, i64)>,
    index: HashMap<String, usize>,
}

impl TagTally {
    pub fn add(&mut self, tag: &str) {
        match self.index.get(tag) {
            Some(&slot) => self.counts[slot].1 += 1,
            None => {
                self.index.insert(tag.to_string(), self.counts.len());
                self.counts.push((tag.to_string(), 1));
            }
        }
    }

    /// Add one serialized tag list. Payloads that are not a JSON array of
    /// strings are skipped.
    pub fn add_payload(&mut self, raw: &str) {
        match serde_json::from_str::<Vec<String>>(raw) {
            Ok(tags) => {
                for tag in &tags {
                    self.add(tag);
                }
            }
            Err(e) => debug!("skipping malformed tag payload {raw:?}: {e}"),
        }
    }

    pub fn top(mut self, limit: usize) -> Vec<TagCount> {
        // stable sort keeps first-seen order among equal counts
        self.counts.sort_by(|a, b| b.1.cmp(&a.1));
        self.counts
            .into_iter()
            .take(limit)
            .map(|(tag, count)| TagCount { tag, count })
            .collect()
    }
}
