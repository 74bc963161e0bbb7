use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, FieldError};
use crate::models::gouge::non_empty;
use crate::models::user::looks_like_email;
use crate::stats::ExaminerStats;

/// Body of `POST /api/examiners`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ExaminerInput {
    pub name: String,
    pub location: String,
    pub state: String,
    pub certificates: Vec<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewExaminer {
    pub name: String,
    pub location: String,
    pub state: String,
    pub certificates: Vec<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
}

impl ExaminerInput {
    pub fn validate(self) -> Result<NewExaminer, AppError> {
        let mut errors = Vec::new();

        let name = self.name.trim().to_string();
        if name.is_empty() {
            errors.push(FieldError::new("name", "is required"));
        }
        let location = self.location.trim().to_string();
        if location.is_empty() {
            errors.push(FieldError::new("location", "is required"));
        }

        let state = self.state.trim().to_ascii_uppercase();
        if state.len() != 2 || !state.chars().all(|c| c.is_ascii_alphabetic()) {
            errors.push(FieldError::new("state", "must be a two-letter state code"));
        }

        let certificates: Vec<String> = self
            .certificates
            .iter()
            .map(|c| c.trim().to_string())
            .collect();
        if certificates.is_empty() || certificates.iter().any(String::is_empty) {
            errors.push(FieldError::new(
                "certificates",
                "must list at least one certificate",
            ));
        }

        let email = non_empty(self.email);
        if let Some(email) = &email {
            if !looks_like_email(email) {
                errors.push(FieldError::new("email", "must be a valid email address"));
            }
        }

        let website = non_empty(self.website);
        if let Some(site) = &website {
            let rest = site
                .strip_prefix("https://")
                .or_else(|| site.strip_prefix("http://"));
            if !matches!(rest, Some(host) if !host.is_empty() && !host.contains(char::is_whitespace))
            {
                errors.push(FieldError::new("website", "must be an http(s) URL"));
            }
        }

        AppError::check(errors)?;

        Ok(NewExaminer {
            name,
            location,
            state,
            certificates,
            phone: non_empty(self.phone),
            email,
            website,
        })
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Examiner {
    pub id: i64,
    pub name: String,
    pub location: String,
    pub state: String,
    pub certificates: Vec<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub added_by: Option<i64>,
    pub created_at: NaiveDateTime,
}

/// `GET /api/examiners/{id}` payload.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ExaminerDetail {
    #[serde(flatten)]
    pub examiner: Examiner,
    #[serde(flatten)]
    pub stats: ExaminerStats,
}

/// One row of the examiner list with its review summary.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ExaminerSummary {
    pub id: i64,
    pub name: String,
    pub location: String,
    pub state: String,
    pub certificates: Vec<String>,
    pub avg_quality: Option<f64>,
    pub avg_difficulty: Option<f64>,
    pub recommend_pct: Option<i64>,
    pub total_count: i64,
    pub top_tags: Vec<String>,
}

/// Query string of `GET /api/examiners`. Blank values are ignored.
#[derive(Deserialize, Debug, Default, Clone)]
pub struct ExaminerFilter {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

impl ExaminerFilter {
    pub fn search(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn state(&self) -> Option<String> {
        self.state
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_ascii_uppercase)
    }
}
