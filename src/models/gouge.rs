use std::{fmt, str::FromStr};

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, FieldError};

pub const MIN_RATING: i64 = 1;
pub const MAX_RATING: i64 = 5;
pub const MIN_COMMENT_CHARS: usize = 20;

/// Implements string conversions, serde and SQLite storage for a fixed
/// text enumeration.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = ();

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err(()),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let text = value.as_str()?;
                text.parse().map_err(|_| {
                    FromSqlError::Other(format!("unknown {} {text:?}", stringify!($name)).into())
                })
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckrideType {
    Private,
    Instrument,
    Commercial,
    Instructor,
    InstrumentInstructor,
    MultiEngineInstructor,
    AirlineTransport,
    Sport,
}

text_enum!(CheckrideType {
    Private => "PPL",
    Instrument => "IR",
    Commercial => "CPL",
    Instructor => "CFI",
    InstrumentInstructor => "CFII",
    MultiEngineInstructor => "MEI",
    AirlineTransport => "ATP",
    Sport => "Sport",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Pass,
    Fail,
    Discontinue,
}

text_enum!(Outcome {
    Pass => "pass",
    Fail => "fail",
    Discontinue => "discontinue",
});

/// Sort orders for the gouge list of one examiner.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    #[default]
    Recent,
    Helpful,
    Highest,
    Lowest,
}

impl SortMode {
    pub fn order_by(self) -> &'static str {
        match self {
            SortMode::Recent => "g.created_at DESC, g.id DESC",
            SortMode::Helpful => "(g.thumbs_up - g.thumbs_down) DESC, g.id DESC",
            SortMode::Highest => "g.quality_rating DESC, g.id DESC",
            SortMode::Lowest => "g.quality_rating ASC, g.id DESC",
        }
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct GougeListQuery {
    #[serde(default)]
    pub sort: SortMode,
}

/// Review body as submitted for create and update.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct GougeInput {
    pub checkride_type: String,
    #[serde(default)]
    pub checkride_date: Option<String>,
    pub outcome: String,
    pub quality_rating: i64,
    pub difficulty_rating: i64,
    pub would_recommend: bool,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    pub comment: String,
    #[serde(default)]
    pub oral_topics: Option<String>,
    #[serde(default)]
    pub flight_maneuvers: Option<String>,
    #[serde(default)]
    pub tips: Option<String>,
}

/// A review that passed validation and can be written as is.
#[derive(Debug, Clone, PartialEq)]
pub struct NewGouge {
    pub checkride_type: CheckrideType,
    pub checkride_date: Option<NaiveDate>,
    pub outcome: Outcome,
    pub quality_rating: i64,
    pub difficulty_rating: i64,
    pub would_recommend: bool,
    pub tags: Vec<String>,
    pub comment: String,
    pub oral_topics: Option<String>,
    pub flight_maneuvers: Option<String>,
    pub tips: Option<String>,
}

impl NewGouge {
    /// Tags as stored in the `tags` column; `None` when there are none.
    pub fn tags_json(&self) -> Result<Option<String>, AppError> {
        if self.tags.is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::to_string(&self.tags)?))
    }
}

impl GougeInput {
    /// Check every field and report all failures together.
    pub fn validate(self) -> Result<NewGouge, AppError> {
        let mut errors = Vec::new();

        let checkride_type = self.checkride_type.parse::<CheckrideType>().ok();
        if checkride_type.is_none() {
            errors.push(FieldError::new(
                "checkride_type",
                format!("must be one of {}", join(CheckrideType::ALL)),
            ));
        }

        let outcome = self.outcome.parse::<Outcome>().ok();
        if outcome.is_none() {
            errors.push(FieldError::new(
                "outcome",
                format!("must be one of {}", join(Outcome::ALL)),
            ));
        }

        for (field, rating) in [
            ("quality_rating", self.quality_rating),
            ("difficulty_rating", self.difficulty_rating),
        ] {
            if !(MIN_RATING..=MAX_RATING).contains(&rating) {
                errors.push(FieldError::new(
                    field,
                    format!("must be between {MIN_RATING} and {MAX_RATING}"),
                ));
            }
        }

        let comment = self.comment.trim().to_string();
        if comment.chars().count() < MIN_COMMENT_CHARS {
            errors.push(FieldError::new(
                "comment",
                format!("must be at least {MIN_COMMENT_CHARS} characters"),
            ));
        }

        let checkride_date = match non_empty(self.checkride_date) {
            Some(raw) => match NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
                Ok(date) => Some(date),
                Err(_) => {
                    errors.push(FieldError::new("checkride_date", "must be a YYYY-MM-DD date"));
                    None
                }
            },
            None => None,
        };

        let mut tags: Vec<String> = Vec::new();
        for tag in self.tags.unwrap_or_default() {
            let tag = tag.trim();
            if tag.is_empty() {
                errors.push(FieldError::new("tags", "tags must not be empty"));
                break;
            }
            if !tags.iter().any(|t| t == tag) {
                tags.push(tag.to_string());
            }
        }

        AppError::check(errors)?;

        match (checkride_type, outcome) {
            (Some(checkride_type), Some(outcome)) => Ok(NewGouge {
                checkride_type,
                checkride_date,
                outcome,
                quality_rating: self.quality_rating,
                difficulty_rating: self.difficulty_rating,
                would_recommend: self.would_recommend,
                tags,
                comment,
                oral_topics: non_empty(self.oral_topics),
                flight_maneuvers: non_empty(self.flight_maneuvers),
                tips: non_empty(self.tips),
            }),
            _ => Err(AppError::Internal("validated gouge is missing enums".into())),
        }
    }
}

fn join<T: fmt::Display>(values: &[T]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Trim optional free text, treating blank input as absent.
pub fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// A stored review joined with its author and the viewer's vote.
#[derive(Serialize, Debug, Clone)]
pub struct Gouge {
    pub id: i64,
    pub examiner_id: i64,
    pub user_id: i64,
    pub username: String,
    pub checkride_type: CheckrideType,
    pub checkride_date: Option<NaiveDate>,
    pub outcome: Outcome,
    pub quality_rating: i64,
    pub difficulty_rating: i64,
    pub would_recommend: bool,
    pub tags: Vec<String>,
    pub comment: String,
    pub oral_topics: Option<String>,
    pub flight_maneuvers: Option<String>,
    pub tips: Option<String>,
    pub thumbs_up: i64,
    pub thumbs_down: i64,
    pub created_at: NaiveDateTime,
    pub user_vote: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn input() -> GougeInput {
        GougeInput {
            checkride_type: "PPL".into(),
            checkride_date: Some("2024-05-01".into()),
            outcome: "pass".into(),
            quality_rating: 5,
            difficulty_rating: 3,
            would_recommend: true,
            tags: Some(vec!["fair".into(), " thorough ".into(), "fair".into()]),
            comment: "Very fair examiner, knew the ACS.".into(),
            oral_topics: Some("  ".into()),
            flight_maneuvers: None,
            tips: Some("Bring your logbook".into()),
        }
    }

    fn fields(err: AppError) -> Vec<&'static str> {
        match err {
            AppError::Validation(fields) => fields.into_iter().map(|f| f.field).collect(),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn valid_input_is_normalised() {
        let gouge = input().validate().unwrap();
        assert_eq!(gouge.checkride_type, CheckrideType::Private);
        assert_eq!(gouge.outcome, Outcome::Pass);
        assert_eq!(gouge.tags, vec!["fair".to_string(), "thorough".to_string()]);
        assert_eq!(gouge.oral_topics, None);
        assert_eq!(gouge.checkride_date, NaiveDate::from_ymd_opt(2024, 5, 1));
        assert_eq!(
            gouge.tags_json().unwrap().as_deref(),
            Some(r#"["fair","thorough"]"#)
        );
    }

    #[test]
    fn comment_length_boundary() {
        let mut short = input();
        short.comment = "a".repeat(19);
        assert_eq!(fields(short.validate().unwrap_err()), vec!["comment"]);

        let mut exact = input();
        exact.comment = "a".repeat(20);
        assert!(exact.validate().is_ok());
    }

    #[rstest]
    #[case(0, 3, "quality_rating")]
    #[case(6, 3, "quality_rating")]
    #[case(3, 0, "difficulty_rating")]
    #[case(3, 6, "difficulty_rating")]
    fn ratings_out_of_range(#[case] quality: i64, #[case] difficulty: i64, #[case] field: &str) {
        let mut bad = input();
        bad.quality_rating = quality;
        bad.difficulty_rating = difficulty;
        assert_eq!(fields(bad.validate().unwrap_err()), vec![field]);
    }

    #[test]
    fn reports_every_bad_field() {
        let mut bad = input();
        bad.checkride_type = "Glider".into();
        bad.outcome = "maybe".into();
        bad.checkride_date = Some("05/01/2024".into());
        assert_eq!(
            fields(bad.validate().unwrap_err()),
            vec!["checkride_type", "outcome", "checkride_date"]
        );
    }

    #[test]
    fn all_checkride_types_parse() {
        for ty in ["PPL", "IR", "CPL", "CFI", "CFII", "MEI", "ATP", "Sport"] {
            let parsed: CheckrideType = ty.parse().unwrap();
            assert_eq!(parsed.as_str(), ty);
        }
    }

    #[test]
    fn no_tags_store_as_null() {
        let mut plain = input();
        plain.tags = Some(vec![]);
        assert_eq!(plain.validate().unwrap().tags_json().unwrap(), None);
    }
}
