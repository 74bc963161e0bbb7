use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, FieldError};

pub const USERNAME_CHARS: std::ops::RangeInclusive<usize> = 3..=20;
pub const MIN_PASSWORD_CHARS: usize = 6;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RegisterInput {
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

/// Registration data after validation; the password is still plain text.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password: String,
}

impl RegisterInput {
    pub fn validate(self) -> Result<NewUser, AppError> {
        let mut errors = Vec::new();

        let email = normalize_email(&self.email);
        if !looks_like_email(&email) {
            errors.push(FieldError::new("email", "must be a valid email address"));
        }

        let username = self.username.trim().to_string();
        if !USERNAME_CHARS.contains(&username.chars().count()) {
            errors.push(FieldError::new(
                "username",
                format!(
                    "must be {} to {} characters",
                    USERNAME_CHARS.start(),
                    USERNAME_CHARS.end()
                ),
            ));
        }

        if self.password.chars().count() < MIN_PASSWORD_CHARS {
            errors.push(FieldError::new(
                "password",
                format!("must be at least {MIN_PASSWORD_CHARS} characters"),
            ));
        }

        AppError::check(errors)?;

        Ok(NewUser {
            email,
            username,
            password: self.password,
        })
    }
}

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

/// Loose address check: one `@`, a non-empty local part and a dotted domain.
pub fn looks_like_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.contains(char::is_whitespace)
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
}

/// Public view of an account; the password hash never leaves the datastore.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub created_at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shapes() {
        assert!(looks_like_email("pilot@example.com"));
        assert!(looks_like_email("a.b@mail.example.org"));
        assert!(!looks_like_email("pilot"));
        assert!(!looks_like_email("@example.com"));
        assert!(!looks_like_email("pilot@example"));
        assert!(!looks_like_email("pilot@@example.com"));
        assert!(!looks_like_email("pi lot@example.com"));
    }

    #[test]
    fn register_validation() {
        let ok = RegisterInput {
            email: " Pilot@Example.com ".into(),
            username: "cfi_jane".into(),
            password: "secret1".into(),
        }
        .validate()
        .unwrap();
        assert_eq!(ok.email, "pilot@example.com");

        let bad = RegisterInput {
            email: "pilot".into(),
            username: "ab".into(),
            password: "12345".into(),
        }
        .validate();
        match bad {
            Err(AppError::Validation(fields)) => assert_eq!(fields.len(), 3),
            other => panic!("unexpected {other:?}"),
        }
    }
}
