use std::{env, fmt::Display, str::FromStr};

use actix_web::cookie::Key;
use thiserror::Error;
use tracing::{info, warn};

/// Minimum length of `GOUGE_SESSION_KEY`, required by the cookie signer.
pub const SESSION_KEY_BYTES: usize = 64;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid {key} value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

pub struct Config {
    pub addr: String,
    pub db_path: String,
    pub session_key: Option<Vec<u8>>,
    pub secure_cookies: bool,
}

impl Config {
    /// Read settings from the environment, after loading `.env` if present.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            info!("Loaded environment from {}", path.display());
        }

        let session_key = match env::var("GOUGE_SESSION_KEY") {
            Ok(raw) if raw.len() >= SESSION_KEY_BYTES => Some(raw.into_bytes()),
            Ok(raw) => {
                return Err(ConfigError::Invalid {
                    key: "GOUGE_SESSION_KEY",
                    value: "<redacted>".into(),
                    reason: format!(
                        "must be at least {SESSION_KEY_BYTES} bytes, got {}",
                        raw.len()
                    ),
                })
            }
            Err(_) => None,
        };

        Ok(Self {
            addr: try_load("GOUGE_ADDR", "127.0.0.1:3004")?,
            db_path: try_load("GOUGE_DB_PATH", "dpe-gouge.db")?,
            session_key,
            secure_cookies: try_load("GOUGE_SECURE_COOKIES", "false")?,
        })
    }

    /// Cookie signing key. Without a configured key every restart logs
    /// everybody out.
    pub fn cookie_key(&self) -> Key {
        match &self.session_key {
            Some(bytes) => Key::from(bytes.as_slice()),
            None => {
                warn!("GOUGE_SESSION_KEY not set, generating a throwaway session key");
                Key::generate()
            }
        }
    }
}

fn try_load<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    let value = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    match value.parse() {
        Ok(parsed) => Ok(parsed),
        Err(e) => Err(ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse() {
        let port: String = try_load("GOUGE_TEST_UNSET_ADDR", "127.0.0.1:3004").unwrap();
        assert_eq!(port, "127.0.0.1:3004");
        let secure: bool = try_load("GOUGE_TEST_UNSET_SECURE", "false").unwrap();
        assert!(!secure);
    }

    #[test]
    fn bad_value_is_reported() {
        let err = try_load::<bool>("GOUGE_TEST_UNSET_FLAG", "maybe").unwrap_err();
        assert!(err.to_string().contains("GOUGE_TEST_UNSET_FLAG"));
    }
}
