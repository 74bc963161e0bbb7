//! Session and password helpers.
//!
//! The session cookie only ever carries the numeric id of the logged-in
//! user. Handlers take a [`SessionUser`] and ask it for the id, so none of
//! them touch `actix_session` directly.

use std::sync::OnceLock;

use actix_session::{storage::CookieSessionStore, Session, SessionMiddleware};
use actix_web::{cookie::Key, dev::Payload, web, FromRequest, HttpRequest};
use argon2::Argon2;
use futures::future::LocalBoxFuture;
use password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use tracing::warn;

use crate::error::AppError;

pub const SESSION_COOKIE: &str = "gouge_session";
const USER_ID_KEY: &str = "user_id";

/// Cookie-backed session middleware used by the server and the tests.
pub fn session_middleware(key: Key, secure: bool) -> SessionMiddleware<CookieSessionStore> {
    SessionMiddleware::builder(CookieSessionStore::default(), key)
        .cookie_name(SESSION_COOKIE.to_owned())
        .cookie_secure(secure)
        .build()
}

#[derive(Clone)]
pub struct SessionUser(Session);

impl SessionUser {
    pub fn new(session: Session) -> Self {
        Self(session)
    }

    /// The logged-in user, or `None` for anonymous requests.
    pub fn user_id(&self) -> Option<i64> {
        match self.0.get::<i64>(USER_ID_KEY) {
            Ok(id) => id,
            Err(e) => {
                // an unreadable cookie is treated as no session at all
                warn!("discarding unreadable session: {e}");
                self.0.purge();
                None
            }
        }
    }

    pub fn require_user_id(&self) -> Result<i64, AppError> {
        self.user_id().ok_or(AppError::Unauthorized)
    }

    pub fn log_in(&self, user_id: i64) -> Result<(), AppError> {
        self.0.renew();
        self.0
            .insert(USER_ID_KEY, user_id)
            .map_err(|e| AppError::Internal(format!("failed to persist session: {e}")))
    }

    pub fn log_out(&self) {
        self.0.purge();
    }
}

impl FromRequest for SessionUser {
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let fut = Session::from_request(req, payload);
        Box::pin(async move { fut.await.map(SessionUser::new) })
    }
}

/// Hash a plain password with argon2id on the blocking pool.
pub async fn hash_password(password: String) -> Result<String, AppError> {
    run_blocking(move || hash_sync(&password)).await?
}

/// Check a login attempt on the blocking pool.
///
/// Unknown accounts are checked against a throwaway hash so they take as
/// long to reject as a wrong password.
pub async fn verify_login(password: String, stored: Option<String>) -> Result<bool, AppError> {
    run_blocking(move || match stored {
        Some(hash) => Ok(verify_sync(&password, &hash)),
        None => {
            verify_sync(&password, unknown_account_hash()?);
            Ok(false)
        }
    })
    .await?
}

async fn run_blocking<F, R>(f: F) -> Result<R, AppError>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    web::block(f)
        .await
        .map_err(|e| AppError::Internal(format!("password task failed: {e}")))
}

static UNKNOWN_ACCOUNT_HASH: OnceLock<String> = OnceLock::new();

fn unknown_account_hash() -> Result<&'static str, AppError> {
    if let Some(hash) = UNKNOWN_ACCOUNT_HASH.get() {
        return Ok(hash);
    }
    let hash = hash_sync("no such account")?;
    Ok(UNKNOWN_ACCOUNT_HASH.get_or_init(|| hash))
}

fn hash_sync(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))
}

fn verify_sync(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}
