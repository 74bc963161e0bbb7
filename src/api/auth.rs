use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::info;

use crate::auth::{hash_password, verify_login, SessionUser};
use crate::db::Database;
use crate::error::AppError;
use crate::models::user::{normalize_email, LoginInput, RegisterInput};

pub async fn register(
    db: web::Data<Database>,
    input: web::Json<RegisterInput>,
) -> Result<HttpResponse, AppError> {
    let user = input.into_inner().validate()?;
    let hash = hash_password(user.password.clone()).await?;
    let id = db.insert_user(&user, &hash).await?;

    info!("[API] Registered user {} ({})", id, user.username);
    Ok(HttpResponse::Created().json(json!({ "id": id })))
}

pub async fn login(
    db: web::Data<Database>,
    session: SessionUser,
    input: web::Json<LoginInput>,
) -> Result<HttpResponse, AppError> {
    let input = input.into_inner();
    let email = normalize_email(&input.email);

    let (user_id, hash) = db.find_credentials(&email).await?.unzip();
    let valid = verify_login(input.password, hash).await?;
    let user_id = match user_id {
        Some(id) if valid => id,
        _ => return Err(AppError::Unauthorized),
    };

    session.log_in(user_id)?;
    let user = db
        .get_user(user_id)
        .await?
        .ok_or_else(|| AppError::Internal(format!("user {user_id} vanished during login")))?;

    info!("[API] User {} logged in", user_id);
    Ok(HttpResponse::Ok().json(user))
}

pub async fn logout(session: SessionUser) -> HttpResponse {
    session.log_out();
    HttpResponse::NoContent().finish()
}

pub async fn me(db: web::Data<Database>, session: SessionUser) -> Result<HttpResponse, AppError> {
    let user_id = session.require_user_id()?;
    match db.get_user(user_id).await? {
        Some(user) => Ok(HttpResponse::Ok().json(user)),
        // account removed under a live session
        None => {
            session.log_out();
            Err(AppError::Unauthorized)
        }
    }
}
