use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::info;

use crate::auth::SessionUser;
use crate::db::Database;
use crate::error::AppError;
use crate::models::gouge::{GougeInput, GougeListQuery};
use crate::models::vote::{VoteBody, VoteState};

pub async fn list_gouges(
    db: web::Data<Database>,
    session: SessionUser,
    path: web::Path<i64>,
    query: web::Query<GougeListQuery>,
) -> Result<HttpResponse, AppError> {
    let examiner_id = path.into_inner();
    if !db.examiner_exists(examiner_id).await? {
        return Err(AppError::not_found("Examiner"));
    }

    let viewer = session.user_id();
    let gouges = db.list_gouges(examiner_id, query.sort, viewer).await?;
    Ok(HttpResponse::Ok().json(gouges))
}

pub async fn create_gouge(
    db: web::Data<Database>,
    session: SessionUser,
    path: web::Path<i64>,
    input: web::Json<GougeInput>,
) -> Result<HttpResponse, AppError> {
    let user_id = session.require_user_id()?;
    let examiner_id = path.into_inner();
    if !db.examiner_exists(examiner_id).await? {
        return Err(AppError::not_found("Examiner"));
    }

    let gouge = input.into_inner().validate()?;
    let id = db.insert_gouge(examiner_id, user_id, &gouge).await?;

    info!("[API] User {} posted gouge {} for examiner {}", user_id, id, examiner_id);
    Ok(HttpResponse::Created().json(json!({ "id": id })))
}

pub async fn update_gouge(
    db: web::Data<Database>,
    session: SessionUser,
    path: web::Path<i64>,
    input: web::Json<GougeInput>,
) -> Result<HttpResponse, AppError> {
    let user_id = session.require_user_id()?;
    let id = path.into_inner();
    db.authorize_gouge(id, user_id, "edit").await?;

    let gouge = input.into_inner().validate()?;
    db.update_gouge(id, user_id, &gouge).await?;
    info!("[API] User {} edited gouge {}", user_id, id);
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

pub async fn delete_gouge(
    db: web::Data<Database>,
    session: SessionUser,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let user_id = session.require_user_id()?;
    let id = path.into_inner();
    db.delete_gouge(id, user_id).await?;
    info!("[API] User {} deleted gouge {}", user_id, id);
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

pub async fn vote(
    db: web::Data<Database>,
    session: SessionUser,
    path: web::Path<i64>,
    body: web::Json<VoteBody>,
) -> Result<HttpResponse, AppError> {
    let user_id = session.require_user_id()?;
    let requested = VoteState::from_request(body.vote)?;
    let tally = db.cast_vote(path.into_inner(), user_id, requested).await?;
    Ok(HttpResponse::Ok().json(tally))
}
