use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::info;

use crate::auth::SessionUser;
use crate::db::Database;
use crate::error::AppError;
use crate::models::examiner::{ExaminerFilter, ExaminerInput};

pub async fn list_examiners(
    db: web::Data<Database>,
    filter: web::Query<ExaminerFilter>,
) -> Result<HttpResponse, AppError> {
    let examiners = db.list_examiners(&filter).await?;
    Ok(HttpResponse::Ok().json(examiners))
}

pub async fn get_examiner(
    db: web::Data<Database>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    match db.get_examiner_detail(id).await? {
        Some(detail) => Ok(HttpResponse::Ok().json(detail)),
        None => Err(AppError::not_found("Examiner")),
    }
}

pub async fn create_examiner(
    db: web::Data<Database>,
    session: SessionUser,
    input: web::Json<ExaminerInput>,
) -> Result<HttpResponse, AppError> {
    let user_id = session.require_user_id()?;
    let examiner = input.into_inner().validate()?;
    let id = db.insert_examiner(&examiner, user_id).await?;

    info!("[API] User {} added examiner {} ({})", user_id, id, examiner.name);
    Ok(HttpResponse::Created().json(json!({ "id": id })))
}
