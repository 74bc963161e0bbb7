//! JSON handlers mounted under `/api` by [`crate::app::configure`].

use actix_web::HttpResponse;
use serde_json::json;

pub mod auth;
pub mod examiners;
pub mod gouges;

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}
