//! Route table for the DPE gouge API.
//! Shared by `main` and the integration tests so both serve the same surface.
use actix_web::{web, HttpRequest};

use crate::api::{auth, examiners, gouges, health};
use crate::error::AppError;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .app_data(query_config())
        .service(
            web::scope("/api")
                .route("/health", web::get().to(health))
                .route("/auth/register", web::post().to(auth::register))
                .route("/auth/login", web::post().to(auth::login))
                .route("/auth/logout", web::post().to(auth::logout))
                .route("/auth/me", web::get().to(auth::me))
                .route("/examiners", web::get().to(examiners::list_examiners)) // GET /api/examiners?search=&state=
                .route("/examiners", web::post().to(examiners::create_examiner))
                .route("/examiners/{id}", web::get().to(examiners::get_examiner))
                .route("/examiners/{id}/gouges", web::get().to(gouges::list_gouges)) // ?sort=recent|helpful|highest|lowest
                .route("/examiners/{id}/gouges", web::post().to(gouges::create_gouge))
                .route("/gouges/{id}", web::put().to(gouges::update_gouge))
                .route("/gouges/{id}", web::delete().to(gouges::delete_gouge))
                .route("/gouges/{id}/vote", web::post().to(gouges::vote)),
        );
}

// Malformed bodies and query strings get the same JSON error shape as
// every other 400.
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req: &HttpRequest| {
        bad_request(format!("Invalid request body: {err}"))
    })
}

fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req: &HttpRequest| {
        bad_request(format!("Invalid query string: {err}"))
    })
}

fn bad_request(message: String) -> actix_web::Error {
    AppError::BadRequest(message).into()
}
