use std::io;

use actix_web::{middleware::Logger, web, App, HttpServer};
use dpe_gouge::{app, auth::session_middleware, config::Config, db::Database};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[actix_web::main]
async fn main() -> io::Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("dpe_gouge=info,actix_web=info")),
        )
        .init();

    let config = Config::load().map_err(|e| {
        error!("Configuration error: {e}");
        io::Error::other(e)
    })?;

    // Initialize the database
    let db = Database::new(&config.db_path).map_err(io::Error::other)?;
    db.create_schema().await.map_err(io::Error::other)?;
    info!("Schema ready at {}", config.db_path);

    let db = web::Data::new(db);
    let key = config.cookie_key();
    let secure = config.secure_cookies;

    info!("listening on http://{}", &config.addr);

    HttpServer::new(move || {
        App::new()
            .app_data(db.clone())
            .wrap(session_middleware(key.clone(), secure))
            .wrap(Logger::default())
            .configure(app::configure)
    })
    .bind(&config.addr)?
    .run()
    .await
}
