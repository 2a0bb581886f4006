use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use std::io;
use std::sync::Arc;

use social_api::api::{self, AppState};
use social_api::config::Config;
use social_api::store::Store;

#[actix_web::main]
async fn main() -> io::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = Config::from_env().map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    // Initialize store
    let store = Store::new(&config.database_path)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("Failed to initialize database: {}", e)))?;
    log::info!("Database: {}", config.database_path);

    let port = config.port;
    let state = web::Data::new(AppState::new(Arc::new(store), config));

    log::info!("Starting social-api server on port {}", port);

    HttpServer::new(move || {
        let cors = match &state.config.cors_origin {
            Some(origin) => Cors::default().allowed_origin(origin),
            None => Cors::default().allow_any_origin(),
        }
        .allow_any_method()
        .allow_any_header()
        .max_age(3600);

        App::new()
            .wrap(middleware::Logger::default())
            .wrap(cors)
            .app_data(state.clone())
            .configure(api::configure_routes)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
