// src/main.rs
use actix_web::{App, HttpResponse, HttpServer, middleware, web};
use log::{error, info, warn};
use std::sync::Arc;

mod config;
mod errors;
mod handlers;
mod models;
mod services;

use crate::config::AppConfig;
use crate::handlers::{
    clear_image, create_session, download, generate, get_session, list_sessions, options,
    update_config, upload_image,
};
use crate::services::{CreativeModel, GeminiService, ImageProcessor, SessionStore};

#[derive(Clone)]
pub struct AppState {
    sessions: Arc<SessionStore>,
    model: Arc<dyn CreativeModel>,
    image_processor: Arc<ImageProcessor>,
}

/// Config events may carry images inline as data URLs, which grow by a third
/// over the raw bytes.
const JSON_LIMIT_BYTES: usize = 34 * 1024 * 1024;

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .app_data(web::JsonConfig::default().limit(JSON_LIMIT_BYTES))
            .route("/options", web::get().to(options))
            .route("/sessions", web::post().to(create_session))
            .route("/sessions", web::get().to(list_sessions))
            .route("/sessions/{session_id}", web::get().to(get_session))
            .route("/sessions/{session_id}/config", web::patch().to(update_config))
            .route(
                "/sessions/{session_id}/images/{slot}",
                web::post().to(upload_image),
            )
            .route(
                "/sessions/{session_id}/images/{slot}",
                web::delete().to(clear_image),
            )
            .route("/sessions/{session_id}/generate", web::post().to(generate))
            .route("/sessions/{session_id}/download", web::get().to(download)),
    )
    .route("/health", web::get().to(health_check));
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    info!("Starting thumbsmith service...");

    let config = AppConfig::from_env().map_err(|e| {
        error!("{}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;
    if config.gemini.api_key.is_none() {
        warn!("GEMINI_API_KEY is not set; generation requests will fail");
    }

    let model = GeminiService::new(config.gemini.clone())
        .map_err(|e| std::io::Error::other(e.to_string()))?;

    let app_state = AppState {
        sessions: Arc::new(SessionStore::new()),
        model: Arc::new(model),
        image_processor: Arc::new(
            ImageProcessor::new(config.max_upload_dimension)
                .with_max_upload_bytes(config.max_upload_bytes),
        ),
    };

    info!("Starting HTTP server on {}", config.bind_addr);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(middleware::Logger::default())
            .configure(routes)
    })
    .bind(&config.bind_addr)?
    .run()
    .await
}

async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "thumbsmith",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
