mod config;
mod db;
mod error;
mod middleware;
mod models;
mod routes;
mod services;
mod utils;

use actix_web::{middleware::Logger, web, App, HttpServer};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::services::division_service::DivisionService;
use crate::services::email_service::{LogMailer, SharedMailer};
use crate::services::user_import_service::UserImportService;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env().map_err(|e| {
        error!("❌ {}", e);
        std::io::Error::other(e.to_string())
    })?;

    info!("🔌 Connecting to database...");
    let db = db::establish_connection(&config.database_url)
        .await
        .map_err(|e| std::io::Error::other(format!("Failed to connect to database: {}", e)))?;
    info!("✅ Database connected!");

    // Schéma + backfill legacy + divisions par défaut
    db::ensure_schema(&db)
        .await
        .map_err(|e| std::io::Error::other(format!("Failed to create schema: {}", e)))?;
    db::mark_legacy_salts(&db)
        .await
        .map_err(|e| std::io::Error::other(format!("Failed to flag legacy credentials: {}", e)))?;
    DivisionService::ensure_default_divisions(&db)
        .await
        .map_err(|e| std::io::Error::other(format!("Failed to create divisions: {}", e)))?;

    // Premier admin (table users vide uniquement)
    if let (Some(email), Some(password)) = (&config.bootstrap_admin_email, &config.bootstrap_admin_password) {
        match UserImportService::create_initial_users(&db, email, password).await {
            Ok(Some(seeded)) => info!(email = %seeded.email, "👤 Bootstrap admin ready"),
            Ok(None) => {}
            Err(e) => warn!("⚠️  Bootstrap admin not created: {}", e),
        }
    }

    if config.allow_legacy_passwords {
        warn!("⚠️  Legacy (unsalted) password login is enabled");
    }

    let mailer: SharedMailer = Arc::new(LogMailer);
    let bind = (config.host.clone(), config.port);
    let max_upload_bytes = config.max_upload_bytes;

    info!("🚀 Starting server on http://{}:{}", bind.0, bind.1);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(web::Data::new(db.clone()))
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(mailer.clone()))
            .app_data(web::PayloadConfig::new(max_upload_bytes))
            .app_data(web::JsonConfig::default().limit(max_upload_bytes))
            .configure(routes::configure_routes)
    })
        .bind(bind)?
        .run()
        .await
}
