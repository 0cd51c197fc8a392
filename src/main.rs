use actix_web::middleware::{Logger, NormalizePath};
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use std::sync::Arc;

mod api;
mod auth;
mod config;
mod db;
mod docs;
mod error;
mod model;
mod models;
mod routes;
mod storage;
mod utils;

use config::Config;
use db::{init_db, run_migrations};
use storage::{LocalBucket, ObjectStore};

use crate::docs::ApiDoc;
use crate::utils::email_registry::EmailRegistry;
use tracing::{error, info};
use tracing_appender::rolling;
use utoipa::OpenApi; // ← needed for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    let pool = init_db(&config.database_url).await?;
    if config.run_migrations {
        run_migrations(&pool).await?;
    }

    let store: Arc<dyn ObjectStore> = Arc::new(LocalBucket::new(&config.storage_root)?);
    let store = Data::from(store);

    let registry = Data::new(EmailRegistry::default());
    let warmup_pool = pool.clone();
    let warmup_registry = registry.clone();

    actix_web::rt::spawn(async move {
        // every email into the filter, last 30 days of sign-ins into the cache
        if let Err(e) = warmup_registry.warm_up(&warmup_pool, 250, 30).await {
            error!(error = ?e, "Failed to warm up email registry");
        }
    });

    let server_addr = config.server_addr.clone();
    let config_data = Data::new(config);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // ← important: wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(pool.clone()))
            .app_data(config_data.clone())
            .app_data(store.clone())
            .app_data(registry.clone())
            // Configure auth + protected routes with rate limiting
            .configure(|cfg| routes::configure(cfg, config_data.get_ref().clone()))
    })
    .bind(server_addr)?
    .run()
    .await?;

    Ok(())
}
