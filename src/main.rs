use std::sync::Arc;
use std::time::Duration;

use actix_web::{middleware, web, App, HttpServer};

use gitrelay::config;
use gitrelay::db;
use gitrelay::routes;
use gitrelay::services::{Dispatcher, Notifier, PgDestinationRegistry, PgEventRecorder};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();

    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = config::Config::from_env().map_err(|e| {
        log::error!("Configuration error: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    log::info!("Starting Gitrelay on {}:{}", config.host, config.port);

    let db_pool = db::create_pool(&config.database).await.map_err(|e| {
        log::error!("Database pool error: {}", e);
        std::io::Error::other(e.to_string())
    })?;

    db::run_migrations(&db_pool).await.map_err(|e| {
        log::error!("Migration error: {}", e);
        std::io::Error::other(e.to_string())
    })?;

    let notifier = Notifier::new(&config.dispatch, config.retry.clone()).map_err(|e| {
        log::error!("HTTP client error: {}", e);
        std::io::Error::other(e.to_string())
    })?;

    if config.security.webhook_secret.is_none() {
        log::warn!("WEBHOOK_SECRET not set, inbound signatures will not be verified");
    }

    let dispatcher = web::Data::new(
        Dispatcher::new(
            Arc::new(PgDestinationRegistry::new(db_pool.clone())),
            Arc::new(PgEventRecorder::new(db_pool.clone())),
            notifier,
            config.dispatch.clone(),
        )
        .with_webhook_secret(config.security.webhook_secret.clone())
        .with_runtime(tokio::runtime::Handle::current()),
    );
    let background = dispatcher.clone();

    let host = config.host.clone();
    let port = config.port;
    let payload_limit = config.max_payload_bytes;

    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(db_pool.clone()))
            .app_data(dispatcher.clone())
            .app_data(web::PayloadConfig::new(payload_limit))
            .wrap(middleware::Logger::default())
            .configure(routes::health::configure)
            .configure(routes::webhook::configure)
            .configure(routes::destinations::configure)
    })
    .bind((host.as_str(), port))?
    .shutdown_timeout(SHUTDOWN_TIMEOUT.as_secs())
    .run();

    let server_handle = server.handle();
    tokio::spawn(async move {
        shutdown_signal().await;
        log::info!("Shutdown signal received, stopping server...");
        server_handle.stop(true).await;
    });

    let result = server.await;

    // Acknowledged webhooks still owe their deliveries and log entries
    background.drain(SHUTDOWN_TIMEOUT).await;
    log::info!("Server stopped");

    result
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
