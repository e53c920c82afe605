use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{header, HeaderName, HeaderValue};
use lex_backend::config::Config;
use lex_backend::lex::{LexConfig, LexEngine};
use lex_backend::logging::{init_tracing, LogConfig};
use lex_backend::routes::build_router;
use lex_backend::seed::seed_demo_data;
use lex_backend::state::AppState;
use lex_backend::store::Store;
use lex_backend::workers::WorkerManager;
use tokio::sync::broadcast;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

const CSP_HEADER: &str = "default-src 'none'; frame-ancestors 'none'";
const HSTS_HEADER: &str = "max-age=31536000; includeSubDomains";

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    dotenvy::dotenv().ok();

    let config = Config::from_env();

    init_tracing(&LogConfig {
        log_level: config.log_level.clone(),
        enable_file_logs: config.enable_file_logs,
        log_dir: config.log_dir.clone(),
    });
    tracing::info!(?config, "Starting lex-backend");

    let store = Arc::new(Store::open(&config.sled_path)?);
    store.run_migrations()?;

    if config.seed_demo_data {
        seed_demo_data(&store)?;
    }

    let (shutdown_tx, _) = broadcast::channel::<()>(8);

    let lex_config = LexConfig::from_env(&config.lex);
    let engine = Arc::new(LexEngine::new(lex_config, store.clone()));

    let state = AppState::new(store.clone(), engine.clone(), &config, shutdown_tx.clone());

    let worker_handle = if config.worker.is_leader {
        let worker_manager =
            WorkerManager::new(engine.clone(), shutdown_tx.subscribe(), &config.worker);
        Some(tokio::spawn(async move {
            if let Err(e) = worker_manager.start().await {
                tracing::error!(error = %e, "Worker manager failed");
            }
        }))
    } else {
        None
    };

    let app = build_router(state)
        .layer(build_cors_layer(&config)?)
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new())
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("content-security-policy"),
            HeaderValue::from_static(CSP_HEADER),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("strict-transport-security"),
            HeaderValue::from_static(HSTS_HEADER),
        ));

    let addr = SocketAddr::new(config.host, config.port);
    tracing::info!(%addr, "Listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let server_future = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal(shutdown_tx.clone()));

    if let Err(e) = server_future.await {
        tracing::error!(error = %e, "HTTP server crashed");
    }

    if let Some(handle) = worker_handle {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Worker task panicked");
        }
    }

    tracing::info!("Flushing store before exit");
    if let Err(e) = store.flush() {
        tracing::error!(error = %e, "Failed to flush store before exit");
    }
    tracing::info!("Shutdown complete");
    Ok(())
}

fn build_cors_layer(config: &Config) -> Result<CorsLayer, BoxError> {
    let allowed_headers = [header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT];
    if config.cors_origin.trim() == "*" {
        // development only; a wildcard origin cannot carry credentials
        return Ok(CorsLayer::new()
            .allow_origin(Any)
            .allow_credentials(false)
            .allow_headers(allowed_headers)
            .allow_methods(Any));
    }

    let origin = config
        .cors_origin
        .parse::<HeaderValue>()
        .map_err(|e| format!("invalid CORS_ORIGIN '{}': {e}", config.cors_origin))?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_headers(allowed_headers)
        .allow_methods(Any))
}

async fn shutdown_signal(shutdown_tx: broadcast::Sender<()>) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable, waiting for Ctrl-C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    tracing::info!("Shutdown signal received");
    let _ = shutdown_tx.send(());
}
