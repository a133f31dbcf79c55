mod config;
mod error_response;
mod routes;
mod state;

use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tower_http::trace::TraceLayer;
use wallet_ledger::Engine;
use wallet_ledger::adapters::PostgresAdapter;

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() {
    if let Err(err) = dotenvy::dotenv() {
        if !err.not_found() {
            eprintln!("failed to load .env: {err}");
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("{err}");
            std::process::exit(1);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(config.web_concurrency)
        .connect(&config.database_url)
        .await
        .unwrap_or_else(|err| {
            tracing::error!("failed to connect to Postgres: {err}");
            std::process::exit(1);
        });

    let engine = Engine::new(PostgresAdapter::new(pool));
    engine.init_schema().await.unwrap_or_else(|err| {
        tracing::error!("failed to bootstrap schema: {err}");
        std::process::exit(1);
    });

    let state = AppState::new(engine);
    let app = routes::router(state).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .unwrap_or_else(|err| {
            tracing::error!("failed to bind port {}: {err}", config.port);
            std::process::exit(1);
        });

    tracing::info!(port = config.port, "wallet service listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap_or_else(|err| tracing::error!("server error: {err}"));
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
