mod config;
mod error;
mod handlers;
mod mailer;
mod rate_limit;
mod state;

use std::fs::OpenOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::Config;
use crate::mailer::Mailer;
use crate::rate_limit::RateLimiter;
use crate::state::{AppState, SendStats};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    // Configuration problems are fatal; nothing is re-read per request.
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            std::process::exit(1);
        }
    };

    init_tracing(config.log_file.as_deref());

    let transport = match mailer::smtp_transport(&config) {
        Ok(transport) => transport,
        Err(e) => {
            eprintln!(
                "configuration error: invalid SMTP relay {}: {e}",
                config.smtp_host
            );
            std::process::exit(1);
        }
    };

    let state = Arc::new(AppState {
        mailer: Mailer::new(transport, config.smtp_from.clone(), config.from_name.clone()),
        rate_limiter: RateLimiter::new(
            config.rate_limit,
            Duration::from_secs(config.rate_window_secs),
        ),
        stats: SendStats::default(),
        config,
    });

    info!(
        relay = %state.config.smtp_host,
        rate_limit = state.config.rate_limit,
        rate_window_secs = state.config.rate_window_secs,
        "email gateway starting"
    );

    let port = state.config.port;
    let app = handlers::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind address");

    info!("Listening on {}", addr);

    axum::serve(listener, app).await.expect("Failed to run server");
}

// Stdout layer always; append-mode file layer when LOG_FILE is set.
fn init_tracing(log_file: Option<&str>) {
    let env_filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
    );

    let file_layer = log_file.and_then(|path| {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Arc::new(file)),
            ),
            Err(e) => {
                eprintln!("could not open log file {path}: {e}");
                None
            }
        }
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();
}
