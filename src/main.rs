//! Poe Gateway - Main entry point
//!
//! Loads configuration, builds the router and serves it.

use anyhow::Result;
use chrono::Local;
use poe_gateway::{
    build_router,
    core::{init_metrics, AppConfig, TranslationConfig},
    AppState, UpstreamClient,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Custom time formatter that uses local timezone (respects TZ environment variable)
struct LocalTime;

impl tracing_subscriber::fmt::time::FormatTime for LocalTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        let now = Local::now();
        write!(w, "{}", now.format("%Y-%m-%d %H:%M:%S"))
    }
}

fn init_tracing() {
    let no_color = std::env::var("NO_COLOR").is_ok();

    // Noise suppression for the HTTP stack is always appended, so a bare
    // RUST_LOG=trace does not flood the output with hyper internals.
    let base_filter =
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info,poe_gateway=debug".to_string());
    let filter_str = format!(
        "{},hyper=warn,hyper::proto=warn,h2=warn,reqwest=warn",
        base_filter
    );
    let filter = tracing_subscriber::EnvFilter::new(filter_str);

    if no_color {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_timer(LocalTime)
                    .with_ansi(false),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_timer(LocalTime))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (before reading any environment variables)
    dotenvy::dotenv().ok();

    init_tracing();
    init_metrics();

    let config = AppConfig::from_env();
    let translation = TranslationConfig::load_or_default(&config.config_path);
    let upstream = UpstreamClient::from_config(&config)?;

    let state = Arc::new(AppState::new(
        translation,
        upstream,
        config.image_generation,
    ));
    let app = build_router(state.clone());

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid bind address: {}", e))?;

    tracing::info!("Starting Poe Gateway on {}", addr);
    tracing::info!("Upstream: {}", state.upstream.url());
    tracing::info!("OpenAI API: /v1/chat/completions, /v1/images/generations, /v1/models");
    tracing::info!(
        "Image generation: {}",
        if !state.image_generation {
            "disabled"
        } else if state.translation.supports_aspect() {
            "enabled"
        } else {
            "1024x1024 only"
        }
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
