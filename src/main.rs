// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Form Courier Service
//!
//! Receives contact-form submissions for many sites and relays them by email.
//!
//! ## Configuration
//!
//! Configuration is loaded from environment variables:
//!
//! - `LISTEN_ADDR`: Server bind address (default: 0.0.0.0:3000)
//! - `SITES`: Comma-separated site keys (required)
//! - `<SITE>_TO`: Recipient for a site (required per site)
//! - `SMTP_HOST`, `SMTP_PORT`, `SMTP_USER`, `SMTP_PASS`: Default transport
//! - `RATE_LIMIT_BURST`, `RATE_LIMIT_REFILL_MINUTES`: Token bucket shape
//! - `LOG_FORMAT`: `json` (default) or `text`

use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use form_courier::{
    config::Config,
    handlers::AppState,
    mailer::SmtpMailSender,
    pipeline::IntakePipeline,
    server::{router, shutdown_signal},
};

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let Config {
        listen_addr,
        rate_limit,
        payload,
        metrics,
        smtp,
        tenants,
    } = Config::from_env()?;

    info!(
        listen_addr = %listen_addr,
        sites = ?tenants.keys().collect::<Vec<_>>(),
        burst = rate_limit.burst,
        refill_minutes = rate_limit.refill_minutes,
        max_body_kb = payload.max_body_kb,
        "Starting form courier"
    );

    let sender = Arc::new(SmtpMailSender::new(smtp));
    let pipeline = IntakePipeline::new(tenants, sender, rate_limit, payload)?;
    let state = Arc::new(AppState { pipeline, metrics });

    let sweep_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let dropped = sweep_state.pipeline.sweep_buckets().await;
            if dropped > 0 {
                tracing::debug!(dropped, "Swept idle rate limit buckets");
            }
        }
    });

    let app: Router = router(state);

    let addr: SocketAddr = listen_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Server listening");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// JSON logs unless `LOG_FORMAT=text`; level from `RUST_LOG`.
fn init_tracing() {
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    let text = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("text"));
    if text {
        tracing_subscriber::registry().with(fmt::layer()).with(filter).init();
    } else {
        tracing_subscriber::registry().with(fmt::layer().json()).with(filter).init();
    }
}
