// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP handlers for the contact-form gateway.

use crate::config::MetricsConfig;
use crate::error::IntakeError;
use crate::pipeline::{request_span, IntakePipeline, IntakeRequest};
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, Request},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, Instrument};

/// Shared application state.
pub struct AppState {
    pub pipeline: IntakePipeline,
    pub metrics: MetricsConfig,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub sites: usize,
}

/// Liveness probe.
pub async fn health() -> &'static str {
    "ok"
}

/// Readiness probe with build details.
pub async fn healthz(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "form-courier",
        version: env!("CARGO_PKG_VERSION"),
        sites: state.pipeline.tenants().len(),
    })
}

/// Prometheus text exposition.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    match state.pipeline.metrics().render() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(err) => {
            error!(error = %err, "Failed to encode metrics");
            IntakeError::Internal.into_response()
        }
    }
}

/// Contact submissions for every site, any method.
pub async fn contact(State(state): State<Arc<AppState>>, request: Request<Body>) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let (parts, body) = request.into_parts();
    let span = request_span(&parts.method, parts.uri.path());

    let intake = IntakeRequest {
        method: parts.method,
        path: parts.uri.path().to_string(),
        headers: parts.headers,
        peer,
        body,
    };

    state
        .pipeline
        .handle(intake, &span)
        .instrument(span.clone())
        .await
        .into_response()
}
