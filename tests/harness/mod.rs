// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Test harness for the contact-form gateway.
//!
//! Builds a router over fixture sites with an in-memory mail sender, plus
//! request builders and flood simulation helpers.

#![allow(dead_code)]

pub mod attacks;
pub mod generators;
pub mod metrics;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, Response},
    Router,
};
use form_courier::{
    clock::ManualClock,
    config::{MetricsConfig, PayloadConfig, RateLimitConfig},
    handlers::AppState,
    mailer::{MailError, MailSender},
    message::OutboundMessage,
    pipeline::IntakePipeline,
    server::router,
    tenant::{TenantConfig, TenantRegistry},
};
use std::sync::{Arc, Mutex};

pub const SIGNING_SECRET: &str = "s3cret";

/// One delivered message and the site it was sent for.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub site: String,
    pub message: OutboundMessage,
}

/// Keeps every message instead of sending it.
#[derive(Debug, Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<Delivery>>,
}

impl RecordingSender {
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailSender for RecordingSender {
    async fn send(&self, tenant: &TenantConfig, message: &OutboundMessage) -> Result<(), MailError> {
        self.sent.lock().unwrap().push(Delivery {
            site: tenant.key.clone(),
            message: message.clone(),
        });
        Ok(())
    }
}

/// Fails every delivery.
#[derive(Debug, Default)]
pub struct FailingSender;

#[async_trait]
impl MailSender for FailingSender {
    async fn send(&self, _tenant: &TenantConfig, _message: &OutboundMessage) -> Result<(), MailError> {
        Err(MailError::Transport("connection refused".to_string()))
    }
}

/// Fixture sites:
/// - `acme`: one allowed origin, custom prefix
/// - `open`: wildcard origin
/// - `signed`: requires a body signature
pub fn fixture_sites() -> TenantRegistry {
    TenantRegistry::new([
        TenantConfig::new("acme", "ops@acme.test")
            .with_allowed_origins(["https://acme.test"])
            .with_subject_prefix("[Acme]")
            .with_from_addr("noreply@acme.test"),
        TenantConfig::new("open", "ops@open.test").with_allowed_origins(["*"]),
        TenantConfig::new("signed", "ops@signed.test").with_secret(SIGNING_SECRET),
    ])
    .unwrap()
}

/// Builder for a test application.
pub struct TestApp {
    pub rate_limit: RateLimitConfig,
    pub payload: PayloadConfig,
    pub metrics: MetricsConfig,
    pub clock: Arc<ManualClock>,
}

impl Default for TestApp {
    fn default() -> Self {
        Self {
            rate_limit: RateLimitConfig {
                burst: 3,
                refill_minutes: 1,
                max_buckets: 1_000,
            },
            payload: PayloadConfig::default(),
            metrics: MetricsConfig::default(),
            clock: Arc::new(ManualClock::new()),
        }
    }
}

impl TestApp {
    pub fn burst(mut self, burst: u32) -> Self {
        self.rate_limit.burst = burst;
        self
    }

    pub fn payload(mut self, payload: PayloadConfig) -> Self {
        self.payload = payload;
        self
    }

    pub fn build(self, sender: Arc<dyn MailSender>) -> Router {
        let pipeline = IntakePipeline::new(fixture_sites(), sender, self.rate_limit, self.payload)
            .unwrap()
            .with_clock(self.clock);
        router(Arc::new(AppState {
            pipeline,
            metrics: self.metrics,
        }))
    }
}

/// Router with default settings and a recording sender.
pub fn recording_app() -> (Router, Arc<RecordingSender>) {
    let sender = Arc::new(RecordingSender::default());
    (TestApp::default().build(sender.clone()), sender)
}

pub fn valid_json() -> serde_json::Value {
    serde_json::json!({
        "name": "Alice",
        "email": "alice@example.com",
        "message": "Hello there",
    })
}

pub fn post(site: &str, content_type: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(format!("/v1/contact/{site}"))
        .header(header::CONTENT_TYPE, content_type)
        .header("x-forwarded-for", "203.0.113.7")
        .body(body.into())
        .unwrap()
}

pub fn post_json(site: &str, value: &serde_json::Value) -> Request<Body> {
    post(site, "application/json", serde_json::to_vec(value).unwrap())
}

/// Same request from a different client address.
pub fn from_client(mut request: Request<Body>, client: &str) -> Request<Body> {
    request
        .headers_mut()
        .insert("x-forwarded-for", client.parse().unwrap());
    request
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_str(&body_string(response).await).unwrap()
}
