// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! The intake pipeline.
//!
//! A request moves through a fixed sequence of stages; any stage may end it:
//!
//! 1. Preflight: `OPTIONS` is answered immediately
//! 2. Method check: only `POST` continues
//! 3. Site resolution from the path suffix
//! 4. Origin policy: allowed origins are reflected, others get no header
//! 5. Admission by the rate limiter, keyed by site and client
//! 6. Body capture up to the configured ceiling
//! 7. Signature check for sites with a secret
//! 8. Decoding
//! 9. Validation
//! 10. Composition and delivery
//!
//! An admission, once granted, is never given back, even if the caller
//! goes away later in the pipeline.

use crate::auth::{self, SIGNATURE_HEADER};
use crate::clock::Clock;
use crate::config::{PayloadConfig, RateLimitConfig};
use crate::decode::{self, Submission};
use crate::error::IntakeError;
use crate::limiter::RateLimiter;
use crate::mailer::MailSender;
use crate::message::OutboundMessage;
use crate::metrics::IntakeMetrics;
use crate::tenant::{TenantConfig, TenantRegistry};
use crate::validator::{self, ValidationResult};
use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::StreamExt;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, field, info, info_span, warn, Span};

/// Path prefix in front of the site key.
pub const CONTACT_PREFIX: &str = "/v1/contact/";

const ALLOW_METHODS: &str = "POST, OPTIONS";
const ALLOW_HEADERS: &str = "Content-Type, X-Signature";
const FORWARDED_FOR: &str = "x-forwarded-for";

/// Transport-neutral view of an inbound request.
pub struct IntakeRequest {
    pub method: Method,
    /// Full request path, e.g. `/v1/contact/acme`
    pub path: String,
    pub headers: HeaderMap,
    /// Transport peer, when known
    pub peer: Option<SocketAddr>,
    pub body: Body,
}

/// Successful terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accepted {
    Preflight,
    Delivered,
}

/// Outcome of the pipeline plus the CORS header it earned.
#[derive(Debug)]
pub struct IntakeResponse {
    pub result: Result<Accepted, IntakeError>,
    pub allow_origin: Option<HeaderValue>,
}

impl IntakeResponse {
    fn new(result: Result<Accepted, IntakeError>) -> Self {
        Self {
            result,
            allow_origin: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        match &self.result {
            Ok(Accepted::Preflight) => StatusCode::NO_CONTENT,
            Ok(Accepted::Delivered) => StatusCode::OK,
            Err(err) => err.status(),
        }
    }

    /// Metrics and log label.
    pub fn outcome(&self) -> &'static str {
        match &self.result {
            Ok(Accepted::Preflight) => "PREFLIGHT",
            Ok(Accepted::Delivered) => "ACCEPTED",
            Err(err) => err.code(),
        }
    }
}

impl IntoResponse for IntakeResponse {
    fn into_response(self) -> Response {
        let mut response = match self.result {
            Ok(Accepted::Preflight) => (
                StatusCode::NO_CONTENT,
                [
                    (header::ACCESS_CONTROL_ALLOW_METHODS, ALLOW_METHODS),
                    (header::ACCESS_CONTROL_ALLOW_HEADERS, ALLOW_HEADERS),
                ],
            )
                .into_response(),
            Ok(Accepted::Delivered) => Json(json!({ "ok": true })).into_response(),
            Err(err) => err.into_response(),
        };

        if let Some(origin) = self.allow_origin {
            let headers = response.headers_mut();
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
            headers.insert(header::VARY, HeaderValue::from_static("Origin"));
        }
        response
    }
}

/// Composes site lookup, rate limiting, authentication, decoding,
/// validation and delivery.
pub struct IntakePipeline {
    tenants: TenantRegistry,
    limiter: RateLimiter,
    sender: Arc<dyn MailSender>,
    rate_limit: RateLimitConfig,
    payload: PayloadConfig,
    metrics: IntakeMetrics,
}

impl IntakePipeline {
    pub fn new(
        tenants: TenantRegistry,
        sender: Arc<dyn MailSender>,
        rate_limit: RateLimitConfig,
        payload: PayloadConfig,
    ) -> prometheus::Result<Self> {
        Ok(Self {
            tenants,
            limiter: RateLimiter::new(rate_limit.max_buckets),
            sender,
            rate_limit,
            payload,
            metrics: IntakeMetrics::new()?,
        })
    }

    /// Replace the limiter's time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.limiter = RateLimiter::with_clock(self.rate_limit.max_buckets, clock);
        self
    }

    pub fn tenants(&self) -> &TenantRegistry {
        &self.tenants
    }

    pub fn metrics(&self) -> &IntakeMetrics {
        &self.metrics
    }

    /// Drop rate limit buckets that no longer carry state.
    pub async fn sweep_buckets(&self) -> usize {
        self.limiter.sweep().await
    }

    /// Run one request through the pipeline, logging to `span`.
    pub async fn handle(&self, request: IntakeRequest, span: &Span) -> IntakeResponse {
        let started = Instant::now();
        let response = self.run(request, span).await;
        let elapsed = started.elapsed();

        let status = response.status();
        let outcome = response.outcome();
        let latency_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        span.record("outcome", outcome);
        span.record("status", status.as_u16());
        span.record("latency_ms", latency_ms);
        self.metrics.observe(outcome, elapsed);

        if status.is_server_error() {
            error!(parent: span, status = status.as_u16(), outcome, latency_ms, "Request completed");
        } else if status.is_client_error() {
            warn!(parent: span, status = status.as_u16(), outcome, latency_ms, "Request completed");
        } else {
            info!(parent: span, status = status.as_u16(), outcome, latency_ms, "Request completed");
        }

        response
    }

    async fn run(&self, request: IntakeRequest, span: &Span) -> IntakeResponse {
        if request.method == Method::OPTIONS {
            return IntakeResponse::new(Ok(Accepted::Preflight));
        }
        if request.method != Method::POST {
            warn!(parent: span, method = %request.method, "Method not allowed");
            return IntakeResponse::new(Err(IntakeError::MethodNotAllowed));
        }

        let Some(key) = site_key(&request.path) else {
            warn!(parent: span, path = %request.path, "Bad site key");
            return IntakeResponse::new(Err(IntakeError::BadSiteKey));
        };
        let Some(tenant) = self.tenants.resolve(key) else {
            warn!(parent: span, site = key, "Unknown site");
            return IntakeResponse::new(Err(IntakeError::UnknownSite));
        };
        span.record("tenant", tenant.key.as_str());

        let origin = header_str(&request.headers, header::ORIGIN.as_str());
        let allow_origin = tenant
            .allowed_origin(origin)
            .and_then(|o| HeaderValue::from_str(o).ok());

        IntakeResponse {
            result: self.admit(tenant, request, span).await,
            allow_origin,
        }
    }

    async fn admit(&self, tenant: &TenantConfig, request: IntakeRequest, span: &Span) -> Result<Accepted, IntakeError> {
        let client = client_identity(&request.headers, request.peer);
        span.record("client", client.as_str());

        let admitted = self
            .limiter
            .allow(
                &tenant.key,
                &client,
                self.rate_limit.burst,
                self.rate_limit.refill_interval(),
            )
            .await;
        if !admitted {
            warn!(parent: span, "Rate limited");
            return Err(IntakeError::RateLimited);
        }

        let IntakeRequest { headers, body, .. } = request;
        let body = self.capture_body(&headers, body, span).await?;

        if let Some(secret) = tenant.signing_secret() {
            if !auth::verify(&body, secret, header_str(&headers, SIGNATURE_HEADER)) {
                warn!(parent: span, "Invalid signature");
                return Err(IntakeError::Unauthorized);
            }
        }

        let content_type = header_str(&headers, header::CONTENT_TYPE.as_str());
        let submission = decode::decode(&body, content_type, &self.payload).map_err(|err| {
            if err.is_unsupported() {
                warn!(parent: span, content_type = ?content_type, "Unsupported content type");
                IntakeError::UnsupportedMediaType
            } else {
                warn!(parent: span, error = %err, "Bad payload");
                IntakeError::MalformedPayload
            }
        })?;

        check_submission(&submission, span)?;

        let message = OutboundMessage::compose(tenant, &submission, &client);
        if let Err(err) = self.sender.send(tenant, &message).await {
            error!(parent: span, error = %err, "Delivery failed");
            return Err(IntakeError::Delivery);
        }

        info!(parent: span, from = %submission.email, "Contact email sent");
        Ok(Accepted::Delivered)
    }

    /// Read the body, refusing anything over the ceiling.
    async fn capture_body(&self, headers: &HeaderMap, body: Body, span: &Span) -> Result<Vec<u8>, IntakeError> {
        let limit = self.payload.max_body_bytes();

        let declared = header_str(headers, header::CONTENT_LENGTH.as_str()).and_then(|v| v.parse::<usize>().ok());
        if let Some(declared) = declared.filter(|len| *len > limit) {
            warn!(parent: span, size_bytes = declared, "Payload too large");
            return Err(IntakeError::PayloadTooLarge);
        }

        let mut stream = body.into_data_stream();
        let mut buffer = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|err| {
                warn!(parent: span, error = %err, "Body read error");
                IntakeError::BodyRead
            })?;
            if buffer.len() + chunk.len() > limit {
                warn!(parent: span, size_bytes = buffer.len() + chunk.len(), "Payload too large");
                return Err(IntakeError::PayloadTooLarge);
            }
            buffer.extend_from_slice(&chunk);
        }
        Ok(buffer)
    }
}

fn check_submission(submission: &Submission, span: &Span) -> Result<(), IntakeError> {
    match validator::validate(submission) {
        ValidationResult::Valid => Ok(()),
        ValidationResult::Invalid(reason) if reason.is_bot_signal() => {
            warn!(parent: span, bot_signal = true, "Honeypot triggered");
            Err(IntakeError::InvalidSubmission)
        }
        ValidationResult::Invalid(reason) => {
            warn!(parent: span, reason = %reason, from = %submission.email, "Invalid submission");
            Err(IntakeError::InvalidSubmission)
        }
    }
}

/// Span carrying the per-request fields the pipeline fills in.
pub fn request_span(method: &Method, path: &str) -> Span {
    info_span!(
        "intake",
        method = %method,
        path = %path,
        tenant = field::Empty,
        client = field::Empty,
        outcome = field::Empty,
        status = field::Empty,
        latency_ms = field::Empty,
    )
}

/// Site key from the path: non-empty, no further `/`.
pub fn site_key(path: &str) -> Option<&str> {
    path.strip_prefix(CONTACT_PREFIX)
        .filter(|key| !key.is_empty() && !key.contains('/'))
}

/// First `X-Forwarded-For` entry, else the peer IP.
pub fn client_identity(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = header_str(headers, FORWARDED_FOR)
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match (forwarded, peer) {
        (Some(first), _) => first.to_string(),
        (None, Some(addr)) => addr.ip().to_string(),
        (None, None) => "unknown".to_string(),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
