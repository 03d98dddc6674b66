// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Form Courier
//!
//! A multi-tenant contact-form gateway. Each configured site gets its own
//! endpoint under `/v1/contact/<site>`; accepted submissions are relayed to
//! the site's recipient by email.
//!
//! - Per-site CORS origin allow-list
//! - Per-(site, client) token bucket rate limiting
//! - Request body ceiling
//! - Optional HMAC-SHA256 body signatures
//! - JSON and form-urlencoded payloads
//! - Honeypot and field validation
//! - SMTP delivery with per-site overrides

pub mod auth;
pub mod clock;
pub mod config;
pub mod decode;
pub mod error;
pub mod handlers;
pub mod limiter;
pub mod mailer;
pub mod message;
pub mod metrics;
pub mod pipeline;
pub mod server;
pub mod tenant;
pub mod validator;

pub use config::Config;
pub use error::IntakeError;
pub use limiter::RateLimiter;
pub use mailer::{MailError, MailSender, SmtpMailSender};
pub use message::OutboundMessage;
pub use pipeline::{IntakePipeline, IntakeRequest, IntakeResponse};
pub use tenant::{TenantConfig, TenantRegistry};
pub use validator::{ValidationResult, validate};
