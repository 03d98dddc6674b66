// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Delivery of composed messages.
//!
//! The pipeline only knows the [`MailSender`] capability; [`SmtpMailSender`]
//! is the production transport. A site's SMTP override wins over the
//! default transport.

use crate::config::SmtpConfig;
use crate::message::OutboundMessage;
use crate::tenant::TenantConfig;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::Address;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{Message, SmtpTransport, Transport};
use secrecy::ExposeSecret;
use thiserror::Error;
use tracing::{debug, warn};

/// Delivery failures. Opaque to clients; logged in full.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid {field} address {value:?}: {reason}")]
    Address {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("failed to build message: {0}")]
    Build(String),

    #[error("SMTP error: {0}")]
    Transport(String),

    #[error("delivery task failed: {0}")]
    Task(String),
}

/// Something that can deliver an [`OutboundMessage`] on behalf of a site.
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, tenant: &TenantConfig, message: &OutboundMessage) -> Result<(), MailError>;
}

/// SMTP delivery through `lettre`.
#[derive(Debug)]
pub struct SmtpMailSender {
    default: SmtpConfig,
}

impl SmtpMailSender {
    /// Sender that falls back to `default` for sites without an override.
    pub fn new(default: SmtpConfig) -> Self {
        Self { default }
    }

    fn settings_for<'a>(&'a self, tenant: &'a TenantConfig) -> &'a SmtpConfig {
        tenant.smtp.as_ref().unwrap_or(&self.default)
    }
}

#[async_trait]
impl MailSender for SmtpMailSender {
    async fn send(&self, tenant: &TenantConfig, message: &OutboundMessage) -> Result<(), MailError> {
        let email = build_email(message)?;
        let settings = self.settings_for(tenant);
        let transport = build_transport(settings)?;

        debug!(site = %tenant.key, host = %settings.host, port = settings.port, "Sending via SMTP");

        tokio::task::spawn_blocking(move || transport.send(&email))
            .await
            .map_err(|e| MailError::Task(e.to_string()))?
            .map_err(|e| MailError::Transport(e.to_string()))?;

        Ok(())
    }
}

fn parse_mailbox(field: &'static str, value: &str) -> Result<Mailbox, MailError> {
    value.parse().map_err(|e: lettre::address::AddressError| MailError::Address {
        field,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn build_email(message: &OutboundMessage) -> Result<Message, MailError> {
    let mut builder = Message::builder()
        .from(parse_mailbox("from", &message.from)?)
        .to(parse_mailbox("to", &message.to)?)
        .subject(message.subject.clone())
        .header(ContentType::TEXT_PLAIN);
    if let Some(reply_to) = reply_mailbox(message) {
        builder = builder.reply_to(reply_to);
    }
    builder
        .body(message.body.clone())
        .map_err(|e| MailError::Build(e.to_string()))
}

/// Submitter mailbox with the display name quoted by lettre.
///
/// Submitted addresses only pass a permissive check, so one lettre cannot
/// represent drops the header instead of the message. The address is still
/// in the body.
fn reply_mailbox(message: &OutboundMessage) -> Option<Mailbox> {
    let email: Address = match message.reply_email.trim().parse() {
        Ok(email) => email,
        Err(e) => {
            warn!(value = %message.reply_email, error = %e, "Omitting Reply-To");
            return None;
        }
    };
    let name = message.reply_name.trim();
    let name = (!name.is_empty()).then(|| name.to_string());
    Some(Mailbox::new(name, email))
}

/// Implicit TLS when configured, otherwise STARTTLS if the server offers it.
fn build_transport(settings: &SmtpConfig) -> Result<SmtpTransport, MailError> {
    let parameters =
        TlsParameters::new(settings.host.clone()).map_err(|e| MailError::Transport(e.to_string()))?;
    let tls = if settings.implicit_tls {
        Tls::Wrapper(parameters)
    } else {
        Tls::Opportunistic(parameters)
    };

    let credentials = Credentials::new(
        settings.username.clone(),
        settings.password.expose_secret().to_string(),
    );

    Ok(SmtpTransport::builder_dangerous(settings.host.as_str())
        .port(settings.port)
        .tls(tls)
        .credentials(credentials)
        .timeout(Some(settings.timeout))
        .build())
}
