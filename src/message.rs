// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Outbound notification composed from a validated submission.

use crate::decode::Submission;
use crate::tenant::TenantConfig;

/// Message handed to the delivery transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub from: String,
    pub to: String,
    /// Submitter display name, kept apart from the address so the
    /// transport can quote it
    pub reply_name: String,
    pub reply_email: String,
    pub subject: String,
    /// Plain-text transcript
    pub body: String,
}

impl OutboundMessage {
    /// Compose the notification for `tenant` about `submission` from `client`.
    pub fn compose(tenant: &TenantConfig, submission: &Submission, client: &str) -> Self {
        let subject = format!("{} New contact", tenant.subject_prefix).trim().to_string();
        let body = format!(
            "Site: {}\nFrom: {} <{}>\nIP: {}\n\n{}\n",
            tenant.key, submission.name, submission.email, client, submission.message,
        );

        Self {
            from: tenant.from_addr.clone(),
            to: tenant.recipient.clone(),
            reply_name: submission.name.clone(),
            reply_email: submission.email.clone(),
            subject,
            body,
        }
    }
}
