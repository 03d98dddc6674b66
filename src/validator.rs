// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Submission validator.
//!
//! Implements the acceptance rules for a decoded submission:
//! - Honeypot field must be empty
//! - Name must be present
//! - Email must look like `local@domain.tld`
//! - Message must contain something other than whitespace
//!
//! Callers only ever report a single "invalid submission" outcome; the
//! specific [`ValidationError`] is for logs.

use crate::decode::Submission;
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::debug;

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern compiles"));

/// Validation error types.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("honeypot field was filled in")]
    HoneypotFilled,

    #[error("missing name")]
    MissingName,

    #[error("invalid email address")]
    InvalidEmail,

    #[error("empty message")]
    EmptyMessage,
}

impl ValidationError {
    /// Whether this failure points at an automated submission.
    pub fn is_bot_signal(&self) -> bool {
        matches!(self, Self::HoneypotFilled)
    }
}

/// Result of validation.
#[derive(Debug, Clone)]
pub enum ValidationResult {
    /// Submission is acceptable
    Valid,
    /// Submission is rejected
    Invalid(ValidationError),
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }

    pub fn error(&self) -> Option<&ValidationError> {
        match self {
            ValidationResult::Valid => None,
            ValidationResult::Invalid(e) => Some(e),
        }
    }
}

/// Apply every rule to a submission.
pub fn validate(submission: &Submission) -> ValidationResult {
    let failure = if !submission.website.is_empty() {
        Some(ValidationError::HoneypotFilled)
    } else if submission.name.is_empty() {
        Some(ValidationError::MissingName)
    } else if !is_plausible_email(&submission.email) {
        Some(ValidationError::InvalidEmail)
    } else if submission.message.trim().is_empty() {
        Some(ValidationError::EmptyMessage)
    } else {
        None
    };

    match failure {
        Some(err) => {
            debug!(error = %err, "Submission invalid");
            ValidationResult::Invalid(err)
        }
        None => ValidationResult::Valid,
    }
}

/// Permissive syntactic email check.
pub fn is_plausible_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}
