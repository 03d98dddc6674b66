// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Payload decoding.
//!
//! Exactly one encoding is attempted per request, chosen from the
//! Content-Type header and the enabled formats:
//! - `application/json` (when JSON is enabled): a single object with string
//!   fields `name`, `email`, `message` and `website`.
//! - otherwise, when forms are enabled: `application/x-www-form-urlencoded`
//!   key/value pairs; missing keys decode as empty strings.
//! - otherwise the media type is unsupported.

use crate::config::PayloadConfig;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// A contact form submission as sent by the client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Submission {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub message: String,
    /// Honeypot; real visitors never fill it in
    #[serde(default)]
    pub website: String,
}

/// Payload decoding errors.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("bad json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("bad json: expected an object")]
    NotAnObject,

    #[error("bad form: {0}")]
    Form(&'static str),

    #[error("unsupported content type {0:?}")]
    UnsupportedMediaType(Option<String>),
}

impl DecodeError {
    /// Wrong format, as opposed to a broken body in a supported format.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::UnsupportedMediaType(_))
    }
}

/// Encoding selected for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    Json,
    Form,
}

/// Pick the encoding for a Content-Type, honoring the enabled formats.
pub fn select_format(content_type: Option<&str>, config: &PayloadConfig) -> Option<PayloadFormat> {
    let is_json = content_type.map(media_type).as_deref() == Some("application/json");
    if is_json && config.allow_json {
        Some(PayloadFormat::Json)
    } else if config.allow_form {
        Some(PayloadFormat::Form)
    } else {
        None
    }
}

/// Decode a raw body into a [`Submission`].
pub fn decode(body: &[u8], content_type: Option<&str>, config: &PayloadConfig) -> Result<Submission, DecodeError> {
    match select_format(content_type, config) {
        Some(PayloadFormat::Json) => decode_json(body),
        Some(PayloadFormat::Form) => decode_form(body),
        None => {
            debug!(content_type = ?content_type, "No enabled decoder for content type");
            Err(DecodeError::UnsupportedMediaType(content_type.map(str::to_string)))
        }
    }
}

fn decode_json(body: &[u8]) -> Result<Submission, DecodeError> {
    let value: serde_json::Value = serde_json::from_slice(body)?;
    if !value.is_object() {
        return Err(DecodeError::NotAnObject);
    }
    Ok(serde_json::from_value(value)?)
}

fn decode_form(body: &[u8]) -> Result<Submission, DecodeError> {
    if std::str::from_utf8(body).is_err() {
        return Err(DecodeError::Form("body is not valid UTF-8"));
    }
    if has_bad_escape(body) {
        return Err(DecodeError::Form("malformed percent escape"));
    }

    let mut name = None;
    let mut email = None;
    let mut message = None;
    let mut website = None;
    for (key, value) in url::form_urlencoded::parse(body) {
        let slot = match &*key {
            "name" => &mut name,
            "email" => &mut email,
            "message" => &mut message,
            "website" => &mut website,
            _ => continue,
        };
        // First occurrence wins
        if slot.is_none() {
            *slot = Some(value.into_owned());
        }
    }

    Ok(Submission {
        name: name.unwrap_or_default(),
        email: email.unwrap_or_default(),
        message: message.unwrap_or_default(),
        website: website.unwrap_or_default(),
    })
}

/// A `%` not followed by two hex digits.
fn has_bad_escape(body: &[u8]) -> bool {
    body.iter().enumerate().any(|(i, &b)| {
        b == b'%'
            && !matches!(
                body.get(i + 1..i + 3),
                Some([hi, lo]) if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit()
            )
    })
}

/// Media type without parameters, trimmed and lowercased.
fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .to_lowercase()
}
