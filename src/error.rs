// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Terminal rejections of the intake pipeline.
//!
//! Every variant maps to one status code and one fixed message. Details of
//! why a request failed go to the logs, never to the client.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Why a request was turned away.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum IntakeError {
    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("bad site key")]
    BadSiteKey,

    #[error("unknown site")]
    UnknownSite,

    #[error("rate limited")]
    RateLimited,

    #[error("payload too large")]
    PayloadTooLarge,

    #[error("read error")]
    BodyRead,

    #[error("unauthorized")]
    Unauthorized,

    #[error("bad payload")]
    MalformedPayload,

    #[error("unsupported content type")]
    UnsupportedMediaType,

    #[error("invalid submission")]
    InvalidSubmission,

    #[error("failed to send")]
    Delivery,

    #[error("internal error")]
    Internal,
}

impl IntakeError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::BadSiteKey
            | Self::BodyRead
            | Self::MalformedPayload
            | Self::InvalidSubmission => StatusCode::BAD_REQUEST,
            Self::UnknownSite => StatusCode::NOT_FOUND,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::Delivery | Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code, also used as the metrics label.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            Self::BadSiteKey => "BAD_SITE_KEY",
            Self::UnknownSite => "UNKNOWN_SITE",
            Self::RateLimited => "RATE_LIMITED",
            Self::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            Self::BodyRead => "READ_ERROR",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::MalformedPayload => "BAD_PAYLOAD",
            Self::UnsupportedMediaType => "UNSUPPORTED_CONTENT_TYPE",
            Self::InvalidSubmission => "INVALID_SUBMISSION",
            Self::Delivery => "DELIVERY_FAILED",
            Self::Internal => "INTERNAL",
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

impl IntoResponse for IntakeError {
    fn into_response(self) -> Response {
        (
            self.status(),
            Json(ErrorResponse {
                error: self.to_string(),
                code: self.code(),
            }),
        )
            .into_response()
    }
}
