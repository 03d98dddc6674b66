// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Site (tenant) configuration and the immutable registry that resolves
//! a site key from the request path to its settings.

use crate::config::SmtpConfig;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use thiserror::Error;

/// Registry construction errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("site key must not be empty")]
    EmptyKey,

    #[error("site key {0:?} must not contain '/'")]
    InvalidKey(String),

    #[error("site key {0:?} is configured more than once")]
    Duplicate(String),
}

/// Settings for one site.
#[derive(Debug)]
pub struct TenantConfig {
    /// Unique key, also the URL path segment
    pub key: String,
    /// Address that receives submissions
    pub recipient: String,
    /// Exact-match allowed origins; `*` reflects any origin
    pub allowed_origins: Vec<String>,
    pub subject_prefix: String,
    /// Shared HMAC secret; when set every request must be signed
    pub secret: Option<SecretString>,
    /// Per-site delivery override
    pub smtp: Option<SmtpConfig>,
    pub from_addr: String,
}

impl TenantConfig {
    pub fn new(key: impl Into<String>, recipient: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            recipient: recipient.into(),
            allowed_origins: Vec::new(),
            subject_prefix: "[Contact]".to_string(),
            secret: None,
            smtp: None,
            from_addr: String::new(),
        }
    }

    pub fn with_allowed_origins<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_origins = origins.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_subject_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.subject_prefix = prefix.into();
        self
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(SecretString::from(secret.into()));
        self
    }

    pub fn with_smtp(mut self, smtp: SmtpConfig) -> Self {
        self.smtp = Some(smtp);
        self
    }

    pub fn with_from_addr(mut self, from_addr: impl Into<String>) -> Self {
        self.from_addr = from_addr.into();
        self
    }

    /// The signing secret, if this site requires signed requests.
    ///
    /// An empty secret counts as no secret.
    pub fn signing_secret(&self) -> Option<&str> {
        self.secret
            .as_ref()
            .map(|s| s.expose_secret())
            .filter(|s| !s.is_empty())
    }

    /// Value for `Access-Control-Allow-Origin`, if the request origin is allowed.
    pub fn allowed_origin<'a>(&self, origin: Option<&'a str>) -> Option<&'a str> {
        let origin = origin?;
        self.allowed_origins
            .iter()
            .any(|allowed| allowed == "*" || allowed == origin)
            .then_some(origin)
    }
}

/// Read-only map from site key to configuration.
///
/// Built once at startup; lookups need no synchronization.
#[derive(Debug, Default)]
pub struct TenantRegistry {
    tenants: HashMap<String, TenantConfig>,
}

impl TenantRegistry {
    /// Build a registry, rejecting empty, slash-bearing or duplicate keys.
    pub fn new(tenants: impl IntoIterator<Item = TenantConfig>) -> Result<Self, RegistryError> {
        let mut map = HashMap::new();
        for tenant in tenants {
            if tenant.key.is_empty() {
                return Err(RegistryError::EmptyKey);
            }
            if tenant.key.contains('/') {
                return Err(RegistryError::InvalidKey(tenant.key));
            }
            if map.contains_key(&tenant.key) {
                return Err(RegistryError::Duplicate(tenant.key));
            }
            map.insert(tenant.key.clone(), tenant);
        }
        Ok(Self { tenants: map })
    }

    /// Exact, case-sensitive lookup.
    pub fn resolve(&self, key: &str) -> Option<&TenantConfig> {
        self.tenants.get(key)
    }

    pub fn len(&self) -> usize {
        self.tenants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tenants.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.tenants.keys().map(String::as_str)
    }
}
