// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the form courier.
//!
//! Everything is read once at startup from environment variables and frozen
//! into a [`Config`] value that is handed to the pipeline by ownership. The
//! loader goes through a lookup function so tests can drive it from a map.
//!
//! Global keys: `LISTEN_ADDR`, `SMTP_HOST`, `SMTP_PORT`, `SMTP_USER`,
//! `SMTP_PASS`, `SMTP_SSL`, `SMTP_TIMEOUT_SECS`, `FROM_ADDR`,
//! `SUBJECT_PREFIX`, `RATE_LIMIT_BURST`, `RATE_LIMIT_REFILL_MINUTES`,
//! `RATE_LIMIT_MAX_BUCKETS`, `ALLOW_JSON`, `ALLOW_FORM`, `MAX_BODY_KB`,
//! `METRICS_ENABLED`, `METRICS_PATH` and `SITES`.
//!
//! Per site, using the key uppercased with non-alphanumerics mapped to `_`:
//! `<SITE>_TO`, `<SITE>_ALLOWED_ORIGINS`, `<SITE>_SUBJECT_PREFIX`,
//! `<SITE>_SECRET` and the optional `<SITE>_SMTP_*` override.

use crate::tenant::{RegistryError, TenantConfig, TenantRegistry};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(String),

    #[error("environment variable {key} must be {expected}, got {value:?}")]
    Invalid {
        key: String,
        expected: &'static str,
        value: String,
    },

    #[error("SITES is required (comma-separated list of site keys, e.g. SITES=my-site,product-alpha)")]
    NoSites,

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Complete service configuration.
#[derive(Debug)]
pub struct Config {
    /// Server bind address (default: 0.0.0.0:3000)
    pub listen_addr: String,

    /// Token bucket parameters shared by every site
    pub rate_limit: RateLimitConfig,

    /// Accepted payload encodings and body ceiling
    pub payload: PayloadConfig,

    /// Metrics configuration
    pub metrics: MetricsConfig,

    /// Default SMTP transport, used by sites without an override
    pub smtp: SmtpConfig,

    /// Configured sites
    pub tenants: TenantRegistry,
}

/// Token bucket configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Bucket capacity per (site, client) pair (default: 3)
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Minutes per refilled token (default: 1)
    #[serde(default = "default_refill_minutes")]
    pub refill_minutes: u32,

    /// Upper bound on live buckets before LRU eviction (default: 100000)
    #[serde(default = "default_max_buckets")]
    pub max_buckets: usize,
}

/// Payload decoding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayloadConfig {
    /// Accept `application/json` bodies (default: true)
    #[serde(default = "default_true")]
    pub allow_json: bool,

    /// Accept `application/x-www-form-urlencoded` bodies (default: true)
    #[serde(default = "default_true")]
    pub allow_form: bool,

    /// Body ceiling in KiB (default: 1024)
    #[serde(default = "default_max_body_kb")]
    pub max_body_kb: usize,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable Prometheus metrics endpoint (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics endpoint path (default: /metrics)
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

/// SMTP transport settings.
#[derive(Debug)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    /// Implicit TLS when set, opportunistic STARTTLS otherwise
    pub implicit_tls: bool,
    pub timeout: Duration,
}

impl SmtpConfig {
    /// Copy of these settings with fields replaced by a site override.
    fn overridden(&self, host: String, port: u16, username: String, password: String, implicit_tls: bool) -> Self {
        Self {
            host,
            port,
            username,
            password: SecretString::from(password),
            implicit_tls,
            timeout: self.timeout,
        }
    }
}

// Default value functions
fn default_listen_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_burst() -> u32 {
    3
}

fn default_refill_minutes() -> u32 {
    1
}

fn default_max_buckets() -> usize {
    100_000
}

fn default_max_body_kb() -> usize {
    1024
}

fn default_true() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

fn default_subject_prefix() -> String {
    "[Contact]".to_string()
}

fn default_smtp_timeout_secs() -> u64 {
    10
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            burst: default_burst(),
            refill_minutes: default_refill_minutes(),
            max_buckets: default_max_buckets(),
        }
    }
}

impl Default for PayloadConfig {
    fn default() -> Self {
        Self {
            allow_json: default_true(),
            allow_form: default_true(),
            max_body_kb: default_max_body_kb(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            path: default_metrics_path(),
        }
    }
}

impl RateLimitConfig {
    /// Length of one refill unit.
    pub fn refill_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.refill_minutes) * 60)
    }
}

impl PayloadConfig {
    /// Body ceiling in bytes.
    pub fn max_body_bytes(&self) -> usize {
        self.max_body_kb.saturating_mul(1024)
    }
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup };

        let smtp = SmtpConfig {
            host: env.required("SMTP_HOST")?,
            port: env.required_parse("SMTP_PORT", "a port number")?,
            username: env.required("SMTP_USER")?,
            password: SecretString::from(env.required("SMTP_PASS")?),
            implicit_tls: env.bool_or("SMTP_SSL", false)?,
            timeout: Duration::from_secs(env.parse_or(
                "SMTP_TIMEOUT_SECS",
                default_smtp_timeout_secs(),
                "an integer number of seconds",
            )?),
        };

        let rate_limit = RateLimitConfig {
            burst: env.positive_or("RATE_LIMIT_BURST", default_burst())?,
            refill_minutes: env.positive_or("RATE_LIMIT_REFILL_MINUTES", default_refill_minutes())?,
            max_buckets: env.parse_or(
                "RATE_LIMIT_MAX_BUCKETS",
                default_max_buckets(),
                "a non-negative integer",
            )?,
        };

        let payload = PayloadConfig {
            allow_json: env.bool_or("ALLOW_JSON", true)?,
            allow_form: env.bool_or("ALLOW_FORM", true)?,
            max_body_kb: env.parse_or("MAX_BODY_KB", default_max_body_kb(), "a non-negative integer")?,
        };

        let metrics = MetricsConfig {
            enabled: env.bool_or("METRICS_ENABLED", true)?,
            path: env.string("METRICS_PATH").unwrap_or_else(default_metrics_path),
        };
        if !is_free_route(&metrics.path) {
            return Err(ConfigError::Invalid {
                key: "METRICS_PATH".to_string(),
                expected: "an absolute path not used by another route",
                value: metrics.path,
            });
        }

        let listen_addr = normalize_listen_addr(
            env.string("LISTEN_ADDR").unwrap_or_else(default_listen_addr),
        );

        let tenants = load_tenants(&env, &smtp)?;

        Ok(Self {
            listen_addr,
            rate_limit,
            payload,
            metrics,
            smtp,
            tenants,
        })
    }
}

fn load_tenants<F>(env: &EnvReader<F>, smtp: &SmtpConfig) -> Result<TenantRegistry, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let keys = split_list(&env.string("SITES").unwrap_or_default());
    if keys.is_empty() {
        return Err(ConfigError::NoSites);
    }

    let global_prefix = env.string("SUBJECT_PREFIX").unwrap_or_else(default_subject_prefix);
    let from_addr = env.string("FROM_ADDR").unwrap_or_else(|| smtp.username.clone());

    let mut tenants = Vec::with_capacity(keys.len());
    for key in keys {
        let site = env_key(&key);

        let recipient = env.required(&format!("{site}_TO"))?;
        let allowed_origins = split_list(&env.string(&format!("{site}_ALLOWED_ORIGINS")).unwrap_or_default());
        let subject_prefix = env
            .string(&format!("{site}_SUBJECT_PREFIX"))
            .unwrap_or_else(|| global_prefix.clone());

        let override_smtp = match env.string(&format!("{site}_SMTP_HOST")) {
            Some(host) => Some(smtp.overridden(
                host,
                env.parse_or(&format!("{site}_SMTP_PORT"), smtp.port, "a port number")?,
                env.string(&format!("{site}_SMTP_USER"))
                    .unwrap_or_else(|| smtp.username.clone()),
                env.string(&format!("{site}_SMTP_PASS"))
                    .unwrap_or_else(|| smtp.password.expose_secret().to_string()),
                env.bool_or(&format!("{site}_SMTP_SSL"), smtp.implicit_tls)?,
            )),
            None => None,
        };

        let mut tenant = TenantConfig::new(key, recipient)
            .with_allowed_origins(allowed_origins)
            .with_subject_prefix(subject_prefix)
            .with_from_addr(from_addr.clone());
        if let Some(secret) = env.string(&format!("{site}_SECRET")) {
            tenant = tenant.with_secret(secret);
        }
        if let Some(override_smtp) = override_smtp {
            tenant = tenant.with_smtp(override_smtp);
        }
        tenants.push(tenant);
    }

    Ok(TenantRegistry::new(tenants)?)
}

/// Typed access to a string lookup.
struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.string(key)
            .ok_or_else(|| ConfigError::Missing(key.to_string()))
    }

    fn required_parse<T: FromStr>(&self, key: &str, expected: &'static str) -> Result<T, ConfigError> {
        let raw = self.required(key)?;
        parse_value(key, &raw, expected)
    }

    fn parse_or<T: FromStr>(&self, key: &str, default: T, expected: &'static str) -> Result<T, ConfigError> {
        match self.string(key) {
            Some(raw) => parse_value(key, &raw, expected),
            None => Ok(default),
        }
    }

    fn positive_or(&self, key: &str, default: u32) -> Result<u32, ConfigError> {
        let value = self.parse_or(key, default, "a positive integer")?;
        if value == 0 {
            return Err(ConfigError::Invalid {
                key: key.to_string(),
                expected: "a positive integer",
                value: "0".to_string(),
            });
        }
        Ok(value)
    }

    fn bool_or(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        let Some(raw) = self.string(key) else {
            return Ok(default);
        };
        match raw.trim().to_lowercase().as_str() {
            "1" | "t" | "true" | "y" | "yes" => Ok(true),
            "0" | "f" | "false" | "n" | "no" => Ok(false),
            _ => Err(ConfigError::Invalid {
                key: key.to_string(),
                expected: "a boolean",
                value: raw,
            }),
        }
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str, expected: &'static str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        key: key.to_string(),
        expected,
        value: raw.to_string(),
    })
}

/// Uppercase a site key and replace every non-alphanumeric with `_`.
pub fn env_key(site: &str) -> String {
    site.to_uppercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn is_free_route(path: &str) -> bool {
    path.starts_with('/')
        && path.len() > 1
        && !matches!(path, "/health" | "/healthz")
        && !path.starts_with("/v1/contact/")
        && !path.contains(['*', ':', '{', '}'])
}

/// Split a comma-separated list, dropping blanks.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Accept Go-style `:3000` addresses.
fn normalize_listen_addr(addr: String) -> String {
    if addr.starts_with(':') {
        format!("0.0.0.0{addr}")
    } else {
        addr
    }
}
