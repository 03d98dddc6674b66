// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Flood patterns for abuse simulation.

use std::time::Duration;

/// Flood pattern configuration.
#[derive(Debug, Clone)]
pub struct FloodConfig {
    /// Total number of requests to send
    pub total_requests: usize,
    /// Number of unique client addresses
    pub unique_clients: usize,
    /// Sites the requests are spread over
    pub sites: Vec<&'static str>,
    /// Share of requests with the honeypot filled (0.0-1.0)
    pub honeypot_ratio: f64,
    /// Simulated time between consecutive requests
    pub spacing: Duration,
}

impl Default for FloodConfig {
    fn default() -> Self {
        Self {
            total_requests: 100,
            unique_clients: 1,
            sites: vec!["acme"],
            honeypot_ratio: 0.0,
            spacing: Duration::ZERO,
        }
    }
}

/// Predefined flood patterns.
impl FloodConfig {
    /// One client hammering one site.
    pub fn single_client_flood() -> Self {
        Self {
            total_requests: 200,
            ..Default::default()
        }
    }

    /// Many clients, a handful of requests each.
    pub fn distributed_flood() -> Self {
        Self {
            total_requests: 500,
            unique_clients: 100,
            ..Default::default()
        }
    }

    /// One client rotating across every site.
    pub fn cross_site_flood() -> Self {
        Self {
            total_requests: 60,
            sites: vec!["acme", "open"],
            ..Default::default()
        }
    }

    /// Bots filling the hidden field.
    pub fn honeypot_spray() -> Self {
        Self {
            total_requests: 50,
            unique_clients: 50,
            honeypot_ratio: 1.0,
            ..Default::default()
        }
    }

    /// One request per refill unit.
    pub fn slow_drip() -> Self {
        Self {
            total_requests: 30,
            spacing: Duration::from_secs(60),
            ..Default::default()
        }
    }

    /// Deterministic honeypot choice for request `index`.
    pub fn fills_honeypot(&self, index: usize) -> bool {
        if self.honeypot_ratio >= 1.0 {
            true
        } else if self.honeypot_ratio <= 0.0 {
            false
        } else {
            (index as f64 * 0.618033988749895) % 1.0 < self.honeypot_ratio
        }
    }

    /// Most deliveries a flood can achieve with bucket size `burst`.
    pub fn delivery_ceiling(&self, burst: u32) -> usize {
        let pairs = self.unique_clients * self.sites.len();
        (pairs * burst as usize).min(self.total_requests)
    }
}
