// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Prometheus metrics for the intake pipeline.

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};
use std::time::Duration;

/// Outcome counter and latency histogram on a private registry.
#[derive(Clone)]
pub struct IntakeMetrics {
    registry: Registry,
    outcomes: IntCounterVec,
    latency: Histogram,
}

impl IntakeMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let outcomes = IntCounterVec::new(
            Opts::new("form_courier_intake_total", "Intake requests by terminal outcome"),
            &["outcome"],
        )?;
        let latency = Histogram::with_opts(HistogramOpts::new(
            "form_courier_intake_latency_seconds",
            "Time spent in the intake pipeline",
        ))?;

        registry.register(Box::new(outcomes.clone()))?;
        registry.register(Box::new(latency.clone()))?;

        Ok(Self {
            registry,
            outcomes,
            latency,
        })
    }

    pub fn observe(&self, outcome: &str, elapsed: Duration) {
        self.outcomes.with_label_values(&[outcome]).inc();
        self.latency.observe(elapsed.as_secs_f64());
    }

    /// Count recorded for one outcome.
    pub fn outcome_count(&self, outcome: &str) -> u64 {
        self.outcomes.with_label_values(&[outcome]).get()
    }

    /// Text exposition format.
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
