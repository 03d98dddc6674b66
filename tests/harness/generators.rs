// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Test data generators for flood simulation.

use std::net::{IpAddr, Ipv4Addr};

/// Generate a pool of client addresses.
pub fn generate_clients(count: usize) -> Vec<IpAddr> {
    (0..count)
        .map(|i| {
            // Use 10.x.x.x private range
            let a = ((i >> 16) & 0xFF) as u8;
            let b = ((i >> 8) & 0xFF) as u8;
            let c = (i & 0xFF) as u8;
            IpAddr::V4(Ipv4Addr::new(10, a, b, c))
        })
        .collect()
}

/// Generate distinct valid JSON submissions.
pub fn generate_submissions(count: usize) -> Vec<serde_json::Value> {
    (0..count)
        .map(|i| {
            serde_json::json!({
                "name": format!("Visitor {i}"),
                "email": format!("visitor{i}@example.com"),
                "message": format!("Message number {i}"),
            })
        })
        .collect()
}

/// Spellings of the JSON media type.
pub fn json_content_types() -> Vec<&'static str> {
    vec![
        "application/json",
        "application/json; charset=utf-8",
        "APPLICATION/JSON",
        "Application/Json ;charset=UTF-8",
    ]
}

/// Media types that fall through to the form decoder.
pub fn form_content_types() -> Vec<&'static str> {
    vec![
        "application/x-www-form-urlencoded",
        "application/x-www-form-urlencoded; charset=utf-8",
        "text/plain",
        "multipart/form-data",
    ]
}

/// Site keys that never resolve.
pub fn generate_unknown_sites() -> Vec<&'static str> {
    vec!["ACME", "acme%20", "unknown", "acme.test", "acm"]
}
