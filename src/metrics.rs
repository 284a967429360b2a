//! Metrics instrumentation for dockdns.
//!
//! All metrics are prefixed with `dockdns.`

use metrics::{counter, gauge, histogram};
use std::time::Instant;

/// Record a DNS query.
pub fn record_query(record_type: &str, result: QueryResult, duration: std::time::Duration) {
    let result_str = match result {
        QueryResult::Alias => "alias",
        QueryResult::Local => "local",
        QueryResult::Soa => "soa",
        QueryResult::Forwarded => "forwarded",
        QueryResult::ForwardError => "forward_error",
    };

    counter!("dockdns.query.count", "type" => record_type.to_string(), "result" => result_str)
        .increment(1);
    histogram!("dockdns.query.duration.seconds", "type" => record_type.to_string())
        .record(duration.as_secs_f64());
}

/// How a query was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryResult {
    /// A records from an alias.
    Alias,
    /// A records from suffix matching in the local domain.
    Local,
    /// Synthesized SOA only.
    Soa,
    /// Relayed from the upstream resolver.
    Forwarded,
    /// Upstream exchange failed, empty reply sent.
    ForwardError,
}

/// Record registry sizes (call periodically or on change).
pub fn record_registry_counts(services: usize, aliases: usize) {
    gauge!("dockdns.registry.services.count").set(services as f64);
    gauge!("dockdns.registry.aliases.count").set(aliases as f64);
}

/// Record an alias dropped because it is not a valid domain name.
pub fn record_alias_rejected() {
    counter!("dockdns.registry.alias.rejected.count").increment(1);
}

/// Record A records returned for a successful lookup.
pub fn record_a_records_returned(count: usize) {
    histogram!("dockdns.query.a.records_returned").record(count as f64);
}

/// Helper for timing operations.
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed duration since timer start.
    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}
