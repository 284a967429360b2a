//! Configuration types for dockdns.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::domain::Domain;
use crate::error::DnsError;
use crate::registry::Service;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// DNS server configuration.
    #[serde(default)]
    pub dns: DnsConfig,

    /// Telemetry configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// What to answer for non-A queries on a registered alias.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AliasNonAPolicy {
    /// Reply with the synthesized SOA record.
    #[default]
    Soa,
    /// Forward the query to the upstream nameserver.
    Forward,
}

/// DNS server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsConfig {
    /// Address for the DNS server to listen on (UDP).
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Upstream resolver for names outside the local domain.
    #[serde(default = "default_nameserver")]
    pub nameserver: SocketAddr,

    /// Locally authoritative domain (e.g., "docker" or "docker.local").
    #[serde(default = "default_domain")]
    pub domain: String,

    /// Optional context prepended to the domain (`<environment>.<domain>`).
    #[serde(default)]
    pub environment: Option<String>,

    /// Default TTL for synthesized records in seconds.
    #[serde(default)]
    pub ttl: u32,

    /// Upper bound for one upstream exchange in milliseconds.
    #[serde(default = "default_forward_timeout_ms")]
    pub forward_timeout_ms: u64,

    /// Answer for non-A queries on a registered alias.
    #[serde(default)]
    pub alias_non_a: AliasNonAPolicy,

    /// Log registry changes at info level.
    #[serde(default = "default_verbose")]
    pub verbose: bool,

    /// Log every incoming query at info level.
    #[serde(default)]
    pub debug: bool,

    /// Services registered at startup.
    #[serde(default)]
    pub services: Vec<StaticService>,
}

/// A service declared in the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticService {
    /// Registry id.
    pub id: String,

    /// The service itself.
    #[serde(flatten)]
    pub service: Service,
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level filter (e.g., "info", "debug", "dockdns=debug,warn").
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Prometheus metrics exporter address.
    #[serde(default)]
    pub prometheus_addr: Option<SocketAddr>,

    /// OpenTelemetry configuration.
    #[serde(default)]
    pub opentelemetry: Option<OpenTelemetryConfig>,
}

/// OpenTelemetry exporter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenTelemetryConfig {
    /// OTLP endpoint (e.g., "http://localhost:4317").
    pub endpoint: String,

    /// Service name for traces.
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            prometheus_addr: None,
            opentelemetry: None,
        }
    }
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            nameserver: default_nameserver(),
            domain: default_domain(),
            environment: None,
            ttl: 0,
            forward_timeout_ms: default_forward_timeout_ms(),
            alias_non_a: AliasNonAPolicy::default(),
            verbose: default_verbose(),
            debug: false,
            services: Vec::new(),
        }
    }
}

impl DnsConfig {
    /// The local domain with the environment prefix applied.
    pub fn local_domain(&self) -> Result<Domain, DnsError> {
        match self.environment.as_deref() {
            Some(env) if !env.is_empty() => Domain::parse(&format!("{}.{}", env, self.domain)),
            _ => Domain::parse(&self.domain),
        }
    }

    /// Upstream exchange timeout.
    pub fn forward_timeout(&self) -> Duration {
        Duration::from_millis(self.forward_timeout_ms)
    }

    /// Check values that serde cannot.
    pub fn validate(&self) -> Result<(), DnsError> {
        self.local_domain()?;
        if self.forward_timeout_ms == 0 {
            return Err(DnsError::Config(
                "forward_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parse `ip` or `ip:port`, filling in `default_port` when it is missing.
pub fn parse_socket_addr(s: &str, default_port: u16) -> Result<SocketAddr, DnsError> {
    let s = s.trim();
    if let Ok(addr) = s.parse::<SocketAddr>() {
        return Ok(addr);
    }
    let ip_str = s
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(s);
    ip_str
        .parse::<IpAddr>()
        .map(|ip| SocketAddr::new(ip, default_port))
        .map_err(|_| DnsError::InvalidAddress(s.to_string()))
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 53))
}

fn default_nameserver() -> SocketAddr {
    SocketAddr::from(([8, 8, 8, 8], 53))
}

fn default_domain() -> String {
    "docker".to_string()
}

fn default_forward_timeout_ms() -> u64 {
    2000
}

fn default_verbose() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "dockdns".to_string()
}
