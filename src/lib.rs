//! dockdns - A DNS server for dynamically registered services.
//!
//! This crate answers DNS queries from an in-memory registry of services
//! (typically containers) that other parts of the system add and remove at
//! runtime. Names inside the local domain resolve to service addresses by
//! wildcard suffix matching; explicitly registered aliases resolve anywhere;
//! everything else is relayed verbatim to an upstream nameserver.
//!
//! ## Features
//!
//! - A records for `<name>.<image>.<domain>` with `*` wildcards per label
//! - Aliases outside the local domain
//! - Synthesized SOA for names nobody owns
//! - Forwarding with a bounded upstream timeout
//! - Graceful shutdown support
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                           dockdns                               │
//! │                                                                 │
//! │  ┌──────────────────┐    ┌──────────────────┐                  │
//! │  │ Service discovery│───▶│    Registry      │                  │
//! │  │ (add / remove)   │    │ services+aliases │                  │
//! │  └──────────────────┘    └────────┬─────────┘                  │
//! │                                   │                             │
//! │                                   ▼                             │
//! │                          ┌──────────────────┐                  │
//! │                          │   DnsHandler     │◀── UDP :53       │
//! │                          └────────┬─────────┘                  │
//! │                                   │ foreign names               │
//! │                                   ▼                             │
//! │                          ┌──────────────────┐                  │
//! │                          │    Forwarder     │──▶ nameserver     │
//! │                          └──────────────────┘                  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## DNS Resolution
//!
//! ```text
//! web.nginx.docker      → services named "web" running image "nginx"
//! *.nginx.docker        → every "nginx" service
//! nginx.docker          → every "nginx" service
//! www.example.com       → services registered with alias "www.example.com"
//! unknown.docker        → SOA only
//! www.rust-lang.org     → forwarded upstream
//! ```
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use dockdns::{DnsConfig, DnsServer, Service};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = DnsConfig {
//!         listen_addr: "127.0.0.1:5353".parse().unwrap(),
//!         ..Default::default()
//!     };
//!
//!     let server = DnsServer::new(config);
//!     server.registry().add_service(
//!         "3f2a9c",
//!         Service {
//!             name: "web".to_string(),
//!             image: "nginx".to_string(),
//!             ip: "172.17.0.2".parse().unwrap(),
//!             ..Default::default()
//!         },
//!     );
//!
//!     server.run(CancellationToken::new()).await.unwrap();
//! }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod domain;
pub mod error;
pub mod forward;
pub mod handler;
pub mod matcher;
pub mod metrics;
pub mod registry;
pub mod server;
pub mod telemetry;

// Re-export main types
pub use config::{AliasNonAPolicy, Config, DnsConfig, StaticService, TelemetryConfig};
pub use error::{DnsError, RegistryError};
pub use handler::DnsHandler;
pub use registry::{Registry, Service, ServiceProvider};
pub use server::DnsServer;
