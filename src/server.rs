//! DNS server setup and lifecycle management.

use hickory_server::ServerFuture;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::DnsConfig;
use crate::error::DnsError;
use crate::handler::DnsHandler;
use crate::registry::Registry;

/// Interval for emitting registry metrics.
const METRICS_INTERVAL: Duration = Duration::from_secs(10);

/// Periodically emit registry metrics.
async fn metrics_loop(registry: Registry, shutdown: CancellationToken) {
    let mut interval = tokio::time::interval(METRICS_INTERVAL);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                registry.emit_metrics();
                debug!(
                    services = registry.services_count(),
                    aliases = registry.aliases_count(),
                    "emitted registry metrics"
                );
            }
            _ = shutdown.cancelled() => {
                debug!("metrics loop shutting down");
                return;
            }
        }
    }
}

/// DNS server answering from an in-memory service registry.
pub struct DnsServer {
    config: DnsConfig,
    registry: Registry,
}

impl DnsServer {
    /// Create a new DNS server, seeding the registry with the configured
    /// static services.
    pub fn new(config: DnsConfig) -> Self {
        let registry = Registry::with_verbose(config.verbose);
        for entry in &config.services {
            let outcome = registry.add_service(&entry.id, entry.service.clone());
            if !outcome.is_clean() {
                debug!(
                    id = %entry.id,
                    rejected = outcome.rejected_aliases.len(),
                    "static service registered with rejected aliases"
                );
            }
        }

        Self { config, registry }
    }

    /// The registry the discovery side adds and removes services through.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Run the DNS server until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), DnsError> {
        self.config.validate()?;

        info!(
            listen_addr = %self.config.listen_addr,
            nameserver = %self.config.nameserver,
            services = self.registry.services_count(),
            "Starting dockdns server"
        );

        let handler = DnsHandler::new(self.config.clone(), self.registry.clone())?;
        let domain = handler.domain().to_string();

        let mut server = ServerFuture::new(handler);

        let udp_socket = UdpSocket::bind(self.config.listen_addr).await?;
        info!(addr = %self.config.listen_addr, "DNS UDP listening");
        server.register_socket(udp_socket);

        info!(domain = %domain, "DNS server ready to serve queries");

        let metrics_handle = tokio::spawn(metrics_loop(self.registry.clone(), shutdown.clone()));

        self.registry.emit_metrics();

        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("DNS server shutdown requested");
            }
            result = server.block_until_done() => {
                if let Err(e) = result {
                    error!("DNS server error: {}", e);
                }
            }
        }

        let _ = metrics_handle.await;

        info!("DNS server stopped");
        Ok(())
    }
}
