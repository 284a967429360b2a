//! dockdns binary entry point.

use clap::Parser;
use dockdns::config::parse_socket_addr;
use dockdns::{telemetry, Config, DnsServer};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// DNS server for dynamically registered services.
#[derive(Parser, Debug)]
#[command(name = "dockdns")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML). Missing files are ignored.
    #[arg(short, long, default_value = "dockdns.toml")]
    config: PathBuf,

    /// Listen address, `ip` or `ip:port`.
    #[arg(short, long)]
    listen: Option<String>,

    /// Upstream nameserver, `ip` or `ip:port`.
    #[arg(short, long)]
    nameserver: Option<String>,

    /// Locally authoritative domain.
    #[arg(short, long)]
    domain: Option<String>,

    /// Context prepended to the domain.
    #[arg(short, long)]
    environment: Option<String>,

    /// Default TTL for answers.
    #[arg(long)]
    ttl: Option<u32>,

    /// Log registry changes at info level.
    #[arg(long)]
    verbose: Option<bool>,

    /// Log every incoming query at info level.
    #[arg(long)]
    debug: bool,
}

impl Args {
    fn apply(&self, config: &mut Config) -> Result<(), dockdns::DnsError> {
        let dns = &mut config.dns;
        if let Some(ref listen) = self.listen {
            dns.listen_addr = parse_socket_addr(listen, 53)?;
        }
        if let Some(ref nameserver) = self.nameserver {
            dns.nameserver = parse_socket_addr(nameserver, 53)?;
        }
        if let Some(ref domain) = self.domain {
            dns.domain = domain.clone();
        }
        if let Some(ref environment) = self.environment {
            dns.environment = Some(environment.clone());
        }
        if let Some(ttl) = self.ttl {
            dns.ttl = ttl;
        }
        if let Some(verbose) = self.verbose {
            dns.verbose = verbose;
        }
        if self.debug {
            dns.debug = true;
        }
        dns.validate()
    }
}

async fn shutdown_signal(token: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown signal received");
    token.cancel();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration
    let mut config: Config = config::Config::builder()
        .add_source(config::File::from(args.config.clone()).required(false))
        .add_source(
            config::Environment::with_prefix("DOCKDNS")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()?;

    args.apply(&mut config)?;

    // Initialize telemetry
    telemetry::init(&config.telemetry).map_err(|e| e as Box<dyn std::error::Error>)?;

    info!(
        config_file = %args.config.display(),
        listen_addr = %config.dns.listen_addr,
        nameserver = %config.dns.nameserver,
        domain = %config.dns.domain,
        "Starting dockdns"
    );

    // Setup graceful shutdown
    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    // Run DNS server
    let server = DnsServer::new(config.dns);
    let result = server.run(shutdown).await;

    // Shutdown telemetry
    telemetry::shutdown();

    if let Err(e) = result {
        error!("DNS server error: {}", e);
        return Err(e.into());
    }

    info!("dockdns shutdown complete");
    Ok(())
}
