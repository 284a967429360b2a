//! In-memory service registry and alias index.
//!
//! Services are keyed by an opaque id (usually a 64 character container hash).
//! Aliases map extra domain names onto sets of service ids. Both maps live
//! behind one lock so a service and its aliases always change together.
//!
//! Iteration is ordered by id, which makes query results and prefix expansion
//! deterministic.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::{is_valid_domain_name, query_labels, trim_fqdn, Domain};
use crate::error::{InvalidAlias, RegistryError};
use crate::matcher::matches_query;
use crate::metrics;

/// Length of a full container id.
const FULL_ID_LEN: usize = 64;

/// Shortest prefix that is expanded to a full id.
const MIN_PREFIX_LEN: usize = 4;

/// A registered network endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    /// Logical service name, dotted labels allowed.
    #[serde(default)]
    pub name: String,
    /// Source image name, dotted labels allowed.
    #[serde(default)]
    pub image: String,
    /// Address published in A records.
    pub ip: Ipv4Addr,
    /// Per-service TTL; `None` falls back to the configured default.
    #[serde(default)]
    pub ttl: Option<u32>,
    /// Comma separated extra domain names for this service.
    #[serde(default)]
    pub alias: String,
}

impl Default for Service {
    fn default() -> Self {
        Self {
            name: String::new(),
            image: String::new(),
            ip: Ipv4Addr::UNSPECIFIED,
            ttl: None,
            alias: String::new(),
        }
    }
}

impl Service {
    /// TTL to publish for this service.
    pub fn effective_ttl(&self, default_ttl: u32) -> u32 {
        self.ttl.unwrap_or(default_ttl)
    }

    /// Non-empty alias candidates from the comma separated `alias` field.
    pub fn alias_candidates(&self) -> impl Iterator<Item = &str> {
        self.alias
            .split(',')
            .map(str::trim)
            .filter(|alias| !alias.is_empty())
    }
}

/// Result of [`Registry::add_service`].
///
/// The service is always stored; aliases that failed validation are listed
/// here instead of failing the call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddOutcome {
    /// Aliases that were dropped.
    pub rejected_aliases: Vec<InvalidAlias>,
}

impl AddOutcome {
    /// True when every alias was accepted.
    pub fn is_clean(&self) -> bool {
        self.rejected_aliases.is_empty()
    }
}

/// Operations the service discovery side drives the registry with.
pub trait ServiceProvider: Send + Sync {
    /// Store `service` under `id`, replacing any previous entry.
    fn add_service(&self, id: &str, service: Service) -> AddOutcome;
    /// Remove the service with `id` (or a unique hex prefix of it).
    fn remove_service(&self, id: &str) -> Result<(), RegistryError>;
    /// Copy of the service with `id` (or a unique hex prefix of it).
    fn get_service(&self, id: &str) -> Result<Service, RegistryError>;
    /// Snapshot of every registered service.
    fn get_all_services(&self) -> BTreeMap<String, Service>;
}

/// Thread-safe service registry.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    inner: Arc<RwLock<RegistryInner>>,
}

#[derive(Debug, Default)]
struct RegistryInner {
    /// id -> Service
    services: BTreeMap<String, Service>,

    /// alias -> ids of services reachable under it
    aliases: BTreeMap<String, BTreeSet<String>>,

    /// Log registry writes at info instead of debug.
    verbose: bool,
}

fn is_lower_hex(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|c| matches!(c, b'0'..=b'9' | b'a'..=b'f'))
}

fn normalize_alias(alias: &str) -> String {
    trim_fqdn(alias).to_ascii_lowercase()
}

impl RegistryInner {
    /// Expand a short hex prefix to the first full id (in id order) it prefixes.
    fn expand_id(&self, input: &str) -> String {
        if input.len() < MIN_PREFIX_LEN || !is_lower_hex(input) {
            return input.to_string();
        }

        self.services
            .keys()
            .find(|id| id.len() == FULL_ID_LEN && is_lower_hex(id) && id.starts_with(input))
            .cloned()
            .unwrap_or_else(|| input.to_string())
    }

    fn add_alias(&mut self, alias: &str, id: &str) {
        let ids = self.aliases.entry(alias.to_string()).or_default();
        let created = ids.is_empty();
        ids.insert(id.to_string());
        debug!(alias, id, created, "linked alias");
    }

    /// Drop `id` from every alias and prune aliases left without services.
    fn remove_aliases_for(&mut self, id: &str) {
        self.aliases.retain(|alias, ids| {
            if ids.remove(id) {
                debug!(alias = %alias, id, "unlinked alias");
            }
            if ids.is_empty() {
                debug!(alias = %alias, "removed empty alias");
                return false;
            }
            true
        });
    }
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry that logs writes at info level.
    pub fn with_verbose(verbose: bool) -> Self {
        Self {
            inner: Arc::new(RwLock::new(RegistryInner {
                verbose,
                ..Default::default()
            })),
        }
    }

    /// Store `service` under the literal `id`, replacing any previous entry
    /// and its alias links.
    pub fn add_service(&self, id: &str, service: Service) -> AddOutcome {
        let mut inner = self.inner.write();
        let mut outcome = AddOutcome::default();

        inner.remove_aliases_for(id);

        for candidate in service.alias_candidates() {
            if is_valid_domain_name(candidate) {
                inner.add_alias(&normalize_alias(candidate), id);
            } else {
                warn!(id, alias = candidate, "alias is not a valid domain name, ignoring it");
                metrics::record_alias_rejected();
                outcome.rejected_aliases.push(InvalidAlias {
                    id: id.to_string(),
                    alias: candidate.to_string(),
                });
            }
        }

        if inner.verbose {
            info!(id, name = %service.name, image = %service.image, ip = %service.ip, "added service");
        } else {
            debug!(id, name = %service.name, image = %service.image, ip = %service.ip, "added service");
        }

        inner.services.insert(id.to_string(), service);
        outcome
    }

    /// Remove a service and detach it from every alias.
    pub fn remove_service(&self, id: &str) -> Result<(), RegistryError> {
        let mut inner = self.inner.write();
        let id = inner.expand_id(id);

        if !inner.services.contains_key(&id) {
            return Err(RegistryError::NotFound { id });
        }

        inner.remove_aliases_for(&id);
        inner.services.remove(&id);

        if inner.verbose {
            info!(id = %id, "removed service");
        } else {
            debug!(id = %id, "removed service");
        }
        Ok(())
    }

    /// Get a copy of a service.
    pub fn get_service(&self, id: &str) -> Result<Service, RegistryError> {
        let inner = self.inner.read();
        let id = inner.expand_id(id);
        inner
            .services
            .get(&id)
            .cloned()
            .ok_or(RegistryError::NotFound { id })
    }

    /// Snapshot of all services.
    pub fn get_all_services(&self) -> BTreeMap<String, Service> {
        self.inner.read().services.clone()
    }

    /// Snapshot of the alias index.
    pub fn aliases(&self) -> BTreeMap<String, BTreeSet<String>> {
        self.inner.read().aliases.clone()
    }

    /// Expand a hex id prefix against the registered ids.
    pub fn expand_id(&self, input: &str) -> String {
        self.inner.read().expand_id(input)
    }

    /// Services registered under `alias`, or `None` when the alias is unknown.
    pub fn services_for_alias(&self, alias: &str) -> Option<Vec<Service>> {
        let inner = self.inner.read();
        let ids = inner.aliases.get(&normalize_alias(alias))?;
        Some(
            ids.iter()
                .filter_map(|id| inner.services.get(id).cloned())
                .collect(),
        )
    }

    /// Services addressed by `query` under `domain`, in id order.
    ///
    /// The read lock is held for the whole scan.
    pub fn query_services(&self, query: &str, domain: &Domain) -> Vec<Service> {
        let labels = query_labels(query);
        let inner = self.inner.read();
        inner
            .services
            .values()
            .filter(|service| matches_query(service, &labels, domain.labels()))
            .cloned()
            .collect()
    }

    /// Number of registered services.
    pub fn services_count(&self) -> usize {
        self.inner.read().services.len()
    }

    /// Number of aliases with at least one service.
    pub fn aliases_count(&self) -> usize {
        self.inner.read().aliases.len()
    }

    /// Log the full registry contents.
    pub fn log_status(&self) {
        let inner = self.inner.read();
        for (id, service) in &inner.services {
            info!(
                id = %id,
                name = %service.name,
                image = %service.image,
                ip = %service.ip,
                ttl = ?service.ttl,
                "registered service"
            );
        }
        for (alias, ids) in &inner.aliases {
            info!(alias = %alias, ids = ?ids, "registered alias");
        }
    }

    /// Emit current registry metrics.
    pub fn emit_metrics(&self) {
        let inner = self.inner.read();
        metrics::record_registry_counts(inner.services.len(), inner.aliases.len());
    }
}

impl ServiceProvider for Registry {
    fn add_service(&self, id: &str, service: Service) -> AddOutcome {
        Registry::add_service(self, id, service)
    }

    fn remove_service(&self, id: &str) -> Result<(), RegistryError> {
        Registry::remove_service(self, id)
    }

    fn get_service(&self, id: &str) -> Result<Service, RegistryError> {
        Registry::get_service(self, id)
    }

    fn get_all_services(&self) -> BTreeMap<String, Service> {
        Registry::get_all_services(self)
    }
}
