//! Query resolution: aliases, the local domain and forwarding.
//!
//! Every query goes through [`DnsHandler::resolve`]:
//!
//! ```text
//! name (trailing dot stripped)
//!   → registered alias?   A: records of every service under it
//!                         other: SOA (or forward, per config)
//!   → outside domain?     forward upstream
//!   → not A?              SOA
//!   → suffix match        A records, or SOA when nothing matched
//! ```

use async_trait::async_trait;
use hickory_proto::op::{Header, ResponseCode};
use hickory_proto::rr::rdata::{A, SOA};
use hickory_proto::rr::{DNSClass, Name, RData, Record, RecordType};
use hickory_server::authority::MessageResponseBuilder;
use hickory_server::server::{Request, RequestHandler, ResponseHandler, ResponseInfo};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info, trace, warn};

use crate::config::{AliasNonAPolicy, DnsConfig};
use crate::domain::{trim_fqdn, Domain};
use crate::error::DnsError;
use crate::forward::Forwarder;
use crate::metrics::{self, QueryResult, Timer};
use crate::registry::{Registry, Service};

/// Query name that dumps the registry to the log.
pub const STATUS_QUERY: &str = "print-status";

const SOA_REFRESH: i32 = 28800;
const SOA_RETRY: i32 = 7200;
const SOA_EXPIRE: i32 = 604800;

/// Outcome of resolving one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A records for services registered under an alias.
    Alias(Vec<Service>),
    /// A records for services matched in the local domain.
    Local(Vec<Service>),
    /// Only the synthesized SOA record.
    Soa,
    /// Relay to the upstream nameserver.
    Forward,
}

/// SOA serial for `now`: the Unix time of the start of the current hour.
pub fn soa_serial(now: SystemTime) -> u32 {
    let secs = now
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    (secs - secs % 3600) as u32
}

/// Request handler answering from the service registry.
pub struct DnsHandler {
    registry: Registry,
    domain: Domain,
    forwarder: Forwarder,
    config: Arc<DnsConfig>,
}

impl DnsHandler {
    /// Create a handler for the given configuration and registry.
    pub fn new(config: DnsConfig, registry: Registry) -> Result<Self, DnsError> {
        let domain = config.local_domain()?;
        let forwarder = Forwarder::new(config.nameserver, config.forward_timeout());

        Ok(Self {
            registry,
            domain,
            forwarder,
            config: Arc::new(config),
        })
    }

    /// The local authority domain.
    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    /// Decide how to answer a question for `name` of type `rtype`.
    pub fn resolve(&self, name: &str, rtype: RecordType) -> Resolution {
        let query = trim_fqdn(name);

        if query == STATUS_QUERY {
            self.registry.log_status();
        }

        if let Some(services) = self.registry.services_for_alias(query) {
            if rtype == RecordType::A {
                debug!(name = %query, count = services.len(), "A query for alias");
                return Resolution::Alias(services);
            }
            debug!(name = %query, rtype = %rtype, policy = ?self.config.alias_non_a, "non-A query for alias");
            return match self.config.alias_non_a {
                AliasNonAPolicy::Soa => Resolution::Soa,
                AliasNonAPolicy::Forward => Resolution::Forward,
            };
        }

        if !self.domain.contains(query) {
            trace!(name = %query, "query is not local, forwarding");
            return Resolution::Forward;
        }

        if rtype != RecordType::A {
            debug!(name = %query, rtype = %rtype, "non-A query in local domain, replying with SOA");
            return Resolution::Soa;
        }

        let services = self.registry.query_services(query, &self.domain);
        if services.is_empty() {
            debug!(name = %query, "no service matched, replying with SOA");
            Resolution::Soa
        } else {
            debug!(name = %query, count = services.len(), "matched services");
            Resolution::Local(services)
        }
    }

    /// Build A records named `name` for `services`.
    fn build_a_records(&self, name: &Name, services: &[Service]) -> Vec<Record> {
        services
            .iter()
            .map(|service| {
                let mut record = Record::from_rdata(
                    name.clone(),
                    service.effective_ttl(self.config.ttl),
                    RData::A(A(service.ip)),
                );
                record.set_dns_class(DNSClass::IN);
                record
            })
            .collect()
    }

    /// Build the SOA record for the outermost label of the local domain.
    pub fn build_soa_record(&self) -> Record {
        let zone = Name::from_ascii(format!("{}.", self.domain.last_label()))
            .unwrap_or_else(|_| Name::root());
        let mname =
            Name::from_ascii(format!("master.{zone}")).unwrap_or_else(|_| Name::root());
        let rname =
            Name::from_ascii(format!("hostmaster.{zone}")).unwrap_or_else(|_| Name::root());

        let soa = SOA::new(
            mname,
            rname,
            soa_serial(SystemTime::now()),
            SOA_REFRESH,
            SOA_RETRY,
            SOA_EXPIRE,
            self.config.ttl,
        );

        let mut record = Record::from_rdata(zone, self.config.ttl, RData::SOA(soa));
        record.set_dns_class(DNSClass::IN);
        record
    }

    /// Relay `request` upstream, or send an empty reply if that fails.
    async fn forward<R: ResponseHandler>(
        &self,
        request: &Request,
        response_handle: R,
    ) -> (ResponseInfo, QueryResult) {
        let query = Forwarder::query_from_request(request);

        match self.forwarder.exchange(&query).await {
            Ok(reply) => {
                let mut header = *reply.header();
                header.set_id(request.header().id());
                let info = send_records(
                    request,
                    response_handle,
                    header,
                    reply.answers(),
                    reply.name_servers(),
                    reply.additionals(),
                )
                .await;
                (info, QueryResult::Forwarded)
            }
            Err(e) => {
                warn!(upstream = %self.forwarder.upstream(), error = %e, "forwarding failed, sending empty reply");
                let header = Header::response_from_request(request.header());
                let info = send_records(request, response_handle, header, &[], &[], &[]).await;
                (info, QueryResult::ForwardError)
            }
        }
    }
}

/// Send a reply built from `header` and the given sections.
async fn send_records<R: ResponseHandler>(
    request: &Request,
    mut response_handle: R,
    header: Header,
    answers: &[Record],
    name_servers: &[Record],
    additionals: &[Record],
) -> ResponseInfo {
    let response = MessageResponseBuilder::from_message_request(request).build(
        header,
        answers.iter(),
        name_servers.iter(),
        std::iter::empty(),
        additionals.iter(),
    );
    response_handle
        .send_response(response)
        .await
        .unwrap_or_else(|e| {
            error!("DNS response error: {}", e);
            header.into()
        })
}

#[async_trait]
impl RequestHandler for DnsHandler {
    async fn handle_request<R: ResponseHandler>(
        &self,
        request: &Request,
        response_handle: R,
    ) -> ResponseInfo {
        let timer = Timer::start();

        let Some(query) = request.queries().first() else {
            debug!(src = %request.src(), "request without question");
            let mut header = Header::response_from_request(request.header());
            header.set_response_code(ResponseCode::FormErr);
            return send_records(request, response_handle, header, &[], &[], &[]).await;
        };

        let name = query.original().name().clone();
        let rtype = query.query_type();
        let rtype_str = rtype.to_string();

        if self.config.debug {
            info!(name = %name, rtype = %rtype, src = %request.src(), "incoming query");
        } else {
            trace!(name = %name, rtype = %rtype, src = %request.src(), "incoming query");
        }

        let (records, result) = match self.resolve(&name.to_string(), rtype) {
            Resolution::Forward => {
                let (info, result) = self.forward(request, response_handle).await;
                metrics::record_query(&rtype_str, result, timer.elapsed());
                return info;
            }
            Resolution::Alias(services) => {
                (self.build_a_records(&name, &services), QueryResult::Alias)
            }
            Resolution::Local(services) => {
                (self.build_a_records(&name, &services), QueryResult::Local)
            }
            Resolution::Soa => (vec![self.build_soa_record()], QueryResult::Soa),
        };

        if result != QueryResult::Soa {
            metrics::record_a_records_returned(records.len());
        }
        metrics::record_query(&rtype_str, result, timer.elapsed());

        let mut header = Header::response_from_request(request.header());
        header.set_authoritative(true);
        header.set_recursion_available(true);
        header.set_response_code(ResponseCode::NoError);

        send_records(request, response_handle, header, &records, &[], &[]).await
    }
}
