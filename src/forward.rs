//! Relaying queries outside the local domain to an upstream resolver.

use hickory_proto::op::{Message, MessageType};
use hickory_server::authority::MessageRequest;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::trace;

use crate::error::ForwardError;

/// Largest UDP reply we accept from upstream.
const MAX_UDP_SIZE: usize = 4096;

/// UDP client for the upstream nameserver.
#[derive(Debug, Clone)]
pub struct Forwarder {
    upstream: SocketAddr,
    timeout: Duration,
}

impl Forwarder {
    /// Create a forwarder for `upstream` with a bound on each exchange.
    pub fn new(upstream: SocketAddr, timeout: Duration) -> Self {
        Self { upstream, timeout }
    }

    /// Upstream nameserver address.
    pub fn upstream(&self) -> SocketAddr {
        self.upstream
    }

    /// Rebuild the client's query as a message for upstream, keeping id,
    /// flags, questions and EDNS.
    pub fn query_from_request(request: &MessageRequest) -> Message {
        let header = request.header();
        let mut message = Message::new();
        message.set_id(header.id());
        message.set_message_type(MessageType::Query);
        message.set_op_code(header.op_code());
        message.set_recursion_desired(header.recursion_desired());
        message.set_checking_disabled(header.checking_disabled());
        message.set_authentic_data(header.authentic_data());
        for query in request.queries() {
            message.add_query(query.original().clone());
        }
        if let Some(edns) = request.edns() {
            message.set_edns(edns.clone());
        }
        message
    }

    /// Send `query` upstream and wait for the matching reply.
    ///
    /// The whole exchange, including socket setup, is bounded by the
    /// configured timeout.
    pub async fn exchange(&self, query: &Message) -> Result<Message, ForwardError> {
        tokio::time::timeout(self.timeout, self.exchange_inner(query))
            .await
            .map_err(|_| ForwardError::Timeout(self.timeout))?
    }

    async fn exchange_inner(&self, query: &Message) -> Result<Message, ForwardError> {
        let bind_addr: SocketAddr = if self.upstream.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };

        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(self.upstream).await?;
        socket.send(&query.to_vec()?).await?;
        trace!(upstream = %self.upstream, id = query.id(), "query sent upstream");

        let mut buf = vec![0u8; MAX_UDP_SIZE];
        let len = socket.recv(&mut buf).await?;
        let reply = Message::from_vec(&buf[..len])?;

        if reply.id() != query.id() {
            return Err(ForwardError::IdMismatch {
                expected: query.id(),
                got: reply.id(),
            });
        }

        Ok(reply)
    }
}
