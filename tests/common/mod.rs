//! Shared test infrastructure for resolution integration tests.

#![allow(dead_code)]

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{DNSClass, Name, RData, RecordType};
use hickory_proto::serialize::binary::{BinDecodable, BinDecoder, BinEncoder};
use hickory_server::authority::{MessageRequest, MessageResponse};
use hickory_server::proto::rr::Record;
use hickory_server::proto::xfer::Protocol;
use hickory_server::server::{Request, RequestHandler, ResponseHandler, ResponseInfo};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

use dockdns::{DnsConfig, DnsHandler, Registry, Service};

// --- Constants ---

pub const DOMAIN: &str = "docker";
pub const TTL: u32 = 30;

// --- TestResponseHandler ---

/// Captures the serialized DNS response for inspection in tests.
///
/// The response is serialized via `MessageResponse::destructive_emit()` and stored
/// as raw wire-format bytes, which can then be parsed with `Message::from_vec()`.
#[derive(Clone)]
pub struct TestResponseHandler {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl TestResponseHandler {
    pub fn new() -> Self {
        Self {
            buf: Arc::new(Mutex::new(Vec::with_capacity(512))),
        }
    }

    /// Parse the captured wire bytes into a `Message` for assertions.
    pub fn into_message(self) -> Message {
        let buf = self.buf.lock().unwrap();
        assert!(!buf.is_empty(), "no response was captured");
        Message::from_vec(&buf).expect("failed to parse captured DNS response")
    }
}

#[async_trait]
impl ResponseHandler for TestResponseHandler {
    async fn send_response<'a>(
        &mut self,
        response: MessageResponse<
            '_,
            'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
        >,
    ) -> io::Result<ResponseInfo> {
        let mut buf = self.buf.lock().unwrap();
        buf.clear();
        let mut encoder = BinEncoder::new(&mut *buf);
        encoder.set_max_size(u16::MAX);
        let info = response
            .destructive_emit(&mut encoder)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(info)
    }
}

// --- Config and registry builders ---

pub fn test_dns_config(nameserver: SocketAddr) -> DnsConfig {
    DnsConfig {
        listen_addr: "127.0.0.1:0".parse().unwrap(),
        nameserver,
        domain: DOMAIN.to_string(),
        ttl: TTL,
        forward_timeout_ms: 500,
        ..Default::default()
    }
}

/// Address nothing answers on: a bound socket that is dropped right away.
pub async fn unused_udp_addr() -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    socket.local_addr().unwrap()
}

pub fn service(name: &str, image: &str, ip: Ipv4Addr, alias: &str) -> Service {
    Service {
        name: name.to_string(),
        image: image.to_string(),
        ip,
        ttl: None,
        alias: alias.to_string(),
    }
}

/// The registry used by most resolution tests.
///
/// - `web` / `nginx` at 10.0.0.1 with aliases `www.seznam.cz,www.example.org`
/// - `api` / `nginx` at 10.0.0.2 with alias `www.seznam.cz`
/// - `db` / `postgres` at 10.0.0.3, TTL 120
pub fn test_registry() -> Registry {
    let registry = Registry::with_verbose(false);
    registry.add_service(
        "aaa111",
        service(
            "web",
            "nginx",
            Ipv4Addr::new(10, 0, 0, 1),
            "www.seznam.cz,www.example.org",
        ),
    );
    registry.add_service(
        "bbb222",
        service("api", "nginx", Ipv4Addr::new(10, 0, 0, 2), "www.seznam.cz"),
    );
    registry.add_service(
        "ccc333",
        Service {
            ttl: Some(120),
            ..service("db", "postgres", Ipv4Addr::new(10, 0, 0, 3), "")
        },
    );
    registry
}

pub fn build_handler(config: DnsConfig, registry: Registry) -> DnsHandler {
    DnsHandler::new(config, registry).expect("failed to create DnsHandler")
}

// --- Query/Request construction ---

/// Build wire-format bytes for a DNS query.
pub fn build_query_bytes(name: &str, record_type: RecordType, id: u16) -> Vec<u8> {
    let mut msg = Message::new();
    msg.set_id(id);
    msg.set_message_type(MessageType::Query);
    msg.set_op_code(OpCode::Query);
    msg.set_recursion_desired(true);
    let mut query = Query::new();
    query.set_name(Name::from_ascii(name).unwrap());
    query.set_query_type(record_type);
    query.set_query_class(DNSClass::IN);
    msg.add_query(query);
    msg.to_vec().unwrap()
}

/// Parse wire bytes into a MessageRequest.
pub fn parse_message_request(bytes: &[u8]) -> MessageRequest {
    let mut decoder = BinDecoder::new(bytes);
    MessageRequest::read(&mut decoder).expect("failed to parse MessageRequest")
}

/// Build a full `Request` as if it arrived over UDP from loopback.
pub fn build_request(name: &str, record_type: RecordType, id: u16) -> Request {
    let bytes = build_query_bytes(name, record_type, id);
    let msg = parse_message_request(&bytes);
    let src: SocketAddr = "127.0.0.1:12345".parse().unwrap();
    Request::new(msg, src, Protocol::Udp)
}

// --- Response helpers ---

/// Execute a query through the handler and return the parsed response.
pub async fn execute_query(
    handler: &DnsHandler,
    name: &str,
    record_type: RecordType,
    id: u16,
) -> Message {
    let request = build_request(name, record_type, id);
    let response = TestResponseHandler::new();
    handler.handle_request(&request, response.clone()).await;
    response.into_message()
}

/// Extract A addresses from a response.
pub fn extract_a_ips(msg: &Message) -> Vec<Ipv4Addr> {
    msg.answers()
        .iter()
        .filter_map(|r| match r.data() {
            RData::A(a) => Some(Ipv4Addr::from(*a)),
            _ => None,
        })
        .collect()
}

/// Assert response code.
pub fn assert_response_code(msg: &Message, expected: ResponseCode) {
    assert_eq!(
        msg.response_code(),
        expected,
        "expected {:?}, got {:?}",
        expected,
        msg.response_code()
    );
}

/// Assert response is successful with exactly the expected IPs.
pub fn assert_a_response(msg: &Message, expected_ips: &[Ipv4Addr]) {
    assert_response_code(msg, ResponseCode::NoError);
    let mut actual = extract_a_ips(msg);
    actual.sort();
    let mut expected: Vec<Ipv4Addr> = expected_ips.to_vec();
    expected.sort();
    assert_eq!(
        actual, expected,
        "A records mismatch.\nactual:   {:?}\nexpected: {:?}",
        actual, expected
    );
}

/// Assert the answer section holds exactly one SOA for `zone`.
pub fn assert_soa_only(msg: &Message, zone: &str) {
    assert_response_code(msg, ResponseCode::NoError);
    assert_eq!(msg.answers().len(), 1, "expected a single SOA answer");
    let record = &msg.answers()[0];
    assert_eq!(record.record_type(), RecordType::SOA);
    assert_eq!(record.name().to_string(), zone);
}

// --- Fake upstream ---

/// Upstream nameserver stand-in.
pub struct FakeUpstream {
    pub addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl FakeUpstream {
    /// Answer every query with `ip` for its first question, `rcode` and the
    /// recursion-available flag.
    pub async fn start(ip: Ipv4Addr, rcode: ResponseCode) -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let mut buf = vec![0u8; 4096];
            loop {
                let Ok((len, src)) = socket.recv_from(&mut buf).await else {
                    return;
                };
                let Ok(query) = Message::from_vec(&buf[..len]) else {
                    continue;
                };

                let mut reply = Message::new();
                reply.set_id(query.id());
                reply.set_message_type(MessageType::Response);
                reply.set_op_code(query.op_code());
                reply.set_recursion_desired(query.recursion_desired());
                reply.set_recursion_available(true);
                reply.set_response_code(rcode);
                reply.add_queries(query.queries().to_vec());
                if rcode == ResponseCode::NoError {
                    if let Some(question) = query.queries().first() {
                        reply.add_answer(Record::from_rdata(
                            question.name().clone(),
                            300,
                            RData::A(A(ip)),
                        ));
                    }
                }

                let _ = socket.send_to(&reply.to_vec().unwrap(), src).await;
            }
        });

        Self { addr, handle }
    }

    /// A socket that reads queries and never answers.
    pub async fn silent() -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let mut buf = vec![0u8; 4096];
            while socket.recv_from(&mut buf).await.is_ok() {}
        });

        Self { addr, handle }
    }
}

impl Drop for FakeUpstream {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Send `query_bytes` to `server` over UDP and parse the reply.
pub async fn query_udp(server: SocketAddr, query_bytes: &[u8]) -> Message {
    let sock = UdpSocket::bind("127.0.0.1:0")
        .await
        .expect("failed to bind client socket");

    sock.send_to(query_bytes, server)
        .await
        .expect("failed to send query");

    let mut buf = vec![0u8; 4096];
    let len = tokio::time::timeout(Duration::from_secs(5), sock.recv(&mut buf))
        .await
        .expect("query timed out")
        .expect("failed to recv response");

    Message::from_vec(&buf[..len]).expect("failed to parse DNS response")
}
