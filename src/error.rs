//! Error types for dockdns.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while running the DNS server.
#[derive(Debug, Error)]
pub enum DnsError {
    /// IO error (network, file, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// DNS protocol error
    #[error("DNS protocol error: {0}")]
    Proto(#[from] hickory_proto::ProtoError),

    /// Failed to parse address
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

/// Errors returned by registry lookups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// No service with this id (after prefix expansion).
    #[error("No such service: {id}")]
    NotFound {
        /// The expanded id that was looked up.
        id: String,
    },
}

/// An alias that failed domain name validation and was not stored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("alias {alias:?} of service {id} is not a valid domain name")]
pub struct InvalidAlias {
    /// Service the alias was given for.
    pub id: String,
    /// The rejected alias.
    pub alias: String,
}

/// Failures talking to the upstream resolver.
#[derive(Debug, Error)]
pub enum ForwardError {
    /// Socket error.
    #[error("upstream IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No reply within the configured timeout.
    #[error("upstream did not answer within {0:?}")]
    Timeout(Duration),

    /// Query could not be encoded or reply could not be decoded.
    #[error("upstream protocol error: {0}")]
    Proto(#[from] hickory_proto::ProtoError),

    /// Reply did not belong to our query.
    #[error("upstream reply id {got} does not match query id {expected}")]
    IdMismatch {
        /// Id of the forwarded query.
        expected: u16,
        /// Id found in the reply.
        got: u16,
    },
}
