//! Custom error type definitions.

use std::io;

use thiserror::Error;
use toluol_proto::error::{EncodeError, ParseError};

/// Errors that may arise while configuring a resolver or resolving a name.
#[derive(Debug, Error)]
pub enum Error {
    /// The resolver could not be set up with the given address or options.
    #[error("Invalid resolver configuration: {0}.")]
    Config(String),

    /// The nameserver address had a scheme that is not supported. The system resolver is used
    /// instead.
    #[error("Unknown nameserver scheme in {0}, falling back to the system resolver.")]
    UnknownScheme(String),

    #[error("Could not parse DNS message.")]
    Codec(#[from] ParseError),

    #[error("Could not encode DNS message.")]
    Encode(#[from] EncodeError),

    #[error("Network error: {0}.")]
    Io(#[from] io::Error),

    #[cfg(feature = "tls")]
    #[error("TLS error: {0}.")]
    Tls(#[from] rustls::Error),

    /// The DoH server answered with something other than `200 OK`.
    #[error("Error from nameserver: HTTP {0}.")]
    Http(String),

    /// The response was truncated even though it was received over a stream transport.
    #[error("Received truncated response over TCP.")]
    Truncated,

    #[error("Response ID does not match the query ID.")]
    IdMismatch,

    #[error("DNSCrypt error: {0}")]
    DnsCrypt(#[from] dnscrypt_proto::Error),

    /// The lookup succeeded, but no answer records were returned.
    #[error("No answers found for {0}.")]
    NoAnswers(String),

    #[error("Too many CNAMEs while resolving {0}.")]
    CnameChainTooLong(String),
}
