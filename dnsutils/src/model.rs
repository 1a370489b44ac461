//! Transport-neutral representation of questions and the records a lookup produced.
//!
//! Everything apart from the [`Question`] is flattened into strings, so that results from the
//! system resolver and from wire transports look alike.

#[cfg(feature = "json")]
use serde::Serialize;
use toluol_proto::{Class, RecordType};

/// What to ask a nameserver for.
#[cfg_attr(feature = "json", derive(Serialize))]
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Question {
    /// The name to look up. May or may not be fully qualified.
    pub name: String,
    pub qtype: RecordType,
    pub qclass: Class,
}

impl Question {
    /// Creates a question of class `IN`.
    pub fn new(name: impl Into<String>, qtype: RecordType) -> Self {
        Self {
            name: name.into(),
            qtype,
            qclass: Class::IN,
        }
    }
}

/// One record from the answer section.
#[cfg_attr(feature = "json", derive(Serialize))]
#[derive(PartialEq, Eq, Clone, Debug, Default)]
pub struct Answer {
    /// Fully qualified owner name.
    pub name: String,
    /// Type mnemonic, e.g. `AAAA`.
    #[cfg_attr(feature = "json", serde(rename = "type"))]
    pub rtype: String,
    /// Class mnemonic, e.g. `IN`.
    pub class: String,
    /// TTL with unit suffix, e.g. `300s`.
    pub ttl: String,
    /// The record's payload, e.g. an IP address or a CNAME target.
    pub address: String,
    /// Reply code mnemonic of the response, e.g. `NOERROR`.
    pub status: String,
    /// Round trip time measured by the client, e.g. `12ms`.
    pub rtt: String,
    /// The server that answered.
    pub nameserver: String,
}

/// One SOA record from the authority section.
#[cfg_attr(feature = "json", derive(Serialize))]
#[derive(PartialEq, Eq, Clone, Debug, Default)]
pub struct Authority {
    pub name: String,
    #[cfg_attr(feature = "json", serde(rename = "type"))]
    pub rtype: String,
    pub class: String,
    pub ttl: String,
    /// `<mname> <rname> <serial> <refresh> <retry> <expire> <minimum>`
    pub mname: String,
    pub status: String,
    pub rtt: String,
    pub nameserver: String,
}

/// The outcome of a single [`Lookup`](crate::Lookup).
#[cfg_attr(feature = "json", derive(Serialize))]
#[derive(PartialEq, Eq, Clone, Debug, Default)]
pub struct Response {
    /// The questions that were actually sent, one per name candidate tried.
    pub questions: Vec<Question>,
    pub answers: Vec<Answer>,
    pub authorities: Vec<Authority>,
}
