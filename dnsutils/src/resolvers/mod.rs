//! The transports a [`Resolver`](crate::Resolver) can use.
//!
//! Every transport implements [`Lookup`]. The wire transports share the candidate loop in
//! [`query_candidates()`], which handles search list expansion, ID checks and the escalation to
//! TCP after a truncated reply.

use std::fmt;
use std::io::Cursor;
use std::time::Instant;

use toluol_proto::{Header, Message};

use crate::error::Error;
use crate::model::{Question, Response};
use crate::names::prepare_messages;
use crate::net::Network;
use crate::normalize::{parse_message, parse_question};
use crate::options::ResolverOptions;
use crate::Result;

pub mod classic;
pub mod dnscrypt;
#[cfg(feature = "http")]
pub mod doh;
pub mod system;

pub use classic::{ClassicResolver, ClassicResolverOpts};
pub use dnscrypt::{DnsCryptResolver, DnsCryptResolverOpts};
#[cfg(feature = "http")]
pub use doh::DohResolver;
pub use system::SystemResolver;

/// Answers a single [`Question`].
pub trait Lookup: Send + Sync {
    fn lookup(&self, question: &Question) -> Result<Response>;
}

/// One of the supported transports.
pub enum Transport {
    /// Plain UDP, TCP, or DNS over TLS.
    Classic(ClassicResolver),
    /// DNS over HTTPS.
    #[cfg(feature = "http")]
    Doh(DohResolver),
    DnsCrypt(DnsCryptResolver),
    /// The operating system's resolver.
    System(SystemResolver),
    /// Any other [`Lookup`] implementation, e.g. a fixed table for tests.
    Custom(Box<dyn Lookup>),
}

impl Transport {
    /// A short description, used for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Transport::Classic(_) => "classic",
            #[cfg(feature = "http")]
            Transport::Doh(_) => "doh",
            Transport::DnsCrypt(_) => "dnscrypt",
            Transport::System(_) => "system",
            Transport::Custom(_) => "custom",
        }
    }
}

impl Lookup for Transport {
    fn lookup(&self, question: &Question) -> Result<Response> {
        match self {
            Transport::Classic(resolver) => resolver.lookup(question),
            #[cfg(feature = "http")]
            Transport::Doh(resolver) => resolver.lookup(question),
            Transport::DnsCrypt(resolver) => resolver.lookup(question),
            Transport::System(resolver) => resolver.lookup(question),
            Transport::Custom(resolver) => resolver.lookup(question),
        }
    }
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Classic(resolver) => fmt::Debug::fmt(resolver, f),
            #[cfg(feature = "http")]
            Transport::Doh(resolver) => fmt::Debug::fmt(resolver, f),
            Transport::DnsCrypt(resolver) => fmt::Debug::fmt(resolver, f),
            Transport::System(resolver) => fmt::Debug::fmt(resolver, f),
            Transport::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Sends one query per name candidate of `question` until a reply contains answers.
///
/// `exchange` sends an encoded query over the given network and returns the raw reply. If a reply
/// received over a datagram network is truncated, all candidates are tried again over the TCP
/// variant of that network; this happens at most once. A truncated reply over a stream network is
/// an error.
///
/// The returned [`Response`] lists the questions sent during the last pass over the candidates,
/// and the answers and authorities of the last reply.
pub(crate) fn query_candidates<F>(
    question: &Question,
    opts: &ResolverOptions,
    mut network: Network,
    server: &str,
    mut exchange: F,
) -> Result<Response>
where
    F: FnMut(Network, &[u8]) -> Result<Vec<u8>>,
{
    let msgs = prepare_messages(question, opts.ndots, &opts.search_list)?;
    let mut escalated = false;

    'candidates: loop {
        let mut response = Response::default();

        for msg in &msgs {
            response
                .questions
                .extend(msg.questions.iter().map(parse_question));

            log::debug!(
                "querying {} for {} over {}",
                server,
                msg.questions[0].qname,
                network
            );
            let query = msg.encode()?;
            let start = Instant::now();
            let reply = exchange(network, &query)?;
            let rtt = start.elapsed();

            let header = Header::parse(&mut Cursor::new(&reply[..]))?;
            if header.msg_id != msg.header.msg_id {
                return Err(Error::IdMismatch);
            }
            if header.flags.tc {
                if network.is_stream() || escalated {
                    return Err(Error::Truncated);
                }
                network = network.to_tcp();
                escalated = true;
                log::debug!("reply was truncated, retrying over {}", network);
                continue 'candidates;
            }

            let reply = Message::parse(&mut Cursor::new(&reply[..]))?;
            let parsed = parse_message(&reply, rtt, server);
            response.answers = parsed.answers;
            response.authorities = parsed.authorities;
            if !response.answers.is_empty() {
                break;
            }
        }

        return Ok(response);
    }
}
