//! Lookups through the operating system's resolver.

use std::net::{IpAddr, ToSocketAddrs};
use std::time::Instant;

use toluol_proto::{Class, RCode, RecordType};

use crate::model::{Answer, Question, Response};
use crate::names::fqdn;
use crate::options::{Prefer, ResolverOptions};
use crate::resolvers::Lookup;
use crate::Result;

/// The operating system does not report TTLs, so every answer carries this one.
pub const DEFAULT_TTL: &str = "60s";

/// Shown as the nameserver of every answer.
pub const NAMESERVER: &str = "system";

/// Resolves addresses with `getaddrinfo` or whatever the platform uses. `A` questions get only
/// IPv4 addresses and `AAAA` questions only IPv6 addresses; any other type gets both. Search
/// lists are left to the operating system.
#[derive(Clone, Debug)]
pub struct SystemResolver {
    prefer: Prefer,
}

impl SystemResolver {
    pub fn new(opts: &ResolverOptions) -> Self {
        Self {
            prefer: opts.prefer,
        }
    }
}

impl Lookup for SystemResolver {
    fn lookup(&self, question: &Question) -> Result<Response> {
        let name = fqdn(&question.name);
        let host = match name.strip_suffix('.') {
            Some(host) if !host.is_empty() => host,
            _ => name.as_str(),
        };
        log::debug!("looking up {} with the system resolver", host);

        let start = Instant::now();
        let addrs: Vec<IpAddr> = (host, 0).to_socket_addrs()?.map(|addr| addr.ip()).collect();
        let rtt = format!("{}ms", start.elapsed().as_millis());

        let mut answers = Vec::new();
        for ip in prefer_family(match_qtype(dedup(addrs), question.qtype), self.prefer) {
            let rtype = match ip {
                IpAddr::V4(_) => RecordType::A,
                IpAddr::V6(_) => RecordType::AAAA,
            };
            answers.push(Answer {
                name: name.clone(),
                rtype: rtype.to_string(),
                class: Class::IN.to_string(),
                ttl: DEFAULT_TTL.to_string(),
                address: ip.to_string(),
                status: RCode::NOERROR.to_string(),
                rtt: rtt.clone(),
                nameserver: NAMESERVER.to_string(),
            });
        }

        Ok(Response {
            questions: vec![Question {
                name,
                ..question.clone()
            }],
            answers,
            authorities: Vec::new(),
        })
    }
}

/// The system reports one address per socket type, so the same IP may come up several times.
fn dedup(addrs: Vec<IpAddr>) -> Vec<IpAddr> {
    let mut unique = Vec::with_capacity(addrs.len());
    for addr in addrs {
        if !unique.contains(&addr) {
            unique.push(addr);
        }
    }
    unique
}

/// Drops addresses of the family the question type does not ask for.
fn match_qtype(addrs: Vec<IpAddr>, qtype: RecordType) -> Vec<IpAddr> {
    match qtype {
        RecordType::A => addrs.into_iter().filter(IpAddr::is_ipv4).collect(),
        RecordType::AAAA => addrs.into_iter().filter(IpAddr::is_ipv6).collect(),
        _ => addrs,
    }
}

/// Keeps only addresses of the preferred family, unless there are none of them.
fn prefer_family(addrs: Vec<IpAddr>, prefer: Prefer) -> Vec<IpAddr> {
    let wanted = |ip: &IpAddr| match prefer {
        Prefer::None => true,
        Prefer::Ipv4 => ip.is_ipv4(),
        Prefer::Ipv6 => ip.is_ipv6(),
    };
    if addrs.iter().any(wanted) {
        addrs.into_iter().filter(wanted).collect()
    } else {
        addrs
    }
}
