//! The [`Resolver`] facade: transport selection, hosts table, caching and CNAME chasing.

use std::collections::HashMap;
use std::time::Duration;

use toluol_proto::RecordType;

use crate::cache::Cache;
use crate::error::Error;
use crate::model::{Question, Response};
use crate::names::fqdn;
use crate::options::ResolverOptions;
use crate::resolvers::classic::{strip_prefix_ignore_case, ClassicResolverOpts};
use crate::resolvers::{
    ClassicResolver, DnsCryptResolver, DnsCryptResolverOpts, Lookup, SystemResolver, Transport,
};
use crate::Result;

/// How long resolved addresses are cached by default.
pub const DEFAULT_CACHE_EXPIRATION: Duration = Duration::from_secs(60 * 60);

/// Maximum number of CNAMEs followed for a single name.
pub const MAX_CNAME_DEPTH: usize = 8;

/// The kinds of nameserver addresses [`Resolver::set_dns_server()`] understands.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum ServerKind {
    Udp,
    Tcp,
    Tls,
    Https,
    DnsCrypt,
    /// No scheme at all.
    System,
    /// A scheme that is not supported.
    Unknown,
}

impl ServerKind {
    /// Classifies `address` by its scheme, ignoring case.
    pub fn classify(address: &str) -> Self {
        let schemes = [
            ("udp://", ServerKind::Udp),
            ("tcp://", ServerKind::Tcp),
            ("tls://", ServerKind::Tls),
            ("https://", ServerKind::Https),
            ("sdns://", ServerKind::DnsCrypt),
        ];
        for (scheme, kind) in schemes {
            if strip_prefix_ignore_case(address, scheme).is_some() {
                return kind;
            }
        }
        if address.contains("://") {
            ServerKind::Unknown
        } else {
            ServerKind::System
        }
    }
}

/// Resolves hostnames to addresses.
///
/// A new resolver uses the operating system's resolver until
/// [`set_dns_server()`](Self::set_dns_server) picks another transport. Resolved addresses are
/// cached under the fully qualified name that was asked for.
#[derive(Debug)]
pub struct Resolver {
    options: ResolverOptions,
    transport: Transport,
    cache: Cache<Vec<String>>,
    hosts: HashMap<String, Vec<String>>,
}

impl Resolver {
    pub fn new(options: ResolverOptions) -> Self {
        Self {
            transport: Transport::System(SystemResolver::new(&options)),
            options,
            cache: Cache::new(DEFAULT_CACHE_EXPIRATION),
            hosts: HashMap::new(),
        }
    }

    /// Adds a static entry. [`resolve()`](Self::resolve) returns `addrs` for `name` without
    /// asking any nameserver; the name has to match exactly.
    pub fn with_host(mut self, name: impl Into<String>, addrs: Vec<String>) -> Self {
        self.hosts.insert(name.into(), addrs);
        self
    }

    /// Replaces the cache with an empty one whose entries expire after `expiration`. A zero
    /// duration keeps entries forever.
    pub fn with_cache_expiration(mut self, expiration: Duration) -> Self {
        self.cache = Cache::new(expiration);
        self
    }

    /// Uses `transport` instead of the one selected by [`set_dns_server()`](Self::set_dns_server).
    pub fn with_transport(mut self, transport: Transport) -> Self {
        self.transport = transport;
        self
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Selects the transport from the scheme of `address`:
    ///
    /// | Scheme     | Transport            |
    /// |------------|----------------------|
    /// | `udp://`   | plain UDP            |
    /// | `tcp://`   | plain TCP            |
    /// | `tls://`   | DNS over TLS         |
    /// | `https://` | DNS over HTTPS       |
    /// | `sdns://`  | DNSCrypt over TCP    |
    /// | none       | the system resolver  |
    ///
    /// An unsupported scheme installs the system resolver as well, but returns
    /// [`Error::UnknownScheme`]. If the transport cannot be set up, the previous one stays in
    /// place.
    pub fn set_dns_server(&mut self, address: &str) -> Result<()> {
        let opts = self.options.clone();
        let classic = |use_tcp, use_tls| {
            ClassicResolver::new(address, ClassicResolverOpts { use_tcp, use_tls }, opts.clone())
                .map(Transport::Classic)
        };

        let kind = ServerKind::classify(address);
        let transport = match kind {
            ServerKind::Udp => classic(false, false)?,
            ServerKind::Tcp => classic(true, false)?,
            ServerKind::Tls => classic(true, true)?,
            #[cfg(feature = "http")]
            ServerKind::Https => {
                Transport::Doh(crate::resolvers::DohResolver::new(address, opts.clone())?)
            }
            #[cfg(not(feature = "http"))]
            ServerKind::Https => {
                return Err(Error::Config(
                    "DNS over HTTPS requires the http feature".to_string(),
                ))
            }
            ServerKind::DnsCrypt => Transport::DnsCrypt(DnsCryptResolver::new(
                address,
                DnsCryptResolverOpts { use_tcp: true },
                opts.clone(),
            )?),
            ServerKind::System | ServerKind::Unknown => {
                Transport::System(SystemResolver::new(&opts))
            }
        };
        log::debug!("initiated {} resolver for {}", transport.name(), address);
        self.transport = transport;

        if kind == ServerKind::Unknown {
            log::error!(
                "unknown nameserver type {}, using the system resolver as fallback",
                address
            );
            return Err(Error::UnknownScheme(address.to_string()));
        }
        Ok(())
    }

    /// Resolves `name` to a list of addresses.
    ///
    /// The hosts table is consulted first, then the cache, then the transport with an `A`
    /// question. If the first answer is a CNAME, its target is resolved instead. The result is
    /// cached under `name` only.
    pub fn resolve(&self, name: &str) -> Result<Vec<String>> {
        self.resolve_with_depth(name, 0)
    }

    fn resolve_with_depth(&self, name: &str, depth: usize) -> Result<Vec<String>> {
        if let Some(addrs) = self.hosts.get(name) {
            return Ok(addrs.clone());
        }

        let name = fqdn(name);
        if let Some(addrs) = self.cache.get(&name) {
            log::debug!("using cached value for {}", name);
            return Ok(addrs);
        }

        let response = self.transport.lookup(&Question::new(name.clone(), RecordType::A))?;
        let first = response
            .answers
            .first()
            .ok_or_else(|| Error::NoAnswers(name.clone()))?;
        log::debug!("resolved {} to {}", name, first.address);

        let addrs = if first.rtype == RecordType::CNAME.to_string() {
            if depth >= MAX_CNAME_DEPTH {
                return Err(Error::CnameChainTooLong(name));
            }
            self.resolve_with_depth(&first.address, depth + 1)?
        } else {
            response
                .answers
                .iter()
                .map(|answer| answer.address.clone())
                .collect()
        };

        // only the name that was asked for, not the targets of the CNAME chain
        if depth == 0 {
            self.cache.set(name, addrs.clone());
        }
        Ok(addrs)
    }

    /// Sends `question` to the current transport and returns the full response.
    pub fn lookup(&self, question: &Question) -> Result<Response> {
        self.transport.lookup(question)
    }
}
