//! Plain DNS over UDP or TCP, and DNS over TLS.

use std::fmt;

#[cfg(feature = "tls")]
use std::sync::Arc;

use crate::error::Error;
use crate::model::{Question, Response};
use crate::net::{self, Nameserver, Network};
use crate::options::ResolverOptions;
use crate::resolvers::{query_candidates, Lookup};
use crate::Result;

/// The default port, also used for DNS over TLS.
pub const DNS_PORT: u16 = 53;

#[derive(PartialEq, Eq, Copy, Clone, Debug, Default)]
pub struct ClassicResolverOpts {
    pub use_tcp: bool,
    /// Implies `use_tcp`.
    pub use_tls: bool,
}

#[cfg(feature = "tls")]
struct TlsParams {
    config: Arc<rustls::ClientConfig>,
    server_name: rustls::ServerName,
}

pub struct ClassicResolver {
    nameserver: Nameserver,
    network: Network,
    opts: ResolverOptions,
    #[cfg(feature = "tls")]
    tls: Option<TlsParams>,
}

impl ClassicResolver {
    /// Creates a resolver for `server`, which may carry a `udp://`, `tcp://` or `tls://` scheme.
    /// The port defaults to 53, regardless of whether TLS is used.
    pub fn new(
        server: &str,
        classic_opts: ClassicResolverOpts,
        opts: ResolverOptions,
    ) -> Result<Self> {
        let address = ["udp://", "tcp://", "tls://"]
            .iter()
            .find_map(|scheme| strip_prefix_ignore_case(server, scheme))
            .unwrap_or(server);
        let nameserver = Nameserver::parse(address, DNS_PORT)?;
        let network = Network::new(classic_opts.use_tcp, classic_opts.use_tls, &opts);

        #[cfg(feature = "tls")]
        let tls = if classic_opts.use_tls {
            let host = opts.tls_hostname.as_deref().unwrap_or(&nameserver.host);
            let server_name = rustls::ServerName::try_from(host).map_err(|_| {
                Error::Config(format!(
                    "{} is not a valid TLS server name, please set a TLS hostname",
                    host
                ))
            })?;
            Some(TlsParams {
                config: net::tls_config(opts.insecure_skip_verify),
                server_name,
            })
        } else {
            None
        };
        #[cfg(not(feature = "tls"))]
        {
            if classic_opts.use_tls {
                return Err(Error::Config(
                    "DNS over TLS requires the tls feature".to_string(),
                ));
            }
        }

        log::debug!("using nameserver {} over {}", nameserver, network);

        Ok(Self {
            nameserver,
            network,
            opts,
            #[cfg(feature = "tls")]
            tls,
        })
    }

    pub fn nameserver(&self) -> &Nameserver {
        &self.nameserver
    }

    pub fn network(&self) -> Network {
        self.network
    }

    fn exchange(&self, network: Network, query: &[u8]) -> Result<Vec<u8>> {
        let dialer = self.opts.dialer.as_ref();
        let (ns, family, timeout) = (&self.nameserver, network.family, self.opts.timeout);

        #[cfg(feature = "tls")]
        {
            if let (true, Some(tls)) = (network.tls, &self.tls) {
                return net::send_query_tls(
                    dialer,
                    ns,
                    family,
                    timeout,
                    Arc::clone(&tls.config),
                    tls.server_name.clone(),
                    query,
                );
            }
        }

        if network.is_stream() {
            net::send_query_tcp(dialer, ns, family, timeout, query)
        } else {
            net::send_query_udp(dialer, ns, family, timeout, query)
        }
    }
}

impl Lookup for ClassicResolver {
    fn lookup(&self, question: &Question) -> Result<Response> {
        let server = self.nameserver.to_string();
        query_candidates(question, &self.opts, self.network, &server, |network, query| {
            self.exchange(network, query)
        })
    }
}

impl fmt::Debug for ClassicResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassicResolver")
            .field("nameserver", &self.nameserver)
            .field("network", &self.network)
            .finish_non_exhaustive()
    }
}

/// Strips `prefix` from `s`, ignoring ASCII case.
pub(crate) fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}
