//! Session-wide resolver configuration.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::net::{Dialer, SystemDialer};

/// Default timeout for every network operation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default label-count threshold, see [`ResolverOptions::ndots`].
pub const DEFAULT_NDOTS: usize = 1;

/// Which address family the system resolver should prefer.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Default)]
pub enum Prefer {
    /// Return every address the operating system reports.
    #[default]
    None,
    /// Return only IPv4 addresses if there are any.
    Ipv4,
    /// Return only IPv6 addresses if there are any.
    Ipv6,
}

/// Options shared by all transports of a [`Resolver`](crate::Resolver).
///
/// Create one with [`ResolverOptions::default()`] and adjust it with the `with_*` methods.
#[derive(Clone)]
pub struct ResolverOptions {
    /// Restrict classic transports to IPv4. Setting both this and `use_ipv6` is the same as
    /// setting neither.
    pub use_ipv4: bool,
    /// Restrict classic transports to IPv6.
    pub use_ipv6: bool,
    /// Suffixes appended to names that are not fully qualified.
    pub search_list: Vec<String>,
    /// Names with more labels than this are tried as-is before the search list is applied.
    pub ndots: usize,
    pub prefer: Prefer,
    /// Bounds connecting, reading and writing.
    pub timeout: Duration,
    /// Disables certificate verification for DNS over TLS.
    pub insecure_skip_verify: bool,
    /// Name to verify the DoT server's certificate against. Defaults to the host part of the
    /// nameserver address and is required if that is an IP address.
    pub tls_hostname: Option<String>,
    /// Opens all sockets used by the classic and DNSCrypt transports.
    pub dialer: Arc<dyn Dialer>,
    /// HTTP agent for DoH. If unset, one is built with [`timeout`](Self::timeout).
    #[cfg(feature = "http")]
    pub http_agent: Option<ureq::Agent>,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            use_ipv4: false,
            use_ipv6: false,
            search_list: Vec::new(),
            ndots: DEFAULT_NDOTS,
            prefer: Prefer::None,
            timeout: DEFAULT_TIMEOUT,
            insecure_skip_verify: false,
            tls_hostname: None,
            dialer: Arc::new(SystemDialer),
            #[cfg(feature = "http")]
            http_agent: None,
        }
    }
}

impl ResolverOptions {
    pub fn with_ipv4(mut self, use_ipv4: bool) -> Self {
        self.use_ipv4 = use_ipv4;
        self
    }

    pub fn with_ipv6(mut self, use_ipv6: bool) -> Self {
        self.use_ipv6 = use_ipv6;
        self
    }

    pub fn with_search_list<S: Into<String>>(
        mut self,
        search_list: impl IntoIterator<Item = S>,
    ) -> Self {
        self.search_list = search_list.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_ndots(mut self, ndots: usize) -> Self {
        self.ndots = ndots;
        self
    }

    pub fn with_prefer(mut self, prefer: Prefer) -> Self {
        self.prefer = prefer;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_insecure_skip_verify(mut self, insecure_skip_verify: bool) -> Self {
        self.insecure_skip_verify = insecure_skip_verify;
        self
    }

    pub fn with_tls_hostname(mut self, tls_hostname: impl Into<String>) -> Self {
        self.tls_hostname = Some(tls_hostname.into());
        self
    }

    pub fn with_dialer(mut self, dialer: Arc<dyn Dialer>) -> Self {
        self.dialer = dialer;
        self
    }

    #[cfg(feature = "http")]
    pub fn with_http_agent(mut self, agent: ureq::Agent) -> Self {
        self.http_agent = Some(agent);
        self
    }
}

impl fmt::Debug for ResolverOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverOptions")
            .field("use_ipv4", &self.use_ipv4)
            .field("use_ipv6", &self.use_ipv6)
            .field("search_list", &self.search_list)
            .field("ndots", &self.ndots)
            .field("prefer", &self.prefer)
            .field("timeout", &self.timeout)
            .field("insecure_skip_verify", &self.insecure_skip_verify)
            .field("tls_hostname", &self.tls_hostname)
            .finish_non_exhaustive()
    }
}
