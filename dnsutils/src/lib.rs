//! `dnsutils` resolves hostnames over several DNS transports behind one uniform [`Lookup`]
//! interface: classic UDP/TCP, DNS over TLS, DNS over HTTPS, DNSCrypt and the operating system's
//! own resolver.
//!
//! The [`Resolver`] facade picks a transport from a nameserver address, answers from a local hosts
//! table and a TTL cache where it can, and follows CNAME chains until it reaches addresses.
//!
//! # Basic usage example
//! ```rust,no_run
//! use dnsutils::{Resolver, ResolverOptions};
//!
//! let mut resolver = Resolver::new(ResolverOptions::default())
//!     .with_host("router.lan", vec!["192.168.1.1".into()]);
//! resolver.set_dns_server("udp://9.9.9.9:53").unwrap();
//!
//! let addrs = resolver.resolve("example.com").unwrap();
//! println!("{:?}", addrs);
//! # assert_eq!(resolver.resolve("router.lan").unwrap(), vec!["192.168.1.1"]);
//! ```
//!
//! Wire messages are built and parsed with [`toluol_proto`]; the DNSCrypt certificate protocol
//! lives in [`dnscrypt_proto`].

pub mod cache;
pub mod error;
pub mod model;
pub mod names;
pub mod net;
pub mod normalize;
pub mod options;
pub mod resolver;
pub mod resolvers;

pub use error::Error;
pub use model::{Answer, Authority, Question, Response};
pub use options::{Prefer, ResolverOptions};
pub use resolver::Resolver;
pub use resolvers::{Lookup, Transport};

/// Result type used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;
