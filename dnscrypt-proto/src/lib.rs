//! `dnscrypt-proto` provides the pieces of the [DNSCrypt](https://dnscrypt.info/protocol) protocol
//! that a client (and, for testing or small deployments, a resolver operator) needs: the binary
//! certificate format with its Ed25519 signature, construction negotiation, `sdns://` server
//! stamps, query padding and the authenticated box encryption of queries and responses.
//!
//! It does not send anything over the network. [`dnsutils`] uses it to bootstrap an encrypted
//! session with a DNSCrypt resolver.
//!
//! # Basic usage example
//! ```rust
//! use dnscrypt_proto::{pad, unpad};
//!
//! let query = b"an encoded DNS query";
//! let padded = pad(query);
//! assert_eq!(padded.len(), 256);
//! assert_eq!(unpad(&padded).unwrap(), query);
//! ```
//!
//! [`dnsutils`]: ../dnsutils/index.html

pub mod cert;
pub mod crypto;
pub mod error;
pub mod padding;
pub mod stamp;

pub use cert::{select_best, Cert, Construction};
pub use crypto::{ClientKeys, Session};
pub use error::Error;
pub use padding::{pad, unpad};
pub use stamp::ServerStamp;

/// Result type used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Size of a serialized certificate.
pub const CERT_SIZE: usize = 124;

/// Size of the part of the certificate covered by the signature.
pub const SIGNED_SIZE: usize = 52;

/// Size of an Ed25519 signature.
pub const SIGNATURE_SIZE: usize = 64;

/// Size of the public and secret keys (32 bytes when using X25519).
pub const KEY_SIZE: usize = 32;

/// Size of the client magic, i.e. the first 8 bytes of a client query.
pub const CLIENT_MAGIC_SIZE: usize = 8;

/// Size of the resolver magic, i.e. the first 8 bytes of every response.
pub const RESOLVER_MAGIC_SIZE: usize = 8;

/// Full nonce size of both constructions.
pub const NONCE_SIZE: usize = 24;

/// The client chooses one half of the nonce, the resolver the other.
pub const HALF_NONCE_SIZE: usize = NONCE_SIZE / 2;

/// Size of the Poly1305 authentication tag.
pub const TAG_SIZE: usize = 16;

/// Queries are padded to at least this many bytes. Must be a multiple of [`PADDING_BLOCK_SIZE`].
pub const MIN_UDP_QUESTION_SIZE: usize = 256;

/// Padded packets have a length that is a multiple of this.
pub const PADDING_BLOCK_SIZE: usize = 64;

/// Minimum possible DNS packet size (header plus the smallest question).
pub const MIN_DNS_PACKET_SIZE: usize = 12 + 5;

/// Largest DNS message that can be carried.
pub const MAX_DNS_PACKET_SIZE: usize = 65535;

/// Magic bytes at the start of every serialized certificate.
pub const CERT_MAGIC: [u8; 4] = *b"DNSC";

/// Magic bytes at the start of every resolver response.
pub const RESOLVER_MAGIC: [u8; RESOLVER_MAGIC_SIZE] = *b"r6fnvWj8";
