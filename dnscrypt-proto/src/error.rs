//! Custom error type definitions.

use thiserror::Error;

/// Errors that may arise while handling DNSCrypt certificates, stamps and packets.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Certificate is too short: need {expected} bytes, got {0}.", expected = crate::CERT_SIZE)]
    TooShort(usize),

    #[error("Invalid certificate magic: expected \"DNSC\".")]
    BadMagic,

    #[error("Unsupported crypto construction (es-version): {0:#06x}.")]
    UnsupportedConstruction(u16),

    #[error("Certificate has an invalid validity window (not-before {0}, not-after {1}).")]
    InvalidValidityWindow(u32, u32),

    #[error("Certificate signature does not verify against the provider public key.")]
    InvalidSignature,

    #[error("Invalid padding: no 0x80 marker found.")]
    InvalidPadding,

    #[error("Invalid DNS stamp: {0}.")]
    InvalidStamp(String),

    #[error("DNSCrypt query is too large: {0} bytes.")]
    QueryTooLarge(usize),

    #[error("DNSCrypt query is invalid and cannot be decrypted.")]
    InvalidQuery,

    #[error("DNSCrypt query contains an invalid client magic.")]
    InvalidClientMagic,

    #[error("DNSCrypt response contains an invalid resolver magic.")]
    InvalidResolverMagic,

    #[error("DNSCrypt response is invalid and cannot be decrypted.")]
    InvalidResponse,

    #[error("No valid certificate was offered by the resolver.")]
    NoValidCert,

    #[error("Could not handle Ed25519 key material.")]
    Key,
}
