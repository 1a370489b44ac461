//! Definition of the DNSCrypt resolver [`Cert`]ificate and construction negotiation.

use std::fmt::{self, Display};

use byteorder::{ByteOrder, NetworkEndian};
use chrono::{TimeZone, Utc};
use crypto_box::SecretKey;
use rand::rngs::OsRng;
use rand::RngCore;
use ring::signature::{self, Ed25519KeyPair};

use crate::error::Error;
use crate::{
    Result, CERT_MAGIC, CERT_SIZE, CLIENT_MAGIC_SIZE, KEY_SIZE, SIGNATURE_SIZE, SIGNED_SIZE,
};

/// The authenticated encryption algorithm used between client and resolver, as announced in
/// the `es-version` field of a certificate.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Default)]
pub enum Construction {
    /// The value of a certificate that has not been filled in yet. Never valid on the wire.
    #[default]
    Undefined,
    XSalsa20Poly1305,
    XChaCha20Poly1305,
}

impl Construction {
    /// Encodes a `Construction` as its two-byte `es-version` value.
    pub fn encode(&self) -> u16 {
        match self {
            Construction::Undefined => 0x0000,
            Construction::XSalsa20Poly1305 => 0x0001,
            Construction::XChaCha20Poly1305 => 0x0002,
        }
    }

    /// Parses an `es-version` value.
    ///
    /// Returns an error for anything but the two known constructions.
    pub fn parse(val: u16) -> Result<Self> {
        match val {
            0x0001 => Ok(Construction::XSalsa20Poly1305),
            0x0002 => Ok(Construction::XChaCha20Poly1305),
            x => Err(Error::UnsupportedConstruction(x)),
        }
    }

    /// Higher is better. Used when several valid certificates are offered.
    fn preference(&self) -> u8 {
        match self {
            Construction::Undefined => 0,
            Construction::XSalsa20Poly1305 => 1,
            Construction::XChaCha20Poly1305 => 2,
        }
    }
}

impl Display for Construction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A DNSCrypt resolver certificate.
///
/// The serialized form is exactly [`CERT_SIZE`] bytes long (big-endian integers):
///
/// ```text
/// [0:4)     cert magic "DNSC"
/// [4:6)     es-version (construction)
/// [6:8)     protocol minor version, always 0
/// [8:72)    Ed25519 signature
/// [72:104)  resolver short-term public key
/// [104:112) client magic
/// [112:116) serial
/// [116:120) not-before (unix timestamp)
/// [120:124) not-after (unix timestamp, inclusive)
/// ```
///
/// The signature covers bytes `[72:124)` only.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Cert {
    /// Certificates with a higher serial are newer.
    pub serial: u32,
    /// The construction to use with this certificate's key.
    pub construction: Construction,
    /// Signature by the provider's long-term Ed25519 key.
    pub signature: [u8; SIGNATURE_SIZE],
    /// The resolver's short-term X25519 public key.
    pub resolver_pk: [u8; KEY_SIZE],
    /// The resolver's short-term X25519 secret key. Only known to the resolver operator; always
    /// zero on certificates received over the wire.
    pub resolver_sk: [u8; KEY_SIZE],
    /// Prefix clients put in front of queries encrypted for this certificate.
    pub client_magic: [u8; CLIENT_MAGIC_SIZE],
    /// Start of the validity window.
    pub not_before: u32,
    /// End of the validity window (inclusive).
    pub not_after: u32,
}

impl Default for Cert {
    fn default() -> Self {
        Self {
            serial: 0,
            construction: Construction::Undefined,
            signature: [0; SIGNATURE_SIZE],
            resolver_pk: [0; KEY_SIZE],
            resolver_sk: [0; KEY_SIZE],
            client_magic: [0; CLIENT_MAGIC_SIZE],
            not_before: 0,
            not_after: 0,
        }
    }
}

impl Cert {
    /// Creates an unsigned certificate with a fresh short-term key pair, as a resolver operator
    /// would. The client magic is derived from the new public key.
    ///
    /// Call [`sign()`](Self::sign) before handing it out.
    pub fn generate(
        serial: u32,
        construction: Construction,
        not_before: u32,
        not_after: u32,
    ) -> Self {
        let mut sk = [0; KEY_SIZE];
        OsRng.fill_bytes(&mut sk);
        let secret = SecretKey::from(sk);
        let resolver_pk = *secret.public_key().as_bytes();
        let mut client_magic = [0; CLIENT_MAGIC_SIZE];
        client_magic.copy_from_slice(&resolver_pk[..CLIENT_MAGIC_SIZE]);

        Self {
            serial,
            construction,
            signature: [0; SIGNATURE_SIZE],
            resolver_pk,
            resolver_sk: secret.to_bytes(),
            client_magic,
            not_before,
            not_after,
        }
    }

    /// Serializes the certificate into its 124 byte wire format.
    ///
    /// Returns an error if the construction is undefined or the certificate is not valid right
    /// now (see [`verify_date()`](Self::verify_date)).
    pub fn serialize(&self) -> Result<Vec<u8>> {
        if self.construction == Construction::Undefined {
            return Err(Error::UnsupportedConstruction(self.construction.encode()));
        }
        if !self.verify_date() {
            return Err(Error::InvalidValidityWindow(self.not_before, self.not_after));
        }

        let mut b = vec![0; CERT_SIZE];
        b[..4].copy_from_slice(&CERT_MAGIC);
        NetworkEndian::write_u16(&mut b[4..6], self.construction.encode());
        // b[6..8] is the protocol minor version and stays zero
        b[8..72].copy_from_slice(&self.signature);
        self.write_signed(&mut b[72..]);

        Ok(b)
    }

    /// Parses a certificate from its wire format. Bytes past the first 124 are ignored.
    ///
    /// Only the length, magic and construction are checked; the remaining fields are copied
    /// verbatim. Use [`verify_signature()`](Self::verify_signature) and
    /// [`verify_date()`](Self::verify_date) before trusting the result.
    pub fn deserialize(b: &[u8]) -> Result<Self> {
        if b.len() < CERT_SIZE {
            return Err(Error::TooShort(b.len()));
        }
        if b[..4] != CERT_MAGIC {
            return Err(Error::BadMagic);
        }
        let construction = Construction::parse(NetworkEndian::read_u16(&b[4..6]))?;

        let mut cert = Cert {
            construction,
            ..Default::default()
        };
        cert.signature.copy_from_slice(&b[8..72]);
        cert.resolver_pk.copy_from_slice(&b[72..104]);
        cert.client_magic.copy_from_slice(&b[104..112]);
        cert.serial = NetworkEndian::read_u32(&b[112..116]);
        cert.not_before = NetworkEndian::read_u32(&b[116..120]);
        cert.not_after = NetworkEndian::read_u32(&b[120..124]);

        Ok(cert)
    }

    /// Returns true iff the validity window is well-formed and contains the current time.
    pub fn verify_date(&self) -> bool {
        self.verify_date_at(now())
    }

    /// Like [`verify_date()`](Self::verify_date), but for an arbitrary unix timestamp.
    pub fn verify_date_at(&self, now: u32) -> bool {
        if self.not_before >= self.not_after {
            return false;
        }
        self.not_before <= now && now <= self.not_after
    }

    /// Signs the certificate with the provider's long-term Ed25519 key.
    pub fn sign(&mut self, key_pair: &Ed25519KeyPair) {
        let mut signed = [0; SIGNED_SIZE];
        self.write_signed(&mut signed);
        let signature = key_pair.sign(&signed);
        self.signature.copy_from_slice(signature.as_ref());
    }

    /// Returns true iff the signature verifies against the provider's Ed25519 public key.
    pub fn verify_signature(&self, public_key: &[u8]) -> bool {
        let mut signed = [0; SIGNED_SIZE];
        self.write_signed(&mut signed);
        signature::UnparsedPublicKey::new(&signature::ED25519, public_key)
            .verify(&signed, &self.signature)
            .is_ok()
    }

    /// Checks both the signature and the validity window at `now`.
    pub fn verify(&self, public_key: &[u8], now: u32) -> Result<()> {
        if !self.verify_signature(public_key) {
            return Err(Error::InvalidSignature);
        }
        if !self.verify_date_at(now) {
            return Err(Error::InvalidValidityWindow(self.not_before, self.not_after));
        }
        Ok(())
    }

    /// Writes `<resolver-pk> <client-magic> <serial> <ts-start> <ts-end>` into `dst`, which must
    /// be at least 52 bytes long.
    fn write_signed(&self, dst: &mut [u8]) {
        dst[..32].copy_from_slice(&self.resolver_pk);
        dst[32..40].copy_from_slice(&self.client_magic);
        NetworkEndian::write_u32(&mut dst[40..44], self.serial);
        NetworkEndian::write_u32(&mut dst[44..48], self.not_before);
        NetworkEndian::write_u32(&mut dst[48..52], self.not_after);
    }
}

impl Display for Cert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Certificate serial={} not-before={} not-after={} construction={}",
            self.serial,
            format_timestamp(self.not_before),
            format_timestamp(self.not_after),
            self.construction
        )
    }
}

/// Picks the certificate a client should use from the ones a resolver offered.
///
/// Certificates that do not verify against `provider_pk` or are not valid at `now` are
/// discarded. Among the rest, XChaCha20Poly1305 beats XSalsa20Poly1305, then the higher serial
/// wins, then the later end of the validity window.
pub fn select_best(
    certs: impl IntoIterator<Item = Cert>,
    provider_pk: &[u8],
    now: u32,
) -> Option<Cert> {
    certs
        .into_iter()
        .filter(|cert| match cert.verify(provider_pk, now) {
            Ok(()) => true,
            Err(e) => {
                log::debug!("skipping DNSCrypt certificate {}: {}", cert.serial, e);
                false
            }
        })
        .max_by_key(|cert| {
            (
                cert.construction.preference(),
                cert.serial,
                cert.not_after,
            )
        })
}

/// The current time as a unix timestamp, the way certificates store it.
pub fn now() -> u32 {
    Utc::now().timestamp().clamp(0, u32::MAX as i64) as u32
}

fn format_timestamp(ts: u32) -> String {
    Utc.timestamp_opt(i64::from(ts), 0)
        .single()
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use ring::rand::SystemRandom;
    use ring::signature::{Ed25519KeyPair, KeyPair};

    use super::*;

    fn provider_key() -> Ed25519KeyPair {
        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&SystemRandom::new()).unwrap();
        Ed25519KeyPair::from_pkcs8(pkcs8.as_ref()).unwrap()
    }

    fn valid_cert(serial: u32, construction: Construction) -> Cert {
        let now = now();
        Cert::generate(serial, construction, now - 60, now + 3600)
    }

    #[test]
    fn serialize_deserialize() {
        let key = provider_key();
        let mut cert = valid_cert(7, Construction::XSalsa20Poly1305);
        cert.sign(&key);

        let b = cert.serialize().unwrap();
        assert_eq!(b.len(), CERT_SIZE);
        assert_eq!(&b[..4], b"DNSC");
        assert_eq!(&b[4..8], &[0, 1, 0, 0]);

        let parsed = Cert::deserialize(&b).unwrap();
        // the secret key never goes over the wire
        let expected = Cert {
            resolver_sk: [0; KEY_SIZE],
            ..cert
        };
        assert_eq!(parsed, expected);
        assert_eq!(parsed.serialize().unwrap(), b);
    }

    #[test]
    fn serialize_rejects_undefined_construction() {
        let cert = valid_cert(1, Construction::Undefined);
        assert!(matches!(
            cert.serialize(),
            Err(Error::UnsupportedConstruction(0))
        ));
    }

    #[test]
    fn serialize_rejects_expired() {
        let mut cert = valid_cert(1, Construction::XChaCha20Poly1305);
        cert.not_before = 10;
        cert.not_after = 20;
        assert!(matches!(
            cert.serialize(),
            Err(Error::InvalidValidityWindow(10, 20))
        ));
    }

    #[test]
    fn deserialize_errors() {
        let key = provider_key();
        let mut cert = valid_cert(1, Construction::XChaCha20Poly1305);
        cert.sign(&key);
        let b = cert.serialize().unwrap();

        assert!(matches!(
            Cert::deserialize(&b[..123]),
            Err(Error::TooShort(123))
        ));

        let mut bad_magic = b.clone();
        bad_magic[0] = b'X';
        assert!(matches!(Cert::deserialize(&bad_magic), Err(Error::BadMagic)));

        let mut bad_construction = b;
        bad_construction[5] = 3;
        assert!(matches!(
            Cert::deserialize(&bad_construction),
            Err(Error::UnsupportedConstruction(3))
        ));
    }

    #[test]
    fn signature() {
        let key = provider_key();
        let other = provider_key();
        let mut cert = valid_cert(42, Construction::XSalsa20Poly1305);
        cert.sign(&key);

        assert!(cert.verify_signature(key.public_key().as_ref()));
        assert!(!cert.verify_signature(other.public_key().as_ref()));

        // the construction is not part of the signed data
        cert.construction = Construction::XChaCha20Poly1305;
        assert!(cert.verify_signature(key.public_key().as_ref()));

        cert.serial += 1;
        assert!(!cert.verify_signature(key.public_key().as_ref()));
    }

    #[test]
    fn default_is_blank() {
        let cert = Cert::default();
        assert_eq!(cert.construction, Construction::Undefined);
        assert_eq!(cert.signature, [0; SIGNATURE_SIZE]);
        assert_eq!(cert.resolver_sk, [0; KEY_SIZE]);
        assert!(matches!(
            cert.serialize(),
            Err(Error::UnsupportedConstruction(_))
        ));
    }

    #[test]
    fn date() {
        let cert = Cert {
            not_before: 100,
            not_after: 200,
            ..Default::default()
        };
        assert!(!cert.verify_date_at(99));
        assert!(cert.verify_date_at(100));
        assert!(cert.verify_date_at(200));
        assert!(!cert.verify_date_at(201));

        let inverted = Cert {
            not_before: 200,
            not_after: 200,
            ..Default::default()
        };
        assert!(!inverted.verify_date_at(200));
    }

    #[test]
    fn negotiation_prefers_xchacha() {
        let key = provider_key();
        let pk = key.public_key().as_ref().to_vec();

        let mut salsa = valid_cert(10, Construction::XSalsa20Poly1305);
        salsa.sign(&key);
        let mut chacha = valid_cert(3, Construction::XChaCha20Poly1305);
        chacha.sign(&key);
        let mut newer_chacha = valid_cert(4, Construction::XChaCha20Poly1305);
        newer_chacha.sign(&key);
        let mut forged = valid_cert(99, Construction::XChaCha20Poly1305);
        forged.sign(&provider_key());

        let best = select_best(
            vec![salsa.clone(), chacha, newer_chacha, forged],
            &pk,
            now(),
        )
        .unwrap();
        assert_eq!(best.construction, Construction::XChaCha20Poly1305);
        assert_eq!(best.serial, 4);

        assert_eq!(select_best(vec![salsa.clone()], &pk, now()), Some(salsa));
        assert_eq!(select_best(Vec::new(), &pk, now()), None);
    }

    #[test]
    fn negotiation_skips_expired() {
        let key = provider_key();
        let pk = key.public_key().as_ref().to_vec();
        let mut cert = valid_cert(1, Construction::XChaCha20Poly1305);
        cert.sign(&key);

        assert!(select_best(vec![cert.clone()], &pk, cert.not_after + 1).is_none());
        assert!(matches!(
            cert.verify(&pk, cert.not_after + 1),
            Err(Error::InvalidValidityWindow(..))
        ));
        assert!(matches!(
            cert.verify(&[0; 32], cert.not_after),
            Err(Error::InvalidSignature)
        ));
        assert!(cert.verify(&pk, cert.not_after).is_ok());
    }
}
