//! Authenticated encryption of DNSCrypt queries and responses.
//!
//! A query on the wire looks like
//!
//! ```text
//! <client-magic> <client-pk> <client-nonce> <box(pad(query))>
//! ```
//!
//! and the matching response like
//!
//! ```text
//! <resolver-magic> <client-nonce> <resolver-nonce> <box(pad(response))>
//! ```
//!
//! Both directions use the same shared key, derived from the client's key pair and the
//! resolver's short-term key pair announced in the [`Cert`].

use crypto_box::aead::generic_array::GenericArray;
use crypto_box::aead::Aead;
use crypto_box::{ChaChaBox, PublicKey, SalsaBox, SecretKey};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::cert::{Cert, Construction};
use crate::error::Error;
use crate::padding::{pad, pad_to_min, unpad};
use crate::{
    Result, CLIENT_MAGIC_SIZE, HALF_NONCE_SIZE, KEY_SIZE, MAX_DNS_PACKET_SIZE,
    MIN_DNS_PACKET_SIZE, NONCE_SIZE, RESOLVER_MAGIC, RESOLVER_MAGIC_SIZE, TAG_SIZE,
};

const QUERY_HEADER_SIZE: usize = CLIENT_MAGIC_SIZE + KEY_SIZE + HALF_NONCE_SIZE;
const RESPONSE_HEADER_SIZE: usize = RESOLVER_MAGIC_SIZE + NONCE_SIZE;

/// The client's X25519 key pair. One pair is usually generated per resolver and reused for all
/// queries to it.
pub struct ClientKeys {
    secret: SecretKey,
    public: [u8; KEY_SIZE],
}

impl ClientKeys {
    /// Generates a fresh random key pair.
    pub fn generate() -> Self {
        let mut sk = [0; KEY_SIZE];
        OsRng.fill_bytes(&mut sk);
        Self::from_secret(sk)
    }

    /// Restores a key pair from its 32 byte secret key.
    pub fn from_secret_slice(sk: &[u8]) -> Result<Self> {
        let sk: [u8; KEY_SIZE] = sk.try_into().map_err(|_| Error::Key)?;
        Ok(Self::from_secret(sk))
    }

    fn from_secret(sk: [u8; KEY_SIZE]) -> Self {
        let secret = SecretKey::from(sk);
        let public = *secret.public_key().as_bytes();
        Self { secret, public }
    }

    pub fn public_key(&self) -> &[u8; KEY_SIZE] {
        &self.public
    }
}

impl std::fmt::Debug for ClientKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientKeys")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

enum SharedBox {
    Salsa(SalsaBox),
    ChaCha(ChaChaBox),
}

impl SharedBox {
    fn new(
        construction: Construction,
        public: &[u8; KEY_SIZE],
        secret: &SecretKey,
    ) -> Result<Self> {
        let public = PublicKey::from(*public);
        match construction {
            Construction::XSalsa20Poly1305 => Ok(SharedBox::Salsa(SalsaBox::new(&public, secret))),
            Construction::XChaCha20Poly1305 => {
                Ok(SharedBox::ChaCha(ChaChaBox::new(&public, secret)))
            }
            Construction::Undefined => Err(Error::UnsupportedConstruction(construction.encode())),
        }
    }

    fn seal(&self, nonce: &[u8; NONCE_SIZE], plaintext: &[u8]) -> Option<Vec<u8>> {
        let nonce = GenericArray::from_slice(nonce);
        match self {
            SharedBox::Salsa(b) => b.encrypt(nonce, plaintext).ok(),
            SharedBox::ChaCha(b) => b.encrypt(nonce, plaintext).ok(),
        }
    }

    fn open(&self, nonce: &[u8; NONCE_SIZE], ciphertext: &[u8]) -> Option<Vec<u8>> {
        let nonce = GenericArray::from_slice(nonce);
        match self {
            SharedBox::Salsa(b) => b.decrypt(nonce, ciphertext).ok(),
            SharedBox::ChaCha(b) => b.decrypt(nonce, ciphertext).ok(),
        }
    }
}

/// State of one query/response exchange: the shared key and the nonce half chosen by the
/// client, which the response has to echo.
pub struct Session {
    client_nonce: [u8; HALF_NONCE_SIZE],
    shared: SharedBox,
}

/// Pads and encrypts `query` for the resolver owning `cert`.
///
/// Returns the packet to send and the [`Session`] needed to decrypt the answer.
pub fn encrypt_query(cert: &Cert, keys: &ClientKeys, query: &[u8]) -> Result<(Vec<u8>, Session)> {
    if query.len() < MIN_DNS_PACKET_SIZE {
        return Err(Error::InvalidQuery);
    }
    let padded = pad(query);
    if QUERY_HEADER_SIZE + padded.len() + TAG_SIZE > MAX_DNS_PACKET_SIZE {
        return Err(Error::QueryTooLarge(query.len()));
    }

    let shared = SharedBox::new(cert.construction, &cert.resolver_pk, &keys.secret)?;
    let mut client_nonce = [0; HALF_NONCE_SIZE];
    OsRng.fill_bytes(&mut client_nonce);
    let mut nonce = [0; NONCE_SIZE];
    nonce[..HALF_NONCE_SIZE].copy_from_slice(&client_nonce);

    let sealed = shared.seal(&nonce, &padded).ok_or(Error::InvalidQuery)?;

    let mut packet = Vec::with_capacity(QUERY_HEADER_SIZE + sealed.len());
    packet.extend_from_slice(&cert.client_magic);
    packet.extend_from_slice(&keys.public);
    packet.extend_from_slice(&client_nonce);
    packet.extend_from_slice(&sealed);

    Ok((packet, Session { client_nonce, shared }))
}

/// Decrypts a query received by the resolver owning `cert` (which must carry its secret key).
///
/// Returns the plain DNS query and the [`Session`] to encrypt the response with.
pub fn decrypt_query(cert: &Cert, packet: &[u8]) -> Result<(Vec<u8>, Session)> {
    if packet.len() < QUERY_HEADER_SIZE + TAG_SIZE + MIN_DNS_PACKET_SIZE {
        return Err(Error::InvalidQuery);
    }
    if packet[..CLIENT_MAGIC_SIZE] != cert.client_magic {
        return Err(Error::InvalidClientMagic);
    }

    let mut client_pk = [0; KEY_SIZE];
    client_pk.copy_from_slice(&packet[CLIENT_MAGIC_SIZE..CLIENT_MAGIC_SIZE + KEY_SIZE]);
    let mut client_nonce = [0; HALF_NONCE_SIZE];
    client_nonce.copy_from_slice(&packet[CLIENT_MAGIC_SIZE + KEY_SIZE..QUERY_HEADER_SIZE]);
    let mut nonce = [0; NONCE_SIZE];
    nonce[..HALF_NONCE_SIZE].copy_from_slice(&client_nonce);

    let secret = SecretKey::from(cert.resolver_sk);
    let shared = SharedBox::new(cert.construction, &client_pk, &secret)?;
    let padded = shared
        .open(&nonce, &packet[QUERY_HEADER_SIZE..])
        .ok_or(Error::InvalidQuery)?;
    let query = unpad(&padded)?.to_vec();

    Ok((query, Session { client_nonce, shared }))
}

impl Session {
    /// Verifies and decrypts a response packet belonging to this session.
    pub fn decrypt_response(&self, packet: &[u8]) -> Result<Vec<u8>> {
        if packet.len() < RESPONSE_HEADER_SIZE + TAG_SIZE + MIN_DNS_PACKET_SIZE {
            return Err(Error::InvalidResponse);
        }
        if packet[..RESOLVER_MAGIC_SIZE] != RESOLVER_MAGIC {
            return Err(Error::InvalidResolverMagic);
        }

        let mut nonce = [0; NONCE_SIZE];
        nonce.copy_from_slice(&packet[RESOLVER_MAGIC_SIZE..RESPONSE_HEADER_SIZE]);
        if nonce[..HALF_NONCE_SIZE] != self.client_nonce {
            return Err(Error::InvalidResponse);
        }

        let padded = self
            .shared
            .open(&nonce, &packet[RESPONSE_HEADER_SIZE..])
            .ok_or(Error::InvalidResponse)?;
        Ok(unpad(&padded)?.to_vec())
    }

    /// Pads and encrypts a response to the query this session was created from.
    pub fn encrypt_response(&self, response: &[u8]) -> Result<Vec<u8>> {
        let mut nonce = [0; NONCE_SIZE];
        nonce[..HALF_NONCE_SIZE].copy_from_slice(&self.client_nonce);
        OsRng.fill_bytes(&mut nonce[HALF_NONCE_SIZE..]);

        let padded = pad_to_min(response, 0);
        let sealed = self
            .shared
            .seal(&nonce, &padded)
            .ok_or(Error::InvalidResponse)?;

        let mut packet = Vec::with_capacity(RESPONSE_HEADER_SIZE + sealed.len());
        packet.extend_from_slice(&RESOLVER_MAGIC);
        packet.extend_from_slice(&nonce);
        packet.extend_from_slice(&sealed);
        Ok(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert;

    const QUERY: &[u8] = b"\x12\x34\x01\x00\x00\x01\x00\x00\x00\x00\x00\x00\x07example\x03com\x00\x00\x01\x00\x01";

    fn resolver_cert(construction: Construction) -> Cert {
        let now = cert::now();
        Cert::generate(1, construction, now - 10, now + 10)
    }

    fn exchange(construction: Construction) {
        let cert = resolver_cert(construction);
        let keys = ClientKeys::generate();

        let (packet, client_session) = encrypt_query(&cert, &keys, QUERY).unwrap();
        assert_eq!(&packet[..CLIENT_MAGIC_SIZE], &cert.client_magic);
        assert_eq!(&packet[CLIENT_MAGIC_SIZE..CLIENT_MAGIC_SIZE + KEY_SIZE], keys.public_key());
        assert_eq!(packet.len(), QUERY_HEADER_SIZE + 256 + TAG_SIZE);

        let (query, server_session) = decrypt_query(&cert, &packet).unwrap();
        assert_eq!(query, QUERY);

        let response = server_session.encrypt_response(b"a response of at least 17 bytes").unwrap();
        assert_eq!(&response[..RESOLVER_MAGIC_SIZE], b"r6fnvWj8");
        assert_eq!(
            client_session.decrypt_response(&response).unwrap(),
            b"a response of at least 17 bytes"
        );
    }

    #[test]
    fn exchange_xsalsa20() {
        exchange(Construction::XSalsa20Poly1305);
    }

    #[test]
    fn exchange_xchacha20() {
        exchange(Construction::XChaCha20Poly1305);
    }

    #[test]
    fn tampered_response() {
        let cert = resolver_cert(Construction::XChaCha20Poly1305);
        let keys = ClientKeys::generate();
        let (packet, client_session) = encrypt_query(&cert, &keys, QUERY).unwrap();
        let (_, server_session) = decrypt_query(&cert, &packet).unwrap();
        let response = server_session.encrypt_response(QUERY).unwrap();

        let mut bad_magic = response.clone();
        bad_magic[0] ^= 0xff;
        assert!(matches!(
            client_session.decrypt_response(&bad_magic),
            Err(Error::InvalidResolverMagic)
        ));

        let mut bad_nonce = response.clone();
        bad_nonce[RESOLVER_MAGIC_SIZE] ^= 0xff;
        assert!(matches!(
            client_session.decrypt_response(&bad_nonce),
            Err(Error::InvalidResponse)
        ));

        let mut bad_box = response;
        let last = bad_box.len() - 1;
        bad_box[last] ^= 0xff;
        assert!(matches!(
            client_session.decrypt_response(&bad_box),
            Err(Error::InvalidResponse)
        ));
    }

    #[test]
    fn wrong_client_magic() {
        let cert = resolver_cert(Construction::XSalsa20Poly1305);
        let other = resolver_cert(Construction::XSalsa20Poly1305);
        let (packet, _) = encrypt_query(&other, &ClientKeys::generate(), QUERY).unwrap();
        assert!(matches!(
            decrypt_query(&cert, &packet),
            Err(Error::InvalidClientMagic)
        ));
    }

    #[test]
    fn query_size_limits() {
        let cert = resolver_cert(Construction::XSalsa20Poly1305);
        let keys = ClientKeys::generate();
        assert!(matches!(
            encrypt_query(&cert, &keys, &QUERY[..10]),
            Err(Error::InvalidQuery)
        ));
        assert!(matches!(
            encrypt_query(&cert, &keys, &vec![0; MAX_DNS_PACKET_SIZE]),
            Err(Error::QueryTooLarge(_))
        ));
    }

    #[test]
    fn undefined_construction() {
        let cert = resolver_cert(Construction::Undefined);
        assert!(matches!(
            encrypt_query(&cert, &ClientKeys::generate(), QUERY),
            Err(Error::UnsupportedConstruction(0))
        ));
    }

    #[test]
    fn keys_from_slice() {
        let keys = ClientKeys::generate();
        assert!(ClientKeys::from_secret_slice(&[1; 31]).is_err());
        let restored = ClientKeys::from_secret_slice(&[7; KEY_SIZE]).unwrap();
        assert_ne!(restored.public_key(), keys.public_key());
        assert_eq!(
            ClientKeys::from_secret_slice(&[7; KEY_SIZE]).unwrap().public_key(),
            restored.public_key()
        );
    }
}
