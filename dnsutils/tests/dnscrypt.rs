use std::sync::Arc;
use std::time::Duration;

use dnscrypt_proto::cert::now;
use dnscrypt_proto::crypto::decrypt_query;
use dnscrypt_proto::{Cert, Construction, ServerStamp};
use dnsutils::{Error, Resolver, ResolverOptions};
use ring::rand::SystemRandom;
use ring::signature::{Ed25519KeyPair, KeyPair};

mod common;

use common::{a, reply, txt, Server};

const PROVIDER_NAME: &str = "2.dnscrypt-cert.example.test";

fn provider_key() -> Ed25519KeyPair {
    let pkcs8 = Ed25519KeyPair::generate_pkcs8(&SystemRandom::new()).unwrap();
    Ed25519KeyPair::from_pkcs8(pkcs8.as_ref()).unwrap()
}

fn signed_cert(key: &Ed25519KeyPair, serial: u32, construction: Construction) -> Cert {
    let now = now();
    let mut cert = Cert::generate(serial, construction, now - 60, now + 3600);
    cert.sign(key);
    cert
}

/// Serves `published` as certificates and answers encrypted queries with `cert`.
fn dnscrypt_server(cert: Cert, published: Vec<Cert>) -> Server {
    let published: Vec<_> = published
        .iter()
        .map(|cert| txt(&cert.serialize().unwrap()))
        .collect();

    Server::spawn(Arc::new(move |packet: &[u8], _tcp: bool| {
        if packet.starts_with(&cert.client_magic) {
            let (query, session) = decrypt_query(&cert, packet).unwrap();
            let response = reply(&query, &[a([198, 51, 100, 7])], false);
            session.encrypt_response(&response).unwrap()
        } else {
            reply(packet, &published, false)
        }
    }))
}

fn resolver(server: &Server, provider_pk: &[u8]) -> Resolver {
    let mut pk = [0; 32];
    pk.copy_from_slice(provider_pk);
    let stamp = ServerStamp {
        props: 0,
        server_addr: format!("127.0.0.1:{}", server.port),
        provider_pk: pk,
        provider_name: PROVIDER_NAME.to_string(),
    };

    let opts = ResolverOptions::default().with_timeout(Duration::from_secs(5));
    let mut resolver = Resolver::new(opts);
    resolver.set_dns_server(&stamp.to_string()).unwrap();
    resolver
}

#[test]
fn encrypted_lookup() {
    let key = provider_key();
    let cert = signed_cert(&key, 1, Construction::XChaCha20Poly1305);
    let server = dnscrypt_server(cert.clone(), vec![cert]);
    let resolver = resolver(&server, key.public_key().as_ref());
    assert_eq!(resolver.transport().name(), "dnscrypt");

    assert_eq!(resolver.resolve("example.com").unwrap(), vec!["198.51.100.7"]);
    // certificates over UDP, the query itself over TCP
    assert_eq!(server.udp_count(), 1);
    assert_eq!(server.tcp_count(), 1);

    // the certificate is reused
    assert_eq!(resolver.resolve("example.org").unwrap(), vec!["198.51.100.7"]);
    assert_eq!(server.udp_count(), 1);
    assert_eq!(server.tcp_count(), 2);
}

#[test]
fn best_certificate_is_used() {
    let key = provider_key();
    let best = signed_cert(&key, 2, Construction::XChaCha20Poly1305);
    let older = signed_cert(&key, 1, Construction::XChaCha20Poly1305);
    let salsa = signed_cert(&key, 3, Construction::XSalsa20Poly1305);
    // only `best` can answer queries
    let server = dnscrypt_server(best.clone(), vec![older, salsa, best]);
    let resolver = resolver(&server, key.public_key().as_ref());

    assert_eq!(resolver.resolve("example.com").unwrap(), vec!["198.51.100.7"]);
}

#[test]
fn foreign_certificates_are_rejected() {
    let key = provider_key();
    let cert = signed_cert(&provider_key(), 1, Construction::XSalsa20Poly1305);
    let server = dnscrypt_server(cert.clone(), vec![cert]);
    let resolver = resolver(&server, key.public_key().as_ref());

    let res = resolver.resolve("example.com");
    assert!(
        matches!(
            res,
            Err(Error::DnsCrypt(dnscrypt_proto::Error::NoValidCert))
        ),
        "{:?}",
        res
    );
    assert_eq!(server.tcp_count(), 0);
}
