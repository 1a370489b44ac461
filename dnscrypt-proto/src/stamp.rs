//! Parsing of `sdns://` [DNS stamps](https://dnscrypt.info/stamps-specifications) describing
//! DNSCrypt resolvers.

use std::fmt::{self, Display};

use byteorder::{ByteOrder, LittleEndian};
use data_encoding::BASE64URL_NOPAD;

use crate::error::Error;
use crate::{Result, KEY_SIZE};

const SCHEME: &str = "sdns://";
const PROTOCOL_DNSCRYPT: u8 = 0x01;
const DEFAULT_PORT: u16 = 443;

/// A DNSCrypt server stamp.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct ServerStamp {
    /// Informal properties (DNSSEC, no logs, no filter) as announced by the provider.
    pub props: u64,
    /// `host:port` of the resolver. The port defaults to 443 if the stamp does not carry one.
    pub server_addr: String,
    /// The provider's long-term Ed25519 public key, used to verify certificates.
    pub provider_pk: [u8; KEY_SIZE],
    /// The provider name, e.g. `2.dnscrypt-cert.example.com`. Certificates are published as TXT
    /// records for this name.
    pub provider_name: String,
}

impl ServerStamp {
    /// Parses a stamp of the form `sdns://<base64url>`. Only DNSCrypt stamps are supported.
    pub fn parse(stamp: &str) -> Result<Self> {
        let encoded = stamp
            .get(..SCHEME.len())
            .filter(|scheme| scheme.eq_ignore_ascii_case(SCHEME))
            .map(|_| &stamp[SCHEME.len()..])
            .ok_or_else(|| Error::InvalidStamp("missing sdns:// scheme".into()))?;
        let bin = BASE64URL_NOPAD
            .decode(encoded.as_bytes())
            .map_err(|e| Error::InvalidStamp(e.to_string()))?;

        if bin.len() < 9 {
            return Err(Error::InvalidStamp("stamp is too short".into()));
        }
        if bin[0] != PROTOCOL_DNSCRYPT {
            return Err(Error::InvalidStamp(format!(
                "unsupported stamp protocol {:#04x}",
                bin[0]
            )));
        }
        let props = LittleEndian::read_u64(&bin[1..9]);

        let mut pos = 9;
        let addr = read_lp(&bin, &mut pos)?;
        let pk = read_lp(&bin, &mut pos)?;
        let name = read_lp(&bin, &mut pos)?;
        if pos != bin.len() {
            return Err(Error::InvalidStamp("trailing garbage after stamp".into()));
        }

        let mut server_addr = String::from_utf8(addr.to_vec())
            .map_err(|_| Error::InvalidStamp("server address is not UTF-8".into()))?;
        if server_addr.is_empty() {
            return Err(Error::InvalidStamp("empty server address".into()));
        }
        if !has_port(&server_addr) {
            server_addr = format!("{}:{}", server_addr, DEFAULT_PORT);
        }

        let provider_pk: [u8; KEY_SIZE] = pk.try_into().map_err(|_| {
            Error::InvalidStamp(format!("provider key must be {} bytes", KEY_SIZE))
        })?;

        let provider_name = String::from_utf8(name.to_vec())
            .map_err(|_| Error::InvalidStamp("provider name is not UTF-8".into()))?;
        if provider_name.is_empty() {
            return Err(Error::InvalidStamp("empty provider name".into()));
        }

        Ok(Self {
            props,
            server_addr,
            provider_pk,
            provider_name,
        })
    }
}

impl Display for ServerStamp {
    /// Encodes the stamp back into its `sdns://` form.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut bin = vec![PROTOCOL_DNSCRYPT];
        let mut props = [0; 8];
        LittleEndian::write_u64(&mut props, self.props);
        bin.extend_from_slice(&props);
        for field in [
            self.server_addr.as_bytes(),
            &self.provider_pk[..],
            self.provider_name.as_bytes(),
        ] {
            bin.push(field.len() as u8);
            bin.extend_from_slice(field);
        }
        write!(f, "{}{}", SCHEME, BASE64URL_NOPAD.encode(&bin))
    }
}

/// Reads one length-prefixed field.
fn read_lp<'a>(bin: &'a [u8], pos: &mut usize) -> Result<&'a [u8]> {
    let len = *bin
        .get(*pos)
        .ok_or_else(|| Error::InvalidStamp("stamp ends unexpectedly".into()))? as usize;
    let start = *pos + 1;
    let field = bin
        .get(start..start + len)
        .ok_or_else(|| Error::InvalidStamp("stamp ends unexpectedly".into()))?;
    *pos = start + len;
    Ok(field)
}

fn has_port(addr: &str) -> bool {
    match addr.rfind(']') {
        // bracketed IPv6 literal
        Some(i) => addr[i + 1..].starts_with(':'),
        None => addr.contains(':'),
    }
}
