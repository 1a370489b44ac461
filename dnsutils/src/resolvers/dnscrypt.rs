//! DNSCrypt (version 2) transport.
//!
//! Resolver certificates are fetched on first use as TXT records of the provider name, sent in
//! plain text to the resolver address from the stamp. The negotiated certificate is kept until it
//! leaves its validity window or a response fails to decrypt with it.

use std::fmt;
use std::io::Cursor;
use std::sync::Mutex;

use byteorder::{NetworkEndian, ReadBytesExt};
use dnscrypt_proto::crypto::encrypt_query;
use dnscrypt_proto::{cert, Cert, ClientKeys, ServerStamp};
use toluol_proto::name::Compression;
use toluol_proto::{HeaderFlags, Message, Name, Opcode, RecordType};

use crate::error::Error;
use crate::model::{Question, Response};
use crate::net::{self, Family, Nameserver, Network, Protocol};
use crate::options::ResolverOptions;
use crate::resolvers::{query_candidates, Lookup};
use crate::Result;

/// Port used if the stamp does not carry one.
pub const DNSCRYPT_PORT: u16 = 443;

#[derive(PartialEq, Eq, Copy, Clone, Debug, Default)]
pub struct DnsCryptResolverOpts {
    pub use_tcp: bool,
}

pub struct DnsCryptResolver {
    stamp: ServerStamp,
    nameserver: Nameserver,
    network: Network,
    keys: ClientKeys,
    cert: Mutex<Option<Cert>>,
    opts: ResolverOptions,
}

impl DnsCryptResolver {
    /// Creates a resolver for the server described by the `sdns://` stamp `server`, using a fresh
    /// client key pair.
    pub fn new(
        server: &str,
        dnscrypt_opts: DnsCryptResolverOpts,
        opts: ResolverOptions,
    ) -> Result<Self> {
        let stamp = ServerStamp::parse(server)
            .map_err(|e| Error::Config(format!("invalid DNSCrypt stamp: {}", e)))?;
        let nameserver = Nameserver::parse(&stamp.server_addr, DNSCRYPT_PORT)?;
        let network = Network::new(dnscrypt_opts.use_tcp, false, &opts);
        log::debug!(
            "using DNSCrypt provider {} at {} over {}",
            stamp.provider_name,
            nameserver,
            network
        );

        Ok(Self {
            stamp,
            nameserver,
            network,
            keys: ClientKeys::generate(),
            cert: Mutex::new(None),
            opts,
        })
    }

    pub fn stamp(&self) -> &ServerStamp {
        &self.stamp
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Returns the negotiated certificate, fetching a new one if there is none or the current one
    /// has expired.
    pub fn cert(&self) -> Result<Cert> {
        let mut current = match self.cert.lock() {
            Ok(current) => current,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(cert) = current.as_ref().filter(|cert| cert.verify_date()) {
            return Ok(cert.clone());
        }

        let cert = self.fetch_cert()?;
        *current = Some(cert.clone());
        Ok(cert)
    }

    fn invalidate_cert(&self) {
        match self.cert.lock() {
            Ok(mut current) => *current = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }

    fn fetch_cert(&self) -> Result<Cert> {
        log::debug!(
            "fetching DNSCrypt certificates for {} from {}",
            self.stamp.provider_name,
            self.nameserver
        );
        let flags = HeaderFlags {
            aa: false,
            tc: false,
            rd: true,
            ra: false,
            ad: false,
            cd: false,
        };
        let msg = Message::new_query(
            Name::from_ascii(&self.stamp.provider_name)?,
            RecordType::TXT,
            Opcode::QUERY,
            flags,
            None,
        )?;
        let query = msg.encode()?;

        let mut network = Network {
            protocol: Protocol::Udp,
            family: Family::from_options(&self.opts),
            tls: false,
        };
        let (txt, tc) = loop {
            let reply = self.send(network, &query)?;
            let (id, tc, txt) = parse_txt_records(&reply)?;
            if id != msg.header.msg_id {
                return Err(Error::IdMismatch);
            }
            if tc && !network.is_stream() {
                network = network.to_tcp();
                log::debug!("certificate reply was truncated, retrying over {}", network);
                continue;
            }
            break (txt, tc);
        };
        if tc {
            return Err(Error::Truncated);
        }

        let certs = txt.iter().filter_map(|rdata| match Cert::deserialize(rdata) {
            Ok(cert) => Some(cert),
            Err(e) => {
                log::warn!("ignoring malformed DNSCrypt certificate: {}", e);
                None
            }
        });
        let cert = dnscrypt_proto::select_best(certs, &self.stamp.provider_pk, cert::now())
            .ok_or(dnscrypt_proto::Error::NoValidCert)?;
        log::debug!("selected DNSCrypt certificate {}", cert);
        Ok(cert)
    }

    fn send(&self, network: Network, packet: &[u8]) -> Result<Vec<u8>> {
        let dialer = self.opts.dialer.as_ref();
        let (ns, timeout) = (&self.nameserver, self.opts.timeout);
        if network.is_stream() {
            net::send_query_tcp(dialer, ns, network.family, timeout, packet)
        } else {
            net::send_query_udp(dialer, ns, network.family, timeout, packet)
        }
    }
}

impl Lookup for DnsCryptResolver {
    fn lookup(&self, question: &Question) -> Result<Response> {
        let cert = self.cert()?;
        let server = self.nameserver.to_string();
        query_candidates(question, &self.opts, self.network, &server, |network, query| {
            let (packet, session) = encrypt_query(&cert, &self.keys, query)?;
            let reply = self.send(network, &packet)?;
            session.decrypt_response(&reply).map_err(|e| {
                log::warn!("could not decrypt DNSCrypt response, dropping certificate: {}", e);
                self.invalidate_cert();
                Error::DnsCrypt(e)
            })
        })
    }
}

impl fmt::Debug for DnsCryptResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DnsCryptResolver")
            .field("stamp", &self.stamp)
            .field("nameserver", &self.nameserver)
            .field("network", &self.network)
            .finish_non_exhaustive()
    }
}

/// Extracts the raw RDATA of all TXT answers from `reply`, each with its character-strings
/// concatenated. Also returns the message ID and TC flag.
///
/// Certificates are binary, so this cannot go through the regular TXT parser, which expects
/// ASCII.
pub fn parse_txt_records(reply: &[u8]) -> Result<(u16, bool, Vec<Vec<u8>>)> {
    let mut msg = Cursor::new(reply);
    let header = toluol_proto::Header::parse(&mut msg)?;
    if header.flags.tc {
        return Ok((header.msg_id, true, Vec::new()));
    }

    for _ in 0..header.qdcount {
        toluol_proto::Question::parse(&mut msg)?;
    }

    let mut records = Vec::new();
    for _ in 0..header.ancount {
        Name::parse(&mut msg, Compression::Allowed)?;
        let rtype = msg.read_u16::<NetworkEndian>()?;
        let _class = msg.read_u16::<NetworkEndian>()?;
        let _ttl = msg.read_u32::<NetworkEndian>()?;
        let rdlength = msg.read_u16::<NetworkEndian>()? as usize;

        let start = msg.position() as usize;
        let rdata = reply
            .get(start..start + rdlength)
            .ok_or(dnscrypt_proto::Error::InvalidResponse)?;
        msg.set_position((start + rdlength) as u64);

        if RecordType::from(rtype) != RecordType::TXT {
            continue;
        }
        let mut text = Vec::with_capacity(rdlength);
        let mut rest = rdata;
        while let Some((&len, tail)) = rest.split_first() {
            let chunk = tail
                .get(..len as usize)
                .ok_or(dnscrypt_proto::Error::InvalidResponse)?;
            text.extend_from_slice(chunk);
            rest = &tail[len as usize..];
        }
        records.push(text);
    }

    Ok((header.msg_id, false, records))
}
