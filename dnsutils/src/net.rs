//! Network-related code, i.e. opening sockets and exchanging raw DNS messages over them.

use std::fmt::{self, Display};
use std::io::{self, Read, Write};
use std::net::{IpAddr, SocketAddr, TcpStream, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use byteorder::{NetworkEndian, ReadBytesExt, WriteBytesExt};

use crate::error::Error;
use crate::options::ResolverOptions;
use crate::Result;

#[cfg(feature = "tls")]
use std::{sync::Arc, time::SystemTime};

/// Largest possible DNS message, used as UDP receive buffer size.
const MAX_MESSAGE_SIZE: usize = 65535;

/// The address family a socket may use.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum Family {
    Any,
    V4,
    V6,
}

impl Family {
    /// `V4`/`V6` only if exactly one of the two flags is set.
    pub fn from_options(opts: &ResolverOptions) -> Self {
        match (opts.use_ipv4, opts.use_ipv6) {
            (true, false) => Family::V4,
            (false, true) => Family::V6,
            _ => Family::Any,
        }
    }

    pub fn matches(&self, addr: &SocketAddr) -> bool {
        match self {
            Family::Any => true,
            Family::V4 => addr.is_ipv4(),
            Family::V6 => addr.is_ipv6(),
        }
    }
}

#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum Protocol {
    Udp,
    Tcp,
}

/// Describes how to reach a nameserver. Displays as `{udp,tcp}[4|6][-tls]`.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub struct Network {
    pub protocol: Protocol,
    pub family: Family,
    pub tls: bool,
}

impl Network {
    /// TLS always implies TCP.
    pub fn new(use_tcp: bool, use_tls: bool, opts: &ResolverOptions) -> Self {
        Self {
            protocol: if use_tcp || use_tls {
                Protocol::Tcp
            } else {
                Protocol::Udp
            },
            family: Family::from_options(opts),
            tls: use_tls,
        }
    }

    /// The TCP variant of the same family, used after a truncated response.
    pub fn to_tcp(self) -> Self {
        Self {
            protocol: Protocol::Tcp,
            ..self
        }
    }

    /// True for TCP and TLS, which never truncate.
    pub fn is_stream(&self) -> bool {
        self.protocol == Protocol::Tcp
    }
}

impl Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let protocol = match self.protocol {
            Protocol::Udp => "udp",
            Protocol::Tcp => "tcp",
        };
        let family = match self.family {
            Family::Any => "",
            Family::V4 => "4",
            Family::V6 => "6",
        };
        let tls = if self.tls { "-tls" } else { "" };
        write!(f, "{}{}{}", protocol, family, tls)
    }
}

/// Contains all info needed to connect to a nameserver.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Nameserver {
    /// Hostname or IP address literal, without brackets.
    pub host: String,
    /// Set if `host` is an IP address literal.
    pub ip: Option<IpAddr>,
    pub port: u16,
}

impl Nameserver {
    /// Parses `host`, `host:port`, `[v6]` or `[v6]:port`. A bare IPv6 address without brackets
    /// is accepted as well.
    pub fn parse(server: &str, default_port: u16) -> Result<Self> {
        let invalid = || Error::Config(format!("invalid nameserver address {:?}", server));

        let (host, port) = if let Some(rest) = server.strip_prefix('[') {
            let (host, rest) = rest.split_once(']').ok_or_else(invalid)?;
            match rest.strip_prefix(':') {
                Some(port) => (host, Some(port)),
                None if rest.is_empty() => (host, None),
                None => return Err(invalid()),
            }
        } else if server.matches(':').count() > 1 {
            (server, None)
        } else {
            match server.split_once(':') {
                Some((host, port)) => (host, Some(port)),
                None => (server, None),
            }
        };

        if host.is_empty() {
            return Err(invalid());
        }
        let port = match port {
            Some(port) => port.parse().map_err(|_| invalid())?,
            None => default_port,
        };

        Ok(Self {
            host: host.to_string(),
            ip: host.parse().ok(),
            port,
        })
    }
}

impl Display for Nameserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.ip {
            // if ip is an IPv6 address, check if it is a mapped IPv4 adress. if yes, display the
            // IPv4 address
            Some(IpAddr::V6(ipv6)) => match ipv6.to_ipv4() {
                Some(ipv4) if ipv4.to_ipv6_mapped() == ipv6 => write!(f, "{}:{}", ipv4, self.port),
                _ => write!(f, "[{}]:{}", ipv6, self.port),
            },
            Some(ip) => write!(f, "{}:{}", ip, self.port),
            None => write!(f, "{}:{}", self.host, self.port),
        }
    }
}

impl ToSocketAddrs for Nameserver {
    type Iter = std::vec::IntoIter<SocketAddr>;
    fn to_socket_addrs(&self) -> io::Result<Self::Iter> {
        match self.ip {
            Some(ip) => Ok(vec![(ip, self.port).into()].into_iter()),
            None => (self.host.as_str(), self.port).to_socket_addrs(),
        }
    }
}

/// Opens the sockets used to talk to nameservers.
///
/// Implementations must return sockets that are already connected to `nameserver`, using only
/// addresses of the requested `family`. A zero `timeout` means no timeout.
pub trait Dialer: Send + Sync {
    fn dial_udp(
        &self,
        nameserver: &Nameserver,
        family: Family,
        timeout: Duration,
    ) -> io::Result<UdpSocket>;

    fn dial_tcp(
        &self,
        nameserver: &Nameserver,
        family: Family,
        timeout: Duration,
    ) -> io::Result<TcpStream>;
}

/// A [`Dialer`] using the operating system's sockets directly.
#[derive(Copy, Clone, Debug, Default)]
pub struct SystemDialer;

impl SystemDialer {
    fn addrs(nameserver: &Nameserver, family: Family) -> io::Result<Vec<SocketAddr>> {
        let addrs: Vec<_> = nameserver
            .to_socket_addrs()?
            .filter(|addr| family.matches(addr))
            .collect();
        if addrs.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no usable address for {} ({:?})", nameserver, family),
            ));
        }
        Ok(addrs)
    }
}

impl Dialer for SystemDialer {
    fn dial_udp(
        &self,
        nameserver: &Nameserver,
        family: Family,
        _timeout: Duration,
    ) -> io::Result<UdpSocket> {
        // the bind address has to match the IP version of the nameserver, otherwise some
        // platforms refuse to connect
        let mut err = None;
        for addr in SystemDialer::addrs(nameserver, family)? {
            let bind_addr = if addr.is_ipv6() { "::" } else { "0.0.0.0" };
            let socket = UdpSocket::bind((bind_addr, 0))?;
            match socket.connect(addr) {
                Ok(()) => return Ok(socket),
                Err(e) => err = Some(e),
            }
        }
        Err(err.unwrap_or_else(|| io::Error::from(io::ErrorKind::NotConnected)))
    }

    fn dial_tcp(
        &self,
        nameserver: &Nameserver,
        family: Family,
        timeout: Duration,
    ) -> io::Result<TcpStream> {
        let mut err = None;
        for addr in SystemDialer::addrs(nameserver, family)? {
            let stream = if timeout.is_zero() {
                TcpStream::connect(addr)
            } else {
                TcpStream::connect_timeout(&addr, timeout)
            };
            match stream {
                Ok(stream) => return Ok(stream),
                Err(e) => err = Some(e),
            }
        }
        Err(err.unwrap_or_else(|| io::Error::from(io::ErrorKind::NotConnected)))
    }
}

fn io_timeout(timeout: Duration) -> Option<Duration> {
    if timeout.is_zero() {
        None
    } else {
        Some(timeout)
    }
}

pub fn send_query_udp(
    dialer: &dyn Dialer,
    nameserver: &Nameserver,
    family: Family,
    timeout: Duration,
    data: &[u8],
) -> Result<Vec<u8>> {
    let socket = dialer.dial_udp(nameserver, family, timeout)?;
    socket.set_write_timeout(io_timeout(timeout))?;
    socket.set_read_timeout(io_timeout(timeout))?;

    socket.send(data)?;

    let mut res = vec![0; MAX_MESSAGE_SIZE];
    let bytes_recvd = socket.recv(&mut res)?;
    res.truncate(bytes_recvd);

    Ok(res)
}

pub fn send_query_tcp(
    dialer: &dyn Dialer,
    nameserver: &Nameserver,
    family: Family,
    timeout: Duration,
    data: &[u8],
) -> Result<Vec<u8>> {
    let mut socket = dialer.dial_tcp(nameserver, family, timeout)?;
    socket.set_write_timeout(io_timeout(timeout))?;
    socket.set_read_timeout(io_timeout(timeout))?;

    write_framed(&mut socket, data)?;
    let res = read_framed(&mut socket)?;

    // the peer may already have closed the connection
    let _ = socket.shutdown(std::net::Shutdown::Both);

    Ok(res)
}

#[cfg(feature = "tls")]
#[allow(clippy::too_many_arguments)]
pub fn send_query_tls(
    dialer: &dyn Dialer,
    nameserver: &Nameserver,
    family: Family,
    timeout: Duration,
    config: Arc<rustls::ClientConfig>,
    server_name: rustls::ServerName,
    data: &[u8],
) -> Result<Vec<u8>> {
    let session = rustls::ClientConnection::new(config, server_name)?;

    let socket = dialer.dial_tcp(nameserver, family, timeout)?;
    socket.set_write_timeout(io_timeout(timeout))?;
    socket.set_read_timeout(io_timeout(timeout))?;

    // the handshake happens transparently on the first write
    let mut stream = rustls::StreamOwned::new(session, socket);
    write_framed(&mut stream, data)?;
    stream.flush()?;
    let res = read_framed(&mut stream)?;

    stream.conn.send_close_notify();
    let _ = stream.flush();

    Ok(res)
}

/// Builds the TLS configuration for DNS over TLS, trusting the webpki roots unless `insecure`
/// is set.
#[cfg(feature = "tls")]
pub fn tls_config(insecure: bool) -> Arc<rustls::ClientConfig> {
    let builder = rustls::ClientConfig::builder().with_safe_defaults();
    let config = if insecure {
        builder
            .with_custom_certificate_verifier(Arc::new(NoCertificateVerification))
            .with_no_client_auth()
    } else {
        let mut root_store = rustls::RootCertStore::empty();
        root_store.add_server_trust_anchors(webpki_roots::TLS_SERVER_ROOTS.0.iter().map(|ta| {
            rustls::OwnedTrustAnchor::from_subject_spki_name_constraints(
                ta.subject,
                ta.spki,
                ta.name_constraints,
            )
        }));
        builder
            .with_root_certificates(root_store)
            .with_no_client_auth()
    };
    Arc::new(config)
}

/// Accepts every server certificate.
#[cfg(feature = "tls")]
struct NoCertificateVerification;

#[cfg(feature = "tls")]
impl rustls::client::ServerCertVerifier for NoCertificateVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::Certificate,
        _intermediates: &[rustls::Certificate],
        _server_name: &rustls::ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: SystemTime,
    ) -> std::result::Result<rustls::client::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::ServerCertVerified::assertion())
    }
}

/// Writes a message prefixed with its two byte length (see RFC 1035, Section 4.2.2).
pub fn write_framed(stream: &mut impl Write, data: &[u8]) -> io::Result<()> {
    let len = u16::try_from(data.len()).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("message of {} bytes is too long for TCP", data.len()),
        )
    })?;
    let mut msg = Vec::with_capacity(data.len() + 2);
    msg.write_u16::<NetworkEndian>(len)?;
    msg.extend_from_slice(data);
    stream.write_all(&msg)
}

/// Reads one length-prefixed message. Stops as soon as the announced length has been read, so
/// the peer does not need to close the connection.
pub fn read_framed(stream: &mut impl Read) -> io::Result<Vec<u8>> {
    let len = stream.read_u16::<NetworkEndian>()?;
    let mut res = vec![0; len as usize];
    stream.read_exact(&mut res)?;
    Ok(res)
}
