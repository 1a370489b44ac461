//! A nameserver answering on UDP and TCP on the same loopback port.

#![allow(dead_code)]

use std::io::Cursor;
use std::net::{TcpListener, UdpSocket};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use dnsutils::net::{read_framed, write_framed};
use toluol_proto::Message;

pub const TYPE_A: u16 = 1;
pub const TYPE_CNAME: u16 = 5;
pub const TYPE_TXT: u16 = 16;

/// `(type, rdata)` of one answer record.
pub type Record = (u16, Vec<u8>);

/// Turns a raw packet into the raw reply, given whether it came in over TCP.
pub type Handler = Arc<dyn Fn(&[u8], bool) -> Vec<u8> + Send + Sync>;

pub struct Server {
    pub port: u16,
    pub udp_queries: Arc<AtomicUsize>,
    pub tcp_queries: Arc<AtomicUsize>,
}

impl Server {
    pub fn spawn(handler: Handler) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let socket = UdpSocket::bind(("127.0.0.1", port)).unwrap();

        let udp_queries = Arc::new(AtomicUsize::new(0));
        let tcp_queries = Arc::new(AtomicUsize::new(0));

        let (counter, udp_handler) = (Arc::clone(&udp_queries), Arc::clone(&handler));
        thread::spawn(move || {
            let mut buf = vec![0; 65535];
            loop {
                let (len, peer) = socket.recv_from(&mut buf).unwrap();
                counter.fetch_add(1, Ordering::SeqCst);
                let reply = udp_handler(&buf[..len], false);
                socket.send_to(&reply, peer).unwrap();
            }
        });

        let counter = Arc::clone(&tcp_queries);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let mut stream = stream.unwrap();
                let query = match read_framed(&mut stream) {
                    Ok(query) => query,
                    Err(_) => continue,
                };
                counter.fetch_add(1, Ordering::SeqCst);
                let reply = handler(&query, true);
                let _ = write_framed(&mut stream, &reply);
            }
        });

        Self {
            port,
            udp_queries,
            tcp_queries,
        }
    }

    /// A server answering plain queries with the records `records` returns for the query name
    /// (without trailing dot). `truncate` decides per transport whether to set the TC flag instead.
    pub fn plain(
        records: impl Fn(&str) -> Vec<Record> + Send + Sync + 'static,
        truncate: impl Fn(bool) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self::spawn(Arc::new(move |query: &[u8], tcp: bool| {
            if truncate(tcp) {
                reply(query, &[], true)
            } else {
                reply(query, &records(&qname(query)), false)
            }
        }))
    }

    pub fn udp_count(&self) -> usize {
        self.udp_queries.load(Ordering::SeqCst)
    }

    pub fn tcp_count(&self) -> usize {
        self.tcp_queries.load(Ordering::SeqCst)
    }
}

pub fn qname(query: &[u8]) -> String {
    let query = Message::parse(&mut Cursor::new(query)).unwrap();
    query.questions[0].qname.to_string()
}

/// Builds a reply to `query`, which must contain exactly one question and nothing else.
pub fn reply(query: &[u8], records: &[Record], tc: bool) -> Vec<u8> {
    let mut msg = query[..2].to_vec();
    msg.extend_from_slice(&if tc { [0x83, 0x80] } else { [0x81, 0x80] });
    msg.extend_from_slice(&1u16.to_be_bytes());
    msg.extend_from_slice(&(records.len() as u16).to_be_bytes());
    msg.extend_from_slice(&[0, 0, 0, 0]);
    msg.extend_from_slice(&query[12..]);
    for (rtype, rdata) in records {
        // owner is the question name
        msg.extend_from_slice(&[0xc0, 0x0c]);
        msg.extend_from_slice(&rtype.to_be_bytes());
        msg.extend_from_slice(&[0, 1, 0, 0, 1, 0x2c]);
        msg.extend_from_slice(&(rdata.len() as u16).to_be_bytes());
        msg.extend_from_slice(rdata);
    }
    msg
}

pub fn a(addr: [u8; 4]) -> Record {
    (TYPE_A, addr.to_vec())
}

pub fn cname(target: &str) -> Record {
    let mut rdata = Vec::new();
    for label in target.split('.').filter(|label| !label.is_empty()) {
        rdata.push(label.len() as u8);
        rdata.extend_from_slice(label.as_bytes());
    }
    rdata.push(0);
    (TYPE_CNAME, rdata)
}

/// A TXT record holding `data` as a single character-string.
pub fn txt(data: &[u8]) -> Record {
    let mut rdata = vec![data.len() as u8];
    rdata.extend_from_slice(data);
    (TYPE_TXT, rdata)
}
