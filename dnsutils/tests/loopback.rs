use std::time::Duration;

use dnsutils::{Error, Question, Resolver, ResolverOptions};
use toluol_proto::RecordType;

mod common;

use common::{a, cname, Server};

fn resolver(server: &Server) -> Resolver {
    let opts = ResolverOptions::default().with_timeout(Duration::from_secs(5));
    let mut resolver = Resolver::new(opts);
    resolver
        .set_dns_server(&format!("udp://127.0.0.1:{}", server.port))
        .unwrap();
    resolver
}

#[test]
fn truncated_reply_is_retried_over_tcp() {
    let server = Server::plain(|_| vec![a([192, 0, 2, 1]), a([192, 0, 2, 2])], |tcp| !tcp);
    let resolver = resolver(&server);

    assert_eq!(
        resolver.resolve("example.com").unwrap(),
        vec!["192.0.2.1", "192.0.2.2"]
    );
    assert_eq!(server.udp_count(), 1);
    assert_eq!(server.tcp_count(), 1);
}

#[test]
fn truncated_tcp_reply_is_an_error() {
    let server = Server::plain(|_| vec![a([192, 0, 2, 1])], |_| true);
    let resolver = resolver(&server);

    let res = resolver.lookup(&Question::new("example.com", RecordType::A));
    assert!(matches!(res, Err(Error::Truncated)), "{:?}", res);
    assert_eq!(server.udp_count(), 1);
    assert_eq!(server.tcp_count(), 1);
}

#[test]
fn cname_is_followed_and_cached() {
    let server = Server::plain(
        |name| match name {
            "www.example.com" => vec![cname("cdn.example.net.")],
            "cdn.example.net" => vec![a([203, 0, 113, 9])],
            _ => Vec::new(),
        },
        |_| false,
    );
    let resolver = resolver(&server);

    assert_eq!(resolver.resolve("www.example.com").unwrap(), vec!["203.0.113.9"]);
    assert_eq!(server.udp_count(), 2);

    assert_eq!(resolver.resolve("www.example.com.").unwrap(), vec!["203.0.113.9"]);
    assert_eq!(server.udp_count(), 2);

    // the target itself was not cached
    assert_eq!(resolver.resolve("cdn.example.net").unwrap(), vec!["203.0.113.9"]);
    assert_eq!(server.udp_count(), 3);
}

#[test]
fn search_list_is_applied() {
    let server = Server::plain(
        |name| match name {
            "intranet.corp.example" => vec![a([10, 0, 0, 1])],
            _ => Vec::new(),
        },
        |_| false,
    );
    let opts = ResolverOptions::default()
        .with_timeout(Duration::from_secs(5))
        .with_search_list(["lab.example", "corp.example"]);
    let mut resolver = Resolver::new(opts);
    resolver
        .set_dns_server(&format!("UDP://127.0.0.1:{}", server.port))
        .unwrap();

    let res = resolver
        .lookup(&Question::new("intranet", RecordType::A))
        .unwrap();
    let asked: Vec<_> = res.questions.iter().map(|q| q.name.as_str()).collect();
    assert_eq!(asked, vec!["intranet.lab.example.", "intranet.corp.example."]);
    assert_eq!(res.answers.len(), 1);
    assert_eq!(res.answers[0].name, "intranet.corp.example.");
    assert_eq!(res.answers[0].address, "10.0.0.1");
    assert_eq!(res.answers[0].ttl, "300s");
    assert_eq!(res.answers[0].status, "NOERROR");
    assert_eq!(server.udp_count(), 2);
}

#[test]
fn empty_answer() {
    let server = Server::plain(|_| Vec::new(), |_| false);
    let resolver = resolver(&server);

    assert!(matches!(
        resolver.resolve("nothing.example"),
        Err(Error::NoAnswers(_))
    ));
}

#[test]
fn hosts_are_answered_locally() {
    let server = Server::plain(|_| vec![a([192, 0, 2, 1])], |_| false);
    let resolver = resolver(&server).with_host("router.lan", vec!["192.168.1.1".into()]);

    assert_eq!(resolver.resolve("router.lan").unwrap(), vec!["192.168.1.1"]);
    assert_eq!(server.udp_count(), 0);
}

#[test]
fn tcp_transport() {
    let server = Server::plain(|_| vec![a([192, 0, 2, 53])], |_| false);
    let opts = ResolverOptions::default().with_timeout(Duration::from_secs(5));
    let mut resolver = Resolver::new(opts);
    resolver
        .set_dns_server(&format!("tcp://127.0.0.1:{}", server.port))
        .unwrap();

    assert_eq!(resolver.resolve("example.com").unwrap(), vec!["192.0.2.53"]);
    assert_eq!(server.udp_count(), 0);
    assert_eq!(server.tcp_count(), 1);
}
