//! CLI argument definition and parsing.

use std::env;
use std::net::IpAddr;
use std::process;
use std::str::FromStr;
use std::time::Duration;

use dnsutils::{Prefer, ResolverOptions};
use owo_colors::OwoColorize;
use toluol_proto::RecordType;

/// How to reach a nameserver given without a scheme.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum Scheme {
    Udp,
    Tcp,
    #[cfg(feature = "tls")]
    Tls,
    #[cfg(feature = "http")]
    Https,
}

#[derive(Clone, Debug)]
pub struct Args {
    /// Full nameserver address, including the scheme. [`None`] means the system resolver.
    pub nameserver: Option<String>,
    pub name: String,
    pub qtype: RecordType,
    pub options: ResolverOptions,
    pub hosts: Vec<(String, Vec<String>)>,
    pub resolve: bool,
    pub verbose: bool,
    #[cfg(feature = "json")]
    pub json: bool,
    pub print_meta: bool,
    pub debug: bool,
}

const DEFAULT_NAME: &str = "example.com";
const DEFAULT_QTYPE: RecordType = RecordType::A;

impl Args {
    pub fn parse() -> Self {
        // skip executable name
        Self::parse_from(env::args().skip(1))
    }

    pub fn parse_from(args: impl IntoIterator<Item = String>) -> Self {
        let mut nameserver = None;
        let mut scheme = Scheme::Udp;
        let mut name = DEFAULT_NAME.to_string();
        let mut qtype = DEFAULT_QTYPE;
        let mut options = ResolverOptions::default();
        let mut hosts = Vec::new();
        let mut resolve = false;
        let mut verbose = false;
        #[cfg(feature = "json")]
        let mut json = false;
        let mut print_meta = true;
        let mut debug = false;

        for arg in args {
            if let Some(ns) = arg.strip_prefix('@') {
                // nameserver
                nameserver = Some(ns.to_string());
            } else if let Some(flag) = arg.strip_prefix('+') {
                // flags, some of them with a value
                let (flag, value) = match flag.split_once('=') {
                    Some((flag, value)) => (flag, Some(value)),
                    None => (flag, None),
                };
                match (flag, value) {
                    ("resolve", None) => {
                        resolve = true;
                    }
                    ("verbose", None) => {
                        verbose = true;
                    }
                    #[cfg(feature = "json")]
                    ("json", None) => {
                        json = true;
                    }
                    ("no-meta", None) => {
                        print_meta = false;
                    }
                    ("debug", None) => {
                        debug = true;
                    }
                    ("tcp", None) => {
                        scheme = Scheme::Tcp;
                    }
                    #[cfg(feature = "tls")]
                    ("tls" | "dot", None) => {
                        scheme = Scheme::Tls;
                    }
                    #[cfg(feature = "http")]
                    ("https" | "doh", None) => {
                        scheme = Scheme::Https;
                    }
                    ("ipv4", None) => {
                        options = options.with_ipv4(true);
                    }
                    ("ipv6", None) => {
                        options = options.with_ipv6(true);
                    }
                    ("insecure", None) => {
                        options = options.with_insecure_skip_verify(true);
                    }
                    ("ndots", Some(val)) => match val.parse() {
                        Ok(ndots) => options = options.with_ndots(ndots),
                        Err(_) => err(format!("Invalid ndots value: {}.", val)),
                    },
                    ("search", Some(val)) => {
                        options = options.with_search_list(
                            val.split(',').filter(|suffix| !suffix.is_empty()),
                        );
                    }
                    ("timeout", Some(val)) => match val.parse() {
                        Ok(secs) => options = options.with_timeout(Duration::from_secs(secs)),
                        Err(_) => err(format!("Invalid timeout: {}.", val)),
                    },
                    ("prefer", Some(val)) => {
                        let prefer = match val.to_lowercase().as_str() {
                            "ipv4" | "4" => Prefer::Ipv4,
                            "ipv6" | "6" => Prefer::Ipv6,
                            "none" => Prefer::None,
                            _ => err(format!("Invalid address family: {}.", val)),
                        };
                        options = options.with_prefer(prefer);
                    }
                    ("tls-host", Some(val)) => {
                        options = options.with_tls_hostname(val);
                    }
                    ("host", Some(val)) => hosts.push(parse_host(val)),
                    (x, _) => {
                        err(format!("Invalid flag: +{}.", x));
                    }
                }
            } else if let Some(option) = arg.strip_prefix('-') {
                // options
                match option {
                    "h" | "-help" => {
                        print_help();
                        process::exit(0);
                    }
                    "V" | "-version" => {
                        print_version();
                        process::exit(0);
                    }
                    x => {
                        err(format!("Invalid option: -{}.", x));
                    }
                }
            } else {
                match RecordType::from_str(&arg.to_uppercase()) {
                    Ok(t) => {
                        qtype = t;
                    }
                    Err(_) => {
                        // use name as fallback
                        name = arg;
                    }
                }
            }
        }

        if resolve && qtype != RecordType::A {
            err("+resolve always looks up A records and cannot be combined with a q-type.");
        }

        Self {
            nameserver: nameserver.map(|ns| with_scheme(&ns, scheme)),
            name,
            qtype,
            options,
            hosts,
            resolve,
            verbose,
            #[cfg(feature = "json")]
            json,
            print_meta,
            debug,
        }
    }
}

/// Prepends the scheme selected by the flags, unless `nameserver` already has one.
fn with_scheme(nameserver: &str, scheme: Scheme) -> String {
    if nameserver.contains("://") {
        return nameserver.to_string();
    }
    match scheme {
        Scheme::Udp => format!("udp://{}", nameserver),
        Scheme::Tcp => format!("tcp://{}", nameserver),
        #[cfg(feature = "tls")]
        Scheme::Tls => format!("tls://{}", nameserver),
        #[cfg(feature = "http")]
        Scheme::Https => format!("https://{}/dns-query", nameserver),
    }
}

/// Parses `NAME=IP[,IP...]`.
fn parse_host(val: &str) -> (String, Vec<String>) {
    let (name, addrs) = match val.split_once('=') {
        Some((name, addrs)) if !name.is_empty() && !addrs.is_empty() => (name, addrs),
        _ => err(format!("Invalid host entry: {}, expected NAME=IP[,IP].", val)),
    };
    let addrs = addrs
        .split(',')
        .map(|addr| match IpAddr::from_str(addr) {
            Ok(ip) => ip.to_string(),
            Err(_) => err(format!("Invalid IP address in host entry: {}.", addr)),
        })
        .collect();
    (name.to_string(), addrs)
}

macro_rules! var {
    ($var:expr) => {
        $var.if_supports_color(owo_colors::Stream::Stdout, |s| s.green())
    };
}

macro_rules! printopt {
    ($opt:expr, $desc:expr) => {
        println!(
            "\t    {:<19} ({})",
            $opt.if_supports_color(owo_colors::Stream::Stdout, |s| s.yellow()),
            $desc,
        )
    };
}

macro_rules! printflag {
    ($flag:expr, $desc:expr) => {
        println!(
            "\t    {:<22} ({})",
            $flag.if_supports_color(owo_colors::Stream::Stdout, |s| s.yellow()),
            $desc,
        )
    };
}

fn print_help() {
    let output = owo_colors::Stream::Stdout;
    print!("{}", "Usage:".if_supports_color(output, |s| s.purple()));
    println!(
        "\tdnsutils [@{}] [{}] [{}] [{}] [{}]",
        var!("nameserver"),
        var!("name"),
        var!("q-type"),
        var!("options"),
        var!("flags")
    );
    println!();

    println!("{}", "Where:".if_supports_color(output, |s| s.purple()));

    println!(
        "\t{} is a nameserver address, either with a scheme (udp://, tcp://, tls://,\n\t\
         https://, sdns://) or as host[:port]; without it, the system resolver is used",
        var!("nameserver")
    );
    println!();

    println!("\t{} is the name you want to look up", var!("name"));
    println!();

    println!(
        "\t{} is the record type you want (e.g. AAAA, A, TXT, MX, SOA, ...)",
        var!("q-type")
    );
    println!();

    println!("\t{} is one or more of the following:", var!("options"));
    printopt!("-h | --help", "print this help message");
    printopt!("-V | --version", "print the version of dnsutils");
    println!();
    println!("\t{} is one or more of the following:", var!("flags"));
    printflag!(
        "+resolve",
        "resolve to addresses, following CNAMEs and using +host entries"
    );
    printflag!("+verbose", "also print the questions that were sent");
    #[cfg(feature = "json")]
    printflag!("+json", "format output as JSON");
    printflag!("+no-meta", "don't print status, server and time");
    printflag!("+debug", "log what the resolver is doing");
    printflag!("+tcp", "use TCP for a nameserver without scheme");
    #[cfg(feature = "tls")]
    printflag!("+tls", "use DNS over TLS for a nameserver without scheme");
    #[cfg(feature = "http")]
    printflag!("+https", "use DNS over HTTPS for a nameserver without scheme");
    printflag!("+ipv4 | +ipv6", "only talk to the nameserver over IPv4/IPv6");
    printflag!("+prefer=ipv4|ipv6", "prefer this family with the system resolver");
    printflag!("+ndots=N", "names with more labels are tried as-is first");
    printflag!("+search=a,b", "search list for unqualified names");
    printflag!("+timeout=SECS", "network timeout, default 60");
    printflag!("+insecure", "don't verify DoT certificates");
    printflag!("+tls-host=NAME", "name to verify the DoT certificate against");
    printflag!("+host=NAME=IP[,IP]", "static entry for +resolve");
    println!();

    println!("Note: the order of the arguments does not matter.");
    println!();

    println!(
        "If no arguments are specified, the default behaviour is\n`{}`.",
        format!("dnsutils {} {}", DEFAULT_NAME, DEFAULT_QTYPE)
            .if_supports_color(output, |s| s.green())
    );
    println!();

    println!(
        "Output is colourized by default. This can be tuned using the {}/\n{} environment variables.",
        var!("FORCE_COLOR"),
        var!("NO_COLOR")
    );
    println!(
        "Log output can be filtered with the {} environment variable.",
        var!("RUST_LOG")
    );
}

fn print_version() {
    println!("dnsutils v{}", env!("CARGO_PKG_VERSION"));
}

fn err(msg: impl AsRef<str>) -> ! {
    eprintln!("{}", msg.as_ref());
    process::exit(1)
}
