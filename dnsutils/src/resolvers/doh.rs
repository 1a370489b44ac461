//! DNS over HTTPS (RFC 8484).

use std::fmt;
use std::io::Read;
use std::time::Duration;

use data_encoding::BASE64URL_NOPAD;

use crate::error::Error;
use crate::model::{Question, Response};
use crate::net::{Family, Network, Protocol};
use crate::options::ResolverOptions;
use crate::resolvers::classic::strip_prefix_ignore_case;
use crate::resolvers::{query_candidates, Lookup};
use crate::Result;

const DNS_MESSAGE: &str = "application/dns-message";

pub struct DohResolver {
    url: String,
    agent: ureq::Agent,
    opts: ResolverOptions,
}

impl DohResolver {
    /// Creates a resolver for the `https://` URL `server`.
    pub fn new(server: &str, opts: ResolverOptions) -> Result<Self> {
        let rest = strip_prefix_ignore_case(server, "https://")
            .ok_or_else(|| Error::Config(format!("missing https in {}", server)))?;
        let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
        if host.is_empty() || rest.contains(char::is_whitespace) {
            return Err(Error::Config(format!(
                "{} is not a valid HTTPS nameserver",
                server
            )));
        }

        let agent = match &opts.http_agent {
            Some(agent) => agent.clone(),
            None => build_agent(opts.timeout),
        };
        log::debug!("using DoH server {}", server);

        Ok(Self {
            url: server.to_string(),
            agent,
            opts,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Lookup for DohResolver {
    fn lookup(&self, question: &Question) -> Result<Response> {
        // replies come over HTTPS, so a truncated one is an error
        let network = Network {
            protocol: Protocol::Tcp,
            family: Family::Any,
            tls: true,
        };
        query_candidates(question, &self.opts, network, &self.url, |_, query| {
            send_query_http(&self.agent, &self.url, query)
        })
    }
}

impl fmt::Debug for DohResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DohResolver")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

/// Builds an agent whose requests give up after `timeout`. A zero timeout means no timeout.
fn build_agent(timeout: Duration) -> ureq::Agent {
    let builder = ureq::AgentBuilder::new();
    if timeout.is_zero() {
        builder.build()
    } else {
        builder.timeout(timeout).build()
    }
}

/// POSTs `data` to `url`. If the server does not allow POST, the query is sent again as a GET
/// request.
fn send_query_http(agent: &ureq::Agent, url: &str, data: &[u8]) -> Result<Vec<u8>> {
    let response = match agent
        .post(url)
        .set("Content-Type", DNS_MESSAGE)
        .set("Accept", DNS_MESSAGE)
        .send_bytes(data)
    {
        Err(ureq::Error::Status(405, _)) => {
            log::debug!("{} does not allow POST, retrying with GET", url);
            agent
                .get(url)
                .set("Accept", DNS_MESSAGE)
                .query("dns", &BASE64URL_NOPAD.encode(data))
                .call()
        }
        response => response,
    };

    let response = match response {
        Ok(response) => response,
        Err(ureq::Error::Status(code, response)) => {
            return Err(Error::Http(format!("{} {}", code, response.status_text())))
        }
        Err(ureq::Error::Transport(transport)) => return Err(Error::Http(transport.to_string())),
    };
    // redirects are followed by ureq, other 2xx codes are not acceptable either
    if response.status() != 200 {
        return Err(Error::Http(format!(
            "{} {}",
            response.status(),
            response.status_text()
        )));
    }

    let mut res = Vec::new();
    response.into_reader().read_to_end(&mut res)?;
    Ok(res)
}
