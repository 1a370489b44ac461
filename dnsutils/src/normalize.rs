//! Conversion of wire responses into the flattened [`Response`] model.

use std::time::Duration;

use toluol_proto::{Message, NonOptRecord, RCode, RecordType};

use crate::model::{Answer, Authority, Question, Response};
use crate::names::fqdn;

/// Converts the answer and authority sections of `msg` into a [`Response`].
///
/// Only SOA records are taken from the authority section. The question section is not copied;
/// transports fill it with the questions they actually sent.
pub fn parse_message(msg: &Message, rtt: Duration, server: &str) -> Response {
    let rtt = format!("{}ms", rtt.as_millis());
    let status = msg.header.rcode.unwrap_or(RCode::NOERROR).to_string();

    let authorities = msg
        .authoritative_answers
        .iter()
        .filter_map(|record| record.as_nonopt())
        .filter_map(|record| {
            let soa = record.rdata().as_soa()?;
            Some(Authority {
                name: fqdn(&record.owner.to_string()),
                rtype: record.rtype.to_string(),
                class: record.class.to_string(),
                ttl: format!("{}s", record.ttl),
                mname: format!(
                    "{} {} {} {} {} {} {}",
                    fqdn(&soa.mname.to_string()),
                    fqdn(&soa.rname.to_string()),
                    soa.serial,
                    soa.refresh,
                    soa.retry,
                    soa.expire,
                    soa.minimum
                ),
                status: status.clone(),
                rtt: rtt.clone(),
                nameserver: server.to_string(),
            })
        })
        .collect();

    let answers = msg
        .answers
        .iter()
        .filter_map(|record| record.as_nonopt())
        .map(|record| Answer {
            name: fqdn(&record.owner.to_string()),
            rtype: record.rtype.to_string(),
            class: record.class.to_string(),
            ttl: format!("{}s", record.ttl),
            address: address_of(record),
            status: status.clone(),
            rtt: rtt.clone(),
            nameserver: server.to_string(),
        })
        .collect();

    Response {
        questions: Vec::new(),
        answers,
        authorities,
    }
}

/// Converts a question from the wire into the model, fully qualifying its name.
pub fn parse_question(question: &toluol_proto::Question) -> Question {
    Question {
        name: fqdn(&question.qname.to_string()),
        qtype: question.qtype,
        qclass: question.qclass,
    }
}

fn address_of(record: &NonOptRecord) -> String {
    let rdata = record.rdata().to_string();
    match record.rtype {
        RecordType::A | RecordType::AAAA => last_token(&rdata),
        RecordType::CNAME | RecordType::NS | RecordType::PTR | RecordType::DNAME => {
            fqdn(&last_token(&rdata))
        }
        _ => {
            log::debug!(
                "{} record for {} has multi-field RDATA, keeping it whole",
                record.rtype,
                record.owner
            );
            rdata
        }
    }
}

fn last_token(s: &str) -> String {
    s.split_whitespace().last().unwrap_or_default().to_string()
}
