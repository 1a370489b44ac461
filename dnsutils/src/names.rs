//! Building the list of names to query and the query messages for them.

use toluol_proto::{HeaderFlags, Message, Name, Opcode};

use crate::model::Question;
use crate::Result;

/// Returns true iff `name` ends with the root label.
pub fn is_fqdn(name: &str) -> bool {
    name.ends_with('.')
}

/// Appends the root label to `name` if it is missing.
pub fn fqdn(name: &str) -> String {
    if is_fqdn(name) {
        name.to_string()
    } else {
        format!("{}.", name)
    }
}

/// Number of non-root labels in `name`.
///
/// ```rust
/// use dnsutils::names::label_count;
///
/// assert_eq!(label_count("www.example.com"), 3);
/// assert_eq!(label_count("www.example.com."), 3);
/// assert_eq!(label_count("."), 0);
/// ```
pub fn label_count(name: &str) -> usize {
    name.split('.').filter(|label| !label.is_empty()).count()
}

/// Returns the fully qualified names to try for `name`, in order.
///
/// A fully qualified `name` is returned unchanged. Otherwise each entry of `search_list` is
/// appended to it; names with more than `ndots` labels are tried as-is before those, shorter names
/// after them.
pub fn expand_candidates(name: &str, ndots: usize, search_list: &[String]) -> Vec<String> {
    if is_fqdn(name) {
        return vec![name.to_string()];
    }

    let has_enough_dots = label_count(name) > ndots;
    let name = fqdn(name);

    let mut names = Vec::with_capacity(search_list.len() + 1);
    if has_enough_dots {
        names.push(name.clone());
    }
    for suffix in search_list {
        let suffix = suffix.trim_start_matches('.');
        if suffix.is_empty() {
            continue;
        }
        names.push(fqdn(&format!("{}{}", name, suffix)));
    }
    if !has_enough_dots {
        names.push(name);
    }

    names
}

/// Builds one query per candidate name of `question`.
///
/// Every message carries exactly one question, the recursion desired flag and its own random ID,
/// and no EDNS record.
pub fn prepare_messages(
    question: &Question,
    ndots: usize,
    search_list: &[String],
) -> Result<Vec<Message>> {
    let flags = HeaderFlags {
        aa: false,
        tc: false,
        rd: true,
        ra: false,
        ad: false,
        cd: false,
    };

    expand_candidates(&question.name, ndots, search_list)
        .into_iter()
        .map(|candidate| -> Result<Message> {
            let mut msg = Message::new_query(
                Name::from_ascii(&candidate)?,
                question.qtype,
                Opcode::QUERY,
                flags,
                None,
            )?;
            for q in msg.questions.iter_mut() {
                q.qclass = question.qclass;
            }
            Ok(msg)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use toluol_proto::{Class, RecordType};

    use super::*;

    fn search(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn fully_qualified_is_kept() {
        assert_eq!(
            expand_candidates("www.example.com.", 1, &search(&["corp.com."])),
            vec!["www.example.com."]
        );
    }

    #[test]
    fn enough_dots_tries_bare_name_first() {
        assert_eq!(
            expand_candidates("www.example.com", 1, &search(&["corp.com."])),
            vec!["www.example.com.", "www.example.com.corp.com."]
        );
    }

    #[test]
    fn short_name_tries_suffixes_first() {
        assert_eq!(
            expand_candidates("intranet", 1, &search(&["corp.com", ".example.org."])),
            vec!["intranet.corp.com.", "intranet.example.org.", "intranet."]
        );
        assert_eq!(
            expand_candidates("www.example", 2, &search(&["corp.com"])),
            vec!["www.example.corp.com.", "www.example."]
        );
    }

    #[test]
    fn no_search_list() {
        assert_eq!(expand_candidates("example.com", 1, &[]), vec!["example.com."]);
        assert_eq!(expand_candidates("localhost", 1, &[]), vec!["localhost."]);
    }

    #[test]
    fn messages() {
        let question = Question {
            name: "intranet".into(),
            qtype: RecordType::AAAA,
            qclass: Class::CH,
        };
        let msgs = prepare_messages(&question, 1, &search(&["corp.com"])).unwrap();
        assert_eq!(msgs.len(), 2);

        for msg in &msgs {
            assert!(msg.header.flags.rd);
            assert!(!msg.header.qr);
            assert_eq!(msg.questions.len(), 1);
            assert_eq!(msg.questions[0].qtype, RecordType::AAAA);
            assert_eq!(msg.questions[0].qclass, Class::CH);
            assert!(msg.additional_answers.is_empty());
        }
        assert_eq!(msgs[0].questions[0].qname.to_string(), "intranet.corp.com");
        assert_eq!(msgs[1].questions[0].qname.to_string(), "intranet");
    }

    #[test]
    fn invalid_name() {
        let question = Question::new("bad..name", RecordType::A);
        assert!(prepare_messages(&question, 1, &[]).is_err());
    }
}
