//! Line normalizer
//!
//! Turns policy text into [`Rule`]s. Two record forms are accepted, and one
//! input must stick to a single form:
//!
//! ```text
//! # 3-field: the other side is the run-wide peer network
//! 10.0.0.0 255.255.255.0 tcp:80
//!
//! # 5-field
//! 10.0.0.0 255.255.255.0 192.168.1.0 255.255.255.0 udp:53
//! ```
//!
//! `any` in an address position stands for `0.0.0.0 0.0.0.0`. `host` is
//! rejected: host entries must be expanded to a /32 mask upstream.

use super::error::{Error, RecordError, Result};
use super::network::Network;
use super::policy::{Peer, Rule};
use super::service::Service;
use crate::config::Config;
use crate::validators;
use serde::{Deserialize, Serialize};

/// Record layout, fixed by the first record of an input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
pub enum RecordForm {
    /// `<network> <mask> <service>`
    #[strum(serialize = "3-field")]
    Short,
    /// `<src> <srcmask> <dst> <dstmask> <service>`
    #[strum(serialize = "5-field")]
    Full,
}

impl RecordForm {
    pub const fn field_count(self) -> usize {
        match self {
            RecordForm::Short => 3,
            RecordForm::Full => 5,
        }
    }

    fn from_field_count(count: usize) -> Option<Self> {
        match count {
            3 => Some(RecordForm::Short),
            5 => Some(RecordForm::Full),
            _ => None,
        }
    }
}

/// Per-input parser state
///
/// Holds the record form seen so far; created fresh for every input.
#[derive(Debug, Default)]
pub struct ParserState {
    form: Option<RecordForm>,
}

impl ParserState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Form of the records accepted so far, `None` before the first one.
    pub fn form(&self) -> Option<RecordForm> {
        self.form
    }

    /// Normalizes one line.
    ///
    /// Returns `Ok(None)` for blank lines and `#` comments.
    ///
    /// # Errors
    ///
    /// Returns a [`RecordError`] describing the first problem in the line.
    pub fn parse_record(
        &mut self,
        line: &str,
        peer: Peer,
    ) -> std::result::Result<Option<Rule>, RecordError> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.first().is_none_or(|t| t.starts_with('#')) {
            return Ok(None);
        }

        if let Some(token) = tokens.iter().find(|t| validators::is_disallowed_token(t)) {
            return Err(RecordError::DisallowedToken(token.to_ascii_lowercase()));
        }

        let fields = expand_any(&tokens);
        let found = RecordForm::from_field_count(fields.len())
            .ok_or(RecordError::FieldCount(fields.len()))?;

        match self.form {
            Some(expected) if expected != found => {
                return Err(RecordError::ModeMismatch { expected, found });
            }
            Some(_) => {}
            None => self.form = Some(found),
        }

        let (source, destination) = match found {
            RecordForm::Short => peer.pair_with(Network::from_addr_mask(fields[0], fields[1])?),
            RecordForm::Full => (
                Network::from_addr_mask(fields[0], fields[1])?,
                Network::from_addr_mask(fields[2], fields[3])?,
            ),
        };
        let service: Service = fields[fields.len() - 1].parse()?;

        Ok(Some(Rule::new(source, destination, service)))
    }
}

/// Replaces `any` in address positions by `0.0.0.0 0.0.0.0`.
///
/// The last token is the service and is left alone.
fn expand_any<'a>(tokens: &[&'a str]) -> Vec<&'a str> {
    let Some((service, addresses)) = tokens.split_last() else {
        return Vec::new();
    };
    let mut fields = Vec::with_capacity(tokens.len() + 2);
    for token in addresses {
        if token.eq_ignore_ascii_case("any") {
            fields.extend(["0.0.0.0", "0.0.0.0"]);
        } else {
            fields.push(*token);
        }
    }
    fields.push(*service);
    fields
}

/// Normalized input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ingested {
    /// `None` if the input held no records
    pub form: Option<RecordForm>,
    pub rules: Vec<Rule>,
}

/// Normalizes a whole policy.
///
/// # Errors
///
/// Returns [`Error::Record`] for the first bad line; nothing is skipped.
pub fn ingest(text: &str, config: &Config) -> Result<Ingested> {
    let mut state = ParserState::new();
    let mut rules = Vec::new();

    for (index, line) in text.lines().enumerate() {
        match state.parse_record(line, config.peer) {
            Ok(Some(rule)) => rules.push(rule),
            Ok(None) => {}
            Err(source) => {
                return Err(Error::Record {
                    line: index + 1,
                    record: validators::sanitize_record(line),
                    source,
                });
            }
        }
    }

    tracing::debug!(records = rules.len(), form = ?state.form(), "ingested policy");
    Ok(Ingested {
        form: state.form(),
        rules,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_helpers::{net, rule};

    fn parse_one(line: &str) -> std::result::Result<Option<Rule>, RecordError> {
        ParserState::new().parse_record(line, Peer::default())
    }

    #[test]
    fn test_short_form_uses_peer_as_destination() {
        assert_eq!(
            parse_one("10.0.0.0 255.255.255.0 tcp:80").unwrap(),
            Some(rule("10.0.0.0/24", "0.0.0.0/0", "tcp:80"))
        );
    }

    #[test]
    fn test_short_form_with_source_peer() {
        let peer = Peer::source(net("172.16.0.0/12"));
        let parsed = ParserState::new()
            .parse_record("10.0.0.0 255.255.255.0 udp:53", peer)
            .unwrap();
        assert_eq!(parsed, Some(rule("172.16.0.0/12", "10.0.0.0/24", "udp:53")));
    }

    #[test]
    fn test_full_form() {
        assert_eq!(
            parse_one("10.0.0.0 255.255.255.0 192.168.1.7 255.255.255.255 *").unwrap(),
            Some(rule("10.0.0.0/24", "192.168.1.7/32", "*"))
        );
    }

    #[test]
    fn test_any_expands_before_field_count() {
        assert_eq!(
            parse_one("any 10.0.0.0 255.0.0.0 tcp:22").unwrap(),
            Some(rule("0.0.0.0/0", "10.0.0.0/8", "tcp:22"))
        );
        assert_eq!(
            parse_one("any tcp").unwrap(),
            Some(rule("0.0.0.0/0", "0.0.0.0/0", "tcp"))
        );
        // only address positions expand
        assert!(matches!(
            parse_one("10.0.0.0 255.0.0.0 any"),
            Err(RecordError::UnknownName { .. })
        ));
    }

    #[test]
    fn test_host_is_rejected() {
        assert_eq!(
            parse_one("host 10.0.0.1 tcp:80"),
            Err(RecordError::DisallowedToken("host".into()))
        );
        assert_eq!(
            parse_one("10.0.0.0 255.0.0.0 HOST 1.1.1.1 tcp:80"),
            Err(RecordError::DisallowedToken("host".into()))
        );
    }

    #[test]
    fn test_field_count() {
        assert_eq!(parse_one("10.0.0.0 tcp:80"), Err(RecordError::FieldCount(2)));
        assert_eq!(
            parse_one("10.0.0.0 255.0.0.0 1.1.1.1 tcp:80"),
            Err(RecordError::FieldCount(4))
        );
    }

    #[test]
    fn test_skips_blank_and_comment_lines() {
        assert_eq!(parse_one(""), Ok(None));
        assert_eq!(parse_one("   \t "), Ok(None));
        assert_eq!(parse_one("# exported from fw01"), Ok(None));
    }

    #[test]
    fn test_mode_mismatch() {
        let mut state = ParserState::new();
        state
            .parse_record("10.0.0.0 255.0.0.0 tcp:80", Peer::default())
            .unwrap();
        assert_eq!(state.form(), Some(RecordForm::Short));
        assert_eq!(
            state.parse_record("10.0.0.0 255.0.0.0 any tcp:80", Peer::default()),
            Err(RecordError::ModeMismatch {
                expected: RecordForm::Short,
                found: RecordForm::Full,
            })
        );
    }

    #[test]
    fn test_ingest_reports_line_number() {
        let text = "10.0.0.0 255.0.0.0 tcp:80\n\n10.1.0.0 255.255.0.0 tcp:99999\n";
        let err = ingest(text, &Config::default()).unwrap_err();
        match err {
            Error::Record { line, record, source } => {
                assert_eq!(line, 3);
                assert_eq!(record, "10.1.0.0 255.255.0.0 tcp:99999");
                assert!(matches!(source, RecordError::InvalidPort(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_ingest_collects_rules() {
        let text = "# policy\n10.0.0.0 255.255.255.0 tcp:80\r\n10.0.1.0 255.255.255.0 *\n";
        let ingested = ingest(text, &Config::default()).unwrap();
        assert_eq!(ingested.form, Some(RecordForm::Short));
        assert_eq!(
            ingested.rules,
            vec![
                rule("10.0.0.0/24", "0.0.0.0/0", "tcp:80"),
                rule("10.0.1.0/24", "0.0.0.0/0", "*"),
            ]
        );
    }

    #[test]
    fn test_ingest_empty_input() {
        let ingested = ingest("\n# nothing\n", &Config::default()).unwrap();
        assert_eq!(ingested.form, None);
        assert!(ingested.rules.is_empty());
    }
}
