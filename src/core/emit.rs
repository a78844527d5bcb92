//! Output rendering
//!
//! Text output keeps the field layout of the input so it can be fed straight
//! back in:
//!
//! - **flat**: one rule per line, networks as `<address> <mask>`
//! - **grouped**: one grouped rule per line, comma-joined CIDR lists and
//!   comma-joined services
//!
//! Specific-service lines come first, any-service (`*`) lines last. For
//! 3-field input only the record side is printed; the peer network is
//! implied.
//!
//! JSON output always carries the grouped form, which loses nothing.

use super::error::Result;
use super::ingest::RecordForm;
use super::network::Network;
use super::policy::{Action, OptimizedPolicy, Peer, PeerSide, Rule};
use super::service::Service;
use crate::config::Config;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Output encoding
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    #[strum(serialize = "text")]
    Text,
    #[strum(serialize = "json")]
    Json,
}

/// Rendering settings taken from the run configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderOptions {
    pub grouped: bool,
    pub peer: Peer,
    pub action: Action,
}

impl From<&Config> for RenderOptions {
    fn from(config: &Config) -> Self {
        Self {
            grouped: config.grouped_output,
            peer: config.peer,
            action: config.default_action,
        }
    }
}

/// Renders a policy in the requested format.
///
/// Empty input (`form == None`) renders as the 5-field layout.
pub fn render(
    policy: &OptimizedPolicy,
    form: Option<RecordForm>,
    options: &RenderOptions,
    format: OutputFormat,
) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(render_text(
            policy,
            form.unwrap_or(RecordForm::Full),
            options,
        )),
        OutputFormat::Json => render_json(policy, form, options),
    }
}

/// Renders text output, one line per rule, newline-terminated.
pub fn render_text(policy: &OptimizedPolicy, form: RecordForm, options: &RenderOptions) -> String {
    let mut out = String::new();
    if options.grouped {
        for grouped in &policy.rules {
            let services = join(&grouped.services);
            push_grouped(
                &mut out,
                form,
                options.peer,
                &grouped.sources,
                &grouped.destinations,
                &services,
            );
        }
        for (sources, destinations) in policy.star.iter() {
            push_grouped(&mut out, form, options.peer, sources, destinations, "*");
        }
    } else {
        let (star, specific): (Vec<Rule>, Vec<Rule>) =
            policy.flatten().into_iter().partition(|r| r.service.is_any());
        for rule in specific.iter().chain(&star) {
            push_flat(&mut out, form, options.peer, rule);
        }
    }
    out
}

fn push_flat(out: &mut String, form: RecordForm, peer: Peer, rule: &Rule) {
    // writing into a String cannot fail
    let _ = match form {
        RecordForm::Short => writeln!(
            out,
            "{} {}",
            peer.record_side(rule.source, rule.destination).to_addr_mask(),
            rule.service
        ),
        RecordForm::Full => writeln!(
            out,
            "{} {} {}",
            rule.source.to_addr_mask(),
            rule.destination.to_addr_mask(),
            rule.service
        ),
    };
}

fn push_grouped(
    out: &mut String,
    form: RecordForm,
    peer: Peer,
    sources: &[Network],
    destinations: &[Network],
    services: &str,
) {
    let _ = match form {
        RecordForm::Short => {
            let record = match peer.side {
                PeerSide::Destination => sources,
                PeerSide::Source => destinations,
            };
            writeln!(out, "{} {services}", join(record))
        }
        RecordForm::Full => writeln!(out, "{} {} {services}", join(sources), join(destinations)),
    };
}

fn join<T: ToString>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// JSON document produced by `--format json`
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PolicyDocument {
    pub form: Option<RecordForm>,
    pub action: Action,
    /// Peer network of 3-field input
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub peer: Option<Peer>,
    pub rules: Vec<RuleGroup>,
    pub star: Vec<StarGroup>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuleGroup {
    pub sources: Vec<Network>,
    pub destinations: Vec<Network>,
    pub services: Vec<Service>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StarGroup {
    pub sources: Vec<Network>,
    pub destinations: Vec<Network>,
}

impl PolicyDocument {
    pub fn new(policy: &OptimizedPolicy, form: Option<RecordForm>, options: &RenderOptions) -> Self {
        Self {
            form,
            action: options.action,
            peer: (form == Some(RecordForm::Short)).then_some(options.peer),
            rules: policy
                .rules
                .iter()
                .map(|r| RuleGroup {
                    sources: r.sources.clone(),
                    destinations: r.destinations.clone(),
                    services: r.services.clone(),
                })
                .collect(),
            star: policy
                .star
                .iter()
                .map(|(sources, destinations)| StarGroup {
                    sources: sources.clone(),
                    destinations: destinations.clone(),
                })
                .collect(),
        }
    }
}

/// Renders the policy as pretty-printed JSON.
///
/// # Errors
///
/// Returns [`super::error::Error::Serialization`] if encoding fails.
pub fn render_json(
    policy: &OptimizedPolicy,
    form: Option<RecordForm>,
    options: &RenderOptions,
) -> Result<String> {
    let document = PolicyDocument::new(policy, form, options);
    let mut json = serde_json::to_string_pretty(&document)?;
    json.push('\n');
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::policy::{GroupedRelation, GroupedRule};
    use crate::core::test_helpers::{net, svc};

    fn sample() -> OptimizedPolicy {
        let mut star = GroupedRelation::new();
        star.insert(vec![net("10.9.0.0/16")], vec![net("0.0.0.0/0")]);
        OptimizedPolicy {
            rules: vec![GroupedRule {
                sources: vec![net("10.0.0.0/24"), net("10.0.2.0/24")],
                destinations: vec![net("0.0.0.0/0")],
                services: vec![svc("tcp:80-82"), svc("udp:53")],
            }],
            star,
        }
    }

    #[test]
    fn test_flat_short_form() {
        let text = render_text(&sample(), RecordForm::Short, &RenderOptions::default());
        assert_eq!(
            text,
            "10.0.0.0 255.255.255.0 tcp:80-82\n\
             10.0.0.0 255.255.255.0 udp:53\n\
             10.0.2.0 255.255.255.0 tcp:80-82\n\
             10.0.2.0 255.255.255.0 udp:53\n\
             10.9.0.0 255.255.0.0 *\n"
        );
    }

    #[test]
    fn test_flat_full_form() {
        let text = render_text(&sample(), RecordForm::Full, &RenderOptions::default());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "10.0.0.0 255.255.255.0 0.0.0.0 0.0.0.0 tcp:80-82");
        assert_eq!(lines[4], "10.9.0.0 255.255.0.0 0.0.0.0 0.0.0.0 *");
    }

    #[test]
    fn test_grouped_output() {
        let options = RenderOptions {
            grouped: true,
            ..RenderOptions::default()
        };
        assert_eq!(
            render_text(&sample(), RecordForm::Full, &options),
            "10.0.0.0/24,10.0.2.0/24 0.0.0.0/0 tcp:80-82,udp:53\n\
             10.9.0.0/16 0.0.0.0/0 *\n"
        );
        assert_eq!(
            render_text(&sample(), RecordForm::Short, &options),
            "10.0.0.0/24,10.0.2.0/24 tcp:80-82,udp:53\n10.9.0.0/16 *\n"
        );
    }

    #[test]
    fn test_short_form_prints_destination_side_for_source_peer() {
        let policy = OptimizedPolicy {
            rules: vec![GroupedRule {
                sources: vec![net("172.16.0.0/12")],
                destinations: vec![net("10.0.0.0/23")],
                services: vec![svc("tcp:443")],
            }],
            star: GroupedRelation::new(),
        };
        let options = RenderOptions {
            peer: Peer::source(net("172.16.0.0/12")),
            ..RenderOptions::default()
        };
        assert_eq!(
            render_text(&policy, RecordForm::Short, &options),
            "10.0.0.0 255.255.254.0 tcp:443\n"
        );
    }

    #[test]
    fn test_empty_policy_renders_nothing() {
        let out = render(
            &OptimizedPolicy::default(),
            None,
            &RenderOptions::default(),
            OutputFormat::Text,
        )
        .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_json_document() {
        let options = RenderOptions {
            action: Action::Deny,
            ..RenderOptions::default()
        };
        let json = render_json(&sample(), Some(RecordForm::Short), &options).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["form"], "short");
        assert_eq!(value["action"], "deny");
        assert_eq!(value["peer"]["side"], "destination");
        assert_eq!(value["peer"]["network"], "0.0.0.0/0");
        assert_eq!(value["rules"][0]["sources"][1], "10.0.2.0/24");
        assert_eq!(value["rules"][0]["services"][0], "tcp:80-82");
        assert_eq!(value["star"][0]["sources"][0], "10.9.0.0/16");

        let back: PolicyDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(back.rules.len(), 1);
    }

    #[test]
    fn test_json_full_form_omits_peer() {
        let json =
            render_json(&sample(), Some(RecordForm::Full), &RenderOptions::default()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value.get("peer").is_none());
        assert_eq!(value["action"], "permit");
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }
}
