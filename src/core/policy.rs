//! Policy data structures
//!
//! Everything here is built fresh for one optimizer pass and handed from one
//! stage to the next by value. All maps are `BTreeMap`s so traversal order,
//! and therefore every grouping decision, is a function of the rule set alone.

use super::network::Network;
use super::service::Service;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Action the whole policy applies to matching traffic
///
/// The optimizer never reasons about permit/deny semantics; the action is
/// carried through to the output untouched.
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Default,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    #[default]
    #[strum(serialize = "permit")]
    Permit,
    #[strum(serialize = "deny")]
    Deny,
}

/// Which side of a 3-field record the fixed peer network sits on
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Default,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
pub enum PeerSide {
    /// The peer is the source; record networks are destinations
    #[strum(serialize = "source")]
    Source,
    /// The peer is the destination; record networks are sources
    #[default]
    #[strum(serialize = "destination")]
    Destination,
}

/// The run-wide network completing every 3-field record
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Peer {
    pub side: PeerSide,
    pub network: Network,
}

impl Peer {
    pub fn source(network: Network) -> Self {
        Self {
            side: PeerSide::Source,
            network,
        }
    }

    pub fn destination(network: Network) -> Self {
        Self {
            side: PeerSide::Destination,
            network,
        }
    }

    /// Completes a record network into a (source, destination) pair.
    pub fn pair_with(self, record: Network) -> (Network, Network) {
        match self.side {
            PeerSide::Source => (self.network, record),
            PeerSide::Destination => (record, self.network),
        }
    }

    /// The record side of a (source, destination) pair.
    pub fn record_side(self, source: Network, destination: Network) -> Network {
        match self.side {
            PeerSide::Source => destination,
            PeerSide::Destination => source,
        }
    }
}

impl Default for Peer {
    fn default() -> Self {
        Self::destination(Network::any())
    }
}

/// A single normalized permit triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Rule {
    pub source: Network,
    pub destination: Network,
    pub service: Service,
}

impl Rule {
    pub fn new(source: Network, destination: Network, service: Service) -> Self {
        Self {
            source,
            destination,
            service,
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} {}", self.source, self.destination, self.service)
    }
}

/// Services permitted between each (source, destination) pair
pub type PairIndex = BTreeMap<(Network, Network), BTreeSet<Service>>;

/// Source → destinations relation fed to [`super::grouping::group_nets`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoveringRelation {
    edges: BTreeMap<Network, BTreeSet<Network>>,
}

impl CoveringRelation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_pair(&mut self, source: Network, destination: Network) {
        self.edges.entry(source).or_default().insert(destination);
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Number of distinct sources.
    pub fn source_count(&self) -> usize {
        self.edges.len()
    }

    /// Number of (source, destination) pairs.
    pub fn pair_count(&self) -> usize {
        self.edges.values().map(BTreeSet::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Network, &BTreeSet<Network>)> {
        self.edges.iter()
    }
}

impl FromIterator<(Network, Network)> for CoveringRelation {
    fn from_iter<I: IntoIterator<Item = (Network, Network)>>(iter: I) -> Self {
        let mut relation = Self::new();
        for (source, destination) in iter {
            relation.add_pair(source, destination);
        }
        relation
    }
}

/// "All of these sources may reach all of these destinations"
///
/// Keys are sorted, CIDR-merged source tuples; values are sorted,
/// CIDR-merged destination lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupedRelation {
    groups: BTreeMap<Vec<Network>, Vec<Network>>,
}

impl GroupedRelation {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, sources: Vec<Network>, destinations: Vec<Network>) {
        self.groups.insert(sources, destinations);
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Number of groups (one grouped output line each).
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Vec<Network>, &Vec<Network>)> {
        self.groups.iter()
    }

    /// `true` if a single group contains both `source` and `destination`.
    pub fn covers(&self, source: Network, destination: Network) -> bool {
        self.groups.iter().any(|(sources, destinations)| {
            sources.iter().any(|s| s.contains(source))
                && destinations.iter().any(|d| d.contains(destination))
        })
    }

    /// Expands every group into its (source, destination) cross product.
    pub fn pairs(&self) -> impl Iterator<Item = (Network, Network)> + '_ {
        self.groups.iter().flat_map(|(sources, destinations)| {
            sources
                .iter()
                .flat_map(move |s| destinations.iter().map(move |d| (*s, *d)))
        })
    }
}

/// Covering relation per service
pub type ServiceIndex = BTreeMap<Service, CoveringRelation>;

/// One grouped output rule: every source may reach every destination on
/// every service
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct GroupedRule {
    pub sources: Vec<Network>,
    pub destinations: Vec<Network>,
    pub services: Vec<Service>,
}

impl GroupedRule {
    /// Expands into flat rules.
    pub fn rules(&self) -> impl Iterator<Item = Rule> + '_ {
        self.sources.iter().flat_map(move |s| {
            self.destinations.iter().flat_map(move |d| {
                self.services
                    .iter()
                    .map(move |service| Rule::new(*s, *d, *service))
            })
        })
    }
}

/// Result of an optimizer run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptimizedPolicy {
    /// Specific-service rules, sorted
    pub rules: Vec<GroupedRule>,
    /// Any-service covering groups
    pub star: GroupedRelation,
}

impl OptimizedPolicy {
    /// Every flat rule the policy permits, specific services first.
    pub fn flatten(&self) -> BTreeSet<Rule> {
        self.rules
            .iter()
            .flat_map(GroupedRule::rules)
            .chain(
                self.star
                    .pairs()
                    .map(|(s, d)| Rule::new(s, d, Service::Any)),
            )
            .collect()
    }

    /// Number of lines in grouped output.
    pub fn grouped_len(&self) -> usize {
        self.rules.len() + self.star.len()
    }
}
