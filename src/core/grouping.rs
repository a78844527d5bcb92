//! Biclique grouping of network pairs
//!
//! [`group_nets`] turns a source → destinations relation into groups of the
//! form "these sources may reach these destinations". It is a greedy
//! one-pass heuristic:
//!
//! 1. CIDR-merge each source's destinations.
//! 2. Reverse the relation (destination → sources).
//! 3. CIDR-merge each destination's sources.
//! 4. Destinations whose merged source tuple is identical share one group.
//!
//! It only finds groups whose members end up with identical merged neighbor
//! sets. Finding a minimum biclique cover is NP-hard and is not attempted, so
//! the output is correct (exact same coverage) but not necessarily minimal.

use super::network::{Network, cidr_merge};
use super::policy::{CoveringRelation, GroupedRelation};
use std::collections::BTreeMap;

/// Groups a covering relation into (source tuple → destinations) entries.
///
/// The covered address pairs are exactly those of the input. Iteration runs
/// over sorted maps, so equal inputs always produce equal groupings.
pub fn group_nets(relation: &CoveringRelation) -> GroupedRelation {
    let mut grouped = GroupedRelation::new();
    if relation.is_empty() {
        return grouped;
    }

    let forward: Vec<(Network, Vec<Network>)> = relation
        .iter()
        .map(|(source, destinations)| (*source, cidr_merge(destinations.iter().copied())))
        .collect();

    if let [(source, destinations)] = forward.as_slice() {
        grouped.insert(vec![*source], destinations.clone());
        return grouped;
    }

    let mut reverse: BTreeMap<Network, Vec<Network>> = BTreeMap::new();
    for (source, destinations) in &forward {
        for destination in destinations {
            reverse.entry(*destination).or_default().push(*source);
        }
    }

    let mut by_sources: BTreeMap<Vec<Network>, Vec<Network>> = BTreeMap::new();
    for (destination, sources) in reverse {
        by_sources
            .entry(cidr_merge(sources))
            .or_default()
            .push(destination);
    }

    for (sources, destinations) in by_sources {
        grouped.insert(sources, cidr_merge(destinations));
    }

    tracing::trace!(
        pairs = relation.pair_count(),
        groups = grouped.len(),
        "grouped covering relation"
    );
    grouped
}
