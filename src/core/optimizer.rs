//! Policy optimizer
//!
//! One pass runs four stages over a rule set:
//!
//! 1. **Collapse** any-service rules into a grouped covering relation.
//! 2. **Filter** specific-service pairs that a covering group already permits.
//! 3. **Aggregate** the services of each remaining pair, squeezing TCP/UDP
//!    ports into ranges.
//! 4. **Group** every service's pairs with [`group_nets`] and merge services
//!    that end up on identical network groups.
//!
//! [`optimize`] repeats the pass on its own flattened output until nothing
//! changes, so that optimizing an optimized policy is a no-op.

use super::error::{Error, Result};
use super::grouping::group_nets;
use super::network::Network;
use super::pipeline::Stage;
use super::policy::{
    CoveringRelation, GroupedRelation, GroupedRule, OptimizedPolicy, PairIndex, Rule, ServiceIndex,
};
use super::service::{PortSpec, Protocol, Service, squeeze_ports};
use crate::config::Config;
use std::collections::{BTreeMap, BTreeSet};

/// Default bound on optimizer passes.
pub const DEFAULT_MAX_PASSES: usize = 16;

/// Tuning knobs for [`optimize`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptimizerOptions {
    /// Collapse TCP/UDP port lists into ranges (disabled by `--nomerge`)
    pub squeeze_ports: bool,
    /// Upper bound on passes before giving up on a fixed point
    pub max_passes: usize,
}

impl Default for OptimizerOptions {
    fn default() -> Self {
        Self {
            squeeze_ports: true,
            max_passes: DEFAULT_MAX_PASSES,
        }
    }
}

impl From<&Config> for OptimizerOptions {
    fn from(config: &Config) -> Self {
        Self {
            squeeze_ports: config.squeeze_ports,
            max_passes: config.max_passes,
        }
    }
}

/// Optimizes a rule set.
///
/// Input order and duplicates do not affect the result.
///
/// # Errors
///
/// Returns [`Error::InvalidPort`] if a rule carries a reversed port range.
pub fn optimize(rules: &[Rule], options: &OptimizerOptions) -> Result<OptimizedPolicy> {
    optimize_tracked(rules, options, &mut |_: Stage| {})
}

/// [`optimize`], reporting every stage entered to `on_stage`.
pub(crate) fn optimize_tracked(
    rules: &[Rule],
    options: &OptimizerOptions,
    on_stage: &mut dyn FnMut(Stage),
) -> Result<OptimizedPolicy> {
    let mut current: BTreeSet<Rule> = rules.iter().copied().collect();
    let mut policy = optimize_pass(&current, options, on_stage)?;
    let mut passes = 1;

    loop {
        let flat = policy.flatten();
        if flat == current {
            tracing::debug!(passes, lines = policy.grouped_len(), "reached fixed point");
            return Ok(policy);
        }
        if passes >= options.max_passes {
            tracing::warn!(
                passes,
                "no fixed point within the pass limit; returning the last pass"
            );
            return Ok(policy);
        }
        current = flat;
        policy = optimize_pass(&current, options, on_stage)?;
        passes += 1;
    }
}

fn optimize_pass(
    rules: &BTreeSet<Rule>,
    options: &OptimizerOptions,
    on_stage: &mut dyn FnMut(Stage),
) -> Result<OptimizedPolicy> {
    on_stage(Stage::Collapsing);
    let (pairs, star_relation) = split_star(rules);
    let star = group_nets(&star_relation);

    on_stage(Stage::Filtering);
    let mut pairs = filter_redundant(pairs, &star);

    on_stage(Stage::Aggregating);
    for services in pairs.values_mut() {
        *services = aggregate_ports(services, options.squeeze_ports)?;
    }

    on_stage(Stage::GroupingServices);
    let rules = group_services(&pairs);

    Ok(OptimizedPolicy { rules, star })
}

/// Separates any-service rules from the rest.
///
/// Returns the specific-service pair index and the any-service relation.
pub fn split_star(rules: &BTreeSet<Rule>) -> (PairIndex, CoveringRelation) {
    let mut pairs = PairIndex::new();
    let mut star = CoveringRelation::new();
    for rule in rules {
        if rule.service.is_any() {
            star.add_pair(rule.source, rule.destination);
        } else {
            pairs
                .entry((rule.source, rule.destination))
                .or_default()
                .insert(rule.service);
        }
    }
    tracing::trace!(
        pairs = pairs.len(),
        star_pairs = star.pair_count(),
        "split any-service rules"
    );
    (pairs, star)
}

/// Drops every pair that lies inside a single star group.
///
/// The whole pair goes, whatever services it carries.
pub fn filter_redundant(pairs: PairIndex, star: &GroupedRelation) -> PairIndex {
    if star.is_empty() {
        return pairs;
    }
    pairs
        .into_iter()
        .filter(|((source, destination), services)| {
            let covered = star.covers(*source, *destination);
            if covered {
                tracing::debug!(
                    %source,
                    %destination,
                    services = services.len(),
                    "dropped pair covered by an any-service rule"
                );
            }
            !covered
        })
        .collect()
}

/// Normalizes the services of one pair.
///
/// A bare protocol absorbs every port entry of the same protocol. When
/// `squeeze` is set, TCP and UDP entries are collapsed into contiguous
/// runs.
///
/// # Errors
///
/// Returns [`Error::InvalidPort`] for a reversed port range.
pub fn aggregate_ports(services: &BTreeSet<Service>, squeeze: bool) -> Result<BTreeSet<Service>> {
    let mut by_protocol: BTreeMap<Protocol, BTreeSet<PortSpec>> = BTreeMap::new();
    let mut aggregated = BTreeSet::new();

    for service in services {
        match *service {
            Service::Any => {
                aggregated.insert(Service::Any);
            }
            Service::Proto(protocol, ports) => {
                let ports = ports
                    .validate()
                    .map_err(|e| Error::InvalidPort(format!("{protocol}: {e}")))?;
                by_protocol.entry(protocol).or_default().insert(ports);
            }
        }
    }

    for (protocol, ports) in by_protocol {
        if ports.contains(&PortSpec::Any) {
            aggregated.insert(Service::Proto(protocol, PortSpec::Any));
        } else if squeeze && protocol.is_squeezable() && ports.len() > 1 {
            aggregated.extend(
                squeeze_ports(ports)
                    .into_iter()
                    .map(|spec| Service::Proto(protocol, spec)),
            );
        } else {
            aggregated.extend(ports.into_iter().map(|spec| Service::Proto(protocol, spec)));
        }
    }

    Ok(aggregated)
}

/// Groups pairs per service and merges services sharing a network grouping.
pub fn group_services(pairs: &PairIndex) -> Vec<GroupedRule> {
    let mut index = ServiceIndex::new();
    for ((source, destination), services) in pairs {
        for service in services {
            index
                .entry(*service)
                .or_default()
                .add_pair(*source, *destination);
        }
    }

    let mut signatures: BTreeMap<(Vec<Network>, Vec<Network>), Vec<Service>> = BTreeMap::new();
    for (service, relation) in &index {
        for (sources, destinations) in group_nets(relation).iter() {
            signatures
                .entry((sources.clone(), destinations.clone()))
                .or_default()
                .push(*service);
        }
    }

    signatures
        .into_iter()
        .map(|((sources, destinations), services)| GroupedRule {
            sources,
            destinations,
            services,
        })
        .collect()
}
