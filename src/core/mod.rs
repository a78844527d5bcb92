//! Core policy optimization functionality
//!
//! This module contains the types and algorithms that turn a flat list of
//! permit triples into a minimal equivalent policy. It provides:
//!
//! - [`network`]: Canonical IPv4 networks and CIDR merging
//! - [`service`]: Protocols, port specifications and port squeezing
//! - [`names`]: Symbolic port and ICMP type names
//! - [`ingest`]: Record parsing and normalization
//! - [`policy`]: Rule and relation data structures
//! - [`grouping`]: Network pair grouping shared by the optimizer stages
//! - [`optimizer`]: Star-net collapse, redundancy filter, port aggregation
//!   and service grouping
//! - [`emit`]: Text and JSON rendering
//! - [`pipeline`]: Stage tracking for a whole run
//! - [`error`]: Error types for policy processing

pub mod emit;
pub mod error;
pub mod grouping;
pub mod ingest;
pub mod names;
pub mod network;
pub mod optimizer;
pub mod pipeline;
pub mod policy;
pub mod service;

#[cfg(test)]
pub mod test_helpers;
