//! Shared test utilities for core module tests
//!
//! Provides common test helpers to avoid duplication across test suites.
//! This module is only compiled in test mode.

use crate::config::Config;
use crate::core::ingest::{self, Ingested};
use crate::core::network::Network;
use crate::core::policy::Rule;
use crate::core::service::Service;

/// Parses a CIDR string, panicking on bad test input.
pub fn net(s: &str) -> Network {
    s.parse()
        .unwrap_or_else(|e| panic!("bad test network '{s}': {e}"))
}

/// Parses a service string, panicking on bad test input.
pub fn svc(s: &str) -> Service {
    s.parse()
        .unwrap_or_else(|e| panic!("bad test service '{s}': {e}"))
}

/// Creates a rule from CIDR and service strings.
///
/// # Example
///
/// ```ignore
/// let r = rule("10.0.0.0/24", "0.0.0.0/0", "tcp:80");
/// ```
pub fn rule(source: &str, destination: &str, service: &str) -> Rule {
    Rule::new(net(source), net(destination), svc(service))
}

/// Ingests policy text with the default configuration.
pub fn parse_policy(text: &str) -> Ingested {
    ingest::ingest(text, &Config::default())
        .unwrap_or_else(|e| panic!("test policy did not parse: {e}"))
}
