//! Canonical IPv4 networks and CIDR aggregation
//!
//! [`Network`] wraps [`Ipv4Network`] and guarantees the stored address is the
//! network address (host bits cleared), so two networks describing the same
//! address block always compare equal.
//!
//! [`cidr_merge`] collapses a list of networks into the minimal list of
//! non-overlapping prefixes covering exactly the same addresses.
//!
//! # Example
//!
//! ```
//! use aclopt::core::network::{cidr_merge, Network};
//!
//! let merged = cidr_merge([
//!     "10.0.0.0/25".parse::<Network>().unwrap(),
//!     "10.0.0.128/25".parse().unwrap(),
//! ]);
//! assert_eq!(merged, vec!["10.0.0.0/24".parse::<Network>().unwrap()]);
//! ```

use super::error::RecordError;
use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// A canonical IPv4 network (address, prefix length).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Ipv4Network", into = "Ipv4Network")]
pub struct Network(Ipv4Network);

impl Network {
    /// The unrestricted network `0.0.0.0/0`.
    pub fn any() -> Self {
        Ipv4Network::new(Ipv4Addr::UNSPECIFIED, 0)
            .map(Self)
            .unwrap_or_else(|_| unreachable!("/0 is a valid prefix"))
    }

    /// Builds a network from an address and prefix length, clearing host bits.
    pub fn new(addr: Ipv4Addr, prefix: u8) -> Result<Self, RecordError> {
        let net = Ipv4Network::new(addr, prefix)
            .map_err(|e| RecordError::InvalidNetwork(format!("{addr}/{prefix}: {e}")))?;
        Ok(Self::canonical(net))
    }

    /// Builds a network from the `<address> <mask>` pair used by ACL records.
    ///
    /// The address may carry its own `/len`, in which case it must agree with
    /// the mask.
    pub fn from_addr_mask(addr: &str, mask: &str) -> Result<Self, RecordError> {
        let mask: Ipv4Addr = mask
            .parse()
            .map_err(|_| RecordError::InvalidNetwork(format!("bad mask '{mask}'")))?;
        let (ip, explicit_prefix) = match addr.split_once('/') {
            Some((ip, len)) => {
                let len: u8 = len
                    .parse()
                    .map_err(|_| RecordError::InvalidNetwork(format!("bad prefix in '{addr}'")))?;
                (ip, Some(len))
            }
            None => (addr, None),
        };
        let ip: Ipv4Addr = ip
            .parse()
            .map_err(|_| RecordError::InvalidNetwork(format!("bad address '{addr}'")))?;
        let net = Ipv4Network::with_netmask(ip, mask)
            .map_err(|e| RecordError::InvalidNetwork(format!("{addr} {mask}: {e}")))?;
        if let Some(len) = explicit_prefix
            && len != net.prefix()
        {
            return Err(RecordError::InvalidNetwork(format!(
                "prefix /{len} in '{addr}' disagrees with mask {mask}"
            )));
        }
        Ok(Self::canonical(net))
    }

    fn canonical(net: Ipv4Network) -> Self {
        // network() is always aligned to the prefix, so new() cannot fail here
        Self(Ipv4Network::new(net.network(), net.prefix()).unwrap_or(net))
    }

    pub fn addr(self) -> Ipv4Addr {
        self.0.network()
    }

    pub fn prefix(self) -> u8 {
        self.0.prefix()
    }

    pub fn mask(self) -> Ipv4Addr {
        self.0.mask()
    }

    /// First address of the block as an integer.
    pub fn first(self) -> u32 {
        u32::from(self.addr())
    }

    /// Last address of the block as an integer.
    pub fn last(self) -> u32 {
        u32::from(self.0.broadcast())
    }

    /// `true` if `other` is a subnet of (or equal to) `self`.
    pub fn contains(self, other: Network) -> bool {
        self.prefix() <= other.prefix() && self.0.contains(other.addr())
    }

    /// The enclosing prefix one bit shorter, `None` for `0.0.0.0/0`.
    pub fn parent(self) -> Option<Network> {
        let prefix = self.prefix().checked_sub(1)?;
        Network::new(self.addr(), prefix).ok()
    }

    /// `true` if both networks are the two halves of the same parent.
    pub fn is_sibling_of(self, other: Network) -> bool {
        self != other
            && self.prefix() == other.prefix()
            && self.parent().is_some()
            && self.parent() == other.parent()
    }

    pub fn is_any(self) -> bool {
        self.prefix() == 0
    }

    /// Renders as `<address> <mask>`, the form ACL records use.
    pub fn to_addr_mask(self) -> String {
        format!("{} {}", self.addr(), self.mask())
    }
}

impl From<Ipv4Network> for Network {
    fn from(net: Ipv4Network) -> Self {
        Self::canonical(net)
    }
}

impl From<Network> for Ipv4Network {
    fn from(net: Network) -> Self {
        net.0
    }
}

impl Ord for Network {
    fn cmp(&self, other: &Self) -> Ordering {
        self.first()
            .cmp(&other.first())
            .then(self.prefix().cmp(&other.prefix()))
    }
}

impl PartialOrd for Network {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr(), self.prefix())
    }
}

impl FromStr for Network {
    type Err = RecordError;

    /// Parses CIDR notation; a bare address is a /32.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let net: Ipv4Network = s
            .parse()
            .map_err(|e| RecordError::InvalidNetwork(format!("'{s}': {e}")))?;
        Ok(Self::canonical(net))
    }
}

/// Collapses networks into the minimal sorted list of covering prefixes.
///
/// Contained networks are discarded and sibling pairs are replaced by their
/// parent until no merge applies. The result covers exactly the input
/// addresses, and `cidr_merge(cidr_merge(x)) == cidr_merge(x)`.
pub fn cidr_merge<I>(networks: I) -> Vec<Network>
where
    I: IntoIterator<Item = Network>,
{
    let mut sorted: Vec<Network> = networks.into_iter().collect();
    sorted.sort_unstable();
    sorted.dedup();

    let mut merged: Vec<Network> = Vec::with_capacity(sorted.len());
    for net in sorted {
        if merged.last().is_some_and(|top| top.contains(net)) {
            continue;
        }
        merged.push(net);

        // A parent starts where its lower half starts, so it can only ever
        // combine with the element directly beneath it on the stack.
        while merged.len() >= 2 {
            let upper = merged[merged.len() - 1];
            let lower = merged[merged.len() - 2];
            match lower.parent() {
                Some(parent) if lower.is_sibling_of(upper) => {
                    merged.truncate(merged.len() - 2);
                    merged.push(parent);
                }
                _ => break,
            }
        }
    }
    merged
}
