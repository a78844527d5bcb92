//! Protocols, port specifications and services
//!
//! A [`Service`] is either [`Service::Any`] (all protocols and ports, written
//! `*`) or a protocol with a [`PortSpec`]. Textual forms:
//!
//! | Text | Meaning |
//! |------|---------|
//! | `*` | any service |
//! | `tcp` | every TCP port |
//! | `tcp:80` / `tcp:http` | one port |
//! | `udp:5000-5010` | inclusive port range |
//! | `icmp:echo-reply` | one ICMP type |
//! | `50` / `esp` | bare IP protocol |
//!
//! [`squeeze_ports`] collapses a list of port specs into the minimal list of
//! contiguous runs.

use super::error::{NameKind, RecordError};
use super::names;
use crate::validators;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// IP protocol tag
///
/// Numeric input with a well-known name normalizes to the named variant, so
/// `6` and `tcp` are the same protocol. Ordering follows protocol number,
/// with `ip` first and unnamed numbers last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Protocol {
    /// Any IP protocol (ASA `ip`)
    Ip,
    Icmp,
    Igmp,
    Tcp,
    Udp,
    Gre,
    Esp,
    Ah,
    Icmp6,
    Eigrp,
    Ospf,
    Pim,
    Sctp,
    /// A protocol number without a well-known name
    Number(u8),
}

const KNOWN_PROTOCOLS: &[(Protocol, &str, u8)] = &[
    (Protocol::Icmp, "icmp", 1),
    (Protocol::Igmp, "igmp", 2),
    (Protocol::Tcp, "tcp", 6),
    (Protocol::Udp, "udp", 17),
    (Protocol::Gre, "gre", 47),
    (Protocol::Esp, "esp", 50),
    (Protocol::Ah, "ah", 51),
    (Protocol::Icmp6, "icmp6", 58),
    (Protocol::Eigrp, "eigrp", 88),
    (Protocol::Ospf, "ospf", 89),
    (Protocol::Pim, "pim", 103),
    (Protocol::Sctp, "sctp", 132),
];

/// What the value after `proto:` means for a protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortKind {
    /// Transport ports (0-65535)
    Ports,
    /// ICMP message types (0-255)
    IcmpTypes,
    /// The protocol takes no port
    None,
}

impl Protocol {
    pub fn from_number(number: u8) -> Self {
        KNOWN_PROTOCOLS
            .iter()
            .find(|(_, _, n)| *n == number)
            .map_or(Protocol::Number(number), |&(p, _, _)| p)
    }

    /// IP protocol number, `None` for [`Protocol::Ip`].
    pub fn number(self) -> Option<u8> {
        match self {
            Protocol::Ip => None,
            Protocol::Number(n) => Some(n),
            known => KNOWN_PROTOCOLS
                .iter()
                .find(|(p, _, _)| *p == known)
                .map(|&(_, _, n)| n),
        }
    }

    fn name(self) -> Option<&'static str> {
        match self {
            Protocol::Ip => Some("ip"),
            Protocol::Number(_) => None,
            known => KNOWN_PROTOCOLS
                .iter()
                .find(|(p, _, _)| *p == known)
                .map(|&(_, name, _)| name),
        }
    }

    pub const fn port_kind(self) -> PortKind {
        match self {
            Protocol::Tcp | Protocol::Udp | Protocol::Sctp => PortKind::Ports,
            Protocol::Icmp | Protocol::Icmp6 => PortKind::IcmpTypes,
            _ => PortKind::None,
        }
    }

    /// `true` if port lists of this protocol are collapsed into ranges.
    pub const fn is_squeezable(self) -> bool {
        matches!(self, Protocol::Tcp | Protocol::Udp)
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.name(), self.number()) {
            (Some(name), _) => f.write_str(name),
            (None, Some(n)) => write!(f, "{n}"),
            (None, None) => f.write_str("ip"),
        }
    }
}

impl FromStr for Protocol {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("ip") {
            return Ok(Protocol::Ip);
        }
        if s.bytes().all(|b| b.is_ascii_digit()) && !s.is_empty() {
            let number = validators::parse_number(s)
                .ok()
                .and_then(|n| u8::try_from(n).ok())
                .ok_or_else(|| {
                    RecordError::InvalidPort(format!("protocol number {s} is outside 0-255"))
                })?;
            return Ok(Protocol::from_number(number));
        }
        KNOWN_PROTOCOLS
            .iter()
            .find(|(_, name, _)| name.eq_ignore_ascii_case(s))
            .map(|&(p, _, _)| p)
            .ok_or_else(|| RecordError::UnknownName {
                kind: NameKind::Protocol,
                name: s.to_string(),
            })
    }
}

/// Port part of a service
///
/// Construct ranges through [`PortSpec::range`], which validates and
/// normalizes; the variants stay public so specs can be matched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortSpec {
    /// Every port of the protocol
    Any,
    Single(u16),
    /// Inclusive range, `low < high`
    Range(u16, u16),
}

impl PortSpec {
    /// Builds a validated range; `low == high` becomes [`PortSpec::Single`].
    ///
    /// # Errors
    ///
    /// Returns `Err` if `low > high`.
    pub fn range(low: u16, high: u16) -> Result<Self, String> {
        match low.cmp(&high) {
            Ordering::Less => Ok(PortSpec::Range(low, high)),
            Ordering::Equal => Ok(PortSpec::Single(low)),
            Ordering::Greater => Err(format!("range {low}-{high} is reversed")),
        }
    }

    /// Re-checks a spec that may have been built from the raw variants.
    ///
    /// # Errors
    ///
    /// Returns `Err` for a reversed range.
    pub fn validate(self) -> Result<Self, String> {
        match self {
            PortSpec::Range(low, high) => PortSpec::range(low, high),
            other => Ok(other),
        }
    }

    /// Inclusive bounds, `None` for [`PortSpec::Any`].
    pub fn bounds(self) -> Option<(u16, u16)> {
        match self {
            PortSpec::Any => None,
            PortSpec::Single(p) => Some((p, p)),
            PortSpec::Range(low, high) => Some((low, high)),
        }
    }

    pub fn is_any(self) -> bool {
        self == PortSpec::Any
    }

    /// Parses the value after `proto:` for the given protocol.
    fn parse_for(protocol: Protocol, value: &str) -> Result<Self, RecordError> {
        match protocol.port_kind() {
            PortKind::None => Err(RecordError::InvalidPort(format!(
                "protocol {protocol} does not take a port ('{value}')"
            ))),
            PortKind::IcmpTypes => {
                let number = match validators::parse_number(value) {
                    Ok(n) => validators::validate_icmp_type(n).map_err(RecordError::InvalidPort)?,
                    Err(_) if value.bytes().all(|b| b.is_ascii_digit() || b == b'-') => {
                        return Err(RecordError::InvalidPort(format!(
                            "'{value}' is not a single ICMP type"
                        )));
                    }
                    Err(_) => names::icmp_type(value).ok_or_else(|| RecordError::UnknownName {
                        kind: NameKind::IcmpType,
                        name: value.to_string(),
                    })?,
                };
                Ok(PortSpec::Single(u16::from(number)))
            }
            PortKind::Ports => {
                // Literal names can contain '-' (ftp-data), so they win over
                // the range reading.
                if let Some(port) = names::port_number(value) {
                    return Ok(PortSpec::Single(port));
                }
                match value.split_once('-') {
                    Some((low, high)) => {
                        let (low, high) =
                            validators::validate_port_range(port_value(low)?, port_value(high)?)
                                .map_err(RecordError::InvalidPort)?;
                        PortSpec::range(low, high).map_err(RecordError::InvalidPort)
                    }
                    None => {
                        let port = validators::validate_port(port_value(value)?)
                            .map_err(RecordError::InvalidPort)?;
                        Ok(PortSpec::Single(port))
                    }
                }
            }
        }
    }
}

/// A numeric port or a port literal, as an unchecked `u32`.
fn port_value(field: &str) -> Result<u32, RecordError> {
    if let Ok(n) = validators::parse_number(field) {
        return Ok(n);
    }
    if field.is_empty() || field.starts_with(['+', '-']) || field.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(RecordError::InvalidPort(format!("'{field}' is not a port")));
    }
    names::port_number(field)
        .map(u32::from)
        .ok_or_else(|| RecordError::UnknownName {
            kind: NameKind::Port,
            name: field.to_string(),
        })
}

impl Ord for PortSpec {
    fn cmp(&self, other: &Self) -> Ordering {
        self.bounds().cmp(&other.bounds())
    }
}

impl PartialOrd for PortSpec {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortSpec::Any => Ok(()),
            PortSpec::Single(p) => write!(f, "{p}"),
            PortSpec::Range(low, high) => write!(f, "{low}-{high}"),
        }
    }
}

/// A permitted service
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Service {
    /// All protocols and ports (`*`)
    Any,
    Proto(Protocol, PortSpec),
}

impl Service {
    pub fn is_any(self) -> bool {
        self == Service::Any
    }

    pub fn protocol(self) -> Option<Protocol> {
        match self {
            Service::Any => None,
            Service::Proto(protocol, _) => Some(protocol),
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Service::Any => f.write_str("*"),
            Service::Proto(protocol, PortSpec::Any) => write!(f, "{protocol}"),
            Service::Proto(protocol, ports) => write!(f, "{protocol}:{ports}"),
        }
    }
}

impl FromStr for Service {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "*" {
            return Ok(Service::Any);
        }
        let (protocol, ports) = match s.split_once(':') {
            Some((protocol, ports)) => (protocol, Some(ports)),
            None => (s, None),
        };
        let protocol: Protocol = protocol.parse()?;
        let ports = match ports {
            Some(value) => PortSpec::parse_for(protocol, value)?,
            None => PortSpec::Any,
        };
        Ok(Service::Proto(protocol, ports))
    }
}

impl From<Service> for String {
    fn from(service: Service) -> Self {
        service.to_string()
    }
}

impl TryFrom<String> for Service {
    type Error = RecordError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Collapses port specs into maximal runs of consecutive ports.
///
/// Every spec stands for its set of port numbers; the union is emitted as
/// sorted runs, single-port runs as [`PortSpec::Single`]. [`PortSpec::Any`]
/// entries are ignored, and ranges are expected to be valid already.
pub fn squeeze_ports<I>(ports: I) -> Vec<PortSpec>
where
    I: IntoIterator<Item = PortSpec>,
{
    let mut intervals: Vec<(u32, u32)> = ports
        .into_iter()
        .filter_map(PortSpec::bounds)
        .map(|(low, high)| (u32::from(low), u32::from(high)))
        .collect();
    intervals.sort_unstable();

    let mut runs: Vec<(u32, u32)> = Vec::with_capacity(intervals.len());
    for (low, high) in intervals {
        match runs.last_mut() {
            // a run ends where the next port is not exactly one greater
            Some((_, end)) if low <= *end + 1 => *end = (*end).max(high),
            _ => runs.push((low, high)),
        }
    }

    runs.into_iter()
        .filter_map(|(low, high)| {
            let low = u16::try_from(low).ok()?;
            let high = u16::try_from(high).ok()?;
            PortSpec::range(low, high).ok()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(s: &str) -> Service {
        s.parse().unwrap()
    }

    fn squeeze_strs(ports: &[PortSpec]) -> Vec<String> {
        squeeze_ports(ports.iter().copied())
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn test_parse_any() {
        assert_eq!(service("*"), Service::Any);
        assert_eq!(Service::Any.to_string(), "*");
    }

    #[test]
    fn test_parse_bare_protocol() {
        assert_eq!(service("tcp"), Service::Proto(Protocol::Tcp, PortSpec::Any));
        assert_eq!(service("gre").to_string(), "gre");
        assert_eq!(service("ip"), Service::Proto(Protocol::Ip, PortSpec::Any));
    }

    #[test]
    fn test_protocol_numbers_normalize() {
        assert_eq!(service("6"), service("tcp"));
        assert_eq!(service("97"), Service::Proto(Protocol::Number(97), PortSpec::Any));
        assert_eq!(service("97").to_string(), "97");
        assert!("256".parse::<Service>().is_err());
    }

    #[test]
    fn test_parse_ports() {
        assert_eq!(service("tcp:80"), Service::Proto(Protocol::Tcp, PortSpec::Single(80)));
        assert_eq!(
            service("udp:5000-5010"),
            Service::Proto(Protocol::Udp, PortSpec::Range(5000, 5010))
        );
        assert_eq!(service("tcp:80-80").to_string(), "tcp:80");
        assert_eq!(service("TCP:HTTPS").to_string(), "tcp:443");
    }

    #[test]
    fn test_parse_named_port_with_dash() {
        assert_eq!(service("tcp:ftp-data").to_string(), "tcp:20");
        assert_eq!(service("tcp:ftp-telnet").to_string(), "tcp:21-23");
    }

    #[test]
    fn test_parse_icmp_types() {
        assert_eq!(service("icmp:echo-reply").to_string(), "icmp:0");
        assert_eq!(service("icmp:8").to_string(), "icmp:8");
        assert!(matches!(
            "icmp:300".parse::<Service>(),
            Err(RecordError::InvalidPort(_))
        ));
        assert!(matches!(
            "icmp:0-8".parse::<Service>(),
            Err(RecordError::InvalidPort(_))
        ));
    }

    #[test]
    fn test_rejects_bad_ports() {
        for bad in ["tcp:70000", "tcp:90-80", "tcp:-5", "tcp:", "tcp:80-", "gre:5"] {
            assert!(
                matches!(bad.parse::<Service>(), Err(RecordError::InvalidPort(_))),
                "{bad} should be an invalid port"
            );
        }
    }

    #[test]
    fn test_unknown_names() {
        assert_eq!(
            "tcp:gopherz".parse::<Service>(),
            Err(RecordError::UnknownName {
                kind: NameKind::Port,
                name: "gopherz".into()
            })
        );
        assert!(matches!(
            "carrier-pigeon:1".parse::<Service>(),
            Err(RecordError::UnknownName {
                kind: NameKind::Protocol,
                ..
            })
        ));
        assert!(matches!(
            "icmp:ping".parse::<Service>(),
            Err(RecordError::UnknownName {
                kind: NameKind::IcmpType,
                ..
            })
        ));
    }

    #[test]
    fn test_service_ordering() {
        let mut services = vec![service("udp:53"), service("tcp:443"), Service::Any, service("tcp:22")];
        services.sort();
        let text: Vec<String> = services.iter().map(ToString::to_string).collect();
        assert_eq!(text, ["*", "tcp:22", "tcp:443", "udp:53"]);
    }

    #[test]
    fn test_squeeze_runs() {
        let ports = [80, 81, 82, 84].map(PortSpec::Single);
        assert_eq!(squeeze_strs(&ports), ["80-82", "84"]);
    }

    #[test]
    fn test_squeeze_single() {
        assert_eq!(squeeze_strs(&[PortSpec::Single(22)]), ["22"]);
    }

    #[test]
    fn test_squeeze_expands_ranges() {
        let ports = [
            PortSpec::Range(1000, 1005),
            PortSpec::Single(1006),
            PortSpec::Range(1002, 1003),
            PortSpec::Single(999),
            PortSpec::Single(2000),
        ];
        assert_eq!(squeeze_strs(&ports), ["999-1006", "2000"]);
    }

    #[test]
    fn test_squeeze_deduplicates_and_handles_extremes() {
        let ports = [
            PortSpec::Single(65_535),
            PortSpec::Single(65_534),
            PortSpec::Single(0),
            PortSpec::Single(0),
        ];
        assert_eq!(squeeze_strs(&ports), ["0", "65534-65535"]);
    }

    #[test]
    fn test_squeeze_ignores_any() {
        assert!(squeeze_ports([PortSpec::Any]).is_empty());
    }

    #[test]
    fn test_validate_catches_raw_reversed_range() {
        assert!(PortSpec::Range(90, 80).validate().is_err());
        assert_eq!(PortSpec::Range(80, 80).validate(), Ok(PortSpec::Single(80)));
    }

    #[test]
    fn test_serde_roundtrip_as_string() {
        let json = serde_json::to_string(&service("udp:53")).unwrap();
        assert_eq!(json, "\"udp:53\"");
        let back: Service = serde_json::from_str("\"tcp:ssh\"").unwrap();
        assert_eq!(back, service("tcp:22"));
    }
}
