//! Input validation for policy records
//!
//! Validators return `Result<_, String>` with a short human-readable reason;
//! the ingestion layer wraps the reason into a [`crate::core::error::RecordError`]
//! together with the offending line.

/// Highest valid TCP/UDP port.
pub const MAX_PORT: u32 = 65_535;

/// Highest valid ICMP message type.
pub const MAX_ICMP_TYPE: u32 = 255;

/// Longest record excerpt kept in diagnostics.
const MAX_RECORD_EXCERPT: usize = 120;

/// Validates a single port number.
///
/// # Errors
///
/// Returns `Err` if the port is above 65535.
pub fn validate_port(port: u32) -> Result<u16, String> {
    u16::try_from(port).map_err(|_| format!("port {port} is outside 0-{MAX_PORT}"))
}

/// Validates an inclusive port range.
///
/// # Errors
///
/// Returns `Err` if:
/// - Either bound is above 65535
/// - The low bound is greater than the high bound
pub fn validate_port_range(low: u32, high: u32) -> Result<(u16, u16), String> {
    let low = validate_port(low)?;
    let high = validate_port(high)?;

    if low > high {
        Err(format!("range {low}-{high} is reversed"))
    } else {
        Ok((low, high))
    }
}

/// Validates an ICMP message type.
///
/// # Errors
///
/// Returns `Err` if the type is above 255.
pub fn validate_icmp_type(value: u32) -> Result<u8, String> {
    u8::try_from(value).map_err(|_| format!("ICMP type {value} is outside 0-{MAX_ICMP_TYPE}"))
}

/// `true` for tokens that must have been expanded before optimization.
///
/// `host A.B.C.D` is expected to arrive as `A.B.C.D 255.255.255.255`.
pub fn is_disallowed_token(token: &str) -> bool {
    token.eq_ignore_ascii_case("host")
}

/// Parses a decimal field, rejecting signs and empty input.
///
/// # Errors
///
/// Returns `Err` if the field is not made of ASCII digits only.
pub fn parse_number(field: &str) -> Result<u32, String> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("'{field}' is not a number"));
    }
    field
        .parse()
        .map_err(|_| format!("'{field}' is too large"))
}

/// Makes a record safe to echo in a diagnostic.
///
/// Control characters are replaced by spaces and long records are cut with
/// an ellipsis.
pub fn sanitize_record(input: &str) -> String {
    let cleaned: String = input
        .trim()
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();

    if cleaned.chars().count() <= MAX_RECORD_EXCERPT {
        cleaned
    } else {
        let cut: String = cleaned.chars().take(MAX_RECORD_EXCERPT - 3).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_port_bounds() {
        assert_eq!(validate_port(0), Ok(0));
        assert_eq!(validate_port(22), Ok(22));
        assert_eq!(validate_port(65_535), Ok(65_535));
        assert!(validate_port(65_536).is_err());
    }

    #[test]
    fn test_validate_port_range() {
        assert_eq!(validate_port_range(80, 90), Ok((80, 90)));
        assert_eq!(validate_port_range(80, 80), Ok((80, 80)));
        assert!(validate_port_range(90, 80).unwrap_err().contains("reversed"));
        assert!(validate_port_range(1, 70_000).is_err());
    }

    #[test]
    fn test_validate_icmp_type() {
        assert_eq!(validate_icmp_type(8), Ok(8));
        assert!(validate_icmp_type(256).is_err());
    }

    #[test]
    fn test_disallowed_tokens() {
        assert!(is_disallowed_token("host"));
        assert!(is_disallowed_token("HOST"));
        assert!(!is_disallowed_token("hostname"));
        assert!(!is_disallowed_token("any"));
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("443"), Ok(443));
        assert!(parse_number("").is_err());
        assert!(parse_number("-5").is_err());
        assert!(parse_number("+5").is_err());
        assert!(parse_number("8o").is_err());
        assert!(parse_number("99999999999").is_err());
    }

    #[test]
    fn test_sanitize_record_strips_control_chars() {
        assert_eq!(sanitize_record("10.0.0.0\t255.0.0.0\x1b tcp"), "10.0.0.0 255.0.0.0  tcp");
    }

    #[test]
    fn test_sanitize_record_truncates() {
        let long = "1".repeat(500);
        let safe = sanitize_record(&long);
        assert_eq!(safe.chars().count(), MAX_RECORD_EXCERPT);
        assert!(safe.ends_with("..."));
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_validate_port_accepts_exactly_u16(port in 0u32..200_000) {
            let result = validate_port(port);
            if port <= MAX_PORT {
                prop_assert_eq!(result, Ok(u16::try_from(port).unwrap()));
            } else {
                prop_assert!(result.is_err());
            }
        }

        #[test]
        fn test_validate_port_range_ordering(low in 0u32..=65_535, high in 0u32..=65_535) {
            let result = validate_port_range(low, high);
            prop_assert_eq!(result.is_ok(), low <= high);
        }

        #[test]
        fn test_sanitize_record_never_exceeds_limit(input in "\\PC*") {
            let safe = sanitize_record(&input);
            prop_assert!(safe.chars().count() <= MAX_RECORD_EXCERPT);
            prop_assert!(!safe.chars().any(char::is_control));
        }
    }
}
