use super::ingest::RecordForm;
use thiserror::Error;

/// Core error type for aclopt
///
/// Every variant is fatal: the optimizer never skips a record, because a
/// silently dropped line would change the meaning of the produced policy.
#[derive(Debug, Error)]
pub enum Error {
    /// An input record could not be normalized
    #[error("line {line}: {source}\n    {record}")]
    Record {
        line: usize,
        record: String,
        #[source]
        source: RecordError,
    },

    /// A port specification reached the aggregator in an invalid state
    #[error("Invalid port: {0}")]
    InvalidPort(String),

    /// Configuration file could not be used
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Problems found while normalizing a single record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("expected 3 or 5 fields, found {0}")]
    FieldCount(usize),

    #[error("'{0}' is not allowed here")]
    DisallowedToken(String),

    #[error("record uses the {found} form but earlier records use the {expected} form")]
    ModeMismatch {
        expected: RecordForm,
        found: RecordForm,
    },

    #[error("invalid network: {0}")]
    InvalidNetwork(String),

    #[error("invalid port: {0}")]
    InvalidPort(String),

    #[error("unknown {kind} name '{name}'")]
    UnknownName { kind: NameKind, name: String },
}

/// Which symbol table an unknown name was looked up in
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum NameKind {
    #[strum(serialize = "protocol")]
    Protocol,
    #[strum(serialize = "port")]
    Port,
    #[strum(serialize = "ICMP type")]
    IcmpType,
}

/// Error taxonomy used for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ErrorKind {
    #[strum(serialize = "malformed record")]
    MalformedRecord,
    #[strum(serialize = "mode inconsistency")]
    ModeInconsistency,
    #[strum(serialize = "unknown symbolic name")]
    UnknownName,
    #[strum(serialize = "invalid port")]
    InvalidPort,
    #[strum(serialize = "environment")]
    Environment,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Record { source, .. } => match source {
                RecordError::ModeMismatch { .. } => ErrorKind::ModeInconsistency,
                RecordError::UnknownName { .. } => ErrorKind::UnknownName,
                RecordError::FieldCount(_)
                | RecordError::DisallowedToken(_)
                | RecordError::InvalidNetwork(_)
                | RecordError::InvalidPort(_) => ErrorKind::MalformedRecord,
            },
            Error::InvalidPort(_) => ErrorKind::InvalidPort,
            Error::Config(_) | Error::Io(_) | Error::Serialization(_) => ErrorKind::Environment,
        }
    }

    /// A one-line suggestion for the user, when there is an obvious fix.
    pub fn hint(&self) -> Option<&'static str> {
        let Error::Record { source, .. } = self else {
            return match self {
                Error::Config(_) => Some("Check the file passed with --config, or remove it"),
                _ => None,
            };
        };

        match source {
            RecordError::FieldCount(_) => Some(
                "Expected 'network mask proto:port' or \
                 'srcaddr srcmask dstaddr dstmask proto:port'",
            ),
            RecordError::DisallowedToken(token) if token == "host" => {
                Some("Expand 'host A.B.C.D' to 'A.B.C.D 255.255.255.255' before optimizing")
            }
            RecordError::DisallowedToken(_) => None,
            RecordError::ModeMismatch { .. } => {
                Some("All records in one input must use the same number of fields")
            }
            RecordError::InvalidNetwork(_) => {
                Some("Use 'A.B.C.D M.M.M.M' with a contiguous netmask, or 'any'")
            }
            RecordError::InvalidPort(_) => {
                Some("Ports must be within 0-65535 and ranges written low-high")
            }
            RecordError::UnknownName { .. } => {
                Some("Use the numeric value, or one of the ASA literal names")
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
