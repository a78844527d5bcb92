//! aclopt - firewall ACL policy optimizer
//!
//! Reads a flat list of permit triples (source network, destination network,
//! service) and produces an equivalent, smaller policy.
//!
//! # Architecture
//!
//! - [`core`] - Parsing, optimization stages and rendering
//! - [`validators`] - Input validation and sanitization
//! - [`config`] - Configuration loading
//! - [`utils`] - Utility functions (XDG directories, atomic writes)
//!
//! # Guarantees
//!
//! - The output permits exactly the traffic the input permits
//! - Input order does not affect the output
//! - Optimizing an optimized policy changes nothing
//! - Any bad record aborts the run; nothing is skipped
//!
//! # Example
//!
//! ```
//! use aclopt::config::Config;
//! use aclopt::core::emit::OutputFormat;
//! use aclopt::core::pipeline::Pipeline;
//!
//! let config = Config::default();
//! let out = Pipeline::new(&config, OutputFormat::Text)
//!     .run("10.0.0.0 255.255.255.128 tcp:22\n10.0.0.128 255.255.255.128 tcp:22\n")
//!     .unwrap();
//! assert_eq!(out, "10.0.0.0 255.255.255.0 tcp:22\n");
//! ```

// Allow pedantic clippy warnings that are not worth fixing for this codebase
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::needless_lifetimes)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]

pub mod config;
pub mod core;
pub mod utils;
pub mod validators;

// Re-export commonly used types
pub use crate::core::error::{Error, Result};
pub use crate::core::network::Network;
pub use crate::core::optimizer::{OptimizerOptions, optimize};
pub use crate::core::policy::{OptimizedPolicy, Rule};
pub use crate::core::service::Service;
