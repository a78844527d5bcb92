use crate::core::error::{Error, Result};
use crate::core::optimizer::DEFAULT_MAX_PASSES;
use crate::core::policy::{Action, Peer};
use crate::utils::get_config_dir;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the configuration file inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Run configuration
///
/// Every field has a default, so a config file only needs to mention what it
/// changes. Command-line flags override the file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Collapse TCP/UDP port lists into ranges (`--nomerge` turns this off)
    #[serde(default = "default_true")]
    pub squeeze_ports: bool,
    /// Print comma-joined groups instead of one rule per line (`--group`)
    #[serde(default)]
    pub grouped_output: bool,
    /// Network completing 3-field records (`--src` / `--dst`)
    #[serde(default)]
    pub peer: Peer,
    /// Reported in JSON output (`--deny`)
    #[serde(default)]
    pub default_action: Action,
    /// Upper bound on optimizer passes
    ///
    /// Values below 1 are raised to 1.
    #[serde(default = "default_max_passes")]
    pub max_passes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            squeeze_ports: true,
            grouped_output: false,
            peer: Peer::default(),
            default_action: Action::default(),
            max_passes: DEFAULT_MAX_PASSES,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_passes() -> usize {
    DEFAULT_MAX_PASSES
}

impl Config {
    fn normalized(mut self) -> Self {
        self.max_passes = self.max_passes.max(1);
        self
    }
}

/// Parses a configuration document.
///
/// # Errors
///
/// Returns [`Error::Config`] if the JSON does not describe a [`Config`].
pub fn parse_config(json: &str) -> Result<Config> {
    serde_json::from_str::<Config>(json)
        .map(Config::normalized)
        .map_err(|e| Error::Config(e.to_string()))
}

/// Loads the configuration.
///
/// With an explicit `path`, any problem reading or parsing the file is an
/// error. Otherwise `config.json` in the user config directory is used when
/// present; if that file cannot be used a warning is logged and the defaults
/// apply.
///
/// # Errors
///
/// Returns [`Error::Config`] for an unusable explicit config file.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    if let Some(path) = path {
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        return parse_config(&json).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{}: {msg}", path.display())),
            other => other,
        });
    }

    let Some(mut path) = get_config_dir() else {
        return Ok(Config::default());
    };
    path.push(CONFIG_FILE_NAME);
    if !path.exists() {
        return Ok(Config::default());
    }

    match std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(e.to_string()))
        .and_then(|json| parse_config(&json))
    {
        Ok(config) => {
            tracing::debug!(path = %path.display(), "loaded config");
            Ok(config)
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), "ignoring config file: {e}");
            Ok(Config::default())
        }
    }
}
