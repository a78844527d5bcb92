//! aclopt - firewall ACL policy optimizer
//!
//! Reads normalized ACL records from a file or stdin and prints an equivalent
//! minimal policy.
//!
//! # Usage
//!
//! ```bash
//! aclopt policy.txt                        # flat output, ports merged
//! aclopt --group policy.txt                # comma-joined groups
//! aclopt --nomerge < policy.txt            # keep ports as listed
//! aclopt --src 10.1.0.0/16 dmz.txt         # 3-field records are destinations
//! aclopt --format json -o out.json in.txt  # JSON, written atomically
//! ```

use aclopt::Network;
use aclopt::config::{self, Config};
use aclopt::core::emit::OutputFormat;
use aclopt::core::pipeline::Pipeline;
use aclopt::core::policy::{Action, Peer};
use aclopt::utils::write_atomic;
use clap::{ArgAction, Parser};
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;

#[derive(Parser)]
#[command(name = "aclopt")]
#[command(about = "Firewall ACL optimizer - merges networks and ports, drops redundant rules", long_about = None)]
struct Cli {
    /// Policy file to read (stdin when omitted)
    input: Option<PathBuf>,

    /// Print grouped rules with comma-joined networks and services
    #[arg(long)]
    group: bool,

    /// Do not merge TCP/UDP ports into ranges
    #[arg(long)]
    nomerge: bool,

    /// 3-field records are destinations reached from NET
    #[arg(long, value_name = "NET", conflicts_with = "dst")]
    src: Option<Network>,

    /// 3-field records are sources reaching NET (default: 0.0.0.0/0)
    #[arg(long, value_name = "NET")]
    dst: Option<Network>,

    /// Mark the policy as deny instead of permit (JSON output)
    #[arg(long)]
    deny: bool,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    /// Write the result to PATH instead of stdout
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Read settings from PATH instead of the user config directory
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log more (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    /// Applies command-line overrides on top of the loaded config.
    fn apply_to(&self, mut config: Config) -> Config {
        if self.group {
            config.grouped_output = true;
        }
        if self.nomerge {
            config.squeeze_ports = false;
        }
        if let Some(network) = self.src {
            config.peer = Peer::source(network);
        } else if let Some(network) = self.dst {
            config.peer = Peer::destination(network);
        }
        if self.deny {
            config.default_action = Action::Deny;
        }
        config
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            if let Some(hint) = e.hint() {
                eprintln!("Hint: {hint}");
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> aclopt::Result<()> {
    let config = cli.apply_to(config::load_config(cli.config.as_deref())?);
    tracing::debug!(?config, "effective configuration");

    let input = match &cli.input {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let rendered = Pipeline::new(&config, cli.format).run(&input)?;

    match &cli.output {
        Some(path) => write_atomic(path, &rendered)?,
        None => print!("{rendered}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use aclopt::core::policy::PeerSide;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("aclopt").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_flags_override_config() {
        let cli = parse(&["--group", "--nomerge", "--deny", "--src", "10.1.0.0/16"]);
        let config = cli.apply_to(Config::default());
        assert!(config.grouped_output);
        assert!(!config.squeeze_ports);
        assert_eq!(config.default_action, Action::Deny);
        assert_eq!(config.peer.side, PeerSide::Source);
        assert_eq!(config.peer.network.to_string(), "10.1.0.0/16");
    }

    #[test]
    fn test_defaults_keep_config() {
        let file_config = Config {
            grouped_output: true,
            ..Config::default()
        };
        let config = parse(&[]).apply_to(file_config.clone());
        assert_eq!(config, file_config);
    }

    #[test]
    fn test_src_and_dst_conflict() {
        assert!(
            Cli::try_parse_from(["aclopt", "--src", "10.0.0.0/8", "--dst", "10.0.0.0/8"]).is_err()
        );
    }

    #[test]
    fn test_format_flag() {
        assert_eq!(parse(&["--format", "json"]).format, OutputFormat::Json);
        assert!(Cli::try_parse_from(["aclopt", "--format", "xml"]).is_err());
    }
}
