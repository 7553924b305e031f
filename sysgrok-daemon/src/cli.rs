//! CLI argument definitions for sysgrok-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// sysgrok telemetry collector daemon.
///
/// Receives syslog over UDP/TCP, classifies lines with grok parsers,
/// and publishes the resulting statistics to partitioned queue topics.
#[derive(Parser, Debug)]
#[command(name = "sysgrok-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to sysgrok.toml configuration file.
    #[arg(short, long, default_value = "/etc/sysgrok/sysgrok.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration file and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,

    /// Override PID file path (takes precedence over config file).
    #[arg(long)]
    pub pid_file: Option<String>,

    /// Load the configured parser directory, print the parser
    /// introspection as JSON and exit.
    #[arg(long, conflicts_with = "validate")]
    pub dump_parsers: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = DaemonCli::parse_from(["sysgrok-daemon"]);
        assert_eq!(cli.config, PathBuf::from("/etc/sysgrok/sysgrok.toml"));
        assert!(!cli.validate);
        assert!(!cli.dump_parsers);
        assert!(cli.log_level.is_none());
    }

    #[test]
    fn overrides() {
        let cli = DaemonCli::parse_from([
            "sysgrok-daemon",
            "-c",
            "/tmp/sysgrok.toml",
            "--log-level",
            "debug",
            "--log-format",
            "pretty",
            "--pid-file",
            "/run/sysgrok.pid",
            "--dump-parsers",
        ]);
        assert_eq!(cli.config, PathBuf::from("/tmp/sysgrok.toml"));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(cli.log_format.as_deref(), Some("pretty"));
        assert_eq!(cli.pid_file.as_deref(), Some("/run/sysgrok.pid"));
        assert!(cli.dump_parsers);
    }

    #[test]
    fn validate_conflicts_with_dump() {
        let result = DaemonCli::try_parse_from(["sysgrok-daemon", "--validate", "--dump-parsers"]);
        assert!(result.is_err());
    }
}
