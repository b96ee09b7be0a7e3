use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// printwatch — printer fleet monitoring and alerting
///
/// Polls network printers over SNMP, evaluates alert rules against what
/// they report, and notifies operators over the configured channels.
#[derive(Parser, Debug)]
#[command(name = "printwatch")]
#[command(version, about, long_about)]
pub struct Cli {
    /// Subcommand to execute; defaults to the daemon
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to custom config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full scheduler until interrupted
    #[command(alias = "d")]
    Daemon,

    /// Poll the fleet once and print the outcome
    #[command(alias = "p")]
    Poll,

    /// Sweep the configured network for unregistered printers
    #[command(alias = "disc")]
    Discover,

    /// Show the current status of every device
    #[command(alias = "s")]
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List recent alerts, or act on one
    #[command(alias = "a")]
    Alerts {
        /// Acknowledge the alert with this id
        #[arg(long, conflicts_with_all = ["resolve", "close"])]
        ack: Option<i64>,

        /// Resolve the alert with this id
        #[arg(long)]
        resolve: Option<i64>,

        /// Close the alert with this id without resolution
        #[arg(long, conflicts_with = "resolve")]
        close: Option<i64>,

        /// Resolution notes, with --resolve
        #[arg(long, requires = "resolve")]
        notes: Option<String>,

        /// How many recent alerts to list
        #[arg(long, default_value = "20")]
        limit: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_daemon_command() {
        let cli = Cli::try_parse_from(["printwatch", "daemon"]).unwrap_or_else(|e| panic!("{e}"));
        assert!(matches!(cli.command, Some(Commands::Daemon)));
    }

    #[test]
    fn no_command_returns_none() {
        let cli = Cli::try_parse_from(["printwatch"]).unwrap_or_else(|e| panic!("{e}"));
        assert!(cli.command.is_none());
    }

    #[test]
    fn parse_status_with_json() {
        let cli = Cli::try_parse_from(["printwatch", "status", "--json"])
            .unwrap_or_else(|e| panic!("{e}"));
        assert!(matches!(cli.command, Some(Commands::Status { json: true })));
    }

    #[test]
    fn parse_status_alias() {
        let cli = Cli::try_parse_from(["printwatch", "s"]).unwrap_or_else(|e| panic!("{e}"));
        assert!(matches!(cli.command, Some(Commands::Status { json: false })));
    }

    #[test]
    fn parse_global_config() {
        let cli = Cli::try_parse_from(["printwatch", "--config", "/tmp/test.toml", "poll"])
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(cli.config, Some(std::path::PathBuf::from("/tmp/test.toml")));
        assert!(matches!(cli.command, Some(Commands::Poll)));
    }

    #[test]
    fn parse_global_verbose() {
        let cli = Cli::try_parse_from(["printwatch", "--verbose", "discover"])
            .unwrap_or_else(|e| panic!("{e}"));
        assert!(cli.verbose);
        assert!(matches!(cli.command, Some(Commands::Discover)));
    }

    #[test]
    fn parse_alerts_listing_defaults() {
        let cli = Cli::try_parse_from(["printwatch", "alerts"]).unwrap_or_else(|e| panic!("{e}"));
        match cli.command {
            Some(Commands::Alerts {
                ack, resolve, close, notes, limit,
            }) => {
                assert!(ack.is_none());
                assert!(resolve.is_none());
                assert!(close.is_none());
                assert!(notes.is_none());
                assert_eq!(limit, 20);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parse_alerts_resolve_with_notes() {
        let cli = Cli::try_parse_from([
            "printwatch", "alerts", "--resolve", "7", "--notes", "replaced toner",
        ])
        .unwrap_or_else(|e| panic!("{e}"));
        match cli.command {
            Some(Commands::Alerts { resolve, notes, .. }) => {
                assert_eq!(resolve, Some(7));
                assert_eq!(notes.as_deref(), Some("replaced toner"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn ack_and_resolve_conflict() {
        assert!(Cli::try_parse_from(["printwatch", "alerts", "--ack", "1", "--resolve", "2"])
            .is_err());
    }

    #[test]
    fn notes_require_resolve() {
        assert!(Cli::try_parse_from(["printwatch", "alerts", "--notes", "done"]).is_err());
    }
}
