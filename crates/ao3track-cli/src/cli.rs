use std::path::PathBuf;

use ao3track::email::MessageLimit;
use clap::{Parser, Subcommand};

/// Tracks AO3 work updates from notification emails
#[derive(Parser, Debug)]
#[command(name = "ao3track")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Ingests AO3 notification emails over IMAP and tracks work updates", long_about = None)]
pub struct Args {
    /// Config file (default: ~/.ao3track/config.json)
    #[arg(short = 'c', long = "config", value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Read new notifications from the mailbox and record updates
    Ingest {
        /// Newest messages to consider: a positive number, or `all`
        #[arg(value_name = "LIMIT", allow_hyphen_values = true)]
        limit: Option<MessageLimit>,
    },

    /// Dump one candidate message and what extraction finds in it
    Inspect {
        /// 1-based position among the newest ten candidates
        #[arg(value_name = "N", default_value_t = 1)]
        n: usize,
    },

    /// Forget processed messages, or with --full erase everything
    Reset {
        /// Drop works, updates and the ingestion log too
        #[arg(long = "full")]
        full: bool,

        /// Do not ask for confirmation
        #[arg(short = 'y', long = "yes")]
        yes: bool,
    },

    /// List tracked works
    Works {
        /// Case-insensitive match on title or author
        #[arg(short = 's', long = "search")]
        search: Option<String>,

        #[arg(short = 'p', long = "page", default_value_t = 1)]
        page: u32,
    },

    /// Recent updates across all works
    Updates {
        /// Only updates not yet marked read
        #[arg(short = 'u', long = "unread")]
        unread: bool,

        #[arg(short = 'p', long = "page", default_value_t = 1)]
        page: u32,
    },

    /// Mark every update of a work as read
    MarkRead {
        #[arg(value_name = "AO3_ID")]
        ao3_id: String,
    },

    /// Statistics for one work
    Stats {
        #[arg(value_name = "AO3_ID")]
        ao3_id: String,
    },

    /// Recent ingestion runs
    Runs {
        #[arg(short = 'n', long = "limit", default_value_t = 10)]
        limit: u32,
    },
}

/// Parses command-line arguments
pub fn parse_args() -> Args {
    Args::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_limit_forms() {
        let args = Args::try_parse_from(["ao3track", "ingest", "25"]).unwrap();
        assert!(matches!(
            args.command,
            Command::Ingest {
                limit: Some(MessageLimit::Bounded(25))
            }
        ));

        let args = Args::try_parse_from(["ao3track", "ingest", "-1"]).unwrap();
        assert!(matches!(
            args.command,
            Command::Ingest {
                limit: Some(MessageLimit::Unbounded)
            }
        ));

        let args = Args::try_parse_from(["ao3track", "ingest"]).unwrap();
        assert!(matches!(args.command, Command::Ingest { limit: None }));

        assert!(Args::try_parse_from(["ao3track", "ingest", "0"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args =
            Args::try_parse_from(["ao3track", "works", "--search", "salt", "-v", "-c", "/tmp/c.json"])
                .unwrap();
        assert!(args.verbose);
        assert_eq!(args.config, Some(PathBuf::from("/tmp/c.json")));
        assert!(matches!(
            args.command,
            Command::Works { search: Some(ref s), page: 1 } if s == "salt"
        ));
    }

    #[test]
    fn test_reset_flags() {
        let args = Args::try_parse_from(["ao3track", "reset", "--full", "--yes"]).unwrap();
        assert!(matches!(
            args.command,
            Command::Reset {
                full: true,
                yes: true
            }
        ));
    }
}
