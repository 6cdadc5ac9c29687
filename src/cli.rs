use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::types::LogLevel;

#[derive(Parser, Debug)]
#[command(name = "foxwq-sgf-rs", version)]
#[command(about = "Incrementally archive FoxWQ game records as SGF files")]
#[command(args_conflicts_with_subcommands = true)]
#[command(after_long_help = r#"CONFIGURATION
    Credentials and directories are read from a TOML file, by default
    ~/.foxwq-sgf-rs/config.toml:

        srcuid = "12345678"
        token = "..."
        session = "..."
        directory = "~/go/foxwq"

    Command-line flags override the file.

ENVIRONMENT VARIABLES
    FOXWQ_TOKEN      Session token (instead of --token)
    FOXWQ_SESSION    Session key (instead of --session)
    RUST_LOG         Overrides --log-level
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Options for `sync`, accepted without the subcommand name
    #[command(flatten)]
    pub sync: SyncArgs,

    #[command(flatten)]
    pub global: GlobalArgs,
}

impl Cli {
    /// The command to run; plain invocation means `sync`.
    pub fn effective_command(self) -> Command {
        self.command.unwrap_or(Command::Sync(self.sync))
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download every record of a player not yet in the ledger (default)
    Sync(SyncArgs),
    /// Show the ledger for a player
    Status(StatusArgs),
    /// Delete a player's ledger so the next sync downloads everything again
    ResetLedger(ResetLedgerArgs),
    /// Rewrite existing SGF files through the normalizer
    FixKomi(FixKomiArgs),
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level
    #[arg(long, value_enum, default_value = "info", global = true)]
    pub log_level: LogLevel,

    /// Also write logs (without colors) to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// FoxWQ uid of the account performing the requests
    #[arg(long, global = true)]
    pub srcuid: Option<String>,

    /// Session token of that account.
    /// Prefer the FOXWQ_TOKEN environment variable over the flag.
    #[arg(long, env = "FOXWQ_TOKEN", hide_env_values = true, global = true)]
    pub token: Option<String>,

    /// Session key of that account
    #[arg(long, env = "FOXWQ_SESSION", hide_env_values = true, global = true)]
    pub session: Option<String>,

    /// Directory holding ledgers and run locks (default: ~/.foxwq-sgf-rs)
    #[arg(long, global = true)]
    pub state_directory: Option<String>,
}

/// Which player's archive to work on. Defaults to the account's own uid.
#[derive(Args, Debug, Clone, Default)]
pub struct PlayerArgs {
    /// Target player by FoxWQ uid
    #[arg(long, conflicts_with = "player_name")]
    pub player_id: Option<String>,

    /// Target player by nickname, resolved to a uid before the run
    #[arg(long)]
    pub player_name: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct SyncArgs {
    #[command(flatten)]
    pub player: PlayerArgs,

    /// Only consider the N most recent records (single listing call)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub recent: Option<u32>,

    /// Directory SGF files are saved to
    #[arg(short = 'd', long)]
    pub directory: Option<String>,

    /// Records requested per listing page (server default when omitted)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub page_size: Option<u32>,

    /// Max retries per request on transient failures (0 = no retries)
    #[arg(long, default_value_t = 3)]
    pub max_retries: u32,

    /// Base delay in seconds between retries
    #[arg(long, default_value_t = 2)]
    pub retry_delay: u64,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    /// Disable the progress spinner
    #[arg(long)]
    pub no_progress_bar: bool,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[command(flatten)]
    pub player: PlayerArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ResetLedgerArgs {
    #[command(flatten)]
    pub player: PlayerArgs,

    /// Skip the confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,
}

#[derive(Args, Debug, Clone)]
pub struct FixKomiArgs {
    /// Directory of SGF files to rewrite (default: the configured directory)
    #[arg(short = 'd', long)]
    pub directory: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("foxwq-sgf-rs").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_no_subcommand_is_sync() {
        let cli = parse(&["--player-id", "42", "--recent", "10", "-d", "/tmp/games"]);
        match cli.effective_command() {
            Command::Sync(args) => {
                assert_eq!(args.player.player_id.as_deref(), Some("42"));
                assert_eq!(args.recent, Some(10));
                assert_eq!(args.directory.as_deref(), Some("/tmp/games"));
                assert_eq!(args.max_retries, 3);
            }
            other => panic!("expected sync, got {other:?}"),
        }
    }

    #[test]
    fn test_explicit_sync_subcommand() {
        let cli = parse(&["sync", "--player-name", "honinbo", "--page-size", "50"]);
        match cli.effective_command() {
            Command::Sync(args) => {
                assert_eq!(args.player.player_name.as_deref(), Some("honinbo"));
                assert_eq!(args.page_size, Some(50));
                assert!(args.recent.is_none());
            }
            other => panic!("expected sync, got {other:?}"),
        }
    }

    #[test]
    fn test_player_flags_conflict() {
        let result = Cli::try_parse_from([
            "foxwq-sgf-rs",
            "--player-id",
            "1",
            "--player-name",
            "x",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_recent_zero_rejected() {
        assert!(Cli::try_parse_from(["foxwq-sgf-rs", "--recent", "0"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = parse(&["status", "--player-id", "7", "--log-level", "debug"]);
        assert_eq!(cli.global.log_level, LogLevel::Debug);
        assert!(matches!(cli.effective_command(), Command::Status(_)));
    }

    #[test]
    fn test_reset_ledger_and_fix_komi() {
        let cli = parse(&["reset-ledger", "--yes"]);
        match cli.effective_command() {
            Command::ResetLedger(args) => assert!(args.yes),
            other => panic!("expected reset-ledger, got {other:?}"),
        }

        let cli = parse(&["fix-komi", "-d", "games"]);
        match cli.effective_command() {
            Command::FixKomi(args) => assert_eq!(args.directory.as_deref(), Some("games")),
            other => panic!("expected fix-komi, got {other:?}"),
        }
    }
}
