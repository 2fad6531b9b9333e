//! Warden administration CLI
//!
//! Edits the per-community settings the moderation engine reads (network,
//! mute role, moderation log channel) and lists persisted punishments.
//! Operates directly on the configured storage directory.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use warden_core::{CommunityId, PhysicalTimeEffects, WardenConfig};
use warden_effects::{FilesystemStorageHandler, RealTimeHandler, StorageCommunityRepository};

mod commands;

use commands::{ModLogCommand, MuteRoleCommand, NetworkCommand, PunishmentsCommand};

const CONFIG_FILE: &str = "warden/config.toml";

#[derive(Debug, Parser)]
#[command(name = "warden")]
#[command(about = "Warden - network moderation administration", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path (defaults to warden/config.toml in the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Moderation network a community belongs to
    Network {
        /// Community to administer
        #[arg(long)]
        community: CommunityId,

        #[command(subcommand)]
        command: NetworkCommand,
    },

    /// Role applied to muted members
    MuteRole {
        /// Community to administer
        #[arg(long)]
        community: CommunityId,

        #[command(subcommand)]
        command: MuteRoleCommand,
    },

    /// Channel receiving moderation audit messages
    ModLog {
        /// Community to administer
        #[arg(long)]
        community: CommunityId,

        #[command(subcommand)]
        command: ModLogCommand,
    },

    /// Inspect persisted punishments
    Punishments {
        #[command(subcommand)]
        command: PunishmentsCommand,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    init_tracing(&config, cli.verbose);

    let storage = FilesystemStorageHandler::new(&config.storage_dir)
        .with_context(|| format!("opening storage at {}", config.storage_dir.display()))?;
    let repository = StorageCommunityRepository::new(Arc::new(storage));

    let output = match cli.command {
        Commands::Network { community, command } => {
            commands::network::run(&repository, community, command).await?
        }
        Commands::MuteRole { community, command } => {
            commands::mute_role::run(&repository, community, command).await?
        }
        Commands::ModLog { community, command } => {
            commands::mod_log::run(&repository, community, command).await?
        }
        Commands::Punishments { command } => {
            let now = RealTimeHandler::new()
                .physical_time()
                .await
                .context("reading the system clock")?;
            commands::punishments::run(&repository, now, command).await?
        }
    };

    println!("{output}");
    Ok(())
}

/// Load, override from `WARDEN_*` variables, and validate.
///
/// An explicit path must exist; the default path is used only when present.
fn load_config(explicit: Option<&Path>) -> anyhow::Result<WardenConfig> {
    let mut config = match explicit {
        Some(path) => WardenConfig::load_from_file(path)?,
        None => match dirs::config_dir().map(|dir| dir.join(CONFIG_FILE)) {
            Some(path) if path.exists() => WardenConfig::load_from_file(&path)?,
            _ => WardenConfig::default(),
        },
    };
    config.merge_with_env()?;
    config.validate()?;
    Ok(config)
}

fn init_tracing(config: &WardenConfig, verbose: bool) {
    let fallback = if verbose {
        "debug"
    } else {
        config.log_filter.as_str()
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // Logs go to stderr so command output stays scriptable.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parses_nested_setting_commands() {
        let cli = Cli::try_parse_from([
            "warden",
            "network",
            "--community",
            "123",
            "set",
            "hub",
        ])
        .unwrap();
        match cli.command {
            Commands::Network {
                community,
                command: NetworkCommand::Set { name },
            } => {
                assert_eq!(community, CommunityId::new(123));
                assert_eq!(name, "hub");
            }
            other => panic!("unexpected command {other:?}"),
        }

        let cli = Cli::try_parse_from([
            "warden",
            "--verbose",
            "mute-role",
            "--community",
            "9",
            "query",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Commands::MuteRole {
                command: MuteRoleCommand::Query,
                ..
            }
        ));
    }

    #[test]
    fn test_rejects_non_numeric_ids() {
        let result = Cli::try_parse_from(["warden", "mod-log", "--community", "lobby", "clear"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_explicit_config_file_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "default_reason = \"Rule 1\"").unwrap();
        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.default_reason, "Rule 1");
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("absent.toml"))).is_err());
    }
}
