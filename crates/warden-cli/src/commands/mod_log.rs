// Moderation log commands

use super::{community_or_default, update_community};
use clap::Subcommand;
use tracing::info;
use warden_core::{ChannelId, CommunityId, CommunityRepository};

#[derive(Debug, Subcommand)]
pub enum ModLogCommand {
    /// Set the channel that receives moderation audit messages
    Set {
        /// Channel id
        channel: ChannelId,
    },

    /// Remove the log channel, disabling audit messages
    Clear,

    /// Show the current log channel
    Query,
}

/// Execute a moderation log command against `community`
pub async fn run(
    repository: &dyn CommunityRepository,
    community: CommunityId,
    command: ModLogCommand,
) -> anyhow::Result<String> {
    match command {
        ModLogCommand::Set { channel } => {
            update_community(repository, community, |config| config.mod_log = Some(channel))
                .await?;
            info!(community = %community, channel = %channel, "Set moderation log");
            Ok(format!("Set community {community}'s log channel to {channel}"))
        }
        ModLogCommand::Clear => {
            update_community(repository, community, |config| config.mod_log = None).await?;
            info!(community = %community, "Cleared moderation log");
            Ok(format!("Cleared community {community}'s log channel"))
        }
        ModLogCommand::Query => {
            let config = community_or_default(repository, community).await?;
            Ok(match config.mod_log {
                Some(channel) => format!("Community {community}'s log channel is {channel}"),
                None => format!("Community {community} doesn't have a log channel"),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support;

    #[tokio::test]
    async fn test_clear_on_unconfigured_community_creates_blank_row() {
        let repository = test_support::repository();
        let guild = CommunityId::new(12);

        let reply = run(&repository, guild, ModLogCommand::Clear).await.unwrap();
        assert_eq!(reply, "Cleared community 12's log channel");
        let stored = repository.community(guild).await.unwrap().unwrap();
        assert_eq!(stored, warden_core::CommunityConfig::new(guild));

        run(
            &repository,
            guild,
            ModLogCommand::Set {
                channel: ChannelId::new(400),
            },
        )
        .await
        .unwrap();
        assert_eq!(
            run(&repository, guild, ModLogCommand::Query).await.unwrap(),
            "Community 12's log channel is 400"
        );
    }
}
