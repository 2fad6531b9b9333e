// Moderation network commands

use super::{community_or_default, update_community};
use anyhow::anyhow;
use clap::Subcommand;
use tracing::info;
use warden_core::{CommunityId, CommunityRepository, NetworkName};

#[derive(Debug, Subcommand)]
pub enum NetworkCommand {
    /// Join a new or existing moderation network
    Set {
        /// Network name
        name: String,
    },

    /// Leave the current network
    Clear,

    /// Show the current network
    Query,
}

/// Execute a network command against `community`
pub async fn run(
    repository: &dyn CommunityRepository,
    community: CommunityId,
    command: NetworkCommand,
) -> anyhow::Result<String> {
    match command {
        NetworkCommand::Set { name } => {
            let network = NetworkName::new(&name).ok_or_else(|| {
                anyhow!(
                    "network name must be between 1 and {} characters",
                    NetworkName::MAX_LEN
                )
            })?;
            let message =
                format!("Set community {community}'s moderation network to {network}");
            info!(community = %community, network = %network, "Setting moderation network");
            update_community(repository, community, |config| config.network = Some(network))
                .await?;
            Ok(message)
        }
        NetworkCommand::Clear => {
            update_community(repository, community, |config| config.network = None).await?;
            info!(community = %community, "Cleared moderation network");
            Ok(format!("Cleared community {community}'s moderation network"))
        }
        NetworkCommand::Query => {
            let config = community_or_default(repository, community).await?;
            Ok(match config.network {
                Some(network) => format!("Community {community} is in the {network} network"),
                None => format!("Community {community} isn't part of any moderation network"),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support;

    const GUILD: CommunityId = CommunityId::new(5);

    #[tokio::test]
    async fn test_set_query_clear() {
        let repository = test_support::repository();

        let reply = run(&repository, GUILD, NetworkCommand::Query).await.unwrap();
        assert_eq!(reply, "Community 5 isn't part of any moderation network");

        run(
            &repository,
            GUILD,
            NetworkCommand::Set {
                name: "  hub ".into(),
            },
        )
        .await
        .unwrap();
        let reply = run(&repository, GUILD, NetworkCommand::Query).await.unwrap();
        assert_eq!(reply, "Community 5 is in the hub network");
        assert_eq!(
            repository
                .communities_in_network(&NetworkName::new("hub").unwrap())
                .await
                .unwrap(),
            vec![GUILD]
        );

        run(&repository, GUILD, NetworkCommand::Clear).await.unwrap();
        let stored = repository.community(GUILD).await.unwrap().unwrap();
        assert_eq!(stored.network, None);
    }

    #[tokio::test]
    async fn test_set_keeps_other_settings() {
        let repository = test_support::repository();
        repository
            .save_community(
                &warden_core::CommunityConfig::new(GUILD)
                    .with_mute_role(warden_core::RoleId::new(77)),
            )
            .await
            .unwrap();

        run(&repository, GUILD, NetworkCommand::Set { name: "hub".into() })
            .await
            .unwrap();

        let stored = repository.community(GUILD).await.unwrap().unwrap();
        assert_eq!(stored.mute_role, Some(warden_core::RoleId::new(77)));
        assert_eq!(stored.network, NetworkName::new("hub"));
    }

    #[tokio::test]
    async fn test_blank_name_is_rejected() {
        let repository = test_support::repository();
        let result = run(&repository, GUILD, NetworkCommand::Set { name: "   ".into() }).await;
        assert!(result.is_err());
        assert!(repository.community(GUILD).await.unwrap().is_none());
    }
}
