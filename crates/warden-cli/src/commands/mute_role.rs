// Mute role commands

use super::{community_or_default, update_community};
use clap::Subcommand;
use tracing::info;
use warden_core::{CommunityId, CommunityRepository, RoleId};

#[derive(Debug, Subcommand)]
pub enum MuteRoleCommand {
    /// Set the role given to muted members
    Set {
        /// Role id
        role: RoleId,
    },

    /// Remove the mute role; mutes in this community are skipped until one is set
    Clear,

    /// Show the current mute role
    Query,
}

/// Execute a mute role command against `community`
pub async fn run(
    repository: &dyn CommunityRepository,
    community: CommunityId,
    command: MuteRoleCommand,
) -> anyhow::Result<String> {
    match command {
        MuteRoleCommand::Set { role } => {
            update_community(repository, community, |config| config.mute_role = Some(role))
                .await?;
            info!(community = %community, role = %role, "Set mute role");
            Ok(format!("Set community {community}'s mute role to {role}"))
        }
        MuteRoleCommand::Clear => {
            update_community(repository, community, |config| config.mute_role = None).await?;
            info!(community = %community, "Cleared mute role");
            Ok(format!("Cleared community {community}'s mute role"))
        }
        MuteRoleCommand::Query => {
            let config = community_or_default(repository, community).await?;
            Ok(match config.mute_role {
                Some(role) => format!("Community {community}'s mute role is {role}"),
                None => format!("Community {community} doesn't have a mute role"),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support;

    #[tokio::test]
    async fn test_mute_role_round_trip_through_repository() {
        let repository = test_support::repository();
        let guild = CommunityId::new(8);

        run(
            &repository,
            guild,
            MuteRoleCommand::Set {
                role: RoleId::new(31),
            },
        )
        .await
        .unwrap();
        assert_eq!(
            run(&repository, guild, MuteRoleCommand::Query).await.unwrap(),
            "Community 8's mute role is 31"
        );

        run(&repository, guild, MuteRoleCommand::Clear).await.unwrap();
        assert_eq!(
            run(&repository, guild, MuteRoleCommand::Query).await.unwrap(),
            "Community 8 doesn't have a mute role"
        );
    }
}
