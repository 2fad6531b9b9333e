//! Per-community configuration row

use crate::identifiers::{ChannelId, CommunityId, NetworkName, RoleId};
use serde::{Deserialize, Serialize};

/// Configuration of one community, owned by the community repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunityConfig {
    /// Community this row configures
    pub id: CommunityId,
    /// Moderation network the community belongs to, if any
    pub network: Option<NetworkName>,
    /// Role applied to muted members; mutes are skipped without one
    pub mute_role: Option<RoleId>,
    /// Channel that receives moderation audit messages
    pub mod_log: Option<ChannelId>,
}

impl CommunityConfig {
    /// An unconfigured community
    pub fn new(id: CommunityId) -> Self {
        Self {
            id,
            network: None,
            mute_role: None,
            mod_log: None,
        }
    }

    /// Builder-style network assignment
    pub fn with_network(mut self, network: NetworkName) -> Self {
        self.network = Some(network);
        self
    }

    /// Builder-style mute role assignment
    pub fn with_mute_role(mut self, role: RoleId) -> Self {
        self.mute_role = Some(role);
        self
    }

    /// Builder-style moderation log assignment
    pub fn with_mod_log(mut self, channel: ChannelId) -> Self {
        self.mod_log = Some(channel);
        self
    }
}
