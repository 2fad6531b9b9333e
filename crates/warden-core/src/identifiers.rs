//! Platform identifier types
//!
//! The chat platform hands out 64-bit snowflake identifiers for users,
//! communities, roles and channels. Each gets its own newtype so a role id can
//! never be passed where a community id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

macro_rules! snowflake_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Wrap a raw platform snowflake
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// Get the raw platform snowflake
            pub const fn get(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse::<u64>().map(Self)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }
    };
}

snowflake_id!(
    /// A platform user: the subject of a punishment, or the moderator issuing it
    UserId
);

snowflake_id!(
    /// A community (guild/server) on the platform
    CommunityId
);

snowflake_id!(
    /// A role inside a community
    RoleId
);

snowflake_id!(
    /// A text channel inside a community, used as the moderation log target
    ChannelId
);

/// Name of a moderation network
///
/// Communities that share a network name mirror each other's bans and mutes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkName(String);

impl NetworkName {
    /// Maximum accepted length, matching the width of the persisted column
    pub const MAX_LEN: usize = 50;

    /// Create a network name, trimming surrounding whitespace.
    ///
    /// Returns `None` for empty or over-long names.
    pub fn new(name: impl AsRef<str>) -> Option<Self> {
        let trimmed = name.as_ref().trim();
        if trimmed.is_empty() || trimmed.chars().count() > Self::MAX_LEN {
            return None;
        }
        Some(Self(trimmed.to_string()))
    }

    /// Borrow the name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NetworkName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
