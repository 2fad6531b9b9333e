//! Punishment model
//!
//! A `Punishment` is one active restriction of one subject in one community.
//! Network-wide actions produce one punishment per community they reached.

use crate::identifiers::{CommunityId, RoleId, UserId};
use crate::time::PhysicalTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a tracked punishment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PunishmentKind {
    /// Subject is banned from the community
    Ban,
    /// Subject holds the community's mute role in place of their usual roles
    Mute,
}

impl PunishmentKind {
    /// Lowercase name used in keys, topics and log fields
    pub fn as_str(&self) -> &'static str {
        match self {
            PunishmentKind::Ban => "ban",
            PunishmentKind::Mute => "mute",
        }
    }

    /// Past-tense adjective for user-facing text ("banned", "muted")
    pub fn past_tense(&self) -> &'static str {
        match self {
            PunishmentKind::Ban => "banned",
            PunishmentKind::Mute => "muted",
        }
    }
}

impl fmt::Display for PunishmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific data of a punishment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Sanction {
    /// A ban carries no extra state
    Ban,
    /// A mute remembers the roles to restore on unmute, in platform order
    Mute {
        /// Roles held immediately before the mute role was applied
        saved_roles: Vec<RoleId>,
    },
}

/// Identity of an active punishment: at most one exists per key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PunishmentKey {
    /// Punishment kind
    pub kind: PunishmentKind,
    /// Punished user
    pub subject: UserId,
    /// Community the punishment applies to
    pub community: CommunityId,
}

impl PunishmentKey {
    /// Create a key
    pub fn new(kind: PunishmentKind, subject: UserId, community: CommunityId) -> Self {
        Self {
            kind,
            subject,
            community,
        }
    }
}

impl fmt::Display for PunishmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}@{}", self.kind, self.subject, self.community)
    }
}

/// An active punishment of one subject in one community
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Punishment {
    /// Punished user
    pub subject: UserId,
    /// Community the punishment applies to
    pub community: CommunityId,
    /// Moderator-supplied reason
    pub reason: String,
    /// When the punishment lapses, if temporary
    pub expires_at: Option<PhysicalTime>,
    /// Kind-specific state
    pub sanction: Sanction,
}

impl Punishment {
    /// Create a ban record
    pub fn ban(
        subject: UserId,
        community: CommunityId,
        reason: impl Into<String>,
        expires_at: Option<PhysicalTime>,
    ) -> Self {
        Self {
            subject,
            community,
            reason: reason.into(),
            expires_at,
            sanction: Sanction::Ban,
        }
    }

    /// Create a mute record with the role snapshot taken before muting
    pub fn mute(
        subject: UserId,
        community: CommunityId,
        reason: impl Into<String>,
        expires_at: Option<PhysicalTime>,
        saved_roles: Vec<RoleId>,
    ) -> Self {
        Self {
            subject,
            community,
            reason: reason.into(),
            expires_at,
            sanction: Sanction::Mute { saved_roles },
        }
    }

    /// Kind of this punishment
    pub fn kind(&self) -> PunishmentKind {
        match self.sanction {
            Sanction::Ban => PunishmentKind::Ban,
            Sanction::Mute { .. } => PunishmentKind::Mute,
        }
    }

    /// Registry / storage key of this punishment
    pub fn key(&self) -> PunishmentKey {
        PunishmentKey::new(self.kind(), self.subject, self.community)
    }

    /// Roles to restore on unmute; empty for bans
    pub fn saved_roles(&self) -> &[RoleId] {
        match &self.sanction {
            Sanction::Ban => &[],
            Sanction::Mute { saved_roles } => saved_roles,
        }
    }

    /// Whether the punishment has lapsed at `now`
    pub fn is_expired(&self, now: PhysicalTime) -> bool {
        self.expires_at
            .map(|expires_at| expires_at.has_elapsed(now))
            .unwrap_or(false)
    }
}
