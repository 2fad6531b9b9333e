//! Bus topics and their payload schemas
//!
//! Every interaction with the moderation engine travels over the event bus.
//! Each topic has exactly one payload type; `BusEvent` is the tagged union of
//! all of them and `BusEvent::topic` names the topic a payload belongs to.

use crate::identifiers::{CommunityId, UserId};
use crate::punishment::PunishmentKind;
use crate::time::PhysicalTime;
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Named bus topics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Topic {
    /// Network-wide ban request
    Ban,
    /// Network-wide mute request
    Mute,
    /// Single-community kick request
    Kick,
    /// Reverse a ban in one community
    Unban,
    /// Reverse a mute in one community
    Unmute,
    /// Audit record of a moderation attempt
    ModAction,
    /// The platform reports a restriction removed by someone other than the bot
    RestrictionLifted,
}

impl Topic {
    /// Every topic, in declaration order
    pub const ALL: [Topic; 7] = [
        Topic::Ban,
        Topic::Mute,
        Topic::Kick,
        Topic::Unban,
        Topic::Unmute,
        Topic::ModAction,
        Topic::RestrictionLifted,
    ];

    /// Wire name of the topic
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Ban => "ban",
            Topic::Mute => "mute",
            Topic::Kick => "kick",
            Topic::Unban => "unban",
            Topic::Unmute => "unmute",
            Topic::ModAction => "mod action",
            Topic::RestrictionLifted => "restriction lifted",
        }
    }

    /// Topic that requests a punishment of `kind`
    pub fn punish(kind: PunishmentKind) -> Self {
        match kind {
            PunishmentKind::Ban => Topic::Ban,
            PunishmentKind::Mute => Topic::Mute,
        }
    }

    /// Topic that reverses a punishment of `kind`
    pub fn unpunish(kind: PunishmentKind) -> Self {
        match kind {
            PunishmentKind::Ban => Topic::Unban,
            PunishmentKind::Mute => Topic::Unmute,
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown topic name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown topic: {0}")]
pub struct UnknownTopic(pub String);

impl FromStr for Topic {
    type Err = UnknownTopic;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Topic::ALL
            .iter()
            .copied()
            .find(|topic| topic.as_str() == s)
            .ok_or_else(|| UnknownTopic(s.to_string()))
    }
}

/// Sink for the single user-facing reply of a moderation command
#[async_trait]
pub trait Responder: Send + Sync {
    /// Deliver a reply to whoever invoked the command
    async fn reply(&self, reply: InvokerReply);
}

/// Who asked for a moderation action, and where to answer them
#[derive(Clone)]
pub struct InvocationContext {
    /// Community the command was issued in
    pub origin: CommunityId,
    /// Display name of the origin community, carried into audit records
    pub origin_name: String,
    /// Moderator who issued the command
    pub moderator: UserId,
    /// Where replies go; `None` for system-initiated actions
    pub responder: Option<Arc<dyn Responder>>,
}

impl InvocationContext {
    /// Create a context without a reply channel
    pub fn new(origin: CommunityId, origin_name: impl Into<String>, moderator: UserId) -> Self {
        Self {
            origin,
            origin_name: origin_name.into(),
            moderator,
            responder: None,
        }
    }

    /// Attach a reply channel
    pub fn with_responder(mut self, responder: Arc<dyn Responder>) -> Self {
        self.responder = Some(responder);
        self
    }

    /// Send `reply` to the invoker if one is listening
    pub async fn reply(&self, reply: InvokerReply) {
        if let Some(responder) = &self.responder {
            responder.reply(reply).await;
        }
    }
}

impl fmt::Debug for InvocationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationContext")
            .field("origin", &self.origin)
            .field("origin_name", &self.origin_name)
            .field("moderator", &self.moderator)
            .field("has_responder", &self.responder.is_some())
            .finish()
    }
}

/// Payload of `ban` and `mute`
#[derive(Debug, Clone)]
pub struct PunishRequest {
    /// Invoking moderator and origin community
    pub context: InvocationContext,
    /// User to punish
    pub subject: UserId,
    /// Moderator-supplied reason
    pub reason: String,
    /// Absolute expiry, if temporary
    pub expires_at: Option<PhysicalTime>,
}

/// Payload of `kick`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KickRequest {
    /// Display name of the community the command was issued in
    pub origin_name: String,
    /// User to kick
    pub subject: UserId,
    /// Moderator who issued the kick
    pub moderator: UserId,
    /// Community to kick from
    pub community: CommunityId,
    /// Moderator-supplied reason
    pub reason: String,
}

/// Payload of `unban` and `unmute`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnpunishRequest {
    /// User whose punishment is reversed
    pub subject: UserId,
    /// Community the punishment applies to
    pub community: CommunityId,
}

/// Payload of `restriction lifted`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestrictionLifted {
    /// Kind of restriction the platform removed
    pub kind: PunishmentKind,
    /// User the restriction applied to
    pub subject: UserId,
    /// Community the restriction applied to
    pub community: CommunityId,
}

/// Moderation action recorded in an audit event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// Ban attempt
    Ban,
    /// Mute attempt
    Mute,
    /// Kick attempt
    Kick,
}

impl ActionKind {
    /// Lowercase name for logs and replies
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Ban => "ban",
            ActionKind::Mute => "mute",
            ActionKind::Kick => "kick",
        }
    }

    /// Tracked punishment this action creates; kicks leave nothing behind
    pub fn punishment_kind(&self) -> Option<PunishmentKind> {
        match self {
            ActionKind::Ban => Some(PunishmentKind::Ban),
            ActionKind::Mute => Some(PunishmentKind::Mute),
            ActionKind::Kick => None,
        }
    }

    /// Past-tense verb for user-facing text
    pub fn past_tense(&self) -> &'static str {
        match self {
            ActionKind::Ban => "Banned",
            ActionKind::Mute => "Muted",
            ActionKind::Kick => "Kicked",
        }
    }
}

impl From<PunishmentKind> for ActionKind {
    fn from(kind: PunishmentKind) -> Self {
        match kind {
            PunishmentKind::Ban => ActionKind::Ban,
            PunishmentKind::Mute => ActionKind::Mute,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a fan-out target was passed over without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// The subject is not a member of the target community
    SubjectAbsent,
    /// The subject already has an active punishment of this kind there
    AlreadyPunished,
    /// The target community has no mute role configured
    MuteRoleUnset,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::SubjectAbsent => f.write_str("subject absent"),
            SkipReason::AlreadyPunished => f.write_str("already punished"),
            SkipReason::MuteRoleUnset => f.write_str("mute role unset"),
        }
    }
}

/// Result of one fan-out attempt as seen by the audit log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    /// The action took effect
    Applied,
    /// The target was passed over
    Skipped(SkipReason),
}

/// Payload of `mod action`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModAction {
    /// Community the attempt targeted
    pub community: CommunityId,
    /// What was attempted
    pub action: ActionKind,
    /// Whether it applied or was skipped
    pub outcome: ActionOutcome,
    /// Display name of the community the command came from
    pub origin_name: String,
    /// User the action targeted
    pub subject: UserId,
    /// Moderator who issued the command
    pub moderator: UserId,
    /// Moderator-supplied reason
    pub reason: Option<String>,
    /// Absolute expiry, for temporary bans and mutes
    pub expires_at: Option<PhysicalTime>,
}

/// Tagged union of every bus payload
#[derive(Debug, Clone)]
pub enum BusEvent {
    /// `ban`
    Ban(PunishRequest),
    /// `mute`
    Mute(PunishRequest),
    /// `kick`
    Kick(KickRequest),
    /// `unban`
    Unban(UnpunishRequest),
    /// `unmute`
    Unmute(UnpunishRequest),
    /// `mod action`
    ModAction(ModAction),
    /// `restriction lifted`
    RestrictionLifted(RestrictionLifted),
}

impl BusEvent {
    /// Topic this payload is published on
    pub fn topic(&self) -> Topic {
        match self {
            BusEvent::Ban(_) => Topic::Ban,
            BusEvent::Mute(_) => Topic::Mute,
            BusEvent::Kick(_) => Topic::Kick,
            BusEvent::Unban(_) => Topic::Unban,
            BusEvent::Unmute(_) => Topic::Unmute,
            BusEvent::ModAction(_) => Topic::ModAction,
            BusEvent::RestrictionLifted(_) => Topic::RestrictionLifted,
        }
    }

    /// Punish request of `kind`
    pub fn punish(kind: PunishmentKind, request: PunishRequest) -> Self {
        match kind {
            PunishmentKind::Ban => BusEvent::Ban(request),
            PunishmentKind::Mute => BusEvent::Mute(request),
        }
    }

    /// Unpunish request of `kind`
    pub fn unpunish(kind: PunishmentKind, subject: UserId, community: CommunityId) -> Self {
        let request = UnpunishRequest { subject, community };
        match kind {
            PunishmentKind::Ban => BusEvent::Unban(request),
            PunishmentKind::Mute => BusEvent::Unmute(request),
        }
    }
}

/// Reply delivered to the invoker of a moderation command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvokerReply {
    /// The action reached the first target
    Acknowledged {
        /// Action taken
        action: ActionKind,
        /// Targeted user
        subject: UserId,
        /// Reason given
        reason: String,
        /// Expiry, if temporary
        expires_at: Option<PhysicalTime>,
    },
    /// The subject already has an active punishment of this kind here
    AlreadyPunished {
        /// Kind already active
        kind: PunishmentKind,
        /// Targeted user
        subject: UserId,
    },
    /// The bot lacks the rank or permission to act in a community
    InsufficientAuthority {
        /// Community where the action was refused
        community: CommunityId,
    },
    /// The request itself was rejected
    Invalid {
        /// One-sentence explanation
        message: String,
    },
    /// Reversal requests were issued for tracked punishments
    Reversed {
        /// Kind reversed
        kind: PunishmentKind,
        /// Targeted user
        subject: UserId,
    },
    /// Nothing was tracked to reverse
    NotPunished {
        /// Kind requested
        kind: PunishmentKind,
        /// Targeted user
        subject: UserId,
    },
    /// Storage or platform failure
    InternalError,
}

impl fmt::Display for InvokerReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvokerReply::Acknowledged {
                action, subject, reason, ..
            } => write!(f, "{} <@{subject}> for {reason}", action.past_tense()),
            InvokerReply::AlreadyPunished { kind, subject } => {
                write!(f, "<@{subject}> is already {}.", kind.past_tense())
            }
            InvokerReply::InsufficientAuthority { community } => write!(
                f,
                "My authority is insufficient to do that in community {community}."
            ),
            InvokerReply::Invalid { message } => f.write_str(message),
            InvokerReply::Reversed { kind, subject } => match kind {
                PunishmentKind::Ban => write!(f, "Unbanned <@{subject}>."),
                PunishmentKind::Mute => write!(f, "Unmuted <@{subject}>."),
            },
            InvokerReply::NotPunished { kind, subject } => {
                write!(f, "<@{subject}> isn't {}.", kind.past_tense())
            }
            InvokerReply::InternalError => {
                f.write_str("An internal error occurred while processing that command.")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_names_round_trip() {
        for topic in Topic::ALL {
            assert_eq!(topic.as_str().parse::<Topic>().unwrap(), topic);
        }
        assert!("warn".parse::<Topic>().is_err());
    }

    #[test]
    fn test_payload_names_its_topic() {
        let event = BusEvent::unpunish(PunishmentKind::Mute, UserId::new(1), CommunityId::new(2));
        assert_eq!(event.topic(), Topic::Unmute);
        assert_eq!(Topic::unpunish(PunishmentKind::Ban), Topic::Unban);
        assert_eq!(Topic::punish(PunishmentKind::Mute), Topic::Mute);
    }

    #[test]
    fn test_reply_text_is_distinct_per_failure() {
        let already = InvokerReply::AlreadyPunished {
            kind: PunishmentKind::Ban,
            subject: UserId::new(5),
        }
        .to_string();
        let authority = InvokerReply::InsufficientAuthority {
            community: CommunityId::new(9),
        }
        .to_string();
        let internal = InvokerReply::InternalError.to_string();

        assert!(already.contains("already banned"));
        assert!(authority.contains("authority is insufficient"));
        assert!(internal.contains("internal error"));
    }
}
