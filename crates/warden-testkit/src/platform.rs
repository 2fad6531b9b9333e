//! In-memory chat platform
//!
//! Tracks members with their roles and bans per community, records every
//! call, and can be told to refuse (permission denied) or fail (unavailable)
//! in chosen communities.

use async_trait::async_trait;
use parking_lot::{Mutex, MutexGuard};
use std::collections::{HashMap, HashSet};
use warden_core::{CommunityId, PlatformEffects, PlatformError, RoleId, UserId};

/// A call made against the mock platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    /// `ban`
    Ban(CommunityId, UserId),
    /// `unban`
    Unban(CommunityId, UserId),
    /// `kick`
    Kick(CommunityId, UserId),
    /// `member_roles`
    MemberRoles(CommunityId, UserId),
    /// `set_member_roles`
    SetMemberRoles(CommunityId, UserId, Vec<RoleId>),
    /// `is_member`
    IsMember(CommunityId, UserId),
    /// `is_banned`
    IsBanned(CommunityId, UserId),
}

impl PlatformCall {
    /// Whether the call changes platform state
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            PlatformCall::Ban(..)
                | PlatformCall::Unban(..)
                | PlatformCall::Kick(..)
                | PlatformCall::SetMemberRoles(..)
        )
    }

    /// Community the call targeted
    pub fn community(&self) -> CommunityId {
        match self {
            PlatformCall::Ban(c, _)
            | PlatformCall::Unban(c, _)
            | PlatformCall::Kick(c, _)
            | PlatformCall::MemberRoles(c, _)
            | PlatformCall::SetMemberRoles(c, _, _)
            | PlatformCall::IsMember(c, _)
            | PlatformCall::IsBanned(c, _) => *c,
        }
    }
}

#[derive(Debug, Default)]
struct PlatformState {
    members: HashMap<(CommunityId, UserId), Vec<RoleId>>,
    bans: HashSet<(CommunityId, UserId)>,
    denied: HashSet<CommunityId>,
    unavailable: HashSet<CommunityId>,
    calls: Vec<PlatformCall>,
}

/// Mock `PlatformEffects` implementation
#[derive(Debug, Default)]
pub struct MockPlatform {
    state: Mutex<PlatformState>,
}

impl MockPlatform {
    /// Empty platform
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `subject` to `community` holding `roles`
    pub fn add_member(&self, community: CommunityId, subject: UserId, roles: Vec<RoleId>) {
        self.state.lock().members.insert((community, subject), roles);
    }

    /// Remove `subject` from `community`
    pub fn remove_member(&self, community: CommunityId, subject: UserId) {
        self.state.lock().members.remove(&(community, subject));
    }

    /// Roles `subject` holds in `community`, if a member
    pub fn roles_of(&self, community: CommunityId, subject: UserId) -> Option<Vec<RoleId>> {
        self.state.lock().members.get(&(community, subject)).cloned()
    }

    /// Whether `subject` is banned from `community`
    pub fn banned(&self, community: CommunityId, subject: UserId) -> bool {
        self.state.lock().bans.contains(&(community, subject))
    }

    /// Ban or unban directly, bypassing the call log
    pub fn set_banned(&self, community: CommunityId, subject: UserId, banned: bool) {
        let mut state = self.state.lock();
        if banned {
            state.bans.insert((community, subject));
        } else {
            state.bans.remove(&(community, subject));
        }
    }

    /// Refuse every call in `community` with `PermissionDenied`
    pub fn deny(&self, community: CommunityId) {
        self.state.lock().denied.insert(community);
    }

    /// Fail every call in `community` with `Unavailable`
    pub fn make_unavailable(&self, community: CommunityId) {
        self.state.lock().unavailable.insert(community);
    }

    /// Clear injected failures for `community`
    pub fn allow(&self, community: CommunityId) {
        let mut state = self.state.lock();
        state.denied.remove(&community);
        state.unavailable.remove(&community);
    }

    /// Every call made so far
    pub fn calls(&self) -> Vec<PlatformCall> {
        self.state.lock().calls.clone()
    }

    /// Calls that changed platform state
    pub fn mutations(&self) -> Vec<PlatformCall> {
        self.calls()
            .into_iter()
            .filter(PlatformCall::is_mutation)
            .collect()
    }

    /// Forget recorded calls
    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    fn enter(&self, call: PlatformCall) -> Result<MutexGuard<'_, PlatformState>, PlatformError> {
        let community = call.community();
        let mut state = self.state.lock();
        state.calls.push(call);
        if state.unavailable.contains(&community) {
            return Err(PlatformError::unavailable("gateway timeout"));
        }
        if state.denied.contains(&community) {
            return Err(PlatformError::permission_denied("missing permissions"));
        }
        Ok(state)
    }
}

#[async_trait]
impl PlatformEffects for MockPlatform {
    async fn ban(
        &self,
        community: CommunityId,
        subject: UserId,
        _reason: &str,
    ) -> Result<(), PlatformError> {
        let mut state = self.enter(PlatformCall::Ban(community, subject))?;
        state.members.remove(&(community, subject));
        state.bans.insert((community, subject));
        Ok(())
    }

    async fn unban(&self, community: CommunityId, subject: UserId) -> Result<(), PlatformError> {
        let mut state = self.enter(PlatformCall::Unban(community, subject))?;
        if state.bans.remove(&(community, subject)) {
            Ok(())
        } else {
            Err(PlatformError::SubjectAbsent)
        }
    }

    async fn kick(
        &self,
        community: CommunityId,
        subject: UserId,
        _reason: &str,
    ) -> Result<(), PlatformError> {
        let mut state = self.enter(PlatformCall::Kick(community, subject))?;
        state
            .members
            .remove(&(community, subject))
            .map(drop)
            .ok_or(PlatformError::SubjectAbsent)
    }

    async fn member_roles(
        &self,
        community: CommunityId,
        subject: UserId,
    ) -> Result<Vec<RoleId>, PlatformError> {
        let state = self.enter(PlatformCall::MemberRoles(community, subject))?;
        state
            .members
            .get(&(community, subject))
            .cloned()
            .ok_or(PlatformError::SubjectAbsent)
    }

    async fn set_member_roles(
        &self,
        community: CommunityId,
        subject: UserId,
        roles: &[RoleId],
    ) -> Result<(), PlatformError> {
        let mut state = self.enter(PlatformCall::SetMemberRoles(
            community,
            subject,
            roles.to_vec(),
        ))?;
        match state.members.get_mut(&(community, subject)) {
            Some(held) => {
                *held = roles.to_vec();
                Ok(())
            }
            None => Err(PlatformError::SubjectAbsent),
        }
    }

    async fn is_member(
        &self,
        community: CommunityId,
        subject: UserId,
    ) -> Result<bool, PlatformError> {
        let state = self.enter(PlatformCall::IsMember(community, subject))?;
        Ok(state.members.contains_key(&(community, subject)))
    }

    async fn is_banned(
        &self,
        community: CommunityId,
        subject: UserId,
    ) -> Result<bool, PlatformError> {
        let state = self.enter(PlatformCall::IsBanned(community, subject))?;
        Ok(state.bans.contains(&(community, subject)))
    }
}
