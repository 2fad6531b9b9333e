//! Fan-out scenarios: resolution, classification, early abort and replies

use assert_matches::assert_matches;
use std::time::Duration;
use warden_core::{
    ActionKind, ActionOutcome, BusEvent, CommunityRepository, InvokerReply, KickRequest,
    PunishmentKey, PunishmentKind, RoleId, SkipReason, UserId,
};
use warden_moderation::{EngineSettings, ModerationError};
use warden_testkit::{wait_until, PlatformCall, TestHarness, MODERATOR};

const SUBJECT: UserId = UserId::new(42);
const MUTE_ROLE: u64 = 77;

fn mute_key(community: warden_core::CommunityId) -> PunishmentKey {
    PunishmentKey::new(PunishmentKind::Mute, SUBJECT, community)
}

fn ban_key(community: warden_core::CommunityId) -> PunishmentKey {
    PunishmentKey::new(PunishmentKind::Ban, SUBJECT, community)
}

#[tokio::test]
async fn test_ban_in_unaffiliated_community_tracks_one_permanent_entry() {
    let h = TestHarness::new();
    let a = h.add_community(1, None, None).await;
    h.platform.add_member(a, SUBJECT, vec![]);

    let (request, responder) = h.punish_request(a, SUBJECT, "spam", None);
    let report = h.engine.punish(PunishmentKind::Ban, request).await.unwrap();

    assert_eq!(report.applied(), vec![a]);
    assert!(report.is_complete());
    assert_eq!(h.engine.registry().len(), 1);
    let entry = h.engine.registry().get(&ban_key(a)).unwrap();
    assert!(entry.job.is_none());
    assert_eq!(h.engine.scheduler().pending_count(), 0);
    assert!(h.platform.banned(a, SUBJECT));
    assert!(h.repository.punishment(&ban_key(a)).await.unwrap().is_some());
    assert_eq!(
        responder.replies(),
        vec![InvokerReply::Acknowledged {
            action: ActionKind::Ban,
            subject: SUBJECT,
            reason: "spam".into(),
            expires_at: None,
        }]
    );
}

#[tokio::test]
async fn test_network_mute_snapshots_roles_and_schedules_each_target() {
    let h = TestHarness::new();
    let a = h.add_community(1, Some("hub"), Some(MUTE_ROLE)).await;
    let b = h.add_community(2, Some("hub"), Some(MUTE_ROLE)).await;
    let c = h.add_community(3, Some("hub"), Some(MUTE_ROLE)).await;
    for (community, role) in [(a, 10), (b, 20), (c, 30)] {
        h.platform
            .add_member(community, SUBJECT, vec![RoleId::new(role), RoleId::new(5)]);
    }

    let expires_at = h.after(Duration::from_secs(600));
    let (request, responder) = h.punish_request(b, SUBJECT, "flooding", Some(expires_at));
    let report = h
        .engine
        .punish(PunishmentKind::Mute, request)
        .await
        .unwrap();

    assert_eq!(report.applied(), vec![b, a, c]);
    assert_eq!(h.engine.registry().len(), 3);
    assert_eq!(h.engine.scheduler().pending_count(), 3);
    for (community, role) in [(a, 10), (b, 20), (c, 30)] {
        let entry = h.engine.registry().get(&mute_key(community)).unwrap();
        assert_eq!(
            entry.punishment.saved_roles(),
            &[RoleId::new(role), RoleId::new(5)]
        );
        assert_eq!(entry.job.unwrap().fire_at(), expires_at);
        assert_eq!(
            h.platform.roles_of(community, SUBJECT),
            Some(vec![RoleId::new(MUTE_ROLE)])
        );
    }
    assert_eq!(responder.count(), 1);
    assert_eq!(h.audit.mod_actions().len(), 3);
}

#[tokio::test]
async fn test_already_punished_in_origin_rejects_before_any_attempt() {
    let h = TestHarness::new();
    let a = h.add_community(1, Some("hub"), None).await;
    h.add_community(2, Some("hub"), None).await;

    let (first, _) = h.punish_request(a, SUBJECT, "spam", None);
    h.engine.punish(PunishmentKind::Ban, first).await.unwrap();
    h.platform.clear_calls();

    let (again, responder) = h.punish_request(a, SUBJECT, "spam again", None);
    let err = h.engine.punish(PunishmentKind::Ban, again).await.unwrap_err();

    assert_matches!(err, ModerationError::AlreadyPunished { community, .. } if community == a);
    assert!(h.platform.calls().is_empty());
    assert_eq!(
        responder.replies(),
        vec![InvokerReply::AlreadyPunished {
            kind: PunishmentKind::Ban,
            subject: SUBJECT,
        }]
    );
    assert_eq!(h.engine.registry().len(), 2);
}

#[tokio::test]
async fn test_authority_failure_aborts_remaining_targets_without_rollback() {
    let h = TestHarness::new();
    let a = h.add_community(1, Some("hub"), None).await;
    let b = h.add_community(2, Some("hub"), None).await;
    let c = h.add_community(3, Some("hub"), None).await;
    h.platform.deny(b);

    let (request, responder) = h.punish_request(a, SUBJECT, "raid", None);
    let report = h.engine.punish(PunishmentKind::Ban, request).await.unwrap();

    assert_eq!(report.applied(), vec![a]);
    let abort = report.abort.unwrap();
    assert_eq!(abort.community, b);
    assert_matches!(abort.error, ModerationError::Authority { .. });

    assert!(h.engine.registry().contains(&ban_key(a)));
    assert!(h.repository.punishment(&ban_key(a)).await.unwrap().is_some());
    assert!(h.repository.punishment(&ban_key(b)).await.unwrap().is_none());
    assert!(h.platform.calls().iter().all(|call| call.community() != c));

    let replies = responder.replies();
    assert_eq!(replies.len(), 2);
    assert_matches!(replies[0], InvokerReply::Acknowledged { .. });
    assert_eq!(replies[1], InvokerReply::InsufficientAuthority { community: b });
}

#[tokio::test]
async fn test_transient_failure_on_first_target_reports_internal_error_once() {
    let h = TestHarness::new();
    let a = h.add_community(1, Some("hub"), None).await;
    h.add_community(2, Some("hub"), None).await;
    h.platform.make_unavailable(a);

    let (request, responder) = h.punish_request(a, SUBJECT, "raid", None);
    let report = h.engine.punish(PunishmentKind::Ban, request).await.unwrap();

    assert!(report.outcomes.is_empty());
    assert_matches!(
        report.abort.map(|abort| abort.error),
        Some(ModerationError::Platform { .. })
    );
    assert_eq!(responder.replies(), vec![InvokerReply::InternalError]);
    assert!(h.engine.registry().is_empty());
}

#[tokio::test]
async fn test_persistence_failure_mid_fan_out_aborts_and_reports_once() {
    let h = TestHarness::new();
    let a = h.add_community(1, Some("hub"), None).await;
    let b = h.add_community(2, Some("hub"), None).await;
    let c = h.add_community(3, Some("hub"), None).await;
    h.faults.fail_saves(b);

    let (request, responder) = h.punish_request(a, SUBJECT, "raid", None);
    let report = h.engine.punish(PunishmentKind::Ban, request).await.unwrap();

    assert_eq!(report.applied(), vec![a]);
    let abort = report.abort.unwrap();
    assert_eq!(abort.community, b);
    assert_matches!(abort.error, ModerationError::Persistence(_));

    assert!(h.repository.punishment(&ban_key(a)).await.unwrap().is_some());
    assert!(h.repository.punishment(&ban_key(b)).await.unwrap().is_none());
    assert!(h.engine.registry().contains(&ban_key(a)));
    assert!(!h.engine.registry().contains(&ban_key(b)));
    assert!(h.platform.calls().iter().all(|call| call.community() != c));

    let replies = responder.replies();
    assert_eq!(replies.len(), 2);
    assert_matches!(replies[0], InvokerReply::Acknowledged { .. });
    assert_eq!(replies[1], InvokerReply::InternalError);
}

#[tokio::test]
async fn test_reissue_after_partial_failure_completes_remaining_targets() {
    let h = TestHarness::new();
    let a = h.add_community(1, Some("hub"), None).await;
    let b = h.add_community(2, Some("hub"), None).await;
    h.platform.make_unavailable(b);

    let (request, _) = h.punish_request(a, SUBJECT, "raid", None);
    h.engine.punish(PunishmentKind::Ban, request).await.unwrap();
    assert_eq!(h.engine.registry().len(), 1);

    h.platform.allow(b);
    h.platform.clear_calls();
    let (request, _) = h.punish_request(b, SUBJECT, "raid", None);
    let report = h.engine.punish(PunishmentKind::Ban, request).await.unwrap();

    assert_eq!(report.applied(), vec![b]);
    assert_eq!(
        report.outcomes[1].outcome,
        ActionOutcome::Skipped(SkipReason::AlreadyPunished)
    );
    assert_eq!(h.platform.mutations(), vec![PlatformCall::Ban(b, SUBJECT)]);
    assert_eq!(h.engine.registry().len(), 2);
}

#[tokio::test]
async fn test_absent_subject_and_missing_mute_role_are_skipped_and_audited() {
    let h = TestHarness::new();
    let a = h.add_community(1, Some("hub"), Some(MUTE_ROLE)).await;
    let b = h.add_community(2, Some("hub"), Some(MUTE_ROLE)).await;
    let c = h.add_community(3, Some("hub"), None).await;
    let d = h.add_community(4, Some("hub"), Some(MUTE_ROLE)).await;
    h.platform.add_member(a, SUBJECT, vec![]);
    h.platform.add_member(c, SUBJECT, vec![]);
    h.platform.add_member(d, SUBJECT, vec![RoleId::new(8)]);

    let (request, responder) = h.punish_request(a, SUBJECT, "spam", None);
    let report = h
        .engine
        .punish(PunishmentKind::Mute, request)
        .await
        .unwrap();

    let outcomes: Vec<_> = report.outcomes.iter().map(|r| (r.community, r.outcome)).collect();
    assert_eq!(
        outcomes,
        vec![
            (a, ActionOutcome::Applied),
            (b, ActionOutcome::Skipped(SkipReason::SubjectAbsent)),
            (c, ActionOutcome::Skipped(SkipReason::MuteRoleUnset)),
            (d, ActionOutcome::Applied),
        ]
    );
    assert!(report.is_complete());
    assert_eq!(responder.count(), 1);

    let audited: Vec<_> = h
        .audit
        .mod_actions()
        .into_iter()
        .map(|action| (action.community, action.outcome))
        .collect();
    assert_eq!(audited, outcomes);
}

#[tokio::test]
async fn test_mute_shorter_than_minimum_is_rejected() {
    let h = TestHarness::with_settings(EngineSettings {
        min_mute_duration: Duration::from_secs(60),
        default_reason: "No reason provided.".into(),
    });
    let a = h.add_community(1, None, Some(MUTE_ROLE)).await;
    h.platform.add_member(a, SUBJECT, vec![]);

    let (request, responder) =
        h.punish_request(a, SUBJECT, "spam", Some(h.after(Duration::from_secs(30))));
    let err = h
        .engine
        .punish(PunishmentKind::Mute, request)
        .await
        .unwrap_err();

    assert_matches!(err, ModerationError::Validation { .. });
    assert_matches!(responder.replies().as_slice(), [InvokerReply::Invalid { .. }]);
    assert!(h.platform.calls().is_empty());
}

#[tokio::test]
async fn test_blank_reason_uses_default() {
    let h = TestHarness::new();
    let a = h.add_community(1, None, None).await;

    let (request, _) = h.punish_request(a, SUBJECT, "   ", None);
    h.engine.punish(PunishmentKind::Ban, request).await.unwrap();

    let entry = h.engine.registry().get(&ban_key(a)).unwrap();
    assert_eq!(entry.punishment.reason, "No reason provided.");
}

#[tokio::test]
async fn test_kick_event_leaves_no_tracked_state() {
    let h = TestHarness::new();
    let a = h.add_community(1, None, None).await;
    h.platform.add_member(a, SUBJECT, vec![]);
    h.engine.attach();

    h.bus.publish(BusEvent::Kick(KickRequest {
        origin_name: "home".into(),
        subject: SUBJECT,
        moderator: MODERATOR,
        community: a,
        reason: "rude".into(),
    }));

    assert!(wait_until(|| h.audit.mod_actions().len() == 1).await);
    assert_eq!(h.platform.mutations(), vec![PlatformCall::Kick(a, SUBJECT)]);
    assert!(h.engine.registry().is_empty());
    assert!(h.repository.load_punishments().await.unwrap().is_empty());
    let action = &h.audit.mod_actions()[0];
    assert_eq!(action.action, ActionKind::Kick);
    assert_eq!(action.origin_name, "home");
}

#[tokio::test]
async fn test_network_kick_publishes_one_kick_per_community() {
    let h = TestHarness::new();
    let a = h.add_community(1, Some("hub"), None).await;
    let b = h.add_community(2, Some("hub"), None).await;
    h.platform.add_member(a, SUBJECT, vec![]);
    h.engine.attach();

    let (context, responder) = h.context(a);
    let published = h
        .engine
        .request_network_kick(&context, SUBJECT, String::new())
        .await
        .unwrap();

    assert_eq!(published, 2);
    assert!(wait_until(|| h.audit.mod_actions().len() == 2).await);
    let mut outcomes: Vec<_> = h
        .audit
        .mod_actions()
        .into_iter()
        .map(|action| (action.community, action.outcome))
        .collect();
    outcomes.sort_by_key(|(community, _)| *community);
    assert_eq!(
        outcomes,
        vec![
            (a, ActionOutcome::Applied),
            (b, ActionOutcome::Skipped(SkipReason::SubjectAbsent)),
        ]
    );
    assert_matches!(
        responder.replies().as_slice(),
        [InvokerReply::Acknowledged { action: ActionKind::Kick, .. }]
    );
}

#[tokio::test]
async fn test_ban_request_over_bus_is_handled() {
    let h = TestHarness::new();
    let a = h.add_community(1, None, None).await;
    h.engine.attach();

    let (request, responder) = h.punish_request(a, SUBJECT, "spam", None);
    h.bus.publish(BusEvent::Ban(request));

    assert!(wait_until(|| h.engine.registry().contains(&ban_key(a))).await);
    assert!(wait_until(|| responder.count() == 1).await);
}
