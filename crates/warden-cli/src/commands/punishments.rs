// Punishment inspection commands

use clap::{Subcommand, ValueEnum};
use std::fmt::Write;
use std::time::Duration;
use warden_core::{
    CommunityId, CommunityRepository, PhysicalTime, Punishment, PunishmentKind, UserId,
};

#[derive(Debug, Subcommand)]
pub enum PunishmentsCommand {
    /// List persisted punishments
    List {
        /// Only punishments in this community
        #[arg(long)]
        community: Option<CommunityId>,

        /// Only punishments of this user
        #[arg(long)]
        subject: Option<UserId>,

        /// Only punishments of this kind
        #[arg(long, value_enum)]
        kind: Option<KindArg>,
    },
}

/// Punishment kind as accepted on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    /// Bans
    Ban,
    /// Mutes
    Mute,
}

impl From<KindArg> for PunishmentKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Ban => PunishmentKind::Ban,
            KindArg::Mute => PunishmentKind::Mute,
        }
    }
}

/// Execute a punishment command; `now` decides how expiry is rendered
pub async fn run(
    repository: &dyn CommunityRepository,
    now: PhysicalTime,
    command: PunishmentsCommand,
) -> anyhow::Result<String> {
    match command {
        PunishmentsCommand::List {
            community,
            subject,
            kind,
        } => {
            let kind = kind.map(PunishmentKind::from);
            let mut rows: Vec<Punishment> = repository
                .load_punishments()
                .await?
                .into_iter()
                .filter(|row| community.map_or(true, |c| row.community == c))
                .filter(|row| subject.map_or(true, |s| row.subject == s))
                .filter(|row| kind.map_or(true, |k| row.kind() == k))
                .collect();
            rows.sort_by_key(Punishment::key);

            if rows.is_empty() {
                return Ok("No punishments recorded".to_string());
            }
            let mut out = String::new();
            for row in &rows {
                let _ = writeln!(
                    out,
                    "{:<4} subject={} community={} {} reason={:?}",
                    row.kind().as_str(),
                    row.subject,
                    row.community,
                    describe_expiry(row.expires_at, now),
                    row.reason
                );
            }
            let _ = write!(out, "{} punishment(s)", rows.len());
            Ok(out)
        }
    }
}

fn describe_expiry(expires_at: Option<PhysicalTime>, now: PhysicalTime) -> String {
    match expires_at {
        None => "permanent".to_string(),
        Some(at) if at.has_elapsed(now) => "expired".to_string(),
        Some(at) => format!("expires in {}", format_remaining(at.remaining_since(now))),
    }
}

/// Render a duration as `1d 2h 3m 4s`, dropping leading zero units
fn format_remaining(remaining: Duration) -> String {
    let mut secs = remaining.as_secs();
    let mut parts = Vec::new();
    for (unit, size) in [("d", 86_400), ("h", 3_600), ("m", 60)] {
        let count = secs / size;
        secs %= size;
        if count > 0 || !parts.is_empty() {
            parts.push(format!("{count}{unit}"));
        }
    }
    parts.push(format!("{secs}s"));
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support;
    use warden_core::RoleId;

    const NOW: PhysicalTime = PhysicalTime::from_ms(1_000_000);

    #[test]
    fn test_format_remaining() {
        assert_eq!(format_remaining(Duration::from_secs(42)), "42s");
        assert_eq!(format_remaining(Duration::from_secs(3_605)), "1h 0m 5s");
        assert_eq!(format_remaining(Duration::from_secs(90_061)), "1d 1h 1m 1s");
    }

    #[tokio::test]
    async fn test_list_filters_and_orders_rows() {
        let repository = test_support::repository();
        let a = CommunityId::new(1);
        let b = CommunityId::new(2);
        let rows = [
            Punishment::mute(
                UserId::new(7),
                b,
                "flooding",
                Some(NOW.saturating_add(Duration::from_secs(600))),
                vec![RoleId::new(3)],
            ),
            Punishment::ban(UserId::new(7), a, "spam", None),
            Punishment::ban(UserId::new(8), a, "raid", Some(PhysicalTime::from_ms(1))),
        ];
        for row in &rows {
            repository.save_punishment(row).await.unwrap();
        }

        let all = run(
            &repository,
            NOW,
            PunishmentsCommand::List {
                community: None,
                subject: None,
                kind: None,
            },
        )
        .await
        .unwrap();
        let lines: Vec<&str> = all.lines().collect();
        assert_eq!(
            lines,
            vec![
                "ban  subject=7 community=1 permanent reason=\"spam\"",
                "ban  subject=8 community=1 expired reason=\"raid\"",
                "mute subject=7 community=2 expires in 10m 0s reason=\"flooding\"",
                "3 punishment(s)",
            ]
        );

        let mutes = run(
            &repository,
            NOW,
            PunishmentsCommand::List {
                community: None,
                subject: Some(UserId::new(7)),
                kind: Some(KindArg::Mute),
            },
        )
        .await
        .unwrap();
        assert!(mutes.ends_with("1 punishment(s)"));

        let none = run(
            &repository,
            NOW,
            PunishmentsCommand::List {
                community: Some(CommunityId::new(99)),
                subject: None,
                kind: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(none, "No punishments recorded");
    }
}
