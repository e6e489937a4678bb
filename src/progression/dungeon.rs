//! Timed boss encounters.
//!
//! A session moves from `Active` to exactly one of `Completed` or `Failed`
//! and never back. A user holds at most one active session; the store keeps
//! an `active:{user}` index row in step with the session status.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::progression::errors::EngineError;
use crate::progression::stats;
use crate::progression::storage::ProgressStore;
use crate::progression::types::{
    DungeonRank, DungeonSession, DungeonStatus, StatsRecord, DUNGEON_SCHEMA_VERSION,
};

/// Share of max health lost on a failed run, in percent.
pub const FAIL_PENALTY_PERCENT: u32 = 20;

/// Validation hook for client-reported damage.
pub trait DamagePolicy: Send + Sync {
    fn check(&self, session: &DungeonSession, amount: u32) -> Result<(), EngineError>;
}

/// Rejects zero damage and anything above a fixed per-hit ceiling.
#[derive(Debug, Clone, Copy)]
pub struct CappedDamage {
    pub max_per_hit: u32,
}

impl CappedDamage {
    pub fn new(max_per_hit: u32) -> Self {
        Self { max_per_hit }
    }
}

impl DamagePolicy for CappedDamage {
    fn check(&self, session: &DungeonSession, amount: u32) -> Result<(), EngineError> {
        if amount == 0 {
            return Err(EngineError::InvalidInput(
                "damage must be positive".to_string(),
            ));
        }
        if amount > self.max_per_hit {
            log::warn!(
                target: "security",
                "rejected {} damage against session {} (cap {})",
                amount,
                session.id,
                self.max_per_hit
            );
            return Err(EngineError::InvalidInput(format!(
                "damage {} exceeds the per-hit limit of {}",
                amount, self.max_per_hit
            )));
        }
        Ok(())
    }
}

/// Level gate for `rank`.
pub fn check_entry(level: u32, rank: DungeonRank, enforce_min_level: bool) -> Result<(), EngineError> {
    let required = rank.profile().min_level;
    if enforce_min_level && level < required {
        return Err(EngineError::InvalidInput(format!(
            "rank {} dungeons require level {} (current level {})",
            rank, required, level
        )));
    }
    Ok(())
}

/// Fresh active session with the rank's boss at full health.
pub fn open(user_id: &str, rank: DungeonRank, now: DateTime<Utc>) -> DungeonSession {
    let profile = rank.profile();
    DungeonSession {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        rank,
        boss_max_hp: profile.boss_hp,
        boss_current_hp: profile.boss_hp,
        started_at: now,
        ends_at: now + Duration::minutes(profile.duration_minutes),
        status: DungeonStatus::Active,
        schema_version: DUNGEON_SCHEMA_VERSION,
    }
}

/// Load a session, hiding sessions that belong to someone else.
pub fn load_owned(
    store: &ProgressStore,
    user_id: &str,
    session_id: &str,
) -> Result<DungeonSession, EngineError> {
    let session = store.get_dungeon(session_id)?;
    if session.user_id != user_id {
        return Err(EngineError::not_found("dungeon session", session_id));
    }
    Ok(session)
}

pub fn ensure_active(session: &DungeonSession) -> Result<(), EngineError> {
    match session.status {
        DungeonStatus::Active => Ok(()),
        DungeonStatus::Completed { .. } => Err(EngineError::Conflict(format!(
            "dungeon session {} is already completed",
            session.id
        ))),
        DungeonStatus::Failed { .. } => Err(EngineError::Conflict(format!(
            "dungeon session {} has already failed",
            session.id
        ))),
    }
}

/// Health lost when failing with `max_health`.
pub fn fail_penalty(max_health: u32) -> u32 {
    ((max_health as u64 * FAIL_PENALTY_PERCENT as u64) / 100) as u32
}

/// Mark the session failed and apply the health penalty. Returns health lost.
pub fn fail(
    session: &mut DungeonSession,
    stats_record: &mut StatsRecord,
    now: DateTime<Utc>,
) -> Result<u32, EngineError> {
    ensure_active(session)?;
    let lost = stats::lose_health(stats_record, fail_penalty(stats_record.max_health));
    session.status = DungeonStatus::Failed { failed_at: now };
    log::warn!(
        "dungeon {} (rank {}) failed for user {}; lost {} health",
        session.id,
        session.rank,
        session.user_id,
        lost
    );
    Ok(lost)
}

/// Settle an active session whose time ran out. Returns health lost when it did.
pub fn expire_if_due(
    session: &mut DungeonSession,
    stats_record: &mut StatsRecord,
    now: DateTime<Utc>,
) -> Result<Option<u32>, EngineError> {
    if !session.is_expired(now) {
        return Ok(None);
    }
    Ok(Some(fail(session, stats_record, now)?))
}

/// Subtract damage from the boss, flooring at zero. Returns remaining HP.
pub fn apply_damage(
    session: &mut DungeonSession,
    amount: u32,
    policy: &dyn DamagePolicy,
) -> Result<u32, EngineError> {
    ensure_active(session)?;
    policy.check(session, amount)?;
    session.boss_current_hp = session.boss_current_hp.saturating_sub(amount);
    Ok(session.boss_current_hp)
}

/// Close a session whose boss is down. Returns the experience earned.
pub fn complete(session: &mut DungeonSession, now: DateTime<Utc>) -> Result<u64, EngineError> {
    ensure_active(session)?;
    if session.boss_current_hp > 0 {
        return Err(EngineError::InvalidInput(format!(
            "boss still has {} HP",
            session.boss_current_hp
        )));
    }
    session.status = DungeonStatus::Completed { completed_at: now };
    Ok(session.rank.profile().exp_reward)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_uses_rank_profile() {
        let now = Utc::now();
        let session = open("u", DungeonRank::C, now);
        assert_eq!(session.boss_max_hp, 500);
        assert_eq!(session.boss_current_hp, 500);
        assert_eq!(session.ends_at - session.started_at, Duration::minutes(60));
        assert!(session.is_active());
    }

    #[test]
    fn level_gate_is_configurable() {
        assert!(check_entry(1, DungeonRank::E, true).is_ok());
        assert!(matches!(
            check_entry(4, DungeonRank::D, true),
            Err(EngineError::InvalidInput(_))
        ));
        assert!(check_entry(4, DungeonRank::S, false).is_ok());
    }

    #[test]
    fn completion_requires_dead_boss() {
        let policy = CappedDamage::new(1000);
        let now = Utc::now();
        let mut session = open("u", DungeonRank::E, now);
        assert!(complete(&mut session, now).is_err());
        assert_eq!(apply_damage(&mut session, 60, &policy).unwrap(), 40);
        assert_eq!(apply_damage(&mut session, 60, &policy).unwrap(), 0);
        assert_eq!(complete(&mut session, now).unwrap(), 100);
        assert!(matches!(
            complete(&mut session, now),
            Err(EngineError::Conflict(_))
        ));
        assert!(apply_damage(&mut session, 1, &policy).is_err());
    }

    #[test]
    fn damage_policy_bounds_hits() {
        let policy = CappedDamage::new(50);
        let mut session = open("u", DungeonRank::E, Utc::now());
        assert!(apply_damage(&mut session, 0, &policy).is_err());
        assert!(apply_damage(&mut session, 51, &policy).is_err());
        assert_eq!(session.boss_current_hp, 100);
    }

    #[test]
    fn failure_costs_a_fifth_of_max_health() {
        let now = Utc::now();
        let mut session = open("u", DungeonRank::E, now);
        let mut stats_record = StatsRecord::new("u");
        stats_record.max_health = 115;
        stats_record.health = 10;
        assert_eq!(fail_penalty(115), 23);
        assert_eq!(fail(&mut session, &mut stats_record, now).unwrap(), 10);
        assert_eq!(stats_record.health, 0);
        assert!(fail(&mut session, &mut stats_record, now).is_err());
    }

    #[test]
    fn expiry_settles_as_failure() {
        let now = Utc::now();
        let mut session = open("u", DungeonRank::E, now);
        let mut stats_record = StatsRecord::new("u");
        assert_eq!(
            expire_if_due(&mut session, &mut stats_record, now + Duration::minutes(24)).unwrap(),
            None
        );
        assert_eq!(
            expire_if_due(&mut session, &mut stats_record, now + Duration::minutes(25)).unwrap(),
            Some(20)
        );
        assert!(matches!(session.status, DungeonStatus::Failed { .. }));
    }
}
