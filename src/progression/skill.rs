//! Skill catalog and per-user skill progression.
//!
//! Functions here mutate the loaded user and stats records they are handed;
//! persisting those records is the orchestrator's job. Per-user skill rows are
//! written directly.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::progression::errors::EngineError;
use crate::progression::stats;
use crate::progression::storage::ProgressStore;
use crate::progression::types::{
    Effect, SkillKind, SkillRecord, StatDeltas, StatsRecord, UserRecord, UserSkill,
};

/// Skill experience earned per use.
pub const SKILL_EXP_PER_USE: u32 = 10;

/// Skill experience needed to leave `level`.
pub fn skill_exp_threshold(level: u32) -> u32 {
    level.saturating_mul(100)
}

fn non_negative(value: i32) -> u32 {
    value.max(0) as u32
}

/// Passive stat contribution of `skill` at `level`; empty for active skills.
pub fn passive_bonus(skill: &SkillRecord, level: u32) -> StatDeltas {
    let mut bonus = StatDeltas::new();
    if let SkillKind::Passive { bonuses } = &skill.kind {
        for scaled in bonuses {
            *bonus.entry(scaled.key).or_insert(0) += scaled.at_level(level);
        }
    }
    bonus
}

/// Human-readable magnitudes at `level`, keyed by effect or stat name.
pub fn magnitudes(skill: &SkillRecord, level: u32) -> BTreeMap<String, i32> {
    match &skill.kind {
        SkillKind::Active { effects, .. } => effects
            .iter()
            .map(|scaled| (scaled.key.label().to_string(), scaled.at_level(level)))
            .collect(),
        SkillKind::Passive { bonuses } => bonuses
            .iter()
            .map(|scaled| (scaled.key.as_str().to_string(), scaled.at_level(level)))
            .collect(),
    }
}

/// Sum of passive bonuses across every skill the user has unlocked.
pub fn passive_bonuses(store: &ProgressStore, user_id: &str) -> Result<StatDeltas, EngineError> {
    let mut total = StatDeltas::new();
    for owned in store.list_user_skills(user_id)? {
        let Some(skill) = store.get_skill(&owned.skill_id)? else {
            log::warn!(
                "user {} holds unknown skill {}; ignoring",
                user_id,
                owned.skill_id
            );
            continue;
        };
        for (stat, amount) in passive_bonus(&skill, owned.level) {
            *total.entry(stat).or_insert(0) += amount;
        }
    }
    Ok(total)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnlockedSkill {
    pub skill_id: String,
    pub name: String,
    pub active: bool,
    pub level: u32,
    pub max_level: u32,
    pub exp: u32,
    pub exp_to_next: u32,
    pub magnitudes: BTreeMap<String, i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SkillOverview {
    pub catalog: Vec<SkillRecord>,
    pub unlocked: Vec<UnlockedSkill>,
}

pub fn list(store: &ProgressStore, user_id: &str) -> Result<SkillOverview, EngineError> {
    let catalog = store.list_skills()?;
    let mut unlocked = Vec::new();
    for owned in store.list_user_skills(user_id)? {
        let Some(skill) = catalog.iter().find(|s| s.id == owned.skill_id) else {
            continue;
        };
        unlocked.push(UnlockedSkill {
            skill_id: skill.id.clone(),
            name: skill.name.clone(),
            active: skill.is_active(),
            level: owned.level,
            max_level: skill.max_level,
            exp: owned.exp,
            exp_to_next: skill_exp_threshold(owned.level),
            magnitudes: magnitudes(skill, owned.level),
        });
    }
    Ok(SkillOverview { catalog, unlocked })
}

/// Unlock a skill, spending skill points from `user`.
pub fn unlock(
    store: &ProgressStore,
    user: &mut UserRecord,
    skill_id: &str,
    now: DateTime<Utc>,
) -> Result<UserSkill, EngineError> {
    let skill = store
        .get_skill(skill_id)?
        .ok_or_else(|| EngineError::not_found("skill", skill_id))?;
    if store.get_user_skill(&user.id, skill_id)?.is_some() {
        return Err(EngineError::Conflict(format!(
            "skill already unlocked: {}",
            skill_id
        )));
    }
    if user.skill_points < skill.unlock_cost {
        return Err(EngineError::InsufficientCurrency {
            currency: "skill points",
            required: skill.unlock_cost as u64,
            available: user.skill_points as u64,
        });
    }

    user.skill_points -= skill.unlock_cost;
    let mut owned = UserSkill::new(&user.id, skill_id);
    owned.unlocked_at = now;
    store.put_user_skill(owned.clone())?;
    log::info!("user {} unlocked skill {}", user.id, skill_id);
    Ok(owned)
}

/// What a single skill use did.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SkillUse {
    pub skill_id: String,
    /// Level the effects were evaluated at.
    pub level_used: u32,
    pub stamina_spent: u32,
    pub health_restored: u32,
    pub stamina_restored: u32,
    /// Experience still to be applied to the user through the cascade.
    pub exp_granted: u64,
    pub skill_level: u32,
    pub skill_exp: u32,
    pub skill_leveled_up: bool,
}

/// Add skill experience, levelling up while the threshold is met. At
/// `max_level` experience stops at the threshold.
pub fn train(owned: &mut UserSkill, max_level: u32, amount: u32) -> bool {
    let start = owned.level;
    owned.exp = owned.exp.saturating_add(amount);
    while owned.level < max_level && owned.exp >= skill_exp_threshold(owned.level) {
        owned.exp -= skill_exp_threshold(owned.level);
        owned.level += 1;
    }
    if owned.level >= max_level {
        owned.level = max_level;
        owned.exp = owned.exp.min(skill_exp_threshold(max_level));
    }
    owned.level > start
}

/// Use an active skill: spend stamina, apply effects at the current level and
/// train the skill. Experience effects are returned, not applied.
pub fn use_active(
    store: &ProgressStore,
    stats_record: &mut StatsRecord,
    user_id: &str,
    skill_id: &str,
) -> Result<SkillUse, EngineError> {
    let skill = store
        .get_skill(skill_id)?
        .ok_or_else(|| EngineError::not_found("skill", skill_id))?;
    let (stamina_cost, effects) = match &skill.kind {
        SkillKind::Active {
            stamina_cost,
            effects,
        } => (*stamina_cost, effects),
        SkillKind::Passive { .. } => {
            return Err(EngineError::InvalidInput(format!(
                "{} is a passive skill and cannot be used",
                skill.name
            )))
        }
    };
    let mut owned = store
        .get_user_skill(user_id, skill_id)?
        .ok_or_else(|| EngineError::not_found("unlocked skill", skill_id))?;

    stats::consume_stamina(stats_record, stamina_cost)?;

    let mut outcome = SkillUse {
        skill_id: skill_id.to_string(),
        level_used: owned.level,
        stamina_spent: stamina_cost,
        ..SkillUse::default()
    };
    for scaled in effects {
        let amount = non_negative(scaled.at_level(owned.level));
        match scaled.key {
            Effect::RestoreHealth => {
                outcome.health_restored += stats::restore_health(stats_record, amount);
            }
            Effect::RestoreStamina => {
                outcome.stamina_restored += stats::restore_stamina(stats_record, amount);
            }
            Effect::GrantExp => outcome.exp_granted += amount as u64,
        }
    }

    outcome.skill_leveled_up = train(&mut owned, skill.max_level, SKILL_EXP_PER_USE);
    outcome.skill_level = owned.level;
    outcome.skill_exp = owned.exp;
    store.put_user_skill(owned)?;
    if outcome.skill_leveled_up {
        log::info!(
            "user {} raised skill {} to level {}",
            user_id,
            skill_id,
            outcome.skill_level
        );
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progression::storage::ProgressStoreBuilder;
    use crate::progression::types::{Scaled, Stat};
    use tempfile::TempDir;

    fn setup_test_store() -> (ProgressStore, TempDir) {
        let dir = TempDir::new().expect("tempdir");
        let store = ProgressStoreBuilder::new(dir.path()).open().expect("store");
        (store, dir)
    }

    #[test]
    fn level_three_passive_contributes_eight() {
        let skill = SkillRecord::new(
            "iron",
            "Iron",
            "",
            SkillKind::Passive {
                bonuses: vec![Scaled::new(Stat::Strength, 5, 1)],
            },
        );
        assert_eq!(passive_bonus(&skill, 3).get(&Stat::Strength), Some(&8));
    }

    #[test]
    fn unlock_checks_in_order() {
        let (store, _dir) = setup_test_store();
        let mut user = UserRecord::new("u", "user", "u@example.com", "h");
        let now = Utc::now();

        assert!(matches!(
            unlock(&store, &mut user, "nope", now),
            Err(EngineError::NotFound(_))
        ));
        assert!(matches!(
            unlock(&store, &mut user, "active_heal", now),
            Err(EngineError::InsufficientCurrency { required: 1, available: 0, .. })
        ));

        user.skill_points = 3;
        let owned = unlock(&store, &mut user, "active_heal", now).expect("unlock");
        assert_eq!(owned.level, 1);
        assert_eq!(owned.exp, 0);
        assert_eq!(user.skill_points, 2);

        assert!(matches!(
            unlock(&store, &mut user, "active_heal", now),
            Err(EngineError::Conflict(_))
        ));
        assert_eq!(user.skill_points, 2);
    }

    #[test]
    fn train_carries_remainder_and_caps_at_max() {
        let mut owned = UserSkill::new("u", "s");
        owned.exp = 95;
        assert!(train(&mut owned, 5, 10));
        assert_eq!(owned.level, 2);
        assert_eq!(owned.exp, 5);

        owned.level = 5;
        owned.exp = 495;
        assert!(!train(&mut owned, 5, 10));
        assert_eq!(owned.level, 5);
        assert_eq!(owned.exp, 500);
    }

    #[test]
    fn passive_skills_cannot_be_used() {
        let (store, _dir) = setup_test_store();
        let mut stats_record = StatsRecord::new("u");
        let err = use_active(&store, &mut stats_record, "u", "passive_str").unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
        assert_eq!(stats_record.stamina, 50);
    }

    #[test]
    fn recovery_heals_at_current_level() {
        let (store, _dir) = setup_test_store();
        let mut user = UserRecord::new("u", "user", "u@example.com", "h");
        user.skill_points = 1;
        unlock(&store, &mut user, "active_heal", Utc::now()).unwrap();

        let mut stats_record = StatsRecord::new("u");
        stats_record.health = 10;
        let outcome = use_active(&store, &mut stats_record, "u", "active_heal").unwrap();
        assert_eq!(outcome.health_restored, 35);
        assert_eq!(outcome.stamina_spent, 20);
        assert_eq!(stats_record.health, 45);
        assert_eq!(stats_record.stamina, 30);
        assert_eq!(outcome.skill_exp, 10);
        assert!(!outcome.skill_leveled_up);
    }

    #[test]
    fn insufficient_stamina_leaves_skill_untouched() {
        let (store, _dir) = setup_test_store();
        let mut user = UserRecord::new("u", "user", "u@example.com", "h");
        user.skill_points = 2;
        unlock(&store, &mut user, "active_focus", Utc::now()).unwrap();
        let mut stats_record = StatsRecord::new("u");
        stats_record.stamina = 14;
        assert!(matches!(
            use_active(&store, &mut stats_record, "u", "active_focus"),
            Err(EngineError::InsufficientResource { .. })
        ));
        let owned = store.get_user_skill("u", "active_focus").unwrap().unwrap();
        assert_eq!(owned.exp, 0);
    }
}
