use chrono::{DateTime, Utc};

use crate::progression::types::UserRecord;

/// Experience needed to leave `level`.
pub fn exp_required_for(level: u32) -> u64 {
    let level = level as u64;
    level.saturating_mul(level).saturating_mul(100)
}

/// Outcome of an experience change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelProgress {
    pub old_level: u32,
    pub new_level: u32,
    pub levels_gained: u32,
}

impl LevelProgress {
    pub fn leveled_up(&self) -> bool {
        self.levels_gained > 0
    }

    /// Each level reached, in order.
    pub fn reached(&self) -> impl Iterator<Item = u32> {
        (self.old_level + 1)..=self.new_level
    }
}

/// Add experience and run the level-up cascade. Afterwards `exp < exp_required`.
pub fn add_exp(user: &mut UserRecord, amount: u64) -> LevelProgress {
    let old_level = user.level;
    user.exp = user.exp.saturating_add(amount);
    user.exp_required = exp_required_for(user.level);
    while user.exp >= user.exp_required {
        user.exp -= user.exp_required;
        user.level += 1;
        user.skill_points += 1;
        user.exp_required = exp_required_for(user.level);
    }
    LevelProgress {
        old_level,
        new_level: user.level,
        levels_gained: user.level - old_level,
    }
}

/// Grant one level without spending experience. Stored exp is kept but
/// clamped below the new requirement.
pub fn level_up(user: &mut UserRecord) -> LevelProgress {
    let old_level = user.level;
    user.level += 1;
    user.skill_points += 1;
    user.exp_required = exp_required_for(user.level);
    user.exp = user.exp.min(user.exp_required.saturating_sub(1));
    LevelProgress {
        old_level,
        new_level: user.level,
        levels_gained: 1,
    }
}

/// Drop one level when the user has been away for at least `penalty_days`.
/// Returns `(from, to)` when a level was lost.
pub fn apply_inactivity_penalty(
    user: &mut UserRecord,
    now: DateTime<Utc>,
    penalty_days: i64,
) -> Option<(u32, u32)> {
    let last_login = user.last_login?;
    if (now - last_login).num_days() < penalty_days || user.level <= 1 {
        return None;
    }
    let from = user.level;
    user.level -= 1;
    user.exp_required = exp_required_for(user.level);
    user.exp = user.exp.min(user.exp_required.saturating_sub(1));
    Some((from, user.level))
}
