//! Stat ledger: bounded arithmetic over a user's [`StatsRecord`].
//!
//! Stamina and health never leave `[0, max]`; the other stats are unbounded
//! upward and floored at zero. Everything here operates on a loaded record;
//! the orchestrator loads, mutates and persists under the user lock.

use crate::progression::errors::EngineError;
use crate::progression::types::{Stat, StatBlock, StatDeltas, StatsRecord};

fn apply_delta(value: u32, delta: i32) -> u32 {
    if delta >= 0 {
        value.saturating_add(delta as u32)
    } else {
        value.saturating_sub(delta.unsigned_abs())
    }
}

fn clamp_resources(stats: &mut StatsRecord) {
    let max_stamina = stats.max_stamina();
    stats.stamina = stats.stamina.min(max_stamina);
    stats.health = stats.health.min(stats.max_health);
}

/// Apply signed deltas. Maxima are adjusted before the clamp so a reward
/// that raises `max_health` and `health` together keeps both.
pub fn increase(stats: &mut StatsRecord, deltas: &StatDeltas) {
    for (stat, delta) in deltas.iter().filter(|(stat, _)| stat.is_maximum()) {
        match stat {
            Stat::MaxHealth => stats.max_health = apply_delta(stats.max_health, *delta),
            Stat::MaxStamina => {
                stats.max_stamina = Some(apply_delta(stats.max_stamina(), *delta));
            }
            _ => {}
        }
    }
    for (stat, delta) in deltas.iter().filter(|(stat, _)| !stat.is_maximum()) {
        let slot = match stat {
            Stat::Strength => &mut stats.strength,
            Stat::Agility => &mut stats.agility,
            Stat::Intelligence => &mut stats.intelligence,
            Stat::Stamina => &mut stats.stamina,
            Stat::Health => &mut stats.health,
            Stat::MaxHealth | Stat::MaxStamina => continue,
        };
        *slot = apply_delta(*slot, *delta);
    }
    clamp_resources(stats);
}

/// Deduct stamina, leaving the record untouched when it cannot be afforded.
pub fn consume_stamina(stats: &mut StatsRecord, amount: u32) -> Result<(), EngineError> {
    if stats.stamina < amount {
        return Err(EngineError::InsufficientResource {
            resource: "stamina",
            required: amount as u64,
            available: stats.stamina as u64,
        });
    }
    stats.stamina -= amount;
    Ok(())
}

/// Returns the amount actually restored after clamping.
pub fn restore_stamina(stats: &mut StatsRecord, amount: u32) -> u32 {
    let before = stats.stamina;
    stats.stamina = stats.stamina.saturating_add(amount).min(stats.max_stamina());
    stats.stamina.saturating_sub(before)
}

pub fn restore_health(stats: &mut StatsRecord, amount: u32) -> u32 {
    let before = stats.health;
    stats.health = stats.health.saturating_add(amount).min(stats.max_health);
    stats.health.saturating_sub(before)
}

/// Returns the health actually lost; health floors at zero.
pub fn lose_health(stats: &mut StatsRecord, amount: u32) -> u32 {
    let before = stats.health;
    stats.health = stats.health.saturating_sub(amount);
    before - stats.health
}

/// Growth granted once for every level reached.
pub fn apply_level_up_bonus(stats: &mut StatsRecord, new_level: u32) {
    stats.strength = stats.strength.saturating_add(2);
    stats.agility = stats.agility.saturating_add(2);
    stats.intelligence = stats.intelligence.saturating_add(2);
    stats.max_health = stats.max_health.saturating_add(10);
    let floor = new_level.saturating_mul(5).saturating_add(50);
    stats.max_stamina = Some(stats.max_stamina().max(floor));
    stats.stamina = stats.stamina.saturating_add(3);
    clamp_resources(stats);
}

/// Read-time projection: base stats plus every bonus set (passive skills,
/// titles). Never written back.
pub fn effective_stats<'a>(
    base: &StatsRecord,
    bonuses: impl IntoIterator<Item = &'a StatDeltas>,
) -> StatBlock {
    let mut totals: StatDeltas = StatDeltas::new();
    for set in bonuses {
        for (stat, delta) in set {
            *totals.entry(*stat).or_insert(0) += *delta;
        }
    }

    let mut block = base.snapshot();
    for stat in Stat::ALL {
        if let Some(delta) = totals.get(&stat) {
            let slot = block.get_mut(stat);
            *slot = apply_delta(*slot, *delta);
        }
    }
    block.stamina = block.stamina.min(block.max_stamina);
    block.health = block.health.min(block.max_health);
    block
}
