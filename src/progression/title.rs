//! Title engine: condition evaluation and idempotent grants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::progression::errors::EngineError;
use crate::progression::storage::ProgressStore;
use crate::progression::types::{StatBlock, StatDeltas, TitleCondition, TitleRecord, UserTitle};

/// Everything a title condition may look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TitleContext {
    pub level: u32,
    /// Base stats; title and skill bonuses never qualify a user for more titles.
    pub stats: StatBlock,
    pub quests_completed: u64,
    /// UTC hour of the triggering action.
    pub hour: u32,
}

fn hour_in_window(hour: u32, from: u32, until: u32) -> bool {
    if from <= until {
        (from..until).contains(&hour)
    } else {
        hour >= from || hour < until
    }
}

pub fn is_met(condition: &TitleCondition, ctx: &TitleContext) -> bool {
    match condition {
        TitleCondition::Automatic => true,
        TitleCondition::LevelAtLeast { level } => ctx.level >= *level,
        TitleCondition::QuestCountAtLeast { count } => ctx.quests_completed >= *count,
        TitleCondition::StatAtLeast { stat, value } => ctx.stats.get(*stat) >= *value,
        TitleCondition::ActiveDuringHours { from, until } => {
            hour_in_window(ctx.hour, *from, *until)
        }
    }
}

/// Grant `title` to the user unless already held. Returns whether it was new.
pub fn grant(
    store: &ProgressStore,
    user_id: &str,
    title: &TitleRecord,
    now: DateTime<Utc>,
) -> Result<bool, EngineError> {
    if store.has_user_title(user_id, &title.id)? {
        return Ok(false);
    }
    store.put_user_title(UserTitle::new(user_id, title, now))?;
    store.define_title_if_absent(title)?;
    log::info!("user {} earned title {}", user_id, title.id);
    Ok(true)
}

/// Evaluate the whole catalog and grant every newly satisfied title.
pub fn evaluate(
    store: &ProgressStore,
    user_id: &str,
    ctx: &TitleContext,
    now: DateTime<Utc>,
) -> Result<Vec<TitleRecord>, EngineError> {
    let mut granted = Vec::new();
    for title in store.list_titles()? {
        if is_met(&title.condition, ctx) && grant(store, user_id, &title, now)? {
            granted.push(title);
        }
    }
    Ok(granted)
}

/// Bonus sets of every title the user holds, read from the defined-titles registry.
pub fn bonuses(store: &ProgressStore, user_id: &str) -> Result<Vec<StatDeltas>, EngineError> {
    let mut sets = Vec::new();
    for held in store.list_user_titles(user_id)? {
        match store.get_defined_title(&held.title_id)? {
            Some(definition) => sets.push(definition.stat_bonus),
            None => log::warn!(
                "title {} held by {} has no registry entry",
                held.title_id,
                user_id
            ),
        }
    }
    Ok(sets)
}

/// A held title joined with its current registry definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EarnedTitle {
    pub title_id: String,
    pub name: String,
    pub description: String,
    pub stat_bonus: StatDeltas,
    pub granted_at: DateTime<Utc>,
}

pub fn earned(store: &ProgressStore, user_id: &str) -> Result<Vec<EarnedTitle>, EngineError> {
    let mut titles = Vec::new();
    for held in store.list_user_titles(user_id)? {
        let definition = store.get_defined_title(&held.title_id)?;
        titles.push(EarnedTitle {
            description: definition
                .as_ref()
                .map(|d| d.description.clone())
                .unwrap_or_default(),
            stat_bonus: definition.map(|d| d.stat_bonus).unwrap_or_default(),
            title_id: held.title_id,
            name: held.title_name,
            granted_at: held.granted_at,
        });
    }
    Ok(titles)
}
