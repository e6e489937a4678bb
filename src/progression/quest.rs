//! Quest catalog: global quests plus sparse per-user overrides.
//!
//! A user's view is the merge, by quest id, of the global catalog, their
//! custom quests and their per-user main-catalog rows, in that order, later
//! rows replacing earlier ones.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::progression::errors::EngineError;
use crate::progression::storage::ProgressStore;
use crate::progression::types::{
    Difficulty, QuestDraft, QuestEdit, QuestKind, QuestOwner, QuestRecord, Stat, StatDeltas,
};
use crate::validation::{validate_quest_description, validate_quest_title};

/// Experience granted for an id that resolves nowhere.
pub const FALLBACK_EXP: u64 = 50;
pub const FALLBACK_STAMINA_COST: u32 = 10;

/// Which quests are offered, decided from the user's condition. First match wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionTier {
    /// Stamina below 30: only light quests (cost ≤ 10).
    Recovery,
    /// Below level 5: easy and medium quests.
    Novice,
    Open,
}

impl SelectionTier {
    pub fn for_user(level: u32, stamina: u32) -> Self {
        if stamina < 30 {
            SelectionTier::Recovery
        } else if level < 5 {
            SelectionTier::Novice
        } else {
            SelectionTier::Open
        }
    }

    pub fn admits(&self, quest: &QuestRecord) -> bool {
        match self {
            SelectionTier::Recovery => quest.stamina_cost <= 10,
            SelectionTier::Novice => {
                matches!(quest.difficulty, Difficulty::Easy | Difficulty::Medium)
            }
            SelectionTier::Open => true,
        }
    }
}

/// Where a completion reward came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RewardSource {
    Catalog,
    Legacy,
    Fallback,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestReward {
    pub exp: u64,
    pub stat_rewards: StatDeltas,
    pub stamina_cost: u32,
    pub source: RewardSource,
}

/// Rewards for quest ids that predate the catalog.
fn legacy_reward(quest_id: &str) -> Option<QuestReward> {
    let (exp, stamina_cost, stats) = match quest_id {
        "daily_coding" => (100, 20, vec![(Stat::Intelligence, 3), (Stat::Agility, 1)]),
        "morning_exercise" => (50, 10, vec![(Stat::Strength, 2)]),
        "study_session" => (60, 15, vec![(Stat::Intelligence, 2)]),
        _ => return None,
    };
    Some(QuestReward {
        exp,
        stat_rewards: stats.into_iter().collect(),
        stamina_cost,
        source: RewardSource::Legacy,
    })
}

/// The merged catalog as seen by one user, keyed by quest id.
pub fn resolve_catalog(
    store: &ProgressStore,
    user_id: &str,
) -> Result<BTreeMap<String, QuestRecord>, EngineError> {
    let mut merged = BTreeMap::new();
    let layers = [
        store.list_world_quests()?,
        store.list_custom_quests(user_id)?,
        store.list_owned_quests(user_id)?,
    ];
    for quest in layers.into_iter().flatten() {
        merged.insert(quest.id.clone(), quest);
    }
    log::debug!("resolved {} quests for user {}", merged.len(), user_id);
    Ok(merged)
}

/// Look a single quest up with the same precedence as [`resolve_catalog`].
pub fn resolve(
    store: &ProgressStore,
    user_id: &str,
    quest_id: &str,
) -> Result<Option<QuestRecord>, EngineError> {
    if let Some(quest) = store.get_owned_quest(user_id, quest_id)? {
        return Ok(Some(quest));
    }
    if let Some(quest) = store.get_custom_quest(user_id, quest_id)? {
        return Ok(Some(quest));
    }
    store.get_world_quest(quest_id)
}

/// Quests offered to a user at the given level and stamina.
pub fn list_available(
    store: &ProgressStore,
    user_id: &str,
    level: u32,
    stamina: u32,
) -> Result<Vec<QuestRecord>, EngineError> {
    let tier = SelectionTier::for_user(level, stamina);
    let offered: Vec<QuestRecord> = resolve_catalog(store, user_id)?
        .into_values()
        .filter(|quest| tier.admits(quest))
        .filter(|quest| quest.stamina_cost <= stamina)
        .collect();
    log::debug!(
        "offering {} quests to user {} ({:?} tier)",
        offered.len(),
        user_id,
        tier
    );
    Ok(offered)
}

/// Reward for completing `quest_id`: the resolved quest, else the legacy
/// table, else the default reward.
pub fn reward_for(
    store: &ProgressStore,
    user_id: &str,
    quest_id: &str,
) -> Result<QuestReward, EngineError> {
    if let Some(quest) = resolve(store, user_id, quest_id)? {
        return Ok(QuestReward {
            exp: quest.exp_reward,
            stat_rewards: quest.stat_rewards,
            stamina_cost: quest.stamina_cost,
            source: RewardSource::Catalog,
        });
    }
    if let Some(reward) = legacy_reward(quest_id) {
        return Ok(reward);
    }
    log::warn!(
        "quest {} not found for user {}; using default reward",
        quest_id,
        user_id
    );
    Ok(QuestReward {
        exp: FALLBACK_EXP,
        stat_rewards: StatDeltas::new(),
        stamina_cost: FALLBACK_STAMINA_COST,
        source: RewardSource::Fallback,
    })
}

/// Create a custom quest owned by `user_id`.
pub fn add_custom(
    store: &ProgressStore,
    user_id: &str,
    draft: QuestDraft,
    now: DateTime<Utc>,
) -> Result<QuestRecord, EngineError> {
    let title = validate_quest_title(&draft.title)?;
    let description = validate_quest_description(&draft.description)?;

    let base_id = format!("custom_{}", now.timestamp());
    let mut quest_id = base_id.clone();
    let mut suffix = 1u32;
    while store.get_custom_quest(user_id, &quest_id)?.is_some() {
        suffix += 1;
        quest_id = format!("{}_{}", base_id, suffix);
    }

    let mut quest = QuestRecord::world(&quest_id, &title, &description, draft.difficulty)
        .with_kind(QuestKind::Custom)
        .with_exp_reward(draft.exp_reward)
        .with_stamina_cost(draft.stamina_cost)
        .owned_by(user_id);
    quest.is_custom = true;
    quest.created_at = now;
    store.put_quest(quest.clone())?;
    log::info!("user {} created custom quest {}", user_id, quest.id);
    Ok(quest)
}

fn apply_edit(quest: &mut QuestRecord, edit: &QuestEdit) -> Result<(), EngineError> {
    if let Some(title) = &edit.title {
        quest.title = validate_quest_title(title)?;
    }
    if let Some(description) = &edit.description {
        quest.description = validate_quest_description(description)?;
    }
    if let Some(difficulty) = edit.difficulty {
        quest.difficulty = difficulty;
    }
    if let Some(exp) = edit.exp_reward {
        quest.exp_reward = exp;
    }
    if let Some(cost) = edit.stamina_cost {
        quest.stamina_cost = cost;
    }
    if let Some(rewards) = &edit.stat_rewards {
        quest.stat_rewards = rewards.clone();
    }
    Ok(())
}

/// Edit a quest for one user. Rows the user owns change in place; a global
/// quest is cloned into the user's custom set and the clone is edited.
pub fn edit(
    store: &ProgressStore,
    user_id: &str,
    quest_id: &str,
    changes: &QuestEdit,
) -> Result<QuestRecord, EngineError> {
    if changes.is_empty() {
        return Err(EngineError::InvalidInput("no quest fields to update".into()));
    }

    let own_row = match store.get_custom_quest(user_id, quest_id)? {
        Some(quest) => Some(quest),
        None => store.get_owned_quest(user_id, quest_id)?,
    };
    let mut quest = match own_row {
        Some(quest) => quest,
        None => {
            let global = store
                .get_world_quest(quest_id)?
                .ok_or_else(|| EngineError::not_found("quest", quest_id))?;
            let mut clone = global;
            clone.owner = QuestOwner::Player {
                user_id: user_id.to_string(),
            };
            clone.is_custom = true;
            clone.original_id = Some(quest_id.to_string());
            log::debug!("cloning global quest {} for user {}", quest_id, user_id);
            clone
        }
    };

    apply_edit(&mut quest, changes)?;
    store.put_quest(quest.clone())?;
    Ok(quest)
}

/// Which row a delete removed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuestDeletion {
    Global,
    Custom,
    Owned,
}

/// Delete from the global catalog first, then the user's own rows.
/// Removing a global quest hides it from every user.
pub fn delete(
    store: &ProgressStore,
    user_id: &str,
    quest_id: &str,
) -> Result<QuestDeletion, EngineError> {
    if store.delete_world_quest(quest_id)? {
        log::warn!(
            "user {} deleted global quest {}; removed for all users",
            user_id,
            quest_id
        );
        return Ok(QuestDeletion::Global);
    }
    if store.delete_custom_quest(user_id, quest_id)? {
        return Ok(QuestDeletion::Custom);
    }
    if store.delete_owned_quest(user_id, quest_id)? {
        return Ok(QuestDeletion::Owned);
    }
    Err(EngineError::not_found("quest", quest_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progression::storage::ProgressStoreBuilder;
    use tempfile::TempDir;

    fn setup_test_store() -> (ProgressStore, TempDir) {
        let dir = TempDir::new().expect("tempdir");
        let store = ProgressStoreBuilder::new(dir.path())
            .without_seed()
            .open()
            .expect("store");
        (store, dir)
    }

    fn quest(id: &str, difficulty: Difficulty, cost: u32) -> QuestRecord {
        QuestRecord::world(id, id, "", difficulty).with_stamina_cost(cost)
    }

    #[test]
    fn selection_tier_priority() {
        assert_eq!(SelectionTier::for_user(10, 29), SelectionTier::Recovery);
        assert_eq!(SelectionTier::for_user(1, 10), SelectionTier::Recovery);
        assert_eq!(SelectionTier::for_user(4, 30), SelectionTier::Novice);
        assert_eq!(SelectionTier::for_user(5, 30), SelectionTier::Open);
    }

    #[test]
    fn availability_filters_by_tier_and_affordability() {
        let (store, _dir) = setup_test_store();
        store.put_quest(quest("light", Difficulty::Easy, 5)).unwrap();
        store.put_quest(quest("mid", Difficulty::Medium, 20)).unwrap();
        store.put_quest(quest("heavy", Difficulty::Ss, 30)).unwrap();
        store.put_quest(quest("pricey", Difficulty::Hard, 60)).unwrap();

        let ids = |quests: Vec<QuestRecord>| quests.into_iter().map(|q| q.id).collect::<Vec<_>>();

        assert_eq!(ids(list_available(&store, "u", 9, 20).unwrap()), vec!["light"]);
        assert_eq!(
            ids(list_available(&store, "u", 2, 50).unwrap()),
            vec!["light", "mid"]
        );
        assert_eq!(
            ids(list_available(&store, "u", 9, 50).unwrap()),
            vec!["heavy", "light", "mid"]
        );
    }

    #[test]
    fn later_layers_override_earlier_ones() {
        let (store, _dir) = setup_test_store();
        store.put_quest(quest("q", Difficulty::Easy, 5)).unwrap();
        let mut custom = quest("q", Difficulty::Easy, 6).owned_by("u");
        custom.is_custom = true;
        store.put_quest(custom).unwrap();
        let merged = resolve_catalog(&store, "u").unwrap();
        assert_eq!(merged["q"].stamina_cost, 6);

        store
            .put_quest(quest("q", Difficulty::Easy, 7).owned_by("u"))
            .unwrap();
        assert_eq!(resolve_catalog(&store, "u").unwrap()["q"].stamina_cost, 7);
        assert_eq!(resolve(&store, "u", "q").unwrap().unwrap().stamina_cost, 7);
        assert_eq!(resolve_catalog(&store, "other").unwrap()["q"].stamina_cost, 5);
    }

    #[test]
    fn reward_falls_back_through_legacy_to_default() {
        let (store, _dir) = setup_test_store();
        let legacy = reward_for(&store, "u", "daily_coding").unwrap();
        assert_eq!(legacy.source, RewardSource::Legacy);
        assert_eq!(legacy.exp, 100);
        assert_eq!(legacy.stamina_cost, 20);
        assert_eq!(legacy.stat_rewards.get(&Stat::Agility), Some(&1));

        let unknown = reward_for(&store, "u", "nope").unwrap();
        assert_eq!(unknown.source, RewardSource::Fallback);
        assert_eq!(unknown.exp, FALLBACK_EXP);
        assert_eq!(unknown.stamina_cost, FALLBACK_STAMINA_COST);
    }

    #[test]
    fn custom_ids_do_not_collide_within_a_second() {
        let (store, _dir) = setup_test_store();
        let now = Utc::now();
        let first = add_custom(&store, "u", QuestDraft::new("Stretch", ""), now).unwrap();
        let second = add_custom(&store, "u", QuestDraft::new("Journal", ""), now).unwrap();
        assert_eq!(first.id, format!("custom_{}", now.timestamp()));
        assert_ne!(first.id, second.id);
        assert!(second.is_custom);
        assert_eq!(store.list_custom_quests("u").unwrap().len(), 2);
    }

    #[test]
    fn editing_a_global_quest_clones_it() {
        let (store, _dir) = setup_test_store();
        store.put_quest(quest("g", Difficulty::Easy, 5)).unwrap();
        let changes = QuestEdit {
            exp_reward: Some(999),
            ..QuestEdit::default()
        };
        let edited = edit(&store, "u", "g", &changes).unwrap();
        assert_eq!(edited.original_id.as_deref(), Some("g"));
        assert_eq!(edited.exp_reward, 999);
        assert_eq!(store.get_world_quest("g").unwrap().unwrap().exp_reward, 50);

        // A second edit updates the clone in place.
        let changes = QuestEdit {
            title: Some("Mine".into()),
            ..QuestEdit::default()
        };
        let again = edit(&store, "u", "g", &changes).unwrap();
        assert_eq!(again.exp_reward, 999);
        assert_eq!(again.title, "Mine");
        assert_eq!(store.list_custom_quests("u").unwrap().len(), 1);
    }

    #[test]
    fn empty_edit_and_unknown_quest_are_rejected() {
        let (store, _dir) = setup_test_store();
        assert!(matches!(
            edit(&store, "u", "g", &QuestEdit::default()),
            Err(EngineError::InvalidInput(_))
        ));
        let changes = QuestEdit {
            exp_reward: Some(1),
            ..QuestEdit::default()
        };
        assert!(matches!(
            edit(&store, "u", "missing", &changes),
            Err(EngineError::NotFound(_))
        ));
    }

    #[test]
    fn delete_prefers_global_then_custom() {
        let (store, _dir) = setup_test_store();
        store.put_quest(quest("g", Difficulty::Easy, 5)).unwrap();
        let custom = add_custom(&store, "u", QuestDraft::new("Mine", ""), Utc::now()).unwrap();

        assert_eq!(delete(&store, "u", "g").unwrap(), QuestDeletion::Global);
        assert_eq!(delete(&store, "u", &custom.id).unwrap(), QuestDeletion::Custom);
        assert!(matches!(
            delete(&store, "u", "g"),
            Err(EngineError::NotFound(_))
        ));
    }
}
