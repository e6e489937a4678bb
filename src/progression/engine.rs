//! Progression orchestrator.
//!
//! Every mutating operation takes the user's lock from the store, loads the
//! user and stats records, applies the rules and persists once. Rewarding
//! operations finish through [`Engine::settle`]: experience cascade, per-level
//! stat growth, history, persistence, then title re-evaluation.

use std::sync::Arc;

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{Config, RulesConfig};
use crate::progression::clock::{Clock, SystemClock};
use crate::progression::credentials::CredentialHasher;
use crate::progression::dungeon::{self, CappedDamage, DamagePolicy};
use crate::progression::errors::EngineError;
use crate::progression::experience;
use crate::progression::insight::{self, Insights};
use crate::progression::quest::{self, QuestDeletion};
use crate::progression::seed::{self, BEGINNER_TITLE_ID};
use crate::progression::shop::{self, InventoryLine, ItemUse};
use crate::progression::skill::{self, SkillOverview, SkillUse, UnlockedSkill};
use crate::progression::stats;
use crate::progression::storage::{ProgressStore, ProgressStoreBuilder};
use crate::progression::streak::{self, StreakUpdate};
use crate::progression::title::{self, EarnedTitle, TitleContext};
use crate::progression::types::{
    CompletionRecord, DungeonRank, DungeonSession, ProgressAction, ProgressEntry, QuestDraft,
    QuestEdit, QuestOwner, QuestRecord, ShopItem, StatBlock, StatDeltas, StatsRecord,
    TitleRecord, UserRecord, UserSkill, UserSnapshot,
};
use crate::validation::{validate_email, validate_password, validate_username};

/// Consolidated result of any rewarding event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settlement {
    pub exp_gained: u64,
    pub leveled_up: bool,
    pub levels_gained: u32,
    pub new_level: Option<u32>,
    pub new_titles: Vec<String>,
    pub messages: Vec<String>,
    pub user: UserSnapshot,
    /// Effective stats after the event (base plus passive and title bonuses).
    pub stats: StatBlock,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoginOutcome {
    pub user: UserSnapshot,
    pub streak: StreakUpdate,
    /// `(from, to)` when the login cost a level.
    pub level_penalty: Option<(u32, u32)>,
    pub messages: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub user: UserSnapshot,
    pub base_stats: StatBlock,
    pub effective_stats: StatBlock,
    pub titles: Vec<EarnedTitle>,
    pub skills: Vec<UnlockedSkill>,
    pub quests_completed: u64,
    pub active_dungeon: Option<DungeonSession>,
    pub insights: Insights,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SkillReport {
    pub usage: SkillUse,
    pub settlement: Settlement,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemReport {
    pub usage: ItemUse,
    pub settlement: Settlement,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DungeonStart {
    pub session: DungeonSession,
    /// Previous session that ran out of time and was settled as failed.
    pub expired: Option<DungeonSession>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Purchase {
    pub item: ShopItem,
    pub quantity_owned: u32,
    pub gold_left: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub username: String,
    pub level: u32,
    pub exp: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RestReport {
    pub restored: u32,
    pub stats: StatBlock,
}

pub struct Engine {
    store: ProgressStore,
    hasher: CredentialHasher,
    rules: RulesConfig,
    damage_policy: Box<dyn DamagePolicy>,
    clock: Arc<dyn Clock>,
}

impl Engine {
    pub fn new(store: ProgressStore, rules: RulesConfig) -> Self {
        let damage_policy = Box::new(CappedDamage::new(rules.max_damage_per_hit));
        Self {
            store,
            hasher: CredentialHasher::default(),
            rules,
            damage_policy,
            clock: Arc::new(SystemClock),
        }
    }

    /// Open the store under `storage.data_dir` and apply the rule and hashing settings.
    pub fn from_config(config: &Config) -> Result<Self, EngineError> {
        let store = ProgressStoreBuilder::new(config.storage.db_path()).open()?;
        let hasher = CredentialHasher::from_config(config.security.argon2.as_ref())?;
        Ok(Self::new(store, config.rules.clone()).with_hasher(hasher))
    }

    pub fn with_hasher(mut self, hasher: CredentialHasher) -> Self {
        self.hasher = hasher;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_damage_policy(mut self, policy: Box<dyn DamagePolicy>) -> Self {
        self.damage_policy = policy;
        self
    }

    pub fn store(&self) -> &ProgressStore {
        &self.store
    }

    pub fn rules(&self) -> &RulesConfig {
        &self.rules
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn record(&self, user_id: &str, action: ProgressAction, at: DateTime<Utc>) -> Result<(), EngineError> {
        self.store.append_history(&ProgressEntry {
            user_id: user_id.to_string(),
            action,
            at,
        })
    }

    fn load(&self, user_id: &str) -> Result<(UserRecord, StatsRecord), EngineError> {
        let user = self.store.get_user(user_id)?;
        let stats_record = self.store.get_stats(user_id)?;
        Ok((user, stats_record))
    }

    fn bonus_sets(&self, user_id: &str) -> Result<Vec<StatDeltas>, EngineError> {
        let mut sets = title::bonuses(&self.store, user_id)?;
        sets.push(skill::passive_bonuses(&self.store, user_id)?);
        Ok(sets)
    }

    fn effective(&self, stats_record: &StatsRecord) -> Result<StatBlock, EngineError> {
        let sets = self.bonus_sets(&stats_record.user_id)?;
        Ok(stats::effective_stats(stats_record, &sets))
    }

    fn title_context(&self, user: &UserRecord, stats_record: &StatsRecord, now: DateTime<Utc>) -> Result<TitleContext, EngineError> {
        Ok(TitleContext {
            level: user.level,
            stats: stats_record.snapshot(),
            quests_completed: self.store.count_completions(&user.id)?,
            hour: now.hour(),
        })
    }

    /// Apply `exp` through the cascade, grow stats for every level reached,
    /// persist both records and grant any newly satisfied titles.
    fn settle(
        &self,
        mut user: UserRecord,
        mut stats_record: StatsRecord,
        exp: u64,
        mut messages: Vec<String>,
        now: DateTime<Utc>,
    ) -> Result<Settlement, EngineError> {
        let progress = experience::add_exp(&mut user, exp);
        if exp > 0 {
            messages.push(format!("+{} EXP", exp));
        }
        for level in progress.reached() {
            stats::apply_level_up_bonus(&mut stats_record, level);
        }
        if progress.leveled_up() {
            self.record(
                &user.id,
                ProgressAction::LevelUp {
                    from: progress.old_level,
                    to: progress.new_level,
                },
                now,
            )?;
            messages.push(format!("LEVEL UP! You are now level {}", progress.new_level));
            log::info!(
                "user {} leveled up {} -> {}",
                user.username,
                progress.old_level,
                progress.new_level
            );
        }

        self.store.put_user(user.clone())?;
        self.store.put_stats(stats_record.clone())?;

        let ctx = self.title_context(&user, &stats_record, now)?;
        let granted = title::evaluate(&self.store, &user.id, &ctx, now)?;
        for earned in &granted {
            self.record(
                &user.id,
                ProgressAction::TitleEarned {
                    title_id: earned.id.clone(),
                },
                now,
            )?;
            messages.push(format!("Title earned: {}", earned.name));
        }

        Ok(Settlement {
            exp_gained: exp,
            leveled_up: progress.leveled_up(),
            levels_gained: progress.levels_gained,
            new_level: progress.leveled_up().then_some(progress.new_level),
            new_titles: granted.into_iter().map(|t| t.name).collect(),
            messages,
            stats: self.effective(&stats_record)?,
            user: UserSnapshot::from(&user),
        })
    }

    // ------------------------------------------------------------------------
    // Accounts
    // ------------------------------------------------------------------------

    /// Create a user with default stats and the automatic beginner title.
    pub fn register_user(&self, username: &str, email: &str, password: &str) -> Result<UserSnapshot, EngineError> {
        let username = validate_username(username)?;
        let email = validate_email(email)?;
        validate_password(password)?;
        let password_hash = self.hasher.hash(password)?;
        let now = self.now();

        let mut user = UserRecord::new(&Uuid::new_v4().to_string(), &username, &email, &password_hash);
        user.created_at = now;
        let _guard = self.store.lock_user(&user.id);
        self.store.create_user(user.clone())?;
        self.store.put_stats(StatsRecord::new(&user.id))?;

        let beginner = match self
            .store
            .list_titles()?
            .into_iter()
            .find(|t| t.id == BEGINNER_TITLE_ID)
        {
            Some(found) => Some(found),
            None => seed::starter_titles()
                .into_iter()
                .find(|t| t.id == BEGINNER_TITLE_ID),
        };
        if let Some(beginner) = beginner {
            title::grant(&self.store, &user.id, &beginner, now)?;
        }

        log::info!("registered user {} ({})", user.username, user.id);
        Ok(UserSnapshot::from(&user))
    }

    /// Verify credentials, then apply the inactivity penalty and login streak.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<LoginOutcome, EngineError> {
        let Some(found) = self.store.find_user_by_username(username)? else {
            log::warn!(target: "security", "login failed: unknown user {}", username);
            return Err(EngineError::InvalidCredentials);
        };
        if !self.hasher.verify(password, &found.password_hash)? {
            log::warn!(target: "security", "login failed: bad password for {}", found.username);
            return Err(EngineError::InvalidCredentials);
        }

        let _guard = self.store.lock_user(&found.id);
        let mut user = self.store.get_user(&found.id)?;
        let now = self.now();
        let mut messages = Vec::new();

        let level_penalty = experience::apply_inactivity_penalty(&mut user, now, self.rules.inactivity_penalty_days);
        if let Some((from, to)) = level_penalty {
            log::warn!("user {} inactive; level {} -> {}", user.username, from, to);
            messages.push(format!("Inactivity penalty: level {} -> {}", from, to));
            self.record(&user.id, ProgressAction::LevelPenalty { from, to }, now)?;
        }

        let streak = streak::record_login(&mut user, now);
        if !streak.message.is_empty() {
            messages.push(streak.message.clone());
        }
        user.last_login = Some(now);
        self.store.put_user(user.clone())?;
        log::info!(target: "security", "login succeeded for {}", user.username);

        Ok(LoginOutcome {
            user: UserSnapshot::from(&user),
            streak,
            level_penalty,
            messages,
        })
    }

    pub fn profile(&self, user_id: &str) -> Result<Profile, EngineError> {
        let (user, stats_record) = self.load(user_id)?;
        let base_stats = stats_record.snapshot();
        let offered = quest::list_available(&self.store, user_id, user.level, stats_record.stamina)?;
        Ok(Profile {
            effective_stats: self.effective(&stats_record)?,
            titles: title::earned(&self.store, user_id)?,
            skills: skill::list(&self.store, user_id)?.unlocked,
            quests_completed: self.store.count_completions(user_id)?,
            active_dungeon: self.store.active_dungeon(user_id)?,
            insights: insight::analyze(&base_stats, &offered),
            base_stats,
            user: UserSnapshot::from(&user),
        })
    }

    pub fn user_id_for(&self, username: &str) -> Result<String, EngineError> {
        self.store
            .find_user_by_username(username)?
            .map(|u| u.id)
            .ok_or_else(|| EngineError::not_found("user", username))
    }

    // ------------------------------------------------------------------------
    // Stat and experience ledgers
    // ------------------------------------------------------------------------

    /// Base stats as stored.
    pub fn stats(&self, user_id: &str) -> Result<StatBlock, EngineError> {
        Ok(self.store.get_stats(user_id)?.snapshot())
    }

    /// Apply signed stat deltas directly (administrative adjustment).
    pub fn adjust_stats(&self, user_id: &str, deltas: &StatDeltas) -> Result<StatBlock, EngineError> {
        let _guard = self.store.lock_user(user_id);
        let mut stats_record = self.store.get_stats(user_id)?;
        stats::increase(&mut stats_record, deltas);
        self.store.put_stats(stats_record.clone())?;
        Ok(stats_record.snapshot())
    }

    /// Award experience outside of quests.
    pub fn grant_exp(&self, user_id: &str, amount: u64) -> Result<Settlement, EngineError> {
        let _guard = self.store.lock_user(user_id);
        let (user, stats_record) = self.load(user_id)?;
        self.settle(user, stats_record, amount, Vec::new(), self.now())
    }

    /// Grant one level without spending experience.
    pub fn grant_level(&self, user_id: &str) -> Result<Settlement, EngineError> {
        let _guard = self.store.lock_user(user_id);
        let now = self.now();
        let (mut user, mut stats_record) = self.load(user_id)?;
        let progress = experience::level_up(&mut user);
        stats::apply_level_up_bonus(&mut stats_record, progress.new_level);
        self.record(
            user_id,
            ProgressAction::LevelUp {
                from: progress.old_level,
                to: progress.new_level,
            },
            now,
        )?;
        let mut settlement = self.settle(user, stats_record, 0, Vec::new(), now)?;
        settlement.leveled_up = true;
        settlement.levels_gained += 1;
        settlement.new_level = Some(settlement.user.level);
        settlement
            .messages
            .insert(0, format!("LEVEL UP! You are now level {}", progress.new_level));
        Ok(settlement)
    }

    pub fn rest(&self, user_id: &str, amount: Option<u32>) -> Result<RestReport, EngineError> {
        let _guard = self.store.lock_user(user_id);
        let mut stats_record = self.store.get_stats(user_id)?;
        let restored = stats::restore_stamina(&mut stats_record, amount.unwrap_or(self.rules.default_rest_amount));
        self.store.put_stats(stats_record.clone())?;
        Ok(RestReport {
            restored,
            stats: stats_record.snapshot(),
        })
    }

    // ------------------------------------------------------------------------
    // Quests
    // ------------------------------------------------------------------------

    pub fn list_available_quests(&self, user_id: &str) -> Result<Vec<QuestRecord>, EngineError> {
        let (user, stats_record) = self.load(user_id)?;
        quest::list_available(&self.store, user_id, user.level, stats_record.stamina)
    }

    pub fn complete_quest(&self, user_id: &str, quest_id: &str) -> Result<Settlement, EngineError> {
        let _guard = self.store.lock_user(user_id);
        let now = self.now();
        let (user, mut stats_record) = self.load(user_id)?;
        let reward = quest::reward_for(&self.store, user_id, quest_id)?;

        stats::consume_stamina(&mut stats_record, reward.stamina_cost)?;
        stats::increase(&mut stats_record, &reward.stat_rewards);

        self.store.record_completion(&CompletionRecord {
            user_id: user_id.to_string(),
            quest_id: quest_id.to_string(),
            exp_gained: reward.exp,
            completed_at: now,
        })?;
        self.record(
            user_id,
            ProgressAction::QuestCompleted {
                quest_id: quest_id.to_string(),
                exp_gained: reward.exp,
            },
            now,
        )?;
        log::info!("user {} completed quest {} ({:?})", user.username, quest_id, reward.source);

        let mut messages = vec![format!("Quest complete: {} (-{} stamina)", quest_id, reward.stamina_cost)];
        for (stat, delta) in &reward.stat_rewards {
            messages.push(format!("{:+} {}", delta, stat));
        }
        self.settle(user, stats_record, reward.exp, messages, now)
    }

    pub fn add_custom_quest(&self, user_id: &str, draft: QuestDraft) -> Result<QuestRecord, EngineError> {
        let _guard = self.store.lock_user(user_id);
        self.store.get_user(user_id)?;
        quest::add_custom(&self.store, user_id, draft, self.now())
    }

    pub fn edit_quest(&self, user_id: &str, quest_id: &str, changes: &QuestEdit) -> Result<QuestRecord, EngineError> {
        let _guard = self.store.lock_user(user_id);
        self.store.get_user(user_id)?;
        quest::edit(&self.store, user_id, quest_id, changes)
    }

    pub fn delete_quest(&self, user_id: &str, quest_id: &str) -> Result<QuestDeletion, EngineError> {
        let _guard = self.store.lock_user(user_id);
        self.store.get_user(user_id)?;
        quest::delete(&self.store, user_id, quest_id)
    }

    /// Place a quest row in the main catalog for a single user.
    pub fn assign_quest(&self, user_id: &str, mut quest: QuestRecord) -> Result<QuestRecord, EngineError> {
        let _guard = self.store.lock_user(user_id);
        self.store.get_user(user_id)?;
        quest.owner = QuestOwner::Player {
            user_id: user_id.to_string(),
        };
        quest.is_custom = false;
        self.store.put_quest(quest.clone())?;
        Ok(quest)
    }

    // ------------------------------------------------------------------------
    // Skills
    // ------------------------------------------------------------------------

    pub fn list_skills(&self, user_id: &str) -> Result<SkillOverview, EngineError> {
        self.store.get_user(user_id)?;
        skill::list(&self.store, user_id)
    }

    pub fn unlock_skill(&self, user_id: &str, skill_id: &str) -> Result<UserSkill, EngineError> {
        let _guard = self.store.lock_user(user_id);
        let now = self.now();
        let mut user = self.store.get_user(user_id)?;
        let unlocked = skill::unlock(&self.store, &mut user, skill_id, now)?;
        self.store.put_user(user)?;
        self.record(
            user_id,
            ProgressAction::SkillUnlocked {
                skill_id: skill_id.to_string(),
            },
            now,
        )?;
        Ok(unlocked)
    }

    pub fn use_skill(&self, user_id: &str, skill_id: &str) -> Result<SkillReport, EngineError> {
        let _guard = self.store.lock_user(user_id);
        let now = self.now();
        let (user, mut stats_record) = self.load(user_id)?;
        let usage = skill::use_active(&self.store, &mut stats_record, user_id, skill_id)?;
        self.record(
            user_id,
            ProgressAction::SkillUsed {
                skill_id: skill_id.to_string(),
                skill_level: usage.skill_level,
            },
            now,
        )?;

        let mut messages = vec![format!("Used {} (-{} stamina)", skill_id, usage.stamina_spent)];
        if usage.health_restored > 0 {
            messages.push(format!("+{} health", usage.health_restored));
        }
        if usage.stamina_restored > 0 {
            messages.push(format!("+{} stamina", usage.stamina_restored));
        }
        if usage.skill_leveled_up {
            messages.push(format!("Skill level up! {} is now level {}", skill_id, usage.skill_level));
        }
        let settlement = self.settle(user, stats_record, usage.exp_granted, messages, now)?;
        Ok(SkillReport { usage, settlement })
    }

    // ------------------------------------------------------------------------
    // Titles
    // ------------------------------------------------------------------------

    /// Re-evaluate every title for the user. Returns the names newly granted.
    pub fn check_titles(&self, user_id: &str) -> Result<Vec<String>, EngineError> {
        let _guard = self.store.lock_user(user_id);
        let now = self.now();
        let (user, stats_record) = self.load(user_id)?;
        let ctx = self.title_context(&user, &stats_record, now)?;
        let granted = title::evaluate(&self.store, user_id, &ctx, now)?;
        for earned in &granted {
            self.record(
                user_id,
                ProgressAction::TitleEarned {
                    title_id: earned.id.clone(),
                },
                now,
            )?;
        }
        Ok(granted.into_iter().map(|t| t.name).collect())
    }

    pub fn titles(&self, user_id: &str) -> Result<Vec<EarnedTitle>, EngineError> {
        title::earned(&self.store, user_id)
    }

    /// Replace a title's registry definition; every holder's bonus follows.
    pub fn define_title(&self, definition: TitleRecord) -> Result<(), EngineError> {
        log::info!("title {} redefined", definition.id);
        self.store.put_defined_title(definition)
    }

    // ------------------------------------------------------------------------
    // Dungeons
    // ------------------------------------------------------------------------

    /// Settle `session` as failed if its time is up. Persists the outcome.
    fn settle_expired(&self, session: &mut DungeonSession, now: DateTime<Utc>) -> Result<bool, EngineError> {
        let mut stats_record = self.store.get_stats(&session.user_id)?;
        let Some(lost) = dungeon::expire_if_due(session, &mut stats_record, now)? else {
            return Ok(false);
        };
        self.store.put_dungeon(session.clone())?;
        self.store.put_stats(stats_record)?;
        self.record(
            &session.user_id,
            ProgressAction::DungeonFailed {
                rank: session.rank,
                health_lost: lost,
            },
            now,
        )?;
        Ok(true)
    }

    fn expired_conflict(session: &DungeonSession) -> EngineError {
        EngineError::Conflict(format!("dungeon session {} ran out of time and failed", session.id))
    }

    pub fn start_dungeon(&self, user_id: &str, rank: DungeonRank) -> Result<DungeonStart, EngineError> {
        let _guard = self.store.lock_user(user_id);
        let now = self.now();
        let user = self.store.get_user(user_id)?;

        let mut expired = None;
        if let Some(mut active) = self.store.active_dungeon(user_id)? {
            if !self.settle_expired(&mut active, now)? {
                return Err(EngineError::Conflict(format!(
                    "dungeon session {} (rank {}) is still active",
                    active.id, active.rank
                )));
            }
            expired = Some(active);
        }

        dungeon::check_entry(user.level, rank, self.rules.enforce_dungeon_min_level)?;
        let session = dungeon::open(user_id, rank, now);
        self.store.put_dungeon(session.clone())?;
        log::info!("user {} entered rank {} dungeon {}", user.username, rank, session.id);
        Ok(DungeonStart { session, expired })
    }

    pub fn active_dungeon(&self, user_id: &str) -> Result<Option<DungeonSession>, EngineError> {
        self.store.active_dungeon(user_id)
    }

    pub fn damage_dungeon_boss(&self, user_id: &str, session_id: &str, amount: u32) -> Result<DungeonSession, EngineError> {
        let _guard = self.store.lock_user(user_id);
        let now = self.now();
        let mut session = dungeon::load_owned(&self.store, user_id, session_id)?;
        dungeon::ensure_active(&session)?;
        if self.settle_expired(&mut session, now)? {
            return Err(Self::expired_conflict(&session));
        }
        dungeon::apply_damage(&mut session, amount, self.damage_policy.as_ref())?;
        self.store.put_dungeon(session.clone())?;
        Ok(session)
    }

    pub fn complete_dungeon(&self, user_id: &str, session_id: &str) -> Result<Settlement, EngineError> {
        let _guard = self.store.lock_user(user_id);
        let now = self.now();
        let mut session = dungeon::load_owned(&self.store, user_id, session_id)?;
        dungeon::ensure_active(&session)?;
        if self.settle_expired(&mut session, now)? {
            return Err(Self::expired_conflict(&session));
        }
        let exp = dungeon::complete(&mut session, now)?;
        self.store.put_dungeon(session.clone())?;
        self.record(
            user_id,
            ProgressAction::DungeonCleared {
                rank: session.rank,
                exp_gained: exp,
            },
            now,
        )?;
        log::info!("user {} cleared rank {} dungeon {}", user_id, session.rank, session.id);

        let (user, stats_record) = self.load(user_id)?;
        let messages = vec![format!("Dungeon cleared: rank {}", session.rank)];
        self.settle(user, stats_record, exp, messages, now)
    }

    pub fn fail_dungeon(&self, user_id: &str, session_id: &str) -> Result<Settlement, EngineError> {
        let _guard = self.store.lock_user(user_id);
        let now = self.now();
        let mut session = dungeon::load_owned(&self.store, user_id, session_id)?;
        let (user, mut stats_record) = self.load(user_id)?;
        let lost = dungeon::fail(&mut session, &mut stats_record, now)?;
        self.store.put_dungeon(session.clone())?;
        self.record(
            user_id,
            ProgressAction::DungeonFailed {
                rank: session.rank,
                health_lost: lost,
            },
            now,
        )?;
        let messages = vec![format!("Dungeon failed: -{} health", lost)];
        self.settle(user, stats_record, 0, messages, now)
    }

    // ------------------------------------------------------------------------
    // Shop & inventory
    // ------------------------------------------------------------------------

    pub fn shop(&self) -> Result<Vec<ShopItem>, EngineError> {
        self.store.list_items()
    }

    pub fn buy_item(&self, user_id: &str, item_id: &str, quantity: u32) -> Result<Purchase, EngineError> {
        let _guard = self.store.lock_user(user_id);
        let now = self.now();
        let mut user = self.store.get_user(user_id)?;
        let (item, stack) = shop::buy(&self.store, &mut user, item_id, quantity)?;
        self.store.put_user(user.clone())?;
        self.record(
            user_id,
            ProgressAction::ItemPurchased {
                item_id: item_id.to_string(),
                price: item.price.saturating_mul(quantity as u64),
            },
            now,
        )?;
        Ok(Purchase {
            item,
            quantity_owned: stack.quantity,
            gold_left: user.gold,
        })
    }

    pub fn inventory(&self, user_id: &str) -> Result<Vec<InventoryLine>, EngineError> {
        shop::inventory(&self.store, user_id)
    }

    pub fn use_item(&self, user_id: &str, item_id: &str) -> Result<ItemReport, EngineError> {
        let _guard = self.store.lock_user(user_id);
        let now = self.now();
        let (user, mut stats_record) = self.load(user_id)?;
        let usage = shop::use_item(&self.store, &mut stats_record, user_id, item_id)?;
        self.record(
            user_id,
            ProgressAction::ItemUsed {
                item_id: item_id.to_string(),
            },
            now,
        )?;
        let mut messages = vec![format!("Used {}", item_id)];
        if usage.health_restored > 0 {
            messages.push(format!("+{} health", usage.health_restored));
        }
        if usage.stamina_restored > 0 {
            messages.push(format!("+{} stamina", usage.stamina_restored));
        }
        let settlement = self.settle(user, stats_record, usage.exp_granted, messages, now)?;
        Ok(ItemReport { usage, settlement })
    }

    pub fn grant_gold(&self, user_id: &str, amount: u64) -> Result<UserSnapshot, EngineError> {
        let _guard = self.store.lock_user(user_id);
        let mut user = self.store.get_user(user_id)?;
        user.gold = user.gold.saturating_add(amount);
        self.store.put_user(user.clone())?;
        log::info!("granted {} gold to {}", amount, user.username);
        Ok(UserSnapshot::from(&user))
    }

    // ------------------------------------------------------------------------
    // Cross-user views
    // ------------------------------------------------------------------------

    /// Top users by level, then experience.
    pub fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>, EngineError> {
        let mut users = self.store.list_users()?;
        users.sort_by(|a, b| {
            b.level
                .cmp(&a.level)
                .then(b.exp.cmp(&a.exp))
                .then_with(|| a.username.cmp(&b.username))
        });
        Ok(users
            .into_iter()
            .take(self.rules.leaderboard_size)
            .enumerate()
            .map(|(index, user)| LeaderboardEntry {
                rank: index + 1,
                username: user.username,
                level: user.level,
                exp: user.exp,
            })
            .collect())
    }

    pub fn history(&self, user_id: &str, limit: usize) -> Result<Vec<ProgressEntry>, EngineError> {
        self.store.list_history(user_id, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progression::clock::ManualClock;
    use crate::progression::types::Stat;
    use argon2::Params;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn setup() -> (Engine, Arc<ManualClock>, TempDir) {
        let dir = TempDir::new().expect("tempdir");
        let store = ProgressStoreBuilder::new(dir.path()).open().expect("store");
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()));
        let engine = Engine::new(store, RulesConfig::default())
            .with_hasher(CredentialHasher::with_params(Params::new(256, 1, 1, None).unwrap()))
            .with_clock(clock.clone());
        (engine, clock, dir)
    }

    #[test]
    fn registration_grants_beginner_and_defaults() {
        let (engine, _clock, _dir) = setup();
        let user = engine.register_user("hunter", "hunter@example.com", "password1").unwrap();
        assert_eq!(user.level, 1);
        assert_eq!(user.exp_required, 100);
        let profile = engine.profile(&user.id).unwrap();
        assert_eq!(profile.base_stats.strength, 10);
        assert_eq!(profile.base_stats.max_stamina, 100);
        assert_eq!(profile.titles.len(), 1);
        assert_eq!(profile.titles[0].title_id, "beginner");
    }

    #[test]
    fn quest_completion_settles_in_order() {
        let (engine, _clock, _dir) = setup();
        let user = engine.register_user("hunter", "hunter@example.com", "password1").unwrap();
        let settlement = engine.complete_quest(&user.id, "sys_coding").unwrap();
        assert_eq!(settlement.exp_gained, 150);
        assert!(settlement.leveled_up);
        assert_eq!(settlement.user.level, 2);
        assert_eq!(settlement.user.exp, 50);
        let base = engine.stats(&user.id).unwrap();
        // 10 + 4 reward + 2 level bonus
        assert_eq!(base.intelligence, 16);
        // 50 - 20 cost + 3 level bonus
        assert_eq!(base.stamina, 33);
    }

    #[test]
    fn failed_stamina_check_changes_nothing() {
        let (engine, _clock, _dir) = setup();
        let user = engine.register_user("hunter", "hunter@example.com", "password1").unwrap();
        engine
            .adjust_stats(&user.id, &[(Stat::Stamina, -45)].into_iter().collect())
            .unwrap();
        let err = engine.complete_quest(&user.id, "sys_coding").unwrap_err();
        assert!(matches!(err, EngineError::InsufficientResource { .. }));
        assert_eq!(engine.stats(&user.id).unwrap().stamina, 5);
        assert!(engine.history(&user.id, 10).unwrap().is_empty());
    }

    #[test]
    fn leaderboard_orders_by_level_then_exp() {
        let (engine, _clock, _dir) = setup();
        let a = engine.register_user("alpha", "a@example.com", "password1").unwrap();
        let b = engine.register_user("bravo", "b@example.com", "password1").unwrap();
        engine.register_user("charlie", "c@example.com", "password1").unwrap();
        engine.grant_exp(&a.id, 50).unwrap();
        engine.grant_exp(&b.id, 150).unwrap();
        let board = engine.leaderboard().unwrap();
        let names: Vec<_> = board.iter().map(|e| e.username.as_str()).collect();
        assert_eq!(names, vec!["bravo", "alpha", "charlie"]);
        assert_eq!(board[0].rank, 1);
    }

    #[test]
    fn night_activity_earns_night_owl() {
        let (engine, clock, _dir) = setup();
        let user = engine.register_user("hunter", "hunter@example.com", "password1").unwrap();
        clock.set(Utc.with_ymd_and_hms(2024, 6, 1, 23, 30, 0).unwrap());
        let settlement = engine.complete_quest(&user.id, "light_walk").unwrap();
        assert!(settlement.new_titles.contains(&"Night Owl".to_string()));
        assert_eq!(settlement.stats.intelligence, 13);
    }
}
