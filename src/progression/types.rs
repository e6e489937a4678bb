use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const USER_SCHEMA_VERSION: u8 = 1;
pub const STATS_SCHEMA_VERSION: u8 = 1;
pub const QUEST_SCHEMA_VERSION: u8 = 1;
pub const SKILL_SCHEMA_VERSION: u8 = 1;
pub const TITLE_SCHEMA_VERSION: u8 = 1;
pub const DUNGEON_SCHEMA_VERSION: u8 = 1;
pub const ITEM_SCHEMA_VERSION: u8 = 1;

/// Stamina ceiling for stats records that predate the `max_stamina` field.
pub const DEFAULT_MAX_STAMINA: u32 = 100;

/// Implemented by every persisted record so the store can reject stale layouts.
pub trait Versioned {
    const ENTITY: &'static str;
    const SCHEMA_VERSION: u8;

    fn schema_version(&self) -> u8;
}

macro_rules! versioned {
    ($ty:ty, $entity:literal, $version:ident) => {
        impl Versioned for $ty {
            const ENTITY: &'static str = $entity;
            const SCHEMA_VERSION: u8 = $version;

            fn schema_version(&self) -> u8 {
                self.schema_version
            }
        }
    };
}

// ============================================================================
// Stats
// ============================================================================

/// Named per-user attribute.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Stat {
    Strength,
    Agility,
    Intelligence,
    Stamina,
    Health,
    MaxHealth,
    MaxStamina,
}

impl Stat {
    pub const ALL: [Stat; 7] = [
        Stat::Strength,
        Stat::Agility,
        Stat::Intelligence,
        Stat::Stamina,
        Stat::Health,
        Stat::MaxHealth,
        Stat::MaxStamina,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stat::Strength => "strength",
            Stat::Agility => "agility",
            Stat::Intelligence => "intelligence",
            Stat::Stamina => "stamina",
            Stat::Health => "health",
            Stat::MaxHealth => "max_health",
            Stat::MaxStamina => "max_stamina",
        }
    }

    pub fn parse(name: &str) -> Option<Stat> {
        let lowered = name.trim().to_ascii_lowercase();
        Stat::ALL.into_iter().find(|stat| stat.as_str() == lowered)
    }

    pub fn is_maximum(&self) -> bool {
        matches!(self, Stat::MaxHealth | Stat::MaxStamina)
    }
}

impl std::fmt::Display for Stat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signed per-stat adjustments (quest rewards, title bonuses, passive skills).
pub type StatDeltas = BTreeMap<Stat, i32>;

/// Flat, fully-resolved view of a stats record. Used for display and for
/// effective stats (base plus read-time bonuses).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatBlock {
    pub strength: u32,
    pub agility: u32,
    pub intelligence: u32,
    pub stamina: u32,
    pub health: u32,
    pub max_health: u32,
    pub max_stamina: u32,
}

impl StatBlock {
    pub fn get(&self, stat: Stat) -> u32 {
        match stat {
            Stat::Strength => self.strength,
            Stat::Agility => self.agility,
            Stat::Intelligence => self.intelligence,
            Stat::Stamina => self.stamina,
            Stat::Health => self.health,
            Stat::MaxHealth => self.max_health,
            Stat::MaxStamina => self.max_stamina,
        }
    }

    pub fn get_mut(&mut self, stat: Stat) -> &mut u32 {
        match stat {
            Stat::Strength => &mut self.strength,
            Stat::Agility => &mut self.agility,
            Stat::Intelligence => &mut self.intelligence,
            Stat::Stamina => &mut self.stamina,
            Stat::Health => &mut self.health,
            Stat::MaxHealth => &mut self.max_health,
            Stat::MaxStamina => &mut self.max_stamina,
        }
    }
}

/// Stored per-user stat ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatsRecord {
    pub user_id: String,
    pub strength: u32,
    pub agility: u32,
    pub intelligence: u32,
    pub stamina: u32,
    pub health: u32,
    pub max_health: u32,
    /// Absent on freshly registered users; read through [`StatsRecord::max_stamina`].
    pub max_stamina: Option<u32>,
    pub updated_at: DateTime<Utc>,
    pub schema_version: u8,
}

impl StatsRecord {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            strength: 10,
            agility: 10,
            intelligence: 10,
            stamina: 50,
            health: 100,
            max_health: 100,
            max_stamina: None,
            updated_at: Utc::now(),
            schema_version: STATS_SCHEMA_VERSION,
        }
    }

    pub fn max_stamina(&self) -> u32 {
        self.max_stamina.unwrap_or(DEFAULT_MAX_STAMINA)
    }

    pub fn snapshot(&self) -> StatBlock {
        StatBlock {
            strength: self.strength,
            agility: self.agility,
            intelligence: self.intelligence,
            stamina: self.stamina,
            health: self.health,
            max_health: self.max_health,
            max_stamina: self.max_stamina(),
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

versioned!(StatsRecord, "stats", STATS_SCHEMA_VERSION);

// ============================================================================
// Users
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub level: u32,
    pub exp: u64,
    pub exp_required: u64,
    pub skill_points: u32,
    pub gold: u64,
    pub streak_count: u32,
    pub last_login_streak_date: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub schema_version: u8,
}

impl UserRecord {
    pub fn new(id: &str, username: &str, email: &str, password_hash: &str) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            level: 1,
            exp: 0,
            exp_required: 100,
            skill_points: 0,
            gold: 0,
            streak_count: 0,
            last_login_streak_date: None,
            last_login: None,
            created_at: now,
            updated_at: now,
            schema_version: USER_SCHEMA_VERSION,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

versioned!(UserRecord, "user", USER_SCHEMA_VERSION);

/// User view handed back to callers; never carries the credential hash.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserSnapshot {
    pub id: String,
    pub username: String,
    pub email: String,
    pub level: u32,
    pub exp: u64,
    pub exp_required: u64,
    pub skill_points: u32,
    pub gold: u64,
    pub streak_count: u32,
}

impl From<&UserRecord> for UserSnapshot {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            level: user.level,
            exp: user.exp,
            exp_required: user.exp_required,
            skill_points: user.skill_points,
            gold: user.gold,
            streak_count: user.streak_count,
        }
    }
}

// ============================================================================
// Quests
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    /// Top-tier physical training
    Ss,
}

impl Difficulty {
    pub fn parse(name: &str) -> Option<Difficulty> {
        match name.trim().to_ascii_lowercase().as_str() {
            "easy" => Some(Difficulty::Easy),
            "medium" => Some(Difficulty::Medium),
            "hard" => Some(Difficulty::Hard),
            "ss" => Some(Difficulty::Ss),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum QuestKind {
    Daily,
    Skill,
    Challenge,
    Custom,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum QuestCategory {
    Physical,
    System,
    General,
}

/// Where a quest row lives. Global rows are shared; player rows are scoped to one user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuestOwner {
    World,
    Player { user_id: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestRecord {
    pub id: String,
    pub title: String,
    pub description: String,
    pub kind: QuestKind,
    pub category: QuestCategory,
    pub difficulty: Difficulty,
    pub exp_reward: u64,
    pub stat_rewards: StatDeltas,
    pub stamina_cost: u32,
    pub owner: QuestOwner,
    pub is_custom: bool,
    /// Global quest this row was cloned from by a per-user edit.
    pub original_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub schema_version: u8,
}

impl QuestRecord {
    pub fn world(id: &str, title: &str, description: &str, difficulty: Difficulty) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            kind: QuestKind::Daily,
            category: QuestCategory::General,
            difficulty,
            exp_reward: 50,
            stat_rewards: StatDeltas::new(),
            stamina_cost: 10,
            owner: QuestOwner::World,
            is_custom: false,
            original_id: None,
            created_at: Utc::now(),
            schema_version: QUEST_SCHEMA_VERSION,
        }
    }

    pub fn with_kind(mut self, kind: QuestKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_category(mut self, category: QuestCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_exp_reward(mut self, exp: u64) -> Self {
        self.exp_reward = exp;
        self
    }

    pub fn with_stat_reward(mut self, stat: Stat, delta: i32) -> Self {
        self.stat_rewards.insert(stat, delta);
        self
    }

    pub fn with_stamina_cost(mut self, cost: u32) -> Self {
        self.stamina_cost = cost;
        self
    }

    pub fn owned_by(mut self, user_id: &str) -> Self {
        self.owner = QuestOwner::Player {
            user_id: user_id.to_string(),
        };
        self
    }

    pub fn is_global(&self) -> bool {
        matches!(self.owner, QuestOwner::World)
    }
}

versioned!(QuestRecord, "quest", QUEST_SCHEMA_VERSION);

/// Input for a new per-user custom quest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestDraft {
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub exp_reward: u64,
    pub stamina_cost: u32,
}

impl QuestDraft {
    pub fn new(title: &str, description: &str) -> Self {
        Self {
            title: title.to_string(),
            description: description.to_string(),
            difficulty: Difficulty::Easy,
            exp_reward: 50,
            stamina_cost: 10,
        }
    }
}

/// Partial update for a quest; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QuestEdit {
    pub title: Option<String>,
    pub description: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub exp_reward: Option<u64>,
    pub stamina_cost: Option<u32>,
    pub stat_rewards: Option<StatDeltas>,
}

impl QuestEdit {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.difficulty.is_none()
            && self.exp_reward.is_none()
            && self.stamina_cost.is_none()
            && self.stat_rewards.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionRecord {
    pub user_id: String,
    pub quest_id: String,
    pub exp_gained: u64,
    pub completed_at: DateTime<Utc>,
}

// ============================================================================
// Effects (shared by active skills and consumable items)
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    RestoreHealth,
    RestoreStamina,
    GrantExp,
}

impl Effect {
    pub fn label(&self) -> &'static str {
        match self {
            Effect::RestoreHealth => "health",
            Effect::RestoreStamina => "stamina",
            Effect::GrantExp => "exp",
        }
    }
}

// ============================================================================
// Skills
// ============================================================================

/// A value that grows with skill level: `base + level * per_level`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Scaled<K> {
    pub key: K,
    pub base: i32,
    pub per_level: i32,
}

impl<K: Copy> Scaled<K> {
    pub fn new(key: K, base: i32, per_level: i32) -> Self {
        Self {
            key,
            base,
            per_level,
        }
    }

    pub fn at_level(&self, level: u32) -> i32 {
        let level = i32::try_from(level).unwrap_or(i32::MAX);
        self.base
            .saturating_add(level.saturating_mul(self.per_level))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SkillKind {
    /// Invoked explicitly; costs stamina on every use.
    Active {
        stamina_cost: u32,
        effects: Vec<Scaled<Effect>>,
    },
    /// Never invoked; folded into effective stats on every read.
    Passive { bonuses: Vec<Scaled<Stat>> },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SkillRecord {
    pub id: String,
    pub name: String,
    pub description: String,
    pub kind: SkillKind,
    pub unlock_cost: u32,
    pub max_level: u32,
    pub created_at: DateTime<Utc>,
    pub schema_version: u8,
}

impl SkillRecord {
    pub fn new(id: &str, name: &str, description: &str, kind: SkillKind) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            kind,
            unlock_cost: 2,
            max_level: 10,
            created_at: Utc::now(),
            schema_version: SKILL_SCHEMA_VERSION,
        }
    }

    pub fn with_unlock_cost(mut self, cost: u32) -> Self {
        self.unlock_cost = cost;
        self
    }

    pub fn with_max_level(mut self, max_level: u32) -> Self {
        self.max_level = max_level.max(1);
        self
    }

    pub fn is_active(&self) -> bool {
        matches!(self.kind, SkillKind::Active { .. })
    }
}

versioned!(SkillRecord, "skill", SKILL_SCHEMA_VERSION);

/// Per-user unlocked skill.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserSkill {
    pub user_id: String,
    pub skill_id: String,
    pub level: u32,
    /// Skill-specific experience, separate from the user's exp.
    pub exp: u32,
    pub unlocked_at: DateTime<Utc>,
    pub schema_version: u8,
}

impl UserSkill {
    pub fn new(user_id: &str, skill_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            skill_id: skill_id.to_string(),
            level: 1,
            exp: 0,
            unlocked_at: Utc::now(),
            schema_version: SKILL_SCHEMA_VERSION,
        }
    }
}

versioned!(UserSkill, "user_skill", SKILL_SCHEMA_VERSION);

// ============================================================================
// Titles
// ============================================================================

/// Grant condition for a title. Exactly one condition per title.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TitleCondition {
    /// Granted to everyone (registration).
    Automatic,
    LevelAtLeast { level: u32 },
    QuestCountAtLeast { count: u64 },
    StatAtLeast { stat: Stat, value: u32 },
    /// Earned by acting within a UTC hour window; `from > until` wraps midnight.
    ActiveDuringHours { from: u32, until: u32 },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TitleRecord {
    pub id: String,
    pub name: String,
    pub description: String,
    pub condition: TitleCondition,
    pub stat_bonus: StatDeltas,
    pub created_at: DateTime<Utc>,
    pub schema_version: u8,
}

impl TitleRecord {
    pub fn new(id: &str, name: &str, description: &str, condition: TitleCondition) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            condition,
            stat_bonus: StatDeltas::new(),
            created_at: Utc::now(),
            schema_version: TITLE_SCHEMA_VERSION,
        }
    }

    pub fn with_bonus(mut self, stat: Stat, amount: i32) -> Self {
        self.stat_bonus.insert(stat, amount);
        self
    }
}

versioned!(TitleRecord, "title", TITLE_SCHEMA_VERSION);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserTitle {
    pub user_id: String,
    pub title_id: String,
    pub title_name: String,
    pub granted_at: DateTime<Utc>,
    pub schema_version: u8,
}

impl UserTitle {
    pub fn new(user_id: &str, title: &TitleRecord, granted_at: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            title_id: title.id.clone(),
            title_name: title.name.clone(),
            granted_at,
            schema_version: TITLE_SCHEMA_VERSION,
        }
    }
}

versioned!(UserTitle, "user_title", TITLE_SCHEMA_VERSION);

// ============================================================================
// Dungeons
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DungeonRank {
    E,
    D,
    C,
    B,
    A,
    S,
}

/// Fixed per-rank encounter parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankProfile {
    pub duration_minutes: i64,
    pub boss_hp: u32,
    pub exp_reward: u64,
    pub min_level: u32,
}

impl DungeonRank {
    pub const ALL: [DungeonRank; 6] = [
        DungeonRank::E,
        DungeonRank::D,
        DungeonRank::C,
        DungeonRank::B,
        DungeonRank::A,
        DungeonRank::S,
    ];

    pub fn profile(&self) -> RankProfile {
        let (duration_minutes, boss_hp, exp_reward, min_level) = match self {
            DungeonRank::E => (25, 100, 100, 1),
            DungeonRank::D => (40, 200, 250, 5),
            DungeonRank::C => (60, 500, 600, 10),
            DungeonRank::B => (90, 1_000, 1_500, 20),
            DungeonRank::A => (120, 5_000, 4_000, 40),
            DungeonRank::S => (240, 10_000, 10_000, 60),
        };
        RankProfile {
            duration_minutes,
            boss_hp,
            exp_reward,
            min_level,
        }
    }

    pub fn parse(rank: &str) -> Option<DungeonRank> {
        match rank.trim().to_ascii_uppercase().as_str() {
            "E" => Some(DungeonRank::E),
            "D" => Some(DungeonRank::D),
            "C" => Some(DungeonRank::C),
            "B" => Some(DungeonRank::B),
            "A" => Some(DungeonRank::A),
            "S" => Some(DungeonRank::S),
            _ => None,
        }
    }
}

impl std::fmt::Display for DungeonRank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DungeonStatus {
    Active,
    Completed { completed_at: DateTime<Utc> },
    Failed { failed_at: DateTime<Utc> },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DungeonSession {
    pub id: String,
    pub user_id: String,
    pub rank: DungeonRank,
    pub boss_max_hp: u32,
    pub boss_current_hp: u32,
    pub started_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub status: DungeonStatus,
    pub schema_version: u8,
}

impl DungeonSession {
    pub fn is_active(&self) -> bool {
        matches!(self.status, DungeonStatus::Active)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && now >= self.ends_at
    }
}

versioned!(DungeonSession, "dungeon", DUNGEON_SCHEMA_VERSION);

// ============================================================================
// Shop & inventory
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShopItem {
    pub id: String,
    pub name: String,
    pub description: String,
    pub effects: BTreeMap<Effect, u32>,
    pub price: u64,
    pub icon: String,
    pub schema_version: u8,
}

impl ShopItem {
    pub fn new(id: &str, name: &str, description: &str, price: u64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            effects: BTreeMap::new(),
            price,
            icon: "📦".to_string(),
            schema_version: ITEM_SCHEMA_VERSION,
        }
    }

    pub fn with_effect(mut self, effect: Effect, amount: u32) -> Self {
        self.effects.insert(effect, amount);
        self
    }

    pub fn with_icon(mut self, icon: &str) -> Self {
        self.icon = icon.to_string();
        self
    }
}

versioned!(ShopItem, "shop_item", ITEM_SCHEMA_VERSION);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InventoryStack {
    pub user_id: String,
    pub item_id: String,
    pub quantity: u32,
    pub schema_version: u8,
}

impl InventoryStack {
    pub fn new(user_id: &str, item_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            item_id: item_id.to_string(),
            quantity: 0,
            schema_version: ITEM_SCHEMA_VERSION,
        }
    }
}

versioned!(InventoryStack, "inventory", ITEM_SCHEMA_VERSION);

// ============================================================================
// Progress history
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ProgressAction {
    QuestCompleted { quest_id: String, exp_gained: u64 },
    LevelUp { from: u32, to: u32 },
    LevelPenalty { from: u32, to: u32 },
    SkillUnlocked { skill_id: String },
    SkillUsed { skill_id: String, skill_level: u32 },
    TitleEarned { title_id: String },
    DungeonCleared { rank: DungeonRank, exp_gained: u64 },
    DungeonFailed { rank: DungeonRank, health_lost: u32 },
    ItemPurchased { item_id: String, price: u64 },
    ItemUsed { item_id: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressEntry {
    pub user_id: String,
    pub action: ProgressAction,
    pub at: DateTime<Utc>,
}
