use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::IVec;

use crate::progression::errors::EngineError;
use crate::progression::seed;
use crate::progression::types::{
    CompletionRecord, DungeonSession, InventoryStack, ProgressEntry, QuestOwner, QuestRecord,
    ShopItem, SkillRecord, StatsRecord, TitleRecord, UserRecord, UserSkill, UserTitle, Versioned,
};

const TREE_USERS: &str = "evolvex_users";
const TREE_STATS: &str = "evolvex_stats";
const TREE_QUESTS: &str = "evolvex_quests";
const TREE_CUSTOM_QUESTS: &str = "evolvex_custom_quests";
const TREE_COMPLETIONS: &str = "evolvex_completions";
const TREE_SKILLS: &str = "evolvex_skills";
const TREE_TITLES: &str = "evolvex_titles";
const TREE_DUNGEONS: &str = "evolvex_dungeons";
const TREE_SHOP: &str = "evolvex_shop";
const TREE_HISTORY: &str = "evolvex_history";
const TREE_META: &str = "evolvex_meta";

const USER_LOCK_STRIPES: usize = 64;

/// Helper builder so tests can easily create throwaway stores with custom paths.
pub struct ProgressStoreBuilder {
    path: PathBuf,
    seed_catalogs: bool,
}

impl ProgressStoreBuilder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            seed_catalogs: true,
        }
    }

    /// Opt out of seeding the quest, skill, title and shop catalogs (useful for targeted tests).
    pub fn without_seed(mut self) -> Self {
        self.seed_catalogs = false;
        self
    }

    pub fn open(self) -> Result<ProgressStore, EngineError> {
        ProgressStore::open_with_options(self.path, self.seed_catalogs)
    }
}

/// Sled-backed persistence for users, their ledgers and the shared catalogs.
///
/// Key layout per tree:
/// - users: `users:{id}`, `usernames:{lower}` and `emails:{lower}` index rows
/// - quests: `world:{quest}` for the global catalog, `owned:{user}:{quest}` for per-user rows
/// - custom quests: `{user}:{quest}`
/// - skills: `catalog:{skill}`, `user:{user}:{skill}`
/// - titles: `catalog:{title}`, `defined:{title}`, `user:{user}:{title}`
/// - dungeons: `session:{id}`, `active:{user}`
/// - shop: `item:{item}`, `inv:{user}:{item}`
/// - completions and history: `{user}:{sequence}`
pub struct ProgressStore {
    db: sled::Db,
    users: sled::Tree,
    stats: sled::Tree,
    quests: sled::Tree,
    custom_quests: sled::Tree,
    completions: sled::Tree,
    skills: sled::Tree,
    titles: sled::Tree,
    dungeons: sled::Tree,
    shop: sled::Tree,
    history: sled::Tree,
    meta: sled::Tree,
    user_locks: Vec<Mutex<()>>,
}

impl ProgressStore {
    /// Open (or create) the store rooted at `path`, seeding the catalogs on first open.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        Self::open_with_options(path, true)
    }

    fn open_with_options<P: AsRef<Path>>(path: P, seed: bool) -> Result<Self, EngineError> {
        let path_ref = path.as_ref();
        std::fs::create_dir_all(path_ref)?;
        let db = sled::open(path_ref)?;
        let store = Self {
            users: db.open_tree(TREE_USERS)?,
            stats: db.open_tree(TREE_STATS)?,
            quests: db.open_tree(TREE_QUESTS)?,
            custom_quests: db.open_tree(TREE_CUSTOM_QUESTS)?,
            completions: db.open_tree(TREE_COMPLETIONS)?,
            skills: db.open_tree(TREE_SKILLS)?,
            titles: db.open_tree(TREE_TITLES)?,
            dungeons: db.open_tree(TREE_DUNGEONS)?,
            shop: db.open_tree(TREE_SHOP)?,
            history: db.open_tree(TREE_HISTORY)?,
            meta: db.open_tree(TREE_META)?,
            user_locks: (0..USER_LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
            db,
        };

        if seed {
            store.seed_if_needed()?;
        }

        Ok(store)
    }

    /// Serialize every mutation for one user. Distinct users may share a stripe.
    pub fn lock_user(&self, user_id: &str) -> MutexGuard<'_, ()> {
        let mut hasher = DefaultHasher::new();
        user_id.hash(&mut hasher);
        let slot = (hasher.finish() as usize) % self.user_locks.len();
        // A panic while holding the guard leaves no partial sled write behind,
        // so the poisoned lock is still usable.
        self.user_locks[slot]
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>, EngineError> {
        Ok(bincode::serialize(value)?)
    }

    fn deserialize<T: DeserializeOwned>(bytes: IVec) -> Result<T, EngineError> {
        Ok(bincode::deserialize::<T>(&bytes)?)
    }

    fn decode<T: DeserializeOwned + Versioned>(bytes: IVec) -> Result<T, EngineError> {
        let record: T = Self::deserialize(bytes)?;
        if record.schema_version() != T::SCHEMA_VERSION {
            return Err(EngineError::SchemaMismatch {
                entity: T::ENTITY,
                expected: T::SCHEMA_VERSION,
                found: record.schema_version(),
            });
        }
        Ok(record)
    }

    fn get_versioned<T: DeserializeOwned + Versioned>(
        tree: &sled::Tree,
        key: &[u8],
    ) -> Result<Option<T>, EngineError> {
        match tree.get(key)? {
            Some(bytes) => Ok(Some(Self::decode(bytes)?)),
            None => Ok(None),
        }
    }

    fn scan_versioned<T: DeserializeOwned + Versioned>(
        tree: &sled::Tree,
        prefix: &str,
    ) -> Result<Vec<T>, EngineError> {
        tree.scan_prefix(prefix.as_bytes())
            .map(|entry| {
                entry
                    .map_err(EngineError::from)
                    .and_then(|(_key, value)| Self::decode(value))
            })
            .collect()
    }

    fn put(tree: &sled::Tree, key: Vec<u8>, bytes: Vec<u8>) -> Result<(), EngineError> {
        tree.insert(key, bytes)?;
        tree.flush()?;
        Ok(())
    }

    /// Claim an index row, failing when another id already holds it.
    fn claim(tree: &sled::Tree, key: &[u8], id: &str) -> Result<bool, EngineError> {
        let outcome = tree.compare_and_swap(key, None::<&[u8]>, Some(id.as_bytes()))?;
        Ok(outcome.is_ok())
    }

    /// Monotonic across restarts; used to order append-only logs.
    fn next_sequence(&self) -> Result<u64, EngineError> {
        Ok(self.db.generate_id()?)
    }

    // ------------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------------

    fn user_key(user_id: &str) -> Vec<u8> {
        format!("users:{}", user_id).into_bytes()
    }

    fn username_key(username: &str) -> Vec<u8> {
        format!("usernames:{}", username.to_lowercase()).into_bytes()
    }

    fn email_key(email: &str) -> Vec<u8> {
        format!("emails:{}", email.to_lowercase()).into_bytes()
    }

    /// Insert a brand-new user, claiming the username and email atomically.
    pub fn create_user(&self, mut user: UserRecord) -> Result<(), EngineError> {
        let username_key = Self::username_key(&user.username);
        if !Self::claim(&self.users, &username_key, &user.id)? {
            return Err(EngineError::Conflict(format!(
                "username already taken: {}",
                user.username
            )));
        }
        let email_key = Self::email_key(&user.email);
        if !Self::claim(&self.users, &email_key, &user.id)? {
            self.users.remove(&username_key)?;
            return Err(EngineError::Conflict(format!(
                "email already registered: {}",
                user.email
            )));
        }
        user.schema_version = UserRecord::SCHEMA_VERSION;
        Self::put(&self.users, Self::user_key(&user.id), Self::serialize(&user)?)
    }

    pub fn put_user(&self, mut user: UserRecord) -> Result<(), EngineError> {
        user.schema_version = UserRecord::SCHEMA_VERSION;
        user.touch();
        Self::put(&self.users, Self::user_key(&user.id), Self::serialize(&user)?)
    }

    pub fn get_user(&self, user_id: &str) -> Result<UserRecord, EngineError> {
        Self::get_versioned(&self.users, &Self::user_key(user_id))?
            .ok_or_else(|| EngineError::not_found("user", user_id))
    }

    pub fn find_user_by_username(&self, username: &str) -> Result<Option<UserRecord>, EngineError> {
        let Some(id) = self.users.get(Self::username_key(username))? else {
            return Ok(None);
        };
        let id = String::from_utf8_lossy(&id).to_string();
        Self::get_versioned(&self.users, &Self::user_key(&id))
    }

    pub fn list_users(&self) -> Result<Vec<UserRecord>, EngineError> {
        Self::scan_versioned(&self.users, "users:")
    }

    // ------------------------------------------------------------------------
    // Stats
    // ------------------------------------------------------------------------

    pub fn put_stats(&self, mut stats: StatsRecord) -> Result<(), EngineError> {
        stats.schema_version = StatsRecord::SCHEMA_VERSION;
        stats.touch();
        let key = stats.user_id.clone().into_bytes();
        Self::put(&self.stats, key, Self::serialize(&stats)?)
    }

    pub fn get_stats(&self, user_id: &str) -> Result<StatsRecord, EngineError> {
        Self::get_versioned(&self.stats, user_id.as_bytes())?
            .ok_or_else(|| EngineError::not_found("stats", user_id))
    }

    // ------------------------------------------------------------------------
    // Quests
    // ------------------------------------------------------------------------

    fn world_quest_key(quest_id: &str) -> Vec<u8> {
        format!("world:{}", quest_id).into_bytes()
    }

    fn owned_quest_key(user_id: &str, quest_id: &str) -> Vec<u8> {
        format!("owned:{}:{}", user_id, quest_id).into_bytes()
    }

    fn custom_quest_key(user_id: &str, quest_id: &str) -> Vec<u8> {
        format!("{}:{}", user_id, quest_id).into_bytes()
    }

    /// Insert or update a quest row. Custom quests go to the per-user custom tree,
    /// everything else to the main catalog keyed by owner.
    pub fn put_quest(&self, mut quest: QuestRecord) -> Result<(), EngineError> {
        quest.schema_version = QuestRecord::SCHEMA_VERSION;
        let bytes = Self::serialize(&quest)?;
        match (&quest.owner, quest.is_custom) {
            (QuestOwner::Player { user_id }, true) => Self::put(
                &self.custom_quests,
                Self::custom_quest_key(user_id, &quest.id),
                bytes,
            ),
            (QuestOwner::Player { user_id }, false) => Self::put(
                &self.quests,
                Self::owned_quest_key(user_id, &quest.id),
                bytes,
            ),
            (QuestOwner::World, _) => {
                Self::put(&self.quests, Self::world_quest_key(&quest.id), bytes)
            }
        }
    }

    pub fn get_world_quest(&self, quest_id: &str) -> Result<Option<QuestRecord>, EngineError> {
        Self::get_versioned(&self.quests, &Self::world_quest_key(quest_id))
    }

    pub fn get_owned_quest(
        &self,
        user_id: &str,
        quest_id: &str,
    ) -> Result<Option<QuestRecord>, EngineError> {
        Self::get_versioned(&self.quests, &Self::owned_quest_key(user_id, quest_id))
    }

    pub fn get_custom_quest(
        &self,
        user_id: &str,
        quest_id: &str,
    ) -> Result<Option<QuestRecord>, EngineError> {
        Self::get_versioned(&self.custom_quests, &Self::custom_quest_key(user_id, quest_id))
    }

    pub fn list_world_quests(&self) -> Result<Vec<QuestRecord>, EngineError> {
        Self::scan_versioned(&self.quests, "world:")
    }

    pub fn list_owned_quests(&self, user_id: &str) -> Result<Vec<QuestRecord>, EngineError> {
        Self::scan_versioned(&self.quests, &format!("owned:{}:", user_id))
    }

    pub fn list_custom_quests(&self, user_id: &str) -> Result<Vec<QuestRecord>, EngineError> {
        Self::scan_versioned(&self.custom_quests, &format!("{}:", user_id))
    }

    /// Returns whether a row was removed.
    pub fn delete_world_quest(&self, quest_id: &str) -> Result<bool, EngineError> {
        let removed = self.quests.remove(Self::world_quest_key(quest_id))?;
        self.quests.flush()?;
        Ok(removed.is_some())
    }

    pub fn delete_owned_quest(&self, user_id: &str, quest_id: &str) -> Result<bool, EngineError> {
        let removed = self
            .quests
            .remove(Self::owned_quest_key(user_id, quest_id))?;
        self.quests.flush()?;
        Ok(removed.is_some())
    }

    pub fn delete_custom_quest(&self, user_id: &str, quest_id: &str) -> Result<bool, EngineError> {
        let removed = self
            .custom_quests
            .remove(Self::custom_quest_key(user_id, quest_id))?;
        self.custom_quests.flush()?;
        Ok(removed.is_some())
    }

    // ------------------------------------------------------------------------
    // Completions
    // ------------------------------------------------------------------------

    pub fn record_completion(&self, completion: &CompletionRecord) -> Result<(), EngineError> {
        let key = format!("{}:{:020}", completion.user_id, self.next_sequence()?).into_bytes();
        Self::put(&self.completions, key, Self::serialize(completion)?)
    }

    pub fn count_completions(&self, user_id: &str) -> Result<u64, EngineError> {
        let prefix = format!("{}:", user_id);
        let mut count = 0u64;
        for entry in self.completions.scan_prefix(prefix.as_bytes()) {
            entry?;
            count += 1;
        }
        Ok(count)
    }

    // ------------------------------------------------------------------------
    // Skills
    // ------------------------------------------------------------------------

    pub fn put_skill(&self, mut skill: SkillRecord) -> Result<(), EngineError> {
        skill.schema_version = SkillRecord::SCHEMA_VERSION;
        let key = format!("catalog:{}", skill.id).into_bytes();
        Self::put(&self.skills, key, Self::serialize(&skill)?)
    }

    pub fn get_skill(&self, skill_id: &str) -> Result<Option<SkillRecord>, EngineError> {
        Self::get_versioned(&self.skills, format!("catalog:{}", skill_id).as_bytes())
    }

    pub fn list_skills(&self) -> Result<Vec<SkillRecord>, EngineError> {
        Self::scan_versioned(&self.skills, "catalog:")
    }

    pub fn put_user_skill(&self, mut skill: UserSkill) -> Result<(), EngineError> {
        skill.schema_version = UserSkill::SCHEMA_VERSION;
        let key = format!("user:{}:{}", skill.user_id, skill.skill_id).into_bytes();
        Self::put(&self.skills, key, Self::serialize(&skill)?)
    }

    pub fn get_user_skill(
        &self,
        user_id: &str,
        skill_id: &str,
    ) -> Result<Option<UserSkill>, EngineError> {
        Self::get_versioned(
            &self.skills,
            format!("user:{}:{}", user_id, skill_id).as_bytes(),
        )
    }

    pub fn list_user_skills(&self, user_id: &str) -> Result<Vec<UserSkill>, EngineError> {
        Self::scan_versioned(&self.skills, &format!("user:{}:", user_id))
    }

    // ------------------------------------------------------------------------
    // Titles
    // ------------------------------------------------------------------------

    /// Static title catalog entry, evaluated for grants.
    pub fn put_title(&self, mut title: TitleRecord) -> Result<(), EngineError> {
        title.schema_version = TitleRecord::SCHEMA_VERSION;
        let key = format!("catalog:{}", title.id).into_bytes();
        Self::put(&self.titles, key, Self::serialize(&title)?)
    }

    pub fn list_titles(&self) -> Result<Vec<TitleRecord>, EngineError> {
        Self::scan_versioned(&self.titles, "catalog:")
    }

    /// Overwrite a defined-titles registry entry. Bonuses of every holder follow.
    pub fn put_defined_title(&self, mut title: TitleRecord) -> Result<(), EngineError> {
        title.schema_version = TitleRecord::SCHEMA_VERSION;
        let key = format!("defined:{}", title.id).into_bytes();
        Self::put(&self.titles, key, Self::serialize(&title)?)
    }

    /// Register a title definition unless one is already present.
    pub fn define_title_if_absent(&self, title: &TitleRecord) -> Result<bool, EngineError> {
        let mut title = title.clone();
        title.schema_version = TitleRecord::SCHEMA_VERSION;
        let key = format!("defined:{}", title.id).into_bytes();
        let bytes = Self::serialize(&title)?;
        let outcome = self
            .titles
            .compare_and_swap(key, None::<&[u8]>, Some(bytes))?;
        Ok(outcome.is_ok())
    }

    pub fn get_defined_title(&self, title_id: &str) -> Result<Option<TitleRecord>, EngineError> {
        Self::get_versioned(&self.titles, format!("defined:{}", title_id).as_bytes())
    }

    pub fn put_user_title(&self, mut title: UserTitle) -> Result<(), EngineError> {
        title.schema_version = UserTitle::SCHEMA_VERSION;
        let key = format!("user:{}:{}", title.user_id, title.title_id).into_bytes();
        Self::put(&self.titles, key, Self::serialize(&title)?)
    }

    pub fn has_user_title(&self, user_id: &str, title_id: &str) -> Result<bool, EngineError> {
        let key = format!("user:{}:{}", user_id, title_id);
        Ok(self.titles.contains_key(key.as_bytes())?)
    }

    pub fn list_user_titles(&self, user_id: &str) -> Result<Vec<UserTitle>, EngineError> {
        Self::scan_versioned(&self.titles, &format!("user:{}:", user_id))
    }

    // ------------------------------------------------------------------------
    // Dungeons
    // ------------------------------------------------------------------------

    pub fn put_dungeon(&self, mut session: DungeonSession) -> Result<(), EngineError> {
        session.schema_version = DungeonSession::SCHEMA_VERSION;
        let active_key = format!("active:{}", session.user_id).into_bytes();
        if session.is_active() {
            self.dungeons
                .insert(active_key, session.id.as_bytes())?;
        } else if self.dungeons.get(&active_key)?.as_deref() == Some(session.id.as_bytes()) {
            self.dungeons.remove(&active_key)?;
        }
        let key = format!("session:{}", session.id).into_bytes();
        Self::put(&self.dungeons, key, Self::serialize(&session)?)
    }

    pub fn get_dungeon(&self, session_id: &str) -> Result<DungeonSession, EngineError> {
        Self::get_versioned(&self.dungeons, format!("session:{}", session_id).as_bytes())?
            .ok_or_else(|| EngineError::not_found("dungeon session", session_id))
    }

    pub fn active_dungeon(&self, user_id: &str) -> Result<Option<DungeonSession>, EngineError> {
        let Some(id) = self.dungeons.get(format!("active:{}", user_id).as_bytes())? else {
            return Ok(None);
        };
        let id = String::from_utf8_lossy(&id).to_string();
        Ok(Some(self.get_dungeon(&id)?))
    }

    // ------------------------------------------------------------------------
    // Shop & inventory
    // ------------------------------------------------------------------------

    pub fn put_item(&self, mut item: ShopItem) -> Result<(), EngineError> {
        item.schema_version = ShopItem::SCHEMA_VERSION;
        let key = format!("item:{}", item.id).into_bytes();
        Self::put(&self.shop, key, Self::serialize(&item)?)
    }

    pub fn get_item(&self, item_id: &str) -> Result<Option<ShopItem>, EngineError> {
        Self::get_versioned(&self.shop, format!("item:{}", item_id).as_bytes())
    }

    pub fn list_items(&self) -> Result<Vec<ShopItem>, EngineError> {
        Self::scan_versioned(&self.shop, "item:")
    }

    /// Store a stack; an empty stack removes the row.
    pub fn put_inventory(&self, mut stack: InventoryStack) -> Result<(), EngineError> {
        stack.schema_version = InventoryStack::SCHEMA_VERSION;
        let key = format!("inv:{}:{}", stack.user_id, stack.item_id).into_bytes();
        if stack.quantity == 0 {
            self.shop.remove(key)?;
            self.shop.flush()?;
            return Ok(());
        }
        Self::put(&self.shop, key, Self::serialize(&stack)?)
    }

    pub fn get_inventory(&self, user_id: &str, item_id: &str) -> Result<InventoryStack, EngineError> {
        let key = format!("inv:{}:{}", user_id, item_id);
        Ok(Self::get_versioned(&self.shop, key.as_bytes())?
            .unwrap_or_else(|| InventoryStack::new(user_id, item_id)))
    }

    pub fn list_inventory(&self, user_id: &str) -> Result<Vec<InventoryStack>, EngineError> {
        Self::scan_versioned(&self.shop, &format!("inv:{}:", user_id))
    }

    // ------------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------------

    pub fn append_history(&self, entry: &ProgressEntry) -> Result<(), EngineError> {
        let key = format!("{}:{:020}", entry.user_id, self.next_sequence()?).into_bytes();
        Self::put(&self.history, key, Self::serialize(entry)?)
    }

    /// Newest first.
    pub fn list_history(&self, user_id: &str, limit: usize) -> Result<Vec<ProgressEntry>, EngineError> {
        let prefix = format!("{}:", user_id);
        self.history
            .scan_prefix(prefix.as_bytes())
            .rev()
            .take(limit)
            .map(|entry| {
                entry
                    .map_err(EngineError::from)
                    .and_then(|(_key, value)| Self::deserialize(value))
            })
            .collect()
    }

    // ------------------------------------------------------------------------
    // Seeding
    // ------------------------------------------------------------------------

    fn seed_once<T>(
        &self,
        marker: &str,
        records: Vec<T>,
        put: impl Fn(&Self, T) -> Result<(), EngineError>,
    ) -> Result<usize, EngineError> {
        let marker_key = format!("seeded:{}", marker);
        if self.meta.contains_key(marker_key.as_bytes())? {
            return Ok(0);
        }
        let mut inserted = 0usize;
        for record in records {
            put(self, record)?;
            inserted += 1;
        }
        self.meta.insert(marker_key.as_bytes(), b"1".as_slice())?;
        self.meta.flush()?;
        Ok(inserted)
    }

    /// Insert the starter catalogs once per database. Catalog rows deleted later
    /// stay deleted across restarts.
    pub fn seed_if_needed(&self) -> Result<usize, EngineError> {
        let mut inserted = self.seed_once("quests", seed::starter_quests(), Self::put_quest)?;
        inserted += self.seed_once("skills", seed::starter_skills(), Self::put_skill)?;
        inserted += self.seed_once("titles", seed::starter_titles(), Self::put_title)?;
        inserted += self.seed_once("shop", seed::starter_items(), Self::put_item)?;
        if inserted > 0 {
            log::info!("seeded {} catalog records", inserted);
        }
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progression::types::{Difficulty, DungeonRank, DungeonStatus, USER_SCHEMA_VERSION};
    use chrono::Utc;
    use tempfile::TempDir;

    #[test]
    fn store_round_trip_user() {
        let dir = TempDir::new().expect("tempdir");
        let store = ProgressStoreBuilder::new(dir.path()).open().expect("store");
        let mut user = UserRecord::new("u-1", "Alice", "alice@example.com", "hash");
        user.gold = 42;
        store.create_user(user.clone()).expect("create");
        let fetched = store.get_user("u-1").expect("get");
        assert_eq!(fetched.username, "Alice");
        assert_eq!(fetched.gold, 42);
        assert_eq!(fetched.schema_version, USER_SCHEMA_VERSION);
        let by_name = store
            .find_user_by_username("alice")
            .expect("lookup")
            .expect("present");
        assert_eq!(by_name.id, "u-1");
    }

    #[test]
    fn duplicate_username_or_email_is_a_conflict() {
        let dir = TempDir::new().expect("tempdir");
        let store = ProgressStoreBuilder::new(dir.path())
            .without_seed()
            .open()
            .expect("store");
        store
            .create_user(UserRecord::new("u-1", "alice", "alice@example.com", "h"))
            .expect("first");

        let err = store
            .create_user(UserRecord::new("u-2", "ALICE", "other@example.com", "h"))
            .unwrap_err();
        assert!(matches!(err, EngineError::Conflict(_)));

        let err = store
            .create_user(UserRecord::new("u-3", "bob", "Alice@Example.com", "h"))
            .unwrap_err();
        assert!(matches!(err, EngineError::Conflict(_)));
        // The username claimed before the email clash must be released again.
        store
            .create_user(UserRecord::new("u-4", "bob", "bob@example.com", "h"))
            .expect("bob can still register");
    }

    #[test]
    fn seeding_only_happens_once() {
        let dir = TempDir::new().expect("tempdir");
        {
            let store = ProgressStoreBuilder::new(dir.path()).open().expect("store");
            assert!(store.get_world_quest("sys_coding").expect("get").is_some());
            assert!(store.delete_world_quest("sys_coding").expect("delete"));
        }

        let store = ProgressStoreBuilder::new(dir.path()).open().expect("reopen");
        assert_eq!(store.seed_if_needed().expect("seed check"), 0);
        assert!(
            store.get_world_quest("sys_coding").expect("get").is_none(),
            "deleted catalog rows must not be reseeded"
        );
        assert!(!store.list_skills().expect("skills").is_empty());
    }

    #[test]
    fn unseeded_store_is_empty() {
        let dir = TempDir::new().expect("tempdir");
        let store = ProgressStoreBuilder::new(dir.path())
            .without_seed()
            .open()
            .expect("store");
        assert!(store.list_world_quests().expect("quests").is_empty());
        assert!(store.list_items().expect("items").is_empty());
    }

    #[test]
    fn quest_rows_are_partitioned_by_provenance() {
        let dir = TempDir::new().expect("tempdir");
        let store = ProgressStoreBuilder::new(dir.path())
            .without_seed()
            .open()
            .expect("store");
        let world = QuestRecord::world("q1", "Global", "", Difficulty::Easy);
        let owned = QuestRecord::world("q1", "Owned", "", Difficulty::Easy).owned_by("u-1");
        let mut custom = QuestRecord::world("q2", "Custom", "", Difficulty::Easy).owned_by("u-1");
        custom.is_custom = true;
        store.put_quest(world).expect("world");
        store.put_quest(owned).expect("owned");
        store.put_quest(custom).expect("custom");

        assert_eq!(store.list_world_quests().expect("world").len(), 1);
        assert_eq!(store.list_owned_quests("u-1").expect("owned").len(), 1);
        assert_eq!(store.list_custom_quests("u-1").expect("custom").len(), 1);
        assert!(store.list_custom_quests("u-2").expect("other").is_empty());
        assert_eq!(
            store.get_world_quest("q1").expect("get").expect("present").title,
            "Global"
        );
    }

    #[test]
    fn active_dungeon_index_follows_status() {
        let dir = TempDir::new().expect("tempdir");
        let store = ProgressStoreBuilder::new(dir.path())
            .without_seed()
            .open()
            .expect("store");
        let now = Utc::now();
        let mut session = DungeonSession {
            id: "d-1".into(),
            user_id: "u-1".into(),
            rank: DungeonRank::E,
            boss_max_hp: 100,
            boss_current_hp: 100,
            started_at: now,
            ends_at: now,
            status: DungeonStatus::Active,
            schema_version: 0,
        };
        store.put_dungeon(session.clone()).expect("put");
        assert_eq!(
            store.active_dungeon("u-1").expect("active").map(|s| s.id),
            Some("d-1".to_string())
        );
        session.status = DungeonStatus::Completed { completed_at: now };
        store.put_dungeon(session).expect("put");
        assert!(store.active_dungeon("u-1").expect("active").is_none());
        assert!(!store.get_dungeon("d-1").expect("get").is_active());
    }

    #[test]
    fn schema_mismatch_is_reported() {
        let dir = TempDir::new().expect("tempdir");
        let store = ProgressStoreBuilder::new(dir.path())
            .without_seed()
            .open()
            .expect("store");
        let mut stats = StatsRecord::new("u-1");
        stats.schema_version = 99;
        let bytes = bincode::serialize(&stats).expect("encode");
        store.stats.insert(b"u-1", bytes).expect("raw insert");
        let err = store.get_stats("u-1").unwrap_err();
        assert!(matches!(
            err,
            EngineError::SchemaMismatch {
                entity: "stats",
                found: 99,
                ..
            }
        ));
    }

    #[test]
    fn history_lists_newest_first() {
        let dir = TempDir::new().expect("tempdir");
        let store = ProgressStoreBuilder::new(dir.path())
            .without_seed()
            .open()
            .expect("store");
        for id in ["a", "b", "c"] {
            store
                .append_history(&ProgressEntry {
                    user_id: "u-1".into(),
                    action: crate::progression::types::ProgressAction::SkillUnlocked {
                        skill_id: id.into(),
                    },
                    at: Utc::now(),
                })
                .expect("append");
        }
        let entries = store.list_history("u-1", 2).expect("list");
        assert_eq!(entries.len(), 2);
        assert_eq!(
            entries[0].action,
            crate::progression::types::ProgressAction::SkillUnlocked {
                skill_id: "c".into()
            }
        );
    }
}
