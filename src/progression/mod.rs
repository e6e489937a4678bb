//! Progression engine: users, stats, experience, quests, skills, titles,
//! dungeons and the shop.
//!
//! Records live in sled trees managed by [`storage::ProgressStore`]. The
//! ledger modules ([`stats`], [`experience`], [`streak`]) are pure functions
//! over loaded records; catalog modules ([`quest`], [`skill`], [`title`],
//! [`shop`]) read and write through the store. [`engine::Engine`] ties them
//! together and serializes every mutation per user.
//!
//! ```rust,no_run
//! use evolvex::config::RulesConfig;
//! use evolvex::progression::{Engine, ProgressStoreBuilder};
//!
//! # fn main() -> Result<(), evolvex::progression::EngineError> {
//! let store = ProgressStoreBuilder::new("./data/evolvex.db").open()?;
//! let engine = Engine::new(store, RulesConfig::default());
//! let user = engine.register_user("jinwoo", "jinwoo@example.com", "arise-arise")?;
//! let settlement = engine.complete_quest(&user.id, "physical_pushups")?;
//! println!("level {} ({} exp)", settlement.user.level, settlement.user.exp);
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod credentials;
pub mod dungeon;
pub mod engine;
pub mod errors;
pub mod experience;
pub mod insight;
pub mod quest;
pub mod seed;
pub mod shop;
pub mod skill;
pub mod stats;
pub mod storage;
pub mod streak;
pub mod title;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use credentials::CredentialHasher;
pub use dungeon::{CappedDamage, DamagePolicy};
pub use engine::{
    DungeonStart, Engine, ItemReport, LeaderboardEntry, LoginOutcome, Profile, Purchase,
    RestReport, Settlement, SkillReport,
};
pub use errors::EngineError;
pub use storage::{ProgressStore, ProgressStoreBuilder};
pub use types::*;
