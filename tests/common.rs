//! Test utilities & fixtures.
//! Builds throwaway engines on a temp dir with a hand-driven clock and cheap argon2 costs.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use evolvex::config::{Argon2Config, RulesConfig};
use evolvex::progression::{
    CredentialHasher, Engine, ManualClock, ProgressStoreBuilder, UserSnapshot,
};
use tempfile::TempDir;

pub struct Harness {
    pub engine: Engine,
    pub clock: Arc<ManualClock>,
    _dir: TempDir,
}

/// Noon UTC, outside every time-of-day title window.
pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

#[allow(dead_code)]
pub fn harness() -> Harness {
    harness_with_rules(RulesConfig::default())
}

pub fn harness_with_rules(rules: RulesConfig) -> Harness {
    let dir = TempDir::new().expect("tempdir");
    let store = ProgressStoreBuilder::new(dir.path().join("evolvex.db"))
        .open()
        .expect("open store");
    let hasher = CredentialHasher::from_config(Some(&Argon2Config {
        memory_kib: Some(256),
        time_cost: Some(1),
        parallelism: Some(1),
    }))
    .expect("argon2 params");
    let clock = Arc::new(ManualClock::new(start_time()));
    let engine = Engine::new(store, rules)
        .with_hasher(hasher)
        .with_clock(clock.clone());
    Harness {
        engine,
        clock,
        _dir: dir,
    }
}

/// Register `username` with a derived email and the password `password123`.
#[allow(dead_code)]
pub fn register(engine: &Engine, username: &str) -> UserSnapshot {
    engine
        .register_user(username, &format!("{}@example.com", username), "password123")
        .expect("register")
}
