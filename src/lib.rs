//! # Evolvex - Gamified Self-Improvement Tracker
//!
//! Evolvex turns daily habits into an RPG progression loop. Users complete
//! quests to earn experience and stat gains, level up through a quadratic
//! curve, unlock skills with skill points, earn titles from their behaviour
//! and clear time-limited dungeons.
//!
//! ## Features
//!
//! - **Stat Ledger**: Strength, agility, intelligence, stamina and health with clamped resources.
//! - **Experience Cascade**: `level² × 100` curve, multi-level jumps, skill point grants and per-level stat growth.
//! - **Quest Catalog**: Shared world quests, per-user copies and custom quests with difficulty-based selection tiers.
//! - **Skills**: Active skills with stamina costs and scaled effects, passive skills with stat bonuses.
//! - **Titles**: Level, quest count, stat and time-of-day conditions, granted once and never revoked.
//! - **Dungeons**: Ranked, time-limited boss sessions with server-side damage checks.
//! - **Shop**: Gold-priced consumables and per-user inventory.
//! - **Security**: Argon2id password hashing and input validation.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use evolvex::config::Config;
//! use evolvex::progression::Engine;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let engine = Engine::from_config(&config)?;
//!     let user = engine.register_user("hunter", "hunter@example.com", "correct horse")?;
//!     let settlement = engine.complete_quest(&user.id, "sys_reading")?;
//!     println!("{:?}", settlement.messages);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`progression`] - Engine, ledgers, catalogs and persistence
//! - [`config`] - Configuration management and validation
//! - [`validation`] - Input validation and sanitization utilities

pub mod config;
pub mod progression;
pub mod validation;
