//! Title conditions, idempotent grants and registry-driven bonuses.

mod common;

use chrono::{TimeZone, Utc};
use common::{harness, register};
use evolvex::progression::{ProgressAction, Stat, TitleCondition, TitleRecord};

#[test]
fn reaching_level_five_grants_novice_once() {
    let h = harness();
    let user = register(&h.engine, "sung");
    let settled = h.engine.grant_exp(&user.id, 3_000).unwrap();
    assert_eq!(settled.user.level, 5);
    assert!(settled.new_titles.contains(&"Novice".to_string()));
    // base 10 + 8 growth, +2 from Novice
    assert_eq!(settled.stats.strength, 20);

    assert!(h.engine.check_titles(&user.id).unwrap().is_empty());
    let again = h.engine.grant_exp(&user.id, 10).unwrap();
    assert!(again.new_titles.is_empty());

    let novice_count = h
        .engine
        .titles(&user.id)
        .unwrap()
        .into_iter()
        .filter(|t| t.title_id == "novice")
        .count();
    assert_eq!(novice_count, 1);

    let earned_events = h
        .engine
        .history(&user.id, 50)
        .unwrap()
        .into_iter()
        .filter(|e| matches!(&e.action, ProgressAction::TitleEarned { title_id } if title_id == "novice"))
        .count();
    assert_eq!(earned_events, 1);
}

#[test]
fn editing_the_registry_changes_every_holder() {
    let h = harness();
    let alice = register(&h.engine, "alice");
    let bob = register(&h.engine, "bob");
    h.engine.grant_exp(&alice.id, 3_000).unwrap();
    h.engine.grant_exp(&bob.id, 3_000).unwrap();

    h.engine
        .define_title(
            TitleRecord::new(
                "novice",
                "Novice",
                "Learning the ropes",
                TitleCondition::LevelAtLeast { level: 5 },
            )
            .with_bonus(Stat::Strength, 10),
        )
        .unwrap();

    for id in [&alice.id, &bob.id] {
        let profile = h.engine.profile(id).unwrap();
        assert_eq!(profile.base_stats.strength, 18);
        assert_eq!(profile.effective_stats.strength, 28);
        // The agility bonus is gone with the new definition
        assert_eq!(profile.effective_stats.agility, 18);
    }
}

#[test]
fn quest_count_title_after_fifty_completions() {
    let h = harness();
    let user = register(&h.engine, "sung");
    let mut earned = Vec::new();
    for _ in 0..50 {
        h.engine.rest(&user.id, Some(100)).unwrap();
        earned.extend(h.engine.complete_quest(&user.id, "light_walk").unwrap().new_titles);
    }
    assert!(earned.contains(&"Quest Master".to_string()));
    assert_eq!(h.engine.profile(&user.id).unwrap().quests_completed, 50);
}

#[test]
fn stat_titles_use_base_stats() {
    let h = harness();
    let user = register(&h.engine, "sung");
    h.engine
        .adjust_stats(&user.id, &[(Stat::Intelligence, 40)].into_iter().collect())
        .unwrap();
    let granted = h.engine.check_titles(&user.id).unwrap();
    assert_eq!(granted, vec!["Scholar".to_string()]);
    assert_eq!(h.engine.profile(&user.id).unwrap().effective_stats.intelligence, 60);
}

#[test]
fn time_of_day_titles() {
    let h = harness();
    let user = register(&h.engine, "sung");

    h.clock.set(Utc.with_ymd_and_hms(2024, 6, 2, 6, 15, 0).unwrap());
    let morning = h.engine.complete_quest(&user.id, "light_walk").unwrap();
    assert_eq!(morning.new_titles, vec!["Early Riser".to_string()]);

    h.clock.set(Utc.with_ymd_and_hms(2024, 6, 2, 12, 0, 0).unwrap());
    assert!(h.engine.complete_quest(&user.id, "light_walk").unwrap().new_titles.is_empty());

    // Window wraps past midnight
    h.clock.set(Utc.with_ymd_and_hms(2024, 6, 3, 2, 0, 0).unwrap());
    let late = h.engine.complete_quest(&user.id, "light_walk").unwrap();
    assert_eq!(late.new_titles, vec!["Night Owl".to_string()]);
}
