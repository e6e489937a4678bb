//! Unlocking, active use and passive bonuses.

mod common;

use common::{harness, register};
use evolvex::progression::{EngineError, Stat, UserSkill};

#[test]
fn unlock_requires_points_and_happens_once() {
    let h = harness();
    let user = register(&h.engine, "sung");

    let err = h.engine.unlock_skill(&user.id, "active_heal").unwrap_err();
    assert!(matches!(
        err,
        EngineError::InsufficientCurrency {
            currency: "skill points",
            required: 1,
            available: 0
        }
    ));

    h.engine.grant_exp(&user.id, 100).unwrap();
    let unlocked = h.engine.unlock_skill(&user.id, "active_heal").unwrap();
    assert_eq!(unlocked.level, 1);
    assert_eq!(unlocked.exp, 0);
    assert_eq!(h.engine.profile(&user.id).unwrap().user.skill_points, 0);

    assert!(matches!(
        h.engine.unlock_skill(&user.id, "active_heal"),
        Err(EngineError::Conflict(_))
    ));
    assert!(matches!(
        h.engine.unlock_skill(&user.id, "fireball"),
        Err(EngineError::NotFound(_))
    ));
}

#[test]
fn active_heal_spends_stamina_and_restores_clamped_health() {
    let h = harness();
    let user = register(&h.engine, "sung");
    h.engine.grant_exp(&user.id, 100).unwrap();
    h.engine.unlock_skill(&user.id, "active_heal").unwrap();
    h.engine
        .adjust_stats(&user.id, &[(Stat::Health, -50)].into_iter().collect())
        .unwrap();

    let report = h.engine.use_skill(&user.id, "active_heal").unwrap();
    assert_eq!(report.usage.stamina_spent, 20);
    assert_eq!(report.usage.health_restored, 35);
    assert_eq!(report.usage.skill_exp, 10);
    assert!(!report.usage.skill_leveled_up);

    let base = h.engine.stats(&user.id).unwrap();
    // 100 - 50 + 35
    assert_eq!(base.health, 85);
    assert_eq!(base.max_health, 110);
    // 50 + 3 level bonus - 20
    assert_eq!(base.stamina, 33);

    // Close to max: restoration is clamped
    let report = h.engine.use_skill(&user.id, "active_heal").unwrap();
    assert_eq!(report.usage.health_restored, 25);
    assert_eq!(h.engine.stats(&user.id).unwrap().health, 110);
}

#[test]
fn skill_use_needs_stamina() {
    let h = harness();
    let user = register(&h.engine, "sung");
    h.engine.grant_exp(&user.id, 100).unwrap();
    h.engine.unlock_skill(&user.id, "active_heal").unwrap();
    h.engine
        .adjust_stats(&user.id, &[(Stat::Stamina, -40)].into_iter().collect())
        .unwrap();

    let err = h.engine.use_skill(&user.id, "active_heal").unwrap_err();
    assert!(matches!(err, EngineError::InsufficientResource { .. }));
    assert_eq!(h.engine.stats(&user.id).unwrap().stamina, 13);
}

#[test]
fn focus_mode_experience_goes_through_the_cascade() {
    let h = harness();
    let user = register(&h.engine, "sung");
    // Level 3 with two points
    h.engine.grant_exp(&user.id, 500).unwrap();
    h.engine.unlock_skill(&user.id, "active_focus").unwrap();
    let report = h.engine.use_skill(&user.id, "active_focus").unwrap();
    assert_eq!(report.usage.exp_granted, 55);
    assert_eq!(report.settlement.exp_gained, 55);
    assert_eq!(report.settlement.user.exp, 55);
}

#[test]
fn passive_and_locked_skills_cannot_be_used() {
    let h = harness();
    let user = register(&h.engine, "sung");
    h.engine.grant_exp(&user.id, 500).unwrap();
    h.engine.unlock_skill(&user.id, "passive_str").unwrap();

    assert!(matches!(
        h.engine.use_skill(&user.id, "passive_str"),
        Err(EngineError::InvalidInput(_))
    ));
    assert!(matches!(
        h.engine.use_skill(&user.id, "active_heal"),
        Err(EngineError::NotFound(_))
    ));
}

#[test]
fn level_three_passive_adds_eight_without_touching_the_ledger() {
    let h = harness();
    let user = register(&h.engine, "sung");
    let mut owned = UserSkill::new(&user.id, "passive_str");
    owned.level = 3;
    h.engine.store().put_user_skill(owned).unwrap();

    let profile = h.engine.profile(&user.id).unwrap();
    assert_eq!(profile.base_stats.strength, 10);
    assert_eq!(profile.effective_stats.strength, 18);
    assert_eq!(h.engine.stats(&user.id).unwrap().strength, 10);

    let overview = h.engine.list_skills(&user.id).unwrap();
    assert_eq!(overview.catalog.len(), 6);
    let iron_will = overview
        .unlocked
        .iter()
        .find(|s| s.skill_id == "passive_str")
        .unwrap();
    assert_eq!(iron_will.magnitudes.get("strength"), Some(&8));
    assert!(!iron_will.active);
}

#[test]
fn repeated_use_levels_the_skill_and_caps_at_max() {
    let h = harness();
    let user = register(&h.engine, "sung");
    h.engine.grant_exp(&user.id, 500).unwrap();
    h.engine.unlock_skill(&user.id, "meditation").unwrap();

    // Meditation costs nothing; 10 uses reach the level 1 threshold of 100
    let mut last = None;
    for _ in 0..10 {
        last = Some(h.engine.use_skill(&user.id, "meditation").unwrap());
    }
    let last = last.unwrap();
    assert!(last.usage.skill_leveled_up);
    assert_eq!(last.usage.skill_level, 2);
    assert_eq!(last.usage.skill_exp, 0);

    let mut owned = UserSkill::new(&user.id, "meditation");
    owned.level = 5;
    owned.exp = 495;
    h.engine.store().put_user_skill(owned).unwrap();
    let capped = h.engine.use_skill(&user.id, "meditation").unwrap();
    assert_eq!(capped.usage.skill_level, 5);
    assert_eq!(capped.usage.skill_exp, 500);
    let capped = h.engine.use_skill(&user.id, "meditation").unwrap();
    assert_eq!(capped.usage.skill_exp, 500);
}
