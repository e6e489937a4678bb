//! Gold, purchases and consumable use.

mod common;

use common::{harness, register};
use evolvex::progression::{EngineError, ProgressAction, Stat};

#[test]
fn shop_lists_seeded_items() {
    let h = harness();
    let items = h.engine.shop().unwrap();
    let mut ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, vec!["potion_health_small", "potion_stamina_small", "xp_booster_1h"]);
}

#[test]
fn purchases_need_gold() {
    let h = harness();
    let user = register(&h.engine, "sung");
    assert!(matches!(
        h.engine.buy_item(&user.id, "potion_stamina_small", 1),
        Err(EngineError::InsufficientCurrency { currency: "gold", .. })
    ));

    assert_eq!(h.engine.grant_gold(&user.id, 1_000).unwrap().gold, 1_000);
    let purchase = h.engine.buy_item(&user.id, "potion_stamina_small", 2).unwrap();
    assert_eq!(purchase.quantity_owned, 2);
    assert_eq!(purchase.gold_left, 800);

    assert!(matches!(
        h.engine.buy_item(&user.id, "potion_stamina_small", 0),
        Err(EngineError::InvalidInput(_))
    ));
    assert!(matches!(
        h.engine.buy_item(&user.id, "elixir", 1),
        Err(EngineError::NotFound(_))
    ));

    let inventory = h.engine.inventory(&user.id).unwrap();
    assert_eq!(inventory.len(), 1);
    assert_eq!(inventory[0].quantity, 2);

    let purchases = h
        .engine
        .history(&user.id, 10)
        .unwrap()
        .into_iter()
        .filter(|e| matches!(e.action, ProgressAction::ItemPurchased { price: 200, .. }))
        .count();
    assert_eq!(purchases, 1);
}

#[test]
fn potions_restore_clamped_amounts() {
    let h = harness();
    let user = register(&h.engine, "sung");
    h.engine.grant_gold(&user.id, 1_000).unwrap();
    h.engine.buy_item(&user.id, "potion_stamina_small", 1).unwrap();
    h.engine.buy_item(&user.id, "potion_health_small", 1).unwrap();
    h.engine
        .adjust_stats(&user.id, &[(Stat::Stamina, 20), (Stat::Health, -30)].into_iter().collect())
        .unwrap();

    let used = h.engine.use_item(&user.id, "potion_stamina_small").unwrap();
    assert_eq!(used.usage.stamina_restored, 30);
    assert_eq!(used.usage.remaining, 0);

    let used = h.engine.use_item(&user.id, "potion_health_small").unwrap();
    assert_eq!(used.usage.health_restored, 30);

    let base = h.engine.stats(&user.id).unwrap();
    assert_eq!(base.stamina, 100);
    assert_eq!(base.health, 100);

    assert!(matches!(
        h.engine.use_item(&user.id, "potion_stamina_small"),
        Err(EngineError::NotFound(_))
    ));
    assert!(h.engine.inventory(&user.id).unwrap().is_empty());
}

#[test]
fn experience_scroll_runs_the_cascade() {
    let h = harness();
    let user = register(&h.engine, "sung");
    h.engine.grant_gold(&user.id, 500).unwrap();
    h.engine.buy_item(&user.id, "xp_booster_1h", 1).unwrap();
    let used = h.engine.use_item(&user.id, "xp_booster_1h").unwrap();
    assert_eq!(used.settlement.exp_gained, 500);
    assert_eq!(used.settlement.user.level, 3);
    assert_eq!(used.settlement.user.exp, 0);
    assert_eq!(used.settlement.user.gold, 0);
}
