//! Gold-priced consumables and per-user inventory.

use serde::{Deserialize, Serialize};

use crate::progression::errors::EngineError;
use crate::progression::stats;
use crate::progression::storage::ProgressStore;
use crate::progression::types::{Effect, InventoryStack, ShopItem, StatsRecord, UserRecord};

/// Buy `quantity` of an item, spending gold from `user`.
pub fn buy(
    store: &ProgressStore,
    user: &mut UserRecord,
    item_id: &str,
    quantity: u32,
) -> Result<(ShopItem, InventoryStack), EngineError> {
    if quantity == 0 {
        return Err(EngineError::InvalidInput(
            "quantity must be at least 1".to_string(),
        ));
    }
    let item = store
        .get_item(item_id)?
        .ok_or_else(|| EngineError::not_found("item", item_id))?;
    let total = item.price.saturating_mul(quantity as u64);
    if user.gold < total {
        return Err(EngineError::InsufficientCurrency {
            currency: "gold",
            required: total,
            available: user.gold,
        });
    }

    user.gold -= total;
    let mut stack = store.get_inventory(&user.id, item_id)?;
    stack.quantity = stack.quantity.saturating_add(quantity);
    store.put_inventory(stack.clone())?;
    log::info!(
        "user {} bought {}x {} for {} gold",
        user.id,
        quantity,
        item_id,
        total
    );
    Ok((item, stack))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ItemUse {
    pub item_id: String,
    pub health_restored: u32,
    pub stamina_restored: u32,
    /// Experience still to be applied through the cascade.
    pub exp_granted: u64,
    pub remaining: u32,
}

/// Consume one unit from the inventory and apply its effects.
pub fn use_item(
    store: &ProgressStore,
    stats_record: &mut StatsRecord,
    user_id: &str,
    item_id: &str,
) -> Result<ItemUse, EngineError> {
    let item = store
        .get_item(item_id)?
        .ok_or_else(|| EngineError::not_found("item", item_id))?;
    let mut stack = store.get_inventory(user_id, item_id)?;
    if stack.quantity == 0 {
        return Err(EngineError::not_found("inventory item", item_id));
    }

    let mut outcome = ItemUse {
        item_id: item_id.to_string(),
        ..ItemUse::default()
    };
    for (effect, amount) in &item.effects {
        match effect {
            Effect::RestoreHealth => {
                outcome.health_restored += stats::restore_health(stats_record, *amount);
            }
            Effect::RestoreStamina => {
                outcome.stamina_restored += stats::restore_stamina(stats_record, *amount);
            }
            Effect::GrantExp => outcome.exp_granted += *amount as u64,
        }
    }

    stack.quantity -= 1;
    outcome.remaining = stack.quantity;
    store.put_inventory(stack)?;
    Ok(outcome)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventoryLine {
    pub item: ShopItem,
    pub quantity: u32,
}

pub fn inventory(store: &ProgressStore, user_id: &str) -> Result<Vec<InventoryLine>, EngineError> {
    let mut lines = Vec::new();
    for stack in store.list_inventory(user_id)? {
        match store.get_item(&stack.item_id)? {
            Some(item) => lines.push(InventoryLine {
                item,
                quantity: stack.quantity,
            }),
            None => log::warn!(
                "inventory of {} references unknown item {}",
                user_id,
                stack.item_id
            ),
        }
    }
    Ok(lines)
}
