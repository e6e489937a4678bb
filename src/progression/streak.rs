use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::progression::types::UserRecord;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StreakUpdate {
    pub streak_count: u32,
    /// Empty for a same-day login.
    pub message: String,
}

/// Update the login streak. Elapsed whole days since the previous tracked
/// login decide the outcome: 0 keeps it, 1 extends it, 2 decays it by one
/// and anything longer resets it to day 1.
pub fn record_login(user: &mut UserRecord, now: DateTime<Utc>) -> StreakUpdate {
    let (streak, message) = match user.last_login_streak_date {
        None => (1, "Daily streak started: day 1".to_string()),
        Some(previous) => match (now - previous).num_days() {
            days if days <= 0 => (user.streak_count, String::new()),
            1 => {
                let streak = user.streak_count.saturating_add(1);
                (streak, format!("🔥 Streak continued! Day {}", streak))
            }
            2 => {
                let streak = user.streak_count.saturating_sub(1);
                (
                    streak,
                    format!(
                        "⚠️ 24h of inactivity. Streak decayed by 1. Current: {}",
                        streak
                    ),
                )
            }
            _ => (1, "🚫 Streak lost to inactivity. Reset to day 1.".to_string()),
        },
    };
    user.streak_count = streak;
    user.last_login_streak_date = Some(now);
    StreakUpdate {
        streak_count: streak,
        message,
    }
}
