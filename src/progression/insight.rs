use serde::{Deserialize, Serialize};

use crate::progression::types::{QuestRecord, Stat, StatBlock};

const TRAINED_STATS: [Stat; 3] = [Stat::Strength, Stat::Agility, Stat::Intelligence];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Recommendation {
    pub quest_id: String,
    pub stat: Stat,
    pub message: String,
}

/// Advisory notices shown with a profile. Never affect state.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Insights {
    pub weaknesses: Vec<Stat>,
    pub weakness_notice: Option<String>,
    pub recommendation: Option<Recommendation>,
    pub burnout_warning: Option<String>,
}

/// Stats more than 20% below the strength/agility/intelligence mean.
pub fn weaknesses(stats: &StatBlock) -> Vec<Stat> {
    let mean = TRAINED_STATS
        .iter()
        .map(|stat| stats.get(*stat) as f64)
        .sum::<f64>()
        / TRAINED_STATS.len() as f64;
    let threshold = mean * 0.8;
    TRAINED_STATS
        .into_iter()
        .filter(|stat| (stats.get(*stat) as f64) < threshold)
        .collect()
}

/// Lowest trained stat; ties go to the earlier of strength, agility, intelligence.
pub fn lowest_stat(stats: &StatBlock) -> Stat {
    let mut lowest = Stat::Strength;
    for stat in [Stat::Agility, Stat::Intelligence] {
        if stats.get(stat) < stats.get(lowest) {
            lowest = stat;
        }
    }
    lowest
}

/// First offered quest that trains the lowest stat.
pub fn recommend(stats: &StatBlock, offered: &[QuestRecord]) -> Option<Recommendation> {
    let stat = lowest_stat(stats);
    offered
        .iter()
        .find(|quest| quest.stat_rewards.get(&stat).is_some_and(|delta| *delta > 0))
        .map(|quest| Recommendation {
            quest_id: quest.id.clone(),
            stat,
            message: format!(
                "Focus on {} to improve {}.",
                quest.title,
                stat.as_str().to_uppercase()
            ),
        })
}

/// Stamina under a fifth of its maximum.
pub fn burnout_risk(stats: &StatBlock) -> bool {
    (stats.stamina as u64) * 5 < stats.max_stamina as u64
}

pub fn analyze(stats: &StatBlock, offered: &[QuestRecord]) -> Insights {
    let weak = weaknesses(stats);
    let weakness_notice = if weak.is_empty() {
        None
    } else {
        let areas: Vec<String> = weak.iter().map(|s| s.as_str().to_uppercase()).collect();
        Some(format!(
            "⚠️ Critical weakness detected in {}. Immediate training suggested.",
            areas.join(", ")
        ))
    };
    Insights {
        weaknesses: weak,
        weakness_notice,
        recommendation: recommend(stats, offered),
        burnout_warning: burnout_risk(stats)
            .then(|| "⚠️ High burnout risk. Rest recommended.".to_string()),
    }
}
