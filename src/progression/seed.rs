//! Starter catalogs inserted the first time a store is opened.

use crate::progression::types::{
    Difficulty, Effect, QuestCategory, QuestKind, QuestRecord, Scaled, ShopItem, SkillKind,
    SkillRecord, Stat, TitleCondition, TitleRecord,
};

/// Ids of the global quests created by [`starter_quests`].
pub const STARTER_QUEST_IDS: [&str; 12] = [
    "physical_pushups",
    "physical_situps",
    "physical_squats",
    "physical_run",
    "sys_coding",
    "sys_reading",
    "skill_meditation",
    "skill_sprint",
    "challenge_marathon",
    "challenge_project",
    "light_walk",
    "light_review",
];

pub const BEGINNER_TITLE_ID: &str = "beginner";

pub fn starter_quests() -> Vec<QuestRecord> {
    let physical = |id: &str, title: &str, description: &str| {
        QuestRecord::world(id, title, description, Difficulty::Ss)
            .with_category(QuestCategory::Physical)
            .with_exp_reward(100)
            .with_stamina_cost(10)
    };
    let system = |id: &str, title: &str, description: &str, difficulty: Difficulty| {
        QuestRecord::world(id, title, description, difficulty).with_category(QuestCategory::System)
    };

    vec![
        physical(
            "physical_pushups",
            "100 Push-ups",
            "Target: pectoralis major, triceps. Keep the core tight.",
        )
        .with_stat_reward(Stat::Strength, 3),
        physical("physical_situps", "100 Sit-ups", "Target: abdominal muscles.")
            .with_stat_reward(Stat::Agility, 1)
            .with_stat_reward(Stat::Stamina, 2),
        physical("physical_squats", "100 Squats", "Target: quadriceps, glutes.")
            .with_stat_reward(Stat::Strength, 2)
            .with_stat_reward(Stat::Agility, 1),
        physical("physical_run", "10km Run", "Cardio endurance training.")
            .with_exp_reward(200)
            .with_stamina_cost(30)
            .with_stat_reward(Stat::Stamina, 5)
            .with_stat_reward(Stat::Agility, 3),
        system(
            "sys_coding",
            "Code for 2 Hours",
            "Practice coding or push a project forward.",
            Difficulty::Medium,
        )
        .with_exp_reward(150)
        .with_stamina_cost(20)
        .with_stat_reward(Stat::Intelligence, 4),
        system(
            "sys_reading",
            "Read Technical Docs",
            "Acquire new knowledge.",
            Difficulty::Easy,
        )
        .with_exp_reward(50)
        .with_stamina_cost(10)
        .with_stat_reward(Stat::Intelligence, 2),
        QuestRecord::world(
            "skill_meditation",
            "Meditation Practice",
            "Meditate for 20 minutes to improve focus.",
            Difficulty::Easy,
        )
        .with_kind(QuestKind::Skill)
        .with_exp_reward(40)
        .with_stamina_cost(5)
        .with_stat_reward(Stat::Intelligence, 1)
        .with_stat_reward(Stat::Stamina, 1),
        QuestRecord::world(
            "skill_sprint",
            "Sprint Training",
            "Complete 10 sprints to improve speed.",
            Difficulty::Medium,
        )
        .with_kind(QuestKind::Skill)
        .with_category(QuestCategory::Physical)
        .with_exp_reward(80)
        .with_stamina_cost(25)
        .with_stat_reward(Stat::Agility, 3)
        .with_stat_reward(Stat::Stamina, 1),
        QuestRecord::world(
            "challenge_marathon",
            "Marathon Study Session",
            "Study continuously for 4 hours.",
            Difficulty::Hard,
        )
        .with_kind(QuestKind::Challenge)
        .with_category(QuestCategory::System)
        .with_exp_reward(200)
        .with_stamina_cost(40)
        .with_stat_reward(Stat::Intelligence, 5)
        .with_stat_reward(Stat::Stamina, 2),
        QuestRecord::world(
            "challenge_project",
            "Complete a Project",
            "Finish a full coding project from start to end.",
            Difficulty::Hard,
        )
        .with_kind(QuestKind::Challenge)
        .with_category(QuestCategory::System)
        .with_exp_reward(300)
        .with_stamina_cost(50)
        .with_stat_reward(Stat::Intelligence, 4)
        .with_stat_reward(Stat::Agility, 3)
        .with_stat_reward(Stat::Strength, 2),
        QuestRecord::world("light_walk", "Light Walk", "Take a 15-minute walk.", Difficulty::Easy)
            .with_exp_reward(25)
            .with_stamina_cost(5)
            .with_stat_reward(Stat::Stamina, 1),
        QuestRecord::world(
            "light_review",
            "Quick Review",
            "Review notes for 15 minutes.",
            Difficulty::Easy,
        )
        .with_exp_reward(30)
        .with_stamina_cost(8)
        .with_stat_reward(Stat::Intelligence, 1),
    ]
}

pub fn starter_skills() -> Vec<SkillRecord> {
    vec![
        SkillRecord::new(
            "active_heal",
            "Recovery",
            "Restores health. Effect increases with level.",
            SkillKind::Active {
                stamina_cost: 20,
                effects: vec![Scaled::new(Effect::RestoreHealth, 30, 5)],
            },
        )
        .with_unlock_cost(1)
        .with_max_level(5),
        SkillRecord::new(
            "active_focus",
            "Focus Mode",
            "Grants immediate experience. Effect increases with level.",
            SkillKind::Active {
                stamina_cost: 15,
                effects: vec![Scaled::new(Effect::GrantExp, 50, 5)],
            },
        )
        .with_unlock_cost(2)
        .with_max_level(10),
        SkillRecord::new(
            "meditation",
            "Meditation",
            "Restores stamina. Effect increases with level.",
            SkillKind::Active {
                stamina_cost: 0,
                effects: vec![Scaled::new(Effect::RestoreStamina, 10, 5)],
            },
        )
        .with_unlock_cost(2)
        .with_max_level(5),
        SkillRecord::new(
            "passive_str",
            "Iron Will",
            "Increases strength.",
            SkillKind::Passive {
                bonuses: vec![Scaled::new(Stat::Strength, 5, 1)],
            },
        )
        .with_unlock_cost(2)
        .with_max_level(10),
        SkillRecord::new(
            "tactical_mind",
            "Tactical Mind",
            "Increases intelligence.",
            SkillKind::Passive {
                bonuses: vec![Scaled::new(Stat::Intelligence, 5, 3)],
            },
        )
        .with_unlock_cost(3)
        .with_max_level(10),
        SkillRecord::new(
            "passive_vitality",
            "Vitality",
            "Increases max health.",
            SkillKind::Passive {
                bonuses: vec![Scaled::new(Stat::MaxHealth, 20, 10)],
            },
        )
        .with_unlock_cost(4)
        .with_max_level(10),
    ]
}

pub fn starter_titles() -> Vec<TitleRecord> {
    vec![
        TitleRecord::new(
            BEGINNER_TITLE_ID,
            "Beginner",
            "Just starting the journey",
            TitleCondition::Automatic,
        ),
        TitleRecord::new(
            "novice",
            "Novice",
            "Learning the ropes",
            TitleCondition::LevelAtLeast { level: 5 },
        )
        .with_bonus(Stat::Strength, 2)
        .with_bonus(Stat::Agility, 2),
        TitleRecord::new(
            "apprentice",
            "Apprentice",
            "Showing promise",
            TitleCondition::LevelAtLeast { level: 10 },
        )
        .with_bonus(Stat::Strength, 5)
        .with_bonus(Stat::Agility, 5)
        .with_bonus(Stat::Intelligence, 5),
        TitleRecord::new(
            "quest_master",
            "Quest Master",
            "Completed 50 quests",
            TitleCondition::QuestCountAtLeast { count: 50 },
        )
        .with_bonus(Stat::Stamina, 10),
        TitleRecord::new(
            "scholar",
            "Scholar",
            "Intelligence reaches 50",
            TitleCondition::StatAtLeast {
                stat: Stat::Intelligence,
                value: 50,
            },
        )
        .with_bonus(Stat::Intelligence, 10),
        TitleRecord::new(
            "warrior",
            "Warrior",
            "Strength reaches 50",
            TitleCondition::StatAtLeast {
                stat: Stat::Strength,
                value: 50,
            },
        )
        .with_bonus(Stat::Strength, 10),
        TitleRecord::new(
            "speedster",
            "Speedster",
            "Agility reaches 50",
            TitleCondition::StatAtLeast {
                stat: Stat::Agility,
                value: 50,
            },
        )
        .with_bonus(Stat::Agility, 10),
        TitleRecord::new(
            "unstoppable",
            "Unstoppable",
            "Reach level 20",
            TitleCondition::LevelAtLeast { level: 20 },
        )
        .with_bonus(Stat::Strength, 10)
        .with_bonus(Stat::Agility, 10)
        .with_bonus(Stat::Intelligence, 10)
        .with_bonus(Stat::Stamina, 20),
        TitleRecord::new(
            "night_owl",
            "Night Owl",
            "One who thrives in the shadow hours.",
            TitleCondition::ActiveDuringHours { from: 23, until: 4 },
        )
        .with_bonus(Stat::Intelligence, 3),
        TitleRecord::new(
            "early_riser",
            "Early Riser",
            "Discipline begins before the sun.",
            TitleCondition::ActiveDuringHours { from: 5, until: 8 },
        )
        .with_bonus(Stat::Stamina, 5),
    ]
}

pub fn starter_items() -> Vec<ShopItem> {
    vec![
        ShopItem::new(
            "potion_stamina_small",
            "Minor Stamina Potion",
            "Restores 50 stamina.",
            100,
        )
        .with_effect(Effect::RestoreStamina, 50)
        .with_icon("🧪"),
        ShopItem::new(
            "potion_health_small",
            "Minor Health Potion",
            "Restores 50 health.",
            150,
        )
        .with_effect(Effect::RestoreHealth, 50)
        .with_icon("❤️"),
        ShopItem::new(
            "xp_booster_1h",
            "XP Scroll (Small)",
            "Grants an instant 500 exp.",
            500,
        )
        .with_effect(Effect::GrantExp, 500)
        .with_icon("📜"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn starter_quest_ids_match_catalog() {
        let ids: Vec<_> = starter_quests().into_iter().map(|q| q.id).collect();
        assert_eq!(ids, STARTER_QUEST_IDS);
    }

    #[test]
    fn catalog_ids_are_unique() {
        let skills: HashSet<_> = starter_skills().into_iter().map(|s| s.id).collect();
        assert_eq!(skills.len(), starter_skills().len());
        let titles: HashSet<_> = starter_titles().into_iter().map(|t| t.id).collect();
        assert_eq!(titles.len(), starter_titles().len());
        assert!(titles.contains(BEGINNER_TITLE_ID));
    }

    #[test]
    fn every_starter_quest_is_global() {
        assert!(starter_quests()
            .iter()
            .all(|q| q.is_global() && !q.is_custom));
    }
}
