//! User profile — experience, level, skills, badges.
//!
//! Level is derived from experience (`level = experience / 100 + 1`).
//! Badges are awarded at most once per id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Experience points required per level.
pub const XP_PER_LEVEL: u32 = 100;

/// Derive a level from total experience.
pub fn level_for_experience(experience: u32) -> u32 {
    experience / XP_PER_LEVEL + 1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BadgeAward {
    pub name: String,
    pub awarded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub uid: String,

    #[serde(default)]
    pub nickname: String,

    pub level: u32,
    pub experience: u32,

    /// Skill name → accumulated points.
    #[serde(default)]
    pub skills: BTreeMap<String, u32>,

    /// Badge id → award record. Idempotent union.
    #[serde(default)]
    pub badges: BTreeMap<String, BadgeAward>,

    pub sessions_completed: u32,
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn new(uid: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            uid: uid.into(),
            nickname: String::new(),
            level: 1,
            experience: 0,
            skills: BTreeMap::new(),
            badges: BTreeMap::new(),
            sessions_completed: 0,
            created_at: now,
        }
    }

    /// Add experience and recompute the level. Returns true on level-up.
    pub fn add_experience(&mut self, amount: u32) -> bool {
        self.experience = self.experience.saturating_add(amount);
        let new_level = level_for_experience(self.experience);
        let leveled_up = new_level > self.level;
        self.level = new_level;
        leveled_up
    }

    /// Add points to a named skill.
    pub fn add_skill_points(&mut self, skill: &str, points: u32) {
        *self.skills.entry(skill.to_string()).or_insert(0) += points;
    }

    /// Award a badge once. Returns false if the badge was already held.
    pub fn award_badge(&mut self, badge_id: &str, name: &str, now: DateTime<Utc>) -> bool {
        if self.badges.contains_key(badge_id) {
            return false;
        }
        self.badges.insert(
            badge_id.to_string(),
            BadgeAward { name: name.to_string(), awarded_at: now },
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_derivation() {
        assert_eq!(level_for_experience(0), 1);
        assert_eq!(level_for_experience(99), 1);
        assert_eq!(level_for_experience(100), 2);
        assert_eq!(level_for_experience(250), 3);
    }

    #[test]
    fn experience_triggers_level_up() {
        let mut profile = UserProfile::new("u1", Utc::now());
        assert!(!profile.add_experience(50));
        assert!(profile.add_experience(60));
        assert_eq!(profile.level, 2);
        assert_eq!(profile.experience, 110);
    }

    #[test]
    fn badge_award_is_idempotent() {
        let mut profile = UserProfile::new("u1", Utc::now());
        let now = Utc::now();
        assert!(profile.award_badge("first_session", "First Session", now));
        assert!(!profile.award_badge("first_session", "First Session", now));
        assert_eq!(profile.badges.len(), 1);
    }
}
