//! Tiered keyword scanning.
//!
//! Three fixed severity tiers, scanned high → medium → low. Matching is
//! case-insensitive substring containment. The first tier with any match
//! decides the keyword-derived level, and the first matching keyword in
//! that tier is recorded — the scan stops there rather than collecting
//! matches across tiers.

use reframe_core::RiskLevel;

/// The canonical keyword lists, one per tier.
#[derive(Debug, Clone)]
pub struct KeywordTiers {
    pub high: Vec<String>,
    pub medium: Vec<String>,
    pub low: Vec<String>,
}

/// Result of a tier scan.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordScan {
    pub level: RiskLevel,
    /// Matched keywords in scan order; first match per tier wins.
    pub detected: Vec<String>,
}

impl KeywordTiers {
    pub fn from_config(config: &reframe_config::SafetyConfig) -> Self {
        Self {
            high: config.keywords_high.clone(),
            medium: config.keywords_medium.clone(),
            low: config.keywords_low.clone(),
        }
    }

    /// Scan `text` and return the keyword-derived risk level.
    pub fn scan(&self, text: &str) -> KeywordScan {
        let haystack = text.to_lowercase();

        let tiers = [
            (RiskLevel::High, &self.high),
            (RiskLevel::Medium, &self.medium),
            (RiskLevel::Low, &self.low),
        ];

        for (level, list) in tiers {
            for keyword in list {
                if haystack.contains(&keyword.to_lowercase()) {
                    return KeywordScan {
                        level,
                        detected: vec![keyword.clone()],
                    };
                }
            }
        }

        KeywordScan {
            level: RiskLevel::None,
            detected: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiers() -> KeywordTiers {
        KeywordTiers::from_config(&reframe_config::SafetyConfig::default())
    }

    #[test]
    fn high_tier_phrase_detected() {
        let scan = tiers().scan("I feel like I want to disappear");
        assert_eq!(scan.level, RiskLevel::High);
        assert_eq!(scan.detected, vec!["want to disappear".to_string()]);
    }

    #[test]
    fn scan_is_case_insensitive() {
        let scan = tiers().scan("They keep BULLYING me at recess");
        assert_eq!(scan.level, RiskLevel::Medium);
    }

    #[test]
    fn first_matching_tier_wins_and_scan_stops() {
        // Contains both a high-tier and a low-tier phrase; high wins and
        // the low keyword is not collected.
        let scan = tiers().scan("I'm so depressed I want to die");
        assert_eq!(scan.level, RiskLevel::High);
        assert_eq!(scan.detected.len(), 1);
        assert_eq!(scan.detected[0], "want to die");
    }

    #[test]
    fn clean_text_is_none() {
        let scan = tiers().scan("My friend got a puppy and we played outside");
        assert_eq!(scan.level, RiskLevel::None);
        assert!(scan.detected.is_empty());
    }
}
