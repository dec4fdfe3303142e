//! Safety screening types — risk tiers, assessments, and urgent alerts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Urgency of a detected safety concern.
///
/// Ordered: `None < Low < Medium < High`. `Unknown` is reserved for the
/// fail-safe path where screening itself failed — it is treated as
/// needing adult help but does not participate in the escalation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    #[default]
    None,
    Low,
    Medium,
    High,
    Unknown,
}

impl RiskLevel {
    /// Escalation priority. Higher wins when merging keyword and AI results.
    pub fn priority(self) -> u8 {
        match self {
            RiskLevel::None | RiskLevel::Unknown => 0,
            RiskLevel::Low => 1,
            RiskLevel::Medium => 2,
            RiskLevel::High => 3,
        }
    }

    /// Merge two assessments: risk only ever escalates, never de-escalates.
    pub fn max(self, other: RiskLevel) -> RiskLevel {
        if other.priority() > self.priority() { other } else { self }
    }

    /// Parse a level name the AI may return. Anything unrecognized maps to
    /// `None` so a malformed classification cannot escalate on its own.
    pub fn parse_lenient(s: &str) -> RiskLevel {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => RiskLevel::Low,
            "medium" => RiskLevel::Medium,
            "high" => RiskLevel::High,
            _ => RiskLevel::None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RiskLevel::None => "none",
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Unknown => "unknown",
        }
    }

    /// Inverse of [`RiskLevel::name`], for decoding stored rows.
    /// Unlike [`RiskLevel::parse_lenient`], this preserves `unknown`.
    pub fn from_name(s: &str) -> Option<RiskLevel> {
        match s {
            "none" => Some(RiskLevel::None),
            "low" => Some(RiskLevel::Low),
            "medium" => Some(RiskLevel::Medium),
            "high" => Some(RiskLevel::High),
            "unknown" => Some(RiskLevel::Unknown),
            _ => None,
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The record written for every safety check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub session_id: Uuid,
    pub user_id: String,
    pub conversation_text: String,

    /// Keywords that matched, in scan order; first match per tier wins.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub detected_keywords: Vec<String>,

    pub risk_level: RiskLevel,

    /// Concerns reported by the AI classification pass, if it ran.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ai_concerns: Vec<String>,

    pub immediate_action_needed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Pending,
    Resolved,
}

/// Written when a check lands at high risk or immediate action is flagged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrgentAlert {
    pub id: Uuid,
    pub session_id: Uuid,
    pub user_id: String,
    pub conversation_text: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub detected_keywords: Vec<String>,

    pub risk_level: RiskLevel,

    /// The raw AI classification payload, for reviewer context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_analysis: Option<serde_json::Value>,

    pub status: AlertStatus,
    pub created_at: DateTime<Utc>,
}

/// Help-line and online resources returned with every safety verdict,
/// including the failure path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HelpResources {
    /// Display name → phone number.
    pub phone: Vec<(String, String)>,
    /// Display name → URL.
    pub online: Vec<(String, String)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_merge_is_monotonic() {
        assert_eq!(RiskLevel::Low.max(RiskLevel::High), RiskLevel::High);
        assert_eq!(RiskLevel::High.max(RiskLevel::Low), RiskLevel::High);
        assert_eq!(RiskLevel::Medium.max(RiskLevel::Medium), RiskLevel::Medium);
        assert_eq!(RiskLevel::None.max(RiskLevel::Low), RiskLevel::Low);
    }

    #[test]
    fn lenient_parse_never_escalates_garbage() {
        assert_eq!(RiskLevel::parse_lenient("HIGH"), RiskLevel::High);
        assert_eq!(RiskLevel::parse_lenient(" medium "), RiskLevel::Medium);
        assert_eq!(RiskLevel::parse_lenient("catastrophic"), RiskLevel::None);
        assert_eq!(RiskLevel::parse_lenient(""), RiskLevel::None);
    }
}
