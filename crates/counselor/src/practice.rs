//! Practice mode — a virtual friend to counsel.
//!
//! The friend has one of three fixed personalities; its replies come from
//! the AI with a canned in-character line as fallback. Each counselor
//! turn also gets a quick quality estimate, with hints attached when the
//! estimate is low.

use serde::{Deserialize, Serialize};

/// The virtual friend's personality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Personality {
    Shy,
    #[default]
    Talkative,
    Emotional,
}

impl Personality {
    /// Role framing handed to the prompt builder.
    pub fn framing(self) -> &'static str {
        match self {
            Personality::Shy => {
                "You are a shy 10-year-old elementary school student. You speak quietly, \
                 in short sentences, and take a while to open up."
            }
            Personality::Talkative => {
                "You are a lively, talkative 10-year-old elementary school student. You \
                 speak in an animated, friendly way."
            }
            Personality::Emotional => {
                "You are a 10-year-old elementary school student with big feelings. Your \
                 emotions show clearly in everything you say."
            }
        }
    }

    /// Canned in-character reply for when the AI is unavailable.
    pub fn fallback_reply(self) -> &'static str {
        match self {
            Personality::Shy => "Mm... yeah... (in a small voice)",
            Personality::Talkative => "Whoa, really? Tell me more!",
            Personality::Emotional => "That really happened...? (eyes welling up)",
        }
    }
}

/// A rough estimate of how helpful the counselor's message was.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounselingQuality {
    pub score: u8,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
}

/// The practice-mode turn result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PracticeReply {
    pub friend_response: String,
    pub quality: CounselingQuality,

    /// Present only when the quality estimate falls below the hint threshold.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hints: Option<Vec<String>>,
}

/// Quality below this attaches hints to the reply.
pub const HINT_THRESHOLD: u8 = 70;

/// Heuristic quality estimate — no AI call.
///
/// Rewards length, questions, and empathy markers; this is a nudge for
/// the child, not a grade.
pub fn estimate_quality(counselor_message: &str) -> CounselingQuality {
    let message = counselor_message.trim();
    let lowered = message.to_lowercase();

    let mut score: u8 = 50;
    let mut strengths = Vec::new();
    let mut improvements = Vec::new();

    if message.chars().count() >= 20 {
        score += 15;
        strengths.push("You took the time to really say something".to_string());
    } else {
        improvements.push("Try saying a little more about what you heard".to_string());
    }

    if message.contains('?') {
        score += 15;
        strengths.push("Asking questions keeps your friend talking".to_string());
    } else {
        improvements.push("Try asking a gentle question".to_string());
    }

    const EMPATHY_MARKERS: [&str; 5] =
        ["understand", "sounds", "sorry", "that must", "i hear"];
    if EMPATHY_MARKERS.iter().any(|m| lowered.contains(m)) {
        score += 20;
        strengths.push("You showed you understand how your friend feels".to_string());
    } else {
        improvements.push("Name the feeling you think your friend has".to_string());
    }

    CounselingQuality {
        score: score.min(100),
        strengths,
        improvements,
    }
}

/// The fixed hints attached to low-quality turns.
pub fn hints() -> Vec<String> {
    vec![
        "Give your friend time — don't rush them".into(),
        "Let them know their feelings make sense".into(),
        "Look for a solution together, not for them".into(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empathetic_question_scores_high() {
        let quality = estimate_quality(
            "That sounds really hard. I understand why you're upset — do you want to talk about it?",
        );
        assert!(quality.score >= HINT_THRESHOLD);
        assert!(quality.improvements.is_empty());
    }

    #[test]
    fn curt_reply_scores_low() {
        let quality = estimate_quality("ok");
        assert!(quality.score < HINT_THRESHOLD);
        assert_eq!(quality.improvements.len(), 3);
    }

    #[test]
    fn personality_parsing_from_json() {
        let p: Personality = serde_json::from_str("\"shy\"").unwrap();
        assert_eq!(p, Personality::Shy);
        assert!(p.framing().contains("shy"));
        assert!(!p.fallback_reply().is_empty());
    }
}
