//! Typed AI feedback payloads and their pre-authored fallbacks.
//!
//! Every AI-backed operation has a fixed fallback payload so progression
//! never blocks on AI availability. Fallback sub-scores come from
//! configuration (`scoring.fallback_score`).

use reframe_core::session::{SessionSummary, SummaryScores};
use serde::{Deserialize, Serialize};

/// Feedback on a single piece of student writing (reframe or action step).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub scores: EvaluationScores,

    #[serde(default)]
    pub strengths: Vec<String>,

    #[serde(default)]
    pub suggestions: Vec<String>,

    #[serde(default, rename = "betterExamples")]
    pub better_examples: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationScores {
    pub warmth: u8,
    pub realism: u8,
    pub overall: u8,
}

impl EvaluationScores {
    pub fn clamped(self) -> Self {
        Self {
            warmth: self.warmth.min(100),
            realism: self.realism.min(100),
            overall: self.overall.min(100),
        }
    }
}

impl Evaluation {
    /// The fixed payload substituted when the AI call fails or its reply
    /// cannot be decoded.
    pub fn fallback(score: u8) -> Self {
        Self {
            scores: EvaluationScores {
                warmth: score,
                realism: score,
                overall: score,
            },
            strengths: vec!["You worked hard to see the situation differently".into()],
            suggestions: vec!["Try describing the feeling with more specific words".into()],
            better_examples: vec![
                "That was a hard moment, and one moment doesn't decide everything.".into(),
            ],
        }
    }
}

/// CBT solution suggestions, parsed from the AI's sectioned text reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionSet {
    pub positive_thoughts: Vec<String>,
    pub action_steps: Vec<String>,
    pub encouragement: String,
}

impl SolutionSet {
    pub fn fallback() -> Self {
        Self {
            positive_thoughts: vec!["It's okay to make mistakes — you can try again".into()],
            action_steps: vec![
                "Take a few slow, deep breaths".into(),
                "Talk it over with someone you trust".into(),
            ],
            encouragement: "You're doing just fine. Keep going!".into(),
        }
    }

    /// Parse the numbered-section reply format.
    ///
    /// Sections are located by their headings; bullet lines (`-` or `•`)
    /// become items, capped at three per section. An empty parse yields
    /// the full fallback rather than an empty payload.
    pub fn parse_sectioned(text: &str) -> Self {
        #[derive(PartialEq, Clone, Copy)]
        enum Section {
            None,
            Thoughts,
            Actions,
            Encouragement,
        }

        let mut section = Section::None;
        let mut positive_thoughts = Vec::new();
        let mut action_steps = Vec::new();
        let mut encouragement_lines: Vec<String> = Vec::new();

        for line in text.lines() {
            let trimmed = line.trim();

            // Bullets first: a bullet mentioning "action" or "positive"
            // is an item, not a heading.
            if let Some(item) = trimmed
                .strip_prefix('-')
                .or_else(|| trimmed.strip_prefix('•'))
            {
                let item = item.trim();
                if item.is_empty() {
                    continue;
                }
                match section {
                    Section::Thoughts if positive_thoughts.len() < 3 => {
                        positive_thoughts.push(item.to_string());
                    }
                    Section::Actions if action_steps.len() < 3 => {
                        action_steps.push(item.to_string());
                    }
                    Section::Encouragement => encouragement_lines.push(item.to_string()),
                    _ => {}
                }
                continue;
            }

            let lowered = trimmed.to_lowercase();
            if lowered.contains("new thought") || lowered.contains("positive") {
                section = Section::Thoughts;
            } else if lowered.contains("things to try")
                || lowered.contains("action")
                || lowered.contains("practice")
            {
                section = Section::Actions;
            } else if lowered.contains("encouragement") {
                section = Section::Encouragement;
            } else if section == Section::Encouragement && !trimmed.is_empty() {
                encouragement_lines.push(trimmed.to_string());
            }
        }

        if positive_thoughts.is_empty() && action_steps.is_empty() {
            return Self::fallback();
        }

        let encouragement = if encouragement_lines.is_empty() {
            Self::fallback().encouragement
        } else {
            encouragement_lines.join(" ")
        };

        Self {
            positive_thoughts,
            action_steps,
            encouragement,
        }
    }
}

/// The fixed, non-AI guidance shown at the belief step.
///
/// Naming the negative thought is the child's own reflection; no external
/// call is made for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeliefGuidance {
    pub message: String,
    pub tips: Vec<String>,
}

impl BeliefGuidance {
    pub fn standard() -> Self {
        Self {
            message: "Thanks for being honest about the thought. Seeing it clearly is the \
                      first step to changing it."
                .into(),
            tips: vec![
                "Write the thought exactly the way it sounds in your head".into(),
                "Ask yourself: would I say this to a friend?".into(),
                "Remember — a thought is not a fact".into(),
            ],
        }
    }
}

/// An empathy-style suggestion plus a tips list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestion {
    pub suggestion: String,
    pub tips: Vec<String>,
}

/// Tip categories for [`Suggestion`]. The caller picks one at random —
/// prompt construction itself stays deterministic.
pub const TIP_CATEGORIES: [[&str; 3]; 3] = [
    [
        "Listen to the whole story before responding",
        "Show you understand the feeling before giving advice",
        "If you've been through something similar, share it",
    ],
    [
        "Look at your friend while they talk",
        "Small words help — 'that sounds hard' goes a long way",
        "Don't rush to fix it; being there already helps",
    ],
    [
        "Ask what your friend needs right now",
        "Remind them it's not their fault",
        "Offer to do something together, even something small",
    ],
];

/// The fixed summary used when summary generation fails.
pub fn fallback_summary(score: u8) -> SessionSummary {
    SessionSummary {
        scores: SummaryScores {
            situation: score,
            belief: score,
            reframe: score,
            action: score,
            overall: score,
        },
        strengths: vec!["You finished every step of the exercise".into()],
        suggestions: vec!["Next time, try adding even more detail to your plan".into()],
        encouragement: "Finishing all four steps takes real courage. Well done!".into(),
    }
}
