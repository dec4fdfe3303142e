//! Counseling orchestration for Reframe.
//!
//! This crate owns everything between the HTTP surface and the external
//! collaborators: the four-step controller, prompt construction, the
//! daily usage gate, the fixed fallback payloads, and the gamification
//! rules. Handlers construct one [`Counselor`] and call its operations.

pub mod abc;
pub mod gate;
pub mod payloads;
pub mod practice;
pub mod prompt;
pub mod service;

pub use abc::{StepInput, StepOutcome};
pub use gate::{GateDecision, UsageGate};
pub use payloads::{BeliefGuidance, Evaluation, EvaluationScores, SolutionSet, Suggestion};
pub use practice::{CounselingQuality, Personality, PracticeReply};
pub use service::Counselor;
