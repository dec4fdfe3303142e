//! # Reframe Core
//!
//! Domain types, traits, and error definitions for the Reframe counseling
//! backend. This crate has **zero framework dependencies** — it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (the generative-AI service, the document
//! store, the auth provider) is defined as a trait here. Implementations
//! live in their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with scripted/in-memory fakes
//! - Clean dependency graph (all crates depend inward on core)

pub mod auth;
pub mod error;
pub mod profile;
pub mod provider;
pub mod safety;
pub mod session;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use auth::TokenVerifier;
pub use error::{AuthError, Error, ProviderError, Result, SessionError, StoreError};
pub use profile::{BadgeAward, UserProfile};
pub use provider::{BlockThreshold, GenerationRequest, GenerationResponse, HarmCategory, Provider};
pub use safety::{AlertStatus, HelpResources, RiskAssessment, RiskLevel, UrgentAlert};
pub use session::{Session, SessionData, SessionKind, SessionStatus, SessionSummary, Step, StepResponse};
pub use store::{AlertNotification, Store, UsageDecision};
