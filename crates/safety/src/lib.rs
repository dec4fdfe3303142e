//! Safety screening for Reframe.
//!
//! Two-tier check: a fixed keyword scan sets the baseline risk level, and
//! an AI classification pass may escalate it — never de-escalate. High
//! risk (or an immediate-action flag) writes an urgent alert. Screening
//! errors fail toward caution: the child is always told to seek adult
//! help when we cannot tell what is going on.

pub mod keywords;
pub mod screener;

pub use keywords::{KeywordScan, KeywordTiers};
pub use screener::{Screener, SafetyVerdict};
