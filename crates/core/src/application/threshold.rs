//! Threshold evaluation - decides whether an entry is due a notification
//!
//! Two interchangeable policies share the shop's `notify_threshold`:
//! - `Wait`: eligible when `estimated_wait <= threshold` minutes
//! - `Position`: eligible when `position <= threshold`
//!
//! Both boundaries are inclusive.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

/// Inputs the policies look at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub position: u32,
    pub estimated_wait: u32,
    pub notified: bool,
}

/// Per-entry decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    AlreadyNotified,
    NotYetDue,
}

/// Configured policy selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdPolicy {
    #[default]
    #[serde(alias = "estimated_wait")]
    Wait,
    Position,
}

impl ThresholdPolicy {
    /// Build the evaluator for this policy
    pub fn evaluator(self) -> Arc<dyn ThresholdEvaluator> {
        match self {
            ThresholdPolicy::Wait => Arc::new(WaitThreshold),
            ThresholdPolicy::Position => Arc::new(PositionThreshold),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ThresholdPolicy::Wait => "wait",
            ThresholdPolicy::Position => "position",
        }
    }

    /// What the shop's `notify_threshold` counts under this policy
    pub fn threshold_unit(&self) -> &'static str {
        match self {
            ThresholdPolicy::Wait => "minutes",
            ThresholdPolicy::Position => "positions",
        }
    }
}

impl std::fmt::Display for ThresholdPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThresholdPolicy {
    type Err = crate::error::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "wait" | "estimated_wait" => Ok(ThresholdPolicy::Wait),
            "position" => Ok(ThresholdPolicy::Position),
            other => Err(crate::error::AppError::Config(format!(
                "unknown threshold policy '{}' (expected 'wait' or 'position')",
                other
            ))),
        }
    }
}

/// Notification eligibility strategy
pub trait ThresholdEvaluator: Send + Sync {
    fn policy(&self) -> ThresholdPolicy;

    /// Shop-level test only; ignores the entry's notified flag
    fn within_threshold(&self, candidate: &Candidate, threshold: u32) -> bool;

    /// Full decision including entry-level state
    fn evaluate(&self, candidate: &Candidate, threshold: u32) -> Eligibility {
        if candidate.notified {
            Eligibility::AlreadyNotified
        } else if self.within_threshold(candidate, threshold) {
            Eligibility::Eligible
        } else {
            Eligibility::NotYetDue
        }
    }
}

/// `estimated_wait <= threshold` (minutes)
pub struct WaitThreshold;

impl ThresholdEvaluator for WaitThreshold {
    fn policy(&self) -> ThresholdPolicy {
        ThresholdPolicy::Wait
    }

    fn within_threshold(&self, candidate: &Candidate, threshold: u32) -> bool {
        candidate.estimated_wait <= threshold
    }
}

/// `position <= threshold` (count)
pub struct PositionThreshold;

impl ThresholdEvaluator for PositionThreshold {
    fn policy(&self) -> ThresholdPolicy {
        ThresholdPolicy::Position
    }

    fn within_threshold(&self, candidate: &Candidate, threshold: u32) -> bool {
        candidate.position <= threshold
    }
}
