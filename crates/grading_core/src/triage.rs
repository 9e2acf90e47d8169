//! crates/grading_core/src/triage.rs
//!
//! Maps an evaluated score onto an approval state.
//!
//! The three predicates overlap and do not cover every input on their own, so
//! [`triage`] applies them in a fixed order: approve, then partial credit, then
//! review, and finally [`TriageState::StandardPass`].

use crate::domain::{Confidence, TriageState};

pub const AUTO_APPROVE_THRESHOLD: u32 = 70;
pub const PARTIAL_CREDIT_FLOOR: u32 = 40;

pub fn auto_approve(total_score: u32, confidence: Confidence) -> bool {
    total_score >= AUTO_APPROVE_THRESHOLD && confidence == Confidence::High
}

pub fn is_partial_credit(total_score: u32) -> bool {
    (PARTIAL_CREDIT_FLOOR..AUTO_APPROVE_THRESHOLD).contains(&total_score)
}

pub fn needs_review(total_score: u32, confidence: Confidence) -> bool {
    total_score < PARTIAL_CREDIT_FLOOR || confidence == Confidence::Low
}

pub fn triage(total_score: u32, confidence: Confidence) -> TriageState {
    if auto_approve(total_score, confidence) {
        TriageState::AutoApproved
    } else if is_partial_credit(total_score) {
        TriageState::PartialCredit
    } else if needs_review(total_score, confidence) {
        TriageState::NeedsReview
    } else {
        TriageState::StandardPass
    }
}

impl TriageState {
    /// The performance fed to the rating calculator, or `None` while a human
    /// still has to look at the submission.
    pub fn performance(&self) -> Option<f64> {
        match self {
            TriageState::AutoApproved | TriageState::StandardPass => Some(1.0),
            TriageState::PartialCredit => Some(0.5),
            TriageState::NeedsReview => None,
        }
    }
}
