//! Operator decisions and the seam operator I/O sits behind

use async_trait::async_trait;
use std::fmt;

use crate::types::{CandidateManifest, Result};

/// What the operator wants done with the current candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorDecision {
    Apply,
    Reprompt { clarification: String },
    Decline,
}

/// Menu entries offered at the decision prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionChoice {
    Apply,
    DontApply,
    Reprompt,
}

impl DecisionChoice {
    pub const ALL: [DecisionChoice; 3] = [
        DecisionChoice::Apply,
        DecisionChoice::DontApply,
        DecisionChoice::Reprompt,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            DecisionChoice::Apply => "Apply",
            DecisionChoice::DontApply => "Don't Apply",
            DecisionChoice::Reprompt => "Reprompt",
        }
    }

    /// Choices shown at the prompt; Reprompt is withdrawn once the bound is hit
    pub fn menu(allow_reprompt: bool) -> Vec<DecisionChoice> {
        Self::ALL
            .into_iter()
            .filter(|c| allow_reprompt || *c != DecisionChoice::Reprompt)
            .collect()
    }

    /// Parse a 1-based menu number or a label, case-insensitively
    ///
    /// Only choices present in `menu` are accepted.
    pub fn parse(input: &str, menu: &[DecisionChoice]) -> Option<DecisionChoice> {
        let input = input.trim();
        if let Ok(n) = input.parse::<usize>() {
            return n.checked_sub(1).and_then(|i| menu.get(i)).copied();
        }

        let normalized: String = input
            .to_lowercase()
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect();

        let choice = match normalized.as_str() {
            "apply" | "a" | "y" | "yes" => DecisionChoice::Apply,
            "dontapply" | "donotapply" | "d" | "n" | "no" => DecisionChoice::DontApply,
            "reprompt" | "r" => DecisionChoice::Reprompt,
            _ => return None,
        };
        menu.contains(&choice).then_some(choice)
    }
}

impl fmt::Display for DecisionChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Operator-facing I/O used by the interaction loop
#[async_trait]
pub trait Operator: Send + Sync {
    /// Show the candidate verbatim
    fn present(&self, candidate: &CandidateManifest);

    /// Ask what to do with the presented candidate
    async fn decide(&self, allow_reprompt: bool) -> Result<OperatorDecision>;
}
