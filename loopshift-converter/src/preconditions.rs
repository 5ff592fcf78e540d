//! Categorical eligibility checks
//!
//! Runs before any per-statement work. A loop rejected here is never
//! partially rewritten.

use crate::normalize::{LoopForm, LoopMetadata};
use loopshift_core::ast::Stmt;
use serde::Serialize;
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum IneligibleReason {
    Break,
    Throw,
    LabeledJump,
    /// Counted loop without a closed linear range
    UnboundedCount,
    DoWhile,
    /// `while` loop not driven by a single cursor
    OpaqueWhile,
    MultipleIterators,
    IteratorMutation,
    UnconditionalReturn,
    DivergentReturns,
    BreakAndContinue,
    EmptyBody,
}

impl fmt::Display for IneligibleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            IneligibleReason::Break => "loop body contains break",
            IneligibleReason::Throw => "loop body contains throw",
            IneligibleReason::LabeledJump => "loop body jumps to an outer label",
            IneligibleReason::UnboundedCount => "counted loop is not a closed range",
            IneligibleReason::DoWhile => "do-while runs its body before the check",
            IneligibleReason::OpaqueWhile => "while loop has no single cursor",
            IneligibleReason::MultipleIterators => "more than one cursor is advanced",
            IneligibleReason::IteratorMutation => "collection is modified during traversal",
            IneligibleReason::UnconditionalReturn => "loop body always returns",
            IneligibleReason::DivergentReturns => "return sites yield different values",
            IneligibleReason::BreakAndContinue => "loop body mixes break and continue",
            IneligibleReason::EmptyBody => "loop body is empty",
        };
        write!(f, "{text}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Eligibility {
    Eligible,
    Ineligible(IneligibleReason),
}

impl Eligibility {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Eligibility::Eligible)
    }

    pub fn reason(&self) -> Option<IneligibleReason> {
        match self {
            Eligibility::Eligible => None,
            Eligibility::Ineligible(reason) => Some(*reason),
        }
    }
}

/// Decides whether a loop may be converted at all
#[derive(Debug, Clone, Copy, Default)]
pub struct PreconditionsChecker;

impl PreconditionsChecker {
    pub fn new() -> Self {
        Self
    }

    pub fn check(&self, meta: &LoopMetadata) -> Eligibility {
        match first_violation(meta) {
            Some(reason) => {
                debug!(%reason, form = ?meta.form, "loop rejected by preconditions");
                Eligibility::Ineligible(reason)
            }
            None => Eligibility::Eligible,
        }
    }
}

fn first_violation(meta: &LoopMetadata) -> Option<IneligibleReason> {
    let flags = &meta.flags;
    let checks = [
        (flags.has_labeled_jump, IneligibleReason::LabeledJump),
        (meta.form == LoopForm::DoWhile, IneligibleReason::DoWhile),
        (flags.has_multiple_iterators, IneligibleReason::MultipleIterators),
        (flags.has_iterator_mutation, IneligibleReason::IteratorMutation),
        (meta.form == LoopForm::Counted, IneligibleReason::UnboundedCount),
        (meta.form == LoopForm::While, IneligibleReason::OpaqueWhile),
        (is_empty_body(meta), IneligibleReason::EmptyBody),
        (
            flags.has_break && flags.has_continue,
            IneligibleReason::BreakAndContinue,
        ),
        (flags.has_break, IneligibleReason::Break),
        (flags.has_throw, IneligibleReason::Throw),
        (
            flags.has_unconditional_return,
            IneligibleReason::UnconditionalReturn,
        ),
        (has_divergent_returns(meta), IneligibleReason::DivergentReturns),
    ];
    checks
        .into_iter()
        .find(|(violated, _)| *violated)
        .map(|(_, reason)| reason)
}

fn is_empty_body(meta: &LoopMetadata) -> bool {
    fn empty(stmts: &[Stmt]) -> bool {
        stmts.iter().all(|s| match s {
            Stmt::Empty => true,
            Stmt::Block(inner) => empty(inner),
            _ => false,
        })
    }
    empty(&meta.body)
}

/// Two or more return sites that do not all yield the same value
fn has_divergent_returns(meta: &LoopMetadata) -> bool {
    match meta.returns.split_first() {
        Some((first, rest)) => rest.iter().any(|value| value != first),
        None => false,
    }
}

#[cfg(test)]
#[path = "preconditions_tests.rs"]
mod tests;
