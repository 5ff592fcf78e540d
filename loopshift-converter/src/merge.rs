//! Grouping of sibling loops that fill one destination
//!
//! Converting such loops one at a time would assign the destination once
//! per loop and keep only the last loop's elements. They are handed to the
//! converter together so the builder can concatenate their sources.

use crate::lambda::LambdaGenerator;
use crate::normalize::{LoopNormalizer, LoopSource};
use crate::operation::OperationKind;
use crate::parser::{BodyParse, LoopBodyParser};
use crate::preconditions::PreconditionsChecker;
use crate::site::{ConversionUnit, LoopGroup, LoopSite};
use loopshift_core::ast::Stmt;
use loopshift_core::error::Result;
use loopshift_core::scope::Scope;
use std::ops::Range;
use tracing::debug;

/// The destination a for-each loop collects into: its body parses to
/// stages ending in a COLLECT, over a source that can be concatenated
pub fn collect_target(stmt: &Stmt, scope: &Scope) -> Result<Option<String>> {
    let for_each = match stmt {
        Stmt::Labeled { body, .. } => matches!(**body, Stmt::ForEach { .. }),
        other => matches!(other, Stmt::ForEach { .. }),
    };
    if !for_each {
        return Ok(None);
    }
    let meta = match LoopNormalizer::default().normalize(stmt, scope) {
        Some(meta) => meta,
        None => return Ok(None),
    };
    let concatenable = match meta.source {
        LoopSource::Collection(_) => true,
        LoopSource::Array(_) => meta.element_type.as_ref().map_or(false, |ty| !ty.is_primitive()),
        _ => false,
    };
    if !concatenable || !PreconditionsChecker::new().check(&meta).is_eligible() {
        return Ok(None);
    }

    let mut generator = LambdaGenerator::new();
    let body = match LoopBodyParser::new(scope, None).parse(&meta, &mut generator)? {
        BodyParse::Parsed(body) => body,
        BodyParse::Aborted(_) => return Ok(None),
    };
    Ok(match body.operations.last().map(|op| &op.kind) {
        Some(OperationKind::Collect { target }) => Some(target.clone()),
        _ => None,
    })
}

fn is_loop(stmt: &Stmt) -> bool {
    match stmt {
        Stmt::Labeled { body, .. } => body.is_loop(),
        other => other.is_loop(),
    }
}

/// Splits a statement list into conversion units, one per loop, with
/// consecutive loops appending to the same fresh destination grouped
pub fn group_sibling_loops(statements: &[Stmt], scope: &Scope) -> Result<Vec<ConversionUnit>> {
    let targets = statements
        .iter()
        .map(|stmt| collect_target(stmt, scope))
        .collect::<Result<Vec<_>>>()?;
    let mut units = Vec::new();
    let mut i = 0;
    while i < statements.len() {
        if !is_loop(&statements[i]) {
            i += 1;
            continue;
        }

        if let Some(target) = targets[i].as_deref() {
            let end = run_end(&targets, i, target);
            if end - i >= 2 {
                if can_merge(statements, i..end, target, scope) {
                    debug!(%target, loops = end - i, "grouped sibling loops");
                    let loops = statements[i..end].to_vec();
                    units.push(ConversionUnit::Group(LoopGroup::new(target, loops, scope.clone())?));
                } else {
                    for index in i..end {
                        units.push(single(statements, index, scope));
                    }
                }
                i = end;
                continue;
            }
        }

        units.push(single(statements, i, scope));
        i += 1;
    }
    Ok(units)
}

/// One unit per loop, with no grouping
pub fn split_loops(statements: &[Stmt], scope: &Scope) -> Vec<ConversionUnit> {
    (0..statements.len())
        .filter(|&index| is_loop(&statements[index]))
        .map(|index| single(statements, index, scope))
        .collect()
}

/// End of the run of loops starting at `start` that collect into `target`
fn run_end(targets: &[Option<String>], start: usize, target: &str) -> usize {
    targets[start..]
        .iter()
        .position(|t| t.as_deref() != Some(target))
        .map_or(targets.len(), |offset| start + offset)
}

/// Another loop writes or reads `name`
fn other_loop_mentions(statements: &[Stmt], index: usize, name: &str) -> bool {
    statements
        .iter()
        .enumerate()
        .any(|(other, s)| other != index && is_loop(s) && s.mentions(name))
}

/// A group replaces the destination's declaration, so nothing else may
/// have touched the destination before it and no other loop may fill it
fn can_merge(statements: &[Stmt], run: Range<usize>, target: &str, scope: &Scope) -> bool {
    let fresh = scope
        .get(target)
        .map_or(false, |info| info.is_fresh_collection());
    let touched_before = statements[..run.start].iter().any(|s| s.mentions(target));
    let filled_elsewhere = statements
        .iter()
        .enumerate()
        .filter(|(index, _)| !run.contains(index))
        .any(|(_, s)| is_loop(s) && s.mentions(target));
    if fresh && (touched_before || filled_elsewhere) {
        debug!(%target, touched_before, filled_elsewhere, "sibling loops kept apart");
    }
    fresh && !touched_before && !filled_elsewhere
}

/// One loop as its own unit. A fresh destination that earlier statements
/// already touched, or that another loop also uses, is no longer treated
/// as fresh.
fn single(statements: &[Stmt], index: usize, scope: &Scope) -> ConversionUnit {
    let stmt = &statements[index];
    let mut scope = scope.clone();
    let stale: Vec<String> = scope
        .names()
        .filter(|name| {
            scope.get(name).map_or(false, |info| info.is_fresh_collection())
                && stmt.mentions(name)
                && (statements[..index].iter().any(|s| s.mentions(name))
                    || other_loop_mentions(statements, index, name))
        })
        .map(str::to_string)
        .collect();
    for name in &stale {
        scope.forget_collection_state(name);
    }

    let site = LoopSite::new(stmt.clone(), scope);
    match statements.get(index + 1) {
        Some(next) => site.followed_by(next.clone()).into(),
        None => site.into(),
    }
}

#[cfg(test)]
#[path = "merge_tests.rs"]
mod tests;
