//! Statement-level side-effect classification

use crate::operation::ProspectiveOperation;
use loopshift_core::ast::{AstHashSet, Expr, Stmt};
use loopshift_core::visitor::{walk_stmt, Visitor};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EffectClass {
    /// Declares a new local from a pure expression; a MAP candidate
    PureTransform,
    /// Effects that are safe to run inside a terminal action
    SafeTerminal,
    Unsafe,
}

impl EffectClass {
    pub fn is_safe(self) -> bool {
        self != EffectClass::Unsafe
    }
}

/// Classifies one statement relative to the current stage variable
///
/// Calls are allowed; writes are allowed only to locals the statement
/// declares itself. A missing statement is unsafe.
pub fn classify(stmt: Option<&Stmt>, current: &str, ops: &[ProspectiveOperation]) -> EffectClass {
    let stmt = match stmt {
        Some(stmt) => stmt,
        None => return EffectClass::Unsafe,
    };

    let mut scanner = EffectScanner {
        declared: stmt.declared_names(),
        labels: Vec::new(),
        loop_depth: 0,
        violation: None,
    };
    walk_stmt(&mut scanner, stmt);

    if let Some(violation) = scanner.violation {
        let stage_variable = violation == current
            || ops
                .iter()
                .any(|op| op.param == violation || op.produced.as_deref() == Some(violation.as_str()));
        debug!(
            statement = stmt.kind_name(),
            %violation,
            stage_variable,
            "unsafe side effect"
        );
        return EffectClass::Unsafe;
    }

    match stmt.single() {
        Stmt::Local { init: Some(_), .. } => EffectClass::PureTransform,
        _ => EffectClass::SafeTerminal,
    }
}

/// The variable at the root of an assignment target: `a` in `a.b[0].c`
fn root_variable(target: &Expr) -> Option<&str> {
    match target.unparenthesized() {
        Expr::Name(name) => Some(name),
        Expr::FieldAccess { target, .. } => root_variable(target),
        Expr::ArrayAccess { array, .. } => root_variable(array),
        _ => None,
    }
}

struct EffectScanner {
    declared: AstHashSet<String>,
    labels: Vec<String>,
    loop_depth: usize,
    violation: Option<String>,
}

impl EffectScanner {
    fn flag(&mut self, what: &str) {
        if self.violation.is_none() {
            self.violation = Some(what.to_string());
        }
    }

    fn check_write(&mut self, target: &Expr) {
        match root_variable(target) {
            Some(root) if self.declared.contains(root) => {}
            Some(root) => {
                let root = root.to_string();
                self.flag(&root);
            }
            None => self.flag("<computed target>"),
        }
    }
}

impl Visitor for EffectScanner {
    fn enter_stmt(&mut self, stmt: &Stmt) -> bool {
        match stmt {
            Stmt::Labeled { label, .. } => self.labels.push(label.clone()),
            s if s.is_loop() => self.loop_depth += 1,
            Stmt::Return(_) => self.flag("return"),
            Stmt::Throw(_) => self.flag("throw"),
            Stmt::Break(None) | Stmt::Continue(None) => {
                if self.loop_depth == 0 {
                    self.flag("jump");
                }
            }
            Stmt::Break(Some(label)) | Stmt::Continue(Some(label)) => {
                if !self.labels.iter().any(|l| l == label) {
                    self.flag("jump");
                }
            }
            _ => {}
        }
        self.violation.is_none()
    }

    fn leave_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Labeled { .. } => {
                self.labels.pop();
            }
            s if s.is_loop() => self.loop_depth -= 1,
            _ => {}
        }
    }

    fn enter_expr(&mut self, expr: &Expr) -> bool {
        match expr {
            Expr::Lambda { .. } => return false,
            Expr::Assign { target, .. } => self.check_write(target),
            Expr::Unary { op, operand } if op.is_update() => self.check_write(operand),
            _ => {}
        }
        self.violation.is_none()
    }
}

#[cfg(test)]
#[path = "side_effects_tests.rs"]
mod tests;
