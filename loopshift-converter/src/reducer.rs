//! Accumulator classification
//!
//! Recognizes statements that fold every element into a variable declared
//! outside the loop and names the reduction they perform.

use loopshift_core::ast::{AssignOp, BinaryOp, Expr, Stmt, TypeRef};
use loopshift_core::scope::Scope;
use serde::Serialize;
use std::fmt;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ReducerType {
    Increment,
    Decrement,
    Sum,
    Product,
    StringConcat,
    Max,
    Min,
    /// Accumulates across iterations with no known safe combiner
    CustomAggregate,
}

impl ReducerType {
    /// Counting reductions ignore the element value
    pub fn is_counting(self) -> bool {
        matches!(self, ReducerType::Increment | ReducerType::Decrement)
    }
}

impl fmt::Display for ReducerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReducerType::Increment => "INCREMENT",
            ReducerType::Decrement => "DECREMENT",
            ReducerType::Sum => "SUM",
            ReducerType::Product => "PRODUCT",
            ReducerType::StringConcat => "STRING_CONCAT",
            ReducerType::Max => "MAX",
            ReducerType::Min => "MIN",
            ReducerType::CustomAggregate => "CUSTOM_AGGREGATE",
        };
        write!(f, "{name}")
    }
}

/// A classified accumulation statement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reduction {
    pub kind: ReducerType,
    pub accumulator: String,
    pub accumulator_type: TypeRef,
    /// Value folded into the accumulator; `None` for counting reductions
    pub operand: Option<Expr>,
    /// Operands of the combiner can never be null
    pub null_safe: bool,
    /// Comparison of an `if (value <op> acc) acc = value;` guard
    pub guard: Option<BinaryOp>,
}

/// Classifies accumulation updates against the variables of one loop site
pub struct ReducerClassifier<'a> {
    scope: &'a Scope,
}

impl<'a> ReducerClassifier<'a> {
    pub fn new(scope: &'a Scope) -> Self {
        Self { scope }
    }

    /// Returns the reduction `stmt` performs, or `None` when it does not
    /// accumulate into an outer variable at all
    pub fn classify(&self, stmt: &Stmt) -> Option<Reduction> {
        let reduction = match stmt.single() {
            Stmt::Expr(expr) => self.classify_update(expr),
            Stmt::If {
                condition,
                then_branch,
                else_branch: None,
            } => self.classify_guarded(condition, then_branch.single()),
            _ => None,
        }?;
        trace!(
            accumulator = %reduction.accumulator,
            kind = %reduction.kind,
            "classified accumulation"
        );
        Some(reduction)
    }

    fn classify_update(&self, expr: &Expr) -> Option<Reduction> {
        match expr.unparenthesized() {
            Expr::Unary { op, operand } if op.is_update() => {
                let acc = operand.as_name()?;
                let kind = if op.is_increment() {
                    ReducerType::Increment
                } else {
                    ReducerType::Decrement
                };
                self.reduction(acc, kind, None)
            }
            Expr::Assign { op, target, value } => {
                let acc = target.as_name()?;
                self.scope.get(acc)?;
                let (kind, operand) = match op {
                    AssignOp::Assign => self.classify_assignment(acc, value)?,
                    AssignOp::Add => self.additive(acc, value),
                    AssignOp::Sub if value.is_literal_one() => (ReducerType::Decrement, None),
                    AssignOp::Mul => self.multiplicative(acc, value),
                    _ => (ReducerType::CustomAggregate, None),
                };
                self.reduction(acc, kind, operand)
            }
            _ => None,
        }
    }

    /// `acc = <value>`; `None` when the value does not depend on `acc`
    fn classify_assignment(&self, acc: &str, value: &Expr) -> Option<(ReducerType, Option<Expr>)> {
        if !value.mentions(acc) {
            return None;
        }
        let classified = match value.unparenthesized() {
            Expr::Binary {
                op: BinaryOp::Add,
                lhs,
                rhs,
            } => {
                if lhs.is_name(acc) {
                    self.additive(acc, rhs)
                } else if rhs.is_name(acc) && self.is_numeric(acc) {
                    // Reordering operands is only sound for numeric addition
                    self.additive(acc, lhs)
                } else {
                    (ReducerType::CustomAggregate, None)
                }
            }
            Expr::Binary {
                op: BinaryOp::Sub,
                lhs,
                rhs,
            } if lhs.is_name(acc) && rhs.is_literal_one() => (ReducerType::Decrement, None),
            Expr::Binary {
                op: BinaryOp::Mul,
                lhs,
                rhs,
            } => {
                if lhs.is_name(acc) {
                    self.multiplicative(acc, rhs)
                } else if rhs.is_name(acc) {
                    self.multiplicative(acc, lhs)
                } else {
                    (ReducerType::CustomAggregate, None)
                }
            }
            Expr::MethodCall {
                receiver: Some(receiver),
                name,
                args,
            } if receiver.is_name("Math") && args.len() == 2 => {
                let kind = match name.as_str() {
                    "max" => ReducerType::Max,
                    "min" => ReducerType::Min,
                    _ => return Some((ReducerType::CustomAggregate, None)),
                };
                let other = if args[0].is_name(acc) {
                    &args[1]
                } else if args[1].is_name(acc) {
                    &args[0]
                } else {
                    return Some((ReducerType::CustomAggregate, None));
                };
                self.checked_operand(acc, kind, other)
            }
            _ => (ReducerType::CustomAggregate, None),
        };
        Some(classified)
    }

    /// `if (e > acc) acc = e;` and its mirrored forms
    fn classify_guarded(&self, condition: &Expr, then_branch: &Stmt) -> Option<Reduction> {
        let (acc, value) = match then_branch {
            Stmt::Expr(Expr::Assign {
                op: AssignOp::Assign,
                target,
                value,
            }) => (target.as_name()?, value.as_ref()),
            _ => return None,
        };
        self.scope.get(acc)?;

        let (op, lhs, rhs) = match condition.unparenthesized() {
            Expr::Binary { op, lhs, rhs } if op.is_ordering() => (*op, lhs, rhs),
            _ => return None,
        };
        // Normalize to `value <op> acc`
        let op = if lhs.is_name(acc) && rhs.as_ref() == value {
            op.mirrored()
        } else if rhs.is_name(acc) && lhs.as_ref() == value {
            op
        } else {
            return None;
        };
        let kind = match op {
            BinaryOp::Gt | BinaryOp::Ge => ReducerType::Max,
            _ => ReducerType::Min,
        };
        let (kind, operand) = self.checked_operand(acc, kind, value);
        let mut reduction = self.reduction(acc, kind, operand)?;
        reduction.guard = Some(op);
        Some(reduction)
    }

    fn additive(&self, acc: &str, operand: &Expr) -> (ReducerType, Option<Expr>) {
        let ty = match self.scope.type_of(acc) {
            Some(ty) => ty,
            None => return (ReducerType::CustomAggregate, None),
        };
        if ty.is_numeric() {
            if operand.is_literal_one() {
                (ReducerType::Increment, None)
            } else {
                self.checked_operand(acc, ReducerType::Sum, operand)
            }
        } else if ty.is_string() {
            self.checked_operand(acc, ReducerType::StringConcat, operand)
        } else {
            (ReducerType::CustomAggregate, None)
        }
    }

    fn multiplicative(&self, acc: &str, operand: &Expr) -> (ReducerType, Option<Expr>) {
        if self.is_numeric(acc) {
            self.checked_operand(acc, ReducerType::Product, operand)
        } else {
            (ReducerType::CustomAggregate, None)
        }
    }

    /// An operand that reads or writes the accumulator has no combiner
    fn checked_operand(&self, acc: &str, kind: ReducerType, operand: &Expr) -> (ReducerType, Option<Expr>) {
        if operand.mentions(acc) || operand.contains_update() {
            (ReducerType::CustomAggregate, None)
        } else {
            (kind, Some(operand.clone()))
        }
    }

    fn is_numeric(&self, acc: &str) -> bool {
        self.scope.type_of(acc).map_or(false, TypeRef::is_numeric)
    }

    fn reduction(&self, acc: &str, kind: ReducerType, operand: Option<Expr>) -> Option<Reduction> {
        let info = self.scope.get(acc)?;
        let kind = match kind {
            ReducerType::Increment | ReducerType::Decrement if !info.ty.is_numeric() => {
                ReducerType::CustomAggregate
            }
            other => other,
        };
        Some(Reduction {
            kind,
            accumulator: acc.to_string(),
            accumulator_type: info.ty.clone(),
            operand,
            null_safe: info.is_null_safe(),
            guard: None,
        })
    }
}

#[cfg(test)]
#[path = "reducer_tests.rs"]
mod tests;
