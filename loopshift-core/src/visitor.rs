//! Visitor infrastructure for syntax tree traversal

use crate::ast::{Expr, LambdaBody, Stmt};

/// Trait for visiting statements and expressions in source order
///
/// `enter_*` runs before the children of a node are walked; returning
/// `false` skips them (the matching `leave_*` still runs).
pub trait Visitor {
    fn enter_stmt(&mut self, _stmt: &Stmt) -> bool {
        true
    }

    fn leave_stmt(&mut self, _stmt: &Stmt) {}

    fn enter_expr(&mut self, _expr: &Expr) -> bool {
        true
    }

    fn leave_expr(&mut self, _expr: &Expr) {}
}

/// Walks every statement of a block in order
pub fn walk_block<V: Visitor + ?Sized>(visitor: &mut V, stmts: &[Stmt]) {
    for stmt in stmts {
        walk_stmt(visitor, stmt);
    }
}

pub fn walk_stmt<V: Visitor + ?Sized>(visitor: &mut V, stmt: &Stmt) {
    if visitor.enter_stmt(stmt) {
        match stmt {
            Stmt::Expr(e) | Stmt::Throw(e) => walk_expr(visitor, e),
            Stmt::Local { init, .. } => {
                if let Some(init) = init {
                    walk_expr(visitor, init);
                }
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                walk_expr(visitor, condition);
                walk_stmt(visitor, then_branch);
                if let Some(else_branch) = else_branch {
                    walk_stmt(visitor, else_branch);
                }
            }
            Stmt::Block(stmts) => walk_block(visitor, stmts),
            Stmt::Return(value) => {
                if let Some(value) = value {
                    walk_expr(visitor, value);
                }
            }
            Stmt::ForEach { iterable, body, .. } => {
                walk_expr(visitor, iterable);
                walk_stmt(visitor, body);
            }
            Stmt::For {
                init,
                condition,
                update,
                body,
            } => {
                walk_block(visitor, init);
                if let Some(condition) = condition {
                    walk_expr(visitor, condition);
                }
                for u in update {
                    walk_expr(visitor, u);
                }
                walk_stmt(visitor, body);
            }
            Stmt::While { condition, body } => {
                walk_expr(visitor, condition);
                walk_stmt(visitor, body);
            }
            Stmt::DoWhile { body, condition } => {
                walk_stmt(visitor, body);
                walk_expr(visitor, condition);
            }
            Stmt::Labeled { body, .. } => walk_stmt(visitor, body),
            Stmt::Break(_) | Stmt::Continue(_) | Stmt::Empty => {}
        }
    }
    visitor.leave_stmt(stmt);
}

pub fn walk_expr<V: Visitor + ?Sized>(visitor: &mut V, expr: &Expr) {
    if visitor.enter_expr(expr) {
        match expr {
            Expr::Literal(_) | Expr::Name(_) => {}
            Expr::FieldAccess { target, .. } => walk_expr(visitor, target),
            Expr::MethodCall { receiver, args, .. } => {
                if let Some(receiver) = receiver {
                    walk_expr(visitor, receiver);
                }
                for arg in args {
                    walk_expr(visitor, arg);
                }
            }
            Expr::New { args, .. } => {
                for arg in args {
                    walk_expr(visitor, arg);
                }
            }
            Expr::Binary { lhs, rhs, .. } => {
                walk_expr(visitor, lhs);
                walk_expr(visitor, rhs);
            }
            Expr::Unary { operand, .. } => walk_expr(visitor, operand),
            Expr::Assign { target, value, .. } => {
                walk_expr(visitor, target);
                walk_expr(visitor, value);
            }
            Expr::Conditional {
                condition,
                then_expr,
                else_expr,
            } => {
                walk_expr(visitor, condition);
                walk_expr(visitor, then_expr);
                walk_expr(visitor, else_expr);
            }
            Expr::Cast { expr, .. } | Expr::Paren(expr) => walk_expr(visitor, expr),
            Expr::ArrayAccess { array, index } => {
                walk_expr(visitor, array);
                walk_expr(visitor, index);
            }
            Expr::Lambda { body, .. } => match body {
                LambdaBody::Expr(e) => walk_expr(visitor, e),
                LambdaBody::Block(stmts) => walk_block(visitor, stmts),
            },
            Expr::MethodRef { target, .. } => walk_expr(visitor, target),
        }
    }
    visitor.leave_expr(expr);
}

#[cfg(test)]
#[path = "visitor_tests.rs"]
mod tests;
