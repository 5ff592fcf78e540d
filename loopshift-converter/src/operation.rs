//! Prospective pipeline stages extracted from a loop body

use crate::reducer::ReducerType;
use loopshift_core::ast::{BinaryOp, Expr, Stmt, TypeRef};
use serde::Serialize;

/// Stage kind with exactly the payload that kind needs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum OperationKind {
    Map {
        expr: Expr,
        /// Declared type of the produced variable, when the body declared one
        ty: Option<TypeRef>,
    },
    Filter {
        predicate: Expr,
    },
    ForEach {
        body: Vec<Stmt>,
    },
    Collect {
        target: String,
    },
    Reduce {
        reducer: ReducerType,
        accumulator: String,
        accumulator_type: TypeRef,
        null_safe: bool,
        /// Comparison a guarded max or min repeats in its combiner
        guard: Option<BinaryOp>,
    },
    AnyMatch {
        predicate: Expr,
    },
    NoneMatch {
        predicate: Expr,
    },
    AllMatch {
        predicate: Expr,
    },
}

/// One stage of the pipeline under construction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProspectiveOperation {
    pub kind: OperationKind,
    /// Variable the stage's lambda binds
    pub param: String,
    /// Name the next stage sees; only a MAP feeding another lambda has one
    pub produced: Option<String>,
}

impl ProspectiveOperation {
    pub fn map(param: &str, expr: Expr, produced: Option<&str>, ty: Option<TypeRef>) -> Self {
        Self::new(
            OperationKind::Map { expr, ty },
            param,
            produced.map(str::to_string),
        )
    }

    pub fn filter(param: &str, predicate: Expr) -> Self {
        Self::new(OperationKind::Filter { predicate }, param, None)
    }

    pub fn for_each(param: &str, body: Vec<Stmt>) -> Self {
        Self::new(OperationKind::ForEach { body }, param, None)
    }

    pub fn collect(param: &str, target: &str) -> Self {
        Self::new(
            OperationKind::Collect {
                target: target.to_string(),
            },
            param,
            None,
        )
    }

    pub fn reduce(
        param: &str,
        reducer: ReducerType,
        accumulator: &str,
        accumulator_type: TypeRef,
        null_safe: bool,
    ) -> Self {
        Self::new(
            OperationKind::Reduce {
                reducer,
                accumulator: accumulator.to_string(),
                accumulator_type,
                null_safe,
                guard: None,
            },
            param,
            None,
        )
    }

    /// Attaches the comparison of a guarded max or min to a REDUCE
    pub fn guarded_by(mut self, op: Option<BinaryOp>) -> Self {
        if let OperationKind::Reduce { guard, .. } = &mut self.kind {
            *guard = op;
        }
        self
    }

    pub fn any_match(param: &str, predicate: Expr) -> Self {
        Self::new(OperationKind::AnyMatch { predicate }, param, None)
    }

    pub fn none_match(param: &str, predicate: Expr) -> Self {
        Self::new(OperationKind::NoneMatch { predicate }, param, None)
    }

    pub fn all_match(param: &str, predicate: Expr) -> Self {
        Self::new(OperationKind::AllMatch { predicate }, param, None)
    }

    fn new(kind: OperationKind, param: &str, produced: Option<String>) -> Self {
        ProspectiveOperation {
            kind,
            param: param.to_string(),
            produced,
        }
    }

    /// Terminal stages consume the stream
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self.kind,
            OperationKind::Map { .. } | OperationKind::Filter { .. }
        )
    }

    pub fn type_name(&self) -> &'static str {
        match self.kind {
            OperationKind::Map { .. } => "MAP",
            OperationKind::Filter { .. } => "FILTER",
            OperationKind::ForEach { .. } => "FOREACH",
            OperationKind::Collect { .. } => "COLLECT",
            OperationKind::Reduce { .. } => "REDUCE",
            OperationKind::AnyMatch { .. } => "ANYMATCH",
            OperationKind::NoneMatch { .. } => "NONEMATCH",
            OperationKind::AllMatch { .. } => "ALLMATCH",
        }
    }

    /// Whether this stage reads or writes `name`
    pub fn mentions(&self, name: &str) -> bool {
        match &self.kind {
            OperationKind::Map { expr, .. } => expr.mentions(name),
            OperationKind::Filter { predicate }
            | OperationKind::AnyMatch { predicate }
            | OperationKind::NoneMatch { predicate }
            | OperationKind::AllMatch { predicate } => predicate.mentions(name),
            OperationKind::ForEach { body } => body.iter().any(|s| s.mentions(name)),
            OperationKind::Collect { target } => target == name,
            OperationKind::Reduce { accumulator, .. } => accumulator == name,
        }
    }
}

#[cfg(test)]
#[path = "operation_tests.rs"]
mod tests;
