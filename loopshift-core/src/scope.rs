//! Lexical facts visible at a loop site
//!
//! The host resolves declarations around a loop and records them here. The
//! engine learns types, nullness and collection state only from a `Scope`;
//! nothing is inferred beyond it.

use crate::ast::{AstHashMap, Expr, TypeRef};
use crate::error::{ensure_identifier, Result};
use serde::{Deserialize, Serialize};

/// How a collection variable was initialized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollectionInit {
    /// `new ArrayList<>()`
    Empty,
    /// `new ArrayList<>(capacity)`
    Presized,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarInfo {
    /// Declared type
    pub ty: TypeRef,
    /// The host guarantees the variable never holds null
    #[serde(default)]
    pub non_null: bool,
    /// Initializer of the declaration, if any
    #[serde(default)]
    pub init: Option<Expr>,
    /// Set when the initializer creates a fresh collection
    #[serde(default)]
    pub collection_init: Option<CollectionInit>,
    /// The variable is mutated in place after the loop (e.g. sorted)
    #[serde(default)]
    pub mutated_after: bool,
}

impl VarInfo {
    pub fn new(ty: TypeRef) -> Self {
        VarInfo {
            ty,
            non_null: false,
            init: None,
            collection_init: None,
            mutated_after: false,
        }
    }

    /// Records the initializer and derives the collection state from it
    pub fn with_init(mut self, init: Expr) -> Self {
        self.collection_init = match init.unparenthesized() {
            Expr::New { ty, args } if ty.is_list_like() || ty.is_set_like() => match args.len() {
                0 => Some(CollectionInit::Empty),
                1 if is_capacity(&args[0]) => Some(CollectionInit::Presized),
                _ => None,
            },
            _ => None,
        };
        self.init = Some(init);
        self
    }

    pub fn non_null(mut self) -> Self {
        self.non_null = true;
        self
    }

    pub fn mutated_after(mut self) -> Self {
        self.mutated_after = true;
        self
    }

    /// Primitives can never be null
    pub fn is_null_safe(&self) -> bool {
        self.non_null || self.ty.is_primitive()
    }

    /// A collection that starts out with no elements
    pub fn is_fresh_collection(&self) -> bool {
        self.collection_init.is_some()
    }
}

/// A capacity argument is an int-valued expression, not a source collection
fn is_capacity(arg: &Expr) -> bool {
    match arg.unparenthesized() {
        Expr::Literal(crate::ast::Literal::Int(_)) => true,
        Expr::MethodCall { name, args, .. } => name == "size" && args.is_empty(),
        Expr::FieldAccess { field, .. } => field == "length",
        Expr::Binary { lhs, rhs, .. } => is_capacity(lhs) || is_capacity(rhs),
        _ => false,
    }
}

/// Variables visible at one loop site
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scope {
    vars: AstHashMap<String, VarInfo>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a variable
    pub fn declare(&mut self, name: &str, info: VarInfo) -> Result<()> {
        ensure_identifier("variable", name)?;
        self.vars.insert(name.to_string(), info);
        Ok(())
    }

    /// Builder form of [`Scope::declare`]
    pub fn with(mut self, name: &str, info: VarInfo) -> Result<Self> {
        self.declare(name, info)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&VarInfo> {
        self.vars.get(name)
    }

    /// Stops treating `name` as a freshly created collection
    pub fn forget_collection_state(&mut self, name: &str) {
        if let Some(info) = self.vars.get_mut(name) {
            info.collection_init = None;
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn type_of(&self, name: &str) -> Option<&TypeRef> {
        self.vars.get(name).map(|v| &v.ty)
    }

    /// Type of a plain variable expression
    pub fn type_of_expr(&self, expr: &Expr) -> Option<&TypeRef> {
        expr.as_name().and_then(|n| self.type_of(n))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.vars.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

#[cfg(test)]
#[path = "scope_tests.rs"]
mod tests;
