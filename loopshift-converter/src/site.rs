//! Units of work handed to the converter

use loopshift_core::ast::Stmt;
use loopshift_core::error::{ensure_identifier, Error, Result};
use loopshift_core::scope::Scope;
use serde::{Deserialize, Serialize};

/// One candidate loop together with what the host knows around it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopSite {
    /// The loop statement, possibly wrapped in a label
    pub stmt: Stmt,
    /// Variables visible at the loop
    pub scope: Scope,
    /// The statement right after the loop, if any
    pub following: Option<Stmt>,
}

impl LoopSite {
    pub fn new(stmt: Stmt, scope: Scope) -> Self {
        LoopSite {
            stmt,
            scope,
            following: None,
        }
    }

    pub fn followed_by(mut self, stmt: Stmt) -> Self {
        self.following = Some(stmt);
        self
    }

    /// Label attached to the loop
    pub fn label(&self) -> Option<&str> {
        match &self.stmt {
            Stmt::Labeled { label, .. } => Some(label.as_str()),
            _ => None,
        }
    }
}

/// Consecutive loops that all append to the same destination collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopGroup {
    pub target: String,
    pub loops: Vec<Stmt>,
    pub scope: Scope,
}

impl LoopGroup {
    pub fn new(target: &str, loops: Vec<Stmt>, scope: Scope) -> Result<Self> {
        ensure_identifier("group target", target)?;
        if loops.len() < 2 {
            return Err(Error::GroupTooSmall {
                target: target.to_string(),
                got: loops.len(),
            });
        }
        Ok(LoopGroup {
            target: target.to_string(),
            loops,
            scope,
        })
    }
}

/// What one conversion attempt operates on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConversionUnit {
    Single(LoopSite),
    Group(LoopGroup),
}

impl ConversionUnit {
    pub fn scope(&self) -> &Scope {
        match self {
            ConversionUnit::Single(site) => &site.scope,
            ConversionUnit::Group(group) => &group.scope,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, ConversionUnit::Group(_))
    }
}

impl From<LoopSite> for ConversionUnit {
    fn from(site: LoopSite) -> Self {
        ConversionUnit::Single(site)
    }
}

#[cfg(test)]
#[path = "site_tests.rs"]
mod tests;
