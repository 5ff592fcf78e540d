//! Core types and data structures for Loopshift
//!
//! This crate provides the building blocks shared by the loop conversion
//! engine, including:
//! - Syntax tree representation of the host language
//! - Visitor infrastructure for walking statements and expressions
//! - Lexical scope facts known at a loop site
//! - Error types

pub mod ast;
pub mod error;
pub mod scope;
pub mod visitor;

pub use ast::{Expr, Literal, Stmt, TypeRef};
pub use error::{Error, Result};
pub use scope::{CollectionInit, Scope, VarInfo};
