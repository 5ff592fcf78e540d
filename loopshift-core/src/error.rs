//! Error types for Loopshift
//!
//! Only broken construction contracts surface as errors. A loop that cannot
//! be converted is an ordinary outcome, not an error.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Empty identifier: {what} must not be empty")]
    EmptyIdentifier { what: &'static str },

    #[error("Invalid identifier for {what}: {name:?}")]
    InvalidIdentifier { what: &'static str, name: String },

    #[error("Loop group for {target} needs at least two loops, got {got}")]
    GroupTooSmall { target: String, got: usize },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Checks that `name` is usable as a host-language identifier.
pub fn ensure_identifier(what: &'static str, name: &str) -> Result<()> {
    let mut chars = name.chars();
    let first = match chars.next() {
        Some(c) => c,
        None => return Err(Error::EmptyIdentifier { what }),
    };
    let valid_start = first.is_alphabetic() || first == '_' || first == '$';
    if !valid_start || !chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$') {
        return Err(Error::InvalidIdentifier {
            what,
            name: name.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
