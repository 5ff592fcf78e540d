//! Conversion statistics tracking

use crate::converter::{Conversion, UnchangedReason};
use crate::site::ConversionUnit;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Counts of conversion outcomes across units
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Number of units handed to the converter
    pub units: usize,
    /// Number of units rewritten into a pipeline
    pub converted: usize,
    /// Number of units rejected by the preconditions checker
    pub ineligible: usize,
    /// Number of units abandoned by the body parser
    pub aborted: usize,
    /// Number of units the builder could not give a terminal or destination
    pub unbuildable: usize,
    /// Number of sibling-loop groups converted as one pipeline
    pub merged_groups: usize,
    /// Number of statements that were not loops
    pub not_a_loop: usize,
    /// Number of units left alone by a reserved target format
    pub not_yet_supported: usize,
    /// Number of converted pipelines carrying the collection mutability risk
    pub mutability_risks: usize,
}

impl ConversionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, unit: &ConversionUnit, conversion: &Conversion) {
        self.units += 1;
        match conversion {
            Conversion::Converted(pipeline) => {
                self.converted += 1;
                if unit.is_group() {
                    self.merged_groups += 1;
                }
                if pipeline.mutability_risk {
                    self.mutability_risks += 1;
                }
            }
            Conversion::Unchanged(reason) => match reason {
                UnchangedReason::NotALoop => self.not_a_loop += 1,
                UnchangedReason::Ineligible(_) => self.ineligible += 1,
                UnchangedReason::Aborted(_) => self.aborted += 1,
                UnchangedReason::NoTerminal | UnchangedReason::UnsupportedDestination => {
                    self.unbuildable += 1
                }
                UnchangedReason::NotYetSupported => self.not_yet_supported += 1,
            },
        }
    }

    /// Units left exactly as written
    pub fn unchanged(&self) -> usize {
        self.units - self.converted
    }

    /// Share of units converted, in percent
    pub fn conversion_rate(&self) -> f64 {
        if self.units == 0 {
            0.0
        } else {
            (self.converted as f64 / self.units as f64) * 100.0
        }
    }

    /// Merge stats from another instance
    pub fn merge(&mut self, other: &ConversionStats) {
        self.units += other.units;
        self.converted += other.converted;
        self.ineligible += other.ineligible;
        self.aborted += other.aborted;
        self.unbuildable += other.unbuildable;
        self.merged_groups += other.merged_groups;
        self.not_a_loop += other.not_a_loop;
        self.not_yet_supported += other.not_yet_supported;
        self.mutability_risks += other.mutability_risks;
    }
}

impl fmt::Display for ConversionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Conversion Statistics:")?;
        writeln!(
            f,
            "  Units: {} ({} converted, {:.1}%)",
            self.units,
            self.converted,
            self.conversion_rate()
        )?;
        writeln!(f, "  Merged groups: {}", self.merged_groups)?;
        writeln!(f, "  Ineligible: {}", self.ineligible)?;
        writeln!(f, "  Aborted while parsing: {}", self.aborted)?;
        writeln!(f, "  No pipeline shape: {}", self.unbuildable)?;
        writeln!(f, "  Not a loop: {}", self.not_a_loop)?;
        writeln!(f, "  Not yet supported: {}", self.not_yet_supported)?;
        writeln!(f, "  Mutability risks: {}", self.mutability_risks)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "stats_tests.rs"]
mod tests;
