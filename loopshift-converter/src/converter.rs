//! Conversion driver
//!
//! Runs one conversion unit through normalization, the preconditions
//! checker, the body parser and the pipeline builder. Every step that
//! cannot prove the rewrite safe ends in [`Conversion::Unchanged`], which
//! tells the host to keep the loop exactly as written.

use crate::lambda::LambdaGenerator;
use crate::merge::{group_sibling_loops, split_loops};
use crate::normalize::{LoopMetadata, LoopNormalizer};
use crate::parser::{BodyParse, LoopBodyParser, ParsedBody};
use crate::pipeline::{BuildOutcome, Pipeline, PipelineBuilder};
use crate::preconditions::{Eligibility, IneligibleReason, PreconditionsChecker};
use crate::site::{ConversionUnit, LoopGroup, LoopSite};
use crate::stats::ConversionStats;
use loopshift_core::ast::Stmt;
use loopshift_core::error::Result;
use loopshift_core::scope::Scope;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Shape the converted code takes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetFormat {
    /// Functional pipeline over a stream
    #[default]
    Stream,
    /// Reserved; never converts
    ForLoop,
    /// Reserved; never converts
    WhileLoop,
}

/// Converter configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Output shape
    pub target_format: TargetFormat,
    /// Collect into a mutable collection when the destination is changed later
    pub guarantee_mutable_collect: bool,
    /// Treat index loops that only read `xs.get(i)` as for-each loops
    pub eliminate_indices: bool,
    /// Convert sibling loops that fill one destination as a single unit
    pub merge_sibling_loops: bool,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            target_format: TargetFormat::Stream,
            guarantee_mutable_collect: true,
            eliminate_indices: true,
            merge_sibling_loops: true,
        }
    }
}

/// Why a unit was left as written
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum UnchangedReason {
    NotALoop,
    Ineligible(IneligibleReason),
    /// The body parser met a statement it could not classify safely
    Aborted(String),
    NoTerminal,
    UnsupportedDestination,
    /// The configured target format has no rewriter yet
    NotYetSupported,
}

impl fmt::Display for UnchangedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnchangedReason::NotALoop => write!(f, "not a loop"),
            UnchangedReason::Ineligible(reason) => write!(f, "ineligible: {reason}"),
            UnchangedReason::Aborted(reason) => write!(f, "aborted: {reason}"),
            UnchangedReason::NoTerminal => write!(f, "no terminal operation"),
            UnchangedReason::UnsupportedDestination => write!(f, "unsupported destination"),
            UnchangedReason::NotYetSupported => write!(f, "target format not yet supported"),
        }
    }
}

/// Outcome of one conversion attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Conversion {
    Converted(Pipeline),
    Unchanged(UnchangedReason),
}

impl Conversion {
    pub fn is_converted(&self) -> bool {
        matches!(self, Conversion::Converted(_))
    }

    pub fn pipeline(&self) -> Option<&Pipeline> {
        match self {
            Conversion::Converted(pipeline) => Some(pipeline),
            Conversion::Unchanged(_) => None,
        }
    }

    pub fn unchanged_reason(&self) -> Option<&UnchangedReason> {
        match self {
            Conversion::Converted(_) => None,
            Conversion::Unchanged(reason) => Some(reason),
        }
    }
}

impl From<UnchangedReason> for Conversion {
    fn from(reason: UnchangedReason) -> Self {
        Conversion::Unchanged(reason)
    }
}

/// Trait for loop rewriters, one per target format
pub trait LoopRewriter: Send + Sync {
    /// Name of the rewriter
    fn name(&self) -> &str;

    /// Attempt to rewrite one unit
    fn rewrite(&mut self, unit: &ConversionUnit) -> Result<Conversion>;

    /// Get statistics about the rewriter
    fn stats(&self) -> String {
        format!("{} rewriter completed", self.name())
    }
}

/// Rewrites loops into stream pipelines
pub struct StreamRewriter {
    normalizer: LoopNormalizer,
    checker: PreconditionsChecker,
    guarantee_mutable_collect: bool,
    converted_count: usize,
    unchanged_count: usize,
}

impl StreamRewriter {
    pub fn new(config: &ConverterConfig) -> Self {
        Self {
            normalizer: LoopNormalizer::new(config.eliminate_indices),
            checker: PreconditionsChecker::new(),
            guarantee_mutable_collect: config.guarantee_mutable_collect,
            converted_count: 0,
            unchanged_count: 0,
        }
    }

    /// Normalizes and checks one loop
    fn analyze(&self, stmt: &Stmt, scope: &Scope) -> std::result::Result<LoopMetadata, UnchangedReason> {
        let meta = self
            .normalizer
            .normalize(stmt, scope)
            .ok_or(UnchangedReason::NotALoop)?;
        match self.checker.check(&meta) {
            Eligibility::Eligible => Ok(meta),
            Eligibility::Ineligible(reason) => Err(UnchangedReason::Ineligible(reason)),
        }
    }

    fn rewrite_single(&self, site: &LoopSite) -> Result<Conversion> {
        let meta = match self.analyze(&site.stmt, &site.scope) {
            Ok(meta) => meta,
            Err(reason) => return Ok(reason.into()),
        };

        let mut generator = LambdaGenerator::new();
        let parser = LoopBodyParser::new(&site.scope, site.following.as_ref());
        let body = match parser.parse(&meta, &mut generator)? {
            BodyParse::Parsed(body) => body,
            BodyParse::Aborted(reason) => return Ok(UnchangedReason::Aborted(reason).into()),
        };

        let builder = PipelineBuilder::new(&site.scope, self.guarantee_mutable_collect);
        Ok(built(builder.build(&meta, body, &mut generator)?))
    }

    fn rewrite_group(&self, group: &LoopGroup) -> Result<Conversion> {
        let mut analyzed = Vec::with_capacity(group.loops.len());
        for stmt in &group.loops {
            match self.analyze(stmt, &group.scope) {
                Ok(meta) => analyzed.push(meta),
                Err(reason) => return Ok(reason.into()),
            }
        }

        let parser = LoopBodyParser::new(&group.scope, None);
        let mut bodies: Vec<ParsedBody> = Vec::with_capacity(analyzed.len());
        for meta in &analyzed {
            // Each branch becomes its own lambdas, so names start afresh
            let mut generator = LambdaGenerator::new();
            match parser.parse(meta, &mut generator)? {
                BodyParse::Parsed(body) => bodies.push(body),
                BodyParse::Aborted(reason) => {
                    return Ok(UnchangedReason::Aborted(reason).into())
                }
            }
        }

        let builder = PipelineBuilder::new(&group.scope, self.guarantee_mutable_collect);
        let branches = analyzed.iter().zip(bodies).collect();
        Ok(built(builder.build_concat(&group.target, branches)?))
    }
}

fn built(outcome: BuildOutcome) -> Conversion {
    match outcome {
        BuildOutcome::Built(pipeline) => Conversion::Converted(pipeline),
        BuildOutcome::NoTerminal => UnchangedReason::NoTerminal.into(),
        BuildOutcome::UnsupportedDestination => UnchangedReason::UnsupportedDestination.into(),
    }
}

impl LoopRewriter for StreamRewriter {
    fn name(&self) -> &str {
        "Stream"
    }

    fn rewrite(&mut self, unit: &ConversionUnit) -> Result<Conversion> {
        let conversion = match unit {
            ConversionUnit::Single(site) => self.rewrite_single(site)?,
            ConversionUnit::Group(group) => self.rewrite_group(group)?,
        };
        if conversion.is_converted() {
            self.converted_count += 1;
        } else {
            self.unchanged_count += 1;
        }
        Ok(conversion)
    }

    fn stats(&self) -> String {
        format!(
            "{} rewriter: {} loops converted, {} left unchanged",
            self.name(),
            self.converted_count,
            self.unchanged_count
        )
    }
}

/// Reserved target format: classic `for` loops
#[derive(Debug, Default)]
pub struct ForLoopRewriter;

impl LoopRewriter for ForLoopRewriter {
    fn name(&self) -> &str {
        "ForLoop"
    }

    fn rewrite(&mut self, _unit: &ConversionUnit) -> Result<Conversion> {
        Ok(UnchangedReason::NotYetSupported.into())
    }
}

/// Reserved target format: `while` loops
#[derive(Debug, Default)]
pub struct WhileLoopRewriter;

impl LoopRewriter for WhileLoopRewriter {
    fn name(&self) -> &str {
        "WhileLoop"
    }

    fn rewrite(&mut self, _unit: &ConversionUnit) -> Result<Conversion> {
        Ok(UnchangedReason::NotYetSupported.into())
    }
}

/// Entry point: picks the rewriter for the configured format and keeps
/// statistics across units
pub struct LoopConverter {
    config: ConverterConfig,
    stats: ConversionStats,
    rewriter: Box<dyn LoopRewriter>,
}

impl LoopConverter {
    pub fn new(config: ConverterConfig) -> Self {
        let rewriter: Box<dyn LoopRewriter> = match config.target_format {
            TargetFormat::Stream => Box::new(StreamRewriter::new(&config)),
            TargetFormat::ForLoop => Box::new(ForLoopRewriter),
            TargetFormat::WhileLoop => Box::new(WhileLoopRewriter),
        };
        Self {
            config,
            stats: ConversionStats::new(),
            rewriter,
        }
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// Converts one loop
    pub fn convert(&mut self, site: &LoopSite) -> Result<Conversion> {
        self.convert_unit(&ConversionUnit::Single(site.clone()))
    }

    pub fn convert_unit(&mut self, unit: &ConversionUnit) -> Result<Conversion> {
        let conversion = match unit {
            ConversionUnit::Group(group) if !self.config.merge_sibling_loops => {
                debug!(target = %group.target, "sibling loop merging disabled");
                UnchangedReason::UnsupportedDestination.into()
            }
            _ => self.rewriter.rewrite(unit)?,
        };
        if let Conversion::Unchanged(reason) = &conversion {
            debug!(rewriter = self.rewriter.name(), %reason, "unit left unchanged");
        }
        self.stats.record(unit, &conversion);
        Ok(conversion)
    }

    /// Splits a statement list into units. Sibling loops filling one
    /// destination form a group unless merging is disabled.
    pub fn plan(&self, statements: &[Stmt], scope: &Scope) -> Result<Vec<ConversionUnit>> {
        if self.config.merge_sibling_loops {
            group_sibling_loops(statements, scope)
        } else {
            Ok(split_loops(statements, scope))
        }
    }

    /// Plans and converts every loop of a statement list, in order
    pub fn convert_statements(
        &mut self,
        statements: &[Stmt],
        scope: &Scope,
    ) -> Result<Vec<(ConversionUnit, Conversion)>> {
        let units = self.plan(statements, scope)?;
        let mut results = Vec::with_capacity(units.len());
        for unit in units {
            let conversion = self.convert_unit(&unit)?;
            results.push((unit, conversion));
        }
        Ok(results)
    }

    pub fn statistics(&self) -> &ConversionStats {
        &self.stats
    }

    /// Summary line from the active rewriter
    pub fn rewriter_stats(&self) -> String {
        self.rewriter.stats()
    }
}

impl Default for LoopConverter {
    fn default() -> Self {
        Self::new(ConverterConfig::default())
    }
}

#[cfg(test)]
#[path = "converter_tests.rs"]
mod tests;
