//! Pipeline assembly
//!
//! Turns the stages extracted from a loop body into a [`Pipeline`]: one
//! source, ordered intermediate stages and exactly one terminal operation.
//! Sibling loops that fill the same destination are assembled into a single
//! concatenated source so that no loop's contribution is lost.

use crate::lambda::LambdaGenerator;
use crate::normalize::{LoopMetadata, LoopSource};
use crate::operation::{OperationKind, ProspectiveOperation};
use crate::parser::ParsedBody;
use loopshift_core::ast::{Expr, Stmt, TypeRef};
use loopshift_core::error::{Error, Result};
use loopshift_core::scope::{Scope, VarInfo};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

pub const IMPORT_ARRAYS: &str = "java.util.Arrays";
pub const IMPORT_INT_STREAM: &str = "java.util.stream.IntStream";
pub const IMPORT_STREAM: &str = "java.util.stream.Stream";
pub const IMPORT_COLLECTORS: &str = "java.util.stream.Collectors";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum StreamSource {
    /// `expr.stream()`
    Collection(Expr),
    /// `Arrays.stream(expr)`
    Array(Expr),
    /// `IntStream.range(start, end)` or `rangeClosed`
    Range {
        start: Expr,
        end: Expr,
        inclusive: bool,
    },
    /// Left-nested `Stream.concat` of every branch in order
    Concat(Vec<Branch>),
}

/// One loop's share of a concatenated source
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Branch {
    pub source: StreamSource,
    pub stages: Vec<Stage>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Stage {
    Map {
        param: String,
        expr: Expr,
        produced: Option<String>,
        ty: Option<TypeRef>,
    },
    Filter {
        param: String,
        predicate: Expr,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Collector {
    ToList,
    ToSet,
    /// `Collectors.toCollection(ctor)`, always yields a mutable collection
    ToCollection(Expr),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Terminal {
    ForEach {
        /// `collection.forEach` without a stream
        direct: bool,
        /// `forEachOrdered`, keeping encounter order
        ordered: bool,
        param: String,
        body: Vec<Stmt>,
    },
    Collect {
        target: String,
        collector: Collector,
    },
    Reduce {
        accumulator: String,
        identity: Expr,
        combiner: Expr,
    },
    AnyMatch {
        param: String,
        predicate: Expr,
    },
    NoneMatch {
        param: String,
        predicate: Expr,
    },
    AllMatch {
        param: String,
        predicate: Expr,
    },
}

/// What happens to the value the terminal produces
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ResultUse {
    Discard,
    Assign(String),
    /// Becomes the initializer of the destination's declaration
    Declare(String),
    /// `if (match) return value;`, negating the match when asked
    ReturnIf { negate: bool, value: bool },
}

/// A fully assembled replacement for one conversion unit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pipeline {
    pub source: StreamSource,
    pub stages: Vec<Stage>,
    pub terminal: Terminal,
    pub result: ResultUse,
    /// Fully qualified names the replacement needs imported
    pub imports: BTreeSet<String>,
    /// The destination is mutated later but the collected form does not
    /// guarantee mutability
    pub mutability_risk: bool,
}

impl Pipeline {
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn terminal_name(&self) -> &'static str {
        match self.terminal {
            Terminal::ForEach { .. } => "forEach",
            Terminal::Collect { .. } => "collect",
            Terminal::Reduce { .. } => "reduce",
            Terminal::AnyMatch { .. } => "anyMatch",
            Terminal::NoneMatch { .. } => "noneMatch",
            Terminal::AllMatch { .. } => "allMatch",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BuildOutcome {
    Built(Pipeline),
    /// The stages do not end in exactly one terminal operation
    NoTerminal,
    /// The terminal's destination cannot be expressed safely
    UnsupportedDestination,
}

/// Assembles pipelines for the loops of one site
pub struct PipelineBuilder<'a> {
    scope: &'a Scope,
    guarantee_mutable_collect: bool,
}

impl<'a> PipelineBuilder<'a> {
    pub fn new(scope: &'a Scope, guarantee_mutable_collect: bool) -> Self {
        Self {
            scope,
            guarantee_mutable_collect,
        }
    }

    /// Builds the pipeline for a single loop
    pub fn build(
        &self,
        meta: &LoopMetadata,
        body: ParsedBody,
        generator: &mut LambdaGenerator,
    ) -> Result<BuildOutcome> {
        let source = match stream_source(&meta.source) {
            Some(source) => source,
            None => {
                debug!(source = ?meta.source, "loop source has no stream form");
                return Ok(BuildOutcome::UnsupportedDestination);
            }
        };
        let (mut stages, last) = match split_terminal(body.operations) {
            Some(split) => split,
            None => return Ok(BuildOutcome::NoTerminal),
        };

        let mut mutability_risk = false;
        let (terminal, result) = match last.kind {
            OperationKind::ForEach { body } => {
                let direct = stages.is_empty() && matches!(source, StreamSource::Collection(_));
                let terminal = Terminal::ForEach {
                    direct,
                    ordered: !direct,
                    param: last.param,
                    body,
                };
                (terminal, ResultUse::Discard)
            }
            OperationKind::Collect { target } if is_primitive_array(meta) => {
                debug!(%target, "primitive array elements cannot be collected unboxed");
                return Ok(BuildOutcome::UnsupportedDestination);
            }
            OperationKind::Collect { target } => match self.collector(&target) {
                Some((collector, risk)) => {
                    mutability_risk = risk;
                    let result = ResultUse::Assign(target.clone());
                    (Terminal::Collect { target, collector }, result)
                }
                None => {
                    debug!(%target, "destination has no collector");
                    return Ok(BuildOutcome::UnsupportedDestination);
                }
            },
            OperationKind::Reduce {
                reducer,
                accumulator,
                accumulator_type,
                null_safe,
                guard,
            } => match generator.guarded_combiner(reducer, &accumulator_type, guard, null_safe)? {
                Some(combiner) => {
                    if let Some(widen) = widening(meta, &stages, &last.param, &accumulator_type) {
                        stages.push(widen);
                    }
                    let result = ResultUse::Assign(accumulator.clone());
                    let terminal = Terminal::Reduce {
                        identity: Expr::name(&accumulator),
                        accumulator,
                        combiner,
                    };
                    (terminal, result)
                }
                None => {
                    debug!(%accumulator, %reducer, ty = %accumulator_type, "no combiner");
                    return Ok(BuildOutcome::UnsupportedDestination);
                }
            },
            OperationKind::AnyMatch { predicate } => (
                Terminal::AnyMatch {
                    param: last.param,
                    predicate,
                },
                ResultUse::ReturnIf {
                    negate: false,
                    value: true,
                },
            ),
            OperationKind::NoneMatch { predicate } => (
                Terminal::NoneMatch {
                    param: last.param,
                    predicate,
                },
                ResultUse::ReturnIf {
                    negate: true,
                    value: false,
                },
            ),
            OperationKind::AllMatch { predicate } => (
                Terminal::AllMatch {
                    param: last.param,
                    predicate,
                },
                ResultUse::ReturnIf {
                    negate: true,
                    value: false,
                },
            ),
            OperationKind::Map { .. } | OperationKind::Filter { .. } => {
                return Ok(BuildOutcome::NoTerminal)
            }
        };

        let mut pipeline = Pipeline {
            source,
            stages,
            terminal,
            result,
            imports: BTreeSet::new(),
            mutability_risk,
        };
        pipeline.imports = imports_of(&pipeline);
        Ok(BuildOutcome::Built(pipeline))
    }

    /// Builds one pipeline that concatenates the elements every loop of a
    /// group appends to `target`, in loop order
    pub fn build_concat(
        &self,
        target: &str,
        branches: Vec<(&LoopMetadata, ParsedBody)>,
    ) -> Result<BuildOutcome> {
        if branches.len() < 2 {
            return Err(Error::GroupTooSmall {
                target: target.to_string(),
                got: branches.len(),
            });
        }

        let mut concat = Vec::with_capacity(branches.len());
        for (meta, body) in branches {
            let primitive_array = is_primitive_array(meta);
            let source = match stream_source(&meta.source) {
                Some(source @ (StreamSource::Collection(_) | StreamSource::Array(_)))
                    if !primitive_array =>
                {
                    source
                }
                _ => {
                    debug!(%target, source = ?meta.source, "branch source cannot be concatenated");
                    return Ok(BuildOutcome::UnsupportedDestination);
                }
            };
            let stages = match split_terminal(body.operations) {
                Some((stages, last)) => match last.kind {
                    OperationKind::Collect { target: dest } if dest == target => stages,
                    _ => return Ok(BuildOutcome::UnsupportedDestination),
                },
                None => return Ok(BuildOutcome::NoTerminal),
            };
            concat.push(Branch { source, stages });
        }

        let (collector, mutability_risk) = match self.collector(target) {
            Some(decision) => decision,
            None => return Ok(BuildOutcome::UnsupportedDestination),
        };
        let mut pipeline = Pipeline {
            source: StreamSource::Concat(concat),
            stages: Vec::new(),
            terminal: Terminal::Collect {
                target: target.to_string(),
                collector,
            },
            result: ResultUse::Declare(target.to_string()),
            imports: BTreeSet::new(),
            mutability_risk,
        };
        pipeline.imports = imports_of(&pipeline);
        Ok(BuildOutcome::Built(pipeline))
    }

    /// Picks the collecting form for `target` and whether it carries the
    /// mutability risk
    fn collector(&self, target: &str) -> Option<(Collector, bool)> {
        let info = self.scope.get(target)?;
        let concrete = concrete_class(info);
        let order_sensitive = matches!(concrete, Some("TreeSet" | "LinkedHashSet"));
        let plain = match info.ty.simple_name() {
            "List" | "Collection" => Some(Collector::ToList),
            "Set" => Some(Collector::ToSet),
            _ => None,
        };
        // A plain collector keeps the contents only for the same kind of
        // collection: a `Collection` backed by a set must still drop duplicates
        let plain = plain.filter(|plain| match (plain, concrete) {
            (_, None) => true,
            (Collector::ToList, Some(class)) => TypeRef::named(class).is_list_like(),
            (Collector::ToSet, Some(class)) => TypeRef::named(class).is_set_like(),
            (Collector::ToCollection(_), Some(_)) => false,
        });

        match plain {
            Some(plain) if !order_sensitive => {
                if !info.mutated_after {
                    Some((plain, false))
                } else if !self.guarantee_mutable_collect {
                    debug!(%target, "collected form may be immutable");
                    Some((plain, true))
                } else {
                    match concrete.or_else(|| default_implementation(&info.ty)) {
                        Some(class) => Some((to_collection(class), false)),
                        None => {
                            debug!(%target, ty = %info.ty, "no mutable form known");
                            Some((plain, true))
                        }
                    }
                }
            }
            // A concrete declared type or an ordered set needs its own class
            _ => concrete.map(|class| (to_collection(class), false)),
        }
    }
}

fn to_collection(class: &str) -> Collector {
    Collector::ToCollection(Expr::method_ref(class, "new"))
}

/// The concrete collection class behind a variable, from its initializer
/// or its declared type
fn concrete_class(info: &VarInfo) -> Option<&str> {
    let is_class = |ty: &TypeRef| {
        (ty.is_list_like() || ty.is_set_like())
            && !matches!(ty.simple_name(), "List" | "Set" | "Collection" | "SortedSet")
    };
    if let Some(Expr::New { ty, .. }) = info.init.as_ref().map(Expr::unparenthesized) {
        if is_class(ty) {
            return Some(ty.simple_name());
        }
    }
    is_class(&info.ty).then(|| info.ty.simple_name())
}

fn default_implementation(ty: &TypeRef) -> Option<&'static str> {
    match ty.simple_name() {
        "List" => Some("ArrayList"),
        "Set" => Some("HashSet"),
        _ => None,
    }
}

/// A cast to the accumulator's primitive when the reduced values are of a
/// narrower or different numeric type, so the combiner sees its own type
fn widening(meta: &LoopMetadata, stages: &[Stage], param: &str, accumulator: &TypeRef) -> Option<Stage> {
    let incoming = stages
        .iter()
        .rev()
        .find_map(|stage| match stage {
            Stage::Map { ty, .. } => Some(ty.as_ref()),
            Stage::Filter { .. } => None,
        })
        .unwrap_or(meta.element_type.as_ref())?;
    let from = incoming.primitive_name()?;
    let to = accumulator.primitive_name()?;
    if from == to || !accumulator.is_numeric() {
        return None;
    }
    Some(Stage::Map {
        param: param.to_string(),
        expr: Expr::cast(TypeRef::named(to), Expr::name(param)),
        produced: None,
        ty: Some(accumulator.clone()),
    })
}

/// An array whose elements stream as `IntStream` and friends
fn is_primitive_array(meta: &LoopMetadata) -> bool {
    matches!(meta.source, LoopSource::Array(_))
        && meta.element_type.as_ref().map_or(true, TypeRef::is_primitive)
}

fn stream_source(source: &LoopSource) -> Option<StreamSource> {
    match source {
        LoopSource::Collection(e) => Some(StreamSource::Collection(e.clone())),
        LoopSource::Array(e) => Some(StreamSource::Array(e.clone())),
        LoopSource::Range {
            start,
            end,
            inclusive,
        } => Some(StreamSource::Range {
            start: start.clone(),
            end: end.clone(),
            inclusive: *inclusive,
        }),
        LoopSource::Condition(_) => None,
    }
}

/// Splits off the final operation; every other operation must be a MAP or
/// a FILTER
fn split_terminal(
    mut operations: Vec<ProspectiveOperation>,
) -> Option<(Vec<Stage>, ProspectiveOperation)> {
    let last = operations.pop()?;
    if !last.is_terminal() {
        return None;
    }
    let stages = operations
        .into_iter()
        .map(|op| match op.kind {
            OperationKind::Map { expr, ty } => Some(Stage::Map {
                param: op.param,
                expr,
                produced: op.produced,
                ty,
            }),
            OperationKind::Filter { predicate } => Some(Stage::Filter {
                param: op.param,
                predicate,
            }),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;
    Some((stages, last))
}

fn imports_of(pipeline: &Pipeline) -> BTreeSet<String> {
    let mut imports = BTreeSet::new();
    source_imports(&pipeline.source, &mut imports);
    if let Terminal::Collect { .. } = pipeline.terminal {
        imports.insert(IMPORT_COLLECTORS.to_string());
    }
    imports
}

fn source_imports(source: &StreamSource, imports: &mut BTreeSet<String>) {
    match source {
        StreamSource::Collection(_) => {}
        StreamSource::Array(_) => {
            imports.insert(IMPORT_ARRAYS.to_string());
        }
        StreamSource::Range { .. } => {
            imports.insert(IMPORT_INT_STREAM.to_string());
        }
        StreamSource::Concat(branches) => {
            imports.insert(IMPORT_STREAM.to_string());
            for branch in branches {
                source_imports(&branch.source, imports);
            }
        }
    }
}

// Diagnostic rendering, close to the Java the host would print

impl fmt::Display for StreamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamSource::Collection(e) => write!(f, "{e}.stream()"),
            StreamSource::Array(e) => write!(f, "Arrays.stream({e})"),
            StreamSource::Range {
                start,
                end,
                inclusive,
            } => {
                let method = if *inclusive { "rangeClosed" } else { "range" };
                write!(f, "IntStream.{method}({start}, {end})")
            }
            StreamSource::Concat(branches) => {
                let mut rendered = branches.iter().map(Branch::to_string);
                let first = rendered.next().unwrap_or_default();
                let nested = rendered.fold(first, |acc, next| format!("Stream.concat({acc}, {next})"));
                write!(f, "{nested}")
            }
        }
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)?;
        for stage in &self.stages {
            write!(f, "{stage}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Map { param, expr, .. } => {
                write!(f, ".map({})", Expr::lambda(&[param.as_str()], expr.clone()))
            }
            Stage::Filter { param, predicate } => {
                write!(f, ".filter({})", Expr::lambda(&[param.as_str()], predicate.clone()))
            }
        }
    }
}

impl fmt::Display for Collector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Collector::ToList => write!(f, "Collectors.toList()"),
            Collector::ToSet => write!(f, "Collectors.toSet()"),
            Collector::ToCollection(ctor) => write!(f, "Collectors.toCollection({ctor})"),
        }
    }
}

fn action(param: &str, body: &[Stmt]) -> Expr {
    match body {
        [Stmt::Expr(e)] => Expr::lambda(&[param], e.clone()),
        _ => Expr::lambda_block(&[param], body.to_vec()),
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut chain = String::new();
        if let Terminal::ForEach {
            direct: true,
            param,
            body,
            ..
        } = &self.terminal
        {
            if let StreamSource::Collection(e) = &self.source {
                chain = format!("{e}.forEach({})", action(param, body));
            }
        }

        if chain.is_empty() {
            chain = self.source.to_string();
            for stage in &self.stages {
                chain.push_str(&stage.to_string());
            }
            let terminal = match &self.terminal {
                Terminal::ForEach {
                    ordered,
                    param,
                    body,
                    ..
                } => {
                    let method = if *ordered { "forEachOrdered" } else { "forEach" };
                    format!(".{method}({})", action(param, body))
                }
                // Primitive ranges box before collecting into objects
                Terminal::Collect { collector, .. } => match self.source {
                    StreamSource::Range { .. } => format!(".boxed().collect({collector})"),
                    _ => format!(".collect({collector})"),
                },
                Terminal::Reduce {
                    identity, combiner, ..
                } => format!(".reduce({identity}, {combiner})"),
                Terminal::AnyMatch { param, predicate } => {
                    format!(".anyMatch({})", Expr::lambda(&[param.as_str()], predicate.clone()))
                }
                Terminal::NoneMatch { param, predicate } => {
                    format!(".noneMatch({})", Expr::lambda(&[param.as_str()], predicate.clone()))
                }
                Terminal::AllMatch { param, predicate } => {
                    format!(".allMatch({})", Expr::lambda(&[param.as_str()], predicate.clone()))
                }
            };
            chain.push_str(&terminal);
        }

        match &self.result {
            ResultUse::Discard => write!(f, "{chain};"),
            ResultUse::Assign(var) | ResultUse::Declare(var) => write!(f, "{var} = {chain};"),
            ResultUse::ReturnIf { negate, value } => {
                let not = if *negate { "!" } else { "" };
                write!(f, "if ({not}{chain}) return {value};")
            }
        }
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
