//! Loop body parsing
//!
//! A single linear pass over the body turns each statement into pipeline
//! stages. Statements are offered to an ordered chain of handlers and the
//! first one that matches decides what the statement becomes. Any statement
//! that cannot be classified safely aborts the whole loop.

pub mod collect;
pub mod conditional;
pub mod continue_guard;
pub mod declaration;
pub mod reduce;
pub mod terminal;

use crate::lambda::LambdaGenerator;
use crate::normalize::LoopMetadata;
use crate::operation::ProspectiveOperation;
use loopshift_core::ast::{AstHashSet, Expr, Stmt};
use loopshift_core::error::{ensure_identifier, Result};
use loopshift_core::scope::Scope;
use loopshift_core::visitor::{walk_block, Visitor};
use tracing::{debug, trace};

/// State threaded from one parse step to the next
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseContext {
    /// Variable the next stage binds
    pub current_variable_name: String,
    /// Index of the next statement to parse, when a step consumed more
    /// than its own statement
    pub skip_to: Option<usize>,
}

impl ParseContext {
    pub fn new(current_variable_name: &str) -> Result<Self> {
        ensure_identifier("current variable", current_variable_name)?;
        Ok(ParseContext {
            current_variable_name: current_variable_name.to_string(),
            skip_to: None,
        })
    }

    /// Continue with the next statement
    pub fn proceed(self) -> ParseResult {
        ParseResult::Proceed(ParseContext {
            skip_to: None,
            ..self
        })
    }

    /// Continue after `index`, skipping everything before it
    pub fn skip_to(self, index: usize) -> ParseResult {
        ParseResult::Proceed(ParseContext {
            skip_to: Some(index),
            ..self
        })
    }

    pub fn renamed(self, name: &str) -> Self {
        ParseContext {
            current_variable_name: name.to_string(),
            ..self
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseResult {
    Proceed(ParseContext),
    /// The loop must be left unchanged; carries what went wrong
    Abort(String),
}

/// Position of one statement inside the list being parsed
#[derive(Debug, Clone, Copy)]
pub struct Cursor<'s> {
    pub stmts: &'s [Stmt],
    pub index: usize,
}

impl<'s> Cursor<'s> {
    pub fn stmt(&self) -> &'s Stmt {
        &self.stmts[self.index]
    }

    /// The statement is the last one of its list
    pub fn is_tail(&self) -> bool {
        self.index + 1 == self.stmts.len()
    }

    /// This statement and everything after it
    pub fn rest(&self) -> &'s [Stmt] {
        &self.stmts[self.index..]
    }

    pub fn end(&self) -> usize {
        self.stmts.len()
    }
}

/// Everything a handler may read or extend while parsing one loop body
pub struct ParserState<'a> {
    pub scope: &'a Scope,
    /// The statement after the loop
    pub following: Option<&'a Stmt>,
    pub generator: &'a mut LambdaGenerator,
    body: &'a [Stmt],
    operations: Vec<ProspectiveOperation>,
    retired: AstHashSet<String>,
}

impl<'a> ParserState<'a> {
    pub fn new(
        scope: &'a Scope,
        following: Option<&'a Stmt>,
        generator: &'a mut LambdaGenerator,
        body: &'a [Stmt],
    ) -> Self {
        ParserState {
            scope,
            following,
            generator,
            body,
            operations: Vec::new(),
            retired: AstHashSet::default(),
        }
    }

    pub fn operations(&self) -> &[ProspectiveOperation] {
        &self.operations
    }

    pub fn push(&mut self, op: ProspectiveOperation) {
        trace!(stage = op.type_name(), param = %op.param, "emitted stage");
        self.operations.push(op);
    }

    /// Marks a stage variable as no longer bound downstream
    pub fn retire(&mut self, name: &str) {
        self.retired.insert(name.to_string());
    }

    /// A retired stage variable referenced by `stmts`
    pub fn retired_reference(&self, stmts: &[Stmt]) -> Option<String> {
        stmts
            .iter()
            .flat_map(|s| s.free_names())
            .find(|name| self.retired.contains(name))
    }

    /// Whether `name` occurs anywhere in the body outside `stmt`
    pub fn mentioned_elsewhere(&self, stmt: &Stmt, name: &str) -> bool {
        count_mentions(self.body, name) > count_mentions(std::slice::from_ref(stmt), name)
    }

    /// Whether any stage emitted so far reads or writes `name`
    pub fn stages_mention(&self, name: &str) -> bool {
        self.operations.iter().any(|op| op.mentions(name))
    }

    fn into_operations(self) -> Vec<ProspectiveOperation> {
        self.operations
    }
}

/// One link of the statement classification chain
pub trait StatementHandler: Sync {
    fn name(&self) -> &'static str;

    /// Whether this handler takes the statement under the cursor
    fn matches(&self, cursor: &Cursor<'_>, ctx: &ParseContext, state: &ParserState<'_>) -> bool;

    fn handle(
        &self,
        cursor: &Cursor<'_>,
        ctx: ParseContext,
        state: &mut ParserState<'_>,
    ) -> Result<ParseResult>;
}

/// Handlers in precedence order; the terminal handler takes anything
static HANDLERS: [&dyn StatementHandler; 6] = [
    &declaration::DeclarationHandler,
    &continue_guard::ContinueGuardHandler,
    &reduce::ReduceHandler,
    &collect::CollectHandler,
    &conditional::ConditionalHandler,
    &terminal::TerminalHandler,
];

/// Parses one statement list; used for the body and for nested guards
pub fn parse_statements(
    stmts: &[Stmt],
    mut ctx: ParseContext,
    state: &mut ParserState<'_>,
) -> Result<ParseResult> {
    let mut index = 0;
    while index < stmts.len() {
        if matches!(stmts[index], Stmt::Empty) {
            index += 1;
            continue;
        }
        if let Some(name) = state.retired_reference(&stmts[index..=index]) {
            return Ok(ParseResult::Abort(format!(
                "`{name}` is no longer bound after an earlier stage"
            )));
        }

        let cursor = Cursor { stmts, index };
        let view: &ParserState<'_> = state;
        let handler = match HANDLERS.iter().find(|h| h.matches(&cursor, &ctx, view)) {
            Some(handler) => handler,
            None => return Ok(ParseResult::Abort("unclassified statement".to_string())),
        };
        trace!(
            handler = handler.name(),
            statement = cursor.stmt().kind_name(),
            current = %ctx.current_variable_name,
            "matched statement"
        );

        match handler.handle(&cursor, ctx, state)? {
            ParseResult::Proceed(next) => {
                index = next.skip_to.unwrap_or(index + 1);
                ctx = ParseContext {
                    skip_to: None,
                    ..next
                };
            }
            abort @ ParseResult::Abort(_) => return Ok(abort),
        }
    }
    Ok(ctx.proceed())
}

/// Successfully parsed loop body
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedBody {
    /// Stages in extraction order; at most the last one is terminal
    pub operations: Vec<ProspectiveOperation>,
    /// Variable bound by the last stage
    pub final_variable: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BodyParse {
    Parsed(ParsedBody),
    Aborted(String),
}

/// Drives the handler chain over one loop body
pub struct LoopBodyParser<'a> {
    scope: &'a Scope,
    following: Option<&'a Stmt>,
}

impl<'a> LoopBodyParser<'a> {
    pub fn new(scope: &'a Scope, following: Option<&'a Stmt>) -> Self {
        Self { scope, following }
    }

    /// Parses the body of `meta`, drawing names from `generator`
    pub fn parse(&self, meta: &LoopMetadata, generator: &mut LambdaGenerator) -> Result<BodyParse> {
        let ctx = ParseContext::new(&meta.element_name)?;
        reserve_names(generator, self.scope, meta);

        let mut state = ParserState::new(self.scope, self.following, generator, &meta.body);
        let outcome = parse_statements(&meta.body, ctx, &mut state)?;
        match outcome {
            ParseResult::Proceed(ctx) => Ok(BodyParse::Parsed(ParsedBody {
                operations: state.into_operations(),
                final_variable: ctx.current_variable_name,
            })),
            ParseResult::Abort(reason) => {
                debug!(element = %meta.element_name, %reason, "body parse aborted");
                Ok(BodyParse::Aborted(reason))
            }
        }
    }
}

/// Names a synthesized stage variable must not take. Names the body
/// declares stay free so a declaration keeps its own name as a stage.
fn reserve_names(generator: &mut LambdaGenerator, scope: &Scope, meta: &LoopMetadata) {
    for name in scope.names() {
        generator.reserve(name);
    }
    generator.reserve(&meta.element_name);

    let declared: AstHashSet<String> = meta.body.iter().flat_map(|s| s.declared_names()).collect();
    for name in meta.body.iter().flat_map(|s| s.free_names()) {
        if !declared.contains(&name) {
            generator.reserve(&name);
        }
    }
}

/// Occurrences of `name` as a variable reference
fn count_mentions(stmts: &[Stmt], name: &str) -> usize {
    let mut counter = MentionCounter { name, count: 0 };
    walk_block(&mut counter, stmts);
    counter.count
}

struct MentionCounter<'n> {
    name: &'n str,
    count: usize,
}

impl Visitor for MentionCounter<'_> {
    fn enter_expr(&mut self, expr: &Expr) -> bool {
        if expr.is_name(self.name) {
            self.count += 1;
        }
        true
    }
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
