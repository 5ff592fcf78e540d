//! Whatever is left becomes the FOREACH action, if it is safe to run there

use super::{Cursor, ParseContext, ParseResult, ParserState, StatementHandler};
use crate::operation::ProspectiveOperation;
use crate::side_effects::{classify, EffectClass};
use loopshift_core::ast::Stmt;
use loopshift_core::error::Result;
use tracing::debug;

pub struct TerminalHandler;

impl StatementHandler for TerminalHandler {
    fn name(&self) -> &'static str {
        "terminal"
    }

    fn matches(&self, _cursor: &Cursor<'_>, _ctx: &ParseContext, _state: &ParserState<'_>) -> bool {
        true
    }

    fn handle(
        &self,
        cursor: &Cursor<'_>,
        ctx: ParseContext,
        state: &mut ParserState<'_>,
    ) -> Result<ParseResult> {
        let rest = cursor.rest();
        if let Some(name) = state.retired_reference(rest) {
            return Ok(ParseResult::Abort(format!(
                "`{name}` is no longer bound after an earlier stage"
            )));
        }

        let action = if cursor.is_tail() {
            cursor.stmt().clone()
        } else {
            Stmt::block(rest.to_vec())
        };
        let current = ctx.current_variable_name.as_str();
        if classify(Some(&action), current, state.operations()) == EffectClass::Unsafe {
            debug!(statement = action.kind_name(), %current, "unsafe terminal action");
            return Ok(ParseResult::Abort(format!(
                "{} statement has an unsafe side effect",
                cursor.stmt().kind_name()
            )));
        }

        state.push(ProspectiveOperation::for_each(current, rest.to_vec()));
        Ok(ctx.skip_to(cursor.end()))
    }
}
