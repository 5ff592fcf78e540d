//! A guard in tail position becomes a FILTER, or a match terminal when it
//! guards a boolean return

use super::{parse_statements, Cursor, ParseContext, ParseResult, ParserState, StatementHandler};
use crate::operation::ProspectiveOperation;
use loopshift_core::ast::{Expr, Stmt};
use loopshift_core::error::Result;
use tracing::debug;

pub struct ConditionalHandler;

impl StatementHandler for ConditionalHandler {
    fn name(&self) -> &'static str {
        "conditional"
    }

    fn matches(&self, cursor: &Cursor<'_>, _ctx: &ParseContext, _state: &ParserState<'_>) -> bool {
        cursor.is_tail()
            && matches!(
                cursor.stmt(),
                Stmt::If {
                    else_branch: None,
                    ..
                }
            )
    }

    fn handle(
        &self,
        cursor: &Cursor<'_>,
        ctx: ParseContext,
        state: &mut ParserState<'_>,
    ) -> Result<ParseResult> {
        let (condition, then_branch) = match cursor.stmt() {
            Stmt::If {
                condition,
                then_branch,
                else_branch: None,
            } => (condition, then_branch),
            _ => return Ok(ParseResult::Abort("expected a guard without else".to_string())),
        };

        if let Stmt::Return(Some(value)) = then_branch.single() {
            if let Some(returned) = value.as_bool() {
                return Ok(match_terminal(condition, returned, ctx, cursor, state));
            }
        }

        state.push(ProspectiveOperation::filter(
            &ctx.current_variable_name,
            condition.clone(),
        ));
        match parse_statements(then_branch.as_statements(), ctx, state)? {
            ParseResult::Proceed(inner) => Ok(inner.skip_to(cursor.end())),
            abort => Ok(abort),
        }
    }
}

/// `if (c) return b;` followed after the loop by `return !b;`
fn match_terminal(
    condition: &Expr,
    returned: bool,
    ctx: ParseContext,
    cursor: &Cursor<'_>,
    state: &mut ParserState<'_>,
) -> ParseResult {
    let fallthrough = state
        .following
        .and_then(|stmt| match stmt.single() {
            Stmt::Return(Some(value)) => value.as_bool(),
            _ => None,
        });
    if fallthrough != Some(!returned) {
        debug!(returned, ?fallthrough, "guarded return has no matching fallthrough");
        return ParseResult::Abort(format!(
            "`return {returned}` in the loop is not paired with `return {}` after it",
            !returned
        ));
    }

    let current = ctx.current_variable_name.as_str();
    let op = match (returned, condition.strip_negation()) {
        (true, _) => ProspectiveOperation::any_match(current, condition.clone()),
        (false, Some(inner)) => ProspectiveOperation::all_match(current, inner.clone()),
        (false, None) => ProspectiveOperation::none_match(current, condition.clone()),
    };
    state.push(op);
    ctx.skip_to(cursor.end())
}
