//! Appends to a fresh destination collection become a COLLECT

use super::{Cursor, ParseContext, ParseResult, ParserState, StatementHandler};
use crate::operation::ProspectiveOperation;
use loopshift_core::ast::{Expr, Stmt};
use loopshift_core::error::Result;
use loopshift_core::scope::Scope;

pub struct CollectHandler;

/// `dest.add(value)` where `dest` is a fresh list or set in scope
fn collect_target<'s>(stmt: &'s Stmt, scope: &Scope) -> Option<(&'s str, &'s Expr)> {
    let expr = match stmt.single() {
        Stmt::Expr(expr) => expr,
        _ => return None,
    };
    let (receiver, method, args) = expr.as_method_call()?;
    let dest = receiver?.as_name()?;
    if method != "add" || args.len() != 1 {
        return None;
    }
    let info = scope.get(dest)?;
    let collection = info.ty.is_list_like() || info.ty.is_set_like();
    (collection && info.is_fresh_collection()).then(|| (dest, &args[0]))
}

impl StatementHandler for CollectHandler {
    fn name(&self) -> &'static str {
        "collect"
    }

    fn matches(&self, cursor: &Cursor<'_>, _ctx: &ParseContext, state: &ParserState<'_>) -> bool {
        collect_target(cursor.stmt(), state.scope).is_some()
    }

    fn handle(
        &self,
        cursor: &Cursor<'_>,
        ctx: ParseContext,
        state: &mut ParserState<'_>,
    ) -> Result<ParseResult> {
        let stmt = cursor.stmt();
        let (dest, value) = match collect_target(stmt, state.scope) {
            Some(target) => target,
            None => return Ok(ParseResult::Abort("expected an append".to_string())),
        };

        if !cursor.is_tail() {
            return Ok(ParseResult::Abort(format!(
                "append to `{dest}` is not the last statement"
            )));
        }
        if value.mentions(dest) || state.stages_mention(dest) || state.mentioned_elsewhere(stmt, dest) {
            return Ok(ParseResult::Abort(format!(
                "`{dest}` is used outside its append"
            )));
        }
        if value.contains_update() {
            return Ok(ParseResult::Abort(format!(
                "value appended to `{dest}` writes a variable"
            )));
        }

        let current = ctx.current_variable_name.clone();
        if !value.is_name(&current) {
            state.push(ProspectiveOperation::map(&current, value.clone(), None, None));
        }
        state.push(ProspectiveOperation::collect(&current, dest));
        Ok(ctx.skip_to(cursor.end()))
    }
}
