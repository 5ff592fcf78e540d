//! `if (c) continue;` keeps only the elements for which `c` is false

use super::{Cursor, ParseContext, ParseResult, ParserState, StatementHandler};
use crate::operation::ProspectiveOperation;
use loopshift_core::ast::Stmt;
use loopshift_core::error::Result;

pub struct ContinueGuardHandler;

impl StatementHandler for ContinueGuardHandler {
    fn name(&self) -> &'static str {
        "continue-guard"
    }

    fn matches(&self, cursor: &Cursor<'_>, _ctx: &ParseContext, _state: &ParserState<'_>) -> bool {
        matches!(
            cursor.stmt(),
            Stmt::If {
                then_branch,
                else_branch: None,
                ..
            } if matches!(then_branch.single(), Stmt::Continue(None))
        )
    }

    fn handle(
        &self,
        cursor: &Cursor<'_>,
        ctx: ParseContext,
        state: &mut ParserState<'_>,
    ) -> Result<ParseResult> {
        let condition = match cursor.stmt() {
            Stmt::If { condition, .. } => condition,
            _ => return Ok(ParseResult::Abort("expected a continue guard".to_string())),
        };
        state.push(ProspectiveOperation::filter(
            &ctx.current_variable_name,
            condition.negated(),
        ));
        Ok(ctx.proceed())
    }
}
