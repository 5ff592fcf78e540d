//! Local declarations derived from the current element become MAP stages

use super::{Cursor, ParseContext, ParseResult, ParserState, StatementHandler};
use crate::operation::ProspectiveOperation;
use loopshift_core::ast::Stmt;
use loopshift_core::error::Result;
use tracing::debug;

pub struct DeclarationHandler;

impl StatementHandler for DeclarationHandler {
    fn name(&self) -> &'static str {
        "declaration"
    }

    fn matches(&self, cursor: &Cursor<'_>, ctx: &ParseContext, _state: &ParserState<'_>) -> bool {
        match cursor.stmt() {
            Stmt::Local {
                init: Some(init), ..
            } => init.mentions(&ctx.current_variable_name) && !init.contains_update(),
            _ => false,
        }
    }

    fn handle(
        &self,
        cursor: &Cursor<'_>,
        ctx: ParseContext,
        state: &mut ParserState<'_>,
    ) -> Result<ParseResult> {
        let (ty, name, init) = match cursor.stmt() {
            Stmt::Local {
                ty,
                name,
                init: Some(init),
                ..
            } => (ty, name, init),
            _ => return Ok(ParseResult::Abort("expected an initialized local".to_string())),
        };

        let current = ctx.current_variable_name.clone();
        let produced = state.generator.generate_unique_variable_name(name)?;
        if produced != *name {
            debug!(declared = %name, %produced, "declared name is already taken");
            return Ok(ParseResult::Abort(format!(
                "stage variable `{name}` would shadow another name"
            )));
        }

        // `T y = x;` only renames the element
        if !init.is_name(&current) {
            state.push(ProspectiveOperation::map(
                &current,
                init.clone(),
                Some(&produced),
                Some(ty.clone()),
            ));
        }
        state.retire(&current);
        Ok(ctx.renamed(&produced).proceed())
    }
}
