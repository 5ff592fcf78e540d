//! Accumulation updates become a MAP to the folded value and a REDUCE

use super::{Cursor, ParseContext, ParseResult, ParserState, StatementHandler};
use crate::lambda::LambdaGenerator;
use crate::operation::ProspectiveOperation;
use crate::reducer::{ReducerClassifier, ReducerType};
use loopshift_core::error::Result;
use tracing::debug;

pub struct ReduceHandler;

impl StatementHandler for ReduceHandler {
    fn name(&self) -> &'static str {
        "reduction"
    }

    fn matches(&self, cursor: &Cursor<'_>, _ctx: &ParseContext, state: &ParserState<'_>) -> bool {
        ReducerClassifier::new(state.scope)
            .classify(cursor.stmt())
            .is_some()
    }

    fn handle(
        &self,
        cursor: &Cursor<'_>,
        ctx: ParseContext,
        state: &mut ParserState<'_>,
    ) -> Result<ParseResult> {
        let stmt = cursor.stmt();
        let reduction = match ReducerClassifier::new(state.scope).classify(stmt) {
            Some(reduction) => reduction,
            None => return Ok(ParseResult::Abort("expected an accumulation".to_string())),
        };
        let acc = reduction.accumulator.as_str();

        if reduction.kind == ReducerType::CustomAggregate {
            debug!(accumulator = %acc, "no safe combiner for accumulation");
            return Ok(ParseResult::Abort(format!(
                "`{acc}` accumulates in an unsupported way"
            )));
        }
        if !cursor.is_tail() {
            return Ok(ParseResult::Abort(format!(
                "accumulation into `{acc}` is not the last statement"
            )));
        }
        if state.stages_mention(acc) || state.mentioned_elsewhere(stmt, acc) {
            return Ok(ParseResult::Abort(format!(
                "`{acc}` is read outside its accumulation"
            )));
        }

        let current = ctx.current_variable_name.clone();
        if reduction.kind.is_counting() {
            let one = match LambdaGenerator::literal_one(&reduction.accumulator_type) {
                Some(one) => one,
                None => {
                    return Ok(ParseResult::Abort(format!(
                        "`{}` cannot be counted",
                        reduction.accumulator_type
                    )))
                }
            };
            let item = state.generator.generate_unique_variable_name("_item")?;
            state.push(ProspectiveOperation::map(
                &item,
                one,
                None,
                Some(reduction.accumulator_type.clone()),
            ));
        } else {
            match &reduction.operand {
                Some(operand) if operand.is_name(&current) => {}
                Some(operand) => state.push(ProspectiveOperation::map(
                    &current,
                    operand.clone(),
                    None,
                    Some(reduction.accumulator_type.clone()),
                )),
                None => {
                    return Ok(ParseResult::Abort(format!(
                        "accumulation into `{acc}` has no operand"
                    )))
                }
            }
        }

        state.push(ProspectiveOperation::reduce(
            &current,
            reduction.kind,
            acc,
            reduction.accumulator_type.clone(),
            reduction.null_safe,
        )
        .guarded_by(reduction.guard));
        Ok(ctx.skip_to(cursor.end()))
    }
}
