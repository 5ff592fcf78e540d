use crate::normalize::LoopNormalizer;
use crate::preconditions::*;
use loopshift_core::ast::{BinaryOp, Expr, Stmt, TypeRef};
use loopshift_core::scope::Scope;

fn check(stmt: &Stmt) -> Eligibility {
    let meta = LoopNormalizer::default()
        .normalize(stmt, &Scope::new())
        .expect("loop");
    PreconditionsChecker::new().check(&meta)
}

fn over_items(body: Vec<Stmt>) -> Stmt {
    Stmt::for_each(TypeRef::named("String"), "s", Expr::name("items"), body)
}

fn work() -> Stmt {
    Stmt::expr(Expr::call_fn("work", vec![Expr::name("s")]))
}

#[test]
fn test_simple_loop_is_eligible() {
    let result = check(&over_items(vec![work()]));
    assert!(result.is_eligible());
    assert_eq!(result.reason(), None);
}

#[test]
fn test_break_after_effect_is_rejected() {
    let stmt = over_items(vec![work(), Stmt::if_then(Expr::name("done"), Stmt::break_loop())]);
    assert_eq!(check(&stmt), Eligibility::Ineligible(IneligibleReason::Break));
}

#[test]
fn test_throw_is_rejected() {
    let stmt = over_items(vec![Stmt::throw(Expr::new_object(
        TypeRef::named("IllegalStateException"),
        vec![],
    ))]);
    assert_eq!(check(&stmt).reason(), Some(IneligibleReason::Throw));
}

#[test]
fn test_labeled_continue_is_rejected() {
    let stmt = Stmt::labeled(
        "outer",
        over_items(vec![Stmt::if_then(Expr::name("skip"), Stmt::continue_to("outer")), work()]),
    );
    assert_eq!(check(&stmt).reason(), Some(IneligibleReason::LabeledJump));
}

#[test]
fn test_do_while_is_rejected() {
    let stmt = Stmt::do_while(vec![work()], Expr::name("more"));
    assert_eq!(check(&stmt).reason(), Some(IneligibleReason::DoWhile));
}

#[test]
fn test_unbounded_count_is_rejected() {
    let stmt = Stmt::for_loop(
        vec![Stmt::local(TypeRef::named("int"), "i", Expr::int(0))],
        Some(Expr::call_fn("keepGoing", vec![Expr::name("i")])),
        vec![Expr::post_inc("i")],
        vec![work()],
    );
    assert_eq!(check(&stmt).reason(), Some(IneligibleReason::UnboundedCount));
}

#[test]
fn test_opaque_while_is_rejected() {
    let stmt = Stmt::while_loop(
        Expr::binary(BinaryOp::Gt, Expr::name("n"), Expr::int(0)),
        vec![Stmt::expr(Expr::post_dec("n"))],
    );
    assert_eq!(check(&stmt).reason(), Some(IneligibleReason::OpaqueWhile));
}

#[test]
fn test_divergent_returns_are_rejected() {
    let stmt = over_items(vec![
        Stmt::if_then(Expr::name("a"), Stmt::ret(Expr::boolean(true))),
        Stmt::if_then(Expr::name("b"), Stmt::ret(Expr::boolean(false))),
    ]);
    assert_eq!(check(&stmt).reason(), Some(IneligibleReason::DivergentReturns));
}

#[test]
fn test_uniform_returns_are_not_divergent() {
    let stmt = over_items(vec![
        Stmt::if_then(Expr::name("a"), Stmt::ret(Expr::name("s"))),
        Stmt::if_then(Expr::name("b"), Stmt::ret(Expr::name("s"))),
    ]);
    assert!(check(&stmt).is_eligible());
}

#[test]
fn test_break_and_continue_are_rejected_together() {
    let stmt = over_items(vec![
        Stmt::if_then(Expr::name("skip"), Stmt::continue_loop()),
        Stmt::if_then(Expr::name("stop"), Stmt::break_loop()),
        work(),
    ]);
    assert_eq!(check(&stmt).reason(), Some(IneligibleReason::BreakAndContinue));
}

#[test]
fn test_unconditional_return_is_rejected() {
    let stmt = over_items(vec![work(), Stmt::ret_void()]);
    assert_eq!(check(&stmt).reason(), Some(IneligibleReason::UnconditionalReturn));
}

#[test]
fn test_empty_body_is_rejected() {
    let stmt = over_items(vec![Stmt::Empty, Stmt::block(vec![])]);
    assert_eq!(check(&stmt).reason(), Some(IneligibleReason::EmptyBody));
}

#[test]
fn test_source_mutation_is_rejected() {
    let stmt = over_items(vec![Stmt::expr(Expr::call(
        Expr::name("items"),
        "add",
        vec![Expr::name("s")],
    ))]);
    assert_eq!(check(&stmt).reason(), Some(IneligibleReason::IteratorMutation));
}

#[test]
fn test_reason_display() {
    assert_eq!(IneligibleReason::Break.to_string(), "loop body contains break");
    assert_eq!(
        IneligibleReason::IteratorMutation.to_string(),
        "collection is modified during traversal"
    );
}
