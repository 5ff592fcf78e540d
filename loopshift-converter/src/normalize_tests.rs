use crate::normalize::*;
use loopshift_core::ast::{AssignOp, BinaryOp, Expr, Stmt, TypeRef};
use loopshift_core::scope::{Scope, VarInfo};

fn string() -> TypeRef {
    TypeRef::named("String")
}

fn int() -> TypeRef {
    TypeRef::named("int")
}

fn list_of(elem: &str) -> TypeRef {
    TypeRef::generic("List", vec![TypeRef::named(elem)])
}

fn println(arg: Expr) -> Stmt {
    Stmt::expr(Expr::call(
        Expr::field(Expr::name("System"), "out"),
        "println",
        vec![arg],
    ))
}

fn scope_with(vars: Vec<(&str, VarInfo)>) -> Scope {
    let mut scope = Scope::new();
    for (name, info) in vars {
        scope.declare(name, info).unwrap();
    }
    scope
}

fn counted(start: Expr, op: BinaryOp, end: Expr, body: Vec<Stmt>) -> Stmt {
    Stmt::for_loop(
        vec![Stmt::local(int(), "i", start)],
        Some(Expr::binary(op, Expr::name("i"), end)),
        vec![Expr::post_inc("i")],
        body,
    )
}

// ===== Surface Form Tests =====

#[test]
fn test_non_loop_is_not_normalized() {
    let normalizer = LoopNormalizer::default();
    assert!(normalizer.normalize(&println(Expr::name("x")), &Scope::new()).is_none());
}

#[test]
fn test_for_each_over_collection() {
    let stmt = Stmt::for_each(string(), "s", Expr::name("names"), vec![println(Expr::name("s"))]);
    let meta = LoopNormalizer::default().normalize(&stmt, &Scope::new()).unwrap();

    assert_eq!(meta.source, LoopSource::Collection(Expr::name("names")));
    assert_eq!(meta.element_name, "s");
    assert_eq!(meta.element_type, Some(string()));
    assert_eq!(meta.shape, LoopShape::ForEach);
    assert_eq!(meta.form, LoopForm::ForEach);
    assert_eq!(meta.body.len(), 1);
    assert_eq!(meta.flags, LoopFlags::default());
    assert_eq!(meta.label, None);
}

#[test]
fn test_for_each_over_array() {
    let scope = scope_with(vec![("values", VarInfo::new(int().array_of()))]);
    let stmt = Stmt::for_each(int(), "v", Expr::name("values"), vec![println(Expr::name("v"))]);
    let meta = LoopNormalizer::default().normalize(&stmt, &scope).unwrap();
    assert_eq!(meta.source, LoopSource::Array(Expr::name("values")));
}

#[test]
fn test_labeled_loop_keeps_label() {
    let stmt = Stmt::labeled(
        "outer",
        Stmt::for_each(string(), "s", Expr::name("names"), vec![println(Expr::name("s"))]),
    );
    let meta = LoopNormalizer::default().normalize(&stmt, &Scope::new()).unwrap();
    assert_eq!(meta.label.as_deref(), Some("outer"));
}

#[test]
fn test_closed_range() {
    let stmt = counted(Expr::int(0), BinaryOp::Lt, Expr::name("n"), vec![println(Expr::name("i"))]);
    let meta = LoopNormalizer::default().normalize(&stmt, &Scope::new()).unwrap();

    assert_eq!(
        meta.source,
        LoopSource::Range {
            start: Expr::int(0),
            end: Expr::name("n"),
            inclusive: false
        }
    );
    assert_eq!(meta.element_name, "i");
    assert_eq!(meta.shape, LoopShape::Indexed);
    assert_eq!(meta.form, LoopForm::Range);
}

#[test]
fn test_inclusive_and_mirrored_range() {
    let stmt = Stmt::for_loop(
        vec![Stmt::local(int(), "i", Expr::int(1))],
        Some(Expr::binary(BinaryOp::Ge, Expr::name("limit"), Expr::name("i"))),
        vec![Expr::compound(AssignOp::Add, Expr::name("i"), Expr::int(1))],
        vec![println(Expr::name("i"))],
    );
    let meta = LoopNormalizer::default().normalize(&stmt, &Scope::new()).unwrap();
    assert_eq!(
        meta.source,
        LoopSource::Range {
            start: Expr::int(1),
            end: Expr::name("limit"),
            inclusive: true
        }
    );
}

#[test]
fn test_non_unit_step_is_opaque() {
    let stmt = Stmt::for_loop(
        vec![Stmt::local(int(), "i", Expr::int(0))],
        Some(Expr::binary(BinaryOp::Lt, Expr::name("i"), Expr::name("n"))),
        vec![Expr::compound(AssignOp::Add, Expr::name("i"), Expr::int(2))],
        vec![println(Expr::name("i"))],
    );
    let meta = LoopNormalizer::default().normalize(&stmt, &Scope::new()).unwrap();
    assert_eq!(meta.form, LoopForm::Counted);
    assert!(matches!(meta.source, LoopSource::Condition(Some(_))));
    assert_eq!(meta.element_name, "i");
}

#[test]
fn test_range_with_body_writing_counter_is_opaque() {
    let stmt = counted(
        Expr::int(0),
        BinaryOp::Lt,
        Expr::name("n"),
        vec![Stmt::expr(Expr::post_inc("i"))],
    );
    let meta = LoopNormalizer::default().normalize(&stmt, &Scope::new()).unwrap();
    assert_eq!(meta.form, LoopForm::Counted);
}

#[test]
fn test_range_with_body_growing_bound_is_opaque() {
    let stmt = counted(
        Expr::int(0),
        BinaryOp::Lt,
        Expr::call(Expr::name("items"), "size", vec![]),
        vec![Stmt::expr(Expr::call(Expr::name("items"), "add", vec![Expr::string("x")]))],
    );
    let meta = LoopNormalizer::new(false).normalize(&stmt, &Scope::new()).unwrap();
    assert_eq!(meta.form, LoopForm::Counted);
}

// ===== Index Elimination Tests =====

fn indexed_over_list() -> Stmt {
    counted(
        Expr::int(0),
        BinaryOp::Lt,
        Expr::call(Expr::name("names"), "size", vec![]),
        vec![
            Stmt::local(
                string(),
                "name",
                Expr::call(Expr::name("names"), "get", vec![Expr::name("i")]),
            ),
            println(Expr::name("name")),
        ],
    )
}

#[test]
fn test_index_elimination_over_list() {
    let meta = LoopNormalizer::default()
        .normalize(&indexed_over_list(), &Scope::new())
        .unwrap();
    assert_eq!(meta.source, LoopSource::Collection(Expr::name("names")));
    assert_eq!(meta.element_name, "name");
    assert_eq!(meta.shape, LoopShape::ForEach);
    assert_eq!(meta.body, vec![println(Expr::name("name"))]);
}

#[test]
fn test_index_elimination_disabled() {
    let meta = LoopNormalizer::new(false)
        .normalize(&indexed_over_list(), &Scope::new())
        .unwrap();
    assert_eq!(meta.form, LoopForm::Range);
    assert_eq!(meta.body.len(), 2);
}

#[test]
fn test_index_elimination_over_array() {
    let scope = scope_with(vec![("values", VarInfo::new(int().array_of()))]);
    let stmt = counted(
        Expr::int(0),
        BinaryOp::Lt,
        Expr::field(Expr::name("values"), "length"),
        vec![
            Stmt::local(
                int(),
                "v",
                Expr::array_access(Expr::name("values"), Expr::name("i")),
            ),
            println(Expr::name("v")),
        ],
    );
    let meta = LoopNormalizer::default().normalize(&stmt, &scope).unwrap();
    assert_eq!(meta.source, LoopSource::Array(Expr::name("values")));
    assert_eq!(meta.element_name, "v");
}

#[test]
fn test_index_still_used_keeps_range() {
    let stmt = counted(
        Expr::int(0),
        BinaryOp::Lt,
        Expr::call(Expr::name("names"), "size", vec![]),
        vec![
            Stmt::local(
                string(),
                "name",
                Expr::call(Expr::name("names"), "get", vec![Expr::name("i")]),
            ),
            println(Expr::binary(BinaryOp::Add, Expr::name("i"), Expr::name("name"))),
        ],
    );
    let meta = LoopNormalizer::default().normalize(&stmt, &Scope::new()).unwrap();
    assert_eq!(meta.form, LoopForm::Range);
}

// ===== Iterator Form Tests =====

fn iterator_scope() -> Scope {
    scope_with(vec![
        ("names", VarInfo::new(list_of("String"))),
        (
            "it",
            VarInfo::new(TypeRef::generic("Iterator", vec![string()]))
                .with_init(Expr::call(Expr::name("names"), "iterator", vec![])),
        ),
    ])
}

fn bind_next() -> Stmt {
    Stmt::local(string(), "s", Expr::call(Expr::name("it"), "next", vec![]))
}

#[test]
fn test_iterator_while() {
    let stmt = Stmt::while_loop(
        Expr::call(Expr::name("it"), "hasNext", vec![]),
        vec![bind_next(), println(Expr::name("s"))],
    );
    let meta = LoopNormalizer::default().normalize(&stmt, &iterator_scope()).unwrap();
    assert_eq!(meta.source, LoopSource::Collection(Expr::name("names")));
    assert_eq!(meta.element_name, "s");
    assert_eq!(meta.shape, LoopShape::Iterator);
    assert_eq!(meta.form, LoopForm::IteratorWhile);
    assert_eq!(meta.body, vec![println(Expr::name("s"))]);
    assert!(!meta.flags.has_multiple_iterators);
}

#[test]
fn test_iterator_for() {
    let stmt = Stmt::for_loop(
        vec![Stmt::local(
            TypeRef::generic("Iterator", vec![string()]),
            "it",
            Expr::call(Expr::name("names"), "iterator", vec![]),
        )],
        Some(Expr::call(Expr::name("it"), "hasNext", vec![])),
        vec![],
        vec![bind_next(), println(Expr::name("s"))],
    );
    let meta = LoopNormalizer::default().normalize(&stmt, &Scope::new()).unwrap();
    assert_eq!(meta.form, LoopForm::IteratorFor);
    assert_eq!(meta.source, LoopSource::Collection(Expr::name("names")));
}

#[test]
fn test_cursor_removal_sets_mutation_flag() {
    let stmt = Stmt::while_loop(
        Expr::call(Expr::name("it"), "hasNext", vec![]),
        vec![
            bind_next(),
            Stmt::if_then(
                Expr::call(Expr::name("s"), "isEmpty", vec![]),
                Stmt::expr(Expr::call(Expr::name("it"), "remove", vec![])),
            ),
        ],
    );
    let meta = LoopNormalizer::default().normalize(&stmt, &iterator_scope()).unwrap();
    assert!(meta.flags.has_iterator_mutation);
}

#[test]
fn test_second_advance_sets_multiple_iterators() {
    let stmt = Stmt::while_loop(
        Expr::call(Expr::name("it"), "hasNext", vec![]),
        vec![bind_next(), println(Expr::call(Expr::name("it"), "next", vec![]))],
    );
    let meta = LoopNormalizer::default().normalize(&stmt, &iterator_scope()).unwrap();
    assert!(meta.flags.has_multiple_iterators);
}

#[test]
fn test_other_cursor_in_for_each_sets_multiple_iterators() {
    let scope = scope_with(vec![(
        "other",
        VarInfo::new(TypeRef::generic("Iterator", vec![string()])),
    )]);
    let stmt = Stmt::for_each(
        string(),
        "s",
        Expr::name("names"),
        vec![println(Expr::call(Expr::name("other"), "next", vec![]))],
    );
    let meta = LoopNormalizer::default().normalize(&stmt, &scope).unwrap();
    assert!(meta.flags.has_multiple_iterators);
}

#[test]
fn test_plain_while_is_opaque() {
    let stmt = Stmt::while_loop(
        Expr::binary(BinaryOp::Gt, Expr::name("n"), Expr::int(0)),
        vec![Stmt::expr(Expr::post_dec("n"))],
    );
    let meta = LoopNormalizer::default().normalize(&stmt, &Scope::new()).unwrap();
    assert_eq!(meta.form, LoopForm::While);
    assert!(meta.form.is_opaque());
}

#[test]
fn test_do_while_is_opaque() {
    let stmt = Stmt::do_while(vec![println(Expr::name("x"))], Expr::boolean(false));
    let meta = LoopNormalizer::default().normalize(&stmt, &Scope::new()).unwrap();
    assert_eq!(meta.form, LoopForm::DoWhile);
}

// ===== Flag Tests =====

#[test]
fn test_break_in_nested_loop_is_not_ours() {
    let stmt = Stmt::for_each(
        string(),
        "s",
        Expr::name("names"),
        vec![Stmt::while_loop(Expr::boolean(true), vec![Stmt::break_loop()])],
    );
    let meta = LoopNormalizer::default().normalize(&stmt, &Scope::new()).unwrap();
    assert!(!meta.flags.has_break);
}

#[test]
fn test_control_flow_flags() {
    let stmt = Stmt::for_each(
        string(),
        "s",
        Expr::name("names"),
        vec![
            Stmt::if_then(Expr::name("a"), Stmt::break_loop()),
            Stmt::if_then(Expr::name("b"), Stmt::continue_loop()),
            Stmt::if_then(
                Expr::name("c"),
                Stmt::throw(Expr::new_object(TypeRef::named("IllegalStateException"), vec![])),
            ),
            Stmt::if_then(Expr::name("d"), Stmt::continue_to("outer")),
        ],
    );
    let meta = LoopNormalizer::default().normalize(&stmt, &Scope::new()).unwrap();
    assert!(meta.flags.has_break);
    assert!(meta.flags.has_continue);
    assert!(meta.flags.has_throw);
    assert!(meta.flags.has_labeled_jump);
}

#[test]
fn test_jump_to_label_inside_body_is_local() {
    let stmt = Stmt::for_each(
        string(),
        "s",
        Expr::name("names"),
        vec![Stmt::labeled(
            "inner",
            Stmt::while_loop(Expr::boolean(true), vec![Stmt::break_to("inner")]),
        )],
    );
    let meta = LoopNormalizer::default().normalize(&stmt, &Scope::new()).unwrap();
    assert!(!meta.flags.has_labeled_jump);
}

#[test]
fn test_returns_are_recorded() {
    let stmt = Stmt::for_each(
        string(),
        "s",
        Expr::name("names"),
        vec![
            Stmt::if_then(Expr::name("a"), Stmt::ret(Expr::boolean(true))),
            Stmt::ret(Expr::boolean(false)),
        ],
    );
    let meta = LoopNormalizer::default().normalize(&stmt, &Scope::new()).unwrap();
    assert_eq!(
        meta.returns,
        vec![Some(Expr::boolean(true)), Some(Expr::boolean(false))]
    );
    assert!(meta.flags.has_unconditional_return);
}

#[test]
fn test_lambda_bodies_are_not_scanned() {
    let stmt = Stmt::for_each(
        string(),
        "s",
        Expr::name("names"),
        vec![Stmt::expr(Expr::call(
            Expr::name("executor"),
            "submit",
            vec![Expr::lambda_block(&[], vec![Stmt::ret(Expr::name("s"))])],
        ))],
    );
    let meta = LoopNormalizer::default().normalize(&stmt, &Scope::new()).unwrap();
    assert!(meta.returns.is_empty());
}

#[test]
fn test_source_mutation_in_for_each() {
    let stmt = Stmt::for_each(
        string(),
        "s",
        Expr::name("names"),
        vec![Stmt::expr(Expr::call(Expr::name("names"), "remove", vec![Expr::name("s")]))],
    );
    let meta = LoopNormalizer::default().normalize(&stmt, &Scope::new()).unwrap();
    assert!(meta.flags.has_iterator_mutation);
}
