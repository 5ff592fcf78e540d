use crate::ast::*;
use crate::visitor::*;

#[derive(Default)]
struct Counter {
    stmts: usize,
    exprs: usize,
    kinds: Vec<&'static str>,
}

impl Visitor for Counter {
    fn enter_stmt(&mut self, stmt: &Stmt) -> bool {
        self.stmts += 1;
        self.kinds.push(stmt.kind_name());
        true
    }

    fn enter_expr(&mut self, _expr: &Expr) -> bool {
        self.exprs += 1;
        true
    }
}

/// Stops at nested loops, the way loop-local analyses do
#[derive(Default)]
struct TopLevelOnly {
    seen_breaks: usize,
    depth: usize,
}

impl Visitor for TopLevelOnly {
    fn enter_stmt(&mut self, stmt: &Stmt) -> bool {
        if stmt.is_loop() {
            self.depth += 1;
            return self.depth == 1;
        }
        if let Stmt::Break(_) = stmt {
            self.seen_breaks += 1;
        }
        true
    }

    fn leave_stmt(&mut self, stmt: &Stmt) {
        if stmt.is_loop() {
            self.depth -= 1;
        }
    }
}

fn int() -> TypeRef {
    TypeRef::named("int")
}

#[test]
fn test_walk_visits_in_source_order() {
    let stmt = Stmt::block(vec![
        Stmt::local(int(), "x", Expr::int(1)),
        Stmt::if_then(
            Expr::binary(BinaryOp::Gt, Expr::name("x"), Expr::int(0)),
            Stmt::ret(Expr::boolean(true)),
        ),
    ]);
    let mut counter = Counter::default();
    walk_stmt(&mut counter, &stmt);

    assert_eq!(counter.kinds, vec!["block", "declaration", "if", "return"]);
    // 1, x > 0, x, 0, true
    assert_eq!(counter.exprs, 5);
}

#[test]
fn test_walk_descends_into_lambda_blocks() {
    let lambda = Expr::lambda_block(
        &["e"],
        vec![Stmt::expr(Expr::call(
            Expr::field(Expr::name("System"), "out"),
            "println",
            vec![Expr::name("e")],
        ))],
    );
    let mut counter = Counter::default();
    walk_expr(&mut counter, &lambda);
    assert_eq!(counter.stmts, 1);
    // lambda, call, System.out, System, e
    assert_eq!(counter.exprs, 5);
}

#[test]
fn test_enter_returning_false_skips_children() {
    let outer = Stmt::for_each(
        int(),
        "x",
        Expr::name("xs"),
        vec![
            Stmt::while_loop(Expr::boolean(true), vec![Stmt::break_loop()]),
            Stmt::break_loop(),
        ],
    );
    let mut visitor = TopLevelOnly::default();
    walk_stmt(&mut visitor, &outer);
    assert_eq!(visitor.seen_breaks, 1);
    assert_eq!(visitor.depth, 0);
}

#[test]
fn test_walk_for_loop_parts() {
    let stmt = Stmt::for_loop(
        vec![Stmt::local(int(), "i", Expr::int(0))],
        Some(Expr::binary(BinaryOp::Lt, Expr::name("i"), Expr::name("n"))),
        vec![Expr::post_inc("i")],
        vec![Stmt::expr(Expr::call_fn("work", vec![Expr::name("i")]))],
    );
    let mut counter = Counter::default();
    walk_stmt(&mut counter, &stmt);
    assert_eq!(counter.kinds, vec!["for", "declaration", "block", "expression"]);
}
