//! Converts a handful of loops and prints what became of each
//!
//! Pass a JSON file as the first argument to override the converter
//! configuration. Set `RUST_LOG=debug` to see why loops are left alone.

use anyhow::{Context, Result};
use loopshift_converter::{Conversion, ConverterConfig, LoopConverter};
use loopshift_core::ast::{AssignOp, Expr, Stmt, TypeRef};
use loopshift_core::scope::{Scope, VarInfo};

fn string() -> TypeRef {
    TypeRef::named("String")
}

fn strings() -> TypeRef {
    TypeRef::generic("List", vec![string()])
}

fn println(arg: Expr) -> Stmt {
    Stmt::expr(Expr::call(
        Expr::field(Expr::name("System"), "out"),
        "println",
        vec![arg],
    ))
}

fn call(receiver: &str, method: &str) -> Expr {
    Expr::call(Expr::name(receiver), method, vec![])
}

fn load_config() -> Result<ConverterConfig> {
    match std::env::args().nth(1) {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading config {path}"))?;
            serde_json::from_str(&text).with_context(|| format!("parsing config {path}"))
        }
        None => Ok(ConverterConfig::default()),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let mut scope = Scope::new();
    scope.declare("names", VarInfo::new(strings()))?;
    scope.declare("extra", VarInfo::new(strings()))?;
    scope.declare("total", VarInfo::new(TypeRef::named("int")))?;
    scope.declare(
        "out",
        VarInfo::new(strings())
            .with_init(Expr::new_object(
                TypeRef::generic("ArrayList", vec![]),
                vec![call("names", "size")],
            ))
            .mutated_after(),
    )?;

    let statements = vec![
        Stmt::for_each(
            string(),
            "s",
            Expr::name("names"),
            vec![Stmt::if_then(
                Expr::not(call("s", "isEmpty")),
                Stmt::block(vec![
                    Stmt::local(string(), "t", call("s", "trim")),
                    println(Expr::name("t")),
                ]),
            )],
        ),
        Stmt::for_each(
            string(),
            "s",
            Expr::name("names"),
            vec![Stmt::expr(Expr::compound(
                AssignOp::Add,
                Expr::name("total"),
                call("s", "length"),
            ))],
        ),
        Stmt::for_each(
            string(),
            "s",
            Expr::name("names"),
            vec![
                println(Expr::name("s")),
                Stmt::if_then(call("s", "isEmpty"), Stmt::break_loop()),
            ],
        ),
        Stmt::for_each(
            string(),
            "a",
            Expr::name("names"),
            vec![Stmt::expr(Expr::call(Expr::name("out"), "add", vec![call("a", "trim")]))],
        ),
        Stmt::for_each(
            string(),
            "b",
            Expr::name("extra"),
            vec![Stmt::expr(Expr::call(Expr::name("out"), "add", vec![call("b", "strip")]))],
        ),
        Stmt::expr(Expr::call(Expr::name("Collections"), "sort", vec![Expr::name("out")])),
    ];

    let mut converter = LoopConverter::new(load_config()?);
    for (unit, conversion) in converter.convert_statements(&statements, &scope)? {
        let kind = if unit.is_group() { "group" } else { "loop" };
        match conversion {
            Conversion::Converted(pipeline) => {
                println!("{kind}: {pipeline}");
                if !pipeline.imports.is_empty() {
                    let imports: Vec<&str> = pipeline.imports.iter().map(String::as_str).collect();
                    println!("  imports: {}", imports.join(", "));
                }
                if pipeline.mutability_risk {
                    println!("  warning: collected form may not be mutable");
                }
            }
            Conversion::Unchanged(reason) => println!("{kind}: unchanged ({reason})"),
        }
    }

    println!();
    print!("{}", converter.statistics());
    println!("{}", converter.rewriter_stats());
    Ok(())
}
