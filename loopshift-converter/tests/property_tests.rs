use loopshift_converter::pipeline::Terminal;
use loopshift_converter::{
    Conversion, ConverterConfig, LambdaGenerator, LoopConverter, LoopSite, Pipeline, TargetFormat,
    UnchangedReason,
};
use loopshift_core::ast::{AssignOp, BinaryOp, Expr, Stmt, TypeRef};
use loopshift_core::scope::{Scope, VarInfo};
use proptest::prelude::*;

fn sum_loop(element: &str) -> Stmt {
    Stmt::for_each(
        TypeRef::named(element),
        "v",
        Expr::name("values"),
        vec![Stmt::expr(Expr::compound(
            AssignOp::Add,
            Expr::name("total"),
            Expr::name("v"),
        ))],
    )
}

fn reduce_pipeline(accumulator: &str, element: &str, source: TypeRef) -> Pipeline {
    let mut scope = Scope::new();
    scope.declare("values", VarInfo::new(source)).unwrap();
    scope
        .declare("total", VarInfo::new(TypeRef::named(accumulator)))
        .unwrap();
    let conversion = LoopConverter::default()
        .convert(&LoopSite::new(sum_loop(element), scope))
        .unwrap();
    match conversion {
        Conversion::Converted(pipeline) => pipeline,
        Conversion::Unchanged(reason) => panic!("expected a reduction, left unchanged: {reason}"),
    }
}

fn combiner_for(accumulator: &str, element: &str) -> Expr {
    let pipeline = reduce_pipeline(accumulator, element, TypeRef::named(element).array_of());
    match pipeline.terminal {
        Terminal::Reduce { combiner, .. } => combiner,
        other => panic!("expected a reduction, got {other:?}"),
    }
}

// ===== Naming =====

proptest! {
    #[test]
    fn prop_reused_names_count_up_from_two(base in "[a-z][a-zA-Z]{0,8}", count in 1usize..12) {
        let mut generator = LambdaGenerator::new();
        let names: Vec<String> = (0..count)
            .map(|_| generator.generate_unique_variable_name(&base).unwrap())
            .collect();

        prop_assert_eq!(&names[0], &base);
        for (index, name) in names.iter().enumerate().skip(1) {
            prop_assert_eq!(name, &format!("{}{}", base, index + 1));
        }
    }

    #[test]
    fn prop_reserved_names_are_skipped(base in "[a-z][a-zA-Z]{0,8}", taken in 0usize..6) {
        let mut generator = LambdaGenerator::new();
        generator.reserve(&base);
        for suffix in 2..taken + 2 {
            generator.reserve(&format!("{base}{suffix}"));
        }
        let name = generator.generate_unique_variable_name(&base).unwrap();
        prop_assert_eq!(name, format!("{}{}", base, taken + 2));
    }
}

// ===== Reducer Typing =====

#[test]
fn test_sum_combiner_follows_accumulator_type() {
    assert_eq!(combiner_for("int", "int"), Expr::method_ref("Integer", "sum"));
    assert_eq!(combiner_for("long", "long"), Expr::method_ref("Long", "sum"));
    assert_eq!(combiner_for("double", "double"), Expr::method_ref("Double", "sum"));
}

#[test]
fn test_widened_accumulator_uses_widened_combiner() {
    assert_eq!(combiner_for("long", "int"), Expr::method_ref("Long", "sum"));
    assert_eq!(combiner_for("double", "int"), Expr::method_ref("Double", "sum"));

    let pipeline = reduce_pipeline("long", "int", TypeRef::named("int").array_of());
    assert_eq!(
        pipeline.to_string(),
        "total = Arrays.stream(values).map(v -> (long) v).reduce(total, Long::sum);"
    );
}

#[test]
fn test_narrow_accumulator_gets_cast_lambda() {
    let source = TypeRef::generic("List", vec![TypeRef::named("Short")]);
    let pipeline = reduce_pipeline("short", "Short", source);
    assert!(pipeline.stages.is_empty());
    match pipeline.terminal {
        Terminal::Reduce { combiner, .. } => {
            assert_eq!(combiner.to_string(), "(a, b) -> (short) (a + b)")
        }
        other => panic!("expected a reduction, got {other:?}"),
    }
}

#[test]
fn test_guarded_floating_point_max_keeps_its_comparison() {
    let mut scope = Scope::new();
    scope
        .declare("values", VarInfo::new(TypeRef::named("double").array_of()))
        .unwrap();
    scope.declare("best", VarInfo::new(TypeRef::named("double"))).unwrap();
    let stmt = Stmt::for_each(
        TypeRef::named("double"),
        "v",
        Expr::name("values"),
        vec![Stmt::if_then(
            Expr::binary(BinaryOp::Gt, Expr::name("v"), Expr::name("best")),
            Stmt::expr(Expr::assign(Expr::name("best"), Expr::name("v"))),
        )],
    );

    let conversion = LoopConverter::default()
        .convert(&LoopSite::new(stmt, scope))
        .unwrap();
    assert_eq!(
        conversion.pipeline().map(ToString::to_string).as_deref(),
        Some("best = Arrays.stream(values).reduce(best, (a, b) -> b > a ? b : a);")
    );
}

// ===== Idempotence =====

#[test]
fn test_pipeline_output_is_not_reshaped() {
    let mut scope = Scope::new();
    scope
        .declare("names", VarInfo::new(TypeRef::generic("List", vec![TypeRef::named("String")])))
        .unwrap();
    let already_functional = Stmt::expr(Expr::call(
        Expr::name("names"),
        "forEach",
        vec![Expr::lambda(
            &["s"],
            Expr::call(
                Expr::field(Expr::name("System"), "out"),
                "println",
                vec![Expr::name("s")],
            ),
        )],
    ));

    let mut converter = LoopConverter::default();
    let results = converter
        .convert_statements(&[already_functional.clone()], &scope)
        .unwrap();
    assert!(results.is_empty());

    let direct = converter
        .convert(&LoopSite::new(already_functional, scope))
        .unwrap();
    assert_eq!(direct, Conversion::Unchanged(UnchangedReason::NotALoop));
}

#[test]
fn test_repeated_conversion_is_stable() {
    let mut scope = Scope::new();
    scope
        .declare("values", VarInfo::new(TypeRef::named("int").array_of()))
        .unwrap();
    scope.declare("total", VarInfo::new(TypeRef::named("int"))).unwrap();
    let site = LoopSite::new(sum_loop("int"), scope);

    let mut converter = LoopConverter::default();
    let first = converter.convert(&site).unwrap();
    let second = converter.convert(&site).unwrap();
    assert_eq!(first, second);
    assert_eq!(converter.statistics().converted, 2);
}

// ===== Configuration =====

#[test]
fn test_config_round_trips_through_json() {
    let config = ConverterConfig {
        target_format: TargetFormat::WhileLoop,
        guarantee_mutable_collect: false,
        eliminate_indices: true,
        merge_sibling_loops: false,
    };
    let json = serde_json::to_string(&config).unwrap();
    assert!(json.contains("\"while_loop\""));
    let loaded: ConverterConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_empty_config_is_default() {
    let loaded: ConverterConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(loaded, ConverterConfig::default());
}
