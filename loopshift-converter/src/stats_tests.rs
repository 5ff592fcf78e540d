use crate::converter::{Conversion, UnchangedReason};
use crate::pipeline::{Pipeline, ResultUse, StreamSource, Terminal};
use crate::preconditions::IneligibleReason;
use crate::site::{ConversionUnit, LoopGroup, LoopSite};
use crate::stats::*;
use loopshift_core::ast::{Expr, Stmt, TypeRef};
use loopshift_core::scope::Scope;
use std::collections::BTreeSet;

fn site() -> ConversionUnit {
    let stmt = Stmt::for_each(TypeRef::named("String"), "s", Expr::name("names"), vec![]);
    LoopSite::new(stmt, Scope::new()).into()
}

fn group() -> ConversionUnit {
    let stmt = Stmt::for_each(TypeRef::named("String"), "s", Expr::name("names"), vec![]);
    ConversionUnit::Group(LoopGroup::new("out", vec![stmt.clone(), stmt], Scope::new()).unwrap())
}

fn converted(risk: bool) -> Conversion {
    Conversion::Converted(Pipeline {
        source: StreamSource::Collection(Expr::name("names")),
        stages: Vec::new(),
        terminal: Terminal::ForEach {
            direct: true,
            ordered: false,
            param: "s".to_string(),
            body: Vec::new(),
        },
        result: ResultUse::Discard,
        imports: BTreeSet::new(),
        mutability_risk: risk,
    })
}

#[test]
fn test_new_stats_are_empty() {
    let stats = ConversionStats::new();
    assert_eq!(stats.units, 0);
    assert_eq!(stats.conversion_rate(), 0.0);
}

#[test]
fn test_record_sorts_outcomes() {
    let mut stats = ConversionStats::new();
    stats.record(&site(), &converted(false));
    stats.record(&group(), &converted(true));
    stats.record(&site(), &UnchangedReason::Ineligible(IneligibleReason::Break).into());
    stats.record(&site(), &UnchangedReason::Aborted("unsafe write".to_string()).into());
    stats.record(&site(), &UnchangedReason::NoTerminal.into());
    stats.record(&site(), &UnchangedReason::UnsupportedDestination.into());
    stats.record(&site(), &UnchangedReason::NotALoop.into());
    stats.record(&site(), &UnchangedReason::NotYetSupported.into());

    assert_eq!(stats.units, 8);
    assert_eq!(stats.converted, 2);
    assert_eq!(stats.merged_groups, 1);
    assert_eq!(stats.mutability_risks, 1);
    assert_eq!(stats.ineligible, 1);
    assert_eq!(stats.aborted, 1);
    assert_eq!(stats.unbuildable, 2);
    assert_eq!(stats.not_a_loop, 1);
    assert_eq!(stats.not_yet_supported, 1);
    assert_eq!(stats.unchanged(), 6);
    assert_eq!(stats.conversion_rate(), 25.0);
}

#[test]
fn test_merge_adds_counts() {
    let mut first = ConversionStats::new();
    first.record(&site(), &converted(false));
    let mut second = ConversionStats::new();
    second.record(&site(), &UnchangedReason::NoTerminal.into());

    first.merge(&second);
    assert_eq!(first.units, 2);
    assert_eq!(first.converted, 1);
    assert_eq!(first.unbuildable, 1);
}

#[test]
fn test_display_summary() {
    let mut stats = ConversionStats::new();
    stats.record(&site(), &converted(false));
    stats.record(&site(), &UnchangedReason::Ineligible(IneligibleReason::Throw).into());

    let text = stats.to_string();
    assert!(text.starts_with("Conversion Statistics:"));
    assert!(text.contains("Units: 2 (1 converted, 50.0%)"));
    assert!(text.contains("Ineligible: 1"));
}
