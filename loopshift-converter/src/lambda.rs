//! Combiner and name synthesis for one pipeline
//!
//! A [`LambdaGenerator`] is created fresh for every conversion attempt and
//! dropped with it. It tracks every name the pipeline may see so that no
//! synthesized stage variable shadows another.

use crate::reducer::ReducerType;
use loopshift_core::ast::{AstHashSet, BinaryOp, Expr, TypeRef};
use loopshift_core::error::{ensure_identifier, Result};

#[derive(Debug, Clone, Default)]
pub struct LambdaGenerator {
    used: AstHashSet<String>,
}

impl LambdaGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a name as taken without generating it
    pub fn reserve(&mut self, name: &str) {
        self.used.insert(name.to_string());
    }

    pub fn is_used(&self, name: &str) -> bool {
        self.used.contains(name)
    }

    /// Returns `base` if unused, otherwise `base` followed by the smallest
    /// integer from 2 up that gives an unused name
    pub fn generate_unique_variable_name(&mut self, base: &str) -> Result<String> {
        ensure_identifier("base name", base)?;
        let name = if self.used.contains(base) {
            (2..)
                .map(|n| format!("{base}{n}"))
                .find(|candidate| !self.used.contains(candidate))
                .unwrap_or_else(|| base.to_string())
        } else {
            base.to_string()
        };
        self.used.insert(name.clone());
        Ok(name)
    }

    /// The literal one of the accumulator's type, mapped onto each element
    /// before a counting reduction
    pub fn literal_one(ty: &TypeRef) -> Option<Expr> {
        let one = match ty.primitive_name()? {
            "int" => Expr::int(1),
            "long" => Expr::long(1),
            "double" => Expr::double(1.0),
            "float" => Expr::float(1.0),
            narrow @ ("short" | "byte" | "char") => Expr::cast(TypeRef::named(narrow), Expr::int(1)),
            _ => return None,
        };
        Some(one)
    }

    /// Builds the combining callable for a reduction over `ty`
    ///
    /// A named method reference is used only where one exists for the exact
    /// primitive type; everything else gets a two-parameter lambda. Returns
    /// `None` for custom aggregates and types the kind cannot combine.
    pub fn combiner(&mut self, kind: ReducerType, ty: &TypeRef, null_safe: bool) -> Result<Option<Expr>> {
        let primitive = match ty.primitive_name() {
            Some(p) if p != "boolean" => p,
            _ => {
                if kind == ReducerType::StringConcat && ty.is_string() {
                    return self.string_concat(null_safe).map(Some);
                }
                return Ok(None);
            }
        };
        let narrow = matches!(primitive, "short" | "byte" | "char");

        let combiner = match kind {
            ReducerType::Increment | ReducerType::Decrement => match primitive {
                "int" | "long" if kind == ReducerType::Increment => {
                    Some(Expr::method_ref(ty_wrapper(primitive), "sum"))
                }
                _ => {
                    let op = if kind == ReducerType::Increment {
                        BinaryOp::Add
                    } else {
                        BinaryOp::Sub
                    };
                    Some(self.counting_lambda(op, primitive, narrow)?)
                }
            },
            ReducerType::Sum => match primitive {
                "int" | "long" | "double" => Some(Expr::method_ref(ty_wrapper(primitive), "sum")),
                _ => Some(self.binary_lambda(BinaryOp::Add, primitive, narrow)?),
            },
            ReducerType::Product => Some(self.binary_lambda(BinaryOp::Mul, primitive, narrow)?),
            ReducerType::Max | ReducerType::Min => {
                let method = if kind == ReducerType::Max { "max" } else { "min" };
                match primitive {
                    "int" | "long" | "double" | "float" => {
                        Some(Expr::method_ref(ty_wrapper(primitive), method))
                    }
                    _ => Some(self.select_lambda(kind == ReducerType::Max)?),
                }
            }
            ReducerType::StringConcat | ReducerType::CustomAggregate => None,
        };
        Ok(combiner)
    }

    /// Builds the combiner for a reduction that may come from a guarded
    /// `if (value <op> acc) acc = value;`
    ///
    /// A floating-point guard is repeated as written: `Math.max` propagates
    /// NaN and ranks `-0.0` below `0.0`, where the comparison does neither.
    pub fn guarded_combiner(
        &mut self,
        kind: ReducerType,
        ty: &TypeRef,
        guard: Option<BinaryOp>,
        null_safe: bool,
    ) -> Result<Option<Expr>> {
        let floating = matches!(ty.primitive_name(), Some("double" | "float"));
        match guard {
            Some(op) if floating && matches!(kind, ReducerType::Max | ReducerType::Min) => {
                let (acc, value) = self.pair("a", "b")?;
                Ok(Some(Expr::lambda(
                    &[acc.as_str(), value.as_str()],
                    Expr::conditional(
                        Expr::binary(op, Expr::name(&value), Expr::name(&acc)),
                        Expr::name(&value),
                        Expr::name(&acc),
                    ),
                )))
            }
            _ => self.combiner(kind, ty, null_safe),
        }
    }

    fn string_concat(&mut self, null_safe: bool) -> Result<Expr> {
        if null_safe {
            return Ok(Expr::method_ref("String", "concat"));
        }
        let (a, b) = self.pair("a", "b")?;
        Ok(Expr::lambda(
            &[a.as_str(), b.as_str()],
            Expr::binary(BinaryOp::Add, Expr::name(&a), Expr::name(&b)),
        ))
    }

    /// `(accumulator, _item) -> accumulator + 1`
    fn counting_lambda(&mut self, op: BinaryOp, primitive: &str, narrow: bool) -> Result<Expr> {
        let (acc, item) = self.pair("accumulator", "_item")?;
        let one = if primitive == "int" || narrow {
            Expr::int(1)
        } else {
            LambdaGenerator::literal_one(&TypeRef::named(primitive)).unwrap_or_else(|| Expr::int(1))
        };
        let body = Expr::binary(op, Expr::name(&acc), one);
        Ok(Expr::lambda(&[acc.as_str(), item.as_str()], narrowed(body, primitive, narrow)))
    }

    /// `(a, b) -> a <op> b`
    fn binary_lambda(&mut self, op: BinaryOp, primitive: &str, narrow: bool) -> Result<Expr> {
        let (a, b) = self.pair("a", "b")?;
        let body = Expr::binary(op, Expr::name(&a), Expr::name(&b));
        Ok(Expr::lambda(&[a.as_str(), b.as_str()], narrowed(body, primitive, narrow)))
    }

    /// `(a, b) -> a >= b ? a : b` and its minimum twin
    fn select_lambda(&mut self, max: bool) -> Result<Expr> {
        let (a, b) = self.pair("a", "b")?;
        let op = if max { BinaryOp::Ge } else { BinaryOp::Le };
        Ok(Expr::lambda(
            &[a.as_str(), b.as_str()],
            Expr::conditional(
                Expr::binary(op, Expr::name(&a), Expr::name(&b)),
                Expr::name(&a),
                Expr::name(&b),
            ),
        ))
    }

    fn pair(&mut self, first: &str, second: &str) -> Result<(String, String)> {
        Ok((
            self.generate_unique_variable_name(first)?,
            self.generate_unique_variable_name(second)?,
        ))
    }
}

fn ty_wrapper(primitive: &str) -> &'static str {
    TypeRef::named(primitive).wrapper_name().unwrap_or("Object")
}

/// Arithmetic on short, byte and char widens to int; cast the result back
fn narrowed(body: Expr, primitive: &str, narrow: bool) -> Expr {
    if narrow {
        Expr::cast(TypeRef::named(primitive), Expr::paren(body))
    } else {
        body
    }
}

#[cfg(test)]
#[path = "lambda_tests.rs"]
mod tests;
