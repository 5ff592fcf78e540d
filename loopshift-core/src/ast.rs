//! Syntax tree of the host language
//!
//! The conversion engine never parses text. Hosts hand it an already parsed
//! loop in this representation and receive pipeline descriptions built from
//! the same expression nodes.

use crate::visitor::{walk_expr, walk_stmt, Visitor};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Type alias for the HashMap implementation used in the syntax tree
pub type AstHashMap<K, V> = FxHashMap<K, V>;

/// Type alias for the HashSet implementation used in the syntax tree
pub type AstHashSet<T> = FxHashSet<T>;

const PRIMITIVES: [&str; 8] = [
    "int", "long", "double", "float", "short", "byte", "char", "boolean",
];

const WRAPPERS: [(&str, &str); 8] = [
    ("int", "Integer"),
    ("long", "Long"),
    ("double", "Double"),
    ("float", "Float"),
    ("short", "Short"),
    ("byte", "Byte"),
    ("char", "Character"),
    ("boolean", "Boolean"),
];

/// A reference to a declared type: `Map<String, List<Integer>>[]`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeRef {
    pub name: String,
    #[serde(default)]
    pub args: Vec<TypeRef>,
    #[serde(default)]
    pub dims: u8,
}

impl TypeRef {
    /// Creates a plain type reference such as `int` or `String`
    pub fn named(name: &str) -> Self {
        TypeRef {
            name: name.to_string(),
            args: Vec::new(),
            dims: 0,
        }
    }

    /// Creates a parameterized type reference such as `List<String>`
    pub fn generic(name: &str, args: Vec<TypeRef>) -> Self {
        TypeRef {
            name: name.to_string(),
            args,
            dims: 0,
        }
    }

    /// Returns this type with one more array dimension
    pub fn array_of(mut self) -> Self {
        self.dims += 1;
        self
    }

    /// Returns the element type of an array type
    pub fn component(&self) -> Option<TypeRef> {
        if self.dims == 0 {
            return None;
        }
        let mut component = self.clone();
        component.dims -= 1;
        Some(component)
    }

    /// Last segment of a possibly qualified name: `java.util.List` -> `List`
    pub fn simple_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    pub fn is_array(&self) -> bool {
        self.dims > 0
    }

    pub fn is_primitive(&self) -> bool {
        self.dims == 0 && PRIMITIVES.contains(&self.name.as_str())
    }

    /// Primitive numeric types and their wrappers (`boolean` excluded)
    pub fn is_numeric(&self) -> bool {
        match self.primitive_name() {
            Some(p) => p != "boolean",
            None => false,
        }
    }

    pub fn is_string(&self) -> bool {
        self.dims == 0 && self.simple_name() == "String"
    }

    pub fn is_iterator(&self) -> bool {
        self.dims == 0 && matches!(self.simple_name(), "Iterator" | "ListIterator")
    }

    pub fn is_list_like(&self) -> bool {
        self.dims == 0
            && matches!(
                self.simple_name(),
                "List" | "ArrayList" | "LinkedList" | "Collection" | "CopyOnWriteArrayList"
            )
    }

    pub fn is_set_like(&self) -> bool {
        self.dims == 0
            && matches!(
                self.simple_name(),
                "Set" | "HashSet" | "LinkedHashSet" | "TreeSet" | "SortedSet"
            )
    }

    /// The primitive this type is or boxes: `Integer` -> `int`
    pub fn primitive_name(&self) -> Option<&'static str> {
        if self.dims != 0 {
            return None;
        }
        let simple = self.simple_name();
        WRAPPERS
            .iter()
            .find(|(prim, boxed)| *prim == simple || *boxed == simple)
            .map(|(prim, _)| *prim)
    }

    /// The wrapper class of a primitive or boxed type: `int` -> `Integer`
    pub fn wrapper_name(&self) -> Option<&'static str> {
        let prim = self.primitive_name()?;
        WRAPPERS
            .iter()
            .find(|(p, _)| *p == prim)
            .map(|(_, boxed)| *boxed)
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.args.is_empty() {
            write!(f, "<")?;
            for (i, arg) in self.args.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{arg}")?;
            }
            write!(f, ">")?;
        }
        for _ in 0..self.dims {
            write!(f, "[]")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Int(i64),
    Long(i64),
    Float(f64),
    Double(f64),
    Char(char),
    String(String),
    Boolean(bool),
    Null,
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(i) => write!(f, "{i}"),
            Literal::Long(i) => write!(f, "{i}L"),
            Literal::Float(fl) => write!(f, "{fl:?}f"),
            Literal::Double(d) => write!(f, "{d:?}"),
            Literal::Char(c) => write!(f, "'{c}'"),
            Literal::String(s) => write!(f, "\"{s}\""),
            Literal::Boolean(b) => write!(f, "{b}"),
            Literal::Null => write!(f, "null"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
        }
    }

    pub fn is_ordering(self) -> bool {
        matches!(self, BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge)
    }

    /// The comparison with operands swapped: `a < b` is `b > a`
    pub fn mirrored(self) -> BinaryOp {
        match self {
            BinaryOp::Lt => BinaryOp::Gt,
            BinaryOp::Le => BinaryOp::Ge,
            BinaryOp::Gt => BinaryOp::Lt,
            BinaryOp::Ge => BinaryOp::Le,
            other => other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Neg,
    PreInc,
    PreDec,
    PostInc,
    PostDec,
}

impl UnaryOp {
    /// Increment and decrement forms, which write their operand
    pub fn is_update(self) -> bool {
        matches!(
            self,
            UnaryOp::PreInc | UnaryOp::PreDec | UnaryOp::PostInc | UnaryOp::PostDec
        )
    }

    pub fn is_increment(self) -> bool {
        matches!(self, UnaryOp::PreInc | UnaryOp::PostInc)
    }

    pub fn is_decrement(self) -> bool {
        matches!(self, UnaryOp::PreDec | UnaryOp::PostDec)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl AssignOp {
    pub fn symbol(self) -> &'static str {
        match self {
            AssignOp::Assign => "=",
            AssignOp::Add => "+=",
            AssignOp::Sub => "-=",
            AssignOp::Mul => "*=",
            AssignOp::Div => "/=",
            AssignOp::Rem => "%=",
        }
    }

    /// The binary operator a compound assignment applies, `None` for `=`
    pub fn binary(self) -> Option<BinaryOp> {
        match self {
            AssignOp::Assign => None,
            AssignOp::Add => Some(BinaryOp::Add),
            AssignOp::Sub => Some(BinaryOp::Sub),
            AssignOp::Mul => Some(BinaryOp::Mul),
            AssignOp::Div => Some(BinaryOp::Div),
            AssignOp::Rem => Some(BinaryOp::Rem),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LambdaBody {
    Expr(Box<Expr>),
    Block(Vec<Stmt>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Literal(Literal),
    Name(String),
    FieldAccess {
        target: Box<Expr>,
        field: String,
    },
    MethodCall {
        receiver: Option<Box<Expr>>,
        name: String,
        args: Vec<Expr>,
    },
    New {
        ty: TypeRef,
        args: Vec<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Assign {
        op: AssignOp,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Conditional {
        condition: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
    Cast {
        ty: TypeRef,
        expr: Box<Expr>,
    },
    Paren(Box<Expr>),
    ArrayAccess {
        array: Box<Expr>,
        index: Box<Expr>,
    },
    Lambda {
        params: Vec<String>,
        body: LambdaBody,
    },
    /// `Owner::method`
    MethodRef {
        target: Box<Expr>,
        method: String,
    },
}

impl Expr {
    pub fn name(name: &str) -> Self {
        Expr::Name(name.to_string())
    }

    pub fn int(value: i64) -> Self {
        Expr::Literal(Literal::Int(value))
    }

    pub fn long(value: i64) -> Self {
        Expr::Literal(Literal::Long(value))
    }

    pub fn double(value: f64) -> Self {
        Expr::Literal(Literal::Double(value))
    }

    pub fn float(value: f64) -> Self {
        Expr::Literal(Literal::Float(value))
    }

    pub fn string(value: &str) -> Self {
        Expr::Literal(Literal::String(value.to_string()))
    }

    pub fn boolean(value: bool) -> Self {
        Expr::Literal(Literal::Boolean(value))
    }

    pub fn null() -> Self {
        Expr::Literal(Literal::Null)
    }

    /// Creates `receiver.name(args)`
    pub fn call(receiver: Expr, name: &str, args: Vec<Expr>) -> Self {
        Expr::MethodCall {
            receiver: Some(Box::new(receiver)),
            name: name.to_string(),
            args,
        }
    }

    /// Creates an unqualified call `name(args)`
    pub fn call_fn(name: &str, args: Vec<Expr>) -> Self {
        Expr::MethodCall {
            receiver: None,
            name: name.to_string(),
            args,
        }
    }

    pub fn field(target: Expr, field: &str) -> Self {
        Expr::FieldAccess {
            target: Box::new(target),
            field: field.to_string(),
        }
    }

    pub fn new_object(ty: TypeRef, args: Vec<Expr>) -> Self {
        Expr::New { ty, args }
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn not(operand: Expr) -> Self {
        Expr::unary(UnaryOp::Not, operand)
    }

    pub fn assign(target: Expr, value: Expr) -> Self {
        Expr::compound(AssignOp::Assign, target, value)
    }

    pub fn compound(op: AssignOp, target: Expr, value: Expr) -> Self {
        Expr::Assign {
            op,
            target: Box::new(target),
            value: Box::new(value),
        }
    }

    pub fn post_inc(name: &str) -> Self {
        Expr::unary(UnaryOp::PostInc, Expr::name(name))
    }

    pub fn pre_inc(name: &str) -> Self {
        Expr::unary(UnaryOp::PreInc, Expr::name(name))
    }

    pub fn post_dec(name: &str) -> Self {
        Expr::unary(UnaryOp::PostDec, Expr::name(name))
    }

    pub fn conditional(condition: Expr, then_expr: Expr, else_expr: Expr) -> Self {
        Expr::Conditional {
            condition: Box::new(condition),
            then_expr: Box::new(then_expr),
            else_expr: Box::new(else_expr),
        }
    }

    pub fn cast(ty: TypeRef, expr: Expr) -> Self {
        Expr::Cast {
            ty,
            expr: Box::new(expr),
        }
    }

    pub fn paren(expr: Expr) -> Self {
        Expr::Paren(Box::new(expr))
    }

    pub fn array_access(array: Expr, index: Expr) -> Self {
        Expr::ArrayAccess {
            array: Box::new(array),
            index: Box::new(index),
        }
    }

    /// Creates an expression lambda `(params) -> body`
    pub fn lambda(params: &[&str], body: Expr) -> Self {
        Expr::Lambda {
            params: params.iter().map(|p| p.to_string()).collect(),
            body: LambdaBody::Expr(Box::new(body)),
        }
    }

    /// Creates a block lambda `(params) -> { body }`
    pub fn lambda_block(params: &[&str], body: Vec<Stmt>) -> Self {
        Expr::Lambda {
            params: params.iter().map(|p| p.to_string()).collect(),
            body: LambdaBody::Block(body),
        }
    }

    /// Creates `Owner::method`
    pub fn method_ref(owner: &str, method: &str) -> Self {
        Expr::MethodRef {
            target: Box::new(Expr::name(owner)),
            method: method.to_string(),
        }
    }

    /// Strips any number of enclosing parentheses
    pub fn unparenthesized(&self) -> &Expr {
        let mut expr = self;
        while let Expr::Paren(inner) = expr {
            expr = inner;
        }
        expr
    }

    /// The identifier this expression is, ignoring parentheses
    pub fn as_name(&self) -> Option<&str> {
        match self.unparenthesized() {
            Expr::Name(n) => Some(n.as_str()),
            _ => None,
        }
    }

    /// Whether this expression is nothing but the variable `name`
    pub fn is_name(&self, name: &str) -> bool {
        self.as_name() == Some(name)
    }

    /// The value of a boolean literal, ignoring parentheses
    pub fn as_bool(&self) -> Option<bool> {
        match self.unparenthesized() {
            Expr::Literal(Literal::Boolean(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self.unparenthesized(), Expr::Literal(_))
    }

    /// Whether this is the literal `1` of any numeric flavour
    pub fn is_literal_one(&self) -> bool {
        match self.unparenthesized() {
            Expr::Literal(Literal::Int(1)) | Expr::Literal(Literal::Long(1)) => true,
            Expr::Literal(Literal::Double(d)) | Expr::Literal(Literal::Float(d)) => *d == 1.0,
            Expr::Cast { expr, .. } => expr.is_literal_one(),
            _ => false,
        }
    }

    /// `receiver.method(args)` split into its parts, ignoring parentheses
    pub fn as_method_call(&self) -> Option<(Option<&Expr>, &str, &[Expr])> {
        match self.unparenthesized() {
            Expr::MethodCall {
                receiver,
                name,
                args,
            } => Some((receiver.as_deref(), name.as_str(), args.as_slice())),
            _ => None,
        }
    }

    /// Whether this is a call of `method` on the variable `receiver`
    pub fn is_call_on(&self, receiver: &str, method: &str) -> bool {
        match self.as_method_call() {
            Some((Some(recv), name, _)) => name == method && recv.is_name(receiver),
            _ => false,
        }
    }

    /// The operand of a logical negation, with parentheses removed
    pub fn strip_negation(&self) -> Option<&Expr> {
        match self.unparenthesized() {
            Expr::Unary {
                op: UnaryOp::Not,
                operand,
            } => Some(operand.unparenthesized()),
            _ => None,
        }
    }

    /// Logical negation that cancels an existing `!` instead of stacking one
    pub fn negated(&self) -> Expr {
        if let Some(inner) = self.strip_negation() {
            return inner.clone();
        }
        match self {
            Expr::Binary { .. }
            | Expr::Conditional { .. }
            | Expr::Assign { .. }
            | Expr::Cast { .. }
            | Expr::Lambda { .. } => Expr::not(Expr::paren(self.clone())),
            _ => Expr::not(self.clone()),
        }
    }

    /// Variables read or written by this expression, lambda parameters excluded
    pub fn free_names(&self) -> AstHashSet<String> {
        let mut collector = NameCollector::default();
        walk_expr(&mut collector, self);
        collector.names
    }

    pub fn mentions(&self, name: &str) -> bool {
        self.free_names().contains(name)
    }

    /// Variables written by an assignment or increment inside this expression
    pub fn assigned_names(&self) -> AstHashSet<String> {
        let mut collector = AssignmentCollector::default();
        walk_expr(&mut collector, self);
        collector.names
    }

    /// Whether evaluating this expression writes any variable or element
    pub fn contains_update(&self) -> bool {
        let mut collector = AssignmentCollector::default();
        walk_expr(&mut collector, self);
        collector.any_update
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(lit) => write!(f, "{lit}"),
            Expr::Name(n) => write!(f, "{n}"),
            Expr::FieldAccess { target, field } => write!(f, "{target}.{field}"),
            Expr::MethodCall {
                receiver,
                name,
                args,
            } => {
                if let Some(recv) = receiver {
                    write!(f, "{recv}.")?;
                }
                write!(f, "{name}(")?;
                fmt_comma_separated(f, args)?;
                write!(f, ")")
            }
            Expr::New { ty, args } => {
                write!(f, "new {ty}(")?;
                fmt_comma_separated(f, args)?;
                write!(f, ")")
            }
            Expr::Binary { op, lhs, rhs } => write!(f, "{lhs} {} {rhs}", op.symbol()),
            Expr::Unary { op, operand } => match op {
                UnaryOp::Not => write!(f, "!{operand}"),
                UnaryOp::Neg => write!(f, "-{operand}"),
                UnaryOp::PreInc => write!(f, "++{operand}"),
                UnaryOp::PreDec => write!(f, "--{operand}"),
                UnaryOp::PostInc => write!(f, "{operand}++"),
                UnaryOp::PostDec => write!(f, "{operand}--"),
            },
            Expr::Assign { op, target, value } => {
                write!(f, "{target} {} {value}", op.symbol())
            }
            Expr::Conditional {
                condition,
                then_expr,
                else_expr,
            } => write!(f, "{condition} ? {then_expr} : {else_expr}"),
            Expr::Cast { ty, expr } => write!(f, "({ty}) {expr}"),
            Expr::Paren(inner) => write!(f, "({inner})"),
            Expr::ArrayAccess { array, index } => write!(f, "{array}[{index}]"),
            Expr::Lambda { params, body } => {
                if params.len() == 1 {
                    write!(f, "{}", params[0])?;
                } else {
                    write!(f, "({})", params.join(", "))?;
                }
                match body {
                    LambdaBody::Expr(e) => write!(f, " -> {e}"),
                    LambdaBody::Block(stmts) => {
                        write!(f, " -> {{")?;
                        for s in stmts {
                            write!(f, " {s}")?;
                        }
                        write!(f, " }}")
                    }
                }
            }
            Expr::MethodRef { target, method } => write!(f, "{target}::{method}"),
        }
    }
}

fn fmt_comma_separated(f: &mut fmt::Formatter<'_>, exprs: &[Expr]) -> fmt::Result {
    for (i, e) in exprs.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{e}")?;
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    Expr(Expr),
    Local {
        ty: TypeRef,
        name: String,
        init: Option<Expr>,
        /// Declared with a non-null annotation
        #[serde(default)]
        non_null: bool,
    },
    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    Block(Vec<Stmt>),
    Return(Option<Expr>),
    Break(Option<String>),
    Continue(Option<String>),
    Throw(Expr),
    ForEach {
        ty: TypeRef,
        var: String,
        iterable: Expr,
        body: Box<Stmt>,
    },
    For {
        init: Vec<Stmt>,
        condition: Option<Expr>,
        update: Vec<Expr>,
        body: Box<Stmt>,
    },
    While {
        condition: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        body: Box<Stmt>,
        condition: Expr,
    },
    Labeled {
        label: String,
        body: Box<Stmt>,
    },
    Empty,
}

impl Stmt {
    pub fn expr(expr: Expr) -> Self {
        Stmt::Expr(expr)
    }

    /// Creates `ty name = init;`
    pub fn local(ty: TypeRef, name: &str, init: Expr) -> Self {
        Stmt::Local {
            ty,
            name: name.to_string(),
            init: Some(init),
            non_null: false,
        }
    }

    /// Creates `ty name;`
    pub fn declare(ty: TypeRef, name: &str) -> Self {
        Stmt::Local {
            ty,
            name: name.to_string(),
            init: None,
            non_null: false,
        }
    }

    pub fn if_then(condition: Expr, then_branch: Stmt) -> Self {
        Stmt::If {
            condition,
            then_branch: Box::new(then_branch),
            else_branch: None,
        }
    }

    pub fn if_else(condition: Expr, then_branch: Stmt, else_branch: Stmt) -> Self {
        Stmt::If {
            condition,
            then_branch: Box::new(then_branch),
            else_branch: Some(Box::new(else_branch)),
        }
    }

    pub fn block(stmts: Vec<Stmt>) -> Self {
        Stmt::Block(stmts)
    }

    pub fn ret(value: Expr) -> Self {
        Stmt::Return(Some(value))
    }

    pub fn ret_void() -> Self {
        Stmt::Return(None)
    }

    pub fn break_loop() -> Self {
        Stmt::Break(None)
    }

    pub fn break_to(label: &str) -> Self {
        Stmt::Break(Some(label.to_string()))
    }

    pub fn continue_loop() -> Self {
        Stmt::Continue(None)
    }

    pub fn continue_to(label: &str) -> Self {
        Stmt::Continue(Some(label.to_string()))
    }

    pub fn throw(value: Expr) -> Self {
        Stmt::Throw(value)
    }

    /// Creates `for (ty var : iterable) { body }`
    pub fn for_each(ty: TypeRef, var: &str, iterable: Expr, body: Vec<Stmt>) -> Self {
        Stmt::ForEach {
            ty,
            var: var.to_string(),
            iterable,
            body: Box::new(Stmt::Block(body)),
        }
    }

    pub fn for_loop(
        init: Vec<Stmt>,
        condition: Option<Expr>,
        update: Vec<Expr>,
        body: Vec<Stmt>,
    ) -> Self {
        Stmt::For {
            init,
            condition,
            update,
            body: Box::new(Stmt::Block(body)),
        }
    }

    pub fn while_loop(condition: Expr, body: Vec<Stmt>) -> Self {
        Stmt::While {
            condition,
            body: Box::new(Stmt::Block(body)),
        }
    }

    pub fn do_while(body: Vec<Stmt>, condition: Expr) -> Self {
        Stmt::DoWhile {
            body: Box::new(Stmt::Block(body)),
            condition,
        }
    }

    pub fn labeled(label: &str, body: Stmt) -> Self {
        Stmt::Labeled {
            label: label.to_string(),
            body: Box::new(body),
        }
    }

    /// The statements of a block, or this statement alone
    pub fn as_statements(&self) -> &[Stmt] {
        match self {
            Stmt::Block(stmts) => stmts,
            other => std::slice::from_ref(other),
        }
    }

    /// Unwraps blocks that hold exactly one statement
    pub fn single(&self) -> &Stmt {
        let mut stmt = self;
        while let Stmt::Block(stmts) = stmt {
            if stmts.len() != 1 {
                break;
            }
            stmt = &stmts[0];
        }
        stmt
    }

    pub fn is_loop(&self) -> bool {
        matches!(
            self,
            Stmt::ForEach { .. } | Stmt::For { .. } | Stmt::While { .. } | Stmt::DoWhile { .. }
        )
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Stmt::Expr(_) => "expression",
            Stmt::Local { .. } => "declaration",
            Stmt::If { .. } => "if",
            Stmt::Block(_) => "block",
            Stmt::Return(_) => "return",
            Stmt::Break(_) => "break",
            Stmt::Continue(_) => "continue",
            Stmt::Throw(_) => "throw",
            Stmt::ForEach { .. } => "for-each",
            Stmt::For { .. } => "for",
            Stmt::While { .. } => "while",
            Stmt::DoWhile { .. } => "do-while",
            Stmt::Labeled { .. } => "labeled",
            Stmt::Empty => "empty",
        }
    }

    /// Variables read or written anywhere in this statement
    pub fn free_names(&self) -> AstHashSet<String> {
        let mut collector = NameCollector::default();
        walk_stmt(&mut collector, self);
        collector.names
    }

    pub fn mentions(&self, name: &str) -> bool {
        self.free_names().contains(name)
    }

    /// Variables written by assignments or increments in this statement
    pub fn assigned_names(&self) -> AstHashSet<String> {
        let mut collector = AssignmentCollector::default();
        walk_stmt(&mut collector, self);
        collector.names
    }

    /// Names introduced by local declarations anywhere in this statement
    pub fn declared_names(&self) -> AstHashSet<String> {
        let mut collector = DeclarationCollector::default();
        walk_stmt(&mut collector, self);
        collector.names
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stmt::Expr(e) => write!(f, "{e};"),
            Stmt::Local { ty, name, init, .. } => match init {
                Some(init) => write!(f, "{ty} {name} = {init};"),
                None => write!(f, "{ty} {name};"),
            },
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                write!(f, "if ({condition}) {then_branch}")?;
                if let Some(else_branch) = else_branch {
                    write!(f, " else {else_branch}")?;
                }
                Ok(())
            }
            Stmt::Block(stmts) => {
                write!(f, "{{")?;
                for s in stmts {
                    write!(f, " {s}")?;
                }
                write!(f, " }}")
            }
            Stmt::Return(Some(e)) => write!(f, "return {e};"),
            Stmt::Return(None) => write!(f, "return;"),
            Stmt::Break(Some(l)) => write!(f, "break {l};"),
            Stmt::Break(None) => write!(f, "break;"),
            Stmt::Continue(Some(l)) => write!(f, "continue {l};"),
            Stmt::Continue(None) => write!(f, "continue;"),
            Stmt::Throw(e) => write!(f, "throw {e};"),
            Stmt::ForEach {
                ty,
                var,
                iterable,
                body,
            } => write!(f, "for ({ty} {var} : {iterable}) {body}"),
            Stmt::For {
                init,
                condition,
                update,
                body,
            } => {
                write!(f, "for (")?;
                for (i, s) in init.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match s {
                        Stmt::Local {
                            ty,
                            name,
                            init: Some(v),
                            ..
                        } => write!(f, "{ty} {name} = {v}")?,
                        Stmt::Expr(e) => write!(f, "{e}")?,
                        other => write!(f, "{other}")?,
                    }
                }
                write!(f, ";")?;
                if let Some(c) = condition {
                    write!(f, " {c}")?;
                }
                write!(f, ";")?;
                if !update.is_empty() {
                    write!(f, " ")?;
                    fmt_comma_separated(f, update)?;
                }
                write!(f, ") {body}")
            }
            Stmt::While { condition, body } => write!(f, "while ({condition}) {body}"),
            Stmt::DoWhile { body, condition } => write!(f, "do {body} while ({condition});"),
            Stmt::Labeled { label, body } => write!(f, "{label}: {body}"),
            Stmt::Empty => write!(f, ";"),
        }
    }
}

/// Collects referenced variable names, skipping lambda parameters
#[derive(Default)]
struct NameCollector {
    names: AstHashSet<String>,
    bound: Vec<Vec<String>>,
}

impl Visitor for NameCollector {
    fn enter_expr(&mut self, expr: &Expr) -> bool {
        match expr {
            Expr::Name(n) => {
                if !self.bound.iter().any(|frame| frame.contains(n)) {
                    self.names.insert(n.clone());
                }
            }
            Expr::Lambda { params, .. } => self.bound.push(params.clone()),
            _ => {}
        }
        true
    }

    fn leave_expr(&mut self, expr: &Expr) {
        if let Expr::Lambda { .. } = expr {
            self.bound.pop();
        }
    }

    fn enter_stmt(&mut self, stmt: &Stmt) -> bool {
        if let Stmt::ForEach { var, .. } = stmt {
            self.bound.push(vec![var.clone()]);
        }
        true
    }

    fn leave_stmt(&mut self, stmt: &Stmt) {
        if let Stmt::ForEach { .. } = stmt {
            self.bound.pop();
        }
    }
}

#[derive(Default)]
struct AssignmentCollector {
    names: AstHashSet<String>,
    any_update: bool,
}

impl AssignmentCollector {
    fn record_target(&mut self, target: &Expr) {
        self.any_update = true;
        if let Some(name) = target.as_name() {
            self.names.insert(name.to_string());
        }
    }
}

impl Visitor for AssignmentCollector {
    fn enter_expr(&mut self, expr: &Expr) -> bool {
        match expr {
            Expr::Assign { target, .. } => self.record_target(target),
            Expr::Unary { op, operand } if op.is_update() => self.record_target(operand),
            _ => {}
        }
        true
    }
}

#[derive(Default)]
struct DeclarationCollector {
    names: AstHashSet<String>,
}

impl Visitor for DeclarationCollector {
    fn enter_stmt(&mut self, stmt: &Stmt) -> bool {
        match stmt {
            Stmt::Local { name, .. } => {
                self.names.insert(name.clone());
            }
            Stmt::ForEach { var, .. } => {
                self.names.insert(var.clone());
            }
            _ => {}
        }
        true
    }
}

#[cfg(test)]
#[path = "ast_tests.rs"]
mod tests;
