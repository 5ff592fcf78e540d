//! Loop normalization
//!
//! Every recognized loop surface form (collection for-each, counted range,
//! iterator-driven `while` and `for`) is turned into one [`LoopMetadata`]
//! value. Forms that cannot be recognized are still described, with an
//! opaque source, so that the preconditions checker can name the reason it
//! rejects them.

use loopshift_core::ast::{AssignOp, AstHashSet, BinaryOp, Expr, Literal, Stmt, TypeRef, UnaryOp};
use loopshift_core::scope::Scope;
use loopshift_core::visitor::{walk_block, Visitor};
use serde::Serialize;
use tracing::trace;

/// Methods that change a collection in place
const COLLECTION_MUTATORS: [&str; 10] = [
    "add",
    "addAll",
    "remove",
    "removeAll",
    "removeIf",
    "retainAll",
    "clear",
    "set",
    "sort",
    "replaceAll",
];

/// Methods that change the collection behind a cursor
const CURSOR_MUTATORS: [&str; 3] = ["remove", "set", "add"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LoopShape {
    ForEach,
    Indexed,
    Iterator,
}

/// The surface form a loop was written in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LoopForm {
    ForEach,
    Range,
    IteratorWhile,
    IteratorFor,
    /// `for` with a header that is not a closed linear range
    Counted,
    /// `while` that is not driven by a single cursor
    While,
    DoWhile,
}

impl LoopForm {
    pub fn is_opaque(self) -> bool {
        matches!(self, LoopForm::Counted | LoopForm::While | LoopForm::DoWhile)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum LoopSource {
    Collection(Expr),
    Array(Expr),
    Range {
        start: Expr,
        end: Expr,
        inclusive: bool,
    },
    /// Unrecognized header; the loop condition, if any
    Condition(Option<Expr>),
}

impl LoopSource {
    /// The variable iterated over, when the source is a plain name
    pub fn variable(&self) -> Option<&str> {
        match self {
            LoopSource::Collection(e) | LoopSource::Array(e) => e.as_name(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoopFlags {
    /// Unlabeled `break` leaving this loop
    pub has_break: bool,
    /// Unlabeled `continue` of this loop
    pub has_continue: bool,
    pub has_throw: bool,
    /// `break label` or `continue label` to a label outside the body
    pub has_labeled_jump: bool,
    /// A `return` that runs on every iteration
    pub has_unconditional_return: bool,
    /// A cursor other than the loop's own binding is advanced in the body
    pub has_multiple_iterators: bool,
    /// The traversed collection is changed during the traversal
    pub has_iterator_mutation: bool,
}

/// Unified description of one loop
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoopMetadata {
    pub source: LoopSource,
    /// Variable bound to each element; empty for opaque loops
    pub element_name: String,
    pub element_type: Option<TypeRef>,
    /// Body statements, without the statement that bound the element
    pub body: Vec<Stmt>,
    pub shape: LoopShape,
    pub form: LoopForm,
    pub flags: LoopFlags,
    pub label: Option<String>,
    /// Values of every `return` in the body, in source order
    pub returns: Vec<Option<Expr>>,
}

struct Draft {
    source: LoopSource,
    element_name: String,
    element_type: Option<TypeRef>,
    body: Vec<Stmt>,
    shape: LoopShape,
    form: LoopForm,
    cursor: Option<String>,
}

impl Draft {
    fn opaque(form: LoopForm, condition: Option<&Expr>, body: &Stmt) -> Self {
        Draft {
            source: LoopSource::Condition(condition.cloned()),
            element_name: String::new(),
            element_type: None,
            body: body.as_statements().to_vec(),
            shape: if form == LoopForm::Counted {
                LoopShape::Indexed
            } else {
                LoopShape::Iterator
            },
            form,
            cursor: condition.and_then(cursor_of_condition),
        }
    }

    fn finish(self, label: Option<String>, scope: &Scope) -> LoopMetadata {
        let mut scanner = FlagScanner {
            scope,
            cursor: self.cursor.as_deref(),
            source_name: self.source.variable(),
            flags: LoopFlags::default(),
            returns: Vec::new(),
            loop_depth: 0,
            labels: Vec::new(),
            advanced: AstHashSet::default(),
        };
        walk_block(&mut scanner, &self.body);

        let mut flags = scanner.flags;
        flags.has_multiple_iterators = !scanner.advanced.is_empty();
        flags.has_unconditional_return = top_level(&self.body)
            .iter()
            .any(|s| matches!(s, Stmt::Return(_)));
        let returns = scanner.returns;

        LoopMetadata {
            source: self.source,
            element_name: self.element_name,
            element_type: self.element_type,
            body: self.body,
            shape: self.shape,
            form: self.form,
            flags,
            label,
            returns,
        }
    }
}

/// Converts loop statements into [`LoopMetadata`]
#[derive(Debug, Clone, Copy)]
pub struct LoopNormalizer {
    eliminate_indices: bool,
}

impl Default for LoopNormalizer {
    fn default() -> Self {
        Self::new(true)
    }
}

impl LoopNormalizer {
    pub fn new(eliminate_indices: bool) -> Self {
        Self { eliminate_indices }
    }

    /// Describes a loop statement, or `None` when `stmt` is not a loop
    pub fn normalize(&self, stmt: &Stmt, scope: &Scope) -> Option<LoopMetadata> {
        let (label, stmt) = match stmt {
            Stmt::Labeled { label, body } => (Some(label.clone()), body.as_ref()),
            other => (None, other),
        };

        let draft = match stmt {
            Stmt::ForEach {
                ty,
                var,
                iterable,
                body,
            } => for_each(ty, var, iterable, body, scope),
            Stmt::For {
                init,
                condition,
                update,
                body,
            } => self.counted(init, condition.as_ref(), update, body, scope),
            Stmt::While { condition, body } => while_loop(condition, body, scope),
            Stmt::DoWhile { body, condition } => {
                Draft::opaque(LoopForm::DoWhile, Some(condition), body)
            }
            _ => return None,
        };

        trace!(form = ?draft.form, element = %draft.element_name, "normalized loop");
        Some(draft.finish(label, scope))
    }

    fn counted(
        &self,
        init: &[Stmt],
        condition: Option<&Expr>,
        update: &[Expr],
        body: &Stmt,
        scope: &Scope,
    ) -> Draft {
        if let Some(draft) = iterator_for(init, condition, update, body) {
            return draft;
        }

        let statements = body.as_statements();
        if let Some(header) = RangeHeader::parse(init, condition, update) {
            if !writes_any(statements, &header.loop_dependencies()) {
                if self.eliminate_indices {
                    if let Some(draft) = header.eliminate_index(statements, scope) {
                        return draft;
                    }
                }
                return Draft {
                    source: LoopSource::Range {
                        start: header.start.clone(),
                        end: header.end.clone(),
                        inclusive: header.inclusive,
                    },
                    element_name: header.var.clone(),
                    element_type: Some(header.ty.clone()),
                    body: statements.to_vec(),
                    shape: LoopShape::Indexed,
                    form: LoopForm::Range,
                    cursor: None,
                };
            }
        }

        let mut draft = Draft::opaque(LoopForm::Counted, condition, body);
        if let [Stmt::Local { name, .. }] = init {
            draft.element_name = name.clone();
        }
        draft
    }
}

fn for_each(ty: &TypeRef, var: &str, iterable: &Expr, body: &Stmt, scope: &Scope) -> Draft {
    let is_array = scope
        .type_of_expr(iterable)
        .map_or(false, TypeRef::is_array);
    let source = if is_array {
        LoopSource::Array(iterable.clone())
    } else {
        LoopSource::Collection(iterable.clone())
    };
    Draft {
        source,
        element_name: var.to_string(),
        element_type: Some(ty.clone()),
        body: body.as_statements().to_vec(),
        shape: LoopShape::ForEach,
        form: LoopForm::ForEach,
        cursor: None,
    }
}

/// `for (Iterator<T> it = c.iterator(); it.hasNext();) { T x = it.next(); ... }`
fn iterator_for(
    init: &[Stmt],
    condition: Option<&Expr>,
    update: &[Expr],
    body: &Stmt,
) -> Option<Draft> {
    let (cursor, created) = match init {
        [Stmt::Local {
            ty,
            name,
            init: Some(created),
            ..
        }] if ty.is_iterator() => (name, created),
        _ => return None,
    };
    if !update.is_empty() || cursor_of_condition(condition?)? != *cursor {
        return None;
    }
    let collection = iterator_origin(created)?;
    bind_cursor(cursor, collection, body, LoopForm::IteratorFor)
}

/// `while (it.hasNext()) { T x = it.next(); ... }` with `it = c.iterator()` in scope
fn while_loop(condition: &Expr, body: &Stmt, scope: &Scope) -> Draft {
    let recognized = cursor_of_condition(condition).and_then(|cursor| {
        let info = scope.get(&cursor)?;
        if !info.ty.is_iterator() {
            return None;
        }
        let collection = iterator_origin(info.init.as_ref()?)?;
        bind_cursor(&cursor, collection, body, LoopForm::IteratorWhile)
    });
    recognized.unwrap_or_else(|| Draft::opaque(LoopForm::While, Some(condition), body))
}

fn bind_cursor(cursor: &str, collection: &Expr, body: &Stmt, form: LoopForm) -> Option<Draft> {
    let statements = body.as_statements();
    let (ty, name) = match statements.first()? {
        Stmt::Local {
            ty,
            name,
            init: Some(init),
            ..
        } if init.is_call_on(cursor, "next") => (ty, name),
        _ => return None,
    };
    Some(Draft {
        source: LoopSource::Collection(collection.clone()),
        element_name: name.clone(),
        element_type: Some(ty.clone()),
        body: statements[1..].to_vec(),
        shape: LoopShape::Iterator,
        form,
        cursor: Some(cursor.to_string()),
    })
}

/// `it` in a condition of the form `it.hasNext()`
fn cursor_of_condition(condition: &Expr) -> Option<String> {
    match condition.as_method_call()? {
        (Some(receiver), "hasNext", []) => receiver.as_name().map(str::to_string),
        _ => None,
    }
}

/// `c` in `c.iterator()`
fn iterator_origin(created: &Expr) -> Option<&Expr> {
    match created.as_method_call()? {
        (Some(receiver), "iterator", []) => Some(receiver),
        _ => None,
    }
}

/// Header of `for (int i = start; i < end; i++)`
struct RangeHeader {
    ty: TypeRef,
    var: String,
    start: Expr,
    end: Expr,
    inclusive: bool,
}

impl RangeHeader {
    fn parse(init: &[Stmt], condition: Option<&Expr>, update: &[Expr]) -> Option<Self> {
        let (ty, var, start) = match init {
            [Stmt::Local {
                ty,
                name,
                init: Some(start),
                ..
            }] if ty.name == "int" && ty.dims == 0 => (ty, name, start),
            _ => return None,
        };

        let (op, end) = match condition?.unparenthesized() {
            Expr::Binary { op, lhs, rhs } if lhs.is_name(var) => (*op, rhs.as_ref()),
            Expr::Binary { op, lhs, rhs } if rhs.is_name(var) => (op.mirrored(), lhs.as_ref()),
            _ => return None,
        };
        let inclusive = match op {
            BinaryOp::Lt => false,
            BinaryOp::Le => true,
            _ => return None,
        };
        if end.mentions(var) || start.mentions(var) {
            return None;
        }

        match update {
            [step] if is_unit_step(step, var) => Some(RangeHeader {
                ty: ty.clone(),
                var: var.clone(),
                start: start.clone(),
                end: end.clone(),
                inclusive,
            }),
            _ => None,
        }
    }

    /// Names the body must leave alone for the range to stay closed
    fn loop_dependencies(&self) -> AstHashSet<String> {
        let mut names = self.end.free_names();
        names.insert(self.var.clone());
        names
    }

    /// `for (int i = 0; i < list.size(); i++) { T e = list.get(i); ... }`
    fn eliminate_index(&self, body: &[Stmt], scope: &Scope) -> Option<Draft> {
        if self.inclusive || !matches!(self.start.unparenthesized(), Expr::Literal(Literal::Int(0))) {
            return None;
        }

        let (collection, is_array) = match self.end.unparenthesized() {
            Expr::MethodCall {
                receiver: Some(receiver),
                name,
                args,
            } if name == "size" && args.is_empty() => (receiver.as_name()?, false),
            Expr::FieldAccess { target, field } if field == "length" => (target.as_name()?, true),
            _ => return None,
        };
        if !is_array && scope.type_of(collection).map_or(false, TypeRef::is_array) {
            return None;
        }

        let (ty, name, element) = match body.first()? {
            Stmt::Local {
                ty,
                name,
                init: Some(element),
                ..
            } => (ty, name, element),
            _ => return None,
        };
        let reads_element = match element.unparenthesized() {
            Expr::ArrayAccess { array, index } => {
                is_array && array.is_name(collection) && index.is_name(&self.var)
            }
            Expr::MethodCall {
                receiver: Some(receiver),
                name,
                args,
            } => {
                !is_array
                    && name == "get"
                    && receiver.is_name(collection)
                    && matches!(args.as_slice(), [index] if index.is_name(&self.var))
            }
            _ => false,
        };
        let rest = &body[1..];
        if !reads_element || rest.iter().any(|s| s.mentions(&self.var)) {
            return None;
        }

        trace!(index = %self.var, collection, "eliminated loop index");
        let source = if is_array {
            LoopSource::Array(Expr::name(collection))
        } else {
            LoopSource::Collection(Expr::name(collection))
        };
        Some(Draft {
            source,
            element_name: name.clone(),
            element_type: Some(ty.clone()),
            body: rest.to_vec(),
            shape: LoopShape::ForEach,
            form: LoopForm::ForEach,
            cursor: None,
        })
    }
}

/// `i++`, `++i`, `i += 1` or `i = i + 1`
fn is_unit_step(step: &Expr, var: &str) -> bool {
    match step.unparenthesized() {
        Expr::Unary { op, operand } => {
            matches!(op, UnaryOp::PostInc | UnaryOp::PreInc) && operand.is_name(var)
        }
        Expr::Assign {
            op: AssignOp::Add,
            target,
            value,
        } => target.is_name(var) && matches!(value.unparenthesized(), Expr::Literal(Literal::Int(1))),
        Expr::Assign {
            op: AssignOp::Assign,
            target,
            value,
        } => {
            target.is_name(var)
                && match value.unparenthesized() {
                    Expr::Binary {
                        op: BinaryOp::Add,
                        lhs,
                        rhs,
                    } => {
                        let one = |e: &Expr| matches!(e.unparenthesized(), Expr::Literal(Literal::Int(1)));
                        (lhs.is_name(var) && one(rhs)) || (rhs.is_name(var) && one(lhs))
                    }
                    _ => false,
                }
        }
        _ => false,
    }
}

/// Whether the statements assign, or call a mutator on, any of `names`
fn writes_any(statements: &[Stmt], names: &AstHashSet<String>) -> bool {
    struct Writes<'a> {
        names: &'a AstHashSet<String>,
        found: bool,
    }

    impl Visitor for Writes<'_> {
        fn enter_expr(&mut self, expr: &Expr) -> bool {
            let written = match expr {
                Expr::Assign { target, .. } => Some(target),
                Expr::Unary { op, operand } if op.is_update() => Some(operand),
                Expr::MethodCall {
                    receiver: Some(receiver),
                    name,
                    ..
                } if COLLECTION_MUTATORS.contains(&name.as_str()) => Some(receiver),
                _ => None,
            };
            if let Some(name) = written.and_then(|target| target.as_name()) {
                if self.names.contains(name) {
                    self.found = true;
                }
            }
            !self.found
        }
    }

    let mut visitor = Writes {
        names,
        found: false,
    };
    walk_block(&mut visitor, statements);
    visitor.found
}

/// Body statements with nested plain blocks flattened
fn top_level(body: &[Stmt]) -> Vec<&Stmt> {
    let mut out = Vec::new();
    for stmt in body {
        match stmt {
            Stmt::Block(inner) => out.extend(top_level(inner)),
            other => out.push(other),
        }
    }
    out
}

struct FlagScanner<'a> {
    scope: &'a Scope,
    cursor: Option<&'a str>,
    source_name: Option<&'a str>,
    flags: LoopFlags,
    returns: Vec<Option<Expr>>,
    loop_depth: usize,
    labels: Vec<String>,
    advanced: AstHashSet<String>,
}

impl FlagScanner<'_> {
    fn is_cursor(&self, name: &str) -> bool {
        self.cursor == Some(name) || self.scope.type_of(name).map_or(false, TypeRef::is_iterator)
    }

    fn is_local_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

impl Visitor for FlagScanner<'_> {
    fn enter_stmt(&mut self, stmt: &Stmt) -> bool {
        match stmt {
            Stmt::Labeled { label, .. } => self.labels.push(label.clone()),
            s if s.is_loop() => self.loop_depth += 1,
            Stmt::Break(None) => {
                if self.loop_depth == 0 {
                    self.flags.has_break = true;
                }
            }
            Stmt::Continue(None) => {
                if self.loop_depth == 0 {
                    self.flags.has_continue = true;
                }
            }
            Stmt::Break(Some(label)) | Stmt::Continue(Some(label)) => {
                if !self.is_local_label(label) {
                    self.flags.has_labeled_jump = true;
                }
            }
            Stmt::Throw(_) => self.flags.has_throw = true,
            Stmt::Return(value) => self.returns.push(value.clone()),
            _ => {}
        }
        true
    }

    fn leave_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Labeled { .. } => {
                self.labels.pop();
            }
            s if s.is_loop() => self.loop_depth -= 1,
            _ => {}
        }
    }

    fn enter_expr(&mut self, expr: &Expr) -> bool {
        match expr {
            // Control flow inside a lambda belongs to the lambda
            Expr::Lambda { .. } => return false,
            Expr::MethodCall {
                receiver: Some(receiver),
                name,
                ..
            } => {
                if let Some(target) = receiver.as_name() {
                    if self.is_cursor(target) {
                        if name == "next" {
                            self.advanced.insert(target.to_string());
                        } else if CURSOR_MUTATORS.contains(&name.as_str()) {
                            self.flags.has_iterator_mutation = true;
                        }
                    }
                    if self.source_name == Some(target)
                        && COLLECTION_MUTATORS.contains(&name.as_str())
                    {
                        self.flags.has_iterator_mutation = true;
                    }
                }
            }
            _ => {}
        }
        true
    }
}

#[cfg(test)]
#[path = "normalize_tests.rs"]
mod tests;
