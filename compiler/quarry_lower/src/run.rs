//! Reference evaluator for lowered chains.
//!
//! Executes a [`CombinatorChain`] over in-memory [`Value`]s. Each source
//! element is pushed through every stage before the next one is pulled,
//! matching the element-at-a-time order of a lazy sequence library, so
//! assignments to captured locals are observed in the same order.
//!
//! Carrier encoding: a unit carrier is [`Value::Unit`], a single field is
//! the bare value, more fields are a [`Value::Tuple`] in field order. An
//! elided outcome uses [`Value::Null`] for absence; a tagged outcome is
//! `(present, payload)`.

use std::fmt;

use quarry_ir::{
    BinaryOp, CarrierShape, CombinatorChain, CombinatorKind, ExprId, ExprKind, Name,
    OutcomeRepr, StageBody, StageShape, StringInterner, Ty, UnaryOp,
};
use rustc_hash::{FxHashMap, FxHashSet};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Unit,
    Bool(bool),
    Int(i64),
    Str(String),
    Null,
    Tuple(Vec<Value>),
    List(Vec<Value>),
}

impl Value {
    pub fn str(s: &str) -> Self {
        Value::Str(s.to_owned())
    }

    /// Whether the value inhabits `ty`. Null inhabits no type test.
    pub fn has_type(&self, ty: &Ty) -> bool {
        match (self, ty) {
            (Value::Null, _) => false,
            (_, Ty::Unknown | Ty::Object) => true,
            (_, Ty::Nullable(inner)) => self.has_type(inner),
            (Value::Unit, Ty::Unit)
            | (Value::Bool(_), Ty::Bool)
            | (Value::Int(_), Ty::Int)
            | (Value::Str(_), Ty::Str) => true,
            (Value::Tuple(items), Ty::Tuple(tys)) => {
                items.len() == tys.len() && items.iter().zip(tys).all(|(v, t)| v.has_type(t))
            }
            (Value::List(items), Ty::List(elem)) => items.iter().all(|v| v.has_type(elem)),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn seq(
            f: &mut fmt::Formatter<'_>,
            items: &[Value],
            open: &str,
            close: &str,
        ) -> fmt::Result {
            f.write_str(open)?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{item}")?;
            }
            f.write_str(close)
        }
        match self {
            Value::Unit => f.write_str("()"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Null => f.write_str("null"),
            Value::Tuple(items) => seq(f, items, "(", ")"),
            Value::List(items) => seq(f, items, "[", "]"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RunError {
    #[error("unbound variable `{0}`")]
    UnboundVariable(String),
    #[error("expected {expected}, found {found}")]
    TypeMismatch { expected: &'static str, found: Value },
    #[error("{0} is not a sequence")]
    NotASequence(Value),
    #[error("{value} has no part {index}")]
    MissingPart { index: u32, value: Value },
    #[error("integer overflow")]
    Overflow,
    #[error("stage {stage} received a value that does not match its input shape")]
    ShapeMismatch { stage: usize },
}

/// Locals captured from the code enclosing the query.
pub type Captures = FxHashMap<Name, Value>;

type Locals = FxHashMap<Name, Value>;

/// Run a lowered chain to completion and collect its output.
pub fn run(
    chain: &CombinatorChain,
    captures: &Captures,
    interner: &StringInterner,
) -> Result<Vec<Value>, RunError> {
    run_with_captures(chain, captures.clone(), interner).map(|(out, _)| out)
}

/// Like [`run`], also returning the captured locals after execution.
pub fn run_with_captures(
    chain: &CombinatorChain,
    captures: Captures,
    interner: &StringInterner,
) -> Result<(Vec<Value>, Captures), RunError> {
    let mut runner = Runner {
        chain,
        interner,
        captures,
        declared: FxHashSet::default(),
    };
    let source = runner.eval(chain.source, &mut Locals::default())?;
    let Value::List(elements) = source else {
        return Err(RunError::NotASequence(source));
    };

    let mut out = Vec::new();
    for element in elements {
        runner.push(0, element, &mut out)?;
    }
    tracing::debug!(stages = chain.stages.len(), produced = out.len(), "chain evaluated");
    Ok((out, runner.captures))
}

struct Runner<'a> {
    chain: &'a CombinatorChain,
    interner: &'a StringInterner,
    captures: Captures,
    /// Names declared by pattern tests of the running stage; never captures.
    declared: FxHashSet<Name>,
}

impl Runner<'_> {
    fn push(&mut self, index: usize, value: Value, out: &mut Vec<Value>) -> Result<(), RunError> {
        let chain = self.chain;
        let Some(stage) = chain.stages.get(index) else {
            out.push(value);
            return Ok(());
        };
        let mismatch = || RunError::ShapeMismatch { stage: index };
        self.declared = self.pattern_names(&stage.body);

        match (&stage.kind, &stage.body) {
            (CombinatorKind::Filter, StageBody::Predicate { predicate }) => {
                let mut locals = open(&stage.input, &value).ok_or_else(mismatch)?;
                if self.eval_bool(*predicate, &mut locals)? {
                    self.push(index + 1, value, out)?;
                }
            }
            (CombinatorKind::Filter, StageBody::RejectAbsent) => {
                let StageShape::Outcome { repr, .. } = &stage.input else {
                    return Err(mismatch());
                };
                if present(*repr, &value).ok_or_else(mismatch)?.is_some() {
                    self.push(index + 1, value, out)?;
                }
            }
            (CombinatorKind::Map, StageBody::Unwrap) => {
                let StageShape::Outcome { repr, .. } = &stage.input else {
                    return Err(mismatch());
                };
                let payload = present(*repr, &value).ok_or_else(mismatch)?.ok_or_else(mismatch)?;
                self.push(index + 1, payload, out)?;
            }
            (CombinatorKind::Map, StageBody::Guard { predicate }) => {
                let StageShape::Outcome { payload, repr } = &stage.output else {
                    return Err(mismatch());
                };
                let mut locals = open(&stage.input, &value).ok_or_else(mismatch)?;
                let next = if self.eval_bool(*predicate, &mut locals)? {
                    let built = self.build(payload, &locals)?;
                    wrap(*repr, Some(built))
                } else {
                    wrap(*repr, None)
                };
                self.push(index + 1, next, out)?;
            }
            (CombinatorKind::Map, StageBody::Extend { bindings }) => {
                let shape = stage.output.carrier().ok_or_else(mismatch)?;
                let mut locals = open(&stage.input, &value).ok_or_else(mismatch)?;
                for (binding, expr) in bindings {
                    let v = self.eval(*expr, &mut locals)?;
                    if let Some(field) = shape.fields.iter().find(|f| f.binding == *binding) {
                        locals.insert(field.name, v);
                    }
                }
                let next = self.build(shape, &locals)?;
                self.push(index + 1, next, out)?;
            }
            (CombinatorKind::Map, StageBody::Destructure { source, parts }) => {
                let shape = stage.output.carrier().ok_or_else(mismatch)?;
                let mut locals = open(&stage.input, &value).ok_or_else(mismatch)?;
                let composite = self.eval(*source, &mut locals)?;
                for (binding, position) in parts {
                    let part = nth_part(&composite, *position)?;
                    if let Some(field) = shape.fields.iter().find(|f| f.binding == *binding) {
                        locals.insert(field.name, part);
                    }
                }
                let next = self.build(shape, &locals)?;
                self.push(index + 1, next, out)?;
            }
            (CombinatorKind::FlatMap, StageBody::Generate { collection, element }) => {
                let shape = stage.output.carrier().ok_or_else(mismatch)?;
                let mut locals = open(&stage.input, &value).ok_or_else(mismatch)?;
                let items = match self.eval(*collection, &mut locals)? {
                    Value::List(items) => items,
                    other => return Err(RunError::NotASequence(other)),
                };
                let element_name = shape
                    .fields
                    .iter()
                    .find(|f| f.binding == *element)
                    .map(|f| f.name);
                for item in items {
                    if let Some(name) = element_name {
                        locals.insert(name, item);
                    }
                    let next = self.build(shape, &locals)?;
                    self.push(index + 1, next, out)?;
                }
            }
            (CombinatorKind::Map, StageBody::Project { result }) => {
                let mut locals = open(&stage.input, &value).ok_or_else(mismatch)?;
                let projected = self.eval(*result, &mut locals)?;
                self.push(index + 1, projected, out)?;
            }
            _ => return Err(mismatch()),
        }
        Ok(())
    }

    /// Encode the fields of `shape` from `locals`.
    fn build(&self, shape: &CarrierShape, locals: &Locals) -> Result<Value, RunError> {
        let mut values = Vec::with_capacity(shape.fields.len());
        for field in &shape.fields {
            let v = locals
                .get(&field.name)
                .cloned()
                .ok_or_else(|| self.unbound(field.name))?;
            values.push(v);
        }
        Ok(match values.len() {
            0 => Value::Unit,
            1 => values.swap_remove(0),
            _ => Value::Tuple(values),
        })
    }

    /// Names bound by pattern tests in a stage's expression.
    fn pattern_names(&self, body: &StageBody) -> FxHashSet<Name> {
        let arena = &self.chain.arena;
        body.source_expression()
            .into_iter()
            .flat_map(|root| arena.walk(root))
            .filter_map(|id| arena.get_expr(id).kind.pattern_binding())
            .collect()
    }

    fn lookup(&self, name: Name, locals: &Locals) -> Result<Value, RunError> {
        let captured = || {
            if self.declared.contains(&name) {
                None
            } else {
                self.captures.get(&name)
            }
        };
        locals
            .get(&name)
            .or_else(captured)
            .cloned()
            .ok_or_else(|| self.unbound(name))
    }

    fn unbound(&self, name: Name) -> RunError {
        RunError::UnboundVariable(self.interner.lookup(name).to_owned())
    }

    fn eval_bool(&mut self, id: ExprId, locals: &mut Locals) -> Result<bool, RunError> {
        match self.eval(id, locals)? {
            Value::Bool(b) => Ok(b),
            other => Err(RunError::TypeMismatch {
                expected: "bool",
                found: other,
            }),
        }
    }

    fn eval_int(&mut self, id: ExprId, locals: &mut Locals) -> Result<i64, RunError> {
        match self.eval(id, locals)? {
            Value::Int(n) => Ok(n),
            other => Err(RunError::TypeMismatch {
                expected: "int",
                found: other,
            }),
        }
    }

    fn eval(&mut self, id: ExprId, locals: &mut Locals) -> Result<Value, RunError> {
        let chain = self.chain;
        let expr = chain.arena.get_expr(id);
        match &expr.kind {
            ExprKind::Int(n) => Ok(Value::Int(*n)),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Str(s) => Ok(Value::str(self.interner.lookup(*s))),
            ExprKind::Null => Ok(Value::Null),
            ExprKind::Ident(name) => self.lookup(*name, locals),
            ExprKind::Binary { op, left, right } => self.eval_binary(*op, *left, *right, locals),
            ExprKind::Unary { op, operand } => match op {
                UnaryOp::Not => Ok(Value::Bool(!self.eval_bool(*operand, locals)?)),
                UnaryOp::Neg => self
                    .eval_int(*operand, locals)?
                    .checked_neg()
                    .map(Value::Int)
                    .ok_or(RunError::Overflow),
            },
            ExprKind::TypeTest {
                operand,
                ty,
                binding,
            } => {
                let v = self.eval(*operand, locals)?;
                let matched = v.has_type(ty);
                if matched && binding.is_present() {
                    locals.insert(*binding, v);
                }
                Ok(Value::Bool(matched))
            }
            ExprKind::TryParse { operand, out } => {
                let parsed = match self.eval(*operand, locals)? {
                    Value::Str(s) => s.trim().parse::<i64>().ok(),
                    Value::Null => None,
                    other => {
                        return Err(RunError::TypeMismatch {
                            expected: "str",
                            found: other,
                        })
                    }
                };
                locals.insert(*out, Value::Int(parsed.unwrap_or(0)));
                Ok(Value::Bool(parsed.is_some()))
            }
            ExprKind::Assign { target, value } => {
                let v = self.eval(*value, locals)?;
                if let Some(slot) = locals.get_mut(target) {
                    *slot = v.clone();
                } else if self.declared.contains(target) {
                    return Err(self.unbound(*target));
                } else {
                    self.captures.insert(*target, v.clone());
                }
                Ok(v)
            }
            ExprKind::Tuple(range) => {
                let items = self.eval_list(chain.arena.get_expr_list(*range), locals)?;
                Ok(Value::Tuple(items))
            }
            ExprKind::List(range) => {
                let items = self.eval_list(chain.arena.get_expr_list(*range), locals)?;
                Ok(Value::List(items))
            }
            ExprKind::Field { receiver, index } => {
                let v = self.eval(*receiver, locals)?;
                nth_part(&v, *index)
            }
        }
    }

    fn eval_list(&mut self, ids: &[ExprId], locals: &mut Locals) -> Result<Vec<Value>, RunError> {
        ids.iter().map(|&id| self.eval(id, locals)).collect()
    }

    fn eval_binary(
        &mut self,
        op: BinaryOp,
        left: ExprId,
        right: ExprId,
        locals: &mut Locals,
    ) -> Result<Value, RunError> {
        match op {
            BinaryOp::And => {
                let v = self.eval_bool(left, locals)? && self.eval_bool(right, locals)?;
                return Ok(Value::Bool(v));
            }
            BinaryOp::Or => {
                let v = self.eval_bool(left, locals)? || self.eval_bool(right, locals)?;
                return Ok(Value::Bool(v));
            }
            _ => {}
        }

        let l = self.eval(left, locals)?;
        let r = self.eval(right, locals)?;
        match (op, l, r) {
            (BinaryOp::Eq, l, r) => Ok(Value::Bool(l == r)),
            (BinaryOp::NotEq, l, r) => Ok(Value::Bool(l != r)),
            (BinaryOp::Add, Value::Str(a), Value::Str(b)) => Ok(Value::Str(a + &b)),
            (BinaryOp::Add, Value::Int(a), Value::Int(b)) => checked(a.checked_add(b)),
            (BinaryOp::Sub, Value::Int(a), Value::Int(b)) => checked(a.checked_sub(b)),
            (BinaryOp::Mul, Value::Int(a), Value::Int(b)) => checked(a.checked_mul(b)),
            (BinaryOp::Lt, Value::Int(a), Value::Int(b)) => Ok(Value::Bool(a < b)),
            (BinaryOp::Gt, Value::Int(a), Value::Int(b)) => Ok(Value::Bool(a > b)),
            (_, Value::Int(_), other) | (_, other, _) => Err(RunError::TypeMismatch {
                expected: "int",
                found: other,
            }),
        }
    }
}

fn checked(result: Option<i64>) -> Result<Value, RunError> {
    result.map(Value::Int).ok_or(RunError::Overflow)
}

fn nth_part(value: &Value, index: u32) -> Result<Value, RunError> {
    match value {
        Value::Tuple(items) | Value::List(items) => items.get(index as usize).cloned(),
        _ => None,
    }
    .ok_or_else(|| RunError::MissingPart {
        index,
        value: value.clone(),
    })
}

/// Decode a stage input into named locals.
fn open(shape: &StageShape, value: &Value) -> Option<Locals> {
    let (carrier, payload) = match shape {
        StageShape::Carrier(carrier) => (carrier, value.clone()),
        StageShape::Outcome { payload, repr } => (payload, present(*repr, value)??),
        StageShape::Projection(_) => return None,
    };
    let mut locals = Locals::default();
    match (carrier.fields.as_slice(), payload) {
        ([], _) => {}
        ([only], v) => {
            locals.insert(only.name, v);
        }
        (fields, Value::Tuple(items)) if items.len() == fields.len() => {
            locals.extend(fields.iter().map(|f| f.name).zip(items));
        }
        _ => return None,
    }
    Some(locals)
}

/// `Some(Some(payload))` when present, `Some(None)` when absent, `None`
/// when the value is not an outcome of this representation.
fn present(repr: OutcomeRepr, value: &Value) -> Option<Option<Value>> {
    match (repr, value) {
        (OutcomeRepr::Elided, Value::Null) => Some(None),
        (OutcomeRepr::Elided, v) => Some(Some(v.clone())),
        (OutcomeRepr::Tagged, Value::Tuple(parts)) => match parts.as_slice() {
            [Value::Bool(true), payload] => Some(Some(payload.clone())),
            [Value::Bool(false), _] => Some(None),
            _ => None,
        },
        (OutcomeRepr::Tagged, _) => None,
    }
}

fn wrap(repr: OutcomeRepr, payload: Option<Value>) -> Value {
    match (repr, payload) {
        (OutcomeRepr::Elided, Some(v)) => v,
        (OutcomeRepr::Elided, None) => Value::Null,
        (OutcomeRepr::Tagged, Some(v)) => Value::Tuple(vec![Value::Bool(true), v]),
        (OutcomeRepr::Tagged, None) => Value::Tuple(vec![Value::Bool(false), Value::Null]),
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;
