//! Combinator-call descriptors handed to the code generator.
//!
//! A lowered chain is a root sequence followed by an ordered list of
//! map / filter / flat-map stages. Each stage names the carrier it consumes
//! and the carrier (or projection) it produces, so the code generator can
//! declare one composite type per boundary and emit calls against whatever
//! sequence library the target provides.

use std::fmt;

use crate::{BindingId, ExprArena, ExprId, Name, Ty};

/// Identity of a synthesized carrier type. One per clause boundary.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CarrierId(u32);

impl CarrierId {
    #[inline]
    pub const fn new(index: u32) -> Self {
        CarrierId(index)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for CarrierId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C{}", self.0)
    }
}

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CarrierField {
    pub binding: BindingId,
    pub name: Name,
    pub ty: Ty,
}

/// Field layout of the value flowing across one boundary.
///
/// Zero fields is a unit element, one field is the bare value (no
/// composite is allocated), more fields is a synthesized composite.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CarrierShape {
    pub id: CarrierId,
    pub fields: Vec<CarrierField>,
}

impl CarrierShape {
    pub fn is_unit(&self) -> bool {
        self.fields.is_empty()
    }

    /// A single field travels as the bare value.
    pub fn is_scalar(&self) -> bool {
        self.fields.len() == 1
    }

    pub fn contains(&self, binding: BindingId) -> bool {
        self.fields.iter().any(|f| f.binding == binding)
    }

    pub fn position(&self, binding: BindingId) -> Option<usize> {
        self.fields.iter().position(|f| f.binding == binding)
    }

    pub fn bindings(&self) -> impl Iterator<Item = BindingId> + '_ {
        self.fields.iter().map(|f| f.binding)
    }
}

/// Representation of a two-state (success with payload / failure) value.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OutcomeRepr {
    /// Failure is the single null sentinel; success is the bare payload.
    Elided,
    /// Discriminant plus payload, for payloads that may themselves be null.
    Tagged,
}

/// What a stage consumes or produces.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StageShape {
    Carrier(CarrierShape),
    /// `payload | absent`, represented per `repr`.
    Outcome {
        payload: CarrierShape,
        repr: OutcomeRepr,
    },
    /// Final output of the terminal projection.
    Projection(Ty),
}

impl StageShape {
    /// The carrier whose fields are readable once the outcome (if any)
    /// is known to be a success.
    pub fn carrier(&self) -> Option<&CarrierShape> {
        match self {
            StageShape::Carrier(shape) | StageShape::Outcome { payload: shape, .. } => Some(shape),
            StageShape::Projection(_) => None,
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CombinatorKind {
    Map,
    Filter,
    FlatMap,
}

impl CombinatorKind {
    /// Name of the equivalent call in a `Select`/`Where`/`SelectMany` library.
    pub fn method_name(self) -> &'static str {
        match self {
            CombinatorKind::Map => "Select",
            CombinatorKind::Filter => "Where",
            CombinatorKind::FlatMap => "SelectMany",
        }
    }
}

/// The lambda of one stage. Expressions are evaluated with the input
/// carrier's fields in scope.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StageBody {
    /// `let`: copy surviving fields, add computed ones.
    Extend { bindings: Vec<(BindingId, ExprId)> },
    /// Deconstructing `let`: evaluate `source` once, extract live parts.
    Destructure {
        source: ExprId,
        parts: Vec<(BindingId, u32)>,
    },
    /// Generator: one output element per element of `collection`.
    Generate {
        collection: ExprId,
        element: BindingId,
    },
    /// Plain boolean filter.
    Predicate { predicate: ExprId },
    /// Evaluate `predicate`; on success build the payload carrier from the
    /// input fields and the pattern variables it bound, on failure produce
    /// the absent value.
    Guard { predicate: ExprId },
    /// Drop absent values.
    RejectAbsent,
    /// Strip the outcome wrapper from a known-present value.
    Unwrap,
    /// Terminal projection.
    Project { result: ExprId },
}

impl StageBody {
    /// The user expression this stage evaluates, if any.
    pub fn source_expression(&self) -> Option<ExprId> {
        match self {
            StageBody::Extend { bindings } => bindings.first().map(|(_, expr)| *expr),
            StageBody::Destructure { source, .. } => Some(*source),
            StageBody::Generate { collection, .. } => Some(*collection),
            StageBody::Predicate { predicate } | StageBody::Guard { predicate } => Some(*predicate),
            StageBody::Project { result } => Some(*result),
            StageBody::RejectAbsent | StageBody::Unwrap => None,
        }
    }
}

/// One emitted combinator call.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CombinatorCall {
    pub kind: CombinatorKind,
    pub input: StageShape,
    pub output: StageShape,
    pub body: StageBody,
    /// Index of the clause this stage was lowered from.
    pub clause: usize,
}

/// A fully lowered clause chain.
#[derive(Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CombinatorChain {
    /// Expressions referenced by stage bodies.
    pub arena: ExprArena,
    /// Root sequence (the leading `from`'s expression).
    pub source: ExprId,
    /// Shape of the root sequence's elements.
    pub source_shape: CarrierShape,
    pub stages: Vec<CombinatorCall>,
}

impl CombinatorChain {
    pub fn stage_kinds(&self) -> Vec<CombinatorKind> {
        self.stages.iter().map(|stage| stage.kind).collect()
    }
}
