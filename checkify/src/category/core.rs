//! Core operations on tensors and error wires.
//! A simple, portable IR.

use crate::overlay::{ErrorCategory, Template};
use crate::path::Path;
use std::fmt;

////////////////////////////////////////////////////////////////////////////////
// Basic types.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dtype {
    F32,
    U32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shape(pub Vec<usize>);

impl Shape {
    /// Product of extents
    pub fn size(&self) -> usize {
        self.0.iter().product()
    }

    pub fn rank(&self) -> usize {
        self.0.len()
    }

    pub fn scalar() -> Self {
        Shape(vec![])
    }
}

////////////////////////////////////////////////////////////////////////////////
// objects

/// Objects of the category.
/// `Error` wires only appear in terms produced by [`crate::overlay::checkify`].
#[derive(Debug, Hash, PartialEq, Eq, Clone, Copy)]
pub enum Object {
    Tensor,
    Error,
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

////////////////////////////////////////////////////////////////////////////////
// Operations

/// Literals are rank-0 tensors
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal {
    F32(f32),
    U32(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// A tensor of shape `()` having a single value.
    Literal(Literal),

    Tensor(TensorOp),

    /// Fan-out of a single value; the `HasVar` operation of the builder.
    Copy,

    /// Call a named term in the [`crate::definition::Environment`].
    Definition(Path),

    /// `pred ● args → results`: run exactly one of `then`/`otherwise` on `args`.
    Cond { then: Path, otherwise: Path },

    /// `state → state`: run `body` while `cond` holds.
    /// `cond` returns `k ≥ 1` values: the last is the predicate, the first `k-1` replace the
    /// leading state values.
    While { cond: Path, body: Path },

    /// User assertion `pred ● payload → ()`. Only meaningful under `checkify`.
    Check(Template),

    /// `() → Error`
    EmptyError,

    /// `Error ● captured → Error`
    Guard(Guard),
}

/// Generating tensor operations
#[derive(Debug, Clone, PartialEq)]
pub enum TensorOp {
    /// Lift a scalar operation `f : m → n` to `m` input and `n` output arrays.
    Map(ScalarOp),

    /// Cast a tensor to a dtype
    Cast(Dtype),

    /// Batch matrix multiplication
    /// `MatMul : (N, A, B) ● (N, B, C) → (N, A, C)`
    MatMul,

    /// Sum last dimension of a tensor, preserving rank
    Sum,

    /// Max last dimension of a tensor, preserving rank
    Max,

    /// Broadcast a tensor to a (numpy-compatible) target shape
    Broadcast(Shape),

    /// Reshape a tensor into an isomorphic shape
    Reshape(Shape),

    /// Gather along a dimension using u32 indices
    /// `Index(d) : Tensor ● Indices → Tensor`
    Index(usize),
}

#[derive(Debug, Hash, Clone, Copy, PartialEq, Eq)]
pub enum ScalarOp {
    Add,  // 2 → 1
    Sub,  // 2 → 1
    Mul,  // 2 → 1
    Div,  // 2 → 1
    Neg,  // 1 → 1
    Pow,  // 2 → 1
    Sin,  // 1 → 1
    Cos,  // 1 → 1
    Exp,  // 1 → 1
    Log,  // 1 → 1
    Sqrt, // 1 → 1
    LT,   // 2 → 1
    EQ,   // 2 → 1
}

impl ScalarOp {
    /// The *profile* of an operation is the pair of its arity and coarity.
    pub fn profile(&self) -> (usize, usize) {
        use ScalarOp::*;
        match self {
            Add | Sub | Mul | Div | Pow | LT | EQ => (2, 1),
            Neg | Sin | Cos | Exp | Log | Sqrt => (1, 1),
        }
    }

    pub fn name(&self) -> &'static str {
        use ScalarOp::*;
        match self {
            Add => "add",
            Sub => "sub",
            Mul => "mul",
            Div => "div",
            Neg => "neg",
            Pow => "pow",
            Sin => "sin",
            Cos => "cos",
            Exp => "exp",
            Log => "log",
            Sqrt => "sqrt",
            LT => "lt",
            EQ => "eq",
        }
    }

    /// Comparisons produce 0/1 values and never NaN.
    pub fn is_comparison(&self) -> bool {
        matches!(self, ScalarOp::LT | ScalarOp::EQ)
    }
}

impl TensorOp {
    /// Number of tensor arguments
    pub fn arity(&self) -> usize {
        match self {
            TensorOp::Map(op) => op.profile().0,
            TensorOp::MatMul | TensorOp::Index(_) => 2,
            TensorOp::Cast(_)
            | TensorOp::Sum
            | TensorOp::Max
            | TensorOp::Broadcast(_)
            | TensorOp::Reshape(_) => 1,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Guards

/// A fault condition evaluated against an error wire.
/// Sources are `Error ● captured...`, target is the merged `Error`.
#[derive(Debug, Clone, PartialEq)]
pub struct Guard {
    pub kind: GuardKind,
    pub message: Template,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GuardKind {
    /// captured: `pred ● payload...`
    User,
    /// captured: `divisor`
    DivisionByZero,
    /// captured: `arity` operands, then the result
    NonFinite { arity: usize },
    /// captured: `array ● indices`
    OutOfBounds { dim: usize },
}

impl GuardKind {
    pub fn category(&self) -> ErrorCategory {
        match self {
            GuardKind::User => ErrorCategory::UserCheck,
            GuardKind::DivisionByZero => ErrorCategory::DivisionByZero,
            GuardKind::NonFinite { .. } => ErrorCategory::NonFinite,
            GuardKind::OutOfBounds { .. } => ErrorCategory::OutOfBounds,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Display instances

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::F32(v) => write!(f, "{v}f32"),
            Literal::U32(v) => write!(f, "{v}u32"),
        }
    }
}

impl fmt::Display for TensorOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TensorOp::Map(op) => write!(f, "{}", op.name()),
            TensorOp::Cast(dtype) => write!(f, "cast<{dtype:?}>"),
            TensorOp::MatMul => write!(f, "matmul"),
            TensorOp::Sum => write!(f, "sum"),
            TensorOp::Max => write!(f, "max"),
            TensorOp::Broadcast(shape) => write!(f, "broadcast<{:?}>", shape.0),
            TensorOp::Reshape(shape) => write!(f, "reshape<{:?}>", shape.0),
            TensorOp::Index(dim) => write!(f, "index<{dim}>"),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Literal(literal) => write!(f, "{literal}"),
            Operation::Tensor(op) => write!(f, "tensor.{op}"),
            Operation::Copy => write!(f, "copy"),
            Operation::Definition(path) => write!(f, "{path}"),
            Operation::Cond { then, otherwise } => write!(f, "cond({then}, {otherwise})"),
            Operation::While { cond, body } => write!(f, "while({cond}, {body})"),
            Operation::Check(message) => write!(f, "check(\"{message}\")"),
            Operation::EmptyError => write!(f, "error.empty"),
            Operation::Guard(guard) => write!(f, "guard.{}", guard.kind.category()),
        }
    }
}

impl From<f32> for Literal {
    fn from(value: f32) -> Self {
        Literal::F32(value)
    }
}

impl From<u32> for Literal {
    fn from(value: u32) -> Self {
        Literal::U32(value)
    }
}
