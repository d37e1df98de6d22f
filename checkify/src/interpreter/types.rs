use super::backend::*;
use crate::category::core::{Dtype, Object, Operation, Shape};
use crate::overlay::Error;
use crate::path::Path;
use crate::ssa::{SSA, SSAError};

use open_hypergraphs::lax::{EdgeId, NodeId};

pub type CoreSSA = SSA<Object, Operation>;

pub type Result<T, E = InterpreterError> = std::result::Result<T, E>;
pub type ResultValues<B> = Result<Vec<Value<B>>>;

/// Runtime values: one per [`Object`]
#[derive(Debug, Clone, PartialEq)]
pub enum Value<B: Backend> {
    Tensor(TaggedTensor<B>),
    Error(Error),
}

impl<B: Backend> Value<B> {
    pub fn object(&self) -> Object {
        match self {
            Value::Tensor(_) => Object::Tensor,
            Value::Error(_) => Object::Error,
        }
    }
}

/// Evaluation errors
#[derive(Debug, Clone, PartialEq)]
pub enum InterpreterError {
    /// A node appeared as a *source* of multiple hyperedges, and so interpreting tried to read a
    /// value that had already been consumed.
    MultipleRead(NodeId),
    /// A node appeared as a *target* of multiple hyperedges, and so was written to multiple times
    /// during interpretation.
    MultipleWrite(NodeId),
    /// A term could not be mapped into SSA form
    SSAError(SSAError),
    /// Could not apply an operation because arguments were not of the correct form.
    TypeError(EdgeId),
    /// Unexpected number of arguments to an operation
    ArityError(EdgeId),
    /// A term was run with the wrong number of arguments
    ArgumentCount { expected: usize, got: usize },
    /// A `Definition`, `Cond` or `While` referred to a path not in the environment
    MissingDefinition(EdgeId, Path),
    /// A `check` was evaluated outside a term instrumented by `checkify`
    UncheckedAssertion(EdgeId),
    /// Backend-specific error while trying to apply an op
    ApplyError(EdgeId),
    /// A checked term did not return an `Error` as its first result
    MissingError,
}

impl From<SSAError> for InterpreterError {
    fn from(value: SSAError) -> Self {
        InterpreterError::SSAError(value)
    }
}

impl std::fmt::Display for InterpreterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl std::error::Error for InterpreterError {}

////////////////////////////////////////////////////////////////////////////////
// Multiple tagged ndarrays

/// Host-side tensor data
#[derive(Clone, Debug, PartialEq)]
pub enum TaggedVec {
    F32(Vec<f32>),
    U32(Vec<u32>),
}

impl TaggedVec {
    pub fn len(&self) -> usize {
        match self {
            TaggedVec::F32(v) => v.len(),
            TaggedVec::U32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when every element is nonzero (vacuously true when empty)
    pub fn all_nonzero(&self) -> bool {
        match self {
            TaggedVec::F32(v) => v.iter().all(|x| *x != 0.0),
            TaggedVec::U32(v) => v.iter().all(|x| *x != 0),
        }
    }

    /// True when some element is NaN or infinite. Integers are always finite.
    pub fn any_non_finite(&self) -> bool {
        match self {
            TaggedVec::F32(v) => v.iter().any(|x| !x.is_finite()),
            TaggedVec::U32(_) => false,
        }
    }

    /// True when the element at `i` is a finite number (or out of range)
    pub fn is_finite_at(&self, i: usize) -> bool {
        match self {
            TaggedVec::F32(v) => v.get(i).is_none_or(|x| x.is_finite()),
            TaggedVec::U32(_) => true,
        }
    }
}

/// A collection of n tensors of the same dtype
#[derive(Clone, Debug, PartialEq)]
pub enum TaggedTensorTuple<B: Backend, const N: usize> {
    F32([B::BackendTensor; N]),
    U32([B::BackendTensor; N]),
}

pub trait IntoTagged<B: Backend, const N: usize>: Clone + std::fmt::Debug + Copy + Sync + Send {
    fn into_tagged(arr: [B::BackendTensor; N]) -> TaggedTensorTuple<B, N>;

    fn ndarray_from_vec(
        backend: &B,
        data: Vec<Self>,
        shape: Shape,
    ) -> std::result::Result<TaggedTensor<B>, BackendError>;
}

impl<B: Backend, const N: usize> IntoTagged<B, N> for f32 {
    fn into_tagged(arrs: [B::BackendTensor; N]) -> TaggedTensorTuple<B, N> {
        TaggedTensorTuple::F32(arrs)
    }

    fn ndarray_from_vec(
        backend: &B,
        data: Vec<Self>,
        shape: Shape,
    ) -> std::result::Result<TaggedTensor<B>, BackendError> {
        backend.ndarray_from_vec_f32(data, shape)
    }
}

impl<B: Backend, const N: usize> IntoTagged<B, N> for u32 {
    fn into_tagged(arrs: [B::BackendTensor; N]) -> TaggedTensorTuple<B, N> {
        TaggedTensorTuple::U32(arrs)
    }

    fn ndarray_from_vec(
        backend: &B,
        data: Vec<Self>,
        shape: Shape,
    ) -> std::result::Result<TaggedTensor<B>, BackendError> {
        backend.ndarray_from_vec_u32(data, shape)
    }
}

impl<B: Backend, const N: usize> TaggedTensorTuple<B, N> {
    pub fn dtype(&self) -> Dtype {
        match self {
            Self::F32(_) => Dtype::F32,
            Self::U32(_) => Dtype::U32,
        }
    }

    pub fn shapes(&self) -> [Shape; N] {
        match self {
            Self::F32(xs) | Self::U32(xs) => xs.each_ref().map(|x| x.shape()),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Single tagged array

pub type TaggedTensor<B> = TaggedTensorTuple<B, 1>;

impl<B: Backend> TaggedTensor<B> {
    pub fn shape(&self) -> Shape {
        match self {
            Self::F32(x) => x[0].shape(),
            Self::U32(x) => x[0].shape(),
        }
    }

    pub fn from_vec<T: IntoTagged<B, 1>>(
        backend: &B,
        data: Vec<T>,
        shape: Shape,
    ) -> std::result::Result<Self, BackendError> {
        T::ndarray_from_vec(backend, data, shape)
    }
}

/// Build a tensor [`Value`] from host data
pub fn tensor<B: Backend, T: IntoTagged<B, 1>>(
    backend: &B,
    data: Vec<T>,
    shape: Shape,
) -> std::result::Result<Value<B>, BackendError> {
    Ok(Value::Tensor(TaggedTensor::from_vec(backend, data, shape)?))
}
