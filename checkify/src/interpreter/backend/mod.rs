use super::types::*;
use crate::category::core::{Dtype, Shape};
use std::fmt::Debug;

#[cfg(feature = "ndarray-backend")]
pub mod ndarray;

/// Backends implement this trait.
///
/// # Conventions
///
/// - Methods take a `TaggedTensorTuple<Self, N>`: a tuple of arrays of the *same dtype*
/// - A method of this signature is expected to work for *any dtype*
/// - Kernels *never* implicitly broadcast their arguments. The interpreter checks shapes match
///   exactly before calling a kernel.
/// - Reductions preserve rank. For example, sum tensor shape `[2,3,4]` gives `[2,3,1]` instead of `[2,3]`.
/// - Kernels never panic on data: faulty operations (division by zero, out-of-range indices)
///   produce a value, which `checkify` may then report.
pub trait Backend: Send + Sync + Clone + Debug {
    /// Representation of tensor values. (e.g., device ptrs, Vec, etc.)
    type BackendTensor: BackendTensorOps;

    /// Copy tensor data to the host, in row-major order
    fn to_vec(&self, x: TaggedTensor<Self>) -> TaggedVec;

    fn ndarray_from_vec_f32(
        &self,
        data: Vec<f32>,
        shape: Shape,
    ) -> Result<TaggedTensor<Self>, BackendError>;

    fn ndarray_from_vec_u32(
        &self,
        data: Vec<u32>,
        shape: Shape,
    ) -> Result<TaggedTensor<Self>, BackendError>;

    fn cast(&self, x: TaggedTensor<Self>, target_dtype: Dtype) -> TaggedTensor<Self>;
    fn matmul(&self, lhs: TaggedTensorTuple<Self, 2>) -> TaggedTensor<Self>;
    fn add(&self, lhs: TaggedTensorTuple<Self, 2>) -> TaggedTensor<Self>;
    fn sub(&self, lhs: TaggedTensorTuple<Self, 2>) -> TaggedTensor<Self>;
    fn mul(&self, lhs: TaggedTensorTuple<Self, 2>) -> TaggedTensor<Self>;
    /// `u32` division by zero yields `u32::MAX`
    fn div(&self, lhs: TaggedTensorTuple<Self, 2>) -> TaggedTensor<Self>;
    fn pow(&self, lhs: TaggedTensorTuple<Self, 2>) -> TaggedTensor<Self>;
    fn lt(&self, lhs: TaggedTensorTuple<Self, 2>) -> TaggedTensor<Self>;
    fn eq(&self, lhs: TaggedTensorTuple<Self, 2>) -> TaggedTensor<Self>;
    fn neg(&self, x: TaggedTensor<Self>) -> TaggedTensor<Self>;
    /// Float-only: the interpreter rejects `u32` arguments.
    fn sin(&self, x: TaggedTensor<Self>) -> TaggedTensor<Self>;
    fn cos(&self, x: TaggedTensor<Self>) -> TaggedTensor<Self>;
    fn exp(&self, x: TaggedTensor<Self>) -> TaggedTensor<Self>;
    fn log(&self, x: TaggedTensor<Self>) -> TaggedTensor<Self>;
    fn sqrt(&self, x: TaggedTensor<Self>) -> TaggedTensor<Self>;
    fn broadcast(&self, x: TaggedTensor<Self>, shape: Shape) -> TaggedTensor<Self>;
    fn reshape(&self, x: TaggedTensor<Self>, new_shape: Shape) -> TaggedTensor<Self>;
    fn max(&self, x: TaggedTensor<Self>) -> TaggedTensor<Self>;
    fn sum(&self, x: TaggedTensor<Self>) -> TaggedTensor<Self>;
    /// Gather along `dim`. Indices past the end of the axis are clamped to its last entry.
    fn index(
        &self,
        x: TaggedTensor<Self>,
        dim: usize,
        indices: TaggedTensor<Self>,
    ) -> TaggedTensor<Self>;
}

pub trait BackendTensorOps: Send + Sync + Clone + Debug + PartialEq {
    fn shape(&self) -> Shape;
}

#[derive(Debug, Clone, PartialEq)]
pub enum BackendError {
    /// The size of a shape did not match the number of elements in a Tensor
    ShapeError,
}
