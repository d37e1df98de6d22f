use super::backend::Backend;
use super::types::*;
use crate::category::core::Dtype;
use crate::overlay::Error;

/// Make sure an op has exact arity N, consistent with arguments
pub(crate) fn get_exact_arity<const N: usize, T>(ssa: &CoreSSA, args: Vec<T>) -> Result<[T; N]> {
    if ssa.sources.len() != N {
        return Err(InterpreterError::ArityError(ssa.edge_id));
    }

    args.try_into()
        .map_err(|_e| InterpreterError::ArityError(ssa.edge_id))
}

////////////////////////////////////////////////////////////////////////////////
// Match cases of Value or yield a Result.
// NOTE: we don't use TryInto here because we need the ssa value to build an error.

pub(crate) fn to_tensor<B: Backend>(ssa: &CoreSSA, v: Value<B>) -> Result<TaggedTensor<B>> {
    match v {
        Value::Tensor(t) => Ok(t),
        _ => Err(InterpreterError::TypeError(ssa.edge_id)),
    }
}

pub(crate) fn to_error<B: Backend>(ssa: &CoreSSA, v: Value<B>) -> Result<Error> {
    match v {
        Value::Error(e) => Ok(e),
        _ => Err(InterpreterError::TypeError(ssa.edge_id)),
    }
}

/// Convert a `Vec<Value<B>>` into `TaggedTensorTuple<B, N>` with compile-time length checking
pub(crate) fn try_into_tagged_ndarrays<B: Backend, const N: usize>(
    args: Vec<Value<B>>,
    ssa: &CoreSSA,
) -> Result<TaggedTensorTuple<B, N>> {
    // If no args, type is ambiguous, but this is a programmer error.
    if N == 0 {
        panic!("try_into_tagged_ndarrays is undefined for N <= 0");
    }

    let tensors: Vec<TaggedTensor<B>> = get_exact_arity::<N, _>(ssa, args)?
        .into_iter()
        .map(|x| to_tensor(ssa, x))
        .collect::<Result<_>>()?;
    let dtype = tensors[0].dtype();

    // Collect each tag into its own typed array
    let mut f32_arrays = Vec::new();
    let mut u32_arrays = Vec::new();
    for x in tensors {
        match x {
            TaggedTensorTuple::F32([x]) => f32_arrays.push(x),
            TaggedTensorTuple::U32([x]) => u32_arrays.push(x),
        }
    }

    let tuple = match dtype {
        Dtype::F32 => f32_arrays.try_into().ok().map(TaggedTensorTuple::F32),
        Dtype::U32 => u32_arrays.try_into().ok().map(TaggedTensorTuple::U32),
    };
    // a dtype mismatch leaves fewer than N arrays of the first dtype
    tuple.ok_or(InterpreterError::TypeError(ssa.edge_id))
}
