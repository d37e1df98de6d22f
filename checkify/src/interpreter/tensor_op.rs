//! Tensor operation implementations for the interpreter
use super::backend::*;
use super::types::*;
use super::util::{get_exact_arity, to_tensor, try_into_tagged_ndarrays};
use crate::category::core::{Dtype, Literal, ScalarOp, Shape, TensorOp};

/// Apply a Tensor operation
pub(crate) fn tensor_op<B: Backend>(
    backend: &B,
    ssa: &CoreSSA,
    args: Vec<Value<B>>,
    tensor_op: &TensorOp,
) -> ResultValues<B> {
    match tensor_op {
        TensorOp::Map(ScalarOp::Add) => binop(backend, args, ssa, B::add),
        TensorOp::Map(ScalarOp::Sub) => binop(backend, args, ssa, B::sub),
        TensorOp::Map(ScalarOp::Mul) => binop(backend, args, ssa, B::mul),
        TensorOp::Map(ScalarOp::Div) => binop(backend, args, ssa, B::div),
        TensorOp::Map(ScalarOp::Pow) => binop(backend, args, ssa, B::pow),
        TensorOp::Map(ScalarOp::LT) => binop(backend, args, ssa, B::lt),
        TensorOp::Map(ScalarOp::EQ) => binop(backend, args, ssa, B::eq),
        TensorOp::Map(ScalarOp::Neg) => unary_op(backend, args, ssa, B::neg),
        TensorOp::Map(ScalarOp::Sin) => float_op(backend, args, ssa, B::sin),
        TensorOp::Map(ScalarOp::Cos) => float_op(backend, args, ssa, B::cos),
        TensorOp::Map(ScalarOp::Exp) => float_op(backend, args, ssa, B::exp),
        TensorOp::Map(ScalarOp::Log) => float_op(backend, args, ssa, B::log),
        TensorOp::Map(ScalarOp::Sqrt) => float_op(backend, args, ssa, B::sqrt),
        TensorOp::Cast(dtype) => tensor_cast(backend, args, ssa, *dtype),
        TensorOp::MatMul => tensor_matmul(backend, args, ssa),
        TensorOp::Sum => reduce_op(backend, args, ssa, B::sum),
        TensorOp::Max => reduce_op(backend, args, ssa, B::max),
        TensorOp::Broadcast(shape) => tensor_broadcast(backend, args, ssa, shape),
        TensorOp::Reshape(shape) => tensor_reshape(backend, args, ssa, shape),
        TensorOp::Index(dim) => tensor_index(backend, args, ssa, *dim),
    }
}

pub(crate) fn tensor_literal<B: Backend>(
    backend: &B,
    args: Vec<Value<B>>, // must be empty
    ssa: &CoreSSA,
    lit: &Literal,
) -> ResultValues<B> {
    let [] = get_exact_arity(ssa, args)?;
    let value = match lit {
        Literal::F32(x) => tensor(backend, vec![*x], Shape::scalar()),
        Literal::U32(x) => tensor(backend, vec![*x], Shape::scalar()),
    };
    Ok(vec![value.map_err(|_| InterpreterError::ApplyError(ssa.edge_id))?])
}

fn tensor_cast<B: Backend>(
    backend: &B,
    args: Vec<Value<B>>,
    ssa: &CoreSSA,
    dtype: Dtype,
) -> ResultValues<B> {
    let [x] = get_exact_arity(ssa, args)?;
    let x = to_tensor(ssa, x)?;
    Ok(vec![Value::Tensor(backend.cast(x, dtype))])
}

fn tensor_matmul<B: Backend>(backend: &B, args: Vec<Value<B>>, ssa: &CoreSSA) -> ResultValues<B> {
    let args = try_into_tagged_ndarrays::<B, 2>(args, ssa)?;
    let [Shape(lhs), Shape(rhs)] = args.shapes();

    // (..., M, K) × (..., K, N) with identical batch dimensions
    let rank = lhs.len();
    if rank < 2 || rhs.len() != rank || lhs[..rank - 2] != rhs[..rank - 2] {
        return Err(InterpreterError::TypeError(ssa.edge_id));
    }
    if lhs[rank - 1] != rhs[rank - 2] {
        return Err(InterpreterError::TypeError(ssa.edge_id));
    }
    Ok(vec![Value::Tensor(backend.matmul(args))])
}

fn tensor_broadcast<B: Backend>(
    backend: &B,
    args: Vec<Value<B>>,
    ssa: &CoreSSA,
    shape: &Shape,
) -> ResultValues<B> {
    let [x] = get_exact_arity(ssa, args)?;
    let x = to_tensor(ssa, x)?;
    if !broadcastable(&x.shape(), shape) {
        return Err(InterpreterError::TypeError(ssa.edge_id));
    }
    Ok(vec![Value::Tensor(backend.broadcast(x, shape.clone()))])
}

/// Numpy rules: align trailing dimensions; each source extent is 1 or equal to the target's.
fn broadcastable(from: &Shape, to: &Shape) -> bool {
    from.rank() <= to.rank()
        && from
            .0
            .iter()
            .rev()
            .zip(to.0.iter().rev())
            .all(|(a, b)| a == b || *a == 1)
}

fn tensor_reshape<B: Backend>(
    backend: &B,
    args: Vec<Value<B>>,
    ssa: &CoreSSA,
    shape: &Shape,
) -> ResultValues<B> {
    let [x] = get_exact_arity(ssa, args)?;
    let x = to_tensor(ssa, x)?;
    if x.shape().size() != shape.size() {
        return Err(InterpreterError::TypeError(ssa.edge_id));
    }
    Ok(vec![Value::Tensor(backend.reshape(x, shape.clone()))])
}

fn tensor_index<B: Backend>(
    backend: &B,
    args: Vec<Value<B>>,
    ssa: &CoreSSA,
    dim: usize,
) -> ResultValues<B> {
    let [x, ix] = get_exact_arity(ssa, args)?;
    let (input, indices) = (to_tensor(ssa, x)?, to_tensor(ssa, ix)?);
    if dim >= input.shape().rank() || indices.dtype() != Dtype::U32 {
        return Err(InterpreterError::TypeError(ssa.edge_id));
    }
    Ok(vec![Value::Tensor(backend.index(input, dim, indices))])
}

#[allow(type_alias_bounds)]
type Binop<B: Backend> = fn(&B, TaggedTensorTuple<B, 2>) -> TaggedTensor<B>;

#[allow(type_alias_bounds)]
type Unaryop<B: Backend> = fn(&B, TaggedTensor<B>) -> TaggedTensor<B>;

fn binop<B: Backend>(
    backend: &B,
    args: Vec<Value<B>>,
    ssa: &CoreSSA,
    callback: Binop<B>,
) -> ResultValues<B> {
    let args = try_into_tagged_ndarrays::<B, 2>(args, ssa)?;
    let [x, y] = args.shapes();
    if x != y {
        return Err(InterpreterError::TypeError(ssa.edge_id));
    }
    Ok(vec![Value::Tensor(callback(backend, args))])
}

fn unary_op<B: Backend>(
    backend: &B,
    args: Vec<Value<B>>,
    ssa: &CoreSSA,
    callback: Unaryop<B>,
) -> ResultValues<B> {
    let [x] = get_exact_arity(ssa, args)?;
    let result = callback(backend, to_tensor(ssa, x)?);
    Ok(vec![Value::Tensor(result)])
}

// transcendental functions are only defined on floats
fn float_op<B: Backend>(
    backend: &B,
    args: Vec<Value<B>>,
    ssa: &CoreSSA,
    callback: Unaryop<B>,
) -> ResultValues<B> {
    let [x] = get_exact_arity(ssa, args)?;
    let x = to_tensor(ssa, x)?;
    if x.dtype() != Dtype::F32 {
        return Err(InterpreterError::TypeError(ssa.edge_id));
    }
    Ok(vec![Value::Tensor(callback(backend, x))])
}

// reductions over the last axis need at least one axis
fn reduce_op<B: Backend>(
    backend: &B,
    args: Vec<Value<B>>,
    ssa: &CoreSSA,
    callback: Unaryop<B>,
) -> ResultValues<B> {
    let [x] = get_exact_arity(ssa, args)?;
    let x = to_tensor(ssa, x)?;
    if x.shape().rank() == 0 {
        return Err(InterpreterError::TypeError(ssa.edge_id));
    }
    Ok(vec![Value::Tensor(callback(backend, x))])
}
