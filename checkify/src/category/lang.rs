//! Builder functions for constructing [`Term`]s.
//!
//! Every function here appends operations to a [`Builder`] and returns the [`Var`]s of their
//! results. Misuse (e.g. passing an error wire where a tensor is expected) is a programmer error
//! and panics at build time.

use super::core::*;
use crate::overlay::{CheckifyError, Template};
use crate::path::Path;
use open_hypergraphs::lax::{OpenHypergraph, var};

use std::cell::RefCell;
use std::rc::Rc;

pub type Term = OpenHypergraph<Object, Operation>;
pub type Var = var::Var<Object, Operation>;
pub type Builder = Rc<RefCell<Term>>;

////////////////////////////////////////////////////////////////////////////////
// Operator instances

// Copy lets us use HasVar
impl var::HasVar for Operation {
    fn var() -> Self {
        Operation::Copy
    }
}

fn tensor_binop(lhs: Object, rhs: Object, op: ScalarOp) -> (Object, Operation) {
    assert_eq!(lhs, rhs);
    match lhs {
        Object::Tensor => (lhs, Operation::Tensor(TensorOp::Map(op))),
        _ => panic!("{} undefined for {lhs:?}", op.name()),
    }
}

impl var::HasAdd<Object, Operation> for Operation {
    fn add(lhs: Object, rhs: Object) -> (Object, Operation) {
        tensor_binop(lhs, rhs, ScalarOp::Add)
    }
}

impl var::HasSub<Object, Operation> for Operation {
    fn sub(lhs: Object, rhs: Object) -> (Object, Operation) {
        tensor_binop(lhs, rhs, ScalarOp::Sub)
    }
}

impl var::HasMul<Object, Operation> for Operation {
    fn mul(lhs: Object, rhs: Object) -> (Object, Operation) {
        tensor_binop(lhs, rhs, ScalarOp::Mul)
    }
}

impl var::HasDiv<Object, Operation> for Operation {
    fn div(lhs: Object, rhs: Object) -> (Object, Operation) {
        tensor_binop(lhs, rhs, ScalarOp::Div)
    }
}

impl var::HasNeg<Object, Operation> for Operation {
    fn neg(operand_type: Object) -> (Object, Operation) {
        assert_eq!(operand_type, Object::Tensor);
        (operand_type, Operation::Tensor(TensorOp::Map(ScalarOp::Neg)))
    }
}

////////////////////////////////////////////////////////////////////////////////
// Literals

pub fn lit(builder: &Builder, lit: Literal) -> Var {
    var::fn_operation(builder, &[], Object::Tensor, Operation::Literal(lit))
}

pub fn constant_f32(builder: &Builder, v: f32) -> Var {
    lit(builder, Literal::F32(v))
}

pub fn constant_u32(builder: &Builder, v: u32) -> Var {
    lit(builder, Literal::U32(v))
}

////////////////////////////////////////////////////////////////////////////////
// Tensor Helpers

fn tensor_op(builder: &Builder, args: &[Var], op: TensorOp) -> Var {
    for x in args {
        assert_eq!(x.label, Object::Tensor, "{op} expects tensor arguments");
    }
    var::fn_operation(builder, args, Object::Tensor, Operation::Tensor(op))
}

fn map(builder: &Builder, args: &[Var], op: ScalarOp) -> Var {
    tensor_op(builder, args, TensorOp::Map(op))
}

pub fn div(builder: &Builder, x: Var, y: Var) -> Var {
    map(builder, &[x, y], ScalarOp::Div)
}

pub fn pow(builder: &Builder, value: Var, exponent: Var) -> Var {
    map(builder, &[value, exponent], ScalarOp::Pow)
}

pub fn sin(builder: &Builder, x: Var) -> Var {
    map(builder, &[x], ScalarOp::Sin)
}

pub fn cos(builder: &Builder, x: Var) -> Var {
    map(builder, &[x], ScalarOp::Cos)
}

pub fn exp(builder: &Builder, x: Var) -> Var {
    map(builder, &[x], ScalarOp::Exp)
}

pub fn log(builder: &Builder, x: Var) -> Var {
    map(builder, &[x], ScalarOp::Log)
}

pub fn sqrt(builder: &Builder, x: Var) -> Var {
    map(builder, &[x], ScalarOp::Sqrt)
}

/// Elementwise `x < y` as 0/1 values of the input dtype
pub fn lt(builder: &Builder, x: Var, y: Var) -> Var {
    map(builder, &[x, y], ScalarOp::LT)
}

/// Elementwise `x == y` as 0/1 values of the input dtype
pub fn eq(builder: &Builder, x: Var, y: Var) -> Var {
    map(builder, &[x, y], ScalarOp::EQ)
}

pub fn cast(builder: &Builder, x: Var, dtype: Dtype) -> Var {
    tensor_op(builder, &[x], TensorOp::Cast(dtype))
}

/// Batch matmul
pub fn matmul(builder: &Builder, f: Var, g: Var) -> Var {
    tensor_op(builder, &[f, g], TensorOp::MatMul)
}

pub fn sum(builder: &Builder, x: Var) -> Var {
    tensor_op(builder, &[x], TensorOp::Sum)
}

pub fn max(builder: &Builder, x: Var) -> Var {
    tensor_op(builder, &[x], TensorOp::Max)
}

pub fn broadcast(builder: &Builder, x: Var, shape: Shape) -> Var {
    tensor_op(builder, &[x], TensorOp::Broadcast(shape))
}

pub fn reshape(builder: &Builder, x: Var, shape: Shape) -> Var {
    tensor_op(builder, &[x], TensorOp::Reshape(shape))
}

/// Select entries of `x` along `dim` using the (u32) `indices`
pub fn index(builder: &Builder, x: Var, dim: usize, indices: Var) -> Var {
    tensor_op(builder, &[x, indices], TensorOp::Index(dim))
}

////////////////////////////////////////////////////////////////////////////////
// Calls and control flow

/// Call the definition at `path`, which returns `coarity` tensors
pub fn call(builder: &Builder, path: Path, args: &[Var], coarity: usize) -> Vec<Var> {
    var::operation(
        builder,
        args,
        vec![Object::Tensor; coarity],
        Operation::Definition(path),
    )
}

/// Run exactly one of the definitions `then`/`otherwise` on `args`, depending on whether the
/// single element of `pred` is nonzero.
pub fn cond(
    builder: &Builder,
    pred: Var,
    then: Path,
    otherwise: Path,
    args: &[Var],
    coarity: usize,
) -> Vec<Var> {
    assert_eq!(pred.label, Object::Tensor);
    let sources: Vec<Var> = std::iter::once(pred).chain(args.iter().cloned()).collect();
    var::operation(
        builder,
        &sources,
        vec![Object::Tensor; coarity],
        Operation::Cond { then, otherwise },
    )
}

/// Iterate `body : state → state` while `cond : state → pred` holds.
pub fn while_loop(builder: &Builder, cond: Path, body: Path, state: &[Var]) -> Vec<Var> {
    let ty = state.iter().map(|x| x.label).collect();
    var::operation(builder, state, ty, Operation::While { cond, body })
}

////////////////////////////////////////////////////////////////////////////////
// Assertions

/// Assert that every element of `pred` is nonzero.
///
/// `message` is a template whose `{}` / `{N}` placeholders are filled with `payload` values when
/// the assertion fails. Failures are only recorded when the enclosing term is run through
/// [`crate::overlay::checkify`]; the plain interpreter rejects the operation.
///
/// # Panics
///
/// When `message` is malformed or refers to more payload values than given.
pub fn check(builder: &Builder, pred: Var, message: &str, payload: &[Var]) {
    if let Err(err) = try_check(builder, pred, message, payload) {
        panic!("{err}");
    }
}

/// Like [`check`], but reports a malformed message as an error.
pub fn try_check(
    builder: &Builder,
    pred: Var,
    message: &str,
    payload: &[Var],
) -> Result<(), CheckifyError> {
    let template = Template::parse(message)?;
    template.expect_payload(payload.len())?;

    assert_eq!(pred.label, Object::Tensor);
    let sources: Vec<Var> = std::iter::once(pred).chain(payload.iter().cloned()).collect();
    var::operation(builder, &sources, vec![], Operation::Check(template));
    Ok(())
}
