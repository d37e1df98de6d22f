use checkify::category::core::{Object, Shape};
use checkify::category::lang::{Builder, Term, Var};
use checkify::interpreter::backend::Backend;
use checkify::interpreter::backend::ndarray::NdArrayBackend;
use checkify::interpreter::{TaggedVec, Value, tensor};
use checkify::util::build_typed;

pub type NdValue = Value<NdArrayBackend>;

pub fn scalar_f32(x: f32) -> NdValue {
    tensor(&NdArrayBackend, vec![x], Shape::scalar()).expect("scalar tensor")
}

pub fn vector_f32(data: Vec<f32>) -> NdValue {
    let n = data.len();
    tensor(&NdArrayBackend, data, Shape(vec![n])).expect("f32 tensor")
}

pub fn vector_u32(data: Vec<u32>) -> NdValue {
    let n = data.len();
    tensor(&NdArrayBackend, data, Shape(vec![n])).expect("u32 tensor")
}

pub fn as_f32(value: &NdValue) -> Vec<f32> {
    match value {
        Value::Tensor(x) => match NdArrayBackend.to_vec(x.clone()) {
            TaggedVec::F32(data) => data,
            other => panic!("expected f32 data, got {other:?}"),
        },
        Value::Error(e) => panic!("expected a tensor, got error {e:?}"),
    }
}

pub fn as_u32(value: &NdValue) -> Vec<u32> {
    match value {
        Value::Tensor(x) => match NdArrayBackend.to_vec(x.clone()) {
            TaggedVec::U32(data) => data,
            other => panic!("expected u32 data, got {other:?}"),
        },
        Value::Error(e) => panic!("expected a tensor, got error {e:?}"),
    }
}

pub fn allclose(actual: &[f32], expected: &[f32]) -> bool {
    actual.len() == expected.len()
        && actual
            .iter()
            .zip(expected)
            .all(|(a, e)| a == e || (a - e).abs() < 1e-6)
}

/// A term of one tensor argument and one tensor result
pub fn unary(f: impl Fn(&Builder, Var) -> Var) -> Term {
    build_typed([Object::Tensor], |builder, [x]| vec![f(builder, x)]).expect("build term")
}

/// A term of two tensor arguments and one tensor result
pub fn binary(f: impl Fn(&Builder, Var, Var) -> Var) -> Term {
    build_typed([Object::Tensor; 2], |builder, [x, y]| vec![f(builder, x, y)])
        .expect("build term")
}
