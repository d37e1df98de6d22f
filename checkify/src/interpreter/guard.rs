//! Evaluation of the guards inserted by [`crate::overlay::checkify`]
use super::backend::Backend;
use super::types::*;
use super::util::{to_error, to_tensor};
use crate::category::core::{Guard, GuardKind, Shape};
use crate::overlay::{Error, Payload};

/// Apply a guard `Error ● captured... → Error`.
/// An already-populated error is passed through without evaluating the fault condition.
pub(crate) fn apply_guard<B: Backend>(
    backend: &B,
    ssa: &CoreSSA,
    args: Vec<Value<B>>,
    guard: &Guard,
) -> ResultValues<B> {
    let mut args = args.into_iter();
    let error = match args.next() {
        Some(e) => to_error(ssa, e)?,
        None => return Err(InterpreterError::ArityError(ssa.edge_id)),
    };
    let captured: Vec<TaggedTensor<B>> = args.map(|x| to_tensor(ssa, x)).collect::<Result<_>>()?;

    if error.is_populated() {
        return Ok(vec![Value::Error(error)]);
    }

    let fault = match &guard.kind {
        GuardKind::User => user_check(backend, ssa, guard, captured)?,
        GuardKind::DivisionByZero => division_by_zero(backend, ssa, guard, captured)?,
        GuardKind::NonFinite { arity } => non_finite(backend, ssa, guard, captured, *arity)?,
        GuardKind::OutOfBounds { dim } => out_of_bounds(backend, ssa, guard, captured, *dim)?,
    };

    if let Some(fault) = &fault {
        log::debug!("guard fired at edge {}: {fault}", ssa.edge_id.0);
    }
    Ok(vec![Value::Error(error.merge(fault.unwrap_or_default()))])
}

fn payload<B: Backend>(backend: &B, x: TaggedTensor<B>) -> Payload {
    Payload {
        shape: x.shape(),
        data: backend.to_vec(x),
    }
}

fn index_payload(value: usize) -> Payload {
    Payload {
        shape: Shape::scalar(),
        data: TaggedVec::U32(vec![value as u32]),
    }
}

// captured: pred ● payload...
fn user_check<B: Backend>(
    backend: &B,
    ssa: &CoreSSA,
    guard: &Guard,
    captured: Vec<TaggedTensor<B>>,
) -> Result<Option<Error>> {
    let mut captured = captured.into_iter();
    let pred = captured
        .next()
        .ok_or(InterpreterError::ArityError(ssa.edge_id))?;

    if backend.to_vec(pred).all_nonzero() {
        return Ok(None);
    }
    let payload = captured.map(|x| payload(backend, x)).collect();
    Ok(Some(Error::new(
        guard.kind.category(),
        guard.message.clone(),
        payload,
    )))
}

// captured: divisor
fn division_by_zero<B: Backend>(
    backend: &B,
    ssa: &CoreSSA,
    guard: &Guard,
    captured: Vec<TaggedTensor<B>>,
) -> Result<Option<Error>> {
    let [divisor] = captured
        .try_into()
        .map_err(|_| InterpreterError::ArityError(ssa.edge_id))?;

    let divisor = payload(backend, divisor);
    if divisor.data.all_nonzero() {
        return Ok(None);
    }
    Ok(Some(Error::new(
        guard.kind.category(),
        guard.message.clone(),
        vec![divisor],
    )))
}

// captured: operands... ● result
fn non_finite<B: Backend>(
    backend: &B,
    ssa: &CoreSSA,
    guard: &Guard,
    captured: Vec<TaggedTensor<B>>,
    arity: usize,
) -> Result<Option<Error>> {
    if captured.len() != arity + 1 {
        return Err(InterpreterError::ArityError(ssa.edge_id));
    }
    let mut values: Vec<Payload> = captured.into_iter().map(|x| payload(backend, x)).collect();

    // only report the operation which first produced the non-finite value
    let result = values.pop().ok_or(InterpreterError::ArityError(ssa.edge_id))?;
    let elementwise = values.iter().all(|x| x.data.len() == result.data.len());
    let produced = if elementwise {
        (0..result.data.len()).any(|i| {
            !result.data.is_finite_at(i) && values.iter().all(|x| x.data.is_finite_at(i))
        })
    } else {
        // reductions mix elements, so any non-finite operand may explain the result
        result.data.any_non_finite() && !values.iter().any(|x| x.data.any_non_finite())
    };
    if !produced {
        return Ok(None);
    }
    Ok(Some(Error::new(
        guard.kind.category(),
        guard.message.clone(),
        values,
    )))
}

// captured: array ● indices
fn out_of_bounds<B: Backend>(
    backend: &B,
    ssa: &CoreSSA,
    guard: &Guard,
    captured: Vec<TaggedTensor<B>>,
    dim: usize,
) -> Result<Option<Error>> {
    let [array, indices] = captured
        .try_into()
        .map_err(|_| InterpreterError::ArityError(ssa.edge_id))?;

    let size = match array.shape().0.get(dim) {
        Some(size) => *size,
        None => return Err(InterpreterError::TypeError(ssa.edge_id)),
    };
    let TaggedVec::U32(indices) = backend.to_vec(indices) else {
        return Err(InterpreterError::TypeError(ssa.edge_id));
    };

    let Some(index) = indices.into_iter().find(|i| *i as usize >= size) else {
        return Ok(None);
    };
    Ok(Some(Error::new(
        guard.kind.category(),
        guard.message.clone(),
        vec![
            index_payload(index as usize),
            index_payload(dim),
            index_payload(size),
        ],
    )))
}
