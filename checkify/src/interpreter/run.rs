//! Reference interpreter

use super::backend::Backend;
use super::guard::apply_guard;
use super::tensor_op::{tensor_literal, tensor_op};
use super::types::*;
use super::util::{get_exact_arity, to_tensor};
use crate::category::core::Operation;
use crate::category::lang::Term;
use crate::definition::Environment;
use crate::overlay::Error;
use crate::path::Path;
use crate::ssa::parallel_ssa;

use open_hypergraphs::lax::NodeId;
use std::collections::HashMap;

#[derive(Clone, Debug)]
pub struct Interpreter<B: Backend> {
    /// Array kernel backend implementation
    pub backend: B,
    /// Definitions called by terms
    pub env: Environment,
}

impl<B: Backend> Interpreter<B> {
    pub fn new(backend: B, env: Environment) -> Self {
        Self { backend, env }
    }

    /// Run the interpreter with specified input values
    pub fn run(&self, term: Term, args: Vec<Value<B>>) -> ResultValues<B> {
        let decomposition = parallel_ssa(term)?;
        if args.len() != decomposition.sources.len() {
            return Err(InterpreterError::ArgumentCount {
                expected: decomposition.sources.len(),
                got: args.len(),
            });
        }

        // create initial state by moving argument values into state
        let mut state = HashMap::<NodeId, Value<B>>::new();
        for ((node_id, _), value) in decomposition.sources.iter().zip(args) {
            if state.insert(*node_id, value).is_some() {
                return Err(InterpreterError::MultipleWrite(*node_id));
            }
        }

        // Iterate through partially-ordered SSA ops
        for par in &decomposition.layers {
            for op in par {
                // get args by popping each id in op.sources from state - take ownership.
                let mut args = Vec::with_capacity(op.sources.len());
                for (node_id, _) in &op.sources {
                    match state.remove(node_id) {
                        Some(value) => args.push(value),
                        None => return Err(InterpreterError::MultipleRead(*node_id)),
                    }
                }

                let results = self.apply(op, args)?;
                if results.len() != op.targets.len() {
                    return Err(InterpreterError::ArityError(op.edge_id));
                }

                // write each result into state at op.targets ids
                for ((node_id, _), result) in op.targets.iter().zip(results) {
                    if state.insert(*node_id, result).is_some() {
                        return Err(InterpreterError::MultipleWrite(*node_id));
                    }
                }
            }
        }

        // Extract target values and return them
        let mut target_values = Vec::new();
        for (target_node, _) in &decomposition.targets {
            match state.remove(target_node) {
                Some(value) => target_values.push(value),
                None => return Err(InterpreterError::MultipleRead(*target_node)),
            }
        }

        Ok(target_values)
    }

    pub fn apply(&self, ssa: &CoreSSA, args: Vec<Value<B>>) -> ResultValues<B> {
        log::debug!("{ssa}");
        match &ssa.op {
            Operation::Literal(lit) => tensor_literal(&self.backend, args, ssa, lit),
            Operation::Tensor(op) => tensor_op(&self.backend, ssa, args, op),
            Operation::Copy => apply_copy(args, ssa),
            Operation::Definition(path) => self.apply_definition(ssa, args, path),
            Operation::Cond { then, otherwise } => self.apply_cond(ssa, args, then, otherwise),
            Operation::While { cond, body } => self.apply_while(ssa, args, cond, body),
            Operation::Check(_) => Err(InterpreterError::UncheckedAssertion(ssa.edge_id)),
            Operation::EmptyError => {
                let [] = get_exact_arity(ssa, args)?;
                Ok(vec![Value::Error(Error::empty())])
            }
            Operation::Guard(guard) => apply_guard(&self.backend, ssa, args, guard),
        }
    }

    // Dispatch definitions by recursing
    fn call(&self, ssa: &CoreSSA, path: &Path, args: Vec<Value<B>>) -> ResultValues<B> {
        let definition = self
            .env
            .get(path)
            .ok_or_else(|| InterpreterError::MissingDefinition(ssa.edge_id, path.clone()))?;
        // PERFORMANCE: SSA decomposition takes ownership, so we clone the definition on each call
        self.run(definition.clone(), args)
    }

    fn apply_definition(
        &self,
        ssa: &CoreSSA,
        args: Vec<Value<B>>,
        path: &Path,
    ) -> ResultValues<B> {
        self.call(ssa, path, args)
    }

    // sources: pred ● args...
    fn apply_cond(
        &self,
        ssa: &CoreSSA,
        args: Vec<Value<B>>,
        then: &Path,
        otherwise: &Path,
    ) -> ResultValues<B> {
        let mut args = args.into_iter();
        let pred = args
            .next()
            .ok_or(InterpreterError::ArityError(ssa.edge_id))?;
        let branch = if self.truthy(ssa, pred)? {
            then
        } else {
            otherwise
        };
        self.call(ssa, branch, args.collect())
    }

    fn apply_while(
        &self,
        ssa: &CoreSSA,
        args: Vec<Value<B>>,
        cond: &Path,
        body: &Path,
    ) -> ResultValues<B> {
        let mut state = args;
        loop {
            // cond returns updated leading state values followed by the predicate
            let mut updates = self.call(ssa, cond, state.clone())?;
            let pred = updates
                .pop()
                .ok_or(InterpreterError::TypeError(ssa.edge_id))?;
            if updates.len() > state.len() {
                return Err(InterpreterError::TypeError(ssa.edge_id));
            }
            for (slot, value) in state.iter_mut().zip(updates) {
                *slot = value;
            }

            if !self.truthy(ssa, pred)? {
                return Ok(state);
            }

            let n = state.len();
            state = self.call(ssa, body, state)?;
            if state.len() != n {
                return Err(InterpreterError::ArityError(ssa.edge_id));
            }
        }
    }

    /// A predicate is a tensor with exactly one element; nonzero means true.
    fn truthy(&self, ssa: &CoreSSA, pred: Value<B>) -> Result<bool> {
        let pred = self.backend.to_vec(to_tensor(ssa, pred)?);
        if pred.len() != 1 {
            return Err(InterpreterError::TypeError(ssa.edge_id));
        }
        Ok(pred.all_nonzero())
    }
}

fn apply_copy<B: Backend>(args: Vec<Value<B>>, ssa: &CoreSSA) -> ResultValues<B> {
    let [x] = get_exact_arity(ssa, args)?;
    Ok(vec![x; ssa.targets.len()])
}
