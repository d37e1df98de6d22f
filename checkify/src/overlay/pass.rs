//! The `checkify` pass: thread an error wire through a term.
//!
//! Operations are visited in program order (see [`crate::ssa::ssa`]). Each operation whose
//! faults are enabled gets a [`Guard`] on the error wire, so guards run in the order the
//! operations were written and the first fault reached wins. Calls to definitions, conditionals
//! and loops are redirected to instrumented copies of their definitions under the `checkify.`
//! prefix, which take and return the error wire as their first value.
use super::checks::{AUTOMATIC_CHECKS, CheckSet};
use super::error::{CheckifyError, Error, ErrorCategory};
use super::template::Template;
use crate::category::core::{Guard, GuardKind, Object, Operation, ScalarOp, TensorOp};
use crate::category::lang::Term;
use crate::definition::Environment;
use crate::interpreter::{Backend, Interpreter, InterpreterError, Value};
use crate::path::Path;
use crate::ssa::{SSA, SSAError, ssa};

use open_hypergraphs::lax::{self, NodeId, OpenHypergraph};
use std::collections::{HashMap, HashSet};

/// A term instrumented by [`checkify`].
///
/// `term` maps the original arguments to `Error ● original results`; `env` holds the
/// instrumented definitions it calls.
#[derive(Clone, Debug)]
pub struct Checked {
    pub term: Term,
    pub env: Environment,
    pub checks: CheckSet,
}

impl Checked {
    /// Run the checked term. Each call starts from a fresh empty [`Error`].
    pub fn call<B: Backend>(
        &self,
        backend: &B,
        args: Vec<Value<B>>,
    ) -> Result<(Error, Vec<Value<B>>), InterpreterError> {
        let interpreter = Interpreter::new(backend.clone(), self.env.clone());
        let mut results = interpreter.run(self.term.clone(), args)?.into_iter();
        match results.next() {
            Some(Value::Error(error)) => Ok((error, results.collect())),
            _ => Err(InterpreterError::MissingError),
        }
    }
}

/// Instrument `term` and every definition it reaches with the faults in `checks`.
/// User checks are always instrumented.
pub fn checkify(env: &Environment, term: Term, checks: CheckSet) -> Result<Checked, CheckifyError> {
    let mut checked_env = Environment::new();
    for path in reachable_definitions(env, &term)? {
        let definition = env
            .get(&path)
            .ok_or_else(|| CheckifyError::MissingDefinition(path.clone()))?;
        let instrumented = instrument(definition.clone(), &path.to_string(), checks, false)?;
        checked_env.insert(checked_path(&path), instrumented);
    }

    let term = instrument(term, "<term>", checks, true)?;
    Ok(Checked {
        term,
        env: checked_env,
        checks,
    })
}

/// [`checkify`] with [`AUTOMATIC_CHECKS`]
pub fn checkify_default(env: &Environment, term: Term) -> Result<Checked, CheckifyError> {
    checkify(env, term, AUTOMATIC_CHECKS)
}

/// Name of the instrumented version of the definition at `path`
pub fn checked_path(path: &Path) -> Path {
    crate::path!["checkify"].concat(path)
}

// Definitions called (transitively) from `term`
fn reachable_definitions(env: &Environment, term: &Term) -> Result<Vec<Path>, CheckifyError> {
    let mut seen = HashSet::new();
    let mut order = Vec::new();
    let mut stack = called_paths(term);
    stack.reverse();

    while let Some(path) = stack.pop() {
        if !seen.insert(path.clone()) {
            continue;
        }
        let definition = env
            .get(&path)
            .ok_or_else(|| CheckifyError::MissingDefinition(path.clone()))?;
        let mut callees = called_paths(definition);
        callees.reverse();
        stack.extend(callees);
        order.push(path);
    }
    Ok(order)
}

fn called_paths(term: &Term) -> Vec<Path> {
    term.hypergraph
        .edges
        .iter()
        .flat_map(|op| match op {
            Operation::Definition(path) => vec![path.clone()],
            Operation::Cond { then, otherwise } => vec![then.clone(), otherwise.clone()],
            Operation::While { cond, body } => vec![cond.clone(), body.clone()],
            _ => vec![],
        })
        .collect()
}

fn instrument(
    term: Term,
    name: &str,
    checks: CheckSet,
    top_level: bool,
) -> Result<Term, CheckifyError> {
    let already_checked = term.hypergraph.nodes.contains(&Object::Error)
        || term
            .hypergraph
            .edges
            .iter()
            .any(|op| matches!(op, Operation::EmptyError | Operation::Guard(_)));
    if already_checked {
        return Err(CheckifyError::AlreadyChecked(name.to_string()));
    }

    let decomposition = ssa(term).map_err(|err| match err {
        SSAError::Cycle => CheckifyError::CyclicTerm(name.to_string()),
    })?;

    let mut rewriter = Rewriter::new(checks);
    let sources: Vec<NodeId> = decomposition
        .sources
        .iter()
        .map(|node| rewriter.node(node))
        .collect();

    let initial_error = if top_level {
        let error = rewriter.term.new_node(Object::Error);
        rewriter.edge(Operation::EmptyError, vec![], vec![error]);
        rewriter.term.sources = sources;
        error
    } else {
        let error = rewriter.term.new_node(Object::Error);
        rewriter.term.sources = std::iter::once(error).chain(sources).collect();
        error
    };
    rewriter.error = Some(initial_error);

    for op in decomposition.ops() {
        rewriter.rewrite(op)?;
    }

    let targets: Vec<NodeId> = decomposition
        .targets
        .iter()
        .map(|node| rewriter.node(node))
        .collect();
    let error = rewriter.current_error();
    rewriter.term.targets = std::iter::once(error).chain(targets).collect();

    log::info!(
        "checkify: instrumented `{name}` ({} operations, {} guards)",
        decomposition.len(),
        rewriter.guards
    );
    if log::log_enabled!(log::Level::Trace) {
        for edge in rewriter.term.hypergraph.edges.iter() {
            log::trace!("  {edge}");
        }
    }
    Ok(rewriter.term)
}

struct Rewriter {
    checks: CheckSet,
    term: Term,
    /// nodes of the original term to nodes of the instrumented term
    nodes: HashMap<NodeId, NodeId>,
    /// the current end of the error wire
    error: Option<NodeId>,
    guards: usize,
}

impl Rewriter {
    fn new(checks: CheckSet) -> Self {
        Rewriter {
            checks,
            term: OpenHypergraph::empty(),
            nodes: HashMap::new(),
            error: None,
            guards: 0,
        }
    }

    fn node(&mut self, (id, label): &(NodeId, Object)) -> NodeId {
        *self
            .nodes
            .entry(*id)
            .or_insert_with(|| self.term.new_node(*label))
    }

    fn nodes(&mut self, nodes: &[(NodeId, Object)]) -> Vec<NodeId> {
        nodes.iter().map(|node| self.node(node)).collect()
    }

    fn current_error(&self) -> NodeId {
        match self.error {
            Some(error) => error,
            None => unreachable!("error wire is created before rewriting"),
        }
    }

    fn edge(&mut self, op: Operation, sources: Vec<NodeId>, targets: Vec<NodeId>) {
        self.term.new_edge(op, lax::Hyperedge { sources, targets });
    }

    /// Fan out `node` into two fresh nodes
    fn copy(&mut self, node: NodeId) -> (NodeId, NodeId) {
        let label = self.term.hypergraph.nodes[node.0];
        let (a, b) = (self.term.new_node(label), self.term.new_node(label));
        self.edge(Operation::Copy, vec![node], vec![a, b]);
        (a, b)
    }

    fn copies(&mut self, nodes: Vec<NodeId>) -> (Vec<NodeId>, Vec<NodeId>) {
        nodes.into_iter().map(|node| self.copy(node)).unzip()
    }

    /// Append a guard on `captured` to the error wire
    fn guard(&mut self, kind: GuardKind, message: Template, captured: Vec<NodeId>) {
        let error = self.current_error();
        let next = self.term.new_node(Object::Error);
        let sources = std::iter::once(error).chain(captured).collect();
        self.edge(Operation::Guard(Guard { kind, message }), sources, vec![next]);
        self.error = Some(next);
        self.guards += 1;
    }

    /// Call an instrumented definition, threading the error as the first value.
    /// `prefix` values (e.g. the predicate of a `Cond`) come before the error.
    fn call(
        &mut self,
        op: Operation,
        prefix: Vec<NodeId>,
        args: Vec<NodeId>,
        targets: Vec<NodeId>,
    ) {
        let error = self.current_error();
        let next = self.term.new_node(Object::Error);
        let sources = prefix
            .into_iter()
            .chain(std::iter::once(error))
            .chain(args)
            .collect();
        let targets = std::iter::once(next).chain(targets).collect();
        self.edge(op, sources, targets);
        self.error = Some(next);
    }

    fn rewrite(&mut self, ssa: &SSA<Object, Operation>) -> Result<(), CheckifyError> {
        let sources = self.nodes(&ssa.sources);
        let targets = self.nodes(&ssa.targets);

        match &ssa.op {
            Operation::Check(message) => {
                self.guard(GuardKind::User, message.clone(), sources);
            }

            Operation::Definition(path) => {
                self.call(
                    Operation::Definition(checked_path(path)),
                    vec![],
                    sources,
                    targets,
                );
            }

            Operation::Cond { then, otherwise } => {
                let mut args = sources.into_iter();
                let pred: Vec<NodeId> = args.next().into_iter().collect();
                let op = Operation::Cond {
                    then: checked_path(then),
                    otherwise: checked_path(otherwise),
                };
                self.call(op, pred, args.collect(), targets);
            }

            Operation::While { cond, body } => {
                let op = Operation::While {
                    cond: checked_path(cond),
                    body: checked_path(body),
                };
                self.call(op, vec![], sources, targets);
            }

            Operation::Tensor(TensorOp::Index(dim))
                if self.checks.enables(ErrorCategory::OutOfBounds) =>
            {
                let (sources, captured) = self.copies(sources);
                let message =
                    Template::parse("index {0} is out of bounds for axis {1} with size {2}")?;
                self.guard(GuardKind::OutOfBounds { dim: *dim }, message, captured);
                self.edge(ssa.op.clone(), sources, targets);
            }

            Operation::Tensor(op) => {
                let mut sources = sources;
                let div_checked = self.checks.enables(ErrorCategory::DivisionByZero);
                if is_division(op) && div_checked && sources.len() == 2 {
                    let (divisor, captured) = self.copy(sources[1]);
                    sources[1] = divisor;
                    let message = Template::literal("division by zero");
                    self.guard(GuardKind::DivisionByZero, message, vec![captured]);
                }

                let nan_checked = self.checks.enables(ErrorCategory::NonFinite);
                if produces_floats(op) && nan_checked && targets.len() == 1 {
                    let arity = sources.len();
                    let (sources, mut captured) = self.copies(sources);
                    let result = self.term.new_node(Object::Tensor);
                    self.edge(ssa.op.clone(), sources, vec![result]);

                    let captured_result = self.term.new_node(Object::Tensor);
                    let copies = vec![targets[0], captured_result];
                    self.edge(Operation::Copy, vec![result], copies);
                    captured.push(captured_result);

                    let message =
                        Template::literal(&format!("non-finite value produced by `{op}`"));
                    self.guard(GuardKind::NonFinite { arity }, message, captured);
                } else {
                    self.edge(ssa.op.clone(), sources, targets);
                }
            }

            Operation::Literal(_) | Operation::Copy => {
                self.edge(ssa.op.clone(), sources, targets);
            }

            // rejected before rewriting
            Operation::EmptyError | Operation::Guard(_) => unreachable!(),
        }
        Ok(())
    }
}

fn is_division(op: &TensorOp) -> bool {
    matches!(op, TensorOp::Map(ScalarOp::Div))
}

// Operations which can turn finite floats into NaN or infinity
fn produces_floats(op: &TensorOp) -> bool {
    match op {
        TensorOp::Map(scalar_op) => !scalar_op.is_comparison(),
        TensorOp::MatMul | TensorOp::Sum => true,
        _ => false,
    }
}
