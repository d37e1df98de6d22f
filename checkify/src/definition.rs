//! Named definitions and the environment holding them.
//!
//! A [`Module`] is analogous to a function in the host language: it has a unique global name
//! (`path`) and a body (`def`). It can either be *inlined* into a term, or *called* by adding a
//! single [`Operation::Definition`] which the interpreter resolves against an [`Environment`].
use crate::category::core::{Object, Operation};
use crate::category::lang::{Builder, Term, Var};
use crate::path::Path;
use crate::util::build_typed;

use open_hypergraphs::lax::var;
use std::collections::HashMap;

/// Terms by name
#[derive(Clone, Debug, Default)]
pub struct Environment {
    pub definitions: HashMap<Path, Term>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the term of `module` under `module.path()`.
    pub fn define<const A: usize, const B: usize, M: Module<A, B>>(
        &mut self,
        module: &M,
    ) -> Result<(), InvalidDefinition> {
        let term = module.term()?;
        self.definitions.insert(module.path(), term);
        Ok(())
    }

    pub fn insert(&mut self, path: Path, term: Term) -> Option<Term> {
        self.definitions.insert(path, term)
    }

    pub fn get(&self, path: &Path) -> Option<&Term> {
        self.definitions.get(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.definitions.contains_key(path)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvalidDefinition {
    #[error("builder for `{0}` was still referenced after building")]
    Build(Path),

    #[error("definition `{path}` returns {got:?}, expected {expected:?}")]
    TargetSort {
        path: Path,
        expected: Vec<Object>,
        got: Vec<Object>,
    },
}

/// A definition of arity `A` and coarity `B`.
pub trait Module<const A: usize, const B: usize> {
    /// Unique global name in the environment
    fn path(&self) -> Path;

    /// The body of this definition, inlined into the provided Builder.
    fn def(&self, builder: &Builder, args: [Var; A]) -> [Var; B];

    ////////////////////////////////////////
    // Derived functions

    /// Object labels of sources and targets. Definitions take and return tensors.
    fn sort(&self) -> ([Object; A], [Object; B]) {
        ([Object::Tensor; A], [Object::Tensor; B])
    }

    /// alias for `def` which is clearer to use in context
    fn inline(&self, builder: &Builder, args: [Var; A]) -> [Var; B] {
        self.def(builder, args)
    }

    /// Create a single `Definition` operation in the graph with name `self.path()`.
    fn op(&self, builder: &Builder, args: [Var; A]) -> [Var; B] {
        let result_types = self.sort().1.to_vec();
        let results = var::operation(
            builder,
            &args,
            result_types,
            Operation::Definition(self.path()),
        );
        match results.try_into() {
            Ok(results) => results,
            // var::operation returns exactly one var per result type
            Err(_) => unreachable!(),
        }
    }

    /// Construct a standalone term for this definition
    fn term(&self) -> Result<Term, InvalidDefinition> {
        let (source_sort, target_sort) = self.sort();
        let term = build_typed(source_sort, |builder, args| {
            self.inline(builder, args).to_vec()
        })
        .map_err(|_| InvalidDefinition::Build(self.path()))?;

        let got: Vec<Object> = term
            .targets
            .iter()
            .map(|id| term.hypergraph.nodes[id.0])
            .collect();
        if got != target_sort {
            return Err(InvalidDefinition::TargetSort {
                path: self.path(),
                expected: target_sort.to_vec(),
                got,
            });
        }
        Ok(term)
    }
}

/// A function module returns a single var, which makes it easier to call.
pub trait FnModule<const N: usize>: Module<N, 1> {
    /// Like [`Module::op`] for coarity 1.
    fn call(&self, builder: &Builder, args: [Var; N]) -> Var {
        let [r] = self.op(builder, args);
        r
    }
}

impl<const N: usize, T: Module<N, 1>> FnModule<N> for T {}
