use crate::category::core::{Object, Operation};
use crate::category::lang::{Builder, Var};
use open_hypergraphs::lax::var;

/// Build a [`crate::category::lang::Term`] whose sources are labelled `sources`.
/// `f` receives the builder and one var per source, and returns the vars of the targets.
///
/// Fails with the builder if `f` kept a reference to it.
pub fn build_typed<const ARITY: usize, F>(
    sources: [Object; ARITY],
    f: F,
) -> var::BuildResult<Object, Operation>
where
    F: Fn(&Builder, [Var; ARITY]) -> Vec<Var>,
{
    var::build(move |builder| {
        let args: [Var; ARITY] = sources.map(|label| Var::new(builder.clone(), label));
        let source_vars = args.to_vec();
        (source_vars, f(builder, args))
    })
}
