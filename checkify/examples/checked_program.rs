use anyhow::Result;
use clap::Parser;

use checkify::interpreter::backend::ndarray::NdArrayBackend;
use checkify::prelude::*;

#[derive(Parser, Debug)]
struct Args {
    /// Comma-separated checks to enable: all, automatic, user, float, nan, div, index
    #[arg(short = 'c', long, default_value = "automatic")]
    checks: CheckSet,

    /// Input to the program
    #[arg(short = 'x', long, default_value_t = 2.0, allow_hyphen_values = true)]
    x: f32,
}

/// `(x, table) ↦ (1/x, log(1/x), table[x])`, asserting `x > 0`
fn program() -> Result<Term> {
    build_typed([Object::Tensor; 2], |builder, [x, table]| {
        let zero = constant_f32(builder, 0.0);
        let positive = lt(builder, zero, x.clone());
        check(builder, positive, "x must be positive, got {}", &[x.clone()]);

        let one = constant_f32(builder, 1.0);
        let reciprocal = div(builder, one, x.clone());
        let log_reciprocal = log(builder, reciprocal.clone());

        let i = cast(builder, x, Dtype::U32);
        let i = reshape(builder, i, Shape(vec![1]));
        let entry = index(builder, table, 0, i);

        vec![reciprocal, log_reciprocal, entry]
    })
    .map_err(|_| anyhow::anyhow!("builder still referenced after building program"))
}

pub fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let checked = checkify(&Environment::new(), program()?, args.checks)?;
    let backend = NdArrayBackend;
    let x = tensor(&backend, vec![args.x], Shape::scalar())
        .map_err(|e| anyhow::anyhow!("{e:?}"))?;
    let table = tensor(&backend, vec![1.0f32, 10.0, 100.0, 1000.0], Shape(vec![4]))
        .map_err(|e| anyhow::anyhow!("{e:?}"))?;

    let (error, results) = checked.call(&backend, vec![x, table])?;
    for value in &results {
        println!("{value:?}");
    }
    println!("error: {error}");

    check_error(&error)?;
    Ok(())
}
