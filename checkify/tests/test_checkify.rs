#![cfg(feature = "ndarray-backend")]

use checkify::category::lang::*;
use checkify::definition::{Environment, FnModule, Module};
use checkify::interpreter::backend::ndarray::NdArrayBackend;
use checkify::interpreter::{Interpreter, InterpreterError, TaggedVec};
use checkify::overlay::checked_path;
use checkify::category::core::Object;
use checkify::{
    ALL_CHECKS, AUTOMATIC_CHECKS, CheckifyError, DIV_CHECKS, ErrorCategory, FLOAT_CHECKS,
    INDEX_CHECKS, NAN_CHECKS, USER_CHECKS, check_error, checkify, checkify_default,
};
use test_log::test;

pub mod test_utils;
use test_models::*;
use test_utils::*;

fn reciprocal_term() -> Term {
    unary(|builder, x| {
        let one = constant_f32(builder, 1.0);
        div(builder, one, x)
    })
}

fn positive_term() -> Term {
    unary(|builder, x| {
        let zero = constant_f32(builder, 0.0);
        let positive = lt(builder, zero, x.clone());
        check(builder, positive, "x must be positive, got {}", &[x.clone()]);
        x
    })
}

fn gather_term() -> Term {
    binary(|builder, table, indices| index(builder, table, 0, indices))
}

#[test]
fn test_division_by_zero_returns_native_result() {
    let checked = checkify(&Environment::new(), reciprocal_term(), DIV_CHECKS).unwrap();

    let (error, results) = checked.call(&NdArrayBackend, vec![scalar_f32(0.0)]).unwrap();
    assert!(error.is_populated());
    assert_eq!(error.category(), Some(ErrorCategory::DivisionByZero));
    assert_eq!(error.message().as_deref(), Some("division by zero"));
    assert_eq!(error.payload()[0].data, TaggedVec::F32(vec![0.0]));
    assert_eq!(as_f32(&results[0]), vec![f32::INFINITY]);

    let (error, results) = checked.call(&NdArrayBackend, vec![scalar_f32(2.0)]).unwrap();
    assert!(!error.is_populated());
    assert_eq!(as_f32(&results[0]), vec![0.5]);
}

#[test]
fn test_user_check_captures_payload() {
    let checked = checkify_default(&Environment::new(), positive_term()).unwrap();

    let (error, results) = checked.call(&NdArrayBackend, vec![scalar_f32(-1.0)]).unwrap();
    assert_eq!(error.category(), Some(ErrorCategory::UserCheck));
    assert_eq!(error.payload().len(), 1);
    assert_eq!(error.payload()[0].data, TaggedVec::F32(vec![-1.0]));
    assert_eq!(
        error.message().as_deref(),
        Some("x must be positive, got -1")
    );
    assert_eq!(as_f32(&results[0]), vec![-1.0]);

    let (error, _) = checked.call(&NdArrayBackend, vec![scalar_f32(1.0)]).unwrap();
    assert!(!error.is_populated());
}

#[test]
fn test_user_checks_are_always_active() {
    let checks = DIV_CHECKS;
    assert!(!checks.contains(USER_CHECKS));
    let checked = checkify(&Environment::new(), positive_term(), checks).unwrap();
    let (error, _) = checked.call(&NdArrayBackend, vec![scalar_f32(-2.0)]).unwrap();
    assert_eq!(error.category(), Some(ErrorCategory::UserCheck));
}

#[test]
fn test_no_fault_leaves_results_unchanged() {
    let term = binary(|builder, x, y| {
        let z = x.clone() * y.clone() + x;
        let e = exp(builder, z);
        div(builder, e, y)
    });
    let args = || vec![vector_f32(vec![1.0, 2.0]), vector_f32(vec![4.0, 0.5])];

    let plain = Interpreter::new(NdArrayBackend, Environment::new())
        .run(term.clone(), args())
        .unwrap();
    let checked = checkify(&Environment::new(), term, ALL_CHECKS).unwrap();
    let (error, results) = checked.call(&NdArrayBackend, args()).unwrap();

    assert!(!error.is_populated());
    assert_eq!(results.len(), 1);
    assert!(allclose(&as_f32(&results[0]), &as_f32(&plain[0])));
}

#[test]
fn test_first_fault_wins() {
    let term = unary(|builder, x| {
        let zero = constant_f32(builder, 0.0);
        let positive = lt(builder, zero, x.clone());
        check(builder, positive, "first: {}", &[x.clone()]);

        let one = constant_f32(builder, 1.0);
        let above_one = lt(builder, one, x.clone());
        check(builder, above_one, "second: {}", &[x.clone()]);
        x
    });
    let checked = checkify_default(&Environment::new(), term).unwrap();

    let (error, _) = checked.call(&NdArrayBackend, vec![scalar_f32(-1.0)]).unwrap();
    assert_eq!(error.message().as_deref(), Some("first: -1"));

    let (error, _) = checked.call(&NdArrayBackend, vec![scalar_f32(0.5)]).unwrap();
    assert_eq!(error.message().as_deref(), Some("second: 0.5"));
}

#[test]
fn test_division_reported_before_non_finite_result() {
    let checked = checkify(&Environment::new(), reciprocal_term(), AUTOMATIC_CHECKS).unwrap();
    let (error, _) = checked.call(&NdArrayBackend, vec![scalar_f32(0.0)]).unwrap();
    assert_eq!(error.category(), Some(ErrorCategory::DivisionByZero));

    // without div checks, the infinite quotient is reported instead
    let checked = checkify(&Environment::new(), reciprocal_term(), NAN_CHECKS).unwrap();
    let (error, _) = checked.call(&NdArrayBackend, vec![scalar_f32(0.0)]).unwrap();
    assert_eq!(error.category(), Some(ErrorCategory::NonFinite));
    assert_eq!(
        error.message().as_deref(),
        Some("non-finite value produced by `div`")
    );
    let payload: Vec<_> = error.payload().iter().map(|p| p.data.clone()).collect();
    assert_eq!(
        payload,
        vec![TaggedVec::F32(vec![1.0]), TaggedVec::F32(vec![0.0])]
    );
}

#[test]
fn test_non_finite_reported_beside_propagated_nan() {
    let term = binary(|builder, x, y| div(builder, x, y));
    let checked = checkify(&Environment::new(), term, NAN_CHECKS).unwrap();

    // element 0 propagates the NaN input, element 1 is a fresh infinity
    let args = vec![vector_f32(vec![f32::NAN, 1.0]), vector_f32(vec![1.0, 0.0])];
    let (error, results) = checked.call(&NdArrayBackend, args).unwrap();
    assert_eq!(error.category(), Some(ErrorCategory::NonFinite));
    assert_eq!(
        error.message().as_deref(),
        Some("non-finite value produced by `div`")
    );
    let results = as_f32(&results[0]);
    assert!(results[0].is_nan());
    assert_eq!(results[1], f32::INFINITY);

    // a NaN passed straight through is not attributed to `div`
    let args = vec![vector_f32(vec![f32::NAN, 1.0]), vector_f32(vec![1.0, 2.0])];
    let (error, _) = checked.call(&NdArrayBackend, args).unwrap();
    assert!(!error.is_populated(), "reported {error}");
}

#[test]
fn test_reduction_of_non_finite_input_is_not_reported() {
    let term = unary(|builder, x| sum(builder, x));
    let checked = checkify(&Environment::new(), term, NAN_CHECKS).unwrap();

    let (error, results) = checked
        .call(&NdArrayBackend, vec![vector_f32(vec![f32::NAN, 1.0])])
        .unwrap();
    assert!(!error.is_populated(), "reported {error}");
    assert!(as_f32(&results[0])[0].is_nan());

    let (error, _) = checked
        .call(&NdArrayBackend, vec![vector_f32(vec![f32::MAX, f32::MAX])])
        .unwrap();
    assert_eq!(error.category(), Some(ErrorCategory::NonFinite));
}

#[test]
fn test_inactive_categories_are_not_reported() {
    for checks in [USER_CHECKS, INDEX_CHECKS] {
        let checked = checkify(&Environment::new(), reciprocal_term(), checks).unwrap();
        let (error, results) = checked.call(&NdArrayBackend, vec![scalar_f32(0.0)]).unwrap();
        assert!(!error.is_populated(), "{checks:?} reported {error}");
        assert_eq!(as_f32(&results[0]), vec![f32::INFINITY]);
    }
}

#[test]
fn test_log_of_negative_is_non_finite() {
    let term = unary(|builder, x| {
        let y = log(builder, x);
        let two = constant_f32(builder, 2.0);
        y * two
    });
    let checked = checkify(&Environment::new(), term, FLOAT_CHECKS).unwrap();

    let (error, results) = checked.call(&NdArrayBackend, vec![scalar_f32(-1.0)]).unwrap();
    assert_eq!(error.category(), Some(ErrorCategory::NonFinite));
    // the multiplication propagates NaN, but only `log` produced it
    assert_eq!(
        error.message().as_deref(),
        Some("non-finite value produced by `log`")
    );
    assert_eq!(error.payload()[0].data, TaggedVec::F32(vec![-1.0]));
    assert!(as_f32(&results[0])[0].is_nan());

    let (error, results) = checked.call(&NdArrayBackend, vec![scalar_f32(1.0)]).unwrap();
    assert!(!error.is_populated());
    assert_eq!(as_f32(&results[0]), vec![0.0]);
}

#[test]
fn test_out_of_bounds_index() {
    let checked = checkify(&Environment::new(), gather_term(), INDEX_CHECKS).unwrap();
    let table = || vector_f32(vec![10.0, 20.0, 30.0]);

    let (error, results) = checked
        .call(&NdArrayBackend, vec![table(), vector_u32(vec![1, 5])])
        .unwrap();
    assert_eq!(error.category(), Some(ErrorCategory::OutOfBounds));
    assert_eq!(
        error.message().as_deref(),
        Some("index 5 is out of bounds for axis 0 with size 3")
    );
    let payload: Vec<_> = error.payload().iter().map(|p| p.data.clone()).collect();
    assert_eq!(
        payload,
        vec![
            TaggedVec::U32(vec![5]),
            TaggedVec::U32(vec![0]),
            TaggedVec::U32(vec![3])
        ]
    );
    // native gather clamps
    assert_eq!(as_f32(&results[0]), vec![20.0, 30.0]);

    let (error, results) = checked
        .call(&NdArrayBackend, vec![table(), vector_u32(vec![2, 0])])
        .unwrap();
    assert!(!error.is_populated());
    assert_eq!(as_f32(&results[0]), vec![30.0, 10.0]);
}

#[test]
fn test_branch_not_taken_contributes_nothing() {
    let env = test_env();
    // if x == 0 { x } else { 1 / x }
    let term = unary(|builder, x| {
        let zero = constant_f32(builder, 0.0);
        let is_zero = eq(builder, x.clone(), zero);
        let r = cond(
            builder,
            is_zero,
            Identity.path(),
            Reciprocal.path(),
            &[x],
            1,
        );
        r.into_iter().next().unwrap()
    });
    let checked = checkify(&env, term, ALL_CHECKS).unwrap();

    let (error, results) = checked.call(&NdArrayBackend, vec![scalar_f32(0.0)]).unwrap();
    assert!(!error.is_populated());
    assert_eq!(as_f32(&results[0]), vec![0.0]);

    let (error, results) = checked.call(&NdArrayBackend, vec![scalar_f32(4.0)]).unwrap();
    assert!(!error.is_populated());
    assert_eq!(as_f32(&results[0]), vec![0.25]);
}

#[test]
fn test_fault_in_taken_branch() {
    let env = test_env();
    // if x == 0 { 1 / x } else { x }
    let term = unary(|builder, x| {
        let zero = constant_f32(builder, 0.0);
        let is_zero = eq(builder, x.clone(), zero);
        let r = cond(
            builder,
            is_zero,
            Reciprocal.path(),
            Identity.path(),
            &[x],
            1,
        );
        r.into_iter().next().unwrap()
    });
    let checked = checkify(&env, term, DIV_CHECKS).unwrap();
    let (error, results) = checked.call(&NdArrayBackend, vec![scalar_f32(0.0)]).unwrap();
    assert_eq!(error.category(), Some(ErrorCategory::DivisionByZero));
    assert_eq!(as_f32(&results[0]), vec![f32::INFINITY]);
}

#[test]
fn test_loop_reports_first_failing_iteration() {
    let env = test_env();
    let term = binary(|builder, i, n| {
        let state = while_loop(
            builder,
            CountBelow.path(),
            BoundedIncrement.path(),
            &[i, n],
        );
        state[0].clone()
    });
    let checked = checkify_default(&env, term).unwrap();

    let (error, results) = checked
        .call(&NdArrayBackend, vec![scalar_f32(0.0), scalar_f32(5.0)])
        .unwrap();
    assert_eq!(error.category(), Some(ErrorCategory::UserCheck));
    assert_eq!(error.payload()[0].data, TaggedVec::F32(vec![3.0]));
    assert_eq!(
        error.message().as_deref(),
        Some("i must stay below 3, got 3")
    );
    // the loop still runs to completion
    assert_eq!(as_f32(&results[0]), vec![5.0]);

    let (error, results) = checked
        .call(&NdArrayBackend, vec![scalar_f32(0.0), scalar_f32(2.0)])
        .unwrap();
    assert!(!error.is_populated());
    assert_eq!(as_f32(&results[0]), vec![2.0]);
}

#[test]
fn test_nested_definitions_are_instrumented() {
    let env = test_env();
    let term = unary(|builder, x| SafeReciprocal.call(builder, [x]));
    let checked = checkify(&env, term, ALL_CHECKS).unwrap();

    // only reachable definitions are instrumented
    let mut instrumented: Vec<String> = checked
        .env
        .definitions
        .keys()
        .map(|p| p.to_string())
        .collect();
    instrumented.sort();
    assert_eq!(
        instrumented,
        vec!["checkify.test.reciprocal", "checkify.test.safe_reciprocal"]
    );
    assert!(checked.env.contains(&checked_path(&Reciprocal.path())));

    let (error, _) = checked.call(&NdArrayBackend, vec![scalar_f32(-1.0)]).unwrap();
    assert_eq!(
        error.message().as_deref(),
        Some("x must be positive, got -1")
    );

    // the assertion precedes the division inside the call
    let (error, results) = checked.call(&NdArrayBackend, vec![scalar_f32(0.0)]).unwrap();
    assert_eq!(error.category(), Some(ErrorCategory::UserCheck));
    assert_eq!(as_f32(&results[0]), vec![f32::INFINITY]);

    let (error, results) = checked.call(&NdArrayBackend, vec![scalar_f32(4.0)]).unwrap();
    assert!(!error.is_populated());
    assert_eq!(as_f32(&results[0]), vec![0.25]);
}

#[test]
fn test_missing_definition() {
    let term = unary(|builder, x| Reciprocal.call(builder, [x]));
    let result = checkify(&Environment::new(), term, ALL_CHECKS);
    assert_eq!(
        result.err(),
        Some(CheckifyError::MissingDefinition(Reciprocal.path()))
    );
}

#[test]
fn test_checkify_twice_is_rejected() {
    let checked = checkify_default(&Environment::new(), reciprocal_term()).unwrap();
    let result = checkify_default(&checked.env, checked.term.clone());
    assert!(matches!(result, Err(CheckifyError::AlreadyChecked(_))));
}

#[test]
fn test_check_without_checkify_is_rejected() {
    let interpreter = Interpreter::new(NdArrayBackend, Environment::new());
    // rejected whatever the predicate
    for x in [-1.0, 1.0] {
        let result = interpreter.run(positive_term(), vec![scalar_f32(x)]);
        assert!(matches!(
            result,
            Err(InterpreterError::UncheckedAssertion(_))
        ));
    }
}

#[test]
fn test_malformed_check_messages() {
    let builder: Builder = std::rc::Rc::new(std::cell::RefCell::new(Term::empty()));
    let x = Var::new(builder.clone(), Object::Tensor);

    let result = try_check(&builder, x.clone(), "unbalanced {", &[]);
    assert!(matches!(
        result,
        Err(CheckifyError::MalformedTemplate { .. })
    ));

    let result = try_check(&builder, x.clone(), "{0} and {1}", &[x.clone()]);
    assert!(matches!(
        result,
        Err(CheckifyError::PayloadMismatch {
            expected: 2,
            given: 1,
            ..
        })
    ));
}

#[test]
fn test_check_error() {
    let checked = checkify_default(&Environment::new(), positive_term()).unwrap();

    let (error, _) = checked.call(&NdArrayBackend, vec![scalar_f32(1.0)]).unwrap();
    assert!(check_error(&error).is_ok());
    // no-op on an empty error, however often it is called
    assert!(check_error(&error).is_ok());

    let (error, _) = checked.call(&NdArrayBackend, vec![scalar_f32(-3.0)]).unwrap();
    let failed = check_error(&error).unwrap_err();
    assert_eq!(failed.category, ErrorCategory::UserCheck);
    assert_eq!(failed.to_string(), "user_check: x must be positive, got -3");
    assert_eq!(error.throw().unwrap_err(), failed);
}

#[test]
fn test_concurrent_calls_get_independent_errors() {
    let checked = checkify(&Environment::new(), reciprocal_term(), DIV_CHECKS).unwrap();

    std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let checked = &checked;
                s.spawn(move || {
                    let x = (i % 2) as f32;
                    let (error, _) = checked.call(&NdArrayBackend, vec![scalar_f32(x)]).unwrap();
                    (x, error)
                })
            })
            .collect();

        for handle in handles {
            let (x, error) = handle.join().unwrap();
            assert_eq!(error.is_populated(), x == 0.0);
        }
    });
}

#[test]
fn test_checked_term_signature() {
    let checked = checkify_default(&Environment::new(), reciprocal_term()).unwrap();
    let sorts: Vec<_> = checked
        .term
        .targets
        .iter()
        .map(|t| checked.term.hypergraph.nodes[t.0])
        .collect();
    assert_eq!(sorts, vec![Object::Error, Object::Tensor]);
    assert_eq!(checked.term.sources.len(), 1);
    assert_eq!(checked.checks, AUTOMATIC_CHECKS);
}
