use inkwell::context::Context;

use simply::ast::{Def, Expr, Program};
use simply::error::Error;
use simply::types::Type;
use simply::{compile_to_mir, emit_ir, eval, jit, llvm, mir, programs, run_program, typecheck};

#[test]
fn seed_scenarios_run_to_their_expected_results() {
    let _ = env_logger::try_init();
    for example in programs::all() {
        for (args, expected) in &example.runs {
            assert_eq!(
                run_program(&example.program, args),
                Ok(*expected),
                "{} {:?}",
                example.name,
                args
            );
        }
    }
}

#[test]
fn compiled_programs_agree_with_the_reference_evaluator() {
    let _ = env_logger::try_init();
    for example in programs::all() {
        for (args, _) in &example.runs {
            let compiled = run_program(&example.program, args);
            let evaluated = eval::run_program(&example.program, args);
            assert_eq!(compiled, evaluated, "{} {:?}", example.name, args);
        }
    }
}

#[test]
fn every_catalogue_program_typechecks_and_verifies() {
    let _ = env_logger::try_init();
    for example in programs::all() {
        assert_eq!(
            typecheck::typecheck_program(&example.program),
            Ok(()),
            "{}",
            example.name
        );
        assert!(emit_ir(&example.program).is_ok(), "{}", example.name);
    }
}

#[test]
fn compilation_is_deterministic() {
    let _ = env_logger::try_init();
    for example in programs::all() {
        let first = emit_ir(&example.program).unwrap();
        let second = emit_ir(&example.program).unwrap();
        assert_eq!(first, second, "{} modules differ across runs", example.name);
    }
}

#[test]
fn converted_globals_are_closed_and_saturated() {
    let _ = env_logger::try_init();
    for example in programs::all() {
        let globals = compile_to_mir(&example.program).unwrap();
        assert!(
            globals.iter().any(|global| global.name == "main"),
            "{} lost its main",
            example.name
        );
        for global in &globals {
            assert_eq!(
                global.unresolved_locals(),
                Vec::<String>::new(),
                "{}::{} has unresolved locals",
                example.name,
                global.name
            );
            assert_saturated(&global.body, &example.name, &global.name);
        }
    }
}

fn assert_saturated(expr: &mir::Expr, example: &str, global: &str) {
    match expr {
        mir::Expr::Lit(_) | mir::Expr::Local { .. } => {}
        mir::Expr::Let { aexpr, body, .. } => {
            assert_saturated(aexpr, example, global);
            assert_saturated(body, example, global);
        }
        mir::Expr::If { cond, texpr, fexpr } => {
            assert_saturated(cond, example, global);
            assert_saturated(texpr, example, global);
            assert_saturated(fexpr, example, global);
        }
        mir::Expr::BinOp { lhs, rhs, .. } => {
            assert_saturated(lhs, example, global);
            assert_saturated(rhs, example, global);
        }
        mir::Expr::Closure { env, .. } => {
            for captured in env {
                assert_saturated(captured, example, global);
            }
        }
        mir::Expr::CallKnown { args, .. } => {
            for arg in args {
                assert_saturated(arg, example, global);
            }
        }
        mir::Expr::CallClosure { closure, args, ty } => {
            assert_eq!(
                args.len(),
                ty.arity(),
                "unsaturated closure call in {}::{}",
                example,
                global
            );
            assert_saturated(closure, example, global);
            for arg in args {
                assert_saturated(arg, example, global);
            }
        }
    }
}

#[test]
fn type_errors_halt_the_pipeline() {
    let _ = env_logger::try_init();
    let program = Program::new(vec![Def::new("main", Type::Int, Expr::var("missing"))]);
    assert_eq!(
        run_program(&program, &[]),
        Err(Error::UnboundVariable("missing".to_string()))
    );
}

#[test]
fn verification_rejects_a_malformed_module() {
    let _ = env_logger::try_init();
    // A hand-built global whose body does not match its declared return
    // type; the checker would never let this through.
    let globals = vec![mir::Global {
        name: "main".to_string(),
        env: Vec::new(),
        params: Vec::new(),
        ret: Type::Int,
        body: mir::Expr::Lit(simply::literal::Literal::Bool(true)),
    }];

    let context = Context::create();
    let module = llvm::compile(&context, &globals, "malformed");
    match jit::verify(&module) {
        Err(Error::Verify(_)) => {}
        other => panic!("expected a verification failure, got {:?}", other),
    }
}

#[test]
fn generated_modules_follow_the_naming_conventions() {
    let _ = env_logger::try_init();
    let ir = emit_ir(&programs::ho_add().program).unwrap();
    assert!(ir.contains("__entry_point"));
    assert!(ir.contains("fastcc"));
    assert!(ir.contains("malloc"));
    // The hoisted argument lambda and its wrapper.
    assert!(ir.contains("_main_lambda_0"));
    assert!(ir.contains("$wrapped"));
}
