//! Simply: a JIT compiler for a simply-typed functional language.
//!
//! A surface program is type checked, closure converted into a flat
//! intermediate representation, lowered to LLVM IR, verified, and executed
//! through MCJIT. The reference evaluator in [`eval`] runs the same
//! programs directly over the surface AST.

use inkwell::context::Context;
use log::info;

pub mod ast;
pub mod error;
pub mod eval;
pub mod jit;
pub mod literal;
pub mod llvm;
pub mod mir;
pub mod programs;
pub mod transformer;
pub mod typecheck;
pub mod types;

pub use error::Error;

const MODULE_NAME: &str = "simply";

/// Type checks and closure converts a program.
pub fn compile_to_mir(program: &ast::Program) -> Result<Vec<mir::Global>, Error> {
    typecheck::typecheck_program(program)?;
    Ok(transformer::transform_program(program))
}

/// The printed LLVM module for a program, after verification.
pub fn emit_ir(program: &ast::Program) -> Result<String, Error> {
    let globals = compile_to_mir(program)?;
    let context = Context::create();
    let module = llvm::compile(&context, &globals, MODULE_NAME);
    jit::verify(&module)?;
    Ok(module.print_to_string().to_string())
}

/// Runs a program end to end: check, convert, lower, verify, JIT, and call
/// `main` on the given integers.
pub fn run_program(program: &ast::Program, args: &[i32]) -> Result<i32, Error> {
    let globals = compile_to_mir(program)?;
    let context = Context::create();
    let module = llvm::compile(&context, &globals, MODULE_NAME);
    jit::verify(&module)?;
    info!("module verified, executing with {:?}", args);
    jit::with_exec(&module, |run| run(args))
}
