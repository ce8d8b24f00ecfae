use inkwell::execution_engine::JitFunction;
use inkwell::module::Module;
use inkwell::OptimizationLevel;
use log::debug;

use crate::error::Error;
use crate::llvm::ENTRY_POINT;

type EntryFn = unsafe extern "C" fn(*mut i32) -> i32;

/// Verifies a generated module. A well-typed, correctly lowered program
/// always passes; failure indicates a compiler bug and is reported rather
/// than aborted so tests can observe it.
pub fn verify(module: &Module) -> Result<(), Error> {
    module
        .verify()
        .map_err(|message| Error::Verify(message.to_string()))
}

/// Materialises the module into an MCJIT execution engine and hands `k` a
/// callable that packages its integer arguments into an array, invokes the
/// entry shim, and returns the result. The engine is released on return.
/// `malloc` resolves against the host process.
pub fn with_exec<R>(
    module: &Module,
    k: impl FnOnce(&dyn Fn(&[i32]) -> i32) -> R,
) -> Result<R, Error> {
    let engine = module
        .create_jit_execution_engine(OptimizationLevel::None)
        .map_err(|message| Error::Jit(message.to_string()))?;

    let entry: JitFunction<EntryFn> = unsafe { engine.get_function(ENTRY_POINT) }
        .map_err(|err| Error::Jit(err.to_string()))?;

    debug!("entry shim materialised, invoking");
    let run = move |args: &[i32]| -> i32 {
        let mut argv = args.to_vec();
        unsafe { entry.call(argv.as_mut_ptr()) }
    };
    Ok(k(&run))
}
