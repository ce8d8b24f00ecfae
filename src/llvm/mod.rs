use std::collections::{HashMap, HashSet};

use inkwell::{
    basic_block::BasicBlock,
    builder::Builder,
    context::Context,
    llvm_sys::LLVMCallConv,
    module::Module,
    types::{BasicMetadataTypeEnum, BasicType, BasicTypeEnum, FunctionType, PointerType, StructType},
    values::{BasicValueEnum, CallSiteValue, FunctionValue},
    AddressSpace,
};
use log::debug;

use crate::mir;
use crate::types::Type;

mod expr;
mod global;

/// Calling convention for every internally generated function. `malloc`
/// keeps the C convention.
const FAST_CALL_CONV: u32 = LLVMCallConv::LLVMFastCallConv as u32;

/// Public entry symbol; marshals an argument array into a direct call of
/// the user `main`.
pub const ENTRY_POINT: &str = "__entry_point";

struct LLVMCodegen<'a, 'ctx> {
    context: &'ctx Context,
    builder: &'a Builder<'ctx>,
    module: &'a Module<'ctx>,

    /// MIR locals of the function currently being emitted.
    variables: HashMap<String, BasicValueEnum<'ctx>>,
    /// Globals whose LLVM signature starts with an environment pointer.
    envful: HashSet<String>,

    cur_function: Option<FunctionValue<'ctx>>,
}

impl<'a, 'ctx> LLVMCodegen<'a, 'ctx> {
    fn new(
        context: &'ctx Context,
        builder: &'a Builder<'ctx>,
        module: &'a Module<'ctx>,
    ) -> LLVMCodegen<'a, 'ctx> {
        LLVMCodegen {
            context,
            builder,
            module,
            variables: HashMap::new(),
            envful: HashSet::new(),
            cur_function: None,
        }
    }

    fn get_function(&self, name: &str) -> FunctionValue<'ctx> {
        self.module
            .get_function(name)
            .unwrap_or_else(|| panic!("unknown LLVM function {}", name))
    }

    fn ptr_type(&self) -> PointerType<'ctx> {
        self.context.ptr_type(AddressSpace::default())
    }

    /// The uniform closure value: a wrapper function pointer and an opaque
    /// environment pointer (null when nothing is captured).
    fn closure_type(&self) -> StructType<'ctx> {
        self.context
            .struct_type(&[self.ptr_type().into(), self.ptr_type().into()], false)
    }

    fn basic_type(&self, ty: &Type) -> BasicTypeEnum<'ctx> {
        match ty {
            Type::Int => self.context.i32_type().into(),
            Type::Bool => self.context.bool_type().into(),
            Type::Fun(_, _) => self.closure_type().into(),
        }
    }

    /// The signature a closure of apparent type `ty` is called through:
    /// the environment pointer followed by the full uncurried parameter
    /// list, returning the final base type.
    fn closure_fn_type(&self, ty: &Type) -> FunctionType<'ctx> {
        let (param_tys, ret) = ty.uncurry();
        let mut params: Vec<BasicMetadataTypeEnum> = vec![self.ptr_type().into()];
        params.extend(param_tys.iter().map(|p| self.basic_type(p).into()));
        self.basic_type(&ret).fn_type(&params, false)
    }

    fn env_struct_type(&self, fields: &[Type]) -> StructType<'ctx> {
        let field_tys: Vec<BasicTypeEnum> = fields.iter().map(|ty| self.basic_type(ty)).collect();
        self.context.struct_type(&field_tys, false)
    }

    fn add_variable(&mut self, name: String, value: BasicValueEnum<'ctx>) {
        self.variables.insert(name, value);
    }

    fn enter_fn_block(&mut self, function: FunctionValue<'ctx>) -> BasicBlock<'ctx> {
        let block = self.context.append_basic_block(function, "entry");
        self.builder.position_at_end(block);
        self.cur_function = Some(function);
        block
    }

    fn append_block(&self, name: &str) -> BasicBlock<'ctx> {
        self.context
            .append_basic_block(self.cur_function.expect("not inside a function"), name)
    }

    fn fast_call(&self, call: CallSiteValue<'ctx>) -> BasicValueEnum<'ctx> {
        call.set_call_convention(FAST_CALL_CONV);
        call.try_as_basic_value().unwrap_left()
    }

    /// The one external symbol of generated modules.
    fn declare_runtime(&self) {
        self.module.add_function(
            "malloc",
            self.ptr_type()
                .fn_type(&[self.context.i32_type().into()], false),
            None,
        );
    }

    /// Emits `__entry_point(i32*) -> i32`: loads as many integers as the
    /// full declared arity of `main` and calls it directly.
    fn compile_entry_point(&mut self, main: &mir::Global) {
        let i32_type = self.context.i32_type();
        let entry_type = i32_type.fn_type(&[self.ptr_type().into()], false);
        let function = self.module.add_function(ENTRY_POINT, entry_type, None);

        self.enter_fn_block(function);
        let argv = function
            .get_nth_param(0)
            .expect("entry point takes the argument array")
            .into_pointer_value();

        let argc = main.params.len() + main.ret.arity();
        let mut args: Vec<BasicValueEnum> = Vec::with_capacity(argc);
        for i in 0..argc {
            let index = i32_type.const_int(i as u64, false);
            let slot = unsafe {
                self.builder
                    .build_gep(i32_type, argv, &[index], "arg_ptr")
                    .unwrap()
            };
            args.push(self.builder.build_load(i32_type, slot, "arg").unwrap());
        }

        let result = if main.params.len() == argc {
            // main's own parameter list covers the declared arity.
            let call_args: Vec<_> = args.iter().map(|arg| (*arg).into()).collect();
            let call = self
                .builder
                .build_call(self.get_function(&main.name), &call_args, "main_call")
                .unwrap();
            self.fast_call(call)
        } else {
            // main returns a function; route through its wrapper, which
            // chains the residual application.
            let mut call_args: Vec<_> = vec![self.ptr_type().const_null().into()];
            call_args.extend(args.iter().map(|arg| (*arg).into()));
            let call = self
                .builder
                .build_call(
                    self.get_function(&wrapped_name(&main.name)),
                    &call_args,
                    "main_call",
                )
                .unwrap();
            self.fast_call(call)
        };

        self.builder.build_return(Some(&result)).unwrap();
    }
}

pub fn wrapped_name(name: &str) -> String {
    format!("{}$wrapped", name)
}

/// Lowers a converted program into an LLVM module: declaration pass first
/// so forward references resolve, then bodies, wrappers, and the entry
/// shim.
pub fn compile<'ctx>(
    context: &'ctx Context,
    globals: &[mir::Global],
    module_name: &str,
) -> Module<'ctx> {
    let builder = context.create_builder();
    let module = context.create_module(module_name);

    let mut codegen = LLVMCodegen::new(context, &builder, &module);

    codegen.declare_runtime();
    for global in globals {
        codegen.declare_global(global);
    }
    for global in globals {
        codegen.compile_global(global);
        codegen.compile_wrapper(global);
    }

    let main = globals
        .iter()
        .find(|global| global.name == "main")
        .expect("converted program has a main global");
    codegen.compile_entry_point(main);

    debug!("emitted LLVM module {}", module_name);
    module
}
