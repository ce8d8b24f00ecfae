use inkwell::module::Linkage;
use inkwell::types::{BasicMetadataTypeEnum, BasicType};
use inkwell::values::BasicMetadataValueEnum;

use crate::types::Type;

use crate::mir;

use super::{wrapped_name, LLVMCodegen, FAST_CALL_CONV};

impl<'a, 'ctx> LLVMCodegen<'a, 'ctx> {
    /// Declares a global and its `$wrapped` companion. The global takes an
    /// opaque environment pointer first when it captures anything; the
    /// wrapper always takes the environment pointer plus the full
    /// uncurried parameter list of the global's apparent type.
    pub fn declare_global(&mut self, global: &mir::Global) {
        let mut param_tys: Vec<BasicMetadataTypeEnum> = Vec::new();
        if !global.env.is_empty() {
            param_tys.push(self.ptr_type().into());
            self.envful.insert(global.name.clone());
        }
        param_tys.extend(
            global
                .params
                .iter()
                .map(|(_, ty)| BasicMetadataTypeEnum::from(self.basic_type(ty))),
        );

        let fn_type = self.basic_type(&global.ret).fn_type(&param_tys, false);
        let function =
            self.module
                .add_function(&global.name, fn_type, Some(Linkage::Private));
        function.set_call_conventions(FAST_CALL_CONV);

        let wrapper_type = self.closure_fn_type(&global.apparent_type());
        let wrapper = self.module.add_function(
            &wrapped_name(&global.name),
            wrapper_type,
            Some(Linkage::Private),
        );
        wrapper.set_call_conventions(FAST_CALL_CONV);
    }

    /// Emits the body of a previously declared global. Captured variables
    /// are loaded out of the environment struct in the prologue; user
    /// parameters bind directly.
    pub fn compile_global(&mut self, global: &mir::Global) {
        let function = self.get_function(&global.name);
        self.variables.clear();
        self.enter_fn_block(function);

        let mut param_offset = 0;
        if !global.env.is_empty() {
            let env_ptr = function
                .get_nth_param(0)
                .expect("capturing global takes an environment pointer");
            env_ptr.set_name("_env");
            param_offset = 1;

            let env_tys: Vec<Type> = global.env.iter().map(|(_, ty)| ty.clone()).collect();
            let env_struct = self.env_struct_type(&env_tys);
            for (i, (var_name, var_ty)) in global.env.iter().enumerate() {
                let field_ptr = self
                    .builder
                    .build_struct_gep(
                        env_struct,
                        env_ptr.into_pointer_value(),
                        i as u32,
                        "_env_field",
                    )
                    .unwrap();
                let value = self
                    .builder
                    .build_load(self.basic_type(var_ty), field_ptr, var_name)
                    .unwrap();
                self.add_variable(var_name.clone(), value);
            }
        }

        for (i, (param_name, _)) in global.params.iter().enumerate() {
            let param = function
                .get_nth_param((param_offset + i) as u32)
                .expect("declared parameter is present");
            param.set_name(param_name);
            self.add_variable(param_name.clone(), param);
        }

        let result = self.compile_expr(&global.body);
        self.builder.build_return(Some(&result)).unwrap();
    }

    /// Emits the `$wrapped` companion: forward to the global, then chain
    /// one saturated indirect call when the global returns a closure.
    pub fn compile_wrapper(&mut self, global: &mir::Global) {
        let wrapper = self.get_function(&wrapped_name(&global.name));
        self.variables.clear();
        self.enter_fn_block(wrapper);

        let mut forward_args: Vec<BasicMetadataValueEnum> = Vec::new();
        if !global.env.is_empty() {
            forward_args.push(wrapper.get_nth_param(0).unwrap().into());
        }
        for i in 0..global.params.len() {
            forward_args.push(wrapper.get_nth_param(1 + i as u32).unwrap().into());
        }

        let call = self
            .builder
            .build_call(self.get_function(&global.name), &forward_args, "forward")
            .unwrap();

        let (residual_tys, _) = global.ret.uncurry();
        if residual_tys.is_empty() {
            call.set_tail_call(true);
            let result = self.fast_call(call);
            self.builder.build_return(Some(&result)).unwrap();
            return;
        }

        // The global returned a closure; apply the wrapper's remaining
        // parameters through it in one saturated call.
        let returned = self.fast_call(call).into_struct_value();
        let residual_args: Vec<BasicMetadataValueEnum> = (0..residual_tys.len())
            .map(|i| {
                wrapper
                    .get_nth_param((1 + global.params.len() + i) as u32)
                    .unwrap()
                    .into()
            })
            .collect();
        let result = self.compile_closure_call(returned, &global.ret, &residual_args);
        self.builder.build_return(Some(&result)).unwrap();
    }
}
