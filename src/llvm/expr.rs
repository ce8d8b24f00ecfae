use inkwell::values::{BasicMetadataValueEnum, BasicValueEnum, StructValue};
use inkwell::IntPredicate;

use crate::ast::BinOp;
use crate::literal::Literal;
use crate::mir;
use crate::types::Type;

use super::{wrapped_name, LLVMCodegen};

impl<'a, 'ctx> LLVMCodegen<'a, 'ctx> {
    pub fn compile_expr(&mut self, expr: &mir::Expr) -> BasicValueEnum<'ctx> {
        match expr {
            mir::Expr::Lit(Literal::Int(value)) => self
                .context
                .i32_type()
                .const_int(*value as i64 as u64, true)
                .into(),

            mir::Expr::Lit(Literal::Bool(value)) => self
                .context
                .bool_type()
                .const_int(*value as u64, false)
                .into(),

            mir::Expr::Local { name, .. } => *self
                .variables
                .get(name)
                .unwrap_or_else(|| panic!("unknown local {} during codegen", name)),

            mir::Expr::Let {
                name, aexpr, body, ..
            } => {
                let bound = self.compile_expr(aexpr);
                // Scoped rebinding so shadowed names come back after the
                // body.
                let saved = self.variables.insert(name.clone(), bound);
                let result = self.compile_expr(body);
                match saved {
                    Some(previous) => self.add_variable(name.clone(), previous),
                    None => {
                        self.variables.remove(name);
                    }
                }
                result
            }

            mir::Expr::If { cond, texpr, fexpr } => {
                let cond_value = self.compile_expr(cond).into_int_value();

                let then_block = self.append_block("then");
                let else_block = self.append_block("else");
                let merge_block = self.append_block("merge");

                self.builder
                    .build_conditional_branch(cond_value, then_block, else_block)
                    .unwrap();

                self.builder.position_at_end(then_block);
                let then_value = self.compile_expr(texpr);
                // A nested diamond moves the insertion point; the phi edge
                // comes from wherever the branch ended.
                let then_end = self.builder.get_insert_block().unwrap();
                self.builder.build_unconditional_branch(merge_block).unwrap();

                self.builder.position_at_end(else_block);
                let else_value = self.compile_expr(fexpr);
                let else_end = self.builder.get_insert_block().unwrap();
                self.builder.build_unconditional_branch(merge_block).unwrap();

                self.builder.position_at_end(merge_block);
                let phi = self
                    .builder
                    .build_phi(then_value.get_type(), "if_result")
                    .unwrap();
                phi.add_incoming(&[(&then_value, then_end), (&else_value, else_end)]);
                phi.as_basic_value()
            }

            mir::Expr::BinOp { op, lhs, rhs } => {
                let lhs = self.compile_expr(lhs).into_int_value();
                let rhs = self.compile_expr(rhs).into_int_value();
                let result = match op {
                    BinOp::Add => self.builder.build_int_add(lhs, rhs, "add").unwrap(),
                    BinOp::Sub => self.builder.build_int_sub(lhs, rhs, "sub").unwrap(),
                    BinOp::Mul => self.builder.build_int_mul(lhs, rhs, "mul").unwrap(),
                    BinOp::Eq => self
                        .builder
                        .build_int_compare(IntPredicate::EQ, lhs, rhs, "eq")
                        .unwrap(),
                    BinOp::Lt => self
                        .builder
                        .build_int_compare(IntPredicate::SLT, lhs, rhs, "lt")
                        .unwrap(),
                };
                result.into()
            }

            mir::Expr::Closure { fun_name, env, .. } => self.compile_closure(fun_name, env),

            mir::Expr::CallKnown { fun_name, args, .. } => {
                assert!(
                    !self.envful.contains(fun_name),
                    "direct call to capturing global {}",
                    fun_name
                );
                let args: Vec<BasicMetadataValueEnum> = args
                    .iter()
                    .map(|arg| self.compile_expr(arg).into())
                    .collect();
                let call = self
                    .builder
                    .build_call(self.get_function(fun_name), &args, "call")
                    .unwrap();
                self.fast_call(call)
            }

            mir::Expr::CallClosure { closure, args, ty } => {
                let closure_value = self.compile_expr(closure).into_struct_value();
                let args: Vec<BasicMetadataValueEnum> = args
                    .iter()
                    .map(|arg| self.compile_expr(arg).into())
                    .collect();
                self.compile_closure_call(closure_value, ty, &args)
            }
        }
    }

    /// Builds a closure value over `fun_name`. An empty capture list needs
    /// no environment; otherwise the captured values are stored into a
    /// `malloc`ed struct whose layout varies per site.
    fn compile_closure(&mut self, fun_name: &str, env: &[mir::Expr]) -> BasicValueEnum<'ctx> {
        let fn_ptr = self
            .get_function(&wrapped_name(fun_name))
            .as_global_value()
            .as_pointer_value();

        let env_ptr = if env.is_empty() {
            self.ptr_type().const_null()
        } else {
            let values: Vec<BasicValueEnum> =
                env.iter().map(|captured| self.compile_expr(captured)).collect();
            let field_tys: Vec<Type> = env.iter().map(|captured| captured.ty()).collect();
            let env_struct = self.env_struct_type(&field_tys);

            // LLVM folds this to the getelementptr/ptrtoint size idiom.
            let size = env_struct.size_of().expect("environment struct is sized");
            let size = self
                .builder
                .build_int_truncate(size, self.context.i32_type(), "env_size")
                .unwrap();
            let call = self
                .builder
                .build_call(self.get_function("malloc"), &[size.into()], "env_raw")
                .unwrap();
            let raw = call
                .try_as_basic_value()
                .unwrap_left()
                .into_pointer_value();

            for (i, value) in values.iter().enumerate() {
                let field_ptr = self
                    .builder
                    .build_struct_gep(env_struct, raw, i as u32, "env_field")
                    .unwrap();
                self.builder.build_store(field_ptr, *value).unwrap();
            }
            raw
        };

        let closure = self.closure_type().get_undef();
        let closure = self
            .builder
            .build_insert_value(closure, fn_ptr, 0, "closure_fn")
            .unwrap();
        let closure = self
            .builder
            .build_insert_value(closure, env_ptr, 1, "closure")
            .unwrap();
        closure.into_struct_value().into()
    }

    /// One saturated indirect call through a closure value of apparent
    /// type `ty`: extract the wrapper pointer and environment, pass the
    /// environment first.
    pub(super) fn compile_closure_call(
        &mut self,
        closure: StructValue<'ctx>,
        ty: &Type,
        args: &[BasicMetadataValueEnum<'ctx>],
    ) -> BasicValueEnum<'ctx> {
        let fn_ptr = self
            .builder
            .build_extract_value(closure, 0, "closure_fn")
            .unwrap()
            .into_pointer_value();
        let env_ptr = self
            .builder
            .build_extract_value(closure, 1, "closure_env")
            .unwrap();

        let mut call_args: Vec<BasicMetadataValueEnum> = vec![env_ptr.into()];
        call_args.extend_from_slice(args);

        let call = self
            .builder
            .build_indirect_call(self.closure_fn_type(ty), fn_ptr, &call_args, "closure_call")
            .unwrap();
        self.fast_call(call)
    }
}
