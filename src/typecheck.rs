use log::debug;

use crate::ast::{Def, Expr, Program};
use crate::error::Error;
use crate::literal::Literal;
use crate::types::Type;

type TypeEnv = im::HashMap<String, Type>;

/// Checks a surface program. Every binder carries its declared type, so the
/// checker synthesizes types bottom-up and compares structurally; no
/// inference is involved.
pub struct TypeChecker;

impl TypeChecker {
    pub fn new() -> TypeChecker {
        TypeChecker
    }

    fn infer_expr(&self, env: TypeEnv, expr: &Expr) -> Result<Type, Error> {
        match expr {
            Expr::Lit(Literal::Int(_)) => Ok(Type::Int),
            Expr::Lit(Literal::Bool(_)) => Ok(Type::Bool),

            Expr::Var(name) => env
                .get(name)
                .cloned()
                .ok_or_else(|| Error::UnboundVariable(name.clone())),

            Expr::Let {
                name,
                ty,
                aexpr,
                body,
            } => {
                self.check_expr(env.clone(), aexpr, ty)?;
                self.infer_expr(env.update(name.clone(), ty.clone()), body)
            }

            Expr::If { cond, texpr, fexpr } => {
                self.check_expr(env.clone(), cond, &Type::Bool)?;
                let branch_type = self.infer_expr(env.clone(), texpr)?;
                self.check_expr(env, fexpr, &branch_type)?;
                Ok(branch_type)
            }

            Expr::BinOp { op, lhs, rhs } => {
                self.check_expr(env.clone(), lhs, &op.operand_type())?;
                self.check_expr(env, rhs, &op.operand_type())?;
                Ok(op.result_type())
            }

            Expr::Lam {
                param,
                param_ty,
                body,
            } => {
                let body_type =
                    self.infer_expr(env.update(param.clone(), param_ty.clone()), body)?;
                Ok(Type::fun(param_ty.clone(), body_type))
            }

            Expr::App { fun, arg } => {
                let fun_type = self.infer_expr(env.clone(), fun)?;
                match fun_type {
                    Type::Fun(param_type, ret_type) => {
                        self.check_expr(env, arg, &param_type)?;
                        Ok(*ret_type)
                    }
                    other => Err(Error::NotAFunction(other)),
                }
            }

            Expr::Fix { name, ty, body } => {
                if !ty.is_fun() {
                    return Err(Error::FixOnNonFunction(ty.clone()));
                }
                self.check_expr(env.update(name.clone(), ty.clone()), body, ty)?;
                Ok(ty.clone())
            }
        }
    }

    fn check_expr(&self, env: TypeEnv, expr: &Expr, expected: &Type) -> Result<(), Error> {
        let found = self.infer_expr(env, expr)?;
        if &found == expected {
            Ok(())
        } else {
            Err(Error::TypeMismatch {
                expected: expected.clone(),
                found,
            })
        }
    }

    fn check_def(&self, env: TypeEnv, def: &Def) -> Result<(), Error> {
        debug!("checking {} : {}", def.name, def.ty);
        self.check_expr(env, &def.body, &def.ty)
    }
}

/// Checks each binding in order. A binding sees every prior binding and
/// itself (explicit top-level recursion), never a later one. The program is
/// valid when all bindings check and `main` exists at first-order `Int`
/// type.
pub fn typecheck_program(program: &Program) -> Result<(), Error> {
    let checker = TypeChecker::new();
    let mut env = TypeEnv::new();

    for def in &program.defs {
        env.insert(def.name.clone(), def.ty.clone());
        checker.check_def(env.clone(), def)?;
    }

    match env.get("main") {
        None => Err(Error::MissingMain),
        Some(main_ty) if !main_ty.is_first_order_int() => {
            Err(Error::MainNotFirstOrderInt(main_ty.clone()))
        }
        Some(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_main(ty: Type, body: Expr) -> Program {
        Program::new(vec![Def::new("main", ty, body)])
    }

    #[test]
    fn accepts_the_example_catalogue() {
        for example in crate::programs::all() {
            assert_eq!(
                typecheck_program(&example.program),
                Ok(()),
                "{} should typecheck",
                example.name
            );
        }
    }

    #[test]
    fn rejects_unbound_variables() {
        let program = single_main(Type::Int, Expr::var("ghost"));
        assert_eq!(
            typecheck_program(&program),
            Err(Error::UnboundVariable("ghost".to_string()))
        );
    }

    #[test]
    fn rejects_branch_type_mismatches() {
        let program = single_main(
            Type::Int,
            Expr::if_(Expr::boolean(true), Expr::int(1), Expr::boolean(false)),
        );
        assert_eq!(
            typecheck_program(&program),
            Err(Error::TypeMismatch {
                expected: Type::Int,
                found: Type::Bool,
            })
        );
    }

    #[test]
    fn rejects_application_of_non_functions() {
        let program = single_main(Type::Int, Expr::app(Expr::int(1), Expr::int(2)));
        assert_eq!(
            typecheck_program(&program),
            Err(Error::NotAFunction(Type::Int))
        );
    }

    #[test]
    fn rejects_fix_at_value_type() {
        let program = single_main(Type::Int, Expr::fix("x", Type::Int, Expr::var("x")));
        assert_eq!(
            typecheck_program(&program),
            Err(Error::FixOnNonFunction(Type::Int))
        );
    }

    #[test]
    fn rejects_programs_without_main() {
        let program = Program::new(vec![Def::new("five", Type::Int, Expr::int(5))]);
        assert_eq!(typecheck_program(&program), Err(Error::MissingMain));
    }

    #[test]
    fn rejects_higher_order_main() {
        let ty = Type::fun(Type::fun(Type::Int, Type::Int), Type::Int);
        let program = single_main(
            ty.clone(),
            Expr::lam(
                "f",
                Type::fun(Type::Int, Type::Int),
                Expr::app(Expr::var("f"), Expr::int(0)),
            ),
        );
        assert_eq!(
            typecheck_program(&program),
            Err(Error::MainNotFirstOrderInt(ty))
        );
    }

    #[test]
    fn shadowing_resolves_to_the_inner_binder() {
        let program = single_main(
            Type::Int,
            Expr::let_(
                "x",
                Type::Bool,
                Expr::boolean(true),
                Expr::let_("x", Type::Int, Expr::int(3), Expr::var("x")),
            ),
        );
        assert_eq!(typecheck_program(&program), Ok(()));
    }

    #[test]
    fn top_level_bindings_may_reference_themselves() {
        let fact = Def::new(
            "fact",
            Type::fun(Type::Int, Type::Int),
            Expr::lam(
                "n",
                Type::Int,
                Expr::if_(
                    Expr::eq(Expr::var("n"), Expr::int(0)),
                    Expr::int(1),
                    Expr::mul(
                        Expr::var("n"),
                        Expr::app(Expr::var("fact"), Expr::sub(Expr::var("n"), Expr::int(1))),
                    ),
                ),
            ),
        );
        let main = Def::new("main", Type::Int, Expr::app(Expr::var("fact"), Expr::int(5)));
        assert_eq!(typecheck_program(&Program::new(vec![fact, main])), Ok(()));
    }

    #[test]
    fn later_bindings_are_not_visible_earlier() {
        let first = Def::new("first", Type::Int, Expr::var("second"));
        let second = Def::new("second", Type::Int, Expr::int(2));
        let main = Def::new("main", Type::Int, Expr::int(0));
        assert_eq!(
            typecheck_program(&Program::new(vec![first, second, main])),
            Err(Error::UnboundVariable("second".to_string()))
        );
    }
}
