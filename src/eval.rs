use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::debug;

use crate::ast::{BinOp, Expr, Program};
use crate::error::Error;
use crate::literal::Literal;

/// A runtime value of the reference interpreter. Closures and fixpoints
/// carry the local environment they were built under; top-level bindings
/// live in a shared store so a definition can call itself.
#[derive(Clone, Debug)]
pub enum Value {
    Int(i32),
    Bool(bool),
    Closure {
        param: String,
        body: Expr,
        env: Env,
    },
    Fix {
        name: String,
        body: Expr,
        env: Env,
    },
}

impl Value {
    fn as_int(&self) -> i32 {
        match self {
            Value::Int(value) => *value,
            other => panic!("expected an integer, evaluated to {:?}", other),
        }
    }

    fn as_bool(&self) -> bool {
        match self {
            Value::Bool(value) => *value,
            other => panic!("expected a boolean, evaluated to {:?}", other),
        }
    }
}

/// Two-level environment: immutable locals layered over the shared global
/// store. Lookup prefers locals, so inner binders shadow top-level names.
#[derive(Clone, Debug)]
pub struct Env {
    globals: Rc<RefCell<HashMap<String, Value>>>,
    locals: im::HashMap<String, Value>,
}

impl Env {
    fn new() -> Env {
        Env {
            globals: Rc::new(RefCell::new(HashMap::new())),
            locals: im::HashMap::new(),
        }
    }

    fn extended(&self, name: String, value: Value) -> Env {
        Env {
            globals: self.globals.clone(),
            locals: self.locals.update(name, value),
        }
    }

    fn get(&self, name: &str) -> Value {
        if let Some(value) = self.locals.get(name) {
            return value.clone();
        }
        self.globals
            .borrow()
            .get(name)
            .cloned()
            .unwrap_or_else(|| panic!("unbound variable {} during evaluation", name))
    }

    fn add_global(&self, name: String, value: Value) {
        self.globals.borrow_mut().insert(name, value);
    }
}

fn eval_expr(env: &Env, expr: &Expr) -> Value {
    match expr {
        Expr::Lit(Literal::Int(value)) => Value::Int(*value),
        Expr::Lit(Literal::Bool(value)) => Value::Bool(*value),

        Expr::Var(name) => env.get(name),

        Expr::Let {
            name, aexpr, body, ..
        } => {
            let bound = eval_expr(env, aexpr);
            eval_expr(&env.extended(name.clone(), bound), body)
        }

        Expr::If { cond, texpr, fexpr } => {
            if eval_expr(env, cond).as_bool() {
                eval_expr(env, texpr)
            } else {
                eval_expr(env, fexpr)
            }
        }

        // Arithmetic wraps, matching the generated code.
        Expr::BinOp { op, lhs, rhs } => {
            let lhs = eval_expr(env, lhs);
            let rhs = eval_expr(env, rhs);
            match op {
                BinOp::Add => Value::Int(lhs.as_int().wrapping_add(rhs.as_int())),
                BinOp::Sub => Value::Int(lhs.as_int().wrapping_sub(rhs.as_int())),
                BinOp::Mul => Value::Int(lhs.as_int().wrapping_mul(rhs.as_int())),
                BinOp::Eq => Value::Bool(lhs.as_int() == rhs.as_int()),
                BinOp::Lt => Value::Bool(lhs.as_int() < rhs.as_int()),
            }
        }

        Expr::Lam {
            param,
            param_ty: _,
            body,
        } => Value::Closure {
            param: param.clone(),
            body: (**body).clone(),
            env: env.clone(),
        },

        Expr::App { fun, arg } => {
            let fun = eval_expr(env, fun);
            let arg = eval_expr(env, arg);
            apply(fun, arg)
        }

        Expr::Fix { name, body, .. } => Value::Fix {
            name: name.clone(),
            body: (**body).clone(),
            env: env.clone(),
        },
    }
}

/// Applies a function value. A fixpoint unrolls one step first, binding
/// itself under its own name.
pub fn apply(fun: Value, arg: Value) -> Value {
    match fun {
        Value::Closure { param, body, env } => eval_expr(&env.extended(param, arg), &body),
        Value::Fix { name, body, env } => {
            let unrolled = eval_expr(
                &env.extended(
                    name.clone(),
                    Value::Fix {
                        name: name.clone(),
                        body: body.clone(),
                        env: env.clone(),
                    },
                ),
                &body,
            );
            apply(unrolled, arg)
        }
        other => panic!("cannot apply non-function value {:?}", other),
    }
}

/// Runs a type-checked program directly over the surface AST, applying
/// `main` to the given integers. This is the oracle the compiled pipeline
/// is tested against.
pub fn run_program(program: &Program, args: &[i32]) -> Result<i32, Error> {
    let env = Env::new();
    for def in &program.defs {
        debug!("evaluating top-level binding {}", def.name);
        let value = eval_expr(&env, &def.body);
        env.add_global(def.name.clone(), value);
    }

    let mut result = env.get("main");
    for arg in args {
        result = apply(result, Value::Int(*arg));
    }
    Ok(result.as_int())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluates_the_example_catalogue() {
        for example in crate::programs::all() {
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
    fn arithmetic_wraps_on_overflow() {
        let program = Program::new(vec![crate::ast::Def::new(
            "main",
            crate::types::Type::Int,
            Expr::add(Expr::int(i32::MAX), Expr::int(1)),
        )]);
        assert_eq!(run_program(&program, &[]), Ok(i32::MIN));
    }
}
