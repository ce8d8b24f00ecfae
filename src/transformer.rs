use std::collections::HashMap;

use log::debug;

use crate::ast::{self, Program};
use crate::mir;
use crate::types::Type;

/// How a name in scope resolves during conversion.
///
/// A `Local` records the name the MIR should use; the two differ only for
/// fix captures, which get fresh names so the self-closure rebuild cannot
/// be confused by later shadowing. A `FixSelf` occurrence rebuilds the
/// closure over the lifted global from that global's own capture
/// parameters.
#[derive(Clone)]
enum Binding {
    Local {
        emit: String,
        ty: Type,
    },
    FixSelf {
        global: String,
        caps: Vec<(String, Type)>,
        ty: Type,
    },
}

type Scope = im::HashMap<String, Binding>;

/// A free variable of a hoisted expression: the surface name it was found
/// under, the local name it is emitted as in both the capturing and the
/// captured global, and its type.
#[derive(Clone, Debug)]
struct Capture {
    surface: String,
    emit: String,
    ty: Type,
}

struct Transformer {
    globals: Vec<mir::Global>,
    /// Peeled signatures of the top-level bindings seen so far (including
    /// the one currently being converted, for explicit recursion).
    toplevel: HashMap<String, (Vec<Type>, Type)>,
    prefix: String,
    fresh_count: usize,
}

impl Transformer {
    fn new() -> Transformer {
        Transformer {
            globals: Vec::new(),
            toplevel: HashMap::new(),
            prefix: String::new(),
            fresh_count: 0,
        }
    }

    fn fresh_name(&mut self, kind: &str) -> String {
        let name = format!("_{}_{}_{}", self.prefix, kind, self.fresh_count);
        self.fresh_count += 1;
        name
    }

    fn fresh_capture_name(&mut self, surface: &str) -> String {
        let name = format!("_cap{}_{}", self.fresh_count, surface);
        self.fresh_count += 1;
        name
    }

    /// Splits off the outer lambda chain of a definition body, pairing each
    /// parameter with one arrow peeled from the declared type.
    fn peel_lams<'e>(body: &'e ast::Expr, ty: &Type) -> (Vec<(String, Type)>, Type, &'e ast::Expr) {
        let mut params = Vec::new();
        let mut expr = body;
        let mut rest = ty.clone();
        while let ast::Expr::Lam {
            param,
            param_ty,
            body,
        } = expr
        {
            let Type::Fun(_, ret) = rest else {
                panic!("lambda chain of {} outruns its declared type", param);
            };
            params.push((param.clone(), param_ty.clone()));
            rest = *ret;
            expr = body;
        }
        (params, rest, expr)
    }

    /// Free variables of `expr` with respect to the enclosing global,
    /// ordered by first occurrence. A reference to a fix-bound name counts
    /// as a use of that fix's captures, since its rebuild references them.
    fn free_vars(&self, scope: &Scope, expr: &ast::Expr) -> Vec<Capture> {
        fn walk(
            scope: &Scope,
            expr: &ast::Expr,
            bound: im::HashSet<String>,
            out: &mut Vec<Capture>,
        ) {
            match expr {
                ast::Expr::Lit(_) => {}

                ast::Expr::Var(name) => {
                    if bound.contains(name) {
                        return;
                    }
                    match scope.get(name) {
                        Some(Binding::Local { emit, ty }) => {
                            if !out.iter().any(|cap| cap.emit == *emit) {
                                out.push(Capture {
                                    surface: name.clone(),
                                    emit: emit.clone(),
                                    ty: ty.clone(),
                                });
                            }
                        }
                        Some(Binding::FixSelf { caps, .. }) => {
                            for (cap_name, cap_ty) in caps {
                                if !out.iter().any(|cap| cap.emit == *cap_name) {
                                    out.push(Capture {
                                        surface: cap_name.clone(),
                                        emit: cap_name.clone(),
                                        ty: cap_ty.clone(),
                                    });
                                }
                            }
                        }
                        // Top-level references are not free variables.
                        None => {}
                    }
                }

                ast::Expr::Let {
                    name, aexpr, body, ..
                } => {
                    // The bound name is not in scope for its own definition.
                    walk(scope, aexpr, bound.clone(), out);
                    walk(scope, body, bound.update(name.clone()), out);
                }

                ast::Expr::If { cond, texpr, fexpr } => {
                    walk(scope, cond, bound.clone(), out);
                    walk(scope, texpr, bound.clone(), out);
                    walk(scope, fexpr, bound, out);
                }

                ast::Expr::BinOp { lhs, rhs, .. } => {
                    walk(scope, lhs, bound.clone(), out);
                    walk(scope, rhs, bound, out);
                }

                ast::Expr::Lam { param, body, .. } => {
                    walk(scope, body, bound.update(param.clone()), out);
                }

                ast::Expr::App { fun, arg } => {
                    walk(scope, fun, bound.clone(), out);
                    walk(scope, arg, bound, out);
                }

                ast::Expr::Fix { name, body, .. } => {
                    walk(scope, body, bound.update(name.clone()), out);
                }
            }
        }

        let mut out = Vec::new();
        walk(scope, expr, im::HashSet::new(), &mut out);
        out
    }

    /// The type of a surface expression under the conversion scope.
    /// Assumes the type checker accepted the program.
    fn type_of(&self, scope: &Scope, expr: &ast::Expr) -> Type {
        match expr {
            ast::Expr::Lit(crate::literal::Literal::Int(_)) => Type::Int,
            ast::Expr::Lit(crate::literal::Literal::Bool(_)) => Type::Bool,

            ast::Expr::Var(name) => match scope.get(name) {
                Some(Binding::Local { ty, .. }) | Some(Binding::FixSelf { ty, .. }) => ty.clone(),
                None => {
                    let (params, ret) = self
                        .toplevel
                        .get(name)
                        .unwrap_or_else(|| panic!("unbound variable {} during conversion", name));
                    Type::curried(params.clone(), ret.clone())
                }
            },

            ast::Expr::Let { name, ty, body, .. } => self.type_of(
                &scope.update(
                    name.clone(),
                    Binding::Local {
                        emit: name.clone(),
                        ty: ty.clone(),
                    },
                ),
                body,
            ),

            ast::Expr::If { texpr, .. } => self.type_of(scope, texpr),

            ast::Expr::BinOp { op, .. } => op.result_type(),

            ast::Expr::Lam {
                param,
                param_ty,
                body,
            } => {
                let body_ty = self.type_of(
                    &scope.update(
                        param.clone(),
                        Binding::Local {
                            emit: param.clone(),
                            ty: param_ty.clone(),
                        },
                    ),
                    body,
                );
                Type::fun(param_ty.clone(), body_ty)
            }

            ast::Expr::App { fun, .. } => match self.type_of(scope, fun) {
                Type::Fun(_, ret) => *ret,
                other => panic!("application head has non-function type {}", other),
            },

            ast::Expr::Fix { ty, .. } => ty.clone(),
        }
    }

    fn convert(&mut self, scope: &Scope, expr: &ast::Expr) -> mir::Expr {
        match expr {
            ast::Expr::Lit(literal) => mir::Expr::Lit(*literal),

            ast::Expr::Var(name) => self.convert_var(scope, name),

            ast::Expr::Let {
                name,
                ty,
                aexpr,
                body,
            } => {
                let aexpr = self.convert(scope, aexpr);
                let inner = scope.update(
                    name.clone(),
                    Binding::Local {
                        emit: name.clone(),
                        ty: ty.clone(),
                    },
                );
                mir::Expr::Let {
                    name: name.clone(),
                    ty: ty.clone(),
                    aexpr: Box::new(aexpr),
                    body: Box::new(self.convert(&inner, body)),
                }
            }

            ast::Expr::If { cond, texpr, fexpr } => mir::Expr::If {
                cond: Box::new(self.convert(scope, cond)),
                texpr: Box::new(self.convert(scope, texpr)),
                fexpr: Box::new(self.convert(scope, fexpr)),
            },

            ast::Expr::BinOp { op, lhs, rhs } => mir::Expr::BinOp {
                op: *op,
                lhs: Box::new(self.convert(scope, lhs)),
                rhs: Box::new(self.convert(scope, rhs)),
            },

            ast::Expr::Lam { .. } => self.convert_lambda(scope, expr),

            ast::Expr::App { .. } => {
                // Collect the maximal application spine.
                let mut args = Vec::new();
                let mut head = expr;
                while let ast::Expr::App { fun, arg } = head {
                    args.push(&**arg);
                    head = fun;
                }
                args.reverse();
                self.convert_apply(scope, head, &args)
            }

            ast::Expr::Fix { .. } => self.convert_fix(scope, expr),
        }
    }

    fn convert_var(&mut self, scope: &Scope, name: &str) -> mir::Expr {
        match scope.get(name) {
            Some(Binding::Local { emit, ty }) => mir::Expr::Local {
                name: emit.clone(),
                ty: ty.clone(),
            },

            Some(Binding::FixSelf { global, caps, ty }) => mir::Expr::Closure {
                fun_name: global.clone(),
                env: caps
                    .iter()
                    .map(|(cap_name, cap_ty)| mir::Expr::Local {
                        name: cap_name.clone(),
                        ty: cap_ty.clone(),
                    })
                    .collect(),
                ty: ty.clone(),
            },

            None => {
                let (params, ret) = self
                    .toplevel
                    .get(name)
                    .unwrap_or_else(|| panic!("unbound variable {} during conversion", name))
                    .clone();
                if params.is_empty() && !ret.is_fun() {
                    // A non-function global is a zero-parameter function;
                    // referencing it calls it.
                    mir::Expr::CallKnown {
                        fun_name: name.to_string(),
                        args: Vec::new(),
                        ret,
                    }
                } else {
                    mir::Expr::Closure {
                        fun_name: name.to_string(),
                        env: Vec::new(),
                        ty: Type::curried(params, ret),
                    }
                }
            }
        }
    }

    /// Hoists a lambda to a fresh global whose first parameters are its
    /// captured free variables, and replaces it with a closure over that
    /// global.
    fn convert_lambda(&mut self, scope: &Scope, lam: &ast::Expr) -> mir::Expr {
        let ast::Expr::Lam {
            param,
            param_ty,
            body,
        } = lam
        else {
            unreachable!()
        };

        let caps = self.free_vars(scope, lam);
        let fun_name = self.fresh_name("lambda");

        let inner = self.enter_hoisted(scope, &caps, &[(param.clone(), param_ty.clone())]);
        let body_ty = self.type_of(&inner, body);
        let converted = self.convert(&inner, body);

        self.globals.push(mir::Global {
            name: fun_name.clone(),
            env: caps
                .iter()
                .map(|cap| (cap.emit.clone(), cap.ty.clone()))
                .collect(),
            params: vec![(param.clone(), param_ty.clone())],
            ret: body_ty.clone(),
            body: converted,
        });

        mir::Expr::Closure {
            fun_name,
            env: captured_values(&caps),
            ty: Type::fun(param_ty.clone(), body_ty),
        }
    }

    /// Lifts a fix body to a fresh global and ties the knot through the
    /// global namespace: occurrences of the fix-bound name rebuild the
    /// closure from the global's own capture parameters.
    fn convert_fix(&mut self, scope: &Scope, fix: &ast::Expr) -> mir::Expr {
        let ast::Expr::Fix { name, ty, body } = fix else {
            unreachable!()
        };
        // Prerequisite established by the type checker, restated here
        // because conversion would emit a malformed closure without it.
        assert!(
            ty.is_fun(),
            "fix {} annotated with non-function type {}",
            name,
            ty
        );

        let raw_caps = self.free_vars(scope, fix);
        let mut renames: HashMap<String, String> = HashMap::new();
        let caps: Vec<Capture> = raw_caps
            .into_iter()
            .map(|cap| {
                let renamed = self.fresh_capture_name(&cap.surface);
                renames.insert(cap.emit.clone(), renamed.clone());
                Capture {
                    surface: cap.surface,
                    emit: renamed,
                    ty: cap.ty,
                }
            })
            .collect();
        let cap_params: Vec<(String, Type)> = caps
            .iter()
            .map(|cap| (cap.emit.clone(), cap.ty.clone()))
            .collect();

        let fun_name = self.fresh_name(name);
        let (params, ret, inner_body) = Self::peel_lams(body, ty);

        let mut inner = self.enter_hoisted(scope, &caps, &params);
        // Fix-self bindings carried from the enclosing scope rebuild from
        // capture names that were just renamed; follow the renames so a
        // nested fix can still reach an outer one.
        let carried: Vec<(String, Binding)> = inner
            .iter()
            .filter_map(|(key, binding)| match binding {
                Binding::FixSelf { global, caps, ty } => Some((
                    key.clone(),
                    Binding::FixSelf {
                        global: global.clone(),
                        caps: caps
                            .iter()
                            .map(|(cap_name, cap_ty)| {
                                let renamed =
                                    renames.get(cap_name).unwrap_or(cap_name).clone();
                                (renamed, cap_ty.clone())
                            })
                            .collect(),
                        ty: ty.clone(),
                    },
                )),
                Binding::Local { .. } => None,
            })
            .collect();
        for (key, binding) in carried {
            inner.insert(key, binding);
        }
        inner.insert(
            name.clone(),
            Binding::FixSelf {
                global: fun_name.clone(),
                caps: cap_params.clone(),
                ty: ty.clone(),
            },
        );
        let converted = self.convert(&inner, inner_body);

        self.globals.push(mir::Global {
            name: fun_name.clone(),
            env: cap_params,
            params,
            ret,
            body: converted,
        });

        mir::Expr::Closure {
            fun_name,
            env: caps
                .iter()
                .map(|cap| mir::Expr::Local {
                    // The value captured at the construction site still
                    // lives under its original name there.
                    name: original_emit(scope, &cap.surface),
                    ty: cap.ty.clone(),
                })
                .collect(),
            ty: ty.clone(),
        }
    }

    /// The scope of a hoisted global's body: its captures and parameters,
    /// plus any fix-self bindings from the enclosing scope (their captures
    /// were re-captured under the same names, so the rebuild stays valid).
    fn enter_hoisted(&self, scope: &Scope, caps: &[Capture], params: &[(String, Type)]) -> Scope {
        let mut inner = Scope::new();
        for (name, binding) in scope {
            if let Binding::FixSelf { .. } = binding {
                inner.insert(name.clone(), binding.clone());
            }
        }
        for cap in caps {
            inner.insert(
                cap.surface.clone(),
                Binding::Local {
                    emit: cap.emit.clone(),
                    ty: cap.ty.clone(),
                },
            );
        }
        for (name, ty) in params {
            inner.insert(
                name.clone(),
                Binding::Local {
                    emit: name.clone(),
                    ty: ty.clone(),
                },
            );
        }
        inner
    }

    /// Lowers an application spine. A head that names a top-level global is
    /// specialised on its arity; everything else is applied through its
    /// closure value.
    fn convert_apply(&mut self, scope: &Scope, head: &ast::Expr, args: &[&ast::Expr]) -> mir::Expr {
        if let ast::Expr::Var(name) = head {
            if !scope.contains_key(name) {
                if let Some((param_tys, ret)) = self.toplevel.get(name).cloned() {
                    let arity = param_tys.len();
                    if args.len() == arity {
                        let args = args.iter().map(|arg| self.convert(scope, arg)).collect();
                        return mir::Expr::CallKnown {
                            fun_name: name.clone(),
                            args,
                            ret,
                        };
                    }
                    if args.len() < arity {
                        return self.curry_known(scope, name, &param_tys, &ret, args);
                    }
                    let direct: Vec<mir::Expr> = args[..arity]
                        .iter()
                        .map(|arg| self.convert(scope, arg))
                        .collect();
                    let base = mir::Expr::CallKnown {
                        fun_name: name.clone(),
                        args: direct,
                        ret: ret.clone(),
                    };
                    return self.apply_closure(scope, base, ret, &args[arity..]);
                }
            }
        }

        let head_ty = self.type_of(scope, head);
        let converted = self.convert(scope, head);
        self.apply_closure(scope, converted, head_ty, args)
    }

    /// Applies arguments to an arbitrary closure-typed value. Exactly the
    /// type's arity produces a saturated call; fewer goes through a curry
    /// wrapper. More is impossible on type-checked input, since the full
    /// uncurrying bounds any spine.
    fn apply_closure(
        &mut self,
        scope: &Scope,
        closure: mir::Expr,
        ty: Type,
        args: &[&ast::Expr],
    ) -> mir::Expr {
        let arity = ty.arity();
        assert!(
            args.len() <= arity,
            "application of {} arguments to a value of type {}",
            args.len(),
            ty
        );
        if args.len() == arity {
            let args = args.iter().map(|arg| self.convert(scope, arg)).collect();
            mir::Expr::CallClosure {
                closure: Box::new(closure),
                args,
                ty,
            }
        } else {
            self.curry_closure(scope, closure, ty, args)
        }
    }

    /// Partial application of a known global: a wrapper global captures the
    /// supplied arguments and forwards the full parameter list.
    fn curry_known(
        &mut self,
        scope: &Scope,
        fun_name: &str,
        param_tys: &[Type],
        ret: &Type,
        args: &[&ast::Expr],
    ) -> mir::Expr {
        let wrapper = self.fresh_name("curry");
        let supplied = args.len();

        let all_params: Vec<(String, Type)> = param_tys
            .iter()
            .enumerate()
            .map(|(i, ty)| (format!("_arg{}", i), ty.clone()))
            .collect();
        let forwarded = all_params
            .iter()
            .map(|(name, ty)| mir::Expr::Local {
                name: name.clone(),
                ty: ty.clone(),
            })
            .collect();

        self.globals.push(mir::Global {
            name: wrapper.clone(),
            env: all_params[..supplied].to_vec(),
            params: all_params[supplied..].to_vec(),
            ret: ret.clone(),
            body: mir::Expr::CallKnown {
                fun_name: fun_name.to_string(),
                args: forwarded,
                ret: ret.clone(),
            },
        });

        mir::Expr::Closure {
            fun_name: wrapper,
            env: args.iter().map(|arg| self.convert(scope, arg)).collect(),
            ty: Type::curried(param_tys[supplied..].to_vec(), ret.clone()),
        }
    }

    /// Partial application of an arbitrary closure value: the wrapper
    /// captures the closure itself plus the supplied arguments, and its
    /// body is the saturated call.
    fn curry_closure(
        &mut self,
        scope: &Scope,
        closure: mir::Expr,
        ty: Type,
        args: &[&ast::Expr],
    ) -> mir::Expr {
        let wrapper = self.fresh_name("curry");
        let supplied = args.len();
        let (param_tys, final_ret) = ty.uncurry();

        let fun_param = ("_fun".to_string(), ty.clone());
        let all_params: Vec<(String, Type)> = param_tys
            .iter()
            .enumerate()
            .map(|(i, arg_ty)| (format!("_arg{}", i), arg_ty.clone()))
            .collect();
        let forwarded = all_params
            .iter()
            .map(|(name, arg_ty)| mir::Expr::Local {
                name: name.clone(),
                ty: arg_ty.clone(),
            })
            .collect();

        let mut env_params = vec![fun_param.clone()];
        env_params.extend(all_params[..supplied].iter().cloned());

        self.globals.push(mir::Global {
            name: wrapper.clone(),
            env: env_params,
            params: all_params[supplied..].to_vec(),
            ret: final_ret.clone(),
            body: mir::Expr::CallClosure {
                closure: Box::new(mir::Expr::Local {
                    name: fun_param.0,
                    ty: ty.clone(),
                }),
                args: forwarded,
                ty: ty.clone(),
            },
        });

        let mut captured = vec![closure];
        captured.extend(args.iter().map(|arg| self.convert(scope, arg)));

        mir::Expr::Closure {
            fun_name: wrapper,
            env: captured,
            ty: Type::curried(param_tys[supplied..].to_vec(), final_ret),
        }
    }

    /// Converts one top-level binding, peeling its outer lambda chain into
    /// the parameter list of a single global.
    fn transform_def(&mut self, def: &ast::Def) {
        let (params, ret, body) = Self::peel_lams(&def.body, &def.ty);

        // Registered before the body converts so explicit recursion lowers
        // to a direct call.
        self.toplevel.insert(
            def.name.clone(),
            (
                params.iter().map(|(_, ty)| ty.clone()).collect(),
                ret.clone(),
            ),
        );
        self.prefix = def.name.clone();
        self.fresh_count = 0;

        let scope = self.enter_hoisted(&Scope::new(), &[], &params);
        let converted = self.convert(&scope, body);

        self.globals.push(mir::Global {
            name: def.name.clone(),
            env: Vec::new(),
            params,
            ret,
            body: converted,
        });
    }
}

fn captured_values(caps: &[Capture]) -> Vec<mir::Expr> {
    caps.iter()
        .map(|cap| mir::Expr::Local {
            name: cap.emit.clone(),
            ty: cap.ty.clone(),
        })
        .collect()
}

/// The name a capture's value is known by at the closure construction
/// site, i.e. in the enclosing global.
fn original_emit(scope: &Scope, surface: &str) -> String {
    match scope.get(surface) {
        Some(Binding::Local { emit, .. }) => emit.clone(),
        _ => surface.to_string(),
    }
}

/// Closure-converts a type-checked program. Hoisted globals precede the
/// top-level binding they were lifted out of; top-level bindings keep
/// their declaration order.
pub fn transform_program(program: &Program) -> Vec<mir::Global> {
    let mut transformer = Transformer::new();
    for def in &program.defs {
        transformer.transform_def(def);
    }
    debug!(
        "closure conversion produced {} globals",
        transformer.globals.len()
    );
    transformer.globals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Def, Expr};
    use crate::typecheck::typecheck_program;

    fn convert(program: &Program) -> Vec<mir::Global> {
        typecheck_program(program).expect("test program must typecheck");
        transform_program(program)
    }

    fn find<'a>(globals: &'a [mir::Global], name: &str) -> &'a mir::Global {
        globals
            .iter()
            .find(|global| global.name == name)
            .unwrap_or_else(|| panic!("no global named {}", name))
    }

    #[test]
    fn peels_top_level_lambda_chains() {
        let ty = Type::curried(vec![Type::Int, Type::Int], Type::Int);
        let program = Program::new(vec![Def::new(
            "main",
            ty,
            Expr::lam(
                "a",
                Type::Int,
                Expr::lam("b", Type::Int, Expr::add(Expr::var("a"), Expr::var("b"))),
            ),
        )]);

        let globals = convert(&program);
        assert_eq!(globals.len(), 1);
        let main = find(&globals, "main");
        assert_eq!(main.params.len(), 2);
        assert!(main.env.is_empty());
        assert_eq!(main.ret, Type::Int);
    }

    #[test]
    fn captures_are_ordered_by_first_occurrence() {
        // main a b = (\z -> b + a + z) 1
        let ty = Type::curried(vec![Type::Int, Type::Int], Type::Int);
        let program = Program::new(vec![Def::new(
            "main",
            ty,
            Expr::lam(
                "a",
                Type::Int,
                Expr::lam(
                    "b",
                    Type::Int,
                    Expr::app(
                        Expr::lam(
                            "z",
                            Type::Int,
                            Expr::add(
                                Expr::add(Expr::var("b"), Expr::var("a")),
                                Expr::var("z"),
                            ),
                        ),
                        Expr::int(1),
                    ),
                ),
            ),
        )]);

        let globals = convert(&program);
        let lambda = find(&globals, "_main_lambda_0");
        let env_names: Vec<&str> = lambda.env.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(env_names, vec!["b", "a"]);
        assert_eq!(lambda.params.len(), 1);
    }

    #[test]
    fn fix_lifts_a_self_referencing_global() {
        let program = crate::programs::fact_fix().program;
        let globals = convert(&program);

        let fix_global = globals
            .iter()
            .find(|global| global.name.contains("_main_f_"))
            .expect("fix body should be lifted");
        assert!(fix_global.env.is_empty());
        assert_eq!(fix_global.params.len(), 1);

        // The knot: somewhere in the lifted body the global closes over
        // itself.
        fn mentions_closure_over(expr: &mir::Expr, name: &str) -> bool {
            match expr {
                mir::Expr::Closure { fun_name, env, .. } => {
                    fun_name == name || env.iter().any(|e| mentions_closure_over(e, name))
                }
                mir::Expr::Lit(_) | mir::Expr::Local { .. } => false,
                mir::Expr::Let { aexpr, body, .. } => {
                    mentions_closure_over(aexpr, name) || mentions_closure_over(body, name)
                }
                mir::Expr::If { cond, texpr, fexpr } => {
                    mentions_closure_over(cond, name)
                        || mentions_closure_over(texpr, name)
                        || mentions_closure_over(fexpr, name)
                }
                mir::Expr::BinOp { lhs, rhs, .. } => {
                    mentions_closure_over(lhs, name) || mentions_closure_over(rhs, name)
                }
                mir::Expr::CallKnown { args, .. } => {
                    args.iter().any(|arg| mentions_closure_over(arg, name))
                }
                mir::Expr::CallClosure { closure, args, .. } => {
                    mentions_closure_over(closure, name)
                        || args.iter().any(|arg| mentions_closure_over(arg, name))
                }
            }
        }
        assert!(mentions_closure_over(&fix_global.body, &fix_global.name));
    }

    #[test]
    fn partial_application_synthesises_a_curry_wrapper() {
        // add : Int -> Int -> Int, main = (add 1) 2 via a let-bound partial
        let add_ty = Type::curried(vec![Type::Int, Type::Int], Type::Int);
        let program = Program::new(vec![
            Def::new(
                "add",
                add_ty,
                Expr::lam(
                    "a",
                    Type::Int,
                    Expr::lam("b", Type::Int, Expr::add(Expr::var("a"), Expr::var("b"))),
                ),
            ),
            Def::new(
                "main",
                Type::Int,
                Expr::let_(
                    "inc",
                    Type::fun(Type::Int, Type::Int),
                    Expr::app(Expr::var("add"), Expr::int(1)),
                    Expr::app(Expr::var("inc"), Expr::int(2)),
                ),
            ),
        ]);

        let globals = convert(&program);
        let wrapper = find(&globals, "_main_curry_0");
        assert_eq!(wrapper.env.len(), 1);
        assert_eq!(wrapper.params.len(), 1);
        match &wrapper.body {
            mir::Expr::CallKnown { fun_name, args, .. } => {
                assert_eq!(fun_name, "add");
                assert_eq!(args.len(), 2);
            }
            other => panic!("curry wrapper body should be a known call, got {:?}", other),
        }
    }

    #[test]
    fn every_local_in_the_catalogue_resolves() {
        for example in crate::programs::all() {
            for global in convert(&example.program) {
                assert_eq!(
                    global.unresolved_locals(),
                    Vec::<String>::new(),
                    "{} has unresolved locals in {}",
                    example.name,
                    global.name
                );
            }
        }
    }

    #[test]
    fn every_closure_call_in_the_catalogue_is_saturated() {
        fn check(expr: &mir::Expr, context: &str) {
            match expr {
                mir::Expr::Lit(_) | mir::Expr::Local { .. } => {}
                mir::Expr::Let { aexpr, body, .. } => {
                    check(aexpr, context);
                    check(body, context);
                }
                mir::Expr::If { cond, texpr, fexpr } => {
                    check(cond, context);
                    check(texpr, context);
                    check(fexpr, context);
                }
                mir::Expr::BinOp { lhs, rhs, .. } => {
                    check(lhs, context);
                    check(rhs, context);
                }
                mir::Expr::Closure { env, .. } => env.iter().for_each(|e| check(e, context)),
                mir::Expr::CallKnown { args, .. } => args.iter().for_each(|a| check(a, context)),
                mir::Expr::CallClosure { closure, args, ty } => {
                    assert_eq!(
                        args.len(),
                        ty.arity(),
                        "unsaturated closure call in {}",
                        context
                    );
                    check(closure, context);
                    args.iter().for_each(|a| check(a, context));
                }
            }
        }

        for example in crate::programs::all() {
            for global in convert(&example.program) {
                check(&global.body, &format!("{}::{}", example.name, global.name));
            }
        }
    }
}
