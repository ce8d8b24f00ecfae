use crate::ast::BinOp;
use crate::literal::Literal;
use crate::types::Type;

/// Expressions after closure conversion. Lambdas, applications, and fix are
/// gone; every function lives at the top level and every variable use is
/// classified as a local of the enclosing global. `CallClosure` is always
/// saturated: the converter expands partial and over-application into curry
/// wrappers and call chains before the MIR is handed to codegen.
#[derive(Clone, Debug)]
pub enum Expr {
    Lit(Literal),
    Local {
        name: String,
        ty: Type,
    },
    Let {
        name: String,
        ty: Type,
        aexpr: Box<Expr>,
        body: Box<Expr>,
    },
    If {
        cond: Box<Expr>,
        texpr: Box<Expr>,
        fexpr: Box<Expr>,
    },
    BinOp {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Pairs a global's wrapper pointer with a heap-allocated environment
    /// holding the captured values in declaration order. `ty` is the
    /// apparent function type of the closure value.
    Closure {
        fun_name: String,
        env: Vec<Expr>,
        ty: Type,
    },
    /// Direct call to a global whose arity the supplied arguments exactly
    /// match.
    CallKnown {
        fun_name: String,
        args: Vec<Expr>,
        ret: Type,
    },
    /// Indirect call through a closure value of function type `ty`,
    /// supplying all `ty.arity()` arguments at once.
    CallClosure {
        closure: Box<Expr>,
        args: Vec<Expr>,
        ty: Type,
    },
}

impl Expr {
    /// The Simply type of this expression. Total on converter output.
    pub fn ty(&self) -> Type {
        match self {
            Expr::Lit(Literal::Int(_)) => Type::Int,
            Expr::Lit(Literal::Bool(_)) => Type::Bool,
            Expr::Local { ty, .. } => ty.clone(),
            Expr::Let { body, .. } => body.ty(),
            Expr::If { texpr, .. } => texpr.ty(),
            Expr::BinOp { op, .. } => op.result_type(),
            Expr::Closure { ty, .. } => ty.clone(),
            Expr::CallKnown { ret, .. } => ret.clone(),
            Expr::CallClosure { ty, .. } => ty.uncurry().1,
        }
    }
}

/// A top-level definition in the converted program. Captured variables are
/// passed through an opaque environment pointer and unpacked in the
/// function prologue; user parameters follow. `ret` may itself be a
/// function type, in which case the global returns a closure value.
#[derive(Clone, Debug)]
pub struct Global {
    pub name: String,
    pub env: Vec<(String, Type)>,
    pub params: Vec<(String, Type)>,
    pub ret: Type,
    pub body: Expr,
}

impl Global {
    /// The function type a closure over this global exposes to the program.
    pub fn apparent_type(&self) -> Type {
        Type::curried(
            self.params.iter().map(|(_, ty)| ty.clone()).collect(),
            self.ret.clone(),
        )
    }

    /// Local names used in the body that are not declared by this global's
    /// captures, parameters, or an enclosing let. Empty on well-formed
    /// converter output.
    pub fn unresolved_locals(&self) -> Vec<String> {
        fn walk(expr: &Expr, scope: &im::HashSet<String>, out: &mut Vec<String>) {
            match expr {
                Expr::Lit(_) => {}
                Expr::Local { name, .. } => {
                    if !scope.contains(name) {
                        out.push(name.clone());
                    }
                }
                Expr::Let {
                    name, aexpr, body, ..
                } => {
                    walk(aexpr, scope, out);
                    walk(body, &scope.update(name.clone()), out);
                }
                Expr::If { cond, texpr, fexpr } => {
                    walk(cond, scope, out);
                    walk(texpr, scope, out);
                    walk(fexpr, scope, out);
                }
                Expr::BinOp { lhs, rhs, .. } => {
                    walk(lhs, scope, out);
                    walk(rhs, scope, out);
                }
                Expr::Closure { env, .. } => {
                    for captured in env {
                        walk(captured, scope, out);
                    }
                }
                Expr::CallKnown { args, .. } => {
                    for arg in args {
                        walk(arg, scope, out);
                    }
                }
                Expr::CallClosure { closure, args, .. } => {
                    walk(closure, scope, out);
                    for arg in args {
                        walk(arg, scope, out);
                    }
                }
            }
        }

        let scope: im::HashSet<String> = self
            .env
            .iter()
            .chain(self.params.iter())
            .map(|(name, _)| name.clone())
            .collect();
        let mut out = Vec::new();
        walk(&self.body, &scope, &mut out);
        out
    }
}
