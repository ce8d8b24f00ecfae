//! The example programs the repository ships. Each constructor builds one
//! program; `all` returns the catalogue together with the argument lists
//! and results it is expected to produce.

use crate::ast::{Def, Expr, Program};
use crate::types::Type;

pub struct Example {
    pub name: &'static str,
    pub program: Program,
    /// Invocations paired with their expected results.
    pub runs: Vec<(Vec<i32>, i32)>,
}

fn int_to_int() -> Type {
    Type::fun(Type::Int, Type::Int)
}

fn factorial(n: i32) -> i32 {
    (1..=n).product()
}

fn fact_runs() -> Vec<(Vec<i32>, i32)> {
    (0..8).map(|n| (vec![n], factorial(n))).collect()
}

/// fact : Int -> Int, defined by explicit top-level recursion.
fn fact_def() -> Def {
    Def::new(
        "fact",
        int_to_int(),
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
    )
}

/// apply : (Int -> Int) -> Int -> Int
fn apply_def() -> Def {
    Def::new(
        "apply",
        Type::fun(int_to_int(), int_to_int()),
        Expr::lam(
            "f",
            int_to_int(),
            Expr::lam("x", Type::Int, Expr::app(Expr::var("f"), Expr::var("x"))),
        ),
    )
}

/// main : Int = fact 5
pub fn fact_direct() -> Example {
    Example {
        name: "fact_direct",
        program: Program::new(vec![
            fact_def(),
            Def::new("main", Type::Int, Expr::app(Expr::var("fact"), Expr::int(5))),
        ]),
        runs: vec![(vec![], 120)],
    }
}

/// main : Int -> Int = \n -> fact n
pub fn fact_arg() -> Example {
    Example {
        name: "fact_arg",
        program: Program::new(vec![
            fact_def(),
            Def::new(
                "main",
                int_to_int(),
                Expr::lam("n", Type::Int, Expr::app(Expr::var("fact"), Expr::var("n"))),
            ),
        ]),
        runs: fact_runs(),
    }
}

/// main : Int = let f = fact in f 5
pub fn fact_with_let() -> Example {
    Example {
        name: "fact_with_let",
        program: Program::new(vec![
            fact_def(),
            Def::new(
                "main",
                Type::Int,
                Expr::let_(
                    "f",
                    int_to_int(),
                    Expr::var("fact"),
                    Expr::app(Expr::var("f"), Expr::int(5)),
                ),
            ),
        ]),
        runs: vec![(vec![], 120)],
    }
}

/// helper : Int -> Int -> Int returns fact curried; main over-applies it.
pub fn fact_via_helper() -> Example {
    Example {
        name: "fact_via_helper",
        program: Program::new(vec![
            fact_def(),
            Def::new(
                "helper",
                Type::fun(Type::Int, int_to_int()),
                Expr::lam("unused", Type::Int, Expr::var("fact")),
            ),
            Def::new(
                "main",
                int_to_int(),
                Expr::lam(
                    "n",
                    Type::Int,
                    Expr::apps(Expr::var("helper"), vec![Expr::int(0), Expr::var("n")]),
                ),
            ),
        ]),
        runs: fact_runs(),
    }
}

/// main : Int = apply (\x -> x + 3) 4
pub fn ho_const() -> Example {
    Example {
        name: "ho_const",
        program: Program::new(vec![
            apply_def(),
            Def::new(
                "main",
                Type::Int,
                Expr::apps(
                    Expr::var("apply"),
                    vec![
                        Expr::lam("x", Type::Int, Expr::add(Expr::var("x"), Expr::int(3))),
                        Expr::int(4),
                    ],
                ),
            ),
        ]),
        runs: vec![(vec![], 7)],
    }
}

/// main : Int -> Int = \n -> apply (\x -> x + n) 3, a captured-value
/// closure.
pub fn ho_add() -> Example {
    Example {
        name: "ho_add",
        program: Program::new(vec![
            apply_def(),
            Def::new(
                "main",
                int_to_int(),
                Expr::lam(
                    "n",
                    Type::Int,
                    Expr::apps(
                        Expr::var("apply"),
                        vec![
                            Expr::lam("x", Type::Int, Expr::add(Expr::var("x"), Expr::var("n"))),
                            Expr::int(3),
                        ],
                    ),
                ),
            ),
        ]),
        runs: (0..8).map(|n| (vec![n], n + 3)).collect(),
    }
}

/// main : Int -> Int = \n -> (fix f. \k -> if k = 0 then 1 else k * f (k - 1)) n
pub fn fact_fix() -> Example {
    Example {
        name: "fact_fix",
        program: Program::new(vec![Def::new(
            "main",
            int_to_int(),
            Expr::lam(
                "n",
                Type::Int,
                Expr::app(
                    Expr::fix(
                        "f",
                        int_to_int(),
                        Expr::lam(
                            "k",
                            Type::Int,
                            Expr::if_(
                                Expr::eq(Expr::var("k"), Expr::int(0)),
                                Expr::int(1),
                                Expr::mul(
                                    Expr::var("k"),
                                    Expr::app(
                                        Expr::var("f"),
                                        Expr::sub(Expr::var("k"), Expr::int(1)),
                                    ),
                                ),
                            ),
                        ),
                    ),
                    Expr::var("n"),
                ),
            ),
        )]),
        runs: fact_runs(),
    }
}

pub fn all() -> Vec<Example> {
    vec![
        fact_direct(),
        fact_arg(),
        fact_with_let(),
        fact_via_helper(),
        ho_const(),
        ho_add(),
        fact_fix(),
    ]
}
