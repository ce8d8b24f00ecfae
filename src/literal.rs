// Split into own module so we don't duplicate code between the surface AST
// and the MIR.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Literal {
    Int(i32),
    Bool(bool),
}
