//! The term language of the middle end.
//!
//! Compiled code stays in LCNF: a chain of lambdas over a body in which
//! applications are spines of atoms, intermediate results are let-bound, and
//! case analysis is a fully applied application of a registered cases
//! constant. Nothing here enforces the shape; the passes preserve it.

use derive_more::From;
use minuet_utils::arena::*;
pub use minuet_syntax::{App, Binder, BinderInfo, Hole, LetBind, Literal, NameId, NameNode};

new_key_type! {
    pub struct ExprId;
    pub struct FVarId;
}

/* ---------------------------------- Terms --------------------------------- */

/// de Bruijn index counting enclosing binders inside out
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, From)]
pub struct BVar(pub u32);

/// universe; `Sort(0)` is the sort of propositions
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub struct Sort(pub u32);

/// reference to an environment declaration
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, From)]
pub struct Const(pub NameId);

#[derive(From, Clone, Debug, Hash, PartialEq, Eq)]
pub enum Expr {
    BVar(BVar),
    FVar(FVarId),
    Sort(Sort),
    Const(Const),
    App(App<ExprId, ExprId>),
    Lam(Binder<ExprId>),
    #[from(ignore)]
    Pi(Binder<ExprId>),
    Let(LetBind<ExprId>),
    Lit(Literal),
    Hole(Hole),
}

/* ------------------------------ Declarations ------------------------------- */

/// A compiled declaration: its name and a lambda chain over the body.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct Decl {
    pub name: NameId,
    pub code: ExprId,
}

impl Decl {
    pub fn new(name: NameId, code: ExprId) -> Self {
        Decl { name, code }
    }
}
