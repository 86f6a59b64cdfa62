pub mod fmt;
pub use fmt::*;

pub mod name;
pub use name::*;

use derive_more::From;

/* --------------------------------- Binder --------------------------------- */

/// How a formal parameter was introduced at the surface. Only the instance
/// distinction matters to the middle end; the others are carried for display.
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq)]
pub enum BinderInfo {
    #[default]
    Explicit,
    Implicit,
    InstImplicit,
}

impl BinderInfo {
    pub fn is_inst_implicit(self) -> bool {
        matches!(self, BinderInfo::InstImplicit)
    }
}

/* ------------------------------- Structural ------------------------------- */

/// `e1 e2` shaped application
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct App<S, T>(pub S, pub T);

/// `fun (x : t) => e` and `(x : t) -> e` shaped binding structure
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct Binder<T> {
    pub name: NameId,
    pub ty: T,
    pub body: T,
    pub info: BinderInfo,
}

/// `let x : t := v; e`
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct LetBind<T> {
    pub name: NameId,
    pub ty: T,
    pub value: T,
    pub body: T,
}

/// `_`; stands for an erased position, e.g. in structural cache keys
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct Hole;

/// literals in term
#[derive(From, Clone, Debug, Hash, PartialEq, Eq)]
pub enum Literal {
    Nat(u64),
    Str(String),
}
