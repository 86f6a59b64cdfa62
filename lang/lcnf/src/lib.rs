#![allow(clippy::style)]

/// LCNF term syntax and compiled declarations.
pub mod syntax;
/// Hash-consed term storage, cached structural flags, node constructors.
pub mod arena;
/// Bound and free variable substitution walkers.
pub mod subst;
/// Local typing contexts with cheap snapshots.
pub mod lctx;
/// The environment: declarations, case registries, attributes, and the
/// persistent specialization tables.
pub mod env;
/// Weak-head normalization and type inference.
pub mod tyck;
/// Plain-text formatters.
pub mod fmt;
/// Errors.
pub mod err;

pub mod prelude {
    pub use crate::arena::{ExprArena, FVarGen, Prims, TermStore};
    pub use crate::env::*;
    pub use crate::err::{Error, Result};
    pub use crate::fmt::{Formatter, Ugly};
    pub use crate::lctx::{LocalCtx, LocalDecl};
    pub use crate::syntax::*;
    pub use crate::tyck::TypeChecker;
}
