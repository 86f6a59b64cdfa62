#![allow(clippy::style)]

/// Local simplification: beta folding, atom inlining, dead let removal.
pub mod simp;
/// Parameter classification feeding the specializer.
pub mod info;
/// The code specialization pass.
pub mod specialize;

pub mod prelude {
    pub use crate::info::collect_spec_info;
    pub use crate::simp::{simp, SimpConfig};
    pub use crate::specialize::{specialize_decls, SpecConfig};
}
