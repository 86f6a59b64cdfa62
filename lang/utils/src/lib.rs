#![allow(clippy::style)]
#![allow(clippy::useless_format)]

pub mod arena;

pub mod prelude {
    /// Data structures.
    pub use crate::arena::*;
}
