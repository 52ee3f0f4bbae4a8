//! Lowered form of a header: an arena of items addressed by [`ItemId`].

pub mod lower;
pub mod model;

pub use lower::collect;
pub use model::*;
