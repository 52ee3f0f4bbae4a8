//! Cython `.pxd` generation from a parsed C/C++ header.
//!
//! A run lowers the header IR into an item arena ([`unit`]), filters it by
//! origin ([`whitelist`]), orders it ([`dependency`]), assigns identifiers
//! ([`naming`]) and renders the document ([`codegen`]). [`pipeline::translate`]
//! drives the whole sequence.

pub mod cmds;
pub mod codegen;
pub mod config;
pub mod dependency;
pub mod errors;
pub mod naming;
pub mod pipeline;
pub mod unit;
pub mod whitelist;

pub use config::{Catalog, GenOptions};
pub use errors::{GenError, GenResult, Stage, Warning, WarningKind};
pub use pipeline::{Translation, translate};
