//! Header IR Definitions
//!
//! This crate contains the intermediate representation shared between the C/C++
//! front ends and the `.pxd` generator. It provides pure data structures for
//! declarations, types and constant expressions without any ordering, naming
//! or rendering logic.

pub mod decls;
pub mod expr;
pub mod types;

// Re-export commonly used types at the crate root
pub use decls::*;
pub use expr::*;
pub use types::*;

/// Parse a header from its YAML form.
pub fn header_from_yaml(content: &str) -> Result<Header, serde_yml::Error> {
    serde_yml::from_str(content)
}
