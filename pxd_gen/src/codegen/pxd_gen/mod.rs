pub mod helpers;
pub mod types;
pub mod exprs;
pub mod dcls;
pub mod imports;

// Re-export main public functions
pub use dcls::{emit_declaration, emit_forward_declaration};
pub use helpers::RenderContext;
pub use imports::{ImportTable, collect_imports, import_lines};
pub use types::parse_field_decl;
