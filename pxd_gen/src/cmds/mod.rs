pub mod catalog;
pub mod translate;
