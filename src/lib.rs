//! cd25c - CD25 Compiler
//!
//! Compiles CD25 programs to text for the SM stack machine.

pub mod backend;
pub mod driver;
pub mod feedback;
pub mod frontend;
pub mod types;
pub mod utils;

pub use driver::{compile, compile_to_module, CompileOptions, Compilation};
