//! Backend module - Stack machine code generation

pub mod codegen;
pub mod emitter;
pub mod opcode;

pub use codegen::{generate, CodeGenerator, Module};
pub use emitter::Emitter;
pub use opcode::Opcode;
