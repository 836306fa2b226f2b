//! Frontend module - Lexer, Parser, Semantic Analysis

pub mod token;
pub mod lexer;
pub mod cursor;
pub mod listing;
pub mod ast;
pub mod parser;
pub mod printer;
pub mod consteval;
pub mod semantic;
