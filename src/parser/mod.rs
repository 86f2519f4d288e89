//! JavaScript parser and compiler
//!
//! Single-pass parser that generates bytecode directly.

pub mod compiler;
pub mod lexer;

use std::rc::Rc;

use crate::error::SyntaxError;
use crate::runtime::FunctionBytecode;

// Re-exports
pub use compiler::Compiler;
pub use lexer::{Lexer, Token};

/// Compile a script into an executable chunk.
pub fn compile(source: &str) -> Result<Rc<FunctionBytecode>, SyntaxError> {
    Compiler::new(source).compile()
}
