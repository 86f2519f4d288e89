//! Runtime support
//!
//! Core runtime types for script execution:
//! - Compiled function bytecode and native callbacks
//! - The global namespace
//! - The call frame view handed to native callbacks

pub mod frame;
pub mod function;
pub mod globals;

pub use frame::Frame;
pub use function::{FunctionBytecode, NativeFn, NativeFunction, MAX_ARGS};
pub use globals::Globals;
