//! mujs-rs - an embeddable JavaScript interpreter in the spirit of MuJS
//!
//! A small ES5-subset engine built for embedding: create a [`State`],
//! register Rust callbacks into its global namespace, and evaluate
//! scripts against them. Each state is isolated and everything it owns
//! is released when it is dropped.
//!
//! # Features
//! - Strict mode by default (undeclared assignment is an error)
//! - Single-pass compiler to a stack-based bytecode VM
//! - Host callbacks with frame-based argument access
//! - Exceptions flow both ways between host and script
//!
//! # Example
//! ```
//! use mujs::{State, Value};
//!
//! let mut state = State::new();
//! state.register("hello", 1, |frame| {
//!     println!("Hello, {}!", frame.arg_str(0));
//!     Ok(Value::Undefined)
//! });
//! state.do_string("hello('world');").unwrap();
//!
//! let result = state.eval("6 * 7;").unwrap();
//! assert_eq!(result.as_number(), Some(42.0));
//! ```

// Core modules
pub mod error;
pub mod state;
pub mod value;

// Virtual machine
pub mod vm;

// Parser and compiler
pub mod parser;

// Default globals
pub mod builtins;

// Runtime support
pub mod runtime;

// Utilities
pub mod util;

// Re-export main types
pub use error::{ErrorKind, JsException, ScriptError, SyntaxError};
pub use runtime::Frame;
pub use state::{Options, State};
pub use value::Value;
