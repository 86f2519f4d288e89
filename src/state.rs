//! Interpreter state
//!
//! `State` is the embedding entry point. It owns the global namespace and
//! the interpreter, and provides host registration and script evaluation.
//! Dropping the state releases everything it owns.

use std::rc::Rc;

use log::{debug, warn};

use crate::builtins;
use crate::error::{JsException, ScriptError};
use crate::parser;
use crate::runtime::{Frame, Globals, NativeFunction};
use crate::value::Value;
use crate::vm::Interpreter;

#[cfg(feature = "dump")]
use crate::error::SyntaxError;
#[cfg(feature = "dump")]
use crate::runtime::FunctionBytecode;

/// Configuration for a new state.
#[derive(Debug, Clone)]
pub struct Options {
    /// Reject assignment to undeclared globals. On by default.
    pub strict: bool,
    /// Maximum script call depth before evaluation fails
    pub max_depth: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            strict: true,
            max_depth: 512,
        }
    }
}

/// An isolated interpreter instance
///
/// Each state carries its own globals; nothing is shared between states.
/// The default globals are installed on creation, and host functions
/// registered later may shadow them.
pub struct State {
    globals: Globals,
    interpreter: Interpreter,
    strict: bool,
}

impl State {
    /// Create a state with default options (strict mode on).
    pub fn new() -> Self {
        Self::with_options(Options::default())
    }

    pub fn with_options(options: Options) -> Self {
        let mut globals = Globals::new();
        builtins::install(&mut globals);
        State {
            globals,
            interpreter: Interpreter::new(options.strict, options.max_depth),
            strict: options.strict,
        }
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Register a host function under `name` in the global namespace.
    ///
    /// `length` is the advisory arity; call sites are never checked
    /// against it, and missing arguments read as `undefined`.
    /// Registering an existing name replaces it.
    pub fn register(
        &mut self,
        name: &str,
        length: u8,
        func: impl Fn(&Frame<'_>) -> Result<Value, JsException> + 'static,
    ) {
        debug!("registering native function '{name}' (length {length})");
        self.globals.set(
            name,
            Value::Native(Rc::new(NativeFunction::new(name, length, func))),
        );
    }

    /// Bind a plain value as a global.
    pub fn set_global(&mut self, name: &str, value: Value) {
        self.globals.set(name, value);
    }

    pub fn get_global(&self, name: &str) -> Option<Value> {
        self.globals.get(name).cloned()
    }

    /// Evaluate a script and return its completion value: the value of
    /// the last top-level expression statement that ran, or `undefined`.
    ///
    /// Globals persist across calls on the same state.
    pub fn eval(&mut self, source: &str) -> Result<Value, ScriptError> {
        let chunk = parser::compile(source)?;
        debug!(
            "compiled {} bytes of bytecode, {} constants",
            chunk.bytecode.len(),
            chunk.constants.len()
        );
        self.interpreter
            .execute(&chunk, &mut self.globals)
            .map_err(|thrown| ScriptError::Uncaught(format_thrown(&thrown)))
    }

    /// Evaluate a script for its side effects, logging any failure before
    /// returning it.
    pub fn do_string(&mut self, source: &str) -> Result<(), ScriptError> {
        self.eval(source)
            .map(drop)
            .inspect_err(|err| warn!("script error: {err}"))
    }

    /// Compile without executing and render the bytecode listing,
    /// including nested functions.
    #[cfg(feature = "dump")]
    pub fn disassemble(&self, source: &str) -> Result<String, SyntaxError> {
        use std::fmt::Write;

        fn walk(out: &mut String, func: &FunctionBytecode) {
            let _ = writeln!(out, "{}:", func.name.as_deref().unwrap_or("<script>"));
            out.push_str(&crate::vm::opcode::disassemble(func));
            for inner in &func.inner {
                walk(out, inner);
            }
        }

        let chunk = parser::compile(source)?;
        let mut out = String::new();
        walk(&mut out, &chunk);
        Ok(out)
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

/// Uncaught values render the way a browser console would: error values
/// through their name and message, everything else through ToString.
fn format_thrown(value: &Value) -> String {
    match value {
        Value::Error(err) => err.to_string(),
        other => other.to_js_string().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use proptest::prelude::*;

    use super::*;

    /// State with a `hello` callback that appends its greeting to a
    /// shared sink.
    fn hello_state() -> (State, Rc<RefCell<String>>) {
        let mut state = State::new();
        let sink = Rc::new(RefCell::new(String::new()));
        let out = sink.clone();
        state.register("hello", 1, move |frame| {
            use std::fmt::Write;
            let _ = writeln!(out.borrow_mut(), "Hello, {}!", frame.arg_str(0));
            Ok(Value::Undefined)
        });
        (state, sink)
    }

    #[test]
    fn test_hello_world() {
        let (mut state, sink) = hello_state();
        let result = state.eval("hello('world');").unwrap();
        assert!(result.is_undefined());
        assert_eq!(sink.borrow().as_str(), "Hello, world!\n");
    }

    #[test]
    fn test_callback_coerces_arguments() {
        let (mut state, sink) = hello_state();
        state.do_string("hello(42);").unwrap();
        state.do_string("hello();").unwrap();
        state.do_string("hello(null);").unwrap();
        assert_eq!(
            sink.borrow().as_str(),
            "Hello, 42!\nHello, undefined!\nHello, null!\n"
        );
    }

    #[test]
    fn test_extra_arguments_are_ignored() {
        let (mut state, sink) = hello_state();
        state.do_string("hello('a', 'b', 'c');").unwrap();
        assert_eq!(sink.borrow().as_str(), "Hello, a!\n");
    }

    #[test]
    fn test_states_are_independent() {
        let mut first = State::new();
        first.do_string("var shared = 1;").unwrap();
        drop(first);

        let mut second = State::new();
        assert!(second.eval("shared;").is_err());
    }

    #[test]
    fn test_invalid_source_reports_syntax_error() {
        let (mut state, sink) = hello_state();
        let err = state.eval("hello('world'").unwrap_err();
        assert!(matches!(err, ScriptError::Syntax(_)));
        assert!(sink.borrow().is_empty());
        // the state stays usable afterwards
        state.do_string("hello('still here');").unwrap();
        assert_eq!(sink.borrow().as_str(), "Hello, still here!\n");
    }

    #[test]
    fn test_registration_replaces() {
        let mut state = State::new();
        state.register("f", 0, |_| Ok(Value::number(1.0)));
        state.register("f", 0, |_| Ok(Value::number(2.0)));
        assert_eq!(state.eval("f();").unwrap().as_number(), Some(2.0));
    }

    #[test]
    fn test_completion_value() {
        let mut state = State::new();
        assert_eq!(state.eval("1; 2;").unwrap().as_number(), Some(2.0));
        assert!(state.eval("").unwrap().is_undefined());
        // declarations do not produce a completion value
        assert!(state.eval("var x = 5;").unwrap().is_undefined());
        assert_eq!(state.eval("x;").unwrap().as_number(), Some(5.0));
    }

    #[test]
    fn test_globals_persist_across_eval() {
        let mut state = State::new();
        state.do_string("var n = 3;").unwrap();
        state.do_string("function twice(v) { return v * 2; }").unwrap();
        assert_eq!(state.eval("twice(n);").unwrap().as_number(), Some(6.0));
    }

    #[test]
    fn test_set_and_get_global() {
        let mut state = State::new();
        state.set_global("answer", Value::number(42.0));
        assert_eq!(state.eval("answer;").unwrap().as_number(), Some(42.0));
        state.do_string("var produced = answer + 1;").unwrap();
        assert_eq!(
            state.get_global("produced").and_then(|v| v.as_number()),
            Some(43.0)
        );
        assert!(state.get_global("missing").is_none());
    }

    #[test]
    fn test_arithmetic_and_coercion() {
        let mut state = State::new();
        assert_eq!(state.eval("2 + 3 * 4;").unwrap().as_number(), Some(14.0));
        assert_eq!(state.eval("(2 + 3) * 4;").unwrap().as_number(), Some(20.0));
        assert_eq!(state.eval("1 + '2';").unwrap().as_str(), Some("12"));
        assert_eq!(state.eval("'3' * '4';").unwrap().as_number(), Some(12.0));
        assert_eq!(
            state.eval("String(0.1 + 0.2);").unwrap().as_str(),
            Some("0.30000000000000004")
        );
    }

    #[test]
    fn test_equality() {
        let mut state = State::new();
        assert_eq!(state.eval("1 == '1';").unwrap().as_boolean(), Some(true));
        assert_eq!(state.eval("1 === '1';").unwrap().as_boolean(), Some(false));
        assert_eq!(
            state.eval("null == undefined;").unwrap().as_boolean(),
            Some(true)
        );
        assert_eq!(
            state.eval("null === undefined;").unwrap().as_boolean(),
            Some(false)
        );
        assert_eq!(state.eval("NaN == NaN;").unwrap().as_boolean(), Some(false));
    }

    #[test]
    fn test_function_declaration_and_call() {
        let mut state = State::new();
        let result = state
            .eval("function add(a, b) { return a + b; } add(2, 3);")
            .unwrap();
        assert_eq!(result.as_number(), Some(5.0));
    }

    #[test]
    fn test_recursion() {
        let mut state = State::new();
        let result = state
            .eval(
                "function fib(n) { if (n < 2) { return n; } return fib(n - 1) + fib(n - 2); }
                 fib(10);",
            )
            .unwrap();
        assert_eq!(result.as_number(), Some(55.0));
    }

    #[test]
    fn test_while_loop() {
        let mut state = State::new();
        let result = state
            .eval(
                "var sum = 0;
                 var i = 1;
                 while (i < 6) {
                     sum = sum + i;
                     i = i + 1;
                 }
                 sum;",
            )
            .unwrap();
        assert_eq!(result.as_number(), Some(15.0));
    }

    #[test]
    fn test_for_loop_with_break_continue() {
        let mut state = State::new();
        let result = state
            .eval(
                "var sum = 0;
                 for (var i = 0; i < 10; i++) {
                     if (i == 3) { continue; }
                     if (i == 6) { break; }
                     sum += i;
                 }
                 sum;",
            )
            .unwrap();
        // 0 + 1 + 2 + 4 + 5
        assert_eq!(result.as_number(), Some(12.0));
    }

    #[test]
    fn test_try_catch() {
        let mut state = State::new();
        let result = state
            .eval("try { throw 'x'; } catch (e) { e + '!'; }")
            .unwrap();
        assert_eq!(result.as_str(), Some("x!"));
    }

    #[test]
    fn test_uncaught_reference_error() {
        let mut state = State::new();
        let err = state.eval("missing();").unwrap_err();
        match err {
            ScriptError::Uncaught(message) => {
                assert_eq!(message, "ReferenceError: 'missing' is not defined (line 1)");
            }
            other => panic!("expected an uncaught error, got {other}"),
        }
    }

    #[test]
    fn test_error_line_numbers() {
        let mut state = State::new();
        let err = state.eval("1;\n2;\nmissing;").unwrap_err();
        assert!(err.to_string().contains("(line 3)"));
    }

    #[test]
    fn test_host_exception_is_catchable() {
        let mut state = State::new();
        state.register("boom", 0, |_| {
            Err(JsException::type_error("nope"))
        });
        let result = state.eval("try { boom(); } catch (e) { '' + e; }").unwrap();
        // host exceptions pass through without a line suffix
        assert_eq!(result.as_str(), Some("TypeError: nope"));
    }

    #[test]
    fn test_host_exception_uncaught() {
        let mut state = State::new();
        state.register("boom", 0, |_| Err(JsException::range("bad size")));
        let err = state.eval("boom();").unwrap_err();
        assert_eq!(err.to_string(), "uncaught exception: RangeError: bad size");
    }

    #[test]
    fn test_strict_mode_rejects_undeclared_assignment() {
        let mut state = State::new();
        assert!(state.is_strict());
        let err = state.eval("x = 1;").unwrap_err();
        assert!(err.to_string().contains("ReferenceError"));
        assert!(state.get_global("x").is_none());
    }

    #[test]
    fn test_loose_mode_creates_global_on_assignment() {
        let mut state = State::with_options(Options {
            strict: false,
            ..Options::default()
        });
        assert!(!state.is_strict());
        state.do_string("x = 1;").unwrap();
        assert_eq!(state.eval("x;").unwrap().as_number(), Some(1.0));
    }

    #[test]
    fn test_undeclared_reads_always_throw() {
        let mut state = State::with_options(Options {
            strict: false,
            ..Options::default()
        });
        assert!(state.eval("ghost;").is_err());
    }

    #[test]
    fn test_typeof() {
        let mut state = State::new();
        assert_eq!(state.eval("typeof print;").unwrap().as_str(), Some("function"));
        assert_eq!(state.eval("typeof 'a';").unwrap().as_str(), Some("string"));
        assert_eq!(state.eval("typeof missing;").unwrap().as_str(), Some("undefined"));
        assert_eq!(state.eval("typeof null;").unwrap().as_str(), Some("object"));
    }

    #[test]
    fn test_syntax_error_with_line() {
        let mut state = State::new();
        let err = state.eval("1;\n1 +;").unwrap_err();
        match err {
            ScriptError::Syntax(err) => {
                assert_eq!(err.line, 2);
            }
            other => panic!("expected a syntax error, got {other}"),
        }
    }

    #[test]
    fn test_recursion_limit() {
        let mut state = State::with_options(Options {
            max_depth: 64,
            ..Options::default()
        });
        let err = state.eval("function f() { return f(); } f();").unwrap_err();
        assert!(err.to_string().contains("maximum call stack size exceeded"));
    }

    #[test]
    fn test_builtins_present() {
        let mut state = State::new();
        assert_eq!(
            state.eval("parseInt('0x1f');").unwrap().as_number(),
            Some(31.0)
        );
        assert_eq!(state.eval("isNaN(NaN);").unwrap().as_boolean(), Some(true));
        assert_eq!(
            state.eval("Number('12') + 1;").unwrap().as_number(),
            Some(13.0)
        );
    }

    #[cfg(feature = "dump")]
    #[test]
    fn test_disassemble_lists_functions() {
        let state = State::new();
        let listing = state.disassemble("function f() { return 1; } f();").unwrap();
        assert!(listing.contains("<script>:"));
        assert!(listing.contains("f:"));
        assert!(listing.contains("Call"));
    }

    proptest! {
        #[test]
        fn greeting_echoes_argument(name in "[A-Za-z0-9 ]{0,24}") {
            let (mut state, sink) = hello_state();
            state.do_string(&format!("hello('{name}');")).unwrap();
            let actual = sink.borrow();
            let expected = format!("Hello, {name}!\n");
            prop_assert_eq!(actual.as_str(), expected.as_str());
        }
    }
}
