//! Call frame view passed to native callbacks.

use std::rc::Rc;

use crate::value::Value;

/// Indexed view of one call's receiver and arguments.
///
/// Slot 0 is the receiver (`this`); slots 1 and up are the arguments in
/// call order. Reads past the last slot yield `undefined`, so a callback
/// is total over any call shape regardless of its declared arity.
pub struct Frame<'a> {
    this_val: &'a Value,
    args: &'a [Value],
}

impl<'a> Frame<'a> {
    pub fn new(this_val: &'a Value, args: &'a [Value]) -> Self {
        Frame { this_val, args }
    }

    /// Number of arguments the caller actually passed.
    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    /// Number of slots, receiver included.
    pub fn slot_count(&self) -> usize {
        self.args.len() + 1
    }

    /// The receiver in slot 0.
    pub fn this_value(&self) -> &Value {
        self.this_val
    }

    /// Raw slot access: 0 is the receiver, 1 and up are arguments.
    pub fn slot(&self, index: usize) -> Value {
        match index {
            0 => self.this_val.clone(),
            i => self.args.get(i - 1).cloned().unwrap_or(Value::Undefined),
        }
    }

    /// Argument `index` (0-based), or `None` when the caller passed fewer.
    pub fn try_arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    /// Argument `index`, defaulting to `undefined` when absent.
    pub fn arg(&self, index: usize) -> Value {
        self.args.get(index).cloned().unwrap_or(Value::Undefined)
    }

    /// Argument `index` coerced to a string. An absent argument coerces to
    /// `"undefined"`, same as an explicit `undefined`.
    pub fn arg_str(&self, index: usize) -> Rc<str> {
        self.arg(index).to_js_string()
    }

    /// All arguments as a slice.
    pub fn args(&self) -> &[Value] {
        self.args
    }
}
