//! JavaScript value representation
//!
//! `Value` is a small enum: primitives are stored inline and reference
//! kinds share their payload through `Rc`, so cloning a value is cheap and
//! dropping the owning state releases everything it produced. There is no
//! garbage collector; nothing in the language subset can form a reference
//! cycle.

use std::fmt;
use std::rc::Rc;

use crate::error::JsException;
use crate::runtime::{FunctionBytecode, NativeFunction};
use crate::util::number;

/// A JavaScript value.
#[derive(Debug, Clone)]
pub enum Value {
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(Rc<str>),
    /// A compiled script function.
    Function(Rc<FunctionBytecode>),
    /// A host callback registered into the global namespace.
    Native(Rc<NativeFunction>),
    /// A thrown or constructed exception value.
    Error(Rc<JsException>),
}

impl Value {
    // Constructors

    #[inline]
    pub const fn undefined() -> Self {
        Value::Undefined
    }

    #[inline]
    pub const fn null() -> Self {
        Value::Null
    }

    #[inline]
    pub const fn boolean(b: bool) -> Self {
        Value::Boolean(b)
    }

    #[inline]
    pub const fn number(n: f64) -> Self {
        Value::Number(n)
    }

    #[inline]
    pub fn string(s: impl Into<Rc<str>>) -> Self {
        Value::String(s.into())
    }

    #[inline]
    pub fn error(exception: JsException) -> Self {
        Value::Error(Rc::new(exception))
    }

    // Type checking

    #[inline]
    pub const fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    #[inline]
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    #[inline]
    pub const fn is_boolean(&self) -> bool {
        matches!(self, Value::Boolean(_))
    }

    #[inline]
    pub const fn is_number(&self) -> bool {
        matches!(self, Value::Number(_))
    }

    #[inline]
    pub const fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    /// Script functions and native callbacks both answer true.
    #[inline]
    pub const fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_) | Value::Native(_))
    }

    #[inline]
    pub const fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    // Value extraction, without coercion

    #[inline]
    pub const fn as_boolean(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    #[inline]
    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// The `typeof` string for this value.
    pub const fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Function(_) | Value::Native(_) => "function",
            Value::Error(_) => "object",
        }
    }

    // Coercions

    /// ToBoolean.
    pub fn to_boolean(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Function(_) | Value::Native(_) | Value::Error(_) => true,
        }
    }

    /// ToNumber.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Number(n) => *n,
            Value::String(s) => number::parse(s),
            Value::Function(_) | Value::Native(_) | Value::Error(_) => f64::NAN,
        }
    }

    /// ToString.
    pub fn to_js_string(&self) -> Rc<str> {
        match self {
            Value::Undefined => "undefined".into(),
            Value::Null => "null".into(),
            Value::Boolean(true) => "true".into(),
            Value::Boolean(false) => "false".into(),
            Value::Number(n) => number::format(*n).into(),
            Value::String(s) => s.clone(),
            Value::Function(f) => {
                format!("function {}() {{ ... }}", f.name.as_deref().unwrap_or("")).into()
            }
            Value::Native(f) => format!("function {}() {{ [native code] }}", f.name()).into(),
            Value::Error(e) => e.to_string().into(),
        }
    }

    // Equality

    /// Strict equality (`===`). Reference kinds compare by identity.
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => Rc::ptr_eq(a, b),
            (Value::Error(a), Value::Error(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Loose equality (`==`): `undefined` and `null` match each other, and
    /// mixed primitives compare numerically.
    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
            (
                Value::Number(_) | Value::String(_) | Value::Boolean(_),
                Value::Number(_) | Value::String(_) | Value::Boolean(_),
            ) => {
                if let (Value::String(a), Value::String(b)) = (self, other) {
                    a == b
                } else {
                    self.to_number() == other.to_number()
                }
            }
            _ => self.strict_equals(other),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Undefined
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_js_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_of() {
        assert_eq!(Value::undefined().type_of(), "undefined");
        assert_eq!(Value::null().type_of(), "object");
        assert_eq!(Value::boolean(true).type_of(), "boolean");
        assert_eq!(Value::number(1.5).type_of(), "number");
        assert_eq!(Value::string("x").type_of(), "string");
        assert_eq!(
            Value::error(JsException::error("boom")).type_of(),
            "object"
        );
    }

    #[test]
    fn test_to_boolean() {
        assert!(!Value::undefined().to_boolean());
        assert!(!Value::null().to_boolean());
        assert!(!Value::number(0.0).to_boolean());
        assert!(!Value::number(f64::NAN).to_boolean());
        assert!(!Value::string("").to_boolean());
        assert!(Value::number(-1.0).to_boolean());
        assert!(Value::string("0").to_boolean());
        assert!(Value::error(JsException::error("e")).to_boolean());
    }

    #[test]
    fn test_to_number() {
        assert!(Value::undefined().to_number().is_nan());
        assert_eq!(Value::null().to_number(), 0.0);
        assert_eq!(Value::boolean(true).to_number(), 1.0);
        assert_eq!(Value::string("  42 ").to_number(), 42.0);
        assert_eq!(Value::string("").to_number(), 0.0);
        assert!(Value::string("abc").to_number().is_nan());
    }

    #[test]
    fn test_to_js_string() {
        assert_eq!(&*Value::undefined().to_js_string(), "undefined");
        assert_eq!(&*Value::null().to_js_string(), "null");
        assert_eq!(&*Value::number(42.0).to_js_string(), "42");
        assert_eq!(&*Value::number(-0.5).to_js_string(), "-0.5");
        assert_eq!(&*Value::boolean(false).to_js_string(), "false");
        assert_eq!(
            &*Value::error(JsException::type_error("bad")).to_js_string(),
            "TypeError: bad"
        );
    }

    #[test]
    fn test_strict_equals() {
        assert!(Value::number(1.0).strict_equals(&Value::number(1.0)));
        assert!(!Value::number(f64::NAN).strict_equals(&Value::number(f64::NAN)));
        assert!(Value::number(0.0).strict_equals(&Value::number(-0.0)));
        assert!(Value::string("a").strict_equals(&Value::string("a")));
        assert!(!Value::string("1").strict_equals(&Value::number(1.0)));
        assert!(!Value::undefined().strict_equals(&Value::null()));

        let f = Rc::new(FunctionBytecode::new(0));
        let a = Value::Function(f.clone());
        let b = Value::Function(f);
        let c = Value::Function(Rc::new(FunctionBytecode::new(0)));
        assert!(a.strict_equals(&b));
        assert!(!a.strict_equals(&c));
    }

    #[test]
    fn test_loose_equals() {
        assert!(Value::undefined().loose_equals(&Value::null()));
        assert!(Value::string("1").loose_equals(&Value::number(1.0)));
        assert!(Value::boolean(true).loose_equals(&Value::number(1.0)));
        assert!(Value::string("").loose_equals(&Value::number(0.0)));
        assert!(!Value::string("a").loose_equals(&Value::number(0.0)));
        assert!(!Value::undefined().loose_equals(&Value::number(0.0)));
        assert!(!Value::null().loose_equals(&Value::boolean(false)));
    }
}
