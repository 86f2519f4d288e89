//! Default globals
//!
//! The environment installed into every fresh state: `print`, the
//! conversion functions, and the ambient value constants. These go through
//! the same registration path as host callbacks, so a script cannot tell
//! them apart.

use std::rc::Rc;

use crate::error::JsException;
use crate::runtime::{Frame, Globals, NativeFunction};
use crate::util::number;
use crate::value::Value;

/// Install the default globals into `globals`.
pub fn install(globals: &mut Globals) {
    globals.set("undefined", Value::Undefined);
    globals.set("NaN", Value::number(f64::NAN));
    globals.set("Infinity", Value::number(f64::INFINITY));

    native(globals, "print", 1, |frame| {
        let line = frame
            .args()
            .iter()
            .map(Value::to_js_string)
            .collect::<Vec<_>>()
            .join(" ");
        println!("{line}");
        Ok(Value::Undefined)
    });

    native(globals, "String", 1, |frame| {
        Ok(match frame.try_arg(0) {
            Some(value) => Value::string(value.to_js_string()),
            None => Value::string(""),
        })
    });

    native(globals, "Number", 1, |frame| {
        Ok(match frame.try_arg(0) {
            Some(value) => Value::number(value.to_number()),
            None => Value::number(0.0),
        })
    });

    native(globals, "Boolean", 1, |frame| {
        Ok(Value::boolean(frame.arg(0).to_boolean()))
    });

    native(globals, "parseInt", 2, |frame| {
        let text = frame.arg_str(0);
        let radix = number::to_int32(frame.arg(1).to_number());
        let result = if radix == 0 {
            number::parse_int(&text, 0)
        } else if (2..=36).contains(&radix) {
            number::parse_int(&text, radix as u32)
        } else {
            f64::NAN
        };
        Ok(Value::number(result))
    });

    native(globals, "parseFloat", 1, |frame| {
        Ok(Value::number(number::parse_float(&frame.arg_str(0))))
    });

    native(globals, "isNaN", 1, |frame| {
        Ok(Value::boolean(frame.arg(0).to_number().is_nan()))
    });

    native(globals, "isFinite", 1, |frame| {
        Ok(Value::boolean(frame.arg(0).to_number().is_finite()))
    });
}

fn native(
    globals: &mut Globals,
    name: &str,
    length: u8,
    func: impl Fn(&Frame<'_>) -> Result<Value, JsException> + 'static,
) {
    globals.set(
        name,
        Value::Native(Rc::new(NativeFunction::new(name, length, func))),
    );
}
