//! Function types: compiled bytecode functions and native callbacks.

use std::fmt;
use std::rc::Rc;

use crate::error::JsException;
use crate::runtime::Frame;
use crate::value::Value;

/// Maximum number of arguments a call site may pass.
pub const MAX_ARGS: usize = 255;

/// Bytecode and metadata for one compiled function or top-level program.
#[derive(Debug, Clone, Default)]
pub struct FunctionBytecode {
    /// Function name, when declared with one.
    pub name: Option<Rc<str>>,
    /// Declared parameter count.
    pub arg_count: u8,
    /// Total local slots, parameters included.
    pub local_count: u8,
    /// The compiled bytecode.
    pub bytecode: Vec<u8>,
    /// Constant pool.
    pub constants: Vec<Value>,
    /// Line number table (pc, line), ascending by pc.
    pub line_numbers: Vec<(u32, u32)>,
    /// Functions declared within this one.
    pub inner: Vec<Rc<FunctionBytecode>>,
}

impl FunctionBytecode {
    pub fn new(arg_count: u8) -> Self {
        FunctionBytecode {
            arg_count,
            local_count: arg_count,
            ..Default::default()
        }
    }

    /// Add a constant to the constant pool, returning its index.
    pub fn add_constant(&mut self, value: Value) -> usize {
        self.constants.push(value);
        self.constants.len() - 1
    }

    pub fn get_constant(&self, idx: usize) -> Option<&Value> {
        self.constants.get(idx)
    }

    /// Emit a single byte.
    pub fn emit_u8(&mut self, byte: u8) {
        self.bytecode.push(byte);
    }

    /// Emit a u16 (little-endian).
    pub fn emit_u16(&mut self, value: u16) {
        self.bytecode.extend_from_slice(&value.to_le_bytes());
    }

    /// Current bytecode offset.
    pub fn current_offset(&self) -> usize {
        self.bytecode.len()
    }

    /// Patch a u16 at a given offset.
    pub fn patch_u16(&mut self, offset: usize, value: u16) {
        let bytes = value.to_le_bytes();
        self.bytecode[offset] = bytes[0];
        self.bytecode[offset + 1] = bytes[1];
    }

    /// Add a line number entry, skipping runs on the same line.
    pub fn add_line_number(&mut self, pc: u32, line: u32) {
        if self.line_numbers.last().map(|&(_, l)| l) != Some(line) {
            self.line_numbers.push((pc, line));
        }
    }

    /// Get the source line for a pc value.
    pub fn get_line_number(&self, pc: u32) -> Option<u32> {
        // Binary search for the last entry with pc <= target.
        let idx = self
            .line_numbers
            .partition_point(|&(p, _)| p <= pc)
            .saturating_sub(1);

        self.line_numbers.get(idx).map(|&(_, line)| line)
    }
}

/// Signature for native callbacks.
///
/// The frame gives indexed access to the receiver and arguments; the
/// returned value is handed to the calling script, and a returned
/// exception unwinds into it as a throw.
pub type NativeFn = dyn Fn(&Frame<'_>) -> Result<Value, JsException>;

/// A host function registered into a state's global namespace.
pub struct NativeFunction {
    name: Rc<str>,
    length: u8,
    func: Box<NativeFn>,
}

impl NativeFunction {
    pub fn new(
        name: impl Into<Rc<str>>,
        length: u8,
        func: impl Fn(&Frame<'_>) -> Result<Value, JsException> + 'static,
    ) -> Self {
        NativeFunction {
            name: name.into(),
            length,
            func: Box::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Advisory arity. Recorded for introspection, never enforced against
    /// call sites.
    pub fn length(&self) -> u8 {
        self.length
    }

    pub fn call(&self, frame: &Frame<'_>) -> Result<Value, JsException> {
        (self.func)(frame)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("length", &self.length)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_bytecode() {
        let mut fb = FunctionBytecode::new(2);
        fb.name = Some("myFunction".into());

        assert_eq!(fb.arg_count, 2);
        assert_eq!(fb.local_count, 2);
        assert_eq!(fb.name.as_deref(), Some("myFunction"));

        let idx = fb.add_constant(Value::number(42.0));
        assert_eq!(fb.get_constant(idx).and_then(Value::as_number), Some(42.0));
    }

    #[test]
    fn test_bytecode_emit_and_patch() {
        let mut fb = FunctionBytecode::new(0);

        fb.emit_u8(0x01);
        let at = fb.current_offset();
        fb.emit_u16(0);
        fb.emit_u8(0x02);

        fb.patch_u16(at, 0x1234);
        assert_eq!(fb.bytecode, vec![0x01, 0x34, 0x12, 0x02]);
    }

    #[test]
    fn test_line_numbers() {
        let mut fb = FunctionBytecode::new(0);

        fb.add_line_number(0, 1);
        fb.add_line_number(4, 1);
        fb.add_line_number(10, 5);
        fb.add_line_number(20, 10);

        // Same-line runs collapse into one entry.
        assert_eq!(fb.line_numbers.len(), 3);
        assert_eq!(fb.get_line_number(0), Some(1));
        assert_eq!(fb.get_line_number(5), Some(1));
        assert_eq!(fb.get_line_number(10), Some(5));
        assert_eq!(fb.get_line_number(15), Some(5));
        assert_eq!(fb.get_line_number(25), Some(10));
    }

    #[test]
    fn test_native_function_call() {
        let native = NativeFunction::new("add", 2, |frame| {
            Ok(Value::number(
                frame.arg(0).to_number() + frame.arg(1).to_number(),
            ))
        });
        assert_eq!(native.name(), "add");
        assert_eq!(native.length(), 2);

        let this_val = Value::undefined();
        let args = [Value::number(2.0), Value::number(3.0)];
        let frame = Frame::new(&this_val, &args);
        let result = native.call(&frame).unwrap();
        assert_eq!(result.as_number(), Some(5.0));
    }
}
