//! Bytecode interpreter
//!
//! Executes compiled chunks on a value stack. A throw is an `Err` carrying
//! the thrown value; it unwinds to the innermost registered catch handler,
//! or out of `execute` when no handler remains.

use std::rc::Rc;

use log::trace;

use crate::error::{ErrorKind, JsException};
use crate::runtime::{Frame, FunctionBytecode, Globals};
use crate::util::number;
use crate::value::Value;
use crate::vm::opcode::OpCode;
use crate::vm::stack::Stack;

/// One activation of a compiled function.
#[derive(Debug)]
struct CallFrame {
    /// Function being executed
    func: Rc<FunctionBytecode>,
    /// Program counter (offset into bytecode)
    pc: usize,
    /// Index into the value stack where this frame's locals start
    base: usize,
    /// `this` value for this call
    this_val: Value,
}

/// Registered catch target. A throw unwinds to the innermost one.
#[derive(Debug, Clone, Copy)]
struct CatchHandler {
    /// Bytecode offset to resume at, in the frame that registered it
    target: usize,
    /// Value stack length to restore
    stack_len: usize,
    /// Call stack depth when registered
    call_depth: usize,
}

/// What one instruction asks the dispatch loop to do next.
enum Flow {
    Next,
    Return(Value),
}

/// Interpreter state
pub struct Interpreter {
    stack: Stack,
    call_stack: Vec<CallFrame>,
    catch_handlers: Vec<CatchHandler>,
    /// Maximum call depth before a stack overflow is raised
    max_depth: usize,
    /// Reject assignment to undeclared globals
    strict: bool,
}

impl Interpreter {
    /// Default stack capacity
    const DEFAULT_STACK_SIZE: usize = 1024;

    pub fn new(strict: bool, max_depth: usize) -> Self {
        Interpreter {
            stack: Stack::new(Self::DEFAULT_STACK_SIZE),
            call_stack: Vec::with_capacity(64),
            catch_handlers: Vec::new(),
            max_depth,
            strict,
        }
    }

    /// Run a compiled chunk to completion against `globals`.
    ///
    /// `Err` carries the thrown value when nothing caught it.
    pub fn execute(
        &mut self,
        chunk: &Rc<FunctionBytecode>,
        globals: &mut Globals,
    ) -> Result<Value, Value> {
        self.stack.clear();
        self.call_stack.clear();
        self.catch_handlers.clear();
        self.push_call(chunk.clone(), Value::Undefined, Vec::new())?;
        self.run(globals)
    }

    fn run(&mut self, globals: &mut Globals) -> Result<Value, Value> {
        loop {
            let Some(byte) = self.fetch_op() else {
                // Chunk ended without an explicit return.
                match self.finish_frame(Value::Undefined) {
                    Some(result) => return Ok(result),
                    None => continue,
                }
            };
            match self.step(byte, globals) {
                Ok(Flow::Next) => {}
                Ok(Flow::Return(value)) => {
                    if let Some(result) = self.finish_frame(value) {
                        return Ok(result);
                    }
                }
                Err(thrown) => self.unwind(thrown)?,
            }
        }
    }

    /// Execute one instruction.
    fn step(&mut self, byte: u8, globals: &mut Globals) -> Result<Flow, Value> {
        let Some(op) = OpCode::from_u8(byte) else {
            return Err(self.error_value(
                ErrorKind::InternalError,
                &format!("invalid opcode {byte:#04x}"),
            ));
        };
        match op {
            OpCode::Invalid => {
                return Err(self.error_value(ErrorKind::InternalError, "invalid opcode"));
            }
            OpCode::Nop => {}

            // Push values
            OpCode::Undefined => self.stack.push(Value::Undefined),
            OpCode::Null => self.stack.push(Value::Null),
            OpCode::PushTrue => self.stack.push(Value::Boolean(true)),
            OpCode::PushFalse => self.stack.push(Value::Boolean(false)),
            OpCode::PushThis => {
                let value = match self.call_stack.last() {
                    Some(frame) => frame.this_val.clone(),
                    None => Value::Undefined,
                };
                self.stack.push(value);
            }
            OpCode::Push0 => self.stack.push(Value::number(0.0)),
            OpCode::Push1 => self.stack.push(Value::number(1.0)),
            OpCode::PushI8 => {
                let n = self.fetch_u8()? as i8;
                self.stack.push(Value::number(n as f64));
            }
            OpCode::PushI16 => {
                let n = self.fetch_u16()? as i16;
                self.stack.push(Value::number(n as f64));
            }
            OpCode::PushConst8 => {
                let idx = self.fetch_u8()? as usize;
                let value = self.constant(idx)?;
                self.stack.push(value);
            }
            OpCode::PushConst => {
                let idx = self.fetch_u16()? as usize;
                let value = self.constant(idx)?;
                self.stack.push(value);
            }
            OpCode::Closure => {
                let idx = self.fetch_u8()? as usize;
                let func = self
                    .current_frame()?
                    .func
                    .inner
                    .get(idx)
                    .cloned()
                    .ok_or_else(|| {
                        Value::error(JsException::internal("inner function index out of range"))
                    })?;
                self.stack.push(Value::Function(func));
            }

            // Stack manipulation
            OpCode::Drop => {
                self.pop()?;
            }
            OpCode::Dup => {
                self.stack
                    .dup()
                    .ok_or_else(|| Value::error(JsException::internal("stack underflow")))?;
            }
            OpCode::Swap => {
                self.stack
                    .swap()
                    .ok_or_else(|| Value::error(JsException::internal("stack underflow")))?;
            }

            // Local slots
            OpCode::GetLocal => {
                let index = self.fetch_u8()? as usize;
                let base = self.current_frame()?.base;
                let value = self
                    .stack
                    .get_local(base, index)
                    .cloned()
                    .ok_or_else(|| Value::error(JsException::internal("local slot out of range")))?;
                self.stack.push(value);
            }
            OpCode::SetLocal => {
                let index = self.fetch_u8()? as usize;
                let base = self.current_frame()?.base;
                let value = self.pop()?;
                self.stack
                    .set_local(base, index, value)
                    .ok_or_else(|| Value::error(JsException::internal("local slot out of range")))?;
            }

            // Global namespace
            OpCode::GetGlobal => {
                let name = self.fetch_name()?;
                match globals.get(&name) {
                    Some(value) => self.stack.push(value.clone()),
                    None => {
                        return Err(self.error_value(
                            ErrorKind::ReferenceError,
                            &format!("'{name}' is not defined"),
                        ));
                    }
                }
            }
            OpCode::GetGlobalNoCheck => {
                let name = self.fetch_name()?;
                let value = globals.get(&name).cloned().unwrap_or(Value::Undefined);
                self.stack.push(value);
            }
            OpCode::SetGlobal => {
                let name = self.fetch_name()?;
                let value = self.pop()?;
                if !globals.contains(&name) && self.strict {
                    return Err(self.error_value(
                        ErrorKind::ReferenceError,
                        &format!("'{name}' is not defined"),
                    ));
                }
                globals.set(name, value);
            }
            OpCode::DefineGlobal => {
                let name = self.fetch_name()?;
                let value = self.pop()?;
                globals.set(name, value);
            }
            OpCode::DeclareGlobal => {
                let name = self.fetch_name()?;
                globals.declare(name);
            }

            // Calls and returns
            OpCode::Call => {
                let argc = self.fetch_u8()? as usize;
                let args = self.stack.pop_n(argc);
                if args.len() != argc {
                    return Err(Value::error(JsException::internal("stack underflow")));
                }
                let callee = self.pop()?;
                match callee {
                    Value::Native(native) => {
                        trace!("calling native function '{}'", native.name());
                        let this_val = Value::Undefined;
                        let frame = Frame::new(&this_val, &args);
                        match native.call(&frame) {
                            Ok(value) => self.stack.push(value),
                            // Host exceptions pass through untouched.
                            Err(exception) => return Err(Value::error(exception)),
                        }
                    }
                    Value::Function(func) => {
                        trace!(
                            "calling function '{}'",
                            func.name.as_deref().unwrap_or("<anonymous>")
                        );
                        self.push_call(func, Value::Undefined, args)?;
                    }
                    other => {
                        return Err(self.error_value(
                            ErrorKind::TypeError,
                            &format!("{} is not a function", other.type_of()),
                        ));
                    }
                }
            }
            OpCode::Return => {
                let value = self.pop()?;
                return Ok(Flow::Return(value));
            }
            OpCode::ReturnUndef => return Ok(Flow::Return(Value::Undefined)),

            // Exceptions
            OpCode::Throw => {
                let value = self.pop()?;
                return Err(value);
            }
            OpCode::Catch => {
                let target = self.fetch_u16()? as usize;
                self.catch_handlers.push(CatchHandler {
                    target,
                    stack_len: self.stack.len(),
                    call_depth: self.call_stack.len(),
                });
            }
            OpCode::DropCatch => {
                self.catch_handlers
                    .pop()
                    .ok_or_else(|| Value::error(JsException::internal("catch handler underflow")))?;
            }

            // Control flow
            OpCode::Jump => {
                let target = self.fetch_u16()? as usize;
                self.current_frame_mut()?.pc = target;
            }
            OpCode::JumpIfFalse => {
                let target = self.fetch_u16()? as usize;
                let cond = self.pop()?;
                if !cond.to_boolean() {
                    self.current_frame_mut()?.pc = target;
                }
            }
            OpCode::JumpIfTrue => {
                let target = self.fetch_u16()? as usize;
                let cond = self.pop()?;
                if cond.to_boolean() {
                    self.current_frame_mut()?.pc = target;
                }
            }

            // Unary operations
            OpCode::Neg
            | OpCode::Plus
            | OpCode::Inc
            | OpCode::Dec
            | OpCode::BitNot
            | OpCode::LNot
            | OpCode::TypeOf => {
                let value = self.pop()?;
                self.stack.push(Self::unary_op(op, &value));
            }

            // Binary operations
            OpCode::Mul
            | OpCode::Div
            | OpCode::Mod
            | OpCode::Add
            | OpCode::Sub
            | OpCode::Pow
            | OpCode::Shl
            | OpCode::Sar
            | OpCode::Shr
            | OpCode::Lt
            | OpCode::Lte
            | OpCode::Gt
            | OpCode::Gte
            | OpCode::Eq
            | OpCode::Neq
            | OpCode::StrictEq
            | OpCode::StrictNeq
            | OpCode::BitAnd
            | OpCode::BitXor
            | OpCode::BitOr => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.stack.push(Self::binary_op(op, &a, &b));
            }
        }
        Ok(Flow::Next)
    }

    /// Apply a unary operator. JS unary operators coerce and never throw.
    fn unary_op(op: OpCode, value: &Value) -> Value {
        match op {
            OpCode::Neg => Value::number(-value.to_number()),
            OpCode::Plus => Value::number(value.to_number()),
            OpCode::Inc => Value::number(value.to_number() + 1.0),
            OpCode::Dec => Value::number(value.to_number() - 1.0),
            OpCode::BitNot => Value::number(!number::to_int32(value.to_number()) as f64),
            OpCode::LNot => Value::boolean(!value.to_boolean()),
            OpCode::TypeOf => Value::string(value.type_of()),
            _ => unreachable!("not a unary opcode: {op:?}"),
        }
    }

    /// Apply a binary operator. Division by zero yields an infinity and
    /// invalid numeric input yields NaN; none of these throw.
    fn binary_op(op: OpCode, a: &Value, b: &Value) -> Value {
        match op {
            OpCode::Add => match (a, b) {
                (Value::String(_), _) | (_, Value::String(_)) => {
                    Value::string(format!("{}{}", a.to_js_string(), b.to_js_string()))
                }
                _ => Value::number(a.to_number() + b.to_number()),
            },
            OpCode::Sub => Value::number(a.to_number() - b.to_number()),
            OpCode::Mul => Value::number(a.to_number() * b.to_number()),
            OpCode::Div => Value::number(a.to_number() / b.to_number()),
            OpCode::Mod => Value::number(a.to_number() % b.to_number()),
            OpCode::Pow => Value::number(a.to_number().powf(b.to_number())),
            OpCode::Shl => {
                let shift = number::to_uint32(b.to_number()) & 31;
                Value::number((number::to_int32(a.to_number()) << shift) as f64)
            }
            OpCode::Sar => {
                let shift = number::to_uint32(b.to_number()) & 31;
                Value::number((number::to_int32(a.to_number()) >> shift) as f64)
            }
            OpCode::Shr => {
                let shift = number::to_uint32(b.to_number()) & 31;
                Value::number((number::to_uint32(a.to_number()) >> shift) as f64)
            }
            OpCode::Lt => Self::compare_op(a, b, |x, y| x < y, |x, y| x < y),
            OpCode::Lte => Self::compare_op(a, b, |x, y| x <= y, |x, y| x <= y),
            OpCode::Gt => Self::compare_op(a, b, |x, y| x > y, |x, y| x > y),
            OpCode::Gte => Self::compare_op(a, b, |x, y| x >= y, |x, y| x >= y),
            OpCode::Eq => Value::boolean(a.loose_equals(b)),
            OpCode::Neq => Value::boolean(!a.loose_equals(b)),
            OpCode::StrictEq => Value::boolean(a.strict_equals(b)),
            OpCode::StrictNeq => Value::boolean(!a.strict_equals(b)),
            OpCode::BitAnd => {
                Value::number((number::to_int32(a.to_number()) & number::to_int32(b.to_number())) as f64)
            }
            OpCode::BitXor => {
                Value::number((number::to_int32(a.to_number()) ^ number::to_int32(b.to_number())) as f64)
            }
            OpCode::BitOr => {
                Value::number((number::to_int32(a.to_number()) | number::to_int32(b.to_number())) as f64)
            }
            _ => unreachable!("not a binary opcode: {op:?}"),
        }
    }

    /// Relational comparison: two strings compare lexicographically, any
    /// other pair numerically. NaN compares false either way.
    fn compare_op(
        a: &Value,
        b: &Value,
        str_cmp: fn(&str, &str) -> bool,
        num_cmp: fn(f64, f64) -> bool,
    ) -> Value {
        match (a, b) {
            (Value::String(x), Value::String(y)) => Value::boolean(str_cmp(x, y)),
            _ => Value::boolean(num_cmp(a.to_number(), b.to_number())),
        }
    }

    /// Push a frame for `func`, padding or truncating `args` to its
    /// declared parameter count and zeroing the extra local slots.
    fn push_call(
        &mut self,
        func: Rc<FunctionBytecode>,
        this_val: Value,
        mut args: Vec<Value>,
    ) -> Result<(), Value> {
        if self.call_stack.len() >= self.max_depth {
            return Err(
                self.error_value(ErrorKind::InternalError, "maximum call stack size exceeded")
            );
        }
        let base = self.stack.len();
        args.resize(func.arg_count as usize, Value::Undefined);
        for value in args {
            self.stack.push(value);
        }
        for _ in func.arg_count..func.local_count {
            self.stack.push(Value::Undefined);
        }
        self.call_stack.push(CallFrame {
            func,
            pc: 0,
            base,
            this_val,
        });
        Ok(())
    }

    /// Pop the finished frame. Returns the final value when it was the
    /// outermost frame, otherwise pushes the value for the caller.
    fn finish_frame(&mut self, value: Value) -> Option<Value> {
        let Some(frame) = self.call_stack.pop() else {
            return Some(value);
        };
        self.stack.truncate(frame.base);
        // Handlers registered inside the finished frame are dead.
        while self
            .catch_handlers
            .last()
            .is_some_and(|h| h.call_depth > self.call_stack.len())
        {
            self.catch_handlers.pop();
        }
        if self.call_stack.is_empty() {
            Some(value)
        } else {
            self.stack.push(value);
            None
        }
    }

    /// Transfer control to the innermost catch handler, or fail with the
    /// thrown value when none is registered.
    fn unwind(&mut self, thrown: Value) -> Result<(), Value> {
        let Some(handler) = self.catch_handlers.pop() else {
            return Err(thrown);
        };
        self.call_stack.truncate(handler.call_depth);
        self.stack.truncate(handler.stack_len);
        self.stack.push(thrown);
        match self.call_stack.last_mut() {
            Some(frame) => {
                frame.pc = handler.target;
                Ok(())
            }
            None => Err(Value::error(JsException::internal(
                "catch handler without a frame",
            ))),
        }
    }

    // Fetch helpers

    fn fetch_op(&mut self) -> Option<u8> {
        let frame = self.call_stack.last_mut()?;
        let byte = frame.func.bytecode.get(frame.pc).copied()?;
        frame.pc += 1;
        Some(byte)
    }

    fn fetch_u8(&mut self) -> Result<u8, Value> {
        let truncated = || Value::error(JsException::internal("truncated bytecode"));
        let frame = self.call_stack.last_mut().ok_or_else(truncated)?;
        let byte = frame.func.bytecode.get(frame.pc).copied().ok_or_else(truncated)?;
        frame.pc += 1;
        Ok(byte)
    }

    fn fetch_u16(&mut self) -> Result<u16, Value> {
        let lo = self.fetch_u8()?;
        let hi = self.fetch_u8()?;
        Ok(u16::from_le_bytes([lo, hi]))
    }

    /// Fetch a 16-bit constant index holding a global name.
    fn fetch_name(&mut self) -> Result<Rc<str>, Value> {
        let idx = self.fetch_u16()? as usize;
        match self.constant(idx)? {
            Value::String(name) => Ok(name),
            _ => Err(Value::error(JsException::internal(
                "global name must be a string constant",
            ))),
        }
    }

    fn constant(&self, idx: usize) -> Result<Value, Value> {
        self.current_frame()?
            .func
            .constants
            .get(idx)
            .cloned()
            .ok_or_else(|| Value::error(JsException::internal("constant index out of range")))
    }

    fn current_frame(&self) -> Result<&CallFrame, Value> {
        self.call_stack
            .last()
            .ok_or_else(|| Value::error(JsException::internal("no active call frame")))
    }

    fn current_frame_mut(&mut self) -> Result<&mut CallFrame, Value> {
        self.call_stack
            .last_mut()
            .ok_or_else(|| Value::error(JsException::internal("no active call frame")))
    }

    fn pop(&mut self) -> Result<Value, Value> {
        self.stack
            .pop()
            .ok_or_else(|| Value::error(JsException::internal("stack underflow")))
    }

    /// Build an exception value, tagging on the current source line when
    /// the line table knows it.
    fn error_value(&self, kind: ErrorKind, message: &str) -> Value {
        let message = match self.current_line() {
            Some(line) => format!("{message} (line {line})"),
            None => message.to_string(),
        };
        Value::error(JsException::new(kind, message))
    }

    fn current_line(&self) -> Option<u32> {
        let frame = self.call_stack.last()?;
        frame.func.get_line_number(frame.pc as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(local_count: u8, constants: Vec<Value>, code: &[u8]) -> Rc<FunctionBytecode> {
        let mut func = FunctionBytecode::new(0);
        func.local_count = local_count;
        func.constants = constants;
        func.bytecode = code.to_vec();
        Rc::new(func)
    }

    fn run(chunk: &Rc<FunctionBytecode>) -> Result<Value, Value> {
        let mut globals = Globals::new();
        Interpreter::new(true, 512).execute(chunk, &mut globals)
    }

    #[test]
    fn test_simple_arithmetic() {
        let chunk = chunk(
            0,
            vec![],
            &[
                OpCode::PushI8 as u8,
                7,
                OpCode::PushI8 as u8,
                5,
                OpCode::Add as u8,
                OpCode::Return as u8,
            ],
        );
        assert_eq!(run(&chunk).unwrap().as_number(), Some(12.0));
    }

    #[test]
    fn test_implicit_return_undefined() {
        let chunk = chunk(0, vec![], &[OpCode::Nop as u8]);
        assert!(run(&chunk).unwrap().is_undefined());
    }

    #[test]
    fn test_constant_pool() {
        let chunk = chunk(
            0,
            vec![Value::string("hi")],
            &[OpCode::PushConst8 as u8, 0, OpCode::Return as u8],
        );
        assert_eq!(run(&chunk).unwrap().as_str(), Some("hi"));
    }

    #[test]
    fn test_locals() {
        let chunk = chunk(
            1,
            vec![],
            &[
                OpCode::PushI8 as u8,
                42,
                OpCode::SetLocal as u8,
                0,
                OpCode::GetLocal as u8,
                0,
                OpCode::Return as u8,
            ],
        );
        assert_eq!(run(&chunk).unwrap().as_number(), Some(42.0));
    }

    #[test]
    fn test_jump_if_false() {
        let chunk = chunk(
            0,
            vec![],
            &[
                OpCode::PushFalse as u8,
                OpCode::JumpIfFalse as u8,
                7,
                0,
                OpCode::PushI8 as u8,
                1,
                OpCode::Return as u8,
                OpCode::PushI8 as u8,
                2,
                OpCode::Return as u8,
            ],
        );
        assert_eq!(run(&chunk).unwrap().as_number(), Some(2.0));
    }

    #[test]
    fn test_string_concat() {
        let chunk = chunk(
            0,
            vec![Value::string("n = ")],
            &[
                OpCode::PushConst8 as u8,
                0,
                OpCode::PushI8 as u8,
                3,
                OpCode::Add as u8,
                OpCode::Return as u8,
            ],
        );
        assert_eq!(run(&chunk).unwrap().as_str(), Some("n = 3"));
    }

    #[test]
    fn test_native_call() {
        use crate::runtime::NativeFunction;

        let mut globals = Globals::new();
        globals.set(
            "inc",
            Value::Native(Rc::new(NativeFunction::new("inc", 1, |frame| {
                Ok(Value::number(frame.arg(0).to_number() + 1.0))
            }))),
        );

        let chunk = chunk(
            0,
            vec![Value::string("inc")],
            &[
                OpCode::GetGlobal as u8,
                0,
                0,
                OpCode::PushI8 as u8,
                5,
                OpCode::Call as u8,
                1,
                OpCode::Return as u8,
            ],
        );
        let result = Interpreter::new(true, 512)
            .execute(&chunk, &mut globals)
            .unwrap();
        assert_eq!(result.as_number(), Some(6.0));
    }

    #[test]
    fn test_script_function_call() {
        // add(a, b) { return a + b; }
        let mut add = FunctionBytecode::new(2);
        add.bytecode = vec![
            OpCode::GetLocal as u8,
            0,
            OpCode::GetLocal as u8,
            1,
            OpCode::Add as u8,
            OpCode::Return as u8,
        ];

        let mut outer = FunctionBytecode::new(0);
        outer.inner.push(Rc::new(add));
        outer.bytecode = vec![
            OpCode::Closure as u8,
            0,
            OpCode::PushI8 as u8,
            2,
            OpCode::PushI8 as u8,
            3,
            OpCode::Call as u8,
            2,
            OpCode::Return as u8,
        ];

        assert_eq!(run(&Rc::new(outer)).unwrap().as_number(), Some(5.0));
    }

    #[test]
    fn test_missing_arguments_become_undefined() {
        // id(a) { return a; } called with no arguments
        let mut id = FunctionBytecode::new(1);
        id.bytecode = vec![OpCode::GetLocal as u8, 0, OpCode::Return as u8];

        let mut outer = FunctionBytecode::new(0);
        outer.inner.push(Rc::new(id));
        outer.bytecode = vec![
            OpCode::Closure as u8,
            0,
            OpCode::Call as u8,
            0,
            OpCode::Return as u8,
        ];

        assert!(run(&Rc::new(outer)).unwrap().is_undefined());
    }

    #[test]
    fn test_call_non_callable() {
        let chunk = chunk(
            0,
            vec![],
            &[
                OpCode::PushI8 as u8,
                5,
                OpCode::Call as u8,
                0,
                OpCode::Return as u8,
            ],
        );
        let err = run(&chunk).unwrap_err();
        match err {
            Value::Error(e) => {
                assert_eq!(e.kind, ErrorKind::TypeError);
                assert!(e.message().contains("number is not a function"));
            }
            other => panic!("expected error value, got {other:?}"),
        }
    }

    #[test]
    fn test_throw_and_catch() {
        let chunk = chunk(
            0,
            vec![Value::string("boom")],
            &[
                OpCode::Catch as u8,
                9,
                0,
                OpCode::PushConst8 as u8,
                0,
                OpCode::Throw as u8,
                OpCode::PushI8 as u8,
                1,
                OpCode::Return as u8,
                // handler: thrown value is on the stack
                OpCode::Return as u8,
            ],
        );
        assert_eq!(run(&chunk).unwrap().as_str(), Some("boom"));
    }

    #[test]
    fn test_drop_catch_on_normal_path() {
        let chunk = chunk(
            0,
            vec![],
            &[
                OpCode::Catch as u8,
                7,
                0,
                OpCode::PushI8 as u8,
                5,
                OpCode::DropCatch as u8,
                OpCode::Return as u8,
                // handler, never reached
                OpCode::Return as u8,
            ],
        );
        assert_eq!(run(&chunk).unwrap().as_number(), Some(5.0));
    }

    #[test]
    fn test_uncaught_throw() {
        let chunk = chunk(
            0,
            vec![Value::string("loose end")],
            &[
                OpCode::PushConst8 as u8,
                0,
                OpCode::Throw as u8,
            ],
        );
        let err = run(&chunk).unwrap_err();
        assert_eq!(err.as_str(), Some("loose end"));
    }

    #[test]
    fn test_catch_across_call_boundary() {
        // thrower() { throw "inner"; }
        let mut thrower = FunctionBytecode::new(0);
        thrower.constants.push(Value::string("inner"));
        thrower.bytecode = vec![OpCode::PushConst8 as u8, 0, OpCode::Throw as u8];

        let mut outer = FunctionBytecode::new(0);
        outer.inner.push(Rc::new(thrower));
        outer.bytecode = vec![
            OpCode::Catch as u8,
            10,
            0,
            OpCode::Closure as u8,
            0,
            OpCode::Call as u8,
            0,
            OpCode::Drop as u8,
            OpCode::PushI8 as u8,
            9,
            // handler at 10: thrown value on stack
            OpCode::Return as u8,
        ];

        assert_eq!(run(&Rc::new(outer)).unwrap().as_str(), Some("inner"));
    }

    #[test]
    fn test_stack_overflow() {
        // f() { return f(); } with f bound globally
        let mut f = FunctionBytecode::new(0);
        f.constants.push(Value::string("f"));
        f.bytecode = vec![
            OpCode::GetGlobal as u8,
            0,
            0,
            OpCode::Call as u8,
            0,
            OpCode::Return as u8,
        ];
        let f = Rc::new(f);

        let mut globals = Globals::new();
        globals.set("f", Value::Function(f.clone()));

        let err = Interpreter::new(true, 64)
            .execute(&f, &mut globals)
            .unwrap_err();
        match err {
            Value::Error(e) => {
                assert_eq!(e.kind, ErrorKind::InternalError);
                assert!(e.message().contains("maximum call stack size exceeded"));
            }
            other => panic!("expected error value, got {other:?}"),
        }
    }

    #[test]
    fn test_reference_error_on_undeclared_read() {
        let chunk = chunk(
            0,
            vec![Value::string("missing")],
            &[OpCode::GetGlobal as u8, 0, 0, OpCode::Return as u8],
        );
        let err = run(&chunk).unwrap_err();
        match err {
            Value::Error(e) => {
                assert_eq!(e.kind, ErrorKind::ReferenceError);
                assert!(e.message().contains("'missing' is not defined"));
            }
            other => panic!("expected error value, got {other:?}"),
        }
    }

    #[test]
    fn test_strict_vs_loose_undeclared_assignment() {
        let code = [
            OpCode::PushI8 as u8,
            1,
            OpCode::SetGlobal as u8,
            0,
            0,
            OpCode::Undefined as u8,
            OpCode::Return as u8,
        ];
        let chunk = chunk(0, vec![Value::string("x")], &code);

        let mut globals = Globals::new();
        let err = Interpreter::new(true, 512)
            .execute(&chunk, &mut globals)
            .unwrap_err();
        assert!(matches!(err, Value::Error(e) if e.kind == ErrorKind::ReferenceError));
        assert!(!globals.contains("x"));

        let mut globals = Globals::new();
        Interpreter::new(false, 512)
            .execute(&chunk, &mut globals)
            .unwrap();
        assert_eq!(globals.get("x").and_then(Value::as_number), Some(1.0));
    }

    #[test]
    fn test_get_global_no_check() {
        let chunk = chunk(
            0,
            vec![Value::string("missing")],
            &[
                OpCode::GetGlobalNoCheck as u8,
                0,
                0,
                OpCode::TypeOf as u8,
                OpCode::Return as u8,
            ],
        );
        assert_eq!(run(&chunk).unwrap().as_str(), Some("undefined"));
    }

    #[test]
    fn test_binary_op_coercions() {
        let one = Value::number(1.0);
        let s = Value::string("5");
        assert_eq!(
            Interpreter::binary_op(OpCode::Sub, &s, &one).as_number(),
            Some(4.0)
        );
        assert_eq!(
            Interpreter::binary_op(OpCode::Div, &one, &Value::number(0.0)).as_number(),
            Some(f64::INFINITY)
        );
        assert_eq!(
            Interpreter::binary_op(OpCode::Shr, &Value::number(-1.0), &Value::number(0.0))
                .as_number(),
            Some(4294967295.0)
        );
        // String comparison is lexicographic, mixed is numeric.
        assert_eq!(
            Interpreter::binary_op(OpCode::Lt, &Value::string("b"), &Value::string("a"))
                .as_boolean(),
            Some(false)
        );
        assert_eq!(
            Interpreter::binary_op(OpCode::Lt, &Value::string("9"), &Value::number(10.0))
                .as_boolean(),
            Some(true)
        );
    }
}
