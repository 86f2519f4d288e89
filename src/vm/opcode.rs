//! Bytecode opcode definitions
//!
//! The bytecode is stack-based. Each opcode has:
//! - A size in bytes (opcode byte plus operand bytes)
//! - Number of values popped from the stack (n_pop)
//! - Number of values pushed to the stack (n_push)
//! - An operand format
//!
//! Jump targets are absolute 16-bit bytecode offsets, which caps a single
//! function at 64 KiB of code; the compiler reports an error past that.

use crate::runtime::FunctionBytecode;

/// Opcode operand formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpFormat {
    /// No operand
    None,
    /// No operand, but represents an integer constant
    NoneInt,
    /// Signed 8-bit operand
    I8,
    /// Signed 16-bit operand
    I16,
    /// 8-bit local slot index
    Loc8,
    /// 8-bit constant pool index
    Const8,
    /// 16-bit constant pool index
    Const16,
    /// 8-bit inner function index
    Func8,
    /// 16-bit absolute label offset
    Label16,
    /// 8-bit argument count for calls
    NPop,
}

/// JavaScript bytecode opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    /// Invalid opcode (never emitted)
    Invalid = 0,
    /// No operation
    Nop,

    // Push values
    /// Push undefined
    Undefined,
    /// Push null
    Null,
    /// Push true
    PushTrue,
    /// Push false
    PushFalse,
    /// Push the `this` value
    PushThis,
    /// Push 0
    Push0,
    /// Push 1
    Push1,
    /// Push 8-bit signed integer
    PushI8,
    /// Push 16-bit signed integer
    PushI16,
    /// Push constant (8-bit index)
    PushConst8,
    /// Push constant (16-bit index)
    PushConst,
    /// Push inner function as a value (8-bit index)
    Closure,

    // Stack manipulation
    /// Drop top value: a ->
    Drop,
    /// Duplicate top: a -> a a
    Dup,
    /// Swap top two: a b -> b a
    Swap,

    // Local slots
    /// Get local slot (8-bit index)
    GetLocal,
    /// Set local slot: a -> (8-bit index)
    SetLocal,

    // Global namespace. The operand is a constant pool index holding the
    // name string.
    /// Get global; undeclared name throws ReferenceError
    GetGlobal,
    /// Set global; undeclared name throws in strict mode, binds otherwise
    SetGlobal,
    /// Pop a value and bind it unconditionally (var with initializer)
    DefineGlobal,
    /// Bind undefined unless already bound (var without initializer)
    DeclareGlobal,
    /// Get global; undeclared name yields undefined (typeof)
    GetGlobalNoCheck,

    // Calls and returns
    /// Call function: func args... -> ret (8-bit argument count)
    Call,
    /// Return top of stack
    Return,
    /// Return undefined
    ReturnUndef,

    // Exceptions
    /// Throw top of stack
    Throw,
    /// Register a catch handler (16-bit target)
    Catch,
    /// Remove the innermost catch handler
    DropCatch,

    // Control flow
    /// Unconditional jump (16-bit target)
    Jump,
    /// Pop condition, jump if falsy (16-bit target)
    JumpIfFalse,
    /// Pop condition, jump if truthy (16-bit target)
    JumpIfTrue,

    // Unary operations
    /// Negate: -a
    Neg,
    /// Unary plus (ToNumber): +a
    Plus,
    /// Increment: a + 1
    Inc,
    /// Decrement: a - 1
    Dec,
    /// Bitwise NOT: ~a
    BitNot,
    /// Logical NOT: !a
    LNot,
    /// typeof operator
    TypeOf,

    // Binary arithmetic
    /// Multiply: a * b
    Mul,
    /// Divide: a / b
    Div,
    /// Modulo: a % b
    Mod,
    /// Add or concatenate: a + b
    Add,
    /// Subtract: a - b
    Sub,
    /// Power: a ** b
    Pow,
    /// Left shift: a << b
    Shl,
    /// Arithmetic right shift: a >> b
    Sar,
    /// Logical right shift: a >>> b
    Shr,

    // Comparison
    /// Less than: a < b
    Lt,
    /// Less than or equal: a <= b
    Lte,
    /// Greater than: a > b
    Gt,
    /// Greater than or equal: a >= b
    Gte,
    /// Equal: a == b
    Eq,
    /// Not equal: a != b
    Neq,
    /// Strict equal: a === b
    StrictEq,
    /// Strict not equal: a !== b
    StrictNeq,

    // Bitwise
    /// Bitwise AND: a & b
    BitAnd,
    /// Bitwise XOR: a ^ b
    BitXor,
    /// Bitwise OR: a | b
    BitOr,
}

impl OpCode {
    /// Total number of opcodes
    pub const COUNT: usize = OpCode::BitOr as usize + 1;

    /// Decode an opcode byte.
    pub fn from_u8(byte: u8) -> Option<OpCode> {
        OPCODE_TABLE.get(byte as usize).copied()
    }
}

/// Decode table, indexed by opcode byte.
static OPCODE_TABLE: [OpCode; OpCode::COUNT] = [
    OpCode::Invalid,
    OpCode::Nop,
    OpCode::Undefined,
    OpCode::Null,
    OpCode::PushTrue,
    OpCode::PushFalse,
    OpCode::PushThis,
    OpCode::Push0,
    OpCode::Push1,
    OpCode::PushI8,
    OpCode::PushI16,
    OpCode::PushConst8,
    OpCode::PushConst,
    OpCode::Closure,
    OpCode::Drop,
    OpCode::Dup,
    OpCode::Swap,
    OpCode::GetLocal,
    OpCode::SetLocal,
    OpCode::GetGlobal,
    OpCode::SetGlobal,
    OpCode::DefineGlobal,
    OpCode::DeclareGlobal,
    OpCode::GetGlobalNoCheck,
    OpCode::Call,
    OpCode::Return,
    OpCode::ReturnUndef,
    OpCode::Throw,
    OpCode::Catch,
    OpCode::DropCatch,
    OpCode::Jump,
    OpCode::JumpIfFalse,
    OpCode::JumpIfTrue,
    OpCode::Neg,
    OpCode::Plus,
    OpCode::Inc,
    OpCode::Dec,
    OpCode::BitNot,
    OpCode::LNot,
    OpCode::TypeOf,
    OpCode::Mul,
    OpCode::Div,
    OpCode::Mod,
    OpCode::Add,
    OpCode::Sub,
    OpCode::Pow,
    OpCode::Shl,
    OpCode::Sar,
    OpCode::Shr,
    OpCode::Lt,
    OpCode::Lte,
    OpCode::Gt,
    OpCode::Gte,
    OpCode::Eq,
    OpCode::Neq,
    OpCode::StrictEq,
    OpCode::StrictNeq,
    OpCode::BitAnd,
    OpCode::BitXor,
    OpCode::BitOr,
];

/// Opcode metadata
#[derive(Debug, Clone, Copy)]
pub struct OpCodeInfo {
    /// Opcode size in bytes
    pub size: u8,
    /// Number of values popped
    pub n_pop: u8,
    /// Number of values pushed
    pub n_push: u8,
    /// Operand format
    pub format: OpFormat,
}

impl OpCodeInfo {
    const fn new(size: u8, n_pop: u8, n_push: u8, format: OpFormat) -> Self {
        OpCodeInfo {
            size,
            n_pop,
            n_push,
            format,
        }
    }
}

/// Opcode information table
pub static OPCODE_INFO: [OpCodeInfo; OpCode::COUNT] = [
    // Invalid
    OpCodeInfo::new(1, 0, 0, OpFormat::None),
    // Nop
    OpCodeInfo::new(1, 0, 0, OpFormat::None),
    // Undefined
    OpCodeInfo::new(1, 0, 1, OpFormat::None),
    // Null
    OpCodeInfo::new(1, 0, 1, OpFormat::None),
    // PushTrue
    OpCodeInfo::new(1, 0, 1, OpFormat::None),
    // PushFalse
    OpCodeInfo::new(1, 0, 1, OpFormat::None),
    // PushThis
    OpCodeInfo::new(1, 0, 1, OpFormat::None),
    // Push0
    OpCodeInfo::new(1, 0, 1, OpFormat::NoneInt),
    // Push1
    OpCodeInfo::new(1, 0, 1, OpFormat::NoneInt),
    // PushI8
    OpCodeInfo::new(2, 0, 1, OpFormat::I8),
    // PushI16
    OpCodeInfo::new(3, 0, 1, OpFormat::I16),
    // PushConst8
    OpCodeInfo::new(2, 0, 1, OpFormat::Const8),
    // PushConst
    OpCodeInfo::new(3, 0, 1, OpFormat::Const16),
    // Closure
    OpCodeInfo::new(2, 0, 1, OpFormat::Func8),
    // Drop
    OpCodeInfo::new(1, 1, 0, OpFormat::None),
    // Dup
    OpCodeInfo::new(1, 1, 2, OpFormat::None),
    // Swap
    OpCodeInfo::new(1, 2, 2, OpFormat::None),
    // GetLocal
    OpCodeInfo::new(2, 0, 1, OpFormat::Loc8),
    // SetLocal
    OpCodeInfo::new(2, 1, 0, OpFormat::Loc8),
    // GetGlobal
    OpCodeInfo::new(3, 0, 1, OpFormat::Const16),
    // SetGlobal
    OpCodeInfo::new(3, 1, 0, OpFormat::Const16),
    // DefineGlobal
    OpCodeInfo::new(3, 1, 0, OpFormat::Const16),
    // DeclareGlobal
    OpCodeInfo::new(3, 0, 0, OpFormat::Const16),
    // GetGlobalNoCheck
    OpCodeInfo::new(3, 0, 1, OpFormat::Const16),
    // Call
    OpCodeInfo::new(2, 1, 1, OpFormat::NPop),
    // Return
    OpCodeInfo::new(1, 1, 0, OpFormat::None),
    // ReturnUndef
    OpCodeInfo::new(1, 0, 0, OpFormat::None),
    // Throw
    OpCodeInfo::new(1, 1, 0, OpFormat::None),
    // Catch
    OpCodeInfo::new(3, 0, 0, OpFormat::Label16),
    // DropCatch
    OpCodeInfo::new(1, 0, 0, OpFormat::None),
    // Jump
    OpCodeInfo::new(3, 0, 0, OpFormat::Label16),
    // JumpIfFalse
    OpCodeInfo::new(3, 1, 0, OpFormat::Label16),
    // JumpIfTrue
    OpCodeInfo::new(3, 1, 0, OpFormat::Label16),
    // Neg
    OpCodeInfo::new(1, 1, 1, OpFormat::None),
    // Plus
    OpCodeInfo::new(1, 1, 1, OpFormat::None),
    // Inc
    OpCodeInfo::new(1, 1, 1, OpFormat::None),
    // Dec
    OpCodeInfo::new(1, 1, 1, OpFormat::None),
    // BitNot
    OpCodeInfo::new(1, 1, 1, OpFormat::None),
    // LNot
    OpCodeInfo::new(1, 1, 1, OpFormat::None),
    // TypeOf
    OpCodeInfo::new(1, 1, 1, OpFormat::None),
    // Mul
    OpCodeInfo::new(1, 2, 1, OpFormat::None),
    // Div
    OpCodeInfo::new(1, 2, 1, OpFormat::None),
    // Mod
    OpCodeInfo::new(1, 2, 1, OpFormat::None),
    // Add
    OpCodeInfo::new(1, 2, 1, OpFormat::None),
    // Sub
    OpCodeInfo::new(1, 2, 1, OpFormat::None),
    // Pow
    OpCodeInfo::new(1, 2, 1, OpFormat::None),
    // Shl
    OpCodeInfo::new(1, 2, 1, OpFormat::None),
    // Sar
    OpCodeInfo::new(1, 2, 1, OpFormat::None),
    // Shr
    OpCodeInfo::new(1, 2, 1, OpFormat::None),
    // Lt
    OpCodeInfo::new(1, 2, 1, OpFormat::None),
    // Lte
    OpCodeInfo::new(1, 2, 1, OpFormat::None),
    // Gt
    OpCodeInfo::new(1, 2, 1, OpFormat::None),
    // Gte
    OpCodeInfo::new(1, 2, 1, OpFormat::None),
    // Eq
    OpCodeInfo::new(1, 2, 1, OpFormat::None),
    // Neq
    OpCodeInfo::new(1, 2, 1, OpFormat::None),
    // StrictEq
    OpCodeInfo::new(1, 2, 1, OpFormat::None),
    // StrictNeq
    OpCodeInfo::new(1, 2, 1, OpFormat::None),
    // BitAnd
    OpCodeInfo::new(1, 2, 1, OpFormat::None),
    // BitXor
    OpCodeInfo::new(1, 2, 1, OpFormat::None),
    // BitOr
    OpCodeInfo::new(1, 2, 1, OpFormat::None),
];

/// Render a chunk's bytecode for debugging, one instruction per line.
pub fn disassemble(func: &FunctionBytecode) -> String {
    use std::fmt::Write as _;

    let mut out = String::new();
    let code = &func.bytecode;
    let mut pc = 0;
    while pc < code.len() {
        let byte = code[pc];
        let Some(op) = OpCode::from_u8(byte) else {
            let _ = writeln!(out, "{pc:5}  .byte {byte:#04x}");
            pc += 1;
            continue;
        };
        let info = &OPCODE_INFO[byte as usize];
        if pc + info.size as usize > code.len() {
            let _ = writeln!(out, "{pc:5}  {op:?} <truncated>");
            break;
        }
        let _ = write!(out, "{pc:5}  {op:?}");
        match info.format {
            OpFormat::None | OpFormat::NoneInt => {}
            OpFormat::I8 => {
                let _ = write!(out, " {}", code[pc + 1] as i8);
            }
            OpFormat::I16 => {
                let value = i16::from_le_bytes([code[pc + 1], code[pc + 2]]);
                let _ = write!(out, " {value}");
            }
            OpFormat::Loc8 | OpFormat::Func8 | OpFormat::NPop => {
                let _ = write!(out, " {}", code[pc + 1]);
            }
            OpFormat::Const8 => {
                let idx = code[pc + 1] as usize;
                let _ = write!(out, " {idx}");
                if let Some(value) = func.get_constant(idx) {
                    let _ = write!(out, " ; {value}");
                }
            }
            OpFormat::Const16 => {
                let idx = u16::from_le_bytes([code[pc + 1], code[pc + 2]]) as usize;
                let _ = write!(out, " {idx}");
                if let Some(value) = func.get_constant(idx) {
                    let _ = write!(out, " ; {value}");
                }
            }
            OpFormat::Label16 => {
                let target = u16::from_le_bytes([code[pc + 1], code[pc + 2]]);
                let _ = write!(out, " -> {target}");
            }
        }
        out.push('\n');
        pc += info.size as usize;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn test_opcode_count() {
        assert_eq!(OPCODE_INFO.len(), OpCode::COUNT);
        assert_eq!(OPCODE_TABLE.len(), OpCode::COUNT);
    }

    #[test]
    fn test_decode_roundtrip() {
        for i in 0..OpCode::COUNT {
            let op = OpCode::from_u8(i as u8).unwrap();
            assert_eq!(op as usize, i);
        }
        assert!(OpCode::from_u8(OpCode::COUNT as u8).is_none());
        assert!(OpCode::from_u8(0xFF).is_none());
    }

    #[test]
    fn test_opcode_sizes() {
        assert_eq!(OPCODE_INFO[OpCode::Drop as usize].size, 1);
        assert_eq!(OPCODE_INFO[OpCode::PushI8 as usize].size, 2);
        assert_eq!(OPCODE_INFO[OpCode::PushConst as usize].size, 3);
        assert_eq!(OPCODE_INFO[OpCode::Jump as usize].size, 3);
        assert_eq!(OPCODE_INFO[OpCode::Call as usize].size, 2);
    }

    #[test]
    fn test_disassemble() {
        let mut func = FunctionBytecode::new(0);
        let idx = func.add_constant(Value::string("greet"));
        func.emit_u8(OpCode::GetGlobal as u8);
        func.emit_u16(idx as u16);
        func.emit_u8(OpCode::PushI8 as u8);
        func.emit_u8(-7i8 as u8);
        func.emit_u8(OpCode::Call as u8);
        func.emit_u8(1);
        func.emit_u8(OpCode::Return as u8);

        let text = disassemble(&func);
        assert!(text.contains("GetGlobal 0 ; greet"));
        assert!(text.contains("PushI8 -7"));
        assert!(text.contains("Call 1"));
        assert!(text.contains("Return"));
    }
}
