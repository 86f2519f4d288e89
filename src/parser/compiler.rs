//! JavaScript compiler
//!
//! Generates bytecode from source code in a single pass. Statements emit
//! code as they are parsed; expressions use precedence climbing. There is
//! no AST.

use std::rc::Rc;

use super::lexer::{Lexer, Token};
use crate::error::SyntaxError;
use crate::runtime::{FunctionBytecode, MAX_ARGS};
use crate::value::Value;
use crate::vm::opcode::OpCode;

/// Local slot holding the completion value of a top-level script.
const COMPLETION_SLOT: u8 = 0;

/// Compiler state
pub struct Compiler<'a> {
    lexer: Lexer<'a>,
    current: Token,
    /// Line of the current token
    line: u32,
    /// Line of the previous token, for semicolon insertion
    prev_line: u32,
}

/// Per-function compilation state. The chunk being compiled and nested
/// function literals each get their own.
struct FuncState {
    func: FunctionBytecode,
    /// Declared local names by slot. Catch slots are cleared on scope exit
    /// but keep their slot reserved.
    locals: Vec<String>,
    /// Top-level script scope: declarations target globals and statement
    /// results feed the completion slot.
    top_level: bool,
    /// Number of open try blocks, for break/continue unwinding
    try_depth: usize,
    /// Enclosing loops, innermost last
    loops: Vec<LoopCtx>,
}

#[derive(Default)]
struct LoopCtx {
    /// Target for `continue` when already known; do-while patches instead
    continue_target: Option<usize>,
    continue_jumps: Vec<usize>,
    break_jumps: Vec<usize>,
    /// try_depth at loop entry
    try_depth: usize,
}

impl FuncState {
    fn chunk() -> Self {
        let mut func = FunctionBytecode::new(0);
        func.local_count = 1;
        FuncState {
            func,
            // Slot 0 holds the completion value and is never resolvable.
            locals: vec![String::new()],
            top_level: true,
            try_depth: 0,
            loops: Vec::new(),
        }
    }

    fn function(name: Option<Rc<str>>, params: Vec<String>) -> Self {
        let mut func = FunctionBytecode::new(params.len() as u8);
        func.name = name;
        FuncState {
            func,
            locals: params,
            top_level: false,
            try_depth: 0,
            loops: Vec::new(),
        }
    }

    /// Innermost declaration wins, so catch parameters shadow.
    fn resolve_local(&self, name: &str) -> Option<u8> {
        self.locals
            .iter()
            .rposition(|local| local.as_str() == name)
            .map(|slot| slot as u8)
    }

    fn emit_op(&mut self, op: OpCode) {
        self.func.emit_u8(op as u8);
    }

    /// Emit a jump with a placeholder target, returning the operand offset
    /// for later patching.
    fn emit_jump(&mut self, op: OpCode) -> usize {
        self.emit_op(op);
        let operand = self.func.current_offset();
        self.func.emit_u16(0xffff);
        operand
    }
}

enum BinOp {
    Simple(OpCode),
    And,
    Or,
    Pow,
}

/// Binary operator table: opcode plus precedence level, higher binds
/// tighter.
fn binary_op_for(token: &Token) -> Option<(BinOp, u8)> {
    Some(match token {
        Token::PipePipe => (BinOp::Or, 1),
        Token::AmpAmp => (BinOp::And, 2),
        Token::Pipe => (BinOp::Simple(OpCode::BitOr), 3),
        Token::Caret => (BinOp::Simple(OpCode::BitXor), 4),
        Token::Amp => (BinOp::Simple(OpCode::BitAnd), 5),
        Token::EqEq => (BinOp::Simple(OpCode::Eq), 6),
        Token::BangEq => (BinOp::Simple(OpCode::Neq), 6),
        Token::EqEqEq => (BinOp::Simple(OpCode::StrictEq), 6),
        Token::BangEqEq => (BinOp::Simple(OpCode::StrictNeq), 6),
        Token::Lt => (BinOp::Simple(OpCode::Lt), 7),
        Token::LtEq => (BinOp::Simple(OpCode::Lte), 7),
        Token::Gt => (BinOp::Simple(OpCode::Gt), 7),
        Token::GtEq => (BinOp::Simple(OpCode::Gte), 7),
        Token::LtLt => (BinOp::Simple(OpCode::Shl), 8),
        Token::GtGt => (BinOp::Simple(OpCode::Sar), 8),
        Token::GtGtGt => (BinOp::Simple(OpCode::Shr), 8),
        Token::Plus => (BinOp::Simple(OpCode::Add), 9),
        Token::Minus => (BinOp::Simple(OpCode::Sub), 9),
        Token::Star => (BinOp::Simple(OpCode::Mul), 10),
        Token::Slash => (BinOp::Simple(OpCode::Div), 10),
        Token::Percent => (BinOp::Simple(OpCode::Mod), 10),
        Token::StarStar => (BinOp::Pow, 11),
        _ => return None,
    })
}

/// Compound assignment operators and the opcode they combine with.
/// `None` is plain assignment.
fn assignment_op_for(token: &Token) -> Option<Option<OpCode>> {
    Some(match token {
        Token::Eq => None,
        Token::PlusEq => Some(OpCode::Add),
        Token::MinusEq => Some(OpCode::Sub),
        Token::StarEq => Some(OpCode::Mul),
        Token::SlashEq => Some(OpCode::Div),
        Token::PercentEq => Some(OpCode::Mod),
        Token::StarStarEq => Some(OpCode::Pow),
        Token::LtLtEq => Some(OpCode::Shl),
        Token::GtGtEq => Some(OpCode::Sar),
        Token::GtGtGtEq => Some(OpCode::Shr),
        Token::AmpEq => Some(OpCode::BitAnd),
        Token::PipeEq => Some(OpCode::BitOr),
        Token::CaretEq => Some(OpCode::BitXor),
        _ => return None,
    })
}

fn constants_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => x.to_bits() == y.to_bits(),
        _ => false,
    }
}

impl<'a> Compiler<'a> {
    /// Create a new compiler for the given source
    pub fn new(source: &'a str) -> Self {
        let mut lexer = Lexer::new(source);
        let current = lexer.next_token();
        let line = lexer.token_line() as u32;

        Compiler {
            lexer,
            current,
            line,
            prev_line: line,
        }
    }

    /// Compile the source as a top-level script and return its chunk.
    pub fn compile(mut self) -> Result<Rc<FunctionBytecode>, SyntaxError> {
        let mut fs = FuncState::chunk();
        while !self.check(&Token::Eof) {
            if let Token::Error(message) = &self.current {
                return Err(self.error(message.clone()));
            }
            self.statement(&mut fs)?;
        }
        // The completion slot holds the value of the last expression
        // statement that ran.
        fs.emit_op(OpCode::GetLocal);
        fs.func.emit_u8(COMPLETION_SLOT);
        fs.emit_op(OpCode::Return);
        Ok(Rc::new(fs.func))
    }

    // Token handling

    /// Advance to the next token
    fn advance(&mut self) {
        self.prev_line = self.line;
        self.current = self.lexer.next_token();
        self.line = self.lexer.token_line() as u32;
    }

    /// Check if current token matches expected
    fn check(&self, expected: &Token) -> bool {
        std::mem::discriminant(&self.current) == std::mem::discriminant(expected)
    }

    /// Consume the current token if it matches
    fn eat(&mut self, expected: &Token) -> bool {
        if self.check(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Expect a specific token, advance if matched
    fn expect(&mut self, expected: Token) -> Result<(), SyntaxError> {
        if self.eat(&expected) {
            Ok(())
        } else {
            Err(self.unexpected(describe(&expected)))
        }
    }

    fn expect_ident(&mut self) -> Result<String, SyntaxError> {
        match &self.current {
            Token::Ident(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("(identifier)")),
        }
    }

    /// Consume a statement terminator. A semicolon is inserted before a
    /// closing brace, at end of input, or after a line break.
    fn expect_semicolon(&mut self) -> Result<(), SyntaxError> {
        if self.eat(&Token::Semicolon) {
            return Ok(());
        }
        if matches!(self.current, Token::RBrace | Token::Eof) || self.line > self.prev_line {
            return Ok(());
        }
        Err(self.unexpected(";"))
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError {
            line: self.line,
            message: message.into(),
        }
    }

    fn unexpected(&self, expected: &str) -> SyntaxError {
        match &self.current {
            Token::Error(message) => self.error(message.clone()),
            token => self.error(format!(
                "unexpected token: {} (expected {expected})",
                describe(token)
            )),
        }
    }

    // Statements

    fn statement(&mut self, fs: &mut FuncState) -> Result<(), SyntaxError> {
        fs.func
            .add_line_number(fs.func.current_offset() as u32, self.line);
        match &self.current {
            Token::LBrace => {
                self.advance();
                self.block(fs)
            }
            Token::Var => {
                self.var_clause(fs)?;
                self.expect_semicolon()
            }
            Token::Function => self.function_declaration(fs),
            Token::If => self.if_statement(fs),
            Token::While => self.while_statement(fs),
            Token::Do => self.do_statement(fs),
            Token::For => self.for_statement(fs),
            Token::Break => self.break_statement(fs),
            Token::Continue => self.continue_statement(fs),
            Token::Return => self.return_statement(fs),
            Token::Throw => self.throw_statement(fs),
            Token::Try => self.try_statement(fs),
            Token::Switch => Err(self.error("switch statements are not supported")),
            Token::Debugger => {
                self.advance();
                fs.emit_op(OpCode::Nop);
                self.expect_semicolon()
            }
            Token::Semicolon => {
                self.advance();
                Ok(())
            }
            _ => self.expression_statement(fs),
        }
    }

    /// Statements up to the closing brace. Does not open a scope: `var`
    /// is function-scoped.
    fn block(&mut self, fs: &mut FuncState) -> Result<(), SyntaxError> {
        while !matches!(self.current, Token::RBrace | Token::Eof) {
            self.statement(fs)?;
        }
        self.expect(Token::RBrace)
    }

    fn expression_statement(&mut self, fs: &mut FuncState) -> Result<(), SyntaxError> {
        self.expression(fs)?;
        self.expect_semicolon()?;
        if fs.top_level {
            // Keep the result as the script's completion value.
            fs.emit_op(OpCode::SetLocal);
            fs.func.emit_u8(COMPLETION_SLOT);
        } else {
            fs.emit_op(OpCode::Drop);
        }
        Ok(())
    }

    /// `var` declarations without the trailing semicolon, shared with the
    /// for-statement init clause.
    fn var_clause(&mut self, fs: &mut FuncState) -> Result<(), SyntaxError> {
        self.advance();
        loop {
            let name = self.expect_ident()?;
            if fs.top_level {
                let idx = self.name_constant(fs, &name)?;
                if self.eat(&Token::Eq) {
                    self.assignment_expression(fs)?;
                    fs.emit_op(OpCode::DefineGlobal);
                    fs.func.emit_u16(idx);
                } else {
                    fs.emit_op(OpCode::DeclareGlobal);
                    fs.func.emit_u16(idx);
                }
            } else {
                let slot = self.declare_local(fs, &name)?;
                if self.eat(&Token::Eq) {
                    self.assignment_expression(fs)?;
                    fs.emit_op(OpCode::SetLocal);
                    fs.func.emit_u8(slot);
                }
            }
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        Ok(())
    }

    fn function_declaration(&mut self, fs: &mut FuncState) -> Result<(), SyntaxError> {
        self.advance();
        let name = self.expect_ident()?;
        if fs.top_level {
            let idx = self.name_constant(fs, &name)?;
            self.function_literal(fs, Some(Rc::from(name)))?;
            fs.emit_op(OpCode::DefineGlobal);
            fs.func.emit_u16(idx);
        } else {
            let slot = self.declare_local(fs, &name)?;
            self.function_literal(fs, Some(Rc::from(name)))?;
            fs.emit_op(OpCode::SetLocal);
            fs.func.emit_u8(slot);
        }
        Ok(())
    }

    /// Parameter list and body. Emits a Closure for the finished function.
    fn function_literal(
        &mut self,
        fs: &mut FuncState,
        name: Option<Rc<str>>,
    ) -> Result<(), SyntaxError> {
        self.expect(Token::LParen)?;
        let mut params = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                params.push(self.expect_ident()?);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(Token::RParen)?;
        if params.len() > MAX_ARGS {
            return Err(self.error("too many parameters"));
        }

        let mut inner = FuncState::function(name, params);
        self.expect(Token::LBrace)?;
        self.block(&mut inner)?;
        inner.func.emit_u8(OpCode::ReturnUndef as u8);

        let idx = inner_index(fs).ok_or_else(|| self.error("too many nested functions"))?;
        fs.func.inner.push(Rc::new(inner.func));
        fs.emit_op(OpCode::Closure);
        fs.func.emit_u8(idx);
        Ok(())
    }

    fn if_statement(&mut self, fs: &mut FuncState) -> Result<(), SyntaxError> {
        self.advance();
        self.expect(Token::LParen)?;
        self.expression(fs)?;
        self.expect(Token::RParen)?;
        let else_jump = fs.emit_jump(OpCode::JumpIfFalse);
        self.statement(fs)?;
        if self.eat(&Token::Else) {
            let end_jump = fs.emit_jump(OpCode::Jump);
            self.patch_jump(fs, else_jump)?;
            self.statement(fs)?;
            self.patch_jump(fs, end_jump)
        } else {
            self.patch_jump(fs, else_jump)
        }
    }

    fn while_statement(&mut self, fs: &mut FuncState) -> Result<(), SyntaxError> {
        self.advance();
        let loop_start = fs.func.current_offset();
        self.expect(Token::LParen)?;
        self.expression(fs)?;
        self.expect(Token::RParen)?;
        let exit_jump = fs.emit_jump(OpCode::JumpIfFalse);

        fs.loops.push(LoopCtx {
            continue_target: Some(loop_start),
            try_depth: fs.try_depth,
            ..LoopCtx::default()
        });
        self.statement(fs)?;
        self.emit_jump_to(fs, OpCode::Jump, loop_start)?;

        let ctx = fs.loops.pop().unwrap_or_default();
        self.patch_jump(fs, exit_jump)?;
        self.patch_jump_list(fs, &ctx.break_jumps)
    }

    fn do_statement(&mut self, fs: &mut FuncState) -> Result<(), SyntaxError> {
        self.advance();
        let body_start = fs.func.current_offset();
        fs.loops.push(LoopCtx {
            continue_target: None,
            try_depth: fs.try_depth,
            ..LoopCtx::default()
        });
        self.statement(fs)?;

        // continue lands on the condition
        let cond_start = fs.func.current_offset();
        self.expect(Token::While)?;
        self.expect(Token::LParen)?;
        self.expression(fs)?;
        self.expect(Token::RParen)?;
        self.expect_semicolon()?;

        let ctx = fs.loops.pop().unwrap_or_default();
        for operand in &ctx.continue_jumps {
            self.patch_jump_to(fs, *operand, cond_start)?;
        }
        self.emit_jump_to(fs, OpCode::JumpIfTrue, body_start)?;
        self.patch_jump_list(fs, &ctx.break_jumps)
    }

    /// Layout threads the condition, update and body so each is emitted
    /// once in source order:
    ///
    /// ```text
    /// init
    /// cond:   <condition> JumpIfFalse exit
    ///         Jump body
    /// update: <update> Drop
    ///         Jump cond
    /// body:   <body>
    ///         Jump update (or cond)
    /// exit:
    /// ```
    fn for_statement(&mut self, fs: &mut FuncState) -> Result<(), SyntaxError> {
        self.advance();
        self.expect(Token::LParen)?;
        match &self.current {
            Token::Semicolon => self.advance(),
            Token::Var => {
                self.var_clause(fs)?;
                if self.check(&Token::In) {
                    return Err(self.error("for-in loops are not supported"));
                }
                self.expect(Token::Semicolon)?;
            }
            _ => {
                self.expression(fs)?;
                fs.emit_op(OpCode::Drop);
                if self.check(&Token::In) {
                    return Err(self.error("for-in loops are not supported"));
                }
                self.expect(Token::Semicolon)?;
            }
        }

        let cond_start = fs.func.current_offset();
        let exit_jump = if self.check(&Token::Semicolon) {
            None
        } else {
            self.expression(fs)?;
            Some(fs.emit_jump(OpCode::JumpIfFalse))
        };
        self.expect(Token::Semicolon)?;

        let continue_target = if self.check(&Token::RParen) {
            cond_start
        } else {
            let body_jump = fs.emit_jump(OpCode::Jump);
            let update_start = fs.func.current_offset();
            self.expression(fs)?;
            fs.emit_op(OpCode::Drop);
            self.emit_jump_to(fs, OpCode::Jump, cond_start)?;
            self.patch_jump(fs, body_jump)?;
            update_start
        };
        self.expect(Token::RParen)?;

        fs.loops.push(LoopCtx {
            continue_target: Some(continue_target),
            try_depth: fs.try_depth,
            ..LoopCtx::default()
        });
        self.statement(fs)?;
        self.emit_jump_to(fs, OpCode::Jump, continue_target)?;

        let ctx = fs.loops.pop().unwrap_or_default();
        if let Some(exit_jump) = exit_jump {
            self.patch_jump(fs, exit_jump)?;
        }
        self.patch_jump_list(fs, &ctx.break_jumps)
    }

    fn break_statement(&mut self, fs: &mut FuncState) -> Result<(), SyntaxError> {
        self.advance();
        self.expect_semicolon()?;
        let Some(loop_try_depth) = fs.loops.last().map(|ctx| ctx.try_depth) else {
            return Err(self.error("unsolicited break statement"));
        };
        // Leave any try blocks opened inside the loop.
        for _ in loop_try_depth..fs.try_depth {
            fs.emit_op(OpCode::DropCatch);
        }
        let jump = fs.emit_jump(OpCode::Jump);
        if let Some(ctx) = fs.loops.last_mut() {
            ctx.break_jumps.push(jump);
        }
        Ok(())
    }

    fn continue_statement(&mut self, fs: &mut FuncState) -> Result<(), SyntaxError> {
        self.advance();
        self.expect_semicolon()?;
        let Some((target, loop_try_depth)) = fs
            .loops
            .last()
            .map(|ctx| (ctx.continue_target, ctx.try_depth))
        else {
            return Err(self.error("unsolicited continue statement"));
        };
        for _ in loop_try_depth..fs.try_depth {
            fs.emit_op(OpCode::DropCatch);
        }
        match target {
            Some(target) => self.emit_jump_to(fs, OpCode::Jump, target),
            None => {
                let jump = fs.emit_jump(OpCode::Jump);
                if let Some(ctx) = fs.loops.last_mut() {
                    ctx.continue_jumps.push(jump);
                }
                Ok(())
            }
        }
    }

    fn return_statement(&mut self, fs: &mut FuncState) -> Result<(), SyntaxError> {
        if fs.top_level {
            return Err(self.error("return not in function"));
        }
        self.advance();
        if matches!(self.current, Token::Semicolon | Token::RBrace | Token::Eof)
            || self.line > self.prev_line
        {
            fs.emit_op(OpCode::ReturnUndef);
        } else {
            self.expression(fs)?;
            fs.emit_op(OpCode::Return);
        }
        self.expect_semicolon()
    }

    fn throw_statement(&mut self, fs: &mut FuncState) -> Result<(), SyntaxError> {
        self.advance();
        if self.line > self.prev_line {
            return Err(self.error("illegal newline after throw"));
        }
        self.expression(fs)?;
        fs.emit_op(OpCode::Throw);
        self.expect_semicolon()
    }

    fn try_statement(&mut self, fs: &mut FuncState) -> Result<(), SyntaxError> {
        self.advance();
        let catch_jump = fs.emit_jump(OpCode::Catch);
        fs.try_depth += 1;
        self.expect(Token::LBrace)?;
        self.block(fs)?;
        fs.try_depth -= 1;
        fs.emit_op(OpCode::DropCatch);
        let end_jump = fs.emit_jump(OpCode::Jump);

        // Handler entry: the thrown value is on the stack.
        self.patch_jump(fs, catch_jump)?;
        if self.check(&Token::Finally) {
            return Err(self.error("finally clause is not supported"));
        }
        self.expect(Token::Catch)?;
        self.expect(Token::LParen)?;
        let name = self.expect_ident()?;
        self.expect(Token::RParen)?;
        let slot = self.add_local(fs, &name)?;
        fs.emit_op(OpCode::SetLocal);
        fs.func.emit_u8(slot);
        self.expect(Token::LBrace)?;
        self.block(fs)?;
        // The name goes out of scope; the slot stays reserved.
        if let Some(local) = fs.locals.get_mut(slot as usize) {
            local.clear();
        }
        if self.check(&Token::Finally) {
            return Err(self.error("finally clause is not supported"));
        }
        self.patch_jump(fs, end_jump)
    }

    // Expressions

    /// Full expression including the comma operator.
    fn expression(&mut self, fs: &mut FuncState) -> Result<(), SyntaxError> {
        self.assignment_expression(fs)?;
        while self.eat(&Token::Comma) {
            fs.emit_op(OpCode::Drop);
            self.assignment_expression(fs)?;
        }
        Ok(())
    }

    fn assignment_expression(&mut self, fs: &mut FuncState) -> Result<(), SyntaxError> {
        self.conditional_expression(fs, true)
    }

    fn conditional_expression(
        &mut self,
        fs: &mut FuncState,
        can_assign: bool,
    ) -> Result<(), SyntaxError> {
        self.binary_expression(fs, 1, can_assign)?;
        if self.eat(&Token::Question) {
            let else_jump = fs.emit_jump(OpCode::JumpIfFalse);
            self.assignment_expression(fs)?;
            let end_jump = fs.emit_jump(OpCode::Jump);
            self.expect(Token::Colon)?;
            self.patch_jump(fs, else_jump)?;
            self.assignment_expression(fs)?;
            self.patch_jump(fs, end_jump)?;
        }
        Ok(())
    }

    fn binary_expression(
        &mut self,
        fs: &mut FuncState,
        min_prec: u8,
        can_assign: bool,
    ) -> Result<(), SyntaxError> {
        self.unary_expression(fs, can_assign)?;
        while let Some((op, prec)) = binary_op_for(&self.current) {
            if prec < min_prec {
                break;
            }
            self.advance();
            match op {
                BinOp::Simple(opcode) => {
                    self.binary_expression(fs, prec + 1, false)?;
                    fs.emit_op(opcode);
                }
                // ** is right-associative
                BinOp::Pow => {
                    self.binary_expression(fs, prec, false)?;
                    fs.emit_op(OpCode::Pow);
                }
                // Short-circuit operators keep the left value when it
                // decides the result.
                BinOp::And => {
                    fs.emit_op(OpCode::Dup);
                    let end_jump = fs.emit_jump(OpCode::JumpIfFalse);
                    fs.emit_op(OpCode::Drop);
                    self.binary_expression(fs, prec + 1, false)?;
                    self.patch_jump(fs, end_jump)?;
                }
                BinOp::Or => {
                    fs.emit_op(OpCode::Dup);
                    let end_jump = fs.emit_jump(OpCode::JumpIfTrue);
                    fs.emit_op(OpCode::Drop);
                    self.binary_expression(fs, prec + 1, false)?;
                    self.patch_jump(fs, end_jump)?;
                }
            }
        }
        Ok(())
    }

    fn unary_expression(
        &mut self,
        fs: &mut FuncState,
        can_assign: bool,
    ) -> Result<(), SyntaxError> {
        match &self.current {
            Token::Minus => {
                self.advance();
                self.unary_expression(fs, false)?;
                fs.emit_op(OpCode::Neg);
            }
            Token::Plus => {
                self.advance();
                self.unary_expression(fs, false)?;
                fs.emit_op(OpCode::Plus);
            }
            Token::Bang => {
                self.advance();
                self.unary_expression(fs, false)?;
                fs.emit_op(OpCode::LNot);
            }
            Token::Tilde => {
                self.advance();
                self.unary_expression(fs, false)?;
                fs.emit_op(OpCode::BitNot);
            }
            Token::Void => {
                self.advance();
                self.unary_expression(fs, false)?;
                fs.emit_op(OpCode::Drop);
                fs.emit_op(OpCode::Undefined);
            }
            Token::TypeOf => self.typeof_expression(fs)?,
            Token::PlusPlus | Token::MinusMinus => {
                let inc = matches!(self.current, Token::PlusPlus);
                self.advance();
                let Token::Ident(name) = &self.current else {
                    return Err(self.error(if inc {
                        "invalid l-value in increment"
                    } else {
                        "invalid l-value in decrement"
                    }));
                };
                let name = name.clone();
                self.advance();
                self.emit_get_variable(fs, &name)?;
                fs.emit_op(if inc { OpCode::Inc } else { OpCode::Dec });
                fs.emit_op(OpCode::Dup);
                self.emit_set_variable(fs, &name)?;
            }
            Token::Delete => return Err(self.error("delete is not supported")),
            Token::New => return Err(self.error("new expressions are not supported")),
            _ => self.postfix_expression(fs, can_assign)?,
        }
        Ok(())
    }

    /// `typeof` on a bare identifier must not throw for unresolved names,
    /// so it bypasses the defined-check on the global load. A call
    /// argument evaluates normally first.
    fn typeof_expression(&mut self, fs: &mut FuncState) -> Result<(), SyntaxError> {
        self.advance();
        if let Token::Ident(name) = &self.current {
            let name = name.clone();
            self.advance();
            if self.check(&Token::LParen) {
                self.emit_get_variable(fs, &name)?;
                while self.check(&Token::LParen) {
                    self.call_suffix(fs)?;
                }
            } else if let Some(slot) = fs.resolve_local(&name) {
                fs.emit_op(OpCode::GetLocal);
                fs.func.emit_u8(slot);
            } else {
                let idx = self.name_constant(fs, &name)?;
                fs.emit_op(OpCode::GetGlobalNoCheck);
                fs.func.emit_u16(idx);
            }
        } else {
            self.unary_expression(fs, false)?;
        }
        fs.emit_op(OpCode::TypeOf);
        Ok(())
    }

    fn postfix_expression(
        &mut self,
        fs: &mut FuncState,
        can_assign: bool,
    ) -> Result<(), SyntaxError> {
        self.primary_expression(fs, can_assign)?;
        loop {
            match &self.current {
                Token::LParen => self.call_suffix(fs)?,
                Token::Dot | Token::LBracket => {
                    return Err(self.error("property access is not supported"));
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn primary_expression(
        &mut self,
        fs: &mut FuncState,
        can_assign: bool,
    ) -> Result<(), SyntaxError> {
        match &self.current {
            Token::Number(n) => {
                let n = *n;
                self.advance();
                self.emit_number(fs, n)?;
            }
            Token::String(s) => {
                let s = s.clone();
                self.advance();
                self.emit_constant(fs, Value::string(s))?;
            }
            Token::True => {
                self.advance();
                fs.emit_op(OpCode::PushTrue);
            }
            Token::False => {
                self.advance();
                fs.emit_op(OpCode::PushFalse);
            }
            Token::Null => {
                self.advance();
                fs.emit_op(OpCode::Null);
            }
            Token::This => {
                self.advance();
                fs.emit_op(OpCode::PushThis);
            }
            Token::Ident(name) => {
                let name = name.clone();
                self.advance();
                self.variable(fs, &name, can_assign)?;
            }
            Token::LParen => {
                self.advance();
                self.expression(fs)?;
                self.expect(Token::RParen)?;
            }
            Token::Function => {
                self.advance();
                let name = match &self.current {
                    Token::Ident(name) => {
                        let name = name.clone();
                        self.advance();
                        Some(Rc::from(name))
                    }
                    _ => None,
                };
                self.function_literal(fs, name)?;
            }
            Token::Error(message) => return Err(self.error(message.clone())),
            _ => return Err(self.unexpected("expression")),
        }
        Ok(())
    }

    /// Identifier reference, assignment, or postfix increment.
    fn variable(
        &mut self,
        fs: &mut FuncState,
        name: &str,
        can_assign: bool,
    ) -> Result<(), SyntaxError> {
        match assignment_op_for(&self.current) {
            Some(None) if can_assign => {
                self.advance();
                self.assignment_expression(fs)?;
                // An assignment expression yields the assigned value.
                fs.emit_op(OpCode::Dup);
                self.emit_set_variable(fs, name)?;
            }
            Some(Some(opcode)) if can_assign => {
                self.advance();
                self.emit_get_variable(fs, name)?;
                self.assignment_expression(fs)?;
                fs.emit_op(opcode);
                fs.emit_op(OpCode::Dup);
                self.emit_set_variable(fs, name)?;
            }
            _ => {
                // Postfix only applies on the same line.
                if matches!(self.current, Token::PlusPlus | Token::MinusMinus)
                    && self.line == self.prev_line
                {
                    let inc = matches!(self.current, Token::PlusPlus);
                    self.advance();
                    self.emit_get_variable(fs, name)?;
                    // The result is the old value coerced to a number.
                    fs.emit_op(OpCode::Plus);
                    fs.emit_op(OpCode::Dup);
                    fs.emit_op(if inc { OpCode::Inc } else { OpCode::Dec });
                    self.emit_set_variable(fs, name)?;
                } else {
                    self.emit_get_variable(fs, name)?;
                }
            }
        }
        Ok(())
    }

    fn call_suffix(&mut self, fs: &mut FuncState) -> Result<(), SyntaxError> {
        self.advance();
        let mut argc: usize = 0;
        if !self.check(&Token::RParen) {
            loop {
                self.assignment_expression(fs)?;
                argc += 1;
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(Token::RParen)?;
        if argc > MAX_ARGS {
            return Err(self.error("too many arguments"));
        }
        fs.emit_op(OpCode::Call);
        fs.func.emit_u8(argc as u8);
        Ok(())
    }

    // Variables and constants

    fn emit_get_variable(&self, fs: &mut FuncState, name: &str) -> Result<(), SyntaxError> {
        match fs.resolve_local(name) {
            Some(slot) => {
                fs.emit_op(OpCode::GetLocal);
                fs.func.emit_u8(slot);
            }
            None => {
                let idx = self.name_constant(fs, name)?;
                fs.emit_op(OpCode::GetGlobal);
                fs.func.emit_u16(idx);
            }
        }
        Ok(())
    }

    fn emit_set_variable(&self, fs: &mut FuncState, name: &str) -> Result<(), SyntaxError> {
        match fs.resolve_local(name) {
            Some(slot) => {
                fs.emit_op(OpCode::SetLocal);
                fs.func.emit_u8(slot);
            }
            None => {
                let idx = self.name_constant(fs, name)?;
                fs.emit_op(OpCode::SetGlobal);
                fs.func.emit_u16(idx);
            }
        }
        Ok(())
    }

    /// Reuse an existing slot on redeclaration.
    fn declare_local(&self, fs: &mut FuncState, name: &str) -> Result<u8, SyntaxError> {
        if let Some(slot) = fs.resolve_local(name) {
            return Ok(slot);
        }
        self.add_local(fs, name)
    }

    /// Always allocates a fresh slot, shadowing any same-named local.
    fn add_local(&self, fs: &mut FuncState, name: &str) -> Result<u8, SyntaxError> {
        if fs.locals.len() >= u8::MAX as usize {
            return Err(self.error("too many local variables"));
        }
        fs.locals.push(name.to_string());
        fs.func.local_count = fs.locals.len() as u8;
        Ok((fs.locals.len() - 1) as u8)
    }

    /// Constant pool index for a global name, deduplicated.
    fn name_constant(&self, fs: &mut FuncState, name: &str) -> Result<u16, SyntaxError> {
        let value = Value::string(name);
        let idx = match fs
            .func
            .constants
            .iter()
            .position(|c| constants_equal(c, &value))
        {
            Some(idx) => idx,
            None => fs.func.add_constant(value),
        };
        u16::try_from(idx).map_err(|_| self.error("too many constants"))
    }

    fn emit_constant(&self, fs: &mut FuncState, value: Value) -> Result<(), SyntaxError> {
        let idx = match fs
            .func
            .constants
            .iter()
            .position(|c| constants_equal(c, &value))
        {
            Some(idx) => idx,
            None => fs.func.add_constant(value),
        };
        if let Ok(idx) = u8::try_from(idx) {
            fs.emit_op(OpCode::PushConst8);
            fs.func.emit_u8(idx);
        } else if let Ok(idx) = u16::try_from(idx) {
            fs.emit_op(OpCode::PushConst);
            fs.func.emit_u16(idx);
        } else {
            return Err(self.error("too many constants"));
        }
        Ok(())
    }

    /// Small integers get dedicated opcodes, everything else goes through
    /// the constant pool. Negative zero must not collapse to Push0.
    fn emit_number(&self, fs: &mut FuncState, n: f64) -> Result<(), SyntaxError> {
        if n == 0.0 {
            if n.is_sign_positive() {
                fs.emit_op(OpCode::Push0);
            } else {
                self.emit_constant(fs, Value::number(n))?;
            }
        } else if n == 1.0 {
            fs.emit_op(OpCode::Push1);
        } else if n.fract() == 0.0 && (f64::from(i8::MIN)..=f64::from(i8::MAX)).contains(&n) {
            fs.emit_op(OpCode::PushI8);
            fs.func.emit_u8((n as i8) as u8);
        } else if n.fract() == 0.0 && (f64::from(i16::MIN)..=f64::from(i16::MAX)).contains(&n) {
            fs.emit_op(OpCode::PushI16);
            fs.func.emit_u16((n as i16) as u16);
        } else {
            self.emit_constant(fs, Value::number(n))?;
        }
        Ok(())
    }

    // Jump patching

    fn jump_target(&self, fs: &FuncState) -> Result<u16, SyntaxError> {
        u16::try_from(fs.func.current_offset()).map_err(|_| self.error("function too large"))
    }

    fn patch_jump(&self, fs: &mut FuncState, operand: usize) -> Result<(), SyntaxError> {
        let target = self.jump_target(fs)?;
        fs.func.patch_u16(operand, target);
        Ok(())
    }

    fn patch_jump_to(
        &self,
        fs: &mut FuncState,
        operand: usize,
        target: usize,
    ) -> Result<(), SyntaxError> {
        let target = u16::try_from(target).map_err(|_| self.error("function too large"))?;
        fs.func.patch_u16(operand, target);
        Ok(())
    }

    fn emit_jump_to(
        &self,
        fs: &mut FuncState,
        op: OpCode,
        target: usize,
    ) -> Result<(), SyntaxError> {
        let target = u16::try_from(target).map_err(|_| self.error("function too large"))?;
        fs.emit_op(op);
        fs.func.emit_u16(target);
        Ok(())
    }

    /// Point every jump in the list at the current offset.
    fn patch_jump_list(&self, fs: &mut FuncState, operands: &[usize]) -> Result<(), SyntaxError> {
        let target = self.jump_target(fs)?;
        for &operand in operands {
            fs.func.patch_u16(operand, target);
        }
        Ok(())
    }
}

fn inner_index(fs: &FuncState) -> Option<u8> {
    u8::try_from(fs.func.inner.len()).ok()
}

/// Token name for error messages, mirroring the source spelling.
fn describe(token: &Token) -> &'static str {
    match token {
        Token::Number(_) => "(number)",
        Token::String(_) => "(string)",
        Token::Ident(_) => "(identifier)",
        Token::Plus => "+",
        Token::Minus => "-",
        Token::Star => "*",
        Token::Slash => "/",
        Token::Percent => "%",
        Token::StarStar => "**",
        Token::PlusPlus => "++",
        Token::MinusMinus => "--",
        Token::Eq => "=",
        Token::EqEq => "==",
        Token::EqEqEq => "===",
        Token::Bang => "!",
        Token::BangEq => "!=",
        Token::BangEqEq => "!==",
        Token::Lt => "<",
        Token::LtEq => "<=",
        Token::Gt => ">",
        Token::GtEq => ">=",
        Token::LtLt => "<<",
        Token::GtGt => ">>",
        Token::GtGtGt => ">>>",
        Token::Amp => "&",
        Token::AmpAmp => "&&",
        Token::Pipe => "|",
        Token::PipePipe => "||",
        Token::Caret => "^",
        Token::Tilde => "~",
        Token::Question => "?",
        Token::Colon => ":",
        Token::Semicolon => ";",
        Token::Comma => ",",
        Token::Dot => ".",
        Token::LParen => "(",
        Token::RParen => ")",
        Token::LBracket => "[",
        Token::RBracket => "]",
        Token::LBrace => "{",
        Token::RBrace => "}",
        Token::PlusEq => "+=",
        Token::MinusEq => "-=",
        Token::StarEq => "*=",
        Token::SlashEq => "/=",
        Token::PercentEq => "%=",
        Token::StarStarEq => "**=",
        Token::LtLtEq => "<<=",
        Token::GtGtEq => ">>=",
        Token::GtGtGtEq => ">>>=",
        Token::AmpEq => "&=",
        Token::PipeEq => "|=",
        Token::CaretEq => "^=",
        Token::Break => "break",
        Token::Case => "case",
        Token::Catch => "catch",
        Token::Continue => "continue",
        Token::Debugger => "debugger",
        Token::Default => "default",
        Token::Delete => "delete",
        Token::Do => "do",
        Token::Else => "else",
        Token::False => "false",
        Token::Finally => "finally",
        Token::For => "for",
        Token::Function => "function",
        Token::If => "if",
        Token::In => "in",
        Token::InstanceOf => "instanceof",
        Token::New => "new",
        Token::Null => "null",
        Token::Return => "return",
        Token::Switch => "switch",
        Token::This => "this",
        Token::Throw => "throw",
        Token::True => "true",
        Token::Try => "try",
        Token::TypeOf => "typeof",
        Token::Var => "var",
        Token::Void => "void",
        Token::While => "while",
        Token::Eof => "(eof)",
        Token::Error(_) => "(invalid token)",
    }
}
