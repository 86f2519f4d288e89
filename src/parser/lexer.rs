//! JavaScript lexer/tokenizer
//!
//! Converts source text into a stream of tokens. Malformed input becomes a
//! `Token::Error` carrying the message; the compiler turns that into a
//! syntax error at the recorded line.

/// Token types
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Number(f64),
    String(String),
    Ident(String),

    // Operators and punctuation
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    StarStar,   // **
    PlusPlus,   // ++
    MinusMinus, // --

    Eq,       // =
    EqEq,     // ==
    EqEqEq,   // ===
    Bang,     // !
    BangEq,   // !=
    BangEqEq, // !==

    Lt,   // <
    LtEq, // <=
    Gt,   // >
    GtEq, // >=

    LtLt,   // <<
    GtGt,   // >>
    GtGtGt, // >>>

    Amp,      // &
    AmpAmp,   // &&
    Pipe,     // |
    PipePipe, // ||
    Caret,    // ^
    Tilde,    // ~

    Question,  // ?
    Colon,     // :
    Semicolon, // ;
    Comma,     // ,
    Dot,       // .

    LParen,   // (
    RParen,   // )
    LBracket, // [
    RBracket, // ]
    LBrace,   // {
    RBrace,   // }

    // Compound assignment
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    PercentEq,
    StarStarEq,
    LtLtEq,
    GtGtEq,
    GtGtGtEq,
    AmpEq,
    PipeEq,
    CaretEq,

    // Keywords. Some of these have no supported grammar and exist only so
    // the compiler can reject them with a precise message.
    Break,
    Case,
    Catch,
    Continue,
    Debugger,
    Default,
    Delete,
    Do,
    Else,
    False,
    Finally,
    For,
    Function,
    If,
    In,
    InstanceOf,
    New,
    Null,
    Return,
    Switch,
    This,
    Throw,
    True,
    Try,
    TypeOf,
    Var,
    Void,
    While,

    // Special
    Eof,
    Error(String),
}

/// Lexer for JavaScript source code
pub struct Lexer<'a> {
    source: &'a [u8],
    pos: usize,
    line: usize,
    token_line: usize,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given source
    pub fn new(source: &'a str) -> Self {
        Lexer {
            source: source.as_bytes(),
            pos: 0,
            line: 1,
            token_line: 1,
        }
    }

    /// Line on which the most recent token started.
    pub fn token_line(&self) -> usize {
        self.token_line
    }

    /// Peek at the current byte without consuming it
    fn peek(&self) -> Option<u8> {
        self.source.get(self.pos).copied()
    }

    /// Peek at the next byte
    fn peek_next(&self) -> Option<u8> {
        self.source.get(self.pos + 1).copied()
    }

    /// Consume the current byte
    fn advance(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        if c == b'\n' {
            self.line += 1;
        }
        Some(c)
    }

    /// Skip whitespace and comments
    fn skip_whitespace(&mut self) {
        loop {
            match self.peek() {
                Some(b' ' | b'\t' | b'\r' | b'\n') => {
                    self.advance();
                }
                Some(b'/') if self.peek_next() == Some(b'/') => {
                    // Line comment
                    while let Some(c) = self.advance() {
                        if c == b'\n' {
                            break;
                        }
                    }
                }
                Some(b'/') if self.peek_next() == Some(b'*') => {
                    // Block comment
                    self.advance(); // /
                    self.advance(); // *
                    while let Some(c) = self.advance() {
                        if c == b'*' && self.peek() == Some(b'/') {
                            self.advance();
                            break;
                        }
                    }
                }
                _ => break,
            }
        }
    }

    /// Read the next token
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();
        self.token_line = self.line;

        let Some(c) = self.peek() else {
            return Token::Eof;
        };

        // Identifiers and keywords
        if is_ident_start(c) {
            return self.read_identifier();
        }

        // Numbers, including the leading-dot form
        if c.is_ascii_digit() {
            return self.read_number();
        }
        if c == b'.' && self.peek_next().is_some_and(|b| b.is_ascii_digit()) {
            return self.read_number();
        }

        // Strings
        if c == b'"' || c == b'\'' {
            return self.read_string();
        }

        // Operators and punctuation
        self.advance();
        match c {
            b'+' => match self.peek() {
                Some(b'+') => {
                    self.advance();
                    Token::PlusPlus
                }
                Some(b'=') => {
                    self.advance();
                    Token::PlusEq
                }
                _ => Token::Plus,
            },
            b'-' => match self.peek() {
                Some(b'-') => {
                    self.advance();
                    Token::MinusMinus
                }
                Some(b'=') => {
                    self.advance();
                    Token::MinusEq
                }
                _ => Token::Minus,
            },
            b'*' => match self.peek() {
                Some(b'*') => {
                    self.advance();
                    if self.peek() == Some(b'=') {
                        self.advance();
                        Token::StarStarEq
                    } else {
                        Token::StarStar
                    }
                }
                Some(b'=') => {
                    self.advance();
                    Token::StarEq
                }
                _ => Token::Star,
            },
            b'/' => match self.peek() {
                Some(b'=') => {
                    self.advance();
                    Token::SlashEq
                }
                _ => Token::Slash,
            },
            b'%' => match self.peek() {
                Some(b'=') => {
                    self.advance();
                    Token::PercentEq
                }
                _ => Token::Percent,
            },
            b'=' => match self.peek() {
                Some(b'=') => {
                    self.advance();
                    if self.peek() == Some(b'=') {
                        self.advance();
                        Token::EqEqEq
                    } else {
                        Token::EqEq
                    }
                }
                _ => Token::Eq,
            },
            b'!' => match self.peek() {
                Some(b'=') => {
                    self.advance();
                    if self.peek() == Some(b'=') {
                        self.advance();
                        Token::BangEqEq
                    } else {
                        Token::BangEq
                    }
                }
                _ => Token::Bang,
            },
            b'<' => match self.peek() {
                Some(b'<') => {
                    self.advance();
                    if self.peek() == Some(b'=') {
                        self.advance();
                        Token::LtLtEq
                    } else {
                        Token::LtLt
                    }
                }
                Some(b'=') => {
                    self.advance();
                    Token::LtEq
                }
                _ => Token::Lt,
            },
            b'>' => match self.peek() {
                Some(b'>') => {
                    self.advance();
                    match self.peek() {
                        Some(b'>') => {
                            self.advance();
                            if self.peek() == Some(b'=') {
                                self.advance();
                                Token::GtGtGtEq
                            } else {
                                Token::GtGtGt
                            }
                        }
                        Some(b'=') => {
                            self.advance();
                            Token::GtGtEq
                        }
                        _ => Token::GtGt,
                    }
                }
                Some(b'=') => {
                    self.advance();
                    Token::GtEq
                }
                _ => Token::Gt,
            },
            b'&' => match self.peek() {
                Some(b'&') => {
                    self.advance();
                    Token::AmpAmp
                }
                Some(b'=') => {
                    self.advance();
                    Token::AmpEq
                }
                _ => Token::Amp,
            },
            b'|' => match self.peek() {
                Some(b'|') => {
                    self.advance();
                    Token::PipePipe
                }
                Some(b'=') => {
                    self.advance();
                    Token::PipeEq
                }
                _ => Token::Pipe,
            },
            b'^' => match self.peek() {
                Some(b'=') => {
                    self.advance();
                    Token::CaretEq
                }
                _ => Token::Caret,
            },
            b'~' => Token::Tilde,
            b'?' => Token::Question,
            b':' => Token::Colon,
            b';' => Token::Semicolon,
            b',' => Token::Comma,
            b'.' => Token::Dot,
            b'(' => Token::LParen,
            b')' => Token::RParen,
            b'[' => Token::LBracket,
            b']' => Token::RBracket,
            b'{' => Token::LBrace,
            b'}' => Token::RBrace,
            _ => Token::Error(format!("unexpected character '{}'", c as char)),
        }
    }

    /// Read an identifier or keyword
    fn read_identifier(&mut self) -> Token {
        let start = self.pos;

        while let Some(c) = self.peek() {
            if is_ident_part(c) {
                self.advance();
            } else {
                break;
            }
        }

        let ident = String::from_utf8_lossy(&self.source[start..self.pos]).into_owned();

        // Check for keywords
        match ident.as_str() {
            "break" => Token::Break,
            "case" => Token::Case,
            "catch" => Token::Catch,
            "continue" => Token::Continue,
            "debugger" => Token::Debugger,
            "default" => Token::Default,
            "delete" => Token::Delete,
            "do" => Token::Do,
            "else" => Token::Else,
            "false" => Token::False,
            "finally" => Token::Finally,
            "for" => Token::For,
            "function" => Token::Function,
            "if" => Token::If,
            "in" => Token::In,
            "instanceof" => Token::InstanceOf,
            "new" => Token::New,
            "null" => Token::Null,
            "return" => Token::Return,
            "switch" => Token::Switch,
            "this" => Token::This,
            "throw" => Token::Throw,
            "true" => Token::True,
            "try" => Token::Try,
            "typeof" => Token::TypeOf,
            "var" => Token::Var,
            "void" => Token::Void,
            "while" => Token::While,
            _ => Token::Ident(ident),
        }
    }

    /// Read a number literal
    fn read_number(&mut self) -> Token {
        let start = self.pos;

        // Hex literal
        if self.peek() == Some(b'0') && matches!(self.peek_next(), Some(b'x' | b'X')) {
            self.advance();
            self.advance();
            let digits_start = self.pos;
            let mut value = 0.0f64;
            while let Some(c) = self.peek() {
                match (c as char).to_digit(16) {
                    Some(d) => {
                        value = value * 16.0 + d as f64;
                        self.advance();
                    }
                    None => break,
                }
            }
            if self.pos == digits_start || self.peek().is_some_and(is_ident_start) {
                return Token::Error("invalid number literal".to_string());
            }
            return Token::Number(value);
        }

        // Integer part
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.advance();
            } else {
                break;
            }
        }

        // Decimal part
        if self.peek() == Some(b'.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            self.advance(); // .
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() {
                    self.advance();
                } else {
                    break;
                }
            }
        }

        // Exponent part
        if matches!(self.peek(), Some(b'e' | b'E')) {
            self.advance();
            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.advance();
            }
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() {
                    self.advance();
                } else {
                    break;
                }
            }
        }

        // A number must not run straight into an identifier.
        if self.peek().is_some_and(is_ident_start) {
            return Token::Error("invalid number literal".to_string());
        }

        let num_str = String::from_utf8_lossy(&self.source[start..self.pos]);
        match num_str.parse::<f64>() {
            Ok(n) => Token::Number(n),
            Err(_) => Token::Error("invalid number literal".to_string()),
        }
    }

    /// Read a string literal
    fn read_string(&mut self) -> Token {
        let Some(quote) = self.advance() else {
            return Token::Error("unterminated string".to_string());
        };
        let mut buf = Vec::new();

        loop {
            match self.peek() {
                None | Some(b'\n') => return Token::Error("unterminated string".to_string()),
                Some(c) if c == quote => {
                    self.advance();
                    break;
                }
                Some(b'\\') => {
                    self.advance();
                    match self.advance() {
                        Some(b'n') => buf.push(b'\n'),
                        Some(b'r') => buf.push(b'\r'),
                        Some(b't') => buf.push(b'\t'),
                        Some(b'b') => buf.push(0x08),
                        Some(b'f') => buf.push(0x0C),
                        Some(b'v') => buf.push(0x0B),
                        Some(b'0') => buf.push(0),
                        Some(b'x') => match self.read_hex_escape(2) {
                            Some(c) => push_char(&mut buf, c),
                            None => {
                                return Token::Error("invalid hexadecimal escape".to_string());
                            }
                        },
                        Some(b'u') => match self.read_hex_escape(4) {
                            Some(c) => push_char(&mut buf, c),
                            None => return Token::Error("invalid unicode escape".to_string()),
                        },
                        // Line continuation
                        Some(b'\n') => {}
                        // Any other escaped byte stands for itself.
                        Some(c) => buf.push(c),
                        None => return Token::Error("unterminated string".to_string()),
                    }
                }
                Some(c) => {
                    self.advance();
                    buf.push(c);
                }
            }
        }

        Token::String(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Read a fixed-length hex escape. Code points outside the valid range
    /// (lone surrogates) become U+FFFD.
    fn read_hex_escape(&mut self, digits: u32) -> Option<char> {
        let mut value = 0u32;
        for _ in 0..digits {
            let c = self.advance()?;
            let d = (c as char).to_digit(16)?;
            value = value * 16 + d;
        }
        Some(char::from_u32(value).unwrap_or('\u{FFFD}'))
    }
}

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_' || c == b'$'
}

fn is_ident_part(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_' || c == b'$'
}

fn push_char(buf: &mut Vec<u8>, c: char) {
    let mut tmp = [0u8; 4];
    buf.extend_from_slice(c.encode_utf8(&mut tmp).as_bytes());
}
