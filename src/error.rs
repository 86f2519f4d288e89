//! Error types for the embedding host and for scripts.
//!
//! Parse failures surface as [`SyntaxError`], script exceptions as
//! [`JsException`], and the host-facing [`ScriptError`] wraps whichever of
//! the two ended an evaluation.

use thiserror::Error;

/// The class of a script exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Plain `Error`.
    Error,
    /// Value of the wrong type, e.g. calling a non-function.
    TypeError,
    /// Name that is not bound in any reachable scope.
    ReferenceError,
    /// Value outside its permitted range.
    RangeError,
    /// Failure inside the engine itself, e.g. call stack exhaustion.
    InternalError,
}

impl ErrorKind {
    /// Constructor name as scripts would see it.
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Error => "Error",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::ReferenceError => "ReferenceError",
            ErrorKind::RangeError => "RangeError",
            ErrorKind::InternalError => "InternalError",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A script-level exception.
///
/// The engine raises these for runtime faults, native callbacks return them
/// to signal failure, and scripts observe them through `try`/`catch`. An
/// exception nobody catches reaches the host as [`ScriptError::Uncaught`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct JsException {
    /// Exception class.
    pub kind: ErrorKind,
    /// Human-readable description.
    pub message: String,
}

impl JsException {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        JsException {
            kind,
            message: message.into(),
        }
    }

    /// Plain `Error`.
    pub fn error(message: impl Into<String>) -> Self {
        JsException::new(ErrorKind::Error, message)
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        JsException::new(ErrorKind::TypeError, message)
    }

    pub fn reference(message: impl Into<String>) -> Self {
        JsException::new(ErrorKind::ReferenceError, message)
    }

    pub fn range(message: impl Into<String>) -> Self {
        JsException::new(ErrorKind::RangeError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        JsException::new(ErrorKind::InternalError, message)
    }

    /// Constructor name of the exception class.
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Parse or compile failure, with the source line it was detected on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct SyntaxError {
    pub line: u32,
    pub message: String,
}

/// Error surfaced to the embedding host by evaluation.
///
/// Both variants are recoverable: the state stays usable and the host
/// decides whether to retry, report, or exit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    /// The source did not compile.
    #[error("SyntaxError: {0}")]
    Syntax(#[from] SyntaxError),
    /// A thrown value reached the top without a handler.
    #[error("uncaught exception: {0}")]
    Uncaught(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exception_display() {
        let exc = JsException::type_error("undefined is not a function");
        assert_eq!(exc.to_string(), "TypeError: undefined is not a function");
        assert_eq!(exc.name(), "TypeError");
        assert_eq!(exc.message(), "undefined is not a function");
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(ErrorKind::ReferenceError.name(), "ReferenceError");
        assert_eq!(ErrorKind::InternalError.to_string(), "InternalError");
    }

    #[test]
    fn test_syntax_error_display() {
        let err = SyntaxError {
            line: 3,
            message: "unexpected token: ')'".to_string(),
        };
        assert_eq!(err.to_string(), "line 3: unexpected token: ')'");

        let wrapped = ScriptError::from(err);
        assert_eq!(
            wrapped.to_string(),
            "SyntaxError: line 3: unexpected token: ')'"
        );
    }

    #[test]
    fn test_uncaught_display() {
        let err = ScriptError::Uncaught("ReferenceError: 'x' is not defined".to_string());
        assert_eq!(
            err.to_string(),
            "uncaught exception: ReferenceError: 'x' is not defined"
        );
    }
}
