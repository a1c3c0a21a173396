//! Structured error types for every phase of the pipeline.
//!
//! A `strum`-derived kind enum gives each error family cheap `Display` and
//! matching, plain structs carry the payload fields, and every phase exposes
//! its own `Result` alias. Errors are always returned, never raised as a
//! Rust panic or unwound across the embedding boundary.

use std::fmt;

use strum::Display as StrumDisplay;

use crate::location::CodeRange;

/// Lexer-level error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay)]
pub enum LexErrorKind {
    UnknownEscape,
    UnterminatedString,
    BadNumber,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub kind: LexErrorKind,
    pub message: String,
    pub loc: CodeRange,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}: {}", self.kind, self.loc, self.message)
    }
}

/// Parser-level error kinds.
#[derive(Debug, Clone, PartialEq, StrumDisplay)]
pub enum ParseError {
    UnexpectedToken { found: String, loc: CodeRange },
    UnterminatedList { opened_at: CodeRange },
    Lex(Box<LexError>),
}

impl ParseError {
    #[must_use]
    pub fn loc(&self) -> CodeRange {
        match self {
            Self::UnexpectedToken { loc, .. } => *loc,
            Self::UnterminatedList { opened_at } => *opened_at,
            Self::Lex(inner) => inner.loc,
        }
    }
}

impl From<LexError> for ParseError {
    fn from(err: LexError) -> Self {
        Self::Lex(Box::new(err))
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedToken { found, loc } => write!(f, "unexpected token `{found}` at {loc}"),
            Self::UnterminatedList { opened_at } => write!(f, "unterminated list opened at {opened_at}"),
            Self::Lex(inner) => write!(f, "{inner}"),
        }
    }
}

/// Compile-time error kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum CompileError {
    BadSpecialForm { form: String, reason: String, loc: CodeRange },
    UndefinedInLetrec { name: String, loc: CodeRange },
    ArityMismatch { expected: String, got: usize, loc: CodeRange },
}

impl CompileError {
    #[must_use]
    pub fn loc(&self) -> CodeRange {
        match self {
            Self::BadSpecialForm { loc, .. } | Self::UndefinedInLetrec { loc, .. } | Self::ArityMismatch { loc, .. } => {
                *loc
            }
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadSpecialForm { form, reason, loc } => write!(f, "bad `{form}` form at {loc}: {reason}"),
            Self::UndefinedInLetrec { name, loc } => {
                write!(f, "letrec binding `{name}` observed before initialization at {loc}")
            }
            Self::ArityMismatch { expected, got, loc } => {
                write!(f, "arity mismatch at {loc}: expected {expected}, got {got}")
            }
        }
    }
}

/// Runtime error kinds. `Aborted` is produced only by a hook returning
/// [`crate::tracer::HookAction::Abort`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay)]
pub enum RuntimeErrorKind {
    UnboundSymbol,
    BadArgument,
    ArityMismatch,
    BadType,
    StackOverflow,
    Aborted,
    UserError,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub message: String,
    pub loc: CodeRange,
}

impl RuntimeError {
    #[must_use]
    pub fn new(kind: RuntimeErrorKind, message: impl Into<String>, loc: CodeRange) -> Self {
        Self { kind, message: message.into(), loc }
    }

    #[must_use]
    pub fn unbound_symbol(name: &str, loc: CodeRange) -> Self {
        Self::new(RuntimeErrorKind::UnboundSymbol, format!("unbound symbol: {name}"), loc)
    }

    /// `index` is 1-based (the first argument is argument 1), matching how
    /// spec.md §8's failure scenarios report it.
    #[must_use]
    pub fn bad_argument(index: usize, expected: &str, got: &str, loc: CodeRange) -> Self {
        Self::new(
            RuntimeErrorKind::BadArgument,
            format!("bad argument #{index} ({expected} expected, got {got})"),
            loc,
        )
    }

    #[must_use]
    pub fn arity_mismatch(name: &str, expected: &str, got: usize, loc: CodeRange) -> Self {
        Self::new(
            RuntimeErrorKind::ArityMismatch,
            format!("{name}: bad number of arguments ({expected} expected, got {got})"),
            loc,
        )
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

pub type RunResult<T> = Result<T, RuntimeError>;

/// One frame of a captured traceback.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceFrame {
    pub filename: String,
    pub location: CodeRange,
    pub function_name: String,
    /// `true` for frames representing a native-call site; rendered as
    /// `<native>` when `function_name` is empty.
    pub is_native: bool,
}

impl fmt::Display for TraceFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_native && self.function_name.is_empty() {
            write!(f, "<native>")
        } else {
            write!(f, "{} in {} at {}", self.function_name, self.filename, self.location)
        }
    }
}

/// A fully-formed error ready to surface across the embedding boundary:
/// message, optional source location, optional chained inner error, and an
/// ordered traceback captured at the moment of failure.
#[derive(Debug, Clone, PartialEq)]
pub struct WispError {
    pub message: String,
    pub loc: Option<CodeRange>,
    pub runtime_kind: Option<RuntimeErrorKind>,
    pub inner: Option<Box<WispError>>,
    pub traceback: Vec<TraceFrame>,
}

impl WispError {
    #[must_use]
    pub fn from_lex(err: LexError) -> Self {
        Self { message: err.message.clone(), loc: Some(err.loc), runtime_kind: None, inner: None, traceback: vec![] }
    }

    #[must_use]
    pub fn from_parse(err: ParseError) -> Self {
        let loc = err.loc();
        let inner = if let ParseError::Lex(lex) = &err { Some(Box::new(Self::from_lex((**lex).clone()))) } else { None };
        Self { message: err.to_string(), loc: Some(loc), runtime_kind: None, inner, traceback: vec![] }
    }

    #[must_use]
    pub fn from_compile(err: CompileError) -> Self {
        Self { message: err.to_string(), loc: Some(err.loc()), runtime_kind: None, inner: None, traceback: vec![] }
    }

    #[must_use]
    pub fn from_runtime(err: RuntimeError, traceback: Vec<TraceFrame>) -> Self {
        Self {
            message: err.message.clone(),
            loc: Some(err.loc),
            runtime_kind: Some(err.kind),
            inner: None,
            traceback,
        }
    }
}

impl fmt::Display for WispError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "error: {}", self.message)?;
        for frame in &self.traceback {
            writeln!(f, "  at {frame}")?;
        }
        Ok(())
    }
}

impl std::error::Error for WispError {}
