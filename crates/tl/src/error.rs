//! Error types for the TL runtime.
//!
//! Every fallible runtime operation returns [`Result`]. Lookup misses are
//! not errors: they come back as `Ok(None)`.

use std::fmt;
use tl_mem::{AllocError, HtError};

/// What the reader objected to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// A byte that cannot start or continue any token here.
    UnexpectedChar(u8),
    /// `)` with no open list.
    StrayCloseParen,
    /// Input ended inside a list.
    UnterminatedList,
    /// Input ended inside a string.
    UnterminatedToken,
    /// A second `.` in a number.
    MultipleDecimalPoints,
    /// A number that does not fit, or ends in `.`.
    InvalidNumber,
    /// A digit run running into identifier characters, or a symbol segment
    /// starting with a digit.
    DigitLedSymbol,
    /// `..` inside a symbol.
    SymbolDoubleDot,
    /// A symbol ending in `.`.
    SymbolTrailingDot,
    /// `.` not followed by whitespace.
    StrayDot,
    /// Tail specifier at top level.
    TailOutsideList,
    /// Tail specifier before any element.
    TailWithoutHead,
    /// A second tail specifier in the same list.
    TailTwice,
    /// `)` right after a tail specifier.
    MissingTailValue,
    /// A value after the tail value.
    TokenAfterTail,
    /// `#` followed by something other than `true`, `false` or `nil`.
    UnknownLiteral,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseErrorKind::UnexpectedChar(b) if b.is_ascii_graphic() => {
                write!(f, "unexpected character '{}'", *b as char)
            }
            ParseErrorKind::UnexpectedChar(b) => write!(f, "unexpected byte {b:#04x}"),
            ParseErrorKind::StrayCloseParen => write!(f, "')' without an open list"),
            ParseErrorKind::UnterminatedList => write!(f, "unterminated list"),
            ParseErrorKind::UnterminatedToken => write!(f, "unterminated string"),
            ParseErrorKind::MultipleDecimalPoints => write!(f, "number has more than one decimal point"),
            ParseErrorKind::InvalidNumber => write!(f, "malformed number"),
            ParseErrorKind::DigitLedSymbol => write!(f, "identifier may not start with a digit"),
            ParseErrorKind::SymbolDoubleDot => write!(f, "'..' in symbol"),
            ParseErrorKind::SymbolTrailingDot => write!(f, "symbol ends with '.'"),
            ParseErrorKind::StrayDot => write!(f, "'.' must be followed by whitespace"),
            ParseErrorKind::TailOutsideList => write!(f, "tail specifier outside a list"),
            ParseErrorKind::TailWithoutHead => write!(f, "tail specifier before the first element"),
            ParseErrorKind::TailTwice => write!(f, "list already has a tail specifier"),
            ParseErrorKind::MissingTailValue => write!(f, "tail specifier without a value"),
            ParseErrorKind::TokenAfterTail => write!(f, "value after the tail value"),
            ParseErrorKind::UnknownLiteral => write!(f, "unknown '#' literal"),
        }
    }
}

/// A grammar violation and the byte offset it was detected at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseError {
    /// What went wrong.
    pub kind: ParseErrorKind,
    /// Offset into the input, relative to the start of the read.
    pub offset: usize,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at byte {}", self.kind, self.offset)
    }
}

impl std::error::Error for ParseError {}

/// Errors that can occur in the TL runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// The allocator refused a request.
    OutOfMemory(AllocError),

    /// Malformed reader input.
    Parse(ParseError),

    /// A dotted symbol used where one identifier is required.
    MultipartKey,

    /// A value of a type that cannot be hashed or compared as a key.
    Unkeyable {
        /// Type name of the offending value.
        type_name: &'static str,
    },

    /// Push onto a full evaluation stack.
    StackOverflow {
        /// Fixed capacity of the stack.
        capacity: usize,
    },

    /// Pop or peek on an empty evaluation stack.
    StackUnderflow,

    /// `set` of a name bound nowhere in the environment chain.
    Unbound {
        /// The identifier.
        name: String,
    },

    /// `set` of a key absent from a table.
    KeyNotFound,

    /// A handle naming a freed or foreign object.
    InvalidHandle,

    /// A value with no evaluation rule.
    NotEvaluable {
        /// Type name of the value.
        type_name: &'static str,
    },

    /// Evaluation the installed evaluator does not implement.
    Unsupported,

    /// A value of the wrong type was supplied.
    TypeMismatch {
        /// Type name that was required.
        expected: &'static str,
        /// Type name that was found.
        found: &'static str,
    },

    /// A symbol built from empty or dotted segments.
    InvalidSymbol {
        /// The offending text.
        text: String,
    },

    /// A configuration value out of range.
    InvalidConfig(String),

    /// A hash table parameter error.
    HashTable(HtError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::OutOfMemory(err) => write!(f, "Out of memory: {} bytes of {}", err.size, err.kind),
            Error::Parse(err) => write!(f, "Parse error: {err}"),
            Error::MultipartKey => write!(f, "Multipart symbol cannot be used as a key"),
            Error::Unkeyable { type_name } => write!(f, "Values of type {type_name} cannot be keys"),
            Error::StackOverflow { capacity } => {
                write!(f, "Stack overflow: all {capacity} slots in use")
            }
            Error::StackUnderflow => write!(f, "Stack underflow"),
            Error::Unbound { name } => write!(f, "Unbound identifier '{name}'"),
            Error::KeyNotFound => write!(f, "Key not found"),
            Error::InvalidHandle => write!(f, "Invalid object handle"),
            Error::NotEvaluable { type_name } => write!(f, "Cannot evaluate a {type_name}"),
            Error::Unsupported => write!(f, "Evaluation not supported by the installed evaluator"),
            Error::TypeMismatch { expected, found } => {
                write!(f, "Type mismatch: expected {expected}, found {found}")
            }
            Error::InvalidSymbol { text } => write!(f, "Invalid symbol '{text}'"),
            Error::InvalidConfig(msg) => write!(f, "Invalid configuration: {msg}"),
            Error::HashTable(err) => write!(f, "Hash table: {err}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<AllocError> for Error {
    fn from(err: AllocError) -> Self {
        Error::OutOfMemory(err)
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Error::Parse(err)
    }
}

impl From<HtError> for Error {
    fn from(err: HtError) -> Self {
        match err {
            HtError::OutOfMemory(err) => Error::OutOfMemory(err),
            other => Error::HashTable(other),
        }
    }
}

/// Result type for TL runtime operations.
pub type Result<T> = std::result::Result<T, Error>;
