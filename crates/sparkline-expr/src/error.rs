//! Error types for compiling and evaluating condition expressions.

use thiserror::Error;

/// Errors raised while turning source text into an [`Expression`](crate::Expression).
///
/// Every variant that can be pinned to a location carries the byte offset
/// into the source string.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    /// The source contained only whitespace.
    #[error("expression is empty")]
    Empty,
    /// A character that does not start any token.
    #[error("unexpected character {found:?} at offset {pos}")]
    UnexpectedChar {
        /// The offending character
        found: char,
        /// Byte offset
        pos: usize,
    },
    /// A string literal ran to the end of the input.
    #[error("unterminated string literal starting at offset {pos}")]
    UnterminatedString {
        /// Byte offset of the opening quote
        pos: usize,
    },
    /// A numeric literal that does not fit the number types.
    #[error("invalid number literal {text:?} at offset {pos}")]
    InvalidNumber {
        /// The literal text
        text: String,
        /// Byte offset
        pos: usize,
    },
    /// The parser found a token it cannot use here.
    #[error("unexpected {found} at offset {pos}, expected {expected}")]
    UnexpectedToken {
        /// Description of the token found
        found: String,
        /// What the parser was looking for
        expected: &'static str,
        /// Byte offset
        pos: usize,
    },
    /// A call to a function outside the builtin whitelist.
    #[error("unknown function {name:?} at offset {pos}")]
    UnknownFunction {
        /// Name used in the call
        name: String,
        /// Byte offset
        pos: usize,
    },
    /// A call whose callee is not a bare builtin name (e.g. `packet.foo()`).
    #[error("only builtin functions can be called (offset {pos})")]
    NotCallable {
        /// Byte offset of the opening parenthesis
        pos: usize,
    },
    /// A root name outside the set the embedder allows.
    #[error("name {name:?} is not available in conditions")]
    UndefinedName {
        /// The offending name
        name: String,
    },
    /// Nesting exceeded the parser's recursion limit.
    #[error("expression nests deeper than {limit} levels")]
    TooDeep {
        /// The configured limit
        limit: usize,
    },
}

/// Errors raised while evaluating a compiled expression against a scope.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// A root name that the scope does not bind.
    #[error("name {0:?} is not defined")]
    UnknownName(String),
    /// Attribute lookup on a value without that attribute.
    #[error("{on} has no attribute {attr:?}")]
    MissingAttribute {
        /// Attribute name
        attr: String,
        /// Type name of the receiver
        on: &'static str,
    },
    /// Index outside the bounds of a sequence.
    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange {
        /// Requested index
        index: i64,
        /// Sequence length
        len: usize,
    },
    /// A key missing from a mapping.
    #[error("key {0:?} not found")]
    MissingKey(String),
    /// A binary operator applied to incompatible operands.
    #[error("unsupported operand types for {op}: {lhs} and {rhs}")]
    TypeMismatch {
        /// Operator symbol
        op: &'static str,
        /// Left operand type name
        lhs: &'static str,
        /// Right operand type name
        rhs: &'static str,
    },
    /// A unary operator or builtin applied to an unsupported type.
    #[error("bad operand type for {op}: {ty}")]
    BadOperand {
        /// Operator symbol or function name
        op: &'static str,
        /// Operand type name
        ty: &'static str,
    },
    /// Division or modulo by zero.
    #[error("division by zero")]
    DivisionByZero,
    /// A builtin called with the wrong number of arguments.
    #[error("{func}() takes {expected} arguments ({got} given)")]
    Arity {
        /// Builtin name
        func: &'static str,
        /// Human readable arity
        expected: &'static str,
        /// Number of arguments supplied
        got: usize,
    },
    /// A builtin rejected an argument value.
    #[error("{func}(): {reason}")]
    InvalidArgument {
        /// Builtin name
        func: &'static str,
        /// Explanation
        reason: String,
    },
}
