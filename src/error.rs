//! Error types for the precinct engine.
//!
//! Registry construction fails fast on bad patterns and bad configuration;
//! everything that can be recovered locally (a panicking rule, a conflicting
//! edit, a failed correction pass) is recorded in diagnostics or result
//! values instead of being raised here.

use thiserror::Error;

/// A type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or driving the engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed pattern source at compile time.
    #[error("pattern syntax error at byte {offset}: {message}")]
    PatternSyntax {
        /// Byte offset into the pattern source where compilation failed.
        offset: usize,
        /// Description of the problem.
        message: String,
    },

    /// Configuration references a rule id no registered rule carries.
    #[error("configuration references unknown rule '{rule_id}'")]
    UnknownRule { rule_id: String },

    /// Configuration sets an option the named rule does not declare.
    #[error("rule '{rule_id}' has no option named '{option}'")]
    UnknownOption { rule_id: String, option: String },

    /// Configuration toggles a department no registered rule belongs to.
    #[error("configuration references unknown department '{department}'")]
    UnknownDepartment { department: String },

    /// Two rules with the same id were handed to the registry.
    #[error("duplicate rule id '{rule_id}'")]
    DuplicateRule { rule_id: String },

    /// A tree handed to [`crate::tree::TreeBuilder::finish`] violates the
    /// containment invariant (a child span escapes its parent's span).
    #[error("malformed tree: {message}")]
    MalformedTree { message: String },

    /// The caller-provided parser rejected a source text.
    #[error("parse failure: {0}")]
    Parse(#[from] ParseFailure),

    /// Analysis was cancelled via a [`crate::dispatch::CancelToken`].
    #[error("analysis cancelled")]
    Cancelled,
}

impl Error {
    /// Create a pattern syntax error at the given offset.
    pub fn pattern(offset: usize, message: impl Into<String>) -> Self {
        Self::PatternSyntax {
            offset,
            message: message.into(),
        }
    }

    /// Create a malformed-tree error.
    pub fn malformed_tree(message: impl Into<String>) -> Self {
        Self::MalformedTree {
            message: message.into(),
        }
    }
}

/// Error returned by a [`crate::tree::Parser`] when source text does not
/// parse. Carries enough context for the correction engine to report why a
/// pass was rolled back.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ParseFailure {
    /// Description of the parse error.
    pub message: String,
    /// Byte offset of the error in the source, when the parser knows it.
    pub offset: Option<usize>,
}

impl ParseFailure {
    /// Create a parse failure without position information.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            offset: None,
        }
    }

    /// Create a parse failure at a known byte offset.
    pub fn at(offset: usize, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            offset: Some(offset),
        }
    }
}
