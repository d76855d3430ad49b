use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// This enum covers the recoverable error conditions that can occur while parsing source
/// files, evaluating argument expressions, accessing typed values and transferring entity
/// snapshots. Each variant provides specific context about the failure mode so callers can
/// distinguish lookup failures from malformed data.
///
/// # Error Categories
///
/// ## Lookup Failures
/// - [`Error::LabelNotFound`] - A named jump target does not exist in the project label table
/// - [`Error::ReferenceNotFound`] - A named value reference does not exist in a group
///
/// Lookup failures are recoverable and deliberately distinct from malformed-data failures:
/// an editor typically reacts to them by showing a placeholder rather than aborting.
///
/// ## Malformed-Data Failures
/// - [`Error::Malformed`] - Structurally invalid source data (wrong arity, missing arguments,
///   unexpected continuation)
/// - [`Error::Eval`] - An argument expression could not be evaluated
///
/// ## Storage Failures
/// - [`Error::OutOfBounds`] - Attempted to read or write beyond a stream boundary
/// - [`Error::FileError`] - Filesystem I/O errors while loading sources or streams
///
/// Internal-consistency failures (mutating a detached component, mutating tracked state
/// outside a transaction boundary, restoring a snapshot whose shape does not match the
/// live entity) are *not* represented here: they are programming errors and fail fast
/// with a panic, never with a recoverable error.
#[derive(Error, Debug)]
pub enum Error {
    /// A named jump target was not found in the project label table.
    ///
    /// This is a recoverable lookup failure, distinct from [`Error::Malformed`]:
    /// the referencing argument itself is well formed, the target simply is not
    /// (or not yet) defined anywhere in the project's source files.
    #[error("Label not found - {0}")]
    LabelNotFound(String),

    /// A named value reference was not found in a value reference group.
    ///
    /// Raised by name-indexed group access when no member carries the requested
    /// name. Recoverable; sibling members are unaffected.
    #[error("Value reference not found - {0}")]
    ReferenceNotFound(String),

    /// The source data is structurally invalid and could not be interpreted.
    ///
    /// This error indicates that a file or component does not conform to the
    /// expected shape, such as a macro invocation with the wrong number of
    /// arguments. The error includes the source location where the malformation
    /// was detected for debugging purposes.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An argument expression could not be evaluated.
    ///
    /// Covers malformed numeric literals, unknown identifiers, unbalanced
    /// parentheses and arithmetic failures (such as division by zero) inside
    /// the project expression evaluator.
    #[error("Evaluation failed - {0}")]
    Eval(String),

    /// An out of bound access was attempted on a stream storage.
    ///
    /// This error occurs when a byte or word read/write would cross the end of
    /// the backing buffer. It is a safety check that keeps slightly invalid
    /// offsets from corrupting unrelated data.
    #[error("Out of bound stream access would have occurred!")]
    OutOfBounds,

    /// File I/O error.
    ///
    /// Wraps standard I/O errors that can occur while reading source files or
    /// stream storage from disk.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Generic error for miscellaneous failures.
    ///
    /// Used for errors that don't fit into other categories or for wrapping
    /// external failures with additional context.
    #[error("{0}")]
    Error(String),
}
