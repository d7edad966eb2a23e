use thiserror::Error;

use crate::metadata::{tables::CodedIndexType, token::Token};

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
/// The variants follow the failure taxonomy of the build and read paths. None of them are
/// transient: reading and building are deterministic transformations, so an error is final and
/// retrying the same operation yields the same error.
///
/// # Error Categories
///
/// ## Read path
/// - [`Error::Malformed`] - Corrupted metadata: bad coded indices, impossible row counts,
///   invalid headers. Carries the source location that detected it.
/// - [`Error::OutOfBounds`] - A read would have run past the end of the input
/// - [`Error::NotSupported`] - Input uses a format feature this crate does not model
/// - [`Error::Empty`] - Empty input provided
///
/// ## Build path
/// - [`Error::Precondition`] - The caller violated a documented precondition
/// - [`Error::MemberNotImported`] - A handle belongs to a different image
/// - [`Error::UnsupportedReference`] - A token is not a member of the coded index group it is
///   being encoded into
/// - [`Error::BufferFinished`] - The build context was already finalized
///
/// ## I/O and External Errors
/// - [`Error::FileError`] - Filesystem I/O errors
/// - [`Error::GoblinErr`] - PE parsing errors from the goblin crate
///
/// # Examples
///
/// ```rust
/// use dotemit::{Error, metadata::streams::TablesStream};
///
/// match TablesStream::read(&[0u8; 4]) {
///     Err(Error::OutOfBounds) => println!("truncated tables stream"),
///     Err(Error::Malformed { message, .. }) => println!("corrupted: {message}"),
///     Err(other) => println!("other error: {other}"),
///     Ok(_) => unreachable!(),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The metadata is damaged or inconsistent.
    ///
    /// Produced through `malformed_error!`, which records where in this crate the problem was
    /// detected.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// Description of the problem, including table kind, row and offset where known
        message: String,
        /// Source file that detected the problem
        file: &'static str,
        /// Source line that detected the problem
        line: u32,
    },

    /// An attempted read would have gone past the end of the data.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// The input uses a feature that is not supported.
    #[error("This file type is not supported")]
    NotSupported,

    /// The provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// A caller supplied invalid input or invoked an operation out of order.
    ///
    /// Examples are strings with interior NUL bytes, blobs longer than the compressed length
    /// codec can describe, or asking for the token of a definition before the type batch has
    /// been emitted.
    #[error("Precondition violated - {0}")]
    Precondition(String),

    /// A definition or reference handle does not belong to the image under construction.
    ///
    /// The offending member is described so the caller can report it.
    #[error("Member is not imported into the image under construction - {member}")]
    MemberNotImported {
        /// Debug description of the foreign handle
        member: String,
    },

    /// A token was passed to a coded index group that does not contain its table.
    #[error("Token {token} can not be encoded as {coded_index:?}")]
    UnsupportedReference {
        /// The coded index group that rejected the token
        coded_index: CodedIndexType,
        /// The rejected token
        token: Token,
    },

    /// The build context was finalized; no rows or heap entries can be added anymore.
    #[error("The metadata buffer has already been finished")]
    BufferFinished,

    /// Filesystem I/O failure.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// PE parsing failure reported by goblin.
    #[error("{0}")]
    GoblinErr(#[from] goblin::error::Error),
}
