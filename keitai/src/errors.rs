//! Definition of errors.

/// A specialized Result type for Keitai.
pub type Result<T, E = KeitaiError> = std::result::Result<T, E>;

/// The error type for Keitai.
#[derive(Debug, thiserror::Error)]
pub enum KeitaiError {
    /// The error variant for [`InvalidArgumentError`].
    #[error(transparent)]
    InvalidArgument(InvalidArgumentError),

    /// The error variant for [`InvalidFormatError`].
    #[error(transparent)]
    InvalidFormat(InvalidFormatError),

    /// A lexicon entry is malformed or refers to an undefined context id.
    #[error("MalformedEntry: line {line}: {msg}")]
    MalformedEntry {
        /// One-origin line number in the lexicon.
        line: usize,
        /// Error message.
        msg: String,
    },

    /// A line of the connection-cost definition is malformed.
    #[error("MalformedMatrix: line {line}: {msg}")]
    MalformedMatrix {
        /// One-origin line number in the definition.
        line: usize,
        /// Error message.
        msg: String,
    },

    /// A compiled artifact was produced by an incompatible version.
    #[error("IncompatibleDictionary: {0}")]
    IncompatibleDictionary(String),

    /// The lattice has no path from BOS to EOS.
    #[error("NoPath: no path reaches EOS in a sentence of {len} characters")]
    NoPath {
        /// Length of the sentence in characters.
        len: usize,
    },

    /// The training corpus contains no usable sentence.
    #[error("EmptyCorpus: the training corpus contains no usable sentence")]
    EmptyCorpus,

    /// The optimizer failed to make progress.
    #[error("Divergence: {0}")]
    Divergence(String),

    /// The error variant for [`TryFromIntError`](std::num::TryFromIntError).
    #[error(transparent)]
    TryFromInt(#[from] std::num::TryFromIntError),

    /// The error variant for [`ParseIntError`](std::num::ParseIntError).
    #[error(transparent)]
    ParseInt(#[from] std::num::ParseIntError),

    /// The error variant for [`ParseFloatError`](std::num::ParseFloatError).
    #[error(transparent)]
    ParseFloat(#[from] std::num::ParseFloatError),

    /// The error variant for [`DecodeError`](bincode::error::DecodeError).
    #[error(transparent)]
    BincodeDecode(#[from] bincode::error::DecodeError),

    /// The error variant for [`EncodeError`](bincode::error::EncodeError).
    #[error(transparent)]
    BincodeEncode(#[from] bincode::error::EncodeError),

    /// The error variant for [`std::io::Error`].
    #[error(transparent)]
    StdIo(#[from] std::io::Error),

    /// The error variant for [`PersistError`](tempfile::PersistError).
    #[error(transparent)]
    Persist(#[from] tempfile::PersistError),
}

impl KeitaiError {
    pub(crate) fn invalid_argument<S>(arg: &'static str, msg: S) -> Self
    where
        S: Into<String>,
    {
        Self::InvalidArgument(InvalidArgumentError {
            arg,
            msg: msg.into(),
        })
    }

    pub(crate) fn invalid_format<S>(arg: &'static str, msg: S) -> Self
    where
        S: Into<String>,
    {
        Self::InvalidFormat(InvalidFormatError {
            arg,
            msg: msg.into(),
        })
    }

    pub(crate) fn malformed_entry<S>(line: usize, msg: S) -> Self
    where
        S: Into<String>,
    {
        Self::MalformedEntry {
            line,
            msg: msg.into(),
        }
    }

    pub(crate) fn malformed_matrix<S>(line: usize, msg: S) -> Self
    where
        S: Into<String>,
    {
        Self::MalformedMatrix {
            line,
            msg: msg.into(),
        }
    }
}

/// Error used when the argument is invalid.
#[derive(Debug, thiserror::Error)]
#[error("InvalidArgumentError: {arg}: {msg}")]
pub struct InvalidArgumentError {
    /// Name of the argument.
    pub(crate) arg: &'static str,

    /// Error message.
    pub(crate) msg: String,
}

/// Error used when the input format is invalid.
#[derive(Debug, thiserror::Error)]
#[error("InvalidFormatError: {arg}: {msg}")]
pub struct InvalidFormatError {
    /// Name of the format.
    pub(crate) arg: &'static str,

    /// Error message.
    pub(crate) msg: String,
}
