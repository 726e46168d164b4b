//! Errors generated by the compiler.
use thiserror::Error as ThisError;

/// Convenience wrapper to represent success or a meaningful compiler error.
pub type SeqResult<T> = std::result::Result<T, Error>;

/// Errors raised while building, linking or emitting a program. Everything
/// except [Error::Io] is detected before any output is produced.
#[derive(ThisError, Debug)]
pub enum Error {
    /// Two sequences, registers, ports or bins claim the same name.
    #[error("naming conflict: {0}")]
    NamingConflict(String),
    /// A named register, sequence or bin could not be resolved.
    #[error("not found: {0}")]
    NotFound(String),
    /// A signal does not have the width its use requires.
    #[error("width mismatch: {0}")]
    WidthMismatch(String),
    /// An argument has a form or value the node cannot accept.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    /// A node needs a register that its bin does not own.
    #[error("missing resource: {0}")]
    MissingResource(String),
    /// The textual description could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Misc(String),
}

impl Error {
    pub fn naming_conflict<S: ToString>(msg: S) -> Self {
        Error::NamingConflict(msg.to_string())
    }

    pub fn not_found<S: ToString>(msg: S) -> Self {
        Error::NotFound(msg.to_string())
    }

    pub fn width_mismatch<S: ToString>(msg: S) -> Self {
        Error::WidthMismatch(msg.to_string())
    }

    pub fn invalid_config<S: ToString>(msg: S) -> Self {
        Error::InvalidConfiguration(msg.to_string())
    }

    pub fn missing_resource<S: ToString>(msg: S) -> Self {
        Error::MissingResource(msg.to_string())
    }

    pub fn parse_error<S: ToString>(msg: S) -> Self {
        Error::Parse(msg.to_string())
    }

    pub fn misc<S: ToString>(msg: S) -> Self {
        Error::Misc(msg.to_string())
    }

    /// Prefix the message with the name of the thing being built when the
    /// error surfaced.
    pub fn within<S: std::fmt::Display>(self, ctx: S) -> Self {
        let wrap = |m: String| format!("{ctx}: {m}");
        match self {
            Error::NamingConflict(m) => Error::NamingConflict(wrap(m)),
            Error::NotFound(m) => Error::NotFound(wrap(m)),
            Error::WidthMismatch(m) => Error::WidthMismatch(wrap(m)),
            Error::InvalidConfiguration(m) => {
                Error::InvalidConfiguration(wrap(m))
            }
            Error::MissingResource(m) => Error::MissingResource(wrap(m)),
            Error::Parse(m) => Error::Parse(wrap(m)),
            Error::Misc(m) => Error::Misc(wrap(m)),
            e @ Error::Io(_) => e,
        }
    }
}

impl From<std::fmt::Error> for Error {
    fn from(_err: std::fmt::Error) -> Self {
        Error::misc("failed to format output")
    }
}
