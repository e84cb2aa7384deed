//! The crate's error taxonomy (`spec.md` §7).
//!
//! Local recoverable kinds (`Protocol`, `Parse`, `Sql`) leave the connection
//! usable for the next `execute`; fatal kinds (`Io`, `Timeout`, `Auth`,
//! `RedirectLoop`) mark it closed first. See [`Error::is_fatal`].

use std::fmt;

/// A list of `mapi:` redirect targets the caller must follow itself because
/// `follow_redirects` was disabled.
#[derive(Debug, Clone)]
pub struct RedirectList(pub Vec<String>);

impl fmt::Display for RedirectList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(", "))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Unrecoverable channel failure. Always fatal.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A read timed out. Always fatal.
    #[error("timed out waiting for the server")]
    Timeout,

    /// A malformed or unexpected line was seen. The reader flushes to the
    /// next prompt and reports one composite error; the connection remains
    /// usable.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A local parse failure within a single line, with a byte offset.
    #[error("parse error at offset {offset}: {message}")]
    Parse { message: String, offset: usize },

    /// Credentials rejected, or an unsupported protocol version / hash
    /// algorithm was negotiated. Fatal for the connection.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Non-followable redirects surfaced to the caller (`follow_redirects`
    /// is `false`).
    #[error("server requested a redirect that was not followed: {0}")]
    Redirected(RedirectList),

    /// The redirect TTL was exhausted.
    #[error("too many redirects")]
    RedirectLoop,

    /// A server-reported SQL error. The connection remains usable.
    #[error("{sqlstate}!{message}")]
    Sql { sqlstate: String, message: String },

    /// An operation was attempted on a connection that has been torn down.
    #[error("connection is closed")]
    Closed,

    /// A connection string or `ConnectOptions` value could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl Error {
    pub fn config(e: impl std::error::Error + Send + Sync + 'static) -> Self {
        Error::Config(Box::new(e))
    }

    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Error::Protocol(message.into())
    }

    pub(crate) fn parse(message: impl Into<String>, offset: usize) -> Self {
        Error::Parse {
            message: message.into(),
            offset,
        }
    }

    /// Whether this error kind always marks the connection closed (`spec.md`
    /// §7 propagation policy).
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Io(_) | Error::Timeout | Error::Auth(_) | Error::RedirectLoop
        )
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(e: std::str::Utf8Error) -> Self {
        Error::protocol(format!("invalid utf-8: {e}"))
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Error::config(e)
    }
}

/// Builds an [`Error::Protocol`], capturing the call site the way the
/// teacher's `err_protocol!` does.
macro_rules! protocol_err {
    ($($fmt_args:tt)*) => {
        $crate::error::Error::protocol(format!(
            "{} ({}:{})",
            format_args!($($fmt_args)*),
            file!(),
            line!(),
        ))
    };
}

/// Builds an [`Error::Parse`] carrying the given byte offset.
macro_rules! parse_err {
    ($offset:expr, $($fmt_args:tt)*) => {
        $crate::error::Error::parse(format!($($fmt_args)*), $offset)
    };
}

pub(crate) use parse_err;
pub(crate) use protocol_err;

pub type Result<T> = std::result::Result<T, Error>;
