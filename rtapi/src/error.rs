use std::io;
use std::path::PathBuf;

#[derive(Clone, PartialEq, Debug, thiserror::Error)]
pub enum ErrorKind {
    #[error("Transport error: {0:?}")]
    Transport(io::ErrorKind),
    #[error("Connection closed")]
    ConnectionClosed,
    #[error("Decode error: expected {0}")]
    Decode(String),
    #[error("Shape error in {what}: expected {expected} values, got {actual}")]
    Shape {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    #[error("Value out of range: {0}")]
    Range(i64),
    #[error("No torrent with hash: {0}")]
    NotFound(String),
    #[error("Daemon fault {code}: {message}")]
    Fault { code: i64, message: String },
    #[error("Invalid daemon address: '{0}'")]
    InvalidAddress(String),
    #[error("Failed to remove data at '{}'", .0.display())]
    RemoveData(PathBuf),
}

impl From<&io::Error> for ErrorKind {
    fn from(e: &io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset => ErrorKind::ConnectionClosed,
            kind => ErrorKind::Transport(kind),
        }
    }
}

pub struct Error(
    pub ErrorKind,
    pub Option<Box<dyn std::error::Error + 'static + Send + Sync>>,
    pub Option<&'static str>,
);

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        &self.0
    }
}

impl From<ErrorKind> for Error {
    fn from(e: ErrorKind) -> Self {
        Error(e, None, None)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error(ErrorKind::from(&e), Some(Box::from(e)), None)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.1
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        use std::error::Error as StdError;

        if let Some(ref o) = self.2 {
            std::fmt::Display::fmt(o, f)?;
        }

        std::fmt::Debug::fmt(&self.0, f)?;
        if let Some(e) = self.source() {
            std::fmt::Display::fmt("\nCaused by:\n", f)?;
            std::fmt::Debug::fmt(&e, f)?;
        }
        Ok(())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Builds an [`Error`] carrying the `file:line` of the call site.
#[macro_export]
macro_rules! context {
    ( $k:expr ) => {{
        $crate::error::Error($k, None, Some(concat!(file!(), ":", line!(), ": ")))
    }};
    ( None, $k:expr ) => {{
        $crate::error::Error($k, None, Some(concat!(file!(), ":", line!(), ": ")))
    }};
    ( $e:expr, $k:expr ) => {{
        $crate::error::Error(
            $k,
            Some(Box::from($e)),
            Some(concat!(file!(), ":", line!(), ": ")),
        )
    }};
}

/// Closure for `map_err` turning an `io::Error` into an [`Error`] with location context.
#[macro_export]
macro_rules! map_context {
    () => {
        |e: ::std::io::Error| {
            let kind = $crate::error::ErrorKind::from(&e);
            $crate::context!(e, kind)
        }
    };
}
