use std::fmt;
use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
#[cfg(unix)]
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Error, ErrorKind, Result};

/// Byte stream to the daemon, one per call.
pub trait Stream: Read + Write + Send {
    fn shutdown(&mut self) -> Result<()>;
}

impl Stream for TcpStream {
    #[inline]
    fn shutdown(&mut self) -> Result<()> {
        TcpStream::shutdown(self, Shutdown::Both).map_err(crate::map_context!())?;
        Ok(())
    }
}

#[cfg(unix)]
impl Stream for UnixStream {
    #[inline]
    fn shutdown(&mut self) -> Result<()> {
        UnixStream::shutdown(self, Shutdown::Both).map_err(crate::map_context!())?;
        Ok(())
    }
}

/// Where the daemon's SCGI socket lives.
///
/// Parsed from `tcp:<host>:<port>`, `unix:<path>`, or a bare string, which
/// is a local socket when the path exists and a TCP address otherwise.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Address {
    Tcp(String),
    #[cfg(unix)]
    Unix(PathBuf),
}

impl Address {
    pub fn connect(&self) -> Result<Box<dyn Stream>> {
        match self {
            Address::Tcp(addr) => Ok(Box::new(
                TcpStream::connect(addr.as_str()).map_err(crate::map_context!())?,
            )),
            #[cfg(unix)]
            Address::Unix(path) => Ok(Box::new(
                UnixStream::connect(path).map_err(crate::map_context!())?,
            )),
        }
    }

    fn unix(path: &Path) -> Result<Self> {
        #[cfg(unix)]
        {
            Ok(Address::Unix(path.to_path_buf()))
        }
        #[cfg(not(unix))]
        {
            Err(crate::context!(ErrorKind::InvalidAddress(
                path.display().to_string()
            )))
        }
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Some(addr) = s.strip_prefix("tcp:") {
            if addr.is_empty() {
                return Err(crate::context!(ErrorKind::InvalidAddress(s.into())));
            }
            return Ok(Address::Tcp(addr.into()));
        }
        if let Some(path) = s.strip_prefix("unix:") {
            if path.is_empty() {
                return Err(crate::context!(ErrorKind::InvalidAddress(s.into())));
            }
            return Address::unix(Path::new(path));
        }
        if s.is_empty() {
            return Err(crate::context!(ErrorKind::InvalidAddress(s.into())));
        }
        if Path::new(s).exists() {
            return Address::unix(Path::new(s));
        }
        Ok(Address::Tcp(s.into()))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Address::Tcp(addr) => write!(f, "tcp:{}", addr),
            #[cfg(unix)]
            Address::Unix(path) => write!(f, "unix:{}", path.display()),
        }
    }
}
