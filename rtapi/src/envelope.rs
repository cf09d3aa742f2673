//! SCGI-style framing used by the daemon's socket front end.
//!
//! Requests carry a netstring header block
//! `<len>:CONTENT_LENGTH\0<L>\0SCGI\01\0,` followed by the payload.
//! Replies come back either as bare markup or behind a CGI-style header
//! block (`Status`, `Content-Type`, `Content-Length`, blank line).

use std::io::{BufRead, BufReader, ErrorKind as IoErrorKind, Read};

use tracing::warn;

use crate::error::{ErrorKind, Result};

/// Frame a payload for the daemon.
pub fn encode(payload: &[u8]) -> Vec<u8> {
    let header = format!("CONTENT_LENGTH\0{}\0SCGI\01\0", payload.len());
    let prefix = format!("{}:{},", header.len(), header);
    let mut out = Vec::with_capacity(prefix.len() + payload.len());
    out.extend_from_slice(prefix.as_bytes());
    out.extend_from_slice(payload);
    out
}

/// Read a whole reply from `reader` and return the markup body.
///
/// Reads until end of stream. A declared `Content-Length` that the stream
/// does not fill is tolerated, the short body is returned as is.
pub fn read_body<R: Read>(reader: R) -> Result<Vec<u8>> {
    let mut br = BufReader::new(reader);

    loop {
        let first = match br.fill_buf().map_err(crate::map_context!())?.first() {
            Some(b) => *b,
            None => return Err(crate::context!(ErrorKind::Decode("response, got empty stream".into()))),
        };
        match first {
            b'<' => return read_to_end(br, Vec::new()),
            b' ' | b'\t' | b'\r' | b'\n' => br.consume(1),
            _ => break,
        }
    }

    let mut content_length = None;
    loop {
        let mut line = String::new();
        let n = br.read_line(&mut line).map_err(crate::map_context!())?;
        if n == 0 {
            return Err(crate::context!(ErrorKind::Decode(
                "blank line ending the response header".into()
            )));
        }
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            break;
        }
        if let Some((key, value)) = line.split_once(':') {
            if key.trim().eq_ignore_ascii_case("content-length") {
                let value = value.trim();
                let len = value.parse::<usize>().map_err(|e| {
                    crate::context!(
                        e,
                        ErrorKind::Decode(format!("Content-Length, found '{}'", value))
                    )
                })?;
                content_length = Some(len);
            }
        }
    }

    match content_length {
        Some(len) => {
            // the declared length is untrusted, take() bounds the read
            let mut body = Vec::new();
            let read = (&mut br)
                .take(len as u64)
                .read_to_end(&mut body)
                .map_err(crate::map_context!())?;
            if read < len {
                warn!(declared = len, read, "response shorter than its Content-Length");
                return Ok(body);
            }
            read_to_end(br, body)
        }
        None => read_to_end(br, Vec::new()),
    }
}

fn read_to_end<R: Read>(mut br: BufReader<R>, mut body: Vec<u8>) -> Result<Vec<u8>> {
    match br.read_to_end(&mut body) {
        Ok(_) => Ok(body),
        // some daemon builds reset the socket right after the last byte
        Err(e) if e.kind() == IoErrorKind::ConnectionReset && !body.is_empty() => Ok(body),
        Err(e) => {
            let map = crate::map_context!();
            Err(map(e))
        }
    }
}
