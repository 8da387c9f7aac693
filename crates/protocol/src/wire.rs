//! Newline-delimited JSON framing for the daemon socket.
//!
//! Each query is one JSON document terminated by `\n`; each reply is one
//! line back. Reply frames are read with a hard size limit so a confused or
//! hostile peer cannot make the client buffer unbounded data.

use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Reply frames larger than this are treated as undecodable.
pub const MAX_REPLY_FRAME_BYTES: usize = 1024 * 1024;

pub type Result<T> = std::result::Result<T, WireError>;

#[derive(Error, Debug)]
pub enum WireError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("reply frame exceeds {limit} bytes")]
    FrameTooLarge { limit: usize },
}

/// Encode one query as a newline-terminated JSON frame.
pub fn encode_frame(query: &Value) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec(query)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Decode one reply frame into a JSON value.
pub fn decode_frame(bytes: &[u8]) -> Result<Value> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Read one newline-terminated frame, refusing oversized payloads.
///
/// Returns the frame without its terminator. A stream that ends before the
/// terminator yields whatever arrived; decoding decides whether that was a
/// complete document.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R, max_bytes: usize) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut tmp = [0u8; 1024];
    loop {
        let n = reader.read(&mut tmp).await?;
        if n == 0 {
            break;
        }

        if let Some(pos) = tmp[..n].iter().position(|b| *b == b'\n') {
            if out.len() + pos > max_bytes {
                return Err(WireError::FrameTooLarge { limit: max_bytes });
            }
            out.extend_from_slice(&tmp[..pos]);
            break;
        }

        if out.len() + n > max_bytes {
            return Err(WireError::FrameTooLarge { limit: max_bytes });
        }
        out.extend_from_slice(&tmp[..n]);
    }

    if out.last() == Some(&b'\r') {
        out.pop();
    }
    Ok(out)
}
