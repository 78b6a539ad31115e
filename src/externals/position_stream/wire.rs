//! Frames exchanged with the position server: postcard-encoded, COBS
//! framed, each terminated by a zero byte.
//!
//! A session is `RegisterClient` -> `Registered`, then `Subscribe`
//! followed by an open-ended run of `Position` frames from the server.

use std::io::{self, BufRead, Write};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::position_sample::PositionSample;

pub const FRAME_DELIMITER: u8 = 0;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub info: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub info: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum Frame {
    RegisterClient(ClientInfo),
    Registered(ServerInfo),
    Subscribe(ClientInfo),
    Position(PositionSample),
}

#[derive(Error, Debug)]
pub enum WireError {
    #[error("Failed to move frame bytes. Error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to encode or decode frame. Error: {0}")]
    Codec(#[from] postcard::Error),

    #[error("Stream ended in the middle of a frame after {0} bytes.")]
    Truncated(usize),
}

impl WireError {
    /// True when a read gave up because of the socket read timeout rather
    /// than a broken stream.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            WireError::Io(e)
                if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
        )
    }
}

pub fn encode_frame(frame: &Frame) -> Result<Vec<u8>, WireError> {
    Ok(postcard::to_stdvec_cobs(frame)?)
}

pub fn write_frame<W: Write>(writer: &mut W, frame: &Frame) -> Result<(), WireError> {
    let bytes = encode_frame(frame)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Read one frame. Returns `Ok(None)` on a clean end of stream.
///
/// Bytes of an incomplete frame stay in `buffer` when the read fails (for
/// example on a read timeout), so the next call picks up where this one
/// stopped. Reuse the same buffer for the whole session.
pub fn read_frame<R: BufRead>(
    reader: &mut R,
    buffer: &mut Vec<u8>,
) -> Result<Option<Frame>, WireError> {
    let read = reader.read_until(FRAME_DELIMITER, buffer)?;
    if read == 0 && buffer.is_empty() {
        return Ok(None);
    }
    if buffer.last() != Some(&FRAME_DELIMITER) {
        let partial = buffer.len();
        buffer.clear();
        return Err(WireError::Truncated(partial));
    }

    let decoded = postcard::from_bytes_cobs::<Frame>(buffer.as_mut_slice());
    buffer.clear();
    Ok(Some(decoded?))
}
