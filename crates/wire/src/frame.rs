// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Frame codec: 4-byte big-endian length prefix + JSON payload.

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Frames larger than this are rejected rather than risk an unbounded
/// allocation from a malformed length prefix.
const MAX_FRAME_LEN: u32 = 64 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("connection closed")]
    ConnectionClosed,

    #[error("frame exceeds maximum size ({0} bytes)")]
    FrameTooLarge(u32),

    #[error("malformed JSON frame: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("timed out waiting for frame")]
    Timeout,
}

/// Write one length-prefixed JSON frame.
pub async fn write_frame<W, T>(writer: &mut W, value: &T) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let payload = serde_json::to_vec(value)?;
    let len = u32::try_from(payload.len()).map_err(|_| ProtocolError::FrameTooLarge(u32::MAX))?;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one length-prefixed JSON frame. Returns `ConnectionClosed` on a
/// clean EOF before any bytes of the length prefix arrive.
pub async fn read_frame<R, T>(reader: &mut R) -> Result<T, ProtocolError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(ProtocolError::ConnectionClosed)
        }
        Err(e) => return Err(ProtocolError::Io(e)),
    }
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge(len));
    }
    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).await?;
    Ok(serde_json::from_slice(&payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        a: u32,
        b: String,
    }

    #[tokio::test]
    async fn round_trips_a_frame() {
        let sample = Sample { a: 7, b: "hi".into() };
        let mut buf = Vec::new();
        write_frame(&mut buf, &sample).await.unwrap();

        let mut cursor = std::io::Cursor::new(buf);
        let decoded: Sample = read_frame(&mut cursor).await.unwrap();
        assert_eq!(decoded, sample);
    }

    #[tokio::test]
    async fn empty_stream_is_connection_closed() {
        let mut cursor = std::io::Cursor::new(Vec::<u8>::new());
        let err = read_frame::<_, Sample>(&mut cursor).await.unwrap_err();
        assert!(matches!(err, ProtocolError::ConnectionClosed));
    }

    #[tokio::test]
    async fn oversized_length_prefix_is_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(MAX_FRAME_LEN + 1).to_be_bytes());
        let mut cursor = std::io::Cursor::new(buf);
        let err = read_frame::<_, Sample>(&mut cursor).await.unwrap_err();
        assert!(matches!(err, ProtocolError::FrameTooLarge(_)));
    }
}
