// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire framing for the IPC protocol.
//!
//! Each packet is a 4-byte big-endian protocol version, a 4-byte
//! big-endian payload length, then the payload bytes (UTF-8 JSON-RPC).
//! A version mismatch aborts the session.

use thiserror::Error;

/// Current framing version.
pub const PROTOCOL_VERSION: u32 = 1;

/// Maximum payload size (200 MB)
pub const MAX_MESSAGE_SIZE: usize = 200 * 1024 * 1024;

/// Protocol errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Protocol version mismatch: peer sent {got}, expected {PROTOCOL_VERSION}")]
    VersionMismatch { got: u32 },
}

/// Read one framed packet from an async reader.
pub async fn read_packet<R: tokio::io::AsyncReadExt + Unpin>(
    reader: &mut R,
) -> Result<Vec<u8>, ProtocolError> {
    let mut header = [0u8; 8];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(ProtocolError::ConnectionClosed);
        }
        Err(e) => return Err(ProtocolError::Io(e)),
    }

    let version = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
    if version != PROTOCOL_VERSION {
        return Err(ProtocolError::VersionMismatch { got: version });
    }

    let len = u32::from_be_bytes([header[4], header[5], header[6], header[7]]) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE,
        });
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(buf)
}

/// Write one framed packet to an async writer.
pub async fn write_packet<W: tokio::io::AsyncWriteExt + Unpin>(
    writer: &mut W,
    data: &[u8],
) -> Result<(), ProtocolError> {
    let len = data.len();
    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE,
        });
    }

    writer.write_all(&PROTOCOL_VERSION.to_be_bytes()).await?;
    writer.write_all(&(len as u32).to_be_bytes()).await?;
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}

/// Serialize a JSON value and frame it.
pub async fn write_json<W: tokio::io::AsyncWriteExt + Unpin>(
    writer: &mut W,
    value: &serde_json::Value,
) -> Result<(), ProtocolError> {
    let bytes = serde_json::to_vec(value)?;
    write_packet(writer, &bytes).await
}

#[cfg(test)]
#[path = "rpc_wire_tests.rs"]
mod tests;
