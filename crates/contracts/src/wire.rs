//! Wire encoding
//!
//! Payloads are bincode; transports use `u32` big-endian length prefixes.
//! Single frames carry requests, replies and archived timeslices; multi-part
//! frames (part count, then length-prefixed parts) carry side-channel messages.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{ContractError, Timeslice};

/// Request asking for the index of the first ingested timeslice
pub const FIRST_INDEX_REQUEST: &str = "SendFirstTimesliceIndex";

/// Command sent when a downstream send failed
pub const STOP_COMMAND: &str = "STOP";

/// Largest accepted frame or part (1 GiB)
pub const MAX_FRAME_LEN: u32 = 1 << 30;

/// Largest accepted number of parts in one multi-part message
pub const MAX_PARTS: u32 = 1024;

/// `EOF <lastIndex> <count>`
pub fn eof_command(last_index: u64, count: u64) -> String {
    format!("EOF {} {}", last_index, count)
}

/// Encode any serializable value
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Bytes, ContractError> {
    Ok(Bytes::from(bincode::serialize(value)?))
}

/// Decode any deserializable value
pub fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T, ContractError> {
    Ok(bincode::deserialize(payload)?)
}

pub fn encode_timeslice(ts: &Timeslice) -> Result<Bytes, ContractError> {
    encode(ts)
}

pub fn decode_timeslice(payload: &[u8]) -> Result<Timeslice, ContractError> {
    decode(payload)
}

/// Encode a string payload (first index reply, commands)
pub fn encode_string(text: &str) -> Result<Bytes, ContractError> {
    encode(text)
}

pub fn decode_string(payload: &[u8]) -> Result<String, ContractError> {
    decode(payload)
}

/// Encode a missed-index report
pub fn encode_indices(indices: &[u64]) -> Result<Bytes, ContractError> {
    encode(indices)
}

pub fn decode_indices(payload: &[u8]) -> Result<Vec<u64>, ContractError> {
    decode(payload)
}

/// Read a `u32` big-endian prefix
///
/// `Ok(None)` only on a clean end of stream before the first byte; a stream
/// ending inside the prefix is a codec error.
async fn read_prefix<R>(reader: &mut R) -> Result<Option<u32>, ContractError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; 4];
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]).await? {
            0 if filled == 0 => return Ok(None),
            0 => {
                return Err(ContractError::codec(format!(
                    "stream truncated inside a length prefix ({filled} of 4 bytes)"
                )))
            }
            n => filled += n,
        }
    }
    Ok(Some(u32::from_be_bytes(buf)))
}

/// Read one length-prefixed frame
///
/// Returns `Ok(None)` when the stream ends before a new frame starts.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Bytes>, ContractError>
where
    R: AsyncRead + Unpin,
{
    let Some(len) = read_prefix(reader).await? else {
        return Ok(None);
    };
    read_body(reader, len).await.map(Some)
}

/// Write one length-prefixed frame and flush
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), ContractError>
where
    W: AsyncWrite + Unpin,
{
    let len = frame_len(payload.len())?;
    writer.write_u32(len).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one multi-part message
///
/// Returns `Ok(None)` when the stream ends before a new message starts.
pub async fn read_multipart<R>(reader: &mut R) -> Result<Option<Vec<Bytes>>, ContractError>
where
    R: AsyncRead + Unpin,
{
    let Some(count) = read_prefix(reader).await? else {
        return Ok(None);
    };
    if count > MAX_PARTS {
        return Err(ContractError::codec(format!(
            "multi-part message with {} parts exceeds limit {}",
            count, MAX_PARTS
        )));
    }

    let mut parts = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let len = reader.read_u32().await?;
        parts.push(read_body(reader, len).await?);
    }
    Ok(Some(parts))
}

/// Write one multi-part message and flush
pub async fn write_multipart<W>(writer: &mut W, parts: &[Bytes]) -> Result<(), ContractError>
where
    W: AsyncWrite + Unpin,
{
    let count = u32::try_from(parts.len())
        .ok()
        .filter(|&c| c <= MAX_PARTS)
        .ok_or_else(|| ContractError::codec(format!("too many parts: {}", parts.len())))?;

    writer.write_u32(count).await?;
    for part in parts {
        writer.write_u32(frame_len(part.len())?).await?;
        writer.write_all(part).await?;
    }
    writer.flush().await?;
    Ok(())
}

async fn read_body<R>(reader: &mut R, len: u32) -> Result<Bytes, ContractError>
where
    R: AsyncRead + Unpin,
{
    if len > MAX_FRAME_LEN {
        return Err(ContractError::codec(format!(
            "frame of {} bytes exceeds limit {}",
            len, MAX_FRAME_LEN
        )));
    }
    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf).await?;
    Ok(Bytes::from(buf))
}

fn frame_len(len: usize) -> Result<u32, ContractError> {
    u32::try_from(len)
        .ok()
        .filter(|&l| l <= MAX_FRAME_LEN)
        .ok_or_else(|| ContractError::codec(format!("frame of {} bytes exceeds limit", len)))
}
