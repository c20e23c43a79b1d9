use bytes::{Buf, BufMut, Bytes, BytesMut};
use flate2::read::{DeflateDecoder, ZlibDecoder};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

use crate::errors::{LvzError, LvzResult};

/// LVZ package and section magic
pub const CONT_MAGIC: [u8; 4] = *b"CONT";

/// ELVL section signature
pub const ELVL_MAGIC: [u8; 4] = *b"elvl";

/// Bitmap file magic at the start of a map with an embedded tileset
pub const BITMAP_MAGIC: [u8; 2] = *b"BM";

/// Decode bytes one-to-one into chars (no encoding conversion).
pub fn bytes_to_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Inverse of [`bytes_to_string`]. Characters above U+00FF have no byte form.
pub fn string_to_bytes(value: &str, field: &str) -> LvzResult<Vec<u8>> {
    value
        .chars()
        .map(|c| {
            u8::try_from(u32::from(c)).map_err(|_| LvzError::InvalidStringEncoding {
                field: field.to_string(),
                character: c,
            })
        })
        .collect()
}

fn check_bounds(buf: &[u8], offset: usize, needed: usize) -> LvzResult<()> {
    let end = offset.checked_add(needed).ok_or(LvzError::IntegerOverflow {
        operation: "buffer bounds calculation".to_string(),
        details: format!("offset {} + {}", offset, needed),
    })?;
    if end > buf.len() {
        return Err(LvzError::BufferUnderflow {
            offset,
            needed,
            available: buf.len().saturating_sub(offset),
        });
    }
    Ok(())
}

/// Read exactly `len` bytes at `offset` as a string
pub fn read_fixed_string(buf: &[u8], offset: usize, len: usize) -> LvzResult<String> {
    check_bounds(buf, offset, len)?;
    Ok(bytes_to_string(&buf[offset..offset + len]))
}

/// Write `value` into exactly `len` bytes, truncating or zero-padding
pub fn write_fixed_string(
    buffer: &mut BytesMut,
    value: &str,
    len: usize,
    field: &str,
) -> LvzResult<()> {
    let mut raw = string_to_bytes(value, field)?;
    raw.resize(len, 0);
    buffer.put(&raw[..]);
    Ok(())
}

/// Read a zero-terminated string starting at `offset`.
///
/// Returns the string and the number of bytes consumed, terminator included.
pub fn read_cstring(buf: &[u8], offset: usize) -> LvzResult<(String, usize)> {
    check_bounds(buf, offset, 0)?;
    match buf[offset..].iter().position(|&b| b == 0) {
        Some(len) => Ok((bytes_to_string(&buf[offset..offset + len]), len + 1)),
        None => Err(LvzError::BufferUnderflow {
            offset: buf.len(),
            needed: 1,
            available: 0,
        }),
    }
}

/// Append `value` followed by a zero byte
pub fn write_cstring(buffer: &mut BytesMut, value: &str, field: &str) -> LvzResult<()> {
    buffer.put(&string_to_bytes(value, field)?[..]);
    buffer.put_u8(0);
    Ok(())
}

pub fn read_u16_le(buf: &[u8], offset: usize) -> LvzResult<u16> {
    check_bounds(buf, offset, 2)?;
    Ok(u16::from_le_bytes([buf[offset], buf[offset + 1]]))
}

pub fn read_i16_le(buf: &[u8], offset: usize) -> LvzResult<i16> {
    Ok(read_u16_le(buf, offset)? as i16)
}

pub fn read_u32_le(buf: &[u8], offset: usize) -> LvzResult<u32> {
    check_bounds(buf, offset, 4)?;
    Ok(u32::from_le_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ]))
}

/// Fail with `BufferUnderflow` unless `data` still holds `needed` bytes.
///
/// `offset` is the caller's position, used only for the error report.
pub fn ensure_remaining(data: &Bytes, needed: usize, offset: usize) -> LvzResult<()> {
    if data.remaining() < needed {
        return Err(LvzError::BufferUnderflow {
            offset,
            needed,
            available: data.remaining(),
        });
    }
    Ok(())
}

/// Consume a zero-terminated string from the front of `data`
pub fn get_cstring(data: &mut Bytes, offset: usize) -> LvzResult<String> {
    let (value, consumed) = read_cstring(&data[..], 0).map_err(|_| LvzError::BufferUnderflow {
        offset: offset + data.remaining(),
        needed: 1,
        available: 0,
    })?;
    data.advance(consumed);
    Ok(value)
}

/// Consume a 4-byte tag from the front of `data`
pub fn get_tag(data: &mut Bytes, offset: usize) -> LvzResult<[u8; 4]> {
    ensure_remaining(data, 4, offset)?;
    let mut tag = [0u8; 4];
    data.copy_to_slice(&mut tag);
    Ok(tag)
}

pub fn tag_to_string(tag: &[u8; 4]) -> String {
    String::from_utf8_lossy(tag).to_string()
}

/// Bytes of zero padding after a chunk payload of `len` bytes
pub fn padding_for(len: usize) -> usize {
    (4 - len % 4) % 4
}

/// Detect a zlib stream header (RFC 1950)
pub fn is_zlib_stream(data: &[u8]) -> bool {
    data.len() >= 2
        && data[0] & 0x0F == 8
        && ((u16::from(data[0]) << 8) | u16::from(data[1])) % 31 == 0
}

/// Deflate `data` into a zlib stream
pub fn compress(data: &[u8], section: &str) -> LvzResult<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .and_then(|_| encoder.finish())
        .map_err(|e| LvzError::CompressionFailed {
            section: section.to_string(),
            reason: e.to_string(),
        })
}

/// Inflate a section payload, producing at most `limit` bytes.
///
/// Packages written by the game's tools carry zlib streams; a bare DEFLATE
/// stream is accepted as well. A stream that inflates past `limit` fails
/// with `DataSizeExceedsLimit` as soon as the extra byte is produced.
pub fn decompress(data: &[u8], section: &str, limit: usize) -> LvzResult<Vec<u8>> {
    let cap = (limit as u64).saturating_add(1);
    let mut decompressed = Vec::new();
    if is_zlib_stream(data) {
        let mut decoder = ZlibDecoder::new(data).take(cap);
        if decoder.read_to_end(&mut decompressed).is_ok() {
            return check_inflated(decompressed, section, limit);
        }
        decompressed.clear();
    }

    let mut decoder = DeflateDecoder::new(data).take(cap);
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| LvzError::DecompressionFailed {
            section: section.to_string(),
            reason: e.to_string(),
        })?;
    check_inflated(decompressed, section, limit)
}

fn check_inflated(data: Vec<u8>, section: &str, limit: usize) -> LvzResult<Vec<u8>> {
    if data.len() > limit {
        return Err(LvzError::DataSizeExceedsLimit {
            field: format!("inflated size of section '{}'", section),
            size: data.len(),
            limit,
        });
    }
    Ok(data)
}
