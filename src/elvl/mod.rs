//! ELVL map metadata
//!
//! A map file may embed a chunked metadata block in the reserved fields of its
//! tileset bitmap header. The block holds key/value attributes, regions and a
//! few editor-specific chunks; anything else is carried through untouched.

pub mod chunks;
pub mod level;
pub mod region;
pub mod tiles;


pub use chunks::{read_chunks, write_chunk, Attribute, ElvlChunk, RawChunk};
pub use level::{LevelFile, MapTile};
pub use region::{AutoWarp, Region, RegionColor};
pub use tiles::{decode_region_tiles, encode_region_tiles, TileGrid, GRID_SIZE};

use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{LvzError, LvzResult};
use crate::parser_config::ParserConfig;
use crate::utils::{bytes_to_string, read_fixed_string, read_u32_le, BITMAP_MAGIC, ELVL_MAGIC};

/// Size of the `elvl` header: signature, section length, reserved
pub const ELVL_HEADER_LEN: usize = 12;

/// Offset of the bitmap reserved field that points at the ELVL block
pub const ELVL_POINTER_OFFSET: usize = 6;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ElvlCollection {
    pub attributes: Vec<Attribute>,
    pub regions: Vec<Region>,
    /// Every other chunk, in file order
    pub chunks: Vec<ElvlChunk>,
}

/// Locate the ELVL block of a map file, if it has one
pub fn elvl_offset(data: &[u8]) -> LvzResult<Option<usize>> {
    if data.len() < ELVL_POINTER_OFFSET + 4 || data[..2] != BITMAP_MAGIC {
        return Ok(None);
    }
    match read_u32_le(data, ELVL_POINTER_OFFSET)? {
        0 => Ok(None),
        offset => Ok(Some(offset as usize)),
    }
}

impl ElvlCollection {
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.regions.is_empty() && self.chunks.is_empty()
    }

    /// Read the metadata of a whole map file.
    ///
    /// Maps without a tileset, or whose tileset does not point at a metadata
    /// block, yield an empty collection.
    pub fn from_map_bytes(data: &[u8]) -> LvzResult<Self> {
        Self::from_map_bytes_with_config(data, &ParserConfig::default())
    }

    pub fn from_map_bytes_with_config(data: &[u8], config: &ParserConfig) -> LvzResult<Self> {
        match elvl_offset(data)? {
            Some(offset) => Ok(Self::parse_section(data, offset, config)?.0),
            None => Ok(Self::default()),
        }
    }

    /// Read a map file from disk
    pub fn from_path(path: &str) -> LvzResult<Self> {
        let data = std::fs::read(path).map_err(|e| LvzError::from_io(&e, path))?;
        Self::from_map_bytes(&data)
    }

    /// Parse a bare `elvl` block
    pub fn from_section_bytes(data: &[u8], config: &ParserConfig) -> LvzResult<Self> {
        Ok(Self::parse_section(data, 0, config)?.0)
    }

    /// Parse the block at `offset`; also returns the offset just past it
    pub(crate) fn parse_section(
        data: &[u8],
        offset: usize,
        config: &ParserConfig,
    ) -> LvzResult<(Self, usize)> {
        let body_start = offset
            .checked_add(ELVL_HEADER_LEN)
            .filter(|&end| end <= data.len())
            .ok_or(LvzError::TruncatedFile {
                expected: offset.saturating_add(ELVL_HEADER_LEN),
                actual: data.len(),
            })?;

        let signature = read_fixed_string(data, offset, 4)?;
        let expected = bytes_to_string(&ELVL_MAGIC);
        if signature != expected {
            return Err(LvzError::InvalidMagicBytes {
                expected,
                found: signature,
                offset,
            });
        }

        let length = read_u32_le(data, offset + 4)? as usize;
        let reserved = read_u32_le(data, offset + 8)?;
        if reserved != 0 {
            return Err(LvzError::NonZeroReserved {
                value: reserved,
                offset: offset + 8,
            });
        }
        if length < ELVL_HEADER_LEN {
            return Err(LvzError::InvalidDataLength {
                field: "elvl section length".to_string(),
                expected: ELVL_HEADER_LEN,
                actual: length,
            });
        }
        let end = offset
            .checked_add(length)
            .filter(|&end| end <= data.len())
            .ok_or(LvzError::TruncatedFile {
                expected: offset.saturating_add(length),
                actual: data.len(),
            })?;

        let mut collection = Self::default();
        for raw in read_chunks(&data[body_start..end], body_start, config)? {
            match ElvlChunk::from_raw(raw, config)? {
                ElvlChunk::Attribute(attribute) => collection.attributes.push(attribute),
                ElvlChunk::Region(region) => collection.regions.push(region),
                other => collection.chunks.push(other),
            }
        }

        debug!(
            attributes = collection.attributes.len(),
            regions = collection.regions.len(),
            other_chunks = collection.chunks.len(),
            "decoded elvl block"
        );
        Ok((collection, end))
    }

    /// Encode as an `elvl` block: header, attributes, regions, then other chunks
    pub fn to_bytes(&self) -> LvzResult<Vec<u8>> {
        let mut body = BytesMut::new();
        for attribute in &self.attributes {
            write_chunk(&mut body, &chunks::ATTR_TAG, &attribute.payload()?)?;
        }
        for region in &self.regions {
            write_chunk(&mut body, &chunks::REGN_TAG, &region.payload()?)?;
        }
        for chunk in &self.chunks {
            chunk.write(&mut body)?;
        }

        let total = body.len() + ELVL_HEADER_LEN;
        let length = u32::try_from(total).map_err(|_| LvzError::FieldNotEncodable {
            field: "elvl section length".to_string(),
            value: total as i64,
            max: i64::from(u32::MAX),
        })?;

        let mut buffer = BytesMut::with_capacity(total);
        buffer.put_slice(&ELVL_MAGIC);
        buffer.put_u32_le(length);
        buffer.put_u32_le(0);
        buffer.put(body);

        debug!(
            attributes = self.attributes.len(),
            regions = self.regions.len(),
            other_chunks = self.chunks.len(),
            bytes = total,
            "encoded elvl block"
        );
        Ok(buffer.to_vec())
    }

    /// First attribute with the given key, ignoring ASCII case
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.key.eq_ignore_ascii_case(key))
            .map(|a| a.value.as_str())
    }

    /// Replace the value of an existing attribute or append a new one
    pub fn set_attribute(&mut self, key: &str, value: &str) {
        match self
            .attributes
            .iter_mut()
            .find(|a| a.key.eq_ignore_ascii_case(key))
        {
            Some(attribute) => attribute.value = value.to_string(),
            None => self.attributes.push(Attribute::new(key, value)),
        }
    }

    pub fn region(&self, name: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.name == name)
    }
}
