//! Chunk framing and the top-level ELVL chunk kinds

use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::region::Region;
use crate::errors::{LvzError, LvzResult};
use crate::parser_config::ParserConfig;
use crate::utils::{bytes_to_string, padding_for, read_u32_le, string_to_bytes, tag_to_string};

pub const ATTR_TAG: [u8; 4] = *b"ATTR";
pub const REGN_TAG: [u8; 4] = *b"REGN";
pub const WALL_TILES_TAG: [u8; 4] = *b"DCWT";
pub const TEXT_TILES_TAG: [u8; 4] = *b"DCTT";
pub const HASH_CODE_TAG: [u8; 4] = *b"DCID";
pub const BOOKMARKS_TAG: [u8; 4] = *b"DCBM";
pub const LVZ_PATHS_TAG: [u8; 4] = *b"DCLV";

pub const WALL_TILES_LEN: usize = 16;
pub const TEXT_TILES_LEN: usize = 256;

/// A tagged chunk kept exactly as it was read
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawChunk {
    pub tag: [u8; 4],
    pub data: Vec<u8>,
}

impl RawChunk {
    pub fn new(tag: [u8; 4], data: Vec<u8>) -> Self {
        Self { tag, data }
    }

    pub fn tag_name(&self) -> String {
        tag_to_string(&self.tag)
    }
}

/// Split a chunk sequence into raw chunks.
///
/// `base_offset` is where `data` starts in the enclosing file and only feeds
/// error reports. Padding after the final chunk may be missing.
pub fn read_chunks(data: &[u8], base_offset: usize, config: &ParserConfig) -> LvzResult<Vec<RawChunk>> {
    let mut chunks = Vec::new();
    let mut pos = 0usize;

    while data.len() - pos >= 8 {
        let mut tag = [0u8; 4];
        tag.copy_from_slice(&data[pos..pos + 4]);
        let length = read_u32_le(data, pos + 4)? as usize;
        let start = pos + 8;
        let available = data.len() - start;
        if length > available {
            return Err(LvzError::ChunkOverrun {
                tag: tag_to_string(&tag),
                offset: base_offset + pos,
                length,
                available,
            });
        }

        chunks.push(RawChunk::new(tag, data[start..start + length].to_vec()));
        config.check_chunk_count(chunks.len())?;

        pos = (start + length + padding_for(length)).min(data.len());
    }

    if pos < data.len() {
        warn!(
            offset = base_offset + pos,
            trailing = data.len() - pos,
            "ignoring bytes too short to hold a chunk header"
        );
    }

    Ok(chunks)
}

/// Append a chunk header, payload and alignment padding
pub fn write_chunk(buffer: &mut BytesMut, tag: &[u8; 4], payload: &[u8]) -> LvzResult<()> {
    let length = u32::try_from(payload.len()).map_err(|_| LvzError::FieldNotEncodable {
        field: format!("{} chunk length", tag_to_string(tag)),
        value: payload.len() as i64,
        max: i64::from(u32::MAX),
    })?;
    buffer.put_slice(tag);
    buffer.put_u32_le(length);
    buffer.put_slice(payload);
    buffer.put_bytes(0, padding_for(payload.len()));
    Ok(())
}

/// `key=value` map attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub key: String,
    pub value: String,
}

impl Attribute {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Split on the first `=`; `None` when the payload has none
    pub fn parse(payload: &[u8]) -> Option<Self> {
        let split = payload.iter().position(|&b| b == b'=')?;
        Some(Self {
            key: bytes_to_string(&payload[..split]),
            value: bytes_to_string(&payload[split + 1..]),
        })
    }

    pub fn payload(&self) -> LvzResult<Vec<u8>> {
        let mut payload = string_to_bytes(&self.key, "attribute key")?;
        payload.push(b'=');
        payload.extend(string_to_bytes(&self.value, "attribute value")?);
        Ok(payload)
    }
}

/// Top-level ELVL chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ElvlChunk {
    Attribute(Attribute),
    Region(Region),
    WallTiles([u8; WALL_TILES_LEN]),
    #[serde(with = "text_tiles")]
    TextTiles(Box<[u8; TEXT_TILES_LEN]>),
    HashCode(Vec<u8>),
    Bookmarks(Vec<u8>),
    LvzPaths(Vec<u8>),
    Raw { tag: [u8; 4], data: Vec<u8> },
}

impl ElvlChunk {
    /// Interpret a raw chunk by tag. Unknown tags and known tags with a payload
    /// of the wrong size stay raw.
    pub fn from_raw(raw: RawChunk, config: &ParserConfig) -> LvzResult<Self> {
        let chunk = match raw.tag {
            ATTR_TAG => match Attribute::parse(&raw.data) {
                Some(attribute) => Self::Attribute(attribute),
                None => {
                    warn!("ATTR chunk without '=' kept as raw data");
                    Self::Raw {
                        tag: raw.tag,
                        data: raw.data,
                    }
                },
            },
            REGN_TAG => Self::Region(Region::from_payload(&raw.data, config)?),
            WALL_TILES_TAG if raw.data.len() == WALL_TILES_LEN => {
                let mut tiles = [0u8; WALL_TILES_LEN];
                tiles.copy_from_slice(&raw.data);
                Self::WallTiles(tiles)
            },
            TEXT_TILES_TAG if raw.data.len() == TEXT_TILES_LEN => {
                let mut tiles = Box::new([0u8; TEXT_TILES_LEN]);
                tiles.copy_from_slice(&raw.data);
                Self::TextTiles(tiles)
            },
            HASH_CODE_TAG => Self::HashCode(raw.data),
            BOOKMARKS_TAG => Self::Bookmarks(raw.data),
            LVZ_PATHS_TAG => Self::LvzPaths(raw.data),
            _ => {
                warn!(
                    tag = %raw.tag_name(),
                    length = raw.data.len(),
                    "preserving unrecognized ELVL chunk"
                );
                Self::Raw {
                    tag: raw.tag,
                    data: raw.data,
                }
            },
        };
        Ok(chunk)
    }

    pub fn tag(&self) -> [u8; 4] {
        match self {
            Self::Attribute(_) => ATTR_TAG,
            Self::Region(_) => REGN_TAG,
            Self::WallTiles(_) => WALL_TILES_TAG,
            Self::TextTiles(_) => TEXT_TILES_TAG,
            Self::HashCode(_) => HASH_CODE_TAG,
            Self::Bookmarks(_) => BOOKMARKS_TAG,
            Self::LvzPaths(_) => LVZ_PATHS_TAG,
            Self::Raw { tag, .. } => *tag,
        }
    }

    pub fn payload(&self) -> LvzResult<Vec<u8>> {
        Ok(match self {
            Self::Attribute(attribute) => attribute.payload()?,
            Self::Region(region) => region.payload()?,
            Self::WallTiles(tiles) => tiles.to_vec(),
            Self::TextTiles(tiles) => tiles.to_vec(),
            Self::HashCode(data) | Self::Bookmarks(data) | Self::LvzPaths(data) => data.clone(),
            Self::Raw { data, .. } => data.clone(),
        })
    }

    pub fn write(&self, buffer: &mut BytesMut) -> LvzResult<()> {
        write_chunk(buffer, &self.tag(), &self.payload()?)
    }
}

// serde only derives arrays up to 32 elements
mod text_tiles {
    use super::TEXT_TILES_LEN;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(tiles: &[u8; TEXT_TILES_LEN], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&tiles[..])
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Box<[u8; TEXT_TILES_LEN]>, D::Error> {
        let raw = Vec::<u8>::deserialize(deserializer)?;
        let len = raw.len();
        raw.into_boxed_slice()
            .try_into()
            .map_err(|_| D::Error::invalid_length(len, &"256 text tile bytes"))
    }
}
