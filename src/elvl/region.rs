//! Map regions: named tile sets with behaviour flags, stored as `REGN` chunks

use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::chunks::{read_chunks, write_chunk, RawChunk};
use super::tiles::{decode_region_tiles, encode_region_tiles, TileGrid};
use crate::errors::{LvzError, LvzResult};
use crate::parser_config::ParserConfig;
use crate::utils::{bytes_to_string, read_fixed_string, read_i16_le, string_to_bytes, write_fixed_string};

const NAME_TAG: [u8; 4] = *b"rNAM";
const TILES_TAG: [u8; 4] = *b"rTIL";
const BASE_TAG: [u8; 4] = *b"rBSE";
const NO_ANTIWARP_TAG: [u8; 4] = *b"rNAW";
const NO_WEAPONS_TAG: [u8; 4] = *b"rNWP";
const NO_FLAG_DROPS_TAG: [u8; 4] = *b"rNFL";
const AUTO_WARP_TAG: [u8; 4] = *b"rAWP";
const PYTHON_TAG: [u8; 4] = *b"rPYC";
const COLOR_TAG: [u8; 4] = *b"rCOL";

/// Width of the zero-padded arena field of `rAWP`
pub const ARENA_FIELD_LEN: usize = 16;

/// Warp destination for players entering a region
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoWarp {
    /// Destination tile; `-1` keeps the player's current coordinate
    pub x: i16,
    pub y: i16,
    /// Destination arena, or `None` for the current one
    pub arena: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Named set of map tiles with behaviour flags
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Region {
    pub name: String,
    pub tiles: TileGrid,
    pub auto_warp: Option<AutoWarp>,
    pub is_base: bool,
    pub no_antiwarp: bool,
    pub no_weapons: bool,
    pub no_flag_drops: bool,
    pub color: Option<RegionColor>,
    pub python: Option<String>,
    /// Sub-chunks this codec does not interpret, written back verbatim
    pub unknown_chunks: Vec<RawChunk>,
}

impl Region {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Decode a `REGN` chunk payload
    pub fn from_payload(payload: &[u8], config: &ParserConfig) -> LvzResult<Self> {
        let mut region = Self::default();

        for chunk in read_chunks(payload, 0, config)? {
            let data = &chunk.data;
            match chunk.tag {
                NAME_TAG => region.name = bytes_to_string(data),
                TILES_TAG => region.tiles = decode_region_tiles(data)?,
                BASE_TAG if data.is_empty() => region.is_base = true,
                NO_ANTIWARP_TAG if data.is_empty() => region.no_antiwarp = true,
                NO_WEAPONS_TAG if data.is_empty() => region.no_weapons = true,
                NO_FLAG_DROPS_TAG if data.is_empty() => region.no_flag_drops = true,
                AUTO_WARP_TAG if data.len() >= 4 => {
                    let arena = if data.len() > 4 {
                        let field = read_fixed_string(data, 4, data.len() - 4)?;
                        let end = field.find('\0').unwrap_or(field.len());
                        Some(field[..end].to_string())
                    } else {
                        None
                    };
                    region.auto_warp = Some(AutoWarp {
                        x: read_i16_le(data, 0)?,
                        y: read_i16_le(data, 2)?,
                        arena,
                    });
                },
                PYTHON_TAG => region.python = Some(bytes_to_string(data)),
                COLOR_TAG if data.len() == 3 => {
                    region.color = Some(RegionColor {
                        r: data[0],
                        g: data[1],
                        b: data[2],
                    });
                },
                _ => {
                    warn!(
                        region = %region.name,
                        tag = %chunk.tag_name(),
                        length = data.len(),
                        "preserving unrecognized region sub-chunk"
                    );
                    region.unknown_chunks.push(chunk);
                },
            }
        }

        Ok(region)
    }

    /// Encode as a `REGN` chunk payload
    pub fn payload(&self) -> LvzResult<Vec<u8>> {
        let mut buffer = BytesMut::new();

        write_chunk(&mut buffer, &NAME_TAG, &string_to_bytes(&self.name, "region name")?)?;
        write_chunk(&mut buffer, &TILES_TAG, &encode_region_tiles(&self.tiles))?;

        for (set, tag) in [
            (self.is_base, &BASE_TAG),
            (self.no_antiwarp, &NO_ANTIWARP_TAG),
            (self.no_weapons, &NO_WEAPONS_TAG),
            (self.no_flag_drops, &NO_FLAG_DROPS_TAG),
        ] {
            if set {
                write_chunk(&mut buffer, tag, &[])?;
            }
        }

        if let Some(warp) = &self.auto_warp {
            let mut data = BytesMut::with_capacity(4 + ARENA_FIELD_LEN);
            data.put_i16_le(warp.x);
            data.put_i16_le(warp.y);
            if let Some(arena) = &warp.arena {
                // One byte of the field is kept for the terminator
                if arena.chars().count() >= ARENA_FIELD_LEN {
                    return Err(LvzError::FieldNotEncodable {
                        field: "auto-warp arena length".to_string(),
                        value: arena.chars().count() as i64,
                        max: (ARENA_FIELD_LEN - 1) as i64,
                    });
                }
                write_fixed_string(&mut data, arena, ARENA_FIELD_LEN, "auto-warp arena")?;
            }
            write_chunk(&mut buffer, &AUTO_WARP_TAG, &data)?;
        }

        if let Some(python) = &self.python {
            write_chunk(&mut buffer, &PYTHON_TAG, &string_to_bytes(python, "region script")?)?;
        }

        if let Some(color) = self.color {
            write_chunk(&mut buffer, &COLOR_TAG, &[color.r, color.g, color.b])?;
        }

        for chunk in &self.unknown_chunks {
            write_chunk(&mut buffer, &chunk.tag, &chunk.data)?;
        }

        Ok(buffer.to_vec())
    }
}
