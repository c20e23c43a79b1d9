use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{elvl_offset, ElvlCollection, ELVL_POINTER_OFFSET};
use crate::errors::{LvzError, LvzResult};
use crate::parser_config::ParserConfig;
use crate::utils::{read_u32_le, BITMAP_MAGIC};

/// Offset of the bitmap file size field
const BITMAP_SIZE_OFFSET: usize = 2;

/// Shortest bitmap that still has the size and reserved fields
const BITMAP_HEADER_MIN: usize = ELVL_POINTER_OFFSET + 4;

const TILE_COORD_MASK: u32 = 0xFFF;

/// One placed map tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapTile {
    pub x: u16,
    pub y: u16,
    pub tile: u8,
}

impl MapTile {
    fn from_record(record: u32) -> Self {
        Self {
            x: (record & TILE_COORD_MASK) as u16,
            y: ((record >> 12) & TILE_COORD_MASK) as u16,
            tile: (record >> 24) as u8,
        }
    }

    fn to_record(self) -> LvzResult<u32> {
        for (field, value) in [("tile x", self.x), ("tile y", self.y)] {
            if u32::from(value) > TILE_COORD_MASK {
                return Err(LvzError::FieldNotEncodable {
                    field: field.to_string(),
                    value: i64::from(value),
                    max: i64::from(TILE_COORD_MASK),
                });
            }
        }
        Ok(u32::from(self.x) | (u32::from(self.y) << 12) | (u32::from(self.tile) << 24))
    }
}

/// A whole `.lvl` map: tileset bitmap, embedded metadata and tile records
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LevelFile {
    /// Tileset bitmap, empty for maps that use the default tileset
    pub bitmap: Vec<u8>,
    pub elvl: ElvlCollection,
    /// Raw tile records following the bitmap and metadata
    pub tile_data: Vec<u8>,
}

impl LevelFile {
    pub fn from_bytes(data: &[u8]) -> LvzResult<Self> {
        Self::from_bytes_with_config(data, &ParserConfig::default())
    }

    pub fn from_bytes_with_config(data: &[u8], config: &ParserConfig) -> LvzResult<Self> {
        if data.len() < BITMAP_HEADER_MIN || data[..2] != BITMAP_MAGIC {
            return Ok(Self {
                tile_data: data.to_vec(),
                ..Self::default()
            });
        }

        let bitmap_size = read_u32_le(data, BITMAP_SIZE_OFFSET)? as usize;
        let level = match elvl_offset(data)? {
            Some(offset) => {
                let (elvl, elvl_end) = ElvlCollection::parse_section(data, offset, config)?;
                // The bitmap size field spans the metadata as well
                let tiles_start = bitmap_size.max(elvl_end);
                if tiles_start > data.len() {
                    return Err(LvzError::TruncatedFile {
                        expected: tiles_start,
                        actual: data.len(),
                    });
                }
                Self {
                    bitmap: data[..offset].to_vec(),
                    elvl,
                    tile_data: data[tiles_start..].to_vec(),
                }
            },
            None => {
                if bitmap_size > data.len() {
                    return Err(LvzError::TruncatedFile {
                        expected: bitmap_size,
                        actual: data.len(),
                    });
                }
                Self {
                    bitmap: data[..bitmap_size].to_vec(),
                    elvl: ElvlCollection::default(),
                    tile_data: data[bitmap_size..].to_vec(),
                }
            },
        };

        debug!(
            bitmap = level.bitmap.len(),
            tile_bytes = level.tile_data.len(),
            "decoded level file"
        );
        Ok(level)
    }

    pub fn from_path(path: &str) -> LvzResult<Self> {
        let data = std::fs::read(path).map_err(|e| LvzError::from_io(&e, path))?;
        Self::from_bytes(&data)
    }

    /// Encode the map, pointing the bitmap header at the metadata block
    pub fn to_bytes(&self) -> LvzResult<Vec<u8>> {
        if self.bitmap.is_empty() {
            if !self.elvl.is_empty() {
                return Err(LvzError::InvalidDataLength {
                    field: "tileset bitmap".to_string(),
                    expected: BITMAP_HEADER_MIN,
                    actual: 0,
                });
            }
            return Ok(self.tile_data.clone());
        }
        if self.bitmap.len() < BITMAP_HEADER_MIN {
            return Err(LvzError::InvalidDataLength {
                field: "tileset bitmap".to_string(),
                expected: BITMAP_HEADER_MIN,
                actual: self.bitmap.len(),
            });
        }

        let elvl = if self.elvl.is_empty() {
            Vec::new()
        } else {
            self.elvl.to_bytes()?
        };
        let elvl_pointer = if elvl.is_empty() { 0 } else { self.bitmap.len() };
        let bitmap_size = self.bitmap.len() + elvl.len();
        let encode = |value: usize, field: &str| {
            u32::try_from(value).map_err(|_| LvzError::FieldNotEncodable {
                field: field.to_string(),
                value: value as i64,
                max: i64::from(u32::MAX),
            })
        };

        let mut out = Vec::with_capacity(bitmap_size + self.tile_data.len());
        out.extend_from_slice(&self.bitmap);
        out[BITMAP_SIZE_OFFSET..BITMAP_SIZE_OFFSET + 4]
            .copy_from_slice(&encode(bitmap_size, "bitmap size")?.to_le_bytes());
        out[ELVL_POINTER_OFFSET..ELVL_POINTER_OFFSET + 4]
            .copy_from_slice(&encode(elvl_pointer, "elvl offset")?.to_le_bytes());
        out.extend_from_slice(&elvl);
        out.extend_from_slice(&self.tile_data);
        Ok(out)
    }

    pub fn write_to_path(&self, path: &str) -> LvzResult<()> {
        std::fs::write(path, self.to_bytes()?).map_err(|e| LvzError::FileWriteError {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }

    /// Decode the tile records; a trailing partial record is ignored
    pub fn tiles(&self) -> Vec<MapTile> {
        self.tile_data
            .chunks_exact(4)
            .map(|record| {
                MapTile::from_record(u32::from_le_bytes([record[0], record[1], record[2], record[3]]))
            })
            .collect()
    }

    pub fn set_tiles(&mut self, tiles: &[MapTile]) -> LvzResult<()> {
        let mut data = Vec::with_capacity(tiles.len() * 4);
        for tile in tiles {
            data.extend_from_slice(&tile.to_record()?.to_le_bytes());
        }
        self.tile_data = data;
        Ok(())
    }
}
