//! Region tile grid and its run-length encoding
//!
//! A region covers an arbitrary subset of the 1024x1024 map. On disk the subset
//! is a byte stream of opcodes; the top three bits of each lead byte select the
//! opcode and the rest (plus one extra byte for the long forms) carry a count.

use serde::{Deserialize, Serialize};

use crate::errors::{LvzError, LvzResult};

/// Width and height of the map in tiles
pub const GRID_SIZE: usize = 1024;

const WORDS_PER_ROW: usize = GRID_SIZE / 64;

const OP_EMPTY_RUN: u8 = 0;
const OP_PRESENT_RUN: u8 = 2;
const OP_EMPTY_ROWS: u8 = 4;
const OP_REPEAT_ROW: u8 = 6;

/// Longest count a short-form opcode can carry
const SHORT_FORM_MAX: usize = 32;

/// 1024x1024 bitset, addressed `(x, y)`
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileGrid {
    words: Vec<u64>,
}

impl Default for TileGrid {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TileGrid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileGrid").field("count", &self.count()).finish()
    }
}

impl TileGrid {
    pub fn new() -> Self {
        Self {
            words: vec![0; WORDS_PER_ROW * GRID_SIZE],
        }
    }

    fn locate(x: usize, y: usize) -> (usize, u64) {
        (y * WORDS_PER_ROW + x / 64, 1u64 << (x % 64))
    }

    /// Whether the tile is part of the region. Coordinates outside the map are never set.
    pub fn get(&self, x: usize, y: usize) -> bool {
        if x >= GRID_SIZE || y >= GRID_SIZE {
            return false;
        }
        let (word, mask) = Self::locate(x, y);
        self.words[word] & mask != 0
    }

    /// Set or clear a tile. Coordinates outside the map are ignored.
    pub fn set(&mut self, x: usize, y: usize, present: bool) {
        if x >= GRID_SIZE || y >= GRID_SIZE {
            return;
        }
        let (word, mask) = Self::locate(x, y);
        if present {
            self.words[word] |= mask;
        } else {
            self.words[word] &= !mask;
        }
    }

    fn row(&self, y: usize) -> &[u64] {
        &self.words[y * WORDS_PER_ROW..(y + 1) * WORDS_PER_ROW]
    }

    pub fn row_is_empty(&self, y: usize) -> bool {
        self.row(y).iter().all(|&w| w == 0)
    }

    pub fn rows_equal(&self, a: usize, b: usize) -> bool {
        self.row(a) == self.row(b)
    }

    fn copy_row(&mut self, from: usize, to: usize) {
        self.words
            .copy_within(from * WORDS_PER_ROW..(from + 1) * WORDS_PER_ROW, to * WORDS_PER_ROW);
    }

    fn fill_run(&mut self, y: usize, x: usize, len: usize) {
        for column in x..x + len {
            self.set(column, y, true);
        }
    }

    /// Number of tiles in the region
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    pub fn clear(&mut self) {
        self.words.iter_mut().for_each(|w| *w = 0);
    }
}

fn invalid(offset: usize, reason: String) -> LvzError {
    LvzError::InvalidRegionTiles { offset, reason }
}

/// Decode an `rTIL` payload into a grid.
///
/// Decoding stops once all 1024 rows are produced; bytes after that are ignored.
/// A stream that ends early leaves the remaining tiles absent.
pub fn decode_region_tiles(data: &[u8]) -> LvzResult<TileGrid> {
    let mut grid = TileGrid::new();
    let mut tiles_in_row = 0usize;
    let mut rows_counted = 0usize;
    let mut pos = 0usize;

    while pos < data.len() && rows_counted < GRID_SIZE {
        let op_offset = pos;
        let lead = data[pos];
        pos += 1;

        let opcode = lead >> 5;
        let count = if opcode & 1 == 0 {
            usize::from(lead & 0x1F) + 1
        } else {
            let low = *data.get(pos).ok_or_else(|| {
                invalid(op_offset, "long opcode is missing its count byte".to_string())
            })?;
            pos += 1;
            ((usize::from(lead & 0x03) << 8) | usize::from(low)) + 1
        };

        match opcode & !1 {
            OP_EMPTY_RUN | OP_PRESENT_RUN => {
                if tiles_in_row + count > GRID_SIZE {
                    return Err(invalid(
                        op_offset,
                        format!(
                            "run of {} tiles starting at column {} crosses the end of row {}",
                            count, tiles_in_row, rows_counted
                        ),
                    ));
                }
                if opcode & !1 == OP_PRESENT_RUN {
                    grid.fill_run(rows_counted, tiles_in_row, count);
                }
                tiles_in_row += count;
                if tiles_in_row == GRID_SIZE {
                    tiles_in_row = 0;
                    rows_counted += 1;
                }
            },
            OP_EMPTY_ROWS | OP_REPEAT_ROW => {
                if tiles_in_row != 0 {
                    return Err(invalid(
                        op_offset,
                        format!(
                            "row opcode issued at column {} of row {}",
                            tiles_in_row, rows_counted
                        ),
                    ));
                }
                let end = rows_counted + count;
                if end > GRID_SIZE {
                    return Err(invalid(
                        op_offset,
                        format!(
                            "{} rows from row {} pass the last row",
                            count, rows_counted
                        ),
                    ));
                }
                if opcode & !1 == OP_REPEAT_ROW {
                    if rows_counted == 0 {
                        return Err(LvzError::RepeatWithoutPreviousRow { offset: op_offset });
                    }
                    for row in rows_counted..end {
                        grid.copy_row(rows_counted - 1, row);
                    }
                }
                rows_counted = end;
            },
            _ => unreachable!("opcode is three bits wide"),
        }
    }

    Ok(grid)
}

fn emit(out: &mut Vec<u8>, short_opcode: u8, count: usize) {
    debug_assert!((1..=GRID_SIZE).contains(&count));
    let n = count - 1;
    if count <= SHORT_FORM_MAX {
        out.push((short_opcode << 5) | n as u8);
    } else {
        out.push(((short_opcode + 1) << 5) | (n >> 8) as u8);
        out.push((n & 0xFF) as u8);
    }
}

/// Encode a grid into an `rTIL` payload that decodes back to the same grid
pub fn encode_region_tiles(grid: &TileGrid) -> Vec<u8> {
    let mut out = Vec::new();
    let mut y = 0usize;

    while y < GRID_SIZE {
        if grid.row_is_empty(y) {
            let mut rows = 1;
            while y + rows < GRID_SIZE && grid.row_is_empty(y + rows) {
                rows += 1;
            }
            emit(&mut out, OP_EMPTY_ROWS, rows);
            y += rows;
            continue;
        }

        if y > 0 && grid.rows_equal(y - 1, y) {
            let mut rows = 1;
            while y + rows < GRID_SIZE && grid.rows_equal(y - 1, y + rows) {
                rows += 1;
            }
            emit(&mut out, OP_REPEAT_ROW, rows);
            y += rows;
            continue;
        }

        let mut x = 0usize;
        while x < GRID_SIZE {
            let present = grid.get(x, y);
            let mut run = 1;
            while x + run < GRID_SIZE && grid.get(x + run, y) == present {
                run += 1;
            }
            let opcode = if present { OP_PRESENT_RUN } else { OP_EMPTY_RUN };
            emit(&mut out, opcode, run);
            x += run;
        }
        y += 1;
    }

    out
}
