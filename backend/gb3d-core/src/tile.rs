//! Tile identity hashing and the VRAM tile inspector

use crate::num::GetBit;
use crate::ppu::Vram;
use crc::Crc;
use std::array;
use std::fmt::{Display, Formatter};
use std::num::ParseIntError;
use std::str::FromStr;

/// Raw 8x8 2bpp tile pattern: two bit-planes per row, 8 rows.
pub const TILE_LEN: usize = 16;

/// Tiles in the DMG tile data area ($8000-$97FF).
pub const VRAM_TILE_COUNT: usize = 384;

// Tiles per row in the inspector grid
const INSPECTOR_WIDTH: usize = 10;

// Metadata files are keyed by this CRC; changing it orphans every existing file
const CRC: Crc<u32> = Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);

/// Content key for a tile pattern. Collisions are possible and accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct TileHash(pub u32);

impl TileHash {
    #[inline]
    #[must_use]
    pub fn of(tile: &[u8; TILE_LEN]) -> Self {
        Self(CRC.checksum(tile))
    }

    /// Hash the tile whose pattern starts at `addr` (relative to $8000).
    #[inline]
    #[must_use]
    pub fn of_vram_tile(vram: &Vram, addr: usize) -> Self {
        Self(CRC.checksum(&vram[addr..addr + TILE_LEN]))
    }
}

impl Display for TileHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

impl FromStr for TileHash {
    type Err = ParseIntError;

    // Accepts decimal or 0x-prefixed hex
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => u32::from_str_radix(hex, 16).map(Self),
            None => s.parse().map(Self),
        }
    }
}

/// Decode a tile pattern into 2-bit color indices, `[row][column]` with column 0 leftmost.
#[must_use]
pub fn decode_tile(tile: &[u8; TILE_LEN]) -> [[u8; 8]; 8] {
    array::from_fn(|row| {
        let lsb = tile[2 * row];
        let msb = tile[2 * row + 1];
        array::from_fn(|col| {
            let bit = 7 - col as u8;
            u8::from(lsb.bit(bit)) | (u8::from(msb.bit(bit)) << 1)
        })
    })
}

/// Hashes of every tile in VRAM plus the tile currently selected for editing.
#[derive(Debug, Clone)]
pub struct VramTiles {
    hashes: Box<[TileHash; VRAM_TILE_COUNT]>,
    patterns: Box<[[u8; TILE_LEN]; VRAM_TILE_COUNT]>,
    selected: usize,
}

impl VramTiles {
    #[must_use]
    pub fn new() -> Self {
        Self {
            hashes: Box::new([TileHash::default(); VRAM_TILE_COUNT]),
            patterns: Box::new([[0; TILE_LEN]; VRAM_TILE_COUNT]),
            selected: 0,
        }
    }

    pub fn sample(&mut self, vram: &Vram) {
        for (i, (hash, pattern)) in self.hashes.iter_mut().zip(self.patterns.iter_mut()).enumerate()
        {
            let addr = i * TILE_LEN;
            pattern.copy_from_slice(&vram[addr..addr + TILE_LEN]);
            *hash = TileHash::of(pattern);
        }
    }

    #[must_use]
    pub fn hash(&self, index: usize) -> TileHash {
        self.hashes[index]
    }

    #[must_use]
    pub fn pattern(&self, index: usize) -> &[u8; TILE_LEN] {
        &self.patterns[index]
    }

    #[must_use]
    pub fn selected(&self) -> usize {
        self.selected
    }

    #[must_use]
    pub fn selected_hash(&self) -> TileHash {
        self.hashes[self.selected]
    }

    /// Select a tile directly; out-of-range indices are ignored.
    pub fn select(&mut self, index: usize) -> bool {
        if index >= VRAM_TILE_COUNT {
            log::warn!("Tile index {index} out of range, selection unchanged");
            return false;
        }

        self.selected = index;
        true
    }

    pub fn select_next(&mut self) {
        if self.selected < VRAM_TILE_COUNT - 1 {
            self.selected += 1;
        }
    }

    pub fn select_previous(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
        }
    }

    pub fn select_down(&mut self) {
        if self.selected < VRAM_TILE_COUNT - INSPECTOR_WIDTH {
            self.selected += INSPECTOR_WIDTH;
        }
    }

    pub fn select_up(&mut self) {
        if self.selected >= INSPECTOR_WIDTH {
            self.selected -= INSPECTOR_WIDTH;
        }
    }
}

impl Default for VramTiles {
    fn default() -> Self {
        Self::new()
    }
}
