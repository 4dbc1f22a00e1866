//! Per-tile rendering metadata, keyed by tile hash

mod format;

use crate::graphics::Color;
use crate::tile::TileHash;
use rustc_hash::FxHashMap;
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

pub use format::{CURRENT_VERSION, HEADER_LEN, RECORD_LEN, VERSION_LEN};

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("I/O error accessing metadata file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("Unsupported metadata version '{0}', expected '0_1_0'")]
    UnsupportedVersion(String),
    #[error("Metadata stream truncated; expected at least {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct MetadataFlags(u32);

impl MetadataFlags {
    pub const NONE: Self = Self(0);

    /// Draw sprite pixels with color index 0 instead of treating them as transparent.
    pub const DRAW_OBJ_ON_COLOR0: Self = Self(1 << 0);

    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    #[inline]
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    #[inline]
    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl std::ops::BitOr for MetadataFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileMetadata {
    pub bg_color: Color,
    pub win_color: Color,
    pub obj_color: Color,
    pub bg_front_z: u32,
    pub bg_back_z: u32,
    pub win_z: u32,
    pub obj_z: u32,
    pub obj_behind_z: u32,
    pub flags: MetadataFlags,
}

impl TileMetadata {
    #[must_use]
    pub fn max_depth(&self) -> u32 {
        [self.bg_front_z, self.bg_back_z, self.win_z, self.obj_z, self.obj_behind_z]
            .into_iter()
            .max()
            .unwrap_or(0)
    }
}

impl Default for TileMetadata {
    fn default() -> Self {
        Self {
            bg_color: Color::BLACK,
            win_color: Color::BLACK,
            obj_color: Color::BLACK,
            bg_front_z: 0,
            bg_back_z: 0,
            win_z: 0,
            obj_z: 0,
            obj_behind_z: 0,
            flags: MetadataFlags::NONE,
        }
    }
}

/// Partial update for [`MetadataStore::upsert`]; `None` fields are left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetadataUpdate {
    pub bg_color: Option<Color>,
    pub win_color: Option<Color>,
    pub obj_color: Option<Color>,
    pub bg_front_z: Option<u32>,
    pub bg_back_z: Option<u32>,
    pub win_z: Option<u32>,
    pub obj_z: Option<u32>,
    pub obj_behind_z: Option<u32>,
}

impl MetadataUpdate {
    #[must_use]
    pub fn all_depths(z: u32) -> Self {
        Self {
            bg_front_z: Some(z),
            bg_back_z: Some(z),
            win_z: Some(z),
            obj_z: Some(z),
            obj_behind_z: Some(z),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn max_depth(&self) -> Option<u32> {
        [self.bg_front_z, self.bg_back_z, self.win_z, self.obj_z, self.obj_behind_z]
            .into_iter()
            .flatten()
            .max()
    }

    fn apply(&self, metadata: &mut TileMetadata) {
        fn set<T: Copy>(field: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *field = value;
            }
        }

        set(&mut metadata.bg_color, self.bg_color);
        set(&mut metadata.win_color, self.win_color);
        set(&mut metadata.obj_color, self.obj_color);
        set(&mut metadata.bg_front_z, self.bg_front_z);
        set(&mut metadata.bg_back_z, self.bg_back_z);
        set(&mut metadata.win_z, self.win_z);
        set(&mut metadata.obj_z, self.obj_z);
        set(&mut metadata.obj_behind_z, self.obj_behind_z);
    }
}

/// Flat record form used for JSON interchange. Field names match the command vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetadataRecord {
    pub tile_hash: u32,
    pub bg_color: [u8; 4],
    pub win_color: [u8; 4],
    pub obj_color: [u8; 4],
    pub bg_for_z: u32,
    pub bg_back_z: u32,
    pub win_z: u32,
    pub obj_z: u32,
    pub obj_behind_z: u32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub flags: u32,
}

impl MetadataRecord {
    #[must_use]
    pub fn new(hash: TileHash, metadata: &TileMetadata) -> Self {
        Self {
            tile_hash: hash.0,
            bg_color: metadata.bg_color.to_array(),
            win_color: metadata.win_color.to_array(),
            obj_color: metadata.obj_color.to_array(),
            bg_for_z: metadata.bg_front_z,
            bg_back_z: metadata.bg_back_z,
            win_z: metadata.win_z,
            obj_z: metadata.obj_z,
            obj_behind_z: metadata.obj_behind_z,
            flags: metadata.flags.bits(),
        }
    }

    #[must_use]
    pub fn split(self) -> (TileHash, TileMetadata) {
        let metadata = TileMetadata {
            bg_color: Color::from_array(self.bg_color),
            win_color: Color::from_array(self.win_color),
            obj_color: Color::from_array(self.obj_color),
            bg_front_z: self.bg_for_z,
            bg_back_z: self.bg_back_z,
            win_z: self.win_z,
            obj_z: self.obj_z,
            obj_behind_z: self.obj_behind_z,
            flags: MetadataFlags::from_bits(self.flags),
        };
        (TileHash(self.tile_hash), metadata)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MetadataStore {
    records: FxHashMap<TileHash, TileMetadata>,
}

impl MetadataStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn lookup(&self, hash: TileHash) -> Option<&TileMetadata> {
        self.records.get(&hash)
    }

    /// Create the record with black/zero defaults if missing, then apply the supplied fields.
    pub fn upsert(&mut self, hash: TileHash, update: &MetadataUpdate) -> &TileMetadata {
        let metadata = self.records.entry(hash).or_insert_with(|| {
            log::info!("Created metadata for tile {hash}");
            TileMetadata::default()
        });
        update.apply(metadata);

        log::info!("Updated metadata for tile {hash}");

        metadata
    }

    /// Insert a default record unless one exists. Returns whether a record was created.
    pub fn create_if_missing(&mut self, hash: TileHash) -> bool {
        if self.records.contains_key(&hash) {
            return false;
        }

        self.records.insert(hash, TileMetadata::default());
        log::info!("Created metadata for tile {hash}");
        true
    }

    /// Returns false if the tile has no record.
    pub fn set_flags(&mut self, hash: TileHash, flags: MetadataFlags) -> bool {
        self.modify_flags(hash, |current| *current = flags)
    }

    pub fn add_flags(&mut self, hash: TileHash, flags: MetadataFlags) -> bool {
        self.modify_flags(hash, |current| current.insert(flags))
    }

    pub fn clear_flags(&mut self, hash: TileHash, flags: MetadataFlags) -> bool {
        self.modify_flags(hash, |current| current.remove(flags))
    }

    fn modify_flags(&mut self, hash: TileHash, f: impl FnOnce(&mut MetadataFlags)) -> bool {
        match self.records.get_mut(&hash) {
            Some(metadata) => {
                f(&mut metadata.flags);
                log::info!("Flags for tile {hash} are now {:#X}", metadata.flags.bits());
                true
            }
            None => {
                log::warn!("No metadata for tile {hash}, flags unchanged");
                false
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (TileHash, &TileMetadata)> + '_ {
        self.records.iter().map(|(&hash, metadata)| (hash, metadata))
    }

    /// Records sorted by hash, for stable output.
    #[must_use]
    pub fn records(&self) -> Vec<MetadataRecord> {
        let mut records: Vec<_> =
            self.iter().map(|(hash, metadata)| MetadataRecord::new(hash, metadata)).collect();
        records.sort_by_key(|record| record.tile_hash);
        records
    }

    #[must_use]
    pub fn from_records(records: impl IntoIterator<Item = MetadataRecord>) -> Self {
        Self { records: records.into_iter().map(MetadataRecord::split).collect() }
    }

    /// Largest depth index referenced by any record.
    #[must_use]
    pub fn max_depth(&self) -> Option<u32> {
        self.records.values().map(TileMetadata::max_depth).max()
    }

    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut sorted: Vec<_> = self.iter().collect();
        sorted.sort_by_key(|&(hash, _)| hash);
        format::serialize(&sorted)
    }

    /// Replace the whole store with the decoded stream.
    ///
    /// On error (unsupported version or truncated data) the store is left unchanged.
    pub fn deserialize(&mut self, bytes: &[u8]) -> Result<(), MetadataError> {
        let records = format::deserialize(bytes)?;
        self.records = records;

        log::info!("Loaded metadata for {} tiles", self.records.len());

        Ok(())
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), MetadataError> {
        fs::write(path, self.serialize())
            .map_err(|source| MetadataError::Io { path: path.display().to_string(), source })?;

        log::info!("Saved metadata for {} tiles to '{}'", self.records.len(), path.display());

        Ok(())
    }

    pub fn load_from_path(&mut self, path: &Path) -> Result<(), MetadataError> {
        let bytes = fs::read(path)
            .map_err(|source| MetadataError::Io { path: path.display().to_string(), source })?;
        self.deserialize(&bytes)
    }
}

impl<'a> FromIterator<(TileHash, &'a TileMetadata)> for MetadataStore {
    fn from_iter<T: IntoIterator<Item = (TileHash, &'a TileMetadata)>>(iter: T) -> Self {
        Self { records: iter.into_iter().map(|(hash, metadata)| (hash, *metadata)).collect() }
    }
}
