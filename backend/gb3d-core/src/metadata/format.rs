//! Binary metadata file format (little-endian)
//!
//! ```text
//! 0x00  10 bytes  version tag, NUL-padded ASCII
//! 0x0A  u32       record count
//! 0x0E  40 bytes  per record:
//!                 u32 tile hash, 3x RGBA colors (bg/win/obj),
//!                 u32 bg front Z, bg back Z, window Z, sprite Z, sprite behind-BG Z, flags
//! ```

use crate::graphics::Color;
use crate::metadata::{MetadataError, MetadataFlags, TileMetadata};
use crate::tile::TileHash;
use rustc_hash::FxHashMap;

pub const VERSION_LEN: usize = 10;
pub const CURRENT_VERSION: &str = "0_1_0";
pub const HEADER_LEN: usize = VERSION_LEN + 4;
pub const RECORD_LEN: usize = 40;

pub(super) fn serialize(records: &[(TileHash, &TileMetadata)]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(HEADER_LEN + records.len() * RECORD_LEN);

    let mut version = [0_u8; VERSION_LEN];
    version[..CURRENT_VERSION.len()].copy_from_slice(CURRENT_VERSION.as_bytes());
    bytes.extend(version);
    bytes.extend((records.len() as u32).to_le_bytes());

    for &(hash, metadata) in records {
        bytes.extend(hash.0.to_le_bytes());
        bytes.extend(metadata.bg_color.to_array());
        bytes.extend(metadata.win_color.to_array());
        bytes.extend(metadata.obj_color.to_array());
        for value in [
            metadata.bg_front_z,
            metadata.bg_back_z,
            metadata.win_z,
            metadata.obj_z,
            metadata.obj_behind_z,
            metadata.flags.bits(),
        ] {
            bytes.extend(value.to_le_bytes());
        }
    }

    bytes
}

pub(super) fn deserialize(
    bytes: &[u8],
) -> Result<FxHashMap<TileHash, TileMetadata>, MetadataError> {
    let version = read_version(bytes)?;
    if version != CURRENT_VERSION {
        return Err(MetadataError::UnsupportedVersion(version));
    }

    let Some(count_bytes) = bytes.get(VERSION_LEN..HEADER_LEN) else {
        return Err(MetadataError::Truncated { expected: HEADER_LEN, actual: bytes.len() });
    };
    let count = read_u32(count_bytes, 0) as usize;

    let Some(expected) =
        count.checked_mul(RECORD_LEN).and_then(|len| len.checked_add(HEADER_LEN))
    else {
        return Err(MetadataError::Truncated { expected: usize::MAX, actual: bytes.len() });
    };
    if bytes.len() < expected {
        return Err(MetadataError::Truncated { expected, actual: bytes.len() });
    }
    if bytes.len() > expected {
        let trailing = bytes.len() - expected;
        log::warn!("Ignoring {trailing} trailing bytes after {count} metadata records");
    }

    let records = bytes[HEADER_LEN..expected]
        .chunks_exact(RECORD_LEN)
        .map(|record| {
            let hash = TileHash(read_u32(record, 0));
            let metadata = TileMetadata {
                bg_color: read_color(record, 4),
                win_color: read_color(record, 8),
                obj_color: read_color(record, 12),
                bg_front_z: read_u32(record, 16),
                bg_back_z: read_u32(record, 20),
                win_z: read_u32(record, 24),
                obj_z: read_u32(record, 28),
                obj_behind_z: read_u32(record, 32),
                flags: MetadataFlags::from_bits(read_u32(record, 36)),
            };
            (hash, metadata)
        })
        .collect();

    Ok(records)
}

fn read_version(bytes: &[u8]) -> Result<String, MetadataError> {
    let Some(tag) = bytes.get(..VERSION_LEN) else {
        return Err(MetadataError::Truncated { expected: VERSION_LEN, actual: bytes.len() });
    };

    let len = tag.iter().position(|&b| b == 0).unwrap_or(VERSION_LEN);
    Ok(String::from_utf8_lossy(&tag[..len]).into_owned())
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]])
}

fn read_color(bytes: &[u8], offset: usize) -> Color {
    Color::rgba(bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3])
}

#[cfg(test)]
mod tests {
    use crate::graphics::Color;
    use crate::metadata::{
        HEADER_LEN, MetadataError, MetadataFlags, MetadataStore, MetadataUpdate, RECORD_LEN,
    };
    use crate::tile::TileHash;
    use test_log::test;

    fn sample_store() -> MetadataStore {
        let mut store = MetadataStore::new();
        store.upsert(
            TileHash(0xABCD),
            &MetadataUpdate {
                obj_color: Some(Color::rgb(255, 0, 0)),
                obj_z: Some(3),
                ..MetadataUpdate::default()
            },
        );
        store.upsert(
            TileHash(0x1234_5678),
            &MetadataUpdate {
                bg_color: Some(Color::rgba(10, 20, 30, 40)),
                win_color: Some(Color::rgb(50, 60, 70)),
                bg_front_z: Some(1),
                bg_back_z: Some(2),
                win_z: Some(4),
                obj_behind_z: Some(5),
                ..MetadataUpdate::default()
            },
        );
        store.add_flags(TileHash(0x1234_5678), MetadataFlags::DRAW_OBJ_ON_COLOR0);
        store
    }

    #[test]
    fn layout() {
        let store = sample_store();
        let bytes = store.serialize();

        assert_eq!(bytes.len(), 14 + 2 * 40);
        assert_eq!(bytes.len(), HEADER_LEN + 2 * RECORD_LEN);
        assert_eq!(&bytes[..10], b"0_1_0\0\0\0\0\0");
        assert_eq!(&bytes[10..14], &2_u32.to_le_bytes());

        // Records are sorted by hash, so 0xABCD comes first
        let record = &bytes[HEADER_LEN..HEADER_LEN + RECORD_LEN];
        assert_eq!(&record[0..4], &0xABCD_u32.to_le_bytes());
        assert_eq!(&record[12..16], &[255, 0, 0, 255]);
        assert_eq!(&record[28..32], &3_u32.to_le_bytes());
    }

    #[test]
    fn reads_hand_built_record() {
        let mut bytes = b"0_1_0\0\0\0\0\0".to_vec();
        bytes.extend(1_u32.to_le_bytes());
        bytes.extend(0x0102_0304_u32.to_le_bytes());
        bytes.extend([1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
        for value in [1_u32, 2, 3, 4, 5, 1] {
            bytes.extend(value.to_le_bytes());
        }
        assert_eq!(bytes.len(), 54);

        let mut store = MetadataStore::new();
        store.deserialize(&bytes).unwrap();

        let metadata = store.lookup(TileHash(0x0102_0304)).unwrap();
        assert_eq!(metadata.bg_color, Color::rgba(1, 2, 3, 4));
        assert_eq!(metadata.obj_color, Color::rgba(9, 10, 11, 12));
        assert_eq!(metadata.bg_front_z, 1);
        assert_eq!(metadata.obj_behind_z, 5);
        assert!(metadata.flags.contains(MetadataFlags::DRAW_OBJ_ON_COLOR0));
        assert_eq!(store.serialize(), bytes);
    }

    #[test]
    fn huge_count_is_truncated() {
        let mut bytes = b"0_1_0\0\0\0\0\0".to_vec();
        bytes.extend(u32::MAX.to_le_bytes());

        let mut store = sample_store();
        assert!(matches!(store.deserialize(&bytes), Err(MetadataError::Truncated { .. })));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn round_trip() {
        let store = sample_store();

        let mut restored = MetadataStore::new();
        restored.upsert(TileHash(999), &MetadataUpdate::default());
        restored.deserialize(&store.serialize()).unwrap();

        assert_eq!(restored.len(), 2);
        assert!(restored.lookup(TileHash(999)).is_none());
        for (hash, metadata) in store.iter() {
            assert_eq!(restored.lookup(hash), Some(metadata));
        }
    }

    #[test]
    fn round_trip_ignores_insertion_order() {
        let store = sample_store();
        let reversed: MetadataStore = {
            let mut entries: Vec<_> = store.iter().collect();
            entries.reverse();
            entries.into_iter().collect()
        };

        assert_eq!(store.serialize(), reversed.serialize());
    }

    #[test]
    fn unsupported_version_is_ignored() {
        let mut store = sample_store();

        let mut bytes = sample_store().serialize();
        bytes[..10].copy_from_slice(b"9_9_9\0\0\0\0\0");

        let result = store.deserialize(&bytes);
        assert!(matches!(result, Err(MetadataError::UnsupportedVersion(ref v)) if v == "9_9_9"));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn truncated_stream_leaves_store() {
        let mut store = sample_store();

        let bytes = sample_store().serialize();
        let result = store.deserialize(&bytes[..bytes.len() - 1]);
        assert!(matches!(result, Err(MetadataError::Truncated { .. })));
        assert!(matches!(store.deserialize(&bytes[..4]), Err(MetadataError::Truncated { .. })));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn empty_store() {
        let mut store = sample_store();
        store.deserialize(&MetadataStore::new().serialize()).unwrap();
        assert!(store.is_empty());
    }
}
