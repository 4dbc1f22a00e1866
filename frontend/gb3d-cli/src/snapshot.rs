//! Raw dumps of the video state: VRAM ($8000-$9FFF), OAM ($FE00-$FE9F), then IO $FF40-$FF4B

use gb3d_core::ppu::registers::{IO_REGISTERS_LEN, Registers};
use gb3d_core::ppu::{OAM_LEN, Oam, VRAM_LEN, Vram};
use std::path::Path;
use std::{fs, io};
use thiserror::Error;

pub const SNAPSHOT_LEN: usize = VRAM_LEN + OAM_LEN + IO_REGISTERS_LEN;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Error reading snapshot '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("Snapshot is {actual} bytes, expected {expected}")]
    Length { expected: usize, actual: usize },
}

#[derive(Debug, Clone)]
pub struct Snapshot {
    pub vram: Box<Vram>,
    pub oam: Box<Oam>,
    pub registers: Registers,
}

impl Snapshot {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SnapshotError> {
        if bytes.len() != SNAPSHOT_LEN {
            return Err(SnapshotError::Length { expected: SNAPSHOT_LEN, actual: bytes.len() });
        }

        let (vram_bytes, rest) = bytes.split_at(VRAM_LEN);
        let (oam_bytes, io_bytes) = rest.split_at(OAM_LEN);

        let mut vram = Box::new([0; VRAM_LEN]);
        vram.copy_from_slice(vram_bytes);

        let mut oam = Box::new([0; OAM_LEN]);
        oam.copy_from_slice(oam_bytes);

        let mut io = [0; IO_REGISTERS_LEN];
        io.copy_from_slice(io_bytes);

        Ok(Self { vram, oam, registers: Registers::from_io(&io) })
    }

    pub fn read(path: &Path) -> Result<Self, SnapshotError> {
        let bytes = fs::read(path)
            .map_err(|source| SnapshotError::Io { path: path.display().to_string(), source })?;
        Self::from_bytes(&bytes)
    }
}
