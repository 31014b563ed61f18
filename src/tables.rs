//! Program, drum-key and transpose lookup tables

use crate::error::Result;
use std::fs;
use std::io;
use std::path::Path;

/// Size of every lookup table
pub const TABLE_SIZE: usize = 128;

/// Default file names looked up by the command line driver
pub mod file {
    pub const PROGRAM_MAP: &str = "midimap.bin";
    pub const DRUM_MAP: &str = "drummap.bin";
    pub const TRANSPOSE: &str = "transpose.bin";
}

/// Lookup tables applied while decoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionTables {
    /// DSE program -> General MIDI program
    pub program_map: [u8; TABLE_SIZE],
    /// DSE key -> General MIDI percussion key (program 127 only)
    pub drum_map: [u8; TABLE_SIZE],
    /// Semitone offset per DSE program
    pub transpose: [i8; TABLE_SIZE],
}

impl Default for ConversionTables {
    fn default() -> Self {
        Self {
            program_map: identity(),
            drum_map: identity(),
            transpose: [0; TABLE_SIZE],
        }
    }
}

impl ConversionTables {
    /// Build tables from raw side-table contents
    ///
    /// A table that is absent or not exactly 128 bytes keeps its default.
    pub fn from_slices(
        program_map: Option<&[u8]>,
        drum_map: Option<&[u8]>,
        transpose: Option<&[u8]>,
    ) -> Self {
        let mut tables = Self::default();
        if let Some(map) = table_from(program_map, "program map") {
            tables.program_map = map;
        }
        if let Some(map) = table_from(drum_map, "drum map") {
            tables.drum_map = map;
        }
        if let Some(map) = table_from(transpose, "transpose") {
            tables.transpose = map.map(|b| b as i8);
        }
        tables
    }

    /// Load side tables from optional paths
    ///
    /// A path that does not exist keeps the default table.
    pub fn load(
        program_map: Option<&Path>,
        drum_map: Option<&Path>,
        transpose: Option<&Path>,
    ) -> Result<Self> {
        let program_map = read_optional(program_map)?;
        let drum_map = read_optional(drum_map)?;
        let transpose = read_optional(transpose)?;
        Ok(Self::from_slices(
            program_map.as_deref(),
            drum_map.as_deref(),
            transpose.as_deref(),
        ))
    }

    /// Key sent for `key` while `program` is selected, if it is a valid MIDI key
    pub fn map_key(&self, program: u8, key: u8) -> Option<u8> {
        let index = usize::from(key);
        let mapped = if program == crate::midi::event::DRUM_PROGRAM {
            i32::from(*self.drum_map.get(index)?)
        } else {
            let shift = self.transpose[usize::from(program & 0x7F)];
            i32::from(key) + i32::from(shift)
        };
        u8::try_from(mapped).ok().filter(|k| *k <= 0x7F)
    }

    /// General MIDI program for a DSE program
    pub fn map_program(&self, program: u8) -> u8 {
        self.program_map[usize::from(program & 0x7F)]
    }
}

fn identity() -> [u8; TABLE_SIZE] {
    std::array::from_fn(|i| i as u8)
}

fn table_from(data: Option<&[u8]>, name: &str) -> Option<[u8; TABLE_SIZE]> {
    let data = data?;
    match <[u8; TABLE_SIZE]>::try_from(data) {
        Ok(table) => Some(table),
        Err(_) => {
            tracing::warn!(
                table = name,
                size = data.len(),
                "side table is not {} bytes, using default",
                TABLE_SIZE
            );
            None
        }
    }
}

fn read_optional(path: Option<&Path>) -> Result<Option<Vec<u8>>> {
    let Some(path) = path else {
        return Ok(None);
    };
    match fs::read(path) {
        Ok(data) => {
            tracing::debug!(path = %path.display(), "loaded side table");
            Ok(Some(data))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
