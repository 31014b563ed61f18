//! DSE sequence to Standard MIDI File conversion
//!
//! Header parse, per-track decode, tick sort, channel assignment, SMF encode.

pub mod channels;

use crate::dse::{decode_track, DecodeState, SequenceHeader};
use crate::error::{Error, Result};
use crate::midi::event::{Event, MetaKind, Sequence, Track};
use crate::midi::writer::{self, SmfWriter};
use crate::tables::ConversionTables;
use std::fs;
use std::path::Path;

pub use channels::assign_channels;

/// Ticks per quarter note of the output
pub const TIME_DIVISION: u16 = 96;

/// A decoded sequence plus the problems skipped while decoding it
#[derive(Debug)]
pub struct LoadedSequence {
    pub sequence: Sequence,
    /// Recoverable errors, in track order
    pub warnings: Vec<Error>,
}

/// DSE to MIDI converter
#[derive(Debug, Clone, Default)]
pub struct Converter {
    tables: ConversionTables,
}

impl Converter {
    /// Converter with identity maps and no transposition
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tables(tables: ConversionTables) -> Self {
        Self { tables }
    }

    /// Decode a DSE sequence into sorted, channel-mapped tracks
    pub fn load_sequence(&self, data: &[u8]) -> Result<LoadedSequence> {
        let header = SequenceHeader::parse(data)?;
        tracing::debug!(
            name = %header.name,
            tracks = header.track_count,
            "parsed sequence header"
        );

        let mut sequence = Sequence::new(header.name.clone(), TIME_DIVISION);
        let mut warnings = Vec::new();

        for (index, chunk) in header.tracks.iter().enumerate() {
            let decoded = decode_track(data, chunk, index, &self.tables, DecodeState::default())?;

            let mut track = Track::new(index as u8);
            if index == 0 {
                track.events.push(Event::meta(
                    0,
                    MetaKind::SequenceName,
                    header.name.as_bytes().to_vec(),
                ));
            }
            track.events.extend(decoded.events);
            // Note offs are scheduled ahead of the cursor
            track.sort_events();

            sequence.tracks.push(track);
            warnings.extend(decoded.warnings);
        }

        assign_channels(&mut sequence.tracks);

        Ok(LoadedSequence { sequence, warnings })
    }

    /// Convert a DSE sequence to SMF bytes
    pub fn convert(&self, data: &[u8]) -> Result<Vec<u8>> {
        let loaded = self.load_sequence(data)?;
        Ok(writer::encode(&loaded.sequence))
    }

    /// Convert `input` and write the result to `output`
    ///
    /// The output file is only created after the conversion succeeded.
    pub fn convert_file(&self, input: &Path, output: &Path) -> Result<LoadedSequence> {
        let data = fs::read(input)?;
        let loaded = self.load_sequence(&data)?;

        let mut smf = SmfWriter::new(loaded.sequence.time_division);
        for track in &loaded.sequence.tracks {
            smf.add_track(track);
        }
        smf.write_file(output)?;

        tracing::info!(
            input = %input.display(),
            output = %output.display(),
            tracks = smf.track_count(),
            "wrote MIDI file"
        );
        Ok(loaded)
    }
}
