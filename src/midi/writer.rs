//! Standard MIDI File writer

use super::event::{Event, EventKind, Sequence, Track};
use super::vlq;
use crate::error::Result;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// SMF header and chunk constants
pub mod chunk {
    /// Header chunk identifier
    pub const HEADER_MAGIC: &[u8; 4] = b"MThd";
    /// Track chunk identifier
    pub const TRACK_MAGIC: &[u8; 4] = b"MTrk";
    /// Header chunk data length
    pub const HEADER_LENGTH: u32 = 6;
    /// Header chunk size including magic and length
    pub const HEADER_SIZE: usize = 14;
    /// Multi-track, synchronous
    pub const FORMAT_MULTI_TRACK: u16 = 1;
    /// Delta time, meta, end-of-track type, zero length
    pub const END_OF_TRACK: [u8; 4] = [0x00, 0xFF, 0x2F, 0x00];
}

/// Standard MIDI File writer
///
/// Every track is serialized into its own buffer first, so its chunk length
/// is known before the file is laid out.
pub struct SmfWriter {
    time_division: u16,
    tracks: Vec<Vec<u8>>,
}

impl SmfWriter {
    /// Create a new writer
    pub fn new(time_division: u16) -> Self {
        Self {
            time_division,
            tracks: Vec::new(),
        }
    }

    /// Serialize a track and queue it for output
    pub fn add_track(&mut self, track: &Track) {
        self.tracks.push(encode_track(track));
    }

    /// Number of queued tracks
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Lay out the complete file
    pub fn finish(&self) -> Vec<u8> {
        let body: usize = self.tracks.iter().map(|t| t.len() + 8).sum();
        let mut data = Vec::with_capacity(chunk::HEADER_SIZE + body);

        data.extend_from_slice(chunk::HEADER_MAGIC);
        data.extend_from_slice(&chunk::HEADER_LENGTH.to_be_bytes());
        data.extend_from_slice(&chunk::FORMAT_MULTI_TRACK.to_be_bytes());
        data.extend_from_slice(&(self.tracks.len() as u16).to_be_bytes());
        data.extend_from_slice(&self.time_division.to_be_bytes());

        for track in &self.tracks {
            data.extend_from_slice(chunk::TRACK_MAGIC);
            data.extend_from_slice(&(track.len() as u32).to_be_bytes());
            data.extend_from_slice(track);
        }

        data
    }

    /// Lay out the file and write it to `path`
    ///
    /// The file is only created once the whole image exists in memory.
    pub fn write_file(&self, path: &Path) -> Result<()> {
        let data = self.finish();
        let mut file = File::create(path)?;
        file.write_all(&data)?;
        file.flush()?;
        Ok(())
    }
}

/// Encode a whole sequence as a format 1 SMF
pub fn encode(sequence: &Sequence) -> Vec<u8> {
    let mut writer = SmfWriter::new(sequence.time_division);
    for track in &sequence.tracks {
        writer.add_track(track);
    }
    writer.finish()
}

/// Encode the data region of a track chunk (everything after the length field)
///
/// Events must already be sorted by tick.
pub fn encode_track(track: &Track) -> Vec<u8> {
    let mut data = Vec::new();
    let mut last_tick = 0u64;

    for event in &track.events {
        debug_assert!(event.tick >= last_tick, "track events must be sorted");
        vlq::write(&mut data, event.tick.saturating_sub(last_tick));
        write_event(&mut data, event);
        last_tick = event.tick;
    }

    data.extend_from_slice(&chunk::END_OF_TRACK);
    data
}

/// Append the raw bytes of an event (without delta time)
pub fn write_event(data: &mut Vec<u8>, event: &Event) {
    let channel = event.channel & 0x0F;

    match &event.kind {
        EventKind::NoteOff { key, velocity } => {
            data.extend_from_slice(&[0x80 | channel, key & 0x7F, velocity & 0x7F]);
        }
        EventKind::NoteOn { key, velocity } => {
            data.extend_from_slice(&[0x90 | channel, key & 0x7F, velocity & 0x7F]);
        }
        EventKind::NoteAftertouch { key, pressure } => {
            data.extend_from_slice(&[0xA0 | channel, key & 0x7F, pressure & 0x7F]);
        }
        EventKind::Controller { controller, value } => {
            data.extend_from_slice(&[0xB0 | channel, controller & 0x7F, value & 0x7F]);
        }
        EventKind::ProgramChange { program } => {
            data.extend_from_slice(&[0xC0 | channel, program & 0x7F]);
        }
        EventKind::ChannelAftertouch { pressure } => {
            data.extend_from_slice(&[0xD0 | channel, pressure & 0x7F]);
        }
        EventKind::PitchBend { lsb, msb } => {
            data.extend_from_slice(&[0xE0 | channel, lsb & 0x7F, msb & 0x7F]);
        }
        EventKind::Meta { kind, data: payload } => {
            data.push(0xFF);
            data.push(kind.as_byte());
            vlq::write(data, payload.len() as u64);
            data.extend_from_slice(payload);
        }
        EventKind::SysEx {
            status,
            data: payload,
        } => {
            data.push(*status);
            vlq::write(data, payload.len() as u64);
            data.extend_from_slice(payload);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::event::MetaKind;

    #[test]
    fn test_empty_file_header() {
        let writer = SmfWriter::new(96);
        assert_eq!(
            writer.finish(),
            vec![b'M', b'T', b'h', b'd', 0, 0, 0, 6, 0, 1, 0, 0, 0, 96]
        );
    }

    #[test]
    fn test_empty_track() {
        let track = Track::new(0);
        assert_eq!(encode_track(&track), chunk::END_OF_TRACK.to_vec());
    }

    #[test]
    fn test_delta_times() {
        let mut track = Track::new(2);
        track.events.push(Event::note_on(10, 2, 60, 100));
        track.events.push(Event::note_off(200, 2, 60));

        assert_eq!(
            encode_track(&track),
            vec![
                0x0A, 0x92, 60, 100, // first delta is the absolute tick
                0x81, 0x3E, 0x82, 60, 0, // 190 = 0x81 0x3E
                0x00, 0xFF, 0x2F, 0x00,
            ]
        );
    }

    #[test]
    fn test_two_byte_messages() {
        let mut data = Vec::new();
        write_event(&mut data, &Event::program_change(0, 1, 40));
        write_event(
            &mut data,
            &Event::new(0, 1, EventKind::ChannelAftertouch { pressure: 5 }),
        );
        assert_eq!(data, vec![0xC1, 40, 0xD1, 5]);
    }

    #[test]
    fn test_meta_event() {
        let mut data = Vec::new();
        write_event(&mut data, &Event::meta(0, MetaKind::SequenceName, b"abc".to_vec()));
        assert_eq!(data, vec![0xFF, 0x03, 0x03, b'a', b'b', b'c']);
    }

    #[test]
    fn test_channel_nibble_is_masked() {
        let mut data = Vec::new();
        write_event(&mut data, &Event::controller(0, 17, 7, 100));
        assert_eq!(data, vec![0xB1, 7, 100]);
    }

    #[test]
    fn test_track_length_field() {
        let mut track = Track::new(0);
        track.events.push(Event::text(0, "end"));
        let seq = Sequence {
            name: String::new(),
            time_division: 96,
            tracks: vec![track.clone()],
        };
        let data = encode(&seq);
        let body = encode_track(&track);

        assert_eq!(&data[14..18], b"MTrk");
        assert_eq!(&data[18..22], &(body.len() as u32).to_be_bytes());
        assert_eq!(data.len(), 22 + body.len());
    }
}
