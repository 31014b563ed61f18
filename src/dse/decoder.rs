//! Track opcode interpreter
//!
//! Turns the opcode stream of one DSE track into timestamped MIDI events.
//! Delays are given in DSE ticks and doubled on output.

use super::header::TrackChunk;
use super::opcodes::{self, Handler, DELAY_TABLE};
use super::reader::ByteReader;
use crate::error::{Error, Result};
use crate::midi::event::{controller, Event, MetaKind};
use crate::tables::ConversionTables;

/// Text written when the track ends
pub const END_TEXT: &str = "end";

/// Text written at the loop point
pub const LOOP_START_TEXT: &str = "loopStart";

/// Pitch bend range set before the first bend of a track (semitones)
pub const BEND_RANGE: u8 = 8;

/// Mutable interpreter state for one track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeState {
    /// Absolute position in output ticks
    pub tick: u64,
    pub octave: i32,
    /// Last DSE program selected (before program map lookup)
    pub program: u8,
    /// Note length reused by notes without length bytes
    pub last_note_length: u32,
    /// Delay reused by the repeat/add delay opcodes
    pub last_delay: i32,
    /// Whether the pitch bend range has been sent
    pub bend_initialized: bool,
}

impl Default for DecodeState {
    fn default() -> Self {
        Self {
            tick: 0,
            octave: 0,
            program: 0,
            last_note_length: 1,
            last_delay: 0,
            bend_initialized: false,
        }
    }
}

impl DecodeState {
    fn advance(&mut self) {
        self.tick += 2 * self.last_delay.max(0) as u64;
    }
}

/// Result of decoding one track
#[derive(Debug)]
pub struct DecodedTrack {
    /// Events in emission order (not yet sorted)
    pub events: Vec<Event>,
    /// State after the end-of-track opcode
    pub state: DecodeState,
    /// Recoverable problems, in stream order
    pub warnings: Vec<Error>,
}

/// Decode the opcode stream of a track
///
/// `index` identifies the track in diagnostics and is the provisional
/// channel of every emitted channel message.
pub fn decode_track(
    data: &[u8],
    chunk: &TrackChunk,
    index: usize,
    tables: &ConversionTables,
    state: DecodeState,
) -> Result<DecodedTrack> {
    let mut reader = ByteReader::new(data);
    reader.seek(chunk.opcode_offset());

    let mut decoder = TrackDecoder {
        reader,
        tables,
        index,
        channel: index as u8,
        state,
        events: Vec::new(),
        warnings: Vec::new(),
    };
    decoder.run()?;

    tracing::debug!(
        track = index,
        events = decoder.events.len(),
        end_tick = decoder.state.tick,
        "decoded track"
    );

    Ok(DecodedTrack {
        events: decoder.events,
        state: decoder.state,
        warnings: decoder.warnings,
    })
}

struct TrackDecoder<'a> {
    reader: ByteReader<'a>,
    tables: &'a ConversionTables,
    index: usize,
    channel: u8,
    state: DecodeState,
    events: Vec<Event>,
    warnings: Vec<Error>,
}

/// Whether to keep interpreting after an opcode
enum Flow {
    Continue,
    Stop,
}

impl TrackDecoder<'_> {
    fn run(&mut self) -> Result<()> {
        loop {
            let offset = self.reader.position();
            let op = self.reader.read_u8()?;
            if let Flow::Stop = self.apply(op, offset)? {
                return Ok(());
            }
        }
    }

    fn apply(&mut self, op: u8, offset: usize) -> Result<Flow> {
        let tick = self.state.tick;

        match opcodes::handler(op) {
            Handler::Note => self.note(op, offset)?,
            Handler::FixedDelay(index) => {
                self.state.last_delay = i32::from(DELAY_TABLE[usize::from(index)]);
                self.state.advance();
            }
            Handler::RepeatDelay => self.state.advance(),
            Handler::AddDelay => {
                let delta = self.reader.read_i8()?;
                self.state.last_delay = (self.state.last_delay + i32::from(delta)).max(0);
                self.state.advance();
            }
            Handler::Delay8 => {
                self.state.last_delay = i32::from(self.reader.read_u8()?);
                self.state.advance();
            }
            Handler::Delay16 => {
                self.state.last_delay = i32::from(self.reader.read_u16_le()?);
                self.state.advance();
            }
            Handler::EndOfTrack => {
                self.events.push(Event::text(tick, END_TEXT));
                return Ok(Flow::Stop);
            }
            Handler::LoopStart => self.events.push(Event::text(tick, LOOP_START_TEXT)),
            Handler::SetOctave => self.state.octave = i32::from(self.reader.read_u8()?),
            Handler::Tempo => {
                let bpm = self.reader.read_u8()?;
                match tempo_micros(bpm) {
                    Some(micros) => self.events.push(Event::tempo(tick, micros)),
                    None => self.warn(Error::ZeroTempo {
                        track: self.index,
                        offset,
                    }),
                }
            }
            Handler::Program => {
                // Programs are 7-bit; key mapping and drum detection see the same value
                let program = self.reader.read_u8()? & 0x7F;
                self.state.program = program;
                let mapped = self.tables.map_program(program);
                let event = Event::program_change(tick, self.channel, mapped);
                self.events.push(event);
            }
            Handler::Controller(number) => {
                let value = self.reader.read_u8()?;
                let event = Event::controller(tick, self.channel, number, value);
                self.events.push(event);
            }
            Handler::PitchBend => self.pitch_bend()?,
            Handler::Passthrough(arity) => {
                let args = self.reader.read_bytes(usize::from(arity))?;
                self.events.push(Event::meta(
                    tick,
                    MetaKind::Text,
                    passthrough_text(op, args).into_bytes(),
                ));
            }
            Handler::Unknown => {
                return Err(Error::UnknownOpcode { opcode: op, offset });
            }
        }

        Ok(Flow::Continue)
    }

    /// Note opcode: velocity in the opcode, octave/key/length in the arguments
    fn note(&mut self, velocity: u8, offset: usize) -> Result<()> {
        let arg = self.reader.read_u8()?;

        self.state.octave += i32::from((arg >> 4) & 0x3) - 2;
        let key = self.state.octave * 12 + i32::from(arg & 0xF);

        let length_bytes = (arg >> 6) & 0x3;
        if length_bytes != 0 {
            let mut length = 0u32;
            for _ in 0..length_bytes {
                length = (length << 8) | u32::from(self.reader.read_u8()?);
            }
            self.state.last_note_length = length;
        }
        let length = self.state.last_note_length;

        let mapped = u8::try_from(key)
            .ok()
            .filter(|k| *k <= 0x7F)
            .and_then(|k| self.tables.map_key(self.state.program, k));
        let Some(key) = mapped else {
            self.warn(Error::InvalidNoteKey {
                track: self.index,
                key,
                offset,
            });
            return Ok(());
        };

        let tick = self.state.tick;
        let on = Event::note_on(tick, self.channel, key, velocity);
        let off = Event::note_off(note_off_tick(tick, length), self.channel, key);
        self.events.push(on);
        self.events.push(off);
        Ok(())
    }

    fn pitch_bend(&mut self) -> Result<()> {
        let raw = self.reader.read_u16_be()?;

        if !self.state.bend_initialized {
            // RPN 0 (pitch bend sensitivity) at the start of the track
            for (number, value) in [
                (controller::RPN_MSB, 0),
                (controller::RPN_LSB, 0),
                (controller::DATA_ENTRY_MSB, BEND_RANGE),
                (controller::DATA_ENTRY_LSB, 0),
            ] {
                let event = Event::controller(0, self.channel, number, value);
                self.events.push(event);
            }
            self.state.bend_initialized = true;
        }

        let (lsb, msb) = bend_value(raw as i16);
        let event = Event::pitch_bend(self.state.tick, self.channel, lsb, msb);
        self.events.push(event);
        Ok(())
    }

    fn warn(&mut self, warning: Error) {
        tracing::warn!("{}", warning);
        self.warnings.push(warning);
    }
}

/// Tick of the note off for a note starting at `tick`
pub fn note_off_tick(tick: u64, length: u32) -> u64 {
    (tick + 2 * u64::from(length)).saturating_sub(1).max(tick)
}

/// Microseconds per quarter note for a tempo in BPM
pub fn tempo_micros(bpm: u8) -> Option<u32> {
    (bpm != 0).then(|| 60_000_000 / u32::from(bpm))
}

/// Split a signed 16-bit DSE bend into 14-bit MIDI (lsb, msb)
pub fn bend_value(raw: i16) -> (u8, u8) {
    let pitch = (raw as u16).wrapping_add(0x8000);
    (((pitch >> 2) & 0x7F) as u8, (pitch >> 9) as u8)
}

fn passthrough_text(op: u8, args: &[u8]) -> String {
    let mut text = format!("{op:02X}");
    for b in args {
        text.push_str(&format!(":{b:02X}"));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::event::EventKind;

    fn decode(body: &[u8]) -> Result<DecodedTrack> {
        decode_with(body, &ConversionTables::default())
    }

    fn decode_with(body: &[u8], tables: &ConversionTables) -> Result<DecodedTrack> {
        // Place the stream where a real track would start: chunk at 0, data at 0x10
        let mut data = vec![0u8; 0x14];
        data.extend_from_slice(body);
        let chunk = TrackChunk {
            offset: 0,
            data_offset: 0x10,
            length: data.len() - 0x10,
        };
        decode_track(&data, &chunk, 0, tables, DecodeState::default())
    }

    fn ticks_of(events: &[Event], pred: impl Fn(&EventKind) -> bool) -> Vec<u64> {
        events
            .iter()
            .filter(|ev| pred(&ev.kind))
            .map(|ev| ev.tick)
            .collect()
    }

    #[test]
    fn test_tempo_conversion() {
        assert_eq!(tempo_micros(120), Some(500_000));
        assert_eq!(tempo_micros(60), Some(1_000_000));
        assert_eq!(tempo_micros(0), None);
    }

    #[test]
    fn test_note_off_tick() {
        assert_eq!(note_off_tick(0, 48), 95);
        assert_eq!(note_off_tick(100, 1), 101);
        assert_eq!(note_off_tick(100, 0), 100);
        assert_eq!(note_off_tick(0, 0), 0);
    }

    #[test]
    fn test_bend_value() {
        assert_eq!(bend_value(0), (0x00, 0x40));
        assert_eq!(bend_value(i16::MIN), (0x00, 0x00));
        assert_eq!(bend_value(i16::MAX), (0x7F, 0x7F));
    }

    #[test]
    fn test_fixed_delays() {
        let track = decode(&[0x88, 0x99, 0x8F, 0x98]).unwrap();
        assert_eq!(track.events[0].tick, 32);
        assert_eq!(track.state.tick, 36);
        assert_eq!(track.state.last_delay, 2);
    }

    #[test]
    fn test_delay_forms() {
        // 0x92 sets 10, 0x90 repeats, 0x91 subtracts 4, 0x93 sets 0x0102
        let track = decode(&[0x92, 10, 0x90, 0x91, 0xFC, 0x93, 0x02, 0x01, 0x98]).unwrap();
        assert_eq!(track.state.tick, 20 + 20 + 12 + 2 * 0x0102);
        assert_eq!(track.state.last_delay, 0x0102);
    }

    #[test]
    fn test_add_delay_floors_at_zero() {
        let track = decode(&[0x92, 3, 0x91, 0x80, 0x90, 0x98]).unwrap();
        assert_eq!(track.state.last_delay, 0);
        assert_eq!(track.state.tick, 6);
    }

    #[test]
    fn test_note() {
        // octave 4, delta 0 (bits 0b10), one length byte, key 0
        let track = decode(&[0xA0, 4, 100, 0b0110_0000, 48, 0x98]).unwrap();
        assert_eq!(track.events[0], Event::note_on(0, 0, 48, 100));
        assert_eq!(track.events[1], Event::note_off(95, 0, 48));
        assert_eq!(track.state.last_note_length, 48);
    }

    #[test]
    fn test_note_reuses_length_and_moves_octave() {
        // second note: octave delta +1, no length bytes
        let track = decode(&[0xA0, 4, 100, 0b0110_0000, 12, 0x8B, 90, 0b0011_0010, 0x98]).unwrap();
        assert_eq!(track.state.octave, 5);
        assert_eq!(track.events[2], Event::note_on(16, 0, 62, 90));
        assert_eq!(track.events[3], Event::note_off(16 + 23, 0, 62));
    }

    #[test]
    fn test_note_multi_byte_length() {
        // two length bytes, octave delta 0
        let track = decode(&[0xA0, 4, 100, 0b1010_0000, 0x01, 0x00, 0x98]).unwrap();
        assert_eq!(track.state.last_note_length, 0x100);
        assert_eq!(track.events[1].tick, 0x200 - 1);
    }

    #[test]
    fn test_invalid_key_dropped() {
        // octave 0 with delta -2 gives a negative key; length bytes still consumed
        let track = decode(&[100, 0b0100_0000, 7, 0x99, 0x98]).unwrap();
        assert_eq!(track.warnings.len(), 1);
        assert!(matches!(
            track.warnings[0],
            Error::InvalidNoteKey { key: -24, offset: 0x14, .. }
        ));
        assert_eq!(track.state.last_note_length, 7);
        assert_eq!(track.events.len(), 2);
        assert_eq!(track.events[0], Event::text(0, LOOP_START_TEXT));
    }

    #[test]
    fn test_key_above_range_dropped() {
        let track = decode(&[0xA0, 11, 100, 0b0010_0000, 0x98]).unwrap();
        assert_eq!(track.warnings.len(), 1);
        assert!(!track
            .events
            .iter()
            .any(|ev| matches!(ev.kind, EventKind::NoteOn { .. })));
    }

    #[test]
    fn test_drum_program_uses_drum_map() {
        let mut tables = ConversionTables::default();
        tables.drum_map[48] = 36;
        tables.transpose[127] = 12;
        let track = decode_with(
            &[0xAC, 127, 0xA0, 4, 100, 0b0110_0000, 4, 0x98],
            &tables,
        )
        .unwrap();
        assert_eq!(track.events[0], Event::program_change(0, 0, 127));
        assert_eq!(track.events[1], Event::note_on(0, 0, 36, 100));
    }

    #[test]
    fn test_program_high_bit_ignored() {
        let mut tables = ConversionTables::default();
        tables.drum_map[48] = 36;
        tables.transpose[127] = 12;
        let track = decode_with(&[0xAC, 0xFF, 0xA0, 4, 100, 0b0110_0000, 4, 0x98], &tables)
            .unwrap();
        assert_eq!(track.state.program, 127);
        assert_eq!(track.events[0], Event::program_change(0, 0, 127));
        assert_eq!(track.events[1], Event::note_on(0, 0, 36, 100));
    }

    #[test]
    fn test_program_map_and_transpose() {
        let mut tables = ConversionTables::default();
        tables.program_map[5] = 33;
        tables.transpose[5] = -12;
        let track =
            decode_with(&[0xAC, 5, 0xA0, 5, 100, 0b0110_0000, 4, 0x98], &tables).unwrap();
        assert_eq!(track.events[0], Event::program_change(0, 0, 33));
        assert_eq!(track.events[1], Event::note_on(0, 0, 48, 100));
        assert_eq!(track.state.program, 5);
    }

    #[test]
    fn test_tempo_event() {
        let track = decode(&[0xA4, 120, 0x98]).unwrap();
        assert_eq!(track.events[0], Event::tempo(0, 500_000));
    }

    #[test]
    fn test_zero_tempo_warns() {
        let track = decode(&[0xA4, 0, 0x98]).unwrap();
        assert!(matches!(track.warnings[0], Error::ZeroTempo { .. }));
        assert_eq!(track.events, vec![Event::text(0, END_TEXT)]);
    }

    #[test]
    fn test_controllers() {
        let track = decode(&[0xBE, 1, 0xE0, 2, 0xE3, 3, 0xE8, 4, 0x98]).unwrap();
        let ccs: Vec<(u8, u8)> = track
            .events
            .iter()
            .filter_map(|ev| match ev.kind {
                EventKind::Controller { controller, value } => Some((controller, value)),
                _ => None,
            })
            .collect();
        assert_eq!(ccs, vec![(1, 1), (7, 2), (11, 3), (10, 4)]);
    }

    #[test]
    fn test_pitch_bend_range_sent_once() {
        let track = decode(&[0x8B, 0xD7, 0x00, 0x00, 0x8B, 0xD7, 0x10, 0x00, 0x98]).unwrap();
        let ccs = ticks_of(&track.events, |k| matches!(k, EventKind::Controller { .. }));
        assert_eq!(ccs, vec![0, 0, 0, 0]);
        assert_eq!(
            track.events[2],
            Event::controller(0, 0, controller::DATA_ENTRY_MSB, BEND_RANGE)
        );
        assert_eq!(track.events[4], Event::pitch_bend(16, 0, 0x00, 0x40));
        assert_eq!(track.events[5], Event::pitch_bend(32, 0, 0x00, 0x48));
        assert!(track.state.bend_initialized);
    }

    #[test]
    fn test_passthrough_keeps_sync() {
        let track = decode(&[0xDC, 1, 2, 3, 4, 5, 0x9D, 0xA8, 0xAB, 0xCD, 0x98]).unwrap();
        assert_eq!(track.events[0], Event::text(0, "DC:01:02:03:04:05"));
        assert_eq!(track.events[1], Event::text(0, "9D"));
        assert_eq!(track.events[2], Event::text(0, "A8:AB:CD"));
        assert_eq!(track.events[3], Event::text(0, END_TEXT));
    }

    #[test]
    fn test_unknown_opcode_offset() {
        match decode(&[0x99, 0x8B, 0xF0, 0x98]) {
            Err(Error::UnknownOpcode { opcode, offset }) => {
                assert_eq!(opcode, 0xF0);
                assert_eq!(offset, 0x14 + 2);
            }
            other => panic!("expected UnknownOpcode, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_end_is_truncated() {
        assert!(matches!(
            decode(&[0x99, 0x8B]),
            Err(Error::TruncatedFile { .. })
        ));
    }

    #[test]
    fn test_state_is_threaded() {
        let mut data = vec![0u8; 0x14];
        data.extend_from_slice(&[0x90, 0x98]);
        let chunk = TrackChunk {
            offset: 0,
            data_offset: 0x10,
            length: 6,
        };
        let state = DecodeState {
            tick: 10,
            last_delay: 5,
            ..DecodeState::default()
        };
        let track = decode_track(&data, &chunk, 2, &ConversionTables::default(), state).unwrap();
        assert_eq!(track.state.tick, 20);
        assert_eq!(track.events, vec![Event::text(20, END_TEXT)]);
    }
}
