//! Standard MIDI File reader
//!
//! Chunk parsing is done by `midly`; this module maps its events onto the
//! crate's event model and lays out tracks by file format.

use super::event::{Event, EventKind, MetaKind, Sequence, Track};
use crate::error::{Error, Result};
use midly::{Format, MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};

/// Offset of the format field in the header chunk
const FORMAT_OFFSET: usize = 8;

/// Standard MIDI File reader
pub struct SmfReader<'a> {
    data: &'a [u8],
}

impl<'a> SmfReader<'a> {
    /// Create a new reader from raw SMF data
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Parse the whole file into a sequence
    ///
    /// Format 0 files are split into one track per channel, with meta and
    /// system exclusive events on the first track.
    pub fn parse_sequence(&self) -> Result<Sequence> {
        let smf = Smf::parse(self.data)?;

        let mut sequence = Sequence::new(String::new(), time_division(smf.header.timing));
        match smf.header.format {
            Format::SingleTrack => {
                sequence.tracks = (0..16).map(Track::new).collect();
                for event in smf.tracks.iter().flat_map(|track| convert_track(track)) {
                    let idx = if event.kind.is_channel_voice() {
                        usize::from(event.channel & 0x0F)
                    } else {
                        0
                    };
                    sequence.tracks[idx].events.push(event);
                }
            }
            Format::Parallel => {
                for track in &smf.tracks {
                    let events = convert_track(track);
                    let channel = events
                        .iter()
                        .find(|ev| ev.kind.is_channel_voice())
                        .map_or(0, |ev| ev.channel);
                    sequence.tracks.push(Track { channel, events });
                }
            }
            Format::Sequential => {
                return Err(Error::InvalidSmf {
                    offset: FORMAT_OFFSET,
                    reason: "unsupported MIDI format 2".to_string(),
                });
            }
        }

        sequence.name = sequence
            .tracks
            .first()
            .and_then(|track| {
                track.events.iter().find_map(|ev| match &ev.kind {
                    EventKind::Meta {
                        kind: MetaKind::SequenceName,
                        data,
                    } => Some(String::from_utf8_lossy(data).into_owned()),
                    _ => None,
                })
            })
            .unwrap_or_default();

        Ok(sequence)
    }
}

/// Raw division field of the header chunk
fn time_division(timing: Timing) -> u16 {
    match timing {
        Timing::Metrical(ticks) => ticks.as_int(),
        Timing::Timecode(fps, subframes) => {
            let frames = (fps.as_int() as i8).wrapping_neg() as u8;
            u16::from_be_bytes([frames, subframes])
        }
    }
}

/// Convert a track to absolute ticks
///
/// The end-of-track meta event is dropped.
fn convert_track(track: &[midly::TrackEvent<'_>]) -> Vec<Event> {
    let mut tick = 0u64;
    let mut events = Vec::with_capacity(track.len());

    for ev in track {
        tick += u64::from(ev.delta.as_int());
        let event = match ev.kind {
            TrackEventKind::Midi { channel, message } => {
                Some(Event::new(tick, channel.as_int(), channel_message(message)))
            }
            TrackEventKind::SysEx(data) => Some(sysex(tick, 0xF0, data)),
            TrackEventKind::Escape(data) => Some(sysex(tick, 0xF7, data)),
            TrackEventKind::Meta(meta) => meta_event(tick, meta),
        };
        events.extend(event);
    }

    events
}

fn channel_message(message: MidiMessage) -> EventKind {
    match message {
        MidiMessage::NoteOff { key, vel } => EventKind::NoteOff {
            key: key.as_int(),
            velocity: vel.as_int(),
        },
        MidiMessage::NoteOn { key, vel } => EventKind::NoteOn {
            key: key.as_int(),
            velocity: vel.as_int(),
        },
        MidiMessage::Aftertouch { key, vel } => EventKind::NoteAftertouch {
            key: key.as_int(),
            pressure: vel.as_int(),
        },
        MidiMessage::Controller { controller, value } => EventKind::Controller {
            controller: controller.as_int(),
            value: value.as_int(),
        },
        MidiMessage::ProgramChange { program } => EventKind::ProgramChange {
            program: program.as_int(),
        },
        MidiMessage::ChannelAftertouch { vel } => EventKind::ChannelAftertouch {
            pressure: vel.as_int(),
        },
        MidiMessage::PitchBend { bend } => {
            let value = bend.0.as_int();
            EventKind::PitchBend {
                lsb: (value & 0x7F) as u8,
                msb: (value >> 7) as u8,
            }
        }
    }
}

fn sysex(tick: u64, status: u8, data: &[u8]) -> Event {
    Event::new(
        tick,
        0,
        EventKind::SysEx {
            status,
            data: data.to_vec(),
        },
    )
}

/// Rebuild the raw type byte and payload of a meta event
fn meta_event(tick: u64, meta: MetaMessage<'_>) -> Option<Event> {
    let (kind, data) = match meta {
        MetaMessage::EndOfTrack => return None,
        MetaMessage::Tempo(micros) => return Some(Event::tempo(tick, micros.as_int())),
        MetaMessage::TrackNumber(number) => (
            MetaKind::Other(0x00),
            number.map(|n| n.to_be_bytes().to_vec()).unwrap_or_default(),
        ),
        MetaMessage::Text(text) => (MetaKind::Text, text.to_vec()),
        MetaMessage::Copyright(text) => (MetaKind::Other(0x02), text.to_vec()),
        MetaMessage::TrackName(text) => (MetaKind::SequenceName, text.to_vec()),
        MetaMessage::InstrumentName(text) => (MetaKind::Other(0x04), text.to_vec()),
        MetaMessage::Lyric(text) => (MetaKind::Other(0x05), text.to_vec()),
        MetaMessage::Marker(text) => (MetaKind::Other(0x06), text.to_vec()),
        MetaMessage::CuePoint(text) => (MetaKind::Other(0x07), text.to_vec()),
        MetaMessage::ProgramName(text) => (MetaKind::Other(0x08), text.to_vec()),
        MetaMessage::DeviceName(text) => (MetaKind::Other(0x09), text.to_vec()),
        MetaMessage::MidiChannel(channel) => (MetaKind::Other(0x20), vec![channel.as_int()]),
        MetaMessage::MidiPort(port) => (MetaKind::Other(0x21), vec![port.as_int()]),
        MetaMessage::SmpteOffset(time) => {
            let rate = match time.fps() {
                midly::Fps::Fps24 => 0,
                midly::Fps::Fps25 => 1,
                midly::Fps::Fps29 => 2,
                midly::Fps::Fps30 => 3,
            };
            (
                MetaKind::Other(0x54),
                vec![
                    (rate << 5) | time.hour(),
                    time.minute(),
                    time.second(),
                    time.frame(),
                    time.subframe(),
                ],
            )
        }
        MetaMessage::TimeSignature(numerator, denominator, clocks, notes) => (
            MetaKind::Other(0x58),
            vec![numerator, denominator, clocks, notes],
        ),
        MetaMessage::KeySignature(sharps, minor) => {
            (MetaKind::Other(0x59), vec![sharps as u8, u8::from(minor)])
        }
        MetaMessage::SequencerSpecific(data) => (MetaKind::Other(0x7F), data.to_vec()),
        MetaMessage::Unknown(kind, data) => (MetaKind::from_byte(kind), data.to_vec()),
    };
    Some(Event::meta(tick, kind, data))
}
