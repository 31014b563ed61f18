//! Timestamped MIDI event model

use serde::{Serialize, Serializer};

/// Controller numbers used by the converter
pub mod controller {
    pub const MODULATION: u8 = 1;
    pub const DATA_ENTRY_MSB: u8 = 6;
    pub const VOLUME: u8 = 7;
    pub const PAN: u8 = 10;
    pub const EXPRESSION: u8 = 11;
    pub const DATA_ENTRY_LSB: u8 = 38;
    pub const RPN_LSB: u8 = 100;
    pub const RPN_MSB: u8 = 101;
}

/// Channel reserved for percussion (MIDI channel 10)
pub const DRUM_CHANNEL: u8 = 9;

/// Program number that marks a drum track
pub const DRUM_PROGRAM: u8 = 127;

/// Meta event type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetaKind {
    Text,
    SequenceName,
    EndOfTrack,
    Tempo,
    Other(u8),
}

impl MetaKind {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0x01 => MetaKind::Text,
            0x03 => MetaKind::SequenceName,
            0x2F => MetaKind::EndOfTrack,
            0x51 => MetaKind::Tempo,
            other => MetaKind::Other(other),
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            MetaKind::Text => 0x01,
            MetaKind::SequenceName => 0x03,
            MetaKind::EndOfTrack => 0x2F,
            MetaKind::Tempo => 0x51,
            MetaKind::Other(byte) => byte,
        }
    }
}

/// Event payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    NoteOff { key: u8, velocity: u8 },
    NoteOn { key: u8, velocity: u8 },
    NoteAftertouch { key: u8, pressure: u8 },
    Controller { controller: u8, value: u8 },
    ProgramChange { program: u8 },
    ChannelAftertouch { pressure: u8 },
    PitchBend { lsb: u8, msb: u8 },
    Meta {
        kind: MetaKind,
        #[serde(serialize_with = "serialize_payload")]
        data: Vec<u8>,
    },
    SysEx {
        status: u8,
        #[serde(serialize_with = "serialize_payload")]
        data: Vec<u8>,
    },
}

impl EventKind {
    /// Whether this is a channel voice message
    pub fn is_channel_voice(&self) -> bool {
        !matches!(self, EventKind::Meta { .. } | EventKind::SysEx { .. })
    }

    /// Status nibble of a channel voice message
    pub fn status(&self) -> Option<u8> {
        match self {
            EventKind::NoteOff { .. } => Some(0x80),
            EventKind::NoteOn { .. } => Some(0x90),
            EventKind::NoteAftertouch { .. } => Some(0xA0),
            EventKind::Controller { .. } => Some(0xB0),
            EventKind::ProgramChange { .. } => Some(0xC0),
            EventKind::ChannelAftertouch { .. } => Some(0xD0),
            EventKind::PitchBend { .. } => Some(0xE0),
            EventKind::Meta { .. } | EventKind::SysEx { .. } => None,
        }
    }
}

/// Event with timing and channel info
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    /// Absolute time in ticks
    pub tick: u64,
    /// Channel (only meaningful for channel voice messages)
    pub channel: u8,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl Event {
    pub fn new(tick: u64, channel: u8, kind: EventKind) -> Self {
        Self {
            tick,
            channel,
            kind,
        }
    }

    pub fn note_on(tick: u64, channel: u8, key: u8, velocity: u8) -> Self {
        Self::new(tick, channel, EventKind::NoteOn { key, velocity })
    }

    pub fn note_off(tick: u64, channel: u8, key: u8) -> Self {
        Self::new(tick, channel, EventKind::NoteOff { key, velocity: 0 })
    }

    pub fn controller(tick: u64, channel: u8, controller: u8, value: u8) -> Self {
        Self::new(tick, channel, EventKind::Controller { controller, value })
    }

    pub fn program_change(tick: u64, channel: u8, program: u8) -> Self {
        Self::new(tick, channel, EventKind::ProgramChange { program })
    }

    pub fn pitch_bend(tick: u64, channel: u8, lsb: u8, msb: u8) -> Self {
        Self::new(tick, channel, EventKind::PitchBend { lsb, msb })
    }

    pub fn meta(tick: u64, kind: MetaKind, data: Vec<u8>) -> Self {
        Self::new(tick, 0, EventKind::Meta { kind, data })
    }

    pub fn text(tick: u64, text: &str) -> Self {
        Self::meta(tick, MetaKind::Text, text.as_bytes().to_vec())
    }

    /// Tempo meta event, `micros_per_beat` stored as 24-bit big endian
    pub fn tempo(tick: u64, micros_per_beat: u32) -> Self {
        let bytes = micros_per_beat.to_be_bytes();
        Self::meta(tick, MetaKind::Tempo, bytes[1..].to_vec())
    }
}

/// A track: ordered events plus its output channel
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Track {
    pub channel: u8,
    pub events: Vec<Event>,
}

impl Track {
    pub fn new(channel: u8) -> Self {
        Self {
            channel,
            events: Vec::new(),
        }
    }

    /// Stable sort of the events by absolute tick
    pub fn sort_events(&mut self) {
        self.events.sort_by_key(|ev| ev.tick);
    }

    pub fn contains_program(&self, program: u8) -> bool {
        self.events
            .iter()
            .any(|ev| matches!(ev.kind, EventKind::ProgramChange { program: p } if p == program))
    }

    pub fn contains_notes(&self) -> bool {
        self.events
            .iter()
            .any(|ev| matches!(ev.kind, EventKind::NoteOn { .. }))
    }

    /// Move the track and all its channel voice messages to `channel`
    pub fn set_channel(&mut self, channel: u8) {
        self.channel = channel;
        for ev in self.events.iter_mut().filter(|ev| ev.kind.is_channel_voice()) {
            ev.channel = channel;
        }
    }

    /// Tick of the last event
    pub fn end_tick(&self) -> u64 {
        self.events.iter().map(|ev| ev.tick).max().unwrap_or(0)
    }
}

/// A complete multi-track sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sequence {
    pub name: String,
    /// Ticks per quarter note
    pub time_division: u16,
    pub tracks: Vec<Track>,
}

impl Sequence {
    pub fn new(name: impl Into<String>, time_division: u16) -> Self {
        Self {
            name: name.into(),
            time_division,
            tracks: Vec::new(),
        }
    }
}

/// Render printable payloads as strings and everything else as byte arrays
fn serialize_payload<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    let printable = !data.is_empty() && data.iter().all(|b| (0x20..0x7F).contains(b));
    if printable {
        // Checked above: every byte is printable ASCII
        serializer.serialize_str(std::str::from_utf8(data).unwrap_or_default())
    } else {
        data.serialize(serializer)
    }
}
