//! DSE track opcode definitions
//!
//! Every opcode byte resolves to exactly one [`Handler`] through [`OPCODES`].

/// Delay lengths selected by opcodes 0x80-0x8F (in DSE ticks)
pub const DELAY_TABLE: [u8; 16] = [96, 72, 64, 48, 36, 32, 24, 18, 16, 12, 9, 8, 6, 4, 3, 2];

/// Named opcodes
pub mod opcode {
    pub const NOTE_LAST: u8 = 0x7F;
    pub const DELAY_FIRST: u8 = 0x80;
    pub const DELAY_LAST: u8 = 0x8F;
    pub const REPEAT_DELAY: u8 = 0x90;
    pub const ADD_DELAY: u8 = 0x91;
    pub const DELAY_8: u8 = 0x92;
    pub const DELAY_16: u8 = 0x93;
    pub const END_OF_TRACK: u8 = 0x98;
    pub const LOOP_START: u8 = 0x99;
    pub const SET_OCTAVE: u8 = 0xA0;
    pub const TEMPO: u8 = 0xA4;
    pub const PROGRAM: u8 = 0xAC;
    pub const MODULATION: u8 = 0xBE;
    pub const PITCH_BEND: u8 = 0xD7;
    pub const VOLUME: u8 = 0xE0;
    pub const EXPRESSION: u8 = 0xE3;
    pub const PAN: u8 = 0xE8;
}

/// Opcodes with a known argument length but no playback effect
pub const PASSTHROUGH: [(u8, u8); 20] = [
    (0x9C, 1),
    (0x9D, 0),
    (0xA8, 2),
    (0xA9, 1),
    (0xAA, 1),
    (0xB2, 1),
    (0xB4, 2),
    (0xB5, 1),
    (0xBF, 1),
    (0xC0, 0),
    (0xD0, 1),
    (0xD1, 1),
    (0xD2, 1),
    (0xD4, 3),
    (0xD6, 2),
    (0xDB, 1),
    (0xDC, 5),
    (0xE2, 3),
    (0xEA, 3),
    (0xF6, 1),
];

/// What the decoder does for an opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    /// Play a note; the opcode is the velocity
    Note,
    /// Wait `DELAY_TABLE[index]`
    FixedDelay(u8),
    /// Wait the last delay again
    RepeatDelay,
    /// Adjust the last delay by a signed byte and wait
    AddDelay,
    /// Wait an 8-bit delay
    Delay8,
    /// Wait a 16-bit little-endian delay
    Delay16,
    /// End of the track
    EndOfTrack,
    /// Loop point marker
    LoopStart,
    /// Set the absolute octave
    SetOctave,
    /// Tempo in BPM
    Tempo,
    /// Program change
    Program,
    /// Controller change with a one byte value
    Controller(u8),
    /// 16-bit signed pitch bend
    PitchBend,
    /// Consume the given number of argument bytes and keep them as text
    Passthrough(u8),
    /// Not a DSE opcode
    Unknown,
}

/// Opcode dispatch table
pub static OPCODES: [Handler; 256] = build_table();

/// Look up the handler for an opcode
pub fn handler(op: u8) -> Handler {
    OPCODES[usize::from(op)]
}

const fn build_table() -> [Handler; 256] {
    use crate::midi::event::controller;

    let mut table = [Handler::Unknown; 256];

    let mut i = 0;
    while i <= opcode::NOTE_LAST as usize {
        table[i] = Handler::Note;
        i += 1;
    }

    let mut i = 0;
    while i < DELAY_TABLE.len() {
        table[opcode::DELAY_FIRST as usize + i] = Handler::FixedDelay(i as u8);
        i += 1;
    }

    table[opcode::REPEAT_DELAY as usize] = Handler::RepeatDelay;
    table[opcode::ADD_DELAY as usize] = Handler::AddDelay;
    table[opcode::DELAY_8 as usize] = Handler::Delay8;
    table[opcode::DELAY_16 as usize] = Handler::Delay16;
    table[opcode::END_OF_TRACK as usize] = Handler::EndOfTrack;
    table[opcode::LOOP_START as usize] = Handler::LoopStart;
    table[opcode::SET_OCTAVE as usize] = Handler::SetOctave;
    table[opcode::TEMPO as usize] = Handler::Tempo;
    table[opcode::PROGRAM as usize] = Handler::Program;
    table[opcode::MODULATION as usize] = Handler::Controller(controller::MODULATION);
    table[opcode::PITCH_BEND as usize] = Handler::PitchBend;
    table[opcode::VOLUME as usize] = Handler::Controller(controller::VOLUME);
    table[opcode::EXPRESSION as usize] = Handler::Controller(controller::EXPRESSION);
    table[opcode::PAN as usize] = Handler::Controller(controller::PAN);

    let mut i = 0;
    while i < PASSTHROUGH.len() {
        let (op, arity) = PASSTHROUGH[i];
        table[op as usize] = Handler::Passthrough(arity);
        i += 1;
    }

    table
}
