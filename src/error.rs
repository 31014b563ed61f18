use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Bad file identifier {found:02X?}, not a DSE sequence")]
    BadMagic { found: [u8; 4] },

    #[error("Invalid track identifier {found:02X?} for track {track} at 0x{offset:X}")]
    BadTrackTag {
        track: usize,
        offset: usize,
        found: [u8; 4],
    },

    #[error("Unexpected end of data at 0x{offset:X} (file is {len} bytes)")]
    TruncatedFile { offset: usize, len: usize },

    #[error("Unterminated variable-length quantity at 0x{offset:X}")]
    MalformedVlq { offset: usize },

    #[error("Command {opcode:02X} at 0x{offset:08X} not known")]
    UnknownOpcode { opcode: u8, offset: usize },

    #[error("Dropped invalid note {key} on track {track} at 0x{offset:X}")]
    InvalidNoteKey {
        track: usize,
        key: i32,
        offset: usize,
    },

    #[error("Ignored tempo of 0 BPM on track {track} at 0x{offset:X}")]
    ZeroTempo { track: usize, offset: usize },

    #[error("Invalid MIDI file at 0x{offset:X}: {reason}")]
    InvalidSmf { offset: usize, reason: String },

    #[error("Malformed MIDI file: {0}")]
    Smf(#[from] midly::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Whether the conversion can continue after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::InvalidNoteKey { .. } | Error::ZeroTempo { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
