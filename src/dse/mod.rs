pub mod decoder;
pub mod header;
pub mod opcodes;
pub mod reader;

pub use decoder::{decode_track, DecodeState, DecodedTrack};
pub use header::{SequenceHeader, TrackChunk};
pub use opcodes::Handler;
pub use reader::ByteReader;
