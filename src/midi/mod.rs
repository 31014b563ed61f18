pub mod event;
pub mod json;
pub mod reader;
pub mod vlq;
pub mod writer;

pub use event::{Event, EventKind, MetaKind, Sequence, Track};
pub use json::SequenceJson;
pub use reader::SmfReader;
pub use writer::SmfWriter;
