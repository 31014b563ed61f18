pub mod convert;
pub mod dse;
pub mod error;
pub mod midi;
pub mod tables;

pub use convert::{Converter, LoadedSequence};
pub use error::Error;
pub use tables::ConversionTables;
