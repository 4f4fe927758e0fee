pub mod mzml;
pub mod storage;

pub use mzml::{MzMLError, MzMLImporter, MzMLRawFile, RunDescription};
pub use storage::{BufferStorage, DoubleBuffer, ScanDataStorage};
