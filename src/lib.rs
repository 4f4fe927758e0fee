//! `mzimport` reads mass spectrometry mzML documents as a stream of XML
//! element events, decodes their base64/zlib/MS-Numpress binary arrays,
//! and assembles ion-mobility scans sharing a retention time into
//! frames committed to externally managed storage.

pub mod cv;
pub mod io;
pub mod params;
pub mod processing;
pub mod spectrum;

pub use crate::io::mzml::{MzMLError, MzMLImporter, MzMLRawFile, RunDescription};
pub use crate::io::storage::{BufferStorage, DoubleBuffer, ScanDataStorage};
pub use crate::processing::{PassThroughProcessor, ScanProcessor, SpectralArrays};
pub use crate::spectrum::{
    Chromatogram, FinishedScan, IsolationInfo, MobilityFrameStorage, MobilityType, Polarity,
    ScanMetadata, SpectrumType, StoredSpectrumData,
};
