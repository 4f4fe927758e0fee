pub mod bindata;
pub mod chromatogram;
pub mod frame;
pub mod scan;

pub use chromatogram::{BuildingChromatogram, Chromatogram};
pub use frame::{FrameAssembler, FrameMetadata, MobilityFrameStorage, PendingMobilityScan};
pub use scan::{
    BuildingScan, FinishedScan, IsolationInfo, MetadataError, Mobility, MobilityType, Polarity,
    ScanMetadata, SpectrumType, StoredSpectrumData,
};
