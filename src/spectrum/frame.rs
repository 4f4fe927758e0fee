use std::cmp::Ordering;
use std::io;

use log::debug;

use crate::io::storage::ScanDataStorage;
use crate::processing::SpectralArrays;

use super::scan::{MobilityType, Polarity, ScanMetadata, SpectrumType};

/// One processed mobility sub-scan waiting to be folded into a frame.
#[derive(Debug, Clone)]
pub struct PendingMobilityScan {
    pub id: String,
    pub scan_number: i32,
    pub metadata: ScanMetadata,
    pub arrays: SpectralArrays,
    pub mobility: f64,
    pub mobility_type: MobilityType,
}

/// Metadata shared by every sub-scan of a committed frame, taken from
/// the frame's first scan.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameMetadata {
    pub ms_level: i32,
    pub retention_time: f32,
    pub spectrum_type: Option<SpectrumType>,
    pub polarity: Polarity,
    pub scan_definition: String,
    pub scanning_range: Option<(f64, f64)>,
}

impl FrameMetadata {
    fn from_scan(metadata: &ScanMetadata) -> Self {
        Self {
            ms_level: metadata.ms_level,
            retention_time: metadata.retention_time,
            spectrum_type: metadata.spectrum_type,
            polarity: metadata.polarity,
            scan_definition: metadata.scan_definition.clone(),
            scanning_range: metadata.scanning_range,
        }
    }
}

/// A committed ion-mobility frame: every sub-scan sharing one retention
/// time, concatenated into single m/z and intensity buffers with
/// per-scan bookkeeping.
#[derive(Debug, Clone)]
pub struct MobilityFrameStorage<Seg> {
    pub mzs: Seg,
    pub intensities: Seg,
    /// Start of scan `i` within the concatenated buffers, in points.
    /// Monotonically non-decreasing; `offsets[i + 1] - offsets[i]` is
    /// scan `i`'s point count.
    pub storage_offsets: Vec<usize>,
    /// Index of each scan's maximum intensity within that scan, `-1` for
    /// an empty scan. Ties resolve to the first occurrence.
    pub base_peak_indices: Vec<i32>,
    pub max_points_in_scan: usize,
    pub mobilities: Vec<f64>,
    pub mobility_type: MobilityType,
    pub scan_numbers: Vec<i32>,
    pub metadata: FrameMetadata,
}

impl<Seg> MobilityFrameStorage<Seg> {
    pub fn scan_count(&self) -> usize {
        self.storage_offsets.len()
    }

    /// Point range of scan `index` within the concatenated buffers.
    pub fn scan_range(&self, index: usize, total_points: usize) -> (usize, usize) {
        let start = self.storage_offsets[index];
        let end = self
            .storage_offsets
            .get(index + 1)
            .copied()
            .unwrap_or(total_points);
        (start, end)
    }
}

/// Buffers consecutive mobility sub-scans and commits a frame whenever
/// the retention time changes or the spectrum list ends.
#[derive(Debug, Default)]
pub struct FrameAssembler {
    pending: Vec<PendingMobilityScan>,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_scans(&self) -> usize {
        self.pending.len()
    }

    /// Queue one sub-scan. A retention time differing from the buffered
    /// frame's (exact comparison, no tolerance) commits the buffer first.
    pub fn push<S: ScanDataStorage>(
        &mut self,
        scan: PendingMobilityScan,
        storage: &mut S,
        frames: &mut Vec<MobilityFrameStorage<S::Segment>>,
    ) -> io::Result<()> {
        if let Some(last) = self.pending.last() {
            if last
                .metadata
                .retention_time
                .total_cmp(&scan.metadata.retention_time)
                != Ordering::Equal
            {
                self.commit(storage, frames)?;
            }
        }
        self.pending.push(scan);
        Ok(())
    }

    /// Commit whatever is buffered. The driver calls this at the end of
    /// the spectrum list since no later retention time change will.
    pub fn flush<S: ScanDataStorage>(
        &mut self,
        storage: &mut S,
        frames: &mut Vec<MobilityFrameStorage<S::Segment>>,
    ) -> io::Result<()> {
        if !self.pending.is_empty() {
            self.commit(storage, frames)?;
        }
        Ok(())
    }

    fn commit<S: ScanDataStorage>(
        &mut self,
        storage: &mut S,
        frames: &mut Vec<MobilityFrameStorage<S::Segment>>,
    ) -> io::Result<()> {
        let scans = std::mem::take(&mut self.pending);
        let total_points: usize = scans.iter().map(|s| s.arrays.len()).sum();
        debug!(
            "committing mobility frame: {} scans, {} points",
            scans.len(),
            total_points
        );

        let mut mzs = Vec::with_capacity(total_points);
        let mut intensities = Vec::with_capacity(total_points);
        let mut storage_offsets = Vec::with_capacity(scans.len());
        let mut base_peak_indices = Vec::with_capacity(scans.len());
        let mut mobilities = Vec::with_capacity(scans.len());
        let mut scan_numbers = Vec::with_capacity(scans.len());
        let mut max_points_in_scan = 0usize;

        let first = &scans[0];
        let metadata = FrameMetadata::from_scan(&first.metadata);
        let mobility_type = first.mobility_type;

        for scan in &scans {
            storage_offsets.push(mzs.len());
            base_peak_indices.push(base_peak_index(&scan.arrays.intensities));
            max_points_in_scan = max_points_in_scan.max(scan.arrays.len());
            mobilities.push(scan.mobility);
            scan_numbers.push(scan.scan_number);
            mzs.extend_from_slice(&scan.arrays.mzs);
            intensities.extend_from_slice(&scan.arrays.intensities);
        }

        let mzs = storage.store_doubles(&mzs)?;
        let intensities = storage.store_doubles(&intensities)?;

        frames.push(MobilityFrameStorage {
            mzs,
            intensities,
            storage_offsets,
            base_peak_indices,
            max_points_in_scan,
            mobilities,
            mobility_type,
            scan_numbers,
            metadata,
        });
        Ok(())
    }
}

/// Index of the maximum intensity, first occurrence on ties, `-1` when
/// the scan has no points.
fn base_peak_index(intensities: &[f64]) -> i32 {
    let mut best = -1i32;
    let mut best_value = f64::NEG_INFINITY;
    for (i, value) in intensities.iter().enumerate() {
        if *value > best_value {
            best_value = *value;
            best = i as i32;
        }
    }
    best
}

/// Split a merged-mobility spectrum's parallel mobility array into
/// maximal runs of bit-identical consecutive values. Each `(start, end)`
/// half-open range becomes one synthetic per-mobility sub-scan.
pub fn split_mobility_runs(mobilities: &[f64]) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut start = 0usize;
    for i in 1..mobilities.len() {
        if mobilities[i].to_bits() != mobilities[start].to_bits() {
            runs.push((start, i));
            start = i;
        }
    }
    if start < mobilities.len() {
        runs.push((start, mobilities.len()));
    }
    runs
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::io::storage::BufferStorage;
    use crate::spectrum::scan::Polarity;

    fn metadata(retention_time: f32) -> ScanMetadata {
        ScanMetadata {
            spectrum_type: Some(SpectrumType::Centroided),
            ms_level: 1,
            polarity: Polarity::Positive,
            retention_time,
            scan_definition: String::new(),
            injection_time: None,
            scanning_range: None,
            isolations: Vec::new(),
            mobility: None,
        }
    }

    fn entry(scan_number: i32, retention_time: f32, points: &[(f64, f64)]) -> PendingMobilityScan {
        let (mzs, intensities) = points.iter().copied().unzip();
        PendingMobilityScan {
            id: format!("scan={scan_number}"),
            scan_number,
            metadata: metadata(retention_time),
            arrays: SpectralArrays::new(mzs, intensities),
            mobility: 0.9 - scan_number as f64 * 0.01,
            mobility_type: MobilityType::Tims,
        }
    }

    #[test]
    fn test_frame_boundary_on_retention_time_change() {
        let mut assembler = FrameAssembler::new();
        let mut storage = BufferStorage::new();
        let mut frames = Vec::new();

        for (i, rt) in [1.0f32, 1.0, 1.0, 2.0, 2.0].iter().enumerate() {
            let scan = entry(i as i32 + 1, *rt, &[(100.0, 10.0), (200.0, 20.0)]);
            assembler.push(scan, &mut storage, &mut frames).unwrap();
        }
        assert_eq!(frames.len(), 1);
        assembler.flush(&mut storage, &mut frames).unwrap();
        assert_eq!(frames.len(), 2);

        assert_eq!(frames[0].scan_count(), 3);
        assert_eq!(frames[1].scan_count(), 2);
        assert_eq!(frames[0].metadata.retention_time, 1.0);
        assert_eq!(frames[1].metadata.retention_time, 2.0);
        assert_eq!(frames[0].scan_numbers, vec![1, 2, 3]);

        // Flushing an empty assembler is a no-op
        assembler.flush(&mut storage, &mut frames).unwrap();
        assert_eq!(frames.len(), 2);
    }

    #[test]
    fn test_offset_and_base_peak_invariants() {
        let mut assembler = FrameAssembler::new();
        let mut storage = BufferStorage::new();
        let mut frames = Vec::new();

        let sizes = [3usize, 0, 2, 4];
        for (i, size) in sizes.iter().enumerate() {
            let points: Vec<(f64, f64)> = (0..*size)
                .map(|p| (100.0 + p as f64, ((p * 7) % 5) as f64))
                .collect();
            assembler
                .push(entry(i as i32 + 1, 5.0, &points), &mut storage, &mut frames)
                .unwrap();
        }
        assembler.flush(&mut storage, &mut frames).unwrap();
        let frame = &frames[0];

        // offsets[i] == sum(sizes[..i]) and the total length matches
        let mut expected_offset = 0;
        for (i, size) in sizes.iter().enumerate() {
            assert_eq!(frame.storage_offsets[i], expected_offset);
            expected_offset += size;
        }
        assert_eq!(frame.mzs.len(), sizes.iter().sum::<usize>());
        assert_eq!(frame.intensities.len(), frame.mzs.len());
        assert_eq!(frame.max_points_in_scan, 4);

        // base peak index is -1 iff the scan is empty, else first maximum
        for (i, size) in sizes.iter().enumerate() {
            let bp = frame.base_peak_indices[i];
            if *size == 0 {
                assert_eq!(bp, -1);
            } else {
                let (start, end) = frame.scan_range(i, frame.mzs.len());
                let slice = &frame.intensities[start..end];
                let max = slice.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                assert_eq!(slice[bp as usize], max);
                // first occurrence on ties
                assert!(slice[..bp as usize].iter().all(|v| *v < max));
            }
        }
    }

    #[test]
    fn test_base_peak_tie_resolves_to_first() {
        assert_eq!(base_peak_index(&[1.0, 5.0, 5.0, 2.0]), 1);
        assert_eq!(base_peak_index(&[]), -1);
        assert_eq!(base_peak_index(&[0.0]), 0);
    }

    #[test]
    fn test_merged_mobility_split() {
        let mobilities = [0.1, 0.1, 0.2, 0.2, 0.2, 0.3];
        let runs = split_mobility_runs(&mobilities);
        assert_eq!(runs, vec![(0, 2), (2, 5), (5, 6)]);

        assert!(split_mobility_runs(&[]).is_empty());
        assert_eq!(split_mobility_runs(&[0.5]), vec![(0, 1)]);

        // Bit-identical comparison distinguishes values an epsilon apart
        let close = [0.1, 0.1 + f64::EPSILON];
        assert_eq!(split_mobility_runs(&close).len(), 2);
    }
}
