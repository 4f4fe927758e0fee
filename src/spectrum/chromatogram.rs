use log::debug;

use crate::params::CvGroup;

use super::bindata::{ArrayDecodeError, ArrayKind, BinaryDataInfo};
use super::scan::{PrecursorElement, Product};

/// A chromatogram under construction. Only the time and intensity
/// descriptors are decoded; all other arrays are dropped.
#[derive(Debug, Default, Clone)]
pub struct BuildingChromatogram {
    pub id: String,
    pub number: i32,
    pub declared_length: usize,
    pub cv: CvGroup,
    pub precursor: Option<PrecursorElement>,
    pub product: Option<Product>,
    time_info: Option<BinaryDataInfo>,
    intensity_info: Option<BinaryDataInfo>,
}

impl BuildingChromatogram {
    pub fn new<S: Into<String>>(id: S, number: i32, declared_length: usize) -> Self {
        Self {
            id: id.into(),
            number,
            declared_length,
            ..Default::default()
        }
    }

    pub fn assign_array(&mut self, info: BinaryDataInfo) {
        match info.array_kind {
            Some(ArrayKind::Time) => self.time_info = Some(info),
            Some(ArrayKind::Intensity) => self.intensity_info = Some(info),
            other => {
                debug!("chromatogram {}: dropping {:?} binary array", self.id, other);
            }
        }
    }

    /// A chromatogram is only kept when both axes were present.
    pub fn is_complete(&self) -> bool {
        self.time_info.is_some() && self.intensity_info.is_some()
    }

    /// Decode both axes and produce the finished record. The descriptors
    /// and their base64 text are consumed.
    pub fn finish(mut self) -> Result<Chromatogram, ArrayDecodeError> {
        let time_info = self.time_info.take();
        let intensity_info = self.intensity_info.take();
        let times = match time_info {
            Some(info) => info.decode()?,
            None => Vec::new(),
        };
        let intensities = match intensity_info {
            Some(info) => info.decode()?,
            None => Vec::new(),
        };
        Ok(Chromatogram {
            id: self.id,
            number: self.number,
            cv: self.cv,
            precursor: self.precursor,
            product: self.product,
            times,
            intensities,
        })
    }
}

/// A finished chromatogram with decoded retention time and intensity
/// buffers.
#[derive(Debug, Clone)]
pub struct Chromatogram {
    pub id: String,
    pub number: i32,
    pub cv: CvGroup,
    pub precursor: Option<PrecursorElement>,
    pub product: Option<Product>,
    /// Minutes, as stored in the document's time array.
    pub times: Vec<f64>,
    pub intensities: Vec<f64>,
}

impl Chromatogram {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::spectrum::bindata::{encode_array, BinaryCompression, BitLength};

    fn descriptor(values: &[f64], kind: ArrayKind) -> BinaryDataInfo {
        let text = encode_array(values, BitLength::Float64, BinaryCompression::Zlib);
        let mut info = BinaryDataInfo::new(text.len(), values.len());
        info.set_bit_length(BitLength::Float64);
        info.observe_compression(crate::cv::ZLIB_COMPRESSION);
        info.set_array_kind(kind);
        info.set_text(text);
        info
    }

    #[test]
    fn test_incomplete_chromatogram_is_not_kept() {
        let mut building = BuildingChromatogram::new("TIC", 1, 3);
        assert!(!building.is_complete());
        building.assign_array(descriptor(&[0.1, 0.2, 0.3], ArrayKind::Time));
        assert!(!building.is_complete());
        building.assign_array(descriptor(&[10.0, 20.0, 30.0], ArrayKind::Intensity));
        assert!(building.is_complete());
    }

    #[test]
    fn test_finish_decodes_both_axes() {
        let mut building = BuildingChromatogram::new("TIC", 1, 3);
        building.assign_array(descriptor(&[0.1, 0.2, 0.3], ArrayKind::Time));
        building.assign_array(descriptor(&[10.0, 20.0, 30.0], ArrayKind::Intensity));
        let chromatogram = building.finish().unwrap();
        assert_eq!(chromatogram.times, vec![0.1, 0.2, 0.3]);
        assert_eq!(chromatogram.intensities, vec![10.0, 20.0, 30.0]);
        assert_eq!(chromatogram.number, 1);
    }

    #[test]
    fn test_irrelevant_arrays_are_dropped() {
        let mut building = BuildingChromatogram::new("TIC", 1, 2);
        building.assign_array(descriptor(&[1.0, 2.0], ArrayKind::Mz));
        assert!(!building.is_complete());
    }
}
