use std::sync::OnceLock;

use log::debug;
use regex::Regex;
use thiserror::Error;

use crate::cv;
use crate::params::CvGroup;

use super::bindata::{ArrayKind, BinaryDataInfo};

/// Errors raised while resolving a scan's derived metadata. These come
/// from malformed required numeric values and abort the whole import.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetadataError {
    #[error("scan #{scan}: cvParam {accession} has unparseable numeric value `{value}`")]
    MalformedNumber {
        scan: i32,
        accession: String,
        value: String,
    },
    #[error("scan #{scan}: retention time cvParam carries no value")]
    MissingRetentionTimeValue { scan: i32 },
    #[error("scan #{scan}: unknown retention time unit `{unit}`")]
    UnknownTimeUnit { scan: i32, unit: String },
}

/// Whether a spectrum stores a continuous profile or picked centroids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpectrumType {
    Profile,
    Centroided,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Positive,
    Negative,
    #[default]
    Unknown,
}

/// The ion mobility separation family a scan was acquired with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MobilityType {
    DriftTube,
    Tims,
}

/// One scan's mobility coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mobility {
    pub value: f64,
    pub kind: MobilityType,
}

/// A resolved DDA precursor isolation record.
#[derive(Debug, Clone, PartialEq)]
pub struct IsolationInfo {
    pub lower_mz: f64,
    pub upper_mz: f64,
    /// The canonical precursor m/z. The isolation window center is
    /// preferred over the selected-ion m/z: at least for Orbitrap data
    /// converted with msconvert the selected ion may point at an isotope
    /// peak while the window center is the true isolation m/z.
    pub precursor_mz: f64,
    pub charge: Option<i32>,
    pub precursor_scan_number: Option<i32>,
    pub ms_level: Option<i32>,
}

/// `<scanWindow>` CV container.
#[derive(Debug, Default, Clone)]
pub struct ScanWindow {
    pub cv: CvGroup,
}

#[derive(Debug, Default, Clone)]
pub struct ScanWindowList {
    pub windows: Vec<ScanWindow>,
}

/// One `<scan>` sub-element with its own CV params and optional scan
/// window list.
#[derive(Debug, Default, Clone)]
pub struct Scan {
    pub cv: CvGroup,
    pub scan_windows: Option<ScanWindowList>,
}

#[derive(Debug, Default, Clone)]
pub struct ScanList {
    pub cv: CvGroup,
    pub scans: Vec<Scan>,
}

impl ScanList {
    pub fn first(&self) -> Option<&Scan> {
        self.scans.first()
    }
}

/// `<isolationWindow>` CV container. `ms_level` comes from the optional
/// `<userParam name="ms level">` msconvert emits for MSn data.
#[derive(Debug, Default, Clone)]
pub struct IsolationWindow {
    pub cv: CvGroup,
    pub ms_level: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct SelectedIon {
    pub cv: CvGroup,
}

#[derive(Debug, Default, Clone)]
pub struct SelectedIonList {
    pub ions: Vec<SelectedIon>,
}

#[derive(Debug, Default, Clone)]
pub struct Activation {
    pub cv: CvGroup,
}

/// One `<precursor>` element. The spectrum reference is a lookup key
/// resolved to a scan number, never an ownership edge.
#[derive(Debug, Default, Clone)]
pub struct PrecursorElement {
    pub spectrum_ref: Option<String>,
    pub isolation_window: Option<IsolationWindow>,
    pub selected_ions: Option<SelectedIonList>,
    pub activation: Option<Activation>,
}

#[derive(Debug, Default, Clone)]
pub struct PrecursorList {
    pub precursors: Vec<PrecursorElement>,
}

#[derive(Debug, Default, Clone)]
pub struct Product {
    pub isolation_window: Option<IsolationWindow>,
}

#[derive(Debug, Default, Clone)]
pub struct ProductList {
    pub products: Vec<Product>,
}

/// The immutable derived metadata of one spectrum, produced in a single
/// resolution step once all CV data has been accumulated.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanMetadata {
    pub spectrum_type: Option<SpectrumType>,
    pub ms_level: i32,
    pub polarity: Polarity,
    /// Minutes; `-1.0` when the document carries no retention time.
    pub retention_time: f32,
    pub scan_definition: String,
    pub injection_time: Option<f32>,
    /// Scanning m/z range; `None` means "all values". The importer fills
    /// this from the decoded m/z array when no scan window declared it.
    pub scanning_range: Option<(f64, f64)>,
    pub isolations: Vec<IsolationInfo>,
    pub mobility: Option<Mobility>,
}

/// Resolve a native spectrum id to a scan number. Two patterns are
/// recognized, in order: the generic `scan=<n>` convention and the
/// Agilent `scanId=<n>` convention.
pub fn scan_number_from_native_id(native_id: &str) -> Option<i32> {
    static SCAN: OnceLock<Regex> = OnceLock::new();
    static AGILENT: OnceLock<Regex> = OnceLock::new();
    let scan = SCAN.get_or_init(|| Regex::new("scan=([0-9]+)").unwrap());
    if let Some(captures) = scan.captures(native_id) {
        if let Ok(number) = captures[1].parse() {
            return Some(number);
        }
    }
    let agilent = AGILENT.get_or_init(|| Regex::new("scan[iI]d=([0-9]+)").unwrap());
    if let Some(captures) = agilent.captures(native_id) {
        if let Ok(number) = captures[1].parse() {
            return Some(number);
        }
    }
    None
}

/// Map a mobility array's unit accession to the mobility family of a
/// merged-mobility spectrum.
pub fn mobility_type_from_unit(unit_accession: Option<&str>) -> Option<MobilityType> {
    match unit_accession {
        Some(cv::UNIT_MILLISECOND) => Some(MobilityType::DriftTube),
        Some(cv::UNIT_VOLT_SECOND_PER_SQUARE_CM) => Some(MobilityType::Tims),
        _ => None,
    }
}

/// A spectrum under construction while its element subtree streams by.
///
/// Binary descriptors are transient: they are taken for decoding when the
/// spectrum closes and never survive finalization, keeping peak memory
/// bounded by the current spectrum.
#[derive(Debug, Default, Clone)]
pub struct BuildingScan {
    pub id: String,
    pub scan_number: i32,
    pub declared_length: usize,
    pub cv: CvGroup,
    pub precursor_list: PrecursorList,
    pub product_list: ProductList,
    pub scan_list: ScanList,
    mz_info: Option<BinaryDataInfo>,
    intensity_info: Option<BinaryDataInfo>,
    wavelength_info: Option<BinaryDataInfo>,
    mobility_info: Option<BinaryDataInfo>,
}

impl BuildingScan {
    pub fn new<S: Into<String>>(id: S, scan_number: i32, declared_length: usize) -> Self {
        Self {
            id: id.into(),
            scan_number,
            declared_length,
            ..Default::default()
        }
    }

    /// Route a finished binary array descriptor to its slot by semantic
    /// type. Unrecognized or spectrum-inapplicable kinds are dropped.
    pub fn assign_array(&mut self, info: BinaryDataInfo) {
        match info.array_kind {
            Some(ArrayKind::Mz) => self.mz_info = Some(info),
            Some(ArrayKind::Intensity) => self.intensity_info = Some(info),
            Some(ArrayKind::Wavelength) => self.wavelength_info = Some(info),
            Some(ArrayKind::Mobility) => self.mobility_info = Some(info),
            Some(ArrayKind::Time) | None => {
                debug!(
                    "scan #{}: dropping {:?} binary array",
                    self.scan_number, info.array_kind
                );
            }
        }
    }

    pub fn is_mass_spectrum(&self) -> bool {
        self.mz_info.is_some()
    }

    /// Intensity and wavelength arrays without an m/z array: a UV or
    /// absorbance spectrum from an auxiliary detector.
    pub fn is_uv_spectrum(&self) -> bool {
        self.mz_info.is_none() && self.intensity_info.is_some() && self.wavelength_info.is_some()
    }

    pub fn take_mz_info(&mut self) -> Option<BinaryDataInfo> {
        self.mz_info.take()
    }

    pub fn take_intensity_info(&mut self) -> Option<BinaryDataInfo> {
        self.intensity_info.take()
    }

    pub fn take_wavelength_info(&mut self) -> Option<BinaryDataInfo> {
        self.wavelength_info.take()
    }

    pub fn take_mobility_info(&mut self) -> Option<BinaryDataInfo> {
        self.mobility_info.take()
    }

    /// Drop all remaining binary descriptors and their base64 text.
    pub fn clear_binary_data(&mut self) {
        self.mz_info = None;
        self.intensity_info = None;
        self.wavelength_info = None;
        self.mobility_info = None;
    }

    fn malformed(&self, accession: &str, value: &str) -> MetadataError {
        MetadataError::MalformedNumber {
            scan: self.scan_number,
            accession: accession.to_string(),
            value: value.to_string(),
        }
    }

    fn parse_f64(&self, accession: &str, value: &str) -> Result<f64, MetadataError> {
        value
            .parse()
            .map_err(|_| self.malformed(accession, value))
    }

    /// Resolve every derived field from the accumulated CV data in one
    /// step. Malformed required numeric values are fatal; missing
    /// optional values fall back to their documented defaults.
    pub fn resolve_metadata(&self) -> Result<ScanMetadata, MetadataError> {
        Ok(ScanMetadata {
            spectrum_type: self.resolve_spectrum_type(),
            ms_level: self.resolve_ms_level()?,
            polarity: self.resolve_polarity(),
            retention_time: self.resolve_retention_time()?,
            scan_definition: self.resolve_scan_definition(),
            injection_time: self.resolve_injection_time(),
            scanning_range: self.resolve_scanning_range()?,
            isolations: self.resolve_isolations()?,
            mobility: self.resolve_mobility()?,
        })
    }

    fn resolve_spectrum_type(&self) -> Option<SpectrumType> {
        let mut spectrum_type = None;
        if self.cv.has(cv::CENTROID_SPECTRUM) {
            spectrum_type = Some(SpectrumType::Centroided);
        }
        if self.cv.has(cv::PROFILE_SPECTRUM) {
            spectrum_type = Some(SpectrumType::Profile);
        }
        if spectrum_type.is_none() && self.is_uv_spectrum() {
            spectrum_type = Some(SpectrumType::Profile);
        }
        spectrum_type
    }

    fn resolve_ms_level(&self) -> Result<i32, MetadataError> {
        match self.cv.value_of(cv::MS_LEVEL) {
            Some(value) if !value.is_empty() => value
                .parse()
                .map_err(|_| self.malformed(cv::MS_LEVEL, value)),
            _ => Ok(1),
        }
    }

    fn resolve_polarity(&self) -> Polarity {
        if self.cv.has(cv::POLARITY_POSITIVE) {
            return Polarity::Positive;
        }
        if self.cv.has(cv::POLARITY_NEGATIVE) {
            return Polarity::Negative;
        }
        if let Some(scan) = self.scan_list.first() {
            if scan.cv.has(cv::POLARITY_POSITIVE) {
                return Polarity::Positive;
            }
            if scan.cv.has(cv::POLARITY_NEGATIVE) {
                return Polarity::Negative;
            }
        }
        Polarity::Unknown
    }

    fn resolve_retention_time(&self) -> Result<f32, MetadataError> {
        let Some(scan) = self.scan_list.first() else {
            return Ok(-1.0);
        };
        for param in &scan.cv {
            match param.accession.as_str() {
                cv::RT_SCAN_START
                | cv::RT_RETENTION_TIME
                | cv::RT_RETENTION_TIME_LOCAL
                | cv::RT_RETENTION_TIME_NORMALIZED => {
                    let value = param.value_str().ok_or(
                        MetadataError::MissingRetentionTimeValue {
                            scan: self.scan_number,
                        },
                    )?;
                    let time = self.parse_f64(&param.accession, value)? as f32;
                    return Ok(match param.unit() {
                        Some(cv::UNIT_MINUTE) | Some(cv::UNIT_MINUTE_ALT) => time,
                        // No unit declared: raw seconds by convention
                        Some(cv::UNIT_SECOND) | None => time / 60.0,
                        Some(unit) => {
                            return Err(MetadataError::UnknownTimeUnit {
                                scan: self.scan_number,
                                unit: unit.to_string(),
                            })
                        }
                    });
                }
                _ => continue,
            }
        }
        Ok(-1.0)
    }

    fn resolve_scan_definition(&self) -> String {
        self.scan_list
            .first()
            .and_then(|scan| scan.cv.value_of(cv::SCAN_FILTER_STRING))
            .unwrap_or_default()
            .to_string()
    }

    fn resolve_injection_time(&self) -> Option<f32> {
        let scan = self.scan_list.first()?;
        let value = scan.cv.value_of(cv::ION_INJECTION_TIME)?;
        value.parse().ok()
    }

    /// The first scan window's limits; else the spectrum's declared
    /// lowest/highest observed m/z. The decoded-array fallback happens
    /// after decoding, in the importer.
    fn resolve_scanning_range(&self) -> Result<Option<(f64, f64)>, MetadataError> {
        if let Some(window) = self
            .scan_list
            .first()
            .and_then(|scan| scan.scan_windows.as_ref())
            .and_then(|list| list.windows.first())
        {
            let lower = window.cv.value_of(cv::SCAN_WINDOW_LOWER_LIMIT);
            let upper = window.cv.value_of(cv::SCAN_WINDOW_UPPER_LIMIT);
            if let (Some(lower), Some(upper)) = (lower, upper) {
                return Ok(Some((
                    self.parse_f64(cv::SCAN_WINDOW_LOWER_LIMIT, lower)?,
                    self.parse_f64(cv::SCAN_WINDOW_UPPER_LIMIT, upper)?,
                )));
            }
        }
        let lowest = self.cv.value_of(cv::LOWEST_OBSERVED_MZ);
        let highest = self.cv.value_of(cv::HIGHEST_OBSERVED_MZ);
        if let (Some(lowest), Some(highest)) = (lowest, highest) {
            return Ok(Some((
                self.parse_f64(cv::LOWEST_OBSERVED_MZ, lowest)?,
                self.parse_f64(cv::HIGHEST_OBSERVED_MZ, highest)?,
            )));
        }
        Ok(None)
    }

    fn resolve_isolations(&self) -> Result<Vec<IsolationInfo>, MetadataError> {
        if self.precursor_list.precursors.is_empty() {
            return Ok(Vec::new());
        }

        let mut isolations = Vec::new();
        for precursor in &self.precursor_list.precursors {
            let precursor_scan_number = precursor
                .spectrum_ref
                .as_deref()
                .and_then(scan_number_from_native_id);

            let Some(selected_ions) = precursor.selected_ions.as_ref() else {
                return Ok(Vec::new());
            };
            if selected_ions.ions.is_empty() {
                return Ok(Vec::new());
            }

            let mut selected_ion_mz = None;
            let mut charge = None;
            for ion in &selected_ions.ions {
                selected_ion_mz = ion
                    .cv
                    .value_of(cv::SELECTED_ION_MZ)
                    .or_else(|| ion.cv.value_of(cv::MZ));
                charge = ion.cv.value_of(cv::CHARGE_STATE);
            }

            let mut target = None;
            let mut lower_offset = None;
            let mut upper_offset = None;
            let mut ms_level = None;
            if let Some(window) = precursor.isolation_window.as_ref() {
                target = window.cv.value_of(cv::ISOLATION_WINDOW_TARGET);
                lower_offset = window.cv.value_of(cv::ISOLATION_WINDOW_LOWER_OFFSET);
                upper_offset = window.cv.value_of(cv::ISOLATION_WINDOW_UPPER_OFFSET);
                ms_level = match window.ms_level.as_deref() {
                    Some(value) => Some(
                        value
                            .parse()
                            .map_err(|_| self.malformed(cv::MS_LEVEL, value))?,
                    ),
                    None => None,
                };
            }

            if let Some(ion_mz) = selected_ion_mz {
                // The isolation window center is the canonical precursor
                // m/z; the selected ion only fills in when absent.
                let target = target.unwrap_or(ion_mz);
                let lower = lower_offset.unwrap_or("0.5");
                let upper = upper_offset.unwrap_or("0.5");

                let center = self.parse_f64(cv::ISOLATION_WINDOW_TARGET, target)?;
                let lower = self.parse_f64(cv::ISOLATION_WINDOW_LOWER_OFFSET, lower)?;
                let upper = self.parse_f64(cv::ISOLATION_WINDOW_UPPER_OFFSET, upper)?;
                let charge = match charge {
                    Some(value) if !value.is_empty() => Some(
                        value
                            .parse()
                            .map_err(|_| self.malformed(cv::CHARGE_STATE, value))?,
                    ),
                    _ => None,
                };

                isolations.push(IsolationInfo {
                    lower_mz: center - lower,
                    upper_mz: center + upper,
                    precursor_mz: center,
                    charge,
                    precursor_scan_number,
                    ms_level,
                });
            }
        }
        Ok(isolations)
    }

    fn resolve_mobility(&self) -> Result<Option<Mobility>, MetadataError> {
        let Some(scan) = self.scan_list.first() else {
            return Ok(None);
        };
        for param in &scan.cv {
            let Some(value) = param.value_str().filter(|v| !v.is_empty()) else {
                continue;
            };
            match param.accession.as_str() {
                cv::MOBILITY_DRIFT_TIME => {
                    if param.unit() == Some(cv::UNIT_MILLISECOND) {
                        return Ok(Some(Mobility {
                            value: self.parse_f64(&param.accession, value)?,
                            kind: MobilityType::DriftTube,
                        }));
                    }
                }
                cv::MOBILITY_INVERSE_REDUCED => {
                    if param.unit() == Some(cv::UNIT_VOLT_SECOND_PER_SQUARE_CM) {
                        return Ok(Some(Mobility {
                            value: self.parse_f64(&param.accession, value)?,
                            kind: MobilityType::Tims,
                        }));
                    }
                }
                _ => {}
            }
        }
        Ok(None)
    }
}

/// A fully imported spectrum with resolved metadata and committed data
/// buffers.
#[derive(Debug, Clone)]
pub struct FinishedScan<Seg> {
    pub id: String,
    pub scan_number: i32,
    pub metadata: ScanMetadata,
    pub cv: CvGroup,
    pub data: StoredSpectrumData<Seg>,
}

/// The committed buffers of a finished spectrum.
#[derive(Debug, Clone)]
pub enum StoredSpectrumData<Seg> {
    Mass { mzs: Seg, intensities: Seg },
    Uv { wavelengths: Seg, intensities: Seg },
}

impl<Seg> FinishedScan<Seg> {
    pub fn is_mass_spectrum(&self) -> bool {
        matches!(self.data, StoredSpectrumData::Mass { .. })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::params::CvParam;

    fn scan_with(params: Vec<CvParam>) -> BuildingScan {
        let mut building = BuildingScan::new("scan=1", 1, 0);
        let mut scan = Scan::default();
        for p in params {
            scan.cv.add(p);
        }
        building.scan_list.scans.push(scan);
        building
    }

    #[test]
    fn test_native_id_patterns() {
        assert_eq!(
            scan_number_from_native_id("controllerType=0 controllerNumber=1 scan=2622"),
            Some(2622)
        );
        assert_eq!(scan_number_from_native_id("scanId=714"), Some(714));
        assert_eq!(scan_number_from_native_id("scanid=9"), Some(9));
        // Generic pattern takes precedence
        assert_eq!(scan_number_from_native_id("scanId=3 scan=4"), Some(4));
        assert_eq!(scan_number_from_native_id("sample=1 period=2"), None);
    }

    #[test]
    fn test_retention_time_units() {
        let minutes = scan_with(vec![CvParam::with_unit(
            cv::RT_SCAN_START,
            "3.5",
            cv::UNIT_MINUTE,
        )]);
        assert_eq!(minutes.resolve_metadata().unwrap().retention_time, 3.5);

        let seconds = scan_with(vec![CvParam::with_unit(
            cv::RT_SCAN_START,
            "90",
            cv::UNIT_SECOND,
        )]);
        assert_eq!(seconds.resolve_metadata().unwrap().retention_time, 1.5);

        let unitless = scan_with(vec![CvParam::with_value(cv::RT_RETENTION_TIME, "120")]);
        assert_eq!(unitless.resolve_metadata().unwrap().retention_time, 2.0);

        let absent = scan_with(vec![]);
        assert_eq!(absent.resolve_metadata().unwrap().retention_time, -1.0);
    }

    #[test]
    fn test_retention_time_failures() {
        let garbage = scan_with(vec![CvParam::with_unit(
            cv::RT_SCAN_START,
            "not-a-number",
            cv::UNIT_MINUTE,
        )]);
        assert!(matches!(
            garbage.resolve_metadata(),
            Err(MetadataError::MalformedNumber { .. })
        ));

        let bad_unit = scan_with(vec![CvParam::with_unit(
            cv::RT_SCAN_START,
            "3.5",
            "UO:0000032",
        )]);
        assert!(matches!(
            bad_unit.resolve_metadata(),
            Err(MetadataError::UnknownTimeUnit { .. })
        ));
    }

    #[test]
    fn test_polarity_falls_back_to_scan() {
        let mut building = BuildingScan::new("scan=1", 1, 0);
        building.cv.add(CvParam::new(cv::POLARITY_NEGATIVE));
        assert_eq!(
            building.resolve_metadata().unwrap().polarity,
            Polarity::Negative
        );

        let on_scan = scan_with(vec![CvParam::new(cv::POLARITY_POSITIVE)]);
        assert_eq!(
            on_scan.resolve_metadata().unwrap().polarity,
            Polarity::Positive
        );

        let neither = scan_with(vec![]);
        assert_eq!(
            neither.resolve_metadata().unwrap().polarity,
            Polarity::Unknown
        );
    }

    #[test]
    fn test_profile_overrides_centroid_when_both_present() {
        let mut building = BuildingScan::new("scan=1", 1, 0);
        building.cv.add(CvParam::new(cv::CENTROID_SPECTRUM));
        assert_eq!(
            building.resolve_metadata().unwrap().spectrum_type,
            Some(SpectrumType::Centroided)
        );
        building.cv.add(CvParam::new(cv::PROFILE_SPECTRUM));
        assert_eq!(
            building.resolve_metadata().unwrap().spectrum_type,
            Some(SpectrumType::Profile)
        );
    }

    #[test]
    fn test_ms_level_defaults_to_one() {
        let bare = BuildingScan::new("scan=1", 1, 0);
        assert_eq!(bare.resolve_metadata().unwrap().ms_level, 1);

        let mut ms2 = BuildingScan::new("scan=1", 1, 0);
        ms2.cv.add(CvParam::with_value(cv::MS_LEVEL, "2"));
        assert_eq!(ms2.resolve_metadata().unwrap().ms_level, 2);
    }

    #[test]
    fn test_isolation_window_defaulting() {
        let mut building = BuildingScan::new("scan=5", 5, 0);
        let mut ion = SelectedIon::default();
        ion.cv.add(CvParam::with_value(cv::SELECTED_ION_MZ, "500.0"));
        building.precursor_list.precursors.push(PrecursorElement {
            spectrum_ref: Some("scan=4".to_string()),
            selected_ions: Some(SelectedIonList { ions: vec![ion] }),
            ..Default::default()
        });

        let isolations = building.resolve_metadata().unwrap().isolations;
        assert_eq!(isolations.len(), 1);
        let isolation = &isolations[0];
        assert_eq!(isolation.precursor_mz, 500.0);
        assert_eq!(isolation.lower_mz, 499.5);
        assert_eq!(isolation.upper_mz, 500.5);
        assert_eq!(isolation.precursor_scan_number, Some(4));
        assert_eq!(isolation.charge, None);
    }

    #[test]
    fn test_isolation_window_center_preferred_over_selected_ion() {
        let mut building = BuildingScan::new("scan=5", 5, 0);
        let mut ion = SelectedIon::default();
        ion.cv.add(CvParam::with_value(cv::SELECTED_ION_MZ, "501.1"));
        ion.cv.add(CvParam::with_value(cv::CHARGE_STATE, "2"));
        let mut window = IsolationWindow::default();
        window
            .cv
            .add(CvParam::with_value(cv::ISOLATION_WINDOW_TARGET, "500.0"));
        window.cv.add(CvParam::with_value(
            cv::ISOLATION_WINDOW_LOWER_OFFSET,
            "1.0",
        ));
        window.cv.add(CvParam::with_value(
            cv::ISOLATION_WINDOW_UPPER_OFFSET,
            "1.5",
        ));
        building.precursor_list.precursors.push(PrecursorElement {
            isolation_window: Some(window),
            selected_ions: Some(SelectedIonList { ions: vec![ion] }),
            ..Default::default()
        });

        let isolations = building.resolve_metadata().unwrap().isolations;
        assert_eq!(isolations[0].precursor_mz, 500.0);
        assert_eq!(isolations[0].lower_mz, 499.0);
        assert_eq!(isolations[0].upper_mz, 501.5);
        assert_eq!(isolations[0].charge, Some(2));
    }

    #[test]
    fn test_precursor_without_selected_ion_yields_nothing() {
        let mut building = BuildingScan::new("scan=5", 5, 0);
        building
            .precursor_list
            .precursors
            .push(PrecursorElement::default());
        assert!(building.resolve_metadata().unwrap().isolations.is_empty());
    }

    #[test]
    fn test_scanning_range_from_window_then_observed_cvs() {
        let mut building = BuildingScan::new("scan=1", 1, 0);
        let mut window = ScanWindow::default();
        window
            .cv
            .add(CvParam::with_value(cv::SCAN_WINDOW_LOWER_LIMIT, "100"));
        window
            .cv
            .add(CvParam::with_value(cv::SCAN_WINDOW_UPPER_LIMIT, "1700"));
        let scan = Scan {
            scan_windows: Some(ScanWindowList {
                windows: vec![window],
            }),
            ..Default::default()
        };
        building.scan_list.scans.push(scan);
        assert_eq!(
            building.resolve_metadata().unwrap().scanning_range,
            Some((100.0, 1700.0))
        );

        let mut observed = BuildingScan::new("scan=1", 1, 0);
        observed
            .cv
            .add(CvParam::with_value(cv::LOWEST_OBSERVED_MZ, "120.5"));
        observed
            .cv
            .add(CvParam::with_value(cv::HIGHEST_OBSERVED_MZ, "1450.25"));
        assert_eq!(
            observed.resolve_metadata().unwrap().scanning_range,
            Some((120.5, 1450.25))
        );

        let bare = BuildingScan::new("scan=1", 1, 0);
        assert_eq!(bare.resolve_metadata().unwrap().scanning_range, None);
    }

    #[test]
    fn test_scan_mobility_requires_matching_unit() {
        let tims = scan_with(vec![CvParam::with_unit(
            cv::MOBILITY_INVERSE_REDUCED,
            "1.21",
            cv::UNIT_VOLT_SECOND_PER_SQUARE_CM,
        )]);
        assert_eq!(
            tims.resolve_metadata().unwrap().mobility,
            Some(Mobility {
                value: 1.21,
                kind: MobilityType::Tims
            })
        );

        let drift = scan_with(vec![CvParam::with_unit(
            cv::MOBILITY_DRIFT_TIME,
            "22.5",
            cv::UNIT_MILLISECOND,
        )]);
        assert_eq!(
            drift.resolve_metadata().unwrap().mobility,
            Some(Mobility {
                value: 22.5,
                kind: MobilityType::DriftTube
            })
        );

        let wrong_unit = scan_with(vec![CvParam::with_unit(
            cv::MOBILITY_DRIFT_TIME,
            "22.5",
            cv::UNIT_SECOND,
        )]);
        assert_eq!(wrong_unit.resolve_metadata().unwrap().mobility, None);
    }

    #[test]
    fn test_mobility_type_from_array_unit() {
        assert_eq!(
            mobility_type_from_unit(Some(cv::UNIT_MILLISECOND)),
            Some(MobilityType::DriftTube)
        );
        assert_eq!(
            mobility_type_from_unit(Some(cv::UNIT_VOLT_SECOND_PER_SQUARE_CM)),
            Some(MobilityType::Tims)
        );
        assert_eq!(mobility_type_from_unit(Some("UO:0000010")), None);
        assert_eq!(mobility_type_from_unit(None), None);
    }
}
