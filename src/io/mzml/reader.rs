use std::fs;
use std::io::{self, BufRead};
use std::path::Path;
use std::str::FromStr;

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use log::{debug, warn};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Error as XMLError, Reader};
use thiserror::Error;

use crate::params::{CvParam, UserParam};
use crate::processing::{PassThroughProcessor, ScanProcessor, SpectralArrays};
use crate::spectrum::bindata::{ArrayKind, BinaryDataInfo, BitLength};
use crate::spectrum::chromatogram::{BuildingChromatogram, Chromatogram};
use crate::spectrum::frame::{
    split_mobility_runs, FrameAssembler, MobilityFrameStorage, PendingMobilityScan,
};
use crate::spectrum::scan::{
    mobility_type_from_unit, scan_number_from_native_id, Activation, BuildingScan, FinishedScan,
    IsolationWindow, MetadataError, Mobility, MobilityType, PrecursorElement, PrecursorList,
    Product, ProductList, Scan, ScanList, ScanMetadata, ScanWindow, ScanWindowList, SelectedIon,
    SelectedIonList, SpectrumType, StoredSpectrumData,
};

use super::super::storage::ScanDataStorage;
use super::tags::{self, TagTracker};

/// All the ways an mzML import can fail fatally. Per-array and per-scan
/// problems are not here: those are logged and the affected data is
/// skipped.
#[derive(Debug, Error)]
pub enum MzMLError {
    #[error("element <{element}> is missing required attribute `{attribute}` (byte {position})")]
    MissingAttribute {
        element: String,
        attribute: String,
        position: usize,
    },
    #[error(
        "element <{element}> attribute `{attribute}` has unparseable value `{value}` (byte {position})"
    )]
    MalformedAttribute {
        element: String,
        attribute: String,
        value: String,
        position: usize,
    },
    #[error("XML error at byte {position}: {source}")]
    Xml {
        position: usize,
        #[source]
        source: XMLError,
    },
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Attributes captured from the `<run>` and `<spectrumList>` elements.
#[derive(Debug, Default, Clone)]
pub struct RunDescription {
    pub default_instrument_configuration: String,
    pub default_data_processing: Option<String>,
    pub start_time_stamp: Option<NaiveDateTime>,
}

/// Everything one import produced.
#[derive(Debug)]
pub struct MzMLRawFile<Seg> {
    pub run: RunDescription,
    /// Finished mass spectra, in document order.
    pub scans: Vec<FinishedScan<Seg>>,
    /// Non-mass (UV/absorbance) spectra.
    pub other_spectra: Vec<FinishedScan<Seg>>,
    pub chromatograms: Vec<Chromatogram>,
    /// Committed ion-mobility frames, in document order.
    pub frames: Vec<MobilityFrameStorage<Seg>>,
}

/// The entity currently being built at one nesting level. Pushed when
/// its element opens, merged into its parent when it closes, so sibling
/// elements can never leak state into each other.
#[derive(Debug)]
enum OpenEntity {
    RefGroup { id: String, params: Vec<CvParam> },
    Spectrum(BuildingScan),
    Chromatogram(BuildingChromatogram),
    BinaryArray(BinaryDataInfo),
    ScanList(ScanList),
    Scan(Scan),
    ScanWindowList(ScanWindowList),
    ScanWindow(ScanWindow),
    PrecursorList(PrecursorList),
    Precursor(PrecursorElement),
    IsolationWindow(IsolationWindow),
    SelectedIonList(SelectedIonList),
    SelectedIon(SelectedIon),
    Activation(Activation),
    ProductList(ProductList),
    Product(Product),
}

macro_rules! pop_variant {
    ($self:ident, $variant:ident) => {
        match $self.stack.pop() {
            Some(OpenEntity::$variant(inner)) => Some(inner),
            Some(other) => {
                $self.stack.push(other);
                None
            }
            None => None,
        }
    };
}

/// A streaming mzML importer.
///
/// Consumes the XML cursor's element events one at a time, builds
/// spectrum/chromatogram records, decodes their binary payloads on
/// spectrum close, and routes mobility scans through the frame
/// assembler. Use [`MzMLImporter::read_from`] to drive it from a
/// reader, or feed [`MzMLImporter::process_event`] directly to
/// interleave cancellation or progress checks.
pub struct MzMLImporter<S: ScanDataStorage, P: ScanProcessor = PassThroughProcessor> {
    tracker: TagTracker,
    stack: Vec<OpenEntity>,
    reference_param_groups: IndexMap<String, Vec<CvParam>>,
    run: RunDescription,
    storage: S,
    processor: P,
    assembler: FrameAssembler,
    scans: Vec<FinishedScan<S::Segment>>,
    other_spectra: Vec<FinishedScan<S::Segment>>,
    chromatograms: Vec<Chromatogram>,
    frames: Vec<MobilityFrameStorage<S::Segment>>,
    total_scans: usize,
    parsed_scans: usize,
    default_array_length: usize,
    skip_binary_array: bool,
}

impl<S: ScanDataStorage> MzMLImporter<S, PassThroughProcessor> {
    pub fn new(storage: S) -> Self {
        Self::with_processor(storage, PassThroughProcessor)
    }
}

impl<S: ScanDataStorage, P: ScanProcessor> MzMLImporter<S, P> {
    pub fn with_processor(storage: S, processor: P) -> Self {
        Self {
            tracker: TagTracker::new(),
            stack: Vec::new(),
            reference_param_groups: IndexMap::new(),
            run: RunDescription::default(),
            storage,
            processor,
            assembler: FrameAssembler::new(),
            scans: Vec::new(),
            other_spectra: Vec::new(),
            chromatograms: Vec::new(),
            frames: Vec::new(),
            total_scans: 0,
            parsed_scans: 0,
            default_array_length: 0,
            skip_binary_array: false,
        }
    }

    /// Drive the importer over a whole document.
    pub fn read_from<R: BufRead>(&mut self, reader: R) -> Result<(), MzMLError> {
        let mut xml = Reader::from_reader(reader);
        xml.trim_text(true);
        let mut buffer = Vec::new();
        loop {
            match xml.read_event_into(&mut buffer) {
                Ok(Event::Eof) => break,
                Ok(event) => self.process_event(&event, xml.buffer_position())?,
                Err(source) => {
                    return Err(MzMLError::Xml {
                        position: xml.buffer_position(),
                        source,
                    })
                }
            }
            buffer.clear();
        }
        Ok(())
    }

    /// Open `path` and import it.
    pub fn read_path<Q: AsRef<Path>>(&mut self, path: Q) -> Result<(), MzMLError> {
        let file = fs::File::open(path)?;
        self.read_from(io::BufReader::new(file))
    }

    /// Consume one XML event. `position` is the cursor's byte offset,
    /// used in error messages.
    pub fn process_event(&mut self, event: &Event<'_>, position: usize) -> Result<(), MzMLError> {
        match event {
            Event::Start(e) => self.start_element(e, position),
            Event::Empty(e) => self.empty_element(e, position),
            Event::End(e) => self.end_element(e),
            Event::Text(e) => self.text(e, position),
            Event::CData(e) => {
                self.binary_text(String::from_utf8_lossy(e).into_owned());
                Ok(())
            }
            _ => Ok(()),
        }
    }

    pub fn run(&self) -> &RunDescription {
        &self.run
    }

    pub fn scans(&self) -> &[FinishedScan<S::Segment>] {
        &self.scans
    }

    pub fn other_spectra(&self) -> &[FinishedScan<S::Segment>] {
        &self.other_spectra
    }

    pub fn chromatograms(&self) -> &[Chromatogram] {
        &self.chromatograms
    }

    pub fn frames(&self) -> &[MobilityFrameStorage<S::Segment>] {
        &self.frames
    }

    /// Number of spectra the document declared.
    pub fn total_scans(&self) -> usize {
        self.total_scans
    }

    /// Number of `<spectrum>` elements fully read so far, before any
    /// filtering. Divergence from the finished scan count tells callers
    /// how much was skipped.
    pub fn parsed_scans(&self) -> usize {
        self.parsed_scans
    }

    pub fn finished_percentage(&self) -> f32 {
        if self.total_scans == 0 {
            0.0
        } else if self.parsed_scans > self.total_scans {
            1.0
        } else {
            self.parsed_scans as f32 / self.total_scans as f32
        }
    }

    /// Tear down the importer, yielding the parsed records and the
    /// storage they were committed to.
    pub fn finish(self) -> (MzMLRawFile<S::Segment>, S) {
        (
            MzMLRawFile {
                run: self.run,
                scans: self.scans,
                other_spectra: self.other_spectra,
                chromatograms: self.chromatograms,
                frames: self.frames,
            },
            self.storage,
        )
    }

    fn start_element(&mut self, event: &BytesStart<'_>, position: usize) -> Result<(), MzMLError> {
        let name = String::from_utf8_lossy(event.name().as_ref()).into_owned();
        self.tracker.enter(&name);

        match name.as_str() {
            tags::RUN => {
                self.run.default_instrument_configuration = required_attribute(
                    event,
                    tags::ATTR_DEFAULT_INSTRUMENT_CONFIGURATION_REF,
                    position,
                )?;
                // startTimeStamp is optional; a missing or unparseable one
                // must not stop the import
                if let Some(raw) = attribute(event, tags::ATTR_START_TIME_STAMP, position)? {
                    self.run.start_time_stamp = parse_start_time_stamp(&raw);
                    if self.run.start_time_stamp.is_none() {
                        warn!("could not parse run startTimeStamp `{raw}`");
                    }
                } else {
                    debug!("run carries no startTimeStamp");
                }
            }
            tags::SPECTRUM_LIST => {
                self.total_scans = required_parsed(event, tags::ATTR_COUNT, position)?;
                self.run.default_data_processing =
                    attribute(event, tags::ATTR_DEFAULT_DATA_PROCESSING_REF, position)?;
            }
            tags::SPECTRUM => {
                let id = required_attribute(event, tags::ATTR_ID, position)?;
                let index: usize = required_parsed(event, tags::ATTR_INDEX, position)?;
                self.default_array_length =
                    required_parsed(event, tags::ATTR_DEFAULT_ARRAY_LENGTH, position)?;
                let scan_number =
                    scan_number_from_native_id(&id).unwrap_or(index as i32 + 1);
                self.stack.push(OpenEntity::Spectrum(BuildingScan::new(
                    id,
                    scan_number,
                    self.default_array_length,
                )));
            }
            tags::CHROMATOGRAM => {
                let id = required_attribute(event, tags::ATTR_ID, position)?;
                let index: usize = required_parsed(event, tags::ATTR_INDEX, position)?;
                self.default_array_length =
                    required_parsed(event, tags::ATTR_DEFAULT_ARRAY_LENGTH, position)?;
                self.stack
                    .push(OpenEntity::Chromatogram(BuildingChromatogram::new(
                        id,
                        index as i32 + 1,
                        self.default_array_length,
                    )));
            }
            tags::BINARY_DATA_ARRAY => {
                self.skip_binary_array = false;
                let encoded_length = required_parsed(event, tags::ATTR_ENCODED_LENGTH, position)?;
                let array_length = match attribute(event, tags::ATTR_ARRAY_LENGTH, position)? {
                    Some(raw) => raw.parse().map_err(|_| MzMLError::MalformedAttribute {
                        element: name.clone(),
                        attribute: tags::ATTR_ARRAY_LENGTH.to_string(),
                        value: raw,
                        position,
                    })?,
                    None => self.default_array_length,
                };
                self.stack.push(OpenEntity::BinaryArray(BinaryDataInfo::new(
                    encoded_length,
                    array_length,
                )));
            }
            tags::REF_PARAM_GROUP => {
                let id = required_attribute(event, tags::ATTR_ID, position)?;
                self.stack.push(OpenEntity::RefGroup {
                    id,
                    params: Vec::new(),
                });
            }
            tags::SCAN_LIST => self.stack.push(OpenEntity::ScanList(ScanList::default())),
            tags::SCAN => self.stack.push(OpenEntity::Scan(Scan::default())),
            tags::SCAN_WINDOW_LIST => self
                .stack
                .push(OpenEntity::ScanWindowList(ScanWindowList::default())),
            tags::SCAN_WINDOW => self
                .stack
                .push(OpenEntity::ScanWindow(ScanWindow::default())),
            tags::PRECURSOR_LIST => self
                .stack
                .push(OpenEntity::PrecursorList(PrecursorList::default())),
            tags::PRECURSOR => {
                let spectrum_ref = attribute(event, tags::ATTR_SPECTRUM_REF, position)?;
                self.stack.push(OpenEntity::Precursor(PrecursorElement {
                    spectrum_ref,
                    ..Default::default()
                }));
            }
            tags::ISOLATION_WINDOW => self
                .stack
                .push(OpenEntity::IsolationWindow(IsolationWindow::default())),
            tags::SELECTED_ION_LIST => self
                .stack
                .push(OpenEntity::SelectedIonList(SelectedIonList::default())),
            tags::SELECTED_ION => self
                .stack
                .push(OpenEntity::SelectedIon(SelectedIon::default())),
            tags::ACTIVATION => self
                .stack
                .push(OpenEntity::Activation(Activation::default())),
            tags::PRODUCT_LIST => self
                .stack
                .push(OpenEntity::ProductList(ProductList::default())),
            tags::PRODUCT => self.stack.push(OpenEntity::Product(Product::default())),
            // These occasionally arrive as start/end pairs instead of
            // empty elements
            tags::CV_PARAM | tags::USER_PARAM | tags::REF_PARAM_GROUP_REF => {
                self.handle_leaf_element(&name, event, position)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn empty_element(&mut self, event: &BytesStart<'_>, position: usize) -> Result<(), MzMLError> {
        let name = String::from_utf8_lossy(event.name().as_ref()).into_owned();
        self.handle_leaf_element(&name, event, position)
    }

    fn handle_leaf_element(
        &mut self,
        name: &str,
        event: &BytesStart<'_>,
        position: usize,
    ) -> Result<(), MzMLError> {
        match name {
            tags::CV_PARAM => {
                let param = CvParam {
                    accession: required_attribute(event, tags::ATTR_ACCESSION, position)?,
                    value: attribute(event, tags::ATTR_VALUE, position)?,
                    name: attribute(event, tags::ATTR_NAME, position)?,
                    unit_accession: attribute(event, tags::ATTR_UNIT_ACCESSION, position)?,
                };
                self.route_cv_param(param);
            }
            tags::USER_PARAM => {
                let name_attr = attribute(event, tags::ATTR_NAME, position)?;
                let value = attribute(event, tags::ATTR_VALUE, position)?;
                if let (Some(name_attr), Some(value)) = (name_attr, value) {
                    self.route_user_param(UserParam::new(name_attr, value));
                }
            }
            tags::REF_PARAM_GROUP_REF => {
                let group_id = required_attribute(event, tags::ATTR_REF, position)?;
                self.expand_reference_group(&group_id);
            }
            _ => {}
        }
        Ok(())
    }

    /// Attach a CV parameter to the innermost open entity.
    fn route_cv_param(&mut self, param: CvParam) {
        let skip = self.skip_binary_array;
        match self.stack.last_mut() {
            Some(OpenEntity::BinaryArray(info)) => {
                if skip {
                    return;
                }
                if !fill_binary_param(info, &param) {
                    // An array of some type this pipeline does not carry
                    debug!("skipping binary array with cvParam {}", param.accession);
                    self.skip_binary_array = true;
                }
            }
            Some(OpenEntity::Spectrum(scan)) => scan.cv.add(param),
            Some(OpenEntity::Chromatogram(chromatogram)) => chromatogram.cv.add(param),
            Some(OpenEntity::ScanList(list)) => list.cv.add(param),
            Some(OpenEntity::Scan(scan)) => scan.cv.add(param),
            Some(OpenEntity::ScanWindow(window)) => window.cv.add(param),
            Some(OpenEntity::IsolationWindow(window)) => window.cv.add(param),
            Some(OpenEntity::SelectedIon(ion)) => ion.cv.add(param),
            Some(OpenEntity::Activation(activation)) => activation.cv.add(param),
            Some(OpenEntity::RefGroup { params, .. }) => params.push(param),
            Some(_) => {
                debug!("ignoring cvParam {} at {}", param.accession, self.tracker.path());
            }
            // File-level metadata outside the scope of scan import
            None => {}
        }
    }

    fn route_user_param(&mut self, param: UserParam) {
        if let Some(OpenEntity::IsolationWindow(window)) = self.stack.last_mut() {
            // msconvert >= 3.0 records the MSn level of a precursor this way
            if param.name == "ms level" {
                window.ms_level = Some(param.value);
            }
        }
    }

    fn expand_reference_group(&mut self, group_id: &str) {
        let Some(params) = self.reference_param_groups.get(group_id) else {
            warn!("referenceableParamGroupRef to undefined group `{group_id}`");
            return;
        };
        for param in params.clone() {
            self.route_cv_param(param);
        }
    }

    fn end_element(&mut self, event: &BytesEnd<'_>) -> Result<(), MzMLError> {
        let name = String::from_utf8_lossy(event.name().as_ref()).into_owned();
        self.tracker.exit(&name);

        match name.as_str() {
            tags::REF_PARAM_GROUP => match self.stack.pop() {
                Some(OpenEntity::RefGroup { id, params }) => {
                    self.reference_param_groups.insert(id, params);
                }
                Some(other) => self.stack.push(other),
                None => {}
            },
            tags::SCAN_WINDOW => {
                if let Some(window) = pop_variant!(self, ScanWindow) {
                    if let Some(OpenEntity::ScanWindowList(list)) = self.stack.last_mut() {
                        list.windows.push(window);
                    }
                }
            }
            tags::SCAN_WINDOW_LIST => {
                if let Some(list) = pop_variant!(self, ScanWindowList) {
                    if let Some(OpenEntity::Scan(scan)) = self.stack.last_mut() {
                        scan.scan_windows = Some(list);
                    }
                }
            }
            tags::SCAN => {
                if let Some(scan) = pop_variant!(self, Scan) {
                    if let Some(OpenEntity::ScanList(list)) = self.stack.last_mut() {
                        list.scans.push(scan);
                    }
                }
            }
            tags::SCAN_LIST => {
                if let Some(list) = pop_variant!(self, ScanList) {
                    if let Some(OpenEntity::Spectrum(spectrum)) = self.stack.last_mut() {
                        spectrum.scan_list = list;
                    }
                }
            }
            tags::ISOLATION_WINDOW => {
                if let Some(window) = pop_variant!(self, IsolationWindow) {
                    match self.stack.last_mut() {
                        Some(OpenEntity::Precursor(precursor)) => {
                            precursor.isolation_window = Some(window);
                        }
                        Some(OpenEntity::Product(product)) => {
                            product.isolation_window = Some(window);
                        }
                        _ => {}
                    }
                }
            }
            tags::SELECTED_ION => {
                if let Some(ion) = pop_variant!(self, SelectedIon) {
                    if let Some(OpenEntity::SelectedIonList(list)) = self.stack.last_mut() {
                        list.ions.push(ion);
                    }
                }
            }
            tags::SELECTED_ION_LIST => {
                if let Some(list) = pop_variant!(self, SelectedIonList) {
                    if let Some(OpenEntity::Precursor(precursor)) = self.stack.last_mut() {
                        precursor.selected_ions = Some(list);
                    }
                }
            }
            tags::ACTIVATION => {
                if let Some(activation) = pop_variant!(self, Activation) {
                    if let Some(OpenEntity::Precursor(precursor)) = self.stack.last_mut() {
                        precursor.activation = Some(activation);
                    }
                }
            }
            tags::PRECURSOR => {
                if let Some(precursor) = pop_variant!(self, Precursor) {
                    match self.stack.last_mut() {
                        Some(OpenEntity::PrecursorList(list)) => list.precursors.push(precursor),
                        Some(OpenEntity::Chromatogram(chromatogram)) => {
                            chromatogram.precursor = Some(precursor);
                        }
                        _ => {}
                    }
                }
            }
            tags::PRECURSOR_LIST => {
                if let Some(list) = pop_variant!(self, PrecursorList) {
                    if let Some(OpenEntity::Spectrum(spectrum)) = self.stack.last_mut() {
                        spectrum.precursor_list = list;
                    }
                }
            }
            tags::PRODUCT => {
                if let Some(product) = pop_variant!(self, Product) {
                    match self.stack.last_mut() {
                        Some(OpenEntity::ProductList(list)) => list.products.push(product),
                        Some(OpenEntity::Chromatogram(chromatogram)) => {
                            chromatogram.product = Some(product);
                        }
                        _ => {}
                    }
                }
            }
            tags::PRODUCT_LIST => {
                if let Some(list) = pop_variant!(self, ProductList) {
                    if let Some(OpenEntity::Spectrum(spectrum)) = self.stack.last_mut() {
                        spectrum.product_list = list;
                    }
                }
            }
            tags::BINARY_DATA_ARRAY => {
                if let Some(info) = pop_variant!(self, BinaryArray) {
                    if !self.skip_binary_array {
                        match self.stack.last_mut() {
                            Some(OpenEntity::Spectrum(spectrum)) => spectrum.assign_array(info),
                            Some(OpenEntity::Chromatogram(chromatogram)) => {
                                chromatogram.assign_array(info);
                            }
                            _ => {}
                        }
                    }
                }
            }
            tags::SPECTRUM => {
                self.parsed_scans += 1;
                if let Some(scan) = pop_variant!(self, Spectrum) {
                    self.finalize_scan(scan)?;
                }
            }
            tags::SPECTRUM_LIST => {
                // The last frame has no following retention time change
                // to trigger its commit
                self.assembler
                    .flush(&mut self.storage, &mut self.frames)?;
            }
            tags::CHROMATOGRAM => {
                if let Some(chromatogram) = pop_variant!(self, Chromatogram) {
                    self.finalize_chromatogram(chromatogram);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn text(&mut self, event: &BytesText<'_>, position: usize) -> Result<(), MzMLError> {
        if self.tracker.current() == Some(tags::BINARY) {
            let text = event
                .unescape()
                .map_err(|source| MzMLError::Xml { position, source })?;
            self.binary_text(text.into_owned());
        }
        Ok(())
    }

    fn binary_text(&mut self, text: String) {
        if self.skip_binary_array {
            return;
        }
        if let Some(OpenEntity::BinaryArray(info)) = self.stack.last_mut() {
            info.set_text(text);
        }
    }

    /// Spectrum-close pipeline: resolve metadata, filter, decode,
    /// process, then commit to storage or queue for frame assembly.
    fn finalize_scan(&mut self, mut scan: BuildingScan) -> Result<(), MzMLError> {
        if scan.is_uv_spectrum() {
            return self.finalize_uv_scan(scan);
        }
        if !scan.is_mass_spectrum() {
            debug!("scan #{} carries no m/z array, skipping", scan.scan_number);
            return Ok(());
        }

        let mut metadata = scan.resolve_metadata()?;
        if !self.processor.matches(&metadata) {
            return Ok(());
        }

        let Some(mz_info) = scan.take_mz_info() else {
            return Ok(());
        };
        let Some(intensity_info) = scan.take_intensity_info() else {
            warn!(
                "scan #{} has an m/z array but no intensity array, skipping",
                scan.scan_number
            );
            return Ok(());
        };
        let mobility_info = scan.take_mobility_info();
        scan.clear_binary_data();

        let mzs = match mz_info.decode() {
            Ok(values) => values,
            Err(e) => {
                warn!("could not load data of scan #{}: {e}", scan.scan_number);
                return Ok(());
            }
        };
        let intensities = match intensity_info.decode() {
            Ok(values) => values,
            Err(e) => {
                warn!("could not load data of scan #{}: {e}", scan.scan_number);
                return Ok(());
            }
        };
        drop(mz_info);
        drop(intensity_info);

        let mut arrays = SpectralArrays::new(mzs, intensities);
        if arrays.mzs.len() != arrays.intensities.len() {
            warn!(
                "scan #{}: m/z and intensity arrays have different lengths ({} vs {})",
                scan.scan_number,
                arrays.mzs.len(),
                arrays.intensities.len()
            );
            let shorter = arrays.mzs.len().min(arrays.intensities.len());
            arrays.mzs.truncate(shorter);
            arrays.intensities.truncate(shorter);
        }

        if metadata.scanning_range.is_none() && !arrays.mzs.is_empty() {
            let (low, high) = arrays
                .mzs
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), mz| {
                    (lo.min(*mz), hi.max(*mz))
                });
            metadata.scanning_range = Some((low, high));
        }

        if let Some(info) = mobility_info {
            match mobility_type_from_unit(info.unit_accession.as_deref()) {
                Some(kind) => match info.decode() {
                    Ok(mobilities) if mobilities.len() == arrays.len() => {
                        return self.queue_merged_mobility(scan, metadata, arrays, mobilities, kind);
                    }
                    Ok(mobilities) => warn!(
                        "scan #{}: mobility array of {} values does not match {} data points, importing as a plain scan",
                        scan.scan_number,
                        mobilities.len(),
                        arrays.len()
                    ),
                    Err(e) => warn!(
                        "could not load the mobility array of scan #{}: {e}",
                        scan.scan_number
                    ),
                },
                None => warn!(
                    "scan #{}: unrecognized mobility array unit {:?}, importing as a plain scan",
                    scan.scan_number, info.unit_accession
                ),
            }
        }

        let arrays = self.processor.process(&metadata, arrays);
        if self.processor.mass_detect_active(metadata.ms_level) {
            metadata.spectrum_type = Some(SpectrumType::Centroided);
        }

        if let Some(Mobility { value, kind }) = metadata.mobility {
            let entry = PendingMobilityScan {
                id: scan.id,
                scan_number: scan.scan_number,
                metadata,
                arrays,
                mobility: value,
                mobility_type: kind,
            };
            self.assembler
                .push(entry, &mut self.storage, &mut self.frames)?;
            return Ok(());
        }

        let mzs = self.storage.store_doubles(&arrays.mzs)?;
        let intensities = self.storage.store_doubles(&arrays.intensities)?;
        self.scans.push(FinishedScan {
            id: scan.id,
            scan_number: scan.scan_number,
            metadata,
            cv: scan.cv,
            data: StoredSpectrumData::Mass { mzs, intensities },
        });
        Ok(())
    }

    /// Split a merged-mobility spectrum along maximal runs of identical
    /// mobility values and queue every sub-scan as one frame-assembly
    /// set.
    fn queue_merged_mobility(
        &mut self,
        scan: BuildingScan,
        metadata: ScanMetadata,
        arrays: SpectralArrays,
        mobilities: Vec<f64>,
        kind: MobilityType,
    ) -> Result<(), MzMLError> {
        let centroided = self.processor.mass_detect_active(metadata.ms_level);
        for (start, end) in split_mobility_runs(&mobilities) {
            let sub_arrays = SpectralArrays::new(
                arrays.mzs[start..end].to_vec(),
                arrays.intensities[start..end].to_vec(),
            );
            let mut sub_metadata = metadata.clone();
            sub_metadata.mobility = Some(Mobility {
                value: mobilities[start],
                kind,
            });
            if !self.processor.matches(&sub_metadata) {
                continue;
            }
            let sub_arrays = self.processor.process(&sub_metadata, sub_arrays);
            if centroided {
                sub_metadata.spectrum_type = Some(SpectrumType::Centroided);
            }
            let entry = PendingMobilityScan {
                id: scan.id.clone(),
                scan_number: scan.scan_number,
                metadata: sub_metadata,
                arrays: sub_arrays,
                mobility: mobilities[start],
                mobility_type: kind,
            };
            self.assembler
                .push(entry, &mut self.storage, &mut self.frames)?;
        }
        Ok(())
    }

    /// UV/absorbance spectra bypass mass-spectrum processing entirely:
    /// decode wavelength and intensity, commit, done.
    fn finalize_uv_scan(&mut self, mut scan: BuildingScan) -> Result<(), MzMLError> {
        let metadata = scan.resolve_metadata()?;
        let Some(wavelength_info) = scan.take_wavelength_info() else {
            return Ok(());
        };
        let Some(intensity_info) = scan.take_intensity_info() else {
            return Ok(());
        };
        scan.clear_binary_data();

        let decoded = wavelength_info
            .decode()
            .and_then(|wavelengths| Ok((wavelengths, intensity_info.decode()?)));
        let (wavelengths, intensities) = match decoded {
            Ok(pair) => pair,
            Err(e) => {
                warn!("could not load data of scan #{}: {e}", scan.scan_number);
                return Ok(());
            }
        };

        let wavelengths = self.storage.store_doubles(&wavelengths)?;
        let intensities = self.storage.store_doubles(&intensities)?;
        self.other_spectra.push(FinishedScan {
            id: scan.id,
            scan_number: scan.scan_number,
            metadata,
            cv: scan.cv,
            data: StoredSpectrumData::Uv {
                wavelengths,
                intensities,
            },
        });
        Ok(())
    }

    fn finalize_chromatogram(&mut self, chromatogram: BuildingChromatogram) {
        if !chromatogram.is_complete() {
            debug!(
                "chromatogram {} is missing a time or intensity array, skipping",
                chromatogram.id
            );
            return;
        }
        let id = chromatogram.id.clone();
        match chromatogram.finish() {
            Ok(finished) => self.chromatograms.push(finished),
            Err(e) => warn!("could not load data of chromatogram {id}: {e}"),
        }
    }
}

/// Dispatch one CV accession observed inside a `<binaryDataArray>`.
/// Returns `false` for accessions naming an array type or layout this
/// pipeline does not carry, which skips the whole array.
fn fill_binary_param(info: &mut BinaryDataInfo, param: &CvParam) -> bool {
    if let Some(bit_length) = BitLength::from_accession(&param.accession) {
        info.set_bit_length(bit_length);
        return true;
    }
    if info.observe_compression(&param.accession) {
        return true;
    }
    if let Some(kind) = ArrayKind::from_accession(&param.accession) {
        info.set_array_kind(kind);
        if let Some(unit) = param.unit() {
            info.set_unit_accession(unit);
        }
        return true;
    }
    false
}

fn attribute(
    event: &BytesStart<'_>,
    name: &str,
    position: usize,
) -> Result<Option<String>, MzMLError> {
    for attr in event.attributes() {
        let attr = attr.map_err(|e| MzMLError::Xml {
            position,
            source: e.into(),
        })?;
        if attr.key.as_ref() == name.as_bytes() {
            let value = attr
                .unescape_value()
                .map_err(|source| MzMLError::Xml { position, source })?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn required_attribute(
    event: &BytesStart<'_>,
    name: &str,
    position: usize,
) -> Result<String, MzMLError> {
    attribute(event, name, position)?.ok_or_else(|| MzMLError::MissingAttribute {
        element: String::from_utf8_lossy(event.name().as_ref()).into_owned(),
        attribute: name.to_string(),
        position,
    })
}

fn required_parsed<T: FromStr>(
    event: &BytesStart<'_>,
    name: &str,
    position: usize,
) -> Result<T, MzMLError> {
    let value = required_attribute(event, name, position)?;
    value.parse().map_err(|_| MzMLError::MalformedAttribute {
        element: String::from_utf8_lossy(event.name().as_ref()).into_owned(),
        attribute: name.to_string(),
        value,
        position,
    })
}

fn parse_start_time_stamp(raw: &str) -> Option<NaiveDateTime> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.naive_utc())
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S").ok())
}
