//! PSI-MS / UO controlled vocabulary accessions the importer dispatches on.
//!
//! Every accession the pipeline recognizes lives here so the lookup
//! tables in `spectrum::bindata::encodings` and the derived-field
//! resolution in `spectrum::scan` share one source of truth.

// Spectrum representation
pub const CENTROID_SPECTRUM: &str = "MS:1000127";
pub const PROFILE_SPECTRUM: &str = "MS:1000128";

pub const MS_LEVEL: &str = "MS:1000511";

// Polarity, on the spectrum or on its first scan
pub const POLARITY_NEGATIVE: &str = "MS:1000129";
pub const POLARITY_POSITIVE: &str = "MS:1000130";

// The four accessions accepted as a scan's retention time
pub const RT_SCAN_START: &str = "MS:1000016";
pub const RT_RETENTION_TIME: &str = "MS:1000894";
pub const RT_RETENTION_TIME_LOCAL: &str = "MS:1000895";
pub const RT_RETENTION_TIME_NORMALIZED: &str = "MS:1000896";

// Time units. Two distinct "minute" terms appear in the wild.
pub const UNIT_MINUTE: &str = "UO:0000031";
pub const UNIT_MINUTE_ALT: &str = "MS:1000038";
pub const UNIT_SECOND: &str = "UO:0000010";
pub const UNIT_MILLISECOND: &str = "UO:0000028";

// Unit of TIMS inverse reduced ion mobility
pub const UNIT_VOLT_SECOND_PER_SQUARE_CM: &str = "MS:1002814";

// Scan description
pub const SCAN_FILTER_STRING: &str = "MS:1000512";
pub const ION_INJECTION_TIME: &str = "MS:1000927";
pub const SCAN_WINDOW_UPPER_LIMIT: &str = "MS:1000500";
pub const SCAN_WINDOW_LOWER_LIMIT: &str = "MS:1000501";

// Spectrum-level summary values
pub const TOTAL_ION_CURRENT: &str = "MS:1000285";
pub const BASE_PEAK_MZ: &str = "MS:1000504";
pub const BASE_PEAK_INTENSITY: &str = "MS:1000505";
pub const HIGHEST_OBSERVED_MZ: &str = "MS:1000527";
pub const LOWEST_OBSERVED_MZ: &str = "MS:1000528";

// Precursor isolation
pub const MZ: &str = "MS:1000040";
pub const CHARGE_STATE: &str = "MS:1000041";
pub const SELECTED_ION_MZ: &str = "MS:1000744";
pub const ISOLATION_WINDOW_TARGET: &str = "MS:1000827";
pub const ISOLATION_WINDOW_LOWER_OFFSET: &str = "MS:1000828";
pub const ISOLATION_WINDOW_UPPER_OFFSET: &str = "MS:1000829";

// Scan-level ion mobility
pub const MOBILITY_DRIFT_TIME: &str = "MS:1002476";
pub const MOBILITY_INVERSE_REDUCED: &str = "MS:1002815";

// Binary array semantic types
pub const MZ_ARRAY: &str = "MS:1000514";
pub const INTENSITY_ARRAY: &str = "MS:1000515";
pub const TIME_ARRAY: &str = "MS:1000595";
pub const WAVELENGTH_ARRAY: &str = "MS:1000617";

// The ion mobility array family; the unit accession decides the
// mobility type, so all of these collapse to one array kind.
pub const MEAN_DRIFT_TIME_ARRAY: &str = "MS:1002477";
pub const MEAN_ION_MOBILITY_ARRAY: &str = "MS:1002816";
pub const ION_MOBILITY_ARRAY: &str = "MS:1002893";
pub const MEAN_INVERSE_REDUCED_MOBILITY_ARRAY: &str = "MS:1003006";
pub const RAW_ION_MOBILITY_ARRAY: &str = "MS:1003007";
pub const RAW_INVERSE_REDUCED_MOBILITY_ARRAY: &str = "MS:1003008";
pub const RAW_DRIFT_TIME_ARRAY: &str = "MS:1003153";

// Binary array bit lengths
pub const BITS_32_INTEGER: &str = "MS:1000519";
pub const BITS_16_FLOAT: &str = "MS:1000520";
pub const BITS_32_FLOAT: &str = "MS:1000521";
pub const BITS_64_INTEGER: &str = "MS:1000522";
pub const BITS_64_FLOAT: &str = "MS:1000523";

// Binary array compression terms
pub const ZLIB_COMPRESSION: &str = "MS:1000574";
pub const NO_COMPRESSION: &str = "MS:1000576";
pub const NUMPRESS_LINEAR: &str = "MS:1002312";
pub const NUMPRESS_PIC: &str = "MS:1002313";
pub const NUMPRESS_SLOF: &str = "MS:1002314";
pub const NUMPRESS_LINEAR_ZLIB: &str = "MS:1002746";
pub const NUMPRESS_PIC_ZLIB: &str = "MS:1002747";
pub const NUMPRESS_SLOF_ZLIB: &str = "MS:1002748";
