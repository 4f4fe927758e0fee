use std::fmt::{self, Display};

use thiserror::Error;

use crate::cv;

use super::numpress::NumpressError;

/// The primitive value layouts a `<binaryDataArray>` may declare through
/// its bit-length CV term.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitLength {
    Float16,
    Float32,
    #[default]
    Float64,
    Int32,
    Int64,
}

impl BitLength {
    /// Size in bytes of a single encoded value.
    pub const fn size_of(&self) -> usize {
        match self {
            BitLength::Float16 => 2,
            BitLength::Float32 | BitLength::Int32 => 4,
            BitLength::Float64 | BitLength::Int64 => 8,
        }
    }

    pub const fn accession(&self) -> &'static str {
        match self {
            BitLength::Float16 => cv::BITS_16_FLOAT,
            BitLength::Float32 => cv::BITS_32_FLOAT,
            BitLength::Float64 => cv::BITS_64_FLOAT,
            BitLength::Int32 => cv::BITS_32_INTEGER,
            BitLength::Int64 => cv::BITS_64_INTEGER,
        }
    }

    pub fn from_accession(accession: &str) -> Option<Self> {
        match accession {
            cv::BITS_16_FLOAT => Some(Self::Float16),
            cv::BITS_32_FLOAT => Some(Self::Float32),
            cv::BITS_64_FLOAT => Some(Self::Float64),
            cv::BITS_32_INTEGER => Some(Self::Int32),
            cv::BITS_64_INTEGER => Some(Self::Int64),
            _ => None,
        }
    }
}

impl Display for BitLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The MS-Numpress scheme applied to an array, independent of whether a
/// zlib stage wraps it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumpressKind {
    Linear,
    PositiveInteger,
    ShortLoggedFloat,
}

impl NumpressKind {
    pub const fn accession(&self) -> &'static str {
        match self {
            NumpressKind::Linear => cv::NUMPRESS_LINEAR,
            NumpressKind::PositiveInteger => cv::NUMPRESS_PIC,
            NumpressKind::ShortLoggedFloat => cv::NUMPRESS_SLOF,
        }
    }

    pub fn from_accession(accession: &str) -> Option<Self> {
        match accession {
            cv::NUMPRESS_LINEAR => Some(Self::Linear),
            cv::NUMPRESS_PIC => Some(Self::PositiveInteger),
            cv::NUMPRESS_SLOF => Some(Self::ShortLoggedFloat),
            _ => None,
        }
    }
}

impl Display for NumpressKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The compression state of a raw byte buffer.
///
/// A document declares at most two independent CV terms per array (one
/// numpress scheme, one zlib flag, in either order); the descriptor
/// tracks them separately and synthesizes this enum only when handing a
/// buffer to the decode engine. `Decoded` is the terminal state of a
/// buffer that has already been expanded.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryCompression {
    #[default]
    NoCompression,
    Zlib,
    NumpressLinear,
    NumpressPic,
    NumpressSlof,
    NumpressLinearZlib,
    NumpressPicZlib,
    NumpressSlofZlib,
    Decoded,
}

impl BinaryCompression {
    /// Compose the two independently observed components. Zlib always
    /// decompresses before numpress decoding, whatever order the CV terms
    /// appeared in.
    pub const fn from_components(numpress: Option<NumpressKind>, zlib: bool) -> Self {
        match (numpress, zlib) {
            (None, false) => Self::NoCompression,
            (None, true) => Self::Zlib,
            (Some(NumpressKind::Linear), false) => Self::NumpressLinear,
            (Some(NumpressKind::PositiveInteger), false) => Self::NumpressPic,
            (Some(NumpressKind::ShortLoggedFloat), false) => Self::NumpressSlof,
            (Some(NumpressKind::Linear), true) => Self::NumpressLinearZlib,
            (Some(NumpressKind::PositiveInteger), true) => Self::NumpressPicZlib,
            (Some(NumpressKind::ShortLoggedFloat), true) => Self::NumpressSlofZlib,
        }
    }

    pub const fn uses_zlib(&self) -> bool {
        matches!(
            self,
            Self::Zlib | Self::NumpressLinearZlib | Self::NumpressPicZlib | Self::NumpressSlofZlib
        )
    }

    pub const fn numpress(&self) -> Option<NumpressKind> {
        match self {
            Self::NumpressLinear | Self::NumpressLinearZlib => Some(NumpressKind::Linear),
            Self::NumpressPic | Self::NumpressPicZlib => Some(NumpressKind::PositiveInteger),
            Self::NumpressSlof | Self::NumpressSlofZlib => Some(NumpressKind::ShortLoggedFloat),
            _ => None,
        }
    }

    pub const fn accession(&self) -> Option<&'static str> {
        match self {
            Self::NoCompression => Some(cv::NO_COMPRESSION),
            Self::Zlib => Some(cv::ZLIB_COMPRESSION),
            Self::NumpressLinear => Some(cv::NUMPRESS_LINEAR),
            Self::NumpressPic => Some(cv::NUMPRESS_PIC),
            Self::NumpressSlof => Some(cv::NUMPRESS_SLOF),
            Self::NumpressLinearZlib => Some(cv::NUMPRESS_LINEAR_ZLIB),
            Self::NumpressPicZlib => Some(cv::NUMPRESS_PIC_ZLIB),
            Self::NumpressSlofZlib => Some(cv::NUMPRESS_SLOF_ZLIB),
            Self::Decoded => None,
        }
    }

    pub fn from_accession(accession: &str) -> Option<Self> {
        match accession {
            cv::NO_COMPRESSION => Some(Self::NoCompression),
            cv::ZLIB_COMPRESSION => Some(Self::Zlib),
            cv::NUMPRESS_LINEAR => Some(Self::NumpressLinear),
            cv::NUMPRESS_PIC => Some(Self::NumpressPic),
            cv::NUMPRESS_SLOF => Some(Self::NumpressSlof),
            cv::NUMPRESS_LINEAR_ZLIB => Some(Self::NumpressLinearZlib),
            cv::NUMPRESS_PIC_ZLIB => Some(Self::NumpressPicZlib),
            cv::NUMPRESS_SLOF_ZLIB => Some(Self::NumpressSlofZlib),
            _ => None,
        }
    }
}

impl Display for BinaryCompression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The semantic role of a binary array within its spectrum or
/// chromatogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArrayKind {
    Mz,
    Intensity,
    Time,
    Wavelength,
    Mobility,
}

impl ArrayKind {
    pub fn from_accession(accession: &str) -> Option<Self> {
        match accession {
            cv::MZ_ARRAY => Some(Self::Mz),
            cv::INTENSITY_ARRAY => Some(Self::Intensity),
            cv::TIME_ARRAY => Some(Self::Time),
            cv::WAVELENGTH_ARRAY => Some(Self::Wavelength),
            cv::ION_MOBILITY_ARRAY
            | cv::MEAN_ION_MOBILITY_ARRAY
            | cv::MEAN_DRIFT_TIME_ARRAY
            | cv::MEAN_INVERSE_REDUCED_MOBILITY_ARRAY
            | cv::RAW_ION_MOBILITY_ARRAY
            | cv::RAW_DRIFT_TIME_ARRAY
            | cv::RAW_INVERSE_REDUCED_MOBILITY_ARRAY => Some(Self::Mobility),
            _ => None,
        }
    }
}

impl Display for ArrayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Failure modes of expanding one binary array. These are recoverable at
/// the spectrum level: the affected array is treated as absent and the
/// import continues.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ArrayDecodeError {
    #[error("failed to decode base64 text: {0}")]
    Base64(String),
    #[error("failed to inflate zlib stream: {0}")]
    Inflate(String),
    #[error("MS-Numpress {kind} decoding failed: {source}")]
    Numpress {
        kind: NumpressKind,
        #[source]
        source: NumpressError,
    },
    #[error("no bit length declared for an uncompressed array")]
    UnknownBitLength,
}
