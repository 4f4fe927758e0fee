use std::io::prelude::*;

use flate2::write::{ZlibDecoder, ZlibEncoder};
use flate2::Compression;
use log::{debug, warn};
use num_traits::ToPrimitive;

use super::encodings::{
    ArrayDecodeError, ArrayKind, BinaryCompression, BitLength, NumpressKind,
};
use super::numpress;

pub type Bytes = Vec<u8>;

/// Per-array metadata for one `<binaryDataArray>` element, built up
/// incrementally as its attributes and child CV params are seen.
///
/// The two compression CV terms a document may declare (one numpress
/// scheme, one zlib flag) are tracked as orthogonal components and only
/// folded into a [`BinaryCompression`] at the decode boundary, so their
/// arrival order never matters.
#[derive(Debug, Default, Clone)]
pub struct BinaryDataInfo {
    pub encoded_length: usize,
    pub array_length: usize,
    bit_length: Option<BitLength>,
    numpress: Option<NumpressKind>,
    zlib: bool,
    pub array_kind: Option<ArrayKind>,
    pub unit_accession: Option<String>,
    text: Option<String>,
}

impl BinaryDataInfo {
    pub fn new(encoded_length: usize, array_length: usize) -> Self {
        Self {
            encoded_length,
            array_length,
            ..Default::default()
        }
    }

    pub fn bit_length(&self) -> Option<BitLength> {
        self.bit_length
    }

    pub fn set_bit_length(&mut self, bit_length: BitLength) {
        self.bit_length = Some(bit_length);
    }

    pub fn set_array_kind(&mut self, kind: ArrayKind) {
        self.array_kind = Some(kind);
    }

    pub fn set_unit_accession<S: Into<String>>(&mut self, accession: S) {
        self.unit_accession = Some(accession.into());
    }

    /// Fold a compression CV accession into the descriptor. Returns
    /// `false` when the accession is not a compression term.
    pub fn observe_compression(&mut self, accession: &str) -> bool {
        let Some(compression) = BinaryCompression::from_accession(accession) else {
            return false;
        };
        if compression.uses_zlib() {
            self.zlib = true;
        }
        if let Some(kind) = compression.numpress() {
            self.numpress = Some(kind);
        }
        true
    }

    /// The composite compression state the decode engine will run.
    pub fn compression(&self) -> BinaryCompression {
        BinaryCompression::from_components(self.numpress, self.zlib)
    }

    pub fn set_text<S: Into<String>>(&mut self, text: S) {
        self.text = Some(text.into());
    }

    /// Expand the raw base64 text into a `f64` sequence.
    ///
    /// Pure with respect to the descriptor: calling it twice yields
    /// identical output. The caller drops the descriptor (and with it the
    /// base64 text) immediately after a successful decode to bound peak
    /// memory.
    pub fn decode(&self) -> Result<Vec<f64>, ArrayDecodeError> {
        if self.encoded_length == 0 {
            return Ok(Vec::new());
        }
        let Some(text) = self.text.as_deref() else {
            debug!("binary data array closed without a <binary> body");
            return Ok(Vec::new());
        };

        let bytestring: Bytes = base64_simd::STANDARD
            .decode_type::<Bytes>(text.trim().as_bytes())
            .map_err(|e| ArrayDecodeError::Base64(e.to_string()))?;

        let bytestring = if self.compression().uses_zlib() {
            decompress_zlib(&bytestring)?
        } else {
            bytestring
        };

        let decoded = match self.numpress {
            Some(kind) => decode_numpress(kind, &bytestring)?,
            None => widen_to_f64(&bytestring, self.bit_length)?,
        };

        if decoded.len() != self.array_length {
            warn!(
                "{} array decoded to {} points but declared {}",
                self.array_kind
                    .map(|k| k.to_string())
                    .unwrap_or_else(|| "untyped".into()),
                decoded.len(),
                self.array_length
            );
        }
        Ok(decoded)
    }
}

pub fn compress_zlib(bytestring: &[u8]) -> Bytes {
    let mut compressor = ZlibEncoder::new(Bytes::new(), Compression::default());
    compressor.write_all(bytestring).expect("Error compressing");
    compressor.finish().expect("Error compressing")
}

pub fn decompress_zlib(bytestring: &[u8]) -> Result<Bytes, ArrayDecodeError> {
    let mut decompressor = ZlibDecoder::new(Bytes::new());
    decompressor
        .write_all(bytestring)
        .map_err(|e| ArrayDecodeError::Inflate(e.to_string()))?;
    decompressor
        .finish()
        .map_err(|e| ArrayDecodeError::Inflate(e.to_string()))
}

fn decode_numpress(kind: NumpressKind, data: &[u8]) -> Result<Vec<f64>, ArrayDecodeError> {
    let result = match kind {
        NumpressKind::Linear => numpress::decode_linear(data),
        NumpressKind::PositiveInteger => numpress::decode_pic(data),
        NumpressKind::ShortLoggedFloat => numpress::decode_slof(data),
    };
    result.map_err(|source| ArrayDecodeError::Numpress { kind, source })
}

/// Interpret `data` as a flat little-endian array of `bit_length`-sized
/// values and widen every element to `f64`.
fn widen_to_f64(data: &[u8], bit_length: Option<BitLength>) -> Result<Vec<f64>, ArrayDecodeError> {
    let Some(bit_length) = bit_length else {
        return Err(ArrayDecodeError::UnknownBitLength);
    };
    let width = bit_length.size_of();
    if data.len() % width != 0 {
        warn!(
            "{} trailing bytes ignored while decoding a {} array",
            data.len() % width,
            bit_length
        );
    }
    let mut out = Vec::with_capacity(data.len() / width);
    match bit_length {
        BitLength::Float16 => {
            for chunk in data.chunks_exact(2) {
                out.push(f16_bits_to_f64(u16::from_le_bytes([chunk[0], chunk[1]])));
            }
        }
        BitLength::Float32 => {
            for chunk in data.chunks_exact(4) {
                let v = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                out.push(v.to_f64().unwrap_or(f64::NAN));
            }
        }
        BitLength::Float64 => {
            for chunk in data.chunks_exact(8) {
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(chunk);
                out.push(f64::from_le_bytes(bytes));
            }
        }
        BitLength::Int32 => {
            for chunk in data.chunks_exact(4) {
                let v = i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                out.push(v.to_f64().unwrap_or(f64::NAN));
            }
        }
        BitLength::Int64 => {
            for chunk in data.chunks_exact(8) {
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(chunk);
                out.push(i64::from_le_bytes(bytes).to_f64().unwrap_or(f64::NAN));
            }
        }
    }
    Ok(out)
}

/// Encode a `f64` sequence as the base64 text body of a
/// `<binaryDataArray>`, the inverse of [`BinaryDataInfo::decode`].
///
/// Numpress layouts ignore `bit_length` since their wire format is
/// self-describing.
pub fn encode_array(values: &[f64], bit_length: BitLength, compression: BinaryCompression) -> String {
    let bytestring = match compression.numpress() {
        Some(NumpressKind::Linear) => {
            numpress::encode_linear(values, numpress::optimal_linear_fixed_point(values))
        }
        Some(NumpressKind::PositiveInteger) => numpress::encode_pic(values),
        Some(NumpressKind::ShortLoggedFloat) => {
            numpress::encode_slof(values, numpress::optimal_slof_fixed_point(values))
        }
        None => narrow_from_f64(values, bit_length),
    };
    let bytestring = if compression.uses_zlib() {
        compress_zlib(&bytestring)
    } else {
        bytestring
    };
    let encoded = base64_simd::STANDARD.encode_type::<Bytes>(&bytestring);
    String::from_utf8(encoded).expect("base64 text is ASCII")
}

fn narrow_from_f64(values: &[f64], bit_length: BitLength) -> Bytes {
    let mut out = Bytes::with_capacity(values.len() * bit_length.size_of());
    match bit_length {
        BitLength::Float16 => {
            for v in values {
                out.extend_from_slice(&f64_to_f16_bits(*v).to_le_bytes());
            }
        }
        BitLength::Float32 => {
            for v in values {
                out.extend_from_slice(&(*v as f32).to_le_bytes());
            }
        }
        BitLength::Float64 => out.extend_from_slice(bytemuck::cast_slice(values)),
        BitLength::Int32 => {
            for v in values {
                out.extend_from_slice(&(*v as i32).to_le_bytes());
            }
        }
        BitLength::Int64 => {
            for v in values {
                out.extend_from_slice(&(*v as i64).to_le_bytes());
            }
        }
    }
    out
}

/// IEEE 754 half precision to double precision.
fn f16_bits_to_f64(bits: u16) -> f64 {
    let sign = if bits & 0x8000 != 0 { -1.0 } else { 1.0 };
    let exponent = ((bits >> 10) & 0x1f) as i32;
    let mantissa = (bits & 0x3ff) as f64;
    match exponent {
        0 => sign * mantissa * (2.0f64).powi(-24),
        0x1f => {
            if mantissa == 0.0 {
                sign * f64::INFINITY
            } else {
                f64::NAN
            }
        }
        _ => sign * (1.0 + mantissa / 1024.0) * (2.0f64).powi(exponent - 15),
    }
}

/// Double precision to IEEE 754 half precision, round-to-nearest, with
/// overflow mapped to infinity.
fn f64_to_f16_bits(value: f64) -> u16 {
    let sign = if value.is_sign_negative() { 0x8000u16 } else { 0 };
    let magnitude = value.abs();
    if magnitude.is_nan() {
        return 0x7e00;
    }
    if magnitude > 65504.0 {
        return sign | 0x7c00;
    }
    if magnitude < (2.0f64).powi(-24) {
        return sign;
    }
    if magnitude < (2.0f64).powi(-14) {
        // Subnormal range
        let mantissa = (magnitude * (2.0f64).powi(24)).round() as u16;
        return sign | mantissa;
    }
    let exponent = magnitude.log2().floor() as i32;
    let mantissa = (magnitude / (2.0f64).powi(exponent) - 1.0) * 1024.0;
    let mut mantissa = mantissa.round() as u32;
    let mut exponent = exponent + 15;
    if mantissa == 1024 {
        mantissa = 0;
        exponent += 1;
    }
    if exponent >= 0x1f {
        return sign | 0x7c00;
    }
    sign | ((exponent as u16) << 10) | (mantissa as u16)
}

#[cfg(test)]
mod test {
    use super::*;

    const ALL_COMPRESSIONS: [BinaryCompression; 8] = [
        BinaryCompression::NoCompression,
        BinaryCompression::Zlib,
        BinaryCompression::NumpressLinear,
        BinaryCompression::NumpressPic,
        BinaryCompression::NumpressSlof,
        BinaryCompression::NumpressLinearZlib,
        BinaryCompression::NumpressPicZlib,
        BinaryCompression::NumpressSlofZlib,
    ];

    fn descriptor_for(text: String, array_length: usize) -> BinaryDataInfo {
        let mut info = BinaryDataInfo::new(text.len(), array_length);
        info.set_bit_length(BitLength::Float64);
        if !text.is_empty() {
            info.set_text(text);
        }
        info
    }

    fn smooth_series(n: usize) -> Vec<f64> {
        (0..n).map(|i| 200.0 + i as f64 * 0.017).collect()
    }

    fn count_series(n: usize) -> Vec<f64> {
        (0..n).map(|i| ((i * 91) % 4096) as f64).collect()
    }

    #[test]
    fn test_round_trip_every_compression_kind() {
        for compression in ALL_COMPRESSIONS {
            // PIC and SLOF are for counts; the others handle smooth data.
            let data = match compression.numpress() {
                Some(NumpressKind::PositiveInteger) | Some(NumpressKind::ShortLoggedFloat) => {
                    count_series(257)
                }
                _ => smooth_series(257),
            };
            let text = encode_array(&data, BitLength::Float64, compression);
            let mut info = descriptor_for(text, data.len());
            assert!(info.observe_compression(compression.accession().unwrap()));
            assert_eq!(info.compression(), compression);

            let decoded = info.decode().unwrap();
            assert_eq!(decoded.len(), data.len(), "{compression}");
            for (a, b) in data.iter().zip(decoded.iter()) {
                let tolerance = match compression.numpress() {
                    None => 0.0,
                    Some(NumpressKind::PositiveInteger) => 0.0,
                    Some(NumpressKind::Linear) => 1e-4,
                    Some(NumpressKind::ShortLoggedFloat) => 5e-4 * (a + 1.0),
                };
                assert!((a - b).abs() <= tolerance, "{compression}: {a} != {b}");
            }
        }
    }

    #[test]
    fn test_decode_is_idempotent() {
        let data = smooth_series(64);
        let text = encode_array(&data, BitLength::Float64, BinaryCompression::NumpressLinearZlib);
        let mut info = descriptor_for(text, data.len());
        info.observe_compression(cv_linear_zlib());
        assert_eq!(info.decode().unwrap(), info.decode().unwrap());
    }

    fn cv_linear_zlib() -> &'static str {
        BinaryCompression::NumpressLinearZlib.accession().unwrap()
    }

    #[test]
    fn test_compression_terms_compose_in_either_order() {
        let mut first = BinaryDataInfo::new(1, 1);
        assert!(first.observe_compression(crate::cv::ZLIB_COMPRESSION));
        assert!(first.observe_compression(crate::cv::NUMPRESS_SLOF));

        let mut second = BinaryDataInfo::new(1, 1);
        assert!(second.observe_compression(crate::cv::NUMPRESS_SLOF));
        assert!(second.observe_compression(crate::cv::ZLIB_COMPRESSION));

        assert_eq!(first.compression(), BinaryCompression::NumpressSlofZlib);
        assert_eq!(second.compression(), first.compression());
        assert!(!second.observe_compression(crate::cv::MZ_ARRAY));
    }

    #[test]
    fn test_empty_encoded_length_short_circuits() {
        let info = descriptor_for(String::new(), 0);
        assert_eq!(info.encoded_length, 0);
        assert!(info.decode().unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_zlib_stream_is_an_error() {
        let mut info = BinaryDataInfo::new(8, 4);
        info.set_bit_length(BitLength::Float64);
        info.observe_compression(crate::cv::ZLIB_COMPRESSION);
        let text = base64_simd::STANDARD.encode_type::<Bytes>(b"not a zlib stream");
        info.set_text(String::from_utf8(text).unwrap());
        assert!(matches!(
            info.decode(),
            Err(ArrayDecodeError::Inflate(_))
        ));
    }

    #[test]
    fn test_missing_bit_length_is_an_error() {
        let mut info = BinaryDataInfo::new(8, 1);
        let text = base64_simd::STANDARD.encode_type::<Bytes>(&1.0f64.to_le_bytes());
        info.set_text(String::from_utf8(text).unwrap());
        assert_eq!(info.decode(), Err(ArrayDecodeError::UnknownBitLength));
    }

    #[test]
    fn test_every_bit_length_widens() {
        let data = vec![0.0, 1.0, 2.0, 128.0, 1024.0];
        for (bit_length, tolerance) in [
            (BitLength::Float16, 0.5),
            (BitLength::Float32, 1e-3),
            (BitLength::Float64, 0.0),
            (BitLength::Int32, 0.0),
            (BitLength::Int64, 0.0),
        ] {
            let text = encode_array(&data, bit_length, BinaryCompression::NoCompression);
            let mut info = descriptor_for(text, data.len());
            info.set_bit_length(bit_length);
            let decoded = info.decode().unwrap();
            assert_eq!(decoded.len(), data.len());
            for (a, b) in data.iter().zip(decoded.iter()) {
                assert!((a - b).abs() <= tolerance, "{bit_length}: {a} != {b}");
            }
        }
    }

    #[test]
    fn test_declared_length_mismatch_is_best_effort() {
        let data = smooth_series(10);
        let text = encode_array(&data, BitLength::Float64, BinaryCompression::Zlib);
        // Declared length lies; the decoded length wins.
        let mut info = descriptor_for(text, 99);
        info.observe_compression(crate::cv::ZLIB_COMPRESSION);
        assert_eq!(info.decode().unwrap().len(), 10);
    }

    #[test]
    fn test_f16_special_values() {
        assert_eq!(f16_bits_to_f64(0), 0.0);
        assert_eq!(f16_bits_to_f64(0x3c00), 1.0);
        assert_eq!(f16_bits_to_f64(0xc000), -2.0);
        assert!(f16_bits_to_f64(0x7c00).is_infinite());
        assert!(f16_bits_to_f64(0x7e00).is_nan());
        assert_eq!(f64_to_f16_bits(1.0), 0x3c00);
        assert_eq!(f64_to_f16_bits(-2.0), 0xc000);
        assert_eq!(f64_to_f16_bits(1e9), 0x7c00);
    }
}
