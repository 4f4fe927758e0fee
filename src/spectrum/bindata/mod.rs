//! Binary data array descriptors and the layered decode engine:
//! base64 text, optional zlib inflation, optional MS-Numpress decoding,
//! and fixed-width widening to `f64`.

mod array;
mod encodings;
pub mod numpress;

pub use array::{compress_zlib, decompress_zlib, encode_array, BinaryDataInfo, Bytes};
pub use encodings::{ArrayDecodeError, ArrayKind, BinaryCompression, BitLength, NumpressKind};
