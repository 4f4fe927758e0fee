use std::io;
use std::ops::Deref;
use std::sync::Arc;

/// The externally managed allocator that decoded arrays are committed
/// to. In production this is backed by memory-mapped files; the importer
/// only ever hands a finished buffer over once and keeps the returned
/// handle.
pub trait ScanDataStorage {
    /// Handle to a committed buffer.
    type Segment;

    /// Persist `values` and return a handle to the stored copy. Called at
    /// most once per buffer.
    fn store_doubles(&mut self, values: &[f64]) -> io::Result<Self::Segment>;
}

/// A committed array of doubles held in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct DoubleBuffer(Arc<[f64]>);

impl DoubleBuffer {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

impl Deref for DoubleBuffer {
    type Target = [f64];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<f64>> for DoubleBuffer {
    fn from(values: Vec<f64>) -> Self {
        Self(values.into())
    }
}

/// Heap-backed reference implementation of [`ScanDataStorage`], used by
/// the tests and the summary binary.
#[derive(Debug, Default)]
pub struct BufferStorage {
    segments: usize,
    doubles: usize,
}

impl BufferStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of buffers committed so far.
    pub fn segment_count(&self) -> usize {
        self.segments
    }

    /// Total number of doubles committed so far.
    pub fn double_count(&self) -> usize {
        self.doubles
    }
}

impl ScanDataStorage for BufferStorage {
    type Segment = DoubleBuffer;

    fn store_doubles(&mut self, values: &[f64]) -> io::Result<Self::Segment> {
        self.segments += 1;
        self.doubles += values.len();
        Ok(DoubleBuffer(values.into()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_store_and_read_back() {
        let mut storage = BufferStorage::new();
        let segment = storage.store_doubles(&[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(segment.as_slice(), &[1.0, 2.0, 3.0]);
        assert_eq!(storage.segment_count(), 1);
        assert_eq!(storage.double_count(), 3);

        let empty = storage.store_doubles(&[]).unwrap();
        assert!(empty.is_empty());
        assert_eq!(storage.segment_count(), 2);
    }
}
