//! Reusable scratch memory shared by the jobs of one group.
//!
//! Each worker loop owns one [`ScratchBuffer`]. A group that requests shared
//! memory borrows a slice of it for its whole index range; the next group on
//! the same worker gets the same storage back, so contents are not meaningful
//! across groups.

use std::collections::TryReserveError;

/// Growable byte arena owned by a single thread.
#[derive(Debug, Default)]
pub struct ScratchBuffer {
    data: Vec<u8>,
}

impl ScratchBuffer {
    /// Creates an empty buffer. No memory is reserved until first use.
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    /// Returns a slice of exactly `size` bytes, growing the backing storage if
    /// needed. Returns `Ok(None)` when `size` is zero, and an error when the
    /// storage cannot grow to `size`.
    pub fn acquire(&mut self, size: usize) -> Result<Option<&mut [u8]>, TryReserveError> {
        if size == 0 {
            return Ok(None);
        }
        if self.data.len() < size {
            self.data.try_reserve_exact(size - self.data.len())?;
            self.data.resize(size, 0);
        }
        Ok(Some(&mut self.data[..size]))
    }

    /// Returns the largest size handed out so far.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_size_yields_none() {
        let mut scratch = ScratchBuffer::new();
        assert!(matches!(scratch.acquire(0), Ok(None)));
        assert_eq!(scratch.capacity(), 0);
    }

    #[test]
    fn test_grows_to_largest_request() {
        let mut scratch = ScratchBuffer::new();
        assert_eq!(scratch.acquire(64).unwrap().map(|s| s.len()), Some(64));
        assert_eq!(scratch.acquire(16).unwrap().map(|s| s.len()), Some(16));
        assert_eq!(scratch.capacity(), 64);

        assert_eq!(scratch.acquire(256).unwrap().map(|s| s.len()), Some(256));
        assert_eq!(scratch.capacity(), 256);
    }

    #[test]
    fn test_storage_is_reused() {
        let mut scratch = ScratchBuffer::new();
        if let Ok(Some(bytes)) = scratch.acquire(8) {
            bytes[0] = 0xAB;
        }
        let bytes = scratch.acquire(8).unwrap().unwrap();
        assert_eq!(bytes[0], 0xAB);
    }

    #[test]
    fn test_oversized_request_fails_without_growing() {
        let mut scratch = ScratchBuffer::new();
        assert!(scratch.acquire(32).unwrap().is_some());
        assert!(scratch.acquire(usize::MAX).is_err());
        assert_eq!(scratch.capacity(), 32);
        assert_eq!(scratch.acquire(32).unwrap().map(|s| s.len()), Some(32));
    }
}
