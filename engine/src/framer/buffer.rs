use bytes::BytesMut;

/// A fixed-capacity, reusable scan region for one connection. Bytes are
/// appended after previously buffered data, scanned by index during frame
/// extraction, and the unconsumed tail is shifted back to offset 0 after
/// every pass so reads always append directly behind partial data.
#[derive(Debug)]
pub struct ScanBuffer {
    data: BytesMut,
    used: usize,
}

impl ScanBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: BytesMut::zeroed(capacity),
            used: 0,
        }
    }

    /// The writable tail after currently buffered data. A source read fills
    /// this and then calls [`commit`](Self::commit).
    pub fn free_mut(&mut self) -> &mut [u8] {
        let used = self.used;
        &mut self.data[used..]
    }

    /// Marks `n` freshly written bytes as valid-but-unconsumed.
    pub fn commit(&mut self, n: usize) {
        debug_assert!(self.used + n <= self.data.len());
        self.used += n;
    }

    /// The valid region: all buffered, unconsumed bytes starting at offset 0.
    pub fn bytes(&self) -> &[u8] {
        &self.data[..self.used]
    }

    pub fn used(&self) -> usize {
        self.used
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn remaining_capacity(&self) -> usize {
        self.data.len() - self.used
    }

    /// Finds the first occurrence of `byte` in `[from, to)`, clamped to the
    /// valid region.
    pub fn scan(&self, from: usize, to: usize, byte: u8) -> Option<usize> {
        let to = to.min(self.used);
        if from >= to {
            return None;
        }
        self.data[from..to]
            .iter()
            .position(|&b| b == byte)
            .map(|i| from + i)
    }

    /// Decodes the ASCII digits in `[from, to)` as an unsigned integer.
    /// Returns `None` for an empty range, a non-digit byte, or overflow.
    pub fn ascii_uint(&self, from: usize, to: usize) -> Option<u64> {
        if from >= to || to > self.used {
            return None;
        }
        let mut value: u64 = 0;
        for &b in &self.data[from..to] {
            if !b.is_ascii_digit() {
                return None;
            }
            value = value
                .checked_mul(10)?
                .checked_add(u64::from(b - b'0'))?;
        }
        Some(value)
    }

    /// Shifts the unconsumed tail to the start of the buffer. Called after
    /// every scan pass, even when nothing was consumed, to keep the
    /// invariant that unconsumed data begins at offset 0.
    pub fn compact(&mut self, consumed: usize) {
        debug_assert!(consumed <= self.used);
        self.data.copy_within(consumed..self.used, 0);
        self.used -= consumed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer_with(bytes: &[u8]) -> ScanBuffer {
        let mut buffer = ScanBuffer::new(64);
        buffer.free_mut()[..bytes.len()].copy_from_slice(bytes);
        buffer.commit(bytes.len());
        buffer
    }

    #[test]
    fn test_commit_appends_after_existing_data() {
        let mut buffer = ScanBuffer::new(16);
        buffer.free_mut()[..3].copy_from_slice(b"abc");
        buffer.commit(3);
        buffer.free_mut()[..2].copy_from_slice(b"de");
        buffer.commit(2);

        assert_eq!(buffer.bytes(), b"abcde");
        assert_eq!(buffer.remaining_capacity(), 11);
    }

    #[test]
    fn test_scan() {
        let buffer = buffer_with(b"8=FIX.4.2\x019=5\x01");
        assert_eq!(buffer.scan(0, buffer.used(), 0x01), Some(9));
        assert_eq!(buffer.scan(10, buffer.used(), 0x01), Some(13));
        // Scan range is clamped to the valid region
        assert_eq!(buffer.scan(10, 1000, b'z'), None);
        assert_eq!(buffer.scan(5, 5, b'F'), None);
    }

    #[test]
    fn test_ascii_uint() {
        let buffer = buffer_with(b"9=1234\x01");
        assert_eq!(buffer.ascii_uint(2, 6), Some(1234));
        assert_eq!(buffer.ascii_uint(2, 3), Some(1));
        // Empty range
        assert_eq!(buffer.ascii_uint(3, 3), None);
        // Non-digit bytes
        assert_eq!(buffer.ascii_uint(0, 3), None);
        // Range beyond valid data
        assert_eq!(buffer.ascii_uint(2, 100), None);
    }

    #[test]
    fn test_ascii_uint_overflow() {
        let buffer = buffer_with(b"99999999999999999999999999");
        assert_eq!(buffer.ascii_uint(0, buffer.used()), None);
    }

    #[test]
    fn test_compact_preserves_suffix() {
        let mut buffer = buffer_with(b"consumed|tail");
        let tail: Vec<u8> = buffer.bytes()[9..].to_vec();

        buffer.compact(9);
        assert_eq!(buffer.bytes(), tail.as_slice());
        assert_eq!(buffer.used(), 4);
        // Appending continues directly after the shifted tail
        buffer.free_mut()[..1].copy_from_slice(b"s");
        buffer.commit(1);
        assert_eq!(buffer.bytes(), b"tails");
    }

    #[test]
    fn test_compact_zero_is_noop() {
        let mut buffer = buffer_with(b"partial");
        buffer.compact(0);
        assert_eq!(buffer.bytes(), b"partial");
    }

    #[test]
    fn test_compact_all() {
        let mut buffer = buffer_with(b"whole message");
        buffer.compact(buffer.used());
        assert_eq!(buffer.used(), 0);
        assert_eq!(buffer.remaining_capacity(), 64);
    }
}
