//! Byte storage for serialized automata.
//!
//! Nodes are written front-to-back and then reversed in place, so that the
//! reader can walk from a node address toward address 0 while still seeing
//! every field in writing order.

/// Append-only byte buffer that automaton nodes are serialized into.
///
/// Address 0 is reserved: it is written as a pad byte at construction so
/// that no real node can ever live there.
#[derive(Default, Clone)]
pub struct BytesStore {
    data: Vec<u8>,
}

impl BytesStore {
    /// Creates a new store with the reserved pad byte at address 0.
    pub fn new() -> Self {
        Self { data: vec![0] }
    }

    /// Current write position (= number of bytes written).
    #[inline(always)]
    pub fn position(&self) -> usize {
        self.data.len()
    }

    /// Appends a single byte.
    #[inline(always)]
    pub fn write_byte(&mut self, b: u8) {
        self.data.push(b);
    }

    /// Writes a `u16` with the high byte first.
    #[inline(always)]
    pub fn write_u16(&mut self, v: u16) {
        self.data.push((v >> 8) as u8);
        self.data.push(v as u8);
    }

    /// Writes a 7-bit variable-length integer, least-significant group first.
    pub fn write_vu64(&mut self, mut v: u64) {
        while v >= 0x80 {
            self.data.push((v as u8 & 0x7F) | 0x80);
            v >>= 7;
        }
        self.data.push(v as u8);
    }

    /// Discards everything at and after `len`.
    pub fn truncate(&mut self, len: usize) {
        debug_assert!(len <= self.data.len());
        self.data.truncate(len);
    }

    /// Appends raw bytes.
    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Reverses `data[start..end]` in place. Called once per frozen node.
    pub fn reverse(&mut self, start: usize, end: usize) {
        self.data[start..end].reverse();
    }

    /// Everything written so far, including the pad byte.
    #[inline(always)]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Bytes at and after `start`.
    #[inline(always)]
    pub fn slice_from(&self, start: usize) -> &[u8] {
        &self.data[start..]
    }

    /// Consumes the store, returning its backing buffer.
    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    /// Wraps an already-serialized buffer, pad byte included.
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self { data }
    }
}

/// Positionable cursor reading toward address 0.
///
/// One reader per traversal: the cursor is mutable scratch state and must
/// never be shared between concurrently active traversals.
pub struct ReverseReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ReverseReader<'a> {
    /// Creates a cursor over `data`, positioned at address 0.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current read position.
    #[inline(always)]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Repositions the cursor.
    #[inline(always)]
    pub fn set_position(&mut self, pos: usize) {
        debug_assert!(pos < self.data.len());
        self.pos = pos;
    }

    /// Reads one byte, moving toward address 0.
    #[inline(always)]
    pub fn read_byte(&mut self) -> u8 {
        let b = self.data[self.pos];
        self.pos = self.pos.wrapping_sub(1);
        b
    }

    /// Reads a `u16` written high byte first.
    #[inline(always)]
    pub fn read_u16(&mut self) -> u16 {
        let hi = self.read_byte();
        let lo = self.read_byte();
        (u16::from(hi) << 8) | u16::from(lo)
    }

    /// Reads a 7-bit variable-length integer.
    pub fn read_vu64(&mut self) -> u64 {
        let mut v = 0;
        let mut shift = 0;
        loop {
            let b = self.read_byte();
            v |= u64::from(b & 0x7F) << shift;
            if b < 0x80 {
                return v;
            }
            shift += 7;
        }
    }

    /// Moves the cursor `n` bytes toward address 0.
    #[inline(always)]
    pub fn skip(&mut self, n: usize) {
        self.pos = self.pos.wrapping_sub(n);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reversed_read_order() {
        let mut store = BytesStore::new();
        let start = store.position();
        store.write_byte(0xAB);
        store.write_u16(0x1234);
        store.write_vu64(300);
        let end = store.position();
        store.reverse(start, end);

        let mut rdr = ReverseReader::new(store.as_slice());
        rdr.set_position(end - 1);
        assert_eq!(rdr.read_byte(), 0xAB);
        assert_eq!(rdr.read_u16(), 0x1234);
        assert_eq!(rdr.read_vu64(), 300);
        assert_eq!(rdr.position(), start - 1);
    }

    #[test]
    fn test_reserved_pad_byte() {
        let store = BytesStore::new();
        assert_eq!(store.position(), 1);
        assert_eq!(store.as_slice(), &[0]);
    }
}
