//! Output algebras attached to automaton arcs.
//!
//! The builder pushes outputs shared by sibling arcs toward the root via
//! `common`/`subtract`; traversal accumulates them back with `add`.

use std::fmt::Debug;
use std::hash::Hash;

use crate::errors::{HaneulError, Result};
use crate::fst::bytes::{BytesStore, ReverseReader};

/// Semiring-like operations over arc output values.
pub trait Outputs: Clone {
    /// The output value attached to arcs.
    type Value: Clone + PartialEq + Hash + Debug;

    /// The identity value, attached to arcs that carry no output.
    fn no_output(&self) -> Self::Value;

    /// The largest value shared by `a` and `b` (a common prefix in the
    /// general case; the minimum for integer outputs).
    fn common(&self, a: &Self::Value, b: &Self::Value) -> Self::Value;

    /// Removes the prefix `b` from `a`.
    fn subtract(&self, a: &Self::Value, b: &Self::Value) -> Self::Value;

    /// Concatenates `prefix` and `suffix`.
    fn add(&self, prefix: &Self::Value, suffix: &Self::Value) -> Self::Value;

    /// Combines the outputs of duplicate keys. The default rejects
    /// duplicates.
    fn merge(&self, _a: &Self::Value, _b: &Self::Value) -> Result<Self::Value> {
        Err(HaneulError::invalid_argument(
            "input",
            "duplicate keys are not allowed for this output type",
        ))
    }

    /// Serializes a value into the byte store.
    fn write(&self, v: &Self::Value, store: &mut BytesStore);

    /// Deserializes a value.
    fn read(&self, rdr: &mut ReverseReader) -> Self::Value;

    /// Skips over a serialized value.
    fn skip(&self, rdr: &mut ReverseReader) {
        let _ = self.read(rdr);
    }
}

/// Non-negative integer outputs: `common` is the minimum, `subtract` and
/// `add` are plain arithmetic. Used to attach word ordinals to lexicon
/// surface forms.
#[derive(Default, Clone, Copy, Debug)]
pub struct IntOutputs;

impl Outputs for IntOutputs {
    type Value = u64;

    #[inline(always)]
    fn no_output(&self) -> u64 {
        0
    }

    #[inline(always)]
    fn common(&self, a: &u64, b: &u64) -> u64 {
        *a.min(b)
    }

    #[inline(always)]
    fn subtract(&self, a: &u64, b: &u64) -> u64 {
        debug_assert!(a >= b);
        a - b
    }

    #[inline(always)]
    fn add(&self, prefix: &u64, suffix: &u64) -> u64 {
        prefix + suffix
    }

    #[inline(always)]
    fn write(&self, v: &u64, store: &mut BytesStore) {
        store.write_vu64(*v);
    }

    #[inline(always)]
    fn read(&self, rdr: &mut ReverseReader) -> u64 {
        rdr.read_vu64()
    }
}

/// Componentwise pairing of two output algebras.
#[derive(Default, Clone, Debug)]
pub struct PairOutputs<A, B> {
    a: A,
    b: B,
}

impl<A: Outputs, B: Outputs> PairOutputs<A, B> {
    /// Creates a pair algebra from the component algebras.
    pub const fn new(a: A, b: B) -> Self {
        Self { a, b }
    }
}

impl<A: Outputs, B: Outputs> Outputs for PairOutputs<A, B> {
    type Value = (A::Value, B::Value);

    fn no_output(&self) -> Self::Value {
        (self.a.no_output(), self.b.no_output())
    }

    fn common(&self, x: &Self::Value, y: &Self::Value) -> Self::Value {
        (self.a.common(&x.0, &y.0), self.b.common(&x.1, &y.1))
    }

    fn subtract(&self, x: &Self::Value, y: &Self::Value) -> Self::Value {
        (self.a.subtract(&x.0, &y.0), self.b.subtract(&x.1, &y.1))
    }

    fn add(&self, x: &Self::Value, y: &Self::Value) -> Self::Value {
        (self.a.add(&x.0, &y.0), self.b.add(&x.1, &y.1))
    }

    fn write(&self, v: &Self::Value, store: &mut BytesStore) {
        self.a.write(&v.0, store);
        self.b.write(&v.1, store);
    }

    fn read(&self, rdr: &mut ReverseReader) -> Self::Value {
        let x = self.a.read(rdr);
        let y = self.b.read(rdr);
        (x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_semiring() {
        let o = IntOutputs;
        assert_eq!(o.common(&3, &7), 3);
        assert_eq!(o.subtract(&7, &3), 4);
        assert_eq!(o.add(&3, &4), 7);
        assert_eq!(o.no_output(), 0);
    }

    #[test]
    fn test_int_merge_rejected() {
        let o = IntOutputs;
        assert!(o.merge(&1, &2).is_err());
    }

    #[test]
    fn test_pair_componentwise() {
        let o = PairOutputs::new(IntOutputs, IntOutputs);
        assert_eq!(o.common(&(3, 9), &(5, 4)), (3, 4));
        assert_eq!(o.subtract(&(5, 9), &(3, 4)), (2, 5));
        assert_eq!(o.add(&(2, 5), &(3, 4)), (5, 9));
    }

    #[test]
    fn test_write_read_roundtrip() {
        let o = PairOutputs::new(IntOutputs, IntOutputs);
        let mut store = BytesStore::new();
        let start = store.position();
        o.write(&(300, 7), &mut store);
        let end = store.position();
        store.reverse(start, end);

        let mut rdr = ReverseReader::new(store.as_slice());
        rdr.set_position(end - 1);
        assert_eq!(o.read(&mut rdr), (300, 7));
    }
}
