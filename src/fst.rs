//! Byte-encoded finite-state transducer engine.
//!
//! An FST maps label sequences to output values. Nodes are serialized
//! back-to-front into a shared byte buffer; arcs are transient views
//! materialized by decoding bytes at an address. Three physical node
//! layouts coexist, chosen at freeze time:
//!
//!  - linear scan: arcs stored consecutively, most compact;
//!  - fixed-stride packed array: binary search by label;
//!  - direct-addressed array with gap slots: O(1) lookup by
//!    `label - first_label` when the label range is dense enough.
pub mod builder;
pub mod bytes;
pub mod outputs;

use std::io::{Read, Write};

use crate::errors::{HaneulError, Result};
use crate::utils;
use bytes::{BytesStore, ReverseReader};
use outputs::Outputs;

pub use builder::FstBuilder;

const BIT_FINAL_ARC: u8 = 1;
const BIT_LAST_ARC: u8 = 1 << 1;
const BIT_TARGET_NEXT: u8 = 1 << 2;
const BIT_STOP_NODE: u8 = 1 << 3;
const BIT_ARC_HAS_OUTPUT: u8 = 1 << 4;
const BIT_ARC_HAS_FINAL_OUTPUT: u8 = 1 << 5;
/// Marks an absent slot in a direct-addressed node.
const BIT_MISSING_ARC: u8 = 1 << 6;

/// Node-header markers. Both are illegal as flags of a real first arc, so
/// the reader can distinguish array layouts from a linear first arc.
const ARCS_AS_FIXED_ARRAY: u8 = BIT_ARC_HAS_FINAL_OUTPUT;
const ARCS_AS_DIRECT_ADDRESSING: u8 = BIT_ARC_HAS_FINAL_OUTPUT | BIT_MISSING_ARC;

/// Virtual label of the synthesized final arc.
pub const END_LABEL: i32 = -1;

pub(crate) const FINAL_END_NODE: i64 = -1;
pub(crate) const NON_FINAL_END_NODE: i64 = 0;

/// Number of root labels eligible for the generic root-arc cache.
const ROOT_CACHE_SIZE: usize = 128;

const STREAM_MAGIC: &[u8; 4] = b"hFST";
const STREAM_VERSION: u32 = 1;

#[inline(always)]
fn flag(flags: u8, bit: u8) -> bool {
    (flags & bit) != 0
}

/// Width of input labels in the serialized form.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum InputType {
    /// Labels in `1..=0xFF`, one byte each.
    Byte1,
    /// Labels in `1..=0xFFFF` (UTF-16 code units), two bytes each.
    Byte2,
    /// Arbitrary positive labels, varint-encoded.
    Byte4,
}

/// A transition view decoded from the byte buffer.
///
/// Arcs are mutable scratch state owned by one traversal; use
/// [`Arc::copy_from`] to snapshot one, never share across traversals.
#[derive(Clone, Debug, PartialEq)]
pub struct Arc<V> {
    pub(crate) flags: u8,
    /// Input label, or [`END_LABEL`] for the synthesized final arc.
    pub label: i32,
    /// Output attached to this transition.
    pub output: Option<V>,
    /// Output emitted when this arc leads directly to acceptance.
    pub next_final_output: Option<V>,
    pub(crate) next_arc: Option<i64>,
    /// Address of the destination node, or a negative/zero sentinel.
    pub target: i64,
    // Cursor state, used only when the node is array-encoded.
    pub(crate) arc_start: usize,
    pub(crate) bytes_per_arc: usize,
    pub(crate) arc_index: usize,
    pub(crate) num_arcs: usize,
    pub(crate) first_label: i32,
    pub(crate) direct: bool,
}

impl<V> Arc<V> {
    pub(crate) fn empty() -> Self {
        Self {
            flags: 0,
            label: 0,
            output: None,
            next_final_output: None,
            next_arc: None,
            target: 0,
            arc_start: 0,
            bytes_per_arc: 0,
            arc_index: 0,
            num_arcs: 0,
            first_label: 0,
            direct: false,
        }
    }

    /// Is this the last outgoing arc of its node?
    #[inline(always)]
    pub fn is_last(&self) -> bool {
        flag(self.flags, BIT_LAST_ARC)
    }

    /// Does this arc lead to an accepting state?
    #[inline(always)]
    pub fn is_final(&self) -> bool {
        flag(self.flags, BIT_FINAL_ARC)
    }

    /// Snapshots `other` into this view.
    pub fn copy_from(&mut self, other: &Self)
    where
        V: Clone,
    {
        self.flags = other.flags;
        self.label = other.label;
        self.output = other.output.clone();
        self.next_final_output = other.next_final_output.clone();
        self.next_arc = other.next_arc;
        self.target = other.target;
        self.bytes_per_arc = other.bytes_per_arc;
        if self.bytes_per_arc > 0 {
            self.arc_start = other.arc_start;
            self.arc_index = other.arc_index;
            self.num_arcs = other.num_arcs;
            self.first_label = other.first_label;
            self.direct = other.direct;
        }
    }
}

/// A finished transducer.
///
/// Immutable and freely shareable across threads; each traversal brings its
/// own [`ReverseReader`] and arc scratch.
pub struct Fst<O: Outputs> {
    pub(crate) input_type: InputType,
    pub(crate) outputs: O,
    pub(crate) data: BytesStore,
    pub(crate) start_node: i64,
    pub(crate) empty_output: Option<O::Value>,
    pub(crate) cached_root_arcs: Vec<Option<Arc<O::Value>>>,
}

impl<O: Outputs> Fst<O> {
    pub(crate) fn new_for_build(input_type: InputType, outputs: O) -> Self {
        Self {
            input_type,
            outputs,
            data: BytesStore::new(),
            start_node: -1,
            empty_output: None,
            cached_root_arcs: vec![],
        }
    }

    /// The output algebra of this FST.
    #[inline(always)]
    pub fn outputs(&self) -> &O {
        &self.outputs
    }

    /// Output of the empty key, if accepted.
    #[inline(always)]
    pub fn empty_output(&self) -> Option<&O::Value> {
        self.empty_output.as_ref()
    }

    /// Size of the serialized byte buffer.
    #[inline(always)]
    pub fn bytes_len(&self) -> usize {
        self.data.position()
    }

    /// Creates a fresh read cursor. One per traversal.
    #[inline(always)]
    pub fn reader(&self) -> ReverseReader {
        ReverseReader::new(self.data.as_slice())
    }

    #[inline(always)]
    fn target_has_arc(target: i64) -> bool {
        target > 0
    }

    /// The virtual arc arriving at the root node.
    pub fn root_arc(&self) -> Arc<O::Value> {
        let mut arc = Arc::empty();
        if let Some(empty_output) = &self.empty_output {
            arc.flags = BIT_FINAL_ARC | BIT_LAST_ARC;
            arc.next_final_output = Some(empty_output.clone());
        } else {
            arc.flags = BIT_LAST_ARC;
            arc.next_final_output = Some(self.outputs.no_output());
        }
        arc.output = Some(self.outputs.no_output());
        arc.target = self.start_node;
        arc
    }

    fn read_label(&self, reader: &mut ReverseReader) -> i32 {
        match self.input_type {
            InputType::Byte1 => i32::from(reader.read_byte()),
            InputType::Byte2 => i32::from(reader.read_u16()),
            InputType::Byte4 => reader.read_vu64() as i32,
        }
    }

    /// Finds the outgoing arc of `follow`'s target node labeled `label`.
    ///
    /// Returns `None` when no such arc exists; this is the expected
    /// steady-state result during tokenization, never an error.
    pub fn find_target_arc(
        &self,
        label: i32,
        follow: &Arc<O::Value>,
        reader: &mut ReverseReader,
    ) -> Option<Arc<O::Value>> {
        self.find_target_arc_with_cache(label, follow, reader, true)
    }

    /// [`Self::find_target_arc`] with explicit control over the root-arc
    /// cache, letting callers (and tests) bypass it.
    pub fn find_target_arc_with_cache(
        &self,
        label: i32,
        follow: &Arc<O::Value>,
        reader: &mut ReverseReader,
        use_root_cache: bool,
    ) -> Option<Arc<O::Value>> {
        if label == END_LABEL {
            if !follow.is_final() {
                return None;
            }
            let mut arc = follow.clone();
            if Self::target_has_arc(follow.target) {
                arc.flags = 0;
                // next_arc is a node address here, not an arc address.
                arc.next_arc = Some(follow.target);
            } else {
                arc.flags = BIT_LAST_ARC;
            }
            arc.output = follow.next_final_output.clone();
            arc.label = END_LABEL;
            return Some(arc);
        }

        if use_root_cache
            && !self.cached_root_arcs.is_empty()
            && follow.target == self.start_node
            && label >= 0
            && (label as usize) < self.cached_root_arcs.len()
        {
            return self.cached_root_arcs[label as usize].clone();
        }

        if !Self::target_has_arc(follow.target) {
            return None;
        }

        reader.set_position(follow.target as usize);
        let header = reader.read_byte();

        if header == ARCS_AS_DIRECT_ADDRESSING {
            let mut arc = Arc::empty();
            arc.direct = true;
            arc.num_arcs = reader.read_vu64() as usize;
            arc.bytes_per_arc = reader.read_vu64() as usize;
            arc.first_label = reader.read_vu64() as i32;
            arc.arc_start = reader.position();
            let idx = label - arc.first_label;
            if idx < 0 || idx as usize >= arc.num_arcs {
                return None;
            }
            reader.set_position(arc.arc_start);
            reader.skip(idx as usize * arc.bytes_per_arc);
            if flag(reader.read_byte(), BIT_MISSING_ARC) {
                return None;
            }
            arc.arc_index = idx as usize;
            self.read_next_real_arc(&mut arc, reader);
            debug_assert_eq!(arc.label, label);
            return Some(arc);
        }

        if header == ARCS_AS_FIXED_ARRAY {
            // Binary search over fixed-stride slots.
            let mut arc = Arc::empty();
            arc.num_arcs = reader.read_vu64() as usize;
            arc.bytes_per_arc = reader.read_vu64() as usize;
            arc.arc_start = reader.position();
            let mut low = 0_usize;
            let mut high = arc.num_arcs - 1;
            while low <= high {
                let mid = (low + high) >> 1;
                reader.set_position(arc.arc_start);
                reader.skip(arc.bytes_per_arc * mid + 1);
                let mid_label = self.read_label(reader);
                if mid_label < label {
                    low = mid + 1;
                } else if mid_label > label {
                    if mid == 0 {
                        break;
                    }
                    high = mid - 1;
                } else {
                    arc.arc_index = mid;
                    self.read_next_real_arc(&mut arc, reader);
                    return Some(arc);
                }
            }
            return None;
        }

        // Linear scan.
        let mut arc = self.read_first_real_arc(follow.target, reader);
        loop {
            if arc.label == label {
                return Some(arc);
            } else if arc.label > label || arc.is_last() {
                return None;
            }
            self.read_next_real_arc(&mut arc, reader);
        }
    }

    /// Reads the first outgoing arc of `follow`'s target, synthesizing the
    /// virtual [`END_LABEL`] arc when the target is an accepting state.
    pub fn read_first_target_arc(
        &self,
        follow: &Arc<O::Value>,
        reader: &mut ReverseReader,
    ) -> Arc<O::Value> {
        if follow.is_final() {
            let mut arc = Arc::empty();
            arc.flags = BIT_FINAL_ARC;
            arc.label = END_LABEL;
            arc.target = FINAL_END_NODE;
            arc.output = follow.next_final_output.clone();
            if Self::target_has_arc(follow.target) {
                arc.next_arc = Some(follow.target);
            } else {
                arc.flags |= BIT_LAST_ARC;
            }
            arc
        } else {
            self.read_first_real_arc(follow.target, reader)
        }
    }

    pub(crate) fn read_first_real_arc(
        &self,
        node: i64,
        reader: &mut ReverseReader,
    ) -> Arc<O::Value> {
        debug_assert!(Self::target_has_arc(node));
        reader.set_position(node as usize);
        let mut arc = Arc::empty();
        match reader.read_byte() {
            ARCS_AS_FIXED_ARRAY => {
                arc.num_arcs = reader.read_vu64() as usize;
                arc.bytes_per_arc = reader.read_vu64() as usize;
                arc.arc_start = reader.position();
            }
            ARCS_AS_DIRECT_ADDRESSING => {
                arc.direct = true;
                arc.num_arcs = reader.read_vu64() as usize;
                arc.bytes_per_arc = reader.read_vu64() as usize;
                arc.first_label = reader.read_vu64() as i32;
                arc.arc_start = reader.position();
            }
            _ => {
                arc.next_arc = Some(node);
            }
        }
        self.read_next_real_arc(&mut arc, reader);
        arc
    }

    /// Advances to the next arc of the node, resolving the virtual final
    /// arc into the node's first real arc when needed.
    pub fn read_next_arc(&self, arc: &mut Arc<O::Value>, reader: &mut ReverseReader) {
        if arc.label == END_LABEL {
            let next = arc.next_arc.expect("cannot read next arc when arc is last");
            assert!(
                next > 0,
                "cannot read next arc when the virtual final arc is last"
            );
            let new_arc = self.read_first_real_arc(next, reader);
            arc.copy_from(&new_arc);
        } else {
            self.read_next_real_arc(arc, reader);
        }
    }

    pub(crate) fn read_next_real_arc(&self, arc: &mut Arc<O::Value>, reader: &mut ReverseReader) {
        if arc.bytes_per_arc > 0 {
            // Array-encoded node: seek the slot, skipping gaps when
            // direct-addressed.
            loop {
                assert!(
                    arc.arc_index < arc.num_arcs,
                    "cannot read next arc past the last arc of the node"
                );
                reader.set_position(arc.arc_start);
                reader.skip(arc.arc_index * arc.bytes_per_arc);
                arc.arc_index += 1;
                let flags = reader.read_byte();
                if arc.direct && flag(flags, BIT_MISSING_ARC) {
                    continue;
                }
                arc.flags = flags;
                break;
            }
        } else {
            reader.set_position(arc.next_arc.expect("arc has no successor") as usize);
            arc.flags = reader.read_byte();
        }

        arc.label = self.read_label(reader);
        arc.output = if flag(arc.flags, BIT_ARC_HAS_OUTPUT) {
            Some(self.outputs.read(reader))
        } else {
            None
        };
        arc.next_final_output = if flag(arc.flags, BIT_ARC_HAS_FINAL_OUTPUT) {
            Some(self.outputs.read(reader))
        } else {
            None
        };

        if flag(arc.flags, BIT_STOP_NODE) {
            arc.target = FINAL_END_NODE;
            arc.next_arc = Some(reader.position() as i64);
        } else if flag(arc.flags, BIT_TARGET_NEXT) {
            arc.next_arc = Some(reader.position() as i64);
            // The target node was frozen immediately before this one, so it
            // ends right where this node's bytes begin. Array slots are
            // padded, so the node extends past the last arc's payload.
            if arc.bytes_per_arc > 0 {
                reader.set_position(arc.arc_start);
                reader.skip(arc.bytes_per_arc * arc.num_arcs);
            } else if !arc.is_last() {
                self.seek_to_next_node(reader);
            }
            arc.target = reader.position() as i64;
        } else {
            arc.target = reader.read_vu64() as i64;
            arc.next_arc = Some(reader.position() as i64);
        }
    }

    fn seek_to_next_node(&self, reader: &mut ReverseReader) {
        loop {
            let flags = reader.read_byte();
            self.read_label(reader);
            if flag(flags, BIT_ARC_HAS_OUTPUT) {
                self.outputs.skip(reader);
            }
            if flag(flags, BIT_ARC_HAS_FINAL_OUTPUT) {
                self.outputs.skip(reader);
            }
            if !flag(flags, BIT_STOP_NODE) && !flag(flags, BIT_TARGET_NEXT) {
                reader.read_vu64();
            }
            if flag(flags, BIT_LAST_ARC) {
                return;
            }
        }
    }

    /// Looks up a full key, returning its output when accepted.
    pub fn get(&self, labels: &[i32]) -> Option<O::Value> {
        let mut arc = self.root_arc();
        let mut output = self.outputs.no_output();
        let mut reader = self.reader();
        for &label in labels {
            arc = self.find_target_arc(label, &arc, &mut reader)?;
            if let Some(out) = &arc.output {
                output = self.outputs.add(&output, out);
            }
        }
        if arc.is_final() {
            if let Some(out) = &arc.next_final_output {
                output = self.outputs.add(&output, out);
            }
            Some(output)
        } else {
            None
        }
    }

    /// Materializes root arcs with labels below [`ROOT_CACHE_SIZE`], unless
    /// the cache would exceed a fifth of the FST's own footprint.
    pub(crate) fn cache_root_arcs(&mut self) {
        self.cached_root_arcs.clear();
        let root = self.root_arc();
        if !Self::target_has_arc(root.target) {
            return;
        }
        let estimate = ROOT_CACHE_SIZE * std::mem::size_of::<Option<Arc<O::Value>>>();
        if estimate * 5 > self.bytes_len() {
            return;
        }
        let arcs = {
            let mut arcs: Vec<Option<Arc<O::Value>>> = vec![None; ROOT_CACHE_SIZE];
            let mut reader = self.reader();
            let mut arc = self.read_first_real_arc(root.target, &mut reader);
            loop {
                debug_assert_ne!(arc.label, END_LABEL);
                if arc.label >= 0 && (arc.label as usize) < arcs.len() {
                    arcs[arc.label as usize] = Some(arc.clone());
                } else {
                    break;
                }
                if arc.is_last() {
                    break;
                }
                self.read_next_real_arc(&mut arc, &mut reader);
            }
            arcs
        };
        self.cached_root_arcs = arcs;
    }

    /// Serializes the FST in the stream format: magic, version,
    /// empty-output blob, label-width byte, start node, byte buffer.
    pub fn save<W>(&self, mut wtr: W) -> Result<()>
    where
        W: Write,
    {
        if self.start_node < 0 {
            return Err(HaneulError::invalid_argument(
                "fst",
                "cannot save an unfinished FST",
            ));
        }
        wtr.write_all(STREAM_MAGIC)?;
        wtr.write_all(&STREAM_VERSION.to_le_bytes())?;
        if let Some(empty_output) = &self.empty_output {
            wtr.write_all(&[1])?;
            let mut blob = BytesStore::from_vec(vec![]);
            self.outputs.write(empty_output, &mut blob);
            let mut blob = blob.into_vec();
            blob.reverse();
            utils::write_vu64(&mut wtr, blob.len() as u64)?;
            wtr.write_all(&blob)?;
        } else {
            wtr.write_all(&[0])?;
        }
        let width = match self.input_type {
            InputType::Byte1 => 1_u8,
            InputType::Byte2 => 2,
            InputType::Byte4 => 4,
        };
        wtr.write_all(&[width])?;
        utils::write_vu64(&mut wtr, self.start_node as u64)?;
        utils::write_vu64(&mut wtr, self.data.position() as u64)?;
        wtr.write_all(self.data.as_slice())?;
        Ok(())
    }

    /// Deserializes an FST written by [`Self::save`] and rebuilds the
    /// root-arc cache. Header or version mismatch is fatal.
    pub fn load<R>(mut rdr: R, outputs: O) -> Result<Self>
    where
        R: Read,
    {
        let mut magic = [0; 4];
        rdr.read_exact(&mut magic)?;
        if &magic != STREAM_MAGIC {
            return Err(HaneulError::invalid_format("fst", "bad magic"));
        }
        let mut version = [0; 4];
        rdr.read_exact(&mut version)?;
        if u32::from_le_bytes(version) != STREAM_VERSION {
            return Err(HaneulError::invalid_format(
                "fst",
                format!("unsupported version: {}", u32::from_le_bytes(version)),
            ));
        }
        let mut has_empty = [0; 1];
        rdr.read_exact(&mut has_empty)?;
        let empty_output = if has_empty[0] == 1 {
            let len = utils::read_vu64(&mut rdr)? as usize;
            let mut blob = vec![0; len];
            rdr.read_exact(&mut blob)?;
            let mut blob_rdr = ReverseReader::new(&blob);
            if len > 0 {
                blob_rdr.set_position(len - 1);
            }
            Some(outputs.read(&mut blob_rdr))
        } else {
            None
        };
        let mut width = [0; 1];
        rdr.read_exact(&mut width)?;
        let input_type = match width[0] {
            1 => InputType::Byte1,
            2 => InputType::Byte2,
            4 => InputType::Byte4,
            x => {
                return Err(HaneulError::invalid_format(
                    "fst",
                    format!("invalid input label width: {x}"),
                ));
            }
        };
        let start_node = utils::read_vu64(&mut rdr)? as i64;
        let num_bytes = utils::read_vu64(&mut rdr)? as usize;
        let mut data = vec![0; num_bytes];
        rdr.read_exact(&mut data)?;
        if start_node as usize >= num_bytes.max(1) {
            return Err(HaneulError::invalid_format(
                "fst",
                "start node is out of bounds",
            ));
        }
        let mut fst = Self {
            input_type,
            outputs,
            data: BytesStore::from_vec(data),
            start_node,
            empty_output,
            cached_root_arcs: vec![],
        };
        fst.cache_root_arcs();
        Ok(fst)
    }
}
