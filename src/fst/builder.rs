//! Incremental, minimal FST construction from sorted keys.
//!
//! Keys must arrive in ascending label order. A frontier of uncompiled
//! nodes mirrors the current key; whenever the next key diverges, the tail
//! beyond the shared prefix is frozen bottom-up into the byte store, with a
//! hash table collapsing equivalent frozen suffixes into one node.

use std::hash::{Hash, Hasher};

use hashbrown::HashMap;

use crate::errors::{HaneulError, Result};
use crate::fst::bytes::BytesStore;
use crate::fst::outputs::Outputs;
use crate::fst::{
    Arc, Fst, InputType, ARCS_AS_DIRECT_ADDRESSING, ARCS_AS_FIXED_ARRAY, BIT_ARC_HAS_FINAL_OUTPUT,
    BIT_ARC_HAS_OUTPUT, BIT_FINAL_ARC, BIT_LAST_ARC, BIT_MISSING_ARC, BIT_STOP_NODE,
    BIT_TARGET_NEXT, FINAL_END_NODE, NON_FINAL_END_NODE,
};

#[derive(Clone, Copy, Debug, PartialEq)]
enum Target {
    /// Address of an already-frozen node, or an end-node sentinel.
    Compiled(i64),
    /// The arc still points at a frontier node.
    Pending,
}

struct BuilderArc<V> {
    label: i32,
    target: Target,
    is_final: bool,
    output: V,
    next_final_output: V,
}

struct UncompiledNode<V> {
    arcs: Vec<BuilderArc<V>>,
    /// Pending final output; meaningful only while `is_final`.
    output: V,
    is_final: bool,
}

impl<V: Clone + PartialEq> UncompiledNode<V> {
    fn new(no_output: V) -> Self {
        Self {
            arcs: vec![],
            output: no_output,
            is_final: false,
        }
    }

    fn add_arc(&mut self, label: i32, no_output: V) {
        debug_assert!(self.arcs.last().map_or(true, |a| a.label < label));
        self.arcs.push(BuilderArc {
            label,
            target: Target::Pending,
            is_final: false,
            output: no_output.clone(),
            next_final_output: no_output,
        });
    }
}

/// Builds a minimal [`Fst`] from keys added in ascending order.
pub struct FstBuilder<O: Outputs> {
    fst: Fst<O>,
    no_output: O::Value,
    last_input: Vec<i32>,
    frontier: Vec<UncompiledNode<O::Value>>,
    /// Frozen-node dedup table: structural hash to candidate addresses.
    dedup: HashMap<u64, Vec<i64>>,
    last_frozen_node: i64,
    num_bytes_per_arc: Vec<usize>,
    allow_array_arcs: bool,
    num_entries: u64,
}

impl<O: Outputs> FstBuilder<O> {
    /// Creates a builder for the given label width and output algebra.
    pub fn new(input_type: InputType, outputs: O) -> Self {
        let no_output = outputs.no_output();
        Self {
            fst: Fst::new_for_build(input_type, outputs),
            no_output: no_output.clone(),
            last_input: vec![],
            frontier: vec![UncompiledNode::new(no_output)],
            dedup: HashMap::new(),
            last_frozen_node: 0,
            num_bytes_per_arc: vec![],
            allow_array_arcs: true,
            num_entries: 0,
        }
    }

    /// Disables the packed-array node layouts, forcing linear-scan nodes.
    pub fn allow_array_arcs(mut self, yes: bool) -> Self {
        self.allow_array_arcs = yes;
        self
    }

    /// Number of keys added so far.
    #[inline(always)]
    pub fn num_entries(&self) -> u64 {
        self.num_entries
    }

    fn max_label(&self) -> i32 {
        match self.fst.input_type {
            InputType::Byte1 => 0xFF,
            InputType::Byte2 => 0xFFFF,
            InputType::Byte4 => i32::MAX,
        }
    }

    /// Adds a key with its output. Keys must be added in ascending order;
    /// a key equal to the previous one has its outputs merged, which the
    /// output algebra may reject.
    pub fn add(&mut self, input: &[i32], output: O::Value) -> Result<()> {
        let max_label = self.max_label();
        for &label in input {
            if label <= 0 || label > max_label {
                return Err(HaneulError::invalid_argument(
                    "input",
                    format!("label {label} is out of range 1..={max_label}"),
                ));
            }
        }
        let duplicate = if self.num_entries != 0 {
            match input.cmp(self.last_input.as_slice()) {
                std::cmp::Ordering::Less => {
                    return Err(HaneulError::invalid_argument(
                        "input",
                        "keys must be added in ascending order",
                    ));
                }
                std::cmp::Ordering::Equal => true,
                std::cmp::Ordering::Greater => false,
            }
        } else {
            false
        };

        let outputs = self.fst.outputs.clone();

        if input.is_empty() {
            self.fst.empty_output = match self.fst.empty_output.take() {
                Some(prev) => Some(outputs.merge(&prev, &output)?),
                None => Some(output),
            };
            self.frontier[0].is_final = true;
            self.num_entries += 1;
            self.last_input.clear();
            return Ok(());
        }

        while self.frontier.len() <= input.len() {
            self.frontier.push(UncompiledNode::new(self.no_output.clone()));
        }

        let mut prefix_len = 0;
        while prefix_len < input.len()
            && prefix_len < self.last_input.len()
            && input[prefix_len] == self.last_input[prefix_len]
        {
            prefix_len += 1;
        }
        self.freeze_tail(prefix_len + 1)?;

        for i in prefix_len + 1..=input.len() {
            self.frontier[i - 1].add_arc(input[i - 1], self.no_output.clone());
        }
        if !duplicate {
            let last_node = &mut self.frontier[input.len()];
            last_node.is_final = true;
            last_node.output = self.no_output.clone();
        }

        // Redistribute outputs along the shared prefix so that each arc
        // carries only what all keys below it have in common.
        let mut rest = output;
        for i in 1..=prefix_len {
            let word_suffix;
            {
                let parent = &mut self.frontier[i - 1];
                let last_arc = parent
                    .arcs
                    .last_mut()
                    .expect("frontier node along the key prefix has no arc");
                debug_assert_eq!(last_arc.label, input[i - 1]);
                let common = outputs.common(&rest, &last_arc.output);
                word_suffix = outputs.subtract(&last_arc.output, &common);
                rest = outputs.subtract(&rest, &common);
                last_arc.output = common;
            }
            if word_suffix != self.no_output {
                let node = &mut self.frontier[i];
                for arc in &mut node.arcs {
                    arc.output = outputs.add(&word_suffix, &arc.output);
                }
                if node.is_final {
                    node.output = outputs.add(&word_suffix, &node.output);
                }
            }
        }

        if duplicate {
            let node = &mut self.frontier[input.len()];
            node.output = outputs.merge(&node.output, &rest)?;
        } else {
            // The leftover goes on the arc where the new key diverges.
            // Assign, not add: the push-down loop above prepends its suffix
            // to every arc of that node, the fresh one included.
            let parent = &mut self.frontier[prefix_len];
            let last_arc = parent
                .arcs
                .last_mut()
                .expect("frontier node for the new key has no arc");
            debug_assert_eq!(last_arc.label, input[prefix_len]);
            last_arc.output = rest;
        }

        self.last_input.clear();
        self.last_input.extend_from_slice(input);
        self.num_entries += 1;
        Ok(())
    }

    /// Freezes frontier nodes deeper than the shared prefix, bottom-up.
    fn freeze_tail(&mut self, prefix_len_plus1: usize) -> Result<()> {
        let down_to = prefix_len_plus1.max(1);
        if self.last_input.len() < down_to {
            return Ok(());
        }
        for idx in (down_to..=self.last_input.len()).rev() {
            let node = std::mem::replace(
                &mut self.frontier[idx],
                UncompiledNode::new(self.no_output.clone()),
            );
            let label = self.last_input[idx - 1];
            let is_final = node.is_final;
            let next_final_output = node.output.clone();
            let addr = self.compile_node(node, idx)?;
            let parent = &mut self.frontier[idx - 1];
            let last_arc = parent
                .arcs
                .last_mut()
                .expect("frontier parent of a frozen node has no arc");
            debug_assert_eq!(last_arc.label, label);
            last_arc.target = Target::Compiled(addr);
            last_arc.is_final = is_final;
            last_arc.next_final_output = next_final_output;
        }
        Ok(())
    }

    /// Freezes a node, reusing an equivalent already-frozen node if one
    /// exists.
    fn compile_node(&mut self, node: UncompiledNode<O::Value>, depth: usize) -> Result<i64> {
        if node.arcs.is_empty() {
            return Ok(if node.is_final {
                FINAL_END_NODE
            } else {
                NON_FINAL_END_NODE
            });
        }
        let hash = Self::hash_node(&node);
        if let Some(candidates) = self.dedup.get(&hash) {
            let candidates = candidates.clone();
            for addr in candidates {
                if self.frozen_node_equals(&node, addr) {
                    return Ok(addr);
                }
            }
        }
        let addr = self.write_node(&node, depth)?;
        self.dedup.entry(hash).or_default().push(addr);
        self.last_frozen_node = addr;
        Ok(addr)
    }

    fn compiled_target(arc: &BuilderArc<O::Value>) -> i64 {
        match arc.target {
            Target::Compiled(addr) => addr,
            Target::Pending => unreachable!("arc target frozen before its node"),
        }
    }

    fn hash_node(node: &UncompiledNode<O::Value>) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        for arc in &node.arcs {
            arc.label.hash(&mut hasher);
            Self::compiled_target(arc).max(0).hash(&mut hasher);
            arc.is_final.hash(&mut hasher);
            arc.output.hash(&mut hasher);
            arc.next_final_output.hash(&mut hasher);
        }
        hasher.finish()
    }

    /// Compares an uncompiled node against the frozen node at `addr`.
    fn frozen_node_equals(&self, node: &UncompiledNode<O::Value>, addr: i64) -> bool {
        let mut reader = self.fst.reader();
        let mut scratch = self.fst.read_first_real_arc(addr, &mut reader);
        if scratch.bytes_per_arc > 0 && !scratch.direct && scratch.num_arcs != node.arcs.len() {
            return false;
        }
        for (i, arc) in node.arcs.iter().enumerate() {
            if arc.label != scratch.label || arc.is_final != scratch.is_final() {
                return false;
            }
            if !Self::output_equals(&scratch.output, &arc.output, &self.no_output) {
                return false;
            }
            if arc.is_final
                && !Self::output_equals(&scratch.next_final_output, &arc.next_final_output, &self.no_output)
            {
                return false;
            }
            let target = Self::compiled_target(arc).max(0);
            if scratch.target.max(0) != target {
                return false;
            }
            if i + 1 == node.arcs.len() {
                return scratch.is_last();
            }
            if scratch.is_last() {
                return false;
            }
            self.fst.read_next_real_arc(&mut scratch, &mut reader);
        }
        false
    }

    fn output_equals(read: &Option<O::Value>, pending: &O::Value, no_output: &O::Value) -> bool {
        match read {
            Some(v) => v == pending,
            None => pending == no_output,
        }
    }

    fn should_expand(&self, depth: usize, num_arcs: usize) -> bool {
        self.allow_array_arcs && ((depth <= 3 && num_arcs >= 5) || num_arcs >= 10)
    }

    /// Serializes a node into the byte store and returns its address.
    fn write_node(&mut self, node: &UncompiledNode<O::Value>, depth: usize) -> Result<i64> {
        let outputs = self.fst.outputs.clone();
        let num_arcs = node.arcs.len();
        let last_idx = num_arcs - 1;
        let do_fixed = self.should_expand(depth, num_arcs);
        if do_fixed {
            self.num_bytes_per_arc.clear();
            self.num_bytes_per_arc.resize(num_arcs, 0);
        }

        let start_address = self.fst.data.position();
        let mut last_arc_start = start_address;
        let mut max_bytes_per_arc = 0;
        for (idx, arc) in node.arcs.iter().enumerate() {
            let target = Self::compiled_target(arc);
            let target_has_arcs = target > 0;

            let mut flags = 0;
            if idx == last_idx {
                flags |= BIT_LAST_ARC;
            }
            if target_has_arcs && target == self.last_frozen_node {
                flags |= BIT_TARGET_NEXT;
            }
            if arc.is_final {
                flags |= BIT_FINAL_ARC;
                if arc.next_final_output != self.no_output {
                    flags |= BIT_ARC_HAS_FINAL_OUTPUT;
                }
            } else {
                debug_assert_eq!(arc.next_final_output, self.no_output);
            }
            if !target_has_arcs {
                flags |= BIT_STOP_NODE;
            }
            if arc.output != self.no_output {
                flags |= BIT_ARC_HAS_OUTPUT;
            }

            self.fst.data.write_byte(flags);
            write_label(&mut self.fst.data, self.fst.input_type, arc.label);
            if (flags & BIT_ARC_HAS_OUTPUT) != 0 {
                outputs.write(&arc.output, &mut self.fst.data);
            }
            if (flags & BIT_ARC_HAS_FINAL_OUTPUT) != 0 {
                outputs.write(&arc.next_final_output, &mut self.fst.data);
            }
            if target_has_arcs && (flags & BIT_TARGET_NEXT) == 0 {
                self.fst.data.write_vu64(target as u64);
            }

            if do_fixed {
                let len = self.fst.data.position() - last_arc_start;
                self.num_bytes_per_arc[idx] = len;
                last_arc_start = self.fst.data.position();
                max_bytes_per_arc = max_bytes_per_arc.max(len);
            }
        }

        if do_fixed {
            self.repack_as_array(node, start_address, max_bytes_per_arc);
        }

        let end = self.fst.data.position();
        self.fst.data.reverse(start_address, end);
        Ok((end - 1) as i64)
    }

    /// Rewrites the arcs just serialized at `start_address` into a
    /// fixed-stride slot array, direct-addressed when the label range is
    /// dense enough (at most four slots per real arc).
    fn repack_as_array(
        &mut self,
        node: &UncompiledNode<O::Value>,
        start_address: usize,
        bytes_per_arc: usize,
    ) {
        let num_arcs = node.arcs.len();
        let first_label = node.arcs[0].label;
        let last_label = node.arcs[num_arcs - 1].label;
        let range = (last_label - first_label + 1) as usize;
        let direct = range <= num_arcs * 4;

        let body = self.fst.data.slice_from(start_address).to_vec();
        let num_slots = if direct { range } else { num_arcs };
        let mut scratch = Vec::with_capacity(16 + num_slots * bytes_per_arc);
        if direct {
            scratch.push(ARCS_AS_DIRECT_ADDRESSING);
            push_vu64(&mut scratch, num_slots as u64);
            push_vu64(&mut scratch, bytes_per_arc as u64);
            push_vu64(&mut scratch, first_label as u64);
            let mut src = 0;
            let mut arc_idx = 0;
            for slot in 0..num_slots {
                let slot_label = first_label + slot as i32;
                if arc_idx < num_arcs && node.arcs[arc_idx].label == slot_label {
                    let len = self.num_bytes_per_arc[arc_idx];
                    scratch.extend_from_slice(&body[src..src + len]);
                    scratch.resize(scratch.len() + (bytes_per_arc - len), 0);
                    src += len;
                    arc_idx += 1;
                } else {
                    scratch.push(BIT_MISSING_ARC);
                    scratch.resize(scratch.len() + (bytes_per_arc - 1), 0);
                }
            }
            debug_assert_eq!(arc_idx, num_arcs);
        } else {
            scratch.push(ARCS_AS_FIXED_ARRAY);
            push_vu64(&mut scratch, num_slots as u64);
            push_vu64(&mut scratch, bytes_per_arc as u64);
            let mut src = 0;
            for &len in &self.num_bytes_per_arc {
                scratch.extend_from_slice(&body[src..src + len]);
                scratch.resize(scratch.len() + (bytes_per_arc - len), 0);
                src += len;
            }
        }

        self.fst.data.truncate(start_address);
        self.fst.data.extend_from_slice(&scratch);
    }

    /// Freezes everything left on the frontier and returns the finished
    /// FST with its root-arc cache populated.
    pub fn finish(mut self) -> Result<Fst<O>> {
        self.freeze_tail(0)?;
        let root = std::mem::replace(
            &mut self.frontier[0],
            UncompiledNode::new(self.no_output.clone()),
        );
        let start_node = if root.arcs.is_empty() {
            NON_FINAL_END_NODE
        } else {
            self.compile_node(root, 0)?
        };
        self.fst.start_node = start_node.max(0);
        self.fst.cache_root_arcs();
        Ok(self.fst)
    }
}

fn write_label(data: &mut BytesStore, input_type: InputType, label: i32) {
    match input_type {
        InputType::Byte1 => data.write_byte(label as u8),
        InputType::Byte2 => data.write_u16(label as u16),
        InputType::Byte4 => data.write_vu64(label as u64),
    }
}

fn push_vu64(buf: &mut Vec<u8>, mut v: u64) {
    while v >= 0x80 {
        buf.push((v as u8 & 0x7F) | 0x80);
        v >>= 7;
    }
    buf.push(v as u8);
}
