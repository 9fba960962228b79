use crate::dictionary::connector::ConnectionCosts;
use crate::dictionary::lexicon::WordParam;
use crate::dictionary::{LexType, WordIdx};

const MAX_COST: i32 = i32::MAX;
const INVALID_IDX: u16 = u16::MAX;

/// A candidate morpheme occupying a character range of the lattice.
#[derive(Debug, Clone)]
pub struct Node {
    word_id: u32,
    lex_type: LexType,
    start_node: u16,
    start_word: u16,
    left_id: u16,
    right_id: u16,
    min_idx: u16,
    min_cost: i32,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            word_id: u32::MAX,
            lex_type: LexType::System,
            start_node: u16::MAX,
            start_word: u16::MAX,
            left_id: 0,
            right_id: 0,
            min_idx: INVALID_IDX,
            min_cost: MAX_COST,
        }
    }
}

impl Node {
    #[inline(always)]
    pub const fn word_idx(&self) -> WordIdx {
        WordIdx::new(self.lex_type, self.word_id)
    }

    #[inline(always)]
    pub const fn start_node(&self) -> usize {
        self.start_node as usize
    }

    #[inline(always)]
    pub const fn start_word(&self) -> usize {
        self.start_word as usize
    }

    #[inline(always)]
    pub const fn left_id(&self) -> u16 {
        self.left_id
    }

    #[inline(always)]
    pub const fn right_id(&self) -> u16 {
        self.right_id
    }

    #[inline(always)]
    pub const fn min_idx(&self) -> usize {
        self.min_idx as usize
    }

    #[inline(always)]
    pub const fn min_cost(&self) -> i32 {
        self.min_cost
    }

    #[inline(always)]
    pub const fn is_connected_to_bos(&self) -> bool {
        self.min_cost != MAX_COST
    }
}

/// Viterbi lattice with nodes bucketed by their end positions.
#[derive(Default)]
pub struct Lattice {
    ends: Vec<Vec<Node>>,
    eos: Option<Node>,
    len_char: usize,
}

impl Lattice {
    pub fn reset(&mut self, new_len_char: usize) {
        Self::reset_vec(&mut self.ends, new_len_char + 1);
        self.len_char = new_len_char;
        self.eos = None;
        self.insert_bos();
    }

    fn reset_vec<T>(data: &mut Vec<Vec<T>>, new_len: usize) {
        for v in data.iter_mut() {
            v.clear();
        }
        let cur_len = data.len();
        if cur_len <= new_len {
            data.reserve(new_len - cur_len);
            for _ in cur_len..new_len {
                data.push(Vec::with_capacity(16))
            }
        }
    }

    /// Returns the number of characters of the set sentence.
    #[inline(always)]
    pub const fn len_char(&self) -> usize {
        self.len_char
    }

    fn insert_bos(&mut self) {
        self.ends[0].push(Node {
            min_idx: INVALID_IDX,
            min_cost: 0,
            ..Node::default()
        });
    }

    pub fn insert_eos(&mut self, start_node: usize, connector: &ConnectionCosts) {
        let (min_idx, min_cost) = self
            .search_min_node(start_node, 0, connector)
            .unwrap();
        self.eos = Some(Node {
            start_node: start_node as u16,
            start_word: self.len_char() as u16,
            min_idx,
            min_cost,
            ..Node::default()
        });
    }

    pub fn insert_node(
        &mut self,
        start_node: usize,
        start_word: usize,
        end_word: usize,
        word_idx: WordIdx,
        word_param: WordParam,
        connector: &ConnectionCosts,
    ) {
        debug_assert!(start_node <= start_word);
        debug_assert!(start_word < end_word);

        let (min_idx, min_cost) = self
            .search_min_node(start_node, word_param.left_id, connector)
            .unwrap();

        self.ends[end_word].push(Node {
            word_id: word_idx.word_id,
            lex_type: word_idx.lex_type,
            start_node: start_node as u16,
            start_word: start_word as u16,
            left_id: word_param.left_id,
            right_id: word_param.right_id,
            min_idx,
            min_cost: min_cost + word_param.word_cost,
        });
    }

    fn search_min_node(
        &self,
        start_node: usize,
        left_id: u16,
        connector: &ConnectionCosts,
    ) -> Option<(u16, i32)> {
        if self.ends[start_node].is_empty() {
            return None;
        }

        let mut min_idx = INVALID_IDX;
        let mut min_cost = MAX_COST;

        for (i, left_node) in self.ends[start_node].iter().enumerate() {
            debug_assert!(left_node.is_connected_to_bos());
            let conn_cost = connector.cost(left_node.right_id(), left_id);
            let new_cost = left_node.min_cost() + conn_cost;

            // <= so that, among equal costs, the latest-inserted
            // predecessor wins. Insertion order is user, system, then
            // unknown words, each in ascending match length.
            if new_cost <= min_cost {
                min_idx = i as u16;
                min_cost = new_cost;
            }
        }

        debug_assert_ne!(min_idx, INVALID_IDX);
        Some((min_idx, min_cost))
    }

    /// Checks if at least one node ends at the boundary.
    #[inline(always)]
    pub fn has_previous_node(&self, i: usize) -> bool {
        self.ends.get(i).map(|d| !d.is_empty()).unwrap_or(false)
    }

    /// Pushes the minimum-cost path in reverse, from the node before EOS
    /// back to the one after BOS.
    pub fn append_top_nodes(&self, top_nodes: &mut Vec<(u16, Node)>) {
        let eos = self.eos.as_ref().unwrap();
        let mut end_node = eos.start_node();
        let mut min_idx = eos.min_idx();
        while end_node != 0 {
            let node = &self.ends[end_node][min_idx];
            top_nodes.push((end_node as u16, node.clone()));
            (end_node, min_idx) = (node.start_node(), node.min_idx());
        }
    }
}

impl std::fmt::Debug for Lattice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Lattice {{ eos: {:?}, ends: [", &self.eos)?;
        for (i, e) in self.ends[..=self.len_char()].iter().enumerate() {
            writeln!(f, "{} => {:?}", i, e)?;
        }
        writeln!(f, "]}}")
    }
}
