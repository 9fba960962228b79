//! Viterbi-based tokenizer.
pub(crate) mod lattice;
pub mod worker;

use crate::dictionary::Dictionary;
use crate::sentence::Sentence;
use crate::tokenizer::lattice::Lattice;
use crate::tokenizer::worker::Worker;

/// How compound and inflected entries are expanded into tokens.
#[derive(Default, Clone, Copy, Debug, Eq, PartialEq)]
pub enum DecompoundMode {
    /// Emits the whole entry and drops its parts.
    None,
    /// Emits the parts and drops the whole entry.
    #[default]
    Discard,
    /// Emits the whole entry followed by its parts, sharing positions.
    Mixed,
}

/// Tokenizer.
pub struct Tokenizer {
    dict: Dictionary,
    mode: DecompoundMode,
    group_unknowns: bool,
    space_class: Option<u8>,
}

impl Tokenizer {
    /// Creates a new instance.
    ///
    /// # Arguments
    ///
    ///  - `dict`: Dictionary to be used.
    pub fn new(dict: Dictionary) -> Self {
        // Characters of the SPACE class never surface as tokens.
        let space_class = dict.char_def().class_id("SPACE");
        Self {
            dict,
            mode: DecompoundMode::default(),
            group_unknowns: true,
            space_class,
        }
    }

    /// Selects how compound entries are expanded.
    /// The default is [`DecompoundMode::Discard`].
    pub const fn decompound_mode(mut self, mode: DecompoundMode) -> Self {
        self.mode = mode;
        self
    }

    /// Merges adjacent unknown characters of a group-flagged class into a
    /// single token. Enabled by default; disable to always synthesize
    /// single-character unknown words.
    pub const fn group_unknowns(mut self, yes: bool) -> Self {
        self.group_unknowns = yes;
        self
    }

    /// Gets the reference to the dictionary.
    pub const fn dictionary(&self) -> &Dictionary {
        &self.dict
    }

    #[inline(always)]
    pub(crate) const fn mode(&self) -> DecompoundMode {
        self.mode
    }

    /// Creates a new worker.
    pub fn new_worker(&self) -> Worker<'_> {
        Worker::new(self)
    }

    pub(crate) fn build_lattice(&self, sent: &Sentence, lattice: &mut Lattice) {
        let connector = self.dict.connector();
        lattice.reset(sent.len_char());

        // start_node is the connection boundary and start_word the first
        // character of candidate words. They differ only across a skipped
        // run of space characters.
        let mut start_node = 0;
        let mut start_word = 0;

        while start_word < sent.len_char() {
            if !lattice.has_previous_node(start_node) {
                start_word += 1;
                start_node = start_word;
                continue;
            }

            if let Some(space_class) = self.space_class {
                if sent.char_info(start_node).class_id == space_class {
                    start_word += sent.groupable(start_node);
                }
            }

            // Does the input end with spaces?
            if start_word == sent.len_char() {
                break;
            }

            self.add_lattice_edges(sent, lattice, start_node, start_word);

            start_word += 1;
            start_node = start_word;
        }

        lattice.insert_eos(start_node, connector);
    }

    fn add_lattice_edges(
        &self,
        sent: &Sentence,
        lattice: &mut Lattice,
        start_node: usize,
        start_word: usize,
    ) {
        let connector = self.dict.connector();
        let mut has_matched = false;

        let suffix = &sent.chars()[start_word..];

        if let Some(user_dictionary) = self.dict.user_dictionary() {
            for m in user_dictionary.common_prefix_iterator(suffix) {
                debug_assert!(start_word + m.end_char() <= sent.len_char());
                lattice.insert_node(
                    start_node,
                    start_word,
                    start_word + m.end_char(),
                    m.word_idx(),
                    m.word_param(),
                    connector,
                );
                has_matched = true;
            }
        }

        for m in self.dict.system_lexicon().common_prefix_iterator(suffix) {
            debug_assert!(start_word + m.end_char() <= sent.len_char());
            lattice.insert_node(
                start_node,
                start_word,
                start_word + m.end_char(),
                m.word_idx(),
                m.word_param(),
                connector,
            );
            has_matched = true;
        }

        self.dict.unk_handler().gen_unk_words(
            sent,
            start_word,
            has_matched,
            self.group_unknowns,
            |w| {
                lattice.insert_node(
                    start_node,
                    w.start_char(),
                    w.end_char(),
                    w.word_idx(),
                    w.word_param(),
                    connector,
                );
            },
        );
    }
}
