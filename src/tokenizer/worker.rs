//! Maintainer of an input sentence and tokenized results.
use crate::common::MAX_SENTENCE_LENGTH;
use crate::dictionary::lexicon::Morpheme;
use crate::dictionary::pos::{POSTag, POSType};
use crate::dictionary::{Dictionary, WordIdx};
use crate::errors::{HaneulError, Result};
use crate::sentence::Sentence;
use crate::token::{Token, TokenIter};
use crate::tokenizer::lattice::{Lattice, Node};
use crate::tokenizer::{DecompoundMode, Tokenizer};

/// A token fixed at backtrace time. Decompounded parts of an inflected
/// entry carry their own surface; all other tokens slice the input.
pub(crate) struct EmittedToken {
    pub(crate) start_char: u16,
    pub(crate) end_char: u16,
    pub(crate) surface: Option<String>,
    pub(crate) pos_type: POSType,
    pub(crate) left_tag: POSTag,
    pub(crate) right_tag: POSTag,
    pub(crate) reading: Option<String>,
    pub(crate) position_length: u16,
    pub(crate) total_cost: i32,
}

/// Maintainer of an input sentence and tokenized results.
///
/// It also holds the internal data structures used in tokenization,
/// which can be reused to avoid unnecessary memory reallocation.
pub struct Worker<'a> {
    tokenizer: &'a Tokenizer,
    pub(crate) sent: Sentence,
    lattice: Lattice,
    top_nodes: Vec<(u16, Node)>,
    pub(crate) tokens: Vec<EmittedToken>,
}

impl<'a> Worker<'a> {
    /// Creates a new instance.
    pub(crate) fn new(tokenizer: &'a Tokenizer) -> Self {
        Self {
            tokenizer,
            sent: Sentence::new(),
            lattice: Lattice::default(),
            top_nodes: vec![],
            tokens: vec![],
        }
    }

    /// Resets the input sentence to be tokenized.
    ///
    /// # Errors
    ///
    /// When the input sentence includes characters more than
    /// [`MAX_SENTENCE_LENGTH`](crate::common::MAX_SENTENCE_LENGTH),
    /// an error will be returned.
    pub fn reset_sentence<S>(&mut self, input: S) -> Result<()>
    where
        S: AsRef<str>,
    {
        self.sent.clear();
        self.top_nodes.clear();
        self.tokens.clear();
        let input = input.as_ref();
        if !input.is_empty() {
            if input.chars().count() > MAX_SENTENCE_LENGTH {
                return Err(HaneulError::invalid_argument(
                    "input",
                    format!("must not contain more than {MAX_SENTENCE_LENGTH} characters"),
                ));
            }
            self.sent.set_sentence(input);
            self.sent.compile(self.tokenizer.dictionary().char_def());
        }
        Ok(())
    }

    /// Tokenizes the set sentence.
    pub fn tokenize(&mut self) {
        self.top_nodes.clear();
        self.tokens.clear();
        if self.sent.chars().is_empty() {
            return;
        }
        self.tokenizer.build_lattice(&self.sent, &mut self.lattice);
        self.lattice.append_top_nodes(&mut self.top_nodes);
        self.emit_tokens();
    }

    // top_nodes run backwards from EOS; tokens come out left to right.
    fn emit_tokens(&mut self) {
        let dict = self.tokenizer.dictionary();
        let mode = self.tokenizer.mode();
        for i in (0..self.top_nodes.len()).rev() {
            let (end_char, node) = &self.top_nodes[i];
            let end_char = *end_char;
            let start_char = node.start_word() as u16;
            let word_idx = node.word_idx();
            let total_cost = node.min_cost();
            let parts = dict.morphemes(word_idx);

            if parts.is_empty() || mode == DecompoundMode::None {
                self.tokens
                    .push(Self::whole_token(dict, word_idx, start_char, end_char, 1, total_cost));
                continue;
            }
            if mode == DecompoundMode::Mixed {
                let position_length = parts.len() as u16;
                self.tokens.push(Self::whole_token(
                    dict,
                    word_idx,
                    start_char,
                    end_char,
                    position_length,
                    total_cost,
                ));
            }
            self.emit_parts(dict, word_idx, &parts, start_char, end_char, total_cost);
        }
    }

    fn whole_token(
        dict: &Dictionary,
        word_idx: WordIdx,
        start_char: u16,
        end_char: u16,
        position_length: u16,
        total_cost: i32,
    ) -> EmittedToken {
        EmittedToken {
            start_char,
            end_char,
            surface: None,
            pos_type: dict.pos_type(word_idx),
            left_tag: dict.left_pos(word_idx),
            right_tag: dict.right_pos(word_idx),
            reading: dict.reading(word_idx),
            position_length,
            total_cost,
        }
    }

    fn emit_parts(
        &mut self,
        dict: &Dictionary,
        word_idx: WordIdx,
        parts: &[Morpheme],
        start_char: u16,
        end_char: u16,
        total_cost: i32,
    ) {
        match dict.pos_type(word_idx) {
            // Parts of a compound partition its surface by length.
            POSType::Compound => {
                let mut offset = start_char;
                for part in parts {
                    let part_end = offset + u16::from(part.len);
                    debug_assert!(part_end <= end_char);
                    self.tokens.push(EmittedToken {
                        start_char: offset,
                        end_char: part_end,
                        surface: None,
                        pos_type: POSType::Morpheme,
                        left_tag: part.tag,
                        right_tag: part.tag,
                        reading: None,
                        position_length: 1,
                        total_cost,
                    });
                    offset = part_end;
                }
            }
            // Inflected and pre-analyzed parts carry their own surface,
            // which need not partition the input; each spans the whole
            // entry.
            POSType::Inflect | POSType::Preanalysis => {
                for part in parts {
                    self.tokens.push(EmittedToken {
                        start_char,
                        end_char,
                        surface: part.surface.clone(),
                        pos_type: POSType::Morpheme,
                        left_tag: part.tag,
                        right_tag: part.tag,
                        reading: None,
                        position_length: 1,
                        total_cost,
                    });
                }
            }
            POSType::Morpheme => unreachable!("a morpheme entry has no parts"),
        }
    }

    /// Gets the number of resultant tokens.
    #[inline(always)]
    pub fn num_tokens(&self) -> usize {
        self.tokens.len()
    }

    /// Gets the `i`-th resultant token, counted from the left.
    #[inline(always)]
    pub fn token(&self, i: usize) -> Token {
        Token::new(self, i)
    }

    /// Creates an iterator of resultant tokens.
    #[inline(always)]
    pub const fn token_iter(&'a self) -> TokenIter<'a> {
        TokenIter::new(self, 0)
    }
}
