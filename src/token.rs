//! Container of resultant tokens.
use std::ops::Range;

use crate::dictionary::pos::{POSTag, POSType};
use crate::tokenizer::worker::Worker;

/// Resultant token.
pub struct Token<'a> {
    worker: &'a Worker<'a>,
    index: usize,
}

impl<'a> Token<'a> {
    #[inline(always)]
    pub(crate) const fn new(worker: &'a Worker, index: usize) -> Self {
        Self { worker, index }
    }

    /// Gets the position range of the token in characters.
    #[inline(always)]
    pub fn range_char(&self) -> Range<usize> {
        let t = &self.worker.tokens[self.index];
        usize::from(t.start_char)..usize::from(t.end_char)
    }

    /// Gets the position range of the token in bytes.
    #[inline(always)]
    pub fn range_byte(&self) -> Range<usize> {
        let sent = &self.worker.sent;
        let t = &self.worker.tokens[self.index];
        sent.byte_position(usize::from(t.start_char))..sent.byte_position(usize::from(t.end_char))
    }

    /// Gets the surface string of the token. For a part of an inflected
    /// or pre-analyzed entry this differs from the input slice.
    #[inline(always)]
    pub fn surface(&self) -> &str {
        let t = &self.worker.tokens[self.index];
        match &t.surface {
            Some(s) => s,
            None => &self.worker.sent.raw()[self.range_byte()],
        }
    }

    /// Gets the POS type of the token.
    #[inline(always)]
    pub fn pos_type(&self) -> POSType {
        self.worker.tokens[self.index].pos_type
    }

    /// Gets the left part-of-speech tag of the token.
    #[inline(always)]
    pub fn left_pos(&self) -> POSTag {
        self.worker.tokens[self.index].left_tag
    }

    /// Gets the right part-of-speech tag of the token.
    #[inline(always)]
    pub fn right_pos(&self) -> POSTag {
        self.worker.tokens[self.index].right_tag
    }

    /// Gets the reading of the token, if recorded in the lexicon.
    #[inline(always)]
    pub fn reading(&self) -> Option<&str> {
        self.worker.tokens[self.index].reading.as_deref()
    }

    /// Gets the number of positions the token spans. Greater than one
    /// only for a whole compound emitted in
    /// [`DecompoundMode::Mixed`](crate::tokenizer::DecompoundMode::Mixed).
    #[inline(always)]
    pub fn position_length(&self) -> usize {
        usize::from(self.worker.tokens[self.index].position_length)
    }

    /// Gets the total cost from BOS to the token's node.
    #[inline(always)]
    pub fn total_cost(&self) -> i32 {
        self.worker.tokens[self.index].total_cost
    }
}

/// Iterator of tokens.
pub struct TokenIter<'a> {
    worker: &'a Worker<'a>,
    i: usize,
}

impl<'a> TokenIter<'a> {
    #[inline(always)]
    pub(crate) const fn new(worker: &'a Worker, i: usize) -> Self {
        Self { worker, i }
    }
}

impl<'a> Iterator for TokenIter<'a> {
    type Item = Token<'a>;

    #[inline(always)]
    fn next(&mut self) -> Option<Self::Item> {
        if self.i < self.worker.num_tokens() {
            let t = self.worker.token(self.i);
            self.i += 1;
            Some(t)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::dictionary::Dictionary;
    use crate::tokenizer::Tokenizer;

    #[test]
    fn test_iter() {
        let lexicon_csv = "한국,0,0,100,*,NNP,*,*,*\n은,0,0,100,*,J,*,*,*";
        let matrix_def = "1 1\n0 0 0";
        let char_def = "DEFAULT 0 0\n0xAC00..0xD7A3 DEFAULT";
        let unk_def = "DEFAULT,0,0,1000,SY";

        let dict = Dictionary::from_readers(
            lexicon_csv.as_bytes(),
            matrix_def.as_bytes(),
            char_def.as_bytes(),
            unk_def.as_bytes(),
        )
        .unwrap();

        let tokenizer = Tokenizer::new(dict);
        let mut worker = tokenizer.new_worker();
        worker.reset_sentence("한국은").unwrap();
        worker.tokenize();
        assert_eq!(worker.num_tokens(), 2);

        let mut it = worker.token_iter();
        for i in 0..worker.num_tokens() {
            let lhs = worker.token(i);
            let rhs = it.next().unwrap();
            assert_eq!(lhs.surface(), rhs.surface());
        }
        assert!(it.next().is_none());
    }
}
