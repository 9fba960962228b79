//! Unknown words synthesized from character classes.

use std::io::{prelude::*, BufReader, Read};

use bincode::{Decode, Encode};

use super::character::{CharInfo, CharacterDefinition};
use super::lexicon::WordParam;
use super::pos::POSTag;
use super::{LexType, WordIdx};
use crate::errors::{HaneulError, Result};
use crate::sentence::Sentence;
use crate::utils::{self, FromU32};

/// Synthesis parameters of one character class.
#[derive(Debug, Clone, Decode, Encode)]
pub struct UnkEntry {
    pub(crate) class_id: u8,
    pub(crate) left_id: u16,
    pub(crate) right_id: u16,
    pub(crate) word_cost: i16,
    pub(crate) tag: POSTag,
}

/// An unknown-word candidate spanning a character range.
#[derive(Debug, Clone)]
pub struct UnkWord {
    start_char: u16,
    end_char: u16,
    left_id: u16,
    right_id: u16,
    word_cost: i16,
    word_id: u16,
}

impl UnkWord {
    #[inline(always)]
    pub(crate) const fn start_char(&self) -> usize {
        self.start_char as usize
    }

    #[inline(always)]
    pub(crate) const fn end_char(&self) -> usize {
        self.end_char as usize
    }

    #[inline(always)]
    pub(crate) const fn word_param(&self) -> WordParam {
        WordParam::new(self.left_id, self.right_id, self.word_cost as i32)
    }

    #[inline(always)]
    pub(crate) const fn word_idx(&self) -> WordIdx {
        WordIdx::new(LexType::Unknown, self.word_id as u32)
    }
}

/// Handler of unknown words.
#[derive(Decode, Encode)]
pub struct UnkHandler {
    offsets: Vec<usize>, // indexed by class id
    entries: Vec<UnkEntry>,
}

impl UnkHandler {
    /// Creates a new instance from an `unk.def`-style CSV with rows
    /// `class,left_id,right_id,cost,tag`. Class names must be defined in
    /// `char_def`, and a `DEFAULT` row is mandatory.
    pub fn from_reader<R>(rdr: R, char_def: &CharacterDefinition) -> Result<Self>
    where
        R: Read,
    {
        let mut entries = vec![];
        let reader = BufReader::new(rdr);
        for line in reader.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            entries.push(Self::parse_unk_entry(line, char_def)?);
        }

        entries.sort_by_key(|e| e.class_id);
        let mut offsets = vec![0; char_def.num_classes() + 1];
        for e in &entries {
            offsets[usize::from(e.class_id) + 1] += 1;
        }
        for i in 1..offsets.len() {
            offsets[i] += offsets[i - 1];
        }
        if offsets[1] == 0 {
            return Err(HaneulError::invalid_format(
                "unk.def",
                "a DEFAULT entry is required",
            ));
        }
        Ok(Self { offsets, entries })
    }

    fn parse_unk_entry(line: &str, char_def: &CharacterDefinition) -> Result<UnkEntry> {
        let cols = utils::parse_csv_row(line);
        if cols.len() != 5 {
            let msg = format!("An unknown-word row must have five columns, {line}");
            return Err(HaneulError::invalid_format("unk.def", msg));
        }
        let class_id = char_def.class_id(&cols[0]).ok_or_else(|| {
            HaneulError::invalid_format(
                "unk.def",
                format!("undefined character class: {}", cols[0]),
            )
        })?;
        Ok(UnkEntry {
            class_id,
            left_id: cols[1].parse()?,
            right_id: cols[2].parse()?,
            word_cost: cols[3].parse()?,
            tag: cols[4].parse()?,
        })
    }

    /// Emits unknown-word candidates starting at `start_char`.
    ///
    /// Classes without the invoke flag stay silent when a known word
    /// already matched there. A group-flagged class emits one candidate
    /// spanning the maximal same-class run, unless `group_enabled` is off;
    /// then every class falls back to a single character. At least one
    /// candidate is emitted when nothing else matched at the position.
    pub(crate) fn gen_unk_words<F>(
        &self,
        sent: &Sentence,
        start_char: usize,
        has_matched: bool,
        group_enabled: bool,
        f: F,
    ) where
        F: FnMut(UnkWord),
    {
        let cinfo = sent.char_info(start_char);
        if has_matched && !cinfo.invoke {
            return;
        }
        let end_char = if group_enabled && cinfo.group {
            start_char + sent.groupable(start_char)
        } else {
            start_char + 1
        };
        self.scan_entries(start_char, end_char, cinfo, f);
    }

    #[inline(always)]
    fn scan_entries<F>(&self, start_char: usize, end_char: usize, cinfo: CharInfo, mut f: F) -> F
    where
        F: FnMut(UnkWord),
    {
        let mut class_id = usize::from(cinfo.class_id);
        if self.offsets[class_id] == self.offsets[class_id + 1] {
            // No entry for this class; DEFAULT stands in.
            class_id = 0;
        }
        let start = self.offsets[class_id];
        let end = self.offsets[class_id + 1];
        for word_id in start..end {
            let e = &self.entries[word_id];
            f(UnkWord {
                start_char: start_char as u16,
                end_char: end_char as u16,
                left_id: e.left_id,
                right_id: e.right_id,
                word_cost: e.word_cost,
                word_id: word_id as u16,
            });
        }
        f
    }

    /// Checks that all connection ids fit the matrix.
    pub(crate) fn verify(&self, conn: &super::connector::ConnectionCosts) -> bool {
        self.entries.iter().all(|e| {
            usize::from(e.left_id) < conn.num_left() && usize::from(e.right_id) < conn.num_right()
        })
    }

    #[inline(always)]
    pub(crate) fn tag(&self, word_idx: WordIdx) -> POSTag {
        debug_assert_eq!(word_idx.lex_type, LexType::Unknown);
        self.entries[usize::from_u32(word_idx.word_id)].tag
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHAR_DEF: &str = "\
DEFAULT 0 0
SPACE 0 1
HANGUL 0 0
NUMERIC 1 1
0x0020 SPACE
0x0030..0x0039 NUMERIC
0xAC00..0xD7A3 HANGUL";

    const UNK_DEF: &str = "\
DEFAULT,10,10,3000,SY
HANGUL,11,11,3500,UNKNOWN
NUMERIC,12,12,2000,SN";

    fn handler() -> (CharacterDefinition, UnkHandler) {
        let char_def = CharacterDefinition::from_reader(CHAR_DEF.as_bytes()).unwrap();
        let unk = UnkHandler::from_reader(UNK_DEF.as_bytes(), &char_def).unwrap();
        (char_def, unk)
    }

    fn sentence(text: &str, char_def: &CharacterDefinition) -> Sentence {
        let mut sent = Sentence::new();
        sent.set_sentence(text);
        sent.compile(char_def);
        sent
    }

    #[test]
    fn test_group_run() {
        let (char_def, unk) = handler();
        let sent = sentence("2018년", &char_def);
        let mut words = vec![];
        unk.gen_unk_words(&sent, 0, false, true, |w| words.push(w));
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].start_char(), 0);
        assert_eq!(words[0].end_char(), 4);
        assert_eq!(words[0].word_param(), WordParam::new(12, 12, 2000));
    }

    #[test]
    fn test_unigram_mode() {
        let (char_def, unk) = handler();
        let sent = sentence("2018", &char_def);
        let mut words = vec![];
        unk.gen_unk_words(&sent, 0, false, false, |w| words.push(w));
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].end_char(), 1);
    }

    #[test]
    fn test_invoke_gates_on_match() {
        let (char_def, unk) = handler();
        let sent = sentence("한국", &char_def);
        // HANGUL does not invoke, so a known match silences it.
        let mut words = vec![];
        unk.gen_unk_words(&sent, 0, true, true, |w| words.push(w));
        assert!(words.is_empty());
        // Without a match a candidate is still emitted.
        unk.gen_unk_words(&sent, 0, false, true, |w| words.push(w));
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].end_char(), 1);
    }

    #[test]
    fn test_invoke_fires_despite_match() {
        let (char_def, unk) = handler();
        let sent = sentence("2018", &char_def);
        let mut words = vec![];
        unk.gen_unk_words(&sent, 0, true, true, |w| words.push(w));
        assert_eq!(words.len(), 1);
    }

    #[test]
    fn test_default_fallback() {
        let (char_def, unk) = handler();
        let sent = sentence("!", &char_def);
        let mut words = vec![];
        unk.gen_unk_words(&sent, 0, false, true, |w| words.push(w));
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].word_param(), WordParam::new(10, 10, 3000));
        assert_eq!(unk.tag(words[0].word_idx()), POSTag::SY);
    }

    #[test]
    fn test_missing_default_rejected() {
        let char_def = CharacterDefinition::from_reader(CHAR_DEF.as_bytes()).unwrap();
        let data = "HANGUL,11,11,3500,UNKNOWN";
        assert!(UnkHandler::from_reader(data.as_bytes(), &char_def).is_err());
    }

    #[test]
    fn test_undefined_class_rejected() {
        let char_def = CharacterDefinition::from_reader(CHAR_DEF.as_bytes()).unwrap();
        let data = "DEFAULT,10,10,3000,SY\nKATAKANA,1,1,1,SL";
        assert!(UnkHandler::from_reader(data.as_bytes(), &char_def).is_err());
    }
}
