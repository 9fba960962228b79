//! Known-word lexicon: surface FST, ordinal-to-entry map, and the
//! bit-packed entry records.

mod builder;

use std::io::{Read, Write};

use bincode::{
    de::{BorrowDecoder, Decoder},
    enc::Encoder,
    error::{DecodeError, EncodeError},
    BorrowDecode, Decode, Encode,
};

use crate::dictionary::pos::{POSTag, POSType};
use crate::dictionary::{LexType, WordIdx};
use crate::errors::{HaneulError, Result};
use crate::fst::outputs::IntOutputs;
use crate::fst::{Arc, Fst, InputType};
use crate::utils::{self, FromU32};

pub(crate) use builder::RawLexEntry;

const STREAM_MAGIC: &[u8; 4] = b"hLEX";
const STREAM_VERSION: u32 = 1;

/// First and last codepoints of the Hangul syllable block.
const HANGUL_START: i32 = 0xAC00;
const HANGUL_END: i32 = 0xD7A3;

const POS_TYPE_BITS: u16 = 2;
const POS_TYPE_MASK: u16 = (1 << POS_TYPE_BITS) - 1;
const HAS_SINGLE_POS: u16 = 1;
const HAS_READING: u16 = 1 << 1;

/// Maximum connection id representable in a packed record.
pub(crate) const MAX_CONN_ID: u16 = (1 << 14) - 1;

/// Connection ids and cost of a word.
#[derive(Clone, Copy, Default, Eq, PartialEq, Debug, Decode, Encode)]
pub struct WordParam {
    /// Left connection id.
    pub left_id: u16,
    /// Right connection id.
    pub right_id: u16,
    /// Cost of the word itself. Lexicon records store it in 16 bits, but
    /// user dictionaries use costs far below that range.
    pub word_cost: i32,
}

impl WordParam {
    /// Creates a new instance.
    #[inline(always)]
    pub const fn new(left_id: u16, right_id: u16, word_cost: i32) -> Self {
        Self {
            left_id,
            right_id,
            word_cost,
        }
    }
}

/// One part of a decomposed entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Morpheme {
    /// Part-of-speech of this part.
    pub tag: POSTag,
    /// Character length of this part. For compounds it slices the entry
    /// surface; inflected and pre-analyzed parts carry their own text.
    pub len: u8,
    /// Explicit text of the part, present only for inflected and
    /// pre-analyzed entries.
    pub surface: Option<String>,
}

/// Contiguous buffer of bit-packed word records, addressed by byte offset.
///
/// Record layout:
///   u16  left_id << 2 | pos_type
///   u16  right_id << 2 | flags (bit 0: single POS, bit 1: has reading)
///   i16  word_cost
///   u8   left tag
///   u8   right tag                  (absent when single POS)
///   u8   len + UTF-16 code units    (reading; absent without the flag)
///   u8   count, then per part:      (absent for plain morphemes)
///        u8 tag, u8 len, and the part's code units for
///        inflected/pre-analyzed entries
#[derive(Default, Decode, Encode)]
pub struct WordEntries {
    data: Vec<u8>,
}

impl WordEntries {
    #[inline(always)]
    fn read_u16(&self, offset: usize) -> u16 {
        u16::from_le_bytes([self.data[offset], self.data[offset + 1]])
    }

    /// Connection ids and cost of a word.
    #[inline(always)]
    pub fn word_param(&self, word_id: u32) -> WordParam {
        let offset = usize::from_u32(word_id);
        WordParam {
            left_id: self.read_u16(offset) >> POS_TYPE_BITS,
            right_id: self.read_u16(offset + 2) >> POS_TYPE_BITS,
            word_cost: i32::from(self.read_u16(offset + 4) as i16),
        }
    }

    /// Decomposition type of a word.
    #[inline(always)]
    pub fn pos_type(&self, word_id: u32) -> POSType {
        let bits = self.read_u16(usize::from_u32(word_id)) & POS_TYPE_MASK;
        POSType::from_u8(bits as u8).unwrap_or(POSType::Morpheme)
    }

    #[inline(always)]
    fn flags(&self, word_id: u32) -> u16 {
        self.read_u16(usize::from_u32(word_id) + 2) & POS_TYPE_MASK
    }

    /// Left part-of-speech tag.
    #[inline(always)]
    pub fn left_pos(&self, word_id: u32) -> POSTag {
        POSTag::from_u8(self.data[usize::from_u32(word_id) + 6]).unwrap_or(POSTag::UNKNOWN)
    }

    /// Right part-of-speech tag. Equals the left tag for single-POS
    /// entries.
    #[inline(always)]
    pub fn right_pos(&self, word_id: u32) -> POSTag {
        if self.flags(word_id) & HAS_SINGLE_POS != 0 {
            self.left_pos(word_id)
        } else {
            POSTag::from_u8(self.data[usize::from_u32(word_id) + 7]).unwrap_or(POSTag::UNKNOWN)
        }
    }

    // Offset of the variable-length fields.
    #[inline(always)]
    fn var_offset(&self, word_id: u32) -> usize {
        let single = self.flags(word_id) & HAS_SINGLE_POS != 0;
        usize::from_u32(word_id) + 7 + usize::from(!single)
    }

    fn read_utf16(&self, offset: usize, len: usize) -> (String, usize) {
        let mut s = String::with_capacity(len);
        let mut offset = offset;
        for _ in 0..len {
            let unit = u32::from(self.read_u16(offset));
            // Records never contain surrogates; surfaces are BMP-checked
            // at build time.
            s.push(char::from_u32(unit).unwrap_or(char::REPLACEMENT_CHARACTER));
            offset += 2;
        }
        (s, offset)
    }

    /// Reading form of a word, if recorded.
    pub fn reading(&self, word_id: u32) -> Option<String> {
        if self.flags(word_id) & HAS_READING == 0 {
            return None;
        }
        let offset = self.var_offset(word_id);
        let len = usize::from(self.data[offset]);
        Some(self.read_utf16(offset + 1, len).0)
    }

    /// Constituent morphemes of a compound, inflected, or pre-analyzed
    /// entry. Empty for plain morphemes.
    pub fn morphemes(&self, word_id: u32) -> Vec<Morpheme> {
        let pos_type = self.pos_type(word_id);
        if pos_type == POSType::Morpheme {
            return vec![];
        }
        let mut offset = self.var_offset(word_id);
        if self.flags(word_id) & HAS_READING != 0 {
            offset += 1 + usize::from(self.data[offset]) * 2;
        }
        let count = usize::from(self.data[offset]);
        offset += 1;
        let explicit = matches!(pos_type, POSType::Inflect | POSType::Preanalysis);
        let mut parts = Vec::with_capacity(count);
        for _ in 0..count {
            let tag = POSTag::from_u8(self.data[offset]).unwrap_or(POSTag::UNKNOWN);
            let len = self.data[offset + 1];
            offset += 2;
            let surface = if explicit {
                let (s, next) = self.read_utf16(offset, usize::from(len));
                offset = next;
                Some(s)
            } else {
                None
            };
            parts.push(Morpheme { tag, len, surface });
        }
        parts
    }

    /// Appends a record and returns its word id (byte offset).
    pub(crate) fn push(&mut self, e: &RawLexEntry) -> Result<u32> {
        if e.param.left_id > MAX_CONN_ID || e.param.right_id > MAX_CONN_ID {
            return Err(HaneulError::invalid_format(
                "lex.csv",
                "connection id must fit in 14 bits",
            ));
        }
        let word_id = u32::try_from(self.data.len())?;

        let single = e.right_pos.is_none();
        let mut flags = 0;
        if single {
            flags |= HAS_SINGLE_POS;
        }
        if e.reading.is_some() {
            flags |= HAS_READING;
        }
        self.data
            .extend_from_slice(&((e.param.left_id << POS_TYPE_BITS) | e.pos_type as u16).to_le_bytes());
        self.data
            .extend_from_slice(&((e.param.right_id << POS_TYPE_BITS) | flags).to_le_bytes());
        let word_cost = i16::try_from(e.param.word_cost).map_err(|_| {
            HaneulError::invalid_format("lex.csv", "word cost must fit in 16 bits")
        })?;
        self.data.extend_from_slice(&word_cost.to_le_bytes());
        self.data.push(e.left_pos as u8);
        if let Some(right_pos) = e.right_pos {
            self.data.push(right_pos as u8);
        }
        if let Some(reading) = &e.reading {
            self.push_utf16(reading)?;
        }
        if e.pos_type != POSType::Morpheme {
            self.data.push(u8::try_from(e.morphemes.len()).map_err(|_| {
                HaneulError::invalid_format("lex.csv", "too many morphemes in an expression")
            })?);
            let explicit = matches!(e.pos_type, POSType::Inflect | POSType::Preanalysis);
            for part in &e.morphemes {
                self.data.push(part.tag as u8);
                let len = u8::try_from(part.surface.chars().count()).map_err(|_| {
                    HaneulError::invalid_format("lex.csv", "morpheme surface is too long")
                })?;
                self.data.push(len);
                if explicit {
                    for c in part.surface.chars() {
                        let unit = u16::try_from(u32::from(c)).map_err(|_| {
                            HaneulError::invalid_format(
                                "lex.csv",
                                "morpheme surface must be in the BMP",
                            )
                        })?;
                        self.data.extend_from_slice(&unit.to_le_bytes());
                    }
                }
            }
        }
        Ok(word_id)
    }

    fn push_utf16(&mut self, s: &str) -> Result<()> {
        let len = u8::try_from(s.chars().count())
            .map_err(|_| HaneulError::invalid_format("lex.csv", "reading is too long"))?;
        self.data.push(len);
        for c in s.chars() {
            let unit = u16::try_from(u32::from(c)).map_err(|_| {
                HaneulError::invalid_format("lex.csv", "reading must be in the BMP")
            })?;
            self.data.extend_from_slice(&unit.to_le_bytes());
        }
        Ok(())
    }

    #[inline(always)]
    fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

/// FST ordinal to word-id lists: one surface form can back several
/// entries.
#[derive(Default, Decode, Encode)]
pub struct TargetMap {
    starts: Vec<u32>, // per ordinal, index into offsets; len = sources + 1
    offsets: Vec<u32>,
}

impl TargetMap {
    pub(crate) fn new(lists: Vec<Vec<u32>>) -> Self {
        let mut starts = Vec::with_capacity(lists.len() + 1);
        let mut offsets = vec![];
        starts.push(0);
        for list in &lists {
            debug_assert!(!list.is_empty());
            offsets.extend_from_slice(list);
            starts.push(u32::try_from(offsets.len()).unwrap());
        }
        Self { starts, offsets }
    }

    /// Word ids sharing the surface form with this ordinal. An ordinal
    /// past the last source maps to no entries.
    #[inline(always)]
    pub fn lookup(&self, ordinal: u32) -> &[u32] {
        let i = usize::from_u32(ordinal);
        if i + 1 >= self.starts.len() {
            return &[];
        }
        &self.offsets[usize::from_u32(self.starts[i])..usize::from_u32(self.starts[i + 1])]
    }

    /// Checks that every word id addresses at least the fixed record
    /// prefix within an entry blob of `len` bytes.
    pub(crate) fn fits_entries(&self, len: usize) -> bool {
        self.offsets.iter().all(|&id| usize::from_u32(id) + 7 <= len)
    }

    /// Number of distinct surface forms.
    #[inline(always)]
    pub fn num_sources(&self) -> usize {
        self.starts.len() - 1
    }

    /// Writes the flag/delta stream: per target one varint whose bit 0
    /// marks the first target of a new source and whose upper bits hold
    /// the zig-zag delta from the previous target.
    pub fn save<W>(&self, mut wtr: W) -> Result<()>
    where
        W: Write,
    {
        utils::write_vu64(&mut wtr, self.offsets.len() as u64)?;
        utils::write_vu64(&mut wtr, self.num_sources() as u64)?;
        let mut prev = 0;
        for source in 0..self.num_sources() {
            for (i, &offset) in self.lookup(source as u32).iter().enumerate() {
                let delta = i64::from(offset) - prev;
                let v = (utils::zigzag_encode(delta) << 1) | u64::from(i == 0);
                utils::write_vu64(&mut wtr, v)?;
                prev = i64::from(offset);
            }
        }
        Ok(())
    }

    /// Reads a stream written by [`Self::save`].
    pub fn load<R>(mut rdr: R) -> Result<Self>
    where
        R: Read,
    {
        let num_targets = utils::read_vu64(&mut rdr)? as usize;
        let num_sources = utils::read_vu64(&mut rdr)? as usize;
        let mut starts = Vec::with_capacity(num_sources + 1);
        let mut offsets = Vec::with_capacity(num_targets);
        let mut prev = 0;
        for _ in 0..num_targets {
            let v = utils::read_vu64(&mut rdr)?;
            if v & 1 != 0 {
                starts.push(u32::try_from(offsets.len())?);
            }
            let offset = prev + utils::zigzag_decode(v >> 1);
            offsets.push(u32::try_from(offset).map_err(|_| {
                HaneulError::invalid_format("lex.bin", "negative target offset")
            })?);
            prev = offset;
        }
        if starts.len() != num_sources {
            return Err(HaneulError::invalid_format(
                "lex.bin",
                "source count does not match the target stream",
            ));
        }
        starts.push(u32::try_from(offsets.len())?);
        Ok(Self { starts, offsets })
    }
}

/// Surface-form FST with an extra root cache over the Hangul syllable
/// block, which virtually every lexicon entry starts with.
pub struct SurfaceFst {
    fst: Fst<IntOutputs>,
    hangul_cache: Vec<Option<Arc<u64>>>,
}

impl SurfaceFst {
    pub(crate) fn new(fst: Fst<IntOutputs>) -> Self {
        let mut cache = vec![None; (HANGUL_END - HANGUL_START + 1) as usize];
        {
            let root = fst.root_arc();
            if root.target > 0 {
                let mut reader = fst.reader();
                let mut arc = fst.read_first_real_arc(root.target, &mut reader);
                loop {
                    if (HANGUL_START..=HANGUL_END).contains(&arc.label) {
                        cache[(arc.label - HANGUL_START) as usize] = Some(arc.clone());
                    }
                    if arc.is_last() || arc.label > HANGUL_END {
                        break;
                    }
                    fst.read_next_real_arc(&mut arc, &mut reader);
                }
            }
        }
        Self {
            fst,
            hangul_cache: cache,
        }
    }

    #[inline(always)]
    pub(crate) fn fst(&self) -> &Fst<IntOutputs> {
        &self.fst
    }

    /// [`Fst::find_target_arc`] with the Hangul block cache consulted for
    /// root transitions.
    #[inline(always)]
    pub(crate) fn find_target_arc(
        &self,
        label: i32,
        follow: &Arc<u64>,
        reader: &mut crate::fst::bytes::ReverseReader,
    ) -> Option<Arc<u64>> {
        if follow.target == self.fst.start_node && (HANGUL_START..=HANGUL_END).contains(&label) {
            return self.hangul_cache[(label - HANGUL_START) as usize].clone();
        }
        self.fst.find_target_arc(label, follow, reader)
    }
}

impl Encode for SurfaceFst {
    fn encode<E: Encoder>(&self, encoder: &mut E) -> std::result::Result<(), EncodeError> {
        let mut bytes = vec![];
        self.fst
            .save(&mut bytes)
            .map_err(|e| EncodeError::OtherString(e.to_string()))?;
        bytes.encode(encoder)
    }
}

impl Decode for SurfaceFst {
    fn decode<D: Decoder>(decoder: &mut D) -> std::result::Result<Self, DecodeError> {
        let bytes: Vec<u8> = Decode::decode(decoder)?;
        let fst = Fst::load(bytes.as_slice(), IntOutputs)
            .map_err(|e| DecodeError::OtherString(e.to_string()))?;
        Ok(Self::new(fst))
    }
}

impl<'de> BorrowDecode<'de> for SurfaceFst {
    fn borrow_decode<D: BorrowDecoder<'de>>(
        decoder: &mut D,
    ) -> std::result::Result<Self, DecodeError> {
        Decode::decode(decoder)
    }
}

/// Known-word lexicon.
#[derive(Decode, Encode)]
pub struct Lexicon {
    fst: SurfaceFst,
    target_map: TargetMap,
    entries: WordEntries,
    lex_type: LexType,
}

impl Lexicon {
    /// Iterates over all entries whose surface is a prefix of `input`,
    /// in ascending match length.
    #[inline(always)]
    pub(crate) fn common_prefix_iterator<'a>(
        &'a self,
        input: &'a [char],
    ) -> CommonPrefixIter<'a> {
        CommonPrefixIter {
            lexicon: self,
            input,
            reader: self.fst.fst().reader(),
            arc: self.fst.fst().root_arc(),
            output: 0,
            pos: 0,
            pending: &[],
            pending_idx: 0,
            end_char: 0,
            done: false,
        }
    }

    #[inline(always)]
    pub(crate) fn pos_type(&self, word_idx: WordIdx) -> POSType {
        self.entries.pos_type(word_idx.word_id)
    }

    #[inline(always)]
    pub(crate) fn left_pos(&self, word_idx: WordIdx) -> POSTag {
        self.entries.left_pos(word_idx.word_id)
    }

    #[inline(always)]
    pub(crate) fn right_pos(&self, word_idx: WordIdx) -> POSTag {
        self.entries.right_pos(word_idx.word_id)
    }

    #[inline(always)]
    pub(crate) fn reading(&self, word_idx: WordIdx) -> Option<String> {
        self.entries.reading(word_idx.word_id)
    }

    #[inline(always)]
    pub(crate) fn morphemes(&self, word_idx: WordIdx) -> Vec<Morpheme> {
        self.entries.morphemes(word_idx.word_id)
    }

    /// Checks that every connection id is within the matrix bounds.
    pub(crate) fn verify(&self, conn: &super::connector::ConnectionCosts) -> bool {
        for source in 0..self.target_map.num_sources() {
            for &word_id in self.target_map.lookup(source as u32) {
                let p = self.entries.word_param(word_id);
                if usize::from(p.left_id) >= conn.num_left()
                    || usize::from(p.right_id) >= conn.num_right()
                {
                    return false;
                }
            }
        }
        true
    }

    /// Serializes the lexicon: header, target map, entry blob, FST.
    pub fn save<W>(&self, mut wtr: W) -> Result<()>
    where
        W: Write,
    {
        wtr.write_all(STREAM_MAGIC)?;
        wtr.write_all(&STREAM_VERSION.to_le_bytes())?;
        self.target_map.save(&mut wtr)?;
        let entries = self.entries.as_bytes();
        utils::write_vu64(&mut wtr, entries.len() as u64)?;
        wtr.write_all(entries)?;
        self.fst.fst().save(&mut wtr)?;
        Ok(())
    }

    /// Deserializes a lexicon written by [`Self::save`].
    pub fn load<R>(mut rdr: R, lex_type: LexType) -> Result<Self>
    where
        R: Read,
    {
        let mut magic = [0; 4];
        rdr.read_exact(&mut magic)?;
        if &magic != STREAM_MAGIC {
            return Err(HaneulError::invalid_format("lex.bin", "bad magic"));
        }
        let mut version = [0; 4];
        rdr.read_exact(&mut version)?;
        if u32::from_le_bytes(version) != STREAM_VERSION {
            return Err(HaneulError::invalid_format(
                "lex.bin",
                format!("unsupported version: {}", u32::from_le_bytes(version)),
            ));
        }
        let target_map = TargetMap::load(&mut rdr)?;
        let len = utils::read_vu64(&mut rdr)? as usize;
        let mut data = vec![0; len];
        rdr.read_exact(&mut data)?;
        if !target_map.fits_entries(data.len()) {
            return Err(HaneulError::invalid_format(
                "lex.bin",
                "word id is out of bounds of the entry blob",
            ));
        }
        let fst = Fst::load(&mut rdr, IntOutputs)?;
        Ok(Self {
            fst: SurfaceFst::new(fst),
            target_map,
            entries: WordEntries { data },
            lex_type,
        })
    }
}

/// Iterator over lexicon entries matching a prefix of the input.
pub(crate) struct CommonPrefixIter<'a> {
    lexicon: &'a Lexicon,
    input: &'a [char],
    reader: crate::fst::bytes::ReverseReader<'a>,
    arc: Arc<u64>,
    output: u64,
    pos: usize,
    pending: &'a [u32],
    pending_idx: usize,
    end_char: usize,
    done: bool,
}

impl Iterator for CommonPrefixIter<'_> {
    type Item = LexMatch;

    fn next(&mut self) -> Option<LexMatch> {
        loop {
            if self.pending_idx < self.pending.len() {
                let word_id = self.pending[self.pending_idx];
                self.pending_idx += 1;
                return Some(LexMatch::new(
                    WordIdx::new(self.lexicon.lex_type, word_id),
                    self.lexicon.entries.word_param(word_id),
                    self.end_char,
                ));
            }
            if self.done || self.pos >= self.input.len() {
                return None;
            }
            let c = u32::from(self.input[self.pos]);
            let label = match i32::try_from(c) {
                Ok(label) if label <= 0xFFFF => label,
                _ => {
                    // Outside the BMP; no lexicon surface can continue.
                    self.done = true;
                    return None;
                }
            };
            match self
                .lexicon
                .fst
                .find_target_arc(label, &self.arc, &mut self.reader)
            {
                Some(next) => {
                    self.arc = next;
                }
                None => {
                    self.done = true;
                    return None;
                }
            }
            if let Some(out) = &self.arc.output {
                self.output += out;
            }
            self.pos += 1;
            if self.arc.is_final() {
                let ordinal = self.output + self.arc.next_final_output.as_ref().copied().unwrap_or(0);
                self.pending = self.lexicon.target_map.lookup(
                    u32::try_from(ordinal).expect("lexicon ordinal overflows u32"),
                );
                self.pending_idx = 0;
                self.end_char = self.pos;
            }
        }
    }
}

/// A lexicon entry matched at a position.
#[derive(Eq, PartialEq, Debug)]
pub struct LexMatch {
    word_idx: WordIdx,
    word_param: WordParam,
    end_char: usize,
}

impl LexMatch {
    #[inline(always)]
    pub(crate) const fn new(word_idx: WordIdx, word_param: WordParam, end_char: usize) -> Self {
        Self {
            word_idx,
            word_param,
            end_char,
        }
    }

    /// Position just after the last matched character.
    #[inline(always)]
    pub const fn end_char(&self) -> usize {
        self.end_char
    }

    /// Identifier of the matched word.
    #[inline(always)]
    pub const fn word_idx(&self) -> WordIdx {
        self.word_idx
    }

    /// Connection ids and cost of the matched word.
    #[inline(always)]
    pub const fn word_param(&self) -> WordParam {
        self.word_param
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEX_CSV: &str = "\
한국,0,0,500,*,NNP,*,한국,*
나라,0,0,700,*,NNG,*,나라,*
나라님,0,0,1200,*,NNG,*,나라님,*
가락지나물,1,1,2000,Compound,NNG,*,가락지나물,가락지/NNG+나물/NNG";

    fn lexicon() -> Lexicon {
        Lexicon::from_reader(LEX_CSV.as_bytes(), LexType::System).unwrap()
    }

    #[test]
    fn test_common_prefix_iterator() {
        let lex = lexicon();
        let input: Vec<char> = "나라님의".chars().collect();
        let matches: Vec<LexMatch> = lex.common_prefix_iterator(&input).collect();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].end_char(), 2);
        assert_eq!(matches[0].word_param(), WordParam::new(0, 0, 700));
        assert_eq!(matches[1].end_char(), 3);
        assert_eq!(matches[1].word_param(), WordParam::new(0, 0, 1200));
    }

    #[test]
    fn test_no_match() {
        let lex = lexicon();
        let input: Vec<char> = "서울".chars().collect();
        assert_eq!(lex.common_prefix_iterator(&input).count(), 0);
    }

    #[test]
    fn test_entry_accessors() {
        let lex = lexicon();
        let input: Vec<char> = "한국".chars().collect();
        let m = lex.common_prefix_iterator(&input).next().unwrap();
        let idx = m.word_idx();
        assert_eq!(lex.pos_type(idx), POSType::Morpheme);
        assert_eq!(lex.left_pos(idx), POSTag::NNP);
        assert_eq!(lex.right_pos(idx), POSTag::NNP);
        assert_eq!(lex.reading(idx), Some("한국".to_string()));
        assert!(lex.morphemes(idx).is_empty());
    }

    #[test]
    fn test_compound_morphemes() {
        let lex = lexicon();
        let input: Vec<char> = "가락지나물".chars().collect();
        let m = lex.common_prefix_iterator(&input).next().unwrap();
        let idx = m.word_idx();
        assert_eq!(lex.pos_type(idx), POSType::Compound);
        let parts = lex.morphemes(idx);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].tag, POSTag::NNG);
        assert_eq!(parts[0].len, 3);
        assert_eq!(parts[0].surface, None);
        assert_eq!(parts[1].len, 2);
    }

    #[test]
    fn test_record_bit_packing() {
        let mut entries = WordEntries::default();
        let word_id = entries
            .push(&RawLexEntry {
                surface: "먹다".to_string(),
                param: WordParam::new(1234, 5678, -321),
                pos_type: POSType::Inflect,
                left_pos: POSTag::VV,
                right_pos: Some(POSTag::E),
                reading: Some("먹다".to_string()),
                morphemes: vec![
                    builder::RawMorpheme {
                        tag: POSTag::VV,
                        surface: "먹".to_string(),
                    },
                    builder::RawMorpheme {
                        tag: POSTag::E,
                        surface: "다".to_string(),
                    },
                ],
            })
            .unwrap();
        assert_eq!(entries.word_param(word_id), WordParam::new(1234, 5678, -321));
        assert_eq!(entries.pos_type(word_id), POSType::Inflect);
        assert_eq!(entries.left_pos(word_id), POSTag::VV);
        assert_eq!(entries.right_pos(word_id), POSTag::E);
        assert_eq!(entries.reading(word_id), Some("먹다".to_string()));
        let parts = entries.morphemes(word_id);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].surface.as_deref(), Some("먹"));
        assert_eq!(parts[1].tag, POSTag::E);
    }

    #[test]
    fn test_reading_flag_off_hides_reading() {
        let mut entries = WordEntries::default();
        let word_id = entries
            .push(&RawLexEntry {
                surface: "산".to_string(),
                param: WordParam::new(1, 1, 10),
                pos_type: POSType::Morpheme,
                left_pos: POSTag::NNG,
                right_pos: None,
                reading: None,
                morphemes: vec![],
            })
            .unwrap();
        assert_eq!(entries.reading(word_id), None);
    }

    #[test]
    fn test_oversized_conn_id_rejected() {
        let mut entries = WordEntries::default();
        let result = entries.push(&RawLexEntry {
            surface: "산".to_string(),
            param: WordParam::new(1 << 14, 0, 0),
            pos_type: POSType::Morpheme,
            left_pos: POSTag::NNG,
            right_pos: None,
            reading: None,
            morphemes: vec![],
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_oversized_word_cost_rejected() {
        let mut entries = WordEntries::default();
        let result = entries.push(&RawLexEntry {
            surface: "산".to_string(),
            param: WordParam::new(0, 0, 40000),
            pos_type: POSType::Morpheme,
            left_pos: POSTag::NNG,
            right_pos: None,
            reading: None,
            morphemes: vec![],
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_target_map_out_of_range_ordinal() {
        let map = TargetMap::new(vec![vec![0]]);
        assert!(map.lookup(1).is_empty());
        assert!(map.lookup(u32::MAX).is_empty());
    }

    #[test]
    fn test_load_rejects_out_of_bounds_word_id() {
        // A target map pointing past the entry blob must not load.
        let mut bytes = vec![];
        bytes.extend_from_slice(b"hLEX");
        bytes.extend_from_slice(&1u32.to_le_bytes());
        TargetMap::new(vec![vec![1000]]).save(&mut bytes).unwrap();
        utils::write_vu64(&mut bytes, 7).unwrap();
        bytes.extend_from_slice(&[0; 7]);
        let fst = crate::fst::FstBuilder::new(InputType::Byte2, IntOutputs)
            .finish()
            .unwrap();
        fst.save(&mut bytes).unwrap();
        assert!(Lexicon::load(bytes.as_slice(), LexType::System).is_err());
    }

    #[test]
    fn test_target_map_roundtrip() {
        let map = TargetMap::new(vec![vec![0], vec![8, 24], vec![16]]);
        assert_eq!(map.lookup(1), &[8, 24]);
        let mut bytes = vec![];
        map.save(&mut bytes).unwrap();
        let loaded = TargetMap::load(bytes.as_slice()).unwrap();
        assert_eq!(loaded.num_sources(), 3);
        assert_eq!(loaded.lookup(0), &[0]);
        assert_eq!(loaded.lookup(1), &[8, 24]);
        assert_eq!(loaded.lookup(2), &[16]);
    }

    #[test]
    fn test_lexicon_stream_roundtrip() {
        let lex = lexicon();
        let mut bytes = vec![];
        lex.save(&mut bytes).unwrap();
        let loaded = Lexicon::load(bytes.as_slice(), LexType::System).unwrap();
        let input: Vec<char> = "나라님의".chars().collect();
        let a: Vec<LexMatch> = lex.common_prefix_iterator(&input).collect();
        let b: Vec<LexMatch> = loaded.common_prefix_iterator(&input).collect();
        assert_eq!(a, b);
    }
}
