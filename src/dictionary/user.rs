//! User-provided dictionary compiled at load time.

use std::io::{prelude::*, BufReader, Read};

use bincode::{
    de::{BorrowDecoder, Decoder},
    enc::Encoder,
    error::{DecodeError, EncodeError},
    BorrowDecode, Decode, Encode,
};

use super::lexicon::{LexMatch, WordParam};
use super::{LexType, WordIdx};
use crate::errors::{HaneulError, Result};
use crate::fst::outputs::IntOutputs;
use crate::fst::{Fst, FstBuilder, InputType};
use crate::utils::FromU32;

/// Connection parameters applied to every user-dictionary entry.
///
/// The right id depends on whether the entry ends in a Hangul syllable
/// with or without a final consonant, which decides how particles attach.
#[derive(Clone, Copy, Debug, Decode, Encode)]
pub struct UserDictParam {
    /// Left connection id.
    pub left_id: u16,
    /// Right connection id for entries not ending in Hangul.
    pub right_id: u16,
    /// Right connection id for entries ending in a syllable with a coda.
    pub right_id_coda: u16,
    /// Right connection id for entries ending in an open syllable.
    pub right_id_nocoda: u16,
    /// Cost shared by all entries; strongly negative so user entries win.
    pub word_cost: i32,
}

impl Default for UserDictParam {
    fn default() -> Self {
        Self {
            left_id: 1781,
            right_id: 3533,
            right_id_coda: 3535,
            right_id_nocoda: 3534,
            word_cost: -100000,
        }
    }
}

/// Dictionary of user-defined words, with optional compound segmentation.
pub struct UserDictionary {
    fst: Fst<IntOutputs>,
    right_ids: Vec<u16>,
    // Per entry, character lengths of its parts; empty when unsegmented.
    segmentations: Vec<Vec<u8>>,
    param: UserDictParam,
}

impl UserDictionary {
    /// Creates a new instance from text lines `surface [seg1 seg2 …]`.
    /// `#` starts a comment, blank lines are skipped, and segmentation
    /// lengths must sum to the surface length.
    pub fn from_reader<R>(rdr: R, param: UserDictParam) -> Result<Self>
    where
        R: Read,
    {
        let mut rows: Vec<(String, Vec<u8>)> = vec![];
        let reader = BufReader::new(rdr);
        for line in reader.lines() {
            let line = line?;
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let mut fields = line.split_whitespace();
            let surface = match fields.next() {
                Some(s) => s.to_string(),
                None => continue,
            };
            let surface_len = surface.chars().count();
            let mut segs = vec![];
            let mut total = 0;
            for seg in fields {
                let len = seg.chars().count();
                total += len;
                segs.push(u8::try_from(len).map_err(|_| {
                    HaneulError::invalid_format(
                        "user.dict",
                        format!("segment is too long: {line}"),
                    )
                })?);
            }
            if !segs.is_empty() && total != surface_len {
                return Err(HaneulError::invalid_format(
                    "user.dict",
                    format!("segmentation must cover the surface: {line}"),
                ));
            }
            rows.push((surface, segs));
        }

        rows.sort_by(|a, b| a.0.cmp(&b.0));

        let mut fst_builder = FstBuilder::new(InputType::Byte2, IntOutputs);
        let mut right_ids = Vec::with_capacity(rows.len());
        let mut segmentations = Vec::with_capacity(rows.len());
        let mut labels = vec![];
        for (ordinal, (surface, segs)) in rows.iter().enumerate() {
            labels.clear();
            for c in surface.chars() {
                let unit = u32::from(c);
                if !(1..=0xFFFF).contains(&unit) {
                    return Err(HaneulError::invalid_format(
                        "user.dict",
                        format!("surface must be in the BMP: {surface}"),
                    ));
                }
                labels.push(unit as i32);
            }
            fst_builder
                .add(&labels, ordinal as u64)
                .map_err(|_| {
                    HaneulError::invalid_format(
                        "user.dict",
                        format!("duplicate surface: {surface}"),
                    )
                })?;
            right_ids.push(Self::right_id(surface, &param));
            segmentations.push(segs.clone());
        }

        Ok(Self {
            fst: fst_builder.finish()?,
            right_ids,
            segmentations,
            param,
        })
    }

    // Hangul coda rule: a syllable in 0xAC00..=0xD7A3 has a final
    // consonant iff (c - 0xAC00) % 28 != 0.
    fn right_id(surface: &str, param: &UserDictParam) -> u16 {
        match surface.chars().last() {
            Some(c) if ('\u{AC00}'..='\u{D7A3}').contains(&c) => {
                if (u32::from(c) - 0xAC00) % 28 != 0 {
                    param.right_id_coda
                } else {
                    param.right_id_nocoda
                }
            }
            _ => param.right_id,
        }
    }

    /// Iterates over all user entries whose surface is a prefix of
    /// `input`, in ascending match length.
    pub(crate) fn common_prefix_iterator<'a>(
        &'a self,
        input: &'a [char],
    ) -> impl Iterator<Item = LexMatch> + 'a {
        let mut reader = self.fst.reader();
        let mut arc = self.fst.root_arc();
        let mut output = 0;
        let mut pos = 0;
        let mut done = false;
        std::iter::from_fn(move || {
            loop {
                if done || pos >= input.len() {
                    return None;
                }
                let c = u32::from(input[pos]);
                if c == 0 || c > 0xFFFF {
                    done = true;
                    return None;
                }
                match self.fst.find_target_arc(c as i32, &arc, &mut reader) {
                    Some(next) => arc = next,
                    None => {
                        done = true;
                        return None;
                    }
                }
                if let Some(out) = &arc.output {
                    output += out;
                }
                pos += 1;
                if arc.is_final() {
                    let ordinal = output + arc.next_final_output.unwrap_or(0);
                    let ordinal = u32::try_from(ordinal).expect("user ordinal overflows u32");
                    return Some(LexMatch::new(
                        WordIdx::new(LexType::User, ordinal),
                        WordParam::new(
                            self.param.left_id,
                            self.right_ids[usize::from_u32(ordinal)],
                            self.param.word_cost,
                        ),
                        pos,
                    ));
                }
            }
        })
    }

    /// Character lengths of the entry's parts; empty when unsegmented.
    #[inline(always)]
    pub(crate) fn segmentation(&self, word_idx: WordIdx) -> &[u8] {
        debug_assert_eq!(word_idx.lex_type, LexType::User);
        &self.segmentations[usize::from_u32(word_idx.word_id)]
    }
}

impl Encode for UserDictionary {
    fn encode<E: Encoder>(&self, encoder: &mut E) -> std::result::Result<(), EncodeError> {
        let mut bytes = vec![];
        self.fst
            .save(&mut bytes)
            .map_err(|e| EncodeError::OtherString(e.to_string()))?;
        bytes.encode(encoder)?;
        self.right_ids.encode(encoder)?;
        self.segmentations.encode(encoder)?;
        self.param.encode(encoder)
    }
}

impl Decode for UserDictionary {
    fn decode<D: Decoder>(decoder: &mut D) -> std::result::Result<Self, DecodeError> {
        let bytes: Vec<u8> = Decode::decode(decoder)?;
        let fst = Fst::load(bytes.as_slice(), IntOutputs)
            .map_err(|e| DecodeError::OtherString(e.to_string()))?;
        Ok(Self {
            fst,
            right_ids: Decode::decode(decoder)?,
            segmentations: Decode::decode(decoder)?,
            param: Decode::decode(decoder)?,
        })
    }
}

impl<'de> BorrowDecode<'de> for UserDictionary {
    fn borrow_decode<D: BorrowDecoder<'de>>(
        decoder: &mut D,
    ) -> std::result::Result<Self, DecodeError> {
        Decode::decode(decoder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param() -> UserDictParam {
        UserDictParam {
            left_id: 1,
            right_id: 2,
            right_id_coda: 3,
            right_id_nocoda: 4,
            word_cost: -1000,
        }
    }

    #[test]
    fn test_prefix_multi_match() {
        let data = "\
# C++ and its friends
c++
세종
세종시 세종 시";
        let dict = UserDictionary::from_reader(data.as_bytes(), param()).unwrap();
        let input: Vec<char> = "세종시".chars().collect();
        let matches: Vec<_> = dict.common_prefix_iterator(&input).collect();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].end_char(), 2);
        assert_eq!(matches[1].end_char(), 3);
        assert_eq!(dict.segmentation(matches[0].word_idx()), &[] as &[u8]);
        assert_eq!(dict.segmentation(matches[1].word_idx()), &[2, 1]);
    }

    #[test]
    fn test_coda_rule() {
        let data = "세종\n세종시\nc++";
        let dict = UserDictionary::from_reader(data.as_bytes(), param()).unwrap();
        let sejong: Vec<char> = "세종".chars().collect();
        // 종 has a coda.
        let m = dict.common_prefix_iterator(&sejong).next().unwrap();
        assert_eq!(m.word_param().right_id, 3);
        // 시 has no coda.
        let sejongsi: Vec<char> = "세종시".chars().collect();
        let m = dict.common_prefix_iterator(&sejongsi).last().unwrap();
        assert_eq!(m.word_param().right_id, 4);
        // Not Hangul.
        let cpp: Vec<char> = "c++".chars().collect();
        let m = dict.common_prefix_iterator(&cpp).next().unwrap();
        assert_eq!(m.word_param().right_id, 2);
    }

    #[test]
    fn test_word_cost_applied() {
        let data = "세종";
        let dict = UserDictionary::from_reader(data.as_bytes(), param()).unwrap();
        let input: Vec<char> = "세종".chars().collect();
        let m = dict.common_prefix_iterator(&input).next().unwrap();
        assert_eq!(m.word_param().word_cost, -1000);
        assert_eq!(m.word_param().left_id, 1);
    }

    #[test]
    fn test_oversized_segmentation_rejected() {
        let data = "세종시 세종 시청";
        let result = UserDictionary::from_reader(data.as_bytes(), param());
        assert!(result.is_err());
    }

    #[test]
    fn test_short_segmentation_rejected() {
        // A segmentation must not leave trailing characters uncovered.
        let data = "세종시 세종";
        let result = UserDictionary::from_reader(data.as_bytes(), param());
        assert!(result.is_err());
    }

    #[test]
    fn test_default_cost_representable() {
        let data = "세종";
        let dict = UserDictionary::from_reader(data.as_bytes(), UserDictParam::default()).unwrap();
        let input: Vec<char> = "세종".chars().collect();
        let m = dict.common_prefix_iterator(&input).next().unwrap();
        assert_eq!(m.word_param().word_cost, -100000);
    }

    #[test]
    fn test_comments_and_blanks_skipped() {
        let data = "# header\n\n세종 # inline\n";
        let dict = UserDictionary::from_reader(data.as_bytes(), param()).unwrap();
        let input: Vec<char> = "세종".chars().collect();
        assert_eq!(dict.common_prefix_iterator(&input).count(), 1);
    }

    #[test]
    fn test_duplicate_surface_rejected() {
        let data = "세종\n세종";
        assert!(UserDictionary::from_reader(data.as_bytes(), param()).is_err());
    }
}
