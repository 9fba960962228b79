//! Dictionary of the analyzer: system lexicon, optional user dictionary,
//! connection costs, character classes, and unknown-word parameters.

mod builder;
pub mod character;
pub mod connector;
pub mod lexicon;
pub mod pos;
pub mod unknown;
pub mod user;
mod word_idx;

use std::io::{Read, Write};

use bincode::{Decode, Encode};

use crate::common;
use crate::errors::{HaneulError, Result};
use character::CharacterDefinition;
use connector::ConnectionCosts;
use lexicon::{Lexicon, Morpheme};
use pos::{POSTag, POSType};
use unknown::UnkHandler;
use user::{UserDictParam, UserDictionary};

pub use word_idx::WordIdx;

const MODEL_MAGIC: &[u8] = b"haneul-dictionary 1\n";

/// Type of a lexicon that contains a word.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Hash, Decode, Encode)]
pub enum LexType {
    /// The system lexicon.
    System,
    /// A user dictionary.
    User,
    /// Synthesized from character classes.
    Unknown,
}

#[derive(Decode, Encode)]
pub(crate) struct DictionaryInner {
    system_lexicon: Lexicon,
    user_dictionary: Option<UserDictionary>,
    connector: ConnectionCosts,
    char_def: CharacterDefinition,
    unk_handler: UnkHandler,
}

/// The dictionary handle passed to a tokenizer. Immutable once built and
/// freely shareable across threads.
pub struct Dictionary {
    pub(crate) data: DictionaryInner,
}

impl Dictionary {
    #[inline(always)]
    pub(crate) fn system_lexicon(&self) -> &Lexicon {
        &self.data.system_lexicon
    }

    #[inline(always)]
    pub(crate) fn user_dictionary(&self) -> Option<&UserDictionary> {
        self.data.user_dictionary.as_ref()
    }

    #[inline(always)]
    pub(crate) fn connector(&self) -> &ConnectionCosts {
        &self.data.connector
    }

    #[inline(always)]
    pub(crate) fn char_def(&self) -> &CharacterDefinition {
        &self.data.char_def
    }

    #[inline(always)]
    pub(crate) fn unk_handler(&self) -> &UnkHandler {
        &self.data.unk_handler
    }

    pub(crate) fn pos_type(&self, word_idx: WordIdx) -> POSType {
        match word_idx.lex_type {
            LexType::System => self.data.system_lexicon.pos_type(word_idx),
            LexType::User => {
                let user = self.data.user_dictionary.as_ref().unwrap();
                if user.segmentation(word_idx).is_empty() {
                    POSType::Morpheme
                } else {
                    POSType::Compound
                }
            }
            LexType::Unknown => POSType::Morpheme,
        }
    }

    pub(crate) fn left_pos(&self, word_idx: WordIdx) -> POSTag {
        match word_idx.lex_type {
            LexType::System => self.data.system_lexicon.left_pos(word_idx),
            LexType::User => POSTag::NNG,
            LexType::Unknown => self.data.unk_handler.tag(word_idx),
        }
    }

    pub(crate) fn right_pos(&self, word_idx: WordIdx) -> POSTag {
        match word_idx.lex_type {
            LexType::System => self.data.system_lexicon.right_pos(word_idx),
            LexType::User => POSTag::NNG,
            LexType::Unknown => self.data.unk_handler.tag(word_idx),
        }
    }

    pub(crate) fn reading(&self, word_idx: WordIdx) -> Option<String> {
        match word_idx.lex_type {
            LexType::System => self.data.system_lexicon.reading(word_idx),
            _ => None,
        }
    }

    pub(crate) fn morphemes(&self, word_idx: WordIdx) -> Vec<Morpheme> {
        match word_idx.lex_type {
            LexType::System => self.data.system_lexicon.morphemes(word_idx),
            LexType::User => {
                let user = self.data.user_dictionary.as_ref().unwrap();
                user.segmentation(word_idx)
                    .iter()
                    .map(|&len| Morpheme {
                        tag: POSTag::NNG,
                        len,
                        surface: None,
                    })
                    .collect()
            }
            LexType::Unknown => vec![],
        }
    }

    /// Attaches a user dictionary parsed from `rdr`, replacing any present
    /// one. Pass connection parameters via `param`; its ids must fit the
    /// connection matrix.
    pub fn user_dictionary_from_reader<R>(mut self, rdr: R, param: UserDictParam) -> Result<Self>
    where
        R: Read,
    {
        let conn = &self.data.connector;
        if usize::from(param.left_id) >= conn.num_left()
            || usize::from(param.right_id) >= conn.num_right()
            || usize::from(param.right_id_coda) >= conn.num_right()
            || usize::from(param.right_id_nocoda) >= conn.num_right()
        {
            return Err(HaneulError::invalid_argument(
                "param",
                "user-dictionary connection ids must be within the matrix",
            ));
        }
        self.data.user_dictionary = Some(UserDictionary::from_reader(rdr, param)?);
        Ok(self)
    }

    /// Removes the user dictionary.
    pub fn drop_user_dictionary(mut self) -> Self {
        self.data.user_dictionary = None;
        self
    }

    /// Serializes the whole dictionary as a cache blob.
    pub fn write<W>(&self, mut wtr: W) -> Result<usize>
    where
        W: Write,
    {
        wtr.write_all(MODEL_MAGIC)?;
        let num_bytes =
            bincode::encode_into_std_write(&self.data, &mut wtr, common::bincode_config())?;
        Ok(MODEL_MAGIC.len() + num_bytes)
    }

    /// Deserializes a dictionary written by [`Self::write`].
    pub fn read<R>(mut rdr: R) -> Result<Self>
    where
        R: Read,
    {
        let mut magic = [0; MODEL_MAGIC.len()];
        rdr.read_exact(&mut magic)?;
        if magic != MODEL_MAGIC {
            return Err(HaneulError::invalid_format(
                "model",
                "invalid magic number",
            ));
        }
        let data = bincode::decode_from_std_read(&mut rdr, common::bincode_config())?;
        Ok(Self { data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEX_CSV: &str = "\
한국,0,0,500,*,NNP,*,*,*
나라,0,0,700,*,NNG,*,*,*";
    const MATRIX_DEF: &str = "2 2\n0 0 0\n0 1 1\n1 0 2\n1 1 3";
    const CHAR_DEF: &str = "\
DEFAULT 0 0
HANGUL 0 0
0xAC00..0xD7A3 HANGUL";
    const UNK_DEF: &str = "DEFAULT,1,1,3000,SY\nHANGUL,1,1,3500,UNKNOWN";

    fn dictionary() -> Dictionary {
        Dictionary::from_readers(
            LEX_CSV.as_bytes(),
            MATRIX_DEF.as_bytes(),
            CHAR_DEF.as_bytes(),
            UNK_DEF.as_bytes(),
        )
        .unwrap()
    }

    #[test]
    fn test_model_roundtrip() {
        let dict = dictionary();
        let mut model = vec![];
        dict.write(&mut model).unwrap();
        let loaded = Dictionary::read(model.as_slice()).unwrap();
        let input: Vec<char> = "한국".chars().collect();
        let a: Vec<_> = dict.system_lexicon().common_prefix_iterator(&input).collect();
        let b: Vec<_> = loaded
            .system_lexicon()
            .common_prefix_iterator(&input)
            .collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_model_bad_magic() {
        let dict = dictionary();
        let mut model = vec![];
        dict.write(&mut model).unwrap();
        model[0] = b'x';
        assert!(Dictionary::read(model.as_slice()).is_err());
    }

    #[test]
    fn test_user_dictionary_param_bounds() {
        let dict = dictionary();
        let result = dict.user_dictionary_from_reader(
            "세종".as_bytes(),
            UserDictParam::default(), // ids far beyond the 2x2 matrix
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_user_dictionary_attach_and_drop() {
        let param = UserDictParam {
            left_id: 1,
            right_id: 1,
            right_id_coda: 1,
            right_id_nocoda: 1,
            word_cost: -100,
        };
        let dict = dictionary()
            .user_dictionary_from_reader("세종".as_bytes(), param)
            .unwrap();
        assert!(dict.user_dictionary().is_some());
        let dict = dict.drop_user_dictionary();
        assert!(dict.user_dictionary().is_none());
    }
}
