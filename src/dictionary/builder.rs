use std::io::Read;

use crate::dictionary::character::CharacterDefinition;
use crate::dictionary::connector::ConnectionCosts;
use crate::dictionary::lexicon::Lexicon;
use crate::dictionary::unknown::UnkHandler;
use crate::dictionary::{Dictionary, DictionaryInner, LexType};
use crate::errors::{HaneulError, Result};

impl Dictionary {
    /// Compiles a dictionary from its four source files:
    ///
    ///  - `lexicon_rdr`: the lexicon CSV (`lex.csv`),
    ///  - `matrix_rdr`: connection costs (`matrix.def`),
    ///  - `char_def_rdr`: character classes (`char.def`),
    ///  - `unk_rdr`: unknown-word parameters (`unk.def`).
    pub fn from_readers<L, C, D, U>(
        lexicon_rdr: L,
        matrix_rdr: C,
        char_def_rdr: D,
        unk_rdr: U,
    ) -> Result<Self>
    where
        L: Read,
        C: Read,
        D: Read,
        U: Read,
    {
        let system_lexicon = Lexicon::from_reader(lexicon_rdr, LexType::System)?;
        let connector = ConnectionCosts::from_reader(matrix_rdr)?;
        let char_def = CharacterDefinition::from_reader(char_def_rdr)?;
        let unk_handler = UnkHandler::from_reader(unk_rdr, &char_def)?;

        if !system_lexicon.verify(&connector) {
            return Err(HaneulError::invalid_format(
                "lex.csv",
                "connection ids exceed the matrix",
            ));
        }
        if !unk_handler.verify(&connector) {
            return Err(HaneulError::invalid_format(
                "unk.def",
                "connection ids exceed the matrix",
            ));
        }

        Ok(Self {
            data: DictionaryInner {
                system_lexicon,
                user_dictionary: None,
                connector,
                char_def,
                unk_handler,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MATRIX_DEF: &str = "2 2\n0 0 0\n0 1 1\n1 0 2\n1 1 3";
    const CHAR_DEF: &str = "DEFAULT 0 0\n0xAC00..0xD7A3 DEFAULT";
    const UNK_DEF: &str = "DEFAULT,1,1,3000,SY";

    #[test]
    fn test_lexicon_conn_id_out_of_bounds() {
        let lex = "한국,7,0,500,*,NNP,*,*,*";
        let result = Dictionary::from_readers(
            lex.as_bytes(),
            MATRIX_DEF.as_bytes(),
            CHAR_DEF.as_bytes(),
            UNK_DEF.as_bytes(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_unk_conn_id_out_of_bounds() {
        let lex = "한국,0,0,500,*,NNP,*,*,*";
        let unk = "DEFAULT,1,9,3000,SY";
        let result = Dictionary::from_readers(
            lex.as_bytes(),
            MATRIX_DEF.as_bytes(),
            CHAR_DEF.as_bytes(),
            unk.as_bytes(),
        );
        assert!(result.is_err());
    }
}
