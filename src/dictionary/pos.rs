//! Part-of-speech tags of the Korean lexicon.

use std::fmt;
use std::str::FromStr;

use bincode::{Decode, Encode};

use crate::errors::{HaneulError, Result};

/// Part-of-speech tag of a single morpheme.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Hash, Decode, Encode)]
#[repr(u8)]
pub enum POSTag {
    /// Verbal ending.
    E = 0,
    /// Interjection.
    IC,
    /// Ending particle.
    J,
    /// General adverb.
    MAG,
    /// Conjunctive adverb.
    MAJ,
    /// Determiner.
    MM,
    /// General noun.
    NNG,
    /// Proper noun.
    NNP,
    /// Dependent noun.
    NNB,
    /// Dependent noun (unit of measure).
    NNBC,
    /// Pronoun.
    NP,
    /// Numeral.
    NR,
    /// Separator symbol.
    SC,
    /// Ellipsis.
    SE,
    /// Terminal punctuation.
    SF,
    /// Chinese characters.
    SH,
    /// Foreign language.
    SL,
    /// Number.
    SN,
    /// Space.
    SP,
    /// Closing bracket.
    SSC,
    /// Opening bracket.
    SSO,
    /// Other symbol.
    SY,
    /// Adjective.
    VA,
    /// Negative designator.
    VCN,
    /// Positive designator.
    VCP,
    /// Verb.
    VV,
    /// Auxiliary verb.
    VX,
    /// Prefix.
    XPN,
    /// Root.
    XR,
    /// Adjective suffix.
    XSA,
    /// Noun suffix.
    XSN,
    /// Verb suffix.
    XSV,
    /// Unknown word.
    UNKNOWN,
    /// Unknown word, analysis impossible.
    UNA,
    /// Unknown word, not applicable.
    NA,
    /// Unknown verb.
    VSV,
}

const POS_TAGS: &[(&str, POSTag)] = &[
    ("E", POSTag::E),
    ("IC", POSTag::IC),
    ("J", POSTag::J),
    ("MAG", POSTag::MAG),
    ("MAJ", POSTag::MAJ),
    ("MM", POSTag::MM),
    ("NNG", POSTag::NNG),
    ("NNP", POSTag::NNP),
    ("NNB", POSTag::NNB),
    ("NNBC", POSTag::NNBC),
    ("NP", POSTag::NP),
    ("NR", POSTag::NR),
    ("SC", POSTag::SC),
    ("SE", POSTag::SE),
    ("SF", POSTag::SF),
    ("SH", POSTag::SH),
    ("SL", POSTag::SL),
    ("SN", POSTag::SN),
    ("SP", POSTag::SP),
    ("SSC", POSTag::SSC),
    ("SSO", POSTag::SSO),
    ("SY", POSTag::SY),
    ("VA", POSTag::VA),
    ("VCN", POSTag::VCN),
    ("VCP", POSTag::VCP),
    ("VV", POSTag::VV),
    ("VX", POSTag::VX),
    ("XPN", POSTag::XPN),
    ("XR", POSTag::XR),
    ("XSA", POSTag::XSA),
    ("XSN", POSTag::XSN),
    ("XSV", POSTag::XSV),
    ("UNKNOWN", POSTag::UNKNOWN),
    ("UNA", POSTag::UNA),
    ("NA", POSTag::NA),
    ("VSV", POSTag::VSV),
];

impl POSTag {
    /// Decodes a tag from its `u8` representation.
    pub fn from_u8(v: u8) -> Option<Self> {
        POS_TAGS.iter().map(|&(_, tag)| tag).find(|&tag| tag as u8 == v)
    }

    /// The tag's name as it appears in lexicon sources.
    pub fn name(self) -> &'static str {
        POS_TAGS[self as usize].0
    }
}

impl FromStr for POSTag {
    type Err = HaneulError;

    fn from_str(s: &str) -> Result<Self> {
        POS_TAGS
            .iter()
            .find(|&&(name, _)| name == s)
            .map(|&(_, tag)| tag)
            .ok_or_else(|| {
                HaneulError::invalid_format("lex.csv", format!("undefined POS tag: {s}"))
            })
    }
}

impl fmt::Display for POSTag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How an entry decomposes into morphemes.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Decode, Encode)]
#[repr(u8)]
pub enum POSType {
    /// A single morpheme.
    Morpheme = 0,
    /// A compound noun made of concatenated parts.
    Compound,
    /// An inflected form whose parts differ from the surface.
    Inflect,
    /// A pre-analyzed decomposition.
    Preanalysis,
}

impl POSType {
    pub(crate) fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Morpheme),
            1 => Some(Self::Compound),
            2 => Some(Self::Inflect),
            3 => Some(Self::Preanalysis),
            _ => None,
        }
    }
}

impl FromStr for POSType {
    type Err = HaneulError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "*" | "Morpheme" => Ok(Self::Morpheme),
            "Compound" => Ok(Self::Compound),
            "Inflect" => Ok(Self::Inflect),
            "Preanalysis" => Ok(Self::Preanalysis),
            _ => Err(HaneulError::invalid_format(
                "lex.csv",
                format!("undefined POS type: {s}"),
            )),
        }
    }
}
