use std::io::{prelude::*, BufReader, Read};

use crate::dictionary::lexicon::{Lexicon, SurfaceFst, TargetMap, WordEntries, WordParam};
use crate::dictionary::pos::{POSTag, POSType};
use crate::dictionary::LexType;
use crate::errors::{HaneulError, Result};
use crate::fst::outputs::IntOutputs;
use crate::fst::{FstBuilder, InputType};
use crate::utils;

/// One part parsed from the expression column.
#[derive(Clone, Debug)]
pub(crate) struct RawMorpheme {
    pub tag: POSTag,
    pub surface: String,
}

/// One row of a lexicon CSV, before packing.
#[derive(Clone, Debug)]
pub(crate) struct RawLexEntry {
    pub surface: String,
    pub param: WordParam,
    pub pos_type: POSType,
    pub left_pos: POSTag,
    pub right_pos: Option<POSTag>,
    pub reading: Option<String>,
    pub morphemes: Vec<RawMorpheme>,
}

impl Lexicon {
    /// Creates a new instance from a lexicon CSV with rows
    /// `surface,left_id,right_id,cost,pos_type,left_pos,right_pos,reading,expression`,
    /// where `*` marks an absent right tag, reading, or expression.
    pub fn from_reader<R>(rdr: R, lex_type: LexType) -> Result<Self>
    where
        R: Read,
    {
        let mut rows = vec![];
        let reader = BufReader::new(rdr);
        for line in reader.lines() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            rows.push(parse_csv_entry(&line)?);
        }
        Self::from_entries(rows, lex_type)
    }

    pub(crate) fn from_entries(mut rows: Vec<RawLexEntry>, lex_type: LexType) -> Result<Self> {
        // Byte-wise order equals code-unit order for BMP-only surfaces.
        rows.sort_by(|a, b| a.surface.cmp(&b.surface));

        let mut entries = WordEntries::default();
        let mut fst_builder = FstBuilder::new(InputType::Byte2, IntOutputs);
        let mut lists: Vec<Vec<u32>> = vec![];
        let mut prev_surface: Option<&str> = None;
        let mut labels = vec![];
        for row in &rows {
            let word_id = entries.push(row)?;
            if prev_surface == Some(row.surface.as_str()) {
                lists.last_mut().expect("grouped row without a group").push(word_id);
            } else {
                labels.clear();
                for c in row.surface.chars() {
                    let unit = i32::try_from(u32::from(c)).unwrap_or(i32::MAX);
                    if !(1..=0xFFFF).contains(&unit) {
                        return Err(HaneulError::invalid_format(
                            "lex.csv",
                            format!("surface must be in the BMP: {}", row.surface),
                        ));
                    }
                    labels.push(unit);
                }
                let ordinal = lists.len() as u64;
                fst_builder.add(&labels, ordinal)?;
                lists.push(vec![word_id]);
                prev_surface = Some(row.surface.as_str());
            }
        }

        let fst = fst_builder.finish()?;
        Ok(Self {
            fst: SurfaceFst::new(fst),
            target_map: TargetMap::new(lists),
            entries,
            lex_type,
        })
    }
}

fn parse_csv_entry(line: &str) -> Result<RawLexEntry> {
    let cols = utils::parse_csv_row(line);
    if cols.len() != 9 {
        let msg = format!("A lexicon row must have nine columns, {line}");
        return Err(HaneulError::invalid_format("lex.csv", msg));
    }
    if cols[0].is_empty() {
        return Err(HaneulError::invalid_format(
            "lex.csv",
            format!("surface must not be empty, {line}"),
        ));
    }

    let pos_type: POSType = cols[4].parse()?;
    let right_pos = match cols[6].as_str() {
        "*" => None,
        s => Some(s.parse()?),
    };
    let reading = match cols[7].as_str() {
        "*" => None,
        s => Some(s.to_string()),
    };
    let morphemes = match cols[8].as_str() {
        "*" => vec![],
        s => parse_expression(s)?,
    };
    if pos_type != POSType::Morpheme && morphemes.is_empty() {
        return Err(HaneulError::invalid_format(
            "lex.csv",
            format!("a decomposed entry must have an expression, {line}"),
        ));
    }

    Ok(RawLexEntry {
        surface: cols[0].clone(),
        param: WordParam::new(cols[1].parse()?, cols[2].parse()?, cols[3].parse()?),
        pos_type,
        left_pos: cols[5].parse()?,
        right_pos,
        reading,
        morphemes,
    })
}

fn parse_expression(expr: &str) -> Result<Vec<RawMorpheme>> {
    let mut parts = vec![];
    for item in expr.split('+') {
        let (surface, tag) = item.rsplit_once('/').ok_or_else(|| {
            HaneulError::invalid_format(
                "lex.csv",
                format!("an expression item must be surface/TAG, {item}"),
            )
        })?;
        if surface.is_empty() {
            return Err(HaneulError::invalid_format(
                "lex.csv",
                format!("an expression surface must not be empty, {item}"),
            ));
        }
        parts.push(RawMorpheme {
            tag: tag.parse()?,
            surface: surface.to_string(),
        });
    }
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_surfaces_share_one_key() {
        let data = "\
밤,0,0,100,*,NNG,*,*,*
밤,0,0,200,*,NNG,*,*,*";
        let lex = Lexicon::from_reader(data.as_bytes(), LexType::System).unwrap();
        let input: Vec<char> = "밤".chars().collect();
        let matches: Vec<_> = lex.common_prefix_iterator(&input).collect();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].word_param().word_cost, 100);
        assert_eq!(matches[1].word_param().word_cost, 200);
    }

    #[test]
    fn test_unsorted_input_is_sorted() {
        let data = "\
하늘,0,0,100,*,NNG,*,*,*
가을,0,0,200,*,NNG,*,*,*";
        let lex = Lexicon::from_reader(data.as_bytes(), LexType::System).unwrap();
        for surface in ["하늘", "가을"] {
            let input: Vec<char> = surface.chars().collect();
            assert_eq!(lex.common_prefix_iterator(&input).count(), 1);
        }
    }

    #[test]
    fn test_wrong_column_count() {
        let data = "밤,0,0,100,*,NNG";
        assert!(Lexicon::from_reader(data.as_bytes(), LexType::System).is_err());
    }

    #[test]
    fn test_bad_expression() {
        let data = "밤,0,0,100,Compound,NNG,*,*,noslash";
        assert!(Lexicon::from_reader(data.as_bytes(), LexType::System).is_err());
    }

    #[test]
    fn test_missing_expression_for_compound() {
        let data = "밤,0,0,100,Compound,NNG,*,*,*";
        assert!(Lexicon::from_reader(data.as_bytes(), LexType::System).is_err());
    }

    #[test]
    fn test_quoted_surface_with_comma() {
        let data = "\"1,2-디클로로에탄\",0,0,100,*,NNG,*,*,*";
        let lex = Lexicon::from_reader(data.as_bytes(), LexType::System).unwrap();
        let input: Vec<char> = "1,2-디클로로에탄".chars().collect();
        assert_eq!(lex.common_prefix_iterator(&input).count(), 1);
    }
}
