//! Character classes driving unknown-word synthesis.

use std::io::{prelude::*, BufReader, Read, Write};

use bincode::{Decode, Encode};

use crate::errors::{HaneulError, Result};
use crate::utils;

const TABLE_LEN: usize = 1 << 16;

const STREAM_MAGIC: &[u8; 4] = b"hCHR";
const STREAM_VERSION: u32 = 1;

const FLAG_INVOKE: u8 = 1;
const FLAG_GROUP: u8 = 1 << 1;

/// Class and unknown-word flags of one character.
#[derive(Default, Clone, Copy, Eq, PartialEq, Debug)]
pub struct CharInfo {
    /// Id of the character class.
    pub class_id: u8,
    /// Synthesize unknown words at this character even when a known word
    /// matched.
    pub invoke: bool,
    /// Merge adjacent characters of the same class into one unknown word.
    pub group: bool,
}

struct CharRange {
    start: usize,
    end: usize,
    class: String,
}

/// Mapping from BMP code units to character classes, with per-class
/// invoke/group flags. Characters outside the BMP fall back to `DEFAULT`.
#[derive(Decode, Encode)]
pub struct CharacterDefinition {
    chr2class: Vec<u8>,
    class_flags: Vec<u8>,
    class_names: Vec<String>, // indexed by class id
}

impl CharacterDefinition {
    /// Looks up the class of a character.
    #[inline(always)]
    pub fn char_info(&self, c: char) -> CharInfo {
        let class_id = usize::try_from(u32::from(c))
            .ok()
            .and_then(|i| self.chr2class.get(i).copied())
            .unwrap_or(0);
        let flags = self.class_flags[usize::from(class_id)];
        CharInfo {
            class_id,
            invoke: flags & FLAG_INVOKE != 0,
            group: flags & FLAG_GROUP != 0,
        }
    }

    /// Resolves a class name to its id.
    #[inline(always)]
    pub fn class_id(&self, name: &str) -> Option<u8> {
        self.class_names
            .iter()
            .position(|n| n == name)
            .map(|id| u8::try_from(id).unwrap())
    }

    /// The name of a class id.
    #[inline(always)]
    pub fn class_name(&self, class_id: u8) -> Option<&str> {
        self.class_names
            .get(usize::from(class_id))
            .map(|n| n.as_str())
    }

    /// Number of defined classes.
    #[inline(always)]
    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }

    /// Creates a new instance from a `char.def`-style definition.
    pub fn from_reader<R>(rdr: R) -> Result<Self>
    where
        R: Read,
    {
        let mut class_names = vec!["DEFAULT".to_string()];
        let mut class_flags = vec![0];
        let mut char_ranges = vec![];

        let reader = BufReader::new(rdr);
        for line in reader.lines() {
            let line = line?;
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if line.starts_with("0x") {
                char_ranges.push(Self::parse_char_range(line)?);
            } else {
                let (class, flags) = Self::parse_char_class(line)?;
                match class_names.iter().position(|n| *n == class) {
                    Some(id) => class_flags[id] = flags,
                    None => {
                        if class_names.len() > usize::from(u8::MAX) {
                            return Err(HaneulError::invalid_format(
                                "char.def",
                                "too many character classes",
                            ));
                        }
                        class_names.push(class);
                        class_flags.push(flags);
                    }
                }
            }
        }

        let mut chr2class = vec![0; TABLE_LEN];
        for r in &char_ranges {
            let class_id = class_names
                .iter()
                .position(|n| *n == r.class)
                .ok_or_else(|| {
                    let msg = format!("undefined character class: {}", r.class);
                    HaneulError::invalid_format("char.def", msg)
                })?;
            let class_id = u8::try_from(class_id).unwrap();
            for e in chr2class.iter_mut().take(r.end).skip(r.start) {
                *e = class_id;
            }
        }

        Ok(Self {
            chr2class,
            class_flags,
            class_names,
        })
    }

    fn parse_char_class(line: &str) -> Result<(String, u8)> {
        debug_assert!(!line.is_empty());
        debug_assert!(!line.starts_with("0x"));

        let cols: Vec<_> = line.split_whitespace().collect();
        if cols.len() < 3 {
            let msg = format!(
                "A character class must consist of a name and INVOKE/GROUP flags, {line}"
            );
            return Err(HaneulError::invalid_format("char.def", msg));
        }

        let class = cols[0].to_string();
        let invoke = ["1", "0"]
            .contains(&cols[1])
            .then(|| cols[1] == "1")
            .ok_or_else(|| HaneulError::invalid_format("char.def", "INVOKE must be 1 or 0."))?;
        let group = ["1", "0"]
            .contains(&cols[2])
            .then(|| cols[2] == "1")
            .ok_or_else(|| HaneulError::invalid_format("char.def", "GROUP must be 1 or 0."))?;

        let mut flags = 0;
        if invoke {
            flags |= FLAG_INVOKE;
        }
        if group {
            flags |= FLAG_GROUP;
        }
        Ok((class, flags))
    }

    fn parse_char_range(line: &str) -> Result<CharRange> {
        debug_assert!(line.starts_with("0x"));

        let cols: Vec<_> = line.split_whitespace().collect();
        if cols.len() < 2 {
            let msg = format!("A character range must have two items at least, {line}");
            return Err(HaneulError::invalid_format("char.def", msg));
        }

        let r: Vec<_> = cols[0].split("..").collect();
        let start = usize::from_str_radix(r[0].trim_start_matches("0x"), 16)?;
        let end = if r.len() > 1 {
            usize::from_str_radix(r[1].trim_start_matches("0x"), 16)? + 1
        } else {
            start + 1
        };
        if start >= end {
            let msg =
                format!("The start of a character range must be no more than the end, {line}");
            return Err(HaneulError::invalid_format("char.def", msg));
        }
        if start > 0xFFFF || end > 0x10000 {
            let msg = format!("A character range must be no more than 0xFFFF, {line}");
            return Err(HaneulError::invalid_format("char.def", msg));
        }

        let class = cols[1].to_string();
        if class.starts_with('#') {
            let msg = format!("A character range must name a class, {line}");
            return Err(HaneulError::invalid_format("char.def", msg));
        }

        Ok(CharRange { start, end, class })
    }

    /// Serializes the table in the stream format: magic, version, class
    /// count, names, one flag byte per class, then the raw class table.
    pub fn save<W>(&self, mut wtr: W) -> Result<()>
    where
        W: Write,
    {
        wtr.write_all(STREAM_MAGIC)?;
        wtr.write_all(&STREAM_VERSION.to_le_bytes())?;
        utils::write_vu64(&mut wtr, self.class_names.len() as u64)?;
        for (name, &flags) in self.class_names.iter().zip(&self.class_flags) {
            wtr.write_all(&[u8::try_from(name.len())?])?;
            wtr.write_all(name.as_bytes())?;
            wtr.write_all(&[flags])?;
        }
        wtr.write_all(&self.chr2class)?;
        Ok(())
    }

    /// Deserializes a table written by [`Self::save`].
    pub fn load<R>(mut rdr: R) -> Result<Self>
    where
        R: Read,
    {
        let mut magic = [0; 4];
        rdr.read_exact(&mut magic)?;
        if &magic != STREAM_MAGIC {
            return Err(HaneulError::invalid_format("char.bin", "bad magic"));
        }
        let mut version = [0; 4];
        rdr.read_exact(&mut version)?;
        if u32::from_le_bytes(version) != STREAM_VERSION {
            return Err(HaneulError::invalid_format(
                "char.bin",
                format!("unsupported version: {}", u32::from_le_bytes(version)),
            ));
        }
        let num_classes = utils::read_vu64(&mut rdr)? as usize;
        let mut class_names = Vec::with_capacity(num_classes);
        let mut class_flags = Vec::with_capacity(num_classes);
        for _ in 0..num_classes {
            let mut len = [0; 1];
            rdr.read_exact(&mut len)?;
            let mut name = vec![0; usize::from(len[0])];
            rdr.read_exact(&mut name)?;
            let name = String::from_utf8(name)
                .map_err(|_| HaneulError::invalid_format("char.bin", "class name is not UTF-8"))?;
            let mut flags = [0; 1];
            rdr.read_exact(&mut flags)?;
            class_names.push(name);
            class_flags.push(flags[0]);
        }
        if class_names.is_empty() {
            return Err(HaneulError::invalid_format("char.bin", "no classes"));
        }
        let mut chr2class = vec![0; TABLE_LEN];
        rdr.read_exact(&mut chr2class)?;
        if chr2class.iter().any(|&c| usize::from(c) >= num_classes) {
            return Err(HaneulError::invalid_format(
                "char.bin",
                "class id is out of bounds",
            ));
        }
        Ok(Self {
            chr2class,
            class_flags,
            class_names,
        })
    }
}
