use crate::dictionary::character::{CharInfo, CharacterDefinition};

/// Input text prepared for tokenization: characters, byte offsets, and
/// per-character class information.
#[derive(Default, Clone, Debug)]
pub struct Sentence {
    input: String,
    chars: Vec<char>,
    c2b: Vec<usize>,
    cinfos: Vec<CharInfo>,
    groupable: Vec<usize>,
}

impl Sentence {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn clear(&mut self) {
        self.input.clear();
        self.chars.clear();
        self.c2b.clear();
        self.cinfos.clear();
        self.groupable.clear();
    }

    pub fn set_sentence<S>(&mut self, input: S)
    where
        S: AsRef<str>,
    {
        self.clear();
        self.input.push_str(input.as_ref());
    }

    pub fn compile(&mut self, char_def: &CharacterDefinition) {
        self.compute_basic();
        self.compute_categories(char_def);
        self.compute_groupable();
    }

    fn compute_basic(&mut self) {
        for (bi, ch) in self.input.char_indices() {
            self.chars.push(ch);
            self.c2b.push(bi);
        }
        self.c2b.push(self.input.len());
    }

    fn compute_categories(&mut self, char_def: &CharacterDefinition) {
        self.cinfos.reserve(self.chars.len());
        for &c in &self.chars {
            self.cinfos.push(char_def.char_info(c));
        }
    }

    // groupable[i] = length of the same-class run starting at i.
    fn compute_groupable(&mut self) {
        debug_assert_eq!(self.chars.len(), self.cinfos.len());

        self.groupable.resize(self.chars.len(), 1);
        for i in (1..self.chars.len()).rev() {
            if self.cinfos[i - 1].class_id == self.cinfos[i].class_id {
                self.groupable[i - 1] = self.groupable[i] + 1;
            }
        }
    }

    #[inline(always)]
    pub fn raw(&self) -> &str {
        &self.input
    }

    #[inline(always)]
    pub fn chars(&self) -> &[char] {
        &self.chars
    }

    #[inline(always)]
    pub fn len_char(&self) -> usize {
        self.chars.len()
    }

    #[inline(always)]
    pub fn byte_position(&self, pos_char: usize) -> usize {
        self.c2b[pos_char]
    }

    #[inline(always)]
    pub fn char_info(&self, pos_char: usize) -> CharInfo {
        self.cinfos[pos_char]
    }

    #[inline(always)]
    pub fn groupable(&self, pos_char: usize) -> usize {
        self.groupable[pos_char]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHAR_DEF: &str = "\
DEFAULT 0 0
NUMERIC 1 1
HANGUL 0 0
0x0030..0x0039 NUMERIC
0xAC00..0xD7A3 HANGUL";

    #[test]
    fn test_byte_positions() {
        let mut sent = Sentence::new();
        sent.set_sentence("한국a");
        let char_def = CharacterDefinition::from_reader(CHAR_DEF.as_bytes()).unwrap();
        sent.compile(&char_def);
        assert_eq!(sent.chars(), &['한', '국', 'a']);
        assert_eq!(sent.byte_position(0), 0);
        assert_eq!(sent.byte_position(1), 3);
        assert_eq!(sent.byte_position(2), 6);
        assert_eq!(sent.byte_position(3), 7);
    }

    #[test]
    fn test_groupable_runs() {
        let mut sent = Sentence::new();
        sent.set_sentence("2018년10월");
        let char_def = CharacterDefinition::from_reader(CHAR_DEF.as_bytes()).unwrap();
        sent.compile(&char_def);
        assert_eq!(sent.groupable(0), 4);
        assert_eq!(sent.groupable(3), 1);
        assert_eq!(sent.groupable(4), 1);
        assert_eq!(sent.groupable(5), 2);
    }
}
