use crate::dictionary::character::{CharInfo, CharProperty};

/// Input text with per-character information precomputed for lattice construction.
#[derive(Default, Clone, Debug)]
pub struct Sentence {
    input: String,
    chars: Vec<char>,
    // Byte offsets of the characters followed by the input length.
    c2b: Vec<usize>,
    cinfos: Vec<CharInfo>,
    // groupable[i] is the length of the longest run starting at i
    // whose adjacent characters share a category.
    groupable: Vec<usize>,
}

impl Sentence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the text. [`Self::compile`] must be called before lookups.
    pub fn set_sentence<S>(&mut self, input: S)
    where
        S: AsRef<str>,
    {
        self.input.clear();
        self.input.push_str(input.as_ref());
        self.chars.clear();
        self.c2b.clear();
        self.cinfos.clear();
        self.groupable.clear();
    }

    pub fn compile(&mut self, char_prop: &CharProperty) {
        self.chars.clear();
        self.c2b.clear();
        self.cinfos.clear();
        for (pos_byte, c) in self.input.char_indices() {
            self.chars.push(c);
            self.c2b.push(pos_byte);
            self.cinfos.push(char_prop.char_info(c));
        }
        self.c2b.push(self.input.len());
        self.compute_groupable();
    }

    fn compute_groupable(&mut self) {
        let n = self.cinfos.len();
        self.groupable.clear();
        self.groupable.resize(n, 1);
        // Splits the text into maximal runs and counts down within each run.
        let mut run_start = 0;
        for i in 1..=n {
            let boundary =
                i == n || self.cinfos[i - 1].cate_idset() & self.cinfos[i].cate_idset() == 0;
            if boundary {
                for (j, g) in self.groupable[run_start..i].iter_mut().enumerate() {
                    *g = i - run_start - j;
                }
                run_start = i;
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
