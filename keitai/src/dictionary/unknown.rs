mod builder;

use bincode::{Decode, Encode};

use super::{LexType, WordIdx};
use crate::dictionary::character::CharInfo;
use crate::dictionary::lexicon::WordParam;
use crate::sentence::Sentence;
use crate::utils::{self, FromU32};

#[derive(Default, Debug, Clone, Eq, PartialEq, Decode, Encode)]
pub struct UnkEntry {
    pub cate_id: u16,
    pub param: WordParam,
    pub feature: String,
}

/// An unknown word generated at some span of a sentence.
#[derive(Default, Debug, Clone, Eq, PartialEq)]
pub struct UnkWord {
    start_char: usize,
    end_char: usize,
    param: WordParam,
    word_id: u32,
}

impl UnkWord {
    #[inline(always)]
    pub const fn start_char(&self) -> usize {
        self.start_char
    }

    #[inline(always)]
    pub const fn end_char(&self) -> usize {
        self.end_char
    }

    #[inline(always)]
    pub const fn word_param(&self) -> WordParam {
        self.param
    }

    #[inline(always)]
    pub const fn word_idx(&self) -> WordIdx {
        WordIdx::new(LexType::Unknown, self.word_id)
    }
}

/// Handler of unknown words.
///
/// Every category defined in `char.def` has at least one entry,
/// so an unknown word can always be generated at any position.
#[derive(Decode, Encode)]
pub struct UnkHandler {
    offsets: Vec<usize>, // indexed by category id
    entries: Vec<UnkEntry>,
}

impl UnkHandler {
    /// Generates unknown words starting at `start_char` following the
    /// policy of the character category.
    ///
    /// A one-character word is generated when no word has been matched
    /// and the policy generates nothing.
    pub(crate) fn gen_unk_words<F>(
        &self,
        sent: &Sentence,
        start_char: usize,
        mut has_matched: bool,
        max_grouping_len: Option<usize>,
        mut f: F,
    ) where
        F: FnMut(UnkWord),
    {
        let cinfo = sent.char_info(start_char);
        if has_matched && !cinfo.invoke() {
            return;
        }

        let mut grouped = false;
        let groupable = sent.groupable(start_char);

        if cinfo.group() && max_grouping_len.map_or(true, |max| groupable <= max) {
            f = self.scan_entries(start_char, start_char + groupable, cinfo, f);
            grouped = true;
            has_matched = true;
        }

        for i in 1..=usize::from(cinfo.length()).min(groupable) {
            if grouped && i == groupable {
                continue;
            }
            let end_char = start_char + i;
            f = self.scan_entries(start_char, end_char, cinfo, f);
            has_matched = true;
        }

        if !has_matched {
            self.scan_entries(start_char, start_char + 1, cinfo, f);
        }
    }

    #[inline(always)]
    fn scan_entries<F>(&self, start_char: usize, end_char: usize, cinfo: CharInfo, mut f: F) -> F
    where
        F: FnMut(UnkWord),
    {
        for word_id in self.entry_range(cinfo.base_id()) {
            let e = &self.entries[word_id];
            f(UnkWord {
                start_char,
                end_char,
                param: e.param,
                word_id: word_id as u32,
            });
        }
        f
    }

    #[inline(always)]
    fn entry_range(&self, cate_id: u32) -> std::ops::Range<usize> {
        let cate_id = usize::from_u32(cate_id);
        self.offsets[cate_id]..self.offsets[cate_id + 1]
    }

    /// Finds an unknown word compatible with a tagged token spanning
    /// `start_char..end_char`.
    ///
    /// An entry is compatible when its category is that of the first character,
    /// the span does not exceed the run of same-category characters, and
    /// every column of its feature equals the token's one or is `*`.
    pub(crate) fn compatible_unk_index(
        &self,
        sent: &Sentence,
        start_char: usize,
        end_char: usize,
        feature: &str,
    ) -> Option<WordIdx> {
        if end_char - start_char > sent.groupable(start_char) {
            return None;
        }
        let cinfo = sent.char_info(start_char);
        let features = utils::parse_csv_row(feature);
        self.entry_range(cinfo.base_id()).find_map(|word_id| {
            let unk_features = utils::parse_csv_row(&self.entries[word_id].feature);
            let compatible = unk_features.len() <= features.len()
                && unk_features
                    .iter()
                    .zip(&features)
                    .all(|(u, f)| u == "*" || u == f);
            compatible.then(|| WordIdx::new(LexType::Unknown, word_id as u32))
        })
    }

    #[inline(always)]
    pub(crate) fn word_param(&self, word_idx: WordIdx) -> WordParam {
        debug_assert_eq!(word_idx.lex_type, LexType::Unknown);
        self.entries[usize::from_u32(word_idx.word_id)].param
    }

    #[inline(always)]
    pub(crate) fn word_feature(&self, word_idx: WordIdx) -> &str {
        debug_assert_eq!(word_idx.lex_type, LexType::Unknown);
        &self.entries[usize::from_u32(word_idx.word_id)].feature
    }

    #[inline(always)]
    pub(crate) fn word_cate_id(&self, word_idx: WordIdx) -> u16 {
        debug_assert_eq!(word_idx.lex_type, LexType::Unknown);
        self.entries[usize::from_u32(word_idx.word_id)].cate_id
    }

    /// Returns the number of entries.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterates the entries in id order.
    pub(crate) fn entries(&self) -> impl Iterator<Item = &UnkEntry> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::dictionary::character::CharProperty;
    use crate::dictionary::ConnectionMatrix;

    fn setup(char_def: &str, unk_def: &str) -> (CharProperty, UnkHandler) {
        let prop = CharProperty::from_reader(char_def.as_bytes()).unwrap();
        let conn = ConnectionMatrix::new(4, 4);
        let unk = UnkHandler::from_reader(unk_def.as_bytes(), &prop, &conn).unwrap();
        (prop, unk)
    }

    fn spans(unk: &UnkHandler, sent: &Sentence, start: usize, has_matched: bool) -> Vec<(usize, usize)> {
        let mut spans = vec![];
        unk.gen_unk_words(sent, start, has_matched, None, |w| {
            spans.push((w.start_char(), w.end_char()));
        });
        spans
    }

    #[test]
    fn test_group_and_length() {
        let (prop, unk) = setup(
            "DEFAULT 0 1 0\nALPHA 1 1 2\n0x0041..0x005A ALPHA",
            "DEFAULT,0,0,100,記号\nALPHA,1,1,50,名詞",
        );
        let mut sent = Sentence::new();
        sent.set_sentence("ABCD");
        sent.compile(&prop);
        assert_eq!(spans(&unk, &sent, 0, false), vec![(0, 4), (0, 1), (0, 2)]);
        // invoke is set, so words are generated even if matched.
        assert_eq!(spans(&unk, &sent, 0, true), vec![(0, 4), (0, 1), (0, 2)]);
        assert_eq!(spans(&unk, &sent, 3, false), vec![(3, 4)]);
    }

    #[test]
    fn test_no_invoke() {
        let (prop, unk) = setup(
            "DEFAULT 0 0 0\nKANJI 0 0 2\n0x4E00..0x9FFF KANJI",
            "DEFAULT,0,0,100,記号\nKANJI,2,2,50,名詞",
        );
        let mut sent = Sentence::new();
        sent.set_sentence("東京都");
        sent.compile(&prop);
        assert!(spans(&unk, &sent, 0, true).is_empty());
        assert_eq!(spans(&unk, &sent, 0, false), vec![(0, 1), (0, 2)]);
    }

    #[test]
    fn test_fallback_single_char() {
        let (prop, unk) = setup("DEFAULT 0 0 0", "DEFAULT,0,0,100,記号");
        let mut sent = Sentence::new();
        sent.set_sentence("あい");
        sent.compile(&prop);
        assert_eq!(spans(&unk, &sent, 0, false), vec![(0, 1)]);
    }

    #[test]
    fn test_max_grouping_len() {
        let (prop, unk) = setup("DEFAULT 0 1 0", "DEFAULT,0,0,100,記号");
        let mut sent = Sentence::new();
        sent.set_sentence("あいうえ");
        sent.compile(&prop);
        let mut spans = vec![];
        unk.gen_unk_words(&sent, 0, false, Some(3), |w| {
            spans.push((w.start_char(), w.end_char()));
        });
        assert_eq!(spans, vec![(0, 1)]);
    }

    #[test]
    fn test_max_grouping_len_keeps_length_words() {
        let (prop, unk) = setup(
            "DEFAULT 0 1 0\nALPHA 1 1 3\n0x0041..0x005A ALPHA",
            "DEFAULT,0,0,100,記号\nALPHA,1,1,50,名詞",
        );
        let mut sent = Sentence::new();
        sent.set_sentence("ABC");
        sent.compile(&prop);
        let mut spans = vec![];
        unk.gen_unk_words(&sent, 0, false, Some(2), |w| {
            spans.push((w.start_char(), w.end_char()));
        });
        // The run is too long to group, so the 3-char word comes from LENGTH.
        assert_eq!(spans, vec![(0, 1), (0, 2), (0, 3)]);

        let mut spans = vec![];
        unk.gen_unk_words(&sent, 0, false, Some(3), |w| {
            spans.push((w.start_char(), w.end_char()));
        });
        assert_eq!(spans, vec![(0, 3), (0, 1), (0, 2)]);
    }

    #[test]
    fn test_compatible_unk_index() {
        let (prop, unk) = setup(
            "DEFAULT 0 1 0\nALPHA 1 1 0\n0x0041..0x005A ALPHA",
            "DEFAULT,0,0,100,記号\nALPHA,1,1,50,名詞,*\nALPHA,2,2,60,動詞,*",
        );
        let mut sent = Sentence::new();
        sent.set_sentence("ABあ");
        sent.compile(&prop);
        let idx = unk.compatible_unk_index(&sent, 0, 2, "動詞,一般").unwrap();
        assert_eq!(unk.word_feature(idx), "動詞,*");
        assert!(unk.compatible_unk_index(&sent, 0, 3, "動詞,一般").is_none());
        assert!(unk.compatible_unk_index(&sent, 0, 2, "形容詞").is_none());
    }
}
