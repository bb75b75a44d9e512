mod builder;
mod feature;
mod map;
mod param;

use bincode::{Decode, Encode};

use super::{LexType, WordIdx};
use crate::utils::FromU32;
use feature::WordFeatures;
use map::WordMap;
use param::WordParams;

pub use param::WordParam;

/// Lexicon of words.
#[derive(Decode, Encode)]
pub struct Lexicon {
    map: WordMap,
    params: WordParams,
    features: WordFeatures,
    lex_type: LexType,
}

impl Lexicon {
    /// Iterates words that are prefixes of `input` in increasing order of length.
    /// The end position is relative to the head of `input`.
    #[inline(always)]
    pub(crate) fn common_prefix_iterator<'a>(
        &'a self,
        input: &'a [char],
    ) -> impl Iterator<Item = LexMatch> + 'a {
        self.map
            .common_prefix_iterator(input)
            .map(move |(word_id, end_char)| {
                LexMatch::new(
                    WordIdx::new(self.lex_type, word_id),
                    self.params.get(usize::from_u32(word_id)),
                    end_char,
                )
            })
    }

    /// Returns every word whose surface is a prefix of `chars[offset..]`,
    /// ordered by decreasing length. Words of the same length keep their compiled order.
    /// The end positions are absolute in `chars`.
    pub fn lookup(&self, chars: &[char], offset: usize) -> Vec<LexMatch> {
        let mut matches: Vec<_> = self
            .common_prefix_iterator(&chars[offset..])
            .map(|m| LexMatch {
                end_char: offset + m.end_char,
                ..m
            })
            .collect();
        matches.sort_by(|a, b| {
            b.end_char
                .cmp(&a.end_char)
                .then(a.word_idx.word_id.cmp(&b.word_idx.word_id))
        });
        matches
    }

    #[inline(always)]
    pub(crate) fn word_param(&self, word_idx: WordIdx) -> WordParam {
        debug_assert_eq!(word_idx.lex_type, self.lex_type);
        self.params.get(usize::from_u32(word_idx.word_id))
    }

    #[inline(always)]
    pub(crate) fn word_feature(&self, word_idx: WordIdx) -> &str {
        debug_assert_eq!(word_idx.lex_type, self.lex_type);
        self.features.get(usize::from_u32(word_idx.word_id))
    }

    /// Returns the number of words.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Checks if the lexicon has no word.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A word found in a lexicon.
#[derive(Eq, PartialEq, Debug, Clone)]
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

    /// End position of the word in characters.
    #[inline(always)]
    pub const fn end_char(&self) -> usize {
        self.end_char
    }

    /// Identifier of the word.
    #[inline(always)]
    pub const fn word_idx(&self) -> WordIdx {
        self.word_idx
    }

    /// Parameters of the word.
    #[inline(always)]
    pub const fn word_param(&self) -> WordParam {
        self.word_param
    }
}

/// An entry of a raw lexicon.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct RawWordEntry {
    /// Surface string.
    pub surface: String,
    /// Context ids and emission cost.
    pub param: WordParam,
    /// Feature string.
    pub feature: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(surface: &str, cost: i16, feature: &str) -> RawWordEntry {
        RawWordEntry {
            surface: surface.to_string(),
            param: WordParam::new(0, 0, cost),
            feature: feature.to_string(),
        }
    }

    #[test]
    fn test_common_prefix_iterator() {
        let lexicon = Lexicon {
            map: WordMap::new(["東京", "東京都", "東京", "京都"]).unwrap(),
            params: WordParams::new([
                WordParam::new(1, 2, 3),
                WordParam::new(4, 5, 6),
                WordParam::new(7, 8, 9),
                WordParam::new(10, 11, 12),
            ]),
            features: WordFeatures::default(),
            lex_type: LexType::System,
        };
        let input: Vec<_> = "東京都".chars().collect();
        let mut it = lexicon.common_prefix_iterator(&input);
        assert_eq!(
            it.next().unwrap(),
            LexMatch {
                end_char: 2,
                word_idx: WordIdx::new(LexType::System, 0),
                word_param: WordParam::new(1, 2, 3),
            }
        );
        assert_eq!(
            it.next().unwrap(),
            LexMatch {
                end_char: 2,
                word_idx: WordIdx::new(LexType::System, 2),
                word_param: WordParam::new(7, 8, 9),
            }
        );
        assert_eq!(
            it.next().unwrap(),
            LexMatch {
                end_char: 3,
                word_idx: WordIdx::new(LexType::System, 1),
                word_param: WordParam::new(4, 5, 6),
            }
        );
        assert_eq!(it.next(), None);
    }

    #[test]
    fn test_lookup_order() {
        let lexicon = Lexicon::from_entries(
            vec![
                entry("東", 10, "a"),
                entry("東京", 30, "b"),
                entry("東京", 20, "c"),
                entry("京都", 5, "d"),
                entry("東京", 20, "e"),
            ],
            LexType::System,
        )
        .unwrap();
        let input: Vec<_> = "東京都".chars().collect();
        let matches = lexicon.lookup(&input, 0);
        let got: Vec<_> = matches
            .iter()
            .map(|m| (m.end_char(), lexicon.word_feature(m.word_idx())))
            .collect();
        assert_eq!(got, vec![(2, "c"), (2, "e"), (2, "b"), (1, "a")]);

        let matches = lexicon.lookup(&input, 1);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].end_char(), 3);
        assert_eq!(lexicon.word_feature(matches[0].word_idx()), "d");

        assert!(lexicon.lookup(&input, 2).is_empty());
    }
}
