mod builder;

use std::fmt;

use bincode::{Decode, Encode};

use crate::utils::FromU32;

pub(crate) const MAX_CATEGORIES: usize = CATE_IDSET_BITS;

const CATE_IDSET_BITS: usize = 18;
const CATE_IDSET_MASK: u32 = (1 << CATE_IDSET_BITS) - 1;
const BASE_ID_BITS: usize = 8;
const BASE_ID_MASK: u32 = (1 << BASE_ID_BITS) - 1;
const LENGTH_BITS: usize = 4;

/// Name of the category assigned to characters not listed in `char.def`.
pub const DEFAULT_CATEGORY: &str = "DEFAULT";

/// Information of a character defined in `char.def`.
///
/// The memory layout is
///   cate_idset = 18 bits
///      base_id =  8 bits
///       invoke =  1 bit
///        group =  1 bit
///       length =  4 bits
#[derive(Default, Clone, Copy, Eq, PartialEq, Decode, Encode)]
pub struct CharInfo(u32);

impl fmt::Debug for CharInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CharInfo")
            .field("cate_idset", &self.cate_idset())
            .field("base_id", &self.base_id())
            .field("invoke", &self.invoke())
            .field("group", &self.group())
            .field("length", &self.length())
            .finish()
    }
}

impl CharInfo {
    pub fn new(
        cate_idset: u32,
        base_id: u32,
        invoke: bool,
        group: bool,
        length: u16,
    ) -> Option<Self> {
        if cate_idset >> CATE_IDSET_BITS != 0 {
            return None;
        }
        if base_id >> BASE_ID_BITS != 0 {
            return None;
        }
        if length >> LENGTH_BITS != 0 {
            return None;
        }
        Some(Self(
            cate_idset
                | (base_id << CATE_IDSET_BITS)
                | (u32::from(invoke) << (CATE_IDSET_BITS + BASE_ID_BITS))
                | (u32::from(group) << (CATE_IDSET_BITS + BASE_ID_BITS + 1))
                | ((u32::from(length)) << (CATE_IDSET_BITS + BASE_ID_BITS + 2)),
        ))
    }

    #[inline(always)]
    pub fn reset_cate_idset(&mut self, cate_idset: u32) {
        self.0 &= !CATE_IDSET_MASK;
        self.0 |= cate_idset;
    }

    /// Bit set of all the categories the character belongs to.
    #[inline(always)]
    pub const fn cate_idset(&self) -> u32 {
        self.0 & CATE_IDSET_MASK
    }

    /// Id of the first category listed for the character.
    #[inline(always)]
    pub const fn base_id(&self) -> u32 {
        (self.0 >> CATE_IDSET_BITS) & BASE_ID_MASK
    }

    #[inline(always)]
    pub const fn invoke(&self) -> bool {
        (self.0 >> (CATE_IDSET_BITS + BASE_ID_BITS)) & 1 != 0
    }

    #[inline(always)]
    pub const fn group(&self) -> bool {
        (self.0 >> (CATE_IDSET_BITS + BASE_ID_BITS + 1)) & 1 != 0
    }

    #[inline(always)]
    pub const fn length(&self) -> u16 {
        (self.0 >> (CATE_IDSET_BITS + BASE_ID_BITS + 2)) as u16
    }
}

/// Unknown-word policy of a character category.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CharCategory<'a> {
    /// Name of the category.
    pub name: &'a str,
    /// Id of the category.
    pub id: u32,
    /// If `true`, unknown words are generated even when a lexicon word starts there.
    pub invoke: bool,
    /// If `true`, a run of characters sharing the category forms one unknown word.
    pub group: bool,
    /// Unknown words of length `1..=length` are additionally generated.
    pub length: u16,
}

/// Mapping from characters to their information.
#[derive(Clone, Decode, Encode)]
pub struct CharProperty {
    chr2inf: Vec<CharInfo>,
    default_info: CharInfo,
    // Indexed by category id.
    categories: Vec<String>,
}

impl CharProperty {
    /// Returns the packed information of `c`.
    ///
    /// Characters beyond the table fall back to the default category.
    #[inline(always)]
    pub(crate) fn char_info(&self, c: char) -> CharInfo {
        self.chr2inf
            .get(usize::from_u32(u32::from(c)))
            .copied()
            .unwrap_or(self.default_info)
    }

    /// Classifies `c` into its (first) character category.
    pub fn classify(&self, c: char) -> CharCategory<'_> {
        let cinfo = self.char_info(c);
        CharCategory {
            name: self.categories[usize::from_u32(cinfo.base_id())].as_str(),
            id: cinfo.base_id(),
            invoke: cinfo.invoke(),
            group: cinfo.group(),
            length: cinfo.length(),
        }
    }

    /// Gets the id of the category named `category`.
    #[inline(always)]
    pub fn cate_id(&self, category: &str) -> Option<u32> {
        self.categories
            .iter()
            .position(|cate| cate == category)
            .and_then(|id| u32::try_from(id).ok())
    }

    /// Gets the name of the category.
    #[inline(always)]
    pub fn cate_str(&self, cate_id: u32) -> Option<&str> {
        self.categories
            .get(usize::from_u32(cate_id))
            .map(|c| c.as_str())
    }

    /// Returns the number of categories.
    #[inline(always)]
    pub fn num_categories(&self) -> usize {
        self.categories.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        let data = "DEFAULT 0 1 0\nKANJI 0 0 2\nALPHA 1 1 0\n0x4E00..0x9FFF KANJI\n0x0041..0x005A ALPHA";
        let prop = CharProperty::from_reader(data.as_bytes()).unwrap();

        let cate = prop.classify('東');
        assert_eq!(cate.name, "KANJI");
        assert!(!cate.invoke);
        assert!(!cate.group);
        assert_eq!(cate.length, 2);

        let cate = prop.classify('A');
        assert_eq!(cate.name, "ALPHA");
        assert!(cate.invoke);
        assert!(cate.group);

        assert_eq!(prop.classify('あ').name, "DEFAULT");
    }

    #[test]
    fn test_classify_beyond_table() {
        let data = "DEFAULT 0 1 0\nKANJI 0 0 2\n0x0000 KANJI";
        let prop = CharProperty::from_reader(data.as_bytes()).unwrap();
        assert_eq!(prop.classify('\u{0}').name, "KANJI");
        assert_eq!(prop.classify('😀').name, "DEFAULT");
    }

    #[test]
    fn test_multiple_categories() {
        let data = "DEFAULT 0 1 0\nKANJI 0 0 2\nKANJINUMERIC 1 1 0\n0x4E00 KANJINUMERIC KANJI";
        let prop = CharProperty::from_reader(data.as_bytes()).unwrap();
        let cinfo = prop.char_info('一');
        let kanji = prop.cate_id("KANJI").unwrap();
        let numeric = prop.cate_id("KANJINUMERIC").unwrap();
        assert_eq!(cinfo.base_id(), numeric);
        assert_eq!(cinfo.cate_idset(), (1 << kanji) | (1 << numeric));
        assert_eq!(prop.classify('一').name, "KANJINUMERIC");
    }
}
