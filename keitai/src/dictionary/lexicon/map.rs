pub mod posting;

use std::collections::BTreeMap;

use bincode::{
    de::Decoder,
    enc::Encoder,
    error::{DecodeError, EncodeError},
    Decode, Encode,
};

use crate::errors::{KeitaiError, Result};
use crate::utils::FromU32;
use posting::{Postings, PostingsBuilder};

/// Mapping from surfaces to word ids.
///
/// Distinct surfaces are stored in a double-array trie whose values point to
/// the lists of word ids sharing the surface.
pub struct WordMap {
    // None if no word is registered, since an empty trie cannot be built.
    trie: Option<crawdad::Trie>,
    postings: Postings,
}

impl Encode for WordMap {
    fn encode<E: Encoder>(&self, encoder: &mut E) -> Result<(), EncodeError> {
        let trie = self.trie.as_ref().map(crawdad::Trie::serialize_to_vec);
        Encode::encode(&trie, encoder)?;
        Encode::encode(&self.postings, encoder)?;
        Ok(())
    }
}

impl Decode for WordMap {
    fn decode<D: Decoder>(decoder: &mut D) -> Result<Self, DecodeError> {
        let trie: Option<Vec<u8>> = Decode::decode(decoder)?;
        let trie = trie.map(|data| crawdad::Trie::deserialize_from_slice(&data).0);
        let postings = Decode::decode(decoder)?;
        Ok(Self { trie, postings })
    }
}
bincode::impl_borrow_decode!(WordMap);

impl WordMap {
    pub fn new<I, W>(words: I) -> Result<Self>
    where
        I: IntoIterator<Item = W>,
        W: AsRef<str>,
    {
        let mut b = WordMapBuilder::new();
        for (i, w) in words.into_iter().enumerate() {
            b.add_record(w.as_ref().to_owned(), u32::try_from(i)?);
        }
        b.build()
    }

    /// Iterates `(word_id, end_char)` of words that are prefixes of `input`
    /// in increasing order of length.
    #[inline(always)]
    pub fn common_prefix_iterator<'a>(
        &'a self,
        input: &'a [char],
    ) -> impl Iterator<Item = (u32, usize)> + 'a {
        self.trie
            .iter()
            .flat_map(move |trie| trie.common_prefix_search(input.iter().copied()))
            .flat_map(move |(offset, end_char)| {
                self.postings
                    .ids(usize::from_u32(offset))
                    .map(move |word_id| (word_id, end_char))
            })
    }
}

#[derive(Default)]
pub struct WordMapBuilder {
    map: BTreeMap<String, Vec<u32>>,
}

impl WordMapBuilder {
    #[inline(always)]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn add_record(&mut self, word: String, id: u32) {
        self.map.entry(word).or_default().push(id);
    }

    pub fn build(self) -> Result<WordMap> {
        let mut records = vec![];
        let mut postings = PostingsBuilder::new();
        for (word, ids) in self.map {
            let offset = postings.push(&ids)?;
            records.push((word, u32::try_from(offset)?));
        }
        let trie = if records.is_empty() {
            None
        } else {
            let trie = crawdad::Trie::from_records(records.iter().map(|(k, v)| (k, *v)))
                .map_err(|e| KeitaiError::invalid_argument("records", e.to_string()))?;
            Some(trie)
        };
        Ok(WordMap {
            trie,
            postings: postings.build(),
        })
    }
}
