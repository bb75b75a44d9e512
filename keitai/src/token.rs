//! Container of resultant tokens.
use std::ops::Range;

use crate::dictionary::{LexType, WordIdx};
use crate::tokenizer::lattice::Node;
use crate::tokenizer::worker::Worker;

/// Resultant token.
pub struct Token<'w> {
    worker: &'w Worker<'w>,
    node_idx: u32,
}

impl<'w> Token<'w> {
    #[inline(always)]
    pub(crate) const fn new(worker: &'w Worker<'w>, node_idx: u32) -> Self {
        Self { worker, node_idx }
    }

    #[inline(always)]
    fn node(&self) -> &'w Node {
        self.worker.lattice.node(self.node_idx)
    }

    /// Gets the position range of the token in characters.
    #[inline(always)]
    pub fn range_char(&self) -> Range<usize> {
        let node = self.node();
        node.start..node.end
    }

    /// Gets the position range of the token in bytes.
    #[inline(always)]
    pub fn range_byte(&self) -> Range<usize> {
        let sent = &self.worker.sent;
        let node = self.node();
        sent.byte_position(node.start)..sent.byte_position(node.end)
    }

    /// Gets the surface string of the token.
    #[inline(always)]
    pub fn surface(&self) -> &'w str {
        &self.worker.sent.raw()[self.range_byte()]
    }

    /// Gets the identifier of the word.
    #[inline(always)]
    pub fn word_idx(&self) -> WordIdx {
        // Tokens never point to BOS or EOS.
        self.node().word_idx().unwrap_or_default()
    }

    /// Gets the feature string of the token.
    #[inline(always)]
    pub fn feature(&self) -> &'w str {
        self.worker.tokenizer.dictionary().word_feature(self.word_idx())
    }

    /// Gets the lexicon type where the token is from.
    #[inline(always)]
    pub fn lex_type(&self) -> LexType {
        self.word_idx().lex_type
    }

    /// Gets the left id of the token's node.
    #[inline(always)]
    pub fn left_id(&self) -> u16 {
        self.node().left_id
    }

    /// Gets the right id of the token's node.
    #[inline(always)]
    pub fn right_id(&self) -> u16 {
        self.node().right_id
    }

    /// Gets the word cost of the token's node.
    #[inline(always)]
    pub fn word_cost(&self) -> i16 {
        self.node().word_cost
    }

    /// Gets the minimum total cost from BOS to the token's node.
    #[inline(always)]
    pub fn total_cost(&self) -> i64 {
        self.node().min_cost
    }
}

impl std::fmt::Debug for Token<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("surface", &self.surface())
            .field("range_char", &self.range_char())
            .field("range_byte", &self.range_byte())
            .field("feature", &self.feature())
            .field("lex_type", &self.lex_type())
            .field("left_id", &self.left_id())
            .field("right_id", &self.right_id())
            .field("word_cost", &self.word_cost())
            .field("total_cost", &self.total_cost())
            .finish()
    }
}

/// Iterator of tokens on a path.
pub struct TokenIter<'w> {
    worker: &'w Worker<'w>,
    nodes: &'w [u32],
    i: usize,
}

impl<'w> TokenIter<'w> {
    #[inline(always)]
    pub(crate) const fn new(worker: &'w Worker<'w>, nodes: &'w [u32]) -> Self {
        Self {
            worker,
            nodes,
            i: 0,
        }
    }
}

impl<'w> Iterator for TokenIter<'w> {
    type Item = Token<'w>;

    #[inline(always)]
    fn next(&mut self) -> Option<Self::Item> {
        let &node_idx = self.nodes.get(self.i)?;
        self.i += 1;
        Some(Token::new(self.worker, node_idx))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let rest = self.nodes.len() - self.i;
        (rest, Some(rest))
    }
}

impl ExactSizeIterator for TokenIter<'_> {}

#[cfg(test)]
mod tests {
    use crate::dictionary::*;
    use crate::tokenizer::*;

    #[test]
    fn test_iter() {
        let lexicon_csv = "自然,0,0,1,sizen
言語,0,0,4,gengo
処理,0,0,3,shori
自然言語,0,0,6,sizengengo
言語処理,0,0,5,gengoshori";
        let matrix_def = "1 1\n0 0 0";
        let char_def = "DEFAULT 0 1 0";
        let unk_def = "DEFAULT,0,0,100,*";

        let dict = Dictionary::from_readers(
            lexicon_csv.as_bytes(),
            matrix_def.as_bytes(),
            char_def.as_bytes(),
            unk_def.as_bytes(),
        )
        .unwrap();

        let tokenizer = Tokenizer::new(dict);
        let mut worker = tokenizer.new_worker();
        worker.reset_sentence("自然言語処理");
        worker.tokenize().unwrap();
        assert_eq!(worker.num_tokens(), 2);

        let mut it = worker.token_iter();
        assert_eq!(it.len(), 2);
        for i in 0..worker.num_tokens() {
            let lhs = worker.token(i);
            let rhs = it.next().unwrap();
            assert_eq!(lhs.surface(), rhs.surface());
            assert_eq!(lhs.range_byte(), rhs.range_byte());
        }
        assert!(it.next().is_none());
    }

    #[test]
    fn test_token_fields() {
        let lexicon_csv = "東京,1,2,10,名詞,固有名詞";
        let matrix_def = "3 3\n0 1 5\n2 0 7";
        let char_def = "DEFAULT 0 1 0";
        let unk_def = "DEFAULT,0,0,100,*";

        let dict = Dictionary::from_readers(
            lexicon_csv.as_bytes(),
            matrix_def.as_bytes(),
            char_def.as_bytes(),
            unk_def.as_bytes(),
        )
        .unwrap();

        let tokenizer = Tokenizer::new(dict);
        let mut worker = tokenizer.new_worker();
        worker.reset_sentence("東京");
        worker.tokenize().unwrap();
        assert_eq!(worker.num_tokens(), 1);

        let t = worker.token(0);
        assert_eq!(t.surface(), "東京");
        assert_eq!(t.range_char(), 0..2);
        assert_eq!(t.range_byte(), 0..6);
        assert_eq!(t.feature(), "名詞,固有名詞");
        assert_eq!(t.lex_type(), LexType::System);
        assert_eq!(t.left_id(), 1);
        assert_eq!(t.right_id(), 2);
        assert_eq!(t.word_cost(), 10);
        assert_eq!(t.total_cost(), 15);
    }
}
