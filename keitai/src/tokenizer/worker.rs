//! Provider of a routine for tokenization.
use crate::errors::Result;
use crate::sentence::Sentence;
use crate::token::{Token, TokenIter};
use crate::tokenizer::lattice::Lattice;
use crate::tokenizer::nbest_generator::{NbestGenerator, NbestPath};
use crate::tokenizer::Tokenizer;

/// Provider of a routine for tokenization.
///
/// It holds the internal data structures used in tokenization,
/// which can be reused to avoid unnecessary memory reallocation.
/// Any number of workers can share one [`Tokenizer`] across threads.
pub struct Worker<'t> {
    pub(crate) tokenizer: &'t Tokenizer,
    pub(crate) sent: Sentence,
    pub(crate) lattice: Lattice,
    pub(crate) top_nodes: Vec<u32>,
    pub(crate) nbest_paths: Vec<NbestPath>,
}

impl<'t> Worker<'t> {
    /// Creates a new instance.
    pub(crate) fn new(tokenizer: &'t Tokenizer) -> Self {
        Self {
            tokenizer,
            sent: Sentence::new(),
            lattice: Lattice::default(),
            top_nodes: vec![],
            nbest_paths: vec![],
        }
    }

    /// Resets the input sentence to be tokenized.
    pub fn reset_sentence<S>(&mut self, input: S)
    where
        S: AsRef<str>,
    {
        self.top_nodes.clear();
        self.nbest_paths.clear();
        self.sent.set_sentence(input);
        self.sent.compile(self.tokenizer.dictionary().char_prop());
    }

    fn build_and_decode(&mut self) -> Result<()> {
        self.tokenizer.build_lattice(&self.sent, &mut self.lattice);
        self.lattice
            .decode(self.tokenizer.dictionary().connector())
    }

    /// Tokenizes the input sentence set by [`Worker::reset_sentence`],
    /// and the results are stored in the worker.
    /// An empty sentence results in no token.
    ///
    /// # Errors
    ///
    /// [`KeitaiError::NoPath`](crate::errors::KeitaiError::NoPath) is returned
    /// when the lattice has no path, which never happens for a dictionary
    /// built through [`Dictionary`](crate::Dictionary).
    pub fn tokenize(&mut self) -> Result<()> {
        self.top_nodes.clear();
        self.build_and_decode()?;
        self.lattice.append_top_nodes(&mut self.top_nodes);
        Ok(())
    }

    /// Tokenizes the input sentence and keeps at most `n` best paths
    /// in order of non-decreasing cost.
    ///
    /// The first path is identical to the result of [`Worker::tokenize`].
    ///
    /// # Errors
    ///
    /// See [`Worker::tokenize`].
    pub fn tokenize_nbest(&mut self, n: usize) -> Result<()> {
        self.nbest_paths.clear();
        self.build_and_decode()?;
        let connector = self.tokenizer.dictionary().connector();
        self.nbest_paths
            .extend(NbestGenerator::new(&self.lattice, connector).take(n));
        Ok(())
    }

    /// Gets the number of resultant tokens.
    #[inline(always)]
    pub fn num_tokens(&self) -> usize {
        self.top_nodes.len()
    }

    /// Gets the `i`-th resultant token.
    #[inline(always)]
    pub fn token<'w>(&'w self, i: usize) -> Token<'w> {
        Token::new(self, self.top_nodes[i])
    }

    /// Creates an iterator of resultant tokens.
    #[inline(always)]
    pub fn token_iter<'w>(&'w self) -> TokenIter<'w> {
        TokenIter::new(self, &self.top_nodes)
    }

    /// Gets the number of paths kept by [`Worker::tokenize_nbest`].
    #[inline(always)]
    pub fn num_nbest_paths(&self) -> usize {
        self.nbest_paths.len()
    }

    /// Gets the total cost of the `path_idx`-th path.
    #[inline(always)]
    pub fn path_cost(&self, path_idx: usize) -> Option<i64> {
        self.nbest_paths.get(path_idx).map(|path| path.cost)
    }

    /// Creates an iterator of tokens on the `path_idx`-th path.
    pub fn nbest_token_iter<'w>(&'w self, path_idx: usize) -> Option<TokenIter<'w>> {
        self.nbest_paths
            .get(path_idx)
            .map(|path| TokenIter::new(self, &path.nodes))
    }
}
