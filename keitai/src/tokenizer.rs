//! Viterbi-based tokenizer.
pub(crate) mod lattice;
pub(crate) mod nbest_generator;
pub mod worker;

use crate::dictionary::Dictionary;
use crate::sentence::Sentence;
use crate::tokenizer::lattice::{Lattice, NodeKind};
use crate::tokenizer::worker::Worker;

/// Tokenizer.
///
/// The dictionary is immutable after construction,
/// so a tokenizer can be shared by workers running on multiple threads.
pub struct Tokenizer {
    dict: Dictionary,
    max_grouping_len: Option<usize>,
}

impl Tokenizer {
    /// Creates a new instance.
    ///
    /// # Arguments
    ///
    ///  - `dict`: Dictionary to be used.
    pub const fn new(dict: Dictionary) -> Self {
        Self {
            dict,
            max_grouping_len: None,
        }
    }

    /// Specifies the maximum grouping length for unknown words.
    /// By default, the length is infinity.
    ///
    /// Specify `24` to obtain the same results as MeCab.
    ///
    /// # Arguments
    ///
    ///  - `max_grouping_len`: The maximum grouping length for unknown words.
    ///    The value 0 indicates the infinity length.
    pub const fn max_grouping_len(mut self, max_grouping_len: usize) -> Self {
        if max_grouping_len != 0 {
            self.max_grouping_len = Some(max_grouping_len);
        } else {
            self.max_grouping_len = None;
        }
        self
    }

    /// Gets the reference to the dictionary.
    pub const fn dictionary(&self) -> &Dictionary {
        &self.dict
    }

    /// Creates a new worker.
    pub fn new_worker(&self) -> Worker<'_> {
        Worker::new(self)
    }

    /// Fills `lattice` with the candidate words of `sent`.
    ///
    /// Positions that no word reaches are skipped.
    /// At every other position, words in the user lexicon are inserted first,
    /// then those in the system lexicon and finally unknown words.
    pub(crate) fn build_lattice(&self, sent: &Sentence, lattice: &mut Lattice) {
        lattice.reset(sent.len_char());

        for start in 0..sent.len_char() {
            if !lattice.has_previous_node(start) {
                continue;
            }
            self.add_lattice_edges(sent, lattice, start);
        }

        lattice.insert_eos();
    }

    fn add_lattice_edges(&self, sent: &Sentence, lattice: &mut Lattice, start: usize) {
        let lexicons = self
            .dict
            .user_lexicon()
            .into_iter()
            .chain([self.dict.system_lexicon()]);

        let mut has_matched = false;
        for lexicon in lexicons {
            for m in lexicon.lookup(sent.chars(), start) {
                debug_assert!(m.end_char() <= sent.len_char());
                let kind = NodeKind::Known(m.word_idx());
                lattice.insert_node(start, m.end_char(), kind, m.word_param());
                has_matched = true;
            }
        }

        let unk_handler = self.dict.unk_handler();
        unk_handler.gen_unk_words(sent, start, has_matched, self.max_grouping_len, |w| {
            let kind = NodeKind::Unknown(w.word_idx().word_id);
            lattice.insert_node(w.start_char(), w.end_char(), kind, w.word_param());
        });
    }
}
