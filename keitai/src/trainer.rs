//! Module for training models.
//!
//! The costs of words and connections are estimated from a tagged corpus
//! as the weights of a conditional random field, and then baked into a dictionary.
//!
//! # Examples
//!
//! ```
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use keitai::trainer::{Corpus, Trainer, TrainerConfig};
//! use keitai::Tokenizer;
//!
//! let lexicon_csv = "東,0,0,0,名詞,ヒガシ
//! 京,0,0,0,名詞,キョウ
//! 東京,0,0,0,名詞,トウキョウ
//! 京都,0,0,0,名詞,キョウト
//! 都,0,0,0,接尾辞,ト
//! に,0,0,0,助詞,ニ
//! 行く,0,0,0,動詞,イク";
//! let char_def = "DEFAULT 0 1 0";
//! let unk_def = "DEFAULT,0,0,0,名詞,*";
//! let feature_def = "UNIGRAM word:%F[0],%F[1]
//! UNIGRAM pos:%F[0]
//! BIGRAM pos:%L[0]/pos:%R[0]";
//! let rewrite_def = "";
//!
//! // Loads configurations
//! let config = TrainerConfig::from_readers(
//!     lexicon_csv.as_bytes(),
//!     char_def.as_bytes(),
//!     unk_def.as_bytes(),
//!     feature_def.as_bytes(),
//!     rewrite_def.as_bytes(),
//! )?;
//!
//! // Initializes trainer
//! let trainer = Trainer::new(config)?.max_iter(300).num_threads(2);
//!
//! // Loads corpus
//! let corpus_txt = "東京\t名詞,トウキョウ
//! 都\t接尾辞,ト
//! に\t助詞,ニ
//! 行く\t動詞,イク
//! EOS
//! 京都\t名詞,キョウト
//! に\t助詞,ニ
//! 行く\t動詞,イク
//! EOS
//! ";
//! let corpus = Corpus::from_reader(corpus_txt.as_bytes())?;
//!
//! // Starts training
//! let model = trainer.train(corpus)?;
//!
//! // Model data
//! let mut lexicon_trained = vec![];
//! let mut connector_trained = vec![];
//! let mut unk_handler_trained = vec![];
//! model.write_dictionary(
//!     &mut lexicon_trained,
//!     &mut connector_trained,
//!     &mut unk_handler_trained,
//! )?;
//!
//! // Loads trained model
//! let dict = keitai::Dictionary::from_readers(
//!     &*lexicon_trained,
//!     &*connector_trained,
//!     char_def.as_bytes(),
//!     &*unk_handler_trained,
//! )?;
//!
//! let tokenizer = Tokenizer::new(dict);
//! let mut worker = tokenizer.new_worker();
//!
//! worker.reset_sentence("東京都に行く");
//! worker.tokenize()?;
//! let surfaces: Vec<_> = worker.token_iter().map(|t| t.surface()).collect();
//! assert_eq!(surfaces, ["東京", "都", "に", "行く"]);
//! # Ok(())
//! # }
//! ```

mod config;
mod corpus;
mod feature_extractor;
mod feature_rewriter;
mod lattice;
mod model;
mod optimizer;

use std::collections::BTreeMap;

use hashbrown::HashMap;

use crate::dictionary::{LexType, WordIdx};
use crate::errors::{KeitaiError, Result};
pub use crate::trainer::config::TrainerConfig;
pub use crate::trainer::corpus::{Corpus, Example, Word};
use crate::trainer::feature_extractor::FeatureExtractor;
use crate::trainer::feature_rewriter::FeatureRewriter;
use crate::trainer::lattice::{FeatureSet, Lattice, LatticeBuilder};
pub use crate::trainer::model::Model;
use crate::trainer::optimizer::Optimizer;
pub use crate::trainer::optimizer::{Regularization, StopHandle};
use crate::utils::{self, FromU32};

/// Number of examples whose gradients are accumulated together.
///
/// Blocks are summed in order, so the result does not depend on the number of threads.
const BLOCK_SIZE: usize = 16;

/// Trainer of morphological analyzer.
pub struct Trainer {
    config: TrainerConfig,
    max_grouping_len: Option<usize>,

    // Indexed by label. Label 0 is BOS/EOS, followed by system words,
    // unknown word entries and the virtual label.
    feature_sets: Vec<FeatureSet>,

    // Assume a dictionary word W is associated with label X and feature string F.
    // It maps F to a hash table that maps the first character of W to X.
    label_id_map: HashMap<String, HashMap<char, u32>>,

    unk_label_offset: u32,
    virtual_label: u32,

    regularization: Regularization,
    regularization_cost: f64,
    tolerance: f64,
    max_iter: u64,
    num_threads: usize,
    divergence_patience: usize,
    cost_factor: f64,
    stop_handle: StopHandle,
}

impl Trainer {
    pub(crate) fn extract_feature_set(
        feature_extractor: &mut FeatureExtractor,
        unigram_rewriter: &FeatureRewriter,
        left_rewriter: &FeatureRewriter,
        right_rewriter: &FeatureRewriter,
        feature_str: &str,
        cate_id: u32,
    ) -> Result<FeatureSet> {
        let features = utils::parse_csv_row(feature_str);
        let unigram_features = feature_extractor
            .extract_unigram_feature_ids(&unigram_rewriter.rewrite_or_clone(&features), cate_id)?;
        let left_features =
            feature_extractor.extract_left_feature_ids(&left_rewriter.rewrite_or_clone(&features))?;
        let right_features = feature_extractor
            .extract_right_feature_ids(&right_rewriter.rewrite_or_clone(&features))?;
        Ok(FeatureSet {
            unigram: unigram_features,
            left: left_features,
            right: right_features,
        })
    }

    /// Creates a new [`Trainer`] using the specified configuration.
    ///
    /// # Arguments
    ///
    ///  - `config`: Training configuration.
    ///
    /// # Errors
    ///
    /// [`KeitaiError`] is returned when the model will become too large.
    pub fn new(mut config: TrainerConfig) -> Result<Self> {
        let mut feature_sets = vec![FeatureSet::default()];
        let mut label_id_map: HashMap<String, HashMap<char, u32>> = HashMap::new();

        for word_id in 0..u32::try_from(config.surfaces.len())? {
            let word_idx = WordIdx::new(LexType::System, word_id);
            let feature_str = config.dict.system_lexicon().word_feature(word_idx);
            let first_char = config.surfaces[usize::from_u32(word_id)].chars().next();
            let cate_id = first_char.map_or(0, |c| config.dict.char_prop().char_info(c).base_id());
            let feature_set = Self::extract_feature_set(
                &mut config.feature_extractor,
                &config.unigram_rewriter,
                &config.left_rewriter,
                &config.right_rewriter,
                feature_str,
                cate_id,
            )?;
            let label = u32::try_from(feature_sets.len())?;
            feature_sets.push(feature_set);
            if let Some(first_char) = first_char {
                label_id_map
                    .entry(feature_str.to_string())
                    .or_default()
                    .entry(first_char)
                    .or_insert(label);
            }
        }

        let unk_label_offset = u32::try_from(feature_sets.len())?;
        for word_id in 0..u32::try_from(config.dict.unk_handler().len())? {
            let word_idx = WordIdx::new(LexType::Unknown, word_id);
            let feature_str = config.dict.unk_handler().word_feature(word_idx);
            let cate_id = u32::from(config.dict.unk_handler().word_cate_id(word_idx));
            let feature_set = Self::extract_feature_set(
                &mut config.feature_extractor,
                &config.unigram_rewriter,
                &config.left_rewriter,
                &config.right_rewriter,
                feature_str,
                cate_id,
            )?;
            feature_sets.push(feature_set);
        }

        let virtual_label = u32::try_from(feature_sets.len())?;
        feature_sets.push(FeatureSet::default());

        Ok(Self {
            config,
            max_grouping_len: None,
            feature_sets,
            label_id_map,
            unk_label_offset,
            virtual_label,
            regularization: Regularization::L1,
            regularization_cost: 0.01,
            tolerance: 1e-4,
            max_iter: 100,
            num_threads: 1,
            divergence_patience: 5,
            cost_factor: 700.0,
            stop_handle: StopHandle::new(),
        })
    }

    /// Changes the kind and the cost of regularization.
    ///
    /// The greater the cost, the stronger the regularization.
    /// Default to L1 with 0.01.
    ///
    /// # Panics
    ///
    /// The cost must be greater than or equal to 0.
    pub fn regularization(mut self, kind: Regularization, cost: f64) -> Self {
        assert!(cost >= 0.0);
        self.regularization = kind;
        self.regularization_cost = cost;
        self
    }

    /// Changes the cost of regularization keeping its kind.
    ///
    /// # Panics
    ///
    /// The value must be greater than or equal to 0.
    pub fn regularization_cost(self, cost: f64) -> Self {
        let kind = self.regularization;
        self.regularization(kind, cost)
    }

    /// Changes the tolerance of convergence.
    ///
    /// Default to 1e-4.
    ///
    /// # Panics
    ///
    /// The value must be positive.
    pub fn tolerance(mut self, eps: f64) -> Self {
        assert!(eps > 0.0);
        self.tolerance = eps;
        self
    }

    /// Changes the maximum number of iterations.
    ///
    /// Default to 100.
    ///
    /// # Panics
    ///
    /// The value must be positive.
    pub fn max_iter(mut self, n: u64) -> Self {
        assert!(n >= 1);
        self.max_iter = n;
        self
    }

    /// Enables multi-threading.
    ///
    /// The trained model is identical regardless of the number of threads.
    /// Default to 1.
    ///
    /// # Panics
    ///
    /// The value must be positive.
    pub fn num_threads(mut self, n: usize) -> Self {
        assert!(n >= 1);
        self.num_threads = n;
        self
    }

    /// Changes the number of consecutive iterations without decrease
    /// after which training fails.
    ///
    /// Default to 5.
    ///
    /// # Panics
    ///
    /// The value must be positive.
    pub fn divergence_patience(mut self, n: usize) -> Self {
        assert!(n >= 1);
        self.divergence_patience = n;
        self
    }

    /// Changes the factor to scale weights into integer costs.
    ///
    /// Default to 700.
    ///
    /// # Panics
    ///
    /// The value must be positive.
    pub fn cost_factor(mut self, factor: f64) -> Self {
        assert!(factor > 0.0);
        self.cost_factor = factor;
        self
    }

    /// Specifies the maximum grouping length for unknown words.
    /// By default, the length is infinity.
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

    /// Returns a handle to stop training from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop_handle.clone()
    }

    fn gold_label(&self, example: &Example, start: usize, word: &Word) -> u32 {
        let sentence = &example.sentence;
        let end = start + word.surface().chars().count();
        let lexicon = self.config.dict.system_lexicon();

        // 1. If the word is found in the dictionary, use it as it is.
        if let Some(m) = lexicon.lookup(sentence.chars(), start).into_iter().find(|m| {
            m.end_char() == end && lexicon.word_feature(m.word_idx()) == word.feature()
        }) {
            return m.word_idx().word_id + 1;
        }
        // 2. Otherwise, a word sharing the feature and the first character.
        if let Some(&label) = self
            .label_id_map
            .get(word.feature())
            .and_then(|hm| hm.get(&sentence.chars()[start]))
        {
            return label;
        }
        // 3. Otherwise, a compatible unknown word.
        if let Some(word_idx) = self.config.dict.unk_handler().compatible_unk_index(
            sentence,
            start,
            end,
            word.feature(),
        ) {
            return self.unk_label_offset + word_idx.word_id;
        }
        // 4. Otherwise, a virtual label without any features.
        tracing::debug!(
            surface = word.surface(),
            feature = word.feature(),
            "adding a virtual edge"
        );
        self.virtual_label
    }

    fn build_lattice(&self, example: &Example) -> LatticeBuilder {
        let sentence = &example.sentence;
        let input_len = sentence.len_char();
        let mut builder = LatticeBuilder::new(input_len);

        // Positive edges
        let mut pos = 0;
        for token in &example.tokens {
            let label = self.gold_label(example, pos, token);
            let end = pos + token.surface().chars().count();
            builder.add_gold(pos, end, label);
            pos = end;
        }
        debug_assert_eq!(pos, input_len);

        // Negative edges
        for start in 0..input_len {
            if !builder.is_reachable(start) {
                continue;
            }
            let mut has_matched = false;
            for m in self
                .config
                .dict
                .system_lexicon()
                .lookup(sentence.chars(), start)
            {
                has_matched = true;
                builder.add_candidate(start, m.end_char(), m.word_idx().word_id + 1);
            }
            self.config.dict.unk_handler().gen_unk_words(
                sentence,
                start,
                has_matched,
                self.max_grouping_len,
                |w| {
                    builder.add_candidate(
                        w.start_char(),
                        w.end_char(),
                        self.unk_label_offset + w.word_idx().word_id,
                    );
                },
            );
        }

        builder
    }

    /// Computes the total loss and its gradient over all lattices.
    fn evaluate(
        &self,
        lattices: &[Lattice],
        weights: &[f64],
        bigram_offset: usize,
        grad: &mut [f64],
    ) -> f64 {
        grad.fill(0.0);
        let num_blocks = lattices.len().div_ceil(BLOCK_SIZE);
        let num_threads = self.num_threads.min(num_blocks).max(1);
        let feature_sets = &self.feature_sets;

        let mut loss = 0.0;
        let (tx, rx) = crossbeam_channel::unbounded();
        std::thread::scope(|s| {
            for t in 0..num_threads {
                let tx = tx.clone();
                s.spawn(move || {
                    for b in (t..num_blocks).step_by(num_threads) {
                        let end = ((b + 1) * BLOCK_SIZE).min(lattices.len());
                        let mut block_grad = HashMap::new();
                        let mut block_loss = 0.0;
                        for lattice in &lattices[b * BLOCK_SIZE..end] {
                            block_loss += lattice.accumulate_gradient(
                                feature_sets,
                                weights,
                                bigram_offset,
                                &mut block_grad,
                            );
                        }
                        if tx.send((b, block_loss, block_grad)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(tx);

            // Sums blocks in order.
            let mut pending = BTreeMap::new();
            let mut next = 0;
            for (b, block_loss, block_grad) in rx {
                pending.insert(b, (block_loss, block_grad));
                while let Some((block_loss, block_grad)) = pending.remove(&next) {
                    loss += block_loss;
                    for (i, g) in block_grad {
                        grad[i] += g;
                    }
                    next += 1;
                }
            }
        });
        loss
    }

    /// Starts training and returns a model.
    ///
    /// Sentences without tokens are ignored.
    ///
    /// # Arguments
    ///
    ///  - `corpus`: Corpus used for training.
    ///
    /// # Errors
    ///
    ///  - [`KeitaiError::EmptyCorpus`] is returned when the corpus has no sentence to learn.
    ///  - [`KeitaiError::Divergence`] is returned when the optimization fails.
    pub fn train(self, mut corpus: Corpus) -> Result<Model> {
        let num_templates = self.config.feature_extractor.num_bigram_templates();
        let mut pair_ids = HashMap::new();
        let mut lattices = vec![];
        for example in &mut corpus.examples {
            if example.tokens.is_empty() {
                continue;
            }
            example.sentence.compile(self.config.dict.char_prop());
            let builder = self.build_lattice(example);
            lattices.push(builder.build(&self.feature_sets, num_templates, &mut pair_ids)?);
        }
        if lattices.is_empty() {
            return Err(KeitaiError::EmptyCorpus);
        }

        let num_unigram = self.config.feature_extractor.num_unigram_features();
        let dim = num_unigram + pair_ids.len();
        tracing::info!(
            num_examples = lattices.len(),
            num_unigram_weights = num_unigram,
            num_bigram_weights = pair_ids.len(),
            num_threads = self.num_threads,
            "start training"
        );

        let optimizer = Optimizer {
            regularization: self.regularization,
            cost: self.regularization_cost,
            tolerance: self.tolerance,
            max_iter: self.max_iter,
            divergence_patience: self.divergence_patience,
            stop_handle: self.stop_handle.clone(),
        };
        let weights = optimizer.minimize(vec![0.0; dim], |w, g| {
            self.evaluate(&lattices, w, num_unigram, g)
        })?;

        let mut bigram_pairs = vec![(0, 0); pair_ids.len()];
        for (pair, id) in pair_ids {
            bigram_pairs[usize::from_u32(id)] = pair;
        }

        Ok(Model::new(
            self.config,
            weights,
            num_unigram,
            bigram_pairs,
            self.cost_factor,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEXICON: &str = "東,0,0,0,名詞,ヒガシ
京,0,0,0,名詞,キョウ
東京,0,0,0,名詞,トウキョウ
京都,0,0,0,名詞,キョウト
都,0,0,0,接尾辞,ト
に,0,0,0,助詞,ニ
行く,0,0,0,動詞,イク";

    const CHAR_DEF: &str = "DEFAULT 0 1 0\nKATAKANA 1 1 0\n0x30A1..0x30FF KATAKANA";
    const UNK_DEF: &str = "DEFAULT,0,0,0,名詞,*\nKATAKANA,0,0,0,名詞,*";
    const FEATURE_DEF: &str = "UNIGRAM word:%F[0],%F[1]\nBIGRAM pos:%L[0]/pos:%R[0]";

    fn config() -> TrainerConfig {
        TrainerConfig::from_readers(
            LEXICON.as_bytes(),
            CHAR_DEF.as_bytes(),
            UNK_DEF.as_bytes(),
            FEATURE_DEF.as_bytes(),
            "".as_bytes(),
        )
        .unwrap()
    }

    fn compiled_example(trainer: &Trainer, corpus: &str) -> Example {
        let mut corpus = Corpus::from_reader(corpus.as_bytes()).unwrap();
        let mut example = corpus.examples.remove(0);
        example.sentence.compile(trainer.config.dict.char_prop());
        example
    }

    #[test]
    fn test_labels() {
        let trainer = Trainer::new(config()).unwrap();
        // BOS/EOS, 7 words, 2 unknown entries and the virtual label.
        assert_eq!(11, trainer.feature_sets.len());
        assert_eq!(8, trainer.unk_label_offset);
        assert_eq!(10, trainer.virtual_label);
    }

    #[test]
    fn test_gold_labels() {
        let trainer = Trainer::new(config()).unwrap();
        let example = compiled_example(
            &trainer,
            "東京\t名詞,トウキョウ\n都\t名詞,ミヤコ\nパリ\t名詞,パリ\nに\t接尾辞,ニ\nEOS\n",
        );
        let tokens = example.tokens();
        // 東京 is in the lexicon.
        let label = trainer.gold_label(&example, 0, &tokens[0]);
        let idx = trainer.config.surfaces.iter().position(|s| s == "東京").unwrap();
        assert_eq!(u32::try_from(idx).unwrap() + 1, label);
        // No word has the feature of 都, so it falls back to unknown.
        let label = trainer.gold_label(&example, 2, &tokens[1]);
        assert!(label >= trainer.unk_label_offset && label < trainer.virtual_label);
        // パリ is unknown.
        let label = trainer.gold_label(&example, 3, &tokens[2]);
        assert!(label >= trainer.unk_label_offset && label < trainer.virtual_label);
        // に has no compatible entry.
        let label = trainer.gold_label(&example, 5, &tokens[3]);
        assert_eq!(trainer.virtual_label, label);
    }

    #[test]
    fn test_empty_corpus() {
        let trainer = Trainer::new(config()).unwrap();
        let corpus = Corpus::from_reader("EOS\nEOS\n".as_bytes()).unwrap();
        assert!(matches!(trainer.train(corpus), Err(KeitaiError::EmptyCorpus)));
    }

    #[test]
    #[should_panic]
    fn test_negative_regularization() {
        let _ = Trainer::new(config())
            .unwrap()
            .regularization(Regularization::L2, -1.0);
    }

    #[test]
    #[should_panic]
    fn test_zero_threads() {
        let _ = Trainer::new(config()).unwrap().num_threads(0);
    }
}
