//! Accuracy evaluation of tokenization results.
//!
//! Tokens of a system output are compared with gold tokens at several levels:
//!
//!  - `0`: only the segmentation,
//!  - `n > 0`: the segmentation and the first `n` feature columns,
//!  - `-1`: the segmentation and the whole feature.
//!
//! # Examples
//!
//! ```
//! use keitai::eval::Evaluator;
//! use keitai::trainer::Corpus;
//!
//! let gold = Corpus::from_reader("東京\t名詞,固有\n都\t接尾辞,*\nEOS\n".as_bytes()).unwrap();
//! let system = Corpus::from_reader("東\t名詞,*\n京都\t名詞,固有\nEOS\n".as_bytes()).unwrap();
//!
//! let mut evaluator = Evaluator::new(&[0, 1]).unwrap();
//! evaluator.add_corpora(&system, &gold).unwrap();
//!
//! let result = &evaluator.results()[0];
//! assert_eq!(result.num_correct(), 0);
//! assert_eq!(result.num_system(), 2);
//! assert_eq!(result.num_gold(), 2);
//! ```
use std::io::Write;
use std::ops::Range;

use hashbrown::HashSet;

use crate::errors::{KeitaiError, Result};
use crate::trainer::{Corpus, Word};
use crate::utils;

/// Counts of tokens at a level.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LevelCount {
    level: i32,
    num_correct: usize,
    num_system: usize,
    num_gold: usize,
}

impl LevelCount {
    /// Returns the level.
    pub const fn level(&self) -> i32 {
        self.level
    }

    /// Returns the number of system tokens that match gold ones.
    pub const fn num_correct(&self) -> usize {
        self.num_correct
    }

    /// Returns the number of system tokens.
    pub const fn num_system(&self) -> usize {
        self.num_system
    }

    /// Returns the number of gold tokens.
    pub const fn num_gold(&self) -> usize {
        self.num_gold
    }

    /// Returns the precision, or 0 if there is no system token.
    pub fn precision(&self) -> f64 {
        ratio(self.num_correct, self.num_system)
    }

    /// Returns the recall, or 0 if there is no gold token.
    pub fn recall(&self) -> f64 {
        ratio(self.num_correct, self.num_gold)
    }

    /// Returns the harmonic mean of the precision and the recall.
    pub fn f_score(&self) -> f64 {
        let (p, r) = (self.precision(), self.recall());
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn ratio(a: usize, b: usize) -> f64 {
    if b == 0 {
        0.0
    } else {
        a as f64 / b as f64
    }
}

/// Evaluator accumulating counts over sentences.
pub struct Evaluator {
    counts: Vec<LevelCount>,
}

impl Evaluator {
    /// Creates a new evaluator for the given levels.
    ///
    /// # Errors
    ///
    /// [`KeitaiError`] is returned when no level is given or a level is less than `-1`.
    pub fn new(levels: &[i32]) -> Result<Self> {
        if levels.is_empty() {
            return Err(KeitaiError::invalid_argument(
                "levels",
                "At least one level must be given.",
            ));
        }
        if let Some(level) = levels.iter().find(|&&l| l < -1) {
            return Err(KeitaiError::invalid_argument(
                "levels",
                format!("A level must be -1 or more, but got {level}"),
            ));
        }
        let counts = levels
            .iter()
            .map(|&level| LevelCount {
                level,
                num_correct: 0,
                num_system: 0,
                num_gold: 0,
            })
            .collect();
        Ok(Self { counts })
    }

    fn keys(words: &[Word], level: i32) -> HashSet<(Range<usize>, String)> {
        let mut keys = HashSet::new();
        let mut start = 0;
        for word in words {
            let end = start + word.surface().chars().count();
            let key = match usize::try_from(level) {
                Ok(0) => String::new(),
                Ok(n) => {
                    let features = word.features_vec();
                    utils::join_csv_row(features.iter().take(n).map(String::as_str))
                }
                Err(_) => word.feature().to_string(),
            };
            keys.insert((start..end, key));
            start = end;
        }
        keys
    }

    /// Adds a pair of tokenizations of a sentence.
    ///
    /// # Errors
    ///
    /// [`KeitaiError`] is returned when the surfaces do not form the same sentence.
    pub fn add_words(&mut self, system: &[Word], gold: &[Word]) -> Result<()> {
        let system_sent: String = system.iter().map(Word::surface).collect();
        let gold_sent: String = gold.iter().map(Word::surface).collect();
        if system_sent != gold_sent {
            return Err(KeitaiError::invalid_argument(
                "system",
                format!("The sentences mismatch: {system_sent} and {gold_sent}"),
            ));
        }
        for count in &mut self.counts {
            let system_keys = Self::keys(system, count.level);
            let gold_keys = Self::keys(gold, count.level);
            count.num_correct += system_keys.intersection(&gold_keys).count();
            count.num_system += system_keys.len();
            count.num_gold += gold_keys.len();
        }
        Ok(())
    }

    /// Adds all sentences of corpora in the same order.
    ///
    /// # Errors
    ///
    /// [`KeitaiError`] is returned when the numbers of sentences differ
    /// or a pair of sentences mismatches.
    pub fn add_corpora(&mut self, system: &Corpus, gold: &Corpus) -> Result<()> {
        if system.len() != gold.len() {
            return Err(KeitaiError::invalid_argument(
                "system",
                format!(
                    "The numbers of sentences mismatch: {} and {}",
                    system.len(),
                    gold.len()
                ),
            ));
        }
        for (s, g) in system.examples().iter().zip(gold.examples()) {
            self.add_words(s.tokens(), g.tokens())?;
        }
        Ok(())
    }

    /// Returns the counts in the order of the given levels.
    pub fn results(&self) -> &[LevelCount] {
        &self.counts
    }

    /// Writes a report with percentages.
    ///
    /// # Errors
    ///
    /// [`KeitaiError`] is returned when the writing fails.
    pub fn write_report<W>(&self, mut wtr: W) -> Result<()>
    where
        W: Write,
    {
        writeln!(wtr, "              precision          recall         F")?;
        for count in &self.counts {
            if count.level == -1 {
                write!(wtr, "LEVEL ALL: ")?;
            } else {
                write!(wtr, "LEVEL {}: ", count.level)?;
            }
            writeln!(
                wtr,
                "{:.4}({}/{}) {:.4}({}/{}) {:.4}",
                count.precision() * 100.0,
                count.num_correct,
                count.num_system,
                count.recall() * 100.0,
                count.num_correct,
                count.num_gold,
                count.f_score() * 100.0,
            )?;
        }
        Ok(())
    }
}
