use std::io::{BufRead, BufReader, Read};

use crate::errors::{KeitaiError, Result};
use crate::sentence::Sentence;
use crate::utils;

/// Representation of a pair of a surface and features.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Word {
    surface: String,

    // Since a vector of strings consumes massive memory, a single string is stored and divided as
    // needed.
    feature: String,
}

impl Word {
    /// Creates a new instance.
    pub fn new(surface: &str, feature: &str) -> Self {
        Self {
            surface: surface.to_string(),
            feature: feature.to_string(),
        }
    }

    /// Returns a surface string.
    pub fn surface(&self) -> &str {
        &self.surface
    }

    /// Returns a concatenated feature string.
    pub fn feature(&self) -> &str {
        &self.feature
    }

    /// Returns a vector of feature strings.
    pub fn features_vec(&self) -> Vec<String> {
        utils::parse_csv_row(&self.feature)
    }
}

/// Representation of a sentence tagged with its tokens.
pub struct Example {
    pub(crate) sentence: Sentence,
    pub(crate) tokens: Vec<Word>,
}

impl Example {
    /// Returns the raw text of the sentence.
    pub fn sentence(&self) -> &str {
        self.sentence.raw()
    }

    /// Returns a slice of tokens.
    pub fn tokens(&self) -> &[Word] {
        &self.tokens
    }
}

/// Representation of a corpus.
pub struct Corpus {
    pub(crate) examples: Vec<Example>,
}

impl Corpus {
    /// Loads a corpus from the given sink.
    ///
    /// Each line is a pair of a surface and features separated by a tab,
    /// and a line `EOS` terminates a sentence. Blank lines are ignored.
    ///
    /// # Arguments
    ///
    ///  - `rdr`: A reader of the corpus.
    ///
    /// # Errors
    ///
    /// [`KeitaiError`] is returned when an input format is invalid.
    pub fn from_reader<R>(rdr: R) -> Result<Self>
    where
        R: Read,
    {
        let buf = BufReader::new(rdr);

        let mut examples = vec![];
        let mut tokens = vec![];
        for (i, line) in buf.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let mut spl = line.split('\t');
            let surface = spl.next();
            let feature = spl.next();
            let rest = spl.next();
            match (surface, feature, rest) {
                (Some(surface), Some(feature), None) if !surface.is_empty() => {
                    tokens.push(Word::new(surface, feature));
                }
                (Some("EOS"), None, None) => {
                    examples.push(Self::make_example(std::mem::take(&mut tokens)));
                }
                _ => {
                    let msg = format!(
                        "Each line must be a pair of a non-empty surface and features or `EOS`, \
                         but line {} is `{line}`",
                        i + 1
                    );
                    return Err(KeitaiError::invalid_format("corpus", msg));
                }
            }
        }
        if !tokens.is_empty() {
            examples.push(Self::make_example(tokens));
        }

        Ok(Self { examples })
    }

    fn make_example(tokens: Vec<Word>) -> Example {
        let mut sentence = Sentence::new();
        sentence.set_sentence(tokens.iter().map(|w| w.surface()).collect::<String>());
        Example { sentence, tokens }
    }

    /// Returns a slice of examples.
    pub fn examples(&self) -> &[Example] {
        &self.examples
    }

    /// Returns the number of examples.
    pub fn len(&self) -> usize {
        self.examples.len()
    }

    /// Returns `true` if the corpus has no example.
    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_corpus() {
        let corpus_data = "\
トスカーナ\t名詞,トスカーナ
地方\t名詞,チホー
に\t助詞,ニ
行く\t動詞,イク
EOS
火星\t名詞,カセー
猫\t名詞,ネコ
EOS
";

        let corpus = Corpus::from_reader(corpus_data.as_bytes()).unwrap();

        assert_eq!(2, corpus.len());

        let example1 = &corpus.examples()[0];
        assert_eq!("トスカーナ地方に行く", example1.sentence());
        assert_eq!(4, example1.tokens().len());
        assert_eq!("トスカーナ", example1.tokens()[0].surface());
        assert_eq!("名詞,トスカーナ", example1.tokens()[0].feature());
        assert_eq!("行く", example1.tokens()[3].surface());
        assert_eq!("動詞,イク", example1.tokens()[3].feature());

        let example2 = &corpus.examples()[1];
        assert_eq!("火星猫", example2.sentence());
        assert_eq!(2, example2.tokens().len());
        assert_eq!("猫", example2.tokens()[1].surface());
        assert_eq!("名詞,ネコ", example2.tokens()[1].feature());
    }

    #[test]
    fn test_trailing_sentence_and_blank_lines() {
        let corpus_data = "\
火星\t名詞,カセー

EOS

EOS
猫\t名詞,ネコ";

        let corpus = Corpus::from_reader(corpus_data.as_bytes()).unwrap();
        assert_eq!(3, corpus.len());
        assert_eq!("火星", corpus.examples()[0].sentence());
        assert!(corpus.examples()[1].tokens().is_empty());
        assert_eq!("猫", corpus.examples()[2].sentence());
    }

    #[test]
    fn test_features_vec_with_quote() {
        let corpus_data = "\
1,2-ジクロロエタン\t名詞,\"1,2-ジクロロエタン\"
EOS
";

        let corpus = Corpus::from_reader(corpus_data.as_bytes()).unwrap();

        assert_eq!(
            &["名詞", "1,2-ジクロロエタン"],
            corpus.examples()[0].tokens()[0].features_vec().as_slice()
        );
    }

    #[test]
    fn test_malformed_line() {
        let corpus_data = "火星\t名詞\tカセー\nEOS\n";
        assert!(Corpus::from_reader(corpus_data.as_bytes()).is_err());

        let corpus_data = "火星\nEOS\n";
        assert!(Corpus::from_reader(corpus_data.as_bytes()).is_err());

        let corpus_data = "\t名詞\nEOS\n";
        assert!(Corpus::from_reader(corpus_data.as_bytes()).is_err());
    }
}
