use std::io::{BufRead, BufReader, Read};

use bincode::{
    de::Decoder,
    enc::Encoder,
    error::{DecodeError, EncodeError},
    Decode, Encode,
};

use crate::dictionary::character::CharProperty;
use crate::dictionary::connector::ConnectionMatrix;
use crate::dictionary::lexicon::{Lexicon, WordParam};
use crate::dictionary::unknown::UnkHandler;
use crate::dictionary::{Dictionary, LexType};
use crate::errors::{KeitaiError, Result};
use crate::trainer::feature_extractor::FeatureExtractor;
use crate::trainer::feature_rewriter::{FeatureRewriter, FeatureRewriterBuilder};

/// Configuration for a trainer.
///
/// It holds a dictionary whose words are the candidates of the training lattices,
/// with all of their parameters left at zero, and the feature definitions.
pub struct TrainerConfig {
    pub(crate) feature_extractor: FeatureExtractor,
    pub(crate) unigram_rewriter: FeatureRewriter,
    pub(crate) left_rewriter: FeatureRewriter,
    pub(crate) right_rewriter: FeatureRewriter,
    pub(crate) dict: Dictionary,
    // Indexed by word id of the system lexicon.
    pub(crate) surfaces: Vec<String>,
}

impl Decode for TrainerConfig {
    fn decode<D: Decoder>(decoder: &mut D) -> Result<Self, DecodeError> {
        let feature_extractor = Decode::decode(decoder)?;
        let unigram_rewriter = Decode::decode(decoder)?;
        let left_rewriter = Decode::decode(decoder)?;
        let right_rewriter = Decode::decode(decoder)?;
        let dict = Dictionary(Decode::decode(decoder)?);
        let surfaces = Decode::decode(decoder)?;
        Ok(Self {
            feature_extractor,
            unigram_rewriter,
            left_rewriter,
            right_rewriter,
            dict,
            surfaces,
        })
    }
}
bincode::impl_borrow_decode!(TrainerConfig);

impl Encode for TrainerConfig {
    fn encode<E: Encoder>(&self, encoder: &mut E) -> Result<(), EncodeError> {
        Encode::encode(&self.feature_extractor, encoder)?;
        Encode::encode(&self.unigram_rewriter, encoder)?;
        Encode::encode(&self.left_rewriter, encoder)?;
        Encode::encode(&self.right_rewriter, encoder)?;
        Encode::encode(&self.dict.0, encoder)?;
        Encode::encode(&self.surfaces, encoder)?;
        Ok(())
    }
}

/// Section of `rewrite.def`.
#[derive(Clone, Copy)]
enum RewriteSection {
    Unigram = 0,
    Left = 1,
    Right = 2,
}

impl RewriteSection {
    fn from_header(line: &str) -> Option<Self> {
        match line {
            "[unigram rewrite]" => Some(Self::Unigram),
            "[left rewrite]" => Some(Self::Left),
            "[right rewrite]" => Some(Self::Right),
            _ => None,
        }
    }
}

/// Iterates non-empty lines that are not comments with one-origin line numbers.
fn content_lines<R>(rdr: R) -> impl Iterator<Item = Result<(usize, String)>>
where
    R: Read,
{
    BufReader::new(rdr)
        .lines()
        .enumerate()
        .filter_map(|(i, line)| match line {
            Ok(line) => {
                let line = line.trim();
                (!line.is_empty() && !line.starts_with('#')).then(|| Ok((i + 1, line.to_string())))
            }
            Err(e) => Some(Err(e.into())),
        })
}

impl TrainerConfig {
    /// Parses `feature.def`, whose lines are `UNIGRAM template` or `BIGRAM left/right`.
    pub(crate) fn parse_feature_config<R>(rdr: R) -> Result<FeatureExtractor>
    where
        R: Read,
    {
        let mut unigram_templates = vec![];
        let mut bigram_templates = vec![];

        for line in content_lines(rdr) {
            let (lineno, line) = line?;
            let (kind, template) = line
                .split_once(char::is_whitespace)
                .map_or((line.as_str(), ""), |(kind, template)| (kind, template.trim()));
            match kind {
                "UNIGRAM" if !template.is_empty() => unigram_templates.push(template.to_string()),
                "BIGRAM" => match template.split('/').collect::<Vec<_>>()[..] {
                    [left, right] => bigram_templates.push((left.to_string(), right.to_string())),
                    _ => {
                        let msg = format!("A bigram template must be `left/right` at line {lineno}");
                        return Err(KeitaiError::invalid_format("feature.def", msg));
                    }
                },
                _ => {
                    let msg = format!("Invalid template at line {lineno}: {line}");
                    return Err(KeitaiError::invalid_format("feature.def", msg));
                }
            }
        }

        FeatureExtractor::new(&unigram_templates, &bigram_templates)
    }

    /// Parses `rewrite.def`, whose rules `pattern rewrite` follow section headers.
    pub(crate) fn parse_rewrite_config<R>(
        rdr: R,
    ) -> Result<(FeatureRewriter, FeatureRewriter, FeatureRewriter)>
    where
        R: Read,
    {
        let mut builders = [
            FeatureRewriterBuilder::new(),
            FeatureRewriterBuilder::new(),
            FeatureRewriterBuilder::new(),
        ];

        let mut section = None;
        for line in content_lines(rdr) {
            let (lineno, line) = line?;
            if let Some(header) = RewriteSection::from_header(&line) {
                section = Some(header);
                continue;
            }
            let Some(section) = section else {
                let msg = format!("A rule must follow a section header at line {lineno}");
                return Err(KeitaiError::invalid_format("rewrite.def", msg));
            };
            let cols: Vec<_> = line.split_ascii_whitespace().collect();
            let [pattern, rewrite] = cols.as_slice() else {
                let msg = format!("A rule must be `pattern rewrite` at line {lineno}: {line}");
                return Err(KeitaiError::invalid_format("rewrite.def", msg));
            };
            let pattern: Vec<_> = pattern.split(',').collect();
            let rewrite: Vec<_> = rewrite.split(',').collect();
            builders[section as usize].add_rule(&pattern, &rewrite);
        }

        let [unigram, left, right] = builders;
        Ok((
            FeatureRewriter::from(unigram),
            FeatureRewriter::from(left),
            FeatureRewriter::from(right),
        ))
    }

    /// Loads a training configuration from readers.
    ///
    /// Context ids and costs in the lexicon and `unk.def` are ignored,
    /// since they are estimated by the trainer.
    ///
    /// # Arguments
    ///
    ///  - `lexicon_rdr`: A reader of a lexicon file `*.csv`.
    ///  - `char_prop_rdr`: A reader of the character definition file `char.def`.
    ///  - `unk_handler_rdr`: A reader of the unknown definition file `unk.def`.
    ///  - `feature_templates_rdr`: A reader of the feature definition file `feature.def`.
    ///  - `rewrite_rules_rdr`: A reader of the rewrite definition file `rewrite.def`.
    ///
    /// # Errors
    ///
    /// [`KeitaiError`] is returned when an input format is invalid.
    pub fn from_readers<L, C, U, F, R>(
        lexicon_rdr: L,
        char_prop_rdr: C,
        unk_handler_rdr: U,
        feature_templates_rdr: F,
        rewrite_rules_rdr: R,
    ) -> Result<Self>
    where
        L: Read,
        C: Read,
        U: Read,
        F: Read,
        R: Read,
    {
        let feature_extractor = Self::parse_feature_config(feature_templates_rdr)?;
        let (unigram_rewriter, left_rewriter, right_rewriter) =
            Self::parse_rewrite_config(rewrite_rules_rdr)?;

        let mut lex_entries: Vec<_> = Lexicon::read_entries(lexicon_rdr)?
            .into_iter()
            .map(|(_, mut e)| {
                e.param = WordParam::default();
                e
            })
            .collect();
        Lexicon::sort_entries(&mut lex_entries);
        let surfaces = lex_entries.iter().map(|e| e.surface.clone()).collect();
        let system_lexicon = Lexicon::from_entries(lex_entries, LexType::System)?;

        let mut connector = ConnectionMatrix::new(1, 1);
        connector.set_cost(0, 0, 0);

        let char_prop = CharProperty::from_reader(char_prop_rdr)?;
        let unk_entries = Lexicon::read_entries(unk_handler_rdr)?
            .into_iter()
            .map(|(line, mut e)| {
                e.param = WordParam::default();
                (line, e)
            })
            .collect();
        let unk_handler = UnkHandler::from_entries(unk_entries, &char_prop)?;

        let dict = Dictionary::from_raw_parts(system_lexicon, connector, char_prop, unk_handler);

        Ok(Self {
            feature_extractor,
            unigram_rewriter,
            left_rewriter,
            right_rewriter,
            dict,
            surfaces,
        })
    }
}
