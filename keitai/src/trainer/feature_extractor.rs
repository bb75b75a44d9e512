use std::{num::NonZeroU32, ops::Range};

use bincode::{
    de::Decoder,
    enc::Encoder,
    error::{DecodeError, EncodeError},
    Decode, Encode,
};
use hashbrown::HashMap;
use regex::Regex;

use crate::errors::{KeitaiError, Result};

#[derive(Debug, Decode, Encode)]
enum FeatureType {
    Index(usize),
    CharacterType,
}

#[derive(Debug, Decode, Encode)]
struct ParsedTemplate {
    raw_template: String,
    required_indices: Vec<usize>,
    captures: Vec<(Range<usize>, FeatureType)>,
}

impl ParsedTemplate {
    /// Parses a template with `%X[i]` (`X` is `kind`) and `%X?[i]` captures.
    /// `%t` is also captured if `char_type` is `true`.
    fn parse(raw_template: String, pattern: &Regex, char_type: bool) -> Result<Self> {
        let mut required_indices = vec![];
        let mut captures = vec![];
        for m in pattern.captures_iter(&raw_template) {
            let (Some(whole), Some(head)) = (m.get(0), m.get(1)) else {
                continue;
            };
            let range = whole.start()..whole.end();
            if head.as_str() == "t" {
                if char_type {
                    captures.push((range, FeatureType::CharacterType));
                }
                continue;
            }
            let idx: usize = m.get(2).map_or("", |idx| idx.as_str()).parse()?;
            if head.as_str().ends_with('?') {
                required_indices.push(idx);
            }
            captures.push((range, FeatureType::Index(idx)));
        }
        Ok(Self {
            raw_template,
            required_indices,
            captures,
        })
    }

    /// Expands the template, or returns `None` if a required feature is undefined.
    fn expand<S>(&self, features: &[S], category_id: u32) -> Option<String>
    where
        S: AsRef<str>,
    {
        for &required_idx in &self.required_indices {
            if features.get(required_idx).map_or("*", |f| f.as_ref()) == "*" {
                return None;
            }
        }
        let mut feature_string = String::new();
        let mut start = 0;
        for (range, feature) in &self.captures {
            feature_string.push_str(&self.raw_template[start..range.start]);
            match feature {
                FeatureType::Index(idx) => {
                    feature_string.push_str(features.get(*idx).map_or("*", |f| f.as_ref()));
                }
                FeatureType::CharacterType => {
                    feature_string.push_str(&category_id.to_string());
                }
            }
            start = range.end;
        }
        feature_string.push_str(&self.raw_template[start..]);
        Some(feature_string)
    }
}

fn template_pattern(kind: char) -> Result<Regex> {
    let pattern = if kind == 'F' {
        r"%(F\??|t)(?:\[([0-9]+)\])?".to_string()
    } else {
        format!(r"%({kind}\??)\[([0-9]+)\]")
    };
    Regex::new(&pattern).map_err(|e| KeitaiError::invalid_argument("pattern", e.to_string()))
}

/// Extractor of feature ids from feature columns of words.
///
/// Ids are assigned incrementally from 1 in order of first sight.
pub struct FeatureExtractor {
    pub(crate) unigram_feature_ids: HashMap<String, NonZeroU32>,
    pub(crate) left_feature_ids: HashMap<String, NonZeroU32>,
    pub(crate) right_feature_ids: HashMap<String, NonZeroU32>,
    unigram_templates: Vec<ParsedTemplate>,
    left_templates: Vec<ParsedTemplate>,
    right_templates: Vec<ParsedTemplate>,
}

impl FeatureExtractor {
    /// Creates a new extractor from unigram templates and pairs of left/right templates.
    ///
    /// # Errors
    ///
    /// [`KeitaiError`] is returned when an index in a template is out of range.
    pub fn new<S>(unigram_templates: &[S], bigram_templates: &[(S, S)]) -> Result<Self>
    where
        S: ToString,
    {
        let unigram_pattern = template_pattern('F')?;
        let left_pattern = template_pattern('L')?;
        let right_pattern = template_pattern('R')?;

        let mut unigram_parsed_templates = vec![];
        for template in unigram_templates {
            unigram_parsed_templates.push(ParsedTemplate::parse(
                template.to_string(),
                &unigram_pattern,
                true,
            )?);
        }

        let mut left_parsed_templates = vec![];
        let mut right_parsed_templates = vec![];
        for (left_template, right_template) in bigram_templates {
            left_parsed_templates.push(ParsedTemplate::parse(
                left_template.to_string(),
                &left_pattern,
                false,
            )?);
            right_parsed_templates.push(ParsedTemplate::parse(
                right_template.to_string(),
                &right_pattern,
                false,
            )?);
        }

        Ok(Self {
            unigram_feature_ids: HashMap::new(),
            left_feature_ids: HashMap::new(),
            right_feature_ids: HashMap::new(),
            unigram_templates: unigram_parsed_templates,
            left_templates: left_parsed_templates,
            right_templates: right_parsed_templates,
        })
    }

    /// Inserts feature patterns matched to the input templates in the hash map,
    /// while incrementally assigning new feature ids.
    /// Returns a sequence of ids of found features.
    fn extract_feature_ids<S>(
        features: &[S],
        templates: &[ParsedTemplate],
        feature_ids: &mut HashMap<String, NonZeroU32>,
        category_id: u32,
    ) -> Result<Vec<Option<NonZeroU32>>>
    where
        S: AsRef<str>,
    {
        let mut result = Vec::with_capacity(templates.len());
        for template in templates {
            let Some(feature_string) = template.expand(features, category_id) else {
                result.push(None);
                continue;
            };
            let new_id = NonZeroU32::MIN.saturating_add(u32::try_from(feature_ids.len())?);
            let feature_id = *feature_ids.entry(feature_string).or_insert(new_id);
            result.push(Some(feature_id));
        }
        Ok(result)
    }

    /// Looks up ids without registering new features.
    /// Unseen features are `None`.
    fn lookup_feature_ids<S>(
        features: &[S],
        templates: &[ParsedTemplate],
        feature_ids: &HashMap<String, NonZeroU32>,
        category_id: u32,
    ) -> Vec<Option<NonZeroU32>>
    where
        S: AsRef<str>,
    {
        templates
            .iter()
            .map(|template| {
                template
                    .expand(features, category_id)
                    .and_then(|s| feature_ids.get(&s).copied())
            })
            .collect()
    }

    pub fn extract_unigram_feature_ids<S>(
        &mut self,
        features: &[S],
        category_id: u32,
    ) -> Result<Vec<NonZeroU32>>
    where
        S: AsRef<str>,
    {
        Ok(Self::extract_feature_ids(
            features,
            &self.unigram_templates,
            &mut self.unigram_feature_ids,
            category_id,
        )?
        .into_iter()
        .flatten()
        .collect())
    }

    pub fn extract_left_feature_ids<S>(
        &mut self,
        features: &[S],
    ) -> Result<Vec<Option<NonZeroU32>>>
    where
        S: AsRef<str>,
    {
        Self::extract_feature_ids(
            features,
            &self.left_templates,
            &mut self.left_feature_ids,
            0,
        )
    }

    pub fn extract_right_feature_ids<S>(
        &mut self,
        features: &[S],
    ) -> Result<Vec<Option<NonZeroU32>>>
    where
        S: AsRef<str>,
    {
        Self::extract_feature_ids(
            features,
            &self.right_templates,
            &mut self.right_feature_ids,
            0,
        )
    }

    /// Same as [`Self::extract_unigram_feature_ids`] but skips unseen features.
    pub fn extract_unigram_feature_ids_frozen<S>(
        &self,
        features: &[S],
        category_id: u32,
    ) -> Vec<NonZeroU32>
    where
        S: AsRef<str>,
    {
        Self::lookup_feature_ids(
            features,
            &self.unigram_templates,
            &self.unigram_feature_ids,
            category_id,
        )
        .into_iter()
        .flatten()
        .collect()
    }

    /// Same as [`Self::extract_left_feature_ids`] but unseen features are `None`.
    pub fn extract_left_feature_ids_frozen<S>(&self, features: &[S]) -> Vec<Option<NonZeroU32>>
    where
        S: AsRef<str>,
    {
        Self::lookup_feature_ids(features, &self.left_templates, &self.left_feature_ids, 0)
    }

    /// Same as [`Self::extract_right_feature_ids`] but unseen features are `None`.
    pub fn extract_right_feature_ids_frozen<S>(&self, features: &[S]) -> Vec<Option<NonZeroU32>>
    where
        S: AsRef<str>,
    {
        Self::lookup_feature_ids(features, &self.right_templates, &self.right_feature_ids, 0)
    }

    /// Returns the number of unigram features seen so far.
    pub fn num_unigram_features(&self) -> usize {
        self.unigram_feature_ids.len()
    }

    /// Returns the number of bigram templates.
    pub fn num_bigram_templates(&self) -> usize {
        self.left_templates.len()
    }
}

// Maps are serialized in order of ids so that the output is reproducible.
fn sorted_by_id(map: &HashMap<String, NonZeroU32>) -> Vec<(String, NonZeroU32)> {
    let mut pairs: Vec<_> = map.iter().map(|(k, &v)| (k.clone(), v)).collect();
    pairs.sort_unstable_by_key(|&(_, v)| v);
    pairs
}

impl Decode for FeatureExtractor {
    fn decode<D: Decoder>(decoder: &mut D) -> Result<Self, DecodeError> {
        let unigram_feature_ids: Vec<(String, NonZeroU32)> = Decode::decode(decoder)?;
        let left_feature_ids: Vec<(String, NonZeroU32)> = Decode::decode(decoder)?;
        let right_feature_ids: Vec<(String, NonZeroU32)> = Decode::decode(decoder)?;
        let unigram_templates = Decode::decode(decoder)?;
        let left_templates = Decode::decode(decoder)?;
        let right_templates = Decode::decode(decoder)?;
        Ok(Self {
            unigram_feature_ids: unigram_feature_ids.into_iter().collect(),
            left_feature_ids: left_feature_ids.into_iter().collect(),
            right_feature_ids: right_feature_ids.into_iter().collect(),
            unigram_templates,
            left_templates,
            right_templates,
        })
    }
}
bincode::impl_borrow_decode!(FeatureExtractor);

impl Encode for FeatureExtractor {
    fn encode<E: Encoder>(&self, encoder: &mut E) -> Result<(), EncodeError> {
        Encode::encode(&sorted_by_id(&self.unigram_feature_ids), encoder)?;
        Encode::encode(&sorted_by_id(&self.left_feature_ids), encoder)?;
        Encode::encode(&sorted_by_id(&self.right_feature_ids), encoder)?;
        Encode::encode(&self.unigram_templates, encoder)?;
        Encode::encode(&self.left_templates, encoder)?;
        Encode::encode(&self.right_templates, encoder)?;
        Ok(())
    }
}
