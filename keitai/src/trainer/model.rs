use std::collections::BTreeSet;
use std::io::{BufWriter, Read, Write};

use bincode::{Decode, Encode};
use hashbrown::HashMap;

use crate::common;
use crate::dictionary::character::CharProperty;
use crate::dictionary::connector::ConnectionMatrix;
use crate::dictionary::lexicon::{Lexicon, RawWordEntry};
use crate::dictionary::unknown::UnkHandler;
use crate::dictionary::word_idx::WordIdx;
use crate::dictionary::{Dictionary, LexType, WordParam};
use crate::errors::{KeitaiError, Result};
use crate::trainer::config::TrainerConfig;
use crate::trainer::corpus::Word;
use crate::utils::{self, FromU32};

/// Magic bytes identifying a model of this version.
const MODEL_MAGIC: &[u8] = b"KeitaiModel 0.1\n";

/// Weights beyond this cost are clamped.
const MAX_COST: f64 = 32767.0;

fn sorted_contexts(keys: &[String]) -> Vec<String> {
    let set: BTreeSet<_> = keys.iter().cloned().collect();
    set.into_iter().collect()
}

#[derive(Decode, Encode)]
pub(crate) struct ModelData {
    pub config: TrainerConfig,
    // Unigram weights followed by bigram weights.
    pub weights: Vec<f64>,
    pub num_unigram: usize,
    // Pairs of right and left feature ids indexed by bigram weight.
    pub bigram_pairs: Vec<(u32, u32)>,
    pub cost_factor: f64,
}

/// Context classes and word parameters computed from weights.
struct BakedModel {
    system_params: Vec<WordParam>,
    unk_params: Vec<WordParam>,
    user_params: Vec<WordParam>,
    // Indexed by context id minus one.
    left_contexts: Vec<String>,
    right_contexts: Vec<String>,
    matrix: ConnectionMatrix,
}

/// Model trained by [`Trainer`](crate::trainer::Trainer).
pub struct Model {
    pub(crate) data: ModelData,
    pub(crate) user_entries: Vec<(Word, WordParam)>,
}

impl Model {
    pub(crate) fn new(
        config: TrainerConfig,
        weights: Vec<f64>,
        num_unigram: usize,
        bigram_pairs: Vec<(u32, u32)>,
        cost_factor: f64,
    ) -> Self {
        Self {
            data: ModelData {
                config,
                weights,
                num_unigram,
                bigram_pairs,
                cost_factor,
            },
            user_entries: vec![],
        }
    }

    /// Returns the number of non-zero weights.
    pub fn num_active_weights(&self) -> usize {
        self.data.weights.iter().filter(|&&w| w != 0.0).count()
    }

    /// Reads the user-defined lexicon file.
    ///
    /// If you want to assign parameters to the user-defined lexicon file, you need to call this
    /// function before exporting the dictionary. The model overwrites the parameter only when it
    /// is `0,0,0`. Otherwise, the parameter is used as is.
    ///
    /// # Arguments
    ///
    ///  - `rdr`: A reader of the user-defined lexicon file.
    ///
    /// # Errors
    ///
    /// [`KeitaiError`] is returned when the reading fails.
    pub fn read_user_lexicon<R>(&mut self, rdr: R) -> Result<()>
    where
        R: Read,
    {
        for (_, entry) in Lexicon::read_entries(rdr)? {
            self.user_entries
                .push((Word::new(&entry.surface, &entry.feature), entry.param));
        }
        Ok(())
    }

    fn unigram_score(&self, features: &[String], cate_id: u32) -> f64 {
        let config = &self.data.config;
        let rewritten = config.unigram_rewriter.rewrite_or_clone(features);
        config
            .feature_extractor
            .extract_unigram_feature_ids_frozen(&rewritten, cate_id)
            .into_iter()
            .map(|id| self.data.weights[usize::from_u32(id.get()) - 1])
            .sum()
    }

    fn left_context(&self, features: &[String]) -> String {
        let rewritten = self.data.config.left_rewriter.rewrite_or_clone(features);
        utils::join_csv_row(rewritten.iter().map(String::as_str))
    }

    fn right_context(&self, features: &[String]) -> String {
        let rewritten = self.data.config.right_rewriter.rewrite_or_clone(features);
        utils::join_csv_row(rewritten.iter().map(String::as_str))
    }

    fn to_cost(&self, score: f64) -> i16 {
        // NaN is mapped to zero by the cast.
        (-self.data.cost_factor * score).round().clamp(-MAX_COST, MAX_COST) as i16
    }

    /// Computes word costs, context ids and the connection matrix.
    fn bake(&self) -> Result<BakedModel> {
        let config = &self.data.config;
        let char_prop = config.dict.char_prop();

        // (features, category id) of each word to be scored.
        let mut words = vec![];
        for (i, surface) in config.surfaces.iter().enumerate() {
            let word_idx = WordIdx::new(LexType::System, u32::try_from(i)?);
            let feature = config.dict.system_lexicon().word_feature(word_idx);
            let cate_id = surface
                .chars()
                .next()
                .map_or(0, |c| char_prop.char_info(c).base_id());
            words.push((utils::parse_csv_row(feature), cate_id));
        }
        let num_system = words.len();
        for i in 0..config.dict.unk_handler().len() {
            let word_idx = WordIdx::new(LexType::Unknown, u32::try_from(i)?);
            let feature = config.dict.unk_handler().word_feature(word_idx);
            let cate_id = u32::from(config.dict.unk_handler().word_cate_id(word_idx));
            words.push((utils::parse_csv_row(feature), cate_id));
        }
        let num_unk = words.len() - num_system;
        let mut estimated_users = vec![];
        for (i, (word, param)) in self.user_entries.iter().enumerate() {
            if *param == WordParam::default() {
                let cate_id = word
                    .surface()
                    .chars()
                    .next()
                    .map_or(0, |c| char_prop.char_info(c).base_id());
                words.push((word.features_vec(), cate_id));
                estimated_users.push(i);
            }
        }

        let lefts: Vec<_> = words.iter().map(|(f, _)| self.left_context(f)).collect();
        let rights: Vec<_> = words.iter().map(|(f, _)| self.right_context(f)).collect();
        let left_contexts = sorted_contexts(&lefts);
        let right_contexts = sorted_contexts(&rights);
        let max_contexts = usize::from(u16::MAX) - 1;
        if left_contexts.len() > max_contexts || right_contexts.len() > max_contexts {
            return Err(KeitaiError::invalid_argument(
                "model",
                format!(
                    "Too many context classes: {} left and {} right",
                    left_contexts.len(),
                    right_contexts.len()
                ),
            ));
        }
        let context_id = |contexts: &[String], key: &str| -> Result<u16> {
            // Every key is in the set.
            let pos = contexts.binary_search_by(|c| c.as_str().cmp(key)).unwrap_or(0);
            Ok(u16::try_from(pos + 1)?)
        };

        let mut params = Vec::with_capacity(words.len());
        for (i, (features, cate_id)) in words.iter().enumerate() {
            params.push(WordParam::new(
                context_id(&left_contexts, &lefts[i])?,
                context_id(&right_contexts, &rights[i])?,
                self.to_cost(self.unigram_score(features, *cate_id)),
            ));
        }

        let mut user_params: Vec<_> = self.user_entries.iter().map(|(_, p)| *p).collect();
        for (&i, &param) in estimated_users.iter().zip(&params[num_system + num_unk..]) {
            user_params[i] = param;
        }
        let unk_params = params[num_system..num_system + num_unk].to_vec();
        params.truncate(num_system);

        let matrix = self.bake_matrix(&left_contexts, &right_contexts)?;

        Ok(BakedModel {
            system_params: params,
            unk_params,
            user_params,
            left_contexts,
            right_contexts,
            matrix,
        })
    }

    fn bake_matrix(
        &self,
        left_contexts: &[String],
        right_contexts: &[String],
    ) -> Result<ConnectionMatrix> {
        let extractor = &self.data.config.feature_extractor;
        let num_templates = extractor.num_bigram_templates();
        let pair_ids: HashMap<(u32, u32), usize> = self
            .data
            .bigram_pairs
            .iter()
            .enumerate()
            .map(|(i, &pair)| (pair, i))
            .collect();

        // BOS/EOS has the feature id 0 for every template.
        let mut right_ids = vec![vec![Some(0); num_templates]];
        for c in right_contexts {
            let ids = extractor.extract_right_feature_ids_frozen(&utils::parse_csv_row(c));
            right_ids.push(ids.into_iter().map(|id| id.map(|id| id.get())).collect());
        }
        let mut left_ids = vec![vec![Some(0); num_templates]];
        for c in left_contexts {
            let ids = extractor.extract_left_feature_ids_frozen(&utils::parse_csv_row(c));
            left_ids.push(ids.into_iter().map(|id| id.map(|id| id.get())).collect());
        }

        let mut matrix = ConnectionMatrix::new(right_ids.len(), left_ids.len());
        for (right_id, rs) in right_ids.iter().enumerate() {
            for (left_id, ls) in left_ids.iter().enumerate() {
                let score: f64 = rs
                    .iter()
                    .zip(ls)
                    .filter_map(|(r, l)| pair_ids.get(&((*r)?, (*l)?)))
                    .map(|&i| self.data.weights[self.data.num_unigram + i])
                    .sum();
                matrix.set_cost(
                    u16::try_from(right_id)?,
                    u16::try_from(left_id)?,
                    self.to_cost(score),
                );
            }
        }
        Ok(matrix)
    }

    fn unk_category<'a>(
        char_prop: &'a CharProperty,
        unk: &UnkHandler,
        i: usize,
    ) -> Result<&'a str> {
        let word_idx = WordIdx::new(LexType::Unknown, u32::try_from(i)?);
        let cate_id = u32::from(unk.word_cate_id(word_idx));
        char_prop.cate_str(cate_id).ok_or_else(|| {
            KeitaiError::invalid_format("unk.def", format!("Undefined category id: {cate_id}"))
        })
    }

    /// Writes the dictionary in the MeCab format.
    ///
    /// # Arguments
    ///
    ///  - `lexicon_wtr`: A writer targetting `lex.csv`.
    ///  - `connector_wtr`: A writer targetting `matrix.def`.
    ///  - `unk_handler_wtr`: A writer targetting `unk.def`.
    ///
    /// # Errors
    ///
    /// [`KeitaiError`] is returned when the model has too many context classes
    /// or the writing fails.
    pub fn write_dictionary<L, C, U>(
        &self,
        lexicon_wtr: L,
        connector_wtr: C,
        unk_handler_wtr: U,
    ) -> Result<()>
    where
        L: Write,
        C: Write,
        U: Write,
    {
        let baked = self.bake()?;
        let config = &self.data.config;

        let mut lexicon_wtr = BufWriter::new(lexicon_wtr);
        for (i, (surface, param)) in config.surfaces.iter().zip(&baked.system_params).enumerate() {
            let word_idx = WordIdx::new(LexType::System, u32::try_from(i)?);
            let feature = config.dict.system_lexicon().word_feature(word_idx);
            utils::quote_csv_cell(&mut lexicon_wtr, surface.as_bytes())?;
            writeln!(
                &mut lexicon_wtr,
                ",{},{},{},{feature}",
                param.left_id, param.right_id, param.word_cost,
            )?;
        }
        lexicon_wtr.flush()?;

        let mut connector_wtr = BufWriter::new(connector_wtr);
        let matrix = &baked.matrix;
        writeln!(&mut connector_wtr, "{} {}", matrix.num_right(), matrix.num_left())?;
        for right_id in 0..u16::try_from(matrix.num_right())? {
            for left_id in 0..u16::try_from(matrix.num_left())? {
                writeln!(
                    &mut connector_wtr,
                    "{right_id} {left_id} {}",
                    matrix.cost(right_id, left_id)
                )?;
            }
        }
        connector_wtr.flush()?;

        let mut unk_handler_wtr = BufWriter::new(unk_handler_wtr);
        let unk = config.dict.unk_handler();
        for (i, param) in baked.unk_params.iter().enumerate() {
            let cate = Self::unk_category(config.dict.char_prop(), unk, i)?;
            let feature = unk.word_feature(WordIdx::new(LexType::Unknown, u32::try_from(i)?));
            writeln!(
                &mut unk_handler_wtr,
                "{cate},{},{},{},{feature}",
                param.left_id, param.right_id, param.word_cost,
            )?;
        }
        unk_handler_wtr.flush()?;

        Ok(())
    }

    /// Writes the user-defined lexicon with estimated parameters.
    ///
    /// # Errors
    ///
    /// [`KeitaiError`] is returned when the writing fails.
    pub fn write_user_lexicon<W>(&self, wtr: W) -> Result<()>
    where
        W: Write,
    {
        let baked = self.bake()?;
        let mut wtr = BufWriter::new(wtr);
        for ((word, _), param) in self.user_entries.iter().zip(&baked.user_params) {
            utils::quote_csv_cell(&mut wtr, word.surface().as_bytes())?;
            writeln!(
                &mut wtr,
                ",{},{},{},{}",
                param.left_id,
                param.right_id,
                param.word_cost,
                word.feature(),
            )?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Writes the relation between context ids and rewritten features.
    ///
    /// The id 0 is reserved for BOS/EOS.
    ///
    /// # Arguments
    ///
    ///  - `left_wtr`: A writer targetting `left-id.def`.
    ///  - `right_wtr`: A writer targetting `right-id.def`.
    ///
    /// # Errors
    ///
    /// [`KeitaiError`] is returned when the writing fails.
    pub fn write_context_ids<L, R>(&self, left_wtr: L, right_wtr: R) -> Result<()>
    where
        L: Write,
        R: Write,
    {
        let baked = self.bake()?;
        Self::write_contexts(left_wtr, &baked.left_contexts)?;
        Self::write_contexts(right_wtr, &baked.right_contexts)?;
        Ok(())
    }

    fn write_contexts<W>(wtr: W, contexts: &[String]) -> Result<()>
    where
        W: Write,
    {
        let mut wtr = BufWriter::new(wtr);
        writeln!(&mut wtr, "0 BOS/EOS")?;
        for (i, context) in contexts.iter().enumerate() {
            writeln!(&mut wtr, "{} {context}", i + 1)?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Builds a dictionary from the model without writing text files.
    ///
    /// The user lexicon read by [`Self::read_user_lexicon`] is also registered.
    ///
    /// # Errors
    ///
    /// [`KeitaiError`] is returned when the model has too many context classes
    /// or a given parameter of the user lexicon is out of the matrix.
    pub fn build_dictionary(&self) -> Result<Dictionary> {
        let baked = self.bake()?;
        let config = &self.data.config;
        let char_prop = config.dict.char_prop();

        let mut entries = Vec::with_capacity(config.surfaces.len());
        for (i, (surface, &param)) in config.surfaces.iter().zip(&baked.system_params).enumerate() {
            let word_idx = WordIdx::new(LexType::System, u32::try_from(i)?);
            entries.push(RawWordEntry {
                surface: surface.clone(),
                param,
                feature: config.dict.system_lexicon().word_feature(word_idx).to_string(),
            });
        }
        let system_lexicon = Lexicon::from_entries(entries, LexType::System)?;

        let unk = config.dict.unk_handler();
        let mut unk_entries = Vec::with_capacity(baked.unk_params.len());
        for (i, &param) in baked.unk_params.iter().enumerate() {
            unk_entries.push((
                i + 1,
                RawWordEntry {
                    surface: Self::unk_category(char_prop, unk, i)?.to_string(),
                    param,
                    feature: unk
                        .word_feature(WordIdx::new(LexType::Unknown, u32::try_from(i)?))
                        .to_string(),
                },
            ));
        }
        let unk_handler = UnkHandler::from_entries(unk_entries, char_prop)?;

        let user_lexicon = if self.user_entries.is_empty() {
            None
        } else {
            let mut entries = Vec::with_capacity(self.user_entries.len());
            let user_words = self.user_entries.iter().map(|(w, _)| w);
            for (i, (word, &param)) in user_words.zip(&baked.user_params).enumerate() {
                if !param.is_valid_for(&baked.matrix) {
                    let msg = format!(
                        "left/right_id must be within num_left/right, {}/{}",
                        param.left_id, param.right_id
                    );
                    return Err(KeitaiError::malformed_entry(i + 1, msg));
                }
                entries.push(RawWordEntry {
                    surface: word.surface().to_string(),
                    param,
                    feature: word.feature().to_string(),
                });
            }
            Some(Lexicon::from_entries(entries, LexType::User)?)
        };

        let mut dict = Dictionary::from_raw_parts(
            system_lexicon,
            baked.matrix,
            char_prop.clone(),
            unk_handler,
        );
        dict.set_user_lexicon(user_lexicon);
        Ok(dict)
    }

    /// Exports the model data.
    ///
    /// # Errors
    ///
    /// When bincode generates an error, it will be returned as is.
    pub fn write<W>(&self, mut wtr: W) -> Result<usize>
    where
        W: Write,
    {
        wtr.write_all(MODEL_MAGIC)?;
        let num_bytes =
            bincode::encode_into_std_write(&self.data, &mut wtr, common::bincode_config())?;
        Ok(MODEL_MAGIC.len() + num_bytes)
    }

    /// Reads a model exported by [`Self::write`].
    ///
    /// # Errors
    ///
    /// [`KeitaiError::IncompatibleDictionary`] is returned when the magic bytes mismatch.
    /// When bincode generates an error, it will be returned as is.
    pub fn read<R>(mut rdr: R) -> Result<Self>
    where
        R: Read,
    {
        let mut magic = [0; MODEL_MAGIC.len()];
        rdr.read_exact(&mut magic)?;
        if magic != MODEL_MAGIC {
            return Err(KeitaiError::IncompatibleDictionary(
                "The magic number of the input model mismatches.".to_string(),
            ));
        }
        let data = bincode::decode_from_std_read(&mut rdr, common::bincode_config())?;
        Ok(Self {
            data,
            user_entries: vec![],
        })
    }
}
