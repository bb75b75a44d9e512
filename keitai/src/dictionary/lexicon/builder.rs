use std::io::{prelude::*, BufReader, Read};

use crate::dictionary::lexicon::{
    LexType, Lexicon, RawWordEntry, WordFeatures, WordMap, WordParam, WordParams,
};
use crate::dictionary::ConnectionMatrix;
use crate::errors::{KeitaiError, Result};
use crate::utils;

impl Lexicon {
    /// Builds a new instance from a lexicon file in the CSV format.
    ///
    /// # Errors
    ///
    /// [`KeitaiError::MalformedEntry`] is returned when a row is malformed
    /// or refers to a context id undefined in `conn`.
    pub fn from_reader<R>(rdr: R, lex_type: LexType, conn: &ConnectionMatrix) -> Result<Self>
    where
        R: Read,
    {
        let mut entries = vec![];
        for (line, e) in Self::read_entries(rdr)? {
            if !e.param.is_valid_for(conn) {
                let msg = format!(
                    "left/right_id must be within num_left/right, {}/{}",
                    e.param.left_id, e.param.right_id
                );
                return Err(KeitaiError::malformed_entry(line, msg));
            }
            entries.push(e);
        }
        Self::from_entries(entries, lex_type)
    }

    /// Builds a new instance from entries.
    ///
    /// Entries are stably sorted by their surfaces and costs,
    /// and the sorted order is used as word ids.
    pub fn from_entries(mut entries: Vec<RawWordEntry>, lex_type: LexType) -> Result<Self> {
        Self::sort_entries(&mut entries);
        let map = WordMap::new(entries.iter().map(|e| &e.surface))?;
        let params = WordParams::new(entries.iter().map(|e| e.param));
        let features = WordFeatures::new(entries.iter().map(|e| &e.feature));
        Ok(Self {
            map,
            params,
            features,
            lex_type,
        })
    }

    /// Sorts entries into the order of word ids.
    pub(crate) fn sort_entries(entries: &mut [RawWordEntry]) {
        entries.sort_by(|a, b| {
            a.surface
                .cmp(&b.surface)
                .then(a.param.word_cost.cmp(&b.param.word_cost))
        });
    }

    /// Reads entries with their one-origin line numbers.
    /// Rows with empty surfaces are skipped.
    pub(crate) fn read_entries<R>(rdr: R) -> Result<Vec<(usize, RawWordEntry)>>
    where
        R: Read,
    {
        let mut entries = vec![];
        let reader = BufReader::new(rdr);
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let e = Self::parse_csv(&line, i + 1)?;
            if e.surface.is_empty() {
                tracing::debug!(line = i + 1, "skipped an empty surface");
            } else {
                entries.push((i + 1, e));
            }
        }
        Ok(entries)
    }

    pub(crate) fn parse_csv(row: &str, line: usize) -> Result<RawWordEntry> {
        let cells = utils::parse_csv_row(row);
        if cells.len() < 4 {
            let msg = format!("A csv row of lexicon must have four items at least, {row}");
            return Err(KeitaiError::malformed_entry(line, msg));
        }

        let parse_err = |e: &dyn std::fmt::Display| {
            KeitaiError::malformed_entry(line, format!("{e}: {row}"))
        };
        let left_id = cells[1].parse().map_err(|e| parse_err(&e))?;
        let right_id = cells[2].parse().map_err(|e| parse_err(&e))?;
        let word_cost = cells[3].parse().map_err(|e| parse_err(&e))?;
        let feature = cells[4..].join(",");

        Ok(RawWordEntry {
            surface: cells[0].clone(),
            param: WordParam::new(left_id, right_id, word_cost),
            feature,
        })
    }
}
