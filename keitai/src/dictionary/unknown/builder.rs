use std::io::Read;

use crate::dictionary::character::CharProperty;
use crate::dictionary::lexicon::{Lexicon, RawWordEntry};
use crate::dictionary::unknown::{UnkEntry, UnkHandler};
use crate::dictionary::ConnectionMatrix;
use crate::errors::{KeitaiError, Result};

impl UnkHandler {
    /// Creates a new instance from `unk.def`.
    ///
    /// # Errors
    ///
    /// [`KeitaiError`] is returned when
    ///  - a row is malformed or refers to a context id undefined in `conn`,
    ///  - a row refers to a category undefined in `char_prop`, or
    ///  - a category in `char_prop` has no entry.
    pub fn from_reader<R>(rdr: R, char_prop: &CharProperty, conn: &ConnectionMatrix) -> Result<Self>
    where
        R: Read,
    {
        let entries = Lexicon::read_entries(rdr)?;
        for (line, item) in &entries {
            if !item.param.is_valid_for(conn) {
                let msg = format!(
                    "left/right_id must be within num_left/right, {}/{}",
                    item.param.left_id, item.param.right_id
                );
                return Err(KeitaiError::malformed_entry(*line, msg));
            }
        }
        Self::from_entries(entries, char_prop)
    }

    /// Creates a new instance from entries whose surfaces are category names,
    /// paired with their line numbers.
    pub(crate) fn from_entries(
        entries: Vec<(usize, RawWordEntry)>,
        char_prop: &CharProperty,
    ) -> Result<Self> {
        let mut map = vec![vec![]; char_prop.num_categories()];
        for (line, item) in entries {
            let cate_id = char_prop.cate_id(&item.surface).ok_or_else(|| {
                let msg = format!("Undefined category: {} (at line {line})", item.surface);
                KeitaiError::invalid_format("unk.def", msg)
            })?;
            let cate_id = u16::try_from(cate_id)?;
            map[usize::from(cate_id)].push(UnkEntry {
                cate_id,
                param: item.param,
                feature: item.feature,
            });
        }

        let mut offsets = vec![];
        let mut entries = vec![];
        for (cate_id, mut v) in map.into_iter().enumerate() {
            if v.is_empty() {
                let name = char_prop.cate_str(u32::try_from(cate_id)?).unwrap_or_default();
                let msg = format!("Category {name} has no unknown word entry");
                return Err(KeitaiError::invalid_format("unk.def", msg));
            }
            offsets.push(entries.len());
            entries.append(&mut v);
        }
        offsets.push(entries.len());
        Ok(Self { offsets, entries })
    }
}
