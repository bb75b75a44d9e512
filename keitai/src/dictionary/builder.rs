use std::io::Read;

use crate::common::DICTIONARY_ENCODING;
use crate::dictionary::{
    CharProperty, ConnectionMatrix, Dictionary, DictionaryInner, LexType, Lexicon, RawWordEntry,
    UnkHandler,
};
use crate::errors::{KeitaiError, Result};

impl Dictionary {
    /// Creates a new instance from readers in the MeCab format.
    ///
    /// # Arguments
    ///
    ///  - `system_lexicon_rdr`: A reader of a lexicon file `*.csv`.
    ///  - `connector_rdr`: A reader of matrix file `matrix.def`.
    ///  - `char_prop_rdr`: A reader of character definition file `char.def`.
    ///  - `unk_handler_rdr`: A reader of unknown definition file `unk.def`.
    ///
    /// # Errors
    ///
    /// [`KeitaiError`] is returned when an input format is invalid.
    pub fn from_readers<S, C, P, U>(
        system_lexicon_rdr: S,
        connector_rdr: C,
        char_prop_rdr: P,
        unk_handler_rdr: U,
    ) -> Result<Self>
    where
        S: Read,
        C: Read,
        P: Read,
        U: Read,
    {
        let connector = ConnectionMatrix::from_reader(connector_rdr)?;
        let system_lexicon = Lexicon::from_reader(system_lexicon_rdr, LexType::System, &connector)?;
        Self::from_parts(system_lexicon, connector, char_prop_rdr, unk_handler_rdr)
    }

    /// Creates a new instance from parsed lexicon entries and a connection matrix.
    ///
    /// # Errors
    ///
    /// [`KeitaiError::MalformedEntry`] is returned when an entry refers to a context id
    /// undefined in `connector`, where the line number is the one-origin index of the entry.
    /// [`KeitaiError`] is also returned when the format of `char.def` or `unk.def` is invalid.
    pub fn from_entries<P, U>(
        entries: Vec<RawWordEntry>,
        connector: ConnectionMatrix,
        char_prop_rdr: P,
        unk_handler_rdr: U,
    ) -> Result<Self>
    where
        P: Read,
        U: Read,
    {
        if let Some(i) = entries.iter().position(|e| !e.param.is_valid_for(&connector)) {
            let msg = format!(
                "left/right_id must be within num_left/right, {}/{}",
                entries[i].param.left_id, entries[i].param.right_id
            );
            return Err(KeitaiError::malformed_entry(i + 1, msg));
        }
        let system_lexicon = Lexicon::from_entries(entries, LexType::System)?;
        Self::from_parts(system_lexicon, connector, char_prop_rdr, unk_handler_rdr)
    }

    fn from_parts<P, U>(
        system_lexicon: Lexicon,
        connector: ConnectionMatrix,
        char_prop_rdr: P,
        unk_handler_rdr: U,
    ) -> Result<Self>
    where
        P: Read,
        U: Read,
    {
        let char_prop = CharProperty::from_reader(char_prop_rdr)?;
        let unk_handler = UnkHandler::from_reader(unk_handler_rdr, &char_prop, &connector)?;
        Ok(Self::from_raw_parts(
            system_lexicon,
            connector,
            char_prop,
            unk_handler,
        ))
    }

    pub(crate) fn from_raw_parts(
        system_lexicon: Lexicon,
        connector: ConnectionMatrix,
        char_prop: CharProperty,
        unk_handler: UnkHandler,
    ) -> Self {
        tracing::debug!(
            num_words = system_lexicon.len(),
            num_unk_entries = unk_handler.len(),
            num_right = connector.num_right(),
            num_left = connector.num_left(),
            num_categories = char_prop.num_categories(),
            "compiled a dictionary"
        );

        Self(DictionaryInner {
            encoding: DICTIONARY_ENCODING.to_string(),
            system_lexicon,
            user_lexicon: None,
            connector,
            char_prop,
            unk_handler,
        })
    }

    /// Resets the user lexicon from a reader.
    ///
    /// Words in the user lexicon are searched before those in the system lexicon.
    ///
    /// # Arguments
    ///
    ///  - `user_lexicon_rdr`: A reader of a lexicon file `*.csv` in the MeCab format.
    ///    If `None`, clear the current user lexicon.
    ///
    /// # Errors
    ///
    /// [`KeitaiError`] is returned when an input format is invalid.
    pub fn reset_user_lexicon_from_reader<R>(mut self, user_lexicon_rdr: Option<R>) -> Result<Self>
    where
        R: Read,
    {
        if let Some(user_lexicon_rdr) = user_lexicon_rdr {
            let user_lexicon =
                Lexicon::from_reader(user_lexicon_rdr, LexType::User, self.connector())?;
            self.0.user_lexicon = Some(user_lexicon);
        } else {
            self.0.user_lexicon = None;
        }
        Ok(self)
    }

    pub(crate) fn set_user_lexicon(&mut self, user_lexicon: Option<Lexicon>) {
        self.0.user_lexicon = user_lexicon;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::dictionary::WordParam;

    #[test]
    fn test_oor_lex() {
        let lexicon_csv = "自然,1,1,0";
        let matrix_def = "1 1\n0 0 0";
        let char_def = "DEFAULT 0 1 0";
        let unk_def = "DEFAULT,0,0,100,*";

        let result = Dictionary::from_readers(
            lexicon_csv.as_bytes(),
            matrix_def.as_bytes(),
            char_def.as_bytes(),
            unk_def.as_bytes(),
        );
        assert!(matches!(
            result,
            Err(KeitaiError::MalformedEntry { line: 1, .. })
        ));
    }

    #[test]
    fn test_oor_unk() {
        let lexicon_csv = "自然,0,0,0";
        let matrix_def = "1 1\n0 0 0";
        let char_def = "DEFAULT 0 1 0";
        let unk_def = "DEFAULT,1,1,100,*";

        let result = Dictionary::from_readers(
            lexicon_csv.as_bytes(),
            matrix_def.as_bytes(),
            char_def.as_bytes(),
            unk_def.as_bytes(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_malformed_matrix() {
        let lexicon_csv = "自然,0,0,0";
        let matrix_def = "1 1\n0 0";
        let char_def = "DEFAULT 0 1 0";
        let unk_def = "DEFAULT,0,0,100,*";

        let result = Dictionary::from_readers(
            lexicon_csv.as_bytes(),
            matrix_def.as_bytes(),
            char_def.as_bytes(),
            unk_def.as_bytes(),
        );
        assert!(matches!(
            result,
            Err(KeitaiError::MalformedMatrix { line: 2, .. })
        ));
    }

    #[test]
    fn test_from_entries() {
        let entries = vec![
            RawWordEntry {
                surface: "東京".to_string(),
                param: WordParam::new(1, 1, 5),
                feature: "noun".to_string(),
            },
            RawWordEntry {
                surface: "東".to_string(),
                param: WordParam::new(1, 1, 3),
                feature: "noun".to_string(),
            },
        ];
        let connector = ConnectionMatrix::new(2, 2);
        let dict = Dictionary::from_entries(
            entries.clone(),
            connector.clone(),
            "DEFAULT 0 1 0".as_bytes(),
            "DEFAULT,0,0,100,*".as_bytes(),
        )
        .unwrap();
        assert_eq!(dict.system_lexicon().len(), 2);

        let mut entries = entries;
        entries[1].param.left_id = 2;
        let result = Dictionary::from_entries(
            entries,
            connector,
            "DEFAULT 0 1 0".as_bytes(),
            "DEFAULT,0,0,100,*".as_bytes(),
        );
        assert!(matches!(
            result,
            Err(KeitaiError::MalformedEntry { line: 2, .. })
        ));
    }

    #[test]
    fn test_user_lexicon() {
        let lexicon_csv = "自然,0,0,0,sys";
        let matrix_def = "1 1\n0 0 0";
        let char_def = "DEFAULT 0 1 0";
        let unk_def = "DEFAULT,0,0,100,*";

        let dict = Dictionary::from_readers(
            lexicon_csv.as_bytes(),
            matrix_def.as_bytes(),
            char_def.as_bytes(),
            unk_def.as_bytes(),
        )
        .unwrap();
        let dict = dict
            .reset_user_lexicon_from_reader(Some("言語,0,0,0,user".as_bytes()))
            .unwrap();
        assert_eq!(dict.user_lexicon().map(|lex| lex.len()), Some(1));

        let result = dict.reset_user_lexicon_from_reader(Some("言語,1,0,0,user".as_bytes()));
        assert!(result.is_err());
    }
}
