//! Dictionary for tokenization.
pub(crate) mod builder;
pub(crate) mod character;
pub(crate) mod connector;
pub(crate) mod lexicon;
pub(crate) mod unknown;
pub(crate) mod word_idx;

use std::io::{self, Read, Write};
use std::path::Path;

use bincode::{Decode, Encode};

use crate::common::{self, DICTIONARY_ENCODING};
use crate::errors::{KeitaiError, Result};
use unknown::UnkHandler;

pub use character::{CharCategory, CharProperty};
pub use connector::ConnectionMatrix;
pub use lexicon::{LexMatch, Lexicon, RawWordEntry, WordParam};
pub use word_idx::WordIdx;

/// Magic bytes identifying a compiled dictionary of this version.
pub const MODEL_MAGIC: &[u8] = b"KeitaiDictionary 0.1\n";

/// Type of a lexicon that contains the word.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Hash, Default, Decode, Encode)]
#[repr(u8)]
pub enum LexType {
    /// System lexicon.
    #[default]
    System,
    /// User lexicon.
    User,
    /// Unknown words.
    Unknown,
}

/// Inner data of [`Dictionary`].
#[derive(Decode, Encode)]
pub(crate) struct DictionaryInner {
    encoding: String,
    system_lexicon: Lexicon,
    user_lexicon: Option<Lexicon>,
    connector: ConnectionMatrix,
    char_prop: CharProperty,
    unk_handler: UnkHandler,
}

/// Dictionary for tokenization.
pub struct Dictionary(pub(crate) DictionaryInner);

impl Dictionary {
    /// Gets the reference to the system lexicon.
    #[inline(always)]
    pub const fn system_lexicon(&self) -> &Lexicon {
        &self.0.system_lexicon
    }

    /// Gets the reference to the user lexicon.
    #[inline(always)]
    pub const fn user_lexicon(&self) -> Option<&Lexicon> {
        self.0.user_lexicon.as_ref()
    }

    /// Gets the reference to the connection matrix.
    #[inline(always)]
    pub const fn connector(&self) -> &ConnectionMatrix {
        &self.0.connector
    }

    /// Gets the reference to the character property.
    #[inline(always)]
    pub const fn char_prop(&self) -> &CharProperty {
        &self.0.char_prop
    }

    /// Gets the reference to the handler of unknown words.
    #[inline(always)]
    pub(crate) const fn unk_handler(&self) -> &UnkHandler {
        &self.0.unk_handler
    }

    /// Gets the parameters of the word.
    #[inline(always)]
    pub fn word_param(&self, word_idx: WordIdx) -> WordParam {
        match word_idx.lex_type {
            LexType::System => self.system_lexicon().word_param(word_idx),
            LexType::User => self.user_lexicon_unchecked().word_param(word_idx),
            LexType::Unknown => self.unk_handler().word_param(word_idx),
        }
    }

    /// Gets the reference to the feature string.
    #[inline(always)]
    pub fn word_feature(&self, word_idx: WordIdx) -> &str {
        match word_idx.lex_type {
            LexType::System => self.system_lexicon().word_feature(word_idx),
            LexType::User => self.user_lexicon_unchecked().word_feature(word_idx),
            LexType::Unknown => self.unk_handler().word_feature(word_idx),
        }
    }

    // Word ids of the user lexicon are only issued while it is set.
    #[inline(always)]
    fn user_lexicon_unchecked(&self) -> &Lexicon {
        self.0
            .user_lexicon
            .as_ref()
            .unwrap_or(&self.0.system_lexicon)
    }

    /// Exports the dictionary data.
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
            bincode::encode_into_std_write(&self.0, &mut wtr, common::bincode_config())?;
        Ok(MODEL_MAGIC.len() + num_bytes)
    }

    /// Exports the dictionary data to a file.
    ///
    /// The data is written to a temporary file in the same directory and
    /// renamed to `path` at the end, so `path` never holds a partial artifact.
    ///
    /// # Errors
    ///
    /// [`KeitaiError`] is returned when an I/O operation fails.
    pub fn write_to_path<P>(&self, path: P) -> Result<usize>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let mut temp_file = tempfile::NamedTempFile::new_in(dir)?;
        let num_bytes = {
            let mut wtr = io::BufWriter::new(temp_file.as_file_mut());
            let num_bytes = self.write(&mut wtr)?;
            wtr.flush()?;
            num_bytes
        };
        temp_file.persist(path)?;
        tracing::info!(path = %path.display(), num_bytes, "wrote a dictionary");
        Ok(num_bytes)
    }

    /// Creates a dictionary from a reader.
    ///
    /// # Errors
    ///
    /// [`KeitaiError::IncompatibleDictionary`] is returned when the magic bytes
    /// or the encoding mismatch. When bincode generates an error,
    /// it will be returned as is.
    pub fn read<R>(mut rdr: R) -> Result<Self>
    where
        R: Read,
    {
        let mut magic = [0; MODEL_MAGIC.len()];
        rdr.read_exact(&mut magic).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                KeitaiError::IncompatibleDictionary("The input is too short.".to_string())
            } else {
                KeitaiError::from(e)
            }
        })?;
        if magic != MODEL_MAGIC {
            return Err(KeitaiError::IncompatibleDictionary(
                "The magic number of the input model mismatches.".to_string(),
            ));
        }
        let data: DictionaryInner =
            bincode::decode_from_std_read(&mut rdr, common::bincode_config())?;
        if data.encoding != DICTIONARY_ENCODING {
            return Err(KeitaiError::IncompatibleDictionary(format!(
                "Unsupported encoding: {}",
                data.encoding
            )));
        }
        Ok(Self(data))
    }

    /// Returns the character encoding declared in the dictionary.
    pub fn encoding(&self) -> &str {
        &self.0.encoding
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build() -> Dictionary {
        let lexicon_csv = "自然,1,1,10,sizen\n言語,1,1,20,gengo";
        let matrix_def = "2 2\n0 0 0\n0 1 1\n1 0 2\n1 1 3";
        let char_def = "DEFAULT 0 1 0";
        let unk_def = "DEFAULT,1,1,100,*";
        Dictionary::from_readers(
            lexicon_csv.as_bytes(),
            matrix_def.as_bytes(),
            char_def.as_bytes(),
            unk_def.as_bytes(),
        )
        .unwrap()
    }

    #[test]
    fn test_round_trip() {
        let dict = build();
        let mut buf = vec![];
        let num_bytes = dict.write(&mut buf).unwrap();
        assert_eq!(num_bytes, buf.len());
        assert!(buf.starts_with(MODEL_MAGIC));

        let other = Dictionary::read(buf.as_slice()).unwrap();
        assert_eq!(other.encoding(), "UTF-8");
        assert_eq!(other.system_lexicon().len(), 2);
        assert_eq!(other.connector().cost(1, 0), 2);
        let input: Vec<_> = "言語".chars().collect();
        let m = &other.system_lexicon().lookup(&input, 0)[0];
        assert_eq!(other.word_feature(m.word_idx()), "gengo");
        assert_eq!(other.word_param(m.word_idx()), WordParam::new(1, 1, 20));
    }

    #[test]
    fn test_bad_magic() {
        let dict = build();
        let mut buf = vec![];
        dict.write(&mut buf).unwrap();
        buf[0] = b'X';
        let result = Dictionary::read(buf.as_slice());
        assert!(matches!(result, Err(KeitaiError::IncompatibleDictionary(_))));
    }

    #[test]
    fn test_too_short() {
        let result = Dictionary::read(&b"Keitai"[..]);
        assert!(matches!(result, Err(KeitaiError::IncompatibleDictionary(_))));
    }

    #[test]
    fn test_bad_encoding() {
        let mut dict = build();
        dict.0.encoding = "EUC-JP".to_string();
        let mut buf = vec![];
        dict.write(&mut buf).unwrap();
        let result = Dictionary::read(buf.as_slice());
        assert!(matches!(result, Err(KeitaiError::IncompatibleDictionary(_))));
    }

    #[test]
    fn test_write_to_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("system.dic");
        let dict = build();
        let num_bytes = dict.write_to_path(&path).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len() as usize, num_bytes);
        let file = std::fs::File::open(&path).unwrap();
        let other = Dictionary::read(io::BufReader::new(file)).unwrap();
        assert_eq!(other.system_lexicon().len(), 2);
    }
}
