//! Common settings in Keitai.
use bincode::config::{self, Fixint, LittleEndian};

/// The fixed connection id of BOS/EOS.
pub const BOS_EOS_CONNECTION_ID: u16 = 0;

/// Connection cost assigned to pairs of ids not listed in `matrix.def`.
pub const DISALLOWED_CONNECTION_COST: i16 = i16::MAX;

/// Character encoding of compiled dictionaries.
pub const DICTIONARY_ENCODING: &str = "UTF-8";

pub(crate) fn bincode_config() -> config::Configuration<LittleEndian, Fixint> {
    config::standard()
        .with_little_endian()
        .with_fixed_int_encoding()
}
