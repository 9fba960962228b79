//! Common constants and configurations.
use bincode::config::{self, Fixint, LittleEndian};

/// Maximum length of an input sentence in characters.
pub const MAX_SENTENCE_LENGTH: usize = u16::MAX as usize - 1;

/// Connection id reserved for the virtual BOS/EOS nodes.
pub const BOS_EOS_CONNECTION_ID: u16 = 0;

pub(crate) fn bincode_config() -> config::Configuration<LittleEndian, Fixint> {
    config::standard()
        .with_little_endian()
        .with_fixed_int_encoding()
        .write_fixed_array_length()
}
