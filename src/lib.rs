//! Haneul: an FST- and lattice-based morphological analyzer for Korean.
//!
//! The crate compiles a lexicon into a byte-encoded finite-state transducer,
//! loads connection costs and character classes, and tokenizes text by
//! finding a minimum-cost path through a lattice of candidate morphemes.
#![deny(missing_docs)]

#[cfg(target_pointer_width = "16")]
compile_error!("`target_pointer_width` must be larger than or equal to 32");

pub mod common;
pub mod dictionary;
pub mod errors;
pub mod fst;
mod sentence;
pub mod token;
pub mod tokenizer;
mod utils;

#[cfg(test)]
mod tests;

pub use dictionary::Dictionary;
pub use errors::{HaneulError, Result};
pub use tokenizer::Tokenizer;
