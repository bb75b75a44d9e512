//! # Keitai
//!
//! Keitai is a lattice-based morphological analyzer.
//! It segments text written without explicit word boundaries into morphemes
//! and tags each of them, using a compiled lexicon and a connection-cost model.
//! The cost model can be estimated from a tagged corpus with the [`trainer`] module.
//!
//! ## Examples
//!
//! ```
//! use keitai::{Dictionary, Tokenizer};
//!
//! let lexicon_csv = "京都,1,1,2000,京都
//! 東,2,2,1000,東
//! 東京,0,0,1000,東京
//! 都,3,3,1000,都";
//!
//! let matrix_def = "4 4
//! 0 0 0
//! 0 1 0
//! 0 2 0
//! 0 3 0
//! 1 0 0
//! 1 1 0
//! 1 2 0
//! 1 3 0
//! 2 0 0
//! 2 1 0
//! 2 2 0
//! 2 3 0
//! 3 0 0
//! 3 1 0
//! 3 2 0
//! 3 3 0";
//!
//! let char_def = "DEFAULT 0 1 0";
//!
//! let unk_def = "DEFAULT,0,0,100,DEFAULT";
//!
//! let dict = Dictionary::from_readers(
//!     lexicon_csv.as_bytes(),
//!     matrix_def.as_bytes(),
//!     char_def.as_bytes(),
//!     unk_def.as_bytes(),
//! )
//! .unwrap();
//!
//! let tokenizer = Tokenizer::new(dict);
//! let mut worker = tokenizer.new_worker();
//!
//! worker.reset_sentence("京都東京都");
//! worker.tokenize().unwrap();
//! assert_eq!(worker.num_tokens(), 3);
//!
//! let t0 = worker.token(0);
//! assert_eq!(t0.surface(), "京都");
//! assert_eq!(t0.range_char(), 0..2);
//! assert_eq!(t0.range_byte(), 0..6);
//! assert_eq!(t0.feature(), "京都");
//!
//! let t1 = worker.token(1);
//! assert_eq!(t1.surface(), "東京");
//! assert_eq!(t1.range_char(), 2..4);
//! assert_eq!(t1.range_byte(), 6..12);
//! assert_eq!(t1.feature(), "東京");
//!
//! let t2 = worker.token(2);
//! assert_eq!(t2.surface(), "都");
//! assert_eq!(t2.range_char(), 4..5);
//! assert_eq!(t2.range_byte(), 12..15);
//! assert_eq!(t2.feature(), "都");
//! ```
#![deny(missing_docs)]

#[cfg(target_pointer_width = "16")]
compile_error!("`target_pointer_width` must be larger than or equal to 32");

pub mod common;
pub mod dictionary;
pub mod errors;
mod sentence;
pub mod token;
pub mod tokenizer;
mod utils;

#[cfg(feature = "train")]
pub mod eval;
#[cfg(feature = "train")]
pub mod trainer;


pub use dictionary::Dictionary;
pub use tokenizer::Tokenizer;

/// Version number of this library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
