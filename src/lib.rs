//! COBS: a bit-sliced Bloom-filter signature index for large collections
//! of DNA sequence documents. Build an index from a directory of
//! documents, then query it with a sequence to get back a ranked list of
//! documents that likely contain it.

pub mod bitmap;
pub mod build;
pub mod env;
pub mod error;
pub mod format;
pub mod hash;
pub mod kmer;
pub mod query;
pub mod search;
pub mod simd;
pub mod utils;

pub use error::{CobsError, Result};
