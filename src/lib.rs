//! A DEFLATE (RFC 1951) block encoder core: LZ77 match-finding, canonical
//! Huffman code construction, and bit-exact block serialization.
//!
//! This crate builds compressed DEFLATE blocks; it does not parse or
//! decompress them, and it carries no gzip/BGZF container framing.

pub mod bits;
pub mod deflate;
pub mod error;
pub mod huffman;

pub use bits::BitWriter;
pub use deflate::{BlockWriter, MatchFinder, Token};
pub use error::{Error, Result};
pub use huffman::{Code, HuffmanEncoder};
