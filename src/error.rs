use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The underlying sink failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// `write_bytes` was called with a non-byte-aligned bit buffer.
    #[error("write_bytes called with {pending_bits} unflushed bits pending")]
    UnalignedWriteBytes { pending_bits: u8 },

    /// A Huffman encoder was asked to build codes longer than the bit writer
    /// can represent in a single `write_bits` call's length field.
    #[error("requested max code length {max_bits} is too large (must be < 16)")]
    CodeLengthTooLarge { max_bits: u8 },

    /// Package-merge produced code lengths that violate the `max_bits`
    /// ceiling it was asked to respect.
    #[error("Huffman code construction failed to respect max length {expected} (found {found})")]
    HuffmanConstructionFailed { expected: usize, found: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
