pub mod encoder;
pub mod tables;

pub use encoder::{Code, HuffmanEncoder, MAX_CL_CODE_LENGTH, MAX_CODE_LENGTH};
