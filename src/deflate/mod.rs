pub mod lz77;
pub mod tables;
pub mod tokens;
pub mod writer;

pub use lz77::MatchFinder;
pub use tokens::Token;
pub use writer::BlockWriter;
