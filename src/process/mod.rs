// src/process/mod.rs
pub mod chunk;
pub mod filter;
pub mod parser;
pub mod prefetch;
pub mod utils;

pub use chunk::{ChunkBuffer, RawBatch, RawBatchSource};
pub use filter::{ChunkBatch, FilteringChunkParser};
pub use parser::RecordParser;
pub use prefetch::Prefetcher;
