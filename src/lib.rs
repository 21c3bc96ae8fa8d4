pub mod config;
pub mod cursor;
pub mod error;
pub mod process;
pub mod query;
pub mod schema;
pub mod source;

pub use config::{HeaderOption, ParseOptions, ReaderOptions, ScanConfig};
pub use cursor::{Cursor, Emit, Phase};
pub use error::{Error, Result};
pub use process::ChunkBatch;
pub use query::{FilterSpec, Predicate, QuerySet};
pub use schema::{ColumnKey, FieldIndex, Record};
pub use source::{FileSource, MemorySource, Source};
