pub mod field_index;
pub mod types;

pub use field_index::{accessor_name, FieldIndex};
pub use types::{ColumnKey, Record};
