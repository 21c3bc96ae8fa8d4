pub mod expr;
pub mod predicate;
pub mod set;

pub use expr::{FilterSpec, Scalar};
pub use predicate::{Bounds, CompareOp, Mismatch, Predicate, ValueKind};
pub use set::{ColumnFilter, QuerySet};
