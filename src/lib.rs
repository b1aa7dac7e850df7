//! `uniq-estimator` provides the partial aggregate states behind the `uniq`, `uniqHLL12` and `uniqExact` distinct-count functions of a columnar query engine.
//!
//! Each state consumes column values row by row, can be serialized to bytes, shipped to another node and merged with other partial states of the same function.
//! `uniq` samples 32-bit hashes adaptively, `uniqHLL12` counts up to 16 values exactly before switching to a HyperLogLog sketch with 4096 registers, and `uniqExact` keeps every distinct key.
pub mod aggregate;
pub mod column;
pub mod combinator;
pub mod error;
pub mod exact;
pub mod hash;
pub mod hyperloglog;
mod inline;
#[cfg(feature = "with_serde")]
mod serde;
pub mod short_string;
mod small;
pub mod state;
pub mod uniques;
mod wire;

pub use aggregate::{AggregateFunctionUniq, UniqKind};
pub use column::{Column, DataType, StringColumn, TupleColumn, Value, VectorColumn};
pub use error::UniqError;
pub use state::{DistinctSet, UniqState};
