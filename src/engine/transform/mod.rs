pub mod client;
pub mod engine;
pub mod error;
pub mod local;
pub mod spec;
pub mod wire;

pub use client::TransformClient;
pub use engine::{TableHandle, TransformEngine};
pub use error::{TransformError, WireError};
pub use local::LocalEngine;
pub use spec::{
    AggregateFn, AggregateSpec, BinningSpec, ColumnFilter, FilterOp, FilterValue, GroupBySpec,
    GroupKey, SortConstraint, TransformSpec,
};

#[cfg(test)]
mod local_test;
#[cfg(test)]
mod wire_test;
