pub mod deferred;
pub mod descriptor;
pub mod error;
pub mod reconcile;
pub mod registry;
pub mod scheduler;

pub use deferred::{TaskResult, TaskTicket};
pub use descriptor::{
    BinningRequest, TableId, TaskId, TaskKind, TaskOutput, TaskProgress, TaskStatus,
};
pub use error::TaskError;
pub use reconcile::reconcile;
pub use registry::TaskRegistry;
pub use scheduler::ComputationScheduler;

#[cfg(test)]
mod reconcile_test;
