//! Offline admission control and fault-tolerant placement for mixed-criticality
//! task sets.
//!
//! Given a catalog of periodic tasks with one WCET estimate per criticality
//! level, this crate decides on which processor and core every task instance
//! (one primary plus its replicas) runs, and computes the virtual deadlines
//! the runtime scheduler uses when it switches criticality modes.
//!
//! - **Criticality**: validated mapping from level names to contiguous ranks
//! - **Demand-bound analysis**: carry-over demand across mode switches and the
//!   search window bound
//! - **Cores**: transactional admission that tunes virtual deadlines and rolls
//!   back on failure
//! - **Allocator**: round-robin, criticality-ordered greedy placement under
//!   replica diversity rules, growing the processor pool on demand
//! - **Verification**: independent re-check of a finished allocation
//!
//! # Determinism
//!
//! The same catalog and configuration always produce the same allocation:
//! sorting is stable, every scan starts from a deterministic cursor, and no
//! hash ordering leaks into the result.
//!
//! # Example
//!
//! ```
//! use mixcrit_alloc::prelude::*;
//!
//! # fn main() -> Result<(), AllocError> {
//! let ordering = CriticalityOrdering::new([("LO", 0), ("HI", 1)], 2)?;
//! let tasks = vec![
//!     Task::new(&ordering, TaskId(1), "brake", 10, 10, "HI", vec![2, 4], 1)?,
//!     Task::new(&ordering, TaskId(2), "radio", 10, 10, "LO", vec![5, 5], 0)?,
//! ];
//! let config = AllocatorConfig::new(2, 1);
//! let allocation = allocate(config, ordering, tasks)?;
//! assert_eq!(allocation.instance_count(), 3);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::unwrap_used)]
#![deny(unused_must_use)]

pub mod allocation;
pub mod allocator;
pub mod cores;
pub mod criticality;
pub mod dbf;
pub mod error;
pub mod processor;
pub mod task;
pub mod tuning;
pub mod verify;

pub mod prelude;

pub use allocation::{Allocation, CoreSnapshot, InstancePlacement};
pub use allocator::{
    Allocator, AllocatorConfig, DiversityScope, allocate, estimate_processors, sort_tasks,
};
pub use cores::{AdmissionSettings, Core, DeadlineSnapshot, UtilizationPolicy};
pub use criticality::CriticalityOrdering;
pub use dbf::DEFAULT_WINDOW_CAP;
pub use error::{AdmissionRejection, AllocError, AllocResult, ModelError};
pub use processor::Processor;
pub use task::{InstanceKey, Role, Task, TaskId, TaskInstance, Ticks};
pub use verify::{Violation, verify_allocation};

/// Tolerance applied to every utilization comparison.
pub const UTILIZATION_EPSILON: f64 = 1e-9;
