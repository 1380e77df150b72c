//! Prelude module for common allocation types.
//!
//! This module provides a convenient way to import the most commonly used
//! types from the allocation crate.

pub use crate::allocation::{Allocation, CoreSnapshot, InstancePlacement};
pub use crate::allocator::{Allocator, AllocatorConfig, DiversityScope, allocate};
pub use crate::cores::{AdmissionSettings, Core, UtilizationPolicy};
pub use crate::criticality::CriticalityOrdering;
pub use crate::error::{AdmissionRejection, AllocError, AllocResult, ModelError};
pub use crate::task::{Role, Task, TaskId, TaskInstance, Ticks};
pub use crate::verify::{Violation, verify_allocation};
pub use crate::{DEFAULT_WINDOW_CAP, UTILIZATION_EPSILON};
