//! System and task catalog documents for the mixcrit allocator.
//!
//! Two documents describe an allocation problem:
//!
//! - a **system description** with the processor ceiling, cores per
//!   processor, the criticality levels and optional allocator settings
//! - a **task catalog** listing every periodic task with one WCET per level
//!
//! Both are read as YAML, or as JSON when the file name ends in `.json`, and
//! resolved into the types [`mixcrit_alloc`] consumes.

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::unwrap_used)]
#![deny(unused_must_use)]

pub mod error;
pub mod load;
pub mod system;
pub mod taskset;

pub use error::{ConfigError, ConfigResult};
pub use load::{AllocationInput, Format, load_system, load_tasks, parse_file, parse_str};
pub use system::{AllocationSection, CriticalityLevels, SystemConfig, SystemSection};
pub use taskset::{TaskEntry, TaskSet};
