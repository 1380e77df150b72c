//! Error types for the allocation crate.
//!
//! Two families live here:
//!
//! - [`ModelError`] / [`AllocError`]: terminal failures surfaced to the caller.
//! - [`AdmissionRejection`]: the per-core verdict of a failed admission. The
//!   allocator absorbs these and moves on to the next candidate core.

use crate::task::{Role, TaskId};

/// Invalid system, criticality or task description.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// The ordering declares no level at all.
    #[error("Criticality ordering must declare at least one level")]
    NoLevels,

    /// Two levels share a name.
    #[error("Criticality level '{0}' is declared more than once")]
    DuplicateLevelName(String),

    /// Two levels share a rank.
    #[error("Criticality rank {rank} is assigned to both '{first}' and '{second}'")]
    DuplicateRank {
        /// Rank that was assigned twice
        rank: usize,
        /// First level holding the rank
        first: String,
        /// Second level holding the rank
        second: String,
    },

    /// Ranks are not the contiguous range `0..max_levels`.
    #[error("Criticality rank {rank} of level '{name}' is outside 0..{max_levels}")]
    RankOutOfRange {
        /// Level name
        name: String,
        /// Offending rank
        rank: usize,
        /// Declared number of levels
        max_levels: usize,
    },

    /// The number of declared levels disagrees with `max_levels`.
    #[error("Expected {expected} criticality levels, found {actual}")]
    LevelCountMismatch {
        /// Declared `max_levels`
        expected: usize,
        /// Number of levels in the map
        actual: usize,
    },

    /// A task references a level name that the ordering does not know.
    #[error("Task {task_id} references unknown criticality level '{level}'")]
    UnknownCriticality {
        /// Task identifier
        task_id: TaskId,
        /// Unresolved level name
        level: String,
    },

    /// Period must be positive.
    #[error("Task {0} has a zero period")]
    ZeroPeriod(TaskId),

    /// Deadline must be positive.
    #[error("Task {0} has a zero deadline")]
    ZeroDeadline(TaskId),

    /// WCET vector length differs from the number of levels.
    #[error("Task {task_id} declares {actual} WCET entries, expected {expected}")]
    WcetLength {
        /// Task identifier
        task_id: TaskId,
        /// Number of levels
        expected: usize,
        /// Number of WCET entries supplied
        actual: usize,
    },

    /// Own-level WCET larger than the nominal deadline.
    #[error("Task {task_id} WCET {wcet} at its own level exceeds its deadline {deadline}")]
    WcetExceedsDeadline {
        /// Task identifier
        task_id: TaskId,
        /// WCET at the task's criticality rank
        wcet: u64,
        /// Nominal deadline
        deadline: u64,
    },

    /// Task identifiers must be unique.
    #[error("Task id {0} appears more than once in the catalog")]
    DuplicateTaskId(TaskId),

    /// The catalog is larger than the system allows.
    #[error("Catalog holds {actual} tasks but the system allows at most {max}")]
    TooManyTasks {
        /// Number of tasks in the catalog
        actual: usize,
        /// `max_tasks` from the system description
        max: usize,
    },

    /// Processor or core counts must be positive.
    #[error("System field '{0}' must be positive")]
    ZeroCapacity(&'static str),
}

/// Terminal allocation failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocError {
    /// The lower-bound processor estimate already exceeds the ceiling.
    #[error(
        "Initial processor estimate {estimate} exceeds the {ceiling} available processors"
    )]
    InfeasibleAtStart {
        /// Computed lower bound
        estimate: usize,
        /// Configured processor ceiling
        ceiling: usize,
    },

    /// Growing the processor estimate would exceed the ceiling.
    #[error(
        "Insufficient processors: placing the {role} of task {task_id} needs {estimate} processors, only {ceiling} available"
    )]
    CeilingExceeded {
        /// Task whose instance could not be placed
        task_id: TaskId,
        /// Role of the unplaced instance
        role: Role,
        /// Estimate that would have been required
        estimate: usize,
        /// Configured processor ceiling
        ceiling: usize,
    },

    /// A replica was requested before its primary was placed.
    #[error("Cannot place a replica of task {task_id}: its primary is not allocated")]
    PrimaryMissing {
        /// Task identifier
        task_id: TaskId,
    },

    /// The input model is invalid.
    #[error(transparent)]
    Model(#[from] ModelError),
}

impl AllocError {
    /// True when the failure stems from insufficient processing capacity,
    /// as opposed to malformed input or an internal invariant breach.
    pub fn is_capacity_failure(&self) -> bool {
        matches!(
            self,
            AllocError::InfeasibleAtStart { .. } | AllocError::CeilingExceeded { .. }
        )
    }
}

/// Result alias for allocation operations.
pub type AllocResult<T> = Result<T, AllocError>;

/// Why a core refused an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionRejection {
    /// Summed utilization at `rank` would exceed one.
    #[error("utilization bound exceeded at rank {rank}")]
    CapacityExceeded {
        /// Rank at which the bound is violated
        rank: usize,
    },
    /// A virtual deadline would have to drop below the WCET at `rank`, or
    /// no tunable candidate is left to absorb a demand violation.
    #[error("demand bound cannot be met at rank {rank}")]
    DemandUnresolvable {
        /// Rank being tuned
        rank: usize,
    },
    /// Baseline demand at rank 0 exceeds the window and no rank-0
    /// tightening is left to undo.
    #[error("baseline demand exceeds supply")]
    BaselineOverload,
}
