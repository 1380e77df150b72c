//! Shared fixtures for the allocation integration tests.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use mixcrit_alloc::{CriticalityOrdering, ModelError, Task, TaskId, Ticks};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

/// `LO` (0) and `HI` (1).
pub fn two_levels() -> Result<CriticalityOrdering, ModelError> {
    CriticalityOrdering::new([("LO", 0), ("HI", 1)], 2)
}

/// A single level `QM`.
pub fn single_level() -> Result<CriticalityOrdering, ModelError> {
    CriticalityOrdering::new([("QM", 0)], 1)
}

/// An implicit-deadline task.
pub fn task(
    ordering: &CriticalityOrdering,
    id: u32,
    name: &str,
    period: Ticks,
    criticality: &str,
    wcet: Vec<Ticks>,
    replicas: u32,
) -> Result<Task, ModelError> {
    Task::new(ordering, TaskId(id), name, period, period, criticality, wcet, replicas)
}

/// `count` single-level tasks of utilization 0.6, ids from 1.
pub fn heavy_tasks(ordering: &CriticalityOrdering, count: u32) -> Result<Vec<Task>, ModelError> {
    (1..=count)
        .map(|id| task(ordering, id, &format!("heavy{id}"), 10, "QM", vec![6], 0))
        .collect()
}
