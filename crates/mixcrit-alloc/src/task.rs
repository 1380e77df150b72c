//! Nominal task descriptions and their tunable instances.

use core::cmp::Ordering;
use core::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::criticality::CriticalityOrdering;
use crate::error::ModelError;

/// Time in scheduler ticks.
pub type Ticks = u64;

/// Stable task identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u32);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether an instance is the authoritative execution or a backup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The single authoritative instance of a task.
    Primary,
    /// A fault-tolerance backup placed on a different processor.
    Replica,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Primary => write!(f, "primary"),
            Role::Replica => write!(f, "replica"),
        }
    }
}

/// Immutable nominal task description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    id: TaskId,
    name: String,
    period: Ticks,
    deadline: Ticks,
    wcet: Vec<Ticks>,
    criticality: usize,
    replicas: u32,
}

impl Task {
    /// Validate and build a task against `ordering`.
    ///
    /// # Errors
    ///
    /// Returns a [`ModelError`] when the criticality name is unknown, the
    /// period or deadline is zero, the WCET vector does not have one entry per
    /// level, or the WCET at the task's own level exceeds its deadline.
    #[allow(clippy::too_many_arguments, reason = "mirrors the catalog entry fields")]
    pub fn new(
        ordering: &CriticalityOrdering,
        id: TaskId,
        name: impl Into<String>,
        period: Ticks,
        deadline: Ticks,
        criticality: &str,
        wcet: Vec<Ticks>,
        replicas: u32,
    ) -> Result<Self, ModelError> {
        let rank = ordering
            .rank_of(criticality)
            .ok_or_else(|| ModelError::UnknownCriticality {
                task_id: id,
                level: criticality.to_owned(),
            })?;
        Self::with_rank(ordering.levels(), id, name, period, deadline, rank, wcet, replicas)
    }

    /// Build a task whose criticality is already resolved to a rank.
    ///
    /// # Errors
    ///
    /// Same checks as [`Task::new`], with `levels` standing in for the
    /// ordering.
    #[allow(clippy::too_many_arguments, reason = "mirrors the catalog entry fields")]
    pub fn with_rank(
        levels: usize,
        id: TaskId,
        name: impl Into<String>,
        period: Ticks,
        deadline: Ticks,
        criticality: usize,
        wcet: Vec<Ticks>,
        replicas: u32,
    ) -> Result<Self, ModelError> {
        if period == 0 {
            return Err(ModelError::ZeroPeriod(id));
        }
        if deadline == 0 {
            return Err(ModelError::ZeroDeadline(id));
        }
        if wcet.len() != levels {
            return Err(ModelError::WcetLength {
                task_id: id,
                expected: levels,
                actual: wcet.len(),
            });
        }
        let own = wcet.get(criticality).copied().ok_or(ModelError::RankOutOfRange {
            name: format!("task {id}"),
            rank: criticality,
            max_levels: levels,
        })?;
        if own > deadline {
            return Err(ModelError::WcetExceedsDeadline {
                task_id: id,
                wcet: own,
                deadline,
            });
        }

        Ok(Self {
            id,
            name: name.into(),
            period,
            deadline,
            wcet,
            criticality,
            replicas,
        })
    }

    /// Task identifier.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Human-readable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Period in ticks.
    pub fn period(&self) -> Ticks {
        self.period
    }

    /// Nominal relative deadline in ticks.
    pub fn deadline(&self) -> Ticks {
        self.deadline
    }

    /// Criticality rank.
    pub fn criticality(&self) -> usize {
        self.criticality
    }

    /// Number of requested replicas.
    pub fn replicas(&self) -> u32 {
        self.replicas
    }

    /// WCET vector indexed by rank.
    pub fn wcet(&self) -> &[Ticks] {
        &self.wcet
    }

    /// WCET at `rank`, zero for unknown ranks.
    pub fn wcet_at(&self, rank: usize) -> Ticks {
        self.wcet.get(rank).copied().unwrap_or(0)
    }

    /// True when the task keeps running once the system is in mode `rank`.
    pub fn is_active_at(&self, rank: usize) -> bool {
        self.criticality >= rank
    }

    /// `wcet[rank] / period`.
    #[allow(clippy::cast_precision_loss, reason = "tick counts stay far below 2^52")]
    pub fn utilization(&self, rank: usize) -> f64 {
        self.wcet_at(rank) as f64 / self.period as f64
    }

    /// Utilization at every rank, ascending by rank.
    pub fn utilization_vector(&self) -> Vec<f64> {
        (0..self.wcet.len()).map(|r| self.utilization(r)).collect()
    }

    /// Utilization at the task's own criticality.
    pub fn own_utilization(&self) -> f64 {
        self.utilization(self.criticality)
    }

    /// Compare two tasks by utilization vector, lexicographically.
    pub fn cmp_utilization(&self, other: &Self) -> Ordering {
        self.utilization_vector()
            .iter()
            .zip(other.utilization_vector().iter())
            .map(|(a, b)| a.total_cmp(b))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| self.wcet.len().cmp(&other.wcet.len()))
    }
}

/// Identity of one instance of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstanceKey {
    /// Task the instance belongs to.
    pub task_id: TaskId,
    /// Primary or replica.
    pub role: Role,
    /// 0 for the primary, `1..=replicas` for replicas.
    pub replica_index: u32,
}

/// One placeable instance of a task with its own tuning state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInstance {
    task: Arc<Task>,
    role: Role,
    replica_index: u32,
    virtual_deadline: Vec<Ticks>,
}

impl TaskInstance {
    /// The primary instance of `task`.
    pub fn primary(task: Arc<Task>) -> Self {
        Self::build(task, Role::Primary, 0)
    }

    /// Replica number `index` (1-based) of `task`.
    pub fn replica(task: Arc<Task>, index: u32) -> Self {
        Self::build(task, Role::Replica, index)
    }

    fn build(task: Arc<Task>, role: Role, replica_index: u32) -> Self {
        let virtual_deadline = vec![task.deadline(); task.wcet().len()];
        Self {
            task,
            role,
            replica_index,
            virtual_deadline,
        }
    }

    /// Nominal description.
    pub fn task(&self) -> &Task {
        &self.task
    }

    /// Task identifier.
    pub fn id(&self) -> TaskId {
        self.task.id()
    }

    /// Instance role.
    pub fn role(&self) -> Role {
        self.role
    }

    /// 0 for the primary, 1-based for replicas.
    pub fn replica_index(&self) -> u32 {
        self.replica_index
    }

    /// Snapshot identity.
    pub fn key(&self) -> InstanceKey {
        InstanceKey {
            task_id: self.task.id(),
            role: self.role,
            replica_index: self.replica_index,
        }
    }

    /// Criticality rank of the underlying task.
    pub fn criticality(&self) -> usize {
        self.task.criticality()
    }

    /// Period of the underlying task.
    pub fn period(&self) -> Ticks {
        self.task.period()
    }

    /// WCET of the underlying task at `rank`.
    pub fn wcet_at(&self, rank: usize) -> Ticks {
        self.task.wcet_at(rank)
    }

    /// Tuned virtual deadlines indexed by rank.
    pub fn virtual_deadline(&self) -> &[Ticks] {
        &self.virtual_deadline
    }

    /// Virtual deadline at `rank`, the nominal deadline for unknown ranks.
    pub fn virtual_deadline_at(&self, rank: usize) -> Ticks {
        self.virtual_deadline
            .get(rank)
            .copied()
            .unwrap_or(self.task.deadline())
    }

    pub(crate) fn set_virtual_deadline_at(&mut self, rank: usize, value: Ticks) {
        if let Some(slot) = self.virtual_deadline.get_mut(rank) {
            *slot = value;
        }
    }

    pub(crate) fn replace_virtual_deadline(&mut self, values: &[Ticks]) {
        self.virtual_deadline.clear();
        self.virtual_deadline.extend_from_slice(values);
    }

    /// Set every rank back to the nominal deadline.
    pub fn reset_virtual_deadline(&mut self) {
        let deadline = self.task.deadline();
        self.virtual_deadline.iter_mut().for_each(|vd| *vd = deadline);
    }
}
