//! Greedy, deterministic placement of every task instance.
//!
//! Tasks are grouped by criticality (highest first) and sorted by
//! utilization vector inside each group. The primary of each task is placed
//! first, then its replicas. Processors are scanned round-robin from a
//! cursor that advances past each successful placement; only the first
//! `num_procs_estimate` processors are eligible. When no eligible core
//! accepts an instance the estimate grows by one and the scan restarts.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::UTILIZATION_EPSILON;
use crate::allocation::Allocation;
use crate::cores::{AdmissionSettings, UtilizationPolicy};
use crate::criticality::CriticalityOrdering;
use crate::dbf::DEFAULT_WINDOW_CAP;
use crate::error::{AllocError, AllocResult, ModelError};
use crate::processor::Processor;
use crate::task::{Role, Task, TaskId, TaskInstance, Ticks};

/// How far the replica diversity rule reaches.
///
/// The rule only applies to tasks with exactly one replica. Let `S` be the
/// tasks that have a replica on the processor hosting the primary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiversityScope {
    /// Reject a core whose own primaries include a task in `S`.
    #[default]
    Core,
    /// Reject a processor whose primaries, on any core, include a task in `S`.
    Processor,
}

/// Allocator configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocatorConfig {
    /// Hard ceiling on processors.
    pub num_processors: usize,

    /// Cores per processor.
    pub cores_per_processor: usize,

    /// Largest catalog accepted.
    pub max_tasks: usize,

    /// Utilization accounting rule.
    pub utilization_policy: UtilizationPolicy,

    /// Reach of the replica diversity rule.
    pub diversity_scope: DiversityScope,

    /// Cap on the demand-bound search window.
    pub window_cap: Ticks,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            num_processors: 1,
            cores_per_processor: 1,
            max_tasks: usize::MAX,
            utilization_policy: UtilizationPolicy::default(),
            diversity_scope: DiversityScope::default(),
            window_cap: DEFAULT_WINDOW_CAP,
        }
    }
}

impl AllocatorConfig {
    /// Create a configuration for `num_processors` processors of
    /// `cores_per_processor` cores each.
    pub fn new(num_processors: usize, cores_per_processor: usize) -> Self {
        Self {
            num_processors,
            cores_per_processor,
            ..Self::default()
        }
    }

    /// Set the processor ceiling.
    pub fn with_processors(mut self, num_processors: usize) -> Self {
        self.num_processors = num_processors;
        self
    }

    /// Set the number of cores per processor.
    pub fn with_cores_per_processor(mut self, cores: usize) -> Self {
        self.cores_per_processor = cores;
        self
    }

    /// Set the catalog size limit.
    pub fn with_max_tasks(mut self, max_tasks: usize) -> Self {
        self.max_tasks = max_tasks;
        self
    }

    /// Set the utilization accounting rule.
    pub fn with_utilization_policy(mut self, policy: UtilizationPolicy) -> Self {
        self.utilization_policy = policy;
        self
    }

    /// Set the reach of the diversity rule.
    pub fn with_diversity_scope(mut self, scope: DiversityScope) -> Self {
        self.diversity_scope = scope;
        self
    }

    /// Set the search window cap.
    pub fn with_window_cap(mut self, cap: Ticks) -> Self {
        self.window_cap = cap;
        self
    }

    /// Admission parameters shared by every core.
    pub fn admission_settings(&self) -> AdmissionSettings {
        AdmissionSettings::default()
            .with_utilization_policy(self.utilization_policy)
            .with_window_cap(self.window_cap)
    }

    /// Check the processor and core counts.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::ZeroCapacity`] for a zero count.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.num_processors == 0 {
            return Err(ModelError::ZeroCapacity("num_processors"));
        }
        if self.cores_per_processor == 0 {
            return Err(ModelError::ZeroCapacity("num_cores_per_processor"));
        }
        Ok(())
    }
}

/// Lower bound on the processors needed by `tasks`.
///
/// The larger of the total own-level utilization of every instance spread
/// over `cores_per_processor` cores, and the largest replica count plus one.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "the bound is non-negative and far below 2^52"
)]
pub fn estimate_processors<'a, I>(tasks: I, cores_per_processor: usize) -> usize
where
    I: IntoIterator<Item = &'a Task>,
{
    let mut demand = 0.0;
    let mut max_replicas = 0u32;
    for task in tasks {
        demand += task.own_utilization() * f64::from(task.replicas().saturating_add(1));
        max_replicas = max_replicas.max(task.replicas());
    }

    let cores = cores_per_processor.max(1) as f64;
    let by_utilization = (demand / cores - UTILIZATION_EPSILON).ceil().max(0.0) as usize;
    let by_replicas = usize::try_from(max_replicas)
        .unwrap_or(usize::MAX)
        .saturating_add(1);
    by_utilization.max(by_replicas)
}

/// Group `tasks` by rank, highest first, each group sorted by utilization
/// vector descending. The sort is stable with respect to `tasks`.
pub fn sort_tasks(tasks: &[Arc<Task>], ordering: &CriticalityOrdering) -> Vec<(usize, Vec<Arc<Task>>)> {
    ordering
        .ranks_descending()
        .map(|rank| {
            let mut group: Vec<Arc<Task>> = tasks
                .iter()
                .filter(|t| t.criticality() == rank)
                .cloned()
                .collect();
            group.sort_by(|a, b| b.cmp_utilization(a));
            (rank, group)
        })
        .collect()
}

/// Placement engine for one catalog.
#[derive(Debug, Clone)]
pub struct Allocator {
    config: AllocatorConfig,
    ordering: CriticalityOrdering,
    tasks: Vec<Arc<Task>>,
    processors: Vec<Processor>,
    num_procs_estimate: usize,
    cursor: usize,
}

impl Allocator {
    /// Validate the catalog and size the initial processor pool.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::Model`] for an invalid configuration or catalog
    /// and [`AllocError::InfeasibleAtStart`] when the initial estimate
    /// already exceeds the processor ceiling.
    pub fn new(
        config: AllocatorConfig,
        ordering: CriticalityOrdering,
        tasks: Vec<Task>,
    ) -> AllocResult<Self> {
        config.validate()?;
        if tasks.len() > config.max_tasks {
            return Err(ModelError::TooManyTasks {
                actual: tasks.len(),
                max: config.max_tasks,
            }
            .into());
        }

        let mut seen = HashSet::new();
        for task in &tasks {
            if !seen.insert(task.id()) {
                return Err(ModelError::DuplicateTaskId(task.id()).into());
            }
            if task.wcet().len() != ordering.levels() {
                return Err(ModelError::WcetLength {
                    task_id: task.id(),
                    expected: ordering.levels(),
                    actual: task.wcet().len(),
                }
                .into());
            }
        }

        let estimate = estimate_processors(&tasks, config.cores_per_processor);
        if estimate > config.num_processors {
            return Err(AllocError::InfeasibleAtStart {
                estimate,
                ceiling: config.num_processors,
            });
        }

        let settings = config.admission_settings();
        let processors = (0..config.num_processors)
            .map(|id| Processor::new(id, config.cores_per_processor, ordering.levels(), settings))
            .collect();

        info!(
            tasks = tasks.len(),
            processors = config.num_processors,
            cores_per_processor = config.cores_per_processor,
            estimate,
            "allocator initialized"
        );

        Ok(Self {
            config,
            ordering,
            tasks: tasks.into_iter().map(Arc::new).collect(),
            processors,
            num_procs_estimate: estimate,
            cursor: 0,
        })
    }

    /// Current processor estimate.
    pub fn num_procs_estimate(&self) -> usize {
        self.num_procs_estimate
    }

    /// Configuration in use.
    pub fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    /// Criticality ordering in use.
    pub fn ordering(&self) -> &CriticalityOrdering {
        &self.ordering
    }

    /// Processor pool.
    pub fn processors(&self) -> &[Processor] {
        &self.processors
    }

    /// Place every instance of every task.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::CeilingExceeded`] when an instance cannot be
    /// placed even after growing to the ceiling, and
    /// [`AllocError::PrimaryMissing`] if a replica is placed before its
    /// primary.
    pub fn run(mut self) -> AllocResult<Allocation> {
        for (rank, group) in sort_tasks(&self.tasks, &self.ordering) {
            if group.is_empty() {
                continue;
            }
            info!(
                level = self.ordering.name_of(rank).unwrap_or_default(),
                tasks = group.len(),
                "allocating criticality group"
            );
            for task in &group {
                self.allocate_task(task)?;
            }
        }

        info!(
            estimate = self.num_procs_estimate,
            used = self.processors.iter().filter(|p| p.is_used()).count(),
            ceiling = self.config.num_processors,
            "allocation complete"
        );
        Ok(Allocation::from_processors(
            &self.ordering,
            &self.processors,
            self.config.cores_per_processor,
            self.num_procs_estimate,
        ))
    }

    fn allocate_task(&mut self, task: &Arc<Task>) -> AllocResult<()> {
        let mut primary = TaskInstance::primary(Arc::clone(task));
        loop {
            if let Some((proc, core)) = self.place_primary(&mut primary) {
                debug!(task = %task.id(), name = task.name(), proc, core, vd = ?primary.virtual_deadline(), "placed primary");
                break;
            }
            self.grow(task.id(), Role::Primary)?;
        }

        for index in 1..=task.replicas() {
            let mut replica = TaskInstance::replica(Arc::clone(task), index);
            loop {
                if let Some((proc, core)) = self.place_replica(&mut replica)? {
                    debug!(task = %task.id(), name = task.name(), index, proc, core, vd = ?replica.virtual_deadline(), "placed replica");
                    break;
                }
                self.grow(task.id(), Role::Replica)?;
            }
        }
        Ok(())
    }

    fn place_primary(&mut self, instance: &mut TaskInstance) -> Option<(usize, usize)> {
        let estimate = self.num_procs_estimate;
        for offset in 0..estimate {
            let proc_id = (self.cursor + offset) % estimate;
            let Some(proc) = self.processors.get_mut(proc_id) else {
                continue;
            };
            for core_id in proc.cores_by_primary_load() {
                let Some(core) = proc.core_mut(core_id) else {
                    continue;
                };
                if core.try_admit(instance, true).is_ok() {
                    self.cursor = (proc_id + 1) % estimate;
                    return Some((proc_id, core_id));
                }
            }
        }
        None
    }

    fn place_replica(&mut self, instance: &mut TaskInstance) -> AllocResult<Option<(usize, usize)>> {
        let task_id = instance.id();
        let primary_proc = self
            .processors
            .iter()
            .position(|p| p.contains_primary(task_id))
            .ok_or(AllocError::PrimaryMissing { task_id })?;

        let guarded = instance.task().replicas() == 1;
        let forbidden: BTreeSet<TaskId> = if guarded {
            self.processors
                .get(primary_proc)
                .map(Processor::replica_task_ids)
                .unwrap_or_default()
        } else {
            BTreeSet::new()
        };
        let scope = self.config.diversity_scope;
        let estimate = self.num_procs_estimate;

        for offset in 0..estimate {
            let proc_id = (self.cursor + offset) % estimate;
            if proc_id == primary_proc {
                continue;
            }
            let Some(proc) = self.processors.get_mut(proc_id) else {
                continue;
            };
            if proc.contains_replica(task_id) {
                continue;
            }
            if guarded && scope == DiversityScope::Processor && proc.hosts_primary_in(&forbidden) {
                trace!(task = %task_id, proc = proc_id, "processor rejected by diversity rule");
                continue;
            }

            for core_id in 0..proc.cores().len() {
                let Some(core) = proc.core_mut(core_id) else {
                    continue;
                };
                if guarded
                    && scope == DiversityScope::Core
                    && core.primaries().iter().any(|t| forbidden.contains(&t.id()))
                {
                    trace!(task = %task_id, proc = proc_id, core = core_id, "core rejected by diversity rule");
                    continue;
                }
                if core.try_admit(instance, true).is_ok() {
                    self.cursor = (proc_id + 1) % estimate;
                    return Ok(Some((proc_id, core_id)));
                }
            }
        }
        Ok(None)
    }

    fn grow(&mut self, task_id: TaskId, role: Role) -> AllocResult<()> {
        let next = self.num_procs_estimate.saturating_add(1);
        if next > self.config.num_processors {
            return Err(AllocError::CeilingExceeded {
                task_id,
                role,
                estimate: next,
                ceiling: self.config.num_processors,
            });
        }
        info!(task = %task_id, %role, estimate = next, "growing processor estimate");
        self.num_procs_estimate = next;
        Ok(())
    }
}

/// Allocate `tasks` in one call.
///
/// # Errors
///
/// See [`Allocator::new`] and [`Allocator::run`].
pub fn allocate(
    config: AllocatorConfig,
    ordering: CriticalityOrdering,
    tasks: Vec<Task>,
) -> AllocResult<Allocation> {
    Allocator::new(config, ordering, tasks)?.run()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_level() -> Result<CriticalityOrdering, ModelError> {
        CriticalityOrdering::new([("QM", 0)], 1)
    }

    fn task(id: u32, wcet: Ticks, replicas: u32) -> Result<Task, ModelError> {
        Task::with_rank(1, TaskId(id), format!("t{id}"), 100, 100, 0, vec![wcet], replicas)
    }

    #[test]
    fn estimate_is_bounded_by_replicas() -> Result<(), ModelError> {
        let tasks = [task(1, 10, 2)?];
        assert_eq!(estimate_processors(&tasks, 4), 3);
        assert_eq!(estimate_processors(std::iter::empty(), 4), 1);
        Ok(())
    }

    #[test]
    fn estimate_tolerates_float_noise() -> Result<(), ModelError> {
        let tasks: Vec<Task> = (1..=5).map(|id| task(id, 60, 0)).collect::<Result<_, _>>()?;
        assert_eq!(estimate_processors(&tasks, 1), 3);
        Ok(())
    }

    #[test]
    fn rejects_zero_capacity() -> Result<(), ModelError> {
        let err = Allocator::new(AllocatorConfig::new(0, 1), single_level()?, vec![]);
        assert!(matches!(
            err,
            Err(AllocError::Model(ModelError::ZeroCapacity("num_processors")))
        ));
        Ok(())
    }

    #[test]
    fn rejects_duplicate_ids_and_oversized_catalogs() -> Result<(), ModelError> {
        let dup = vec![task(1, 10, 0)?, task(1, 10, 0)?];
        assert!(matches!(
            Allocator::new(AllocatorConfig::new(2, 1), single_level()?, dup),
            Err(AllocError::Model(ModelError::DuplicateTaskId(TaskId(1))))
        ));

        let many = vec![task(1, 10, 0)?, task(2, 10, 0)?];
        let config = AllocatorConfig::new(2, 1).with_max_tasks(1);
        assert!(matches!(
            Allocator::new(config, single_level()?, many),
            Err(AllocError::Model(ModelError::TooManyTasks { actual: 2, max: 1 }))
        ));
        Ok(())
    }

    #[test]
    fn sort_is_stable_within_groups() -> Result<(), ModelError> {
        let ordering = CriticalityOrdering::new([("LO", 0), ("HI", 1)], 2)?;
        let tasks: Vec<Arc<Task>> = [
            Task::with_rank(2, TaskId(1), "a", 10, 10, 0, vec![2, 2], 0)?,
            Task::with_rank(2, TaskId(2), "b", 10, 10, 1, vec![1, 3], 0)?,
            Task::with_rank(2, TaskId(3), "c", 10, 10, 0, vec![3, 3], 0)?,
            Task::with_rank(2, TaskId(4), "d", 10, 10, 0, vec![2, 2], 0)?,
        ]
        .into_iter()
        .map(Arc::new)
        .collect();

        let order: Vec<(usize, Vec<u32>)> = sort_tasks(&tasks, &ordering)
            .into_iter()
            .map(|(rank, group)| (rank, group.iter().map(|t| t.id().0).collect()))
            .collect();
        assert_eq!(order, vec![(1, vec![2]), (0, vec![3, 1, 4])]);
        Ok(())
    }
}
