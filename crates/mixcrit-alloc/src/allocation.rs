//! Allocation result: where every instance landed and with which deadlines.

use serde::{Deserialize, Serialize};

use crate::criticality::CriticalityOrdering;
use crate::processor::Processor;
use crate::task::{Role, TaskId, TaskInstance, Ticks};

/// Placement and tuned deadlines of one instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstancePlacement {
    /// Task identifier.
    pub task_id: TaskId,
    /// Task name.
    pub task_name: String,
    /// Primary or replica.
    pub role: Role,
    /// 0 for the primary, 1-based for replicas.
    pub replica_index: u32,
    /// Hosting processor.
    pub processor_id: usize,
    /// Hosting core within the processor.
    pub core_id: usize,
    /// Tuned virtual deadline per rank.
    pub virtual_deadline: Vec<Ticks>,
}

impl InstancePlacement {
    fn from_instance(instance: &TaskInstance, processor_id: usize, core_id: usize) -> Self {
        Self {
            task_id: instance.id(),
            task_name: instance.task().name().to_owned(),
            role: instance.role(),
            replica_index: instance.replica_index(),
            processor_id,
            core_id,
            virtual_deadline: instance.virtual_deadline().to_vec(),
        }
    }
}

/// Final state of one core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreSnapshot {
    /// Owning processor.
    pub processor_id: usize,
    /// Core index within the processor.
    pub core_id: usize,
    /// Committed utilization per rank.
    pub utilization: Vec<f64>,
    /// Primaries in admission order.
    pub primaries: Vec<TaskId>,
    /// Replicas in admission order.
    pub replicas: Vec<TaskId>,
}

impl CoreSnapshot {
    /// True when the core hosts nothing.
    pub fn is_empty(&self) -> bool {
        self.primaries.is_empty() && self.replicas.is_empty()
    }
}

/// Complete allocation of a catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    /// Criticality level names by rank.
    pub levels: Vec<String>,
    /// Processors available to the run.
    pub num_processors: usize,
    /// Cores per processor.
    pub cores_per_processor: usize,
    /// Processor estimate when the run finished.
    pub num_procs_estimate: usize,
    /// Every instance, ordered by processor, core, primaries then replicas.
    pub placements: Vec<InstancePlacement>,
    /// Every core of every processor, used or not.
    pub cores: Vec<CoreSnapshot>,
}

impl Allocation {
    pub(crate) fn from_processors(
        ordering: &CriticalityOrdering,
        processors: &[Processor],
        cores_per_processor: usize,
        num_procs_estimate: usize,
    ) -> Self {
        let mut placements = Vec::new();
        let mut cores = Vec::new();

        for proc in processors {
            for core in proc.cores() {
                placements.extend(
                    core.instances()
                        .map(|inst| InstancePlacement::from_instance(inst, proc.id(), core.id())),
                );
                cores.push(CoreSnapshot {
                    processor_id: proc.id(),
                    core_id: core.id(),
                    utilization: core.utilization().to_vec(),
                    primaries: core.primaries().iter().map(TaskInstance::id).collect(),
                    replicas: core.replicas().iter().map(TaskInstance::id).collect(),
                });
            }
        }

        Self {
            levels: ordering.names().to_vec(),
            num_processors: processors.len(),
            cores_per_processor,
            num_procs_estimate,
            placements,
            cores,
        }
    }

    /// Placement of the primary of `task_id`.
    pub fn primary_of(&self, task_id: TaskId) -> Option<&InstancePlacement> {
        self.placements
            .iter()
            .find(|p| p.task_id == task_id && p.role == Role::Primary)
    }

    /// Placements of the replicas of `task_id`, by replica index.
    pub fn replicas_of(&self, task_id: TaskId) -> Vec<&InstancePlacement> {
        let mut replicas: Vec<&InstancePlacement> = self
            .placements
            .iter()
            .filter(|p| p.task_id == task_id && p.role == Role::Replica)
            .collect();
        replicas.sort_by_key(|p| p.replica_index);
        replicas
    }

    /// Placements on one core.
    pub fn placements_on(
        &self,
        processor_id: usize,
        core_id: usize,
    ) -> impl Iterator<Item = &InstancePlacement> {
        self.placements
            .iter()
            .filter(move |p| p.processor_id == processor_id && p.core_id == core_id)
    }

    /// Cores of one processor.
    pub fn cores_of(&self, processor_id: usize) -> impl Iterator<Item = &CoreSnapshot> {
        self.cores
            .iter()
            .filter(move |c| c.processor_id == processor_id)
    }

    /// Name of `task_id` as recorded in the placements.
    pub fn task_name(&self, task_id: TaskId) -> Option<&str> {
        self.placements
            .iter()
            .find(|p| p.task_id == task_id)
            .map(|p| p.task_name.as_str())
    }

    /// Number of distinct tasks placed.
    pub fn task_count(&self) -> usize {
        let mut ids: Vec<TaskId> = self.placements.iter().map(|p| p.task_id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids.len()
    }

    /// Number of placed instances.
    pub fn instance_count(&self) -> usize {
        self.placements.len()
    }

    /// Number of processors hosting at least one instance.
    pub fn processors_used(&self) -> usize {
        (0..self.num_processors)
            .filter(|&p| self.cores_of(p).any(|c| !c.is_empty()))
            .count()
    }

    /// Number of cores hosting at least one instance.
    pub fn cores_used(&self) -> usize {
        self.cores.iter().filter(|c| !c.is_empty()).count()
    }
}
