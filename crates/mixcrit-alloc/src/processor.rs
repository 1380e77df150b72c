//! Processors: fixed groups of cores that fail together.

use std::collections::BTreeSet;

use crate::cores::{AdmissionSettings, Core};
use crate::task::TaskId;

/// A processor and its cores.
#[derive(Debug, Clone, PartialEq)]
pub struct Processor {
    id: usize,
    cores: Vec<Core>,
}

impl Processor {
    /// A processor with `num_cores` empty cores.
    pub fn new(id: usize, num_cores: usize, levels: usize, settings: AdmissionSettings) -> Self {
        let cores = (0..num_cores)
            .map(|core_id| Core::new(id, core_id, levels, settings))
            .collect();
        Self { id, cores }
    }

    /// Processor index.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Cores in index order.
    pub fn cores(&self) -> &[Core] {
        &self.cores
    }

    pub(crate) fn core_mut(&mut self, index: usize) -> Option<&mut Core> {
        self.cores.get_mut(index)
    }

    /// True when at least one core holds an instance.
    pub fn is_used(&self) -> bool {
        self.cores.iter().any(|c| !c.is_empty())
    }

    /// True when the primary of `task_id` lives on this processor.
    pub fn contains_primary(&self, task_id: TaskId) -> bool {
        self.cores.iter().any(|c| c.contains_primary(task_id))
    }

    /// True when a replica of `task_id` lives on this processor.
    pub fn contains_replica(&self, task_id: TaskId) -> bool {
        self.cores.iter().any(|c| c.contains_replica(task_id))
    }

    /// Tasks with at least one replica on this processor.
    pub fn replica_task_ids(&self) -> BTreeSet<TaskId> {
        self.cores
            .iter()
            .flat_map(|c| c.replicas().iter().map(|t| t.id()))
            .collect()
    }

    /// True when any primary on this processor belongs to a task in `ids`.
    pub fn hosts_primary_in(&self, ids: &BTreeSet<TaskId>) -> bool {
        self.cores
            .iter()
            .any(|c| c.primaries().iter().any(|t| ids.contains(&t.id())))
    }

    /// Core indices ordered by primary count, ties by index.
    pub fn cores_by_primary_load(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.cores.len()).collect();
        order.sort_by_key(|&i| self.cores.get(i).map_or(0, |c| c.primaries().len()));
        order
    }
}
