//! Cores and the transactional admission test.

use std::collections::BTreeMap;
use std::iter;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::dbf::DEFAULT_WINDOW_CAP;
use crate::error::AdmissionRejection;
use crate::task::{InstanceKey, Role, Task, TaskId, TaskInstance, Ticks};
use crate::tuning::tune_system;

/// Which ranks an admitted instance is charged against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UtilizationPolicy {
    /// Only ranks at which the task keeps running (`rank <= criticality`).
    #[default]
    ActiveLevels,
    /// Every rank, regardless of the task's criticality.
    AllLevels,
}

impl UtilizationPolicy {
    /// True when `task` is charged against the utilization at `rank`.
    pub fn counts(self, task: &Task, rank: usize) -> bool {
        match self {
            UtilizationPolicy::ActiveLevels => task.is_active_at(rank),
            UtilizationPolicy::AllLevels => true,
        }
    }
}

/// Per-core admission parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionSettings {
    /// Utilization accounting rule.
    pub utilization_policy: UtilizationPolicy,
    /// Upper bound on the demand-bound search window.
    pub window_cap: Ticks,
}

impl Default for AdmissionSettings {
    fn default() -> Self {
        Self {
            utilization_policy: UtilizationPolicy::default(),
            window_cap: DEFAULT_WINDOW_CAP,
        }
    }
}

impl AdmissionSettings {
    /// Set the utilization accounting rule.
    pub fn with_utilization_policy(mut self, policy: UtilizationPolicy) -> Self {
        self.utilization_policy = policy;
        self
    }

    /// Set the search window cap.
    pub fn with_window_cap(mut self, cap: Ticks) -> Self {
        self.window_cap = cap;
        self
    }
}

/// Virtual deadlines of a set of instances, keyed by identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeadlineSnapshot {
    entries: BTreeMap<InstanceKey, Vec<Ticks>>,
}

impl DeadlineSnapshot {
    /// Record the current virtual deadlines of `instances`.
    pub fn capture<'a, I>(instances: I) -> Self
    where
        I: IntoIterator<Item = &'a TaskInstance>,
    {
        let entries = instances
            .into_iter()
            .map(|t| (t.key(), t.virtual_deadline().to_vec()))
            .collect();
        Self { entries }
    }

    /// Write the recorded deadlines back. Instances not in the snapshot are
    /// left alone.
    pub fn restore(&self, instances: &mut [&mut TaskInstance]) {
        for inst in instances.iter_mut() {
            if let Some(saved) = self.entries.get(&inst.key()) {
                inst.replace_virtual_deadline(saved);
            }
        }
    }

    /// Recorded deadlines of `key`.
    pub fn get(&self, key: &InstanceKey) -> Option<&[Ticks]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    /// Number of recorded instances.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A single core: its admitted instances and per-rank utilization.
#[derive(Debug, Clone, PartialEq)]
pub struct Core {
    id: usize,
    processor_id: usize,
    levels: usize,
    settings: AdmissionSettings,
    primaries: Vec<TaskInstance>,
    replicas: Vec<TaskInstance>,
    utilization: Vec<f64>,
}

impl Core {
    /// An empty core for a system with `levels` criticality levels.
    pub fn new(processor_id: usize, id: usize, levels: usize, settings: AdmissionSettings) -> Self {
        Self {
            id,
            processor_id,
            levels,
            settings,
            primaries: Vec::new(),
            replicas: Vec::new(),
            utilization: vec![0.0; levels],
        }
    }

    /// Core index within its processor.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Owning processor.
    pub fn processor_id(&self) -> usize {
        self.processor_id
    }

    /// Admitted primaries, in admission order.
    pub fn primaries(&self) -> &[TaskInstance] {
        &self.primaries
    }

    /// Admitted replicas, in admission order.
    pub fn replicas(&self) -> &[TaskInstance] {
        &self.replicas
    }

    /// Primaries followed by replicas.
    pub fn instances(&self) -> impl Iterator<Item = &TaskInstance> {
        self.primaries.iter().chain(self.replicas.iter())
    }

    /// Committed utilization indexed by rank.
    pub fn utilization(&self) -> &[f64] {
        &self.utilization
    }

    /// True when no instance has been admitted.
    pub fn is_empty(&self) -> bool {
        self.primaries.is_empty() && self.replicas.is_empty()
    }

    /// True when the primary of `task_id` lives here.
    pub fn contains_primary(&self, task_id: TaskId) -> bool {
        self.primaries.iter().any(|t| t.id() == task_id)
    }

    /// True when a replica of `task_id` lives here.
    pub fn contains_replica(&self, task_id: TaskId) -> bool {
        self.replicas.iter().any(|t| t.id() == task_id)
    }

    /// Try to admit `instance`.
    ///
    /// Every resident and the candidate are reset and re-tuned from the
    /// highest rank down. On success with `commit`, a copy of the tuned
    /// candidate joins the core and the utilization is charged; `instance`
    /// keeps its tuned deadlines. On failure, or when `commit` is false, the
    /// virtual deadlines of every resident and of `instance` are restored
    /// to their values before the call.
    ///
    /// # Errors
    ///
    /// Returns why the core cannot take the instance.
    pub fn try_admit(
        &mut self,
        instance: &mut TaskInstance,
        commit: bool,
    ) -> Result<(), AdmissionRejection> {
        let outcome = {
            let mut affected: Vec<&mut TaskInstance> = self
                .primaries
                .iter_mut()
                .chain(self.replicas.iter_mut())
                .chain(iter::once(&mut *instance))
                .collect();
            let snapshot = DeadlineSnapshot::capture(affected.iter().map(|t| &**t));

            let outcome = tune_system(&mut affected, &self.utilization, self.levels, &self.settings);
            if outcome.is_err() || !commit {
                snapshot.restore(&mut affected);
            }
            outcome
        };

        if let Err(reason) = outcome {
            trace!(
                processor = self.processor_id,
                core = self.id,
                task = %instance.id(),
                role = %instance.role(),
                %reason,
                "admission rejected"
            );
            return Err(reason);
        }
        if commit {
            self.commit(instance);
        }
        Ok(())
    }

    fn commit(&mut self, instance: &TaskInstance) {
        let policy = self.settings.utilization_policy;
        for (rank, slot) in self.utilization.iter_mut().enumerate() {
            if policy.counts(instance.task(), rank) {
                *slot += instance.task().utilization(rank);
            }
        }
        match instance.role() {
            Role::Primary => self.primaries.push(instance.clone()),
            Role::Replica => self.replicas.push(instance.clone()),
        }
    }
}
