//! Independent re-check of a finished allocation.
//!
//! Nothing here trusts the allocator's bookkeeping: utilization is summed
//! again from the catalog, demand is recomputed from the recorded virtual
//! deadlines, and instance counts are rebuilt from the placements.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::UTILIZATION_EPSILON;
use crate::allocation::{Allocation, InstancePlacement};
use crate::allocator::{AllocatorConfig, DiversityScope};
use crate::criticality::CriticalityOrdering;
use crate::dbf::{signed, total_baseline_demand, total_mode_demand, window_bound};
use crate::task::{Role, Task, TaskId, TaskInstance, Ticks};

/// A property the allocation fails to satisfy.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Violation {
    /// Summed utilization on a core exceeds one.
    #[error("Core {processor_id}.{core_id} utilization {utilization:.4} exceeds 1.0 at rank {rank}")]
    UtilizationExceeded {
        /// Processor
        processor_id: usize,
        /// Core
        core_id: usize,
        /// Rank
        rank: usize,
        /// Recomputed utilization
        utilization: f64,
    },

    /// A virtual deadline lies outside `[wcet, deadline]`.
    #[error(
        "Task {task_id} {role} #{replica_index}: virtual deadline {virtual_deadline} at rank {rank} outside [{lower}, {upper}]"
    )]
    DeadlineOutOfRange {
        /// Task
        task_id: TaskId,
        /// Instance role
        role: Role,
        /// Replica index
        replica_index: u32,
        /// Rank
        rank: usize,
        /// Recorded virtual deadline
        virtual_deadline: Ticks,
        /// WCET at the rank, or 0 where the task is inactive
        lower: Ticks,
        /// Nominal deadline
        upper: Ticks,
    },

    /// A placement records the wrong number of virtual deadlines.
    #[error("Task {task_id} {role} records {actual} virtual deadlines, expected {expected}")]
    DeadlineVectorLength {
        /// Task
        task_id: TaskId,
        /// Instance role
        role: Role,
        /// Number of levels
        expected: usize,
        /// Recorded length
        actual: usize,
    },

    /// Baseline demand exceeds the window on a core.
    #[error("Core {processor_id}.{core_id}: baseline demand {demand} exceeds window {window}")]
    BaselineExceeded {
        /// Processor
        processor_id: usize,
        /// Core
        core_id: usize,
        /// Window length
        window: i64,
        /// Demand in the window
        demand: i64,
    },

    /// Mode-switch demand exceeds the window on a core.
    #[error(
        "Core {processor_id}.{core_id}: demand {demand} of mode switch {rank}->{next} exceeds window {window}",
        next = .rank + 1
    )]
    DemandExceeded {
        /// Processor
        processor_id: usize,
        /// Core
        core_id: usize,
        /// Lower rank of the switch
        rank: usize,
        /// Window length
        window: i64,
        /// Demand in the window
        demand: i64,
    },

    /// A placement names a task that is not in the catalog.
    #[error("Placement references unknown task {task_id}")]
    UnknownTask {
        /// Task
        task_id: TaskId,
    },

    /// A task has no primary, or more than one.
    #[error("Task {task_id} has {count} primaries")]
    PrimaryCount {
        /// Task
        task_id: TaskId,
        /// Number of primaries found
        count: usize,
    },

    /// A task has the wrong number of replicas.
    #[error("Task {task_id} has {actual} replicas, expected {expected}")]
    ReplicaCount {
        /// Task
        task_id: TaskId,
        /// Requested replicas
        expected: usize,
        /// Replicas found
        actual: usize,
    },

    /// A replica shares the processor of its primary.
    #[error("Task {task_id} has a replica on processor {processor_id}, which hosts its primary")]
    ReplicaWithPrimary {
        /// Task
        task_id: TaskId,
        /// Shared processor
        processor_id: usize,
    },

    /// Two replicas of one task share a processor.
    #[error("Task {task_id} has several replicas on processor {processor_id}")]
    ReplicasColocated {
        /// Task
        task_id: TaskId,
        /// Shared processor
        processor_id: usize,
    },

    /// Two single-replica tasks mirror each other across two processors.
    #[error(
        "Tasks {first} and {second} mirror each other across processors {first_processor} and {second_processor}"
    )]
    MirroredReplicas {
        /// First task
        first: TaskId,
        /// Second task
        second: TaskId,
        /// Processor of the first primary
        first_processor: usize,
        /// Processor of the second primary
        second_processor: usize,
    },
}

/// Re-check `allocation` against the catalog it was built from.
///
/// Returns every violation found; an empty list means the allocation holds.
/// The mirror check only runs under [`DiversityScope::Processor`], the scope
/// that rules mirrors out.
pub fn verify_allocation(
    allocation: &Allocation,
    ordering: &CriticalityOrdering,
    tasks: &[Task],
    config: &AllocatorConfig,
) -> Vec<Violation> {
    let catalog: BTreeMap<TaskId, Arc<Task>> = tasks
        .iter()
        .map(|t| (t.id(), Arc::new(t.clone())))
        .collect();
    let mut violations = Vec::new();

    check_completeness(allocation, &catalog, &mut violations);
    check_deadlines(allocation, ordering, &catalog, &mut violations);
    check_cores(allocation, ordering, &catalog, config, &mut violations);
    if config.diversity_scope == DiversityScope::Processor {
        check_mirrors(allocation, &catalog, &mut violations);
    }
    violations
}

fn check_completeness(
    allocation: &Allocation,
    catalog: &BTreeMap<TaskId, Arc<Task>>,
    violations: &mut Vec<Violation>,
) {
    for placement in &allocation.placements {
        if !catalog.contains_key(&placement.task_id) {
            violations.push(Violation::UnknownTask {
                task_id: placement.task_id,
            });
        }
    }

    for (&task_id, task) in catalog {
        let primaries: Vec<&InstancePlacement> = allocation
            .placements
            .iter()
            .filter(|p| p.task_id == task_id && p.role == Role::Primary)
            .collect();
        if primaries.len() != 1 {
            violations.push(Violation::PrimaryCount {
                task_id,
                count: primaries.len(),
            });
        }

        let replicas = allocation.replicas_of(task_id);
        let expected = usize::try_from(task.replicas()).unwrap_or(usize::MAX);
        if replicas.len() != expected {
            violations.push(Violation::ReplicaCount {
                task_id,
                expected,
                actual: replicas.len(),
            });
        }

        let primary_procs: BTreeSet<usize> = primaries.iter().map(|p| p.processor_id).collect();
        let mut replica_procs = BTreeSet::new();
        for replica in replicas {
            if primary_procs.contains(&replica.processor_id) {
                violations.push(Violation::ReplicaWithPrimary {
                    task_id,
                    processor_id: replica.processor_id,
                });
            }
            if !replica_procs.insert(replica.processor_id) {
                violations.push(Violation::ReplicasColocated {
                    task_id,
                    processor_id: replica.processor_id,
                });
            }
        }
    }
}

fn check_deadlines(
    allocation: &Allocation,
    ordering: &CriticalityOrdering,
    catalog: &BTreeMap<TaskId, Arc<Task>>,
    violations: &mut Vec<Violation>,
) {
    for placement in &allocation.placements {
        let Some(task) = catalog.get(&placement.task_id) else {
            continue;
        };
        if placement.virtual_deadline.len() != ordering.levels() {
            violations.push(Violation::DeadlineVectorLength {
                task_id: placement.task_id,
                role: placement.role,
                expected: ordering.levels(),
                actual: placement.virtual_deadline.len(),
            });
            continue;
        }
        for (rank, &vd) in placement.virtual_deadline.iter().enumerate() {
            let lower = if task.is_active_at(rank) {
                task.wcet_at(rank)
            } else {
                0
            };
            let upper = task.deadline();
            if vd < lower || vd > upper {
                violations.push(Violation::DeadlineOutOfRange {
                    task_id: placement.task_id,
                    role: placement.role,
                    replica_index: placement.replica_index,
                    rank,
                    virtual_deadline: vd,
                    lower,
                    upper,
                });
            }
        }
    }
}

fn rebuild(placement: &InstancePlacement, task: &Arc<Task>) -> TaskInstance {
    let mut instance = match placement.role {
        Role::Primary => TaskInstance::primary(Arc::clone(task)),
        Role::Replica => TaskInstance::replica(Arc::clone(task), placement.replica_index),
    };
    instance.replace_virtual_deadline(&placement.virtual_deadline);
    instance
}

fn check_cores(
    allocation: &Allocation,
    ordering: &CriticalityOrdering,
    catalog: &BTreeMap<TaskId, Arc<Task>>,
    config: &AllocatorConfig,
    violations: &mut Vec<Violation>,
) {
    let levels = ordering.levels();
    for core in &allocation.cores {
        let (processor_id, core_id) = (core.processor_id, core.core_id);
        let instances: Vec<TaskInstance> = allocation
            .placements_on(processor_id, core_id)
            .filter(|p| p.virtual_deadline.len() == levels)
            .filter_map(|p| catalog.get(&p.task_id).map(|task| rebuild(p, task)))
            .collect();

        for rank in 0..levels {
            let utilization: f64 = instances
                .iter()
                .filter(|i| config.utilization_policy.counts(i.task(), rank))
                .map(|i| i.task().utilization(rank))
                .sum();
            if utilization > 1.0 + UTILIZATION_EPSILON {
                violations.push(Violation::UtilizationExceeded {
                    processor_id,
                    core_id,
                    rank,
                    utilization,
                });
            }
        }

        // A single-level core still gets the baseline pair at rank 0.
        for m in 0..ordering.top_rank().max(1) {
            let l_max = signed(window_bound(&instances, m, config.window_cap));
            for window in 0..=l_max {
                if m == 0 {
                    let demand = total_baseline_demand(&instances, window);
                    if demand > window {
                        violations.push(Violation::BaselineExceeded {
                            processor_id,
                            core_id,
                            window,
                            demand,
                        });
                        break;
                    }
                }
                let demand = total_mode_demand(&instances, m, window);
                if demand > window {
                    violations.push(Violation::DemandExceeded {
                        processor_id,
                        core_id,
                        rank: m,
                        window,
                        demand,
                    });
                    break;
                }
            }
        }
    }
}

fn check_mirrors(
    allocation: &Allocation,
    catalog: &BTreeMap<TaskId, Arc<Task>>,
    violations: &mut Vec<Violation>,
) {
    // (task, primary processor, replica processor) for single-replica tasks.
    let pairs: Vec<(TaskId, usize, usize)> = catalog
        .iter()
        .filter(|(_, task)| task.replicas() == 1)
        .filter_map(|(&id, _)| {
            let primary = allocation.primary_of(id)?;
            let replica = allocation.replicas_of(id).into_iter().next()?;
            Some((id, primary.processor_id, replica.processor_id))
        })
        .collect();

    for (i, &(first, p1, r1)) in pairs.iter().enumerate() {
        for &(second, p2, r2) in pairs.iter().skip(i + 1) {
            if r1 == p2 && r2 == p1 {
                violations.push(Violation::MirroredReplicas {
                    first,
                    second,
                    first_processor: p1,
                    second_processor: p2,
                });
            }
        }
    }
}
