//! Property-based tests for the allocation crate.
//!
//! Random catalogs use harmonic periods so that the demand-bound search
//! window stays small and every case runs the full tuning protocol.

use std::sync::Arc;

use mixcrit_alloc::dbf::{baseline_demand, mode_demand, window_bound};
use mixcrit_alloc::{
    AdmissionSettings, AllocError, AllocatorConfig, Core, CriticalityOrdering, DiversityScope,
    ModelError, Task, TaskId, TaskInstance, Ticks, UtilizationPolicy, allocate, verify_allocation,
};
use proptest::prelude::*;
use quickcheck::TestResult;
use quickcheck_macros::quickcheck;

#[derive(Debug, Clone)]
struct TaskSpec {
    period: Ticks,
    deadline: Ticks,
    criticality: usize,
    wcet: Vec<Ticks>,
    replicas: u32,
}

fn task_spec(levels: usize) -> impl Strategy<Value = TaskSpec> {
    (
        prop::sample::select(vec![10u64, 20, 40, 80]),
        0..levels,
        0u32..=2,
        prop::collection::vec(1u64..=4, levels),
        50u64..=100,
    )
        .prop_map(move |(period, criticality, replicas, increments, percent)| {
            let deadline = (period * percent / 100).max(1);
            // Non-decreasing by rank and never above the deadline.
            let wcet = increments
                .iter()
                .scan(0u64, |acc, inc| {
                    *acc += inc;
                    Some((*acc).min(deadline))
                })
                .collect();
            TaskSpec {
                period,
                deadline,
                criticality,
                wcet,
                replicas,
            }
        })
}

fn catalog() -> impl Strategy<Value = (usize, Vec<TaskSpec>)> {
    (1usize..=3).prop_flat_map(|levels| {
        (
            Just(levels),
            prop::collection::vec(task_spec(levels), 1..=8),
        )
    })
}

fn build(levels: usize, specs: &[TaskSpec]) -> Result<(CriticalityOrdering, Vec<Task>), ModelError> {
    let ordering = CriticalityOrdering::new((0..levels).map(|r| (format!("L{r}"), r)), levels)?;
    let tasks = specs
        .iter()
        .zip(1u32..)
        .map(|(s, id)| {
            Task::with_rank(
                levels,
                TaskId(id),
                format!("t{id}"),
                s.period,
                s.deadline,
                s.criticality,
                s.wcet.clone(),
                s.replicas,
            )
        })
        .collect::<Result<_, _>>()?;
    Ok((ordering, tasks))
}

fn fail(e: impl std::fmt::Display) -> TestCaseError {
    TestCaseError::fail(e.to_string())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Every successful allocation passes the independent re-check.
    #[test]
    fn prop_successful_allocations_verify(
        (levels, specs) in catalog(),
        all_levels in any::<bool>(),
        processor_scope in any::<bool>(),
    ) {
        let (ordering, tasks) = build(levels, &specs).map_err(fail)?;
        let policy = if all_levels { UtilizationPolicy::AllLevels } else { UtilizationPolicy::ActiveLevels };
        let scope = if processor_scope { DiversityScope::Processor } else { DiversityScope::Core };
        let config = AllocatorConfig::new(12, 2)
            .with_utilization_policy(policy)
            .with_diversity_scope(scope);

        match allocate(config.clone(), ordering.clone(), tasks.clone()) {
            Ok(allocation) => {
                let violations = verify_allocation(&allocation, &ordering, &tasks, &config);
                prop_assert!(violations.is_empty(), "violations: {violations:?}");
                prop_assert!(allocation.num_procs_estimate <= 12);
                prop_assert!(allocation.processors_used() <= allocation.num_procs_estimate);
            }
            Err(e) if e.is_capacity_failure() => {}
            Err(e) => return Err(fail(e)),
        }
    }

    /// Identical input gives identical output, failures included.
    #[test]
    fn prop_allocation_is_deterministic((levels, specs) in catalog()) {
        let (ordering, tasks) = build(levels, &specs).map_err(fail)?;
        let config = AllocatorConfig::new(6, 2);
        let first = allocate(config.clone(), ordering.clone(), tasks.clone());
        let second = allocate(config, ordering, tasks);
        prop_assert_eq!(first, second);
    }

    /// A dry run, or a rejected admission, leaves the core and the candidate
    /// exactly as they were.
    #[test]
    fn prop_admission_rolls_back((levels, specs) in catalog(), commit in any::<bool>()) {
        let (_, tasks) = build(levels, &specs).map_err(fail)?;
        let mut instances: Vec<TaskInstance> =
            tasks.into_iter().map(|t| TaskInstance::primary(Arc::new(t))).collect();
        let Some(mut candidate) = instances.pop() else {
            return Ok(());
        };

        let mut core = Core::new(0, 0, levels, AdmissionSettings::default());
        let mut admitted = 0usize;
        for inst in &mut instances {
            if core.try_admit(inst, true).is_ok() {
                admitted += 1;
            }
        }
        prop_assert_eq!(core.instances().count(), admitted);

        let core_before = core.clone();
        let candidate_before = candidate.clone();
        let outcome = core.try_admit(&mut candidate, commit);

        if outcome.is_err() || !commit {
            prop_assert_eq!(&core, &core_before);
            prop_assert_eq!(&candidate, &candidate_before);
        } else {
            prop_assert_eq!(core.instances().count(), core_before.instances().count() + 1);
            prop_assert!(core.instances().any(|i| i == &candidate));
        }
    }

    /// Tuned deadlines stay between the WCET and the nominal deadline.
    #[test]
    fn prop_virtual_deadlines_are_bounded((levels, specs) in catalog()) {
        let (ordering, tasks) = build(levels, &specs).map_err(fail)?;
        let allocation = match allocate(AllocatorConfig::new(12, 2), ordering, tasks.clone()) {
            Ok(allocation) => allocation,
            Err(AllocError::CeilingExceeded { .. } | AllocError::InfeasibleAtStart { .. }) => return Ok(()),
            Err(e) => return Err(fail(e)),
        };
        for placement in &allocation.placements {
            let task = tasks
                .iter()
                .find(|t| t.id() == placement.task_id)
                .ok_or_else(|| fail("placement of unknown task"))?;
            for (rank, &vd) in placement.virtual_deadline.iter().enumerate() {
                prop_assert!(vd <= task.deadline());
                if task.is_active_at(rank) {
                    prop_assert!(vd >= task.wcet_at(rank));
                }
            }
        }
    }
}

fn single_task(period: u8, wcet: u8) -> Option<TaskInstance> {
    let period = Ticks::from(period % 50) + 1;
    let wcet0 = Ticks::from(wcet) % period + 1;
    let task = Task::with_rank(2, TaskId(1), "q", period, period, 1, vec![wcet0, period], 0).ok()?;
    Some(TaskInstance::primary(Arc::new(task)))
}

#[quickcheck]
fn baseline_demand_is_monotone_in_the_window(period: u8, wcet: u8, window: u16) -> TestResult {
    let Some(inst) = single_task(period, wcet) else {
        return TestResult::discard();
    };
    let l = i64::from(window);
    let now = baseline_demand(&inst, l);
    TestResult::from_bool(now >= 0 && now <= baseline_demand(&inst, l + 1))
}

#[quickcheck]
fn mode_demand_never_exceeds_full_jobs(period: u8, wcet: u8, window: u16) -> TestResult {
    let Some(inst) = single_task(period, wcet) else {
        return TestResult::discard();
    };
    let l = i64::from(window);
    let jobs = l / i64::try_from(inst.period()).unwrap_or(i64::MAX) + 1;
    let ceiling = jobs * i64::try_from(inst.wcet_at(1)).unwrap_or(i64::MAX);
    let demand = mode_demand(&inst, 0, l);
    TestResult::from_bool((0..=ceiling).contains(&demand))
}

#[quickcheck]
fn window_bound_respects_the_cap(period: u8, wcet: u8, cap: u16) -> TestResult {
    let Some(inst) = single_task(period, wcet) else {
        return TestResult::discard();
    };
    TestResult::from_bool(window_bound([&inst], 0, Ticks::from(cap)) <= Ticks::from(cap))
}
