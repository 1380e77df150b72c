//! Integration tests for the allocation crate.

mod common;

use common::{TestResult, heavy_tasks, single_level, task, two_levels};
use mixcrit_alloc::{
    AllocError, Allocation, Allocator, AllocatorConfig, CriticalityOrdering, ModelError, Role,
    Task, TaskId, UtilizationPolicy, allocate, estimate_processors, verify_allocation,
};

fn mixed_catalog() -> Result<(CriticalityOrdering, Vec<Task>), ModelError> {
    let ordering = two_levels()?;
    let tasks = vec![
        task(&ordering, 1, "brake", 20, "HI", vec![2, 4], 1)?,
        task(&ordering, 2, "steer", 10, "HI", vec![1, 3], 2)?,
        task(&ordering, 3, "radio", 40, "LO", vec![8, 8], 0)?,
        task(&ordering, 4, "nav", 20, "LO", vec![5, 5], 1)?,
    ];
    Ok((ordering, tasks))
}

#[test]
fn test_placements_are_ordered_by_processor_and_core() -> TestResult {
    let (ordering, tasks) = mixed_catalog()?;
    let allocation = allocate(AllocatorConfig::new(4, 2), ordering, tasks)?;

    let keys: Vec<(usize, usize)> = allocation
        .placements
        .iter()
        .map(|p| (p.processor_id, p.core_id))
        .collect();
    let mut sorted = keys.clone();
    sorted.sort_unstable();
    assert_eq!(keys, sorted);

    for core in &allocation.cores {
        let roles: Vec<Role> = allocation
            .placements_on(core.processor_id, core.core_id)
            .map(|p| p.role)
            .collect();
        let first_replica = roles.iter().position(|r| *r == Role::Replica).unwrap_or(roles.len());
        assert!(roles.iter().skip(first_replica).all(|r| *r == Role::Replica));
    }
    Ok(())
}

#[test]
fn test_every_instance_is_placed_once() -> TestResult {
    let (ordering, tasks) = mixed_catalog()?;
    let allocation = allocate(AllocatorConfig::new(4, 2), ordering, tasks)?;

    assert_eq!(allocation.task_count(), 4);
    assert_eq!(allocation.instance_count(), 4 + 1 + 2 + 1);
    assert_eq!(allocation.replicas_of(TaskId(2)).len(), 2);
    assert_eq!(allocation.task_name(TaskId(3)), Some("radio"));
    assert_eq!(allocation.levels, vec!["LO".to_owned(), "HI".to_owned()]);
    assert_eq!(allocation.cores.len(), 8);
    assert!(allocation.cores_used() >= 3);
    assert!(allocation.processors_used() >= 3);
    Ok(())
}

#[test]
fn test_allocation_is_deterministic() -> TestResult {
    let (ordering, tasks) = mixed_catalog()?;
    let first = allocate(AllocatorConfig::new(4, 2), ordering.clone(), tasks.clone())?;
    let second = allocate(AllocatorConfig::new(4, 2), ordering, tasks)?;
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn test_allocation_survives_a_json_round_trip() -> TestResult {
    let (ordering, tasks) = mixed_catalog()?;
    let allocation = allocate(AllocatorConfig::new(4, 2), ordering, tasks)?;

    let json = serde_json::to_string(&allocation)?;
    assert!(json.contains("\"role\":\"replica\""));
    assert!(json.contains("\"num_procs_estimate\""));
    let back: Allocation = serde_json::from_str(&json)?;
    assert_eq!(back.placements, allocation.placements);
    Ok(())
}

#[test]
fn test_allocator_exposes_the_initial_estimate() -> TestResult {
    let (ordering, tasks) = mixed_catalog()?;
    let expected = estimate_processors(&tasks, 2);
    let allocator = Allocator::new(AllocatorConfig::new(4, 2), ordering, tasks)?;
    // steer has two replicas, so at least three processors.
    assert_eq!(expected, 3);
    assert_eq!(allocator.num_procs_estimate(), expected);
    assert_eq!(allocator.processors().len(), 4);
    Ok(())
}

#[test]
fn test_verified_under_both_utilization_policies() -> TestResult {
    let (ordering, tasks) = mixed_catalog()?;
    for policy in [UtilizationPolicy::ActiveLevels, UtilizationPolicy::AllLevels] {
        let config = AllocatorConfig::new(6, 2).with_utilization_policy(policy);
        let allocation = allocate(config.clone(), ordering.clone(), tasks.clone())?;
        let violations = verify_allocation(&allocation, &ordering, &tasks, &config);
        assert!(violations.is_empty(), "{policy:?}: {violations:?}");
    }
    Ok(())
}

#[test]
fn test_error_messages() -> TestResult {
    let ordering = single_level()?;
    let err = allocate(AllocatorConfig::new(2, 1), ordering.clone(), heavy_tasks(&ordering, 3)?)
        .err()
        .ok_or("allocation should fail")?;
    assert!(err.is_capacity_failure());
    insta::assert_snapshot!(
        err.to_string(),
        @"Insufficient processors: placing the primary of task 3 needs 3 processors, only 2 available"
    );

    let err = allocate(AllocatorConfig::new(2, 1), ordering.clone(), heavy_tasks(&ordering, 5)?)
        .err()
        .ok_or("allocation should fail")?;
    insta::assert_snapshot!(
        err.to_string(),
        @"Initial processor estimate 3 exceeds the 2 available processors"
    );

    let err = AllocError::from(ModelError::UnknownCriticality {
        task_id: TaskId(9),
        level: "SIL_4".into(),
    });
    insta::assert_snapshot!(
        err.to_string(),
        @"Task 9 references unknown criticality level 'SIL_4'"
    );
    Ok(())
}

#[test]
fn test_wrong_level_count_is_rejected_by_the_allocator() -> TestResult {
    let three = CriticalityOrdering::new([("LO", 0), ("MID", 1), ("HI", 2)], 3)?;
    let two = two_levels()?;
    let tasks = vec![task(&two, 1, "a", 10, "HI", vec![1, 2], 0)?];
    assert!(matches!(
        Allocator::new(AllocatorConfig::new(1, 1), three, tasks),
        Err(AllocError::Model(ModelError::WcetLength {
            expected: 3,
            actual: 2,
            ..
        }))
    ));
    Ok(())
}
