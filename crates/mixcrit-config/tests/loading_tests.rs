//! Loading documents from disk.

use std::fs;

use mixcrit_alloc::{AllocError, DiversityScope, ModelError, TaskId, allocate};
use mixcrit_config::{AllocationInput, ConfigError, Format, SystemConfig, TaskSet, parse_str};
use proptest::prelude::*;
use tempfile::TempDir;

type TestResult = Result<(), Box<dyn std::error::Error>>;

const SYSTEM_YAML: &str = "\
system:
  num_processors: 4
  num_cores_per_processor: 2
  max_tasks: 10
criticality_levels:
  max_levels: 2
  levels:
    HI: 1
    LO: 0
allocation:
  diversity_scope: processor
";

const TASKS_YAML: &str = "\
tasks:
  - { taskId: 1, name: brake, period: 10, deadline: 10, criticality: HI, wcet: [2, 4], replicas: 1 }
  - { taskId: 2, name: radio, period: 20, deadline: 20, criticality: LO, wcet: [5, 5] }
";

const TASKS_JSON: &str = r#"{
  "tasks": [
    { "taskId": 1, "name": "brake", "period": 10, "deadline": 10, "criticality": "HI", "wcet": [2, 4], "replicas": 1 },
    { "taskId": 2, "name": "radio", "period": 20, "deadline": 20, "criticality": "LO", "wcet": [5, 5] }
  ]
}"#;

#[test]
fn test_yaml_and_json_catalogs_agree() -> TestResult {
    let dir = TempDir::new()?;
    let system = dir.path().join("system_config.yaml");
    let yaml = dir.path().join("tasks.yaml");
    let json = dir.path().join("tasks.json");
    fs::write(&system, SYSTEM_YAML)?;
    fs::write(&yaml, TASKS_YAML)?;
    fs::write(&json, TASKS_JSON)?;

    let from_yaml = AllocationInput::load(&system, &yaml)?;
    let from_json = AllocationInput::load(&system, &json)?;
    assert_eq!(from_yaml.tasks, from_json.tasks);
    assert_eq!(from_yaml.config, from_json.config);
    assert_eq!(from_yaml.config.diversity_scope, DiversityScope::Processor);
    assert_eq!(from_yaml.ordering.names(), ["LO", "HI"]);
    Ok(())
}

#[test]
fn test_loaded_input_allocates() -> TestResult {
    let system: SystemConfig = parse_str(SYSTEM_YAML, Format::Yaml)?;
    let tasks: TaskSet = parse_str(TASKS_YAML, Format::Yaml)?;
    let input = AllocationInput::from_documents(&system, &tasks)?;

    let allocation = allocate(input.config, input.ordering, input.tasks)?;
    assert_eq!(allocation.instance_count(), 3);
    let primary = allocation.primary_of(TaskId(1)).ok_or("brake not placed")?;
    let replica = allocation.replicas_of(TaskId(1)).into_iter().next().ok_or("no replica")?;
    assert_ne!(primary.processor_id, replica.processor_id);
    Ok(())
}

#[test]
fn test_missing_file_names_the_path() -> TestResult {
    let dir = TempDir::new()?;
    let missing = dir.path().join("nope.yaml");
    let err = mixcrit_config::load_system(&missing).err().ok_or("load should fail")?;
    assert!(matches!(err, ConfigError::Io { .. }));
    assert!(err.to_string().contains("nope.yaml"));
    Ok(())
}

#[test]
fn test_json_extension_is_parsed_strictly() -> TestResult {
    let dir = TempDir::new()?;
    let path = dir.path().join("tasks.json");
    fs::write(&path, TASKS_YAML)?;
    assert!(matches!(
        mixcrit_config::load_tasks(&path),
        Err(ConfigError::Json(_))
    ));
    Ok(())
}

#[test]
fn test_zero_processors_is_a_model_error() -> TestResult {
    let system: SystemConfig =
        parse_str(&SYSTEM_YAML.replace("num_processors: 4", "num_processors: 0"), Format::Yaml)?;
    let tasks: TaskSet = parse_str(TASKS_YAML, Format::Yaml)?;
    let err = AllocationInput::from_documents(&system, &tasks).err().ok_or("should fail")?;
    insta::assert_snapshot!(err.to_string(), @"Invalid model: System field 'num_processors' must be positive");
    Ok(())
}

#[test]
fn test_max_tasks_is_enforced_by_the_allocator() -> TestResult {
    let system: SystemConfig =
        parse_str(&SYSTEM_YAML.replace("max_tasks: 10", "max_tasks: 1"), Format::Yaml)?;
    let tasks: TaskSet = parse_str(TASKS_YAML, Format::Yaml)?;
    let input = AllocationInput::from_documents(&system, &tasks)?;
    assert_eq!(
        allocate(input.config, input.ordering, input.tasks).err(),
        Some(AllocError::Model(ModelError::TooManyTasks { actual: 2, max: 1 }))
    );
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Every valid catalog survives a YAML round trip unchanged.
    #[test]
    fn prop_catalog_yaml_round_trip(
        entries in prop::collection::vec(
            (1u32..1000, "[a-z]{1,8}", 1u64..500, 0u32..3),
            0..6,
        )
    ) {
        let set = TaskSet {
            tasks: entries
                .into_iter()
                .map(|(id, name, period, replicas)| mixcrit_config::TaskEntry {
                    task_id: id,
                    name,
                    period,
                    deadline: period,
                    criticality: "LO".into(),
                    wcet: vec![1, 1],
                    replicas,
                })
                .collect(),
        };
        let text = serde_yaml::to_string(&set).map_err(|e| TestCaseError::fail(e.to_string()))?;
        let back: TaskSet = parse_str(&text, Format::Yaml).map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(back, set);
    }
}
