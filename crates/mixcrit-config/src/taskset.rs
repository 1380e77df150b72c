//! The task catalog document.

use mixcrit_alloc::{CriticalityOrdering, Task, TaskId, Ticks};
use serde::{Deserialize, Serialize};

use crate::error::ConfigResult;

/// One catalog entry as written in the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskEntry {
    /// Unique task identifier
    #[serde(rename = "taskId")]
    pub task_id: u32,
    /// Display name
    pub name: String,
    /// Period in ticks
    pub period: Ticks,
    /// Relative deadline in ticks
    pub deadline: Ticks,
    /// Criticality level name
    pub criticality: String,
    /// WCET per rank, lowest first
    pub wcet: Vec<Ticks>,
    /// Number of replicas besides the primary
    #[serde(default)]
    pub replicas: u32,
}

impl TaskEntry {
    /// Resolve the entry against `ordering`.
    ///
    /// # Errors
    ///
    /// Unknown criticality names and any other [`mixcrit_alloc::ModelError`]
    /// raised by [`Task::new`].
    pub fn to_task(&self, ordering: &CriticalityOrdering) -> ConfigResult<Task> {
        Ok(Task::new(
            ordering,
            TaskId(self.task_id),
            self.name.clone(),
            self.period,
            self.deadline,
            &self.criticality,
            self.wcet.clone(),
            self.replicas,
        )?)
    }
}

/// Top-level catalog document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskSet {
    /// Entries in catalog order
    pub tasks: Vec<TaskEntry>,
}

impl TaskSet {
    /// Resolve every entry, keeping catalog order.
    ///
    /// # Errors
    ///
    /// The first entry that fails [`TaskEntry::to_task`].
    pub fn resolve(&self, ordering: &CriticalityOrdering) -> ConfigResult<Vec<Task>> {
        self.tasks.iter().map(|entry| entry.to_task(ordering)).collect()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// True when the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use mixcrit_alloc::ModelError;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn ordering() -> Result<CriticalityOrdering, ModelError> {
        CriticalityOrdering::new([("QM", 0), ("ASIL_D", 1)], 2)
    }

    #[test]
    fn test_replicas_default_to_zero() -> TestResult {
        let set: TaskSet = serde_yaml::from_str(
            "tasks:\n  - { taskId: 7, name: log, period: 100, deadline: 80, criticality: QM, wcet: [5, 5] }\n",
        )?;
        let entry = set.tasks.first().ok_or("no entry")?;
        assert_eq!(entry.replicas, 0);

        let task = entry.to_task(&ordering()?)?;
        assert_eq!(task.id(), TaskId(7));
        assert_eq!(task.deadline(), 80);
        assert_eq!(task.criticality(), 0);
        Ok(())
    }

    #[test]
    fn test_unknown_level_names_the_task() -> TestResult {
        let entry = TaskEntry {
            task_id: 3,
            name: "abs".into(),
            period: 10,
            deadline: 10,
            criticality: "ASIL_X".into(),
            wcet: vec![1, 2],
            replicas: 1,
        };
        assert!(matches!(
            entry.to_task(&ordering()?),
            Err(ConfigError::Model(ModelError::UnknownCriticality { task_id: TaskId(3), .. }))
        ));
        Ok(())
    }

    #[test]
    fn test_snake_case_id_key_is_refused() {
        let parsed = serde_yaml::from_str::<TaskSet>(
            "tasks:\n  - { task_id: 1, name: a, period: 10, deadline: 10, criticality: QM, wcet: [1, 1] }\n",
        );
        assert!(parsed.is_err());
    }
}
