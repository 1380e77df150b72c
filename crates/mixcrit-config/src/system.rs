//! The system description document.

use std::collections::BTreeMap;

use mixcrit_alloc::{
    AllocatorConfig, CriticalityOrdering, DEFAULT_WINDOW_CAP, DiversityScope, Ticks,
    UtilizationPolicy,
};
use serde::{Deserialize, Serialize};

use crate::error::ConfigResult;

/// Hardware limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SystemSection {
    /// Processor ceiling
    pub num_processors: usize,
    /// Cores on every processor
    pub num_cores_per_processor: usize,
    /// Largest catalog the system accepts; unbounded when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tasks: Option<usize>,
}

/// Criticality level names and their ranks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CriticalityLevels {
    /// Number of levels `L`
    pub max_levels: usize,
    /// Level name to rank, `0` the lowest
    pub levels: BTreeMap<String, usize>,
}

impl CriticalityLevels {
    /// Resolve the map into a validated ordering.
    ///
    /// # Errors
    ///
    /// Any [`mixcrit_alloc::ModelError`] raised by
    /// [`CriticalityOrdering::new`].
    pub fn ordering(&self) -> ConfigResult<CriticalityOrdering> {
        let pairs = self.levels.iter().map(|(name, rank)| (name.as_str(), *rank));
        Ok(CriticalityOrdering::new(pairs, self.max_levels)?)
    }
}

/// Optional tuning of the allocator's behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AllocationSection {
    /// Which tasks count toward a core's utilization at each rank
    pub utilization_policy: UtilizationPolicy,
    /// Where replica diversity is enforced
    pub diversity_scope: DiversityScope,
    /// Upper bound on the demand-bound search window
    pub window_cap: Ticks,
}

impl Default for AllocationSection {
    fn default() -> Self {
        Self {
            utilization_policy: UtilizationPolicy::default(),
            diversity_scope: DiversityScope::default(),
            window_cap: DEFAULT_WINDOW_CAP,
        }
    }
}

/// Top-level system document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SystemConfig {
    /// Hardware limits
    pub system: SystemSection,
    /// Criticality levels
    pub criticality_levels: CriticalityLevels,
    /// Allocator behaviour
    #[serde(default)]
    pub allocation: AllocationSection,
}

impl SystemConfig {
    /// Build the allocator configuration this document describes.
    pub fn allocator_config(&self) -> AllocatorConfig {
        let config = AllocatorConfig::new(
            self.system.num_processors,
            self.system.num_cores_per_processor,
        )
        .with_utilization_policy(self.allocation.utilization_policy)
        .with_diversity_scope(self.allocation.diversity_scope)
        .with_window_cap(self.allocation.window_cap);

        match self.system.max_tasks {
            Some(max) => config.with_max_tasks(max),
            None => config,
        }
    }

    /// Resolve the criticality ordering.
    ///
    /// # Errors
    ///
    /// See [`CriticalityLevels::ordering`].
    pub fn ordering(&self) -> ConfigResult<CriticalityOrdering> {
        self.criticality_levels.ordering()
    }
}
