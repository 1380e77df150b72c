//! Criticality ordering.
//!
//! Level names are resolved to contiguous integer ranks exactly once, when
//! the ordering is built. Everything downstream works on ranks.

use std::collections::BTreeMap;
use std::iter::Rev;
use std::ops::Range;

use serde::Serialize;

use crate::error::ModelError;

/// Validated mapping from level name to rank `0..L`.
///
/// Rank 0 is the least critical level, rank `L - 1` the most critical.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CriticalityOrdering {
    /// Level names indexed by rank.
    names: Vec<String>,
}

impl CriticalityOrdering {
    /// Build an ordering from `(name, rank)` pairs.
    ///
    /// # Errors
    ///
    /// Rejects an empty map, duplicate names, duplicate ranks, ranks outside
    /// `0..max_levels` and a level count different from `max_levels`.
    pub fn new<I, S>(levels: I, max_levels: usize) -> Result<Self, ModelError>
    where
        I: IntoIterator<Item = (S, usize)>,
        S: Into<String>,
    {
        let mut by_rank: BTreeMap<usize, String> = BTreeMap::new();
        let mut seen_names: Vec<String> = Vec::new();

        for (name, rank) in levels {
            let name = name.into();
            if seen_names.contains(&name) {
                return Err(ModelError::DuplicateLevelName(name));
            }
            if rank >= max_levels {
                return Err(ModelError::RankOutOfRange {
                    name,
                    rank,
                    max_levels,
                });
            }
            if let Some(first) = by_rank.get(&rank) {
                return Err(ModelError::DuplicateRank {
                    rank,
                    first: first.clone(),
                    second: name,
                });
            }
            seen_names.push(name.clone());
            by_rank.insert(rank, name);
        }

        if by_rank.is_empty() {
            return Err(ModelError::NoLevels);
        }
        // Ranks are unique and below max_levels, so a full count means the
        // range is contiguous.
        if by_rank.len() != max_levels {
            return Err(ModelError::LevelCountMismatch {
                expected: max_levels,
                actual: by_rank.len(),
            });
        }

        Ok(Self {
            names: by_rank.into_values().collect(),
        })
    }

    /// Number of levels `L`.
    pub fn levels(&self) -> usize {
        self.names.len()
    }

    /// Highest rank, `L - 1`.
    pub fn top_rank(&self) -> usize {
        self.names.len().saturating_sub(1)
    }

    /// Resolve a level name.
    pub fn rank_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Name of the level at `rank`.
    pub fn name_of(&self, rank: usize) -> Option<&str> {
        self.names.get(rank).map(String::as_str)
    }

    /// Level names ordered by ascending rank.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Ranks from most to least critical.
    pub fn ranks_descending(&self) -> Rev<Range<usize>> {
        (0..self.names.len()).rev()
    }
}
