//! Render scheduling configuration
//!
//! The deadline model is expressed directly in ticks. A render task for
//! processing ID `T` is submitted during callback `T - lookahead` and, if it
//! has not finished by the start of callback `T + grace`, it is cancelled and
//! counted as a drop. The budget from submission to cancellation is therefore
//! `lookahead + grace` periods, independent of the ring depth.

use serde::{Deserialize, Serialize};

use crate::audio::{AudioError, AudioResult};

/// Scheduler and worker pool settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Buffer slots per source (`N`)
    pub ring_depth: usize,
    /// Callbacks between submitting a task and mixing its output
    pub lookahead: u64,
    /// Extra callbacks a task may run past its target before cancellation
    pub grace: u64,
    /// Render worker threads; 0 renders inline on the calling thread
    pub worker_threads: usize,
    /// Capacity of the dispatch queue and the outstanding-task list
    pub max_sources: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            ring_depth: 3,
            lookahead: 2,
            grace: 0,
            worker_threads: 2,
            max_sources: 256,
        }
    }
}

impl RenderConfig {
    /// Configuration that renders every task synchronously inside the tick
    ///
    /// Deterministic: a provider's output is mixed `lookahead` ticks after
    /// the tick that first lists it. Meant for tests and offline bouncing.
    pub fn inline() -> Self {
        Self {
            worker_threads: 0,
            ..Self::default()
        }
    }

    /// Total periods a task may run before it is cancelled
    pub fn deadline_periods(&self) -> u64 {
        self.lookahead + self.grace
    }

    /// Check the invariants the scheduler relies on
    ///
    /// `ring_depth > lookahead + grace` guarantees a slot is not re-claimed
    /// for a later target before its previous task was either mixed or
    /// cancelled.
    pub fn validate(&self) -> AudioResult<()> {
        if self.ring_depth < 2 {
            return Err(AudioError::InvalidConfig(format!(
                "ring_depth must be at least 2 (got {})",
                self.ring_depth
            )));
        }
        if self.lookahead < 1 {
            return Err(AudioError::InvalidConfig(
                "lookahead must be at least 1".to_string(),
            ));
        }
        if self.ring_depth as u64 <= self.deadline_periods() {
            return Err(AudioError::InvalidConfig(format!(
                "ring_depth ({}) must exceed lookahead + grace ({})",
                self.ring_depth,
                self.deadline_periods()
            )));
        }
        if self.max_sources < 1 {
            return Err(AudioError::InvalidConfig(
                "max_sources must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = RenderConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.deadline_periods(), 2);
    }

    #[test]
    fn test_ring_must_exceed_deadline() {
        let config = RenderConfig {
            ring_depth: 3,
            lookahead: 2,
            grace: 1,
            ..RenderConfig::default()
        };
        assert!(matches!(config.validate(), Err(AudioError::InvalidConfig(_))));

        let config = RenderConfig {
            ring_depth: 4,
            ..config
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_grace_does_not_depend_on_ring_depth() {
        for depth in 3..10 {
            let config = RenderConfig {
                ring_depth: depth,
                ..RenderConfig::default()
            };
            assert!(config.validate().is_ok());
            assert_eq!(config.grace, 0);
            assert_eq!(config.deadline_periods(), 2);
        }
    }

    #[test]
    fn test_rejects_degenerate_values() {
        let base = RenderConfig::default();
        assert!(RenderConfig { ring_depth: 1, ..base.clone() }.validate().is_err());
        assert!(RenderConfig { lookahead: 0, ..base.clone() }.validate().is_err());
        assert!(RenderConfig { max_sources: 0, ..base.clone() }.validate().is_err());
        assert!(RenderConfig { worker_threads: 0, ..base }.validate().is_ok());
    }
}
