//! Immutable runtime configuration and its canonical defaults.

/// Default number of 32-byte cells in the pre-allocated pool (2 MiB).
pub const DEFAULT_POOL_CELLS: usize = 65_536;

/// Default number of event slots in the dispatch ring.
pub const DEFAULT_QUEUE_SLOTS: usize = 1024;

/// Minimum event ring capacity accepted by the runtime.
pub const MIN_QUEUE_SLOTS: usize = 1024;

/// Top-level immutable configuration for a runtime instance.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RuntimeConfig {
    /// Number of cells in the pre-allocated pool.
    pub pool_cells: usize,
    /// Requested number of event ring slots.
    pub queue_slots: usize,
    /// Enables deterministic trace callback dispatch.
    pub tracing_enabled: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            pool_cells: DEFAULT_POOL_CELLS,
            queue_slots: DEFAULT_QUEUE_SLOTS,
            tracing_enabled: false,
        }
    }
}

impl RuntimeConfig {
    /// Returns the ring capacity actually used, clamped to the floor the
    /// dispatch model requires.
    #[must_use]
    pub const fn effective_queue_slots(&self) -> usize {
        if self.queue_slots < MIN_QUEUE_SLOTS {
            MIN_QUEUE_SLOTS
        } else {
            self.queue_slots
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{RuntimeConfig, DEFAULT_POOL_CELLS, DEFAULT_QUEUE_SLOTS, MIN_QUEUE_SLOTS};

    #[test]
    fn default_config_matches_canonical_limits() {
        let config = RuntimeConfig::default();
        assert_eq!(config.pool_cells, DEFAULT_POOL_CELLS);
        assert_eq!(config.queue_slots, DEFAULT_QUEUE_SLOTS);
        assert!(!config.tracing_enabled);
    }

    #[test]
    fn queue_slots_are_clamped_to_the_ring_floor() {
        let config = RuntimeConfig {
            queue_slots: 16,
            ..RuntimeConfig::default()
        };
        assert_eq!(config.effective_queue_slots(), MIN_QUEUE_SLOTS);

        let config = RuntimeConfig {
            queue_slots: 4096,
            ..RuntimeConfig::default()
        };
        assert_eq!(config.effective_queue_slots(), 4096);
    }
}
