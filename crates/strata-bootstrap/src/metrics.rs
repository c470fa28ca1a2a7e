//! Bootstrap metrics.

use lazy_static::lazy_static;
use prometheus::{IntCounter, Registry};
use std::sync::Once;

static INIT: Once = Once::new();

lazy_static! {
    /// Registry for all bootstrap metrics.
    pub static ref REGISTRY: Registry = Registry::new();

    /// Persisted index blocks read back via the fast path.
    pub static ref PERSISTED_INDEX_BLOCKS_READ: IntCounter = IntCounter::new(
        "strata_bootstrap_persisted_index_blocks_read_total",
        "Persisted index blocks read during bootstrap"
    )
    .expect("metric can be created");

    /// Index blocks flushed to durable filesets by the persist sidecar.
    pub static ref PERSISTED_INDEX_BLOCKS_WRITE: IntCounter = IntCounter::new(
        "strata_bootstrap_persisted_index_blocks_write_total",
        "Index blocks persisted during bootstrap"
    )
    .expect("metric can be created");
}

/// Register all bootstrap metrics. Idempotent.
pub fn init() {
    INIT.call_once(|| {
        REGISTRY
            .register(Box::new(PERSISTED_INDEX_BLOCKS_READ.clone()))
            .expect("persisted_index_blocks_read can be registered");
        REGISTRY
            .register(Box::new(PERSISTED_INDEX_BLOCKS_WRITE.clone()))
            .expect("persisted_index_blocks_write can be registered");
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_is_idempotent() {
        init();
        init();
    }

    #[test]
    fn test_counters_count() {
        let before = PERSISTED_INDEX_BLOCKS_READ.get();
        PERSISTED_INDEX_BLOCKS_READ.inc();
        // Counters are process-global; concurrent tests may also increment.
        assert!(PERSISTED_INDEX_BLOCKS_READ.get() >= before + 1);
    }
}
