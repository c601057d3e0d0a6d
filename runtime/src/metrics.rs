//! Metric descriptions for the runtime.
//!
//! The runtime records counters and histograms through the `metrics` facade.
//! Without an installed recorder they are no-ops; applications that install
//! one should call [`describe_metrics`] once at startup.

use metrics::{describe_counter, describe_histogram};

// Re-export metrics macros for use in other modules
pub use metrics::{counter, histogram};

/// Register descriptions for every metric the runtime emits.
pub fn describe_metrics() {
    // Store
    describe_counter!("store.commands.total", "Total number of actions sent to stores");
    describe_counter!(
        "store.effects.executed",
        "Effects executed, labelled by effect type"
    );
    describe_counter!(
        "store.effects.superseded",
        "Effect results dropped because a newer operation owns their key"
    );
    describe_counter!(
        "store.shutdown.rejected_actions",
        "Actions rejected because the store was torn down"
    );
    describe_histogram!(
        "store.reducer.duration_seconds",
        "Time taken to run a reducer"
    );

    // Supervisor
    describe_counter!(
        "supervisor.tasks.scheduled",
        "Operations registered under a single-flight key"
    );
    describe_counter!(
        "supervisor.tasks.cancelled",
        "Running operations cancelled or superseded"
    );
}
