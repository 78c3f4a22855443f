//! Sync metrics
//!
//! Process-wide counters shared by every engine. Exposed in the Prometheus
//! text format on the `/metrics` endpoint.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Cheaply clonable handle to the shared counters
#[derive(Debug, Clone)]
pub struct SyncMetrics {
    state: Arc<MetricsState>,
}

#[derive(Debug)]
struct MetricsState {
    clones: AtomicU64,
    fallback_clones: AtomicU64,
    attaches: AtomicU64,
    clone_failures: AtomicU64,
    pulls: AtomicU64,
    pulls_up_to_date: AtomicU64,
    pull_failures: AtomicU64,
    start_time: Instant,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub clones: u64,
    pub fallback_clones: u64,
    pub attaches: u64,
    pub clone_failures: u64,
    pub pulls: u64,
    pub pulls_up_to_date: u64,
    pub pull_failures: u64,
}

impl Default for SyncMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(MetricsState {
                clones: AtomicU64::new(0),
                fallback_clones: AtomicU64::new(0),
                attaches: AtomicU64::new(0),
                clone_failures: AtomicU64::new(0),
                pulls: AtomicU64::new(0),
                pulls_up_to_date: AtomicU64::new(0),
                pull_failures: AtomicU64::new(0),
                start_time: Instant::now(),
            }),
        }
    }

    /// In-process clone completed
    pub fn record_clone(&self, task: &str) {
        self.state.clones.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(task = %task, metric = "gitsync_clones_total", "Clone recorded");
    }

    /// Subprocess clone completed
    pub fn record_fallback_clone(&self, task: &str) {
        self.state.fallback_clones.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(
            task = %task,
            metric = "gitsync_fallback_clones_total",
            "Fallback clone recorded"
        );
    }

    /// Existing repository verified and attached
    pub fn record_attach(&self, task: &str) {
        self.state.attaches.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(task = %task, metric = "gitsync_attaches_total", "Attach recorded");
    }

    /// Clone or attach failed
    pub fn record_clone_failure(&self, task: &str) {
        self.state.clone_failures.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(
            task = %task,
            metric = "gitsync_clone_failures_total",
            "Clone failure recorded"
        );
    }

    /// Pull completed; `updated` is false when nothing changed
    pub fn record_pull(&self, task: &str, updated: bool) {
        self.state.pulls.fetch_add(1, Ordering::Relaxed);
        if !updated {
            self.state.pulls_up_to_date.fetch_add(1, Ordering::Relaxed);
        }
        tracing::trace!(
            task = %task,
            updated,
            metric = "gitsync_pulls_total",
            "Pull recorded"
        );
    }

    pub fn record_pull_failure(&self, task: &str) {
        self.state.pull_failures.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(
            task = %task,
            metric = "gitsync_pull_failures_total",
            "Pull failure recorded"
        );
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            clones: self.state.clones.load(Ordering::Relaxed),
            fallback_clones: self.state.fallback_clones.load(Ordering::Relaxed),
            attaches: self.state.attaches.load(Ordering::Relaxed),
            clone_failures: self.state.clone_failures.load(Ordering::Relaxed),
            pulls: self.state.pulls.load(Ordering::Relaxed),
            pulls_up_to_date: self.state.pulls_up_to_date.load(Ordering::Relaxed),
            pull_failures: self.state.pull_failures.load(Ordering::Relaxed),
        }
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self, tasks: usize) -> String {
        let s = self.snapshot();
        let uptime = self.state.start_time.elapsed().as_secs();

        format!(
            r#"# HELP gitsync_tasks Number of configured sync tasks
# TYPE gitsync_tasks gauge
gitsync_tasks {}

# HELP gitsync_clones_total Repositories cloned in-process
# TYPE gitsync_clones_total counter
gitsync_clones_total {}

# HELP gitsync_fallback_clones_total Repositories cloned by the git executable
# TYPE gitsync_fallback_clones_total counter
gitsync_fallback_clones_total {}

# HELP gitsync_attaches_total Existing repositories attached without a transfer
# TYPE gitsync_attaches_total counter
gitsync_attaches_total {}

# HELP gitsync_clone_failures_total Failed clone or attach attempts
# TYPE gitsync_clone_failures_total counter
gitsync_clone_failures_total {}

# HELP gitsync_pulls_total Completed pulls
# TYPE gitsync_pulls_total counter
gitsync_pulls_total {}

# HELP gitsync_pulls_up_to_date_total Pulls that found nothing new
# TYPE gitsync_pulls_up_to_date_total counter
gitsync_pulls_up_to_date_total {}

# HELP gitsync_pull_failures_total Failed pulls
# TYPE gitsync_pull_failures_total counter
gitsync_pull_failures_total {}

# HELP gitsync_uptime_seconds Uptime in seconds
# TYPE gitsync_uptime_seconds counter
gitsync_uptime_seconds {}
"#,
            tasks,
            s.clones,
            s.fallback_clones,
            s.attaches,
            s.clone_failures,
            s.pulls,
            s.pulls_up_to_date,
            s.pull_failures,
            uptime,
        )
    }
}
