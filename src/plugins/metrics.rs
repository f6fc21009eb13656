use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use super::{Plugin, PluginDecl};
use crate::dispatcher::{Request, Response};
use crate::status::StageResult;

/// Chain name of the metrics unit.
pub const METRICS: &str = "metrics";

/// Request counters collected with relaxed atomics.
///
/// Requests are counted on entry. Latency and status classes are recorded in the
/// post-response stage, so dispatches that were finished early or failed only show up in
/// [`MetricsPlugin::request_count`].
#[derive(Debug, Default)]
pub struct MetricsPlugin {
    request_count: AtomicUsize,
    completed_count: AtomicUsize,
    total_latency_ns: AtomicU64,
    // 1xx..5xx
    status_classes: [AtomicUsize; 5],
}

impl MetricsPlugin {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests that entered the chain.
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Requests that reached the post-response stage.
    pub fn completed_count(&self) -> usize {
        self.completed_count.load(Ordering::Relaxed)
    }

    /// Mean time from receipt to post-response fixup, zero before the first completion.
    pub fn average_latency(&self) -> Duration {
        let count = self.completed_count.load(Ordering::Relaxed) as u64;
        if count == 0 {
            Duration::from_nanos(0)
        } else {
            Duration::from_nanos(self.total_latency_ns.load(Ordering::Relaxed) / count)
        }
    }

    /// Completed responses whose status falls in `class` (1 for 1xx up to 5 for 5xx).
    pub fn status_class_count(&self, class: u16) -> usize {
        match class {
            1..=5 => self.status_classes[usize::from(class - 1)].load(Ordering::Relaxed),
            _ => 0,
        }
    }

    /// Declare as the `metrics` unit with no constraints.
    ///
    /// Callers usually pair this with an `Arc` they keep for reading the counters.
    pub fn declare(self: std::sync::Arc<Self>) -> PluginDecl {
        PluginDecl::from_arc(METRICS, self)
    }
}

impl Plugin for MetricsPlugin {
    fn fixup_request(&self, req: Request) -> StageResult<Request> {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        Ok(req)
    }

    fn fixup_response(&self, req: &Request, res: &mut Response) -> StageResult<()> {
        let latency = req.received_at.elapsed();
        self.completed_count.fetch_add(1, Ordering::Relaxed);
        self.total_latency_ns
            .fetch_add(u64::try_from(latency.as_nanos()).unwrap_or(u64::MAX), Ordering::Relaxed);
        let class = res.status.as_u16() / 100;
        if (1..=5).contains(&class) {
            self.status_classes[usize::from(class - 1)].fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }
}
