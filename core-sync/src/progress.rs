//! Rate-limited progress notifications.

use crate::job::{ScanCounters, ScanJobId};
use core_runtime::events::{CoreEvent, EventBus, ScanEvent};
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

/// Publishes `ScanEvent::Progress` at most once per interval.
///
/// Progress events are advisory; a dropped or skipped one loses nothing
/// because the completion event carries the final counters.
pub struct ProgressReporter {
    event_bus: EventBus,
    scan_id: String,
    interval: Duration,
    last_emit: Option<Instant>,
}

impl ProgressReporter {
    pub fn new(event_bus: EventBus, scan_id: ScanJobId, interval: Duration) -> Self {
        Self {
            event_bus,
            scan_id: scan_id.to_string(),
            interval,
            last_emit: None,
        }
    }

    /// Emit the counters unless an event went out less than `interval` ago.
    ///
    /// Returns whether an event was emitted.
    pub fn report(&mut self, counters: &ScanCounters) -> bool {
        let now = Instant::now();
        if let Some(last) = self.last_emit {
            if now.duration_since(last) < self.interval {
                return false;
            }
        }

        self.last_emit = Some(now);
        trace!(
            processed = counters.processed,
            total = counters.total,
            errored = counters.errored,
            "Scan progress"
        );

        // No subscribers is fine
        self.event_bus
            .emit(CoreEvent::Scan(ScanEvent::Progress {
                scan_id: self.scan_id.clone(),
                processed: counters.processed,
                total: counters.total,
                errored: counters.errored,
            }))
            .ok();

        true
    }
}
