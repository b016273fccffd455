//! # Event Bus System
//!
//! Typed events published by the indexing engine over `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! The scan worker never shares counters with observers. Instead it publishes
//! [`ScanEvent`]s (started, rate-limited progress, completed, no-connection)
//! and the index store publishes [`LibraryEvent::IndexChanged`] once per scan
//! invocation. Any number of subscribers can listen independently.
//!
//! ```text
//! ┌─────────────┐     emit      ┌───────────┐     subscribe    ┌────────────┐
//! │ Scan worker ├──────────────>│ EventBus  ├─────────────────>│ UI / CLI   │
//! └─────────────┘               │ (broadcast│                  └────────────┘
//! ┌─────────────┐     emit      │  channel) │     subscribe    ┌────────────┐
//! │ Index store ├──────────────>│           ├─────────────────>│ Subscriber │
//! └─────────────┘               └───────────┘                  └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, EventStream, ScanEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(100);
//! let mut scans = EventStream::new(bus.subscribe())
//!     .filter(|event| matches!(event, CoreEvent::Scan(_)));
//!
//! bus.emit(CoreEvent::Scan(ScanEvent::Progress {
//!     scan_id: "scan-1".to_string(),
//!     processed: 10,
//!     total: 12,
//!     errored: 1,
//! }))
//! .ok();
//!
//! let event = scans.recv().await.unwrap();
//! assert!(matches!(event, CoreEvent::Scan(ScanEvent::Progress { .. })));
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events. Progress
//!   events are advisory, so this is non-fatal.
//! - **`RecvError::Closed`**: every sender was dropped; treat as shutdown.
//!
//! Emitting with no subscribers returns an error that publishers ignore with
//! `.ok()`.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum published through the event bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Scan lifecycle and progress
    Scan(ScanEvent),
    /// Persisted index changes
    Library(LibraryEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Scan(e) => e.description(),
            CoreEvent::Library(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Scan(ScanEvent::NoConnection { .. }) => EventSeverity::Warning,
            CoreEvent::Scan(ScanEvent::Completed { errored, .. }) if *errored > 0 => {
                EventSeverity::Warning
            }
            CoreEvent::Scan(ScanEvent::Completed { .. }) => EventSeverity::Info,
            CoreEvent::Library(LibraryEvent::IndexChanged { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Scan Events
// ============================================================================

/// Events emitted by one scan invocation.
///
/// Every invocation emits either exactly one `Started` followed by exactly one
/// `Completed`, or a single `NoConnection`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ScanEvent {
    /// Scan entered the scanning state.
    Started {
        scan_id: String,
        source_id: String,
        /// Number of roots resolved for this invocation.
        roots: u64,
    },
    /// Advisory snapshot of the live counters. Rate limited; safe to drop.
    Progress {
        scan_id: String,
        processed: u64,
        total: u64,
        errored: u64,
    },
    /// All roots were processed (or the scan was cancelled).
    Completed {
        scan_id: String,
        processed: u64,
        total: u64,
        errored: u64,
        tracks_removed: u64,
        containers_removed: u64,
        /// Roots whose scan could not run at all.
        failed_roots: u64,
        cancelled: bool,
        duration_ms: u64,
    },
    /// The connectivity guard failed; nothing was scanned.
    NoConnection { scan_id: String, source_id: String },
}

impl ScanEvent {
    fn description(&self) -> &str {
        match self {
            ScanEvent::Started { .. } => "Scan started",
            ScanEvent::Progress { .. } => "Scan in progress",
            ScanEvent::Completed { cancelled: true, .. } => "Scan cancelled",
            ScanEvent::Completed { .. } => "Scan completed",
            ScanEvent::NoConnection { .. } => "No network connection",
        }
    }

    /// Identifier of the scan invocation this event belongs to.
    pub fn scan_id(&self) -> &str {
        match self {
            ScanEvent::Started { scan_id, .. }
            | ScanEvent::Progress { scan_id, .. }
            | ScanEvent::Completed { scan_id, .. }
            | ScanEvent::NoConnection { scan_id, .. } => scan_id,
        }
    }
}

// ============================================================================
// Library Events
// ============================================================================

/// Events related to the persisted index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum LibraryEvent {
    /// The index for a source changed; observers should reload.
    IndexChanged { source_id: String },
}

impl LibraryEvent {
    fn description(&self) -> &str {
        match self {
            LibraryEvent::IndexChanged { .. } => "Library index changed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central broadcast channel for engine events.
///
/// Cloning the bus shares the underlying channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// Subscribers falling behind by more than `capacity` events receive
    /// `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with optional filtering.
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no matching event is currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}
