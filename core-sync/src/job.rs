//! # Scan Job State Machine
//!
//! Tracks one scan invocation from request to completion with validated
//! state transitions.
//!
//! ## State Machine
//!
//! ```text
//! Idle → CheckingConnectivity → Scanning → Completed
//!                 ↓                 ↓
//!            NoConnection       Cancelled
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::job::{ScanJob, ScanState};
//!
//! let mut job = ScanJob::new("local");
//! job.begin_connectivity_check()?;
//! job.start_scanning()?;
//! job.counters.record_processed();
//! job.complete()?;
//! assert_eq!(job.state, ScanState::Completed);
//! ```

use crate::differ::DiffStats;
use crate::{Result, SyncError};
use bridge_traits::source::Identifier;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier for one scan invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScanJobId(Uuid);

impl ScanJobId {
    /// Create a new random scan ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the string representation of this ID
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for ScanJobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ScanJobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for ScanJobId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

// ============================================================================
// State
// ============================================================================

/// Lifecycle state of a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanState {
    Idle,
    /// Waiting on the network monitor
    CheckingConnectivity,
    Scanning,
    Completed,
    /// The source needs a network that is not available
    NoConnection,
    Cancelled,
}

impl ScanState {
    /// Check if this state ends the scan
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScanState::Completed | ScanState::NoConnection | ScanState::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScanState::Idle => "idle",
            ScanState::CheckingConnectivity => "checking_connectivity",
            ScanState::Scanning => "scanning",
            ScanState::Completed => "completed",
            ScanState::NoConnection => "no_connection",
            ScanState::Cancelled => "cancelled",
        }
    }
}

impl FromStr for ScanState {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "idle" => Ok(ScanState::Idle),
            "checking_connectivity" => Ok(ScanState::CheckingConnectivity),
            "scanning" => Ok(ScanState::Scanning),
            "completed" => Ok(ScanState::Completed),
            "no_connection" => Ok(ScanState::NoConnection),
            "cancelled" => Ok(ScanState::Cancelled),
            _ => Err(SyncError::InvalidStateTransition {
                from: s.to_string(),
                to: s.to_string(),
                reason: "Unknown scan state".to_string(),
            }),
        }
    }
}

impl std::fmt::Display for ScanState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Counters
// ============================================================================

/// Per-invocation track counters.
///
/// `total` counts every track a crawl listed; `processed` counts tracks
/// inserted, updated or confirmed unchanged; `errored` counts extraction and
/// write failures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanCounters {
    pub total: u64,
    pub processed: u64,
    pub errored: u64,
}

impl ScanCounters {
    pub fn record_seen(&mut self) {
        self.total += 1;
    }

    pub fn record_processed(&mut self) {
        self.processed += 1;
    }

    pub fn record_errored(&mut self) {
        self.errored += 1;
    }
}

// ============================================================================
// Requests and Reports
// ============================================================================

/// What a scan should cover
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScanRequest {
    /// One root of a named source
    RescanRoot {
        source_id: String,
        container: Identifier,
        parent: Identifier,
    },
    /// Every top-level container already indexed for the source
    RescanAll { source_id: String },
    /// One root of the engine's own source
    ScanDefault {
        container: Identifier,
        parent: Identifier,
    },
}

impl ScanRequest {
    /// Source named by the request, if any
    pub fn source_id(&self) -> Option<&str> {
        match self {
            ScanRequest::RescanRoot { source_id, .. } | ScanRequest::RescanAll { source_id } => {
                Some(source_id)
            }
            ScanRequest::ScanDefault { .. } => None,
        }
    }
}

/// How a scan ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanOutcome {
    Completed,
    NoConnection,
    Cancelled,
}

/// Summary returned to whoever requested the scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    pub scan_id: ScanJobId,
    pub source_id: String,
    pub outcome: ScanOutcome,
    pub counters: ScanCounters,
    pub removed: DiffStats,
    /// Roots whose stored snapshot could not be loaded
    pub failed_roots: u64,
    pub duration_ms: u64,
}

// ============================================================================
// Scan Job Entity
// ============================================================================

/// One scan invocation with state machine semantics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanJob {
    pub id: ScanJobId,
    pub source_id: String,
    pub state: ScanState,
    pub counters: ScanCounters,
    pub removed: DiffStats,
    pub failed_roots: u64,
    /// Unix milliseconds
    pub started_at: i64,
    pub finished_at: Option<i64>,
}

impl ScanJob {
    /// Create a new job in `Idle` state
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            id: ScanJobId::new(),
            source_id: source_id.into(),
            state: ScanState::Idle,
            counters: ScanCounters::default(),
            removed: DiffStats::default(),
            failed_roots: 0,
            started_at: Utc::now().timestamp_millis(),
            finished_at: None,
        }
    }

    /// # Errors
    ///
    /// Returns an error unless the job is `Idle`
    pub fn begin_connectivity_check(&mut self) -> Result<()> {
        self.transition(ScanState::CheckingConnectivity)
    }

    /// # Errors
    ///
    /// Returns an error unless the job is `CheckingConnectivity`
    pub fn start_scanning(&mut self) -> Result<()> {
        self.transition(ScanState::Scanning)
    }

    /// # Errors
    ///
    /// Returns an error unless the job is `CheckingConnectivity`
    pub fn no_connection(&mut self) -> Result<()> {
        self.transition(ScanState::NoConnection)
    }

    /// # Errors
    ///
    /// Returns an error unless the job is `Scanning`
    pub fn complete(&mut self) -> Result<()> {
        self.transition(ScanState::Completed)
    }

    /// # Errors
    ///
    /// Returns an error if the job already finished
    pub fn cancel(&mut self) -> Result<()> {
        self.transition(ScanState::Cancelled)
    }

    /// Elapsed time between start and finish (or now)
    pub fn duration_ms(&self) -> u64 {
        let end = self
            .finished_at
            .unwrap_or_else(|| Utc::now().timestamp_millis());
        end.saturating_sub(self.started_at).max(0) as u64
    }

    /// Build the report for a finished job
    pub fn report(&self) -> ScanReport {
        let outcome = match self.state {
            ScanState::NoConnection => ScanOutcome::NoConnection,
            ScanState::Cancelled => ScanOutcome::Cancelled,
            _ => ScanOutcome::Completed,
        };

        ScanReport {
            scan_id: self.id,
            source_id: self.source_id.clone(),
            outcome,
            counters: self.counters,
            removed: self.removed,
            failed_roots: self.failed_roots,
            duration_ms: self.duration_ms(),
        }
    }

    fn transition(&mut self, to: ScanState) -> Result<()> {
        self.validate_transition(to)?;
        self.state = to;
        if to.is_terminal() {
            self.finished_at = Some(Utc::now().timestamp_millis());
        }
        Ok(())
    }

    fn validate_transition(&self, to: ScanState) -> Result<()> {
        let valid = match (self.state, to) {
            (ScanState::Idle, ScanState::CheckingConnectivity) => true,
            (ScanState::Idle, ScanState::Cancelled) => true,

            (ScanState::CheckingConnectivity, ScanState::Scanning) => true,
            (ScanState::CheckingConnectivity, ScanState::NoConnection) => true,
            (ScanState::CheckingConnectivity, ScanState::Cancelled) => true,

            (ScanState::Scanning, ScanState::Completed) => true,
            (ScanState::Scanning, ScanState::Cancelled) => true,

            _ => false,
        };

        if !valid {
            return Err(SyncError::InvalidStateTransition {
                from: self.state.as_str().to_string(),
                to: to.as_str().to_string(),
                reason: format!(
                    "Cannot transition from {} to {}",
                    self.state.as_str(),
                    to.as_str()
                ),
            });
        }

        Ok(())
    }
}
