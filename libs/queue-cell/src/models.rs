use chrono::{DateTime, Datelike, Duration, FixedOffset, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One ticket instance: a patient waiting for service at one station.
/// A ticket that advances through several stations is a chain of entries,
/// one per station, so the full visit history is preserved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub visit_id: Uuid,
    pub station_id: Uuid,
    /// Denormalized from the station record at creation; keeps ordering,
    /// wait estimation and flow rendering free of catalog joins.
    pub station_type: StationType,
    pub queue_code: String,
    pub priority_level: PriorityLevel,
    /// Numeric mirror of `priority_level` so the store can order
    /// server-side with `order=priority_rank.asc,time_in.asc`.
    pub priority_rank: i16,
    pub status: QueueStatus,
    pub time_in: DateTime<Utc>,
    pub time_called: Option<DateTime<Utc>>,
    pub time_started: Option<DateTime<Utc>>,
    pub time_completed: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl QueueEntry {
    /// Ordering key for calling: priority bucket first, arrival time within
    /// the bucket, entry id as a stable final tie-break.
    pub fn sort_key(&self) -> (i16, DateTime<Utc>, Uuid) {
        (self.priority_rank, self.time_in, self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Waiting,
    Called,
    InProgress,
    Completed,
    Skipped,
    Cancelled,
    NoShow,
}

impl QueueStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            QueueStatus::Completed
                | QueueStatus::Skipped
                | QueueStatus::Cancelled
                | QueueStatus::NoShow
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Waiting => "waiting",
            QueueStatus::Called => "called",
            QueueStatus::InProgress => "in_progress",
            QueueStatus::Completed => "completed",
            QueueStatus::Skipped => "skipped",
            QueueStatus::Cancelled => "cancelled",
            QueueStatus::NoShow => "no_show",
        }
    }
}

impl std::fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Queue-ordering bucket, assigned once at ticket creation from the patient's
/// active flags. Within a bucket, ordering is strictly by arrival time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityLevel {
    Emergency,
    SeniorPwd,
    Philhealth,
    Regular,
}

impl PriorityLevel {
    pub fn rank(&self) -> i16 {
        match self {
            PriorityLevel::Emergency => 0,
            PriorityLevel::SeniorPwd => 1,
            PriorityLevel::Philhealth => 2,
            PriorityLevel::Regular => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StationType {
    Checkin,
    Triage,
    Consultation,
    Billing,
    Lab,
    Pharmacy,
    Document,
    Other,
}

impl StationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StationType::Checkin => "checkin",
            StationType::Triage => "triage",
            StationType::Consultation => "consultation",
            StationType::Billing => "billing",
            StationType::Lab => "lab",
            StationType::Pharmacy => "pharmacy",
            StationType::Document => "document",
            StationType::Other => "other",
        }
    }
}

/// Service point. Read-only to the queue core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Station {
    pub id: Uuid,
    pub station_type: StationType,
    pub display_name: String,
    /// Station-specific no-show window; `None` falls back to the configured
    /// clinic-wide default.
    pub no_show_timeout_minutes: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitType {
    ConsultationOnly,
    /// Any visit type the routing engine does not recognize gets the full
    /// station flow.
    #[serde(other)]
    FullService,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Visit {
    pub id: Uuid,
    pub visit_type: VisitType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityFlagKind {
    Emergency,
    Senior,
    Pwd,
    Philhealth,
}

/// Per-patient, time-bounded attribute consulted at ticket creation only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityFlag {
    pub patient_id: Uuid,
    pub flag: PriorityFlagKind,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEntryRequest {
    pub patient_id: Uuid,
    pub station_id: Uuid,
    pub visit_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRequest {
    pub target_status: QueueStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitInfo {
    pub waiting_ahead: i64,
    pub estimated_minutes: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStepState {
    Completed,
    Current,
    Pending,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowStep {
    pub station_type: StationType,
    pub state: FlowStepState,
}

/// Result of a transition: the updated entry, plus the follow-on entry at the
/// next routed station when the transition was a completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub entry: QueueEntry,
    pub next_entry: Option<QueueEntry>,
}

/// Patient-facing snapshot served by the status notifier. `status` plus
/// `updated_at` is enough for a poller to detect a change since its last
/// observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientQueueStatus {
    pub entry: QueueEntry,
    pub waiting_ahead: i64,
    pub estimated_minutes: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Initiator {
    Staff,
    System,
}

/// Published on every committed entry creation or transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEvent {
    pub entry_id: Uuid,
    pub patient_id: Uuid,
    pub station_id: Uuid,
    pub status: QueueStatus,
    pub at: DateTime<Utc>,
    pub initiator: Initiator,
}

/// UTC bounds `[start, end)` of the service-day containing `now`, computed in
/// the clinic's local offset. Queue numbering and "today's queue" views are
/// scoped to this window.
pub fn service_day_bounds(now: DateTime<Utc>, offset_hours: i32) -> (DateTime<Utc>, DateTime<Utc>) {
    let offset = FixedOffset::east_opt(offset_hours * 3600)
        .unwrap_or_else(|| Utc.fix());
    let local = now.with_timezone(&offset);
    let start = offset
        .with_ymd_and_hms(local.year(), local.month(), local.day(), 0, 0, 0)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(now);
    (start, start + Duration::days(1))
}
