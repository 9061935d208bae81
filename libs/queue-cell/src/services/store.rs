use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::error::QueueError;
use crate::models::{service_day_bounds, PriorityLevel, QueueEntry, QueueStatus, StationType};

/// Insert shape for a new ticket. The id is generated client-side; status is
/// always `waiting` on insert.
#[derive(Debug, Clone, Serialize)]
pub struct NewQueueEntry {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub visit_id: Uuid,
    pub station_id: Uuid,
    pub station_type: StationType,
    pub queue_code: String,
    pub priority_level: PriorityLevel,
    pub priority_rank: i16,
    pub status: QueueStatus,
    pub time_in: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The authoritative record of tickets. Rows are append-mostly: created once,
/// then updated in place for status and timestamp fields only, never deleted.
/// Every status mutation goes through `cas_update`, a conditional PATCH whose
/// empty result signals that a concurrent writer got there first.
pub struct QueueEntryStore {
    supabase: SupabaseClient,
    offset_hours: i32,
}

fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn representation_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Prefer", HeaderValue::from_static("return=representation"));
    headers
}

impl QueueEntryStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            offset_hours: config.clinic_utc_offset_hours,
        }
    }

    fn day_filter(&self, now: DateTime<Utc>) -> String {
        let (start, end) = service_day_bounds(now, self.offset_hours);
        format!("time_in=gte.{}&time_in=lt.{}", ts(start), ts(end))
    }

    fn store_err(e: anyhow::Error) -> QueueError {
        QueueError::StoreUnavailable(e.to_string())
    }

    pub async fn insert(
        &self,
        entry: &NewQueueEntry,
        auth_token: &str,
    ) -> Result<QueueEntry, QueueError> {
        debug!("Inserting queue entry {} ({})", entry.id, entry.queue_code);

        let body = serde_json::to_value(entry)
            .map_err(|e| QueueError::StoreUnavailable(e.to_string()))?;

        let result: Vec<QueueEntry> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/queue_entries",
                Some(auth_token),
                Some(body),
                Some(representation_headers()),
            )
            .await
            .map_err(|e| {
                // Two partial unique indexes can reject an insert: the
                // per-service-day queue_code index, and the one-active-entry
                // index on (patient_id, station_id). The constraint name in
                // the conflict body tells them apart.
                let text = e.to_string();
                if !text.starts_with("Conflict") {
                    Self::store_err(e)
                } else if text.contains("queue_code") {
                    QueueError::DuplicateCode(entry.queue_code.clone())
                } else {
                    QueueError::Validation(format!(
                        "Patient {} already has an active ticket at this station",
                        entry.patient_id
                    ))
                }
            })?;

        result
            .into_iter()
            .next()
            .ok_or_else(|| QueueError::StoreUnavailable("Insert returned no row".to_string()))
    }

    pub async fn get(&self, entry_id: Uuid, auth_token: &str) -> Result<QueueEntry, QueueError> {
        let path = format!("/rest/v1/queue_entries?id=eq.{}", entry_id);
        let result: Vec<QueueEntry> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(Self::store_err)?;

        result
            .into_iter()
            .next()
            .ok_or_else(|| QueueError::NotFound(format!("Queue entry {} not found", entry_id)))
    }

    /// Conditional update: applies `patch` only if the row's status still
    /// equals `expected`. PostgREST applies the filter and update atomically
    /// per row, so two racing callers can never both see their precondition
    /// hold; the loser gets `Ok(None)`.
    pub async fn cas_update(
        &self,
        entry_id: Uuid,
        expected: QueueStatus,
        patch: Value,
        auth_token: &str,
    ) -> Result<Option<QueueEntry>, QueueError> {
        debug!(
            "CAS update on entry {} (expected status {})",
            entry_id, expected
        );

        let path = format!(
            "/rest/v1/queue_entries?id=eq.{}&status=eq.{}",
            entry_id,
            expected.as_str()
        );

        let result: Vec<QueueEntry> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(patch),
                Some(representation_headers()),
            )
            .await
            .map_err(Self::store_err)?;

        Ok(result.into_iter().next())
    }

    /// The day's `waiting` entries at a station in calling order, limited to
    /// a small candidate window for the claim loop.
    pub async fn claim_candidates(
        &self,
        station_id: Uuid,
        now: DateTime<Utc>,
        limit: u32,
        auth_token: &str,
    ) -> Result<Vec<QueueEntry>, QueueError> {
        let path = format!(
            "/rest/v1/queue_entries?station_id=eq.{}&status=eq.waiting&{}&order=priority_rank.asc,time_in.asc,id.asc&limit={}",
            station_id,
            self.day_filter(now),
            limit
        );

        self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(Self::store_err)
    }

    /// The day's waiting and called entries at a station; the wait estimator
    /// counts positions over this snapshot.
    pub async fn station_active(
        &self,
        station_id: Uuid,
        now: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Vec<QueueEntry>, QueueError> {
        let path = format!(
            "/rest/v1/queue_entries?station_id=eq.{}&status=in.(waiting,called)&{}",
            station_id,
            self.day_filter(now)
        );

        self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(Self::store_err)
    }

    /// The patient's current non-terminal entry for this service-day, if any.
    pub async fn active_for_patient(
        &self,
        patient_id: Uuid,
        now: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Option<QueueEntry>, QueueError> {
        let path = format!(
            "/rest/v1/queue_entries?patient_id=eq.{}&status=in.(waiting,called,in_progress)&{}&order=time_in.desc&limit=1",
            patient_id,
            self.day_filter(now)
        );

        let result: Vec<QueueEntry> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(Self::store_err)?;

        Ok(result.into_iter().next())
    }

    /// Guards the one-active-entry-per-(patient, station, service-day)
    /// invariant at creation time.
    pub async fn active_for_patient_at_station(
        &self,
        patient_id: Uuid,
        station_id: Uuid,
        now: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Option<QueueEntry>, QueueError> {
        let path = format!(
            "/rest/v1/queue_entries?patient_id=eq.{}&station_id=eq.{}&status=in.(waiting,called,in_progress)&{}&limit=1",
            patient_id,
            station_id,
            self.day_filter(now)
        );

        let result: Vec<QueueEntry> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(Self::store_err)?;

        Ok(result.into_iter().next())
    }

    /// Number of entries issued this service-day, across all stations. Feeds
    /// the queue-code sequence.
    pub async fn count_today(
        &self,
        now: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<u32, QueueError> {
        let path = format!("/rest/v1/queue_entries?select=id&{}", self.day_filter(now));

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(Self::store_err)?;

        Ok(result.len() as u32)
    }

    /// `called` entries at a station whose call happened before `cutoff`;
    /// input to the no-show sweep.
    pub async fn called_before(
        &self,
        station_id: Uuid,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Vec<QueueEntry>, QueueError> {
        let path = format!(
            "/rest/v1/queue_entries?station_id=eq.{}&status=eq.called&time_called=lt.{}&{}",
            station_id,
            ts(cutoff),
            self.day_filter(now)
        );

        self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(Self::store_err)
    }
}
