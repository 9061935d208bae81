use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;

use crate::error::QueueError;
use crate::models::{
    CreateEntryRequest, FlowStep, Initiator, PatientQueueStatus, PriorityLevel, QueueEntry,
    QueueEvent, QueueStatus, Station, TransitionOutcome, WaitInfo,
};
use crate::services::{
    CatalogService, PriorityClassifier, QueueCodeGenerator, QueueEntryStore, QueueLifecycle,
    RoutingEngine, StatusNotifier, WaitEstimator,
};
use crate::services::store::NewQueueEntry;

/// How many times a lost claim race or duplicate queue code is retried
/// before giving up.
const MAX_CLAIM_ATTEMPTS: u32 = 3;
const MAX_CODE_ATTEMPTS: u32 = 3;
/// Candidate window fetched per claim attempt.
const CLAIM_WINDOW: u32 = 5;

/// Orchestrates the queue core: ticket creation, the atomic claim, state
/// transitions with cross-station routing, wait estimation and the no-show
/// sweep. The caller's station and identity arrive as explicit parameters
/// (path ids and bearer token), never from ambient state.
pub struct QueueService {
    store: QueueEntryStore,
    catalog: CatalogService,
    lifecycle: QueueLifecycle,
    classifier: PriorityClassifier,
    routing: RoutingEngine,
    estimator: WaitEstimator,
    codes: QueueCodeGenerator,
    notifier: StatusNotifier,
    no_show_default_minutes: i64,
}

impl QueueService {
    pub fn new(config: &AppConfig, notifier: StatusNotifier) -> Self {
        Self {
            store: QueueEntryStore::new(config),
            catalog: CatalogService::new(config),
            lifecycle: QueueLifecycle::new(),
            classifier: PriorityClassifier::new(),
            routing: RoutingEngine::new(),
            estimator: WaitEstimator::new(),
            codes: QueueCodeGenerator::new(config.clinic_utc_offset_hours),
            notifier,
            no_show_default_minutes: config.no_show_timeout_minutes,
        }
    }

    /// Issues a ticket: classifies priority from the patient's active flags,
    /// generates a per-day-unique code and inserts the entry as `waiting`.
    pub async fn create_entry(
        &self,
        request: CreateEntryRequest,
        auth_token: &str,
    ) -> Result<QueueEntry, QueueError> {
        let station = self.catalog.get_station(request.station_id, auth_token).await?;
        let visit = self.catalog.get_visit(request.visit_id, auth_token).await?;
        let now = Utc::now();

        if self
            .store
            .active_for_patient_at_station(request.patient_id, station.id, now, auth_token)
            .await?
            .is_some()
        {
            return Err(QueueError::Validation(format!(
                "Patient {} already has an active ticket at {}",
                request.patient_id, station.display_name
            )));
        }

        // Availability over perfect prioritization: a failed flag lookup
        // degrades to regular instead of failing the whole creation.
        let flags = match self.catalog.active_flags(request.patient_id, auth_token).await {
            Ok(flags) => flags,
            Err(e) => {
                warn!(
                    "Priority flag lookup failed for patient {}, defaulting to regular: {}",
                    request.patient_id, e
                );
                Vec::new()
            }
        };
        let priority_level = self.classifier.classify(&flags);

        self.insert_with_code(
            request.patient_id,
            visit.id,
            &station,
            priority_level,
            now,
            Initiator::Staff,
            auth_token,
        )
        .await
    }

    /// Atomically selects and calls the next ticket a station should serve.
    /// `Ok(None)` means no eligible ticket, a normal outcome. Two concurrent
    /// claims can never return the same entry: only one conditional update
    /// on `status=waiting` can match.
    pub async fn claim_next(
        &self,
        station_id: Uuid,
        auth_token: &str,
    ) -> Result<Option<QueueEntry>, QueueError> {
        self.catalog.get_station(station_id, auth_token).await?;
        let now = Utc::now();

        for _ in 0..MAX_CLAIM_ATTEMPTS {
            let candidates = self
                .store
                .claim_candidates(station_id, now, CLAIM_WINDOW, auth_token)
                .await?;
            if candidates.is_empty() {
                return Ok(None);
            }

            for candidate in candidates {
                let called_at = Utc::now();
                let patch = json!({
                    "status": QueueStatus::Called,
                    "time_called": called_at,
                    "updated_at": called_at,
                });

                if let Some(entry) = self
                    .store
                    .cas_update(candidate.id, QueueStatus::Waiting, patch, auth_token)
                    .await?
                {
                    info!(
                        "Station {} called ticket {} ({})",
                        station_id, entry.id, entry.queue_code
                    );
                    self.publish(&entry, Initiator::Staff);
                    return Ok(Some(entry));
                }

                debug!(
                    "Lost claim race for entry {}, trying next candidate",
                    candidate.id
                );
            }
        }

        Ok(None)
    }

    /// Applies one state-machine transition. On completion, routes the ticket
    /// onward: if the visit's flow has a next station, a fresh `waiting`
    /// entry is created there and returned alongside.
    pub async fn transition(
        &self,
        entry_id: Uuid,
        target: QueueStatus,
        initiator: Initiator,
        auth_token: &str,
    ) -> Result<TransitionOutcome, QueueError> {
        // Calling a ticket is the claim service's job; the generic transition
        // endpoint must not bypass its selection and mutual exclusion.
        if target == QueueStatus::Called {
            return Err(QueueError::Validation(
                "Tickets are called through the station claim operation".to_string(),
            ));
        }

        let entry = self.store.get(entry_id, auth_token).await?;

        // Cancelling an already-cancelled entry is a no-op, not an error.
        if target == QueueStatus::Cancelled && entry.status == QueueStatus::Cancelled {
            debug!("Entry {} already cancelled", entry_id);
            return Ok(TransitionOutcome {
                entry,
                next_entry: None,
            });
        }

        self.lifecycle.validate_transition(&entry.status, &target)?;

        let now = Utc::now();
        let mut patch = serde_json::Map::new();
        patch.insert("status".to_string(), json!(target));
        patch.insert("updated_at".to_string(), json!(now));
        if let Some(field) = self.lifecycle.timestamp_field(&target) {
            patch.insert(field.to_string(), json!(now));
        }

        let updated = match self
            .store
            .cas_update(entry_id, entry.status, Value::Object(patch), auth_token)
            .await?
        {
            Some(updated) => updated,
            None => {
                // A concurrent writer moved the entry first; re-read so the
                // conflict names the actual current status.
                let current = self.store.get(entry_id, auth_token).await?;
                return Err(QueueError::StateConflict {
                    from: current.status,
                    to: target,
                });
            }
        };

        info!(
            "Entry {} transitioned {} -> {} ({:?})",
            entry_id, entry.status, target, initiator
        );
        self.publish(&updated, initiator);

        let next_entry = if target == QueueStatus::Completed {
            self.advance(&updated, auth_token).await?
        } else {
            None
        };

        Ok(TransitionOutcome {
            entry: updated,
            next_entry,
        })
    }

    /// Position and projected wait for a non-terminal entry.
    pub async fn wait_info(
        &self,
        entry_id: Uuid,
        auth_token: &str,
    ) -> Result<WaitInfo, QueueError> {
        let entry = self.store.get(entry_id, auth_token).await?;
        if entry.status.is_terminal() {
            return Err(QueueError::Validation(format!(
                "Entry {} is {}; nothing to estimate",
                entry_id, entry.status
            )));
        }

        let queue = self
            .store
            .station_active(entry.station_id, Utc::now(), auth_token)
            .await?;
        Ok(self.estimator.wait_info(&entry, &queue))
    }

    /// Per-station progress of the entry's visit flow.
    pub async fn flow_status(
        &self,
        entry_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<FlowStep>, QueueError> {
        let entry = self.store.get(entry_id, auth_token).await?;
        let visit = self.catalog.get_visit(entry.visit_id, auth_token).await?;
        let flow = self
            .routing
            .station_flow(&visit.visit_type, &entry.priority_level);
        Ok(self.routing.flow_status(&flow, entry.station_type))
    }

    pub async fn active_entry(
        &self,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<Option<QueueEntry>, QueueError> {
        self.store
            .active_for_patient(patient_id, Utc::now(), auth_token)
            .await
    }

    /// Pull side of the status notifier: the patient's current ticket with
    /// its wait projection. `status` + `updated_at` on the entry let a
    /// poller detect changes since its last observation.
    pub async fn patient_status(
        &self,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<Option<PatientQueueStatus>, QueueError> {
        let Some(entry) = self.active_entry(patient_id, auth_token).await? else {
            return Ok(None);
        };

        let queue = self
            .store
            .station_active(entry.station_id, Utc::now(), auth_token)
            .await?;
        let info = self.estimator.wait_info(&entry, &queue);

        Ok(Some(PatientQueueStatus {
            entry,
            waiting_ahead: info.waiting_ahead,
            estimated_minutes: info.estimated_minutes,
        }))
    }

    /// Marks overdue `called` entries at a station as `no_show`. The window
    /// is the station's own setting or the configured default. Idempotent
    /// and safe against a racing `in_progress` confirmation: whichever
    /// conditional update commits first wins, the loser simply no-ops.
    pub async fn sweep_no_shows(
        &self,
        station_id: Uuid,
        auth_token: &str,
    ) -> Result<u32, QueueError> {
        let station = self.catalog.get_station(station_id, auth_token).await?;
        let timeout = station
            .no_show_timeout_minutes
            .unwrap_or(self.no_show_default_minutes);
        let now = Utc::now();
        let cutoff = now - Duration::minutes(timeout);

        let overdue = self
            .store
            .called_before(station_id, cutoff, now, auth_token)
            .await?;

        let mut transitioned = 0;
        for entry in overdue {
            let patch = json!({
                "status": QueueStatus::NoShow,
                "updated_at": Utc::now(),
            });

            match self
                .store
                .cas_update(entry.id, QueueStatus::Called, patch, auth_token)
                .await?
            {
                Some(updated) => {
                    info!(
                        "Entry {} ({}) marked no_show by system sweep, called at {:?}",
                        updated.id, updated.queue_code, updated.time_called
                    );
                    self.publish(&updated, Initiator::System);
                    transitioned += 1;
                }
                None => {
                    debug!("Entry {} was confirmed before the sweep reached it", entry.id);
                }
            }
        }

        Ok(transitioned)
    }

    /// Creates the follow-on entry at the next routed station after a
    /// completion. Queue position restarts per station: the new entry's
    /// `time_in` is the completion time of the prior step.
    async fn advance(
        &self,
        completed: &QueueEntry,
        auth_token: &str,
    ) -> Result<Option<QueueEntry>, QueueError> {
        let visit = self.catalog.get_visit(completed.visit_id, auth_token).await?;
        let flow = self
            .routing
            .station_flow(&visit.visit_type, &completed.priority_level);

        let Some(next_type) = self
            .routing
            .next_station_type(&flow, completed.station_type)
        else {
            debug!("Visit {} finished its station flow", completed.visit_id);
            return Ok(None);
        };

        let Some(station) = self
            .catalog
            .find_station_by_type(next_type, auth_token)
            .await?
        else {
            warn!(
                "No station of type {} configured; visit {} flow ends here",
                next_type.as_str(),
                completed.visit_id
            );
            return Ok(None);
        };

        // The patient may already hold a live ticket at the routed station,
        // issued directly while this step was still running. Hand that
        // ticket back instead of queueing them twice.
        if let Some(existing) = self
            .store
            .active_for_patient_at_station(completed.patient_id, station.id, Utc::now(), auth_token)
            .await?
        {
            debug!(
                "Patient {} already active at {} (entry {}), not re-queueing",
                completed.patient_id, station.display_name, existing.id
            );
            return Ok(Some(existing));
        }

        let time_in = completed.time_completed.unwrap_or_else(Utc::now);
        let entry = self
            .insert_with_code(
                completed.patient_id,
                completed.visit_id,
                &station,
                completed.priority_level,
                time_in,
                Initiator::System,
                auth_token,
            )
            .await?;

        Ok(Some(entry))
    }

    async fn insert_with_code(
        &self,
        patient_id: Uuid,
        visit_id: Uuid,
        station: &Station,
        priority_level: PriorityLevel,
        time_in: chrono::DateTime<Utc>,
        initiator: Initiator,
        auth_token: &str,
    ) -> Result<QueueEntry, QueueError> {
        let now = Utc::now();
        let mut last_code = String::new();

        for attempt in 1..=MAX_CODE_ATTEMPTS {
            // Offsetting by the attempt number skips past sequence numbers
            // taken by concurrent creations.
            let seq = self.store.count_today(now, auth_token).await? + attempt;
            let code = self.codes.next_code(now, seq);
            last_code = code.clone();

            let new_entry = NewQueueEntry {
                id: Uuid::new_v4(),
                patient_id,
                visit_id,
                station_id: station.id,
                station_type: station.station_type,
                queue_code: code.clone(),
                priority_level,
                priority_rank: priority_level.rank(),
                status: QueueStatus::Waiting,
                time_in,
                updated_at: now,
            };

            match self.store.insert(&new_entry, auth_token).await {
                Ok(entry) => {
                    info!(
                        "Ticket {} issued for patient {} at {} ({:?})",
                        entry.queue_code, patient_id, station.display_name, priority_level
                    );
                    self.publish(&entry, initiator);
                    return Ok(entry);
                }
                Err(QueueError::DuplicateCode(_)) if attempt < MAX_CODE_ATTEMPTS => {
                    warn!("Queue code {} already taken, regenerating", code);
                }
                Err(e) => return Err(e),
            }
        }

        Err(QueueError::DuplicateCode(last_code))
    }

    fn publish(&self, entry: &QueueEntry, initiator: Initiator) {
        self.notifier.publish(QueueEvent {
            entry_id: entry.id,
            patient_id: entry.patient_id,
            station_id: entry.station_id,
            status: entry.status,
            at: entry.updated_at,
            initiator,
        });
    }
}
