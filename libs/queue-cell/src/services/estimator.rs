use crate::models::{QueueEntry, QueueStatus, StationType, WaitInfo};

/// Projects time-to-service for a ticket from its position in the station
/// queue. The estimate is a derived, non-authoritative view: a poller may see
/// a slightly stale number.
pub struct WaitEstimator;

impl WaitEstimator {
    pub fn new() -> Self {
        Self
    }

    /// Average minutes one patient spends at a station of this type.
    pub fn avg_service_minutes(&self, station_type: StationType) -> i64 {
        match station_type {
            StationType::Consultation => 10,
            _ => 5,
        }
    }

    /// Counts entries in `station_queue` that will be called before `target`:
    /// same station, status waiting or called, sort key strictly before the
    /// target's. Priority picks the bucket; arrival time orders within it.
    pub fn waiting_ahead(&self, target: &QueueEntry, station_queue: &[QueueEntry]) -> i64 {
        station_queue
            .iter()
            .filter(|e| e.id != target.id)
            .filter(|e| matches!(e.status, QueueStatus::Waiting | QueueStatus::Called))
            .filter(|e| e.sort_key() < target.sort_key())
            .count() as i64
    }

    /// The floor of 1 keeps a "next up" ticket from reading as zero minutes,
    /// which would imply immediate service.
    pub fn wait_info(&self, target: &QueueEntry, station_queue: &[QueueEntry]) -> WaitInfo {
        let waiting_ahead = self.waiting_ahead(target, station_queue);
        let estimated_minutes = std::cmp::max(
            1,
            waiting_ahead * self.avg_service_minutes(target.station_type),
        );

        WaitInfo {
            waiting_ahead,
            estimated_minutes,
        }
    }
}

impl Default for WaitEstimator {
    fn default() -> Self {
        Self::new()
    }
}
