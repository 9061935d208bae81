use reqwest::Method;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::error::QueueError;
use crate::models::{PriorityFlag, Station, StationType, Visit};

/// Read-only lookups into the catalogs the queue core consumes but never
/// mutates: stations, visits and patient priority flags.
pub struct CatalogService {
    supabase: SupabaseClient,
}

impl CatalogService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn get_station(
        &self,
        station_id: Uuid,
        auth_token: &str,
    ) -> Result<Station, QueueError> {
        debug!("Fetching station {}", station_id);

        let path = format!("/rest/v1/stations?id=eq.{}", station_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| QueueError::StoreUnavailable(e.to_string()))?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| QueueError::NotFound(format!("Station {} not found", station_id)))?;

        serde_json::from_value(row).map_err(|e| QueueError::StoreUnavailable(e.to_string()))
    }

    /// First station of the given type, used when a completed ticket is
    /// routed onward by station type rather than id.
    pub async fn find_station_by_type(
        &self,
        station_type: StationType,
        auth_token: &str,
    ) -> Result<Option<Station>, QueueError> {
        let path = format!(
            "/rest/v1/stations?station_type=eq.{}&limit=1",
            station_type.as_str()
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| QueueError::StoreUnavailable(e.to_string()))?;

        result
            .into_iter()
            .next()
            .map(|row| {
                serde_json::from_value(row).map_err(|e| QueueError::StoreUnavailable(e.to_string()))
            })
            .transpose()
    }

    pub async fn get_visit(&self, visit_id: Uuid, auth_token: &str) -> Result<Visit, QueueError> {
        debug!("Fetching visit {}", visit_id);

        let path = format!("/rest/v1/visits?id=eq.{}", visit_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| QueueError::StoreUnavailable(e.to_string()))?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| QueueError::NotFound(format!("Visit {} not found", visit_id)))?;

        serde_json::from_value(row).map_err(|e| QueueError::StoreUnavailable(e.to_string()))
    }

    pub async fn active_flags(
        &self,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<PriorityFlag>, QueueError> {
        let path = format!(
            "/rest/v1/priority_flags?patient_id=eq.{}&is_active=eq.true",
            patient_id
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| QueueError::StoreUnavailable(e.to_string()))?;

        result
            .into_iter()
            .map(|row| {
                serde_json::from_value(row).map_err(|e| QueueError::StoreUnavailable(e.to_string()))
            })
            .collect()
    }
}
