use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::*;

pub fn create_queue_router(state: Arc<QueueState>) -> Router {
    Router::new()
        .route("/entries", post(create_entry))
        .route("/entries/{id}/transitions", post(transition_entry))
        .route("/entries/{id}/wait", get(get_wait_info))
        .route("/entries/{id}/flow", get(get_flow_status))
        .route("/stations/{id}/claim", post(claim_next))
        .route("/stations/{id}/no-show-sweep", post(sweep_no_shows))
        .route("/patients/{id}/active-entry", get(get_active_entry))
        .route("/patients/{id}/status", get(get_patient_status))
        .with_state(state)
}
