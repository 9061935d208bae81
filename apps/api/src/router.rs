use std::sync::Arc;

use axum::{routing::get, Router};

use queue_cell::handlers::QueueState;
use queue_cell::router::create_queue_router;
use shared_config::AppConfig;

pub fn create_router(config: Arc<AppConfig>) -> Router {
    let queue_state = Arc::new(QueueState::new(config));

    Router::new()
        .route("/", get(|| async { "Clinic Queue API is running!" }))
        .nest("/queue", create_queue_router(queue_state))
}
