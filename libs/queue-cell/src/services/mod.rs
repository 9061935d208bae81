pub mod catalog;
pub mod codes;
pub mod estimator;
pub mod lifecycle;
pub mod notifier;
pub mod priority;
pub mod queue;
pub mod routing;
pub mod store;

pub use catalog::CatalogService;
pub use codes::QueueCodeGenerator;
pub use estimator::WaitEstimator;
pub use lifecycle::QueueLifecycle;
pub use notifier::StatusNotifier;
pub use priority::PriorityClassifier;
pub use queue::QueueService;
pub use routing::RoutingEngine;
pub use store::{NewQueueEntry, QueueEntryStore};
