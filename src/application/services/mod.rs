//! The services driving the monitoring pipeline, each invoked on its own
//! schedule: poll, discover, evaluate, dispatch, reconcile, summarize,
//! clean up.

pub mod alerts;
pub mod discovery;
pub mod dispatch;
pub mod evaluator;
pub mod ingest;
pub mod poller;
pub mod retention;
pub mod scheduler;
pub mod summary;
