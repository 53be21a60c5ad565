//! Lambda entry point.
//!
//! Thin plumbing around the coordinator: initialize logging, build the SDK
//! client once, and serve the handler. The event payload and context are
//! ignored; a run is driven entirely by configuration.

use std::sync::Arc;

use dynamodb_backup::{
    backup::BackupCoordinator,
    config::{BackupConfig, LoggingConfig},
    observability,
    store::{DynamoBackupStore, DynamoStoreConfig},
};
use lambda_runtime::{Error, LambdaEvent, run, service_fn};
use serde::Serialize;
use serde_json::Value;

/// Counts reported back to the runtime. Nothing consumes them; the log
/// stream is the observable record of a run.
#[derive(Debug, Serialize)]
struct RunSummary {
    succeeded: usize,
    failed: usize,
}

async fn handler(
    _event: LambdaEvent<Value>,
    store: Arc<DynamoBackupStore>,
) -> Result<RunSummary, Error> {
    let coordinator = BackupCoordinator::new(store, BackupConfig::from_env());
    let result = coordinator.run().await;

    Ok(RunSummary {
        succeeded: result.succeeded.len(),
        failed: result.failed.len(),
    })
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    observability::init_tracing(&LoggingConfig::from_env())?;

    let store = Arc::new(DynamoBackupStore::new(DynamoStoreConfig::from_env()).await);

    // Outside the managed runtime there is no runtime API to poll; perform
    // a single run directly instead, for ad-hoc manual invocations.
    if std::env::var("AWS_LAMBDA_RUNTIME_API").is_err() {
        let coordinator = BackupCoordinator::new(store, BackupConfig::from_env());
        coordinator.run().await;
        return Ok(());
    }

    run(service_fn(move |event: LambdaEvent<Value>| {
        let store = store.clone();
        async move { handler(event, store).await }
    }))
    .await
}
