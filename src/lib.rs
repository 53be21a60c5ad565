//! Scheduled backup and retention rotation for DynamoDB tables.
//!
//! Each invocation performs a single sequential pass:
//!
//! 1. **Discovery** — list every table in the account/region and keep those
//!    whose name matches the configured regex.
//! 2. **Backup** — request one point-in-time backup per matched table.
//! 3. **Rotation** — when enabled, delete backups of matched tables that are
//!    older than the configured retention window.
//!
//! The pass holds no state between invocations; configuration is read from
//! environment variables at invocation time and the DynamoDB client is
//! injected, so the coordinator can be exercised against an in-memory store
//! in tests.

pub mod backup;
pub mod config;
pub mod observability;
pub mod store;

pub use backup::{BackupCoordinator, BackupRunResult, RotationRunResult};
pub use config::BackupConfig;
pub use store::{BackupStore, DynamoBackupStore, DynamoStoreConfig};
