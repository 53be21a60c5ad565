//! Backup coordination: table discovery, backup creation, and rotation.

mod coordinator;

pub use coordinator::{BackupCoordinator, BackupRunResult, RotationRunResult};
