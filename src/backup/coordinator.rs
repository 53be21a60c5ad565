//! Backup coordinator for creating and rotating table backups.
//!
//! A run is one sequential pass:
//! 1. Discover the tables whose name matches the configured pattern.
//! 2. Request one point-in-time backup per discovered table.
//! 3. When removal is enabled, delete expired backups of those tables.
//!
//! No error escapes [`BackupCoordinator::run`]: failures are logged and the
//! affected unit of work is skipped, so one bad table or backup never takes
//! down the rest of the pass.

use std::sync::Arc;

use chrono::{DateTime, Duration, Local, Utc};
use regex::Regex;
use tracing::{error, info, warn};

use crate::{
    config::BackupConfig,
    store::{BackupStore, BackupStoreResult},
};

/// Results from a single backup run.
///
/// Every discovered table lands in exactly one of the two sets.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct BackupRunResult {
    /// Tables whose backup request succeeded.
    pub succeeded: Vec<String>,
    /// Tables whose backup request failed.
    pub failed: Vec<String>,
}

impl BackupRunResult {
    /// Number of tables a backup was attempted for.
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

/// Results from a single rotation pass.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RotationRunResult {
    /// Number of expired backups deleted.
    pub deleted: u64,
    /// Number of deletions that failed.
    pub failed: u64,
}

impl RotationRunResult {
    /// Check if any backups were deleted.
    pub fn has_deletions(&self) -> bool {
        self.deleted > 0
    }
}

/// Coordinates the three phases of a backup run against an injected store.
pub struct BackupCoordinator {
    store: Arc<dyn BackupStore>,
    config: BackupConfig,
}

impl BackupCoordinator {
    pub fn new(store: Arc<dyn BackupStore>, config: BackupConfig) -> Self {
        Self { store, config }
    }

    /// Run a single backup pass.
    ///
    /// Discovery yielding no tables ends the run after a configuration
    /// warning: rotation is not attempted and no summary record is emitted.
    pub async fn run(&self) -> BackupRunResult {
        let tables = self.discover_tables().await;

        if tables.is_empty() {
            warn!(
                "Tried running a table backup, but no tables were selected. \
                 Please check your configuration."
            );
            return BackupRunResult::default();
        }

        let mut result = BackupRunResult::default();

        for table in &tables {
            match self.create_backup(table).await {
                Ok(()) => result.succeeded.push(table.clone()),
                Err(e) => {
                    error!(table = %table, error = %e, "Error creating backup for table");
                    result.failed.push(table.clone());
                }
            }
        }

        if self.config.rotation_enabled {
            // Rotation scope is the full discovered set, not just the tables
            // that were backed up successfully this run.
            let rotation = self.rotate_backups(&tables).await;
            if rotation.has_deletions() || rotation.failed > 0 {
                info!(
                    deleted = rotation.deleted,
                    failed = rotation.failed,
                    "Backup rotation complete"
                );
            }
        }

        info!(
            total = result.total(),
            succeeded = result.succeeded.len(),
            failed = result.failed.len(),
            "Backup run complete"
        );

        for table in &result.succeeded {
            info!(table = %table, "Table backup succeeded");
        }
        for table in &result.failed {
            info!(table = %table, "Table backup failed");
        }

        result
    }

    /// List all tables and keep those matching the configured pattern.
    ///
    /// The match is anchored at the start of the table name; the pattern may
    /// cover just a prefix. A missing or invalid pattern and a failed listing
    /// all degrade to an empty set.
    pub async fn discover_tables(&self) -> Vec<String> {
        let Some(pattern) = &self.config.table_pattern else {
            warn!("No tables configured. Please set TABLE_REGEX");
            return Vec::new();
        };

        let regex = match Regex::new(&format!(r"\A(?:{pattern})")) {
            Ok(regex) => regex,
            Err(e) => {
                warn!(pattern = %pattern, error = %e, "TABLE_REGEX is not a valid pattern");
                return Vec::new();
            }
        };

        info!(pattern = %pattern, "Using regex pattern to find tables");

        let names = match self.store.list_tables().await {
            Ok(names) => names,
            Err(e) => {
                error!(error = %e, "Connection to dynamodb not established");
                return Vec::new();
            }
        };

        names
            .into_iter()
            .filter(|name| regex.is_match(name))
            .collect()
    }

    /// Request one backup for `table`, named after the table and the
    /// wall-clock second the request was made.
    async fn create_backup(&self, table: &str) -> BackupStoreResult<()> {
        let backup_name = backup_name(table, Local::now());
        self.store.create_backup(table, &backup_name).await
    }

    /// Delete expired backups belonging to the given tables.
    ///
    /// A listing failure skips the whole pass; an individual delete failure
    /// skips only that backup. Backups of tables outside `tables` are never
    /// touched, no matter how old.
    pub async fn rotate_backups(&self, tables: &[String]) -> RotationRunResult {
        let cutoff = Utc::now() - Duration::days(i64::from(self.config.retention_days));

        info!(
            cutoff = %cutoff,
            retention_days = self.config.retention_days,
            "Removing backups created before the cutoff"
        );

        let backups = match self.store.list_backups_before(cutoff).await {
            Ok(backups) => backups,
            Err(e) => {
                error!(error = %e, "Error removing old backups");
                return RotationRunResult::default();
            }
        };

        let mut result = RotationRunResult::default();

        for backup in backups {
            if !tables.contains(&backup.table_name) {
                continue;
            }

            match self.store.delete_backup(&backup.backup_arn).await {
                Ok(()) => {
                    result.deleted += 1;
                    info!(
                        backup = %backup.backup_name,
                        table = %backup.table_name,
                        "Successfully removed backup"
                    );
                }
                Err(e) => {
                    result.failed += 1;
                    error!(
                        backup = %backup.backup_name,
                        table = %backup.table_name,
                        error = %e,
                        "Failed to remove backup"
                    );
                }
            }
        }

        result
    }
}

/// Backup name for `table` at `at`: the table name plus a second-resolution
/// timestamp. Two backups of the same table within one second collide.
fn backup_name(table: &str, at: DateTime<Local>) -> String {
    format!("{}_{}", table, at.format("%Y%m%d%H%M%S"))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rstest::rstest;

    use super::*;
    use crate::store::MemoryBackupStore;

    fn config(pattern: Option<&str>, rotation_enabled: bool, retention_days: u32) -> BackupConfig {
        BackupConfig {
            table_pattern: pattern.map(String::from),
            rotation_enabled,
            retention_days,
        }
    }

    fn coordinator(store: &Arc<MemoryBackupStore>, config: BackupConfig) -> BackupCoordinator {
        BackupCoordinator::new(store.clone(), config)
    }

    #[test]
    fn test_backup_name_embeds_table_and_second() {
        let at = Local.with_ymd_and_hms(2024, 1, 31, 23, 59, 59).unwrap();
        assert_eq!(backup_name("prod-orders", at), "prod-orders_20240131235959");
    }

    #[rstest]
    #[case("prod", &["prod-orders", "prod-users", "staging-orders"], &["prod-orders", "prod-users"])]
    #[case("orders", &["prod-orders", "orders"], &["orders"])]
    #[case("prod$", &["prod", "prod-x"], &["prod"])]
    #[case(".*", &["alpha", "beta"], &["alpha", "beta"])]
    #[case("prod|staging", &["prod-a", "staging-b", "dev-c"], &["prod-a", "staging-b"])]
    #[tokio::test]
    async fn test_discovery_anchors_match_at_name_start(
        #[case] pattern: &str,
        #[case] tables: &[&str],
        #[case] expected: &[&str],
    ) {
        let store = Arc::new(MemoryBackupStore::with_tables(tables.iter().copied()));
        let coordinator = coordinator(&store, config(Some(pattern), false, 0));

        let discovered = coordinator.discover_tables().await;
        let expected: Vec<String> = expected.iter().map(|t| t.to_string()).collect();
        assert_eq!(discovered, expected);
    }

    #[tokio::test]
    async fn test_discovery_without_pattern_skips_the_store() {
        let store = Arc::new(MemoryBackupStore::with_tables(["prod-orders"]));
        let coordinator = coordinator(&store, config(None, false, 0));

        assert!(coordinator.discover_tables().await.is_empty());
        assert_eq!(store.list_tables_calls(), 0);
    }

    #[tokio::test]
    async fn test_discovery_with_invalid_pattern_is_empty() {
        let store = Arc::new(MemoryBackupStore::with_tables(["prod-orders"]));
        let coordinator = coordinator(&store, config(Some("prod["), false, 0));

        assert!(coordinator.discover_tables().await.is_empty());
        assert_eq!(store.list_tables_calls(), 0);
    }

    #[tokio::test]
    async fn test_discovery_listing_failure_degrades_to_empty() {
        let store = Arc::new(MemoryBackupStore::with_tables(["prod-orders"]));
        store.fail_list_tables();
        let coordinator = coordinator(&store, config(Some("prod"), false, 0));

        assert!(coordinator.discover_tables().await.is_empty());
    }

    #[tokio::test]
    async fn test_run_makes_one_attempt_per_discovered_table() {
        let store = Arc::new(MemoryBackupStore::with_tables([
            "prod-orders",
            "prod-users",
            "staging-orders",
        ]));
        let coordinator = coordinator(&store, config(Some("prod"), false, 0));

        let result = coordinator.run().await;

        assert_eq!(result.succeeded, vec!["prod-orders", "prod-users"]);
        assert!(result.failed.is_empty());
        assert_eq!(store.create_attempts(), 2);
    }

    #[tokio::test]
    async fn test_run_isolates_per_table_failures() {
        let store = Arc::new(MemoryBackupStore::with_tables(["prod-orders", "prod-users"]));
        store.fail_create_for("prod-users");
        let coordinator = coordinator(&store, config(Some("prod"), false, 0));

        let result = coordinator.run().await;

        assert_eq!(result.succeeded, vec!["prod-orders"]);
        assert_eq!(result.failed, vec!["prod-users"]);
        assert_eq!(result.total(), 2);
        assert_eq!(store.create_attempts(), 2);
    }

    #[tokio::test]
    async fn test_run_with_zero_tables_never_rotates() {
        let store = Arc::new(MemoryBackupStore::with_tables(["staging-orders"]));
        store.add_backup(
            "staging-orders",
            "staging-orders_old",
            "arn:staging-old",
            Utc::now() - Duration::days(30),
        );
        let coordinator = coordinator(&store, config(Some("prod"), true, 2));

        let result = coordinator.run().await;

        assert_eq!(result, BackupRunResult::default());
        assert_eq!(store.list_backups_calls(), 0);
        assert!(store.deleted().is_empty());
    }

    #[tokio::test]
    async fn test_run_without_rotation_enabled_never_lists_backups() {
        let store = Arc::new(MemoryBackupStore::with_tables(["prod-orders"]));
        store.add_backup(
            "prod-orders",
            "prod-orders_old",
            "arn:old",
            Utc::now() - Duration::days(30),
        );
        let coordinator = coordinator(&store, config(Some("prod"), false, 2));

        coordinator.run().await;

        assert_eq!(store.list_backups_calls(), 0);
        assert!(store.deleted().is_empty());
    }

    #[tokio::test]
    async fn test_rotation_only_touches_tables_in_scope() {
        let now = Utc::now();
        let store = Arc::new(MemoryBackupStore::new());
        store.add_backup(
            "prod-orders",
            "prod-orders_old",
            "arn:prod-old",
            now - Duration::days(10),
        );
        store.add_backup(
            "staging-orders",
            "staging-orders_old",
            "arn:staging-old",
            now - Duration::days(10),
        );
        let coordinator = coordinator(&store, config(Some("prod"), true, 2));

        let tables = vec!["prod-orders".to_string()];
        let result = coordinator.rotate_backups(&tables).await;

        assert_eq!(result.deleted, 1);
        assert_eq!(store.deleted(), vec!["arn:prod-old"]);
    }

    #[tokio::test]
    async fn test_rotation_keeps_backups_newer_than_cutoff() {
        let now = Utc::now();
        let store = Arc::new(MemoryBackupStore::new());
        store.add_backup(
            "prod-orders",
            "prod-orders_recent",
            "arn:recent",
            now - Duration::days(1),
        );
        let coordinator = coordinator(&store, config(Some("prod"), true, 2));

        let tables = vec!["prod-orders".to_string()];
        let result = coordinator.rotate_backups(&tables).await;

        assert_eq!(result, RotationRunResult::default());
        assert!(store.deleted().is_empty());
    }

    #[tokio::test]
    async fn test_rotation_listing_failure_deletes_nothing() {
        let store = Arc::new(MemoryBackupStore::new());
        store.add_backup(
            "prod-orders",
            "prod-orders_old",
            "arn:old",
            Utc::now() - Duration::days(30),
        );
        store.fail_list_backups();
        let coordinator = coordinator(&store, config(Some("prod"), true, 2));

        let tables = vec!["prod-orders".to_string()];
        let result = coordinator.rotate_backups(&tables).await;

        assert_eq!(result, RotationRunResult::default());
        assert!(store.deleted().is_empty());
    }

    #[tokio::test]
    async fn test_rotation_isolates_per_backup_delete_failures() {
        let now = Utc::now();
        let store = Arc::new(MemoryBackupStore::new());
        store.add_backup("prod-a", "prod-a_old", "arn:a", now - Duration::days(10));
        store.add_backup("prod-b", "prod-b_old", "arn:b", now - Duration::days(10));
        store.fail_delete_arn("arn:a");
        let coordinator = coordinator(&store, config(Some("prod"), true, 2));

        let tables = vec!["prod-a".to_string(), "prod-b".to_string()];
        let result = coordinator.rotate_backups(&tables).await;

        assert_eq!(result.deleted, 1);
        assert_eq!(result.failed, 1);
        assert_eq!(store.deleted(), vec!["arn:b"]);
    }

    /// Full pass: two matched tables get fresh backups, the expired backup
    /// of a matched table is removed, the recent one and the out-of-scope
    /// table are untouched.
    #[tokio::test]
    async fn test_end_to_end_backup_and_rotation() {
        let now = Utc::now();
        let store = Arc::new(MemoryBackupStore::with_tables([
            "prod-orders",
            "prod-users",
            "staging-orders",
        ]));
        store.add_backup(
            "prod-orders",
            "prod-orders_aged",
            "arn:aged",
            now - Duration::days(5),
        );
        store.add_backup(
            "prod-orders",
            "prod-orders_fresh",
            "arn:fresh",
            now - Duration::days(1),
        );
        let coordinator = coordinator(&store, config(Some("prod"), true, 2));

        let result = coordinator.run().await;

        assert_eq!(result.succeeded, vec!["prod-orders", "prod-users"]);
        assert!(result.failed.is_empty());

        let created = store.created();
        assert_eq!(created.len(), 2);
        assert_eq!(created[0].0, "prod-orders");
        assert!(created[0].1.starts_with("prod-orders_"));
        assert_eq!(created[1].0, "prod-users");

        assert_eq!(store.deleted(), vec!["arn:aged"]);
    }

    /// A failed backup keeps its table in the rotation scope: rotation runs
    /// over the full discovered set.
    #[tokio::test]
    async fn test_end_to_end_rotation_scope_survives_backup_failure() {
        let now = Utc::now();
        let store = Arc::new(MemoryBackupStore::with_tables(["prod-orders", "prod-users"]));
        store.fail_create_for("prod-users");
        store.add_backup(
            "prod-users",
            "prod-users_aged",
            "arn:users-aged",
            now - Duration::days(3),
        );
        let coordinator = coordinator(&store, config(Some("prod"), true, 2));

        let result = coordinator.run().await;

        assert_eq!(result.succeeded, vec!["prod-orders"]);
        assert_eq!(result.failed, vec!["prod-users"]);
        assert_eq!(store.deleted(), vec!["arn:users-aged"]);
    }
}
