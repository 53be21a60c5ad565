//! Backup storage boundary for the DynamoDB service.
//!
//! Everything the coordinator needs from DynamoDB is expressed as the four
//! operations of the [`BackupStore`] trait:
//!
//! - enumerate tables (paginated)
//! - enumerate backups older than a cutoff (paginated)
//! - create a named backup for a table
//! - delete a backup by its ARN
//!
//! Two backends exist: [`DynamoBackupStore`] wraps the AWS SDK client, and
//! [`MemoryBackupStore`] is an in-memory backend for tests.

mod dynamodb;

use std::{collections::HashSet, sync::Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
pub use dynamodb::{DynamoBackupStore, DynamoStoreConfig};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackupStoreError {
    #[error("Failed to list tables: {0}")]
    ListTables(String),

    #[error("Failed to list backups: {0}")]
    ListBackups(String),

    #[error("Failed to create backup: {0}")]
    CreateBackup(String),

    #[error("Failed to delete backup: {0}")]
    DeleteBackup(String),
}

pub type BackupStoreResult<T> = Result<T, BackupStoreError>;

/// One existing backup as reported by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupSummary {
    /// Table the backup belongs to.
    pub table_name: String,
    /// Generated backup name.
    pub backup_name: String,
    /// Opaque handle used for deletion.
    pub backup_arn: String,
    /// When the backup was created.
    pub created_at: DateTime<Utc>,
}

/// Trait over the backup operations of the database service.
///
/// Implementations must be `Send + Sync`; the coordinator holds the store
/// behind an `Arc<dyn BackupStore>`.
#[async_trait]
pub trait BackupStore: Send + Sync {
    /// List the names of every table in the service, across all pages.
    async fn list_tables(&self) -> BackupStoreResult<Vec<String>>;

    /// List every backup created strictly before `cutoff`, across all pages.
    ///
    /// The cutoff is pushed down to the service-side time-range filter, so
    /// backups at or after the cutoff are never returned.
    async fn list_backups_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> BackupStoreResult<Vec<BackupSummary>>;

    /// Request a new point-in-time backup of `table` under `backup_name`.
    async fn create_backup(&self, table: &str, backup_name: &str) -> BackupStoreResult<()>;

    /// Delete a backup by its ARN.
    async fn delete_backup(&self, backup_arn: &str) -> BackupStoreResult<()>;
}

/// In-memory backup store (for testing only).
///
/// Seeded with tables and backups, it records every create and delete
/// request and can be told to fail specific operations.
#[derive(Default)]
pub struct MemoryBackupStore {
    inner: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    tables: Vec<String>,
    backups: Vec<BackupSummary>,
    created: Vec<(String, String)>,
    deleted: Vec<String>,
    fail_list_tables: bool,
    fail_list_backups: bool,
    fail_create_for: HashSet<String>,
    fail_delete_arns: HashSet<String>,
    list_tables_calls: usize,
    list_backups_calls: usize,
    create_attempts: usize,
}

impl MemoryBackupStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with the given table names.
    pub fn with_tables<I, S>(tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::new();
        store.inner.lock().unwrap().tables = tables.into_iter().map(Into::into).collect();
        store
    }

    /// Seed one existing backup.
    pub fn add_backup(
        &self,
        table: &str,
        backup_name: &str,
        backup_arn: &str,
        created_at: DateTime<Utc>,
    ) {
        self.inner.lock().unwrap().backups.push(BackupSummary {
            table_name: table.to_string(),
            backup_name: backup_name.to_string(),
            backup_arn: backup_arn.to_string(),
            created_at,
        });
    }

    /// Make `list_tables` fail.
    pub fn fail_list_tables(&self) {
        self.inner.lock().unwrap().fail_list_tables = true;
    }

    /// Make `list_backups_before` fail.
    pub fn fail_list_backups(&self) {
        self.inner.lock().unwrap().fail_list_backups = true;
    }

    /// Make `create_backup` fail for the given table.
    pub fn fail_create_for(&self, table: &str) {
        self.inner
            .lock()
            .unwrap()
            .fail_create_for
            .insert(table.to_string());
    }

    /// Make `delete_backup` fail for the given ARN.
    pub fn fail_delete_arn(&self, backup_arn: &str) {
        self.inner
            .lock()
            .unwrap()
            .fail_delete_arns
            .insert(backup_arn.to_string());
    }

    /// Every `(table, backup_name)` creation request seen so far.
    pub fn created(&self) -> Vec<(String, String)> {
        self.inner.lock().unwrap().created.clone()
    }

    /// Every backup ARN deleted so far.
    pub fn deleted(&self) -> Vec<String> {
        self.inner.lock().unwrap().deleted.clone()
    }

    /// How many times `list_tables` was called.
    pub fn list_tables_calls(&self) -> usize {
        self.inner.lock().unwrap().list_tables_calls
    }

    /// How many times `list_backups_before` was called.
    pub fn list_backups_calls(&self) -> usize {
        self.inner.lock().unwrap().list_backups_calls
    }

    /// How many creation attempts were made, counting failed ones.
    pub fn create_attempts(&self) -> usize {
        self.inner.lock().unwrap().create_attempts
    }
}

#[async_trait]
impl BackupStore for MemoryBackupStore {
    async fn list_tables(&self) -> BackupStoreResult<Vec<String>> {
        let mut state = self.inner.lock().unwrap();
        state.list_tables_calls += 1;
        if state.fail_list_tables {
            return Err(BackupStoreError::ListTables("connection refused".into()));
        }
        Ok(state.tables.clone())
    }

    async fn list_backups_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> BackupStoreResult<Vec<BackupSummary>> {
        let mut state = self.inner.lock().unwrap();
        state.list_backups_calls += 1;
        if state.fail_list_backups {
            return Err(BackupStoreError::ListBackups("connection refused".into()));
        }
        Ok(state
            .backups
            .iter()
            .filter(|b| b.created_at < cutoff)
            .cloned()
            .collect())
    }

    async fn create_backup(&self, table: &str, backup_name: &str) -> BackupStoreResult<()> {
        let mut state = self.inner.lock().unwrap();
        state.create_attempts += 1;
        if state.fail_create_for.contains(table) {
            return Err(BackupStoreError::CreateBackup(format!(
                "table not found: {table}"
            )));
        }
        state
            .created
            .push((table.to_string(), backup_name.to_string()));
        Ok(())
    }

    async fn delete_backup(&self, backup_arn: &str) -> BackupStoreResult<()> {
        let mut state = self.inner.lock().unwrap();
        if state.fail_delete_arns.contains(backup_arn) {
            return Err(BackupStoreError::DeleteBackup(format!(
                "backup not found: {backup_arn}"
            )));
        }
        state.deleted.push(backup_arn.to_string());
        Ok(())
    }
}
