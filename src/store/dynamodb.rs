//! DynamoDB implementation of the backup store.
//!
//! Uses the AWS SDK for Rust with the standard credential chain (environment,
//! instance profile, etc.). Pagination is consumed transparently: callers
//! always see the complete result set.

use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use chrono::{DateTime, Utc};
use tracing::debug;

use super::{BackupStore, BackupStoreError, BackupStoreResult, BackupSummary};

/// Configuration for the DynamoDB backup store.
#[derive(Debug, Clone, Default)]
pub struct DynamoStoreConfig {
    /// AWS region (e.g., "eu-west-1"). When unset, the region is resolved
    /// from the environment.
    pub region: Option<String>,
    /// Optional endpoint URL for testing with localstack.
    pub endpoint_url: Option<String>,
}

impl DynamoStoreConfig {
    /// Create a new config with the given region.
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: Some(region.into()),
            endpoint_url: None,
        }
    }

    /// Create a new config using the default region from the environment.
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Set a custom endpoint URL (useful for localstack testing).
    pub fn with_endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.endpoint_url = Some(url.into());
        self
    }
}

/// Backup store backed by the DynamoDB service.
pub struct DynamoBackupStore {
    client: Client,
}

impl DynamoBackupStore {
    /// Build an SDK client from the given configuration and wrap it.
    pub async fn new(config: DynamoStoreConfig) -> Self {
        let mut sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest());

        if let Some(region) = &config.region {
            sdk_config = sdk_config.region(aws_config::Region::new(region.clone()));
        }

        let sdk_config = sdk_config.load().await;

        let mut db_config = aws_sdk_dynamodb::config::Builder::from(&sdk_config);

        if let Some(endpoint_url) = &config.endpoint_url {
            db_config = db_config.endpoint_url(endpoint_url);
        }

        Self {
            client: Client::from_conf(db_config.build()),
        }
    }

    /// Wrap an already-built SDK client.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BackupStore for DynamoBackupStore {
    async fn list_tables(&self) -> BackupStoreResult<Vec<String>> {
        let mut names = Vec::new();
        let mut start_table: Option<String> = None;

        loop {
            let page = self
                .client
                .list_tables()
                .set_exclusive_start_table_name(start_table.take())
                .send()
                .await
                .map_err(|e| BackupStoreError::ListTables(e.into_service_error().to_string()))?;

            names.extend_from_slice(page.table_names());

            match page.last_evaluated_table_name() {
                Some(next) => start_table = Some(next.to_string()),
                None => break,
            }
        }

        debug!(count = names.len(), "Listed tables");
        Ok(names)
    }

    async fn list_backups_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> BackupStoreResult<Vec<BackupSummary>> {
        let mut backups = Vec::new();
        let mut start_arn: Option<String> = None;

        loop {
            let page = self
                .client
                .list_backups()
                .time_range_upper_bound(aws_smithy_types::DateTime::from_secs(cutoff.timestamp()))
                .set_exclusive_start_backup_arn(start_arn.take())
                .send()
                .await
                .map_err(|e| BackupStoreError::ListBackups(e.into_service_error().to_string()))?;

            for summary in page.backup_summaries() {
                // The service marks every field optional; a summary missing
                // its name, table, ARN, or creation time cannot be rotated.
                let (Some(table_name), Some(backup_name), Some(backup_arn)) = (
                    summary.table_name(),
                    summary.backup_name(),
                    summary.backup_arn(),
                ) else {
                    continue;
                };
                let Some(created_at) = summary
                    .backup_creation_date_time()
                    .and_then(|dt| DateTime::from_timestamp(dt.secs(), dt.subsec_nanos()))
                else {
                    continue;
                };

                backups.push(BackupSummary {
                    table_name: table_name.to_string(),
                    backup_name: backup_name.to_string(),
                    backup_arn: backup_arn.to_string(),
                    created_at,
                });
            }

            match page.last_evaluated_backup_arn() {
                Some(next) => start_arn = Some(next.to_string()),
                None => break,
            }
        }

        debug!(count = backups.len(), cutoff = %cutoff, "Listed backups before cutoff");
        Ok(backups)
    }

    async fn create_backup(&self, table: &str, backup_name: &str) -> BackupStoreResult<()> {
        self.client
            .create_backup()
            .table_name(table)
            .backup_name(backup_name)
            .send()
            .await
            .map_err(|e| BackupStoreError::CreateBackup(e.into_service_error().to_string()))?;

        debug!(table, backup_name, "Requested table backup");
        Ok(())
    }

    async fn delete_backup(&self, backup_arn: &str) -> BackupStoreResult<()> {
        self.client
            .delete_backup()
            .backup_arn(backup_arn)
            .send()
            .await
            .map_err(|e| BackupStoreError::DeleteBackup(e.into_service_error().to_string()))?;

        debug!(backup_arn, "Deleted backup");
        Ok(())
    }
}
