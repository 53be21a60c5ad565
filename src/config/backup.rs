//! Backup run configuration.

use tracing::warn;

/// Variable holding the table-selection regex.
pub const TABLE_REGEX: &str = "TABLE_REGEX";
/// Variable enabling the rotation step when set to exactly `"true"`.
pub const BACKUP_REMOVAL_ENABLED: &str = "BACKUP_REMOVAL_ENABLED";
/// Variable holding the retention window in days.
pub const BACKUP_RETENTION_DAYS: &str = "BACKUP_RETENTION_DAYS";

/// Configuration for a single backup run.
#[derive(Debug, Clone, Default)]
pub struct BackupConfig {
    /// Regex selecting tables by name, anchored at the start of the name.
    /// `None` when unset or empty; the run then processes no tables.
    pub table_pattern: Option<String>,

    /// Whether the rotation step runs.
    pub rotation_enabled: bool,

    /// Backups older than `now - retention_days` are eligible for deletion.
    pub retention_days: u32,
}

impl BackupConfig {
    /// Read the configuration from the environment.
    ///
    /// A missing or non-integer `BACKUP_RETENTION_DAYS` while removal is
    /// enabled logs a warning and disables the rotation step for the run;
    /// a fallback window of zero days would make every backup eligible for
    /// deletion.
    pub fn from_env() -> Self {
        let table_pattern = std::env::var(TABLE_REGEX).ok().filter(|p| !p.is_empty());

        let mut rotation_enabled = std::env::var(BACKUP_REMOVAL_ENABLED).is_ok_and(|v| v == "true");

        let retention_days = match std::env::var(BACKUP_RETENTION_DAYS) {
            Ok(raw) => match raw.trim().parse::<u32>() {
                Ok(days) => days,
                Err(_) => {
                    if rotation_enabled {
                        warn!(
                            value = %raw,
                            "{BACKUP_RETENTION_DAYS} is not a whole number of days, disabling backup removal"
                        );
                        rotation_enabled = false;
                    }
                    0
                }
            },
            Err(_) => {
                if rotation_enabled {
                    warn!(
                        "{BACKUP_REMOVAL_ENABLED} is set but {BACKUP_RETENTION_DAYS} is missing, disabling backup removal"
                    );
                    rotation_enabled = false;
                }
                0
            }
        };

        Self {
            table_pattern,
            rotation_enabled,
            retention_days,
        }
    }
}
