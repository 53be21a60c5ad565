//! Configuration module.
//!
//! Everything is supplied through environment variables at invocation time;
//! there is no configuration file. The backup variables are set on the
//! function definition at deploy time:
//!
//! ```text
//! TABLE_REGEX=production
//! BACKUP_REMOVAL_ENABLED=true
//! BACKUP_RETENTION_DAYS=2
//! ```

mod backup;
mod observability;

pub use backup::*;
pub use observability::*;
