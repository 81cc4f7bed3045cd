//! On-disk state next to the documents themselves: the identity index and
//! the backup snapshot families.

pub mod backup_set;
pub mod registry;

pub use backup_set::{BackupSet, RenameFailure, RenameReport, TIMESTAMP_FORMAT};
pub use registry::{IdentityRegistry, RegistryError};
