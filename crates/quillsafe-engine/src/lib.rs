pub mod backup;
pub mod codec;
pub mod editing;
pub mod io;
pub mod models;
pub mod session;

#[cfg(test)]
pub mod tests;

// Re-export key types for easier usage
pub use backup::{BackupError, BackupScheduler, Countdown, SnapshotSource, TickOutcome};
pub use codec::{CodecError, DecodedDocument, PortableDocument};
pub use editing::{
    Alignment, Attributes, Fingerprint, FingerprintEvent, Flag, StyleRunBuffer, StyleUpdate,
};
pub use io::{BackupSet, IdentityRegistry, RegistryError, RenameReport};
pub use models::DocumentId;
pub use session::{EditorSession, SaveStatus, SessionError};
