pub mod identity;

pub use identity::DocumentId;
