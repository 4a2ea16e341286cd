//! Privacy enforcement.
//!
//! Everything that keeps real identifiers on the device: the durable
//! name→alias map and the pseudonymization pass applied to the digest
//! before it is handed to downstream synthesis.

pub mod identity;

// Re-export commonly used types
pub use identity::{extract_names_from_titles, IdentityError, IdentityMap, IdentityRecord};
