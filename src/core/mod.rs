//! Pure aggregation and filtering logic.
//!
//! This module contains:
//! - Domain normalization, aggregation, and recency complement
//! - Noise-title and authentication-domain filters
//! - Importance tiering over formatted digest sections
//! - Epoch conversions for browser and system store timestamps
//!
//! Everything here is a pure function over already-collected data; no I/O.

pub mod domains;
pub mod filter;
pub mod tier;
pub mod time;

// Re-export commonly used functions
pub use domains::{aggregate_domains, complement_recent, domain_from_url, normalize_domain};
pub use filter::{
    dedupe_details, is_auth_domain, is_noise_title, suppress_low_signal, MAX_DETAILS_PER_DOMAIN,
};
pub use tier::{tier_sections, DEFAULT_DIGEST_LINE_BUDGET};
pub use time::{from_chrome_micros, to_chrome_micros, CHROME_EPOCH_OFFSET_MS};
