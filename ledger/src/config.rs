// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Platform Configuration & Constants
//!
//! Status codes for cross-partition calls, the timestamp format every
//! partition writes into its history, and the store backend selection.
//! Contract-level limits (issuance ceiling, per-user cap) live with the
//! contracts, not here.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Invocation Status Codes
// ---------------------------------------------------------------------------

/// The callee ran and committed.
pub const STATUS_OK: u16 = 200;

/// The callee's operation returned an error; nothing was committed there.
pub const STATUS_ERROR: u16 = 500;

/// The callee's operation succeeded but its own commit lost MVCC validation.
pub const STATUS_CONFLICT: u16 = 409;

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// Minute-resolution timestamp format used in history records.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

// ---------------------------------------------------------------------------
// Store Backend
// ---------------------------------------------------------------------------

/// Which store backs the partitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreConfig {
    /// Everything in memory; gone when the process exits.
    Memory,
    /// One sled database at `path`, one tree per partition.
    Sled { path: PathBuf },
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Memory
    }
}

/// Returns a label for a status code, mainly for logging.
pub fn status_name(status: u16) -> &'static str {
    match status {
        STATUS_OK => "ok",
        STATUS_ERROR => "error",
        STATUS_CONFLICT => "conflict",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_are_distinct() {
        assert_ne!(STATUS_OK, STATUS_ERROR);
        assert_ne!(STATUS_OK, STATUS_CONFLICT);
        assert_ne!(STATUS_ERROR, STATUS_CONFLICT);
    }

    #[test]
    fn status_names() {
        assert_eq!(status_name(STATUS_OK), "ok");
        assert_eq!(status_name(STATUS_CONFLICT), "conflict");
        assert_eq!(status_name(418), "unknown");
    }

    #[test]
    fn store_config_from_json() {
        let memory: StoreConfig = serde_json::from_str(r#"{"backend":"memory"}"#).unwrap();
        assert_eq!(memory, StoreConfig::Memory);

        let sled: StoreConfig =
            serde_json::from_str(r#"{"backend":"sled","path":"/var/lib/cbdc"}"#).unwrap();
        assert_eq!(
            sled,
            StoreConfig::Sled {
                path: PathBuf::from("/var/lib/cbdc")
            }
        );
    }

    #[test]
    fn timestamp_format_is_minute_resolution() {
        let ts = chrono::DateTime::parse_from_rfc3339("2026-03-01T09:41:59Z").unwrap();
        assert_eq!(ts.format(TIMESTAMP_FORMAT).to_string(), "2026-03-01 09:41");
    }
}
