//! Format versions for persisted overlay data.

use serde::{Deserialize, Serialize};

/// Magic bytes at the start of every overlay chunk header.
pub const OVERLAY_MAGIC: [u8; 4] = *b"TOVL";

/// Version of a persisted format. A minor bump only adds fields; a major
/// bump makes older readers refuse the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaVersion {
    /// Breaking revision
    pub major: u16,
    /// Additive revision
    pub minor: u16,
}

impl SchemaVersion {
    /// Overlay chunk files.
    pub const OVERLAY: Self = Self { major: 1, minor: 0 };

    /// Per-world records.
    pub const WORLD_RECORD: Self = Self { major: 1, minor: 0 };

    /// Whether data stamped with `stored` can be read by this version.
    #[must_use]
    pub const fn reads(self, stored: Self) -> bool {
        self.major == stored.major
    }
}

impl std::fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}
