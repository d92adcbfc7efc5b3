//! Shared DTOs (schemas-as-code) for the pbxfix workspace.
//!
//! # Design constraints
//! - Manifest types are read from `pbxfix.toml` and CLI arguments.
//! - Report types are serialized to disk; prefer adding optional fields over changing semantics.

pub mod id;
pub mod manifest;
pub mod report;

pub use id::ObjectId;

/// Schema identifiers.
pub mod schema {
    pub const PBXFIX_REPORT_V1: &str = "pbxfix.report.v1";
}
