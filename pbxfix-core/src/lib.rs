//! Embeddable core library for pbxfix.
//!
//! Provides a clap-free, I/O-abstracted entry point for registering files in an Xcode project,
//! suitable for linking into another tool or a build script.
//!
//! # Port traits
//!
//! All I/O is abstracted behind port traits in [`ports`]:
//! - [`ProjectSource`](ports::ProjectSource) reads the project file
//! - [`WritePort`](ports::WritePort) replaces it atomically, keeps backups and writes reports
//!
//! The [`adapters`] module provides default filesystem-backed implementations.
//!
//! # Entry points
//!
//! - [`run_plan`](pipeline::run_plan) computes the mutation and its patch without writing
//! - [`run_apply`](pipeline::run_apply) computes the mutation and persists it
//! - [`list_groups`](pipeline::list_groups) lists the group paths a manifest can target

pub mod adapters;
pub mod pipeline;
pub mod ports;
pub mod settings;

pub use pipeline::{AddOutcome, list_groups, resolve_project_path, run_apply, run_plan};

// Re-export the manifest types so embedders don't need pbxfix-types directly.
pub use pbxfix_types::manifest::{FileDescriptor, GroupPlacement, Manifest};
