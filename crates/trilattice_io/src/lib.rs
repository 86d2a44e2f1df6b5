//! # Trilattice IO
//!
//! Persistence layer for trilattice worlds.
//!
//! This crate provides:
//! - Structured error handling with custom error types
//! - Serialization helpers for JSON and gzip-compressed JSON
//! - Binary rkyv snapshots guarded by a SHA-256 digest
//! - JSON-lines event logs

/// Error types and result aliases for I/O operations
pub mod error;
/// Append-only JSON-lines logs of lattice events
pub mod history;
/// Snapshot files in binary and JSON formats
pub mod persistence;
/// Validated serialization helpers for JSON and gzip JSON
pub mod serialization;

pub use error::{IoError, Result};
pub use persistence::{load_snapshot, save_snapshot, SnapshotFormat};
pub use serialization::{
    from_json, read_json_file, read_json_gz, to_json, to_json_pretty, validate_json,
    write_json_file, write_json_gz,
};
