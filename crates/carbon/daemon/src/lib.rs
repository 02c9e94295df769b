//! Carbon daemon library
//!
//! Core components for `carbond`:
//! - Layered configuration
//! - File-backed data source
//! - Daemon lifecycle (warm-up, refresh scheduler, periodic reports)

pub mod config;
pub mod daemon;
pub mod error;
pub mod source;

pub use config::DaemonConfig;
pub use daemon::{write_snapshots, Daemon, RegionSnapshot};
pub use error::{DaemonError, DaemonResult};
pub use source::{FileSource, RegionFile};
