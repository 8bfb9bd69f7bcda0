//! GroundTask - background task orchestration for the GroundTrack antenna
//! control application.
//!
//! This library runs long-lived or blocking operations (antenna moves,
//! catalog downloads, ephemeris refreshes) off the interactive thread,
//! tracks their lifecycle in a registry, captures failures with full
//! diagnostic context, and guarantees that application shutdown never
//! leaves orphaned work running.
//!
//! # High-Level API
//!
//! The [`manager`] module provides the orchestrator:
//!
//! ```ignore
//! use groundtask::manager::{ManagerConfig, TaskManager, WorkResult};
//! use std::time::Duration;
//!
//! let manager = TaskManager::new(ManagerConfig::default());
//!
//! let handle = manager.submit("rotator-move", |ctx| async move {
//!     while !ctx.is_cancelled() {
//!         ctx.report_progress("slewing to 180.0 deg");
//!         // ... drive the hardware ...
//!     }
//!     WorkResult::Cancelled
//! })?;
//!
//! manager.cancel(handle.id());
//! let report = manager.shutdown(true, Duration::from_secs(5)).await;
//! ```
//!
//! Diagnostics for the presentation layer come from
//! [`manager::TaskManager::snapshot`], which returns immutable copies of
//! every tracked task.

pub mod diagnostics;
pub mod logging;
pub mod manager;
pub mod panic;

/// Version of the GroundTask library.
///
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
