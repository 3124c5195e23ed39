#![forbid(unsafe_code)]

//! Core state management for the Chronoprises medication-intake tracker.
//!
//! This crate provides:
//! - Domain types (medications, shots, display preference)
//! - The normalized entity store and its dispatch surface
//! - Durable persistence with rehydration on startup
//! - JSON import/export and tab-separated list import
//! - Shot time correction and redose timing

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod collection;
pub mod ui;
pub mod persist;
pub mod codec;
pub mod list;
pub mod retime;
pub mod dose;
pub mod store;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use collection::{Collection, Record};
pub use ui::{UiPatch, UiState};
pub use persist::{FileStorage, KeyValueStorage, MemoryStorage, Persistor};
pub use codec::{ExportDocument, ImportDocument, ImportReport};
pub use retime::RetimeRequest;
pub use dose::DoseStatus;
pub use store::{Action, Outcome, Store};
