//! Configuration system for the Vista tile streaming core.
//!
//! Provides runtime-configurable settings that persist to disk as RON files,
//! including the level-of-detail policy consumed by the texture store.

mod config;
mod error;
mod policy;

pub use config::{Config, DebugConfig, StoreConfig, TelemetryConfig, ViewConfig};
pub use error::ConfigError;
pub use policy::{EvictionStrategy, LodPolicy};
