// # fwsync-core
//
// Core library for managing cloud firewall rules that follow a changing
// public IP address.
//
// ## Architecture Overview
//
// - **Catalog**: Provider and service-subtype labels and capability flags
// - **RuleNormalizer**: Decides how a port specification becomes provider rules
// - **RuleStore / CloudConfigStore / SystemStore**: Traits for the backend
// - **Confirm**: Caller-supplied confirmation before destructive actions
// - **RuleManager / CloudConfigManager / SettingsManager**: Lifecycle managers
//   that drive forms, call the stores, and keep local lists in sync
//
// ## Design Principles
//
// 1. **Pure core**: Normalization has no I/O and never fails
// 2. **Injected catalog**: No global tables; fixtures replace the builtin one
// 3. **Sequential writes**: One store call at a time, no rollback
// 4. **Library-First**: The CLI is a thin shell over these types

pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod manager;
pub mod model;
pub mod store;
pub mod traits;

// Re-export core types for convenience
pub use catalog::{Catalog, ProviderId};
pub use config::{ApiConfig, ClientConfig, ManagerConfig};
pub use engine::RuleNormalizer;
pub use error::{Error, Result};
pub use manager::{CloudConfigManager, ManagerEvent, RuleManager, SettingsManager};
pub use store::MemoryStore;
pub use traits::{CloudConfigStore, Confirm, RuleStore, SystemStore};
