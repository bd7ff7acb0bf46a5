//! Core traits for fwsync
//!
//! This module defines the abstract interfaces the managers are built on.
//!
//! - [`RuleStore`]: Persist firewall rules and apply them to providers
//! - [`CloudConfigStore`]: Persist provider credentials and targets
//! - [`SystemStore`]: Backend settings and the IP-change detector
//! - [`Confirm`]: Caller-supplied confirmation before destructive actions

pub mod config_store;
pub mod confirm;
pub mod rule_store;
pub mod system_store;

pub use config_store::CloudConfigStore;
pub use confirm::{Confirm, ConfirmKind, ConfirmPrompt, StaticConfirm};
pub use rule_store::RuleStore;
pub use system_store::SystemStore;
