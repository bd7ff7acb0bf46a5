// # Rule Store Trait
//
// Defines the interface to the remote store that persists firewall rules
// and applies them to cloud providers.
//
// ## Implementations
//
// - REST backend: `fwsync-store-http` crate
// - In-memory: `fwsync_core::store::MemoryStore` (embedding, tests)
//
// ## Usage
//
// ```rust,ignore
// use fwsync_core::RuleStore;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let store = /* RuleStore implementation */;
//
//     for rule in store.list().await? {
//         println!("{} {} {}", rule.id, rule.protocol, rule.port);
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

use crate::model::{ExecutionResult, FirewallRule, RecordId, RuleFields};

/// Trait for firewall rule stores
///
/// Every method is a single request against the store. Failures are opaque
/// to the managers: they are surfaced verbatim and never retried at this
/// layer.
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// ## Forbidden Capabilities
/// - ❌ Retry or back off (owned by the transport, if anywhere)
/// - ❌ Split, merge or rewrite port strings (owned by the normalization engine)
/// - ❌ Compensate partial expansions (no automatic deletes)
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// List every rule
    async fn list(&self) -> Result<Vec<FirewallRule>, crate::Error>;

    /// Create one rule
    ///
    /// `fields.port` is already in the provider's syntax.
    async fn create(&self, fields: &RuleFields) -> Result<FirewallRule, crate::Error>;

    /// Replace a rule with the given full record
    async fn update(&self, id: RecordId, rule: &FirewallRule) -> Result<FirewallRule, crate::Error>;

    /// Delete a rule
    async fn delete(&self, id: RecordId) -> Result<(), crate::Error>;

    /// Reconcile a rule against the current public IP
    ///
    /// The store may refresh `last_ip`/`UpdatedAt` even when nothing changed.
    async fn execute(&self, id: RecordId) -> Result<ExecutionResult, crate::Error>;
}
