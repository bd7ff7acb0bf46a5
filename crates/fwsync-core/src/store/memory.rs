// # Memory Store
//
// In-memory implementation of RuleStore, CloudConfigStore and SystemStore.
//
// ## Purpose
//
// Provides a self-contained backend for embedding the managers without a
// console server, and for exercising full create/edit/execute flows in
// tests.
//
// ## Behavior
//
// - Rule creation requires the referenced cloud config to exist, and copies
//   its provider and instance id onto the rule (as the backend does)
// - Secret keys are write-only: `list()` returns configs with a blank
//   `secret_key`, and updates without one keep the stored value
// - `execute()` compares the rule's `last_ip` with the IP set through
//   [`MemoryStore::set_current_ip`]
// - All state is lost when the store is dropped

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::model::{
    CloudConfig, CloudConfigFields, ConnectionTest, ExecutionResult, ExecutionStatus,
    FirewallRule, RecordId, Region, RuleFields, SystemConfig,
};
use crate::traits::{CloudConfigStore, RuleStore, SystemStore};
use crate::Error;

#[derive(Debug, Default)]
struct Inner {
    next_id: RecordId,
    rules: BTreeMap<RecordId, FirewallRule>,
    configs: BTreeMap<RecordId, CloudConfig>,
    regions: BTreeMap<String, Vec<Region>>,
    providers: Vec<String>,
    system: SystemConfig,
    current_ip: String,
}

impl Inner {
    fn allocate_id(&mut self) -> RecordId {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory backend
///
/// Cloning yields a handle to the same state.
///
/// # Example
///
/// ```rust,no_run
/// use fwsync_core::store::MemoryStore;
/// use fwsync_core::traits::RuleStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryStore::new();
///     assert!(RuleStore::list(&store).await?.is_empty());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        let inner = Inner {
            providers: vec![
                "Aliyun".to_string(),
                "TencentCloud".to_string(),
                "HuaweiCloud".to_string(),
            ],
            current_ip: "127.0.0.1".to_string(),
            ..Inner::default()
        };
        Self {
            inner: Arc::new(RwLock::new(inner)),
        }
    }

    /// Set the public IP that `execute()` reconciles against
    pub async fn set_current_ip(&self, ip: impl Into<String>) {
        self.inner.write().await.current_ip = ip.into();
    }

    /// Register the regions offered for a provider
    pub async fn set_regions(&self, provider: impl Into<String>, regions: Vec<Region>) {
        self.inner.write().await.regions.insert(provider.into(), regions);
    }

    /// Stored secret key of a config (tests and diagnostics only)
    pub async fn stored_secret(&self, id: RecordId) -> Option<String> {
        let guard = self.inner.read().await;
        guard.configs.get(&id).map(|config| config.secret_key.clone())
    }

    /// Number of rules in the store
    pub async fn rule_count(&self) -> usize {
        self.inner.read().await.rules.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn config_from_fields(id: RecordId, fields: &CloudConfigFields, secret_key: String) -> CloudConfig {
    CloudConfig {
        id,
        provider: fields.provider.clone(),
        region: fields.region.clone(),
        instance_id: fields.instance_id.clone(),
        secret_id: fields.secret_id.clone(),
        secret_key,
        description: fields.description.clone(),
        is_default: fields.is_default,
        is_enabled: fields.is_enabled,
        service_type: fields.service_type,
        project_id: fields.project_id.clone(),
        created_at: Some(chrono::Utc::now()),
    }
}

fn without_secret(config: &CloudConfig) -> CloudConfig {
    CloudConfig {
        secret_key: String::new(),
        ..config.clone()
    }
}

#[async_trait]
impl RuleStore for MemoryStore {
    async fn list(&self) -> Result<Vec<FirewallRule>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.rules.values().cloned().collect())
    }

    async fn create(&self, fields: &RuleFields) -> Result<FirewallRule, Error> {
        let mut guard = self.inner.write().await;
        let config = guard
            .configs
            .get(&fields.cloud_config_id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("cloud config {}", fields.cloud_config_id)))?;

        let id = guard.allocate_id();
        let rule = FirewallRule {
            id,
            remark: fields.remark.clone(),
            cloud_config_id: fields.cloud_config_id,
            port: fields.port.clone(),
            protocol: fields.protocol.clone(),
            enabled: fields.enabled,
            last_ip: String::new(),
            updated_at: Some(chrono::Utc::now()),
            provider: Some(config.provider.clone()),
            instance_id: Some(config.instance_id.clone()),
        };
        guard.rules.insert(id, rule.clone());
        Ok(rule)
    }

    async fn update(&self, id: RecordId, rule: &FirewallRule) -> Result<FirewallRule, Error> {
        let mut guard = self.inner.write().await;
        if !guard.rules.contains_key(&id) {
            return Err(Error::not_found(format!("rule {}", id)));
        }

        let stored = FirewallRule {
            id,
            updated_at: Some(chrono::Utc::now()),
            ..rule.clone()
        };
        guard.rules.insert(id, stored.clone());
        Ok(stored)
    }

    async fn delete(&self, id: RecordId) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard
            .rules
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(format!("rule {}", id)))
    }

    async fn execute(&self, id: RecordId) -> Result<ExecutionResult, Error> {
        let mut guard = self.inner.write().await;
        let current_ip = guard.current_ip.clone();
        let rule = guard
            .rules
            .get_mut(&id)
            .ok_or_else(|| Error::not_found(format!("rule {}", id)))?;

        let cloud_ip = rule.last_ip.clone();
        rule.updated_at = Some(chrono::Utc::now());

        if cloud_ip == current_ip {
            return Ok(ExecutionResult {
                cloud_ip,
                current_ip,
                changed: false,
                status: ExecutionStatus::Unchanged,
                message: "IP unchanged, no update needed".to_string(),
            });
        }

        rule.last_ip = current_ip.clone();
        Ok(ExecutionResult {
            cloud_ip,
            current_ip,
            changed: true,
            status: ExecutionStatus::Updated,
            message: "Rule updated".to_string(),
        })
    }
}

#[async_trait]
impl CloudConfigStore for MemoryStore {
    async fn list(&self) -> Result<Vec<CloudConfig>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.configs.values().map(without_secret).collect())
    }

    async fn create(&self, fields: &CloudConfigFields) -> Result<CloudConfig, Error> {
        let mut guard = self.inner.write().await;
        let id = guard.allocate_id();
        let secret_key = fields.secret_key.clone().unwrap_or_default();
        let config = config_from_fields(id, fields, secret_key);
        guard.configs.insert(id, config.clone());
        Ok(without_secret(&config))
    }

    async fn update(&self, id: RecordId, fields: &CloudConfigFields) -> Result<CloudConfig, Error> {
        let mut guard = self.inner.write().await;
        let existing = guard
            .configs
            .get(&id)
            .ok_or_else(|| Error::not_found(format!("cloud config {}", id)))?;

        let secret_key = match &fields.secret_key {
            Some(secret) => secret.clone(),
            None => existing.secret_key.clone(),
        };
        let created_at = existing.created_at;

        let config = CloudConfig {
            created_at,
            ..config_from_fields(id, fields, secret_key)
        };
        guard.configs.insert(id, config.clone());
        Ok(without_secret(&config))
    }

    async fn delete(&self, id: RecordId) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard
            .configs
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(format!("cloud config {}", id)))
    }

    async fn test(&self, id: RecordId) -> Result<ConnectionTest, Error> {
        let guard = self.inner.read().await;
        let config = guard
            .configs
            .get(&id)
            .ok_or_else(|| Error::not_found(format!("cloud config {}", id)))?;

        if config.secret_id.is_empty() || config.secret_key.is_empty() {
            return Ok(ConnectionTest {
                success: false,
                message: "Credentials are incomplete".to_string(),
            });
        }

        Ok(ConnectionTest {
            success: true,
            message: "Connection succeeded".to_string(),
        })
    }

    async fn providers(&self) -> Result<Vec<String>, Error> {
        Ok(self.inner.read().await.providers.clone())
    }

    async fn regions(&self, provider: &str) -> Result<Vec<Region>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.regions.get(provider).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl SystemStore for MemoryStore {
    async fn get_config(&self) -> Result<SystemConfig, Error> {
        Ok(self.inner.read().await.system.clone())
    }

    async fn save_config(&self, config: &SystemConfig) -> Result<(), Error> {
        self.inner.write().await.system = config.clone();
        Ok(())
    }

    async fn sync_ip(&self) -> Result<String, Error> {
        Ok("IP sync triggered".to_string())
    }

    async fn current_ip(&self) -> Result<String, Error> {
        Ok(self.inner.read().await.current_ip.clone())
    }
}
