//! Test doubles and common utilities for contract tests
//!
//! The doubles record every call they receive so tests can assert on the
//! exact sequence of store operations a manager issued.

#![allow(dead_code)]

use fwsync_core::catalog::{Catalog, ProviderId};
use fwsync_core::config::ManagerConfig;
use fwsync_core::manager::{CloudConfigManager, ManagerEvent, RuleManager};
use fwsync_core::model::{
    CloudConfig, CloudConfigFields, ConnectionTest, ExecutionResult, ExecutionStatus,
    FirewallRule, RecordId, Region, RuleFields, SystemConfig,
};
use fwsync_core::traits::{
    CloudConfigStore, Confirm, ConfirmPrompt, RuleStore, SystemStore,
};
use fwsync_core::{Error, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// A mock RuleStore that records calls and can fail on a chosen create
pub struct MockRuleStore {
    /// Call counter for list()
    list_call_count: AtomicUsize,
    /// Call counter for create()
    create_call_count: AtomicUsize,
    /// Call counter for delete()
    delete_call_count: AtomicUsize,
    /// Call counter for execute()
    execute_call_count: AtomicUsize,
    /// Payloads of create() calls, in order
    created: Mutex<Vec<RuleFields>>,
    /// Payloads of update() calls, in order
    updated: Mutex<Vec<FirewallRule>>,
    /// Rules returned by list()
    rules: Mutex<Vec<FirewallRule>>,
    /// 1-based create call that fails, if any
    fail_create_at: Option<usize>,
    /// Whether every update() call fails
    fail_update: bool,
    /// Result returned by execute()
    execution: Mutex<Option<ExecutionResult>>,
    next_id: AtomicUsize,
}

impl MockRuleStore {
    pub fn new() -> Self {
        Self {
            list_call_count: AtomicUsize::new(0),
            create_call_count: AtomicUsize::new(0),
            delete_call_count: AtomicUsize::new(0),
            execute_call_count: AtomicUsize::new(0),
            created: Mutex::new(Vec::new()),
            updated: Mutex::new(Vec::new()),
            rules: Mutex::new(Vec::new()),
            fail_create_at: None,
            fail_update: false,
            execution: Mutex::new(None),
            next_id: AtomicUsize::new(100),
        }
    }

    /// Make the n-th create() call (1-based) fail with a server error
    pub fn failing_create_at(mut self, call: usize) -> Self {
        self.fail_create_at = Some(call);
        self
    }

    /// Make every update() call fail with a server error
    pub fn failing_update(mut self) -> Self {
        self.fail_update = true;
        self
    }

    /// Seed the rules returned by list()
    pub fn with_rules(self, rules: Vec<FirewallRule>) -> Self {
        *self.rules.lock().unwrap() = rules;
        self
    }

    /// Set the result returned by execute()
    pub fn with_execution(self, result: ExecutionResult) -> Self {
        *self.execution.lock().unwrap() = Some(result);
        self
    }

    pub fn list_call_count(&self) -> usize {
        self.list_call_count.load(Ordering::SeqCst)
    }

    pub fn create_call_count(&self) -> usize {
        self.create_call_count.load(Ordering::SeqCst)
    }

    pub fn update_call_count(&self) -> usize {
        self.updated.lock().unwrap().len()
    }

    pub fn delete_call_count(&self) -> usize {
        self.delete_call_count.load(Ordering::SeqCst)
    }

    pub fn execute_call_count(&self) -> usize {
        self.execute_call_count.load(Ordering::SeqCst)
    }

    /// Ports sent to successful and failed create() calls, in order
    pub fn created_ports(&self) -> Vec<String> {
        self.created
            .lock()
            .unwrap()
            .iter()
            .map(|fields| fields.port.clone())
            .collect()
    }

    pub fn created_payloads(&self) -> Vec<RuleFields> {
        self.created.lock().unwrap().clone()
    }

    pub fn updated_payloads(&self) -> Vec<FirewallRule> {
        self.updated.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl RuleStore for MockRuleStore {
    async fn list(&self) -> Result<Vec<FirewallRule>> {
        self.list_call_count.fetch_add(1, Ordering::SeqCst);
        Ok(self.rules.lock().unwrap().clone())
    }

    async fn create(&self, fields: &RuleFields) -> Result<FirewallRule> {
        let call = self.create_call_count.fetch_add(1, Ordering::SeqCst) + 1;
        self.created.lock().unwrap().push(fields.clone());

        if self.fail_create_at == Some(call) {
            return Err(Error::http(500, "provider rejected rule"));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) as RecordId;
        let rule = rule_from_fields(id, fields);
        self.rules.lock().unwrap().push(rule.clone());
        Ok(rule)
    }

    async fn update(&self, id: RecordId, rule: &FirewallRule) -> Result<FirewallRule> {
        self.updated.lock().unwrap().push(rule.clone());

        if self.fail_update {
            return Err(Error::http(500, "provider rejected update"));
        }

        let mut rules = self.rules.lock().unwrap();
        match rules.iter_mut().find(|stored| stored.id == id) {
            Some(stored) => {
                *stored = rule.clone();
                Ok(rule.clone())
            }
            None => Err(Error::not_found(format!("rule {}", id))),
        }
    }

    async fn delete(&self, id: RecordId) -> Result<()> {
        self.delete_call_count.fetch_add(1, Ordering::SeqCst);
        self.rules.lock().unwrap().retain(|rule| rule.id != id);
        Ok(())
    }

    async fn execute(&self, id: RecordId) -> Result<ExecutionResult> {
        self.execute_call_count.fetch_add(1, Ordering::SeqCst);
        self.execution
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| Error::not_found(format!("rule {}", id)))
    }
}

/// A mock CloudConfigStore with fixed configs and recorded writes
pub struct MockConfigStore {
    configs: Mutex<Vec<CloudConfig>>,
    regions: Vec<Region>,
    /// Payloads of create() calls
    created: Mutex<Vec<CloudConfigFields>>,
    /// (id, payload) of update() calls
    updated: Mutex<Vec<(RecordId, CloudConfigFields)>>,
    /// Call counter for delete()
    delete_call_count: AtomicUsize,
    /// Call counter for regions()
    regions_call_count: AtomicUsize,
    /// Whether regions() fails
    fail_regions: bool,
}

impl MockConfigStore {
    pub fn new(configs: Vec<CloudConfig>) -> Self {
        Self {
            configs: Mutex::new(configs),
            regions: vec![Region {
                code: "cn-north-4".to_string(),
                name: "North China-Beijing4".to_string(),
            }],
            created: Mutex::new(Vec::new()),
            updated: Mutex::new(Vec::new()),
            delete_call_count: AtomicUsize::new(0),
            regions_call_count: AtomicUsize::new(0),
            fail_regions: false,
        }
    }

    pub fn failing_regions(mut self) -> Self {
        self.fail_regions = true;
        self
    }

    pub fn created_payloads(&self) -> Vec<CloudConfigFields> {
        self.created.lock().unwrap().clone()
    }

    pub fn updated_payloads(&self) -> Vec<(RecordId, CloudConfigFields)> {
        self.updated.lock().unwrap().clone()
    }

    pub fn delete_call_count(&self) -> usize {
        self.delete_call_count.load(Ordering::SeqCst)
    }

    pub fn regions_call_count(&self) -> usize {
        self.regions_call_count.load(Ordering::SeqCst)
    }
}

fn config_from_fields(id: RecordId, fields: &CloudConfigFields) -> CloudConfig {
    CloudConfig {
        id,
        provider: fields.provider.clone(),
        region: fields.region.clone(),
        instance_id: fields.instance_id.clone(),
        secret_id: fields.secret_id.clone(),
        secret_key: String::new(),
        description: fields.description.clone(),
        is_default: fields.is_default,
        is_enabled: fields.is_enabled,
        service_type: fields.service_type,
        project_id: fields.project_id.clone(),
        created_at: None,
    }
}

#[async_trait::async_trait]
impl CloudConfigStore for MockConfigStore {
    async fn list(&self) -> Result<Vec<CloudConfig>> {
        Ok(self.configs.lock().unwrap().clone())
    }

    async fn create(&self, fields: &CloudConfigFields) -> Result<CloudConfig> {
        self.created.lock().unwrap().push(fields.clone());
        let mut configs = self.configs.lock().unwrap();
        let config = config_from_fields(configs.len() as RecordId + 1, fields);
        configs.push(config.clone());
        Ok(config)
    }

    async fn update(&self, id: RecordId, fields: &CloudConfigFields) -> Result<CloudConfig> {
        self.updated.lock().unwrap().push((id, fields.clone()));
        Ok(config_from_fields(id, fields))
    }

    async fn delete(&self, id: RecordId) -> Result<()> {
        self.delete_call_count.fetch_add(1, Ordering::SeqCst);
        self.configs.lock().unwrap().retain(|config| config.id != id);
        Ok(())
    }

    async fn test(&self, id: RecordId) -> Result<ConnectionTest> {
        Ok(ConnectionTest {
            success: id % 2 == 1,
            message: format!("tested {}", id),
        })
    }

    async fn providers(&self) -> Result<Vec<String>> {
        Ok(vec![
            "Aliyun".to_string(),
            "TencentCloud".to_string(),
            "HuaweiCloud".to_string(),
        ])
    }

    async fn regions(&self, _provider: &str) -> Result<Vec<Region>> {
        self.regions_call_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_regions {
            return Err(Error::transport("region listing unavailable"));
        }
        Ok(self.regions.clone())
    }
}

/// A mock SystemStore that tracks calls
pub struct MockSystemStore {
    config: Mutex<SystemConfig>,
    current_ip: Mutex<String>,
    /// Call counter for save_config()
    save_call_count: AtomicUsize,
    /// Call counter for sync_ip()
    sync_call_count: AtomicUsize,
    /// Call counter for current_ip()
    current_ip_call_count: AtomicUsize,
}

impl MockSystemStore {
    pub fn new(current_ip: &str) -> Self {
        Self {
            config: Mutex::new(SystemConfig::default()),
            current_ip: Mutex::new(current_ip.to_string()),
            save_call_count: AtomicUsize::new(0),
            sync_call_count: AtomicUsize::new(0),
            current_ip_call_count: AtomicUsize::new(0),
        }
    }

    pub fn save_call_count(&self) -> usize {
        self.save_call_count.load(Ordering::SeqCst)
    }

    pub fn sync_call_count(&self) -> usize {
        self.sync_call_count.load(Ordering::SeqCst)
    }

    pub fn current_ip_call_count(&self) -> usize {
        self.current_ip_call_count.load(Ordering::SeqCst)
    }

    pub fn stored_config(&self) -> SystemConfig {
        self.config.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl SystemStore for MockSystemStore {
    async fn get_config(&self) -> Result<SystemConfig> {
        Ok(self.config.lock().unwrap().clone())
    }

    async fn save_config(&self, config: &SystemConfig) -> Result<()> {
        self.save_call_count.fetch_add(1, Ordering::SeqCst);
        *self.config.lock().unwrap() = config.clone();
        Ok(())
    }

    async fn sync_ip(&self) -> Result<String> {
        self.sync_call_count.fetch_add(1, Ordering::SeqCst);
        // The backend picks up a new address during the sync
        *self.current_ip.lock().unwrap() = "198.51.100.20".to_string();
        Ok("IP sync completed".to_string())
    }

    async fn current_ip(&self) -> Result<String> {
        self.current_ip_call_count.fetch_add(1, Ordering::SeqCst);
        Ok(self.current_ip.lock().unwrap().clone())
    }
}

/// A Confirm that answers every prompt the same way and records them
pub struct RecordingConfirm {
    answer: bool,
    prompts: Mutex<Vec<ConfirmPrompt>>,
}

impl RecordingConfirm {
    pub fn new(answer: bool) -> Self {
        Self {
            answer,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<ConfirmPrompt> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Confirm for RecordingConfirm {
    async fn confirm(&self, prompt: &ConfirmPrompt) -> bool {
        self.prompts.lock().unwrap().push(prompt.clone());
        self.answer
    }
}

/// Build a rule record as a store would return it
pub fn rule_from_fields(id: RecordId, fields: &RuleFields) -> FirewallRule {
    FirewallRule {
        id,
        remark: fields.remark.clone(),
        cloud_config_id: fields.cloud_config_id,
        port: fields.port.clone(),
        protocol: fields.protocol.clone(),
        enabled: fields.enabled,
        last_ip: "203.0.113.1".to_string(),
        updated_at: None,
        provider: None,
        instance_id: None,
    }
}

/// An enabled cloud config for the given provider and subtype
pub fn cloud_config(id: RecordId, provider: ProviderId, subtype: Option<u32>) -> CloudConfig {
    CloudConfig {
        id,
        provider,
        region: "cn-hangzhou".to_string(),
        instance_id: format!("i-{}", id),
        secret_id: "AKIDEXAMPLE".to_string(),
        secret_key: String::new(),
        description: format!("config {}", id),
        is_default: id == 1,
        is_enabled: true,
        service_type: subtype,
        project_id: None,
        created_at: None,
    }
}

/// The config fixture used across rule tests
///
/// | id | provider     | subtype |
/// |----|--------------|---------|
/// | 1  | TencentCloud | -       |
/// | 2  | HuaweiCloud  | -       |
/// | 3  | Aliyun       | 0 (ECS) |
/// | 4  | Aliyun       | 1 (SWAS)|
/// | 5  | AWS          | -       |
pub fn standard_configs() -> Vec<CloudConfig> {
    vec![
        cloud_config(1, ProviderId::TencentCloud, None),
        cloud_config(2, ProviderId::HuaweiCloud, None),
        cloud_config(3, ProviderId::Aliyun, Some(0)),
        cloud_config(4, ProviderId::Aliyun, Some(1)),
        cloud_config(5, ProviderId::from("AWS"), None),
    ]
}

/// A loaded rule manager over the given doubles
pub async fn loaded_rule_manager(
    rules: Arc<MockRuleStore>,
    configs: Arc<MockConfigStore>,
    confirm: Arc<RecordingConfirm>,
) -> (RuleManager, mpsc::Receiver<ManagerEvent>) {
    let (mut manager, rx) = RuleManager::new(
        rules,
        configs,
        confirm,
        Arc::new(Catalog::builtin()),
        &ManagerConfig::default(),
    )
    .expect("manager construction succeeds");

    manager.load().await.expect("initial load succeeds");
    (manager, rx)
}

/// A loaded cloud config manager over the given doubles
pub async fn loaded_config_manager(
    store: Arc<MockConfigStore>,
    confirm: Arc<RecordingConfirm>,
) -> (CloudConfigManager, mpsc::Receiver<ManagerEvent>) {
    let (mut manager, rx) = CloudConfigManager::new(
        store,
        confirm,
        Arc::new(Catalog::builtin()),
        &ManagerConfig::default(),
    )
    .expect("manager construction succeeds");

    manager.load().await.expect("initial load succeeds");
    (manager, rx)
}

/// Fill and submit a create form
pub async fn submit_new_rule(
    manager: &mut RuleManager,
    config_id: RecordId,
    protocol: fwsync_core::model::Protocol,
    port: &str,
) -> Result<fwsync_core::manager::SubmitOutcome> {
    manager.begin_create();
    manager.select_config(config_id)?;
    manager.set_protocol(protocol)?;
    if let Some(form) = manager.form_mut() {
        form.remark = "web".to_string();
        if form.port.is_empty() {
            form.port = port.to_string();
        }
    }
    manager.submit().await
}

/// Drain every event currently queued
pub fn drain_events(rx: &mut mpsc::Receiver<ManagerEvent>) -> Vec<ManagerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// An execution result with the given status
pub fn execution(status: ExecutionStatus, message: &str) -> ExecutionResult {
    ExecutionResult {
        cloud_ip: "203.0.113.1".to_string(),
        current_ip: "198.51.100.20".to_string(),
        changed: status == ExecutionStatus::Updated,
        status,
        message: message.to_string(),
    }
}
