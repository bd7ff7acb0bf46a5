//! Firewall rule lifecycle
//!
//! [`RuleManager`] turns one form submission into zero or more rule-store
//! calls, using the [`RuleNormalizer`] to decide how many records a port
//! specification becomes and in what literal syntax.
//!
//! ## Create flow
//!
//! 1. Validate the form (no store call on failure)
//! 2. Plan the expansion for the selected config's provider and subtype
//! 3. Issue one `create` per planned port, in order, one at a time
//! 4. Stop at the first failure; earlier records stand and later ones are
//!    never attempted
//! 5. Replace the rule list from the store if anything was written
//!
//! Updates never split: the whole port string is translated and written
//! back onto the existing record.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::{EventEmitter, FormMode, ManagerEvent, Session};
use crate::catalog::Catalog;
use crate::config::ManagerConfig;
use crate::engine::{self, ExpansionMode, ExpansionPlan, RuleNormalizer, RuleTarget};
use crate::model::{
    CloudConfig, ExecutionResult, ExecutionStatus, FirewallRule, Protocol, RecordId, RuleFields,
};
use crate::traits::{CloudConfigStore, Confirm, ConfirmPrompt, RuleStore};
use crate::{Error, Result};

/// Editable state of the rule form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleForm {
    /// Operator remark
    pub remark: String,
    /// Selected cloud config
    pub cloud_config_id: Option<RecordId>,
    /// Raw port specification as typed
    pub port: String,
    /// Protocol
    pub protocol: Protocol,
    /// Whether the rule is enabled
    pub enabled: bool,
}

impl Default for RuleForm {
    fn default() -> Self {
        Self {
            remark: String::new(),
            cloud_config_id: None,
            port: String::new(),
            protocol: Protocol::Tcp,
            enabled: true,
        }
    }
}

impl RuleForm {
    /// Pre-fill a form from an existing rule
    pub fn from_rule(rule: &FirewallRule) -> Self {
        Self {
            remark: rule.remark.clone(),
            cloud_config_id: Some(rule.cloud_config_id),
            port: rule.port.clone(),
            protocol: rule.protocol.clone(),
            enabled: rule.enabled,
        }
    }

    /// Check required fields and produce the writable field set
    ///
    /// The port may be left blank when the protocol covers every port.
    pub fn validate(&self) -> Result<RuleFields> {
        if self.remark.trim().is_empty() {
            return Err(Error::validation("Remark is required"));
        }

        let cloud_config_id = self
            .cloud_config_id
            .ok_or_else(|| Error::validation("Cloud config is required"))?;

        if engine::port_input_enabled(&self.protocol) && self.port.trim().is_empty() {
            return Err(Error::validation("Port is required"));
        }

        Ok(RuleFields {
            remark: self.remark.clone(),
            cloud_config_id,
            port: self.port.clone(),
            protocol: self.protocol.clone(),
            enabled: self.enabled,
        })
    }
}

/// An enabled cloud config offered as a rule target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigOption {
    /// Human-readable label
    pub label: String,
    /// Config identifier
    pub value: RecordId,
}

/// Outcome of one rule-creation call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallStatus {
    /// Record created
    Created(FirewallRule),
    /// Store rejected the call
    Failed(String),
    /// Skipped because an earlier call failed
    NotAttempted,
}

/// One planned rule-creation call and what happened to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOutcome {
    /// Port string sent (or planned)
    pub port: String,
    /// Result of the call
    pub status: CallStatus,
}

/// Ordered per-call outcomes of a create submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpansionReport {
    mode: ExpansionMode,
    calls: Vec<CallOutcome>,
}

impl ExpansionReport {
    /// How the submission was expanded
    pub fn mode(&self) -> ExpansionMode {
        self.mode
    }

    /// Calls in the order they were planned
    pub fn calls(&self) -> &[CallOutcome] {
        &self.calls
    }

    /// Number of planned calls
    pub fn intended(&self) -> usize {
        self.calls.len()
    }

    /// Number of records actually created
    pub fn created_count(&self) -> usize {
        self.created().count()
    }

    /// Records created, in call order
    pub fn created(&self) -> impl Iterator<Item = &FirewallRule> {
        self.calls.iter().filter_map(|call| match &call.status {
            CallStatus::Created(rule) => Some(rule),
            _ => None,
        })
    }

    /// Whether every planned call succeeded
    pub fn is_complete(&self) -> bool {
        self.created_count() == self.intended()
    }

    /// Message of the failed call, if any
    pub fn failure(&self) -> Option<&str> {
        self.calls.iter().find_map(|call| match &call.status {
            CallStatus::Failed(message) => Some(message.as_str()),
            _ => None,
        })
    }
}

/// Result of a successful submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// New records created
    Created(ExpansionReport),
    /// Existing record rewritten
    Updated(FirewallRule),
}

/// How an execution report should be presented
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportLevel {
    Success,
    Error,
}

/// Operator-facing summary of a rule execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    /// Executed rule
    pub rule_id: RecordId,
    /// Raw backend result
    pub result: ExecutionResult,
    /// Presentation level
    pub level: ReportLevel,
    /// Status-specific message
    pub message: String,
}

impl ExecutionReport {
    /// Build the report for a backend result
    pub fn new(rule_id: RecordId, result: ExecutionResult) -> Self {
        let (level, message) = match result.status {
            ExecutionStatus::Unchanged => (
                ReportLevel::Success,
                format!(
                    "{} (cloud IP: {}, current IP: {})",
                    result.message, result.cloud_ip, result.current_ip
                ),
            ),
            ExecutionStatus::Updated => (
                ReportLevel::Success,
                format!(
                    "{} (IP updated from {} to {})",
                    result.message, result.cloud_ip, result.current_ip
                ),
            ),
            ExecutionStatus::Error => (
                ReportLevel::Error,
                format!(
                    "{} (cloud IP: {}, current IP: {})",
                    result.message, result.cloud_ip, result.current_ip
                ),
            ),
            ExecutionStatus::Unknown => (ReportLevel::Success, result.message.clone()),
        };

        Self {
            rule_id,
            result,
            level,
            message,
        }
    }
}

/// Store writes a validated submission turns into
enum PendingWrite {
    Create {
        plan: ExpansionPlan,
        template: RuleFields,
    },
    Update(FirewallRule),
}

/// Firewall rule lifecycle manager
///
/// Owns the rule list, the cloud-config list used to resolve rule targets,
/// and the rule form session.
///
/// ## Lifecycle
///
/// 1. Create with [`RuleManager::new()`]
/// 2. Populate lists with [`RuleManager::load()`]
/// 3. Drive the form with `begin_create`/`begin_edit`, setters, `submit`
pub struct RuleManager {
    /// Rule persistence
    rule_store: Arc<dyn RuleStore>,

    /// Cloud config listing, for rule targets
    config_store: Arc<dyn CloudConfigStore>,

    /// Confirmation before execute and delete
    confirm: Arc<dyn Confirm>,

    normalizer: RuleNormalizer,
    rules: Vec<FirewallRule>,
    configs: Vec<CloudConfig>,
    session: Session<RuleForm, FirewallRule>,
    last_expansion: Option<ExpansionReport>,
    events: EventEmitter,
}

impl RuleManager {
    /// Create a new rule manager
    ///
    /// # Parameters
    ///
    /// - `rule_store`: Rule persistence
    /// - `config_store`: Cloud config persistence (read for rule targets)
    /// - `confirm`: Confirmation capability for execute and delete
    /// - `catalog`: Provider/subtype catalog
    /// - `config`: Manager settings
    ///
    /// # Returns
    ///
    /// A tuple of (manager, event_receiver) where event_receiver yields manager events
    pub fn new(
        rule_store: Arc<dyn RuleStore>,
        config_store: Arc<dyn CloudConfigStore>,
        confirm: Arc<dyn Confirm>,
        catalog: Arc<Catalog>,
        config: &ManagerConfig,
    ) -> Result<(Self, mpsc::Receiver<ManagerEvent>)> {
        config.validate()?;

        let (events, rx) = EventEmitter::channel(config.event_channel_capacity);

        let manager = Self {
            rule_store,
            config_store,
            confirm,
            normalizer: RuleNormalizer::new(catalog),
            rules: Vec::new(),
            configs: Vec::new(),
            session: Session::Idle,
            last_expansion: None,
            events,
        };

        Ok((manager, rx))
    }

    /// Current rule list
    pub fn rules(&self) -> &[FirewallRule] {
        &self.rules
    }

    /// Current cloud config list
    pub fn cloud_configs(&self) -> &[CloudConfig] {
        &self.configs
    }

    /// Enabled cloud configs, labelled for a target picker
    pub fn config_options(&self) -> Vec<ConfigOption> {
        self.configs
            .iter()
            .filter(|config| config.is_enabled)
            .map(|config| ConfigOption {
                label: self.normalizer.catalog().config_option_label(config),
                value: config.id,
            })
            .collect()
    }

    /// Form session
    pub fn session(&self) -> &Session<RuleForm, FirewallRule> {
        &self.session
    }

    /// Open form, if any
    pub fn form(&self) -> Option<&RuleForm> {
        self.session.form()
    }

    /// Open form for free-text edits (remark, port, enabled)
    ///
    /// Use [`RuleManager::set_protocol`] and [`RuleManager::select_config`]
    /// for the fields that drive the protocol override.
    pub fn form_mut(&mut self) -> Option<&mut RuleForm> {
        self.session.form_mut()
    }

    /// Report of the most recent create submission
    pub fn last_expansion(&self) -> Option<&ExpansionReport> {
        self.last_expansion.as_ref()
    }

    /// The normalizer used for submissions
    pub fn normalizer(&self) -> &RuleNormalizer {
        &self.normalizer
    }

    /// Load both lists from the stores
    pub async fn load(&mut self) -> Result<()> {
        self.refresh_configs().await?;
        self.refresh().await
    }

    /// Replace the rule list from the store
    pub async fn refresh(&mut self) -> Result<()> {
        self.rules = self.rule_store.list().await?;
        debug!("Loaded {} rules", self.rules.len());
        self.events.emit(ManagerEvent::RulesRefreshed {
            count: self.rules.len(),
        });
        Ok(())
    }

    /// Replace the cloud config list from the store
    pub async fn refresh_configs(&mut self) -> Result<()> {
        self.configs = self.config_store.list().await?;
        debug!("Loaded {} cloud configs", self.configs.len());
        self.events.emit(ManagerEvent::ConfigsRefreshed {
            count: self.configs.len(),
        });
        Ok(())
    }

    /// Open an empty form for a new rule
    pub fn begin_create(&mut self) {
        self.session = Session::Editing {
            mode: FormMode::Create,
            form: RuleForm::default(),
            error: None,
        };
        self.events.emit(ManagerEvent::SessionChanged { editing: true });
    }

    /// Open a form pre-filled from an existing rule
    pub fn begin_edit(&mut self, rule: &FirewallRule) {
        self.session = Session::Editing {
            mode: FormMode::Edit(rule.clone()),
            form: RuleForm::from_rule(rule),
            error: None,
        };
        self.events.emit(ManagerEvent::SessionChanged { editing: true });
    }

    /// Discard the form
    pub fn cancel(&mut self) {
        if self.session.is_open() {
            self.session = Session::Idle;
            self.events.emit(ManagerEvent::SessionChanged { editing: false });
        }
    }

    /// Change the protocol, re-applying the protocol override to the port
    pub fn set_protocol(&mut self, protocol: Protocol) -> Result<()> {
        let form = self
            .session
            .form_mut()
            .ok_or_else(|| Error::validation("No rule form is open"))?;
        form.protocol = protocol;
        self.apply_protocol_override();
        Ok(())
    }

    /// Change the target config, re-applying the protocol override to the port
    pub fn select_config(&mut self, id: RecordId) -> Result<()> {
        let form = self
            .session
            .form_mut()
            .ok_or_else(|| Error::validation("No rule form is open"))?;
        form.cloud_config_id = Some(id);
        self.apply_protocol_override();
        Ok(())
    }

    /// Cloud config the form currently targets
    pub fn selected_config(&self) -> Option<&CloudConfig> {
        let id = self.session.form()?.cloud_config_id?;
        self.find_config(id)
    }

    /// Whether the port field accepts input for the form's protocol
    pub fn port_input_enabled(&self) -> bool {
        self.session
            .form()
            .is_none_or(|form| engine::port_input_enabled(&form.protocol))
    }

    /// Whether the selected target accepts several ports in one rule
    pub fn supports_multi_port(&self) -> bool {
        self.selected_config().is_some_and(|config| {
            self.normalizer
                .multi_port_capable(&config.provider, config.service_type)
        })
    }

    /// Number of rules the form would create if submitted now
    pub fn port_count(&self) -> usize {
        let Some(form) = self.session.form() else {
            return 0;
        };

        match self.selected_config() {
            Some(config) => self.normalizer.expected_rule_count(
                &RuleTarget::from(config),
                &form.protocol,
                &form.port,
            ),
            None => engine::tokenize(&form.port).len(),
        }
    }

    /// Provider and subtype label for a rule's owning config
    pub fn full_provider_label(&self, rule: &FirewallRule) -> String {
        let catalog = self.normalizer.catalog();
        match self.find_config(rule.cloud_config_id) {
            Some(config) => catalog.full_label(&config.provider, config.service_type),
            None => rule
                .provider
                .as_ref()
                .map(|provider| catalog.display_name(provider))
                .unwrap_or_default(),
        }
    }

    /// Submit the open form
    ///
    /// # Returns
    ///
    /// - `Ok(SubmitOutcome)`: Every store call succeeded; the session is idle
    /// - `Err(Error::Validation)`: Nothing was sent; the form stays open
    /// - `Err(Error::PartialExpansion)`: Some rules were created; the form
    ///   stays open with the error
    /// - `Err(_)`: Store failure; the form stays open with the error
    pub async fn submit(&mut self) -> Result<SubmitOutcome> {
        let pending = match self.prepare_submit() {
            Ok(pending) => pending,
            Err(e) => {
                if let Session::Editing { error, .. } = &mut self.session {
                    *error = Some(e.to_string());
                }
                return Err(e);
            }
        };

        let Some((mode, form)) = self.session.start_submit() else {
            return Err(Error::validation("No rule form is open"));
        };

        let result = match pending {
            PendingWrite::Create { plan, template } => self
                .create_rules(plan, template)
                .await
                .map(SubmitOutcome::Created),
            PendingWrite::Update(rule) => self.update_rule(rule).await.map(SubmitOutcome::Updated),
        };

        match result {
            Ok(outcome) => {
                self.session = Session::Idle;
                self.events.emit(ManagerEvent::SessionChanged { editing: false });
                Ok(outcome)
            }
            Err(e) => {
                self.session.reopen(mode, form, e.to_string());
                Err(e)
            }
        }
    }

    /// Reconcile one rule against the current public IP, after confirmation
    ///
    /// # Returns
    ///
    /// - `Ok(Some(report))`: Executed; the rule list was refreshed
    /// - `Ok(None)`: The operator declined; nothing was sent
    pub async fn execute_rule(&mut self, id: RecordId) -> Result<Option<ExecutionReport>> {
        let prompt = ConfirmPrompt::info(format!("Execute rule {} now?", self.rule_label(id)));
        if !self.confirm.confirm(&prompt).await {
            debug!("Execution of rule {} declined", id);
            return Ok(None);
        }

        let result = self.rule_store.execute(id).await?;
        let report = ExecutionReport::new(id, result);

        match report.level {
            ReportLevel::Success => info!("Rule {}: {}", id, report.message),
            ReportLevel::Error => error!("Rule {}: {}", id, report.message),
        }

        self.events.emit(ManagerEvent::RuleExecuted {
            id,
            status: report.result.status,
        });
        self.refresh_after_write().await;

        Ok(Some(report))
    }

    /// Delete one rule, after confirmation
    ///
    /// Returns `false` when the operator declined.
    pub async fn delete_rule(&mut self, id: RecordId) -> Result<bool> {
        let prompt = ConfirmPrompt::warning(format!("Delete rule {}?", self.rule_label(id)));
        if !self.confirm.confirm(&prompt).await {
            debug!("Deletion of rule {} declined", id);
            return Ok(false);
        }

        self.rule_store.delete(id).await?;
        info!("Deleted rule {}", id);
        self.events.emit(ManagerEvent::RuleDeleted { id });
        self.refresh_after_write().await;

        Ok(true)
    }

    fn find_config(&self, id: RecordId) -> Option<&CloudConfig> {
        self.configs.iter().find(|config| config.id == id)
    }

    fn rule_label(&self, id: RecordId) -> String {
        match self.rules.iter().find(|rule| rule.id == id) {
            Some(rule) if !rule.remark.is_empty() => format!("'{}' ({})", rule.remark, id),
            _ => id.to_string(),
        }
    }

    fn apply_protocol_override(&mut self) {
        let sentinel = self.selected_config().and_then(|config| {
            let form = self.session.form()?;
            engine::protocol_override(&config.provider, &form.protocol)
        });

        if let (Some(sentinel), Some(form)) = (sentinel, self.session.form_mut()) {
            form.port = sentinel.to_string();
        }
    }

    /// Validate the form and work out the store writes, without side effects
    fn prepare_submit(&self) -> Result<PendingWrite> {
        let (mode, form) = match &self.session {
            Session::Editing { mode, form, .. } => (mode, form),
            _ => return Err(Error::validation("No rule form is open")),
        };

        let fields = form.validate()?;
        let config = self.find_config(fields.cloud_config_id);

        match mode {
            FormMode::Create => {
                let config = config.ok_or_else(|| {
                    Error::validation(format!("Unknown cloud config {}", fields.cloud_config_id))
                })?;
                if !config.is_enabled {
                    return Err(Error::validation(format!(
                        "Cloud config {} is disabled",
                        config.id
                    )));
                }

                let plan = self.normalizer.plan_create(
                    &RuleTarget::from(config),
                    &fields.protocol,
                    &fields.port,
                );
                if plan.is_empty() {
                    return Err(Error::validation("Port specification contains no ports"));
                }

                Ok(PendingWrite::Create {
                    plan,
                    template: fields,
                })
            }
            FormMode::Edit(prior) => {
                let provider = config
                    .map(|config| config.provider.clone())
                    .or_else(|| prior.provider.clone())
                    .ok_or_else(|| {
                        Error::validation(format!("Unknown cloud config {}", fields.cloud_config_id))
                    })?;

                let port = engine::normalize_update(&provider, &fields.protocol, &fields.port);
                let mut rule = prior.merged(&fields);
                rule.port = port;

                Ok(PendingWrite::Update(rule))
            }
        }
    }

    async fn create_rules(
        &mut self,
        plan: ExpansionPlan,
        template: RuleFields,
    ) -> Result<ExpansionReport> {
        let requests = plan.requests(&template);
        let intended = requests.len();
        debug!(
            "Creating {} rule(s) for config {} ({:?})",
            intended,
            template.cloud_config_id,
            plan.mode()
        );

        let mut calls = Vec::with_capacity(intended);
        let mut failure: Option<Error> = None;

        for request in requests {
            if failure.is_some() {
                calls.push(CallOutcome {
                    port: request.port,
                    status: CallStatus::NotAttempted,
                });
                continue;
            }

            match self.rule_store.create(&request).await {
                Ok(rule) => {
                    info!("Created rule {} (port {})", rule.id, rule.port);
                    self.events.emit(ManagerEvent::RuleCreated {
                        id: rule.id,
                        port: rule.port.clone(),
                    });
                    calls.push(CallOutcome {
                        port: request.port,
                        status: CallStatus::Created(rule),
                    });
                }
                Err(e) => {
                    warn!("Failed to create rule for port {}: {}", request.port, e);
                    calls.push(CallOutcome {
                        port: request.port,
                        status: CallStatus::Failed(e.to_string()),
                    });
                    failure = Some(e);
                }
            }
        }

        let report = ExpansionReport {
            mode: plan.mode(),
            calls,
        };
        let created = report.created_count();
        self.last_expansion = Some(report.clone());

        if created > 0 {
            self.refresh_after_write().await;
        }

        match failure {
            None => Ok(report),
            Some(e) if intended == 1 => Err(e),
            Some(e) => {
                warn!("Created {} of {} rules before a failure", created, intended);
                self.events
                    .emit(ManagerEvent::ExpansionIncomplete { created, intended });
                Err(Error::PartialExpansion {
                    created,
                    intended,
                    message: e.to_string(),
                })
            }
        }
    }

    async fn update_rule(&mut self, rule: FirewallRule) -> Result<FirewallRule> {
        let updated = self.rule_store.update(rule.id, &rule).await?;
        info!("Updated rule {} (port {})", updated.id, updated.port);
        self.events.emit(ManagerEvent::RuleUpdated { id: updated.id });
        self.refresh_after_write().await;
        Ok(updated)
    }

    /// Refresh after a write; a failed refresh does not undo the write
    async fn refresh_after_write(&mut self) {
        if let Err(e) = self.refresh().await {
            warn!("Failed to refresh rules: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ProviderId;

    fn result(status: ExecutionStatus) -> ExecutionResult {
        ExecutionResult {
            cloud_ip: "1.1.1.1".to_string(),
            current_ip: "2.2.2.2".to_string(),
            changed: status == ExecutionStatus::Updated,
            status,
            message: "done".to_string(),
        }
    }

    #[test]
    fn test_execution_messages() {
        let unchanged = ExecutionReport::new(1, result(ExecutionStatus::Unchanged));
        assert_eq!(unchanged.message, "done (cloud IP: 1.1.1.1, current IP: 2.2.2.2)");
        assert_eq!(unchanged.level, ReportLevel::Success);

        let updated = ExecutionReport::new(1, result(ExecutionStatus::Updated));
        assert_eq!(updated.message, "done (IP updated from 1.1.1.1 to 2.2.2.2)");

        let failed = ExecutionReport::new(1, result(ExecutionStatus::Error));
        assert_eq!(failed.level, ReportLevel::Error);
        assert!(failed.message.contains("1.1.1.1") && failed.message.contains("2.2.2.2"));

        let unknown = ExecutionReport::new(1, result(ExecutionStatus::Unknown));
        assert_eq!(unknown.message, "done");
    }

    #[test]
    fn test_form_validation() {
        let mut form = RuleForm::default();
        assert!(form.validate().unwrap_err().is_validation());

        form.remark = "ssh".to_string();
        assert!(form.validate().is_err());

        form.cloud_config_id = Some(3);
        assert!(form.validate().is_err());

        form.protocol = Protocol::Icmp;
        assert!(form.validate().is_ok());

        form.protocol = Protocol::Tcp;
        form.port = "22".to_string();
        let fields = form.validate().unwrap();
        assert_eq!(fields.cloud_config_id, 3);
        assert!(fields.enabled);
    }

    #[test]
    fn test_report_counts() {
        let rule = FirewallRule {
            id: 1,
            remark: "web".to_string(),
            cloud_config_id: 3,
            port: "80".to_string(),
            protocol: Protocol::Tcp,
            enabled: true,
            last_ip: String::new(),
            updated_at: None,
            provider: Some(ProviderId::TencentCloud),
            instance_id: None,
        };
        let report = ExpansionReport {
            mode: ExpansionMode::Split,
            calls: vec![
                CallOutcome {
                    port: "80".to_string(),
                    status: CallStatus::Created(rule),
                },
                CallOutcome {
                    port: "443".to_string(),
                    status: CallStatus::Failed("boom".to_string()),
                },
                CallOutcome {
                    port: "8080".to_string(),
                    status: CallStatus::NotAttempted,
                },
            ],
        };

        assert_eq!(report.intended(), 3);
        assert_eq!(report.created_count(), 1);
        assert!(!report.is_complete());
        assert_eq!(report.failure(), Some("boom"));
    }
}
