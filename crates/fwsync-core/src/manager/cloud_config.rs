//! Cloud config lifecycle
//!
//! Registration and editing of provider credentials and target resources.
//! Secret keys are write-only: an edit form starts with a blank key, and a
//! blank key on update leaves the stored one in place.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{EventEmitter, FormMode, ManagerEvent, Session};
use crate::catalog::{Catalog, ProviderId, ServiceType};
use crate::config::ManagerConfig;
use crate::model::{CloudConfig, CloudConfigFields, ConnectionTest, RecordId, Region};
use crate::traits::{CloudConfigStore, Confirm, ConfirmPrompt};
use crate::{Error, Result};

/// Editable state of the cloud config form
#[derive(Clone, PartialEq, Eq)]
pub struct CloudConfigForm {
    pub provider: Option<ProviderId>,
    pub region: String,
    pub instance_id: String,
    pub secret_id: String,
    /// Blank on edit; filled only when the operator replaces the secret
    pub secret_key: String,
    pub description: String,
    pub is_default: bool,
    pub is_enabled: bool,
    pub project_id: String,
    pub service_type: Option<u32>,
}

impl Default for CloudConfigForm {
    fn default() -> Self {
        Self {
            provider: None,
            region: String::new(),
            instance_id: String::new(),
            secret_id: String::new(),
            secret_key: String::new(),
            description: String::new(),
            is_default: false,
            is_enabled: true,
            project_id: String::new(),
            service_type: None,
        }
    }
}

// Custom Debug implementation that hides the secret key
impl std::fmt::Debug for CloudConfigForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudConfigForm")
            .field("provider", &self.provider)
            .field("region", &self.region)
            .field("instance_id", &self.instance_id)
            .field("secret_id", &self.secret_id)
            .field("secret_key", &"<REDACTED>")
            .field("description", &self.description)
            .field("is_default", &self.is_default)
            .field("is_enabled", &self.is_enabled)
            .field("project_id", &self.project_id)
            .field("service_type", &self.service_type)
            .finish()
    }
}

impl CloudConfigForm {
    /// Pre-fill a form from a stored config, leaving the secret key blank
    pub fn from_config(config: &CloudConfig) -> Self {
        Self {
            provider: Some(config.provider.clone()),
            region: config.region.clone(),
            instance_id: config.instance_id.clone(),
            secret_id: config.secret_id.clone(),
            secret_key: String::new(),
            description: config.description.clone(),
            is_default: config.is_default,
            is_enabled: config.is_enabled,
            project_id: config.project_id.clone().unwrap_or_default(),
            service_type: config.service_type,
        }
    }

    /// Check required fields in order and build the store payload
    ///
    /// # Parameters
    ///
    /// - `editing`: Whether an existing config is being updated; the secret
    ///   key is optional then and omitted from the payload when blank
    pub fn validate(&self, editing: bool) -> Result<CloudConfigFields> {
        let provider = match &self.provider {
            Some(provider) if !provider.as_str().is_empty() => provider.clone(),
            _ => return Err(Error::validation("Provider is required")),
        };

        if self.region.is_empty() {
            return Err(Error::validation("Region is required"));
        }
        if self.instance_id.is_empty() {
            return Err(Error::validation("Instance or security group id is required"));
        }
        if self.secret_id.is_empty() {
            return Err(Error::validation("Access key id is required"));
        }
        if self.secret_key.is_empty() && !editing {
            return Err(Error::validation("Access key secret is required"));
        }

        let requires_project_id = provider.capabilities().requires_project_id;
        if requires_project_id && self.project_id.is_empty() {
            return Err(Error::validation(format!(
                "Project id is required for {}",
                provider
            )));
        }

        Ok(CloudConfigFields {
            region: self.region.clone(),
            instance_id: self.instance_id.clone(),
            secret_id: self.secret_id.clone(),
            secret_key: (!self.secret_key.is_empty()).then(|| self.secret_key.clone()),
            description: self.description.clone(),
            is_default: self.is_default,
            is_enabled: self.is_enabled,
            service_type: self.service_type,
            project_id: requires_project_id.then(|| self.project_id.clone()),
            provider,
        })
    }
}

/// Cloud config lifecycle manager
pub struct CloudConfigManager {
    store: Arc<dyn CloudConfigStore>,
    confirm: Arc<dyn Confirm>,
    catalog: Arc<Catalog>,
    configs: Vec<CloudConfig>,
    providers: Vec<String>,
    regions: Vec<Region>,
    service_types: Vec<ServiceType>,
    session: Session<CloudConfigForm, CloudConfig>,
    events: EventEmitter,
}

impl CloudConfigManager {
    /// Create a new cloud config manager
    ///
    /// # Returns
    ///
    /// A tuple of (manager, event_receiver) where event_receiver yields manager events
    pub fn new(
        store: Arc<dyn CloudConfigStore>,
        confirm: Arc<dyn Confirm>,
        catalog: Arc<Catalog>,
        config: &ManagerConfig,
    ) -> Result<(Self, mpsc::Receiver<ManagerEvent>)> {
        config.validate()?;

        let (events, rx) = EventEmitter::channel(config.event_channel_capacity);

        let manager = Self {
            store,
            confirm,
            catalog,
            configs: Vec::new(),
            providers: Vec::new(),
            regions: Vec::new(),
            service_types: Vec::new(),
            session: Session::Idle,
            events,
        };

        Ok((manager, rx))
    }

    pub fn configs(&self) -> &[CloudConfig] {
        &self.configs
    }

    /// Provider identifiers offered by the backend
    pub fn providers(&self) -> &[String] {
        &self.providers
    }

    /// Regions of the provider selected in the form
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Service subtypes of the provider selected in the form
    pub fn service_types(&self) -> &[ServiceType] {
        &self.service_types
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn session(&self) -> &Session<CloudConfigForm, CloudConfig> {
        &self.session
    }

    pub fn form(&self) -> Option<&CloudConfigForm> {
        self.session.form()
    }

    /// Open form for field edits
    ///
    /// Change the provider through [`CloudConfigManager::select_provider`]
    /// so that dependent fields are reset.
    pub fn form_mut(&mut self) -> Option<&mut CloudConfigForm> {
        self.session.form_mut()
    }

    /// Whether the form needs a project id (HuaweiCloud only)
    pub fn show_project_id(&self) -> bool {
        self.session
            .form()
            .and_then(|form| form.provider.as_ref())
            .is_some_and(|provider| provider.capabilities().requires_project_id)
    }

    /// Load configs and the provider list
    pub async fn load(&mut self) -> Result<()> {
        self.refresh().await?;
        self.refresh_providers().await
    }

    /// Replace the config list from the store
    pub async fn refresh(&mut self) -> Result<()> {
        self.configs = self.store.list().await?;
        debug!("Loaded {} cloud configs", self.configs.len());
        self.events.emit(ManagerEvent::ConfigsRefreshed {
            count: self.configs.len(),
        });
        Ok(())
    }

    /// Replace the provider list from the store
    pub async fn refresh_providers(&mut self) -> Result<()> {
        self.providers = self.store.providers().await?;
        Ok(())
    }

    /// Open an empty form
    pub fn begin_create(&mut self) {
        self.regions.clear();
        self.service_types.clear();
        self.session = Session::Editing {
            mode: FormMode::Create,
            form: CloudConfigForm::default(),
            error: None,
        };
        self.events.emit(ManagerEvent::SessionChanged { editing: true });
    }

    /// Open a form pre-filled from a stored config
    ///
    /// Loads the provider's regions and subtypes. The form stays open even
    /// when the region listing fails.
    pub async fn begin_edit(&mut self, config: &CloudConfig) -> Result<()> {
        self.session = Session::Editing {
            mode: FormMode::Edit(config.clone()),
            form: CloudConfigForm::from_config(config),
            error: None,
        };
        self.events.emit(ManagerEvent::SessionChanged { editing: true });
        self.load_provider_options(&config.provider).await
    }

    /// Discard the form
    pub fn cancel(&mut self) {
        if self.session.is_open() {
            self.session = Session::Idle;
            self.regions.clear();
            self.service_types.clear();
            self.events.emit(ManagerEvent::SessionChanged { editing: false });
        }
    }

    /// Change the form's provider
    ///
    /// Clears region and subtype, then loads the new provider's regions from
    /// the store and its subtypes from the catalog.
    pub async fn select_provider(&mut self, provider: ProviderId) -> Result<()> {
        let form = self
            .session
            .form_mut()
            .ok_or_else(|| Error::validation("No cloud config form is open"))?;
        form.provider = Some(provider.clone());
        form.region.clear();
        form.service_type = None;

        self.regions.clear();
        self.service_types.clear();
        if provider.as_str().is_empty() {
            return Ok(());
        }
        self.load_provider_options(&provider).await
    }

    /// Submit the open form
    ///
    /// Returns the stored config; on failure the form stays open with the
    /// error.
    pub async fn submit(&mut self) -> Result<CloudConfig> {
        let fields = match &self.session {
            Session::Editing { mode, form, .. } => {
                form.validate(matches!(mode, FormMode::Edit(_)))
            }
            _ => Err(Error::validation("No cloud config form is open")),
        };
        let fields = match fields {
            Ok(fields) => fields,
            Err(e) => {
                if let Session::Editing { error, .. } = &mut self.session {
                    *error = Some(e.to_string());
                }
                return Err(e);
            }
        };

        let Some((mode, form)) = self.session.start_submit() else {
            return Err(Error::validation("No cloud config form is open"));
        };

        let result = match &mode {
            FormMode::Create => self.store.create(&fields).await,
            FormMode::Edit(existing) => self.store.update(existing.id, &fields).await,
        };

        match result {
            Ok(saved) => {
                info!("Saved cloud config {} ({})", saved.id, saved.provider);
                self.events.emit(ManagerEvent::ConfigSaved { id: saved.id });
                self.session = Session::Idle;
                self.events.emit(ManagerEvent::SessionChanged { editing: false });
                if let Err(e) = self.refresh().await {
                    warn!("Failed to refresh cloud configs: {}", e);
                }
                Ok(saved)
            }
            Err(e) => {
                warn!("Failed to save cloud config: {}", e);
                self.session.reopen(mode, form, e.to_string());
                Err(e)
            }
        }
    }

    /// Delete a config, after confirmation
    ///
    /// Rules that reference the config are left alone. Returns `false` when
    /// the operator declined.
    pub async fn delete_config(&mut self, id: RecordId) -> Result<bool> {
        let prompt = ConfirmPrompt::warning(format!("Delete cloud config {}?", id));
        if !self.confirm.confirm(&prompt).await {
            debug!("Deletion of cloud config {} declined", id);
            return Ok(false);
        }

        self.store.delete(id).await?;
        info!("Deleted cloud config {}", id);
        self.events.emit(ManagerEvent::ConfigDeleted { id });
        if let Err(e) = self.refresh().await {
            warn!("Failed to refresh cloud configs: {}", e);
        }
        Ok(true)
    }

    /// Ask the backend to try the config's credentials
    pub async fn test_config(&self, id: RecordId) -> Result<ConnectionTest> {
        let outcome = self.store.test(id).await?;
        if outcome.success {
            info!("Cloud config {}: {}", id, outcome.message);
        } else {
            warn!("Cloud config {}: {}", id, outcome.message);
        }
        Ok(outcome)
    }

    async fn load_provider_options(&mut self, provider: &ProviderId) -> Result<()> {
        self.service_types = self.catalog.service_subtypes(provider).to_vec();
        self.regions = self.store.regions(provider.as_str()).await?;
        debug!(
            "{} offers {} regions and {} service types",
            provider,
            self.regions.len(),
            self.service_types.len()
        );
        Ok(())
    }
}
