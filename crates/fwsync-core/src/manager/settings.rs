//! System settings of the IP-change detector

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::{EventEmitter, ManagerEvent};
use crate::config::ManagerConfig;
use crate::model::SystemConfig;
use crate::traits::SystemStore;
use crate::Result;

/// Settings manager
///
/// Holds a local copy of the backend's [`SystemConfig`] and the last public
/// IP the backend reported.
pub struct SettingsManager {
    store: Arc<dyn SystemStore>,
    config: SystemConfig,
    current_ip: Option<String>,
    events: EventEmitter,
}

impl SettingsManager {
    /// Create a new settings manager
    ///
    /// # Returns
    ///
    /// A tuple of (manager, event_receiver) where event_receiver yields manager events
    pub fn new(
        store: Arc<dyn SystemStore>,
        config: &ManagerConfig,
    ) -> Result<(Self, mpsc::Receiver<ManagerEvent>)> {
        config.validate()?;

        let (events, rx) = EventEmitter::channel(config.event_channel_capacity);

        let manager = Self {
            store,
            config: SystemConfig::default(),
            current_ip: None,
            events,
        };

        Ok((manager, rx))
    }

    /// Local copy of the settings
    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    /// Public IP last reported by the backend, if fetched
    pub fn current_ip(&self) -> Option<&str> {
        self.current_ip.as_deref()
    }

    /// Fetch the settings and the current public IP
    pub async fn load(&mut self) -> Result<()> {
        self.config = self.store.get_config().await?;
        debug!("Loaded system settings: {:?}", self.config);
        self.refresh_current_ip().await?;
        Ok(())
    }

    /// Re-read the current public IP
    ///
    /// The previous value is cleared first, so a failed fetch leaves none.
    pub async fn refresh_current_ip(&mut self) -> Result<&str> {
        self.current_ip = None;
        let ip = self.store.current_ip().await?;
        Ok(self.current_ip.insert(ip).as_str())
    }

    /// Validate and save new settings
    ///
    /// The local copy changes only after the store accepted the settings.
    pub async fn save(&mut self, config: SystemConfig) -> Result<()> {
        config.validate()?;
        self.store.save_config(&config).await?;

        info!(
            "Saved system settings (interval {} min, scheduled check {})",
            config.ip_check_interval,
            if config.cron_enabled { "on" } else { "off" }
        );
        self.config = config;
        self.events.emit(ManagerEvent::SettingsSaved);
        Ok(())
    }

    /// Ask the backend to re-check the public IP now
    ///
    /// Returns the backend's message; the current IP is refreshed afterwards.
    pub async fn sync_ip_now(&mut self) -> Result<String> {
        let message = self.store.sync_ip().await?;
        info!("IP sync: {}", message);

        let current_ip = self.refresh_current_ip().await?.to_string();
        self.events.emit(ManagerEvent::IpSynced { current_ip });
        Ok(message)
    }

    /// Restore the default settings locally (not saved)
    pub fn reset(&mut self) {
        self.config = SystemConfig::default();
    }
}
