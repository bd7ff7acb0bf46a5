use async_trait::async_trait;

use crate::model::SystemConfig;

/// Trait for the backend's system settings and IP detector endpoints
#[async_trait]
pub trait SystemStore: Send + Sync {
    /// Fetch the current settings
    async fn get_config(&self) -> Result<SystemConfig, crate::Error>;

    /// Replace the settings
    async fn save_config(&self, config: &SystemConfig) -> Result<(), crate::Error>;

    /// Ask the backend to re-check the public IP and re-apply rules now
    ///
    /// Returns the backend's message.
    async fn sync_ip(&self) -> Result<String, crate::Error>;

    /// Public IP last observed by the backend
    async fn current_ip(&self) -> Result<String, crate::Error>;
}
