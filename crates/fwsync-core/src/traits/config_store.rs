// # Cloud Config Store Trait
//
// Defines the interface to the remote store holding provider credentials
// and rule targets.
//
// Secret material is write-only: `list()` may return configs with a blank
// or masked `secret_key`, and an update whose `secret_key` is `None` must
// keep the stored value.

use async_trait::async_trait;

use crate::model::{CloudConfig, CloudConfigFields, ConnectionTest, RecordId, Region};

/// Trait for cloud config stores
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
#[async_trait]
pub trait CloudConfigStore: Send + Sync {
    /// List every cloud config, enabled or not
    async fn list(&self) -> Result<Vec<CloudConfig>, crate::Error>;

    /// Create a config
    async fn create(&self, fields: &CloudConfigFields) -> Result<CloudConfig, crate::Error>;

    /// Update a config in place
    ///
    /// `fields.secret_key == None` preserves the stored secret.
    async fn update(
        &self,
        id: RecordId,
        fields: &CloudConfigFields,
    ) -> Result<CloudConfig, crate::Error>;

    /// Delete a config
    ///
    /// Rules referencing it are the store's concern.
    async fn delete(&self, id: RecordId) -> Result<(), crate::Error>;

    /// Check the stored credentials against the provider
    async fn test(&self, id: RecordId) -> Result<ConnectionTest, crate::Error>;

    /// Provider identifiers the backend can talk to
    async fn providers(&self) -> Result<Vec<String>, crate::Error>;

    /// Regions available for a provider
    async fn regions(&self, provider: &str) -> Result<Vec<Region>, crate::Error>;
}
