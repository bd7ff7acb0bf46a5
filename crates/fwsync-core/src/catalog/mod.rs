//! Provider and service-type catalog
//!
//! The catalog is a read-only classification table: it maps a provider
//! identifier (and, for some providers, a numeric service subtype) to a
//! localized label and to capability flags. It is passed around as a value
//! so callers and tests can substitute their own table.
//!
//! ## Usage
//!
//! ```rust
//! use fwsync_core::catalog::{Catalog, ProviderId};
//!
//! let catalog = Catalog::builtin();
//! assert_eq!(catalog.display_name(&ProviderId::Aliyun), "阿里云");
//! assert_eq!(catalog.subtype_display_name(&ProviderId::Aliyun, 1), "SWAS");
//!
//! // Unknown providers and subtypes are echoed back, never rejected
//! let unknown = ProviderId::from("Hetzner");
//! assert_eq!(catalog.display_name(&unknown), "Hetzner");
//! assert_eq!(catalog.subtype_display_name(&unknown, 7), "7");
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::model::CloudConfig;

/// Identity of a cloud vendor
///
/// Only the providers whose rule syntax or capabilities differ get their own
/// variant. Every other identifier is carried verbatim in [`ProviderId::Other`],
/// so persisted data naming a provider this build does not know still loads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProviderId {
    /// Alibaba Cloud (mainland)
    Aliyun,
    /// Tencent Cloud (mainland)
    TencentCloud,
    /// Huawei Cloud
    HuaweiCloud,
    /// Any other provider identifier
    Other(String),
}

impl ProviderId {
    /// The raw identifier as stored by the backend
    pub fn as_str(&self) -> &str {
        match self {
            ProviderId::Aliyun => "Aliyun",
            ProviderId::TencentCloud => "TencentCloud",
            ProviderId::HuaweiCloud => "HuaweiCloud",
            ProviderId::Other(raw) => raw,
        }
    }

    /// Provider-level rule capabilities
    ///
    /// This is the single place where per-provider quirks live.
    pub fn capabilities(&self) -> ProviderCapabilities {
        match self {
            ProviderId::Aliyun => ProviderCapabilities {
                multi_port: MultiPort::PerSubtype,
                range_separator: Some('/'),
                all_ports: "-1/-1",
                requires_project_id: false,
            },
            ProviderId::TencentCloud => ProviderCapabilities {
                multi_port: MultiPort::PerSubtype,
                range_separator: None,
                all_ports: "ALL",
                requires_project_id: false,
            },
            ProviderId::HuaweiCloud => ProviderCapabilities {
                multi_port: MultiPort::Always,
                range_separator: None,
                all_ports: "ALL",
                requires_project_id: true,
            },
            ProviderId::Other(_) => ProviderCapabilities {
                multi_port: MultiPort::Never,
                range_separator: None,
                all_ports: "ALL",
                requires_project_id: false,
            },
        }
    }
}

impl From<String> for ProviderId {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "Aliyun" => ProviderId::Aliyun,
            "TencentCloud" => ProviderId::TencentCloud,
            "HuaweiCloud" => ProviderId::HuaweiCloud,
            _ => ProviderId::Other(raw),
        }
    }
}

impl From<&str> for ProviderId {
    fn from(raw: &str) -> Self {
        ProviderId::from(raw.to_string())
    }
}

impl From<ProviderId> for String {
    fn from(id: ProviderId) -> Self {
        match id {
            ProviderId::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a provider decides whether one rule record may list several ports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultiPort {
    /// Every resource of this provider accepts compound port lists
    Always,
    /// Decided by the service subtype's `multi_port` flag in the catalog
    PerSubtype,
    /// One rule record per port, always
    Never,
}

/// Provider-level capability flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderCapabilities {
    /// Multi-port classification
    pub multi_port: MultiPort,
    /// Range separator the provider API expects instead of `-`
    pub range_separator: Option<char>,
    /// Port value forced when the protocol covers all ports (ICMP, ALL)
    pub all_ports: &'static str,
    /// Whether cloud configs for this provider need a region project id
    pub requires_project_id: bool,
}

/// A provider-specific resource classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceType {
    /// Numeric subtype value stored on cloud configs
    pub value: u32,
    /// Short name (e.g. "ECS")
    pub name: String,
    /// Localized label
    pub display_name: String,
    /// Localized description
    pub description: String,
    /// Whether rules on this subtype accept a comma-separated port list
    #[serde(default)]
    pub multi_port: bool,
}

impl ServiceType {
    /// Create a service type entry
    pub fn new(
        value: u32,
        name: impl Into<String>,
        display_name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            value,
            name: name.into(),
            display_name: display_name.into(),
            description: description.into(),
            multi_port: false,
        }
    }

    /// Mark the subtype as accepting compound port lists
    pub fn with_multi_port(mut self, multi_port: bool) -> Self {
        self.multi_port = multi_port;
        self
    }
}

/// A provider known to the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEntry {
    /// Raw provider identifier
    pub key: String,
    /// Localized label
    pub display_name: String,
}

/// Read-only provider/service-type table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    /// Providers in display order
    #[serde(default)]
    providers: Vec<ProviderEntry>,

    /// Service subtypes keyed by raw provider identifier
    #[serde(default)]
    service_types: BTreeMap<String, Vec<ServiceType>>,
}

impl Catalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a provider label
    pub fn with_provider(mut self, key: impl Into<String>, display_name: impl Into<String>) -> Self {
        self.providers.push(ProviderEntry {
            key: key.into(),
            display_name: display_name.into(),
        });
        self
    }

    /// Add a service subtype for a provider
    pub fn with_service_type(mut self, provider: impl Into<String>, service_type: ServiceType) -> Self {
        self.service_types
            .entry(provider.into())
            .or_default()
            .push(service_type);
        self
    }

    /// Load a catalog from JSON
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// The catalog shipped with the console
    pub fn builtin() -> Self {
        BUILTIN_PROVIDERS
            .iter()
            .fold(Catalog::new(), |catalog, (key, label)| {
                catalog.with_provider(*key, *label)
            })
            .with_service_type(
                "Aliyun",
                ServiceType::new(0, "ECS", "云服务器 ECS", "阿里云弹性计算服务，提供安全可靠的弹性计算服务"),
            )
            .with_service_type(
                "Aliyun",
                ServiceType::new(1, "SWAS", "轻量应用服务器", "阿里云轻量应用服务器，适合轻量级业务场景")
                    .with_multi_port(true),
            )
            .with_service_type(
                "TencentCloud",
                ServiceType::new(0, "CVM", "云服务器 CVM", "腾讯云云服务器，提供安全稳定的云端计算服务"),
            )
            .with_service_type(
                "TencentCloud",
                ServiceType::new(1, "Lighthouse", "轻量应用服务器", "腾讯云轻量应用服务器，开箱即用的应用镜像"),
            )
            .with_service_type(
                "HuaweiCloud",
                ServiceType::new(0, "ECS", "弹性云服务器/Flexus云服务", "华为云弹性云服务器，提供多种规格的云服务器"),
            )
    }

    /// Localized provider label, or the raw identifier if unmapped
    pub fn display_name(&self, provider: &ProviderId) -> String {
        self.providers
            .iter()
            .find(|entry| entry.key == provider.as_str())
            .map(|entry| entry.display_name.clone())
            .unwrap_or_else(|| provider.to_string())
    }

    /// All providers in display order
    pub fn providers(&self) -> &[ProviderEntry] {
        &self.providers
    }

    /// Reverse lookup from a label to a provider identifier
    ///
    /// Returns the input unchanged when no provider carries that label.
    pub fn provider_key_by_display_name(&self, display_name: &str) -> String {
        self.providers
            .iter()
            .find(|entry| entry.display_name == display_name)
            .map(|entry| entry.key.clone())
            .unwrap_or_else(|| display_name.to_string())
    }

    /// Whether the provider has a label in this catalog
    pub fn is_supported_provider(&self, provider: &ProviderId) -> bool {
        self.providers
            .iter()
            .any(|entry| entry.key == provider.as_str())
    }

    /// Service subtypes for a provider, in catalog order
    ///
    /// Empty for providers without subtype distinctions.
    pub fn service_subtypes(&self, provider: &ProviderId) -> &[ServiceType] {
        self.service_types
            .get(provider.as_str())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Providers that declare service subtypes
    pub fn subtype_providers(&self) -> Vec<ProviderId> {
        self.service_types
            .keys()
            .map(|key| ProviderId::from(key.as_str()))
            .collect()
    }

    /// Full subtype entry, if the pair is known
    pub fn subtype_info(&self, provider: &ProviderId, value: u32) -> Option<&ServiceType> {
        self.service_subtypes(provider)
            .iter()
            .find(|service_type| service_type.value == value)
    }

    /// Whether the provider declares the given subtype
    pub fn is_subtype_supported(&self, provider: &ProviderId, value: u32) -> bool {
        self.subtype_info(provider, value).is_some()
    }

    /// Subtype short name, or the stringified value if the pair is unknown
    pub fn subtype_display_name(&self, provider: &ProviderId, value: u32) -> String {
        self.subtype_info(provider, value)
            .map(|service_type| service_type.name.clone())
            .unwrap_or_else(|| value.to_string())
    }

    /// Like [`Catalog::subtype_display_name`] for a raw persisted value
    ///
    /// Values that are not numbers are echoed back unchanged.
    pub fn subtype_display_name_str(&self, provider: &ProviderId, raw: &str) -> String {
        match raw.trim().parse::<u32>() {
            Ok(value) => self.subtype_display_name(provider, value),
            Err(_) => raw.to_string(),
        }
    }

    /// Provider label combined with the subtype name
    ///
    /// `"{provider} {subtype}"` when a subtype is present, else the provider
    /// label alone.
    pub fn full_label(&self, provider: &ProviderId, subtype: Option<u32>) -> String {
        let provider_label = self.display_name(provider);
        match subtype {
            Some(value) => format!(
                "{} {}",
                provider_label,
                self.subtype_display_name(provider, value)
            ),
            None => provider_label,
        }
    }

    /// Label used when offering a cloud config as a rule target
    pub fn config_option_label(&self, config: &CloudConfig) -> String {
        let target = if config.description.is_empty() {
            config.instance_id.as_str()
        } else {
            config.description.as_str()
        };
        format!(
            "{} - {} ({})",
            self.display_name(&config.provider),
            target,
            config.region
        )
    }
}

/// Provider labels shipped with the console, in display order
const BUILTIN_PROVIDERS: &[(&str, &str)] = &[
    ("TencentCloud", "腾讯云"),
    ("TencentCloudInternational", "腾讯云国际站"),
    ("Aliyun", "阿里云"),
    ("AliyunInternational", "阿里云国际站"),
    ("HuaweiCloud", "华为云"),
    ("AWS", "亚马逊云"),
    ("AWSCN", "亚马逊云中国"),
    ("GoogleCloud", "谷歌云"),
    ("Azure", "微软云"),
    ("AzureCN", "微软云中国"),
    ("BaiduCloud", "百度云"),
    ("VolcanoEngine", "火山引擎"),
    ("UCloud", "UCloud"),
    ("QingCloud", "青云"),
    ("JDCloud", "京东云"),
    ("KingsoftCloud", "金山云"),
    ("Qiniu", "七牛云"),
    ("UPYUN", "又拍云"),
    ("Wangsu", "网宿科技"),
    ("DigitalOcean", "DigitalOcean"),
    ("Vultr", "Vultr"),
    ("Linode", "Linode"),
    ("Oracle", "甲骨文云"),
    ("IBM", "IBM云"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_id_round_trips_raw_string() {
        assert_eq!(ProviderId::from("Aliyun"), ProviderId::Aliyun);
        assert_eq!(ProviderId::from("AWS"), ProviderId::Other("AWS".to_string()));
        assert_eq!(String::from(ProviderId::HuaweiCloud), "HuaweiCloud");

        let json = serde_json::to_string(&ProviderId::TencentCloud).unwrap();
        assert_eq!(json, "\"TencentCloud\"");
        let parsed: ProviderId = serde_json::from_str("\"Hetzner\"").unwrap();
        assert_eq!(parsed.as_str(), "Hetzner");
    }

    #[test]
    fn test_display_name_falls_back_to_raw_id() {
        let catalog = Catalog::builtin();
        assert_eq!(catalog.display_name(&ProviderId::HuaweiCloud), "华为云");
        assert_eq!(catalog.display_name(&ProviderId::from("AWS")), "亚马逊云");
        assert_eq!(catalog.display_name(&ProviderId::from("Hetzner")), "Hetzner");
    }

    #[test]
    fn test_service_subtypes() {
        let catalog = Catalog::builtin();

        let aliyun = catalog.service_subtypes(&ProviderId::Aliyun);
        assert_eq!(aliyun.len(), 2);
        assert_eq!(aliyun[0].name, "ECS");
        assert_eq!(aliyun[1].name, "SWAS");
        assert!(aliyun[1].multi_port);

        assert!(catalog.service_subtypes(&ProviderId::from("AWS")).is_empty());
    }

    #[test]
    fn test_subtype_display_name_never_fails() {
        let catalog = Catalog::builtin();
        assert_eq!(catalog.subtype_display_name(&ProviderId::TencentCloud, 1), "Lighthouse");
        assert_eq!(catalog.subtype_display_name(&ProviderId::TencentCloud, 9), "9");
        assert_eq!(catalog.subtype_display_name(&ProviderId::from("AWS"), 0), "0");

        assert_eq!(catalog.subtype_display_name_str(&ProviderId::Aliyun, " 1"), "SWAS");
        assert_eq!(catalog.subtype_display_name_str(&ProviderId::Aliyun, "lite"), "lite");
    }

    #[test]
    fn test_full_label() {
        let catalog = Catalog::builtin();
        assert_eq!(catalog.full_label(&ProviderId::Aliyun, Some(1)), "阿里云 SWAS");
        assert_eq!(catalog.full_label(&ProviderId::Aliyun, None), "阿里云");
        assert_eq!(catalog.full_label(&ProviderId::from("Hetzner"), Some(3)), "Hetzner 3");
    }

    #[test]
    fn test_reverse_lookup() {
        let catalog = Catalog::builtin();
        assert_eq!(catalog.provider_key_by_display_name("腾讯云"), "TencentCloud");
        assert_eq!(catalog.provider_key_by_display_name("unknown"), "unknown");
        assert!(catalog.is_supported_provider(&ProviderId::from("Vultr")));
        assert!(!catalog.is_supported_provider(&ProviderId::from("Hetzner")));
    }

    #[test]
    fn test_fixture_catalog_from_json() {
        let catalog = Catalog::from_json(
            r#"{
                "providers": [{"key": "TencentCloud", "display_name": "Tencent"}],
                "service_types": {
                    "TencentCloud": [
                        {"value": 1, "name": "Lighthouse", "display_name": "Lite",
                         "description": "", "multi_port": true}
                    ]
                }
            }"#,
        )
        .unwrap();

        assert_eq!(catalog.display_name(&ProviderId::TencentCloud), "Tencent");
        assert!(catalog.subtype_info(&ProviderId::TencentCloud, 1).unwrap().multi_port);
        assert_eq!(catalog.subtype_providers(), vec![ProviderId::TencentCloud]);
    }

    #[test]
    fn test_capabilities() {
        assert_eq!(ProviderId::Aliyun.capabilities().all_ports, "-1/-1");
        assert_eq!(ProviderId::Aliyun.capabilities().range_separator, Some('/'));
        assert_eq!(ProviderId::HuaweiCloud.capabilities().multi_port, MultiPort::Always);
        assert!(ProviderId::HuaweiCloud.capabilities().requires_project_id);
        assert_eq!(ProviderId::from("AWS").capabilities().multi_port, MultiPort::Never);
        assert_eq!(ProviderId::from("AWS").capabilities().all_ports, "ALL");
    }
}
