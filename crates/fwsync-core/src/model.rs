//! Records exchanged with the console backend
//!
//! Field names follow the backend's JSON shapes (`ID`, `UpdatedAt`,
//! `instance_id`, ...). Secret material is write-only from the client's
//! point of view: `Debug` output never includes it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::catalog::ProviderId;

/// Identifier assigned by the backend
pub type RecordId = u64;

/// Transport protocol of a firewall rule
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Protocol {
    /// TCP
    #[default]
    Tcp,
    /// UDP
    Udp,
    /// ICMP (no ports)
    Icmp,
    /// Every protocol and port
    All,
    /// Any other protocol name, preserved verbatim
    Other(String),
}

impl Protocol {
    /// Wire name of the protocol
    pub fn as_str(&self) -> &str {
        match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
            Protocol::Icmp => "ICMP",
            Protocol::All => "ALL",
            Protocol::Other(raw) => raw,
        }
    }

    /// Whether the protocol implies every port, making the port field moot
    pub fn covers_all_ports(&self) -> bool {
        matches!(self, Protocol::Icmp | Protocol::All)
    }
}

impl From<String> for Protocol {
    fn from(raw: String) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "TCP" => Protocol::Tcp,
            "UDP" => Protocol::Udp,
            "ICMP" => Protocol::Icmp,
            "ALL" => Protocol::All,
            _ => Protocol::Other(raw),
        }
    }
}

impl From<&str> for Protocol {
    fn from(raw: &str) -> Self {
        Protocol::from(raw.to_string())
    }
}

impl From<Protocol> for String {
    fn from(protocol: Protocol) -> Self {
        match protocol {
            Protocol::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A firewall rule as persisted by the rule store
///
/// Every rule encodes exactly one provider-side rule, and `port` is already
/// in the syntax of the owning config's provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirewallRule {
    /// Rule identifier
    #[serde(rename = "ID")]
    pub id: RecordId,
    /// Operator remark
    pub remark: String,
    /// Owning cloud config
    pub cloud_config_id: RecordId,
    /// Port specification in provider syntax
    pub port: String,
    /// Protocol
    pub protocol: Protocol,
    /// Whether the rule is re-applied on IP changes
    #[serde(default)]
    pub enabled: bool,
    /// Last public IP applied to the provider
    #[serde(rename = "last_ip", default)]
    pub last_ip: String,
    /// Last modification time on the backend
    #[serde(rename = "UpdatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Provider of the owning config, denormalized by the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderId>,
    /// Resource of the owning config, denormalized by the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
}

impl FirewallRule {
    /// Overlay edited fields onto this record, keeping everything else
    pub fn merged(&self, fields: &RuleFields) -> FirewallRule {
        FirewallRule {
            remark: fields.remark.clone(),
            cloud_config_id: fields.cloud_config_id,
            port: fields.port.clone(),
            protocol: fields.protocol.clone(),
            enabled: fields.enabled,
            ..self.clone()
        }
    }
}

/// Writable fields of a firewall rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleFields {
    /// Operator remark
    pub remark: String,
    /// Owning cloud config
    pub cloud_config_id: RecordId,
    /// Port specification in provider syntax
    pub port: String,
    /// Protocol
    pub protocol: Protocol,
    /// Whether the rule is enabled
    pub enabled: bool,
}

/// Credentials and target resource for one cloud provider account
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudConfig {
    /// Config identifier
    #[serde(rename = "ID")]
    pub id: RecordId,
    /// Provider
    pub provider: ProviderId,
    /// Provider region code
    #[serde(default)]
    pub region: String,
    /// Instance or security-group identifier
    #[serde(default)]
    pub instance_id: String,
    /// Access key id
    #[serde(default)]
    pub secret_id: String,
    /// Access key secret (usually blank or masked when read back)
    #[serde(default)]
    pub secret_key: String,
    /// Free-form description
    #[serde(default)]
    pub description: String,
    /// Whether this is the default config
    #[serde(default)]
    pub is_default: bool,
    /// Whether the config may be used as a rule target
    #[serde(default)]
    pub is_enabled: bool,
    /// Provider service subtype
    #[serde(
        rename = "type",
        default,
        deserialize_with = "subtype::deserialize",
        serialize_with = "subtype::serialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub service_type: Option<u32>,
    /// Region project id (HuaweiCloud only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// Creation time on the backend
    #[serde(rename = "CreatedAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

// Custom Debug implementation that hides the secret key
impl fmt::Debug for CloudConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudConfig")
            .field("id", &self.id)
            .field("provider", &self.provider)
            .field("region", &self.region)
            .field("instance_id", &self.instance_id)
            .field("secret_id", &mask_secret(&self.secret_id))
            .field("secret_key", &"<REDACTED>")
            .field("description", &self.description)
            .field("is_default", &self.is_default)
            .field("is_enabled", &self.is_enabled)
            .field("service_type", &self.service_type)
            .field("project_id", &self.project_id)
            .finish()
    }
}

/// Create/update payload for a cloud config
///
/// On update, `secret_key: None` leaves the stored secret untouched; the
/// field is omitted from the payload entirely.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudConfigFields {
    /// Provider
    pub provider: ProviderId,
    /// Provider region code
    pub region: String,
    /// Instance or security-group identifier
    pub instance_id: String,
    /// Access key id
    pub secret_id: String,
    /// Access key secret
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
    /// Free-form description
    pub description: String,
    /// Whether this is the default config
    pub is_default: bool,
    /// Whether the config may be used as a rule target
    pub is_enabled: bool,
    /// Provider service subtype
    #[serde(
        rename = "type",
        default,
        deserialize_with = "subtype::deserialize",
        serialize_with = "subtype::serialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub service_type: Option<u32>,
    /// Region project id (HuaweiCloud only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

impl fmt::Debug for CloudConfigFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudConfigFields")
            .field("provider", &self.provider)
            .field("region", &self.region)
            .field("instance_id", &self.instance_id)
            .field("secret_id", &mask_secret(&self.secret_id))
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<REDACTED>"))
            .field("description", &self.description)
            .field("is_default", &self.is_default)
            .field("is_enabled", &self.is_enabled)
            .field("service_type", &self.service_type)
            .field("project_id", &self.project_id)
            .finish()
    }
}

/// Outcome of the backend's "test connection" call for a cloud config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionTest {
    /// Whether the provider accepted the credentials
    pub success: bool,
    /// Backend message
    #[serde(default)]
    pub message: String,
}

/// A provider region as listed by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    /// Region code (e.g. "cn-hangzhou")
    pub code: String,
    /// Localized region name
    pub name: String,
}

/// Status reported by a rule execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    /// Provider rule already matched the current IP
    Unchanged,
    /// Provider rule was rewritten to the current IP
    Updated,
    /// Provider call failed
    Error,
    /// Status this build does not know
    #[serde(other)]
    Unknown,
}

/// Result of reconciling one rule against the current public IP
///
/// Transient: shown to the operator and then dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// IP the provider rule carried before execution
    #[serde(default)]
    pub cloud_ip: String,
    /// Freshly observed public IP
    #[serde(default)]
    pub current_ip: String,
    /// Whether the provider rule was changed
    #[serde(rename = "ip_changed", default)]
    pub changed: bool,
    /// Execution status
    pub status: ExecutionStatus,
    /// Backend message
    #[serde(default)]
    pub message: String,
}

/// Backend-wide settings for the IP-change detector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Service returning the caller's public IP as plain text
    pub ip_fetch_url: String,
    /// Minutes between IP checks
    pub ip_check_interval: u32,
    /// Whether the scheduled check runs
    #[serde(with = "bool_string")]
    pub cron_enabled: bool,
}

impl SystemConfig {
    /// Validate the settings before they are saved
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.ip_fetch_url.is_empty() {
            return Err(crate::Error::validation("IP fetch URL is required"));
        }

        if !is_http_url(&self.ip_fetch_url) {
            return Err(crate::Error::validation(format!(
                "IP fetch URL must be an absolute http(s) URL: {}",
                self.ip_fetch_url
            )));
        }

        if self.ip_check_interval < 1 {
            return Err(crate::Error::validation(
                "IP check interval must be at least 1 minute",
            ));
        }

        Ok(())
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            ip_fetch_url: default_ip_fetch_url(),
            ip_check_interval: 5,
            cron_enabled: true,
        }
    }
}

fn default_ip_fetch_url() -> String {
    "https://4.ipw.cn".to_string()
}

/// Whether the string parses as an absolute http or https URL
pub fn is_http_url(raw: &str) -> bool {
    match url::Url::parse(raw) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https") && parsed.has_host(),
        Err(_) => false,
    }
}

/// Mask the middle of a sensitive value for display
///
/// Keeps the first and last four characters and replaces at most six in
/// between with `*`. Values too short to mask are returned unchanged.
pub fn mask_secret(value: &str) -> String {
    const SHOW: usize = 4;

    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= SHOW * 2 {
        return value.to_string();
    }

    let hidden = chars.len() - SHOW * 2;
    let start: String = chars[..SHOW].iter().collect();
    let end: String = chars[chars.len() - SHOW..].iter().collect();
    format!("{}{}{}", start, "*".repeat(hidden.min(6)), end)
}

/// Service subtypes arrive as numbers, numeric strings, or empty strings
mod subtype {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<serde_json::Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(serde_json::Value::Number(n)) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
            Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        })
    }

    pub fn serialize<S>(value: &Option<u32>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(v) => serializer.serialize_str(&v.to_string()),
            None => serializer.serialize_none(),
        }
    }
}

/// The backend stores booleans in the settings table as "true"/"false"
mod bool_string {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        match value {
            serde_json::Value::Bool(b) => Ok(b),
            serde_json::Value::String(s) => Ok(s.trim().eq_ignore_ascii_case("true")),
            other => Err(serde::de::Error::custom(format!(
                "expected boolean string, got {}",
                other
            ))),
        }
    }

    pub fn serialize<S>(value: &bool, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(if *value { "true" } else { "false" })
    }
}
