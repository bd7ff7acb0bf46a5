//! Rule normalization engine
//!
//! Turns a user-entered port specification into the literal port strings a
//! provider's API accepts, and decides how many rule records a submission
//! becomes.
//!
//! ## Pipeline
//!
//! ```text
//!  (provider, subtype, protocol, raw port spec)
//!            │
//!            ▼
//!  1. capability ── multi-port capable? (provider + subtype)
//!  2. override ──── ICMP / ALL → provider sentinel, stop here
//!  3. tokenize ──── split on ',', trim, drop empties
//!  4. translate ─── provider range syntax ("80-90" → "80/90" on Aliyun)
//!  5. expand ────── 1 token → 1 rule
//!                   N tokens, multi-port → 1 rule, rejoined
//!                   N tokens otherwise  → N rules
//! ```
//!
//! Updates skip steps 3 and 5: an existing rule is one provider rule for its
//! whole lifetime and is never split.
//!
//! Everything here is pure and infallible. Empty-field validation happens
//! before the engine runs.

use std::sync::Arc;

use crate::catalog::{Catalog, MultiPort, ProviderId};
use crate::model::{CloudConfig, Protocol, RuleFields};

/// Provider and subtype a rule is bound to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleTarget {
    /// Provider of the owning cloud config
    pub provider: ProviderId,
    /// Service subtype of the owning cloud config
    pub subtype: Option<u32>,
}

impl RuleTarget {
    /// Create a target
    pub fn new(provider: ProviderId, subtype: Option<u32>) -> Self {
        Self { provider, subtype }
    }
}

impl From<&CloudConfig> for RuleTarget {
    fn from(config: &CloudConfig) -> Self {
        Self::new(config.provider.clone(), config.service_type)
    }
}

/// How a create submission was turned into rule records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpansionMode {
    /// Protocol forced the provider's all-ports sentinel
    ProtocolOverride,
    /// A single token
    Single,
    /// Several tokens kept in one compound rule
    Compound,
    /// Several tokens split into one rule each
    Split,
}

/// Ordered list of port strings, one per rule-creation call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpansionPlan {
    mode: ExpansionMode,
    ports: Vec<String>,
}

impl ExpansionPlan {
    /// How the plan was derived
    pub fn mode(&self) -> ExpansionMode {
        self.mode
    }

    /// Port strings in call order
    pub fn ports(&self) -> &[String] {
        &self.ports
    }

    /// Number of rule-creation calls
    pub fn len(&self) -> usize {
        self.ports.len()
    }

    /// Whether the plan issues no calls at all
    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    /// One create request per planned port
    ///
    /// Every request copies `template` and differs only in `port`.
    pub fn requests(&self, template: &RuleFields) -> Vec<RuleFields> {
        self.ports
            .iter()
            .map(|port| RuleFields {
                port: port.clone(),
                ..template.clone()
            })
            .collect()
    }
}

/// Provider-aware rule normalizer
///
/// Holds the catalog used to resolve per-subtype capabilities.
#[derive(Debug, Clone)]
pub struct RuleNormalizer {
    catalog: Arc<Catalog>,
}

impl RuleNormalizer {
    /// Create a normalizer over the given catalog
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    /// The catalog this normalizer consults
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Whether one rule record may carry a comma-separated port list
    ///
    /// Recomputed from `(provider, subtype)` on every call.
    pub fn multi_port_capable(&self, provider: &ProviderId, subtype: Option<u32>) -> bool {
        match provider.capabilities().multi_port {
            MultiPort::Always => true,
            MultiPort::Never => false,
            MultiPort::PerSubtype => subtype
                .and_then(|value| self.catalog.subtype_info(provider, value))
                .is_some_and(|service_type| service_type.multi_port),
        }
    }

    /// Plan the rule-creation calls for a new submission
    pub fn plan_create(&self, target: &RuleTarget, protocol: &Protocol, raw: &str) -> ExpansionPlan {
        if let Some(sentinel) = protocol_override(&target.provider, protocol) {
            return ExpansionPlan {
                mode: ExpansionMode::ProtocolOverride,
                ports: vec![sentinel.to_string()],
            };
        }

        let tokens: Vec<String> = tokenize(raw)
            .iter()
            .map(|token| translate_port(&target.provider, token))
            .collect();

        match tokens.len() {
            0 => ExpansionPlan {
                mode: ExpansionMode::Single,
                ports: Vec::new(),
            },
            1 => ExpansionPlan {
                mode: ExpansionMode::Single,
                ports: tokens,
            },
            _ if self.multi_port_capable(&target.provider, target.subtype) => ExpansionPlan {
                mode: ExpansionMode::Compound,
                ports: vec![tokens.join(",")],
            },
            _ => ExpansionPlan {
                mode: ExpansionMode::Split,
                ports: tokens,
            },
        }
    }

    /// Number of rule records a create submission would produce
    pub fn expected_rule_count(&self, target: &RuleTarget, protocol: &Protocol, raw: &str) -> usize {
        self.plan_create(target, protocol, raw).len()
    }
}

/// Port forced by the protocol, if any
///
/// ICMP and ALL rules cover every port, so the provider's sentinel replaces
/// whatever the user typed.
pub fn protocol_override(provider: &ProviderId, protocol: &Protocol) -> Option<&'static str> {
    if protocol.covers_all_ports() {
        Some(provider.capabilities().all_ports)
    } else {
        None
    }
}

/// Whether the port field accepts user input for this protocol
pub fn port_input_enabled(protocol: &Protocol) -> bool {
    !protocol.covers_all_ports()
}

/// Split a port specification into trimmed, non-empty tokens
pub fn tokenize(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Rewrite a port token into the provider's range syntax
pub fn translate_port(provider: &ProviderId, token: &str) -> String {
    match provider.capabilities().range_separator {
        Some(separator) => token.replace('-', &separator.to_string()),
        None => token.to_string(),
    }
}

/// Final port string for an update of an existing rule
///
/// Applies the protocol override and syntax translation to the whole string.
/// Never splits.
pub fn normalize_update(provider: &ProviderId, protocol: &Protocol, raw: &str) -> String {
    match protocol_override(provider, protocol) {
        Some(sentinel) => sentinel.to_string(),
        None => translate_port(provider, raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> RuleNormalizer {
        RuleNormalizer::new(Arc::new(Catalog::builtin()))
    }

    fn target(provider: ProviderId, subtype: Option<u32>) -> RuleTarget {
        RuleTarget::new(provider, subtype)
    }

    #[test]
    fn test_multi_port_classification() {
        let n = normalizer();

        assert!(n.multi_port_capable(&ProviderId::Aliyun, Some(1)));
        assert!(!n.multi_port_capable(&ProviderId::Aliyun, Some(0)));
        assert!(!n.multi_port_capable(&ProviderId::Aliyun, None));

        assert!(n.multi_port_capable(&ProviderId::HuaweiCloud, None));
        assert!(n.multi_port_capable(&ProviderId::HuaweiCloud, Some(0)));
        assert!(n.multi_port_capable(&ProviderId::HuaweiCloud, Some(42)));

        assert!(!n.multi_port_capable(&ProviderId::TencentCloud, None));
        assert!(!n.multi_port_capable(&ProviderId::TencentCloud, Some(1)));
        assert!(!n.multi_port_capable(&ProviderId::from("AWS"), None));
        assert!(!n.multi_port_capable(&ProviderId::from("Hetzner"), None));
    }

    #[test]
    fn test_fixture_catalog_changes_subtype_capability() {
        let catalog = Catalog::new().with_service_type(
            "TencentCloud",
            crate::catalog::ServiceType::new(1, "Lighthouse", "", "").with_multi_port(true),
        );
        let n = RuleNormalizer::new(Arc::new(catalog));

        assert!(n.multi_port_capable(&ProviderId::TencentCloud, Some(1)));
        // Aliyun's subtype flag lives in the catalog too
        assert!(!n.multi_port_capable(&ProviderId::Aliyun, Some(1)));
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(tokenize("80,443, 8080 ,"), vec!["80", "443", "8080"]);
        assert_eq!(tokenize(" 22 "), vec!["22"]);
        assert!(tokenize(" , ,").is_empty());
    }

    #[test]
    fn test_translate_is_stable() {
        let once = translate_port(&ProviderId::Aliyun, "80-90");
        assert_eq!(once, "80/90");
        assert_eq!(translate_port(&ProviderId::Aliyun, &once), "80/90");

        assert_eq!(translate_port(&ProviderId::TencentCloud, "80-90"), "80-90");
        assert_eq!(translate_port(&ProviderId::HuaweiCloud, "80-90"), "80-90");
    }

    #[test]
    fn test_protocol_override() {
        assert_eq!(protocol_override(&ProviderId::Aliyun, &Protocol::Icmp), Some("-1/-1"));
        assert_eq!(protocol_override(&ProviderId::Aliyun, &Protocol::All), Some("-1/-1"));
        assert_eq!(protocol_override(&ProviderId::TencentCloud, &Protocol::Icmp), Some("ALL"));
        assert_eq!(protocol_override(&ProviderId::from("AWS"), &Protocol::All), Some("ALL"));
        assert_eq!(protocol_override(&ProviderId::Aliyun, &Protocol::Tcp), None);

        assert!(!port_input_enabled(&Protocol::Icmp));
        assert!(port_input_enabled(&Protocol::Udp));
    }

    #[test]
    fn test_plan_split_for_tencent() {
        let plan = normalizer().plan_create(
            &target(ProviderId::TencentCloud, None),
            &Protocol::Tcp,
            "80,443",
        );
        assert_eq!(plan.mode(), ExpansionMode::Split);
        assert_eq!(plan.ports(), ["80", "443"]);
    }

    #[test]
    fn test_plan_compound_for_huawei() {
        let plan = normalizer().plan_create(
            &target(ProviderId::HuaweiCloud, None),
            &Protocol::Tcp,
            "80,443",
        );
        assert_eq!(plan.mode(), ExpansionMode::Compound);
        assert_eq!(plan.ports(), ["80,443"]);
    }

    #[test]
    fn test_plan_aliyun_by_subtype() {
        let n = normalizer();

        let lightweight = n.plan_create(&target(ProviderId::Aliyun, Some(1)), &Protocol::Tcp, "80-90,443");
        assert_eq!(lightweight.ports(), ["80/90,443"]);

        let ecs = n.plan_create(&target(ProviderId::Aliyun, Some(0)), &Protocol::Tcp, "80-90,443");
        assert_eq!(ecs.ports(), ["80/90", "443"]);
    }

    #[test]
    fn test_plan_override_short_circuits() {
        let plan = normalizer().plan_create(
            &target(ProviderId::Aliyun, Some(0)),
            &Protocol::Icmp,
            "80-90,443",
        );
        assert_eq!(plan.mode(), ExpansionMode::ProtocolOverride);
        assert_eq!(plan.ports(), ["-1/-1"]);
    }

    #[test]
    fn test_single_token_ignores_capability() {
        let plan = normalizer().plan_create(
            &target(ProviderId::TencentCloud, None),
            &Protocol::Udp,
            " 53 ,",
        );
        assert_eq!(plan.mode(), ExpansionMode::Single);
        assert_eq!(plan.ports(), ["53"]);
    }

    #[test]
    fn test_empty_spec_plans_nothing() {
        let plan = normalizer().plan_create(&target(ProviderId::HuaweiCloud, None), &Protocol::Tcp, ",,");
        assert!(plan.is_empty());
    }

    #[test]
    fn test_requests_share_template() {
        let plan = normalizer().plan_create(
            &target(ProviderId::from("AWS"), None),
            &Protocol::Tcp,
            "22,80,443",
        );
        let template = RuleFields {
            remark: "web".to_string(),
            cloud_config_id: 9,
            port: "22,80,443".to_string(),
            protocol: Protocol::Tcp,
            enabled: true,
        };

        let requests = plan.requests(&template);
        assert_eq!(requests.len(), 3);
        assert!(requests.iter().all(|r| r.remark == "web" && r.cloud_config_id == 9));
        assert_eq!(requests[2].port, "443");
    }

    #[test]
    fn test_update_never_splits() {
        assert_eq!(normalize_update(&ProviderId::Aliyun, &Protocol::Tcp, "80-90,443"), "80/90,443");
        assert_eq!(normalize_update(&ProviderId::TencentCloud, &Protocol::Tcp, "80,443"), "80,443");
        assert_eq!(normalize_update(&ProviderId::Aliyun, &Protocol::All, "80,443"), "-1/-1");
    }

    #[test]
    fn test_expected_rule_count() {
        let n = normalizer();
        let tencent = target(ProviderId::TencentCloud, None);
        assert_eq!(n.expected_rule_count(&tencent, &Protocol::Tcp, "80,443,8080"), 3);
        assert_eq!(n.expected_rule_count(&tencent, &Protocol::Icmp, "80,443,8080"), 1);
        assert_eq!(
            n.expected_rule_count(&target(ProviderId::HuaweiCloud, None), &Protocol::Tcp, "80,443"),
            1
        );
    }
}
