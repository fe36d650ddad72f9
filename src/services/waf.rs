//! Web Application Firewall policy rules
//!
//! Closed Rust types for the `WebAppFirewallPolicyRule` group. Payloads are
//! decoded through the model registry, then mapped onto one variant per
//! registered rule type; unregistered types land in
//! [`WebAppFirewallPolicyRule::Unknown`] with only the common fields.

use crate::model::error::{ConversionError, Error};
use crate::model::{deserialize, serialize, FieldValue, Instance, UNKNOWN_ENUM_VALUE};
use serde_json::Value;

pub const BASE_MODEL: &str = "WebAppFirewallPolicyRule";

const RULE_MODELS: &[&str] = &[
    BASE_MODEL,
    "AccessControlRule",
    "ProtectionRule",
    "RequestRateLimitingRule",
];

/// Fields shared by every rule type
#[derive(Debug, Clone, PartialEq)]
pub struct RuleCommon {
    pub name: String,
    pub condition_language: Option<String>,
    pub condition: Option<String>,
    pub action_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProtectionCapability {
    pub key: String,
    pub version: i64,
    pub action_name: Option<String>,
    pub collaborative_action_threshold: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProtectionRule {
    pub common: RuleCommon,
    pub protection_capabilities: Vec<ProtectionCapability>,
    pub is_body_inspection_enabled: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequestRateLimitingConfiguration {
    pub period_in_seconds: i64,
    pub requests_limit: i64,
    pub action_duration_in_seconds: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequestRateLimitingRule {
    pub common: RuleCommon,
    pub configurations: Vec<RequestRateLimitingConfiguration>,
}

/// One rule of a WAF policy
#[derive(Debug, Clone, PartialEq)]
pub enum WebAppFirewallPolicyRule {
    AccessControl(RuleCommon),
    Protection(ProtectionRule),
    RequestRateLimiting(RequestRateLimitingRule),
    /// A rule type newer than this client
    Unknown(RuleCommon),
}

impl WebAppFirewallPolicyRule {
    /// Discriminator value sent on the wire
    pub fn rule_type(&self) -> &'static str {
        match self {
            Self::AccessControl(_) => "ACCESS_CONTROL",
            Self::Protection(_) => "PROTECTION",
            Self::RequestRateLimiting(_) => "REQUEST_RATE_LIMITING",
            Self::Unknown(_) => UNKNOWN_ENUM_VALUE,
        }
    }

    /// Registry model backing this variant
    pub fn model_name(&self) -> &'static str {
        match self {
            Self::AccessControl(_) => "AccessControlRule",
            Self::Protection(_) => "ProtectionRule",
            Self::RequestRateLimiting(_) => "RequestRateLimitingRule",
            Self::Unknown(_) => BASE_MODEL,
        }
    }

    pub fn common(&self) -> &RuleCommon {
        match self {
            Self::AccessControl(common) | Self::Unknown(common) => common,
            Self::Protection(rule) => &rule.common,
            Self::RequestRateLimiting(rule) => &rule.common,
        }
    }

    pub fn from_instance(instance: &Instance) -> Result<Self, ConversionError> {
        if !RULE_MODELS.contains(&instance.model()) {
            return Err(ConversionError::WrongModel {
                expected: BASE_MODEL.to_string(),
                found: instance.model().to_string(),
            });
        }

        let common = RuleCommon::from_instance(instance)?;
        match optional_str(instance, "type")?.as_deref() {
            Some("ACCESS_CONTROL") => Ok(Self::AccessControl(common)),
            Some("PROTECTION") => Ok(Self::Protection(ProtectionRule {
                common,
                protection_capabilities: nested(instance, "protection_capabilities")?
                    .into_iter()
                    .map(ProtectionCapability::from_instance)
                    .collect::<Result<_, _>>()?,
                is_body_inspection_enabled: optional_bool(instance, "is_body_inspection_enabled")?,
            })),
            Some("REQUEST_RATE_LIMITING") => Ok(Self::RequestRateLimiting(RequestRateLimitingRule {
                common,
                configurations: nested(instance, "configurations")?
                    .into_iter()
                    .map(RequestRateLimitingConfiguration::from_instance)
                    .collect::<Result<_, _>>()?,
            })),
            _ => Ok(Self::Unknown(common)),
        }
    }

    pub fn to_instance(&self) -> Instance {
        let mut instance = Instance::new(self.model_name()).with("type", self.rule_type());
        self.common().write(&mut instance);
        match self {
            Self::Protection(rule) => {
                let capabilities: Vec<Instance> = rule
                    .protection_capabilities
                    .iter()
                    .map(ProtectionCapability::to_instance)
                    .collect();
                instance.set("protection_capabilities", capabilities);
                if let Some(enabled) = rule.is_body_inspection_enabled {
                    instance.set("is_body_inspection_enabled", enabled);
                }
            }
            Self::RequestRateLimiting(rule) => {
                let configurations: Vec<Instance> = rule
                    .configurations
                    .iter()
                    .map(RequestRateLimitingConfiguration::to_instance)
                    .collect();
                instance.set("configurations", configurations);
            }
            Self::AccessControl(_) | Self::Unknown(_) => {}
        }
        instance
    }

    /// Decode a service payload
    pub fn from_json(raw: &Value) -> Result<Self, Error> {
        let instance = deserialize(raw, BASE_MODEL)?;
        Ok(Self::from_instance(&instance)?)
    }

    /// Encode as a request body
    pub fn to_json(&self) -> Result<Value, Error> {
        Ok(serialize(&self.to_instance())?)
    }
}

impl RuleCommon {
    fn from_instance(instance: &Instance) -> Result<Self, ConversionError> {
        Ok(Self {
            name: required_str(instance, "name")?,
            condition_language: optional_str(instance, "condition_language")?,
            condition: optional_str(instance, "condition")?,
            action_name: required_str(instance, "action_name")?,
        })
    }

    fn write(&self, instance: &mut Instance) {
        instance.set("name", self.name.as_str());
        if let Some(language) = &self.condition_language {
            instance.set("condition_language", language.as_str());
        }
        if let Some(condition) = &self.condition {
            instance.set("condition", condition.as_str());
        }
        instance.set("action_name", self.action_name.as_str());
    }
}

impl ProtectionCapability {
    fn from_instance(instance: &Instance) -> Result<Self, ConversionError> {
        Ok(Self {
            key: required_str(instance, "key")?,
            version: required_i64(instance, "version")?,
            action_name: optional_str(instance, "action_name")?,
            collaborative_action_threshold: optional_i64(instance, "collaborative_action_threshold")?,
        })
    }

    fn to_instance(&self) -> Instance {
        let mut instance = Instance::new("ProtectionCapability")
            .with("key", self.key.as_str())
            .with("version", self.version);
        if let Some(action) = &self.action_name {
            instance.set("action_name", action.as_str());
        }
        if let Some(threshold) = self.collaborative_action_threshold {
            instance.set("collaborative_action_threshold", threshold);
        }
        instance
    }
}

impl RequestRateLimitingConfiguration {
    fn from_instance(instance: &Instance) -> Result<Self, ConversionError> {
        Ok(Self {
            period_in_seconds: required_i64(instance, "period_in_seconds")?,
            requests_limit: required_i64(instance, "requests_limit")?,
            action_duration_in_seconds: optional_i64(instance, "action_duration_in_seconds")?,
        })
    }

    fn to_instance(&self) -> Instance {
        let mut instance = Instance::new("RequestRateLimitingConfiguration")
            .with("period_in_seconds", self.period_in_seconds)
            .with("requests_limit", self.requests_limit);
        if let Some(duration) = self.action_duration_in_seconds {
            instance.set("action_duration_in_seconds", duration);
        }
        instance
    }
}

// =============================================================================
// Field extraction
// =============================================================================

fn wrong_type(instance: &Instance, field: &str, expected: &'static str, found: &FieldValue) -> ConversionError {
    ConversionError::WrongType {
        model: instance.model().to_string(),
        field: field.to_string(),
        expected,
        found: found.kind(),
    }
}

fn missing(instance: &Instance, field: &str) -> ConversionError {
    ConversionError::MissingField {
        model: instance.model().to_string(),
        field: field.to_string(),
    }
}

/// Unset and explicit null both read as `None`
fn present<'a>(instance: &'a Instance, field: &str) -> Option<&'a FieldValue> {
    instance.get(field).filter(|v| !v.is_null())
}

fn optional_str(instance: &Instance, field: &str) -> Result<Option<String>, ConversionError> {
    present(instance, field)
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| wrong_type(instance, field, "string", v))
        })
        .transpose()
}

fn required_str(instance: &Instance, field: &str) -> Result<String, ConversionError> {
    optional_str(instance, field)?.ok_or_else(|| missing(instance, field))
}

fn optional_i64(instance: &Instance, field: &str) -> Result<Option<i64>, ConversionError> {
    present(instance, field)
        .map(|v| v.as_i64().ok_or_else(|| wrong_type(instance, field, "integer", v)))
        .transpose()
}

fn required_i64(instance: &Instance, field: &str) -> Result<i64, ConversionError> {
    optional_i64(instance, field)?.ok_or_else(|| missing(instance, field))
}

fn optional_bool(instance: &Instance, field: &str) -> Result<Option<bool>, ConversionError> {
    present(instance, field)
        .map(|v| v.as_bool().ok_or_else(|| wrong_type(instance, field, "boolean", v)))
        .transpose()
}

/// Nested instances of an array field; unset reads as empty
fn nested<'a>(instance: &'a Instance, field: &str) -> Result<Vec<&'a Instance>, ConversionError> {
    let Some(value) = present(instance, field) else {
        return Ok(Vec::new());
    };
    let items = value
        .as_array()
        .ok_or_else(|| wrong_type(instance, field, "array", value))?;
    items
        .iter()
        .filter(|item| !item.is_null())
        .map(|item| {
            item.as_instance()
                .ok_or_else(|| wrong_type(instance, field, "object", item))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn common(name: &str) -> RuleCommon {
        RuleCommon {
            name: name.to_string(),
            condition_language: Some("JMESPATH".to_string()),
            condition: Some("i_contains(keys(http.request.headers), 'X-Probe')".to_string()),
            action_name: "block".to_string(),
        }
    }

    #[test]
    fn test_decode_protection_rule() {
        let rule = WebAppFirewallPolicyRule::from_json(&json!({
            "type": "PROTECTION",
            "name": "r1",
            "actionName": "a1",
            "protectionCapabilities": []
        }))
        .unwrap();

        match rule {
            WebAppFirewallPolicyRule::Protection(rule) => {
                assert_eq!(rule.common.name, "r1");
                assert!(rule.protection_capabilities.is_empty());
                assert_eq!(rule.common.condition_language.as_deref(), Some("JMESPATH"));
            }
            other => panic!("expected a protection rule, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_unknown_rule_type() {
        let rule = WebAppFirewallPolicyRule::from_json(&json!({
            "type": "BOT_MANAGEMENT",
            "name": "bots",
            "actionName": "challenge"
        }))
        .unwrap();
        assert!(matches!(rule, WebAppFirewallPolicyRule::Unknown(ref c) if c.name == "bots"));
        assert_eq!(rule.rule_type(), UNKNOWN_ENUM_VALUE);
    }

    #[test]
    fn test_round_trip_through_json() {
        let rules = vec![
            WebAppFirewallPolicyRule::AccessControl(common("allow-office")),
            WebAppFirewallPolicyRule::Protection(ProtectionRule {
                common: common("owasp"),
                protection_capabilities: vec![ProtectionCapability {
                    key: "941110".to_string(),
                    version: 2,
                    action_name: None,
                    collaborative_action_threshold: Some(4),
                }],
                is_body_inspection_enabled: Some(true),
            }),
            WebAppFirewallPolicyRule::RequestRateLimiting(RequestRateLimitingRule {
                common: common("burst"),
                configurations: vec![RequestRateLimitingConfiguration {
                    period_in_seconds: 60,
                    requests_limit: 100,
                    action_duration_in_seconds: Some(300),
                }],
            }),
        ];

        for rule in rules {
            let encoded = rule.to_json().unwrap();
            assert_eq!(encoded["type"], json!(rule.rule_type()));
            assert_eq!(WebAppFirewallPolicyRule::from_json(&encoded).unwrap(), rule);
        }
    }

    #[test]
    fn test_missing_required_field() {
        let instance = Instance::new("AccessControlRule").with("name", "r");
        assert_eq!(
            WebAppFirewallPolicyRule::from_instance(&instance),
            Err(ConversionError::MissingField {
                model: "AccessControlRule".to_string(),
                field: "action_name".to_string()
            })
        );
    }

    #[test]
    fn test_wrong_model() {
        let instance = Instance::new("PortRange").with("name", "r").with("action_name", "a");
        assert!(matches!(
            WebAppFirewallPolicyRule::from_instance(&instance),
            Err(ConversionError::WrongModel { .. })
        ));
    }

    #[test]
    fn test_wrong_field_type() {
        let instance = Instance::new("ProtectionRule")
            .with("type", "PROTECTION")
            .with("name", "r")
            .with("action_name", "a")
            .with("protection_capabilities", "all");
        assert!(matches!(
            WebAppFirewallPolicyRule::from_instance(&instance),
            Err(ConversionError::WrongType { expected: "array", .. })
        ));
    }
}
