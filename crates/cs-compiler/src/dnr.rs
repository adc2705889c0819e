//! Dynamic-rule JSON for the host's declarative network-filtering facility

use serde::{Deserialize, Serialize};

use cs_core::types::{DomainType, ResourceType, Rule, RuleAction};

/// Error converting host rule JSON back into a rule.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DnrError {
    #[error("Unsupported action type: {0}")]
    UnsupportedAction(String),
    #[error("Unknown resource type: {0}")]
    UnknownResourceType(String),
    #[error("Unknown domain type: {0}")]
    UnknownDomainType(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnrAction {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnrCondition {
    pub url_filter: String,
    pub resource_types: Vec<String>,
    pub domain_type: String,
    /// Omitted entirely when the allowlist is empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excluded_initiator_domains: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnrRule {
    pub id: u32,
    pub priority: u32,
    pub action: DnrAction,
    pub condition: DnrCondition,
}

impl From<&Rule> for DnrRule {
    fn from(rule: &Rule) -> Self {
        let excluded = if rule.excluded_domains.is_empty() {
            None
        } else {
            Some(rule.excluded_domains.clone())
        };
        Self {
            id: rule.id,
            priority: rule.priority,
            action: DnrAction {
                kind: rule.action.as_str().to_string(),
            },
            condition: DnrCondition {
                url_filter: rule.pattern.clone(),
                resource_types: rule.resource_types.names().into_iter().map(String::from).collect(),
                domain_type: rule.domain_type.as_str().to_string(),
                excluded_initiator_domains: excluded,
            },
        }
    }
}

impl DnrRule {
    /// Convert back into a rule, rejecting anything the compiler never emits.
    pub fn to_rule(&self) -> Result<Rule, DnrError> {
        let action = match self.action.kind.as_str() {
            "block" => RuleAction::Block,
            other => return Err(DnrError::UnsupportedAction(other.to_string())),
        };

        let mut resource_types = ResourceType::empty();
        for name in &self.condition.resource_types {
            resource_types |= ResourceType::from_dnr_name(name)
                .ok_or_else(|| DnrError::UnknownResourceType(name.clone()))?;
        }

        let domain_type = match self.condition.domain_type.as_str() {
            "thirdParty" => DomainType::ThirdParty,
            "firstParty" => DomainType::FirstParty,
            other => return Err(DnrError::UnknownDomainType(other.to_string())),
        };

        Ok(Rule {
            id: self.id,
            priority: self.priority,
            action,
            pattern: self.condition.url_filter.clone(),
            resource_types,
            domain_type,
            excluded_domains: self.condition.excluded_initiator_domains.clone().unwrap_or_default(),
        })
    }
}

/// One `updateDynamicRules` call: drop the whole owned id range, then add the
/// freshly compiled rules (omitted when there are none).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleUpdate {
    pub remove_rule_ids: Vec<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add_rules: Option<Vec<DnrRule>>,
}

impl RuleUpdate {
    pub fn new(owned_ids: impl IntoIterator<Item = u32>, rules: &[Rule]) -> Self {
        let add_rules = if rules.is_empty() {
            None
        } else {
            Some(rules.iter().map(DnrRule::from).collect())
        };
        Self {
            remove_rule_ids: owned_ids.into_iter().collect(),
            add_rules,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
