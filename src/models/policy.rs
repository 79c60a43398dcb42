//! Policy verdicts and hit records.

use serde::{Deserialize, Serialize};

/// Action attached to a WAF/CC policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyAction {
    Block,
    BypassAndLog,
    Captcha,
    Pass,
}

impl PolicyAction {
    /// Legacy numeric code.
    pub fn code(&self) -> u16 {
        match self {
            PolicyAction::Block => 100,
            PolicyAction::BypassAndLog => 200,
            PolicyAction::Captcha => 300,
            PolicyAction::Pass => 400,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyAction::Block => "block",
            PolicyAction::BypassAndLog => "bypass_and_log",
            PolicyAction::Captcha => "captcha",
            PolicyAction::Pass => "pass",
        }
    }
}

/// A policy matched by the evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Policy {
    pub id: i64,
    /// 0 for global policies.
    pub app_id: i64,
    pub vuln_name: String,
    pub action: PolicyAction,
}

/// Category of the policy that fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HitType {
    /// CC (rate/behaviour) policy.
    Cc,
    /// Group/content policy.
    Group,
}

impl HitType {
    pub fn type_id(&self) -> i64 {
        match self {
            HitType::Cc => 1,
            HitType::Group => 2,
        }
    }
}

/// Why enforcement fired. Consumed immediately by the block page renderer or
/// the CAPTCHA store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HitInfo {
    pub hit_type: HitType,
    pub policy_id: i64,
    pub vuln_name: String,
    pub action: PolicyAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_url: Option<String>,
    /// Unix seconds.
    pub block_time: i64,
}

impl HitInfo {
    /// A group-policy hit for `policy`, stamped now.
    pub fn from_policy(policy: &Policy) -> Self {
        Self {
            hit_type: HitType::Group,
            policy_id: policy.id,
            vuln_name: policy.vuln_name.clone(),
            action: policy.action,
            client_id: None,
            target_url: None,
            block_time: chrono::Utc::now().timestamp(),
        }
    }
}

/// CC (challenge-collapsar) policy settings for an application.
///
/// Counting and enforcement live outside this crate; the gateway stores these
/// records and removes them when their application is deleted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CcPolicy {
    pub app_id: i64,
    pub interval_secs: u64,
    pub max_count: u64,
    pub block_secs: u64,
    pub action: PolicyAction,
    #[serde(default)]
    pub stat_by_url: bool,
    #[serde(default)]
    pub stat_by_user_agent: bool,
    #[serde(default)]
    pub stat_by_cookie: bool,
    #[serde(default = "default_enabled")]
    pub is_enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_serializes_by_name() {
        let json = serde_json::to_string(&PolicyAction::BypassAndLog).unwrap();
        assert_eq!(json, "\"bypass_and_log\"");
        assert_eq!(PolicyAction::Captcha.code(), 300);
    }

    #[test]
    fn test_hit_from_policy() {
        let policy = Policy {
            id: 7,
            app_id: 1,
            vuln_name: "Information Leakage".into(),
            action: PolicyAction::Block,
        };
        let hit = HitInfo::from_policy(&policy);
        assert_eq!(hit.hit_type.type_id(), 2);
        assert_eq!(hit.policy_id, 7);
        assert!(hit.client_id.is_none());
        assert!(hit.block_time > 0);
    }
}
