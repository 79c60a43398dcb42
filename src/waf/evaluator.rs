//! Response policy evaluation.

use std::collections::HashSet;

use axum::body::Body;
use axum::http::{HeaderName, Response};
use regex::Regex;
use thiserror::Error;

use crate::config::schema::{ResponseRuleConfig, WafConfig};
use crate::http::request::RequestContext;
use crate::models::Policy;

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("policy {policy_id}: invalid pattern: {source}")]
    InvalidPattern {
        policy_id: i64,
        #[source]
        source: regex::Error,
    },

    #[error("policy {policy_id}: invalid header name '{header}'")]
    InvalidHeader { policy_id: i64, header: String },

    #[error("header {0} is not valid UTF-8")]
    NonUtf8Header(HeaderName),
}

/// Decides whether a backend response hits a policy and whether a request
/// targets a static resource.
pub trait PolicyEvaluator: Send + Sync {
    fn is_response_hit_policy(&self, response: &Response<Body>, app_id: i64) -> Result<Option<Policy>, EvalError>;

    fn is_static_resource(&self, request: &RequestContext) -> bool;
}

#[derive(Debug)]
struct CompiledRule {
    policy: Policy,
    app_id: Option<i64>,
    status: Option<u16>,
    header: Option<HeaderName>,
    pattern: Regex,
}

impl CompiledRule {
    fn compile(rule: &ResponseRuleConfig) -> Result<Self, EvalError> {
        let pattern = Regex::new(&rule.pattern).map_err(|source| EvalError::InvalidPattern {
            policy_id: rule.policy_id,
            source,
        })?;
        let header = match &rule.header {
            Some(name) => Some(HeaderName::from_bytes(name.as_bytes()).map_err(|_| EvalError::InvalidHeader {
                policy_id: rule.policy_id,
                header: name.clone(),
            })?),
            None => None,
        };
        Ok(Self {
            policy: Policy {
                id: rule.policy_id,
                app_id: rule.app_id.unwrap_or(0),
                vuln_name: rule.vuln_name.clone(),
                action: rule.action,
            },
            app_id: rule.app_id,
            status: rule.status,
            header,
            pattern,
        })
    }

    fn matches(&self, response: &Response<Body>, app_id: i64) -> Result<bool, EvalError> {
        if self.app_id.is_some_and(|id| id != app_id) {
            return Ok(false);
        }
        if self.status.is_some_and(|status| status != response.status().as_u16()) {
            return Ok(false);
        }
        match &self.header {
            Some(name) => {
                for value in response.headers().get_all(name) {
                    let value = value.to_str().map_err(|_| EvalError::NonUtf8Header(name.clone()))?;
                    if self.pattern.is_match(value) {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            None => Ok(self.pattern.is_match(response.status().as_str())),
        }
    }
}

/// Config-driven evaluator: ordered response rules, first match wins.
#[derive(Debug, Default)]
pub struct RuleEvaluator {
    rules: Vec<CompiledRule>,
    static_extensions: HashSet<String>,
}

impl RuleEvaluator {
    pub fn from_config(config: &WafConfig) -> Result<Self, EvalError> {
        let rules = config
            .response_rules
            .iter()
            .map(CompiledRule::compile)
            .collect::<Result<Vec<_>, _>>()?;
        let static_extensions = config
            .static_extensions
            .iter()
            .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
            .collect();

        tracing::info!(rules = rules.len(), "Response rules compiled");
        Ok(Self {
            rules,
            static_extensions,
        })
    }
}

impl PolicyEvaluator for RuleEvaluator {
    fn is_response_hit_policy(&self, response: &Response<Body>, app_id: i64) -> Result<Option<Policy>, EvalError> {
        for rule in &self.rules {
            if rule.matches(response, app_id)? {
                return Ok(Some(rule.policy.clone()));
            }
        }
        Ok(None)
    }

    fn is_static_resource(&self, request: &RequestContext) -> bool {
        let file = request.path().rsplit('/').next().unwrap_or("");
        match file.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => self.static_extensions.contains(&ext.to_ascii_lowercase()),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::request::ClientTransport;
    use crate::models::PolicyAction;
    use axum::http::Request;

    fn rule(policy_id: i64, header: Option<&str>, pattern: &str) -> ResponseRuleConfig {
        ResponseRuleConfig {
            policy_id,
            app_id: None,
            vuln_name: "Information Leakage".into(),
            action: PolicyAction::Block,
            status: None,
            header: header.map(str::to_string),
            pattern: pattern.into(),
        }
    }

    fn evaluator(rules: Vec<ResponseRuleConfig>) -> RuleEvaluator {
        RuleEvaluator::from_config(&WafConfig {
            response_rules: rules,
            ..WafConfig::default()
        })
        .unwrap()
    }

    fn request(path: &str) -> RequestContext {
        let (parts, _) = Request::builder().uri(path).body(()).unwrap().into_parts();
        RequestContext::from_parts(&parts, ClientTransport::Plain, "127.0.0.1:1".parse().unwrap())
    }

    #[test]
    fn test_header_rule_hits() {
        let eval = evaluator(vec![rule(7, Some("x-debug-token"), ".+")]);
        let response = Response::builder()
            .header("X-Debug-Token", "abc")
            .body(Body::empty())
            .unwrap();
        let policy = eval.is_response_hit_policy(&response, 1).unwrap().unwrap();
        assert_eq!(policy.id, 7);
        assert_eq!(policy.vuln_name, "Information Leakage");

        let clean = Response::new(Body::empty());
        assert!(eval.is_response_hit_policy(&clean, 1).unwrap().is_none());
    }

    #[test]
    fn test_status_and_app_filters() {
        let mut scoped = rule(9, None, "^5");
        scoped.app_id = Some(2);
        let eval = evaluator(vec![scoped]);
        let response = Response::builder().status(500).body(Body::empty()).unwrap();
        assert!(eval.is_response_hit_policy(&response, 1).unwrap().is_none());
        assert_eq!(eval.is_response_hit_policy(&response, 2).unwrap().unwrap().app_id, 2);
    }

    #[test]
    fn test_invalid_pattern() {
        let result = RuleEvaluator::from_config(&WafConfig {
            response_rules: vec![rule(1, None, "(")],
            ..WafConfig::default()
        });
        assert!(matches!(result, Err(EvalError::InvalidPattern { policy_id: 1, .. })));
    }

    #[test]
    fn test_static_resource() {
        let eval = evaluator(Vec::new());
        assert!(eval.is_static_resource(&request("/assets/app.JS")));
        assert!(eval.is_static_resource(&request("/logo.png?v=2")));
        assert!(!eval.is_static_resource(&request("/api/users")));
        assert!(!eval.is_static_resource(&request("/.css")));
        assert!(!eval.is_static_resource(&request("/assets/")));
    }
}
