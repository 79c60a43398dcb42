//! The ordered response pipeline.

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderValue, Method, Response, StatusCode};
use axum::response::IntoResponse;

use crate::captcha::{generate_client_id, CaptchaStore};
use crate::config::schema::EnforcementConfig;
use crate::enforcement::block_page;
use crate::enforcement::cache::{parse_http_date, CacheObject, StaticCache};
use crate::enforcement::headers;
use crate::http::request::RequestContext;
use crate::models::{Application, HitInfo, HitType, InternalScheme, Policy, PolicyAction};
use crate::observability::metrics;
use crate::waf::{client_ip, HitLogger, PolicyEvaluator};

/// Reason recorded for CAPTCHA challenges.
pub const CAPTCHA_VULN_NAME: &str = "Group Policy Hit";

/// Post-processes every backend response before it reaches the client.
pub struct ResponseEnforcer {
    evaluator: Arc<dyn PolicyEvaluator>,
    hit_logger: HitLogger,
    captcha: Arc<CaptchaStore>,
    cache: StaticCache,
    product_name: HeaderValue,
    captcha_entrance: String,
}

impl ResponseEnforcer {
    pub fn new(
        config: &EnforcementConfig,
        evaluator: Arc<dyn PolicyEvaluator>,
        hit_logger: HitLogger,
        captcha: Arc<CaptchaStore>,
        cache: StaticCache,
    ) -> Self {
        let product_name = HeaderValue::from_str(&config.product_name).unwrap_or_else(|_| {
            tracing::warn!(product_name = %config.product_name, "Invalid product name, using default");
            HeaderValue::from_static(crate::PRODUCT_NAME)
        });
        Self {
            evaluator,
            hit_logger,
            captcha,
            cache,
            product_name,
            captcha_entrance: config.captcha_entrance.clone(),
        }
    }

    pub fn captcha_store(&self) -> &Arc<CaptchaStore> {
        &self.captcha
    }

    /// Run every stage in order. Block and CAPTCHA verdicts end the pipeline.
    pub async fn enforce(
        &self,
        mut response: Response<Body>,
        request: &RequestContext,
        app: &Application,
    ) -> Response<Body> {
        headers::rewrite_location(response.headers_mut(), request.transport);
        headers::hide_powered_by(response.headers_mut(), &self.product_name);

        if app.waf_enabled {
            let verdict = match self.evaluator.is_response_hit_policy(&response, app.id) {
                Ok(verdict) => verdict,
                Err(e) => {
                    tracing::warn!(app = app.id, error = %e, "Response policy evaluation failed, passing");
                    None
                }
            };

            if let Some(policy) = verdict {
                let ip = client_ip(request, app.ip_method);
                match policy.action {
                    PolicyAction::Block => {
                        self.hit_logger.log_policy_hit(request, app.id, ip, &policy);
                        return block_response(response, &policy);
                    }
                    PolicyAction::BypassAndLog => {
                        self.hit_logger.log_policy_hit(request, app.id, ip, &policy);
                    }
                    PolicyAction::Captcha => {
                        let client_id = generate_client_id(request.user_agent(), &request.host, app.id, ip);
                        return self.captcha_response(response, request, client_id, &policy);
                    }
                    PolicyAction::Pass => {}
                }
            }
        }

        if app.hsts_enabled && request.is_tls() {
            headers::apply_hsts(response.headers_mut());
        }
        if let Some(csp) = app.content_security_policy() {
            headers::apply_csp(response.headers_mut(), csp);
        }
        if !request.is_tls() && app.internal_scheme == InternalScheme::Https {
            headers::downgrade(response.headers_mut());
        }

        self.cache_static(response, request, app).await
    }

    fn captcha_response(
        &self,
        response: Response<Body>,
        request: &RequestContext,
        client_id: String,
        policy: &Policy,
    ) -> Response<Body> {
        let hit = HitInfo {
            hit_type: HitType::Group,
            policy_id: policy.id,
            vuln_name: CAPTCHA_VULN_NAME.to_string(),
            action: policy.action,
            client_id: Some(client_id.clone()),
            target_url: Some(request.target_url()),
            block_time: chrono::Utc::now().timestamp(),
        };
        self.captcha.issue(client_id.clone(), hit);
        metrics::record_policy_hit(policy.action.as_str());

        let location = format!("{}?id={}", self.captcha_entrance, client_id);
        let (mut parts, _) = response.into_parts();
        parts.status = StatusCode::TEMPORARY_REDIRECT;
        parts.headers.remove(header::CONTENT_ENCODING);
        parts.headers.remove(header::CONTENT_TYPE);
        parts.headers.remove(header::TRANSFER_ENCODING);
        parts.headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("0"));
        match HeaderValue::from_str(&location) {
            Ok(value) => {
                parts.headers.insert(header::LOCATION, value);
            }
            Err(e) => tracing::error!(error = %e, "CAPTCHA location is not a valid header value"),
        }
        tracing::info!(policy_id = policy.id, path = %request.path(), "CAPTCHA challenge issued");
        Response::from_parts(parts, Body::empty())
    }

    async fn cache_static(&self, response: Response<Body>, request: &RequestContext, app: &Application) -> Response<Body> {
        if !self.cache.is_enabled()
            || request.method != Method::GET
            || response.status() != StatusCode::OK
            || !self.evaluator.is_static_resource(request)
        {
            return response;
        }
        let Some(length) = content_length(&response).filter(|len| *len <= self.cache.max_object_bytes()) else {
            return response;
        };
        let path = match self.cache.cache_path(app.id, request.path()) {
            Ok(path) => path,
            Err(e) => {
                tracing::debug!(error = %e, "Skipping static cache");
                return response;
            }
        };

        let (parts, body) = response.into_parts();
        let limit = usize::try_from(length).unwrap_or(usize::MAX);
        let bytes: Bytes = match axum::body::to_bytes(body, limit).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(app = app.id, path = %request.path(), error = %e, "Failed to read backend body");
                return (StatusCode::BAD_GATEWAY, "Upstream body read failed").into_response();
            }
        };

        let gzip = parts
            .headers
            .get(header::CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("gzip"));
        let last_modified = parts
            .headers
            .get(header::LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_http_date);

        self.cache.spawn_store(CacheObject {
            path,
            body: bytes.clone(),
            gzip,
            last_modified,
            max_bytes: self.cache.max_object_bytes(),
        });
        Response::from_parts(parts, Body::from(bytes))
    }
}

fn content_length(response: &Response<Body>) -> Option<u64> {
    response
        .headers()
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

fn block_response(response: Response<Body>, policy: &Policy) -> Response<Body> {
    let hit = HitInfo::from_policy(policy);
    let page = block_page::render(&hit);

    let (mut parts, _) = response.into_parts();
    parts.status = StatusCode::FORBIDDEN;
    parts.headers.remove(header::CONTENT_ENCODING);
    parts.headers.remove(header::TRANSFER_ENCODING);
    parts.headers.remove(header::LOCATION);
    parts
        .headers
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"));
    parts.headers.insert(header::CONTENT_LENGTH, HeaderValue::from(page.len()));
    tracing::info!(policy_id = policy.id, vuln_name = %policy.vuln_name, "Response blocked");
    Response::from_parts(parts, Body::from(page))
}
