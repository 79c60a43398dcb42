//! Upstream (backend) HTTP client.

use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderValue, Response};
use thiserror::Error;

use crate::config::schema::UpstreamConfig;
use crate::http::request::{strip_hop_by_hop, RequestContext};
use crate::models::InternalScheme;

const X_FORWARDED_FOR: &str = "x-forwarded-for";

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("failed to build upstream client: {0}")]
    Build(#[source] reqwest::Error),

    #[error("upstream request to {destination} failed: {source}")]
    Request {
        destination: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Forwards client requests to a selected destination.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(UpstreamError::Build)?;
        Ok(Self { client })
    }

    /// Send the request to `<scheme>://<destination><path?query>`. Redirects
    /// are returned to the caller, never followed.
    pub async fn forward(
        &self,
        scheme: InternalScheme,
        destination: &str,
        request: &RequestContext,
        body: Bytes,
    ) -> Result<Response<Body>, UpstreamError> {
        let url = format!("{}://{}{}", scheme.as_str(), destination, request.target_url());

        let mut headers = request.headers.clone();
        strip_hop_by_hop(&mut headers);
        headers.remove(header::CONTENT_LENGTH);
        append_forwarded_for(&mut headers, request);

        let upstream = self
            .client
            .request(request.method.clone(), &url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|source| UpstreamError::Request {
                destination: destination.to_string(),
                source,
            })?;

        let status = upstream.status();
        let mut headers = upstream.headers().clone();
        strip_hop_by_hop(&mut headers);

        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

fn append_forwarded_for(headers: &mut axum::http::HeaderMap, request: &RequestContext) {
    let peer = request.peer.ip().to_string();
    let value = match request.header(X_FORWARDED_FOR) {
        Some(prior) => format!("{}, {}", prior, peer),
        None => peer,
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}
