//! HTTP transport used by the dispatcher and the refresh token exchange.

use crate::error::{ProviderError, Result};
use crate::types::HttpMethod;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

/// A fully resolved request, ready to go on the wire.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    /// JSON body, sent with `Content-Type: application/json`
    pub body: Option<Value>,
}

/// Raw response as returned by the transport.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TransportResponse {
    /// First value of header `name` as a string, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Sends resolved requests.
///
/// Connection pooling, TLS and socket level retries are the implementation's
/// concern; the resolver never retries.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse>;
}

/// [`HttpTransport`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        // Query keys live in the URL; keep them out of error messages.
        let transport_err = |source: reqwest::Error| ProviderError::Transport {
            url: without_query(&request.url).to_string(),
            source: source.without_url(),
        };

        let response = builder.send().await.map_err(transport_err)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(transport_err)?.to_vec();

        debug!("Response status: {} ({} bytes)", status, body.len());

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}

fn without_query(url: &str) -> &str {
    url.split_once('?').map_or(url, |(base, _)| base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    #[tokio::test]
    async fn test_reqwest_transport_sends_headers_and_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/cdns")
            .match_header("x-api-key", "secret")
            .match_body(mockito::Matcher::Json(json!({"label": "cdn"})))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"42"}"#)
            .create_async()
            .await;

        let transport = ReqwestTransport::new();
        let response = transport
            .send(TransportRequest {
                method: HttpMethod::Post,
                url: format!("{}/v1/cdns", server.url()),
                headers: HashMap::from([("x-api-key".to_string(), "secret".to_string())]),
                body: Some(json!({"label": "cdn"})),
            })
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.status, StatusCode::CREATED);
        assert_eq!(response.header("content-type"), Some("application/json"));
        assert_eq!(response.body, br#"{"id":"42"}"#.to_vec());
    }

    #[tokio::test]
    async fn test_reqwest_transport_connection_failure() {
        let transport = ReqwestTransport::new();
        let err = transport
            .send(TransportRequest {
                method: HttpMethod::Get,
                url: "http://127.0.0.1:1/v1/cdns/1".to_string(),
                headers: HashMap::new(),
                body: None,
            })
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(err.to_string().contains("127.0.0.1:1"));
    }

    #[tokio::test]
    async fn test_transport_error_omits_query_keys() {
        let transport = ReqwestTransport::new();
        let err = transport
            .send(TransportRequest {
                method: HttpMethod::Get,
                url: "http://127.0.0.1:1/v1/cdns/1?api_key=hunter2".to_string(),
                headers: HashMap::new(),
                body: None,
            })
            .await
            .unwrap_err();

        assert!(!err.to_string().contains("hunter2"));
        assert!(!format!("{:?}", err).contains("hunter2"));
    }
}
