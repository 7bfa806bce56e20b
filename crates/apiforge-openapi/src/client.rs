//! Request dispatcher for description-driven resources.

use crate::auth::{AuthResolver, CredentialStore};
use crate::config::{ProviderConfig, ProviderSettings};
use crate::description::ApiDescription;
use crate::error::{ProviderError, Result};
use crate::resource_url::UrlResolver;
use crate::transport::{HttpTransport, ReqwestTransport, TransportRequest, TransportResponse};
use crate::types::{
    BackendConfiguration, HeaderParameter, HttpMethod, ResourceDescriptor, ResourceOperation,
    SecuritySchemeList,
};
use apiforge_telemetry::{ApiCallSpanAttributes, trace_api_call};
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Header identifying this client to the backend.
pub const USER_AGENT_HEADER: &str = "User-Agent";

/// Response of a dispatched call.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Decoded payload for GET/POST/PUT; `None` for DELETE and empty bodies
    pub body: Option<Value>,
}

/// Client that creates, reads, updates and deletes resources described by an
/// API description.
///
/// All state is read-only after construction, so one client can serve
/// concurrent calls.
///
/// # Example
///
/// ```no_run
/// use apiforge_openapi::{ApiDescription, ProviderClient, ProviderConfig};
/// use serde_json::json;
///
/// # #[tokio::main]
/// # async fn main() -> anyhow::Result<()> {
/// let description = ApiDescription::from_file("./api/openapi.yaml")?;
/// let config = ProviderConfig::load()?;
/// let client = ProviderClient::from_description(&description, &config)?;
///
/// let cdns = description.resource("cdns_v1").expect("resource declared");
/// let created = client.post(cdns, &[], &json!({"label": "cdn"})).await?;
/// println!("{:?}", created.body);
/// # Ok(())
/// # }
/// ```
pub struct ProviderClient {
    url_resolver: UrlResolver,
    auth_resolver: AuthResolver,
    credentials: Arc<CredentialStore>,
    settings: Arc<ProviderSettings>,
    transport: Arc<dyn HttpTransport>,
    user_agent: String,
}

impl ProviderClient {
    /// Create a client that sends requests with [`ReqwestTransport`].
    pub fn new(
        backend: BackendConfiguration,
        global_schemes: SecuritySchemeList,
        credentials: CredentialStore,
        settings: ProviderSettings,
    ) -> Self {
        let settings = Arc::new(settings);
        Self {
            url_resolver: UrlResolver::new(Arc::new(backend), settings.clone()),
            auth_resolver: AuthResolver::new(global_schemes),
            credentials: Arc::new(credentials),
            settings,
            transport: Arc::new(ReqwestTransport::new()),
            user_agent: default_user_agent(),
        }
    }

    /// Create a client from a loaded description and operator configuration.
    ///
    /// Fails if the configuration holds credentials for schemes the
    /// description does not declare.
    pub fn from_description(description: &ApiDescription, config: &ProviderConfig) -> Result<Self> {
        let credentials = CredentialStore::build(&description.registry, &config.credentials)?;
        Ok(Self::new(
            description.backend.clone(),
            description.global_security.clone(),
            credentials,
            config.settings(),
        ))
    }

    /// Replace the transport used for every request, including refresh
    /// token exchanges.
    pub fn with_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Create a resource instance. `parent_ids` fill the parent placeholders
    /// of sub-resource paths.
    pub async fn post(
        &self,
        resource: &ResourceDescriptor,
        parent_ids: &[String],
        payload: &Value,
    ) -> Result<ApiResponse> {
        self.perform(HttpMethod::Post, resource, parent_ids, Some(payload))
            .await
    }

    /// Update a resource instance. The last id is the instance id.
    pub async fn put(
        &self,
        resource: &ResourceDescriptor,
        ids: &[String],
        payload: &Value,
    ) -> Result<ApiResponse> {
        self.perform(HttpMethod::Put, resource, ids, Some(payload))
            .await
    }

    /// Fetch a resource instance. The last id is the instance id.
    pub async fn get(&self, resource: &ResourceDescriptor, ids: &[String]) -> Result<ApiResponse> {
        self.perform(HttpMethod::Get, resource, ids, None).await
    }

    /// Delete a resource instance. The last id is the instance id.
    pub async fn delete(&self, resource: &ResourceDescriptor, ids: &[String]) -> Result<ApiResponse> {
        self.perform(HttpMethod::Delete, resource, ids, None).await
    }

    /// Dispatch by verb name. Anything but GET, POST, PUT or DELETE fails
    /// with [`ProviderError::UnsupportedMethod`].
    pub async fn call(
        &self,
        verb: &str,
        resource: &ResourceDescriptor,
        ids: &[String],
        payload: Option<&Value>,
    ) -> Result<ApiResponse> {
        let method: HttpMethod = verb.parse().map_err(|_| ProviderError::UnsupportedMethod {
            method: verb.to_string(),
            resource: resource.name.clone(),
        })?;
        self.perform(method, resource, ids, payload).await
    }

    #[instrument(skip_all, fields(resource = %resource.name, method = %method))]
    async fn perform(
        &self,
        method: HttpMethod,
        resource: &ResourceDescriptor,
        ids: &[String],
        payload: Option<&Value>,
    ) -> Result<ApiResponse> {
        let operation = resource.operations.operation(method).ok_or_else(|| {
            ProviderError::UnsupportedMethod {
                method: method.to_string(),
                resource: resource.name.clone(),
            }
        })?;

        let resource_url = if method.is_instance_level() {
            self.url_resolver.resource_instance_url(resource, ids)?
        } else {
            self.url_resolver.resource_url(resource, ids)?
        };

        let outcome = self
            .authorize_and_send(method, operation, &resource_url, payload)
            .await;

        let (header_names, status, error) = match &outcome {
            Ok((header_names, response)) => {
                (header_names.clone(), Some(response.status.as_u16()), None)
            }
            Err(err) => (Vec::new(), None, Some(format!("{:?}", err.kind()))),
        };
        trace_api_call(ApiCallSpanAttributes {
            resource: resource.name.clone(),
            method: method.to_string(),
            url: resource_url,
            header_names,
            status,
            error,
        });

        let (_, response) = outcome?;
        let body = decode_body(method, &response.body);
        Ok(ApiResponse {
            status: response.status,
            headers: response.headers,
            body,
        })
    }

    /// Authenticate the request, add operation headers and send it. Returns
    /// the sorted names of the headers sent alongside the response.
    async fn authorize_and_send(
        &self,
        method: HttpMethod,
        operation: &ResourceOperation,
        resource_url: &str,
        payload: Option<&Value>,
    ) -> Result<(Vec<String>, TransportResponse)> {
        let mut ctx = self
            .auth_resolver
            .prepare_auth(
                resource_url,
                &operation.security_schemes,
                &self.credentials,
                self.transport.as_ref(),
            )
            .await?;

        self.append_operation_headers(operation, &mut ctx.headers);
        ctx.headers
            .insert(USER_AGENT_HEADER.to_string(), self.user_agent.clone());

        debug!("Performing {} {}", method, resource_url);
        log_headers_safely(&ctx.headers);

        let mut header_names: Vec<String> = ctx.headers.keys().cloned().collect();
        header_names.sort_unstable();

        let body = match method {
            HttpMethod::Post | HttpMethod::Put => payload.cloned(),
            HttpMethod::Get | HttpMethod::Delete => None,
        };

        let response = self
            .transport
            .send(TransportRequest {
                method,
                url: ctx.url,
                headers: ctx.headers,
                body,
            })
            .await?;

        Ok((header_names, response))
    }

    /// Add the headers the operation requires, with values from the operator
    /// settings. Missing values are sent empty.
    fn append_operation_headers(
        &self,
        operation: &ResourceOperation,
        headers: &mut HashMap<String, String>,
    ) {
        for header in &operation.header_parameters {
            headers.insert(header.name.clone(), self.header_value(header));
        }
    }

    fn header_value(&self, header: &HeaderParameter) -> String {
        self.settings
            .header_value(header.config_key())
            .unwrap_or_default()
            .to_string()
    }
}

/// Logs header names only; values may hold secrets.
fn log_headers_safely(headers: &HashMap<String, String>) {
    for (name, value) in headers {
        if value.is_empty() {
            debug!("Request header '{}' sent with empty value", name);
        } else {
            debug!("Request header '{}' sent", name);
        }
    }
}

fn decode_body(method: HttpMethod, body: &[u8]) -> Option<Value> {
    if method == HttpMethod::Delete || body.is_empty() {
        return None;
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(json) => Some(json),
        Err(_) => Some(Value::String(String::from_utf8_lossy(body).to_string())),
    }
}

fn default_user_agent() -> String {
    format!(
        "apiforge/{} ({}; {})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}
