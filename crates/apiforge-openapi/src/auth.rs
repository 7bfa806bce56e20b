//! Authentication for resource requests.
//!
//! Supported security schemes:
//! - API Key in a header
//! - API Key in a query parameter
//! - Refresh token exchanged for an access token on every call
//!
//! [`AuthResolver`] picks the schemes that apply to an operation and runs the
//! matching [`Authenticator`]s against a fresh [`RequestContext`].

use crate::error::{ProviderError, Result};
use crate::transport::{HttpTransport, TransportRequest};
use crate::types::{HttpMethod, SecuritySchemeKind, SecuritySchemeList, SecuritySchemeRegistry};
use std::collections::HashMap;
use tracing::debug;

/// Header carrying the access token returned by a refresh token exchange.
pub const AUTHORIZATION_HEADER: &str = "Authorization";

/// Headers and URL accumulated while authenticating one request.
///
/// Created per call and never reused, so nothing leaks between requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub url: String,
    pub headers: HashMap<String, String>,
}

impl RequestContext {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: HashMap::new(),
        }
    }
}

/// Key name and secret value of an API key.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey {
    pub name: String,
    pub value: String,
}

impl ApiKey {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKey")
            .field("name", &self.name)
            .field("value", &"<redacted>")
            .finish()
    }
}

/// One configured way of proving identity, holding the operator's secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authenticator {
    /// Adds `name: value` to the request headers
    ApiKeyHeader(ApiKey),
    /// Appends `?name=value` to the request URL
    ApiKeyQuery(ApiKey),
    /// POSTs the refresh token (sent in header `token.name`) to `token_url`
    /// and installs the returned `Authorization` header
    RefreshToken { token: ApiKey, token_url: String },
}

impl Authenticator {
    pub fn api_key_header(header_name: impl Into<String>, key: impl Into<String>) -> Self {
        Self::ApiKeyHeader(ApiKey::new(header_name, key))
    }

    pub fn api_key_query(param_name: impl Into<String>, key: impl Into<String>) -> Self {
        Self::ApiKeyQuery(ApiKey::new(param_name, key))
    }

    pub fn refresh_token(
        header_name: impl Into<String>,
        refresh_token: impl Into<String>,
        token_url: impl Into<String>,
    ) -> Self {
        Self::RefreshToken {
            token: ApiKey::new(header_name, refresh_token),
            token_url: token_url.into(),
        }
    }

    pub fn kind(&self) -> SecuritySchemeKind {
        match self {
            Authenticator::ApiKeyHeader(_) => SecuritySchemeKind::ApiKeyHeader,
            Authenticator::ApiKeyQuery(_) => SecuritySchemeKind::ApiKeyQuery,
            Authenticator::RefreshToken { .. } => SecuritySchemeKind::RefreshToken,
        }
    }

    /// Add this authenticator's proof of identity to `ctx`.
    ///
    /// Only the refresh token variant touches the network.
    pub async fn prepare_auth(
        &self,
        ctx: &mut RequestContext,
        transport: &dyn HttpTransport,
    ) -> Result<()> {
        match self {
            Authenticator::ApiKeyHeader(key) => {
                ctx.headers.insert(key.name.clone(), key.value.clone());
            }
            Authenticator::ApiKeyQuery(key) => {
                // Appended with '?' even when the URL already has a query string.
                ctx.url = format!("{}?{}={}", ctx.url, key.name, key.value);
            }
            Authenticator::RefreshToken { token, token_url } => {
                let access_token = exchange_refresh_token(token, token_url, transport).await?;
                ctx.headers
                    .insert(AUTHORIZATION_HEADER.to_string(), access_token);
            }
        }
        Ok(())
    }
}

async fn exchange_refresh_token(
    token: &ApiKey,
    token_url: &str,
    transport: &dyn HttpTransport,
) -> Result<String> {
    debug!("Exchanging refresh token at '{}'", token_url);

    let response = transport
        .send(TransportRequest {
            method: HttpMethod::Post,
            url: token_url.to_string(),
            headers: HashMap::from([(token.name.clone(), token.value.clone())]),
            body: None,
        })
        .await?;

    let status = response.status.as_u16();
    if status != 200 && status != 204 {
        return Err(ProviderError::RefreshTokenStatus {
            url: token_url.to_string(),
            status,
        });
    }

    match response.header(AUTHORIZATION_HEADER) {
        Some(access_token) if !access_token.is_empty() => Ok(access_token.to_string()),
        _ => Err(ProviderError::MissingAccessToken {
            url: token_url.to_string(),
            header: AUTHORIZATION_HEADER.to_string(),
        }),
    }
}

/// Operator credentials keyed by security scheme name.
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    authenticators: HashMap<String, Authenticator>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the authenticator for scheme `name`.
    pub fn with(mut self, name: impl Into<String>, authenticator: Authenticator) -> Self {
        self.authenticators.insert(name.into(), authenticator);
        self
    }

    /// Build authenticators from operator secrets, using the description's
    /// registry to decide each scheme's kind and key name.
    ///
    /// Schemes without a secret are left undefined and only fail when an
    /// operation requires them.
    pub fn build(
        registry: &SecuritySchemeRegistry,
        secrets: &HashMap<String, String>,
    ) -> Result<Self> {
        let mut store = Self::new();
        for (name, secret) in secrets {
            let definition = registry
                .get(name)
                .ok_or_else(|| ProviderError::UnknownSecurityScheme(name.clone()))?;

            let authenticator = match definition.kind {
                SecuritySchemeKind::ApiKeyHeader => {
                    Authenticator::api_key_header(&definition.key_name, secret)
                }
                SecuritySchemeKind::ApiKeyQuery => {
                    Authenticator::api_key_query(&definition.key_name, secret)
                }
                SecuritySchemeKind::RefreshToken => {
                    let token_url = definition.refresh_token_url.as_ref().ok_or_else(|| {
                        ProviderError::config(format!(
                            "refresh token scheme '{}' does not declare a token URL",
                            name
                        ))
                    })?;
                    Authenticator::refresh_token(&definition.key_name, secret, token_url)
                }
            };
            store.authenticators.insert(name.clone(), authenticator);
        }
        Ok(store)
    }

    pub fn get(&self, name: &str) -> Option<&Authenticator> {
        self.authenticators.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.authenticators.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.authenticators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.authenticators.is_empty()
    }
}

/// Decides which security schemes apply to a call and applies them.
#[derive(Debug, Clone, Default)]
pub struct AuthResolver {
    global_schemes: SecuritySchemeList,
}

impl AuthResolver {
    pub fn new(global_schemes: SecuritySchemeList) -> Self {
        Self { global_schemes }
    }

    /// The schemes to apply: the operation's list when non-empty, otherwise
    /// the global list, otherwise none.
    pub fn required_schemes<'a>(
        &'a self,
        operation_schemes: &'a SecuritySchemeList,
    ) -> Option<&'a SecuritySchemeList> {
        if !operation_schemes.is_empty() {
            return Some(operation_schemes);
        }
        if !self.global_schemes.is_empty() {
            return Some(&self.global_schemes);
        }
        None
    }

    /// Build the request context for a call to `url`.
    ///
    /// Every required scheme is checked against `credentials` before any
    /// authenticator runs.
    pub async fn prepare_auth(
        &self,
        url: &str,
        operation_schemes: &SecuritySchemeList,
        credentials: &CredentialStore,
        transport: &dyn HttpTransport,
    ) -> Result<RequestContext> {
        let mut ctx = RequestContext::new(url);

        let Some(schemes) = self.required_schemes(operation_schemes) else {
            debug!("No security schemes apply to '{}'", url);
            return Ok(ctx);
        };

        if !operation_schemes.is_empty() {
            debug!(
                "Operation security schemes found for '{}', overriding global security: {:?}",
                url,
                scheme_names(schemes)
            );
        } else {
            debug!(
                "Falling back to global security schemes for '{}': {:?}",
                url,
                scheme_names(schemes)
            );
        }

        let authenticators = schemes
            .iter()
            .map(|scheme| {
                credentials.get(&scheme.name).ok_or_else(|| {
                    ProviderError::MissingSecurityDefinition {
                        scheme: scheme.name.clone(),
                        url: url.to_string(),
                    }
                })
            })
            .collect::<Result<Vec<_>>>()?;

        for authenticator in authenticators {
            authenticator.prepare_auth(&mut ctx, transport).await?;
        }

        Ok(ctx)
    }
}

fn scheme_names(schemes: &SecuritySchemeList) -> Vec<&str> {
    schemes.iter().map(|s| s.name.as_str()).collect()
}
