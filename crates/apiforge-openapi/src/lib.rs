//! # apiforge OpenAPI resolver
//!
//! Drives API resources straight from an OpenAPI description: given a
//! resource and a verb, it works out which credentials apply, which URL to
//! call and which headers to send, then dispatches the request.
//!
//! ## Features
//!
//! - Operation level security overriding global security, AND-combined schemes
//! - API keys in headers or query parameters, refresh token exchange
//! - Multi-region hosts, per-resource host overrides, operator endpoint overrides
//! - Sub-resource paths with parent ids
//! - Header values and secrets never reach the logs
//!
//! ## Example
//!
//! ```no_run
//! use apiforge_openapi::{ApiDescription, ProviderClient, ProviderConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let description = ApiDescription::from_file("./api/openapi.yaml")?;
//! let config = ProviderConfig::from_toml_str(r#"
//!     [credentials]
//!     apikey_auth = "${API_KEY}"
//! "#)?;
//!
//! let client = ProviderClient::from_description(&description, &config)?;
//! let cdns = description.resource("cdns_v1").expect("resource declared");
//! let cdn = client.get(cdns, &["42".to_string()]).await?;
//! println!("{:?}", cdn.body);
//! # Ok(())
//! # }
//! ```

mod auth;
mod client;
mod config;
mod description;
mod error;
mod resource_url;
mod transport;
mod types;

pub use auth::{
    AUTHORIZATION_HEADER, ApiKey, AuthResolver, Authenticator, CredentialStore, RequestContext,
};
pub use client::{ApiResponse, ProviderClient, USER_AGENT_HEADER};
pub use config::{CONFIG_FILE_NAME, ProviderConfig, ProviderSettings};
pub use description::ApiDescription;
pub use error::{ErrorKind, ProviderError, Result};
pub use resource_url::UrlResolver;
pub use transport::{HttpTransport, ReqwestTransport, TransportRequest, TransportResponse};
pub use types::{
    BackendConfiguration, HeaderParameter, HttpMethod, RegionHosts, ResourceDescriptor,
    ResourceOperation, ResourceOperations, SecurityDefinition, SecurityScheme, SecuritySchemeKind,
    SecuritySchemeList, SecuritySchemeRegistry,
};
