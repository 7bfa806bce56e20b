//! Data structures describing the backend, its resources and their security.
//!
//! Everything here is loaded once from the API description and is read-only
//! afterwards.

use crate::error::{ProviderError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Range;
use std::str::FromStr;

/// Kind of a security scheme declared by the API description.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SecuritySchemeKind {
    /// API key sent in a request header
    ApiKeyHeader,
    /// API key appended as a query parameter
    ApiKeyQuery,
    /// Refresh token exchanged for an access token before each call
    RefreshToken,
}

impl std::fmt::Display for SecuritySchemeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecuritySchemeKind::ApiKeyHeader => write!(f, "api_key_header"),
            SecuritySchemeKind::ApiKeyQuery => write!(f, "api_key_query"),
            SecuritySchemeKind::RefreshToken => write!(f, "refresh_token"),
        }
    }
}

/// A named security scheme referenced by an operation or by the whole API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SecurityScheme {
    /// Scheme name (from components.securitySchemes)
    pub name: String,
    /// Scheme kind
    pub kind: SecuritySchemeKind,
}

impl SecurityScheme {
    pub fn new(name: impl Into<String>, kind: SecuritySchemeKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Ordered list of schemes that must all be satisfied for one call.
pub type SecuritySchemeList = Vec<SecurityScheme>;

/// What the description says about one security scheme.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SecurityDefinition {
    pub kind: SecuritySchemeKind,
    /// Header or query parameter name carrying the secret
    pub key_name: String,
    /// Token exchange endpoint, only set for refresh token schemes
    pub refresh_token_url: Option<String>,
}

/// Security schemes declared by the API description, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct SecuritySchemeRegistry {
    definitions: BTreeMap<String, SecurityDefinition>,
}

impl SecuritySchemeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an API key scheme carried in a header.
    pub fn with_api_key_header(mut self, name: &str, header: &str) -> Self {
        self.insert(
            name,
            SecurityDefinition {
                kind: SecuritySchemeKind::ApiKeyHeader,
                key_name: header.to_string(),
                refresh_token_url: None,
            },
        );
        self
    }

    /// Register an API key scheme carried in the query string.
    pub fn with_api_key_query(mut self, name: &str, param: &str) -> Self {
        self.insert(
            name,
            SecurityDefinition {
                kind: SecuritySchemeKind::ApiKeyQuery,
                key_name: param.to_string(),
                refresh_token_url: None,
            },
        );
        self
    }

    /// Register a refresh token scheme. `header` carries the refresh token
    /// on the exchange request sent to `token_url`.
    pub fn with_refresh_token(mut self, name: &str, header: &str, token_url: &str) -> Self {
        self.insert(
            name,
            SecurityDefinition {
                kind: SecuritySchemeKind::RefreshToken,
                key_name: header.to_string(),
                refresh_token_url: Some(token_url.to_string()),
            },
        );
        self
    }

    pub fn insert(&mut self, name: &str, definition: SecurityDefinition) {
        self.definitions.insert(name.to_string(), definition);
    }

    pub fn get(&self, name: &str) -> Option<&SecurityDefinition> {
        self.definitions.get(name)
    }

    /// Look up `name` and return it as a [`SecurityScheme`].
    pub fn scheme(&self, name: &str) -> Option<SecurityScheme> {
        self.get(name).map(|def| SecurityScheme::new(name, def.kind))
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

/// Region to host table of a multi-region backend.
///
/// Construction guarantees the table is non-empty and the default region is
/// one of its entries, so only an operator supplied region can fail lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionHosts {
    hosts: BTreeMap<String, String>,
    default_region: String,
}

impl RegionHosts {
    pub fn new(hosts: BTreeMap<String, String>, default_region: impl Into<String>) -> Result<Self> {
        let default_region = default_region.into();
        if hosts.is_empty() {
            return Err(ProviderError::config(
                "multi-region backend must declare at least one region",
            ));
        }
        if let Some((region, _)) = hosts.iter().find(|(_, host)| host.is_empty()) {
            return Err(ProviderError::config(format!(
                "region '{}' maps to an empty host",
                region
            )));
        }
        if !hosts.contains_key(&default_region) {
            return Err(ProviderError::config(format!(
                "default region '{}' is not one of the declared regions [{}]",
                default_region,
                hosts.keys().cloned().collect::<Vec<_>>().join(", ")
            )));
        }
        Ok(Self {
            hosts,
            default_region,
        })
    }

    pub fn default_region(&self) -> &str {
        &self.default_region
    }

    /// Declared region names, sorted.
    pub fn regions(&self) -> Vec<String> {
        self.hosts.keys().cloned().collect()
    }

    pub fn host_for(&self, region: Option<&str>) -> Result<&str> {
        let region = region.unwrap_or(&self.default_region);
        self.hosts
            .get(region)
            .map(String::as_str)
            .ok_or_else(|| ProviderError::UnknownRegion {
                region: region.to_string(),
                supported: self.regions(),
            })
    }
}

/// How to reach the backend API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfiguration {
    /// Host used when the backend is not multi-region (may include a port)
    pub host: String,
    /// Base path prepended to every resource path (e.g., "/api")
    pub base_path: String,
    /// Supported URL schemes, as declared ("http", "https")
    pub schemes: Vec<String>,
    /// Region table when the backend is multi-region
    pub regions: Option<RegionHosts>,
}

impl BackendConfiguration {
    /// Single-host backend.
    pub fn new(host: impl Into<String>, base_path: impl Into<String>, schemes: Vec<String>) -> Self {
        Self {
            host: host.into(),
            base_path: base_path.into(),
            schemes,
            regions: None,
        }
    }

    /// Turn this backend into a multi-region one.
    pub fn with_regions(mut self, regions: RegionHosts) -> Self {
        self.regions = Some(regions);
        self
    }

    pub fn is_multi_region(&self) -> bool {
        self.regions.is_some()
    }

    /// "https" if declared, "http" otherwise. Matching is exact.
    pub fn http_scheme(&self) -> &'static str {
        if self.schemes.iter().any(|s| s == "https") {
            "https"
        } else {
            "http"
        }
    }
}

/// A header an operation requires, with its value coming from operator config.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HeaderParameter {
    /// Header name sent on the wire
    pub name: String,
    /// Operator configuration key, when different from the header name
    pub config_name: Option<String>,
}

impl HeaderParameter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config_name: None,
        }
    }

    /// Key used to look up the value in the operator configuration.
    pub fn config_key(&self) -> &str {
        self.config_name.as_deref().unwrap_or(&self.name)
    }
}

/// Metadata of one operation (verb) on a resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceOperation {
    /// Operation level security; empty means "use the global list"
    pub security_schemes: SecuritySchemeList,
    pub header_parameters: Vec<HeaderParameter>,
}

/// The operations a resource declares.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceOperations {
    pub post: Option<ResourceOperation>,
    pub get: Option<ResourceOperation>,
    pub put: Option<ResourceOperation>,
    pub delete: Option<ResourceOperation>,
}

impl ResourceOperations {
    pub fn operation(&self, method: HttpMethod) -> Option<&ResourceOperation> {
        match method {
            HttpMethod::Post => self.post.as_ref(),
            HttpMethod::Get => self.get.as_ref(),
            HttpMethod::Put => self.put.as_ref(),
            HttpMethod::Delete => self.delete.as_ref(),
        }
    }
}

/// An addressable entity type exposed by the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    /// Resource name, also the key for operator endpoint overrides
    pub name: String,
    /// Collection path template (e.g., "/v1/cdns/{parent_id}/v1/firewalls")
    pub path_template: String,
    /// Host that replaces the backend host for this resource
    pub host_override: Option<String>,
    pub operations: ResourceOperations,
}

impl ResourceDescriptor {
    pub fn new(name: impl Into<String>, path_template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path_template: path_template.into(),
            host_override: None,
            operations: ResourceOperations::default(),
        }
    }

    pub fn with_host_override(mut self, host: impl Into<String>) -> Self {
        self.host_override = Some(host.into());
        self
    }

    pub fn with_operation(mut self, method: HttpMethod, operation: ResourceOperation) -> Self {
        let slot = match method {
            HttpMethod::Post => &mut self.operations.post,
            HttpMethod::Get => &mut self.operations.get,
            HttpMethod::Put => &mut self.operations.put,
            HttpMethod::Delete => &mut self.operations.delete,
        };
        *slot = Some(operation);
        self
    }

    /// Placeholder names of the path template, in template order.
    pub fn path_parameters(&self) -> Vec<&str> {
        self.placeholders()
            .into_iter()
            .map(|range| &self.path_template[range.start + 1..range.end - 1])
            .collect()
    }

    /// Byte ranges of the `{placeholder}`s in the path template, braces
    /// included, left to right.
    pub(crate) fn placeholders(&self) -> Vec<Range<usize>> {
        let template = self.path_template.as_str();
        let mut ranges = Vec::new();
        let mut offset = 0;
        while let Some(start) = template[offset..].find('{') {
            let start = offset + start;
            let Some(len) = template[start..].find('}') else {
                break;
            };
            ranges.push(start..start + len + 1);
            offset = start + len + 1;
        }
        ranges
    }
}

/// HTTP verbs the dispatcher knows how to issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// Whether the call targets a single instance rather than the collection.
    pub fn is_instance_level(&self) -> bool {
        !matches!(self, HttpMethod::Post)
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            _ => Err(ProviderError::UnsupportedMethod {
                method: s.to_string(),
                resource: String::new(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn regions() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("rst1".to_string(), "api.rst1.example.com".to_string()),
            ("dub1".to_string(), "api.dub1.example.com".to_string()),
        ])
    }

    #[test]
    fn test_region_hosts_default_fallback() {
        let table = RegionHosts::new(regions(), "rst1").unwrap();
        assert_eq!(table.host_for(None).unwrap(), "api.rst1.example.com");
        assert_eq!(table.host_for(Some("dub1")).unwrap(), "api.dub1.example.com");

        let err = table.host_for(Some("mars")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        match err {
            ProviderError::UnknownRegion { region, supported } => {
                assert_eq!(region, "mars");
                assert_eq!(supported, table.regions());
                assert_eq!(supported, vec!["dub1".to_string(), "rst1".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_region_hosts_validated_at_construction() {
        assert!(RegionHosts::new(BTreeMap::new(), "rst1").is_err());
        assert!(RegionHosts::new(regions(), "mars").is_err());

        let mut blank = regions();
        blank.insert("fra1".to_string(), String::new());
        assert!(RegionHosts::new(blank, "rst1").is_err());
    }

    #[test]
    fn test_http_scheme_selection() {
        let backend = BackendConfiguration::new("h", "", vec!["http".into(), "https".into()]);
        assert_eq!(backend.http_scheme(), "https");

        let backend = BackendConfiguration::new("h", "", vec!["HTTPS".into()]);
        assert_eq!(backend.http_scheme(), "http");

        let backend = BackendConfiguration::new("h", "", vec![]);
        assert_eq!(backend.http_scheme(), "http");
    }

    #[test]
    fn test_path_parameters_in_template_order() {
        let resource = ResourceDescriptor::new("firewalls", "/v1/cdns/{parent_id}/v1/firewalls/{x}");
        assert_eq!(resource.path_parameters(), vec!["parent_id", "x"]);

        let resource = ResourceDescriptor::new("cdns", "/v1/cdns");
        assert!(resource.path_parameters().is_empty());
    }

    #[test]
    fn test_http_method_parsing() {
        assert_eq!("get".parse::<HttpMethod>().unwrap(), HttpMethod::Get);
        assert_eq!("DELETE".parse::<HttpMethod>().unwrap(), HttpMethod::Delete);

        let err = "PATCH".parse::<HttpMethod>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedMethod);
    }

    #[test]
    fn test_header_parameter_config_key() {
        let header = HeaderParameter::new("X-Request-ID");
        assert_eq!(header.config_key(), "X-Request-ID");

        let header = HeaderParameter {
            name: "X-Request-ID".to_string(),
            config_name: Some("request_id".to_string()),
        };
        assert_eq!(header.config_key(), "request_id");
    }
}
