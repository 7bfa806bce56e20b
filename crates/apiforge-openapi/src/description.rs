//! OpenAPI description loader.
//!
//! Turns an OpenAPI v3.0+ document into the backend configuration, security
//! scheme registry and resource descriptors the client works with.
//!
//! Vendor extensions understood:
//! - `x-resource-name` on a collection `post`: resource name
//! - `x-resource-host` on a collection `post` or its path item: host override
//! - `x-refresh-token-url` on an apiKey header scheme: refresh token exchange
//! - `x-config-header` on a header parameter: operator configuration key

use crate::error::{ProviderError, Result};
use crate::types::{
    BackendConfiguration, HeaderParameter, HttpMethod, RegionHosts, ResourceDescriptor,
    ResourceOperation, SecurityDefinition, SecuritySchemeKind, SecuritySchemeList,
    SecuritySchemeRegistry,
};
use openapiv3::{APIKeyLocation, OpenAPI, Operation, Parameter, PathItem, ReferenceOr, Server};
use std::collections::BTreeMap;
use tracing::{debug, warn};

const EXT_RESOURCE_NAME: &str = "x-resource-name";
const EXT_RESOURCE_HOST: &str = "x-resource-host";
const EXT_REFRESH_TOKEN_URL: &str = "x-refresh-token-url";
const EXT_CONFIG_HEADER: &str = "x-config-header";
const REGION_VARIABLE: &str = "region";

/// Everything the client needs from an API description.
#[derive(Debug, Clone)]
pub struct ApiDescription {
    pub backend: BackendConfiguration,
    pub registry: SecuritySchemeRegistry,
    /// Schemes applied to operations that declare none
    pub global_security: SecuritySchemeList,
    pub resources: Vec<ResourceDescriptor>,
}

impl ApiDescription {
    /// Load and parse a description from a file.
    ///
    /// Supports both JSON and YAML formats.
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;

        let spec: OpenAPI = if path.ends_with(".json") {
            serde_json::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };

        Self::from_spec(&spec)
    }

    /// Parse a description from a string.
    ///
    /// Automatically detects JSON or YAML format.
    pub fn from_str(content: &str) -> Result<Self> {
        let spec: OpenAPI = serde_json::from_str(content)
            .or_else(|_| serde_yaml::from_str(content))
            .map_err(|e| ProviderError::InvalidDescription(e.to_string()))?;

        Self::from_spec(&spec)
    }

    fn from_spec(spec: &OpenAPI) -> Result<Self> {
        let backend = parse_backend(&spec.servers)?;
        let registry = parse_security_schemes(spec)?;
        let global_security = select_security(spec.security.as_deref(), &registry)?;

        let mut resources = Vec::new();
        for (path, path_item_ref) in &spec.paths.paths {
            let ReferenceOr::Item(path_item) = path_item_ref else {
                warn!("Path references not yet supported: {}", path);
                continue;
            };
            let Some(post) = &path_item.post else {
                continue;
            };

            let resource = parse_resource(spec, path, path_item, post, &registry)?;
            debug!("Found resource '{}' at '{}'", resource.name, path);
            resources.push(resource);
        }

        debug!(
            "Parsed {} resources and {} security schemes",
            resources.len(),
            registry.len()
        );

        Ok(Self {
            backend,
            registry,
            global_security,
            resources,
        })
    }

    /// Get a resource by name.
    pub fn resource(&self, name: &str) -> Option<&ResourceDescriptor> {
        self.resources.iter().find(|r| r.name == name)
    }

    /// Names of all resources in the description.
    pub fn resource_names(&self) -> Vec<String> {
        self.resources.iter().map(|r| r.name.clone()).collect()
    }
}

fn parse_backend(servers: &[Server]) -> Result<BackendConfiguration> {
    let server = servers
        .first()
        .ok_or_else(|| ProviderError::InvalidDescription("no servers declared".to_string()))?;

    let mut schemes = Vec::new();
    for server in servers {
        let url = url::Url::parse(&substitute_defaults(server, None))?;
        if !schemes.iter().any(|s| s == url.scheme()) {
            schemes.push(url.scheme().to_string());
        }
    }

    let default_url = url::Url::parse(&substitute_defaults(server, None))?;
    let base_path = default_url.path().to_string();

    let region_variable = server
        .variables
        .as_ref()
        .and_then(|vars| vars.get(REGION_VARIABLE));

    let Some(region_variable) = region_variable else {
        return Ok(BackendConfiguration::new(host_of(&default_url)?, base_path, schemes));
    };

    let regions: Vec<&String> = if region_variable.enumeration.is_empty() {
        vec![&region_variable.default]
    } else {
        region_variable.enumeration.iter().collect()
    };

    let mut hosts = BTreeMap::new();
    for region in regions {
        let url = url::Url::parse(&substitute_defaults(server, Some(region.as_str())))?;
        hosts.insert(region.clone(), host_of(&url)?);
    }

    let region_hosts = RegionHosts::new(hosts, region_variable.default.clone())?;
    debug!(
        "Backend is multi-region, default region '{}'",
        region_hosts.default_region()
    );

    Ok(BackendConfiguration::new(String::new(), base_path, schemes).with_regions(region_hosts))
}

/// Server URL with every variable replaced; `region` overrides the default
/// of the region variable.
fn substitute_defaults(server: &Server, region: Option<&str>) -> String {
    let mut url = server.url.clone();
    if let Some(variables) = &server.variables {
        for (name, variable) in variables {
            let value = match region {
                Some(region) if name == REGION_VARIABLE => region,
                _ => variable.default.as_str(),
            };
            url = url.replace(&format!("{{{}}}", name), value);
        }
    }
    url
}

fn host_of(url: &url::Url) -> Result<String> {
    let host = url
        .host_str()
        .ok_or_else(|| ProviderError::InvalidDescription(format!("server '{}' has no host", url)))?;
    Ok(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

fn parse_security_schemes(spec: &OpenAPI) -> Result<SecuritySchemeRegistry> {
    let mut registry = SecuritySchemeRegistry::new();
    let Some(components) = &spec.components else {
        return Ok(registry);
    };

    for (name, scheme_ref) in &components.security_schemes {
        let ReferenceOr::Item(scheme) = scheme_ref else {
            warn!("Security scheme references not yet supported: {}", name);
            continue;
        };

        let openapiv3::SecurityScheme::APIKey { location, name: key_name, .. } = scheme else {
            warn!("Security scheme '{}' is not an apiKey scheme, skipping", name);
            continue;
        };

        let refresh_token_url = extension_str(&serde_json::to_value(scheme)?, EXT_REFRESH_TOKEN_URL);
        let kind = match (location, &refresh_token_url) {
            (APIKeyLocation::Header, Some(_)) => SecuritySchemeKind::RefreshToken,
            (APIKeyLocation::Header, None) => SecuritySchemeKind::ApiKeyHeader,
            (APIKeyLocation::Query, _) => SecuritySchemeKind::ApiKeyQuery,
            (APIKeyLocation::Cookie, _) => {
                warn!("Cookie api keys not yet supported: {}", name);
                continue;
            }
        };

        registry.insert(
            name,
            SecurityDefinition {
                kind,
                key_name: key_name.clone(),
                refresh_token_url,
            },
        );
    }

    Ok(registry)
}

/// Pick the first security alternative; every scheme inside it applies.
fn select_security(
    requirements: Option<&[openapiv3::SecurityRequirement]>,
    registry: &SecuritySchemeRegistry,
) -> Result<SecuritySchemeList> {
    let Some(first) = requirements.and_then(|reqs| reqs.first()) else {
        return Ok(Vec::new());
    };

    first
        .keys()
        .map(|name| {
            registry.scheme(name).ok_or_else(|| {
                ProviderError::InvalidDescription(format!(
                    "security requirement '{}' is not declared under components.securitySchemes",
                    name
                ))
            })
        })
        .collect()
}

fn parse_resource(
    spec: &OpenAPI,
    path: &str,
    path_item: &PathItem,
    post: &Operation,
    registry: &SecuritySchemeRegistry,
) -> Result<ResourceDescriptor> {
    let name = post
        .extensions
        .get(EXT_RESOURCE_NAME)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| resource_name_from_path(path));

    let mut resource = ResourceDescriptor::new(name, path).with_operation(
        HttpMethod::Post,
        parse_operation(post, &path_item.parameters, registry)?,
    );

    let host_override = post
        .extensions
        .get(EXT_RESOURCE_HOST)
        .or_else(|| path_item.extensions.get(EXT_RESOURCE_HOST))
        .and_then(|v| v.as_str());
    if let Some(host) = host_override {
        resource = resource.with_host_override(host);
    }

    let Some(instance_item) = instance_path_item(spec, path) else {
        debug!("Resource at '{}' has no instance path", path);
        return Ok(resource);
    };

    let instance_ops = [
        (HttpMethod::Get, &instance_item.get),
        (HttpMethod::Put, &instance_item.put),
        (HttpMethod::Delete, &instance_item.delete),
    ];
    for (method, operation) in instance_ops {
        if let Some(operation) = operation {
            resource = resource.with_operation(
                method,
                parse_operation(operation, &instance_item.parameters, registry)?,
            );
        }
    }

    Ok(resource)
}

/// Find `{path}/{param}`, the instance path of a collection.
fn instance_path_item<'a>(spec: &'a OpenAPI, collection: &str) -> Option<&'a PathItem> {
    let prefix = format!("{}/", collection.trim_end_matches('/'));
    spec.paths.paths.iter().find_map(|(path, item)| {
        let rest = path.strip_prefix(&prefix)?;
        let is_param = rest.starts_with('{') && rest.ends_with('}') && !rest.contains('/');
        match item {
            ReferenceOr::Item(item) if is_param => Some(item),
            _ => None,
        }
    })
}

fn parse_operation(
    operation: &Operation,
    path_params: &[ReferenceOr<Parameter>],
    registry: &SecuritySchemeRegistry,
) -> Result<ResourceOperation> {
    let security_schemes = select_security(operation.security.as_deref(), registry)?;

    let mut header_parameters = Vec::new();
    for param_ref in path_params.iter().chain(&operation.parameters) {
        let ReferenceOr::Item(param) = param_ref else {
            warn!("Parameter references not yet supported");
            continue;
        };
        let Parameter::Header { parameter_data, .. } = param else {
            continue;
        };

        let config_name = extension_str(&serde_json::to_value(param)?, EXT_CONFIG_HEADER);
        header_parameters.push(HeaderParameter {
            name: parameter_data.name.clone(),
            config_name,
        });
    }

    Ok(ResourceOperation {
        security_schemes,
        header_parameters,
    })
}

fn extension_str(value: &serde_json::Value, key: &str) -> Option<String> {
    value.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

/// Derive a resource name from its collection path.
///
/// Version segments attach to the segment that follows them:
/// `/v1/cdns/{id}/v1/firewalls` becomes `cdns_v1_firewalls_v1`.
fn resource_name_from_path(path: &str) -> String {
    let mut parts = Vec::new();
    let mut version: Option<&str> = None;

    for segment in path.split('/').filter(|s| !s.is_empty() && !s.starts_with('{')) {
        if is_version(segment) {
            version = Some(segment);
            continue;
        }
        match version.take() {
            Some(v) => parts.push(format!("{}_{}", segment, v)),
            None => parts.push(segment.to_string()),
        }
    }

    if parts.is_empty() {
        "root".to_string()
    } else {
        parts.join("_").replace('-', "_")
    }
}

fn is_version(segment: &str) -> bool {
    segment.len() > 1
        && segment.starts_with('v')
        && segment[1..].chars().all(|c| c.is_ascii_digit())
}
