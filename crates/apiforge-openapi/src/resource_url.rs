//! Resource URL resolution.

use crate::config::ProviderSettings;
use crate::error::{ProviderError, Result};
use crate::types::{BackendConfiguration, ResourceDescriptor};
use std::sync::Arc;
use tracing::{debug, info};

/// Computes absolute URLs for resource operations.
///
/// Host precedence, lowest to highest: backend host (or region host),
/// resource host override, operator endpoint override.
#[derive(Debug, Clone)]
pub struct UrlResolver {
    backend: Arc<BackendConfiguration>,
    settings: Arc<ProviderSettings>,
}

impl UrlResolver {
    pub fn new(backend: Arc<BackendConfiguration>, settings: Arc<ProviderSettings>) -> Self {
        Self { backend, settings }
    }

    /// Collection URL of `resource`, with `parent_ids` substituted into the
    /// path template in order.
    pub fn resource_url(&self, resource: &ResourceDescriptor, parent_ids: &[String]) -> Result<String> {
        let mut host = self.backend_host()?.to_string();
        let path = resource_path(resource, parent_ids)?;

        if let Some(host_override) = resource.host_override.as_deref().filter(|h| !h.is_empty()) {
            info!(
                "resource '{}' is configured with host override, API calls will be made against '{}' instead of '{}'",
                resource.name, host_override, host
            );
            host = host_override.to_string();
        }

        if let Some(endpoint) = self.settings.endpoint(&resource.name) {
            info!(
                "resource '{}' is configured with endpoint override, API calls will be made against '{}' instead of '{}'",
                resource.name, endpoint, host
            );
            host = endpoint.to_string();
        }

        if host.is_empty() || path.is_empty() {
            return Err(ProviderError::config(format!(
                "host and path are mandatory attributes to get the resource URL - host['{}'], path['{}']",
                host, path
            )));
        }

        let scheme = self.backend.http_scheme();
        let path = if path.starts_with('/') {
            path
        } else {
            format!("/{}", path)
        };

        let base_path = self.backend.base_path.trim_matches('/');
        let url = if base_path.is_empty() {
            format!("{}://{}{}", scheme, host, path)
        } else {
            format!("{}://{}/{}{}", scheme, host, base_path, path)
        };

        debug!("Resolved URL for resource '{}': {}", resource.name, url);
        Ok(url)
    }

    /// Instance URL of `resource`. The last id is the instance id; the ones
    /// before it fill the parent placeholders of the path template.
    pub fn resource_instance_url(&self, resource: &ResourceDescriptor, ids: &[String]) -> Result<String> {
        let Some((id, parent_ids)) = ids.split_last() else {
            return Err(ProviderError::MissingInstanceId(resource.name.clone()));
        };

        let url = self.resource_url(resource, parent_ids)?;
        if url.ends_with('/') {
            Ok(format!("{}{}", url, id))
        } else {
            Ok(format!("{}/{}", url, id))
        }
    }

    fn backend_host(&self) -> Result<&str> {
        match &self.backend.regions {
            Some(regions) => {
                let region = self.settings.region.as_deref().filter(|r| !r.is_empty());
                if region.is_none() {
                    debug!(
                        "no region configured, falling back to default region '{}'",
                        regions.default_region()
                    );
                }
                regions.host_for(region)
            }
            None => Ok(&self.backend.host),
        }
    }
}

/// Substitute ids into the `{placeholder}`s of the resource path template.
fn resource_path(resource: &ResourceDescriptor, ids: &[String]) -> Result<String> {
    let placeholders = resource.placeholders();
    if ids.len() < placeholders.len() {
        return Err(ProviderError::MissingPathIds {
            resource: resource.name.clone(),
            template: resource.path_template.clone(),
            expected: placeholders.len(),
            given: ids.len(),
        });
    }

    // Single pass over the template so ids are never rescanned for braces.
    let template = resource.path_template.as_str();
    let mut path = String::with_capacity(template.len());
    let mut copied = 0;
    for (range, id) in placeholders.into_iter().zip(ids) {
        path.push_str(&template[copied..range.start]);
        path.push_str(id);
        copied = range.end;
    }
    path.push_str(&template[copied..]);
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::types::RegionHosts;
    use std::collections::{BTreeMap, HashMap};

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn resolver(backend: BackendConfiguration, settings: ProviderSettings) -> UrlResolver {
        UrlResolver::new(Arc::new(backend), Arc::new(settings))
    }

    fn http_backend(host: &str, base_path: &str) -> BackendConfiguration {
        BackendConfiguration::new(host, base_path, vec!["http".to_string()])
    }

    fn multi_region_backend() -> BackendConfiguration {
        let hosts = BTreeMap::from([
            ("rst1".to_string(), "api.rst1.example.com".to_string()),
            ("dub1".to_string(), "api.dub1.example.com".to_string()),
        ]);
        http_backend("", "").with_regions(RegionHosts::new(hosts, "rst1").unwrap())
    }

    #[test]
    fn test_resource_url_single_host() {
        let resolver = resolver(http_backend("h", ""), ProviderSettings::default());
        let cdns = ResourceDescriptor::new("cdns_v1", "/v1/cdns");

        assert_eq!(resolver.resource_url(&cdns, &[]).unwrap(), "http://h/v1/cdns");
    }

    #[test]
    fn test_https_preferred_when_declared() {
        let backend = BackendConfiguration::new("h", "", vec!["http".into(), "https".into()]);
        let resolver = resolver(backend, ProviderSettings::default());
        let cdns = ResourceDescriptor::new("cdns_v1", "v1/cdns");

        assert_eq!(resolver.resource_url(&cdns, &[]).unwrap(), "https://h/v1/cdns");
    }

    #[test]
    fn test_base_path_normalization() {
        let cdns = ResourceDescriptor::new("cdns_v1", "/v1/cdns");
        for base_path in ["api", "/api", "/api/"] {
            let resolver = resolver(http_backend("h", base_path), ProviderSettings::default());
            assert_eq!(resolver.resource_url(&cdns, &[]).unwrap(), "http://h/api/v1/cdns");
        }

        let resolver = resolver(http_backend("h", "/"), ProviderSettings::default());
        assert_eq!(resolver.resource_url(&cdns, &[]).unwrap(), "http://h/v1/cdns");
    }

    #[test]
    fn test_multi_region_uses_default_region() {
        let resolver = resolver(multi_region_backend(), ProviderSettings::default());
        let cdns = ResourceDescriptor::new("cdns_v1", "/v1/cdns");

        assert_eq!(
            resolver.resource_url(&cdns, &[]).unwrap(),
            "http://api.rst1.example.com/v1/cdns"
        );
    }

    #[test]
    fn test_multi_region_operator_region() {
        let settings = ProviderSettings {
            region: Some("dub1".to_string()),
            ..Default::default()
        };
        let resolver = resolver(multi_region_backend(), settings);
        let cdns = ResourceDescriptor::new("cdns_v1", "/v1/cdns");

        assert_eq!(
            resolver.resource_url(&cdns, &[]).unwrap(),
            "http://api.dub1.example.com/v1/cdns"
        );
    }

    #[test]
    fn test_multi_region_unknown_region() {
        let settings = ProviderSettings {
            region: Some("mars".to_string()),
            ..Default::default()
        };
        let resolver = resolver(multi_region_backend(), settings);
        let cdns = ResourceDescriptor::new("cdns_v1", "/v1/cdns");

        let err = resolver.resource_url(&cdns, &[]).unwrap_err();
        assert!(matches!(err, ProviderError::UnknownRegion { .. }));
    }

    #[test]
    fn test_host_override_replaces_backend_host() {
        let resolver = resolver(http_backend("h", "/api"), ProviderSettings::default());
        let cdns = ResourceDescriptor::new("cdns_v1", "/v1/cdns").with_host_override("cdn.example.com");

        assert_eq!(
            resolver.resource_url(&cdns, &[]).unwrap(),
            "http://cdn.example.com/api/v1/cdns"
        );
    }

    #[test]
    fn test_endpoint_override_beats_host_override() {
        let settings = ProviderSettings {
            endpoints: HashMap::from([("cdns_v1".to_string(), "endpoint.example.com".to_string())]),
            ..Default::default()
        };
        let resolver = resolver(multi_region_backend(), settings);
        let cdns = ResourceDescriptor::new("cdns_v1", "/v1/cdns").with_host_override("cdn.example.com");

        assert_eq!(
            resolver.resource_url(&cdns, &[]).unwrap(),
            "http://endpoint.example.com/v1/cdns"
        );
    }

    #[test]
    fn test_empty_host_fails() {
        let resolver = resolver(http_backend("", ""), ProviderSettings::default());
        let cdns = ResourceDescriptor::new("cdns_v1", "/v1/cdns");

        let err = resolver.resource_url(&cdns, &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_sub_resource_urls() {
        let resolver = resolver(http_backend("h", ""), ProviderSettings::default());
        let firewalls = ResourceDescriptor::new("cdns_v1_firewalls_v1", "/v1/cdns/{parent_id}/v1/firewalls");

        assert_eq!(
            resolver.resource_url(&firewalls, &ids(&["42"])).unwrap(),
            "http://h/v1/cdns/42/v1/firewalls"
        );
        assert_eq!(
            resolver
                .resource_instance_url(&firewalls, &ids(&["42", "1337"]))
                .unwrap(),
            "http://h/v1/cdns/42/v1/firewalls/1337"
        );
    }

    #[test]
    fn test_ids_substituted_once_in_template_order() {
        let resolver = resolver(http_backend("h", ""), ProviderSettings::default());
        let nested = ResourceDescriptor::new("a_b", "/a/{p}/b/{q}/c");

        assert_eq!(
            resolver.resource_url(&nested, &ids(&["{q}", "7"])).unwrap(),
            "http://h/a/{q}/b/7/c"
        );
        assert_eq!(
            resolver
                .resource_instance_url(&nested, &ids(&["{p}", "{q}", "9"]))
                .unwrap(),
            "http://h/a/{p}/b/{q}/c/9"
        );
    }

    #[test]
    fn test_sub_resource_missing_parent_id() {
        let resolver = resolver(http_backend("h", ""), ProviderSettings::default());
        let firewalls = ResourceDescriptor::new("cdns_v1_firewalls_v1", "/v1/cdns/{parent_id}/v1/firewalls");

        let err = resolver.resource_url(&firewalls, &[]).unwrap_err();
        assert!(matches!(err, ProviderError::MissingPathIds { expected: 1, given: 0, .. }));

        let err = resolver
            .resource_instance_url(&firewalls, &ids(&["1337"]))
            .unwrap_err();
        assert!(matches!(err, ProviderError::MissingPathIds { .. }));
    }

    #[test]
    fn test_instance_url_requires_id() {
        let resolver = resolver(http_backend("h", ""), ProviderSettings::default());
        let cdns = ResourceDescriptor::new("cdns_v1", "/v1/cdns");

        let err = resolver.resource_instance_url(&cdns, &[]).unwrap_err();
        assert!(matches!(err, ProviderError::MissingInstanceId(_)));
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_instance_url_with_trailing_slash() {
        let resolver = resolver(http_backend("h", ""), ProviderSettings::default());
        let cdns = ResourceDescriptor::new("cdns_v1", "/v1/cdns/");

        assert_eq!(
            resolver.resource_instance_url(&cdns, &ids(&["7"])).unwrap(),
            "http://h/v1/cdns/7"
        );
    }
}
