//! Common test utilities and helpers
#![allow(dead_code)]

use apiforge_workspace::openapi::{ApiDescription, ProviderClient, ProviderConfig};

/// CDN API description served from `server_url`.
///
/// - `cdns_v1` is protected by the global `apikey_auth` header key
/// - `cdns_v1_firewalls_v1` is a sub-resource whose instance operations use
///   the `query_auth` query key
/// - `lbs_v1` requires the `refresh_auth` token exchange
/// - `backups_v1` requires `secDef1`, which tests never configure
/// - `dns_v1` declares a host override that operators can replace
pub fn cdn_description(server_url: &str, refresh_url: &str) -> String {
    format!(
        r#"
openapi: 3.0.0
info:
  title: CDN API
  version: 1.0.0
servers:
  - url: {server_url}/api
components:
  securitySchemes:
    apikey_auth:
      type: apiKey
      in: header
      name: X-API-Key
    query_auth:
      type: apiKey
      in: query
      name: api_key
    refresh_auth:
      type: apiKey
      in: header
      name: X-Refresh-Token
      x-refresh-token-url: {refresh_url}
    secDef1:
      type: apiKey
      in: header
      name: X-Sec-Def
security:
  - apikey_auth: []
paths:
  /v1/cdns:
    post:
      operationId: createCdn
      parameters:
        - name: X-Request-ID
          in: header
          x-config-header: request_id
          schema:
            type: string
      responses:
        '201':
          description: Created
  /v1/cdns/{{id}}:
    get:
      operationId: getCdn
      parameters:
        - name: id
          in: path
          required: true
          schema:
            type: string
      responses:
        '200':
          description: Success
    delete:
      operationId: deleteCdn
      parameters:
        - name: id
          in: path
          required: true
          schema:
            type: string
      responses:
        '204':
          description: Deleted
  /v1/cdns/{{parent_id}}/v1/firewalls:
    post:
      operationId: createFirewall
      parameters:
        - name: parent_id
          in: path
          required: true
          schema:
            type: string
      responses:
        '201':
          description: Created
  /v1/cdns/{{parent_id}}/v1/firewalls/{{id}}:
    get:
      operationId: getFirewall
      security:
        - query_auth: []
      parameters:
        - name: parent_id
          in: path
          required: true
          schema:
            type: string
        - name: id
          in: path
          required: true
          schema:
            type: string
      responses:
        '200':
          description: Success
  /v1/lbs:
    post:
      operationId: createLb
      security:
        - refresh_auth: []
      responses:
        '201':
          description: Created
  /v1/backups:
    post:
      operationId: createBackup
      security:
        - secDef1: []
      responses:
        '201':
          description: Created
  /v1/dns:
    post:
      operationId: createDns
      x-resource-host: unreachable.invalid
      responses:
        '201':
          description: Created
"#
    )
}

/// Operator configuration with the header and query keys set.
pub fn operator_config(extra: &str) -> ProviderConfig {
    let toml = format!(
        r#"
[credentials]
apikey_auth = "header-secret"
query_auth = "query-secret"
refresh_auth = "refresh-secret"

[headers]
request_id = "req-123"

{extra}
"#
    );
    ProviderConfig::from_toml_str(&toml).expect("valid test configuration")
}

/// Load the CDN description against `server_url` and build a client.
pub fn cdn_client(server_url: &str, config: &ProviderConfig) -> (ApiDescription, ProviderClient) {
    let refresh_url = format!("{}/auth/refresh", server_url);
    let description = ApiDescription::from_str(&cdn_description(server_url, &refresh_url))
        .expect("valid test description");
    let client = ProviderClient::from_description(&description, config).expect("valid client");
    (description, client)
}

pub fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}
