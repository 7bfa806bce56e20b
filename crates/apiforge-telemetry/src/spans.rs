//! Span creation helpers for resource API calls

use crate::attributes::*;

/// Attributes for tracing one dispatched API call
#[derive(Debug, Clone)]
pub struct ApiCallSpanAttributes {
    pub resource: String,
    pub method: String,
    /// URL before authentication was applied, so query keys are never recorded
    pub url: String,
    /// Names of the headers sent; values are never recorded
    pub header_names: Vec<String>,
    /// Response status, `None` when no response came back
    pub status: Option<u16>,
    /// Error class of a failed call
    pub error: Option<String>,
}

/// Create and record an OpenTelemetry span for a resource API call.
pub fn trace_api_call(attrs: ApiCallSpanAttributes) {
    let span = tracing::info_span!(
        "api_call",
        { APIFORGE_RESOURCE_NAME } = %attrs.resource,
        { HTTP_REQUEST_METHOD } = %attrs.method,
        { URL_FULL } = %attrs.url,
        { APIFORGE_REQUEST_HEADER_NAMES } = %attrs.header_names.join(","),
        { HTTP_RESPONSE_STATUS_CODE } = attrs.status,
        { ERROR_TYPE } = attrs.error.as_deref(),
    );

    // Enter and immediately exit the span (it's recorded)
    let _guard = span.enter();
}
