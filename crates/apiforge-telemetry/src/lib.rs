//! # apiforge Telemetry
//!
//! OpenTelemetry integration for tracing resource API calls.
//!
//! Spans record which resource, verb and URL a call used, and the names of
//! the headers sent. Header values and authenticated URLs are never recorded.

mod spans;
mod tracer;

pub use spans::{ApiCallSpanAttributes, trace_api_call};
pub use tracer::{DEFAULT_DIRECTIVES, TelemetryConfig, init_telemetry, subscriber};

/// OpenTelemetry span attribute names, following the HTTP semantic conventions.
pub mod attributes {
    pub const HTTP_REQUEST_METHOD: &str = "http.request.method";
    pub const HTTP_RESPONSE_STATUS_CODE: &str = "http.response.status_code";
    pub const URL_FULL: &str = "url.full";
    pub const ERROR_TYPE: &str = "error.type";

    // apiforge specific attributes
    pub const APIFORGE_RESOURCE_NAME: &str = "apiforge.resource.name";
    pub const APIFORGE_REQUEST_HEADER_NAMES: &str = "apiforge.request.header_names";

    // System name constant
    pub const SYSTEM_NAME: &str = "apiforge";
}
