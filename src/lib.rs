//! apiforge workspace facade.
//!
//! Re-exports the resolver and telemetry crates so integration tests and
//! downstream tools can depend on a single package.

pub use apiforge_openapi as openapi;
pub use apiforge_telemetry as telemetry;
