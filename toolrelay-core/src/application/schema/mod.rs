//! # Schema Translation
//!
//! Turns the loosely typed, JSON-Schema-like parameter descriptions that tool
//! providers publish into [`CallSignature`]s that arguments can be checked
//! against before a tool runs.
//!
//! Translation is total: anything the translator does not understand degrades
//! to a permissive type and is reported as a [`Degradation`] instead of an
//! error. Providers are untrusted and a bad schema must never take the bridge
//! down.
//!
//! ```text
//! serde_json::Value --SchemaNode::parse--> SchemaNode --translate--> CallSignature
//! ```

mod node;
mod signature;
mod validate;

pub use node::{Degradation, ParsedSchema, SchemaKind, SchemaNode};
pub use signature::{CallSignature, FieldSignature, ObjectShape, ParamType, TypeSpec, translate};
pub use validate::{ValidationError, Violation};

use serde_json::Value;
use tracing::warn;

/// Nesting limit for schema parsing. Deeper nodes become opaque.
pub const MAX_SCHEMA_DEPTH: usize = 32;

/// Parse and translate a provider schema in one step, logging every
/// degradation against the tool it belongs to.
pub fn translate_schema(tool: &str, schema: &Value) -> CallSignature {
    let parsed = SchemaNode::parse(schema);
    for degradation in &parsed.degradations {
        warn!(
            tool,
            path = degradation.path.as_str(),
            reason = degradation.reason.as_str(),
            "Schema translation degraded to permissive type"
        );
    }
    translate(&parsed.node)
}
