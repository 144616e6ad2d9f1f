//! Protocol revision reported by the registry

/// Revision of the evidence/extra-info protocol implemented here
pub const PROTOCOL_VERSION: &str = "v2";

pub fn version() -> &'static str {
    PROTOCOL_VERSION
}
