//! Model catalogue
//!
//! Every model the planner can talk to, keyed by a stable user-facing id.

/// Model definition with metadata
#[derive(Debug, Clone, Copy)]
pub struct ModelDef {
    /// User-facing model ID (e.g., "claude-4.5-sonnet")
    pub id: &'static str,
    /// API name sent to the provider
    pub api_name: &'static str,
}

/// Preferred default when `DEFAULT_MODEL` is unset
pub const PREFERRED_MODEL: &str = "claude-4.5-sonnet";

pub fn all_models() -> &'static [ModelDef] {
    &[
        ModelDef {
            id: "claude-4.5-sonnet",
            api_name: "claude-sonnet-4-5-20250929",
        },
        ModelDef {
            id: "claude-4.5-opus",
            api_name: "claude-opus-4-5-20251101",
        },
        ModelDef {
            id: "claude-4.5-haiku",
            api_name: "claude-haiku-4-5-20251001",
        },
    ]
}

#[cfg(test)]
pub fn find_model(id: &str) -> Option<&'static ModelDef> {
    all_models().iter().find(|m| m.id == id)
}
