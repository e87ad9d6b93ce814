//! Static model catalog.

use serde::Serialize;

/// Default model for queries.
pub const DEFAULT_MODEL: &str = "glm-4.5";
/// Vision-capable model used to describe images when the selected model
/// cannot see them.
pub const VISION_FALLBACK_MODEL: &str = "glm-4v-plus";

/// One entry in the catalog.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct ModelDefinition {
    /// Wire identifier.
    pub id: &'static str,
    /// Human-readable name.
    pub display_name: &'static str,
    /// True when the model accepts image content blocks.
    pub supports_vision: bool,
    /// True when the model accepts the `thinking` request field.
    pub supports_thinking: bool,
}

/// The models this adapter knows about.
pub const MODELS: &[ModelDefinition] = &[
    ModelDefinition {
        id: "glm-4.5",
        display_name: "GLM-4.5",
        supports_vision: false,
        supports_thinking: true,
    },
    ModelDefinition {
        id: "glm-4.5-air",
        display_name: "GLM-4.5 Air",
        supports_vision: false,
        supports_thinking: true,
    },
    ModelDefinition {
        id: "glm-4v-plus",
        display_name: "GLM-4V Plus",
        supports_vision: true,
        supports_thinking: false,
    },
];

/// Looks a model up by wire id.
#[must_use]
pub fn find_model(id: &str) -> Option<&'static ModelDefinition> {
    MODELS.iter().find(|m| m.id == id)
}

/// Capability check by feature name. Unknown names are unsupported.
#[must_use]
pub fn supports_feature(name: &str) -> bool {
    match name {
        "streaming" | "tools" | "structured_output" => true,
        "vision" => MODELS.iter().any(|m| m.supports_vision),
        "thinking" => MODELS.iter().any(|m| m.supports_thinking),
        _ => false,
    }
}
