//! Model descriptors and capability detection.

use serde::{Deserialize, Serialize};

/// Name fragments of model families known to handle tool calling.
const TOOL_CAPABLE_FAMILIES: [&str; 4] = ["llama3", "mixtral", "phi3", "gemma"];

/// Model families that accept image input.
const VISION_FAMILIES: [&str; 2] = ["clip", "mllama"];

/// A model served by the backend, with what it can do.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LanguageModel {
    pub name: String,
    pub supports_images: bool,
    pub supports_tools: bool,
}

impl LanguageModel {
    /// Describe a model known only by name.
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            supports_tools: supports_tools(&name),
            supports_images: false,
            name,
        }
    }

    /// Describe a model from its name and reported families.
    pub fn from_families<S: AsRef<str>>(name: impl Into<String>, families: &[S]) -> Self {
        Self {
            supports_images: supports_images(families),
            ..Self::named(name)
        }
    }

    pub fn with_tools(mut self, supports_tools: bool) -> Self {
        self.supports_tools = supports_tools;
        self
    }
}

impl std::fmt::Display for LanguageModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

impl From<&str> for LanguageModel {
    fn from(name: &str) -> Self {
        Self::named(name)
    }
}

impl From<String> for LanguageModel {
    fn from(name: String) -> Self {
        Self::named(name)
    }
}

/// Whether a model name belongs to a tool-capable family.
pub fn supports_tools(name: &str) -> bool {
    let lower = name.to_lowercase();
    TOOL_CAPABLE_FAMILIES.iter().any(|family| lower.contains(family))
}

/// Whether any reported family is a vision encoder.
pub fn supports_images<S: AsRef<str>>(families: &[S]) -> bool {
    families
        .iter()
        .any(|family| VISION_FAMILIES.contains(&family.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_support_is_detected_by_name() {
        assert!(supports_tools("llama3.2:latest"));
        assert!(supports_tools("Mixtral:8x7b"));
        assert!(!supports_tools("mistral:7b"));
        assert!(LanguageModel::named("gemma2:9b").supports_tools);
    }

    #[test]
    fn image_support_comes_from_families() {
        let llava = LanguageModel::from_families("llava:13b", &["llama", "clip"]);
        assert!(llava.supports_images);
        assert!(!llava.supports_tools);
        let plain = LanguageModel::from_families("qwen2:7b", &["qwen2"]);
        assert!(!plain.supports_images);
        let none: [&str; 0] = [];
        assert!(!supports_images(&none));
    }
}
