//! Generation options

use serde::{Deserialize, Serialize};

/// Options for a single generation call (provider-agnostic)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatOptions {
    /// Upstream model identifier (the model row's slug).
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,
}

impl ChatOptions {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn max_tokens(mut self, max: usize) -> Self {
        self.max_tokens = Some(max);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carries_only_model_and_token_cap() {
        let options = ChatOptions::new("gpt-4.1-mini").max_tokens(2048);
        assert_eq!(
            serde_json::to_value(&options).unwrap(),
            serde_json::json!({"model": "gpt-4.1-mini", "max_tokens": 2048})
        );
        assert_eq!(
            serde_json::to_value(ChatOptions::new("m")).unwrap(),
            serde_json::json!({"model": "m"})
        );
    }
}
