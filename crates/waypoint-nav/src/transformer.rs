//! Serialization of dehydrated router state

use anyhow::{Context, Result};
use serde_json::Value;

/// Turns loader data into a transferable string and back
pub trait Transformer: Send + Sync {
    fn stringify(&self, value: &Value) -> Result<String>;

    fn parse(&self, input: &str) -> Result<Value>;
}

/// Plain JSON
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonTransformer;

impl Transformer for JsonTransformer {
    fn stringify(&self, value: &Value) -> Result<String> {
        serde_json::to_string(value).context("Failed to serialize dehydrated value")
    }

    fn parse(&self, input: &str) -> Result<Value> {
        serde_json::from_str(input).context("Failed to parse dehydrated value")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_transformer() {
        let transformer = JsonTransformer;
        let text = transformer.stringify(&json!({"title": "hello"})).unwrap();
        assert_eq!(text, r#"{"title":"hello"}"#);
        assert_eq!(transformer.parse(&text).unwrap(), json!({"title": "hello"}));
    }

    #[test]
    fn test_parse_error_has_context() {
        let error = JsonTransformer.parse("{not json").unwrap_err();
        assert!(error.to_string().contains("Failed to parse dehydrated value"));
    }
}
