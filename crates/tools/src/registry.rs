use std::{collections::BTreeMap, sync::Arc};

use {
    async_trait::async_trait,
    serde::Serialize,
    serde_json::{Value, json},
    tracing::{info, warn},
};

use crate::error::Result;

/// Text result of a tool call. `is_error` is set for failures the caller
/// should see as such; the text is always populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolOutput {
    pub text: String,
    pub is_error: bool,
}

impl ToolOutput {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    #[must_use]
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }
}

/// Gateway-callable tool.
#[async_trait]
pub trait GatewayTool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> Value;
    async fn execute(&self, params: Value) -> Result<ToolOutput>;
}

/// Registry of the tools exposed to clients.
///
/// Tools are stored as `Arc<dyn GatewayTool>` so a call can run on its own
/// task without borrowing the registry. Iteration is by name.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn GatewayTool>>,
}

impl ToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Box<dyn GatewayTool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::from(tool));
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn GatewayTool>> {
        self.tools.get(name).map(Arc::clone)
    }

    /// `{name, description, inputSchema}` per tool, sorted by name.
    #[must_use]
    pub fn list_schemas(&self) -> Vec<Value> {
        self.tools
            .values()
            .map(|t| {
                json!({
                    "name": t.name(),
                    "description": t.description(),
                    "inputSchema": t.parameters_schema(),
                })
            })
            .collect()
    }

    #[must_use]
    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Run a tool. Errors are rendered into an error output, so the only
    /// `None` is an unknown tool name.
    pub async fn call(&self, name: &str, params: Value) -> Option<ToolOutput> {
        let tool = self.get(name)?;
        let output = match tool.execute(params).await {
            Ok(output) => output,
            Err(e) => {
                warn!(tool = name, kind = %e.kind(), error = %e, "tool call failed");
                ToolOutput::error(e.render())
            },
        };
        info!(tool = name, is_error = output.is_error, "tool call finished");
        Some(output)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, crate::error::Error};

    struct Echo(&'static str);

    #[async_trait]
    impl GatewayTool for Echo {
        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "echo"
        }

        fn parameters_schema(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }

        async fn execute(&self, params: Value) -> Result<ToolOutput> {
            match params.get("fail").and_then(Value::as_bool) {
                Some(true) => Err(Error::invalid("asked to fail")),
                _ => Ok(ToolOutput::text(self.0)),
            }
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(Echo("zeta")));
        registry.register(Box::new(Echo("alpha")));
        registry
    }

    #[test]
    fn schemas_are_sorted_by_name() {
        let names: Vec<Value> = registry()
            .list_schemas()
            .into_iter()
            .map(|s| s["name"].clone())
            .collect();
        assert_eq!(names, [json!("alpha"), json!("zeta")]);
    }

    #[tokio::test]
    async fn errors_become_flagged_output() {
        let output = registry()
            .call("alpha", json!({"fail": true}))
            .await
            .unwrap();
        assert!(output.is_error);
        assert_eq!(output.text, "Invalid parameters: asked to fail");
    }

    #[tokio::test]
    async fn unknown_tool_is_none() {
        assert!(registry().call("nope", json!({})).await.is_none());
    }
}
