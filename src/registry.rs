//! Tool registry: capabilities keyed by stable string identifiers.
//!
//! The Action phase resolves tool names through this registry at dispatch
//! time; unknown names fail closed with [`ToolError::Unknown`]. The registry
//! is read-only during a run and may be shared across concurrent runs behind
//! an `Arc`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Failure detail captured from a tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Error)]
#[error("{detail}")]
pub struct ToolFailure {
    pub detail: String,
}

impl ToolFailure {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

/// A callable capability invokable by the Action phase.
///
/// Implemented for any `Fn(&Value) -> Result<Value, ToolFailure>` closure, so
/// plain functions register directly.
pub trait Tool: Send + Sync {
    fn invoke(&self, parameters: &Value) -> Result<Value, ToolFailure>;
}

impl<F> Tool for F
where
    F: Fn(&Value) -> Result<Value, ToolFailure> + Send + Sync,
{
    fn invoke(&self, parameters: &Value) -> Result<Value, ToolFailure> {
        self(parameters)
    }
}

/// Name and description of a registered tool, as offered to the reasoning
/// provider when assembling the cognition prompt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Error)]
pub enum ToolError {
    /// A missing tool is a configuration defect, not a transient condition:
    /// it is reported, never retried.
    #[error("Tool '{name}' is not registered")]
    Unknown { name: String },

    #[error("Tool '{name}' failed: {failure}")]
    Invocation {
        name: String,
        #[source]
        failure: ToolFailure,
    },
}

struct RegisteredTool {
    capability: Box<dyn Tool>,
    description: String,
}

/// Capability map keyed by stable tool names.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a capability under `name`. A later registration under the
    /// same name replaces the earlier one.
    pub fn register<T: Tool + 'static>(&mut self, name: &str, capability: T, description: &str) {
        self.tools.insert(
            name.to_string(),
            RegisteredTool {
                capability: Box::new(capability),
                description: description.to_string(),
            },
        );
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Descriptors for every registered tool, in name order.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools
            .iter()
            .map(|(name, t)| ToolDescriptor {
                name: name.clone(),
                description: t.description.clone(),
            })
            .collect()
    }

    /// Invoke `name` with `parameters`. Unknown names fail closed.
    pub fn invoke(&self, name: &str, parameters: &Value) -> Result<Value, ToolError> {
        let tool = self.tools.get(name).ok_or_else(|| ToolError::Unknown {
            name: name.to_string(),
        })?;
        tool.capability
            .invoke(parameters)
            .map_err(|failure| ToolError::Invocation {
                name: name.to_string(),
                failure,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo(parameters: &Value) -> Result<Value, ToolFailure> {
        Ok(json!({"echo": parameters}))
    }

    #[test]
    fn test_register_and_invoke() {
        let mut registry = ToolRegistry::new();
        registry.register("echo", echo, "Echo parameters back");

        let result = registry.invoke("echo", &json!({"x": 1})).unwrap();
        assert_eq!(result, json!({"echo": {"x": 1}}));
    }

    #[test]
    fn test_unknown_tool_fails_closed() {
        let registry = ToolRegistry::new();
        let err = registry.invoke("missing", &json!(null)).unwrap_err();
        match err {
            ToolError::Unknown { name } => assert_eq!(name, "missing"),
            _ => panic!("Expected Unknown"),
        }
    }

    #[test]
    fn test_invocation_failure_is_captured() {
        let mut registry = ToolRegistry::new();
        registry.register(
            "flaky",
            |_: &Value| Err(ToolFailure::new("upstream unavailable")),
            "Always fails",
        );

        let err = registry.invoke("flaky", &json!(null)).unwrap_err();
        match err {
            ToolError::Invocation { name, failure } => {
                assert_eq!(name, "flaky");
                assert_eq!(failure.detail, "upstream unavailable");
            }
            _ => panic!("Expected Invocation"),
        }
    }

    #[test]
    fn test_descriptors_in_name_order() {
        let mut registry = ToolRegistry::new();
        registry.register("send_email", echo, "Send an email");
        registry.register("get_weather", echo, "Fetch weather");

        let descriptors = registry.descriptors();
        assert_eq!(descriptors.len(), 2);
        assert_eq!(descriptors[0].name, "get_weather");
        assert_eq!(descriptors[1].name, "send_email");
    }
}
