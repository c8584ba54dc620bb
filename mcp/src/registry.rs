//! Tool registry
//!
//! Built once at start-up through [`ToolRegistryBuilder`] and read-only
//! afterwards, so lookups need no locking.

use crate::error::{McpError, Result};
use crate::protocol::ToolInfo;
use crate::tool::ToolDescriptor;
use std::collections::HashMap;
use tracing::debug;

/// Collects descriptors before the registry is frozen
#[derive(Debug, Default)]
pub struct ToolRegistryBuilder {
    tools: Vec<ToolDescriptor>,
    by_name: HashMap<String, usize>,
}

impl ToolRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool; names must be unique
    pub fn register(&mut self, descriptor: ToolDescriptor) -> Result<&mut Self> {
        if self.by_name.contains_key(&descriptor.name) {
            return Err(McpError::DuplicateTool(descriptor.name));
        }

        debug!(tool = %descriptor.name, params = descriptor.parameters.len(), "Registering tool");
        self.by_name.insert(descriptor.name.clone(), self.tools.len());
        self.tools.push(descriptor);
        Ok(self)
    }

    /// Register every descriptor in order, stopping at the first duplicate
    pub fn register_all(
        &mut self,
        descriptors: impl IntoIterator<Item = ToolDescriptor>,
    ) -> Result<&mut Self> {
        for descriptor in descriptors {
            self.register(descriptor)?;
        }
        Ok(self)
    }

    pub fn build(self) -> ToolRegistry {
        ToolRegistry {
            tools: self.tools,
            by_name: self.by_name,
        }
    }
}

/// Immutable catalogue of tools
#[derive(Debug)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
    by_name: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::new()
    }

    /// Build a registry from a fixed list of descriptors
    pub fn from_descriptors(descriptors: impl IntoIterator<Item = ToolDescriptor>) -> Result<Self> {
        let mut builder = Self::builder();
        builder.register_all(descriptors)?;
        Ok(builder.build())
    }

    /// All tools in registration order
    pub fn list(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    /// Get a tool by name
    pub fn lookup(&self, name: &str) -> Result<&ToolDescriptor> {
        self.by_name
            .get(name)
            .map(|&idx| &self.tools[idx])
            .ok_or_else(|| McpError::ToolNotFound(name.to_string()))
    }

    /// Client-facing listing, in registration order
    pub fn infos(&self) -> Vec<ToolInfo> {
        self.tools.iter().map(ToolDescriptor::info).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{ParamType, ParameterSpec, ToolHandler};

    fn tool(name: &str) -> ToolDescriptor {
        ToolDescriptor::new(name, format!("{} tool", name), ToolHandler::pure(|_| Ok("ok".into())))
            .param(ParameterSpec::required("text", ParamType::String, "input"))
    }

    #[test]
    fn test_lookup_returns_registered_descriptor() {
        let registry =
            ToolRegistry::from_descriptors(vec![tool("Echo"), tool("CountWords")]).unwrap();

        let found = registry.lookup("CountWords").unwrap();
        assert_eq!(found.name, "CountWords");
        assert_eq!(found.description.as_deref(), Some("CountWords tool"));
        assert_eq!(found.parameters[0].name, "text");
    }

    #[test]
    fn test_lookup_unknown_is_not_found() {
        let registry = ToolRegistry::from_descriptors(vec![tool("Echo")]).unwrap();

        let err = registry.lookup("echo").unwrap_err();
        assert!(matches!(err, McpError::ToolNotFound(name) if name == "echo"));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut builder = ToolRegistry::builder();
        builder.register(tool("Echo")).unwrap();

        let err = builder.register(tool("Echo")).unwrap_err();
        assert!(matches!(err, McpError::DuplicateTool(name) if name == "Echo"));

        // The first registration survives
        assert_eq!(builder.build().len(), 1);
    }

    #[test]
    fn test_list_preserves_registration_order() {
        let names = ["Zeta", "Alpha", "Mid", "Beta"];
        let registry = ToolRegistry::from_descriptors(names.iter().map(|n| tool(n))).unwrap();

        for _ in 0..3 {
            let listed: Vec<&str> = registry.list().iter().map(|t| t.name.as_str()).collect();
            assert_eq!(listed, names);
        }

        let infos: Vec<String> = registry.infos().into_iter().map(|i| i.name).collect();
        assert_eq!(infos, names);
    }
}
