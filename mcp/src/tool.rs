//! Tool descriptors
//!
//! A tool is a name, a description, an ordered parameter list and a handler.
//! Handlers receive arguments that the dispatcher has already checked and
//! coerced against the parameter list.

use crate::backend::ToolBackend;
use crate::protocol::ToolInfo;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Declared type of a tool parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Number,
    Integer,
    Boolean,
    StringArray,
}

impl ParamType {
    /// JSON Schema fragment for this type
    pub fn schema(&self) -> Value {
        match self {
            ParamType::String => json!({"type": "string"}),
            ParamType::Number => json!({"type": "number"}),
            ParamType::Integer => json!({"type": "integer"}),
            ParamType::Boolean => json!({"type": "boolean"}),
            ParamType::StringArray => json!({"type": "array", "items": {"type": "string"}}),
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamType::String => "string",
            ParamType::Number => "number",
            ParamType::Integer => "integer",
            ParamType::Boolean => "boolean",
            ParamType::StringArray => "array of strings",
        };
        f.write_str(name)
    }
}

/// One declared parameter
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    pub name: String,
    pub ty: ParamType,
    pub description: Option<String>,
    pub required: bool,
}

impl ParameterSpec {
    /// A required parameter
    pub fn required(
        name: impl Into<String>,
        ty: ParamType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            ty,
            description: Some(description.into()),
            required: true,
        }
    }

    /// An optional parameter
    pub fn optional(
        name: impl Into<String>,
        ty: ParamType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            ty,
            description: Some(description.into()),
            required: false,
        }
    }
}

/// A coerced argument value
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    String(String),
    Number(f64),
    Integer(i64),
    Boolean(bool),
    StringArray(Vec<String>),
}

/// Arguments after validation, keyed by parameter name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArguments {
    values: HashMap<String, ArgValue>,
}

impl ToolArguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ArgValue) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// String argument; errors if absent or of another type
    pub fn str(&self, name: &str) -> anyhow::Result<&str> {
        match self.values.get(name) {
            Some(ArgValue::String(s)) => Ok(s),
            Some(other) => anyhow::bail!("argument '{}' is not a string: {:?}", name, other),
            None => anyhow::bail!("missing argument '{}'", name),
        }
    }

    /// Number argument; integers widen to f64
    pub fn number(&self, name: &str) -> anyhow::Result<f64> {
        match self.values.get(name) {
            Some(ArgValue::Number(n)) => Ok(*n),
            Some(ArgValue::Integer(n)) => Ok(*n as f64),
            Some(other) => anyhow::bail!("argument '{}' is not a number: {:?}", name, other),
            None => anyhow::bail!("missing argument '{}'", name),
        }
    }
}

/// What a handler hands back
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Text(String),
    List(Vec<String>),
}

impl ToolOutput {
    /// Text rendering used for the wire
    pub fn into_text(self) -> String {
        match self {
            ToolOutput::Text(text) => text,
            ToolOutput::List(items) => Value::from(items).to_string(),
        }
    }
}

impl From<String> for ToolOutput {
    fn from(text: String) -> Self {
        ToolOutput::Text(text)
    }
}

impl From<&str> for ToolOutput {
    fn from(text: &str) -> Self {
        ToolOutput::Text(text.to_string())
    }
}

impl From<Vec<String>> for ToolOutput {
    fn from(items: Vec<String>) -> Self {
        ToolOutput::List(items)
    }
}

type PureFn = dyn Fn(&ToolArguments) -> anyhow::Result<ToolOutput> + Send + Sync;
type BackendFn =
    dyn Fn(&dyn ToolBackend, &ToolArguments) -> anyhow::Result<ToolOutput> + Send + Sync;

/// Handler reference, tagged with where it must run
#[derive(Clone)]
pub enum ToolHandler {
    /// Pure computation; runs on the dispatch loop
    Pure(Arc<PureFn>),
    /// Uses the backend without touching host-owned state; runs on the dispatch loop
    Backend(Arc<BackendFn>),
    /// Touches host-owned state; marshalled onto the affinity executor
    Host(Arc<BackendFn>),
}

impl ToolHandler {
    pub fn pure<F>(f: F) -> Self
    where
        F: Fn(&ToolArguments) -> anyhow::Result<ToolOutput> + Send + Sync + 'static,
    {
        ToolHandler::Pure(Arc::new(f))
    }

    pub fn backend<F>(f: F) -> Self
    where
        F: Fn(&dyn ToolBackend, &ToolArguments) -> anyhow::Result<ToolOutput>
            + Send
            + Sync
            + 'static,
    {
        ToolHandler::Backend(Arc::new(f))
    }

    pub fn host<F>(f: F) -> Self
    where
        F: Fn(&dyn ToolBackend, &ToolArguments) -> anyhow::Result<ToolOutput>
            + Send
            + Sync
            + 'static,
    {
        ToolHandler::Host(Arc::new(f))
    }

    /// Whether invocation must go through the affinity executor
    pub fn needs_host_affinity(&self) -> bool {
        matches!(self, ToolHandler::Host(_))
    }
}

impl fmt::Debug for ToolHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            ToolHandler::Pure(_) => "Pure",
            ToolHandler::Backend(_) => "Backend",
            ToolHandler::Host(_) => "Host",
        };
        write!(f, "ToolHandler::{}", kind)
    }
}

/// A registered tool
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: Option<String>,
    pub parameters: Vec<ParameterSpec>,
    pub handler: ToolHandler,
}

impl ToolDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        handler: ToolHandler,
    ) -> Self {
        Self {
            name: name.into(),
            description: Some(description.into()),
            parameters: Vec::new(),
            handler,
        }
    }

    /// Append a parameter, keeping declaration order
    pub fn param(mut self, spec: ParameterSpec) -> Self {
        self.parameters.push(spec);
        self
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// JSON Schema describing the arguments object
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for param in &self.parameters {
            let mut schema = param.ty.schema();
            if let (Some(description), Some(obj)) = (&param.description, schema.as_object_mut()) {
                obj.insert("description".to_string(), Value::String(description.clone()));
            }
            properties.insert(param.name.clone(), schema);
            if param.required {
                required.push(Value::String(param.name.clone()));
            }
        }

        let mut schema = Map::new();
        schema.insert("type".to_string(), Value::String("object".to_string()));
        schema.insert("properties".to_string(), Value::Object(properties));
        if !required.is_empty() {
            schema.insert("required".to_string(), Value::Array(required));
        }
        Value::Object(schema)
    }

    /// Client-facing listing entry
    pub fn info(&self) -> ToolInfo {
        ToolInfo {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema(),
        }
    }
}
