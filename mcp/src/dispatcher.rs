//! Tool dispatcher
//!
//! Resolves a tool by name, binds the caller's arguments against the
//! declared parameters, runs the handler where it is allowed to run, and
//! folds every outcome into an [`InvocationResult`]. Nothing a handler does
//! escapes this boundary.

use crate::affinity::panic_message;
use crate::context::ServerContext;
use crate::error::{McpError, Result};
use crate::protocol::{CallToolParams, CallToolResult, Content};
use crate::tool::{
    ArgValue, ParamType, ParameterSpec, ToolArguments, ToolDescriptor, ToolHandler, ToolOutput,
};
use serde_json::{Map, Value};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A decoded `tools/call`
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationRequest {
    pub tool_name: String,
    pub arguments: Map<String, Value>,
}

impl InvocationRequest {
    pub fn new(tool_name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments,
        }
    }

    /// Decode `tools/call` params; `arguments` must be an object when present
    pub fn from_params(params: CallToolParams) -> Result<Self> {
        let arguments = match params.arguments {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map,
            Some(other) => {
                return Err(McpError::InvalidArgument(format!(
                    "arguments must be an object, got {}",
                    json_type(&other)
                )))
            }
        };
        Ok(Self::new(params.name, arguments))
    }
}

/// Category of a dispatch failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    NotFound,
    InvalidArgument,
    HandlerError,
}

/// Outcome of one dispatch
#[derive(Debug, Clone, PartialEq)]
pub enum InvocationResult {
    Success(ToolOutput),
    Failure { kind: FailureKind, message: String },
}

impl InvocationResult {
    fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        InvocationResult::Failure {
            kind,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, InvocationResult::Success(_))
    }

    /// Encode for the wire
    ///
    /// Lookup and argument failures are protocol errors; handler failures
    /// travel in-band as an `isError` result.
    pub fn into_call_result(self, tool_name: &str) -> Result<CallToolResult> {
        match self {
            InvocationResult::Success(output) => {
                Ok(CallToolResult::success(vec![Content::text(output.into_text())]))
            }
            InvocationResult::Failure {
                kind: FailureKind::NotFound,
                ..
            } => Err(McpError::ToolNotFound(tool_name.to_string())),
            InvocationResult::Failure {
                kind: FailureKind::InvalidArgument,
                message,
            } => Err(McpError::InvalidArgument(message)),
            InvocationResult::Failure {
                kind: FailureKind::HandlerError,
                message,
            } => Ok(CallToolResult::failure(message)),
        }
    }
}

/// Routes invocations to tool handlers
#[derive(Clone)]
pub struct Dispatcher {
    context: Arc<ServerContext>,
}

impl Dispatcher {
    pub fn new(context: Arc<ServerContext>) -> Self {
        Self { context }
    }

    /// Decode, dispatch and encode a `tools/call`
    pub async fn call(&self, params: CallToolParams) -> Result<CallToolResult> {
        let request = InvocationRequest::from_params(params)?;
        let tool_name = request.tool_name.clone();
        self.dispatch(request).await.into_call_result(&tool_name)
    }

    /// Run one invocation to completion
    pub async fn dispatch(&self, request: InvocationRequest) -> InvocationResult {
        let descriptor = match self.context.registry.lookup(&request.tool_name) {
            Ok(descriptor) => descriptor,
            Err(_) => {
                warn!(tool = %request.tool_name, "Unknown tool");
                return InvocationResult::failure(
                    FailureKind::NotFound,
                    format!("unknown tool {}", request.tool_name),
                );
            }
        };

        let args = match bind_arguments(descriptor, &request.arguments) {
            Ok(args) => args,
            Err(message) => {
                warn!(tool = %descriptor.name, error = %message, "Rejected tool arguments");
                return InvocationResult::failure(FailureKind::InvalidArgument, message);
            }
        };

        info!(
            tool = %descriptor.name,
            host = descriptor.handler.needs_host_affinity(),
            "Calling tool"
        );

        match self.invoke(&descriptor.handler, args).await {
            Ok(output) => {
                debug!(tool = %descriptor.name, "Tool succeeded");
                InvocationResult::Success(output)
            }
            Err(message) => {
                warn!(tool = %descriptor.name, error = %message, "Tool handler failed");
                InvocationResult::failure(FailureKind::HandlerError, message)
            }
        }
    }

    async fn invoke(
        &self,
        handler: &ToolHandler,
        args: ToolArguments,
    ) -> std::result::Result<ToolOutput, String> {
        let outcome = match handler {
            ToolHandler::Pure(f) => catch_panic(|| f(&args)),
            ToolHandler::Backend(f) => {
                let backend = self.context.backend.as_ref();
                catch_panic(|| f(backend, &args))
            }
            ToolHandler::Host(f) => {
                let f = f.clone();
                let backend = self.context.backend.clone();
                match self.context.affinity.run(move || f(backend.as_ref(), &args)).await {
                    Ok(result) => Ok(result),
                    Err(McpError::Handler(message)) => Err(message),
                    Err(e) => Err(e.to_string()),
                }
            }
        };

        match outcome {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(format!("{:#}", e)),
            Err(message) => Err(message),
        }
    }
}

fn catch_panic<T>(f: impl FnOnce() -> T) -> std::result::Result<T, String> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| panic_message(payload.as_ref()))
}

/// Check presence and coerce every supplied argument
///
/// Returns the message for an `InvalidArgument` failure on the first problem.
pub fn bind_arguments(
    descriptor: &ToolDescriptor,
    supplied: &Map<String, Value>,
) -> std::result::Result<ToolArguments, String> {
    if let Some(unknown) = supplied.keys().find(|k| descriptor.parameter(k).is_none()) {
        return Err(format!(
            "unknown argument '{}' for tool {}",
            unknown, descriptor.name
        ));
    }

    let mut args = ToolArguments::new();
    for spec in &descriptor.parameters {
        match supplied.get(&spec.name) {
            None | Some(Value::Null) => {
                if spec.required {
                    return Err(format!("missing required parameter '{}'", spec.name));
                }
            }
            Some(value) => {
                args.insert(spec.name.clone(), coerce(spec, value)?);
            }
        }
    }
    Ok(args)
}

fn coerce(spec: &ParameterSpec, value: &Value) -> std::result::Result<ArgValue, String> {
    let coerced = match (spec.ty, value) {
        (ParamType::String, Value::String(s)) => Some(ArgValue::String(s.clone())),
        (ParamType::Number, Value::Number(n)) => n.as_f64().map(ArgValue::Number),
        (ParamType::Number, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map(ArgValue::Number),
        (ParamType::Integer, Value::Number(n)) => n
            .as_i64()
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                    .map(|f| f as i64)
            })
            .map(ArgValue::Integer),
        (ParamType::Integer, Value::String(s)) => {
            s.trim().parse::<i64>().ok().map(ArgValue::Integer)
        }
        (ParamType::Boolean, Value::Bool(b)) => Some(ArgValue::Boolean(*b)),
        (ParamType::Boolean, Value::String(s)) => match s.as_str() {
            "true" => Some(ArgValue::Boolean(true)),
            "false" => Some(ArgValue::Boolean(false)),
            _ => None,
        },
        (ParamType::StringArray, Value::Array(items)) => items
            .iter()
            .map(|item| item.as_str().map(String::from))
            .collect::<Option<Vec<_>>>()
            .map(ArgValue::StringArray),
        _ => None,
    };

    coerced.ok_or_else(|| {
        format!(
            "parameter '{}' expects {}, got {}",
            spec.name,
            spec.ty,
            json_type(value)
        )
    })
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::WorkspaceBackend;
    use crate::context::HOST_THREAD_NAME;
    use crate::registry::ToolRegistry;
    use crate::tool::{ParamType, ParameterSpec};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct Fixture {
        dispatcher: Dispatcher,
        calls: Arc<AtomicUsize>,
        _dir: TempDir,
    }

    fn fixture() -> Fixture {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let tools = vec![
            ToolDescriptor::new(
                "Add",
                "Adds two numbers",
                ToolHandler::pure(move |args| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(format!("{}", args.number("a")? + args.number("b")?).into())
                }),
            )
            .param(ParameterSpec::required("a", ParamType::Number, "left"))
            .param(ParameterSpec::required("b", ParamType::Number, "right"))
            .param(ParameterSpec::optional("label", ParamType::String, "label")),
            ToolDescriptor::new(
                "Fail",
                "Always fails",
                ToolHandler::pure(|_| anyhow::bail!("disk on fire")),
            ),
            ToolDescriptor::new(
                "Panic",
                "Always panics",
                ToolHandler::pure(|_| panic!("handler exploded")),
            ),
            ToolDescriptor::new(
                "WhereAmI",
                "Reports the executing thread",
                ToolHandler::host(|_, _| {
                    Ok(std::thread::current().name().unwrap_or("?").to_string().into())
                }),
            ),
            ToolDescriptor::new(
                "Flags",
                "Typed parameters",
                ToolHandler::pure(|args| Ok(format!("{:?}", args.get("n")).into())),
            )
            .param(ParameterSpec::optional("n", ParamType::Integer, "count"))
            .param(ParameterSpec::optional("on", ParamType::Boolean, "switch"))
            .param(ParameterSpec::optional("names", ParamType::StringArray, "names")),
        ];

        let dir = TempDir::new().unwrap();
        let context = ServerContext::new(
            ToolRegistry::from_descriptors(tools).unwrap(),
            Arc::new(WorkspaceBackend::new(dir.path())),
        )
        .unwrap();

        Fixture {
            dispatcher: Dispatcher::new(Arc::new(context)),
            calls,
            _dir: dir,
        }
    }

    fn request(name: &str, args: Value) -> InvocationRequest {
        InvocationRequest::new(name, args.as_object().cloned().unwrap_or_default())
    }

    #[tokio::test]
    async fn test_success_wraps_payload() {
        let fx = fixture();
        let result = fx.dispatcher.dispatch(request("Add", json!({"a": 2, "b": 3}))).await;

        assert_eq!(result, InvocationResult::Success(ToolOutput::Text("5".to_string())));
        assert_eq!(fx.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_not_found() {
        let fx = fixture();
        let result = fx.dispatcher.dispatch(request("Nope", json!({}))).await;

        assert_eq!(
            result,
            InvocationResult::Failure {
                kind: FailureKind::NotFound,
                message: "unknown tool Nope".to_string()
            }
        );
        assert_eq!(fx.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_required_parameter_never_invokes() {
        let fx = fixture();
        let result = fx.dispatcher.dispatch(request("Add", json!({"a": 1}))).await;

        match result {
            InvocationResult::Failure { kind, message } => {
                assert_eq!(kind, FailureKind::InvalidArgument);
                assert!(message.contains("'b'"), "message should name the parameter: {}", message);
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(fx.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_type_mismatch_never_invokes() {
        let fx = fixture();
        let result = fx
            .dispatcher
            .dispatch(request("Add", json!({"a": "two", "b": 3})))
            .await;

        assert!(matches!(
            result,
            InvocationResult::Failure { kind: FailureKind::InvalidArgument, ref message }
                if message.contains("expects number, got string")
        ));
        assert_eq!(fx.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_numeric_strings_are_coerced() {
        let fx = fixture();
        let result = fx
            .dispatcher
            .dispatch(request("Add", json!({"a": "1.5", "b": 2})))
            .await;

        assert_eq!(result, InvocationResult::Success(ToolOutput::Text("3.5".to_string())));
    }

    #[tokio::test]
    async fn test_null_optional_is_absent_and_unknown_key_rejected() {
        let fx = fixture();

        let ok = fx
            .dispatcher
            .dispatch(request("Add", json!({"a": 1, "b": 1, "label": null})))
            .await;
        assert!(ok.is_success());

        let rejected = fx
            .dispatcher
            .dispatch(request("Add", json!({"a": 1, "b": 1, "c": 1})))
            .await;
        assert!(matches!(
            rejected,
            InvocationResult::Failure { kind: FailureKind::InvalidArgument, ref message }
                if message.contains("unknown argument 'c'")
        ));
    }

    #[tokio::test]
    async fn test_handler_error_is_caught() {
        let fx = fixture();
        let result = fx.dispatcher.dispatch(request("Fail", json!({}))).await;

        assert_eq!(
            result,
            InvocationResult::Failure {
                kind: FailureKind::HandlerError,
                message: "disk on fire".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_handler_panic_is_caught_and_dispatcher_survives() {
        let fx = fixture();

        let result = fx.dispatcher.dispatch(request("Panic", json!({}))).await;
        assert_eq!(
            result,
            InvocationResult::Failure {
                kind: FailureKind::HandlerError,
                message: "handler exploded".to_string()
            }
        );

        let next = fx.dispatcher.dispatch(request("Add", json!({"a": 1, "b": 1}))).await;
        assert!(next.is_success());
    }

    #[tokio::test]
    async fn test_host_handlers_run_on_affinity_thread() {
        let fx = fixture();
        let result = fx.dispatcher.dispatch(request("WhereAmI", json!({}))).await;

        assert_eq!(
            result,
            InvocationResult::Success(ToolOutput::Text(HOST_THREAD_NAME.to_string()))
        );
    }

    #[test]
    fn test_coercions() {
        let fx = fixture();
        let descriptor = fx.dispatcher.context.registry.lookup("Flags").unwrap();
        let bind = |v: Value| bind_arguments(descriptor, v.as_object().unwrap());

        let args = bind(json!({"n": "12", "on": "true", "names": ["a", "b"]})).unwrap();
        assert_eq!(args.get("n"), Some(&ArgValue::Integer(12)));
        assert_eq!(args.get("on"), Some(&ArgValue::Boolean(true)));
        assert_eq!(
            args.get("names"),
            Some(&ArgValue::StringArray(vec!["a".to_string(), "b".to_string()]))
        );

        assert_eq!(bind(json!({"n": 3.0})).unwrap().get("n"), Some(&ArgValue::Integer(3)));
        assert!(bind(json!({"n": 3.5})).is_err());
        assert!(bind(json!({"on": "yes"})).is_err());
        assert!(bind(json!({"names": ["a", 1]})).is_err());
    }

    #[tokio::test]
    async fn test_call_maps_failures_to_wire() {
        let fx = fixture();

        let err = fx
            .dispatcher
            .call(CallToolParams {
                name: "Nope".to_string(),
                arguments: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_jsonrpc().code, -32001);

        let err = fx
            .dispatcher
            .call(CallToolParams {
                name: "Add".to_string(),
                arguments: Some(json!([1, 2])),
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_jsonrpc().code, -32602);

        let handler_failure = fx
            .dispatcher
            .call(CallToolParams {
                name: "Fail".to_string(),
                arguments: Some(json!({})),
            })
            .await
            .unwrap();
        assert!(handler_failure.is_error);
        assert_eq!(handler_failure.content, vec![Content::text("disk on fire")]);
    }
}
