//! Tool registry: registration, discovery, dispatch and argument binding

use async_trait::async_trait;
use gabp_core::{GabpError, Result, ToolDescriptor, ToolParameter};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};

/// A callable tool exposed to the bridge.
///
/// Handlers receive the raw `arguments` JSON of a `tools/call` request
/// and run without any registry lock held, so they may block freely.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, args: Value) -> Result<Value>;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> ToolHandler for FnHandler<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value>> + Send,
{
    async fn call(&self, args: Value) -> Result<Value> {
        (self.0)(args).await
    }
}

/// Handler adapter that binds raw arguments against a parameter list
/// and round-trips them into a native params struct.
///
/// This is the declarative stand-in for the annotated-method binding
/// of other GABP implementations: the descriptor's parameter list
/// drives per-parameter defaulting and type checking, then serde does
/// the JSON-to-native conversion at the boundary.
struct TypedHandler<P, F> {
    parameters: Vec<ToolParameter>,
    f: F,
    _params: std::marker::PhantomData<fn() -> P>,
}

#[async_trait]
impl<P, R, F, Fut> ToolHandler for TypedHandler<P, F>
where
    P: DeserializeOwned + Send,
    R: Serialize,
    F: Fn(P) -> Fut + Send + Sync,
    Fut: Future<Output = Result<R>> + Send,
{
    async fn call(&self, args: Value) -> Result<Value> {
        let bound = bind_arguments(&self.parameters, &args)?;
        let params: P = serde_json::from_value(Value::Object(bound))
            .map_err(|e| GabpError::Internal(format!("Argument binding failed: {}", e)))?;
        let result = (self.f)(params).await?;
        Ok(serde_json::to_value(result)?)
    }
}

/// Normalize raw call arguments against a parameter list.
///
/// Each formal parameter is looked up by name; a value of the wrong
/// JSON type, or an absent one, falls back to the declared default
/// (or null). `required` is advertisement metadata only: a required
/// parameter bound to null fails when the callable's params refuse
/// it, and that surfaces as a handler failure.
pub fn bind_arguments(parameters: &[ToolParameter], args: &Value) -> Result<Map<String, Value>> {
    let supplied = match args {
        Value::Object(map) => map.clone(),
        Value::Null => Map::new(),
        other => {
            return Err(GabpError::InvalidParams(format!(
                "Arguments must be an object, got {}",
                json_type_name(other)
            )))
        }
    };

    let mut bound = Map::new();
    for param in parameters {
        let value = match supplied.get(&param.name) {
            Some(value) if type_matches(&param.param_type, value) => value.clone(),
            _ => param.default.clone().unwrap_or(Value::Null),
        };
        bound.insert(param.name.clone(), value);
    }
    Ok(bound)
}

fn type_matches(param_type: &str, value: &Value) -> bool {
    match param_type {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        _ => true,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

struct RegisteredTool {
    descriptor: ToolDescriptor,
    handler: Arc<dyn ToolHandler>,
}

/// Registry of callable tools
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, RegisteredTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under a name; re-registering overwrites.
    ///
    /// When no descriptor is supplied one is synthesized with only the
    /// name populated.
    pub fn register(
        &self,
        name: &str,
        handler: Arc<dyn ToolHandler>,
        descriptor: Option<ToolDescriptor>,
    ) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(GabpError::InvalidParams(
                "Tool name must not be empty".into(),
            ));
        }

        let mut descriptor = descriptor.unwrap_or_else(|| ToolDescriptor::named(name));
        descriptor.name = name.to_string();

        let mut tools = self.tools.write().unwrap();
        tools.insert(name.to_string(), RegisteredTool { descriptor, handler });
        Ok(())
    }

    /// Register an async closure over raw arguments
    pub fn register_fn<F, Fut>(
        &self,
        name: &str,
        descriptor: Option<ToolDescriptor>,
        f: F,
    ) -> Result<()>
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        self.register(name, Arc::new(FnHandler(f)), descriptor)
    }

    /// Register an async function over a typed params struct.
    ///
    /// The descriptor's parameter list drives argument binding: raw
    /// arguments are normalized (defaults applied, types checked)
    /// before being deserialized into `P`.
    pub fn register_typed<P, R, F, Fut>(&self, descriptor: ToolDescriptor, f: F) -> Result<()>
    where
        P: DeserializeOwned + Send + 'static,
        R: Serialize + 'static,
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
    {
        let name = descriptor.name.clone();
        let handler = TypedHandler {
            parameters: descriptor.parameters.clone(),
            f,
            _params: std::marker::PhantomData::<fn() -> P>,
        };
        self.register(&name, Arc::new(handler), Some(descriptor))
    }

    /// Remove a tool; returns whether it existed
    pub fn unregister(&self, name: &str) -> bool {
        self.tools.write().unwrap().remove(name).is_some()
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.read().unwrap().contains_key(name)
    }

    /// All descriptors, sorted by name
    pub fn list(&self) -> Vec<ToolDescriptor> {
        let tools = self.tools.read().unwrap();
        let mut descriptors: Vec<ToolDescriptor> =
            tools.values().map(|t| t.descriptor.clone()).collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        descriptors
    }

    /// All tool names, sorted
    pub fn names(&self) -> Vec<String> {
        let tools = self.tools.read().unwrap();
        let mut names: Vec<String> = tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Invoke a tool by exact name with raw arguments.
    ///
    /// The handler is cloned out of the registry before the call so
    /// long-running handlers never hold the registry lock. Any handler
    /// failure is normalized to an internal error; only the lookup
    /// miss keeps its own code.
    pub async fn call(&self, name: &str, args: Value) -> Result<Value> {
        let handler = {
            let tools = self.tools.read().unwrap();
            tools
                .get(name)
                .map(|t| t.handler.clone())
                .ok_or_else(|| GabpError::ToolNotFound(name.to_string()))?
        };
        handler.call(args).await.map_err(|e| match e {
            GabpError::Internal(_) => e,
            other => GabpError::Internal(other.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    fn echo_registry() -> ToolRegistry {
        let registry = ToolRegistry::new();
        registry
            .register_fn("session/echo", None, |args| async move { Ok(args) })
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn test_register_and_call() {
        let registry = echo_registry();
        assert!(registry.has("session/echo"));
        let result = registry.call("session/echo", json!({"x": 1})).await.unwrap();
        assert_eq!(result, json!({"x": 1}));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let registry = echo_registry();
        let err = registry.call("no/such", json!(null)).await.unwrap_err();
        assert!(matches!(err, GabpError::ToolNotFound(_)));
        assert_eq!(err.code(), -31002);
    }

    #[test]
    fn test_empty_name_rejected() {
        let registry = ToolRegistry::new();
        let err = registry
            .register_fn("   ", None, |args| async move { Ok(args) })
            .unwrap_err();
        assert!(matches!(err, GabpError::InvalidParams(_)));
    }

    #[test]
    fn test_synthesized_descriptor() {
        let registry = echo_registry();
        let listed = registry.list();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "session/echo");
        assert!(listed[0].requires_auth);
        assert!(listed[0].parameters.is_empty());
    }

    #[tokio::test]
    async fn test_reregistration_overwrites() {
        let registry = ToolRegistry::new();
        registry
            .register_fn("t", None, |_| async move { Ok(json!(1)) })
            .unwrap();
        registry
            .register_fn("t", None, |_| async move { Ok(json!(2)) })
            .unwrap();
        assert_eq!(registry.call("t", json!(null)).await.unwrap(), json!(2));
        assert_eq!(registry.list().len(), 1);
    }

    #[test]
    fn test_list_sorted_by_name() {
        let registry = ToolRegistry::new();
        for name in ["world/place_block", "inventory/get", "math/add"] {
            registry
                .register_fn(name, None, |args| async move { Ok(args) })
                .unwrap();
        }
        let names: Vec<String> = registry.list().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["inventory/get", "math/add", "world/place_block"]);
    }

    #[test]
    fn test_bind_defaults_and_nulls() {
        let params = vec![
            ToolParameter::required("a", "integer"),
            ToolParameter::optional("b", "integer", json!(10)),
        ];

        let bound = bind_arguments(&params, &json!({"a": 5})).unwrap();
        assert_eq!(bound.get("a"), Some(&json!(5)));
        assert_eq!(bound.get("b"), Some(&json!(10)));

        // a required parameter without a default binds to null
        let bound = bind_arguments(&params, &json!({"b": 1})).unwrap();
        assert_eq!(bound.get("a"), Some(&Value::Null));
        assert_eq!(bound.get("b"), Some(&json!(1)));
    }

    #[test]
    fn test_bind_type_mismatch_falls_back_to_default() {
        let params = vec![ToolParameter::optional("count", "integer", json!(1))];
        let bound = bind_arguments(&params, &json!({"count": "three"})).unwrap();
        assert_eq!(bound.get("count"), Some(&json!(1)));

        // same rule for a required parameter: no default means null
        let params = vec![ToolParameter::required("count", "integer")];
        let bound = bind_arguments(&params, &json!({"count": "three"})).unwrap();
        assert_eq!(bound.get("count"), Some(&Value::Null));
    }

    #[test]
    fn test_bind_non_object_arguments_rejected() {
        let err = bind_arguments(&[], &json!([1, 2])).unwrap_err();
        assert!(matches!(err, GabpError::InvalidParams(_)));
    }

    #[tokio::test]
    async fn test_typed_tool() {
        #[derive(Deserialize)]
        struct AddParams {
            a: i64,
            b: i64,
        }

        let registry = ToolRegistry::new();
        let descriptor = ToolDescriptor::named("math/add")
            .with_description("Add two integers")
            .with_parameters(vec![
                ToolParameter::required("a", "integer"),
                ToolParameter::optional("b", "integer", json!(0)),
            ]);
        registry
            .register_typed(descriptor, |p: AddParams| async move { Ok(p.a + p.b) })
            .unwrap();

        let sum = registry
            .call("math/add", json!({"a": 5, "b": 3}))
            .await
            .unwrap();
        assert_eq!(sum, json!(8));

        // optional b defaults to 0
        let sum = registry.call("math/add", json!({"a": 7})).await.unwrap();
        assert_eq!(sum, json!(7));

        // missing required a binds to null, which the params struct
        // refuses; that is a handler failure
        let err = registry.call("math/add", json!({"b": 1})).await.unwrap_err();
        assert_eq!(err.code(), -32603);
    }

    #[tokio::test]
    async fn test_handler_failure_is_internal() {
        let registry = ToolRegistry::new();
        registry
            .register_fn("boom", None, |_| async move {
                Err::<Value, _>(GabpError::Internal("tool exploded".into()))
            })
            .unwrap();
        let err = registry.call("boom", json!(null)).await.unwrap_err();
        assert_eq!(err.code(), -32603);
        assert!(err.to_string().contains("tool exploded"));
    }

    #[tokio::test]
    async fn test_handler_failure_coerced_to_internal() {
        let registry = ToolRegistry::new();
        registry
            .register_fn("relay", None, |_| async move {
                Err::<Value, _>(GabpError::ToolNotFound("inner/lookup".into()))
            })
            .unwrap();
        let err = registry.call("relay", json!(null)).await.unwrap_err();
        assert_eq!(err.code(), -32603);
        assert!(err.to_string().contains("inner/lookup"));
    }

    #[test]
    fn test_unregister() {
        let registry = echo_registry();
        assert!(registry.unregister("session/echo"));
        assert!(!registry.unregister("session/echo"));
        assert!(!registry.has("session/echo"));
    }
}
