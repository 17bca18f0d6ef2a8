//! Tool system for handlers
//!
//! Tools are the only way a handler touches the session context outside of
//! handoff hooks. Each tool declares whether it mutates the context or is a
//! pure lookup, and the typed constructors on [`FunctionTool`] enforce that
//! declaration through the borrow they hand to the tool body.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use crate::context::SessionContext;
use crate::error::{AgentsError, Result};

/// Declared side-effect class of a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolEffect {
    MutatesContext,
    Lookup,
}

/// Result from a tool execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Text handed back to the model (or to the caller, when final)
    pub output: String,
    /// Whether this result ends the turn verbatim
    pub is_final: bool,
}

impl ToolResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            is_final: false,
        }
    }

    pub fn final_output(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            is_final: true,
        }
    }
}

/// Trait for all tools that handlers can call
#[async_trait]
pub trait Tool: Send + Sync + Debug {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema for the tool's arguments
    fn parameters_schema(&self) -> Value;

    fn effect(&self) -> ToolEffect;

    /// Execute the tool against the session context
    async fn execute(&self, ctx: &mut SessionContext, arguments: Value) -> Result<ToolResult>;
}

/// Function descriptor handed to the inference collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolSpec {
    pub fn from_tool(tool: &dyn Tool) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            parameters: tool.parameters_schema(),
        }
    }
}

type ToolFn = dyn Fn(&mut SessionContext, Value) -> Result<String> + Send + Sync;

/// A function-based tool
#[derive(Clone)]
pub struct FunctionTool {
    name: String,
    description: String,
    parameters_schema: Value,
    effect: ToolEffect,
    final_output: bool,
    function: Arc<ToolFn>,
}

impl std::fmt::Debug for FunctionTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionTool")
            .field("name", &self.name)
            .field("effect", &self.effect)
            .field("final_output", &self.final_output)
            .finish()
    }
}

impl FunctionTool {
    /// Create a tool from raw JSON arguments.
    pub fn new<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters_schema: Value,
        effect: ToolEffect,
        function: F,
    ) -> Self
    where
        F: Fn(&mut SessionContext, Value) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters_schema,
            effect,
            final_output: false,
            function: Arc::new(function),
        }
    }

    /// A lookup tool that never sees the session context.
    pub fn lookup<A, F>(name: &str, description: &str, function: F) -> Self
    where
        A: DeserializeOwned + JsonSchema,
        F: Fn(A) -> Result<String> + Send + Sync + 'static,
    {
        let tool = name.to_string();
        Self::new(
            name,
            description,
            schema_for::<A>(),
            ToolEffect::Lookup,
            move |_ctx, args| function(parse_args(&tool, args)?),
        )
    }

    /// A lookup tool that reads the session context.
    pub fn reading<A, F>(name: &str, description: &str, function: F) -> Self
    where
        A: DeserializeOwned + JsonSchema,
        F: Fn(&SessionContext, A) -> Result<String> + Send + Sync + 'static,
    {
        let tool = name.to_string();
        Self::new(
            name,
            description,
            schema_for::<A>(),
            ToolEffect::Lookup,
            move |ctx, args| function(&*ctx, parse_args(&tool, args)?),
        )
    }

    /// A tool that may write to the session context.
    pub fn mutating<A, F>(name: &str, description: &str, function: F) -> Self
    where
        A: DeserializeOwned + JsonSchema,
        F: Fn(&mut SessionContext, A) -> Result<String> + Send + Sync + 'static,
    {
        let tool = name.to_string();
        Self::new(
            name,
            description,
            schema_for::<A>(),
            ToolEffect::MutatesContext,
            move |ctx, args| function(ctx, parse_args(&tool, args)?),
        )
    }

    /// Mark the tool's output as ending the turn verbatim.
    pub fn with_final_output(mut self) -> Self {
        self.final_output = true;
        self
    }
}

#[async_trait]
impl Tool for FunctionTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        self.parameters_schema.clone()
    }

    fn effect(&self) -> ToolEffect {
        self.effect
    }

    async fn execute(&self, ctx: &mut SessionContext, arguments: Value) -> Result<ToolResult> {
        let output = (self.function)(ctx, arguments)?;
        Ok(ToolResult {
            output,
            is_final: self.final_output,
        })
    }
}

fn parse_args<A: DeserializeOwned>(tool: &str, args: Value) -> Result<A> {
    let args = if args.is_null() {
        Value::Object(Default::default())
    } else {
        args
    };
    serde_json::from_value(args).map_err(|e| AgentsError::ToolExecutionError {
        tool: tool.to_string(),
        message: format!("invalid arguments: {e}"),
    })
}

fn schema_for<A: JsonSchema>() -> Value {
    serde_json::to_value(schemars::schema_for!(A))
        .unwrap_or_else(|_| serde_json::json!({"type": "object"}))
}

/// Process-wide set of tools, keyed by name.
///
/// The registry is global; which tools a handler may call is decided by the
/// handler's own tool list and enforced by the dispatch loop.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool. Re-registering the same instance is a no-op; a
    /// different tool under an existing name is rejected.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        if let Some(existing) = self.tools.get(tool.name()) {
            if Arc::ptr_eq(existing, &tool) {
                return Ok(());
            }
            return Err(AgentsError::InvalidGraph {
                message: format!("two different tools share the name '{}'", tool.name()),
            });
        }
        self.tools.insert(tool.name().to_string(), tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub async fn invoke(
        &self,
        name: &str,
        ctx: &mut SessionContext,
        arguments: Value,
    ) -> Result<ToolResult> {
        let tool = self.get(name).ok_or_else(|| AgentsError::UnknownTool {
            handler: "tool registry".to_string(),
            tool: name.to_string(),
        })?;
        tool.execute(ctx, arguments).await
    }
}
