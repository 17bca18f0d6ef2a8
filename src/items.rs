//! Items representing messages, tool calls, and model responses
//!
//! This module defines the conversation records exchanged between the
//! dispatch loop, the inference collaborator, and the session history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Role in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A message in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_call_id: None,
            tool_calls: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    pub fn assistant_with_tool_calls(
        content: impl Into<String>,
        tool_calls: Vec<ToolCall>,
    ) -> Self {
        Self {
            tool_calls: Some(tool_calls),
            ..Self::with_role(Role::Assistant, content)
        }
    }

    pub fn tool(content: impl Into<String>, tool_call_id: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::with_role(Role::Tool, content)
        }
    }

    /// True for plain user turns (the only input the validation gate judges).
    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }
}

/// A tool call made by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: format!("call_{}", Uuid::new_v4().simple()),
            name: name.into(),
            arguments,
        }
    }
}

/// Response from the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResponse {
    pub id: String,
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ModelResponse {
    pub fn new_message(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: Some(content.into()),
            tool_calls: vec![],
            finish_reason: Some("stop".to_string()),
            created_at: Utc::now(),
        }
    }

    pub fn new_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: None,
            tool_calls,
            finish_reason: Some("tool_calls".to_string()),
            created_at: Utc::now(),
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    pub fn has_content(&self) -> bool {
        self.content.as_deref().is_some_and(|c| !c.is_empty())
    }
}

/// A run item representing a single step taken while processing a turn
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RunItem {
    Message(MessageItem),
    ToolCall(ToolCallItem),
    ToolOutput(ToolOutputItem),
    Handoff(HandoffItem),
    GateTrip(GateTripItem),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageItem {
    pub id: String,
    pub handler: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallItem {
    pub id: String,
    pub handler: String,
    pub tool_name: String,
    pub arguments: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutputItem {
    pub id: String,
    pub tool_call_id: String,
    pub tool_name: String,
    pub output: String,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoffItem {
    pub id: String,
    pub from_agent: String,
    pub to_agent: String,
    pub hook_ran: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateTripItem {
    pub id: String,
    pub handler: String,
    pub checker: String,
    pub reasoning: String,
    pub created_at: DateTime<Utc>,
}

impl RunItem {
    pub(crate) fn message(handler: &str, role: Role, content: impl Into<String>) -> Self {
        RunItem::Message(MessageItem {
            id: Uuid::new_v4().to_string(),
            handler: handler.to_string(),
            role,
            content: content.into(),
            created_at: Utc::now(),
        })
    }

    pub(crate) fn tool_call(handler: &str, call: &ToolCall) -> Self {
        RunItem::ToolCall(ToolCallItem {
            id: call.id.clone(),
            handler: handler.to_string(),
            tool_name: call.name.clone(),
            arguments: call.arguments.clone(),
            created_at: Utc::now(),
        })
    }

    pub(crate) fn tool_output(
        call: &ToolCall,
        output: impl Into<String>,
        error: Option<String>,
    ) -> Self {
        RunItem::ToolOutput(ToolOutputItem {
            id: Uuid::new_v4().to_string(),
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            output: output.into(),
            error,
            created_at: Utc::now(),
        })
    }

    pub(crate) fn handoff(from: &str, to: &str, hook_ran: bool) -> Self {
        RunItem::Handoff(HandoffItem {
            id: Uuid::new_v4().to_string(),
            from_agent: from.to_string(),
            to_agent: to.to_string(),
            hook_ran,
            created_at: Utc::now(),
        })
    }

    pub(crate) fn gate_trip(handler: &str, checker: &str, reasoning: &str) -> Self {
        RunItem::GateTrip(GateTripItem {
            id: Uuid::new_v4().to_string(),
            handler: handler.to_string(),
            checker: checker.to_string(),
            reasoning: reasoning.to_string(),
            created_at: Utc::now(),
        })
    }
}
