//! Error types for the airline desk

use thiserror::Error;

/// Result type alias used throughout the crate
pub type Result<T> = std::result::Result<T, AgentsError>;

/// Main error type for the airline desk
#[derive(Debug, Error)]
pub enum AgentsError {
    /// Error from the OpenAI API
    #[error("OpenAI API error: {0}")]
    OpenAIError(#[from] async_openai::error::OpenAIError),

    /// The inference collaborator failed or timed out
    #[error("Inference collaborator failure: {message}")]
    CollaboratorFailure { message: String },

    /// Too many model rounds within a single user turn
    #[error("Maximum turns exceeded: {max_turns}")]
    MaxTurnsExceeded { max_turns: usize },

    /// The model asked to hand off along an edge that is not in the graph
    #[error("Off-graph handoff requested: {from} -> {to}")]
    OffGraphHandoff { from: String, to: String },

    /// The model asked for a tool the active handler does not expose
    #[error("Unknown tool '{tool}' for handler '{handler}'")]
    UnknownTool { handler: String, tool: String },

    /// A tool's domain precondition is unmet
    #[error("Precondition violated in '{tool}': {message}")]
    PreconditionViolation { tool: String, message: String },

    /// Tool execution error (bad arguments and the like)
    #[error("Tool execution error in '{tool}': {message}")]
    ToolExecutionError { tool: String, message: String },

    /// Model behavior error
    #[error("Model behavior error: {message}")]
    ModelBehaviorError { message: String },

    /// The routing graph failed validation
    #[error("Invalid routing graph: {message}")]
    InvalidGraph { message: String },

    /// Session error
    #[error("Session error: {0}")]
    SessionError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl AgentsError {
    /// Protocol errors that abort the turn without retry.
    pub fn is_fatal_protocol_error(&self) -> bool {
        matches!(
            self,
            AgentsError::OffGraphHandoff { .. }
                | AgentsError::UnknownTool { .. }
                | AgentsError::PreconditionViolation { .. }
        )
    }

    /// Whether the error came from the inference call itself.
    pub fn is_collaborator_failure(&self) -> bool {
        matches!(
            self,
            AgentsError::OpenAIError(_) | AgentsError::CollaboratorFailure { .. }
        )
    }
}
