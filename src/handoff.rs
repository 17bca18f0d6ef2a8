//! # Handoffs
//!
//! A handoff is an edge in the routing graph: it names a target handler and
//! optionally carries a [`HandoffHook`] that mutates the session context each
//! time the edge is traversed. The model sees every outgoing edge of the
//! active handler as a function tool named `transfer_to_<target>`; calling
//! that tool requests the transition.
//!
//! ```rust
//! use airline_agents::handoff::{handoff_tool_name, Handoff};
//! use airline_agents::context::{ContextField, SessionContext};
//!
//! let edge = Handoff::new("Seat Booking Agent", "Updates a seat on a flight.")
//!     .with_hook(|ctx: &mut SessionContext| {
//!         ctx.write(ContextField::FlightNumber, "FLT-123");
//!     });
//!
//! assert_eq!(edge.tool_name(), "transfer_to_seat_booking_agent");
//! assert_eq!(handoff_tool_name("FAQ Agent"), "transfer_to_faq_agent");
//! assert!(edge.has_hook());
//! ```

use std::sync::Arc;

use crate::context::SessionContext;
use crate::tool::ToolSpec;

/// A side-effecting function bound to one edge of the routing graph.
///
/// Runs exactly once per traversal, before the target handler's
/// instructions are rendered.
pub trait HandoffHook: Send + Sync {
    fn on_handoff(&self, ctx: &mut SessionContext);
}

impl<F> HandoffHook for F
where
    F: Fn(&mut SessionContext) + Send + Sync,
{
    fn on_handoff(&self, ctx: &mut SessionContext) {
        self(ctx)
    }
}

/// Function-tool name under which a handoff to `handler` is advertised.
pub fn handoff_tool_name(handler: &str) -> String {
    let mut name = String::from("transfer_to_");
    let mut last_was_sep = true;
    for c in handler.chars() {
        if c.is_ascii_alphanumeric() {
            name.push(c.to_ascii_lowercase());
            last_was_sep = false;
        } else if !last_was_sep {
            name.push('_');
            last_was_sep = true;
        }
    }
    if name.ends_with('_') && name.len() > "transfer_to_".len() {
        name.pop();
    }
    name
}

/// An outgoing edge from a handler to `target`.
#[derive(Clone)]
pub struct Handoff {
    /// Name of the target handler.
    pub target: String,

    /// Shown to the source handler's model to help it pick a route.
    pub description: String,

    hook: Option<Arc<dyn HandoffHook>>,
    tool_name: String,
}

impl Handoff {
    pub fn new(target: impl Into<String>, description: impl Into<String>) -> Self {
        let target = target.into();
        Self {
            tool_name: handoff_tool_name(&target),
            target,
            description: description.into(),
            hook: None,
        }
    }

    pub fn with_hook<H>(mut self, hook: H) -> Self
    where
        H: HandoffHook + 'static,
    {
        self.hook = Some(Arc::new(hook));
        self
    }

    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    pub fn has_hook(&self) -> bool {
        self.hook.is_some()
    }

    /// Runs the bound hook, if any. Returns whether one ran.
    pub fn run_hook(&self, ctx: &mut SessionContext) -> bool {
        match &self.hook {
            Some(hook) => {
                hook.on_handoff(ctx);
                true
            }
            None => false,
        }
    }

    /// Descriptor the model sees for this edge.
    pub fn as_tool_spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.tool_name.clone(),
            description: format!(
                "Handoff to the {} to handle the request. {}",
                self.target, self.description
            ),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }),
        }
    }
}

impl std::fmt::Debug for Handoff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handoff")
            .field("target", &self.target)
            .field("tool_name", &self.tool_name)
            .field("has_hook", &self.has_hook())
            .finish()
    }
}
