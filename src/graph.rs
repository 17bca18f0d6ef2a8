//! # Routing graph
//!
//! The static, shared set of handlers and the edges between them. Built once
//! at process start and read concurrently by every session afterwards.
//!
//! Edges are stored by target name on each [`Agent`]'s handoff list, so the
//! hub-and-spoke cycles (triage to a spoke and back) need no shared
//! ownership between handlers. [`RoutingGraphBuilder::build`] resolves every
//! name and rejects graphs that break the routing rules:
//!
//! - handler names are unique, as are their `transfer_to_*` functions, and
//!   the entry handler exists;
//! - every edge targets a known handler;
//! - every non-entry handler has an edge back to the entry handler;
//! - tool names are unique across the graph and never shadow a handoff.

use std::collections::HashMap;
use std::sync::Arc;

use crate::agent::Agent;
use crate::error::{AgentsError, Result};
use crate::handoff::{handoff_tool_name, Handoff};
use crate::tool::ToolRegistry;

#[derive(Debug)]
pub struct RoutingGraph {
    handlers: HashMap<String, Arc<Agent>>,
    order: Vec<String>,
    entry: String,
    handoff_targets: HashMap<String, String>,
    registry: ToolRegistry,
}

impl RoutingGraph {
    pub fn builder() -> RoutingGraphBuilder {
        RoutingGraphBuilder::default()
    }

    /// Name of the handler every new session starts on.
    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn entry_handler(&self) -> &Arc<Agent> {
        // `build` guarantees the entry is present
        &self.handlers[&self.entry]
    }

    pub fn handler(&self, name: &str) -> Option<&Arc<Agent>> {
        self.handlers.get(name)
    }

    /// Like [`handler`](Self::handler) but an unknown name is an error.
    pub fn require(&self, name: &str) -> Result<&Arc<Agent>> {
        self.handler(name).ok_or_else(|| AgentsError::InvalidGraph {
            message: format!("no handler named '{name}'"),
        })
    }

    /// Handler names in insertion order.
    pub fn handler_names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn edge(&self, from: &str, to: &str) -> Option<&Handoff> {
        self.handler(from).and_then(|h| h.handoff_to(to))
    }

    pub fn has_edge(&self, from: &str, to: &str) -> bool {
        self.edge(from, to).is_some()
    }

    /// The handler a `transfer_to_*` function name points at, anywhere in
    /// the graph.
    pub fn handoff_target(&self, tool_name: &str) -> Option<&str> {
        self.handoff_targets.get(tool_name).map(String::as_str)
    }

    /// Global tool registry, holding every tool any handler declares.
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }
}

#[derive(Default)]
pub struct RoutingGraphBuilder {
    agents: Vec<Agent>,
    entry: Option<String>,
}

impl RoutingGraphBuilder {
    pub fn handler(mut self, agent: Agent) -> Self {
        self.agents.push(agent);
        self
    }

    pub fn entry(mut self, name: impl Into<String>) -> Self {
        self.entry = Some(name.into());
        self
    }

    pub fn build(self) -> Result<RoutingGraph> {
        let entry = self.entry.ok_or_else(|| AgentsError::InvalidGraph {
            message: "no entry handler designated".to_string(),
        })?;

        let mut handlers = HashMap::new();
        let mut order = Vec::with_capacity(self.agents.len());
        let mut handoff_targets = HashMap::new();
        for agent in self.agents {
            let name = agent.name().to_string();
            if handlers.contains_key(&name) {
                return Err(AgentsError::InvalidGraph {
                    message: format!("duplicate handler name '{name}'"),
                });
            }
            if let Some(other) = handoff_targets.insert(handoff_tool_name(&name), name.clone()) {
                return Err(AgentsError::InvalidGraph {
                    message: format!(
                        "'{name}' and '{other}' share the handoff function '{}'",
                        handoff_tool_name(&name)
                    ),
                });
            }
            order.push(name.clone());
            handlers.insert(name, Arc::new(agent));
        }

        if !handlers.contains_key(&entry) {
            return Err(AgentsError::InvalidGraph {
                message: format!("entry handler '{entry}' is not in the graph"),
            });
        }

        let mut registry = ToolRegistry::new();
        for name in &order {
            let agent = &handlers[name];

            for edge in agent.handoffs() {
                if !handlers.contains_key(&edge.target) {
                    return Err(AgentsError::InvalidGraph {
                        message: format!("'{name}' hands off to unknown handler '{}'", edge.target),
                    });
                }
            }

            if *name != entry && agent.handoff_to(&entry).is_none() {
                return Err(AgentsError::InvalidGraph {
                    message: format!("'{name}' has no edge back to entry handler '{entry}'"),
                });
            }

            for tool in agent.tools() {
                if handoff_targets.contains_key(tool.name()) {
                    return Err(AgentsError::InvalidGraph {
                        message: format!("tool '{}' shadows a handoff function", tool.name()),
                    });
                }
                registry.register(tool.clone())?;
            }
        }

        Ok(RoutingGraph {
            handlers,
            order,
            entry,
            handoff_targets,
            registry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{FunctionTool, Tool};
    use schemars::JsonSchema;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, JsonSchema)]
    struct NoArgs {}

    fn ping() -> Arc<dyn Tool> {
        Arc::new(FunctionTool::lookup("ping", "Ping", |_: NoArgs| Ok("pong".into())))
    }

    fn hub_and_spokes() -> RoutingGraphBuilder {
        RoutingGraph::builder()
            .entry("Triage Agent")
            .handler(
                Agent::simple("Triage Agent", "route")
                    .with_handoff(Handoff::new("FAQ Agent", "faq"))
                    .with_handoff(Handoff::new("Flight Status Agent", "status")),
            )
            .handler(
                Agent::simple("FAQ Agent", "faq")
                    .with_tool(ping())
                    .with_handoff(Handoff::new("Triage Agent", "back")),
            )
            .handler(
                Agent::simple("Flight Status Agent", "status")
                    .with_handoff(Handoff::new("Triage Agent", "back")),
            )
    }

    #[test]
    fn test_build_valid_graph() {
        let graph = hub_and_spokes().build().unwrap();
        assert_eq!(graph.entry(), "Triage Agent");
        assert_eq!(graph.entry_handler().name(), "Triage Agent");
        assert_eq!(graph.len(), 3);
        assert!(graph.has_edge("Triage Agent", "FAQ Agent"));
        assert!(graph.has_edge("FAQ Agent", "Triage Agent"));
        assert!(!graph.has_edge("FAQ Agent", "Flight Status Agent"));
        assert_eq!(graph.handoff_target("transfer_to_faq_agent"), Some("FAQ Agent"));
        assert!(graph.registry().contains("ping"));
        assert!(graph.require("Nope").is_err());
    }

    #[test]
    fn test_missing_edge_back_to_entry() {
        let err = hub_and_spokes()
            .handler(Agent::simple("Dead End", "stuck"))
            .build()
            .unwrap_err();
        assert!(matches!(err, AgentsError::InvalidGraph { ref message } if message.contains("Dead End")));
    }

    #[test]
    fn test_unknown_target_and_duplicates() {
        let unknown = RoutingGraph::builder()
            .entry("Triage Agent")
            .handler(Agent::simple("Triage Agent", "").with_handoff(Handoff::new("Ghost", "")))
            .build();
        assert!(matches!(unknown, Err(AgentsError::InvalidGraph { .. })));

        let duplicate = hub_and_spokes()
            .handler(
                Agent::simple("FAQ Agent", "again").with_handoff(Handoff::new("Triage Agent", "")),
            )
            .build();
        assert!(matches!(duplicate, Err(AgentsError::InvalidGraph { .. })));

        let no_entry = RoutingGraph::builder()
            .handler(Agent::simple("Triage Agent", ""))
            .build();
        assert!(no_entry.is_err());
    }

    #[test]
    fn test_handoff_function_collision_is_rejected() {
        let err = hub_and_spokes()
            .handler(
                Agent::simple("FAQ-Agent", "lookalike")
                    .with_handoff(Handoff::new("Triage Agent", "back")),
            )
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            AgentsError::InvalidGraph { ref message }
                if message.contains("transfer_to_faq_agent") && message.contains("FAQ-Agent")
        ));
    }

    #[test]
    fn test_tool_name_clash_is_rejected() {
        let clash = hub_and_spokes()
            .handler(
                Agent::simple("Other Agent", "")
                    .with_tool(ping())
                    .with_handoff(Handoff::new("Triage Agent", "")),
            )
            .build();
        assert!(matches!(clash, Err(AgentsError::InvalidGraph { .. })));
    }

    #[test]
    fn test_shared_tool_instance_is_allowed() {
        let shared = ping();
        let graph = RoutingGraph::builder()
            .entry("Triage Agent")
            .handler(
                Agent::simple("Triage Agent", "")
                    .with_tool(shared.clone())
                    .with_handoff(Handoff::new("FAQ Agent", "")),
            )
            .handler(
                Agent::simple("FAQ Agent", "")
                    .with_tool(shared)
                    .with_handoff(Handoff::new("Triage Agent", "")),
            )
            .build()
            .unwrap();
        assert_eq!(graph.registry().len(), 1);
    }
}
