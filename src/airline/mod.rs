//! Airline customer-service domain: the tools, handoff hooks, handlers and
//! checkers that make up the service desk.

pub mod checkers;
pub mod handlers;
pub mod hooks;
pub mod tools;

pub use checkers::{standing_checkers, POLICY_BYPASS_CHECKER, RELEVANCE_CHECKER};
pub use handlers::{
    build_airline_graph, CANCELLATION_AGENT, FAQ_AGENT, FLIGHT_STATUS_AGENT, SEAT_BOOKING_AGENT,
    TRIAGE_AGENT,
};
pub use tools::SEAT_MAP_MARKER;
