//! The five airline handlers and the routing graph that joins them.
//!
//! Triage is the hub. It can reach every spoke, and every spoke can only
//! route back to triage. The edges into seat booking and cancellation carry
//! hooks that put a booking reference on file before those handlers render
//! their instructions.

use std::sync::Arc;

use crate::agent::{Agent, Instructions};
use crate::context::{ContextField, SessionContext};
use crate::error::Result;
use crate::graph::RoutingGraph;
use crate::guardrail::InputGuardrail;
use crate::handoff::Handoff;

use super::hooks::{on_cancellation_handoff, on_seat_booking_handoff};
use super::tools;

pub const TRIAGE_AGENT: &str = "Triage Agent";
pub const SEAT_BOOKING_AGENT: &str = "Seat Booking Agent";
pub const FLIGHT_STATUS_AGENT: &str = "Flight Status Agent";
pub const CANCELLATION_AGENT: &str = "Cancellation Agent";
pub const FAQ_AGENT: &str = "FAQ Agent";

/// Shared preamble explaining how transfers work.
pub const HANDOFF_PREAMBLE: &str = "# System context\n\
You are one of several cooperating customer-service agents. Each agent has its own \
instructions and tools, and can transfer the conversation to another agent by calling \
a function named `transfer_to_<agent_name>`. Transfers happen behind the scenes; \
never mention them or draw attention to them when talking to the customer.\n";

pub fn triage_instructions() -> String {
    format!(
        "{HANDOFF_PREAMBLE}\
         You are a helpful triaging agent. You can use your tools to delegate questions \
         to other appropriate agents."
    )
}

pub fn seat_booking_instructions(ctx: &SessionContext) -> String {
    format!(
        "{HANDOFF_PREAMBLE}\
         You are a seat booking agent. If you are speaking to a customer, you were most \
         likely transferred here by the triage agent.\n\
         Follow this routine:\n\
         1. The customer's confirmation number is {confirmation}. If it is not available, \
         ask for it. If you have it, confirm it is the one the customer means.\n\
         2. Ask which seat the customer would like. You can also call display_seat_map to \
         show an interactive seat map they can pick from.\n\
         3. Use the update_seat tool to change the seat on the flight.\n\
         If the customer asks about anything outside this routine, transfer back to the \
         triage agent.",
        confirmation = ctx.display(ContextField::ConfirmationNumber),
    )
}

pub fn flight_status_instructions(ctx: &SessionContext) -> String {
    format!(
        "{HANDOFF_PREAMBLE}\
         You are a Flight Status Agent. Follow this routine:\n\
         1. The customer's confirmation number is {confirmation} and flight number is \
         {flight}. If either is missing, ask for it. If you have both, confirm them with \
         the customer.\n\
         2. Use the flight_status_tool to report the status of the flight.\n\
         If the customer asks about anything other than flight status, transfer back to \
         the triage agent.",
        confirmation = ctx.display(ContextField::ConfirmationNumber),
        flight = ctx.display(ContextField::FlightNumber),
    )
}

pub fn cancellation_instructions(ctx: &SessionContext) -> String {
    format!(
        "{HANDOFF_PREAMBLE}\
         You are a Cancellation Agent. Follow this routine:\n\
         1. The customer's confirmation number is {confirmation} and flight number is \
         {flight}. If either is missing, ask for it. If you have both, confirm them with \
         the customer.\n\
         2. Once the customer confirms, use the cancel_flight tool to cancel the flight.\n\
         If the customer asks about anything else, transfer back to the triage agent.",
        confirmation = ctx.display(ContextField::ConfirmationNumber),
        flight = ctx.display(ContextField::FlightNumber),
    )
}

pub fn faq_instructions() -> String {
    format!(
        "{HANDOFF_PREAMBLE}\
         You are an FAQ agent. If you are speaking to a customer, you were most likely \
         transferred here by the triage agent.\n\
         Follow this routine:\n\
         1. Identify the customer's most recent question.\n\
         2. Answer it with faq_lookup_tool, or baggage_tool for baggage fees and \
         allowances. Do not rely on your own knowledge.\n\
         3. Reply to the customer with the answer."
    )
}

/// Builds the airline routing graph. `checkers` guard every handler.
pub fn build_airline_graph(
    model: &str,
    checkers: Vec<Arc<dyn InputGuardrail>>,
) -> Result<RoutingGraph> {
    let back_to_triage = || {
        Handoff::new(
            TRIAGE_AGENT,
            "A triage agent that can delegate a customer's request to the appropriate agent.",
        )
    };
    let handler = |name: &str, description: &str| {
        Agent::simple(name, "")
            .with_model(model)
            .with_handoff_description(description)
            .with_input_guardrails(checkers.clone())
    };

    let seat_booking = handler(
        SEAT_BOOKING_AGENT,
        "A helpful agent that can update a seat on a flight.",
    )
    .with_instructions(Instructions::dynamic(seat_booking_instructions))
    .with_tools(vec![tools::update_seat_tool(), tools::display_seat_map_tool()])
    .with_handoff(back_to_triage());

    let flight_status = handler(
        FLIGHT_STATUS_AGENT,
        "An agent to provide flight status information.",
    )
    .with_instructions(Instructions::dynamic(flight_status_instructions))
    .with_tool(tools::flight_status_tool())
    .with_handoff(back_to_triage());

    let cancellation = handler(CANCELLATION_AGENT, "An agent to cancel flights.")
        .with_instructions(Instructions::dynamic(cancellation_instructions))
        .with_tool(tools::cancel_flight_tool())
        .with_handoff(back_to_triage());

    let faq = handler(
        FAQ_AGENT,
        "A helpful agent that can answer questions about the airline.",
    )
    .with_instructions(Instructions::Static(faq_instructions()))
    .with_tools(vec![tools::faq_lookup_tool(), tools::baggage_tool()])
    .with_handoff(back_to_triage());

    let edge_to = |agent: &Agent| {
        Handoff::new(agent.name(), agent.handoff_description().unwrap_or_default())
    };
    let triage = handler(
        TRIAGE_AGENT,
        "A triage agent that can delegate a customer's request to the appropriate agent.",
    )
    .with_instructions(Instructions::Static(triage_instructions()))
    .with_handoffs(vec![
        edge_to(&flight_status),
        edge_to(&cancellation).with_hook(on_cancellation_handoff),
        edge_to(&faq),
        edge_to(&seat_booking).with_hook(on_seat_booking_handoff),
    ]);

    RoutingGraph::builder()
        .entry(TRIAGE_AGENT)
        .handler(triage)
        .handler(seat_booking)
        .handler(flight_status)
        .handler(cancellation)
        .handler(faq)
        .build()
}
