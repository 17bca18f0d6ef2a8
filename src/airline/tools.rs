//! Airline domain tools.

use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;

use crate::context::{ContextField, SessionContext};
use crate::error::{AgentsError, Result};
use crate::tool::{FunctionTool, Tool};

/// Output of `display_seat_map`. The client renders a seat picker when it
/// sees this exact string.
pub const SEAT_MAP_MARKER: &str = "DISPLAY_SEAT_MAP";

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FaqArgs {
    /// The customer's question
    pub question: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateSeatArgs {
    pub confirmation_number: String,
    pub new_seat: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FlightStatusArgs {
    pub flight_number: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct BaggageArgs {
    pub query: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct NoArgs {}

pub fn faq_answer(question: &str) -> &'static str {
    let q = question.to_lowercase();
    if q.contains("bag") || q.contains("baggage") {
        "You are allowed to bring one bag on the plane. \
         It must be under 50 pounds and 22 inches x 14 inches x 9 inches."
    } else if q.contains("seats") || q.contains("plane") {
        "There are 120 seats on the plane. \
         There are 22 business class seats and 98 economy seats. \
         Exit rows are rows 4 and 16. \
         Rows 5-8 are Economy Plus, with extra legroom."
    } else if q.contains("wifi") {
        "We have free wifi on the plane, join Airline-Wifi"
    } else {
        "I'm sorry, I don't know the answer to that question."
    }
}

pub fn baggage_answer(query: &str) -> &'static str {
    let q = query.to_lowercase();
    if q.contains("fee") {
        "Overweight bag fee is $75."
    } else if q.contains("allowance") {
        "One carry-on and one checked bag (up to 50 lbs) are included."
    } else {
        "Please provide details about your baggage inquiry."
    }
}

pub fn flight_status(flight_number: &str) -> String {
    format!("Flight {flight_number} is on time and scheduled to depart at gate A10.")
}

/// Moves the booking to `new_seat`. A flight must already be on file; the
/// context is left untouched when it is not.
pub fn update_seat(ctx: &mut SessionContext, args: UpdateSeatArgs) -> Result<String> {
    if ctx.flight_number().is_none() {
        return Err(AgentsError::PreconditionViolation {
            tool: "update_seat".to_string(),
            message: "Flight number is required".to_string(),
        });
    }
    ctx.write(ContextField::ConfirmationNumber, args.confirmation_number.clone());
    ctx.write(ContextField::SeatNumber, args.new_seat.clone());
    Ok(format!(
        "Updated seat to {} for confirmation number {}",
        args.new_seat, args.confirmation_number
    ))
}

pub fn cancel_flight(ctx: &SessionContext) -> Result<String> {
    let flight = ctx
        .flight_number()
        .ok_or_else(|| AgentsError::PreconditionViolation {
            tool: "cancel_flight".to_string(),
            message: "Flight number is required".to_string(),
        })?;
    Ok(format!("Flight {flight} successfully cancelled"))
}

pub fn faq_lookup_tool() -> Arc<dyn Tool> {
    Arc::new(FunctionTool::lookup(
        "faq_lookup_tool",
        "Lookup frequently asked questions.",
        |args: FaqArgs| Ok(faq_answer(&args.question).to_string()),
    ))
}

pub fn update_seat_tool() -> Arc<dyn Tool> {
    Arc::new(FunctionTool::mutating(
        "update_seat",
        "Update the seat for a given confirmation number.",
        update_seat,
    ))
}

pub fn flight_status_tool() -> Arc<dyn Tool> {
    Arc::new(FunctionTool::lookup(
        "flight_status_tool",
        "Lookup status for a flight.",
        |args: FlightStatusArgs| Ok(flight_status(&args.flight_number)),
    ))
}

pub fn baggage_tool() -> Arc<dyn Tool> {
    Arc::new(FunctionTool::lookup(
        "baggage_tool",
        "Lookup baggage allowance and fees.",
        |args: BaggageArgs| Ok(baggage_answer(&args.query).to_string()),
    ))
}

pub fn display_seat_map_tool() -> Arc<dyn Tool> {
    Arc::new(
        FunctionTool::reading(
            "display_seat_map",
            "Display an interactive seat map to the customer so they can choose a new seat.",
            |_ctx: &SessionContext, _: NoArgs| Ok(SEAT_MAP_MARKER.to_string()),
        )
        .with_final_output(),
    )
}

pub fn cancel_flight_tool() -> Arc<dyn Tool> {
    Arc::new(FunctionTool::reading(
        "cancel_flight",
        "Cancel a flight.",
        |ctx: &SessionContext, _: NoArgs| cancel_flight(ctx),
    ))
}
