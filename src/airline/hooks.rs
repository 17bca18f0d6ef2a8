//! Hooks bound to the triage edges into seat booking and cancellation.

use rand::Rng;

use crate::context::{ContextField, SessionContext};
use crate::ids;

/// Seat booking always starts from a freshly synthesized booking reference.
pub fn on_seat_booking_handoff(ctx: &mut SessionContext) {
    seat_booking_with(ctx, &mut rand::thread_rng());
}

/// Cancellation keeps any reference already on file and fills in the rest.
pub fn on_cancellation_handoff(ctx: &mut SessionContext) {
    cancellation_with(ctx, &mut rand::thread_rng());
}

pub fn seat_booking_with<R: Rng + ?Sized>(ctx: &mut SessionContext, rng: &mut R) {
    ctx.write(ContextField::FlightNumber, ids::flight_number(rng));
    ctx.write(ContextField::ConfirmationNumber, ids::confirmation_number(rng));
}

pub fn cancellation_with<R: Rng + ?Sized>(ctx: &mut SessionContext, rng: &mut R) {
    ctx.write_if_absent(ContextField::ConfirmationNumber, || ids::confirmation_number(rng));
    ctx.write_if_absent(ContextField::FlightNumber, || ids::flight_number(rng));
}
