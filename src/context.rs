//! # Session context
//!
//! The mutable record of booking facts gathered during one conversation.
//! Handlers render their instructions from it, tools and handoff hooks read
//! and write it. Fields start unset and are only ever overwritten, never
//! cleared: nothing writes `None` back into a field.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids;

/// Placeholder rendered into instructions for a field that is still unset.
pub const UNKNOWN_PLACEHOLDER: &str = "[unknown]";

/// Names of the fields held by [`SessionContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextField {
    PassengerName,
    ConfirmationNumber,
    SeatNumber,
    FlightNumber,
    AccountNumber,
}

impl ContextField {
    pub const ALL: [ContextField; 5] = [
        ContextField::PassengerName,
        ContextField::ConfirmationNumber,
        ContextField::SeatNumber,
        ContextField::FlightNumber,
        ContextField::AccountNumber,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContextField::PassengerName => "passenger_name",
            ContextField::ConfirmationNumber => "confirmation_number",
            ContextField::SeatNumber => "seat_number",
            ContextField::FlightNumber => "flight_number",
            ContextField::AccountNumber => "account_number",
        }
    }
}

impl fmt::Display for ContextField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Conversation-derived facts for one airline customer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    passenger_name: Option<String>,
    confirmation_number: Option<String>,
    seat_number: Option<String>,
    flight_number: Option<String>,
    account_number: Option<String>,
}

impl SessionContext {
    /// A fresh context for a new conversation, with a synthetic account number.
    pub fn create_initial() -> Self {
        Self {
            account_number: Some(ids::account_number_now()),
            ..Self::default()
        }
    }

    pub fn read(&self, field: ContextField) -> Option<&str> {
        self.slot(field).as_deref()
    }

    pub fn write(&mut self, field: ContextField, value: impl Into<String>) {
        *self.slot_mut(field) = Some(value.into());
    }

    /// Writes `value` only when the field is still unset. Returns whether it wrote.
    pub fn write_if_absent(&mut self, field: ContextField, value: impl FnOnce() -> String) -> bool {
        let slot = self.slot_mut(field);
        if slot.is_some() {
            return false;
        }
        *slot = Some(value());
        true
    }

    /// The field's value, or [`UNKNOWN_PLACEHOLDER`] when unset.
    pub fn display(&self, field: ContextField) -> &str {
        self.read(field).unwrap_or(UNKNOWN_PLACEHOLDER)
    }

    pub fn passenger_name(&self) -> Option<&str> {
        self.read(ContextField::PassengerName)
    }

    pub fn confirmation_number(&self) -> Option<&str> {
        self.read(ContextField::ConfirmationNumber)
    }

    pub fn seat_number(&self) -> Option<&str> {
        self.read(ContextField::SeatNumber)
    }

    pub fn flight_number(&self) -> Option<&str> {
        self.read(ContextField::FlightNumber)
    }

    pub fn account_number(&self) -> Option<&str> {
        self.read(ContextField::AccountNumber)
    }

    fn slot(&self, field: ContextField) -> &Option<String> {
        match field {
            ContextField::PassengerName => &self.passenger_name,
            ContextField::ConfirmationNumber => &self.confirmation_number,
            ContextField::SeatNumber => &self.seat_number,
            ContextField::FlightNumber => &self.flight_number,
            ContextField::AccountNumber => &self.account_number,
        }
    }

    fn slot_mut(&mut self, field: ContextField) -> &mut Option<String> {
        match field {
            ContextField::PassengerName => &mut self.passenger_name,
            ContextField::ConfirmationNumber => &mut self.confirmation_number,
            ContextField::SeatNumber => &mut self.seat_number,
            ContextField::FlightNumber => &mut self.flight_number,
            ContextField::AccountNumber => &mut self.account_number,
        }
    }
}
