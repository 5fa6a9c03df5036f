pub mod calendar;
pub mod config;
pub mod domain;
pub mod errors;

pub use calendar::ReservationCalendar;
pub use domain::{
    ConversationTurn, Reservation, ReservationId, ReservationParams, ReservationStatus, TurnRole,
};
pub use errors::ApplicationError;
