use std::collections::HashMap;

use chrono::Utc;

use crate::domain::{Reservation, ReservationId, ReservationStatus};

/// Dinner service starts at a fixed hour regardless of when lunch opens.
const DINNER_START_HOUR: u32 = 18;
/// Lunch seating covers the first hours after opening.
const LUNCH_SERVICE_HOURS: u32 = 3;

/// In-memory reservation store. No persistence: a process restart loses
/// everything, which matches the session model of the relay.
///
/// Availability queries are optimistic placeholders. They ignore existing
/// bookings entirely; real conflict semantics are deliberately not invented
/// here.
pub struct ReservationCalendar {
    reservations: HashMap<ReservationId, Reservation>,
    opening_hour: u32,
    closing_hour: u32,
    sequence: u64,
}

impl ReservationCalendar {
    pub fn new(opening_hour: u32, closing_hour: u32) -> Self {
        Self { reservations: HashMap::new(), opening_hour, closing_hour, sequence: 0 }
    }

    /// Books a reservation. Always succeeds and assigns a fresh id; ids are
    /// time-based with a monotonic suffix so they stay unique within one
    /// second and are never reused.
    pub fn add(
        &mut self,
        date: &str,
        party_size: u32,
        customer_name: &str,
        phone_number: &str,
    ) -> Reservation {
        self.sequence += 1;
        let id = ReservationId(format!(
            "RES-{}-{:04}",
            Utc::now().format("%Y%m%d%H%M%S"),
            self.sequence
        ));

        let reservation = Reservation {
            id: id.clone(),
            date: date.to_owned(),
            party_size,
            customer_name: customer_name.to_owned(),
            phone_number: phone_number.to_owned(),
            status: ReservationStatus::Confirmed,
        };

        self.reservations.insert(id, reservation.clone());
        reservation
    }

    pub fn get(&self, id: &ReservationId) -> Option<&Reservation> {
        self.reservations.get(id)
    }

    /// Cancels a confirmed reservation. Returns false for an unknown id or a
    /// reservation that is already cancelled, so a second cancel of the same
    /// id reports false.
    pub fn cancel(&mut self, id: &ReservationId) -> bool {
        match self.reservations.get_mut(id) {
            Some(reservation) if reservation.status == ReservationStatus::Confirmed => {
                reservation.status = ReservationStatus::Cancelled;
                true
            }
            _ => false,
        }
    }

    /// Half-hour lunch and dinner slots derived from the configured service
    /// hours. Placeholder: the same list is returned for every date and
    /// party size.
    pub fn available_times(&self, _date: &str, _party_size: u32) -> Vec<String> {
        let mut slots = Vec::new();
        push_half_hour_slots(
            &mut slots,
            self.opening_hour,
            (self.opening_hour + LUNCH_SERVICE_HOURS).min(self.closing_hour),
        );
        if self.closing_hour > DINNER_START_HOUR + 1 {
            push_half_hour_slots(&mut slots, DINNER_START_HOUR, self.closing_hour - 1);
        }
        slots
    }

    /// Placeholder: every requested slot is reported free.
    pub fn is_available(&self, _date: &str, _time: &str, _party_size: u32) -> bool {
        true
    }

    pub fn len(&self) -> usize {
        self.reservations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reservations.is_empty()
    }
}

fn push_half_hour_slots(slots: &mut Vec<String>, start_hour: u32, end_hour: u32) {
    for hour in start_hour..end_hour {
        slots.push(format!("{hour:02}:00"));
        slots.push(format!("{hour:02}:30"));
    }
}
