use chrono::NaiveDateTime;
use log::debug;

use crate::models::{BookingRecord, Child, GuestInfo, PaymentInfo, Room};

const SECONDS_PER_DAY: i64 = 86_400;
pub const SERVICE_FEE_RATE: f64 = 0.10;
pub const TAX_RATE: f64 = 0.05;

/// Partial update for [`BookingState::update`]. `Some` fields overwrite the
/// record, `None` fields are left untouched. Nested groups (`guest_info`,
/// `payment_info`, `children`) replace wholesale, never field by field.
#[derive(Debug, Clone, Default)]
pub struct BookingUpdate {
    pub check_in: Option<NaiveDateTime>,
    pub check_out: Option<NaiveDateTime>,
    pub selected_room: Option<Room>,
    pub adults: Option<u32>,
    pub children: Option<Vec<Child>>,
    pub guest_info: Option<GuestInfo>,
    pub payment_info: Option<PaymentInfo>,
}

/// The session's booking record plus a revision counter. The container does
/// no validation and raises no errors; missing data is just `None` and the
/// screens decide what that means. Each session owns exactly one of these
/// behind the dispatcher lock, so a reader always sees the latest write; the
/// revision is the change signal for anything re-rendering a kept message.
#[derive(Debug, Default)]
pub struct BookingState {
    record: BookingRecord,
    revision: u64,
}

impl BookingState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self) -> &BookingRecord {
        &self.record
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn update(&mut self, update: BookingUpdate) {
        if let Some(check_in) = update.check_in {
            self.record.check_in = Some(check_in);
        }
        if let Some(check_out) = update.check_out {
            self.record.check_out = Some(check_out);
        }
        if let Some(room) = update.selected_room {
            self.record.selected_room = Some(room);
        }
        if let Some(adults) = update.adults {
            self.record.adults = adults;
        }
        if let Some(children) = update.children {
            self.record.children = children;
        }
        if let Some(guest_info) = update.guest_info {
            self.record.guest_info = Some(guest_info);
        }
        if let Some(payment_info) = update.payment_info {
            self.record.payment_info = Some(payment_info);
        }
        self.revision += 1;
        debug!("booking record updated, revision {}", self.revision);
    }

    /// Back to a blank record, e.g. when the visitor starts a new booking
    /// from the confirmation screen.
    pub fn reset(&mut self) {
        self.record = BookingRecord::default();
        self.revision += 1;
        debug!("booking record reset, revision {}", self.revision);
    }

    /// Number of nights between check-in and check-out, 0 while either date
    /// is missing. Partial days count as a full night (a 36 h stay is two
    /// nights), so the difference is taken in seconds and rounded up.
    pub fn nights(&self) -> i64 {
        match (self.record.check_in, self.record.check_out) {
            (Some(check_in), Some(check_out)) => {
                let seconds = (check_out - check_in).num_seconds();
                seconds.div_euclid(SECONDS_PER_DAY)
                    + i64::from(seconds.rem_euclid(SECONDS_PER_DAY) != 0)
            }
            _ => 0,
        }
    }

    /// Room price times nights, 0 while no room is selected.
    pub fn total_price(&self) -> f64 {
        match &self.record.selected_room {
            Some(room) => room.price * self.nights() as f64,
            None => 0.0,
        }
    }

    pub fn breakdown(&self) -> PriceBreakdown {
        PriceBreakdown::from_subtotal(self.total_price())
    }
}

/// Subtotal plus the fixed service fee and taxes shown on the summary and
/// payment screens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceBreakdown {
    pub subtotal: f64,
    pub service_fee: f64,
    pub taxes: f64,
    pub total: f64,
}

impl PriceBreakdown {
    pub fn from_subtotal(subtotal: f64) -> Self {
        let service_fee = subtotal * SERVICE_FEE_RATE;
        let taxes = subtotal * TAX_RATE;
        PriceBreakdown {
            subtotal,
            service_fee,
            taxes,
            total: subtotal + service_fee + taxes,
        }
    }
}

pub fn format_brl(value: f64) -> String {
    format!("R$ {:.2}", value)
}

/// Display-only reference shown on the confirmation screen, derived from the
/// wall clock and never stored anywhere.
pub fn booking_reference(now_millis: i64) -> String {
    format!("BK{:08}", now_millis.rem_euclid(100_000_000))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at_midnight(year: i32, month: u32, day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn deluxe() -> Room {
        crate::catalog::room_by_id("2").unwrap().clone()
    }

    #[test]
    fn nights_is_zero_while_either_date_is_missing() {
        let mut state = BookingState::new();
        assert_eq!(state.nights(), 0);
        state.update(BookingUpdate {
            check_in: Some(at_midnight(2025, 6, 1)),
            ..Default::default()
        });
        assert_eq!(state.nights(), 0);
    }

    #[test]
    fn nights_counts_whole_days() {
        let mut state = BookingState::new();
        state.update(BookingUpdate {
            check_in: Some(at_midnight(2025, 6, 1)),
            check_out: Some(at_midnight(2025, 6, 4)),
            ..Default::default()
        });
        assert_eq!(state.nights(), 3);
    }

    #[test]
    fn partial_days_round_up() {
        let mut state = BookingState::new();
        state.update(BookingUpdate {
            check_in: Some(at_midnight(2025, 6, 1)),
            check_out: Some(
                NaiveDate::from_ymd_opt(2025, 6, 2)
                    .unwrap()
                    .and_hms_opt(12, 0, 0)
                    .unwrap(),
            ),
            ..Default::default()
        });
        // 36 hours after check-in
        assert_eq!(state.nights(), 2);
    }

    #[test]
    fn total_price_requires_a_room() {
        let mut state = BookingState::new();
        state.update(BookingUpdate {
            check_in: Some(at_midnight(2025, 6, 1)),
            check_out: Some(at_midnight(2025, 6, 4)),
            ..Default::default()
        });
        assert_eq!(state.total_price(), 0.0);

        let standard = crate::catalog::room_by_id("1").unwrap().clone();
        state.update(BookingUpdate {
            selected_room: Some(standard),
            ..Default::default()
        });
        assert_eq!(state.total_price(), 750.0);
    }

    #[test]
    fn breakdown_adds_service_fee_and_taxes() {
        let breakdown = PriceBreakdown::from_subtotal(750.0);
        assert_eq!(breakdown.service_fee, 75.0);
        assert_eq!(breakdown.taxes, 37.5);
        assert_eq!(breakdown.total, 862.5);
        assert_eq!(format_brl(breakdown.total), "R$ 862.50");
    }

    #[test]
    fn update_is_a_shallow_merge() {
        let mut state = BookingState::new();
        state.update(BookingUpdate {
            children: Some(vec![Child { age: 5 }]),
            ..Default::default()
        });
        assert_eq!(state.record().children, vec![Child { age: 5 }]);

        state.update(BookingUpdate {
            adults: Some(2),
            ..Default::default()
        });
        assert_eq!(state.record().adults, 2);
        assert_eq!(state.record().children, vec![Child { age: 5 }]);
    }

    #[test]
    fn nested_groups_replace_wholesale() {
        let mut state = BookingState::new();
        state.update(BookingUpdate {
            children: Some(vec![Child { age: 5 }, Child { age: 9 }]),
            ..Default::default()
        });
        state.update(BookingUpdate {
            children: Some(vec![Child { age: 3 }]),
            ..Default::default()
        });
        assert_eq!(state.record().children, vec![Child { age: 3 }]);
    }

    #[test]
    fn reset_restores_the_default_record() {
        let mut state = BookingState::new();
        state.update(BookingUpdate {
            check_in: Some(at_midnight(2025, 7, 10)),
            check_out: Some(at_midnight(2025, 7, 12)),
            selected_room: Some(deluxe()),
            adults: Some(2),
            ..Default::default()
        });
        state.reset();
        assert_eq!(state.record(), &BookingRecord::default());
        assert_eq!(state.nights(), 0);
        assert_eq!(state.total_price(), 0.0);
        assert_eq!(state.record().adults, 1);
    }

    #[test]
    fn revision_advances_on_every_write() {
        let mut state = BookingState::new();
        let before = state.revision();
        state.update(BookingUpdate::default());
        state.reset();
        assert_eq!(state.revision(), before + 2);
    }

    #[test]
    fn booking_reference_keeps_the_last_eight_clock_digits() {
        assert_eq!(booking_reference(1_766_975_929_123), "BK75929123");
        assert_eq!(booking_reference(42), "BK00000042");
    }
}
