use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;

use chrono::NaiveDateTime;
use regex::Regex;

use crate::models::BookingRecord;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}$").unwrap());
static CARD_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{16}$").unwrap());
static EXPIRY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(0[1-9]|1[0-2])/\d{2}$").unwrap());
static CVV_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{3,4}$").unwrap());

pub const MAX_CHILD_AGE: u8 = 17;

/// The six screens of the check-in flow, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Step {
    DateSelection,
    RoomSelection,
    GuestInformation,
    BookingSummary,
    Payment,
    Confirmation,
}

impl Step {
    pub fn next(self) -> Option<Step> {
        match self {
            Step::DateSelection => Some(Step::RoomSelection),
            Step::RoomSelection => Some(Step::GuestInformation),
            Step::GuestInformation => Some(Step::BookingSummary),
            Step::BookingSummary => Some(Step::Payment),
            Step::Payment => Some(Step::Confirmation),
            Step::Confirmation => None,
        }
    }

    /// One step back ("Voltar"). Never validated; the first screen has
    /// nowhere to go back to.
    pub fn back(self) -> Option<Step> {
        match self {
            Step::DateSelection => None,
            Step::RoomSelection => Some(Step::DateSelection),
            Step::GuestInformation => Some(Step::RoomSelection),
            Step::BookingSummary => Some(Step::GuestInformation),
            Step::Payment => Some(Step::BookingSummary),
            Step::Confirmation => Some(Step::Payment),
        }
    }
}

/// Result of an entry guard. A failed precondition sends the visitor back to
/// the very first screen, never to the nearest valid one — there is nothing
/// to resume, so the flow starts over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Allowed,
    Redirect(Step),
}

pub fn check_entry(step: Step, record: &BookingRecord) -> Gate {
    let satisfied = match step {
        Step::DateSelection => true,
        Step::RoomSelection => dates_in_order(record.check_in, record.check_out),
        Step::GuestInformation => record.selected_room.is_some(),
        Step::BookingSummary | Step::Payment => {
            record.selected_room.is_some() && record.guest_info.is_some()
        }
        Step::Confirmation => {
            record.selected_room.is_some()
                && record.guest_info.is_some()
                && record.payment_info.is_some()
        }
    };
    if satisfied {
        Gate::Allowed
    } else {
        Gate::Redirect(Step::DateSelection)
    }
}

fn dates_in_order(check_in: Option<NaiveDateTime>, check_out: Option<NaiveDateTime>) -> bool {
    matches!((check_in, check_out), (Some(ci), Some(co)) if co > ci)
}

/// A field-local validation failure. Rendered next to the prompt it belongs
/// to; it blocks advancing and nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldError {
    Required,
    InvalidEmail,
    InvalidCardNumber,
    InvalidExpiry,
    InvalidCvv,
    ChildAgeOutOfRange,
    NoAdults,
    OverCapacity { capacity: u32 },
    DatesOutOfOrder,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldError::Required => write!(f, "Campo obrigatório"),
            FieldError::InvalidEmail => write!(f, "E-mail inválido"),
            FieldError::InvalidCardNumber => write!(f, "Digite 16 números"),
            FieldError::InvalidExpiry => write!(f, "Use formato MM/AA"),
            FieldError::InvalidCvv => write!(f, "Digite 3 ou 4 números"),
            FieldError::ChildAgeOutOfRange => write!(f, "Idade deve ser entre 0 e 17 anos"),
            FieldError::NoAdults => write!(f, "Pelo menos 1 adulto é necessário"),
            FieldError::OverCapacity { capacity } => {
                write!(f, "Capacidade máxima: {} pessoa(s)", capacity)
            }
            FieldError::DatesOutOfOrder => {
                write!(f, "O check-out deve ser depois do check-in")
            }
        }
    }
}

pub fn validate_dates(
    check_in: Option<NaiveDateTime>,
    check_out: Option<NaiveDateTime>,
) -> Result<(), FieldError> {
    match (check_in, check_out) {
        (None, _) | (_, None) => Err(FieldError::Required),
        (Some(ci), Some(co)) if co > ci => Ok(()),
        _ => Err(FieldError::DatesOutOfOrder),
    }
}

pub fn validate_required(value: &str) -> Result<(), FieldError> {
    if value.trim().is_empty() {
        Err(FieldError::Required)
    } else {
        Ok(())
    }
}

pub fn validate_email(value: &str) -> Result<(), FieldError> {
    validate_required(value)?;
    if EMAIL_RE.is_match(value.trim()) {
        Ok(())
    } else {
        Err(FieldError::InvalidEmail)
    }
}

pub fn validate_child_age(age: i64) -> Result<u8, FieldError> {
    if (0..=i64::from(MAX_CHILD_AGE)).contains(&age) {
        Ok(age as u8)
    } else {
        Err(FieldError::ChildAgeOutOfRange)
    }
}

pub fn validate_guest_count(
    adults: u32,
    children: usize,
    capacity: u32,
) -> Result<(), FieldError> {
    if adults < 1 {
        return Err(FieldError::NoAdults);
    }
    if adults + children as u32 > capacity {
        return Err(FieldError::OverCapacity { capacity });
    }
    Ok(())
}

pub fn validate_card_number(value: &str) -> Result<(), FieldError> {
    if CARD_NUMBER_RE.is_match(value.trim()) {
        Ok(())
    } else {
        Err(FieldError::InvalidCardNumber)
    }
}

pub fn validate_card_holder(value: &str) -> Result<(), FieldError> {
    validate_required(value)
}

pub fn validate_expiry(value: &str) -> Result<(), FieldError> {
    if EXPIRY_RE.is_match(value.trim()) {
        Ok(())
    } else {
        Err(FieldError::InvalidExpiry)
    }
}

pub fn validate_cvv(value: &str) -> Result<(), FieldError> {
    if CVV_RE.is_match(value.trim()) {
        Ok(())
    } else {
        Err(FieldError::InvalidCvv)
    }
}

/// Terminal state of the simulated payment processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    Succeeded,
}

/// Placeholder for a real gateway integration: an explicit
/// Submitting → Succeeded transition. The delay is the flow's only
/// suspension point; it is not cancellable and there is no failure path.
pub async fn process_payment() -> PaymentOutcome {
    tokio::time::sleep(Duration::from_secs(1)).await;
    PaymentOutcome::Succeeded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::{format_brl, BookingState, BookingUpdate};
    use crate::models::{Child, GuestInfo, PaymentInfo};
    use chrono::NaiveDate;

    fn at_midnight(year: i32, month: u32, day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn guest() -> GuestInfo {
        GuestInfo {
            first_name: "Ana".into(),
            last_name: "Souza".into(),
            email: "ana@example.com".into(),
            phone: "+55 11 91234-5678".into(),
        }
    }

    fn card() -> PaymentInfo {
        PaymentInfo {
            card_number: "1234567812345678".into(),
            card_holder: "ANA SOUZA".into(),
            expiry_date: "12/27".into(),
            cvv: "123".into(),
        }
    }

    #[test]
    fn every_step_with_unmet_prerequisites_redirects_to_the_start() {
        let empty = BookingRecord::default();
        let gated = [
            Step::RoomSelection,
            Step::GuestInformation,
            Step::BookingSummary,
            Step::Payment,
            Step::Confirmation,
        ];
        for step in gated {
            assert_eq!(
                check_entry(step, &empty),
                Gate::Redirect(Step::DateSelection),
                "{:?} should not be reachable on a blank record",
                step
            );
        }
        assert_eq!(check_entry(Step::DateSelection, &empty), Gate::Allowed);
    }

    #[test]
    fn missing_guest_info_at_payment_still_redirects_to_the_start() {
        let mut state = BookingState::new();
        state.update(BookingUpdate {
            check_in: Some(at_midnight(2025, 7, 10)),
            check_out: Some(at_midnight(2025, 7, 12)),
            selected_room: Some(crate::catalog::room_by_id("2").unwrap().clone()),
            ..Default::default()
        });
        assert_eq!(
            check_entry(Step::Payment, state.record()),
            Gate::Redirect(Step::DateSelection)
        );
    }

    #[test]
    fn reversed_dates_do_not_open_the_room_screen() {
        let mut state = BookingState::new();
        state.update(BookingUpdate {
            check_in: Some(at_midnight(2025, 7, 12)),
            check_out: Some(at_midnight(2025, 7, 10)),
            ..Default::default()
        });
        assert_eq!(
            check_entry(Step::RoomSelection, state.record()),
            Gate::Redirect(Step::DateSelection)
        );
    }

    #[test]
    fn back_walks_the_route_one_step_at_a_time() {
        assert_eq!(Step::DateSelection.back(), None);
        assert_eq!(Step::Payment.back(), Some(Step::BookingSummary));
        assert_eq!(Step::Confirmation.next(), None);
        let mut step = Step::DateSelection;
        let mut hops = 0;
        while let Some(next) = step.next() {
            step = next;
            hops += 1;
        }
        assert_eq!(step, Step::Confirmation);
        assert_eq!(hops, 5);
    }

    #[test]
    fn date_validation() {
        assert_eq!(validate_dates(None, None), Err(FieldError::Required));
        assert_eq!(
            validate_dates(Some(at_midnight(2025, 6, 1)), None),
            Err(FieldError::Required)
        );
        assert_eq!(
            validate_dates(Some(at_midnight(2025, 6, 4)), Some(at_midnight(2025, 6, 4))),
            Err(FieldError::DatesOutOfOrder)
        );
        assert!(validate_dates(Some(at_midnight(2025, 6, 1)), Some(at_midnight(2025, 6, 4))).is_ok());
    }

    #[test]
    fn email_validation() {
        assert!(validate_email("ana@example.com").is_ok());
        assert!(validate_email("ANA.SOUZA+hotel@mail.example.org").is_ok());
        assert_eq!(validate_email(""), Err(FieldError::Required));
        assert_eq!(validate_email("ana@example"), Err(FieldError::InvalidEmail));
        assert_eq!(validate_email("ana.example.com"), Err(FieldError::InvalidEmail));
    }

    #[test]
    fn child_age_bounds() {
        assert_eq!(validate_child_age(0), Ok(0));
        assert_eq!(validate_child_age(17), Ok(17));
        assert_eq!(validate_child_age(18), Err(FieldError::ChildAgeOutOfRange));
        assert_eq!(validate_child_age(-1), Err(FieldError::ChildAgeOutOfRange));
    }

    #[test]
    fn guest_count_respects_room_capacity() {
        assert!(validate_guest_count(2, 1, 3).is_ok());
        assert_eq!(validate_guest_count(0, 0, 2), Err(FieldError::NoAdults));
        assert_eq!(
            validate_guest_count(2, 2, 3),
            Err(FieldError::OverCapacity { capacity: 3 })
        );
    }

    #[test]
    fn card_field_validation() {
        assert!(validate_card_number("1234567812345678").is_ok());
        assert_eq!(
            validate_card_number("1234 5678 1234 5678"),
            Err(FieldError::InvalidCardNumber)
        );
        assert_eq!(validate_card_number("123456781234567"), Err(FieldError::InvalidCardNumber));

        assert!(validate_expiry("12/27").is_ok());
        assert!(validate_expiry("01/30").is_ok());
        assert_eq!(validate_expiry("13/27"), Err(FieldError::InvalidExpiry));
        assert_eq!(validate_expiry("00/27"), Err(FieldError::InvalidExpiry));
        assert_eq!(validate_expiry("1/27"), Err(FieldError::InvalidExpiry));

        assert!(validate_cvv("123").is_ok());
        assert!(validate_cvv("1234").is_ok());
        assert_eq!(validate_cvv("12"), Err(FieldError::InvalidCvv));
        assert_eq!(validate_cvv("12345"), Err(FieldError::InvalidCvv));

        assert_eq!(validate_card_holder(""), Err(FieldError::Required));
        assert!(validate_card_holder("ANA SOUZA").is_ok());
    }

    #[test]
    fn messages_match_the_screen_copy() {
        assert_eq!(FieldError::InvalidCardNumber.to_string(), "Digite 16 números");
        assert_eq!(FieldError::InvalidExpiry.to_string(), "Use formato MM/AA");
        assert_eq!(FieldError::InvalidCvv.to_string(), "Digite 3 ou 4 números");
        assert_eq!(FieldError::InvalidEmail.to_string(), "E-mail inválido");
        assert_eq!(
            FieldError::OverCapacity { capacity: 3 }.to_string(),
            "Capacidade máxima: 3 pessoa(s)"
        );
    }

    /// Walks the whole flow the way the screens do: validate, merge, pass the
    /// next gate. Two nights in the Deluxe at R$ 380 come to R$ 874.00.
    #[test]
    fn full_flow_reaches_confirmation() {
        let mut state = BookingState::new();

        let check_in = at_midnight(2025, 7, 10);
        let check_out = at_midnight(2025, 7, 12);
        assert!(validate_dates(Some(check_in), Some(check_out)).is_ok());
        state.update(BookingUpdate {
            check_in: Some(check_in),
            check_out: Some(check_out),
            ..Default::default()
        });
        assert_eq!(check_entry(Step::RoomSelection, state.record()), Gate::Allowed);

        let room = crate::catalog::room_by_id("2").unwrap().clone();
        state.update(BookingUpdate {
            selected_room: Some(room.clone()),
            ..Default::default()
        });
        assert_eq!(check_entry(Step::GuestInformation, state.record()), Gate::Allowed);

        let children: Vec<Child> = Vec::new();
        assert!(validate_guest_count(2, children.len(), room.capacity).is_ok());
        let info = guest();
        assert!(validate_required(&info.first_name).is_ok());
        assert!(validate_required(&info.last_name).is_ok());
        assert!(validate_email(&info.email).is_ok());
        assert!(validate_required(&info.phone).is_ok());
        state.update(BookingUpdate {
            adults: Some(2),
            children: Some(children),
            guest_info: Some(info),
            ..Default::default()
        });
        assert_eq!(check_entry(Step::BookingSummary, state.record()), Gate::Allowed);
        assert_eq!(check_entry(Step::Payment, state.record()), Gate::Allowed);

        let payment = card();
        assert!(validate_card_number(&payment.card_number).is_ok());
        assert!(validate_card_holder(&payment.card_holder).is_ok());
        assert!(validate_expiry(&payment.expiry_date).is_ok());
        assert!(validate_cvv(&payment.cvv).is_ok());
        state.update(BookingUpdate {
            payment_info: Some(payment),
            ..Default::default()
        });

        assert_eq!(check_entry(Step::Confirmation, state.record()), Gate::Allowed);
        assert_eq!(state.nights(), 2);
        assert_eq!(format_brl(state.breakdown().total), "R$ 874.00");
        assert!(
            state.record().guest_count() <= state.record().selected_room.as_ref().unwrap().capacity
        );
    }

    #[tokio::test]
    async fn simulated_payment_always_succeeds() {
        assert_eq!(process_payment().await, PaymentOutcome::Succeeded);
    }
}
