use chrono::NaiveDateTime;
use serde::Deserialize;
use url::Url;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Room {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub capacity: u32,
    pub image: Url,
    pub amenities: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Child {
    pub age: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestInfo {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentInfo {
    pub card_number: String,
    pub card_holder: String,
    pub expiry_date: String,
    pub cvv: String,
}

/// Everything the visitor has entered so far, accumulated screen by screen.
/// Calendar picks land at midnight; the field still carries a time of day so
/// sub-day differences stay representable for the nights arithmetic.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingRecord {
    pub check_in: Option<NaiveDateTime>,
    pub check_out: Option<NaiveDateTime>,
    pub selected_room: Option<Room>,
    pub adults: u32,
    pub children: Vec<Child>,
    pub guest_info: Option<GuestInfo>,
    pub payment_info: Option<PaymentInfo>,
}

impl Default for BookingRecord {
    fn default() -> Self {
        BookingRecord {
            check_in: None,
            check_out: None,
            selected_room: None,
            adults: 1,
            children: Vec::new(),
            guest_info: None,
            payment_info: None,
        }
    }
}

impl BookingRecord {
    pub fn guest_count(&self) -> u32 {
        self.adults + self.children.len() as u32
    }
}
