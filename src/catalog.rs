use std::sync::LazyLock;

use crate::models::Room;

/// The hotel's room offerings. Fixed list, embedded at compile time; the
/// selection screen and the booking record only ever read from it.
static ROOMS: LazyLock<Vec<Room>> = LazyLock::new(|| {
    serde_json::from_str(include_str!("rooms.json")).expect("rooms.json is shipped with the binary and must parse")
});

pub fn rooms() -> &'static [Room] {
    &ROOMS
}

pub fn room_by_id(id: &str) -> Option<&'static Room> {
    ROOMS.iter().find(|room| room.id == id)
}
