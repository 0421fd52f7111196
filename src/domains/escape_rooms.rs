//! Escape room venue: rooms, team bookings and the per-room leaderboard.

use super::{Domain, parse_status, rows, seed_time, unknown_collection};
use crate::collection::{Collection, Dependent, Dependents, Relation, relabel_dependents};
use crate::core::{HasStatus, Lifecycle, RecordError, RecordId, Result};
use crate::manager::RecordManager;
use crate::{Record, lifecycle, view};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

lifecycle! {
    pub enum BookingStatus {
        Booked = "booked" => [CheckedIn, Cancelled],
        CheckedIn = "checked_in" => [Escaped, Failed],
        Escaped = "escaped" => [],
        Failed = "failed" => [],
        Cancelled = "cancelled" => [],
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Record)]
#[serde(rename_all = "camelCase")]
#[record(kind = "room")]
pub struct Room {
    pub id: RecordId,
    #[record(required, search)]
    pub name: String,
    #[record(search)]
    pub theme: String,
    pub difficulty: u8,
    pub capacity: u32,
    pub duration_minutes: u32,
    #[record(non_negative)]
    pub price_per_player: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Record)]
#[serde(rename_all = "camelCase")]
#[record(kind = "booking")]
pub struct Booking {
    pub id: RecordId,
    #[record(required)]
    pub room_id: RecordId,
    #[record(search)]
    pub room_name: String,
    #[record(required, search)]
    pub team_name: String,
    pub players: u32,
    #[serde(with = "crate::timestamp")]
    pub scheduled_at: DateTime<Utc>,
    pub status: BookingStatus,
    #[record(non_negative)]
    pub amount: f64,
    #[serde(default, with = "crate::timestamp::option")]
    pub checked_in_at: Option<DateTime<Utc>>,
    #[serde(default)]
    #[record(non_negative)]
    pub escape_minutes: Option<f64>,
}

impl HasStatus for Booking {
    type Status = BookingStatus;

    fn status(&self) -> BookingStatus {
        self.status
    }

    fn set_status(&mut self, status: BookingStatus) {
        self.status = status;
    }

    fn on_transition(&mut self, _from: BookingStatus) {
        if self.status == BookingStatus::CheckedIn {
            self.checked_in_at = Some(Utc::now());
        }
    }
}

fn booking_room(booking: &Booking) -> Option<&RecordId> {
    Some(&booking.room_id)
}

fn booking_room_label(booking: &mut Booking) -> &mut String {
    &mut booking.room_name
}

/// Rooms with booking history stay; retire them by renaming instead.
pub static BOOKING_ROOM: Relation<Booking> =
    Relation::restrict("bookings", booking_room).with_label(booking_room_label);

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EscapeRoomsDashboard {
    pub rooms: usize,
    pub upcoming: usize,
    pub revenue: f64,
    /// Share of finished games that ended in an escape; `0.0` before any game.
    pub escape_rate: f64,
    pub bookings_by_status: BTreeMap<&'static str, usize>,
}

pub struct EscapeRooms {
    pub rooms: Collection<Room>,
    pub bookings: Collection<Booking>,
}

impl EscapeRooms {
    pub fn add_room(
        &mut self,
        name: &str,
        theme: &str,
        capacity: u32,
        price_per_player: f64,
    ) -> Result<Room> {
        self.rooms.create(|id| Room {
            id,
            name: name.to_string(),
            theme: theme.to_string(),
            difficulty: 3,
            capacity,
            duration_minutes: 60,
            price_per_player,
        })
    }

    /// Books a room for a team; the amount is per player.
    pub fn book(
        &mut self,
        room_id: &RecordId,
        team_name: &str,
        players: u32,
        scheduled_at: DateTime<Utc>,
    ) -> Result<Booking> {
        let room = self.rooms.require(room_id)?;
        let room_name = room.name.clone();
        let amount = room.price_per_player * f64::from(players);
        self.bookings.create(|id| Booking {
            id,
            room_id: room_id.clone(),
            room_name,
            team_name: team_name.to_string(),
            players,
            scheduled_at,
            status: BookingStatus::Booked,
            amount,
            checked_in_at: None,
            escape_minutes: None,
        })
    }

    pub fn check_in(&mut self, id: &RecordId) -> Result<Booking> {
        self.bookings.transition(id, BookingStatus::CheckedIn)
    }

    pub fn cancel(&mut self, id: &RecordId) -> Result<Booking> {
        self.bookings.transition(id, BookingStatus::Cancelled)
    }

    /// Ends a game: `Some(minutes)` is an escape, `None` a failure.
    pub fn finish(&mut self, id: &RecordId, escape_minutes: Option<f64>) -> Result<Booking> {
        match escape_minutes {
            Some(minutes) => self
                .bookings
                .transition_with(id, BookingStatus::Escaped, |booking| {
                    booking.escape_minutes = Some(minutes);
                }),
            None => self.bookings.transition(id, BookingStatus::Failed),
        }
    }

    /// Escaped teams of one room, fastest first.
    pub fn leaderboard(&self, room_id: &RecordId) -> Vec<&Booking> {
        view::sorted_by(
            self.bookings.records(),
            |booking| {
                booking.room_id == *room_id
                    && booking.status == BookingStatus::Escaped
                    && booking.escape_minutes.is_some()
            },
            |booking| booking.escape_minutes.unwrap_or(f64::NAN),
        )
    }

    pub fn rename_room(&mut self, id: &RecordId, name: &str) -> Result<Room> {
        let room = self.rooms.update(id, |room| room.name = name.to_string())?;
        let mut bookings = Dependent::new(&mut self.bookings, &BOOKING_ROOM);
        relabel_dependents(id, &room.name, &mut [&mut bookings as &mut dyn Dependents])?;
        Ok(room)
    }

    pub fn remove_room(&mut self, id: &RecordId) -> Result<Vec<(&'static str, usize)>> {
        let mut bookings = Dependent::new(&mut self.bookings, &BOOKING_ROOM);
        let removal = self
            .rooms
            .remove_with(id, &mut [&mut bookings as &mut dyn Dependents])?;
        Ok(removal.released)
    }

    fn escape_rate(&self) -> f64 {
        let escaped = self
            .bookings
            .count_where(|booking| booking.status == BookingStatus::Escaped);
        let failed = self
            .bookings
            .count_where(|booking| booking.status == BookingStatus::Failed);
        match escaped + failed {
            0 => 0.0,
            finished => escaped as f64 / finished as f64,
        }
    }
}

impl Domain for EscapeRooms {
    const NAME: &'static str = "escape-rooms";
    const COLLECTIONS: &'static [&'static str] = &["rooms", "bookings"];

    type Dashboard = EscapeRoomsDashboard;

    fn open(manager: &RecordManager) -> Result<Self> {
        Ok(Self {
            rooms: manager.open("rooms", seed_rooms)?,
            bookings: manager.open("bookings", seed_bookings)?,
        })
    }

    fn dashboard(&self) -> EscapeRoomsDashboard {
        EscapeRoomsDashboard {
            rooms: self.rooms.len(),
            upcoming: self
                .bookings
                .count_where(|booking| booking.status == BookingStatus::Booked),
            revenue: self.bookings.sum_where(
                |booking| booking.status != BookingStatus::Cancelled,
                |booking| booking.amount,
            ),
            escape_rate: self.escape_rate(),
            bookings_by_status: self.bookings.status_counts(),
        }
    }

    fn counts(&self) -> Vec<(&'static str, usize)> {
        vec![
            ("rooms", self.rooms.len()),
            ("bookings", self.bookings.len()),
        ]
    }

    fn list(&self, collection: &str, query: Option<&str>) -> Result<Vec<Value>> {
        match collection {
            "rooms" => rows(&self.rooms, query),
            "bookings" => rows(&self.bookings, query),
            other => unknown_collection(other),
        }
    }

    fn set_status(&mut self, collection: &str, id: &RecordId, status: &str) -> Result<()> {
        match collection {
            "bookings" => match parse_status::<Booking>(status)? {
                // an escape is recorded with its time; see `finish`
                BookingStatus::Escaped
                    if self.bookings.require(id)?.status != BookingStatus::Escaped =>
                {
                    Err(RecordError::MissingDetail {
                        kind: "booking",
                        id: id.to_string(),
                        status: BookingStatus::Escaped.label(),
                        needs: "an escape time",
                    })
                }
                BookingStatus::Failed => self.finish(id, None).map(|_| ()),
                other => self.bookings.transition(id, other).map(|_| ()),
            },
            other => unknown_collection(other),
        }
    }

    fn remove(&mut self, collection: &str, id: &RecordId) -> Result<Vec<(&'static str, usize)>> {
        match collection {
            "rooms" => self.remove_room(id),
            "bookings" => self.bookings.remove(id).map(|_| Vec::new()),
            other => unknown_collection(other),
        }
    }
}

pub fn seed_rooms() -> Vec<Room> {
    vec![
        Room {
            id: RecordId::new("1"),
            name: "The Pharaoh's Tomb".to_string(),
            theme: "Adventure".to_string(),
            difficulty: 4,
            capacity: 6,
            duration_minutes: 60,
            price_per_player: 30.0,
        },
        Room {
            id: RecordId::new("2"),
            name: "Asylum 13".to_string(),
            theme: "Horror".to_string(),
            difficulty: 5,
            capacity: 5,
            duration_minutes: 75,
            price_per_player: 35.0,
        },
    ]
}

pub fn seed_bookings() -> Vec<Booking> {
    vec![
        Booking {
            id: RecordId::new("1"),
            room_id: RecordId::new("1"),
            room_name: "The Pharaoh's Tomb".to_string(),
            team_name: "Puzzle Masters".to_string(),
            players: 4,
            scheduled_at: seed_time(2024, 3, 2, 18, 0),
            status: BookingStatus::Escaped,
            amount: 120.0,
            checked_in_at: Some(seed_time(2024, 3, 2, 17, 50)),
            escape_minutes: Some(48.5),
        },
        Booking {
            id: RecordId::new("2"),
            room_id: RecordId::new("1"),
            room_name: "The Pharaoh's Tomb".to_string(),
            team_name: "Lost Explorers".to_string(),
            players: 5,
            scheduled_at: seed_time(2024, 3, 3, 19, 0),
            status: BookingStatus::Failed,
            amount: 150.0,
            checked_in_at: Some(seed_time(2024, 3, 3, 18, 55)),
            escape_minutes: None,
        },
        Booking {
            id: RecordId::new("3"),
            room_id: RecordId::new("2"),
            room_name: "Asylum 13".to_string(),
            team_name: "Night Owls".to_string(),
            players: 3,
            scheduled_at: seed_time(2024, 3, 9, 20, 0),
            status: BookingStatus::Booked,
            amount: 105.0,
            checked_in_at: None,
            escape_minutes: None,
        },
    ]
}
