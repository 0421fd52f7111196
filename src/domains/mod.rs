//! Vertical dashboards built on the record manager.
//!
//! Each domain opens its collections through one [`RecordManager`], seeds
//! sample data on first use and exposes a dashboard aggregate.

pub mod car_parts;
pub mod crm;
pub mod delivery;
pub mod escape_rooms;

use crate::collection::Collection;
use crate::core::{
    HasStatus, Lifecycle, PersistenceError, Record, RecordError, RecordId, Result, Searchable,
};
use crate::manager::RecordManager;
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::Value;

pub use car_parts::CarParts;
pub use crm::Crm;
pub use delivery::Deliveries;
pub use escape_rooms::EscapeRooms;

/// The surface the CLI drives, uniform across domains.
pub trait Domain: Sized {
    const NAME: &'static str;
    const COLLECTIONS: &'static [&'static str];

    type Dashboard: Serialize;

    fn open(manager: &RecordManager) -> Result<Self>;

    fn dashboard(&self) -> Self::Dashboard;

    /// Record count per collection, in `COLLECTIONS` order.
    fn counts(&self) -> Vec<(&'static str, usize)>;

    /// Records of `collection` as JSON, filtered by `query` when given.
    fn list(&self, collection: &str, query: Option<&str>) -> Result<Vec<Value>>;

    fn set_status(&mut self, collection: &str, id: &RecordId, status: &str) -> Result<()>;

    /// Deletes with the domain's cascade rules; returns affected dependents.
    fn remove(&mut self, collection: &str, id: &RecordId) -> Result<Vec<(&'static str, usize)>>;
}

pub(crate) fn rows<R>(collection: &Collection<R>, query: Option<&str>) -> Result<Vec<Value>>
where
    R: Record + Searchable,
{
    let matching = match query {
        Some(query) => collection.search(query),
        None => collection.iter().collect(),
    };
    matching
        .into_iter()
        .map(|record| {
            serde_json::to_value(record).map_err(|e| {
                RecordError::from(PersistenceError::Encode {
                    key: collection.key().to_string(),
                    reason: e.to_string(),
                })
            })
        })
        .collect()
}

pub(crate) fn parse_status<R: HasStatus>(label: &str) -> Result<R::Status> {
    <R::Status as Lifecycle>::from_label(label).ok_or_else(|| RecordError::UnknownStatus {
        kind: R::KIND,
        label: label.to_string(),
    })
}

pub(crate) fn unknown_collection<T>(collection: &str) -> Result<T> {
    Err(RecordError::UnknownCollection(collection.to_string()))
}

/// Fixed timestamps for seed data.
pub(crate) fn seed_time(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0)
        .single()
        .unwrap_or_default()
}
