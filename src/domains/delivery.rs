//! Local courier service: drivers and the deliveries they carry.

use super::{Domain, parse_status, rows, seed_time, unknown_collection};
use crate::collection::{Collection, Dependent, Dependents, Relation, relabel_dependents};
use crate::core::{HasStatus, Lifecycle, RecordError, RecordId, Result};
use crate::manager::RecordManager;
use crate::{Record, lifecycle};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::info;

lifecycle! {
    pub enum DeliveryStatus {
        Pending = "pending" => [Assigned, Cancelled],
        Assigned = "assigned" => [InTransit, Pending, Cancelled],
        InTransit = "in_transit" => [Delivered, Failed],
        Delivered = "delivered" => [],
        Failed = "failed" => [],
        Cancelled = "cancelled" => [],
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Record)]
#[serde(rename_all = "camelCase")]
#[record(kind = "driver")]
pub struct Driver {
    pub id: RecordId,
    #[record(required, search)]
    pub name: String,
    pub phone: String,
    #[record(search)]
    pub vehicle: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Record)]
#[serde(rename_all = "camelCase")]
#[record(kind = "delivery")]
pub struct Delivery {
    pub id: RecordId,
    #[record(required, search)]
    pub customer_name: String,
    #[record(required, search)]
    pub address: String,
    #[serde(default)]
    pub driver_id: Option<RecordId>,
    #[serde(default)]
    #[record(search)]
    pub driver_name: String,
    #[record(non_negative)]
    pub fee: f64,
    pub status: DeliveryStatus,
    #[serde(with = "crate::timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "crate::timestamp::option")]
    pub delivered_at: Option<DateTime<Utc>>,
}

impl HasStatus for Delivery {
    type Status = DeliveryStatus;

    fn status(&self) -> DeliveryStatus {
        self.status
    }

    fn set_status(&mut self, status: DeliveryStatus) {
        self.status = status;
    }

    fn on_transition(&mut self, _from: DeliveryStatus) {
        match self.status {
            DeliveryStatus::Delivered => self.delivered_at = Some(Utc::now()),
            // back in the queue: nobody carries it any more
            DeliveryStatus::Pending => {
                self.driver_id = None;
                self.driver_name.clear();
            }
            _ => {}
        }
    }
}

fn delivery_driver(delivery: &Delivery) -> Option<&RecordId> {
    delivery.driver_id.as_ref()
}

fn clear_delivery_driver(delivery: &mut Delivery) {
    delivery.driver_id = None;
}

fn delivery_driver_label(delivery: &mut Delivery) -> &mut String {
    &mut delivery.driver_name
}

pub static DELIVERY_DRIVER: Relation<Delivery> =
    Relation::detach("deliveries", delivery_driver, clear_delivery_driver)
        .with_label(delivery_driver_label);

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryDashboard {
    pub drivers: usize,
    pub active_drivers: usize,
    pub open_deliveries: usize,
    pub delivered_fees: f64,
    pub deliveries_by_status: BTreeMap<&'static str, usize>,
}

pub struct Deliveries {
    pub drivers: Collection<Driver>,
    pub deliveries: Collection<Delivery>,
}

impl Deliveries {
    pub fn add_driver(&mut self, name: &str, phone: &str, vehicle: &str) -> Result<Driver> {
        self.drivers.create(|id| Driver {
            id,
            name: name.to_string(),
            phone: phone.to_string(),
            vehicle: vehicle.to_string(),
            active: true,
        })
    }

    pub fn create_delivery(&mut self, customer_name: &str, address: &str, fee: f64) -> Result<Delivery> {
        self.deliveries.create(|id| Delivery {
            id,
            customer_name: customer_name.to_string(),
            address: address.to_string(),
            driver_id: None,
            driver_name: String::new(),
            fee,
            status: DeliveryStatus::Pending,
            created_at: Utc::now(),
            delivered_at: None,
        })
    }

    /// Hands a pending delivery to a driver, or moves an assigned one to
    /// another driver.
    pub fn assign(&mut self, id: &RecordId, driver_id: &RecordId) -> Result<Delivery> {
        let driver_name = self.drivers.require(driver_id)?.name.clone();
        let set_driver = |delivery: &mut Delivery| {
            delivery.driver_id = Some(driver_id.clone());
            delivery.driver_name = driver_name;
        };
        // reassignment keeps the status and only swaps the driver
        let delivery = if self.deliveries.require(id)?.status == DeliveryStatus::Assigned {
            self.deliveries.update(id, set_driver)?
        } else {
            self.deliveries
                .transition_with(id, DeliveryStatus::Assigned, set_driver)?
        };
        info!(delivery = %delivery.id, driver = %driver_id, "delivery assigned");
        Ok(delivery)
    }

    /// Moves a delivery to `next`; entering `delivered` stamps the time.
    pub fn advance(&mut self, id: &RecordId, next: DeliveryStatus) -> Result<Delivery> {
        self.deliveries.transition(id, next)
    }

    pub fn rename_driver(&mut self, id: &RecordId, name: &str) -> Result<Driver> {
        let driver = self.drivers.update(id, |driver| driver.name = name.to_string())?;
        let mut deliveries = Dependent::new(&mut self.deliveries, &DELIVERY_DRIVER);
        relabel_dependents(id, &driver.name, &mut [&mut deliveries as &mut dyn Dependents])?;
        Ok(driver)
    }

    /// Deletes a driver; their deliveries stay, unassigned.
    pub fn remove_driver(&mut self, id: &RecordId) -> Result<Vec<(&'static str, usize)>> {
        let mut deliveries = Dependent::new(&mut self.deliveries, &DELIVERY_DRIVER);
        let removal = self
            .drivers
            .remove_with(id, &mut [&mut deliveries as &mut dyn Dependents])?;
        Ok(removal.released)
    }

    pub fn delivered_fees(&self) -> f64 {
        self.deliveries.sum_where(
            |delivery| delivery.status == DeliveryStatus::Delivered,
            |delivery| delivery.fee,
        )
    }
}

impl Domain for Deliveries {
    const NAME: &'static str = "delivery";
    const COLLECTIONS: &'static [&'static str] = &["drivers", "deliveries"];

    type Dashboard = DeliveryDashboard;

    fn open(manager: &RecordManager) -> Result<Self> {
        Ok(Self {
            drivers: manager.open("drivers", seed_drivers)?,
            deliveries: manager.open("deliveries", seed_deliveries)?,
        })
    }

    fn dashboard(&self) -> DeliveryDashboard {
        DeliveryDashboard {
            drivers: self.drivers.len(),
            active_drivers: self.drivers.count_where(|driver| driver.active),
            open_deliveries: self
                .deliveries
                .count_where(|delivery| !delivery.status.is_terminal()),
            delivered_fees: self.delivered_fees(),
            deliveries_by_status: self.deliveries.status_counts(),
        }
    }

    fn counts(&self) -> Vec<(&'static str, usize)> {
        vec![
            ("drivers", self.drivers.len()),
            ("deliveries", self.deliveries.len()),
        ]
    }

    fn list(&self, collection: &str, query: Option<&str>) -> Result<Vec<Value>> {
        match collection {
            "drivers" => rows(&self.drivers, query),
            "deliveries" => rows(&self.deliveries, query),
            other => unknown_collection(other),
        }
    }

    fn set_status(&mut self, collection: &str, id: &RecordId, status: &str) -> Result<()> {
        match collection {
            "deliveries" => match parse_status::<Delivery>(status)? {
                // a driver is part of the assignment; see `assign`
                DeliveryStatus::Assigned
                    if self.deliveries.require(id)?.status != DeliveryStatus::Assigned =>
                {
                    Err(RecordError::MissingDetail {
                        kind: "delivery",
                        id: id.to_string(),
                        status: DeliveryStatus::Assigned.label(),
                        needs: "a driver",
                    })
                }
                other => self.advance(id, other).map(|_| ()),
            },
            other => unknown_collection(other),
        }
    }

    fn remove(&mut self, collection: &str, id: &RecordId) -> Result<Vec<(&'static str, usize)>> {
        match collection {
            "drivers" => self.remove_driver(id),
            "deliveries" => self.deliveries.remove(id).map(|_| Vec::new()),
            other => unknown_collection(other),
        }
    }
}

pub fn seed_drivers() -> Vec<Driver> {
    vec![
        Driver {
            id: RecordId::new("1"),
            name: "Carlos Rivera".to_string(),
            phone: "555-0201".to_string(),
            vehicle: "Van".to_string(),
            active: true,
        },
        Driver {
            id: RecordId::new("2"),
            name: "Priya Patel".to_string(),
            phone: "555-0202".to_string(),
            vehicle: "Bike".to_string(),
            active: true,
        },
    ]
}

pub fn seed_deliveries() -> Vec<Delivery> {
    vec![
        Delivery {
            id: RecordId::new("1"),
            customer_name: "Emma Wilson".to_string(),
            address: "12 Harbor Rd".to_string(),
            driver_id: Some(RecordId::new("1")),
            driver_name: "Carlos Rivera".to_string(),
            fee: 15.0,
            status: DeliveryStatus::Delivered,
            created_at: seed_time(2024, 4, 1, 8, 30),
            delivered_at: Some(seed_time(2024, 4, 1, 9, 45)),
        },
        Delivery {
            id: RecordId::new("2"),
            customer_name: "Liam Brown".to_string(),
            address: "48 Elm St".to_string(),
            driver_id: Some(RecordId::new("2")),
            driver_name: "Priya Patel".to_string(),
            fee: 9.5,
            status: DeliveryStatus::InTransit,
            created_at: seed_time(2024, 4, 1, 10, 0),
            delivered_at: None,
        },
        Delivery {
            id: RecordId::new("3"),
            customer_name: "Olivia Davis".to_string(),
            address: "7 Maple Ave".to_string(),
            driver_id: None,
            driver_name: String::new(),
            fee: 12.0,
            status: DeliveryStatus::Pending,
            created_at: seed_time(2024, 4, 1, 11, 20),
            delivered_at: None,
        },
    ]
}
