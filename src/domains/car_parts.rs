//! Car parts shop: inventory, counter sales and suppliers.

use super::{Domain, parse_status, rows, seed_time, unknown_collection};
use crate::collection::{Collection, Dependent, Dependents, Relation, relabel_dependents};
use crate::core::{HasStatus, RecordId, Result};
use crate::manager::RecordManager;
use crate::{Record, lifecycle, view};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{error, warn};

lifecycle! {
    pub enum SaleStatus {
        Pending = "pending" => [Completed, Cancelled],
        Completed = "completed" => [],
        Cancelled = "cancelled" => [Pending],
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Record)]
#[serde(rename_all = "camelCase")]
#[record(kind = "part")]
pub struct Part {
    pub id: RecordId,
    #[record(required, search)]
    pub name: String,
    #[record(required, search)]
    pub part_number: String,
    #[record(search)]
    pub category: String,
    pub quantity: u32,
    pub min_stock: u32,
    #[record(non_negative)]
    pub cost: f64,
    #[record(non_negative)]
    pub price: f64,
    #[serde(default)]
    pub supplier_id: Option<RecordId>,
    #[serde(default)]
    #[record(search)]
    pub supplier_name: String,
    #[serde(with = "crate::timestamp")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Record)]
#[serde(rename_all = "camelCase")]
#[record(kind = "sale")]
pub struct Sale {
    pub id: RecordId,
    #[record(required)]
    pub part_id: RecordId,
    #[record(search)]
    pub part_name: String,
    #[record(required, search)]
    pub customer_name: String,
    pub quantity: u32,
    #[record(non_negative)]
    pub amount: f64,
    pub status: SaleStatus,
    #[serde(with = "crate::timestamp")]
    pub sold_at: DateTime<Utc>,
}

impl HasStatus for Sale {
    type Status = SaleStatus;

    fn status(&self) -> SaleStatus {
        self.status
    }

    fn set_status(&mut self, status: SaleStatus) {
        self.status = status;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Record)]
#[serde(rename_all = "camelCase")]
#[record(kind = "supplier")]
pub struct Supplier {
    pub id: RecordId,
    #[record(required, search)]
    pub name: String,
    #[record(search)]
    pub contact: String,
    pub phone: String,
}

fn part_supplier(part: &Part) -> Option<&RecordId> {
    part.supplier_id.as_ref()
}

fn clear_part_supplier(part: &mut Part) {
    part.supplier_id = None;
}

fn part_supplier_label(part: &mut Part) -> &mut String {
    &mut part.supplier_name
}

fn sale_part(sale: &Sale) -> Option<&RecordId> {
    Some(&sale.part_id)
}

fn sale_part_label(sale: &mut Sale) -> &mut String {
    &mut sale.part_name
}

/// Parts outlive their supplier.
pub static PART_SUPPLIER: Relation<Part> =
    Relation::detach("parts", part_supplier, clear_part_supplier).with_label(part_supplier_label);

/// A part with recorded sales cannot be deleted.
pub static SALE_PART: Relation<Sale> =
    Relation::restrict("sales", sale_part).with_label(sale_part_label);

#[derive(Debug, Clone, Default)]
pub struct NewPart {
    pub name: String,
    pub part_number: String,
    pub category: String,
    pub quantity: u32,
    pub min_stock: u32,
    pub cost: f64,
    pub price: f64,
    pub supplier_id: Option<RecordId>,
}

#[derive(Debug, Clone, Default)]
pub struct NewSale {
    pub part_id: RecordId,
    pub customer_name: String,
    pub quantity: u32,
    /// Defaults to the part's price times the quantity.
    pub amount: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CarPartsDashboard {
    pub total_parts: usize,
    pub total_units: u64,
    pub inventory_value: f64,
    pub low_stock: usize,
    pub suppliers: usize,
    pub revenue: f64,
    pub profit: f64,
    pub sales_by_status: BTreeMap<&'static str, usize>,
}

pub struct CarParts {
    pub parts: Collection<Part>,
    pub sales: Collection<Sale>,
    pub suppliers: Collection<Supplier>,
}

impl CarParts {
    pub fn add_part(&mut self, draft: NewPart) -> Result<Part> {
        let supplier_name = match &draft.supplier_id {
            Some(supplier_id) => self.suppliers.require(supplier_id)?.name.clone(),
            None => String::new(),
        };
        self.parts.create(|id| Part {
            id,
            name: draft.name,
            part_number: draft.part_number,
            category: draft.category,
            quantity: draft.quantity,
            min_stock: draft.min_stock,
            cost: draft.cost,
            price: draft.price,
            supplier_id: draft.supplier_id,
            supplier_name,
            created_at: Utc::now(),
        })
    }

    pub fn add_supplier(&mut self, name: &str, contact: &str, phone: &str) -> Result<Supplier> {
        self.suppliers.create(|id| Supplier {
            id,
            name: name.to_string(),
            contact: contact.to_string(),
            phone: phone.to_string(),
        })
    }

    /// Records a pending sale against an existing part.
    pub fn record_sale(&mut self, draft: NewSale) -> Result<Sale> {
        let part = self.parts.require(&draft.part_id)?;
        let part_name = part.name.clone();
        let amount = draft
            .amount
            .unwrap_or(part.price * f64::from(draft.quantity));
        self.sales.create(|id| Sale {
            id,
            part_id: draft.part_id,
            part_name,
            customer_name: draft.customer_name,
            quantity: draft.quantity,
            amount,
            status: SaleStatus::Pending,
            sold_at: Utc::now(),
        })
    }

    /// Completes a sale and takes the sold units out of stock.
    ///
    /// Stock is written first. If the sale write then fails, the stock is put
    /// back so the sale can be completed again.
    pub fn complete_sale(&mut self, id: &RecordId) -> Result<Sale> {
        let sale = self.sales.require(id)?.clone();
        if sale.status == SaleStatus::Completed {
            return Ok(sale);
        }
        self.sales.ensure_transition(id, SaleStatus::Completed)?;
        self.sales.ensure_writable()?;

        let previous = match self.parts.get(&sale.part_id) {
            Some(part) => Some(part.quantity),
            None => {
                warn!(sale = %sale.id, part = %sale.part_id, "completed sale references a missing part");
                None
            }
        };
        if previous.is_some() {
            self.parts.update(&sale.part_id, |part| {
                part.quantity = part.quantity.saturating_sub(sale.quantity);
            })?;
        }

        match self.sales.transition(id, SaleStatus::Completed) {
            Ok(sale) => Ok(sale),
            Err(err) => {
                if let Some(quantity) = previous {
                    let restored = self
                        .parts
                        .update(&sale.part_id, |part| part.quantity = quantity);
                    if let Err(restore) = restored {
                        error!(part = %sale.part_id, error = %restore, "failed to restore stock");
                    }
                }
                Err(err)
            }
        }
    }

    pub fn cancel_sale(&mut self, id: &RecordId) -> Result<Sale> {
        self.sales.transition(id, SaleStatus::Cancelled)
    }

    pub fn restock(&mut self, part_id: &RecordId, units: u32) -> Result<Part> {
        self.parts.update(part_id, |part| {
            part.quantity = part.quantity.saturating_add(units);
        })
    }

    /// Renames a part and every sale's copy of its name.
    pub fn rename_part(&mut self, id: &RecordId, name: &str) -> Result<Part> {
        let part = self.parts.update(id, |part| part.name = name.to_string())?;
        let mut sales = Dependent::new(&mut self.sales, &SALE_PART);
        relabel_dependents(id, &part.name, &mut [&mut sales as &mut dyn Dependents])?;
        Ok(part)
    }

    pub fn rename_supplier(&mut self, id: &RecordId, name: &str) -> Result<Supplier> {
        let supplier = self
            .suppliers
            .update(id, |supplier| supplier.name = name.to_string())?;
        let mut parts = Dependent::new(&mut self.parts, &PART_SUPPLIER);
        relabel_dependents(id, &supplier.name, &mut [&mut parts as &mut dyn Dependents])?;
        Ok(supplier)
    }

    pub fn remove_supplier(&mut self, id: &RecordId) -> Result<Vec<(&'static str, usize)>> {
        let mut parts = Dependent::new(&mut self.parts, &PART_SUPPLIER);
        let removal = self
            .suppliers
            .remove_with(id, &mut [&mut parts as &mut dyn Dependents])?;
        Ok(removal.released)
    }

    pub fn remove_part(&mut self, id: &RecordId) -> Result<Vec<(&'static str, usize)>> {
        let mut sales = Dependent::new(&mut self.sales, &SALE_PART);
        let removal = self
            .parts
            .remove_with(id, &mut [&mut sales as &mut dyn Dependents])?;
        Ok(removal.released)
    }

    pub fn low_stock(&self) -> Vec<&Part> {
        view::at_or_below(self.parts.records(), |part| part.quantity, |part| part.min_stock)
    }

    pub fn revenue(&self) -> f64 {
        self.sales
            .sum_where(|sale| sale.status == SaleStatus::Completed, |sale| sale.amount)
    }

    /// Revenue minus the cost of the parts sold. A sale whose part no longer
    /// exists contributes its full amount.
    pub fn profit(&self) -> f64 {
        let parts = self.parts.records();
        self.sales.sum_where(
            |sale| sale.status == SaleStatus::Completed,
            |sale| {
                let unit_cost = view::lookup_or_zero(parts, &sale.part_id, |part| part.cost);
                sale.amount - unit_cost * f64::from(sale.quantity)
            },
        )
    }
}

impl Domain for CarParts {
    const NAME: &'static str = "car-parts";
    const COLLECTIONS: &'static [&'static str] = &["parts", "sales", "suppliers"];

    type Dashboard = CarPartsDashboard;

    fn open(manager: &RecordManager) -> Result<Self> {
        Ok(Self {
            suppliers: manager.open("suppliers", seed_suppliers)?,
            parts: manager.open("parts", seed_parts)?,
            sales: manager.open("sales", seed_sales)?,
        })
    }

    fn dashboard(&self) -> CarPartsDashboard {
        let parts = self.parts.records();
        CarPartsDashboard {
            total_parts: parts.len(),
            total_units: parts.iter().map(|part| u64::from(part.quantity)).sum(),
            inventory_value: view::sum(parts, |part| f64::from(part.quantity) * part.cost),
            low_stock: self.low_stock().len(),
            suppliers: self.suppliers.len(),
            revenue: self.revenue(),
            profit: self.profit(),
            sales_by_status: self.sales.status_counts(),
        }
    }

    fn counts(&self) -> Vec<(&'static str, usize)> {
        vec![
            ("parts", self.parts.len()),
            ("sales", self.sales.len()),
            ("suppliers", self.suppliers.len()),
        ]
    }

    fn list(&self, collection: &str, query: Option<&str>) -> Result<Vec<Value>> {
        match collection {
            "parts" => rows(&self.parts, query),
            "sales" => rows(&self.sales, query),
            "suppliers" => rows(&self.suppliers, query),
            other => unknown_collection(other),
        }
    }

    fn set_status(&mut self, collection: &str, id: &RecordId, status: &str) -> Result<()> {
        match collection {
            "sales" => match parse_status::<Sale>(status)? {
                SaleStatus::Completed => self.complete_sale(id).map(|_| ()),
                other => self.sales.transition(id, other).map(|_| ()),
            },
            other => unknown_collection(other),
        }
    }

    fn remove(&mut self, collection: &str, id: &RecordId) -> Result<Vec<(&'static str, usize)>> {
        match collection {
            "parts" => self.remove_part(id),
            "suppliers" => self.remove_supplier(id),
            "sales" => self.sales.remove(id).map(|_| Vec::new()),
            other => unknown_collection(other),
        }
    }
}

pub fn seed_suppliers() -> Vec<Supplier> {
    vec![
        Supplier {
            id: RecordId::new("1"),
            name: "AutoZone Wholesale".to_string(),
            contact: "Mike Turner".to_string(),
            phone: "555-0101".to_string(),
        },
        Supplier {
            id: RecordId::new("2"),
            name: "Bosch Distribution".to_string(),
            contact: "Anna Keller".to_string(),
            phone: "555-0102".to_string(),
        },
    ]
}

pub fn seed_parts() -> Vec<Part> {
    fn part(id: &str, name: &str, number: &str, category: &str, quantity: u32, cost: f64, price: f64) -> Part {
        Part {
            id: RecordId::new(id),
            name: name.to_string(),
            part_number: number.to_string(),
            category: category.to_string(),
            quantity,
            min_stock: 20,
            cost,
            price,
            supplier_id: None,
            supplier_name: String::new(),
            created_at: seed_time(2024, 1, 10, 9, 0),
        }
    }

    let mut parts = vec![
        part("1", "Brake Pads", "BP-1001", "Brakes", 45, 25.0, 49.99),
        part("2", "Oil Filter", "OF-2002", "Engine", 8, 4.5, 12.99),
        part("3", "Spark Plug", "SP-3003", "Ignition", 120, 2.25, 7.5),
    ];
    let suppliers = seed_suppliers();
    for (part, supplier) in parts.iter_mut().zip([&suppliers[0], &suppliers[1], &suppliers[1]]) {
        part.supplier_id = Some(supplier.id.clone());
        part.supplier_name = supplier.name.clone();
    }
    parts
}

pub fn seed_sales() -> Vec<Sale> {
    vec![
        Sale {
            id: RecordId::new("1"),
            part_id: RecordId::new("1"),
            part_name: "Brake Pads".to_string(),
            customer_name: "John Smith".to_string(),
            quantity: 2,
            amount: 99.98,
            status: SaleStatus::Completed,
            sold_at: seed_time(2024, 1, 15, 10, 30),
        },
        Sale {
            id: RecordId::new("2"),
            part_id: RecordId::new("3"),
            part_name: "Spark Plug".to_string(),
            customer_name: "Maria Garcia".to_string(),
            quantity: 4,
            amount: 30.0,
            status: SaleStatus::Pending,
            sold_at: seed_time(2024, 1, 16, 14, 0),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use std::sync::Arc;

    fn open() -> CarParts {
        let manager = RecordManager::new(Arc::new(MemoryStore::new()), CarParts::NAME);
        CarParts::open(&manager).unwrap()
    }

    #[test]
    fn seed_profit_uses_part_cost() {
        let shop = open();
        // one completed sale: 2 brake pads at 99.98, cost 25 each
        assert!((shop.revenue() - 99.98).abs() < 1e-9);
        assert!((shop.profit() - 49.98).abs() < 1e-9);
    }

    #[test]
    fn completing_a_sale_twice_only_takes_stock_once() {
        let mut shop = open();
        let id = RecordId::new("2");
        shop.complete_sale(&id).unwrap();
        shop.complete_sale(&id).unwrap();
        assert_eq!(shop.parts.get(&RecordId::new("3")).unwrap().quantity, 116);
    }
}
