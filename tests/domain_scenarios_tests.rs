//! End-to-end scenarios over the bundled domains

use recordkeep::domains::car_parts::{NewPart, NewSale, Sale, SaleStatus};
use recordkeep::domains::crm::QuoteStatus;
use recordkeep::domains::{CarParts, Crm, Deliveries, Domain, EscapeRooms};
use recordkeep::{
    ConflictPolicy, MemoryStore, PersistenceError, RecordError, RecordId, RecordManager,
    StoreConfig,
};
use std::sync::Arc;
use tempfile::TempDir;

fn manager(domain: &str) -> RecordManager {
    RecordManager::new(Arc::new(MemoryStore::new()), domain)
}

fn car_parts() -> CarParts {
    CarParts::open(&manager(CarParts::NAME)).unwrap()
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

fn is_conflict_on(err: &RecordError, expected: &str) -> bool {
    matches!(err, RecordError::Persistence(PersistenceError::Conflict { key }) if key == expected)
}

fn assert_no_dangling_references(crm: &Crm) {
    for project in crm.projects.iter() {
        assert!(crm.clients.contains(&project.client_id));
    }
    for quote in crm.quotes.iter() {
        assert!(crm.clients.contains(&quote.client_id));
        if let Some(project_id) = &quote.project_id {
            assert!(crm.projects.contains(project_id));
        }
    }
}

#[test]
fn test_low_stock_lists_only_parts_at_or_below_minimum() {
    let shop = car_parts();
    let quantities: Vec<u32> = shop.parts.iter().map(|part| part.quantity).collect();
    assert_eq!(quantities, vec![45, 8, 120]);

    let low: Vec<&str> = shop.low_stock().iter().map(|part| part.name.as_str()).collect();
    assert_eq!(low, vec!["Oil Filter"]);
    assert_eq!(shop.dashboard().low_stock, 1);
}

#[test]
fn test_sale_of_a_missing_part_still_counts_toward_profit() {
    let mut shop = car_parts();
    shop.sales
        .insert(Sale {
            id: RecordId::new("orphan"),
            part_id: RecordId::new("does-not-exist"),
            part_name: "Discontinued".to_string(),
            customer_name: "Walk-in".to_string(),
            quantity: 1,
            amount: 20.0,
            status: SaleStatus::Completed,
            sold_at: chrono::Utc::now(),
        })
        .unwrap();

    let dashboard = shop.dashboard();
    assert!(close(dashboard.revenue, 119.98));
    assert!(close(dashboard.profit, 69.98));
}

#[test]
fn test_parts_with_sales_cannot_be_deleted() {
    let mut shop = car_parts();
    let err = shop.remove_part(&RecordId::new("1")).unwrap_err();
    assert!(matches!(
        err,
        RecordError::Restricted {
            relation: "sales",
            count: 1,
            ..
        }
    ));
    assert_eq!(shop.parts.len(), 3);

    let released = shop.remove_part(&RecordId::new("2")).unwrap();
    assert!(released.is_empty());
    assert_eq!(shop.parts.len(), 2);
}

#[test]
fn test_removing_a_supplier_detaches_its_parts() {
    let mut shop = car_parts();
    let released = shop.remove_supplier(&RecordId::new("2")).unwrap();
    assert_eq!(released, vec![("parts", 2)]);
    for id in ["2", "3"] {
        let part = shop.parts.get(&RecordId::new(id)).unwrap();
        assert_eq!(part.supplier_id, None);
        assert!(part.supplier_name.is_empty());
    }
    assert_eq!(
        shop.parts.get(&RecordId::new("1")).unwrap().supplier_name,
        "AutoZone Wholesale"
    );
}

#[test]
fn test_new_sale_defaults_its_amount_and_requires_the_part() {
    let mut shop = car_parts();
    let part = shop
        .add_part(NewPart {
            name: "Wiper Blade".to_string(),
            part_number: "WB-4004".to_string(),
            quantity: 10,
            min_stock: 5,
            cost: 6.0,
            price: 15.0,
            supplier_id: Some(RecordId::new("1")),
            ..NewPart::default()
        })
        .unwrap();
    assert_eq!(part.supplier_name, "AutoZone Wholesale");

    let sale = shop
        .record_sale(NewSale {
            part_id: part.id.clone(),
            customer_name: "Ann Lee".to_string(),
            quantity: 3,
            amount: None,
        })
        .unwrap();
    assert!(close(sale.amount, 45.0));
    shop.complete_sale(&sale.id).unwrap();
    assert_eq!(shop.parts.get(&part.id).unwrap().quantity, 7);

    let err = shop
        .record_sale(NewSale {
            part_id: RecordId::new("nope"),
            customer_name: "Ann Lee".to_string(),
            quantity: 1,
            amount: None,
        })
        .unwrap_err();
    assert!(matches!(err, RecordError::NotFound { kind: "part", .. }));
}

#[test]
fn test_client_cascade_leaves_no_dangling_references() {
    let manager = manager(Crm::NAME);
    let mut crm = Crm::open(&manager).unwrap();
    let client = crm.add_client("Nora Park", "nora@park.dev", "Park Labs").unwrap();
    let project = crm.add_project(&client.id, "Brand Refresh", 4000.0, None).unwrap();
    crm.add_quote(&client.id, Some(&project.id), 4000.0).unwrap();
    crm.add_quote(&client.id, None, 500.0).unwrap();

    let released = crm.remove_client(&client.id).unwrap();
    assert_eq!(released, vec![("projects", 1), ("quotes", 2)]);

    assert_no_dangling_references(&Crm::open(&manager).unwrap());
}

#[test]
fn test_client_delete_refused_by_a_conflict_changes_nothing() {
    let manager = manager(Crm::NAME).conflict_policy(ConflictPolicy::FailFast);
    let mut office = Crm::open(&manager).unwrap();
    let mut laptop = Crm::open(&manager).unwrap();
    laptop.add_quote(&RecordId::new("1"), None, 250.0).unwrap();

    let err = office.remove_client(&RecordId::new("1")).unwrap_err();
    assert!(is_conflict_on(&err, "crm-quotes"), "{err:?}");

    let reopened = Crm::open(&manager).unwrap();
    assert!(reopened.clients.contains(&RecordId::new("1")));
    assert_eq!(reopened.projects.len(), 2);
    assert_eq!(reopened.quotes.len(), 3);
    assert_no_dangling_references(&reopened);
}

#[test]
fn test_sale_stays_pending_when_the_stock_write_is_refused() {
    let manager = manager(CarParts::NAME).conflict_policy(ConflictPolicy::FailFast);
    let mut counter = CarParts::open(&manager).unwrap();
    let mut back_office = CarParts::open(&manager).unwrap();
    back_office.restock(&RecordId::new("3"), 10).unwrap();

    let sale = RecordId::new("2");
    let err = counter.complete_sale(&sale).unwrap_err();
    assert!(is_conflict_on(&err, "car-parts-parts"), "{err:?}");
    assert_eq!(counter.sales.get(&sale).unwrap().status, SaleStatus::Pending);

    let mut counter = CarParts::open(&manager).unwrap();
    assert_eq!(counter.sales.get(&sale).unwrap().status, SaleStatus::Pending);
    assert_eq!(counter.parts.get(&RecordId::new("3")).unwrap().quantity, 130);

    counter.complete_sale(&sale).unwrap();
    assert_eq!(counter.sales.get(&sale).unwrap().status, SaleStatus::Completed);
    assert_eq!(counter.parts.get(&RecordId::new("3")).unwrap().quantity, 126);
}

#[test]
fn test_stock_is_untouched_when_the_sale_write_would_be_refused() {
    let manager = manager(CarParts::NAME).conflict_policy(ConflictPolicy::FailFast);
    let mut counter = CarParts::open(&manager).unwrap();
    let mut back_office = CarParts::open(&manager).unwrap();
    back_office.cancel_sale(&RecordId::new("2")).unwrap();

    let err = counter.complete_sale(&RecordId::new("2")).unwrap_err();
    assert!(is_conflict_on(&err, "car-parts-sales"), "{err:?}");

    let reopened = CarParts::open(&manager).unwrap();
    assert_eq!(reopened.parts.get(&RecordId::new("3")).unwrap().quantity, 120);
}

#[test]
fn test_status_changes_by_label_go_through_the_lifecycle() {
    let mut crm = Crm::open(&manager(Crm::NAME)).unwrap();
    crm.set_status("quotes", &RecordId::new("2"), "Accepted").unwrap();
    assert_eq!(
        crm.quotes.get(&RecordId::new("2")).unwrap().status,
        QuoteStatus::Accepted
    );

    let err = crm
        .set_status("quotes", &RecordId::new("2"), "draft")
        .unwrap_err();
    assert!(matches!(err, RecordError::InvalidTransition { .. }));

    let err = crm
        .set_status("quotes", &RecordId::new("2"), "archived")
        .unwrap_err();
    assert!(matches!(err, RecordError::UnknownStatus { .. }));

    let err = crm.set_status("clients", &RecordId::new("1"), "active").unwrap_err();
    assert!(matches!(err, RecordError::UnknownCollection(_)));
}

#[test]
fn test_domains_share_a_store_under_their_own_keys() {
    let store = Arc::new(MemoryStore::new());
    let parts = RecordManager::new(store.clone(), CarParts::NAME);
    let delivery = RecordManager::new(store.clone(), Deliveries::NAME);
    CarParts::open(&parts).unwrap();
    Deliveries::open(&delivery).unwrap();

    assert_eq!(
        parts.keys().unwrap(),
        vec!["car-parts-parts", "car-parts-sales", "car-parts-suppliers"]
    );
    assert_eq!(
        delivery.keys().unwrap(),
        vec!["delivery-deliveries", "delivery-drivers"]
    );

    assert_eq!(delivery.reset().unwrap(), 2);
    assert!(delivery.keys().unwrap().is_empty());
    assert_eq!(parts.keys().unwrap().len(), 3);
}

#[test]
fn test_domain_state_survives_a_file_store_reopen() {
    let dir = TempDir::new().unwrap();
    let url = format!("file://{}?conflict=fail-fast", dir.path().display());
    let config = StoreConfig::from_url(&url).unwrap();
    assert_eq!(config.conflict_policy, ConflictPolicy::FailFast);

    {
        let manager = RecordManager::from_config(&config, EscapeRooms::NAME).unwrap();
        let mut venue = EscapeRooms::open(&manager).unwrap();
        venue.check_in(&RecordId::new("3")).unwrap();
        venue.finish(&RecordId::new("3"), Some(52.25)).unwrap();
    }

    let manager = RecordManager::from_config(&config, EscapeRooms::NAME).unwrap();
    let venue = EscapeRooms::open(&manager).unwrap();
    let leaderboard = venue.leaderboard(&RecordId::new("2"));
    assert_eq!(leaderboard.len(), 1);
    assert_eq!(leaderboard[0].escape_minutes, Some(52.25));
    assert!(leaderboard[0].checked_in_at.is_some());
}

#[test]
fn test_every_domain_lists_its_collections() {
    fn check<D: Domain>() {
        let domain = D::open(&manager(D::NAME)).unwrap();
        let counts = domain.counts();
        assert_eq!(
            counts.iter().map(|(name, _)| *name).collect::<Vec<_>>(),
            D::COLLECTIONS.to_vec()
        );
        for (collection, count) in counts {
            assert_eq!(domain.list(collection, None).unwrap().len(), count);
        }
        assert!(matches!(
            domain.list("widgets", None),
            Err(RecordError::UnknownCollection(_))
        ));
    }

    check::<CarParts>();
    check::<Crm>();
    check::<EscapeRooms>();
    check::<Deliveries>();
}
