//! Create/delete/update invariants, aggregates and multi-writer conflicts

use proptest::prelude::*;
use recordkeep::{
    Collection, CollectionOptions, ConflictPolicy, Dependent, Dependents, FieldProblem, HasStatus,
    KeyValueStore, MemoryStore, PersistenceError, Record, RecordError, RecordId, Relation,
    lifecycle, view,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

lifecycle! {
    pub enum InvoiceStatus {
        Draft = "draft" => [Issued],
        Issued = "issued" => [Paid, Void],
        Paid = "paid" => [],
        Void = "void" => [Draft],
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Record)]
#[serde(rename_all = "camelCase")]
#[record(kind = "invoice")]
struct Invoice {
    id: RecordId,
    #[record(required, search)]
    customer: String,
    #[record(non_negative)]
    amount: f64,
    status: InvoiceStatus,
}

impl HasStatus for Invoice {
    type Status = InvoiceStatus;

    fn status(&self) -> InvoiceStatus {
        self.status
    }

    fn set_status(&mut self, status: InvoiceStatus) {
        self.status = status;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Record)]
#[serde(rename_all = "camelCase")]
#[record(kind = "payment")]
struct Payment {
    id: RecordId,
    invoice_id: RecordId,
    #[record(non_negative)]
    amount: f64,
}

fn payment_invoice(payment: &Payment) -> Option<&RecordId> {
    Some(&payment.invoice_id)
}

static PAYMENT_INVOICE: Relation<Payment> = Relation::cascade("payments", payment_invoice);

const FAIL_FAST: CollectionOptions = CollectionOptions {
    conflict_policy: ConflictPolicy::FailFast,
    pretty: false,
};

fn store() -> Arc<dyn KeyValueStore> {
    Arc::new(MemoryStore::new())
}

fn empty(store: &Arc<dyn KeyValueStore>) -> Collection<Invoice> {
    Collection::open(Arc::clone(store), "books-invoices", Vec::new).unwrap()
}

fn draft(id: RecordId, customer: &str, amount: f64) -> Invoice {
    Invoice {
        id,
        customer: customer.to_string(),
        amount,
        status: InvoiceStatus::Draft,
    }
}

fn stored(store: &Arc<dyn KeyValueStore>) -> Vec<Invoice> {
    let raw = store.load("books-invoices").unwrap().unwrap();
    serde_json::from_str(&raw).unwrap()
}

fn stored_payments(store: &Arc<dyn KeyValueStore>) -> Vec<Payment> {
    let raw = store.load("books-payments").unwrap().unwrap();
    serde_json::from_str(&raw).unwrap()
}

fn payments(store: &Arc<dyn KeyValueStore>) -> Collection<Payment> {
    Collection::open_with(Arc::clone(store), "books-payments", FAIL_FAST, Vec::new).unwrap()
}

#[test]
fn test_create_adds_one_persisted_record_with_a_fresh_id() {
    let store = store();
    let mut invoices = empty(&store);
    let first = invoices.create(|id| draft(id, "Acme", 10.0)).unwrap();
    let second = invoices.create(|id| draft(id, "Acme", 20.0)).unwrap();

    assert_ne!(first.id, second.id);
    assert_eq!(invoices.len(), 2);
    assert_eq!(stored(&store), invoices.records().to_vec());
}

#[test]
fn test_invalid_records_are_rejected_before_writing() {
    let store = store();
    let mut invoices = empty(&store);

    let err = invoices.create(|id| draft(id, "  ", -5.0)).unwrap_err();
    let RecordError::Validation(validation) = &err else {
        panic!("expected a validation error, got {err:?}");
    };
    assert!(validation.has_issue("customer"));
    assert!(validation.has_issue("amount"));
    assert!(invoices.is_empty());
    assert!(stored(&store).is_empty());

    let err = invoices
        .create(|_| draft(RecordId::new("chosen"), "Acme", 1.0))
        .unwrap_err();
    assert!(matches!(
        err,
        RecordError::Validation(ref v) if v.issues[0].problem == FieldProblem::IdChanged
    ));
}

#[test]
fn test_update_cannot_change_the_id() {
    let store = store();
    let mut invoices = empty(&store);
    let invoice = invoices.create(|id| draft(id, "Acme", 10.0)).unwrap();

    let err = invoices
        .update(&invoice.id, |invoice| invoice.id = RecordId::new("other"))
        .unwrap_err();
    assert!(matches!(err, RecordError::Validation(_)));
    assert_eq!(invoices.get(&invoice.id), Some(&invoice));
}

#[test]
fn test_duplicate_insert_is_rejected() {
    let store = store();
    let mut invoices = empty(&store);
    invoices.insert(draft(RecordId::new("7"), "Acme", 1.0)).unwrap();
    let err = invoices
        .insert(draft(RecordId::new("7"), "Globex", 2.0))
        .unwrap_err();
    assert!(matches!(err, RecordError::DuplicateId { .. }));
    assert_eq!(invoices.len(), 1);
}

#[test]
fn test_missing_ids_are_not_found() {
    let store = store();
    let mut invoices = empty(&store);
    let missing = RecordId::new("404");
    assert!(matches!(
        invoices.remove(&missing),
        Err(RecordError::NotFound { kind: "invoice", .. })
    ));
    assert!(matches!(
        invoices.update(&missing, |_| {}),
        Err(RecordError::NotFound { .. })
    ));
}

#[test]
fn test_transitions_follow_the_lifecycle() {
    let store = store();
    let mut invoices = empty(&store);
    let invoice = invoices.create(|id| draft(id, "Acme", 10.0)).unwrap();

    let err = invoices
        .transition(&invoice.id, InvoiceStatus::Paid)
        .unwrap_err();
    assert!(matches!(
        err,
        RecordError::InvalidTransition {
            from: "draft",
            to: "paid",
            ..
        }
    ));

    invoices.transition(&invoice.id, InvoiceStatus::Issued).unwrap();
    invoices.transition(&invoice.id, InvoiceStatus::Void).unwrap();
    invoices.transition(&invoice.id, InvoiceStatus::Draft).unwrap();
    assert_eq!(stored(&store)[0].status, InvoiceStatus::Draft);
}

#[test]
fn test_aggregates_over_an_empty_collection_are_zero() {
    let store = store();
    let invoices = empty(&store);
    assert_eq!(invoices.sum_where(|_| true, |invoice| invoice.amount), 0.0);
    assert_eq!(invoices.count_where(|_| true), 0);
    let buckets = invoices.status_counts();
    assert_eq!(buckets.len(), 4);
    assert!(buckets.values().all(|count| *count == 0));
}

#[test]
fn test_search_is_case_insensitive_and_blank_matches_all() {
    let store = store();
    let mut invoices = empty(&store);
    invoices.create(|id| draft(id, "Acme Corp", 1.0)).unwrap();
    invoices.create(|id| draft(id, "Globex", 2.0)).unwrap();

    assert_eq!(invoices.search("acme").len(), 1);
    assert_eq!(invoices.search("   ").len(), 2);
    assert!(invoices.search("initech").is_empty());
}

#[test]
fn test_last_write_wins_overwrites_the_other_writer() {
    let store = store();
    let mut first = empty(&store);
    let mut second = empty(&store);

    first.create(|id| draft(id, "Acme", 1.0)).unwrap();
    second.create(|id| draft(id, "Globex", 2.0)).unwrap();

    let persisted = stored(&store);
    assert_eq!(persisted.len(), 1);
    assert_eq!(persisted[0].customer, "Globex");
}

#[test]
fn test_fail_fast_refuses_to_overwrite_the_other_writer() {
    let store = store();
    let open = || {
        Collection::<Invoice>::open_with(Arc::clone(&store), "books-invoices", FAIL_FAST, Vec::new)
            .unwrap()
    };
    let mut first = open();
    let mut second = open();

    first.create(|id| draft(id, "Acme", 1.0)).unwrap();
    let err = second.create(|id| draft(id, "Globex", 2.0)).unwrap_err();

    assert!(matches!(
        err,
        RecordError::Persistence(PersistenceError::Conflict { .. })
    ));
    assert!(second.is_empty());
    assert_eq!(stored(&store)[0].customer, "Acme");

    second.reload(Vec::new).unwrap();
    second.create(|id| draft(id, "Globex", 2.0)).unwrap();
    assert_eq!(stored(&store).len(), 2);
}

#[test]
fn test_formatting_alone_is_not_a_conflict() {
    let store = store();
    let pretty = CollectionOptions {
        pretty: true,
        ..FAIL_FAST
    };
    let mut compact = Collection::<Invoice>::open_with(
        Arc::clone(&store),
        "books-invoices",
        FAIL_FAST,
        || vec![draft(RecordId::new("1"), "Acme", 1.0)],
    )
    .unwrap();
    let mut indented =
        Collection::<Invoice>::open_with(Arc::clone(&store), "books-invoices", pretty, Vec::new)
            .unwrap();

    indented.update(&RecordId::new("1"), |_| {}).unwrap();
    assert!(store.load("books-invoices").unwrap().unwrap().contains('\n'));

    compact.create(|id| draft(id, "Globex", 2.0)).unwrap();
    assert_eq!(stored(&store).len(), 2);
}

#[test]
fn test_refused_cascade_keeps_the_parent_and_its_dependents() {
    let store = store();
    let mut invoices =
        Collection::<Invoice>::open_with(Arc::clone(&store), "books-invoices", FAIL_FAST, Vec::new)
            .unwrap();
    let invoice = invoices.create(|id| draft(id, "Acme", 10.0)).unwrap();
    let mut local = payments(&store);
    local
        .create(|id| Payment {
            id,
            invoice_id: invoice.id.clone(),
            amount: 4.0,
        })
        .unwrap();
    let mut remote = payments(&store);
    remote
        .create(|id| Payment {
            id,
            invoice_id: invoice.id.clone(),
            amount: 6.0,
        })
        .unwrap();

    {
        let mut dependent = Dependent::new(&mut local, &PAYMENT_INVOICE);
        let err = invoices
            .remove_with(&invoice.id, &mut [&mut dependent as &mut dyn Dependents])
            .unwrap_err();
        assert!(matches!(
            err,
            RecordError::Persistence(PersistenceError::Conflict { ref key }) if key == "books-payments"
        ));
    }
    assert_eq!(stored(&store), vec![invoice.clone()]);
    let kept = stored_payments(&store);
    assert_eq!(kept.len(), 2);
    assert!(kept.iter().all(|payment| payment.invoice_id == invoice.id));

    local.reload(Vec::new).unwrap();
    let mut dependent = Dependent::new(&mut local, &PAYMENT_INVOICE);
    let removal = invoices
        .remove_with(&invoice.id, &mut [&mut dependent as &mut dyn Dependents])
        .unwrap();
    assert_eq!(removal.released_for("payments"), 2);
    assert!(stored(&store).is_empty());
    assert!(stored_payments(&store).is_empty());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_creates_keep_ids_unique_and_sums_exact(amounts in prop::collection::vec(0u32..10_000, 0..20)) {
        let store = store();
        let mut invoices = empty(&store);
        for amount in &amounts {
            invoices.create(|id| draft(id, "Acme", f64::from(*amount))).unwrap();
        }

        let ids: HashSet<&RecordId> = invoices.iter().map(|invoice| &invoice.id).collect();
        prop_assert_eq!(ids.len(), amounts.len());
        let expected: u64 = amounts.iter().map(|amount| u64::from(*amount)).sum();
        prop_assert_eq!(invoices.sum_where(|_| true, |invoice| invoice.amount), expected as f64);
        prop_assert_eq!(stored(&store).len(), amounts.len());
    }

    #[test]
    fn prop_remove_leaves_the_others_untouched(count in 1usize..12, pick in any::<prop::sample::Index>()) {
        let store = store();
        let mut invoices = empty(&store);
        for n in 0..count {
            invoices.create(|id| draft(id, &format!("customer {n}"), n as f64)).unwrap();
        }
        let before = invoices.records().to_vec();
        let victim = before[pick.index(count)].id.clone();

        invoices.remove(&victim).unwrap();

        let expected: Vec<Invoice> = before.into_iter().filter(|invoice| invoice.id != victim).collect();
        prop_assert_eq!(invoices.records(), expected.as_slice());
        prop_assert_eq!(stored(&store), expected);
    }

    #[test]
    fn prop_low_stock_view_matches_a_plain_filter(levels in prop::collection::vec((0u32..50, 0u32..50), 0..30)) {
        let low = view::at_or_below(&levels, |(quantity, _)| *quantity, |(_, minimum)| *minimum);
        let expected: Vec<&(u32, u32)> = levels.iter().filter(|(quantity, minimum)| quantity <= minimum).collect();
        prop_assert_eq!(low, expected);
    }
}
