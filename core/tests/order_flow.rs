//! Order lifecycle against the in-memory store.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use gatepass_core::inventory::{LedgerError, LedgerRejection};
use gatepass_core::orders::{Completion, NewCashSale, OrderError, PaymentConfirmation};
use gatepass_core::types::{
    AccessType, GroupSize, InventoryReason, Money, OrderNumber, OrderStatus, PaymentMethod,
    PaymentStatus, ScanStatus, TierKind,
};
use gatepass_core::{EntityType, ReportStore};
use gatepass_testing::fixtures::{Harness, buyer, new_order, presale_ends_at, tier};
use std::collections::HashSet;

fn cash_sale(tier: TierKind, units: u32, amount_received: Money) -> NewCashSale {
    NewCashSale {
        tier,
        group_size: GroupSize::Single,
        units,
        parking_passes: 0,
        buyer: buyer("Gate Buyer"),
        access_type: AccessType::Attendee,
        payment_method: PaymentMethod::Cash,
        amount_received,
    }
}

#[tokio::test]
async fn test_happy_path_mints_one_pending_ticket() {
    let harness = Harness::new();

    let completion = harness
        .paid_order(TierKind::Bronze, GroupSize::Single, 1)
        .await
        .unwrap();

    assert!(completion.is_new());
    let order = completion.order();
    assert_eq!(order.number.as_str(), "IAF-2026-0001");
    assert_eq!(order.status, OrderStatus::Completed);
    assert_eq!(order.payment_status, PaymentStatus::Paid);
    assert_eq!(order.provider_reference.as_deref(), Some("PSK-IAF-2026-0001"));

    let tickets = completion.tickets();
    assert_eq!(tickets.len(), 1);
    assert_eq!(tickets[0].status, ScanStatus::Pending);
    assert!(harness.codec.verifier().verify(&tickets[0].code).is_ok());

    let decoded = harness.codec.decode(&tickets[0].qr_payload).unwrap();
    assert_eq!(decoded.code, tickets[0].code);
    assert_eq!(decoded.order, "IAF-2026-0001");
    assert_eq!(decoded.tier, "Bronze");

    let bronze = harness.store.tier_snapshot(TierKind::Bronze).unwrap();
    assert_eq!(bronze.sold_units, 1);
}

#[tokio::test]
async fn test_pending_order_is_priced_and_expires() {
    let harness = Harness::new();
    let order = harness
        .orders
        .create_pending(new_order(TierKind::Gold, GroupSize::Pair, 2))
        .await
        .unwrap();

    // Presale group price 90_000 naira per person, 2 pairs
    assert_eq!(order.quantity, 4);
    assert_eq!(order.total, Money::from_naira(360_000).unwrap());
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.expires_at - order.created_at, chrono::Duration::minutes(30));
    assert!(harness.store.tickets().is_empty());
    assert_eq!(harness.store.tier_snapshot(TierKind::Gold).unwrap().sold_units, 0);
}

#[tokio::test]
async fn test_onsale_prices_after_cutoff() {
    let harness = Harness::at([tier(TierKind::Regular, 10, 0)], presale_ends_at());
    let order = harness
        .orders
        .create_pending(new_order(TierKind::Regular, GroupSize::Single, 1))
        .await
        .unwrap();
    assert_eq!(order.total, Money::from_naira(12_500).unwrap());
}

#[tokio::test]
async fn test_quad_mints_four_tickets_with_parking() {
    let harness = Harness::new();
    let mut request = new_order(TierKind::Silver, GroupSize::Quad, 1);
    request.parking_passes = 3;
    let order = harness.orders.create_pending(request).await.unwrap();

    let completion = harness
        .orders
        .confirm_payment(PaymentConfirmation {
            reference: order.number.clone(),
            provider_reference: "PSK-1".to_string(),
            amount: order.total,
        })
        .await
        .unwrap();

    let tickets = completion.tickets();
    assert_eq!(tickets.len(), 4);
    assert_eq!(tickets[0].parking_passes.len(), 2);
    assert_eq!(tickets[1].parking_passes, ["P-IAF-2026-0001-3"]);
    assert!(tickets[2].parking_passes.is_empty());

    let codes: HashSet<&str> = tickets.iter().map(|t| t.code.as_str()).collect();
    assert_eq!(codes.len(), 4);
    assert_eq!(harness.store.tier_snapshot(TierKind::Silver).unwrap().sold_units, 4);
}

#[tokio::test]
async fn test_confirm_payment_is_idempotent() {
    let harness = Harness::new();
    let first = harness
        .paid_order(TierKind::Bronze, GroupSize::Pair, 1)
        .await
        .unwrap();
    let order = first.order().clone();

    let second = harness
        .orders
        .confirm_payment(PaymentConfirmation {
            reference: order.number.clone(),
            provider_reference: "PSK-retry".to_string(),
            amount: order.total,
        })
        .await
        .unwrap();

    assert!(matches!(second, Completion::AlreadyCompleted { .. }));
    assert_eq!(second.tickets(), first.tickets());
    assert_eq!(harness.store.tickets().len(), 2);
    assert_eq!(harness.store.tier_snapshot(TierKind::Bronze).unwrap().sold_units, 2);
}

#[tokio::test]
async fn test_underpayment_leaves_order_pending() {
    let harness = Harness::new();
    let order = harness
        .orders
        .create_pending(new_order(TierKind::Diamond, GroupSize::Single, 1))
        .await
        .unwrap();

    let err = harness
        .orders
        .confirm_payment(PaymentConfirmation {
            reference: order.number.clone(),
            provider_reference: "PSK-1".to_string(),
            amount: Money::from_kobo(order.total.kobo() - 1),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, OrderError::AmountMismatch { .. }));
    let stored = harness.orders.order(&order.number).await.unwrap();
    assert_eq!(stored.status, OrderStatus::Pending);
    assert!(harness.store.tickets().is_empty());
}

#[tokio::test]
async fn test_unknown_reference() {
    let harness = Harness::new();
    let err = harness
        .orders
        .confirm_payment(PaymentConfirmation {
            reference: OrderNumber::from_raw("IAF-2026-9999"),
            provider_reference: "PSK-1".to_string(),
            amount: Money::from_naira(1).unwrap(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::NotFound(_)));
}

#[tokio::test]
async fn test_capacity_exhaustion_fails_order_without_tickets() {
    let harness = Harness::with_tiers([tier(TierKind::Bronze, 1, 0)]);
    let first = harness
        .orders
        .create_pending(new_order(TierKind::Bronze, GroupSize::Single, 1))
        .await
        .unwrap();
    let second = harness
        .orders
        .create_pending(new_order(TierKind::Bronze, GroupSize::Single, 1))
        .await
        .unwrap();

    for order in [&first, &second] {
        let result = harness
            .orders
            .confirm_payment(PaymentConfirmation {
                reference: order.number.clone(),
                provider_reference: format!("PSK-{}", order.number),
                amount: order.total,
            })
            .await;
        if order.number == first.number {
            assert!(result.is_ok());
        } else {
            assert!(matches!(
                result,
                Err(OrderError::Inventory {
                    rejection: LedgerRejection::CapacityExceeded { available: 0, .. },
                    ..
                })
            ));
        }
    }

    let failed = harness.orders.order(&second.number).await.unwrap();
    assert_eq!(failed.status, OrderStatus::Failed);
    assert_eq!(failed.payment_status, PaymentStatus::Paid);
    assert!(harness.orders.tickets(&second.number).await.unwrap().is_empty());
    assert_eq!(harness.store.tier_snapshot(TierKind::Bronze).unwrap().sold_units, 1);

    // A sold-out tier refuses new pending orders up front
    let err = harness
        .orders
        .create_pending(new_order(TierKind::Bronze, GroupSize::Single, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::Inventory { .. }));
}

#[tokio::test]
async fn test_ledger_refuses_commit_on_full_tier() {
    let mut full = tier(TierKind::Gold, 1, 0);
    full.sold_units = 1;
    let harness = Harness::with_tiers([full]);

    let err = harness
        .ledger
        .reserve_and_commit(TierKind::Gold, 1, &OrderNumber::from_raw("IAF-2026-0001"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        LedgerError::Rejected {
            tier: TierKind::Gold,
            rejection: LedgerRejection::CapacityExceeded { available: 0, .. }
        }
    ));
    assert!(harness.store.inventory_log().is_empty());
}

#[tokio::test]
async fn test_ledger_and_order_completion_share_one_counter() {
    let harness = Harness::with_tiers([tier(TierKind::Gold, 2, 0)]);
    harness
        .ledger
        .reserve_and_commit(TierKind::Gold, 1, &OrderNumber::from_raw("IAF-2026-0900"))
        .await
        .unwrap();

    let err = harness
        .paid_order(TierKind::Gold, GroupSize::Pair, 1)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OrderError::Inventory {
            rejection: LedgerRejection::CapacityExceeded { available: 1, .. },
            ..
        }
    ));

    harness
        .paid_order(TierKind::Gold, GroupSize::Single, 1)
        .await
        .unwrap();
    let availability = harness.ledger.availability(TierKind::Gold).await.unwrap();
    assert_eq!(availability.remaining, 0);
    assert_eq!(harness.store.inventory_log().len(), 2);
}

#[tokio::test]
async fn test_ledger_commit_and_release_are_logged() {
    let harness = Harness::new();
    let number = OrderNumber::from_raw("IAF-2026-0042");

    let committed = harness
        .ledger
        .reserve_and_commit(TierKind::Regular, 3, &number)
        .await
        .unwrap();
    assert_eq!((committed.previous, committed.new), (0, 3));

    let released = harness
        .ledger
        .release(
            TierKind::Regular,
            5,
            gatepass_core::SalesChannel::Online,
            &number,
            InventoryReason::Cancellation,
        )
        .await
        .unwrap();
    assert_eq!((released.previous, released.new), (3, 0));

    let availability = harness.ledger.availability(TierKind::Regular).await.unwrap();
    assert_eq!(availability.remaining, 100);
    assert_eq!(harness.store.inventory_log().len(), 2);
}

#[tokio::test]
async fn test_refund_releases_units_once() {
    let harness = Harness::new();
    let completion = harness
        .paid_order(TierKind::Gold, GroupSize::Pair, 1)
        .await
        .unwrap();
    let number = completion.order().number.clone();

    let refunded = harness.orders.refund(&number, "buyer request").await.unwrap();
    assert_eq!(refunded.status, OrderStatus::Refunded);
    assert_eq!(refunded.payment_status, PaymentStatus::Refunded);
    assert_eq!(harness.store.tier_snapshot(TierKind::Gold).unwrap().sold_units, 0);

    let err = harness.orders.refund(&number, "again").await.unwrap_err();
    assert!(matches!(
        err,
        OrderError::InvalidTransition {
            from: OrderStatus::Refunded,
            to: OrderStatus::Refunded,
            ..
        }
    ));
    assert_eq!(harness.store.tier_snapshot(TierKind::Gold).unwrap().sold_units, 0);

    let log = harness.store.inventory_log();
    assert_eq!(log.len(), 2);
    assert_eq!(log[1].reason, InventoryReason::Refund);
    assert_eq!(log[1].delta(), -2);

    let audit = harness
        .store
        .audit_trail(EntityType::Order, number.as_str())
        .await
        .unwrap();
    let actions: Vec<&str> = audit.iter().map(|a| a.action.as_str()).collect();
    assert_eq!(actions, ["order.completed", "order.refunded"]);
}

#[tokio::test]
async fn test_cancelling_pending_order_releases_nothing() {
    let harness = Harness::new();
    let order = harness
        .orders
        .create_pending(new_order(TierKind::Silver, GroupSize::Single, 1))
        .await
        .unwrap();

    let cancelled = harness.orders.cancel(&order.number, "abandoned").await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert!(harness.store.inventory_log().is_empty());

    let err = harness
        .orders
        .confirm_payment(PaymentConfirmation {
            reference: order.number.clone(),
            provider_reference: "PSK-late".to_string(),
            amount: order.total,
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OrderError::InvalidTransition {
            from: OrderStatus::Cancelled,
            ..
        }
    ));
}

#[tokio::test]
async fn test_cash_sales_respect_manual_cap() {
    let harness = Harness::with_tiers([tier(TierKind::Regular, 10, 3)]);

    let sale = harness
        .orders
        .record_cash_sale(cash_sale(TierKind::Regular, 2, Money::from_naira(20_000).unwrap()))
        .await
        .unwrap();
    assert_eq!(sale.order().payment_method, PaymentMethod::Cash);
    assert_eq!(sale.order().status, OrderStatus::Completed);
    assert_eq!(sale.tickets().len(), 2);

    let err = harness
        .orders
        .record_cash_sale(cash_sale(TierKind::Regular, 2, Money::from_naira(20_000).unwrap()))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OrderError::Inventory {
            rejection: LedgerRejection::ManualCapReached { remaining: 1, .. },
            ..
        }
    ));

    let regular = harness.store.tier_snapshot(TierKind::Regular).unwrap();
    assert_eq!((regular.sold_units, regular.manual_sold), (2, 2));

    // Online sales are still open
    assert!(
        harness
            .paid_order(TierKind::Regular, GroupSize::Single, 5)
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_short_cash_is_refused() {
    let harness = Harness::new();
    let err = harness
        .orders
        .record_cash_sale(cash_sale(TierKind::Regular, 1, Money::from_naira(500).unwrap()))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::AmountMismatch { .. }));
    assert!(harness.store.tickets().is_empty());
}

#[tokio::test]
async fn test_complimentary_sale_is_free() {
    let harness = Harness::new();
    let mut sale = cash_sale(TierKind::Diamond, 1, Money::ZERO);
    sale.payment_method = PaymentMethod::Complimentary;
    sale.access_type = AccessType::Vendor;

    let completion = harness.orders.record_cash_sale(sale).await.unwrap();
    assert_eq!(completion.order().total, Money::ZERO);
    assert_eq!(completion.order().access_type, AccessType::Vendor);
}

#[tokio::test]
async fn test_code_collisions_are_retried() {
    let harness = Harness::new();
    harness.store.force_code_collisions(2);

    let completion = harness
        .paid_order(TierKind::Bronze, GroupSize::Single, 1)
        .await
        .unwrap();
    assert_eq!(completion.tickets().len(), 1);
    assert_eq!(harness.store.tier_snapshot(TierKind::Bronze).unwrap().sold_units, 1);
}

#[tokio::test]
async fn test_persistent_collisions_surface_as_failure() {
    let harness = Harness::new();
    let order = harness
        .orders
        .create_pending(new_order(TierKind::Bronze, GroupSize::Single, 1))
        .await
        .unwrap();
    harness.store.force_code_collisions(5);

    let err = harness
        .orders
        .confirm_payment(PaymentConfirmation {
            reference: order.number.clone(),
            provider_reference: "PSK-1".to_string(),
            amount: order.total,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, OrderError::CodeCollisions(5)));
    let stored = harness.orders.order(&order.number).await.unwrap();
    assert_eq!(stored.status, OrderStatus::Pending);
    assert_eq!(harness.store.tier_snapshot(TierKind::Bronze).unwrap().sold_units, 0);
}

#[tokio::test]
async fn test_cash_sale_lost_to_collisions_is_failed() {
    let harness = Harness::new();
    harness.store.force_code_collisions(5);

    let err = harness
        .orders
        .record_cash_sale(cash_sale(TierKind::Regular, 1, Money::from_naira(20_000).unwrap()))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::CodeCollisions(5)));

    let stored = harness
        .orders
        .order(&OrderNumber::from_raw("IAF-2026-0001"))
        .await
        .unwrap();
    assert_eq!(stored.status, OrderStatus::Failed);
    assert_eq!(stored.payment_method, PaymentMethod::Cash);
    assert!(harness.store.tickets().is_empty());
    let regular = harness.store.tier_snapshot(TierKind::Regular).unwrap();
    assert_eq!((regular.sold_units, regular.manual_sold), (0, 0));
}

#[tokio::test]
async fn test_invalid_requests() {
    let harness = Harness::new();

    let err = harness
        .orders
        .create_pending(new_order(TierKind::Bronze, GroupSize::Single, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::InvalidRequest(_)));

    let mut request = new_order(TierKind::Bronze, GroupSize::Single, 1);
    request.parking_passes = 3;
    let err = harness.orders.create_pending(request).await.unwrap_err();
    assert!(matches!(err, OrderError::InvalidRequest(_)));

    let mut request = new_order(TierKind::Bronze, GroupSize::Single, 1);
    request.buyer.name = "  ".to_string();
    let err = harness.orders.create_pending(request).await.unwrap_err();
    assert!(matches!(err, OrderError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_store_outage_is_an_error() {
    let harness = Harness::new();
    harness.store.set_offline(true);
    let err = harness
        .orders
        .create_pending(new_order(TierKind::Bronze, GroupSize::Single, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::Store(_)));
}
