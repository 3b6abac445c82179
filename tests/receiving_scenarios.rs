//! Purchase-order receiving tests

use opensase_backoffice::domain::aggregates::{ItemStatus, PurchaseOrderStatus};
use opensase_backoffice::domain::receiving::{
    initialize_receiving, prepare_receipt, validate_receiving, QualityCheck, ReceivingViolation,
};
use opensase_backoffice::{PurchaseOrder, PurchaseOrderItem, ReceivingEntry, ReceivingWorkflow};
use proptest::prelude::*;
use rust_decimal::Decimal;

fn order(quantity: u32, received: u32) -> PurchaseOrder {
    let mut po = PurchaseOrder::create("po-77", "PO-2024-077", "Textile Masters Ltd.");
    let mut item = PurchaseOrderItem::new("line-1", "prod-1", "Classic T-Shirt", quantity, Decimal::new(899, 2));
    item.received_quantity = received;
    po.add_item(item);
    po
}

fn entry(now: u32) -> ReceivingEntry {
    ReceivingEntry { item_id: "line-1".into(), received_quantity_now: now, quality_check: QualityCheck::Passed, notes: String::new() }
}

#[cfg(test)]
mod scenarios {
    use super::*;

    #[test]
    fn test_receive_remaining_completes_line() {
        let mut po = order(10, 4);
        let payload = prepare_receipt(&po, &[entry(6)], ReceivingWorkflow::Standard).unwrap();
        assert_eq!(payload.projected_statuses(&po), vec![("line-1".to_string(), ItemStatus::Received)]);

        po.apply_receipt(&payload).unwrap();
        assert_eq!(po.items[0].received_quantity, 10);
        assert_eq!(po.status, PurchaseOrderStatus::Received);
    }

    #[test]
    fn test_receive_part_of_remaining() {
        let mut po = order(10, 4);
        let payload = prepare_receipt(&po, &[entry(3)], ReceivingWorkflow::Standard).unwrap();
        po.apply_receipt(&payload).unwrap();
        assert_eq!(po.items[0].status, ItemStatus::Partial);
        assert_eq!(po.items[0].remaining(), 3);
        assert_eq!(po.status, PurchaseOrderStatus::Pending);
    }

    #[test]
    fn test_over_receipt_names_the_line() {
        let po = order(10, 4);
        let err = prepare_receipt(&po, &[entry(7)], ReceivingWorkflow::Standard).unwrap_err();
        let messages = err.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("Classic T-Shirt:"));
        assert!(messages[0].contains("(6)"));
    }

    #[test]
    fn test_initialized_entries_are_submittable() {
        let po = order(12, 5);
        let entries = initialize_receiving(&po, ReceivingWorkflow::Standard);
        assert_eq!(entries[0].received_quantity_now, 7);
        assert!(prepare_receipt(&po, &entries, ReceivingWorkflow::Standard).is_ok());

        let strict = initialize_receiving(&po, ReceivingWorkflow::Strict);
        let err = prepare_receipt(&po, &strict, ReceivingWorkflow::Strict).unwrap_err();
        assert!(matches!(err.violations(), [ReceivingViolation::QualityCheckRequired { .. }]));
    }

    #[test]
    fn test_fully_received_line_accepts_nothing() {
        let po = order(4, 4);
        let err = validate_receiving(&po, &[entry(0)], ReceivingWorkflow::Standard).unwrap_err();
        assert_eq!(err.violations(), &[ReceivingViolation::NothingToReceive]);
        assert!(initialize_receiving(&po, ReceivingWorkflow::Standard)[0].received_quantity_now == 0);
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_remaining_is_the_boundary(quantity in 1u32..500, received_share in 0u32..100) {
            let received = quantity * received_share / 100;
            let po = order(quantity, received);
            let remaining = quantity - received;

            prop_assert!(validate_receiving(&po, &[entry(remaining)], ReceivingWorkflow::Standard).is_ok());
            let over = validate_receiving(&po, &[entry(remaining + 1)], ReceivingWorkflow::Standard);
            prop_assert!(
                matches!(over.as_ref().map_err(|e| e.violations()), Err([ReceivingViolation::OverReceipt { .. }])),
                "expected a single over-receipt violation"
            );
        }

        #[test]
        fn prop_payload_skips_zero_lines(now in 0u32..6) {
            let mut po = order(10, 4);
            po.add_item(PurchaseOrderItem::new("line-2", "prod-2", "Ceramic Mug", 3, Decimal::ONE));
            let entries = vec![entry(now), ReceivingEntry { item_id: "line-2".into(), ..entry(1) }];
            let payload = prepare_receipt(&po, &entries, ReceivingWorkflow::Standard).unwrap();
            let expected = if now == 0 { 1 } else { 2 };
            prop_assert_eq!(payload.items.len(), expected);
            prop_assert!(payload.items.iter().all(|line| line.received_quantity > 0));
        }
    }
}
