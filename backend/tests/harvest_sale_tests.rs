//! Harvest and sale balance tests
//!
//! A harvest's available quantity shrinks with every sale, is restored when
//! a sale is deleted, and never exceeds the harvested quantity.

use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{sale_total, DomainError, HarvestBalance, MAX_AMOUNT};

fn dec(v: i64) -> Decimal {
    Decimal::from(v)
}

#[test]
fn test_selling_everything_closes_harvest() {
    let h = HarvestBalance::new(dec(50)).unwrap();
    let h = h.reserve_sale(dec(20)).unwrap().reserve_sale(dec(30)).unwrap();
    assert!(h.cerrado);
    assert_eq!(h.sold(), dec(50));
}

#[test]
fn test_closed_harvest_rejects_sales() {
    let h = HarvestBalance::new(dec(50)).unwrap().close().unwrap();
    assert_eq!(h.reserve_sale(dec(1)), Err(DomainError::HarvestClosed));
}

#[test]
fn test_zero_quantity_sale_rejected() {
    let h = HarvestBalance::new(dec(50)).unwrap();
    assert!(matches!(
        h.reserve_sale(Decimal::ZERO),
        Err(DomainError::NonPositiveQuantity(_))
    ));
}

#[test]
fn test_resize_below_sold_rejected() {
    let h = HarvestBalance::new(dec(50)).unwrap().reserve_sale(dec(30)).unwrap();
    assert_eq!(
        h.resize(dec(20)),
        Err(DomainError::HarvestBelowSold {
            new_total: dec(20),
            sold: dec(30),
        })
    );
}

#[test]
fn test_shrinking_to_sold_closes_harvest() {
    let h = HarvestBalance::new(dec(50)).unwrap().reserve_sale(dec(30)).unwrap();
    let h = h.resize(dec(30)).unwrap();
    assert!(h.cantidad_disponible.is_zero());
    assert!(h.cerrado);
    assert_eq!(h.reserve_sale(dec(1)), Err(DomainError::HarvestClosed));
}

#[test]
fn test_closing_twice_rejected() {
    let h = HarvestBalance::new(dec(50)).unwrap().close().unwrap();
    assert_eq!(h.close(), Err(DomainError::HarvestClosed));
}

#[test]
fn test_harvest_larger_than_column_rejected() {
    let over = MAX_AMOUNT + Decimal::ONE;
    let err = HarvestBalance::new(over).unwrap_err();
    assert_eq!(err.field(), Some("cantidad"));
}

#[test]
fn test_sale_total_rounds_to_cents() {
    assert_eq!(sale_total(Decimal::new(3333, 3), Decimal::new(3, 0)), Decimal::new(1000, 2));
}

fn quantity() -> impl Strategy<Value = Decimal> {
    (1i64..5_000i64).prop_map(|n| Decimal::new(n, 1))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Sold plus available always equals the harvested quantity
    #[test]
    fn prop_sold_plus_available_is_total(
        cantidad in quantity(),
        sales in prop::collection::vec(quantity(), 0..15)
    ) {
        let mut h = HarvestBalance::new(cantidad).unwrap();
        for q in sales {
            if let Ok(next) = h.reserve_sale(q) {
                h = next;
            }
            prop_assert!(h.cantidad_disponible >= Decimal::ZERO);
            prop_assert!(h.cantidad_disponible <= h.cantidad);
            prop_assert_eq!(h.sold() + h.cantidad_disponible, h.cantidad);
        }
    }

    /// Deleting a sale restores exactly what it reserved
    #[test]
    fn prop_release_restores_reservation(
        cantidad in quantity(),
        fraction in 1u32..=100u32
    ) {
        let h = HarvestBalance::new(cantidad).unwrap();
        let q = (cantidad * Decimal::from(fraction) / Decimal::from(100)).round_dp(2);
        prop_assume!(q > Decimal::ZERO);
        let reserved = h.reserve_sale(q).unwrap();
        let released = reserved.release_sale(q);
        prop_assert_eq!(released.cantidad_disponible, cantidad);
        prop_assert!(!released.cerrado);
    }

    /// Oversell attempts never change the balance
    #[test]
    fn prop_oversell_rejected(cantidad in quantity(), extra in quantity()) {
        let h = HarvestBalance::new(cantidad).unwrap();
        let result = h.reserve_sale(cantidad + extra);
        let is_insufficient = matches!(result, Err(DomainError::InsufficientHarvest { .. }));
        prop_assert!(is_insufficient);
    }

    /// Without a manual close, a harvest is closed exactly when nothing is left
    #[test]
    fn prop_resize_closes_when_empty(
        cantidad in quantity(),
        sold in quantity(),
        new_total in quantity()
    ) {
        let h = HarvestBalance::new(cantidad).unwrap();
        prop_assume!(sold <= cantidad);
        let h = h.reserve_sale(sold).unwrap();
        if let Ok(resized) = h.resize(new_total) {
            prop_assert_eq!(resized.cerrado, resized.cantidad_disponible.is_zero());
            prop_assert_eq!(resized.sold(), sold);
        }
    }

    /// Sale totals are quantity times unit price to two decimals
    #[test]
    fn prop_sale_total(cantidad in quantity(), precio in (1i64..1_000_000i64).prop_map(Decimal::from)) {
        let total = sale_total(cantidad, precio);
        prop_assert_eq!(total, (cantidad * precio).round_dp(2));
        prop_assert!(total > Decimal::ZERO);
    }
}
