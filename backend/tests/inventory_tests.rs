//! Inventory movement tests
//!
//! Stock is kept in base units; every movement converts presentation units
//! through the product capacity and can never push stock below zero.

use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{apply_movement, low_stock_draft, DomainError, MovementType, NotificationType, MAX_AMOUNT};
use std::str::FromStr;
use uuid::Uuid;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_movement_type_names() {
        for (tipo, name) in [
            (MovementType::Entrada, "entrada"),
            (MovementType::Salida, "salida"),
            (MovementType::Ajuste, "ajuste"),
        ] {
            assert_eq!(tipo.as_str(), name);
            assert_eq!(name.parse::<MovementType>().unwrap(), tipo);
        }
    }

    #[test]
    fn test_unknown_movement_type_rejected() {
        let err = "transferencia".parse::<MovementType>().unwrap_err();
        assert_eq!(err.field(), Some("tipo"));
    }

    #[test]
    fn test_bags_converted_to_base_units() {
        // 2 bags of 50 kg
        let out = apply_movement(MovementType::Entrada, dec("2"), dec("50"), dec("10"), dec("20")).unwrap();
        assert_eq!(out.unidades_base, dec("100"));
        assert_eq!(out.delta, dec("100"));
        assert_eq!(out.stock_resultante, dec("110"));
        assert!(!out.bajo_stock);
    }

    #[test]
    fn test_fractional_presentation() {
        let out = apply_movement(MovementType::Salida, dec("1.5"), dec("0.5"), dec("1"), dec("0")).unwrap();
        assert_eq!(out.stock_resultante, dec("0.25"));
    }

    #[test]
    fn test_salida_exactly_empties_stock() {
        let out = apply_movement(MovementType::Salida, dec("4"), dec("1"), dec("4"), dec("0")).unwrap();
        assert_eq!(out.stock_resultante, Decimal::ZERO);
        assert!(out.bajo_stock);
    }

    #[test]
    fn test_salida_beyond_stock_rejected() {
        let err = apply_movement(MovementType::Salida, dec("3"), dec("2"), dec("5"), dec("0")).unwrap_err();
        assert_eq!(
            err,
            DomainError::InsufficientStock {
                available: dec("5"),
                requested: dec("6"),
            }
        );
    }

    #[test]
    fn test_negative_adjustment_beyond_stock_rejected() {
        assert!(matches!(
            apply_movement(MovementType::Ajuste, dec("-11"), dec("1"), dec("10"), dec("0")),
            Err(DomainError::InsufficientStock { .. })
        ));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(
            apply_movement(MovementType::Entrada, dec("1"), dec("0"), dec("0"), dec("0")),
            Err(DomainError::NonPositiveQuantity(_))
        ));
    }

    #[test]
    fn test_oversized_entrada_is_a_validation_error() {
        let huge = Decimal::from_scientific("1e28").unwrap();
        let err = apply_movement(MovementType::Entrada, huge, dec("10"), dec("0"), dec("0")).unwrap_err();
        assert!(matches!(err, DomainError::OutOfRange { field: "cantidad", .. }));
    }

    #[test]
    fn test_stock_cannot_outgrow_its_column() {
        let err = apply_movement(MovementType::Ajuste, dec("0.01"), dec("1"), MAX_AMOUNT, dec("0")).unwrap_err();
        assert_eq!(err.field(), Some("stock"));
    }

    #[test]
    fn test_low_stock_notification_targets_product() {
        let id = Uuid::new_v4();
        let draft = low_stock_draft(id, "Fungicida", dec("2.50"), dec("5"), "L");
        assert_eq!(draft.tipo, NotificationType::StockBajo);
        assert_eq!(draft.entidad, Some("productos"));
        assert_eq!(draft.entidad_id, Some(id));
        assert!(draft.mensaje.contains("2.5 L"));
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    fn quantity_strategy() -> impl Strategy<Value = Decimal> {
        (1i64..10_000i64).prop_map(|n| Decimal::new(n, 2))
    }

    fn capacity_strategy() -> impl Strategy<Value = Decimal> {
        (1i64..1_000i64).prop_map(|n| Decimal::new(n, 1))
    }

    fn movement_strategy() -> impl Strategy<Value = (MovementType, Decimal)> {
        prop_oneof![
            quantity_strategy().prop_map(|q| (MovementType::Entrada, q)),
            quantity_strategy().prop_map(|q| (MovementType::Salida, q)),
            quantity_strategy().prop_map(|q| (MovementType::Ajuste, q)),
            quantity_strategy().prop_map(|q| (MovementType::Ajuste, -q)),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Stock never goes negative, whatever sequence of movements is applied
        #[test]
        fn prop_stock_never_negative(
            movements in prop::collection::vec((movement_strategy(), capacity_strategy()), 1..30)
        ) {
            let mut stock = Decimal::ZERO;
            for ((tipo, cantidad), capacidad) in movements {
                match apply_movement(tipo, cantidad, capacidad, stock, Decimal::ZERO) {
                    Ok(out) => {
                        prop_assert!(out.stock_resultante >= Decimal::ZERO);
                        prop_assert_eq!(out.stock_resultante, stock + out.delta);
                        stock = out.stock_resultante;
                    }
                    Err(DomainError::InsufficientStock { available, .. }) => {
                        prop_assert_eq!(available, stock);
                    }
                    Err(other) => prop_assert!(false, "unexpected error {:?}", other),
                }
            }
        }

        /// Base units are always the absolute quantity times the capacity
        #[test]
        fn prop_base_units_scale_with_capacity(
            (tipo, cantidad) in movement_strategy(),
            capacidad in capacity_strategy()
        ) {
            let stock = dec("1000000");
            let out = apply_movement(tipo, cantidad, capacidad, stock, Decimal::ZERO).unwrap();
            prop_assert_eq!(out.unidades_base, (cantidad * capacidad).abs());
            prop_assert_eq!(out.delta.abs(), out.unidades_base);
        }

        /// Arbitrary magnitudes are either applied or rejected, never overflowed
        #[test]
        fn prop_any_magnitude_is_handled(
            mantissa in any::<i64>(),
            scale in 0u32..10u32,
            exponent in 0u32..17u32,
            capacidad in capacity_strategy()
        ) {
            let cantidad = Decimal::new(mantissa, scale) * Decimal::from(10i64.pow(exponent / 2));
            let tipo = if cantidad.is_sign_negative() { MovementType::Ajuste } else { MovementType::Entrada };
            match apply_movement(tipo, cantidad, capacidad, Decimal::ZERO, Decimal::ZERO) {
                Ok(out) => prop_assert!(out.stock_resultante <= MAX_AMOUNT),
                Err(e) => prop_assert!(matches!(
                    e,
                    DomainError::OutOfRange { .. }
                        | DomainError::InsufficientStock { .. }
                        | DomainError::NonPositiveQuantity(_)
                ), "unexpected error {:?}", e),
            }
        }

        /// Low stock is flagged exactly when the result reaches the minimum
        #[test]
        fn prop_low_stock_flag(
            stock in (0i64..500i64).prop_map(Decimal::from),
            minimo in (0i64..500i64).prop_map(Decimal::from),
            cantidad in (1i64..100i64).prop_map(Decimal::from)
        ) {
            let out = apply_movement(MovementType::Entrada, cantidad, Decimal::ONE, stock, minimo).unwrap();
            prop_assert_eq!(out.bajo_stock, out.stock_resultante <= minimo);
        }

        /// An entrada followed by a salida of the same size restores the stock
        #[test]
        fn prop_entrada_salida_cancel(
            stock in (0i64..500i64).prop_map(Decimal::from),
            cantidad in quantity_strategy(),
            capacidad in capacity_strategy()
        ) {
            let after_in = apply_movement(MovementType::Entrada, cantidad, capacidad, stock, Decimal::ZERO).unwrap();
            let after_out = apply_movement(
                MovementType::Salida,
                cantidad,
                capacidad,
                after_in.stock_resultante,
                Decimal::ZERO,
            )
            .unwrap();
            prop_assert_eq!(after_out.stock_resultante, stock);
        }
    }
}
