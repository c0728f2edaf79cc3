//! Notification tests
//!
//! Broadcast notifications have no recipient and are visible to everyone;
//! targeted ones only to their recipient.

use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    is_visible_to, low_stock_draft, threshold_draft, NotificationType, SensorRange, ThresholdBreach,
};
use uuid::Uuid;

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_notification_type_names() {
        for (tipo, name) in [
            (NotificationType::StockBajo, "stock_bajo"),
            (NotificationType::UmbralSensor, "umbral_sensor"),
            (NotificationType::Actividad, "actividad"),
            (NotificationType::Sistema, "sistema"),
        ] {
            assert_eq!(tipo.as_str(), name);
            assert_eq!(NotificationType::try_from(name.to_string()).unwrap(), tipo);
        }
        assert!(NotificationType::try_from("weather".to_string()).is_err());
    }

    #[test]
    fn test_type_serializes_snake_case() {
        let json = serde_json::to_string(&NotificationType::UmbralSensor).unwrap();
        assert_eq!(json, "\"umbral_sensor\"");
    }

    #[test]
    fn test_threshold_below_message() {
        let range = SensorRange::new(40.0, 80.0).unwrap();
        let zona = Uuid::new_v4();
        let draft = threshold_draft(zona, "Lote Norte", "hum", 35.0, Some("%"), &range, ThresholdBreach::Below);
        assert_eq!(draft.tipo, NotificationType::UmbralSensor);
        assert_eq!(draft.titulo, "Umbral de hum superado en Lote Norte");
        assert!(draft.mensaje.contains("por debajo del mínimo 40%"));
        assert_eq!(draft.entidad, Some("zonas"));
        assert_eq!(draft.entidad_id, Some(zona));
    }

    #[test]
    fn test_threshold_without_unit() {
        let range = SensorRange::new(0.0, 14.0).unwrap();
        let draft = threshold_draft(Uuid::nil(), "Vivero", "ph", 14.5, None, &range, ThresholdBreach::Above);
        assert_eq!(draft.mensaje, "El sensor ph registró 14.5, por encima del máximo 14");
    }

    #[test]
    fn test_low_stock_title() {
        let draft = low_stock_draft(Uuid::nil(), "Urea 46%", Decimal::ZERO, Decimal::from(5), "kg");
        assert_eq!(draft.titulo, "Stock bajo: Urea 46%");
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    fn uuid_strategy() -> impl Strategy<Value = Uuid> {
        any::<u128>().prop_map(Uuid::from_u128)
    }

    proptest! {
        /// Broadcasts reach every user
        #[test]
        fn prop_broadcast_visible(user in uuid_strategy()) {
            prop_assert!(is_visible_to(None, user));
        }

        /// Targeted notifications reach only their recipient
        #[test]
        fn prop_targeted_visibility(recipient in uuid_strategy(), user in uuid_strategy()) {
            prop_assert_eq!(is_visible_to(Some(recipient), user), recipient == user);
        }

        /// Breach direction always matches the side of the range
        #[test]
        fn prop_breach_direction(min in -50.0f64..50.0f64, width in 0.0f64..100.0f64, value in -200.0f64..200.0f64) {
            let range = SensorRange::new(min, min + width).unwrap();
            match range.check(value) {
                Some(ThresholdBreach::Below) => prop_assert!(value < range.minimo),
                Some(ThresholdBreach::Above) => prop_assert!(value > range.maximo),
                None => prop_assert!(value >= range.minimo && value <= range.maximo),
            }
        }
    }
}
