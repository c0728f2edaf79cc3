//! Notifications raised by stock and sensor events

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{SensorRange, ThresholdBreach};
use crate::error::DomainError;

/// Category of a notification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    StockBajo,
    UmbralSensor,
    Actividad,
    Sistema,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::StockBajo => "stock_bajo",
            NotificationType::UmbralSensor => "umbral_sensor",
            NotificationType::Actividad => "actividad",
            NotificationType::Sistema => "sistema",
        }
    }
}

impl TryFrom<String> for NotificationType {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "stock_bajo" => Ok(NotificationType::StockBajo),
            "umbral_sensor" => Ok(NotificationType::UmbralSensor),
            "actividad" => Ok(NotificationType::Actividad),
            "sistema" => Ok(NotificationType::Sistema),
            _ => Err(DomainError::UnknownVariant { kind: "tipo", value }),
        }
    }
}

/// Title and body of a notification before it is stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationDraft {
    pub tipo: NotificationType,
    pub titulo: String,
    pub mensaje: String,
    pub entidad: Option<&'static str>,
    pub entidad_id: Option<Uuid>,
}

/// Broadcast notifications (no recipient) reach everybody
pub fn is_visible_to(recipient: Option<Uuid>, user_id: Uuid) -> bool {
    recipient.map_or(true, |r| r == user_id)
}

pub fn low_stock_draft(
    producto_id: Uuid,
    producto: &str,
    stock: Decimal,
    stock_minimo: Decimal,
    unidad: &str,
) -> NotificationDraft {
    NotificationDraft {
        tipo: NotificationType::StockBajo,
        titulo: format!("Stock bajo: {}", producto),
        mensaje: format!(
            "El producto {} quedó con {} {} (mínimo {} {})",
            producto,
            stock.normalize(),
            unidad,
            stock_minimo.normalize(),
            unidad
        ),
        entidad: Some("productos"),
        entidad_id: Some(producto_id),
    }
}

pub fn threshold_draft(
    zona_id: Uuid,
    zona: &str,
    key: &str,
    valor: f64,
    unidad: Option<&str>,
    range: &SensorRange,
    breach: ThresholdBreach,
) -> NotificationDraft {
    let unidad = unidad.unwrap_or("");
    let detalle = match breach {
        ThresholdBreach::Below => format!("por debajo del mínimo {}{}", range.minimo, unidad),
        ThresholdBreach::Above => format!("por encima del máximo {}{}", range.maximo, unidad),
    };
    NotificationDraft {
        tipo: NotificationType::UmbralSensor,
        titulo: format!("Umbral de {} superado en {}", key, zona),
        mensaje: format!("El sensor {} registró {}{}, {}", key, valor, unidad, detalle),
        entidad: Some("zonas"),
        entidad_id: Some(zona_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visibility() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        assert!(is_visible_to(None, me));
        assert!(is_visible_to(Some(me), me));
        assert!(!is_visible_to(Some(other), me));
    }

    #[test]
    fn test_low_stock_message() {
        let draft = low_stock_draft(Uuid::nil(), "Urea", Decimal::new(500, 2), Decimal::from(10), "kg");
        assert_eq!(draft.tipo, NotificationType::StockBajo);
        assert_eq!(draft.mensaje, "El producto Urea quedó con 5 kg (mínimo 10 kg)");
    }

    #[test]
    fn test_threshold_message() {
        let range = SensorRange::new(10.0, 30.0).unwrap();
        let draft = threshold_draft(
            Uuid::nil(),
            "Invernadero",
            "temp",
            35.5,
            Some("°C"),
            &range,
            ThresholdBreach::Above,
        );
        assert_eq!(draft.titulo, "Umbral de temp superado en Invernadero");
        assert!(draft.mensaje.contains("máximo 30°C"));
    }

    #[test]
    fn test_type_round_trip_from_db() {
        assert_eq!(
            NotificationType::try_from("umbral_sensor".to_string()).unwrap(),
            NotificationType::UmbralSensor
        );
        assert!(NotificationType::try_from("otro".to_string()).is_err());
    }
}
