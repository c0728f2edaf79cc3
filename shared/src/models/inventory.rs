//! Inventory products and stock movements

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::validation::{validate_amount, MAX_AMOUNT, MAX_CAPACITY};

/// Kind of inventory movement
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    /// Stock received
    Entrada,
    /// Stock consumed or sold
    Salida,
    /// Signed correction after a physical count
    Ajuste,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Entrada => "entrada",
            MovementType::Salida => "salida",
            MovementType::Ajuste => "ajuste",
        }
    }
}

impl fmt::Display for MovementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovementType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "entrada" => Ok(MovementType::Entrada),
            "salida" => Ok(MovementType::Salida),
            "ajuste" => Ok(MovementType::Ajuste),
            other => Err(DomainError::UnknownVariant {
                kind: "tipo",
                value: other.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for MovementType {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Result of applying a movement to a product's stock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovementOutcome {
    /// Quantity expressed in base units (presentations × capacity)
    pub unidades_base: Decimal,
    /// Signed change applied to stock
    pub delta: Decimal,
    pub stock_resultante: Decimal,
    /// Stock ended at or below the product's minimum
    pub bajo_stock: bool,
}

/// Apply a movement of `cantidad` presentations to `stock` (kept in base
/// units). Entrada/salida take a positive quantity; ajuste takes a signed,
/// non-zero one. Stock never goes negative, and no figure may outgrow what
/// the stock columns can store.
pub fn apply_movement(
    tipo: MovementType,
    cantidad: Decimal,
    capacidad_presentacion: Decimal,
    stock: Decimal,
    stock_minimo: Decimal,
) -> Result<MovementOutcome, DomainError> {
    match tipo {
        MovementType::Entrada | MovementType::Salida if cantidad <= Decimal::ZERO => {
            return Err(DomainError::NonPositiveQuantity(cantidad));
        }
        MovementType::Ajuste if cantidad.is_zero() => return Err(DomainError::ZeroAdjustment),
        _ => {}
    }
    if capacidad_presentacion <= Decimal::ZERO {
        return Err(DomainError::NonPositiveQuantity(capacidad_presentacion));
    }
    validate_amount("cantidad", cantidad, MAX_AMOUNT)?;
    validate_amount("capacidad_presentacion", capacidad_presentacion, MAX_CAPACITY)?;

    let unidades_base = cantidad
        .checked_mul(capacidad_presentacion)
        .ok_or(DomainError::OutOfRange {
            field: "cantidad",
            value: cantidad,
            max: MAX_AMOUNT,
        })?;
    validate_amount("cantidad", unidades_base, MAX_AMOUNT)?;
    let delta = match tipo {
        MovementType::Entrada | MovementType::Ajuste => unidades_base,
        MovementType::Salida => -unidades_base,
    };

    let stock_resultante = stock.checked_add(delta).ok_or(DomainError::OutOfRange {
        field: "stock",
        value: stock,
        max: MAX_AMOUNT,
    })?;
    validate_amount("stock", stock_resultante, MAX_AMOUNT)?;
    if stock_resultante < Decimal::ZERO {
        return Err(DomainError::InsufficientStock {
            available: stock,
            requested: -delta,
        });
    }

    Ok(MovementOutcome {
        unidades_base: unidades_base.abs(),
        delta,
        stock_resultante,
        bajo_stock: stock_resultante <= stock_minimo,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(v: i64) -> Decimal {
        Decimal::from(v)
    }

    #[test]
    fn test_entrada_uses_capacity() {
        let out = apply_movement(MovementType::Entrada, dec(3), dec(25), dec(0), dec(10)).unwrap();
        assert_eq!(out.unidades_base, dec(75));
        assert_eq!(out.stock_resultante, dec(75));
        assert!(!out.bajo_stock);
    }

    #[test]
    fn test_salida_cannot_go_negative() {
        let err = apply_movement(MovementType::Salida, dec(2), dec(1), dec(1), dec(0)).unwrap_err();
        assert_eq!(
            err,
            DomainError::InsufficientStock {
                available: dec(1),
                requested: dec(2)
            }
        );
    }

    #[test]
    fn test_salida_to_minimum_flags_low_stock() {
        let out = apply_movement(MovementType::Salida, dec(5), dec(1), dec(10), dec(5)).unwrap();
        assert_eq!(out.stock_resultante, dec(5));
        assert!(out.bajo_stock);
    }

    #[test]
    fn test_ajuste_signed() {
        let out = apply_movement(MovementType::Ajuste, dec(-4), dec(1), dec(10), dec(0)).unwrap();
        assert_eq!(out.stock_resultante, dec(6));
        assert_eq!(out.unidades_base, dec(4));
        assert_eq!(
            apply_movement(MovementType::Ajuste, dec(0), dec(1), dec(10), dec(0)),
            Err(DomainError::ZeroAdjustment)
        );
    }

    #[test]
    fn test_entrada_requires_positive() {
        assert!(apply_movement(MovementType::Entrada, dec(-1), dec(1), dec(10), dec(0)).is_err());
    }

    #[test]
    fn test_huge_quantity_is_rejected_not_overflowed() {
        let huge = Decimal::from_scientific("1e28").unwrap();
        let err = apply_movement(MovementType::Entrada, huge, dec(10), dec(0), dec(0)).unwrap_err();
        assert!(matches!(err, DomainError::OutOfRange { field: "cantidad", .. }));

        let err = apply_movement(MovementType::Ajuste, -huge, dec(10), dec(0), dec(0)).unwrap_err();
        assert_eq!(err.field(), Some("cantidad"));
    }

    #[test]
    fn test_base_units_beyond_column_rejected() {
        // each factor fits its column, the product does not
        let err = apply_movement(MovementType::Entrada, MAX_AMOUNT, dec(2), dec(0), dec(0)).unwrap_err();
        assert!(matches!(err, DomainError::OutOfRange { field: "cantidad", .. }));
    }

    #[test]
    fn test_entrada_cannot_push_stock_past_limit() {
        let err = apply_movement(MovementType::Entrada, dec(1), dec(1), MAX_AMOUNT, dec(0)).unwrap_err();
        assert!(matches!(err, DomainError::OutOfRange { field: "stock", .. }));
        let out = apply_movement(MovementType::Salida, dec(1), dec(1), MAX_AMOUNT, dec(0)).unwrap();
        assert_eq!(out.stock_resultante, MAX_AMOUNT - dec(1));
    }

    #[test]
    fn test_parse_movement_type() {
        assert_eq!("salida".parse::<MovementType>().unwrap(), MovementType::Salida);
        assert!("transfer".parse::<MovementType>().is_err());
        assert_eq!(MovementType::Ajuste.to_string(), "ajuste");
    }
}
