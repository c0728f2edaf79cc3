//! Domain rule violations raised by the pure calculations in this crate

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(String),

    #[error("Invalid date range: {start} is after {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("Quantity must be positive, got {0}")]
    NonPositiveQuantity(Decimal),

    #[error("Adjustment quantity cannot be zero")]
    ZeroAdjustment,

    #[error("Insufficient stock: available {available}, requested {requested}")]
    InsufficientStock { available: Decimal, requested: Decimal },

    #[error("Insufficient harvest quantity: available {available}, requested {requested}")]
    InsufficientHarvest { available: Decimal, requested: Decimal },

    #[error("Harvest is closed")]
    HarvestClosed,

    #[error("Harvest quantity {new_total} is below the {sold} already sold")]
    HarvestBelowSold { new_total: Decimal, sold: Decimal },

    #[error("{field} {value} exceeds the maximum of {max}")]
    OutOfRange {
        field: &'static str,
        value: Decimal,
        max: Decimal,
    },

    #[error("Plant count {current} exceeds the initial {initial}")]
    PlantCountExceedsInitial { current: i32, initial: i32 },

    #[error("Unknown value '{value}' for {kind}")]
    UnknownVariant { kind: &'static str, value: String },
}

impl DomainError {
    /// Field name the error refers to, when there is one
    pub fn field(&self) -> Option<&'static str> {
        match self {
            DomainError::InvalidCoordinates(_) => Some("coordenadas"),
            DomainError::InvalidDateRange { .. } => Some("start_date"),
            DomainError::NonPositiveQuantity(_) | DomainError::ZeroAdjustment => Some("cantidad"),
            DomainError::PlantCountExceedsInitial { .. } => Some("cantidadPlantasActual"),
            DomainError::HarvestBelowSold { .. } => Some("cantidad"),
            DomainError::UnknownVariant { kind, .. } => Some(*kind),
            DomainError::OutOfRange { field, .. } => Some(*field),
            _ => None,
        }
    }
}
