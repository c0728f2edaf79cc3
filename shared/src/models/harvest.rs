//! Harvest availability and the sales drawn against it

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::validation::{validate_amount, MAX_AMOUNT};

/// Quantity bookkeeping of a single harvest.
///
/// Invariant: `0 <= disponible <= cantidad`. A closed harvest accepts no sales.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HarvestBalance {
    pub cantidad: Decimal,
    pub cantidad_disponible: Decimal,
    pub cerrado: bool,
}

impl HarvestBalance {
    /// A freshly recorded harvest has everything available
    pub fn new(cantidad: Decimal) -> Result<Self, DomainError> {
        if cantidad <= Decimal::ZERO {
            return Err(DomainError::NonPositiveQuantity(cantidad));
        }
        validate_amount("cantidad", cantidad, MAX_AMOUNT)?;
        Ok(Self {
            cantidad,
            cantidad_disponible: cantidad,
            cerrado: false,
        })
    }

    /// Quantity already sold
    pub fn sold(&self) -> Decimal {
        self.cantidad - self.cantidad_disponible
    }

    /// Take `quantity` out for a sale. Closes the harvest when nothing is left.
    pub fn reserve_sale(&self, quantity: Decimal) -> Result<Self, DomainError> {
        if self.cerrado {
            return Err(DomainError::HarvestClosed);
        }
        if quantity <= Decimal::ZERO {
            return Err(DomainError::NonPositiveQuantity(quantity));
        }
        if quantity > self.cantidad_disponible {
            return Err(DomainError::InsufficientHarvest {
                available: self.cantidad_disponible,
                requested: quantity,
            });
        }
        let disponible = self.cantidad_disponible - quantity;
        Ok(Self {
            cantidad: self.cantidad,
            cantidad_disponible: disponible,
            cerrado: disponible.is_zero(),
        })
    }

    /// Give back the quantity of a deleted sale. A harvest that was closed
    /// because it ran out is reopened; a manually closed one stays closed.
    pub fn release_sale(&self, quantity: Decimal) -> Self {
        let exhausted = self.cerrado && self.cantidad_disponible.is_zero();
        let disponible = (self.cantidad_disponible + quantity).min(self.cantidad);
        Self {
            cantidad: self.cantidad,
            cantidad_disponible: disponible,
            cerrado: if exhausted { false } else { self.cerrado },
        }
    }

    /// Change the harvested total; availability shifts by the same delta.
    /// Shrinking to exactly what was sold closes the harvest, and growing an
    /// exhausted one reopens it. A manual close survives either way.
    pub fn resize(&self, new_cantidad: Decimal) -> Result<Self, DomainError> {
        if new_cantidad <= Decimal::ZERO {
            return Err(DomainError::NonPositiveQuantity(new_cantidad));
        }
        validate_amount("cantidad", new_cantidad, MAX_AMOUNT)?;
        let sold = self.sold();
        if new_cantidad < sold {
            return Err(DomainError::HarvestBelowSold {
                new_total: new_cantidad,
                sold,
            });
        }
        let disponible = new_cantidad - sold;
        let exhausted = self.cerrado && self.cantidad_disponible.is_zero();
        Ok(Self {
            cantidad: new_cantidad,
            cantidad_disponible: disponible,
            cerrado: disponible.is_zero() || (self.cerrado && !exhausted),
        })
    }

    /// Stop accepting sales regardless of what is left
    pub fn close(&self) -> Result<Self, DomainError> {
        if self.cerrado {
            return Err(DomainError::HarvestClosed);
        }
        Ok(Self {
            cerrado: true,
            ..*self
        })
    }
}

/// Total of a sale line
pub fn sale_total(cantidad: Decimal, precio_unitario: Decimal) -> Decimal {
    (cantidad * precio_unitario).round_dp(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(v: i64) -> Decimal {
        Decimal::from(v)
    }

    #[test]
    fn test_new_harvest_fully_available() {
        let h = HarvestBalance::new(dec(100)).unwrap();
        assert_eq!(h.cantidad_disponible, dec(100));
        assert!(!h.cerrado);
        assert!(HarvestBalance::new(dec(0)).is_err());
    }

    #[test]
    fn test_sale_decrements_and_closes() {
        let h = HarvestBalance::new(dec(10)).unwrap();
        let h = h.reserve_sale(dec(4)).unwrap();
        assert_eq!(h.cantidad_disponible, dec(6));
        assert!(!h.cerrado);
        let h = h.reserve_sale(dec(6)).unwrap();
        assert!(h.cantidad_disponible.is_zero());
        assert!(h.cerrado);
        assert_eq!(h.reserve_sale(dec(1)), Err(DomainError::HarvestClosed));
    }

    #[test]
    fn test_oversell_rejected() {
        let h = HarvestBalance::new(dec(10)).unwrap();
        assert!(matches!(
            h.reserve_sale(dec(11)),
            Err(DomainError::InsufficientHarvest { .. })
        ));
    }

    #[test]
    fn test_release_reopens_exhausted() {
        let h = HarvestBalance::new(dec(10)).unwrap().reserve_sale(dec(10)).unwrap();
        let h = h.release_sale(dec(3));
        assert_eq!(h.cantidad_disponible, dec(3));
        assert!(!h.cerrado);
    }

    #[test]
    fn test_release_keeps_manual_close() {
        let h = HarvestBalance::new(dec(10))
            .unwrap()
            .reserve_sale(dec(4))
            .unwrap()
            .close()
            .unwrap();
        let h = h.release_sale(dec(4));
        assert_eq!(h.cantidad_disponible, dec(10));
        assert!(h.cerrado);
    }

    #[test]
    fn test_close_only_once() {
        let h = HarvestBalance::new(dec(10)).unwrap().close().unwrap();
        assert!(h.cerrado);
        assert_eq!(h.cantidad_disponible, dec(10));
        assert_eq!(h.close(), Err(DomainError::HarvestClosed));
    }

    #[test]
    fn test_resize_shifts_availability() {
        let h = HarvestBalance::new(dec(10)).unwrap().reserve_sale(dec(4)).unwrap();
        let grown = h.resize(dec(15)).unwrap();
        assert_eq!(grown.cantidad_disponible, dec(11));
        let shrunk = h.resize(dec(4)).unwrap();
        assert!(shrunk.cantidad_disponible.is_zero());
        assert!(h.resize(dec(3)).is_err());
    }

    #[test]
    fn test_resize_to_sold_closes_open_harvest() {
        let h = HarvestBalance::new(dec(10)).unwrap().reserve_sale(dec(4)).unwrap();
        assert!(!h.cerrado);
        let shrunk = h.resize(dec(4)).unwrap();
        assert!(shrunk.cerrado);
        assert_eq!(shrunk.reserve_sale(dec(1)), Err(DomainError::HarvestClosed));

        let regrown = shrunk.resize(dec(6)).unwrap();
        assert_eq!(regrown.cantidad_disponible, dec(2));
        assert!(!regrown.cerrado);
    }

    #[test]
    fn test_resize_keeps_manual_close() {
        let h = HarvestBalance::new(dec(10))
            .unwrap()
            .reserve_sale(dec(4))
            .unwrap()
            .close()
            .unwrap();
        let grown = h.resize(dec(20)).unwrap();
        assert_eq!(grown.cantidad_disponible, dec(16));
        assert!(grown.cerrado);
    }

    #[test]
    fn test_quantity_beyond_column_rejected() {
        let over = MAX_AMOUNT + Decimal::new(1, 2);
        assert!(matches!(
            HarvestBalance::new(over),
            Err(DomainError::OutOfRange { field: "cantidad", .. })
        ));
        let h = HarvestBalance::new(dec(10)).unwrap();
        assert!(matches!(h.resize(over), Err(DomainError::OutOfRange { .. })));
        assert!(HarvestBalance::new(MAX_AMOUNT).is_ok());
    }

    #[test]
    fn test_sale_total() {
        assert_eq!(sale_total(Decimal::new(25, 1), dec(3000)), dec(7500));
    }
}
