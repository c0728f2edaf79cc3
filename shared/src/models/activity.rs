//! Field activities assigned on a crop

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Completion state of an activity (stored as a boolean)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    Pendiente,
    Completada,
}

impl From<bool> for ActivityStatus {
    fn from(done: bool) -> Self {
        if done {
            ActivityStatus::Completada
        } else {
            ActivityStatus::Pendiente
        }
    }
}

/// Labor cost of an activity at the given hourly rate
pub fn labor_cost(hours: Decimal, hourly_rate: Decimal) -> Decimal {
    (hours * hourly_rate).round_dp(2)
}

/// Validate the fields every activity must carry
pub fn validate_activity(description: &str, hours: Decimal) -> Result<(), &'static str> {
    if description.trim().is_empty() {
        return Err("Activity description cannot be empty");
    }
    if hours < Decimal::ZERO {
        return Err("Hours cannot be negative");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labor_cost() {
        assert_eq!(labor_cost(Decimal::new(25, 1), Decimal::from(10)), Decimal::from(25));
    }

    #[test]
    fn test_validate_activity() {
        assert!(validate_activity("Riego", Decimal::from(2)).is_ok());
        assert!(validate_activity("   ", Decimal::from(2)).is_err());
        assert!(validate_activity("Poda", Decimal::from(-1)).is_err());
    }
}
