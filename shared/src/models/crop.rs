//! Crop records planted as a variety in a zone

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Lifecycle state of a crop. Stored as 1 (en curso) / 0 (finalizado).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CropStatus {
    EnCurso,
    Finalizado,
}

impl CropStatus {
    pub fn from_code(code: i16) -> Self {
        if code == 0 {
            CropStatus::Finalizado
        } else {
            CropStatus::EnCurso
        }
    }

    pub fn code(&self) -> i16 {
        match self {
            CropStatus::EnCurso => 1,
            CropStatus::Finalizado => 0,
        }
    }
}

/// Age of a crop in days: from sowing to harvest date when finalized,
/// otherwise to `today`. Never negative.
pub fn crop_age_days(sowing: NaiveDate, harvest: Option<NaiveDate>, today: NaiveDate) -> i64 {
    let end = harvest.unwrap_or(today);
    (end - sowing).num_days().max(0)
}

/// Average yield per plant. `None` when the plant count is unknown or zero.
pub fn average_yield(total_harvested: Decimal, current_plants: Option<i32>) -> Option<Decimal> {
    match current_plants {
        Some(plants) if plants > 0 => Some((total_harvested / Decimal::from(plants)).round_dp(2)),
        _ => None,
    }
}

/// Check a new current plant count against the initial one
pub fn validate_plant_count(current: i32, initial: Option<i32>) -> Result<(), DomainError> {
    if current < 0 {
        return Err(DomainError::NonPositiveQuantity(Decimal::from(current)));
    }
    if let Some(initial) = initial {
        if current > initial {
            return Err(DomainError::PlantCountExceedsInitial { current, initial });
        }
    }
    Ok(())
}

/// Resolve the harvest date for finalizing a crop. A crop cannot be
/// finalized twice and the date cannot precede sowing.
pub fn finalize_date(
    status: CropStatus,
    sowing: NaiveDate,
    requested: Option<NaiveDate>,
    today: NaiveDate,
) -> Result<NaiveDate, &'static str> {
    if status == CropStatus::Finalizado {
        return Err("Crop is already finalized");
    }
    let date = requested.unwrap_or(today);
    if date < sowing {
        return Err("Harvest date cannot be before the sowing date");
    }
    Ok(date)
}
