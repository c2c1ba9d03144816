use arrow::array::{ArrayRef, Float64Array, Int64Array};
use std::sync::Arc;

use super::FeatureDef;
use crate::table::numeric_values;

const REAL: &str = "days_for_shipping_real";
const SCHEDULED: &str = "days_for_shipment_scheduled";

/// 1 when the shipment took no longer than scheduled.
pub fn on_time_delivery() -> FeatureDef {
    FeatureDef::new("on_time_delivery", &[REAL, SCHEDULED], |batch| {
        let real = numeric_values(batch, REAL)?;
        let scheduled = numeric_values(batch, SCHEDULED)?;
        let flags: Int64Array = real
            .iter()
            .zip(&scheduled)
            .map(|(r, s)| r.zip(*s).map(|(r, s)| (r <= s) as i64))
            .collect();
        Ok(Arc::new(flags) as ArrayRef)
    })
}

/// Real shipping days minus the scheduled days, with negative schedules
/// clamped to zero.
pub fn delay_days() -> FeatureDef {
    FeatureDef::new("delay_days", &[REAL, SCHEDULED], |batch| {
        let real = numeric_values(batch, REAL)?;
        let scheduled = numeric_values(batch, SCHEDULED)?;
        let delay: Float64Array = real
            .iter()
            .zip(&scheduled)
            .map(|(r, s)| r.zip(*s).map(|(r, s)| r - s.max(0.0)))
            .collect();
        Ok(Arc::new(delay) as ArrayRef)
    })
}
