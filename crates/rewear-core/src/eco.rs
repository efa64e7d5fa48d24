use rewear_types::models::{Category, Condition};

use crate::CoreError;

/// Impact of an average garment before material and wear adjustments.
pub const BASE_IMPACT: f64 = 5.0;

pub fn category_factor(category: Category) -> f64 {
    match category {
        Category::Synthetic => 1.5,
        Category::Cotton => 0.8,
        Category::Mixed => 1.0,
    }
}

pub fn condition_factor(condition: Condition) -> f64 {
    match condition {
        Condition::New => 1.2,
        Condition::LikeNew => 1.0,
        Condition::Good => 0.8,
        Condition::Fair => 0.6,
    }
}

/// `BASE_IMPACT × category factor × condition factor`, in that order.
pub fn compute_eco_impact(category: Category, condition: Condition) -> f64 {
    BASE_IMPACT * category_factor(category) * condition_factor(condition)
}

/// Pick the score stored on a new listing.
///
/// A supplied value wins, including `0.0`; only `None` triggers computation.
pub fn resolve_eco_impact(
    supplied: Option<f64>,
    category: Category,
    condition: Condition,
) -> Result<f64, CoreError> {
    match supplied {
        Some(value) if value.is_finite() && value >= 0.0 => Ok(value),
        Some(value) => Err(CoreError::InvalidArgument(format!(
            "eco_impact must be a finite number >= 0, got {}",
            value
        ))),
        None => Ok(compute_eco_impact(category, condition)),
    }
}
