use serde::{Deserialize, Serialize};

use crate::reference::Category;

/// Depreciation-derived financial fields of an asset.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Financials {
    pub residual_value: f64,
    pub depreciation_value: f64,
    pub book_value: f64,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Straight-line depreciation of `cost` bought in `purchase_year`, as of `current_year`.
///
/// Returns `None` when the asset cannot be depreciated: non-positive cost or a
/// category without a useful life. A purchase year in the future counts as
/// zero years of use.
pub fn calculate(
    cost: f64,
    purchase_year: i32,
    current_year: i32,
    category: &Category,
) -> Option<Financials> {
    if cost.is_nan() || cost <= 0.0 || category.useful_life == 0 {
        return None;
    }

    let useful_life = category.useful_life as f64;
    let years_used = (current_year - purchase_year).max(0) as f64;

    let residual_value = cost * (category.residual_percent / 100.0);
    let annual_depreciation = (cost - residual_value) / useful_life;

    let (depreciation_value, book_value) = if years_used >= useful_life {
        (cost - residual_value, residual_value)
    } else {
        let depreciation = annual_depreciation * years_used;
        (depreciation, cost - depreciation)
    };

    Some(Financials {
        residual_value: round2(residual_value),
        depreciation_value: round2(depreciation_value),
        book_value: round2(book_value),
    })
}
