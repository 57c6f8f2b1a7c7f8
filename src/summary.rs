use serde::Serialize;
use std::collections::BTreeMap;

use crate::asset::{Asset, AssetStatus};

const LATEST_LIMIT: usize = 10;

/// Totals for one grouping key (category or location).
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct GroupTotals {
    pub count: usize,
    pub purchase_value: f64,
    pub book_value: f64,
}

/// Asset counts by age since purchase.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct AgeDistribution {
    #[serde(rename = "0-1")]
    pub under_one: usize,
    #[serde(rename = "1-3")]
    pub one_to_three: usize,
    #[serde(rename = "3-5")]
    pub three_to_five: usize,
    #[serde(rename = "5+")]
    pub over_five: usize,
}

/// Dashboard numbers. Disposed assets only show up in `disposed` and in the
/// age distribution, which covers every asset ever registered.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct Summary {
    pub total_assets: usize,
    pub disposed: usize,
    pub under_repair: usize,
    pub to_be_disposed: usize,
    pub lost: usize,
    pub total_purchase_value: f64,
    pub total_book_value: f64,
    pub total_depreciation_value: f64,
    pub by_category: BTreeMap<String, GroupTotals>,
    pub by_location: BTreeMap<String, GroupTotals>,
    pub age_distribution: AgeDistribution,
    /// Most recently purchased assets
    pub latest: Vec<Asset>,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn add_to(group: &mut GroupTotals, asset: &Asset) {
    group.count += 1;
    group.purchase_value = round2(group.purchase_value + asset.purchase_cost);
    group.book_value = round2(group.book_value + asset.financials.book_value);
}

impl Summary {
    pub fn build<'a>(assets: impl IntoIterator<Item = &'a Asset>, current_year: i32) -> Self {
        let mut summary = Summary::default();
        let mut live: Vec<&Asset> = Vec::new();

        for asset in assets {
            let age = current_year - asset.purchase_year();
            let bucket = &mut summary.age_distribution;
            match age {
                i32::MIN..=1 => bucket.under_one += 1,
                2..=3 => bucket.one_to_three += 1,
                4..=5 => bucket.three_to_five += 1,
                _ => bucket.over_five += 1,
            }

            if asset.status == AssetStatus::Disposed {
                summary.disposed += 1;
                continue;
            }
            match asset.status {
                AssetStatus::UnderRepair => summary.under_repair += 1,
                AssetStatus::ToBeDisposed => summary.to_be_disposed += 1,
                AssetStatus::Lost => summary.lost += 1,
                _ => {}
            }

            summary.total_assets += 1;
            summary.total_purchase_value += asset.purchase_cost;
            summary.total_book_value += asset.financials.book_value;

            add_to(
                summary.by_category.entry(asset.category.clone()).or_default(),
                asset,
            );
            add_to(
                summary.by_location.entry(asset.location.clone()).or_default(),
                asset,
            );

            live.push(asset);
        }

        summary.total_purchase_value = round2(summary.total_purchase_value);
        summary.total_book_value = round2(summary.total_book_value);
        summary.total_depreciation_value =
            round2(summary.total_purchase_value - summary.total_book_value);

        live.sort_by(|a, b| b.purchase_date.cmp(&a.purchase_date).then(b.id.cmp(&a.id)));
        summary.latest = live.into_iter().take(LATEST_LIMIT).cloned().collect();
        summary
    }
}
