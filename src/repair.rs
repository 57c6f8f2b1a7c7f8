use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::activity::{Activity, ActivityKind, RepairLog, RepairOutcome};
use crate::asset::{Asset, AssetStatus};
use crate::error::{AppError, AppResult};
use crate::login::User;
use crate::store::StoreState;

/// Hand a repaired asset straight back into service.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AllocateRepaired {
    pub location: String,
    pub room: String,
    /// Keeps the current business unit when empty
    #[serde(default)]
    pub business_unit: String,
    pub description: String,
    #[serde(default)]
    pub notes: String,
}

/// Return an `Under Repair` asset to `Active` at a new placement.
///
/// Unlike storing a repaired asset this takes effect immediately; it is
/// refused while another request for the asset is waiting for a decision.
pub(crate) fn allocate(
    state: &mut StoreState,
    actor: &User,
    asset_id: u64,
    form: AllocateRepaired,
    now: DateTime<Utc>,
) -> AppResult<Asset> {
    if !actor.is_active {
        return Err(AppError::forbidden("inactive users cannot allocate assets"));
    }
    if form.description.trim().is_empty() {
        return Err(AppError::invalid_input("repair description is required"));
    }

    let mut asset = state
        .assets
        .get(&asset_id)
        .cloned()
        .ok_or_else(|| AppError::not_found(format!("asset {}", asset_id)))?;
    if asset.status != AssetStatus::UnderRepair {
        return Err(AppError::invalid_state(format!(
            "asset {} is {}, not {}",
            asset_id,
            asset.status,
            AssetStatus::UnderRepair
        )));
    }
    if let Some(open) = state.pending_for_asset(asset_id) {
        return Err(AppError::Conflict(format!(
            "asset {} has pending request #{}",
            asset_id, open.id
        )));
    }
    state.reference.check_placement(&form.location, &form.room)?;

    asset.status = AssetStatus::Active;
    asset.location = form.location;
    asset.room = form.room;
    if !form.business_unit.trim().is_empty() {
        asset.business_unit = form.business_unit;
    }
    asset.updated_at = now;

    state.activity.record(Activity {
        asset_id,
        asset_name: asset.name.clone(),
        request_id: None,
        performed_by: actor.username.clone(),
        recorded_at: now,
        kind: ActivityKind::Repair(RepairLog {
            outcome: RepairOutcome::Allocated,
            description: form.description,
            new_placement: asset.placement(),
            notes: form.notes,
        }),
    });
    state.assets.insert(asset_id, asset.clone());
    Ok(asset)
}
