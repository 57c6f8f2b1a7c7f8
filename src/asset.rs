use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::depreciation::{self, Financials};
use crate::error::{AppError, AppResult};
use crate::reference::ReferenceData;

/// Lifecycle status of a tracked asset.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AssetStatus {
    #[serde(rename = "Active")]
    Active,
    #[serde(rename = "Under Repair")]
    UnderRepair,
    #[serde(rename = "In Storage")]
    InStorage,
    #[serde(rename = "To Be Disposed")]
    ToBeDisposed,
    #[serde(rename = "Disposed")]
    Disposed,
    #[serde(rename = "Lost")]
    Lost,
}

impl AssetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetStatus::Active => "Active",
            AssetStatus::UnderRepair => "Under Repair",
            AssetStatus::InStorage => "In Storage",
            AssetStatus::ToBeDisposed => "To Be Disposed",
            AssetStatus::Disposed => "Disposed",
            AssetStatus::Lost => "Lost",
        }
    }

    /// Disposed and lost assets accept no further requests.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AssetStatus::Disposed | AssetStatus::Lost)
    }
}

impl fmt::Display for AssetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['_', '-'], " ");
        match normalized.as_str() {
            "active" => Ok(AssetStatus::Active),
            "under repair" => Ok(AssetStatus::UnderRepair),
            "in storage" => Ok(AssetStatus::InStorage),
            "to be disposed" => Ok(AssetStatus::ToBeDisposed),
            "disposed" => Ok(AssetStatus::Disposed),
            "lost" => Ok(AssetStatus::Lost),
            _ => Err(AppError::invalid_input(format!("unknown asset status '{}'", s))),
        }
    }
}

/// Where an asset physically sits.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Placement {
    pub location: String,
    pub room: String,
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.location, self.room)
    }
}

/// A tracked physical asset as held by the store.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Asset {
    pub id: u64,
    pub name: String,
    pub category: String,
    pub asset_type: String,
    pub manufacturer: String,
    pub model: String,
    pub serial_number: String,
    pub company: String,
    pub business_unit: String,
    pub location: String,
    pub room: String,
    pub owner: String,
    pub condition: String,
    pub purchase_date: NaiveDate,
    pub purchase_cost: f64,
    pub warranty: String,
    pub supplier: String,
    pub journal: String,
    pub notes: String,
    pub status: AssetStatus,
    pub financials: Financials,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields submitted when registering a new asset.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NewAsset {
    pub name: String,
    pub category: String,
    pub asset_type: String,
    #[serde(default)]
    pub manufacturer: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub serial_number: String,
    pub company: String,
    #[serde(default)]
    pub business_unit: String,
    pub location: String,
    pub room: String,
    pub owner: String,
    #[serde(default)]
    pub condition: String,
    pub purchase_date: NaiveDate,
    pub purchase_cost: f64,
    #[serde(default)]
    pub warranty: String,
    #[serde(default)]
    pub supplier: String,
    #[serde(default)]
    pub journal: String,
    #[serde(default)]
    pub notes: String,
}

impl NewAsset {
    pub fn validate(&self, reference: &ReferenceData) -> AppResult<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::invalid_input("asset name cannot be empty"));
        }
        if reference.category(&self.category).is_none() {
            return Err(AppError::invalid_input(format!(
                "unknown category '{}'",
                self.category
            )));
        }
        if self.purchase_cost.is_nan() || self.purchase_cost < 0.0 {
            return Err(AppError::invalid_input("purchase cost cannot be negative"));
        }
        if self.company.trim().is_empty() || self.owner.trim().is_empty() {
            return Err(AppError::invalid_input("company and owner are required"));
        }
        reference.check_placement(&self.location, &self.room)
    }
}

/// Changes carried by an edit request. Unset fields stay as they are.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct AssetEdit {
    #[serde(default)]
    pub status: Option<AssetStatus>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub business_unit: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub room: Option<String>,
}

impl AssetEdit {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.company.is_none()
            && self.business_unit.is_none()
            && self.location.is_none()
            && self.room.is_none()
    }

    /// Check the edit against the asset it targets.
    ///
    /// Terminal statuses cannot be reached by an edit; disposal and loss have
    /// their own request types.
    pub fn validate(&self, asset: &Asset, reference: &ReferenceData) -> AppResult<()> {
        if self.is_empty() {
            return Err(AppError::invalid_input("edit request changes nothing"));
        }
        if let Some(status) = self.status {
            if status.is_terminal() {
                return Err(AppError::invalid_input(format!(
                    "status '{}' cannot be set by an edit",
                    status
                )));
            }
        }
        if self.location.is_some() || self.room.is_some() {
            let location = self.location.as_deref().unwrap_or(&asset.location);
            let room = self.room.as_deref().unwrap_or(&asset.room);
            reference.check_placement(location, room)?;
        }
        Ok(())
    }

    pub fn apply(&self, asset: &mut Asset) {
        if let Some(status) = self.status {
            asset.status = status;
        }
        if let Some(company) = &self.company {
            asset.company = company.clone();
        }
        if let Some(unit) = &self.business_unit {
            asset.business_unit = unit.clone();
        }
        if let Some(location) = &self.location {
            asset.location = location.clone();
        }
        if let Some(room) = &self.room {
            asset.room = room.clone();
        }
    }
}

impl Asset {
    /// Materialise an approved registration. The asset starts `Active` with
    /// financials computed from its category as of `now`.
    pub fn from_new(id: u64, new: NewAsset, reference: &ReferenceData, now: DateTime<Utc>) -> Self {
        let mut asset = Asset {
            id,
            name: new.name,
            category: new.category,
            asset_type: new.asset_type,
            manufacturer: new.manufacturer,
            model: new.model,
            serial_number: new.serial_number,
            company: new.company,
            business_unit: new.business_unit,
            location: new.location,
            room: new.room,
            owner: new.owner,
            condition: new.condition,
            purchase_date: new.purchase_date,
            purchase_cost: new.purchase_cost,
            warranty: new.warranty,
            supplier: new.supplier,
            journal: new.journal,
            notes: new.notes,
            status: AssetStatus::Active,
            financials: Financials::default(),
            created_at: now,
            updated_at: now,
        };
        asset.recalculate(reference, now.year());
        asset
    }

    pub fn placement(&self) -> Placement {
        Placement {
            location: self.location.clone(),
            room: self.room.clone(),
        }
    }

    pub fn purchase_year(&self) -> i32 {
        self.purchase_date.year()
    }

    /// Recompute depreciation fields. Returns false (and leaves the fields
    /// untouched) when the asset cannot be depreciated.
    pub fn recalculate(&mut self, reference: &ReferenceData, current_year: i32) -> bool {
        let Some(category) = reference.category(&self.category) else {
            return false;
        };
        match depreciation::calculate(
            self.purchase_cost,
            self.purchase_year(),
            current_year,
            category,
        ) {
            Some(financials) => {
                self.financials = financials;
                true
            }
            None => false,
        }
    }

    /// Append a line to the free-form notes.
    pub fn append_note(&mut self, note: &str) {
        if self.notes.is_empty() {
            self.notes = note.to_string();
        } else {
            self.notes = format!("{} | {}", self.notes, note);
        }
    }
}
