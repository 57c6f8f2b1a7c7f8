use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::asset::Placement;

/// How bad a reported damage is.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Light,
    Moderate,
    Heavy,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DamageLog {
    pub damage_type: String,
    pub severity: Severity,
    pub description: String,
    pub placement: Placement,
    pub notes: String,
}

/// What happened to an asset coming out of repair.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RepairOutcome {
    /// Parked in the storage room (approved request)
    Stored,
    /// Handed back into service directly
    Allocated,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RepairLog {
    pub outcome: RepairOutcome,
    pub description: String,
    pub new_placement: Placement,
    pub notes: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LostLog {
    pub reason: String,
    pub description: String,
    pub last_placement: Placement,
    pub date_lost: Option<NaiveDate>,
    pub notes: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DisposalLog {
    pub reason: String,
    pub method: String,
    pub description: String,
    pub notes: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RelocationLog {
    pub from: Placement,
    pub to: Placement,
    pub reason: String,
    pub notes: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Damage(DamageLog),
    Repair(RepairLog),
    Lost(LostLog),
    Disposal(DisposalLog),
    Relocation(RelocationLog),
}

impl ActivityKind {
    pub const LABELS: [&'static str; 5] = ["damage", "repair", "lost", "disposal", "relocation"];

    pub fn label(&self) -> &'static str {
        match self {
            ActivityKind::Damage(_) => "damage",
            ActivityKind::Repair(_) => "repair",
            ActivityKind::Lost(_) => "lost",
            ActivityKind::Disposal(_) => "disposal",
            ActivityKind::Relocation(_) => "relocation",
        }
    }
}

/// One entry in an asset's history.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Activity {
    pub asset_id: u64,
    pub asset_name: String,
    /// Request whose approval produced this entry, if any
    pub request_id: Option<u64>,
    pub performed_by: String,
    pub recorded_at: DateTime<Utc>,
    pub kind: ActivityKind,
}

/// Append-only activity history across all assets.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ActivityLog {
    entries: Vec<Activity>,
}

impl ActivityLog {
    pub fn record(&mut self, activity: Activity) {
        self.entries.push(activity);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries for one asset, oldest first.
    pub fn history_for(&self, asset_id: u64) -> Vec<Activity> {
        let mut history: Vec<Activity> = self
            .entries
            .iter()
            .filter(|a| a.asset_id == asset_id)
            .cloned()
            .collect();
        history.sort_by_key(|a| a.recorded_at);
        history
    }

    /// Entries of one kind, e.g. `"damage"`, newest first.
    pub fn of_kind(&self, label: &str) -> Vec<Activity> {
        let mut entries: Vec<Activity> = self
            .entries
            .iter()
            .filter(|a| a.kind.label() == label)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        entries
    }
}
