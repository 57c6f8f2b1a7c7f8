//! The authoritative asset store.
//!
//! All tables live in one [`StoreState`] behind a mutex. Every mutation runs
//! through [`Store::transact`]: the closure works on a copy of the state, the
//! copy is written to disk, and only then does it replace the live state. A
//! failed operation or a failed write therefore leaves both memory and disk
//! exactly as they were.

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::activity::{Activity, ActivityKind, ActivityLog};
use crate::asset::{Asset, AssetStatus};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::login::User;
use crate::reference::ReferenceData;
use crate::repair::{self, AllocateRepaired};
use crate::role::Role;
use crate::saving;
use crate::summary::Summary;
use crate::workflow::{self, ApprovalRequest, ApprovalStatus, ApprovalView, Submission};

/// Everything the store persists in its snapshot.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct StoreState {
    pub(crate) assets: BTreeMap<u64, Asset>,
    pub(crate) approvals: BTreeMap<u64, ApprovalRequest>,
    pub(crate) activity: ActivityLog,
    pub(crate) reference: ReferenceData,
    pub(crate) next_asset_id: u64,
    pub(crate) next_request_id: u64,
}

impl StoreState {
    pub fn new(reference: ReferenceData) -> Self {
        StoreState {
            reference,
            ..StoreState::default()
        }
    }

    pub(crate) fn allocate_asset_id(&mut self) -> u64 {
        self.next_asset_id += 1;
        self.next_asset_id
    }

    pub(crate) fn allocate_request_id(&mut self) -> u64 {
        self.next_request_id += 1;
        self.next_request_id
    }

    /// The request currently waiting for a decision on `asset_id`, if any.
    pub(crate) fn pending_for_asset(&self, asset_id: u64) -> Option<&ApprovalRequest> {
        self.approvals
            .values()
            .find(|r| r.status == ApprovalStatus::Pending && r.asset_id == Some(asset_id))
    }
}

pub struct Store {
    config: Config,
    state: Mutex<StoreState>,
}

impl Store {
    /// Load the snapshot under `config.data_dir`, or start from the default
    /// catalog when there is none yet.
    pub fn open(config: Config) -> AppResult<Self> {
        let path = config.store_path();
        let mut state = if path.exists() {
            let state = saving::load_snapshot(&path)?;
            log::info!(
                "loaded {} assets and {} requests from {}",
                state.assets.len(),
                state.approvals.len(),
                path.display()
            );
            state
        } else {
            log::info!("no snapshot at {}, starting empty", path.display());
            StoreState::new(ReferenceData::default_catalog())
        };

        if state
            .reference
            .insert_location(&config.storage_location, &config.storage_room)
        {
            log::warn!(
                "storage room '{} - {}' was not in the reference data, added it",
                config.storage_location, config.storage_room
            );
        }
        saving::save_snapshot(&state, &path)?;

        Ok(Store {
            config,
            state: Mutex::new(state),
        })
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        // The live state is only ever replaced wholesale, so it is consistent
        // even if a holder panicked.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read<T>(&self, f: impl FnOnce(&StoreState) -> T) -> T {
        f(&self.lock())
    }

    fn transact<T>(&self, f: impl FnOnce(&mut StoreState) -> AppResult<T>) -> AppResult<T> {
        let mut guard = self.lock();
        let mut working = guard.clone();
        let value = f(&mut working)?;
        saving::save_snapshot(&working, &self.config.store_path())?;
        *guard = working;
        Ok(value)
    }

    pub fn assets(&self) -> Vec<Asset> {
        self.read(|s| s.assets.values().cloned().collect())
    }

    pub fn asset(&self, id: u64) -> AppResult<Asset> {
        self.read(|s| s.assets.get(&id).cloned())
            .ok_or_else(|| AppError::not_found(format!("asset {}", id)))
    }

    pub fn assets_with_status(&self, status: AssetStatus) -> Vec<Asset> {
        self.read(|s| {
            s.assets
                .values()
                .filter(|a| a.status == status)
                .cloned()
                .collect()
        })
    }

    /// Activity entries of one asset, oldest first.
    pub fn history(&self, asset_id: u64) -> AppResult<Vec<Activity>> {
        self.read(|s| {
            if s.assets.contains_key(&asset_id) {
                Ok(s.activity.history_for(asset_id))
            } else {
                Err(AppError::not_found(format!("asset {}", asset_id)))
            }
        })
    }

    /// All activity entries of one kind across assets, newest first.
    pub fn activity_of_kind(&self, kind: &str) -> AppResult<Vec<Activity>> {
        if !ActivityKind::LABELS.contains(&kind) {
            return Err(AppError::invalid_input(format!(
                "unknown activity kind '{}'",
                kind
            )));
        }
        Ok(self.read(|s| s.activity.of_kind(kind)))
    }

    pub fn reference(&self) -> ReferenceData {
        self.read(|s| s.reference.clone())
    }

    /// Register a new room. Returns false when it was already known.
    pub fn add_location(&self, actor: &User, location: &str, room: &str) -> AppResult<bool> {
        if !actor.is_active || actor.role != Role::Admin {
            return Err(AppError::forbidden("only admins can add locations"));
        }
        if location.trim().is_empty() || room.trim().is_empty() {
            return Err(AppError::invalid_input("location and room are required"));
        }
        let added = self.transact(|s| Ok(s.reference.insert_location(location.trim(), room.trim())))?;
        if added {
            log::info!("{} added room '{} - {}'", actor.username, location, room);
        }
        Ok(added)
    }

    pub fn submit(&self, actor: &User, submission: Submission) -> AppResult<ApprovalRequest> {
        let request = self.transact(|s| workflow::submit(s, actor, submission, Utc::now()))?;
        log::info!(
            "request #{} ({}) submitted by {}, awaiting {}",
            request.id, request.request_type, request.submitted_by, request.approver_role
        );
        Ok(request)
    }

    pub fn approve(&self, actor: &User, id: u64, notes: &str) -> AppResult<ApprovalRequest> {
        let result =
            self.transact(|s| workflow::approve(s, &self.config, actor, id, notes, Utc::now()));
        match &result {
            Ok(request) => log::info!(
                "request #{} ({}) approved by {}",
                request.id, request.request_type, actor.username
            ),
            Err(e) => log::warn!("approval of request #{} by {} failed: {}", id, actor.username, e),
        }
        result
    }

    pub fn reject(&self, actor: &User, id: u64, notes: &str) -> AppResult<ApprovalRequest> {
        let request = self.transact(|s| workflow::reject(s, actor, id, notes, Utc::now()))?;
        log::info!("request #{} rejected by {}", request.id, actor.username);
        Ok(request)
    }

    pub fn cancel(&self, actor: &User, id: u64) -> AppResult<ApprovalRequest> {
        let request = self.transact(|s| workflow::cancel(s, actor, id, Utc::now()))?;
        log::info!("request #{} cancelled by {}", request.id, actor.username);
        Ok(request)
    }

    pub fn request(&self, id: u64) -> AppResult<ApprovalRequest> {
        self.read(|s| s.approvals.get(&id).cloned())
            .ok_or_else(|| AppError::not_found(format!("request {}", id)))
    }

    /// Like [`Store::request`], but staff may only look at their own requests.
    pub fn request_for(&self, actor: &User, id: u64) -> AppResult<ApprovalRequest> {
        let request = self.request(id)?;
        if actor.role == Role::Staff && request.submitted_by != actor.username {
            return Err(AppError::forbidden("staff can only view their own requests"));
        }
        Ok(request)
    }

    pub fn approvals_for(&self, actor: &User) -> ApprovalView {
        self.read(|s| workflow::approvals_for(s.approvals.values(), actor))
    }

    pub fn inbox(&self, actor: &User) -> Vec<ApprovalRequest> {
        self.read(|s| workflow::inbox(s.approvals.values(), actor))
    }

    pub fn allocate_repaired(
        &self,
        actor: &User,
        asset_id: u64,
        form: AllocateRepaired,
    ) -> AppResult<Asset> {
        let asset = self.transact(|s| repair::allocate(s, actor, asset_id, form, Utc::now()))?;
        log::info!(
            "asset {} allocated back to {} by {}",
            asset.id,
            asset.placement(),
            actor.username
        );
        Ok(asset)
    }

    /// Recompute depreciation for every asset, disposed ones included, so
    /// their last book value stays consistent with the catalogue. Returns how
    /// many assets were updated.
    pub fn recalculate_depreciation(&self, actor: &User, current_year: i32) -> AppResult<usize> {
        if !actor.is_active || actor.role != Role::Admin {
            return Err(AppError::forbidden("only admins can update depreciation"));
        }
        let updated = self.transact(|s| {
            let StoreState {
                assets, reference, ..
            } = s;
            let mut updated = 0;
            for asset in assets.values_mut() {
                if asset.recalculate(reference, current_year) {
                    updated += 1;
                } else {
                    log::debug!("asset {} skipped, cannot be depreciated", asset.id);
                }
            }
            Ok(updated)
        })?;
        log::info!(
            "depreciation updated for {} assets as of {} by {}",
            updated, current_year, actor.username
        );
        Ok(updated)
    }

    pub fn summary(&self, current_year: i32) -> Summary {
        self.read(|s| Summary::build(s.assets.values(), current_year))
    }

    /// Dashboard summary as of the current calendar year.
    pub fn summary_now(&self) -> Summary {
        self.summary(Utc::now().year())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::Severity;
    use crate::asset::tests::laptop;
    use crate::workflow::RequestPayload;
    use tempfile::tempdir;

    fn admin() -> User {
        User::new("alice", Role::Admin)
    }

    fn staff() -> User {
        User::new("sam", Role::Staff)
    }

    fn add(store: &Store) -> u64 {
        let request = store
            .submit(
                &staff(),
                Submission {
                    asset_id: None,
                    payload: RequestPayload::AddAsset(laptop()),
                },
            )
            .unwrap();
        store
            .approve(&admin(), request.id, "")
            .unwrap()
            .asset_id
            .unwrap()
    }

    #[test]
    fn approved_changes_survive_reopen() {
        let dir = tempdir().unwrap();
        let config = Config::with_data_dir(dir.path());

        let id = {
            let store = Store::open(config.clone()).unwrap();
            let id = add(&store);
            let report = store
                .submit(
                    &staff(),
                    Submission {
                        asset_id: Some(id),
                        payload: RequestPayload::DamageReport {
                            damage_type: "Keyboard".to_string(),
                            severity: Severity::Light,
                            description: "sticky keys".to_string(),
                            notes: String::new(),
                        },
                    },
                )
                .unwrap();
            store.approve(&admin(), report.id, "").unwrap();
            id
        };

        let store = Store::open(config).unwrap();
        assert_eq!(store.asset(id).unwrap().status, AssetStatus::UnderRepair);
        assert_eq!(store.history(id).unwrap().len(), 1);
        assert_eq!(store.assets_with_status(AssetStatus::UnderRepair).len(), 1);
        assert_eq!(store.approvals_for(&admin()).completed.len(), 2);
    }

    #[test]
    fn failed_approval_changes_nothing() {
        let dir = tempdir().unwrap();
        let store = Store::open(Config::with_data_dir(dir.path())).unwrap();
        let id = add(&store);

        let report = store
            .submit(
                &staff(),
                Submission {
                    asset_id: Some(id),
                    payload: RequestPayload::LostReport {
                        reason: "missing".to_string(),
                        description: String::new(),
                        notes: String::new(),
                        date_lost: None,
                    },
                },
            )
            .unwrap();

        let manager = User::new("mike", Role::Manager);
        assert!(store.approve(&manager, report.id, "").is_err());
        assert_eq!(store.request(report.id).unwrap().status, ApprovalStatus::Pending);
        assert_eq!(store.asset(id).unwrap().status, AssetStatus::Active);
        assert_eq!(store.inbox(&admin()).len(), 1);
    }

    #[test]
    fn depreciation_update_is_admin_only() {
        let dir = tempdir().unwrap();
        let store = Store::open(Config::with_data_dir(dir.path())).unwrap();
        let id = add(&store);

        assert!(matches!(
            store.recalculate_depreciation(&staff(), 2030),
            Err(AppError::Forbidden(_))
        ));
        assert_eq!(store.recalculate_depreciation(&admin(), 2030).unwrap(), 1);
        let asset = store.asset(id).unwrap();
        assert_eq!(asset.financials.book_value, asset.financials.residual_value);
    }

    #[test]
    fn depreciation_covers_disposed_assets() {
        let dir = tempdir().unwrap();
        let store = Store::open(Config::with_data_dir(dir.path())).unwrap();
        let kept = add(&store);
        let disposed = add(&store);
        store
            .transact(|s| {
                if let Some(asset) = s.assets.get_mut(&disposed) {
                    asset.status = AssetStatus::Disposed;
                }
                Ok(())
            })
            .unwrap();

        assert_eq!(store.recalculate_depreciation(&admin(), 2030).unwrap(), 2);
        assert_eq!(
            store.asset(disposed).unwrap().financials,
            store.asset(kept).unwrap().financials
        );
    }

    #[test]
    fn activity_is_listed_by_kind() {
        let dir = tempdir().unwrap();
        let store = Store::open(Config::with_data_dir(dir.path())).unwrap();
        let id = add(&store);
        let report = store
            .submit(
                &staff(),
                Submission {
                    asset_id: Some(id),
                    payload: RequestPayload::DamageReport {
                        damage_type: "Screen".to_string(),
                        severity: Severity::Moderate,
                        description: "cracked".to_string(),
                        notes: String::new(),
                    },
                },
            )
            .unwrap();
        store.approve(&admin(), report.id, "").unwrap();

        let damage = store.activity_of_kind("damage").unwrap();
        assert_eq!(damage.len(), 1);
        assert_eq!(damage[0].request_id, Some(report.id));
        assert!(store.activity_of_kind("lost").unwrap().is_empty());
        assert!(matches!(
            store.activity_of_kind("theft"),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn storage_room_from_config_is_registered() {
        let dir = tempdir().unwrap();
        let mut config = Config::with_data_dir(dir.path());
        config.storage_location = "Branch - Bandung".to_string();
        config.storage_room = "299 - Cage".to_string();
        let store = Store::open(config).unwrap();
        assert!(store.reference().has_room("Branch - Bandung", "299 - Cage"));
    }

    #[test]
    fn locations_are_added_by_admins() {
        let dir = tempdir().unwrap();
        let store = Store::open(Config::with_data_dir(dir.path())).unwrap();
        assert!(store.add_location(&staff(), "HO - Ciputat", "1030 - Lobby").is_err());
        assert!(store.add_location(&admin(), "HO - Ciputat", "1030 - Lobby").unwrap());
        assert!(!store.add_location(&admin(), "HO - Ciputat", "1030 - Lobby").unwrap());
    }

    #[test]
    fn staff_cannot_peek_at_other_requests() {
        let dir = tempdir().unwrap();
        let store = Store::open(Config::with_data_dir(dir.path())).unwrap();
        let request = store
            .submit(
                &admin(),
                Submission {
                    asset_id: None,
                    payload: RequestPayload::AddAsset(laptop()),
                },
            )
            .unwrap();
        assert!(store.request_for(&staff(), request.id).is_err());
        assert!(store.request_for(&admin(), request.id).is_ok());
    }
}
