//! Approval request lifecycle.
//!
//! Every state-changing operation on an asset is first stored as a pending
//! [`ApprovalRequest`] carrying a typed [`RequestPayload`]. The request is
//! routed to a single approver role; approving it replays the payload
//! against the asset store, rejecting it leaves the store untouched. A
//! request leaves `Pending` exactly once.
//!
//! The functions here operate on a [`StoreState`] that the caller treats as
//! a transaction: [`Store`](crate::store::Store) hands them a working copy
//! and only commits it when they return `Ok`, so a failed replay never leaves
//! a half-applied asset change or a request marked approved without its
//! side effects.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::activity::{
    Activity, ActivityKind, DamageLog, DisposalLog, LostLog, RelocationLog, RepairLog,
    RepairOutcome, Severity,
};
use crate::asset::{Asset, AssetEdit, AssetStatus, NewAsset, Placement};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::login::User;
use crate::reference::ReferenceData;
use crate::role::Role;
use crate::store::StoreState;

/// The fixed catalog of request types.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    /// Registration submitted by staff or a manager, approved by an admin
    AddAsset,
    /// Registration submitted by an admin, approved by a manager
    AdminAddAsset,
    EditAsset,
    Relocation,
    DamageReport,
    /// Move a repaired asset into storage
    RepairAction,
    DisposalRequest,
    LostReport,
}

impl RequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestType::AddAsset => "add_asset",
            RequestType::AdminAddAsset => "admin_add_asset",
            RequestType::EditAsset => "edit_asset",
            RequestType::Relocation => "relocation",
            RequestType::DamageReport => "damage_report",
            RequestType::RepairAction => "repair_action",
            RequestType::DisposalRequest => "disposal_request",
            RequestType::LostReport => "lost_report",
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add_asset" => Ok(RequestType::AddAsset),
            "admin_add_asset" => Ok(RequestType::AdminAddAsset),
            "edit_asset" => Ok(RequestType::EditAsset),
            "relocation" => Ok(RequestType::Relocation),
            "damage_report" => Ok(RequestType::DamageReport),
            "repair_action" => Ok(RequestType::RepairAction),
            "disposal_request" => Ok(RequestType::DisposalRequest),
            "lost_report" => Ok(RequestType::LostReport),
            other => Err(AppError::invalid_input(format!(
                "unknown request type '{}'",
                other
            ))),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ApprovalStatus::Pending)
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        })
    }
}

/// The mutation a request proposes, replayed verbatim on approval.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RequestPayload {
    AddAsset(NewAsset),
    EditAsset {
        changes: AssetEdit,
        reason: String,
    },
    Relocation {
        to: Placement,
        reason: String,
        #[serde(default)]
        notes: String,
    },
    DamageReport {
        damage_type: String,
        severity: Severity,
        description: String,
        #[serde(default)]
        notes: String,
    },
    RepairAction {
        description: String,
        #[serde(default)]
        notes: String,
    },
    DisposalRequest {
        reason: String,
        method: String,
        #[serde(default)]
        description: String,
        #[serde(default)]
        notes: String,
    },
    LostReport {
        reason: String,
        #[serde(default)]
        description: String,
        #[serde(default)]
        notes: String,
        #[serde(default)]
        date_lost: Option<NaiveDate>,
    },
}

/// What a user hands in: the payload and, for everything but a new
/// registration, the asset it targets.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Submission {
    #[serde(default)]
    pub asset_id: Option<u64>,
    pub payload: RequestPayload,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ApprovalRequest {
    pub id: u64,
    pub request_type: RequestType,
    /// Target asset; filled in on approval for registrations
    pub asset_id: Option<u64>,
    pub asset_name: String,
    pub submitted_by: String,
    pub submitter_role: Role,
    pub submitted_at: DateTime<Utc>,
    pub description: String,
    /// Placement of the target asset when the request was submitted
    pub from_placement: Option<Placement>,
    pub payload: RequestPayload,
    /// The only role allowed to decide this request
    pub approver_role: Role,
    pub status: ApprovalStatus,
    pub decided_by: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub decision_notes: String,
}

/// Requests visible to one user, split by lifecycle stage.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ApprovalView {
    /// Newest submission first
    pub pending: Vec<ApprovalRequest>,
    /// Newest decision first
    pub completed: Vec<ApprovalRequest>,
}

/// Classify a payload for a submitter. Registrations by admins are routed
/// the other way round and get their own type.
pub fn request_type_for(payload: &RequestPayload, submitter: Role) -> RequestType {
    match payload {
        RequestPayload::AddAsset(_) if submitter == Role::Admin => RequestType::AdminAddAsset,
        RequestPayload::AddAsset(_) => RequestType::AddAsset,
        RequestPayload::EditAsset { .. } => RequestType::EditAsset,
        RequestPayload::Relocation { .. } => RequestType::Relocation,
        RequestPayload::DamageReport { .. } => RequestType::DamageReport,
        RequestPayload::RepairAction { .. } => RequestType::RepairAction,
        RequestPayload::DisposalRequest { .. } => RequestType::DisposalRequest,
        RequestPayload::LostReport { .. } => RequestType::LostReport,
    }
}

/// Edits and disposals are reserved to managers and admins.
pub fn can_submit(role: Role, request_type: RequestType) -> bool {
    match request_type {
        RequestType::EditAsset | RequestType::DisposalRequest => role.can_approve(),
        _ => true,
    }
}

/// Admin submissions go to a manager; everyone else's go to an admin.
pub fn approver_for(submitter: Role) -> Role {
    match submitter {
        Role::Admin => Role::Manager,
        Role::Staff | Role::Manager => Role::Admin,
    }
}

fn describe(payload: &RequestPayload, asset_name: &str, from: Option<&Placement>) -> String {
    match payload {
        RequestPayload::AddAsset(new) => format!("Add new asset: {}", new.name),
        RequestPayload::EditAsset { reason, .. } => {
            format!("Edit asset: {} - Reason: {}", asset_name, reason)
        }
        RequestPayload::Relocation { to, .. } => match from {
            Some(from) => format!("Relocate from {} to {}", from, to),
            None => format!("Relocate to {}", to),
        },
        RequestPayload::DamageReport { description, .. } => {
            format!("Damage report: {}", description)
        }
        RequestPayload::RepairAction { description, .. } => {
            format!("Request to store asset: {}", description)
        }
        RequestPayload::DisposalRequest { reason, method, .. } => {
            format!("Disposal request: {} - {}", reason, method)
        }
        RequestPayload::LostReport { reason, .. } => format!("Lost asset report: {}", reason),
    }
}

fn require_text(value: &str, field: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        Err(AppError::invalid_input(format!("{} is required", field)))
    } else {
        Ok(())
    }
}

/// Preconditions a payload places on its target asset.
///
/// Checked at submission and again at replay, since the asset may have
/// changed in between.
fn check_target(asset: &Asset, payload: &RequestPayload, reference: &ReferenceData) -> AppResult<()> {
    if asset.status.is_terminal() {
        return Err(AppError::invalid_state(format!(
            "asset {} is already {}",
            asset.id, asset.status
        )));
    }

    match payload {
        RequestPayload::AddAsset(_) => Err(AppError::invalid_input(
            "a registration cannot target an existing asset",
        )),
        RequestPayload::EditAsset { changes, reason } => {
            require_text(reason, "edit reason")?;
            changes.validate(asset, reference)
        }
        RequestPayload::Relocation { to, reason, .. } => {
            require_text(reason, "relocation reason")?;
            reference.check_placement(&to.location, &to.room)?;
            if asset.placement() == *to {
                return Err(AppError::invalid_input(format!(
                    "asset {} is already at {}",
                    asset.id, to
                )));
            }
            Ok(())
        }
        RequestPayload::DamageReport {
            damage_type,
            description,
            ..
        } => {
            require_text(damage_type, "damage type")?;
            require_text(description, "damage description")
        }
        RequestPayload::RepairAction { .. } => {
            if asset.status != AssetStatus::UnderRepair {
                return Err(AppError::invalid_state(format!(
                    "asset {} is {}, only assets under repair can be stored",
                    asset.id, asset.status
                )));
            }
            Ok(())
        }
        RequestPayload::DisposalRequest { reason, method, .. } => {
            if asset.status != AssetStatus::ToBeDisposed {
                return Err(AppError::invalid_state(format!(
                    "asset {} must be marked '{}' first",
                    asset.id,
                    AssetStatus::ToBeDisposed
                )));
            }
            require_text(reason, "disposal reason")?;
            require_text(method, "disposal method")
        }
        RequestPayload::LostReport { reason, .. } => require_text(reason, "lost reason"),
    }
}

/// Validate, route and store a new pending request.
pub(crate) fn submit(
    state: &mut StoreState,
    actor: &User,
    submission: Submission,
    now: DateTime<Utc>,
) -> AppResult<ApprovalRequest> {
    if !actor.is_active {
        return Err(AppError::forbidden("inactive users cannot submit requests"));
    }

    let request_type = request_type_for(&submission.payload, actor.role);
    if !can_submit(actor.role, request_type) {
        return Err(AppError::forbidden(format!(
            "{} users cannot submit {} requests",
            actor.role, request_type
        )));
    }

    let (asset_id, asset_name, from_placement) = match &submission.payload {
        RequestPayload::AddAsset(new) => {
            if submission.asset_id.is_some() {
                return Err(AppError::invalid_input(
                    "a registration cannot target an existing asset",
                ));
            }
            new.validate(&state.reference)?;
            (None, new.name.clone(), None)
        }
        payload => {
            let id = submission
                .asset_id
                .ok_or_else(|| AppError::invalid_input("asset_id is required"))?;
            let asset = state
                .assets
                .get(&id)
                .ok_or_else(|| AppError::not_found(format!("asset {}", id)))?;
            check_target(asset, payload, &state.reference)?;
            if let Some(open) = state.pending_for_asset(id) {
                return Err(AppError::Conflict(format!(
                    "asset {} already has pending request #{}",
                    id, open.id
                )));
            }
            (Some(id), asset.name.clone(), Some(asset.placement()))
        }
    };

    let request = ApprovalRequest {
        id: state.allocate_request_id(),
        request_type,
        asset_id,
        description: describe(&submission.payload, &asset_name, from_placement.as_ref()),
        asset_name,
        submitted_by: actor.username.clone(),
        submitter_role: actor.role,
        submitted_at: now,
        from_placement,
        payload: submission.payload,
        approver_role: approver_for(actor.role),
        status: ApprovalStatus::Pending,
        decided_by: None,
        decided_at: None,
        decision_notes: String::new(),
    };
    state.approvals.insert(request.id, request.clone());
    Ok(request)
}

/// Whether `actor` may approve or reject `request`.
pub fn authorize_decision(actor: &User, request: &ApprovalRequest) -> AppResult<()> {
    if request.status.is_terminal() {
        return Err(AppError::invalid_state(format!(
            "request #{} is already {}",
            request.id, request.status
        )));
    }
    if !actor.is_active || !actor.role.can_approve() {
        return Err(AppError::forbidden(format!(
            "{} users cannot decide requests",
            actor.role
        )));
    }
    if actor.role != request.approver_role {
        return Err(AppError::forbidden(format!(
            "request #{} awaits {} approval",
            request.id, request.approver_role
        )));
    }
    if actor.username == request.submitted_by {
        return Err(AppError::forbidden("requests cannot be decided by their submitter"));
    }
    Ok(())
}

fn pending_request(state: &StoreState, id: u64) -> AppResult<ApprovalRequest> {
    state
        .approvals
        .get(&id)
        .cloned()
        .ok_or_else(|| AppError::not_found(format!("request {}", id)))
}

fn close(
    state: &mut StoreState,
    id: u64,
    status: ApprovalStatus,
    decided_by: &str,
    notes: &str,
    now: DateTime<Utc>,
) -> AppResult<ApprovalRequest> {
    let stored = state
        .approvals
        .get_mut(&id)
        .ok_or_else(|| AppError::not_found(format!("request {}", id)))?;
    stored.status = status;
    stored.decided_by = Some(decided_by.to_string());
    stored.decided_at = Some(now);
    stored.decision_notes = notes.to_string();
    Ok(stored.clone())
}

/// Approve a pending request and replay its payload.
pub(crate) fn approve(
    state: &mut StoreState,
    config: &Config,
    actor: &User,
    id: u64,
    notes: &str,
    now: DateTime<Utc>,
) -> AppResult<ApprovalRequest> {
    let request = pending_request(state, id)?;
    authorize_decision(actor, &request)?;

    let asset_id = replay(state, config, &request, &actor.username, now)?;

    let mut approved = close(state, id, ApprovalStatus::Approved, &actor.username, notes, now)?;
    if approved.asset_id.is_none() {
        approved.asset_id = Some(asset_id);
        state.approvals.insert(id, approved.clone());
    }
    Ok(approved)
}

/// Reject a pending request; the store is left as it is.
pub(crate) fn reject(
    state: &mut StoreState,
    actor: &User,
    id: u64,
    notes: &str,
    now: DateTime<Utc>,
) -> AppResult<ApprovalRequest> {
    let request = pending_request(state, id)?;
    authorize_decision(actor, &request)?;
    close(state, id, ApprovalStatus::Rejected, &actor.username, notes, now)
}

/// Withdraw one's own pending request.
pub(crate) fn cancel(
    state: &mut StoreState,
    actor: &User,
    id: u64,
    now: DateTime<Utc>,
) -> AppResult<ApprovalRequest> {
    let request = pending_request(state, id)?;
    if request.submitted_by != actor.username {
        return Err(AppError::forbidden("only the submitter can cancel a request"));
    }
    if request.status.is_terminal() {
        return Err(AppError::invalid_state(format!(
            "request #{} is already {}",
            request.id, request.status
        )));
    }
    close(
        state,
        id,
        ApprovalStatus::Rejected,
        &actor.username,
        "cancelled by submitter",
        now,
    )
}

/// Apply an approved request to the store. Returns the id of the affected asset.
fn replay(
    state: &mut StoreState,
    config: &Config,
    request: &ApprovalRequest,
    performed_by: &str,
    now: DateTime<Utc>,
) -> AppResult<u64> {
    if let RequestPayload::AddAsset(new) = &request.payload {
        new.validate(&state.reference)?;
        let id = state.allocate_asset_id();
        let asset = Asset::from_new(id, new.clone(), &state.reference, now);
        state.assets.insert(id, asset);
        return Ok(id);
    }

    let asset_id = request.asset_id.ok_or_else(|| {
        AppError::invalid_state(format!("request #{} has no target asset", request.id))
    })?;
    let mut asset = state
        .assets
        .get(&asset_id)
        .cloned()
        .ok_or_else(|| AppError::not_found(format!("asset {}", asset_id)))?;
    check_target(&asset, &request.payload, &state.reference)?;

    let kind = apply_payload(&mut asset, &request.payload, config);
    asset.updated_at = now;

    if let Some(kind) = kind {
        state.activity.record(Activity {
            asset_id,
            asset_name: asset.name.clone(),
            request_id: Some(request.id),
            performed_by: performed_by.to_string(),
            recorded_at: now,
            kind,
        });
    }
    state.assets.insert(asset_id, asset);
    Ok(asset_id)
}

fn apply_payload(asset: &mut Asset, payload: &RequestPayload, config: &Config) -> Option<ActivityKind> {
    match payload {
        RequestPayload::AddAsset(_) => None,
        RequestPayload::EditAsset { changes, .. } => {
            changes.apply(asset);
            None
        }
        RequestPayload::Relocation { to, reason, notes } => {
            let from = asset.placement();
            asset.location = to.location.clone();
            asset.room = to.room.clone();
            Some(ActivityKind::Relocation(RelocationLog {
                from,
                to: to.clone(),
                reason: reason.clone(),
                notes: notes.clone(),
            }))
        }
        RequestPayload::DamageReport {
            damage_type,
            severity,
            description,
            notes,
        } => {
            asset.status = AssetStatus::UnderRepair;
            Some(ActivityKind::Damage(DamageLog {
                damage_type: damage_type.clone(),
                severity: *severity,
                description: description.clone(),
                placement: asset.placement(),
                notes: notes.clone(),
            }))
        }
        RequestPayload::RepairAction { description, notes } => {
            asset.status = AssetStatus::InStorage;
            asset.location = config.storage_location.clone();
            asset.room = config.storage_room.clone();
            asset.append_note(&format!("Moved to storage: {}", description));
            Some(ActivityKind::Repair(RepairLog {
                outcome: RepairOutcome::Stored,
                description: description.clone(),
                new_placement: asset.placement(),
                notes: notes.clone(),
            }))
        }
        RequestPayload::DisposalRequest {
            reason,
            method,
            description,
            notes,
        } => {
            asset.status = AssetStatus::Disposed;
            Some(ActivityKind::Disposal(DisposalLog {
                reason: reason.clone(),
                method: method.clone(),
                description: description.clone(),
                notes: notes.clone(),
            }))
        }
        RequestPayload::LostReport {
            reason,
            description,
            notes,
            date_lost,
        } => {
            let last_placement = asset.placement();
            asset.status = AssetStatus::Lost;
            Some(ActivityKind::Lost(LostLog {
                reason: reason.clone(),
                description: description.clone(),
                last_placement,
                date_lost: *date_lost,
                notes: notes.clone(),
            }))
        }
    }
}

/// Requests `actor` may see: staff only their own, managers and admins everything.
pub fn approvals_for<'a>(
    requests: impl IntoIterator<Item = &'a ApprovalRequest>,
    actor: &User,
) -> ApprovalView {
    let mut view = ApprovalView::default();
    for request in requests {
        if actor.role == Role::Staff && request.submitted_by != actor.username {
            continue;
        }
        if request.status.is_terminal() {
            view.completed.push(request.clone());
        } else {
            view.pending.push(request.clone());
        }
    }
    view.pending
        .sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at).then(b.id.cmp(&a.id)));
    view.completed.sort_by(|a, b| {
        b.decided_at
            .unwrap_or(b.submitted_at)
            .cmp(&a.decided_at.unwrap_or(a.submitted_at))
            .then(b.id.cmp(&a.id))
    });
    view
}

/// Pending requests `actor` is allowed to decide, oldest first.
pub fn inbox<'a>(
    requests: impl IntoIterator<Item = &'a ApprovalRequest>,
    actor: &User,
) -> Vec<ApprovalRequest> {
    let mut open: Vec<ApprovalRequest> = requests
        .into_iter()
        .filter(|r| authorize_decision(actor, r).is_ok())
        .cloned()
        .collect();
    open.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at).then(a.id.cmp(&b.id)));
    open
}
